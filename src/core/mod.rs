pub mod dataset_pipeline;
pub mod etl;
pub mod export_pipeline;
pub mod flow_pipeline;
#[cfg(test)]
pub(crate) mod testkit;

pub use crate::domain::model::{Artifact, ExportFormat, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
