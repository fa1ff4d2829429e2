pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, study::StudyConfig};

pub use core::{
    dataset_pipeline::DatasetPipeline,
    etl::EtlEngine,
    export_pipeline::ExportPipeline,
    flow_pipeline::{FlowPipeline, SimulationPipeline},
};
pub use utils::error::{EtlError, Result};
