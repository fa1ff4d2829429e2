use crate::domain::model::{ExportFormat, TransformResult};
use crate::utils::error::Result;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;
    fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn display_rows(&self) -> usize;
    fn detail_records(&self) -> usize;
    fn with_summary(&self) -> bool;
    fn export_formats(&self) -> &[ExportFormat];
    fn verify_exports(&self) -> bool;
    fn archive_exports(&self) -> bool;
}

/// 抽取、轉換、載入三階段；每個管道自行決定抽取出的中間型別
pub trait Pipeline: Send + Sync {
    type Extracted;

    fn extract(&self) -> Result<Self::Extracted>;
    fn transform(&self, data: Self::Extracted) -> Result<TransformResult>;
    fn load(&self, result: TransformResult) -> Result<String>;
}
