pub mod cli;
pub mod study;

#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::domain::model::ExportFormat;
#[cfg(feature = "cli")]
use crate::utils::validation::{
    validate_file_extensions, validate_path, validate_positive_number, Validate,
};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "sysrev-etl")]
#[command(about = "Systematic review dataset reports and exports")]
pub struct CliConfig {
    /// 發表文獻資料集 (CSV/TSV/PSV)
    pub input_path: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value = "10", help = "Rows shown in preview tables")]
    pub display_rows: usize,

    #[arg(long, default_value = "3", help = "Records printed with full details")]
    pub detail_records: usize,

    #[arg(long, help = "Skip the statistics summary section")]
    pub no_summary: bool,

    #[arg(
        long,
        value_delimiter = ',',
        help = "Export formats: csv, tsv, pipe, excel, json"
    )]
    pub export: Vec<ExportFormat>,

    #[arg(long, help = "Skip re-reading exported files for verification")]
    pub no_verify: bool,

    #[arg(long, help = "Bundle exports into a ZIP archive")]
    pub archive: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Enable system resource monitoring")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn input_path(&self) -> &str {
        &self.input_path
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn display_rows(&self) -> usize {
        self.display_rows
    }

    fn detail_records(&self) -> usize {
        self.detail_records
    }

    fn with_summary(&self) -> bool {
        !self.no_summary
    }

    fn export_formats(&self) -> &[ExportFormat] {
        &self.export
    }

    fn verify_exports(&self) -> bool {
        !self.no_verify
    }

    fn archive_exports(&self) -> bool {
        self.archive
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> crate::utils::error::Result<()> {
        validate_path("input_path", &self.input_path)?;
        validate_path("output_path", &self.output_path)?;
        validate_file_extensions(
            "input_path",
            std::slice::from_ref(&self.input_path),
            &["csv", "tsv", "psv", "txt"],
        )?;
        validate_positive_number("display_rows", self.display_rows, 1)?;
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    fn base_config() -> CliConfig {
        CliConfig {
            input_path: "publications.csv".to_string(),
            output_path: "./output".to_string(),
            display_rows: 10,
            detail_records: 3,
            no_summary: false,
            export: vec![],
            no_verify: false,
            archive: false,
            verbose: false,
            monitor: false,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_unsupported_input_extension() {
        let config = CliConfig {
            input_path: "publications.xlsx".to_string(),
            ..base_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_display_rows() {
        let config = CliConfig {
            display_rows: 0,
            ..base_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parses_export_formats_from_args() {
        let config = CliConfig::parse_from([
            "sysrev-etl",
            "publications.csv",
            "--export",
            "csv,json,excel",
        ]);
        assert_eq!(
            config.export,
            vec![ExportFormat::Csv, ExportFormat::Json, ExportFormat::Excel]
        );
        assert!(config.verify_exports());
        assert!(config.with_summary());
    }
}
