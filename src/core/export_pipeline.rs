use crate::core::{ConfigProvider, Pipeline, Storage, TransformResult};
use crate::domain::dataset::{strip_bom, Dataset};
use crate::domain::model::{Artifact, ExportFormat, Publication};
use crate::utils::error::{EtlError, Result};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// 匯出管道：把型別化的發表紀錄寫成多種交換格式，並驗證每個輸出檔
pub struct ExportPipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
}

impl<S: Storage, C: ConfigProvider> ExportPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    fn formats(&self) -> Vec<ExportFormat> {
        if self.config.export_formats().is_empty() {
            ExportFormat::all().to_vec()
        } else {
            self.config.export_formats().to_vec()
        }
    }

    fn render(&self, publications: &[Publication], format: ExportFormat) -> Result<Vec<u8>> {
        match format.delimiter() {
            Some(delimiter) => {
                let mut builder = csv::WriterBuilder::new();
                builder.delimiter(delimiter);
                if format == ExportFormat::Excel {
                    // 試算表相容性需要 CRLF 行尾
                    builder.terminator(csv::Terminator::CRLF);
                }
                let mut writer = builder.from_writer(Vec::new());
                for publication in publications {
                    writer.serialize(publication)?;
                }
                let mut bytes = writer.into_inner().map_err(|e| EtlError::ProcessingError {
                    message: format!("Failed to finalize {} buffer: {}", format, e),
                })?;
                if format == ExportFormat::Excel {
                    let mut with_bom = Vec::with_capacity(bytes.len() + UTF8_BOM.len());
                    with_bom.extend_from_slice(UTF8_BOM);
                    with_bom.append(&mut bytes);
                    bytes = with_bom;
                }
                Ok(bytes)
            }
            None => Ok(serde_json::to_vec_pretty(publications)?),
        }
    }

    /// 讀回剛寫出的檔案並檢查編碼與筆數
    fn verify_artifact(&self, format: ExportFormat, expected_records: usize) -> Result<()> {
        let bytes = self.storage.read_file(format.file_name())?;

        let has_bom = bytes.starts_with(UTF8_BOM);
        if format == ExportFormat::Excel && !has_bom {
            return Err(EtlError::ValidationError {
                message: format!("{} is missing its UTF-8 BOM", format.file_name()),
            });
        }
        if format != ExportFormat::Excel && has_bom {
            return Err(EtlError::ValidationError {
                message: format!("{} unexpectedly starts with a BOM", format.file_name()),
            });
        }

        match format.delimiter() {
            Some(delimiter) => {
                let mut reader = csv::ReaderBuilder::new()
                    .delimiter(delimiter)
                    .from_reader(strip_bom(&bytes));
                // 嚴格模式：欄位數不一致會在這裡回報錯誤
                let mut rows = 0usize;
                for record in reader.records() {
                    record?;
                    rows += 1;
                }
                if rows != expected_records {
                    return Err(EtlError::ValidationError {
                        message: format!(
                            "{} holds {} records, expected {}",
                            format.file_name(),
                            rows,
                            expected_records
                        ),
                    });
                }
            }
            None => {
                let values: Vec<serde_json::Value> = serde_json::from_slice(&bytes)?;
                if values.len() != expected_records {
                    return Err(EtlError::ValidationError {
                        message: format!(
                            "{} holds {} records, expected {}",
                            format.file_name(),
                            values.len(),
                            expected_records
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

impl<S: Storage, C: ConfigProvider> Pipeline for ExportPipeline<S, C> {
    type Extracted = Dataset;

    fn extract(&self) -> Result<Dataset> {
        tracing::debug!("🔍 Reading dataset from: {}", self.config.input_path());
        Dataset::from_path(self.config.input_path())
    }

    fn transform(&self, dataset: Dataset) -> Result<TransformResult> {
        let formats = self.formats();
        let publications = &dataset.publications;

        let mut artifacts = Vec::with_capacity(formats.len());
        let mut report = String::new();
        report.push_str("📦 EXPORT SUMMARY\n");
        report.push_str(&format!(
            "Formats: {}\n",
            formats
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        for format in &formats {
            let bytes = self.render(publications, *format)?;
            report.push_str(&format!(
                "  ✅ {} - {} records, {} bytes ({})\n",
                format.file_name(),
                publications.len(),
                bytes.len(),
                format.description()
            ));
            artifacts.push(Artifact::new(format.file_name(), bytes));
        }

        report.push('\n');
        report.push_str("💡 Usage notes:\n");
        report.push_str("  - Excel: open the excel_compatible file directly, the BOM sets the encoding\n");
        report.push_str("  - Pipelines: tab and pipe variants avoid comma quoting issues\n");
        report.push_str("  - JSON: field order matches the original column order\n");

        Ok(TransformResult {
            processed_records: publications.len(),
            report,
            artifacts,
        })
    }

    fn load(&self, result: TransformResult) -> Result<String> {
        for artifact in &result.artifacts {
            tracing::debug!(
                "💾 Writing {} ({} bytes)",
                artifact.name,
                artifact.bytes.len()
            );
            self.storage.write_file(&artifact.name, &artifact.bytes)?;
        }

        if self.config.verify_exports() {
            let mut failures = Vec::new();
            for artifact in &result.artifacts {
                let format = ExportFormat::all()
                    .into_iter()
                    .find(|f| f.file_name() == artifact.name);
                let Some(format) = format else { continue };
                match self.verify_artifact(format, result.processed_records) {
                    Ok(()) => tracing::info!("✅ Verified {}", artifact.name),
                    Err(e) => {
                        tracing::error!("❌ Verification failed for {}: {}", artifact.name, e);
                        failures.push(format!("{}: {}", artifact.name, e));
                    }
                }
            }
            if !failures.is_empty() {
                return Err(EtlError::ValidationError {
                    message: format!("Export verification failed: {}", failures.join("; ")),
                });
            }
        }

        if self.config.archive_exports() {
            // 創建ZIP文件
            let zip_data = {
                let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                for artifact in &result.artifacts {
                    zip.start_file::<_, ()>(artifact.name.as_str(), FileOptions::default())?;
                    zip.write_all(&artifact.bytes)?;
                }
                // 完成並取回底層 Vec<u8>
                let cursor = zip.finish()?;
                cursor.into_inner()
            };
            tracing::debug!("💾 Writing ZIP archive ({} bytes)", zip_data.len());
            self.storage.write_file("publication_exports.zip", &zip_data)?;
            return Ok(format!(
                "{}/publication_exports.zip",
                self.config.output_path()
            ));
        }

        match result.artifacts.first() {
            Some(artifact) => Ok(format!("{}/{}", self.config.output_path(), artifact.name)),
            None => Ok(self.config.output_path().to_string()),
        }
    }
}
