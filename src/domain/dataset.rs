use crate::domain::model::{Publication, RawTable, DATASET_COLUMNS};
use crate::utils::error::{EtlError, Result};
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// 已載入的發表文獻資料集：原始表格加上成功型別化的紀錄
#[derive(Debug, Clone)]
pub struct Dataset {
    pub raw: RawTable,
    pub publications: Vec<Publication>,
    pub skipped_rows: usize,
}

impl Dataset {
    /// Reads a delimited file from disk, inferring the delimiter from the
    /// file name (`.tsv` for tabs, `pipe`/`.psv` for pipes, comma otherwise).
    pub fn from_path(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Err(EtlError::ConfigError {
                message: format!("File not found: {}", path),
            });
        }
        let bytes = std::fs::read(path)?;
        let delimiter = sniff_delimiter(path);
        tracing::debug!("🔍 Loading dataset from {} (delimiter: {:?})", path, delimiter as char);
        Self::from_csv_bytes(&bytes, delimiter)
    }

    /// Parses delimited bytes. The header row is mandatory; rows whose typed
    /// parse fails (bad decision value, year outside a plausible range) are
    /// skipped with a warning rather than aborting the whole load.
    pub fn from_csv_bytes(bytes: &[u8], delimiter: u8) -> Result<Self> {
        let bytes = strip_bom(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_reader(bytes);

        let headers = reader.headers()?.clone();
        let columns: Vec<String> = headers.iter().map(|h| h.to_string()).collect();

        // 缺欄位時每一列的型別化都會失敗，先一次性提醒使用者
        let missing: Vec<&str> = DATASET_COLUMNS
            .iter()
            .copied()
            .filter(|expected| !columns.iter().any(|c| c == expected))
            .collect();
        if !missing.is_empty() {
            tracing::warn!("⚠️ Missing expected columns: {}", missing.join(", "));
        }

        let mut rows = Vec::new();
        let mut publications = Vec::new();
        let mut skipped_rows = 0usize;

        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(|cell| cell.to_string()).collect());

            match record.deserialize::<Publication>(Some(&headers)) {
                Ok(publication) => {
                    if (1900..=2100).contains(&publication.year) {
                        publications.push(publication);
                    } else {
                        skipped_rows += 1;
                        tracing::warn!(
                            "⚠️ Skipping row {}: year {} outside plausible range",
                            rows.len(),
                            publication.year
                        );
                    }
                }
                Err(e) => {
                    skipped_rows += 1;
                    tracing::warn!("⚠️ Skipping row {}: {}", rows.len(), e);
                }
            }
        }

        Ok(Dataset {
            raw: RawTable { columns, rows },
            publications,
            skipped_rows,
        })
    }

    /// Re-serializes the typed records as clean comma-separated CSV without a
    /// BOM. Quoting is applied only where needed.
    pub fn clean_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for publication in &self.publications {
            writer.serialize(publication)?;
        }
        writer.into_inner().map_err(|e| EtlError::ProcessingError {
            message: format!("Failed to finalize CSV buffer: {}", e),
        })
    }
}

/// 由檔名推斷分隔字元
pub fn sniff_delimiter(path: &str) -> u8 {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".tsv") {
        b'\t'
    } else if lower.ends_with(".psv") || lower.contains("pipe") {
        b'|'
    } else {
        b','
    }
}

pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Decision;

    const SAMPLE: &str = "\
Title,Authors,Year,Journal_Conference,DOI_URL,Database_source,Inclusion_Exclusion_decision,Reason_for_inclusion_exclusion,Abstract,Internal_Source_ID
\"Graph networks, spatially resolved\",\"Chen L; Park J\",2023,Nature Methods,https://doi.org/10.1/a,PubMed,Include,Novel GNN architecture,Spatial transcriptomics of cardiomyocytes.,SRC_0001
Sequence model survey,\"Wu Q\",2021,Bioinformatics,https://doi.org/10.1/b,Scopus,Exclude,Bulk transcriptomics only,RNN approaches reviewed.,SRC_0002
";

    #[test]
    fn test_parses_quoted_fields_and_decisions() {
        let dataset = Dataset::from_csv_bytes(SAMPLE.as_bytes(), b',').unwrap();
        assert_eq!(dataset.raw.row_count(), 2);
        assert_eq!(dataset.publications.len(), 2);
        assert_eq!(dataset.skipped_rows, 0);
        assert_eq!(dataset.publications[0].title, "Graph networks, spatially resolved");
        assert_eq!(dataset.publications[0].decision, Decision::Include);
        assert_eq!(dataset.publications[1].decision, Decision::Exclude);
    }

    #[test]
    fn test_strips_utf8_bom_before_parsing() {
        let mut bytes = b"\xef\xbb\xbf".to_vec();
        bytes.extend_from_slice(SAMPLE.as_bytes());
        let dataset = Dataset::from_csv_bytes(&bytes, b',').unwrap();
        assert_eq!(dataset.raw.columns[0], "Title");
    }

    #[test]
    fn test_skips_rows_with_bad_year_or_decision() {
        let sample = "\
Title,Authors,Year,Journal_Conference,DOI_URL,Database_source,Inclusion_Exclusion_decision,Reason_for_inclusion_exclusion,Abstract,Internal_Source_ID
Good,A,2022,J,u,PubMed,Include,ok,abs,S1
Bad year,B,1492,J,u,PubMed,Include,ok,abs,S2
Bad decision,C,2022,J,u,PubMed,Perhaps,ok,abs,S3
";
        let dataset = Dataset::from_csv_bytes(sample.as_bytes(), b',').unwrap();
        assert_eq!(dataset.raw.row_count(), 3);
        assert_eq!(dataset.publications.len(), 1);
        assert_eq!(dataset.skipped_rows, 2);
    }

    #[test]
    fn test_missing_columns_still_parse_generically() {
        let sample = "Title,Authors,Year\nT,A,2022\n";
        let dataset = Dataset::from_csv_bytes(sample.as_bytes(), b',').unwrap();
        assert_eq!(dataset.raw.row_count(), 1);
        assert!(dataset.publications.is_empty());
        assert_eq!(dataset.skipped_rows, 1);
    }

    #[test]
    fn test_ragged_rows_are_an_error() {
        let sample = "A,B,C\n1,2\n";
        assert!(Dataset::from_csv_bytes(sample.as_bytes(), b',').is_err());
    }

    #[test]
    fn test_sniff_delimiter_from_file_name() {
        assert_eq!(sniff_delimiter("data/pubs.csv"), b',');
        assert_eq!(sniff_delimiter("data/pubs.TSV"), b'\t');
        assert_eq!(sniff_delimiter("data/pubs_pipe_separated.txt"), b'|');
        assert_eq!(sniff_delimiter("data/pubs.psv"), b'|');
    }

    #[test]
    fn test_clean_csv_quotes_only_where_needed() {
        let dataset = Dataset::from_csv_bytes(SAMPLE.as_bytes(), b',').unwrap();
        let clean = String::from_utf8(dataset.clean_csv_bytes().unwrap()).unwrap();
        assert!(clean.starts_with("Title,Authors,Year"));
        assert!(clean.contains("\"Graph networks, spatially resolved\""));
        assert!(clean.contains("Sequence model survey,Wu Q,2021"));
    }
}
