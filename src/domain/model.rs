use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// 資料集的標準欄位順序，與發表文獻篩選表一致
pub const DATASET_COLUMNS: [&str; 10] = [
    "Title",
    "Authors",
    "Year",
    "Journal_Conference",
    "DOI_URL",
    "Database_source",
    "Inclusion_Exclusion_decision",
    "Reason_for_inclusion_exclusion",
    "Abstract",
    "Internal_Source_ID",
];

/// The columns shown in compact preview tables.
pub const KEY_COLUMNS: [&str; 5] = [
    "Title",
    "Authors",
    "Year",
    "Journal_Conference",
    "Inclusion_Exclusion_decision",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    Include,
    Exclude,
}

impl FromStr for Decision {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "include" | "included" => Ok(Decision::Include),
            "exclude" | "excluded" => Ok(Decision::Exclude),
            other => Err(EtlError::ProcessingError {
                message: format!("Unknown screening decision: '{}'", other),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for Decision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Include => write!(f, "Include"),
            Decision::Exclude => write!(f, "Exclude"),
        }
    }
}

/// 一筆已型別化的發表紀錄，欄位名稱對應資料集的標頭
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Authors")]
    pub authors: String,
    #[serde(rename = "Year")]
    pub year: u16,
    #[serde(rename = "Journal_Conference")]
    pub venue: String,
    #[serde(rename = "DOI_URL")]
    pub doi_url: String,
    #[serde(rename = "Database_source")]
    pub source: String,
    #[serde(rename = "Inclusion_Exclusion_decision")]
    pub decision: Decision,
    #[serde(rename = "Reason_for_inclusion_exclusion")]
    pub reason: String,
    #[serde(rename = "Abstract")]
    pub abstract_text: String,
    #[serde(rename = "Internal_Source_ID")]
    pub source_id: String,
}

/// Schemaless view of a delimited file. The header row defines the columns;
/// every data row has exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column_values(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    pub fn head(&self, n: usize) -> &[Vec<String>] {
        &self.rows[..self.rows.len().min(n)]
    }

    /// 以空值或 NA 類記號計算每個欄位的缺漏數
    pub fn missing_per_column(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let missing = self
                    .rows
                    .iter()
                    .filter(|row| is_missing_cell(&row[idx]))
                    .count();
                (col.clone(), missing)
            })
            .collect()
    }

    /// Infers a coarse kind per column: "numeric" when every non-missing cell
    /// parses as a number, otherwise "text".
    pub fn column_kinds(&self) -> Vec<(String, &'static str)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let mut seen_value = false;
                let numeric = self.rows.iter().all(|row| {
                    let cell = row[idx].trim();
                    if is_missing_cell(cell) {
                        return true;
                    }
                    seen_value = true;
                    cell.parse::<f64>().is_ok()
                });
                let kind = if numeric && seen_value { "numeric" } else { "text" };
                (col.clone(), kind)
            })
            .collect()
    }

    /// Projects the table onto the given column indices, preserving their order.
    /// Returns `None` when any index is out of range.
    pub fn select_columns(&self, indices: &[usize]) -> Option<RawTable> {
        if indices.iter().any(|&i| i >= self.columns.len()) {
            return None;
        }
        let columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Some(RawTable { columns, rows })
    }
}

fn is_missing_cell(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("na")
        || trimmed.eq_ignore_ascii_case("n/a")
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("null")
}

/// 管道輸出的單一檔案
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn text(name: impl Into<String>, content: String) -> Self {
        Self::new(name, content.into_bytes())
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub processed_records: usize,
    pub report: String,
    pub artifacts: Vec<Artifact>,
}

/// Target file formats for the export fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Tsv,
    Pipe,
    Excel,
    Json,
}

impl ExportFormat {
    pub fn all() -> [ExportFormat; 5] {
        [
            ExportFormat::Csv,
            ExportFormat::Tsv,
            ExportFormat::Pipe,
            ExportFormat::Excel,
            ExportFormat::Json,
        ]
    }

    /// 分隔字元；JSON 匯出沒有分隔字元
    pub fn delimiter(&self) -> Option<u8> {
        match self {
            ExportFormat::Csv | ExportFormat::Excel => Some(b','),
            ExportFormat::Tsv => Some(b'\t'),
            ExportFormat::Pipe => Some(b'|'),
            ExportFormat::Json => None,
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "properly_formatted_publications.csv",
            ExportFormat::Tsv => "properly_formatted_publications.tsv",
            ExportFormat::Pipe => "publications_pipe_separated.txt",
            ExportFormat::Excel => "publications_excel_compatible.csv",
            ExportFormat::Json => "properly_formatted_publications.json",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "comma-separated",
            ExportFormat::Tsv => "tab-separated",
            ExportFormat::Pipe => "pipe-separated",
            ExportFormat::Excel => "UTF-8 BOM, CRLF line endings",
            ExportFormat::Json => "JSON records",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | "comma" => Ok(ExportFormat::Csv),
            "tsv" | "tab" => Ok(ExportFormat::Tsv),
            "pipe" | "psv" => Ok(ExportFormat::Pipe),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "json" => Ok(ExportFormat::Json),
            other => Err(EtlError::InvalidConfigValueError {
                field: "export".to_string(),
                value: other.to_string(),
                reason: "Unsupported format. Valid formats: csv, tsv, pipe, excel, json".to_string(),
            }),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Pipe => "pipe",
            ExportFormat::Excel => "excel",
            ExportFormat::Json => "json",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> RawTable {
        RawTable {
            columns: vec!["Title".to_string(), "Year".to_string(), "DOI_URL".to_string()],
            rows: vec![
                vec!["First study".to_string(), "2021".to_string(), "".to_string()],
                vec!["Second study".to_string(), "2022".to_string(), "10.1/x".to_string()],
                vec!["Third study".to_string(), "NA".to_string(), "10.1/y".to_string()],
            ],
        }
    }

    #[test]
    fn test_decision_parsing_is_case_insensitive() {
        assert_eq!("Include".parse::<Decision>().unwrap(), Decision::Include);
        assert_eq!("EXCLUDE".parse::<Decision>().unwrap(), Decision::Exclude);
        assert_eq!(" included ".parse::<Decision>().unwrap(), Decision::Include);
        assert!("maybe".parse::<Decision>().is_err());
    }

    #[test]
    fn test_missing_per_column_counts_na_markers() {
        let table = sample_table();
        let missing = table.missing_per_column();
        assert_eq!(missing[0], ("Title".to_string(), 0));
        assert_eq!(missing[1], ("Year".to_string(), 1));
        assert_eq!(missing[2], ("DOI_URL".to_string(), 1));
    }

    #[test]
    fn test_column_kinds_infers_numeric_year() {
        let table = sample_table();
        let kinds = table.column_kinds();
        assert_eq!(kinds[0].1, "text");
        assert_eq!(kinds[1].1, "numeric"); // NA cells do not break numeric inference
        assert_eq!(kinds[2].1, "text");
    }

    #[test]
    fn test_select_columns_projects_and_validates() {
        let table = sample_table();
        let selected = table.select_columns(&[2, 0]).unwrap();
        assert_eq!(selected.columns, vec!["DOI_URL", "Title"]);
        assert_eq!(selected.rows[1], vec!["10.1/x", "Second study"]);
        assert!(table.select_columns(&[0, 9]).is_none());
    }

    #[test]
    fn test_export_format_round_trip_names() {
        for format in ExportFormat::all() {
            let parsed: ExportFormat = format.to_string().parse().unwrap();
            assert_eq!(parsed, format);
        }
        assert_eq!("tab".parse::<ExportFormat>().unwrap(), ExportFormat::Tsv);
        assert!("parquet".parse::<ExportFormat>().is_err());
    }
}
