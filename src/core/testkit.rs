//! Shared in-memory test doubles for the pipeline tests.

use crate::core::{ConfigProvider, Storage};
use crate::domain::model::ExportFormat;
use crate::utils::error::{EtlError, Result};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

pub(crate) const FIXTURE: &str = "\
Title,Authors,Year,Journal_Conference,DOI_URL,Database_source,Inclusion_Exclusion_decision,Reason_for_inclusion_exclusion,Abstract,Internal_Source_ID
\"Graph attention networks for spatial transcriptomics of cardiomyocytes\",\"Chen L; Park J\",2023,Nature Methods,https://doi.org/10.1000/a1,PubMed,Include,Novel GNN architecture with spatial integration,\"Spatially resolved transcriptomics of cardiac tissue, analyzed with graph attention.\",SRC_0001
Recurrent models for bulk RNA-seq,Wu Q,2021,Bioinformatics,https://doi.org/10.1000/a2,Scopus,Exclude,Bulk transcriptomics only,Bulk RNA sequencing analysis without spatial context.,SRC_0002
Transformer-based cell typing in heart sections,\"Garcia M; Tan W; Li K\",2024,Nature Communications,https://doi.org/10.1000/a3,Web of Science,Include,Strong empirical validation,Attention models segment cardiomyocytes across spatial omics slides.,SRC_0003
Deep learning review for cardiology,Smith A,2020,Circulation Research,https://doi.org/10.1000/a4,Embase,Exclude,Theoretical only,A survey without empirical evaluation.,SRC_0004
CNN preprint on liver spatial data,Novak P,2022,bioRxiv,https://doi.org/10.1101/b5,bioRxiv,Exclude,Non-cardiac tissue focus,Convolutional pipelines for hepatic spatial omics.,SRC_0005
GNN with insufficient methods,Reed T,2019,BMC Bioinformatics,https://doi.org/10.1000/a6,IEEE Xplore,Exclude,Insufficient methodology,Sparse description of training protocol.,SRC_0006
";

#[derive(Clone)]
pub(crate) struct MockStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockStorage {
    pub(crate) fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn get_file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub(crate) fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Storage for MockStorage {
    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned().ok_or_else(|| {
            EtlError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path),
            ))
        })
    }

    fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }
}

pub(crate) struct MockConfig {
    pub input_path: String,
    pub with_summary: bool,
    pub export: Vec<ExportFormat>,
    pub verify: bool,
    pub archive: bool,
}

impl MockConfig {
    pub(crate) fn new(input_path: &str) -> Self {
        Self {
            input_path: input_path.to_string(),
            with_summary: true,
            export: vec![],
            verify: true,
            archive: false,
        }
    }
}

impl ConfigProvider for MockConfig {
    fn input_path(&self) -> &str {
        &self.input_path
    }

    fn output_path(&self) -> &str {
        "./test-output"
    }

    fn display_rows(&self) -> usize {
        10
    }

    fn detail_records(&self) -> usize {
        2
    }

    fn with_summary(&self) -> bool {
        self.with_summary
    }

    fn export_formats(&self) -> &[ExportFormat] {
        &self.export
    }

    fn verify_exports(&self) -> bool {
        self.verify
    }

    fn archive_exports(&self) -> bool {
        self.archive
    }
}

/// Writes the fixture dataset to a temp file with a .csv suffix.
pub(crate) fn fixture_file() -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(FIXTURE.as_bytes()).unwrap();
    file
}
