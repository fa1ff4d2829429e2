use std::path::Path;
use sysrev_etl::domain::model::ExportFormat;
use sysrev_etl::utils::error::{ErrorSeverity, EtlError};
use sysrev_etl::{CliConfig, DatasetPipeline, EtlEngine, ExportPipeline, LocalStorage};
use tempfile::TempDir;

const FIXTURE: &str = "\
Title,Authors,Year,Journal_Conference,DOI_URL,Database_source,Inclusion_Exclusion_decision,Reason_for_inclusion_exclusion,Abstract,Internal_Source_ID
Spatial graph networks chart cardiomyocyte niches,Chen L; Ortiz P,2022,Nature Methods,https://doi.org/10.1038/nm.2201,PubMed,Include,Novel GNN on spatial transcriptomics,Graph neural networks resolve cardiomyocyte microenvironments in spatial transcriptomics.,SRC_0001
Attention models for myocardial gene programs,Okafor D,2023,Nature Communications,https://doi.org/10.1038/nc.3401,Web of Science,Include,Attention mechanism with spatial integration,Transformer attention highlights regional gene programs across the myocardium.,SRC_0002
A survey of sequence models in cardiology,Ruiz M; Tan W,2021,Bioinformatics,https://doi.org/10.1093/bio.1101,Scopus,Exclude,Review without empirical evaluation,We survey recurrent architectures applied to cardiac datasets.,SRC_0003
Bulk RNA-seq of failing hearts,Nguyen H,2019,Circulation Research,https://doi.org/10.1161/cr.0901,Embase,Exclude,\"Bulk transcriptomics only, no spatial resolution\",Differential expression analysis of bulk RNA-seq in heart failure cohorts.,SRC_0004
Contrastive learning on spatial omics tiles,Silva J,2024,bioRxiv,https://doi.org/10.1101/2024.01,bioRxiv,Exclude,\"Preliminary results, not peer reviewed\",Contrastive embeddings for spatial omics tiles evaluated on murine heart sections.,SRC_0005
Edge deployment of CNN segmenters,Park S; Gupta A,2020,IEEE Xplore Proceedings,https://doi.org/10.1109/ix.5501,IEEE Xplore,Exclude,Non-cardiac focus,CNN segmentation pipelines deployed on embedded hardware.,SRC_0006
";

fn write_fixture(dir: &TempDir) -> String {
    let path = dir.path().join("publications.csv");
    std::fs::write(&path, FIXTURE).unwrap();
    path.to_str().unwrap().to_string()
}

fn base_config(input_path: String, output_path: String) -> CliConfig {
    CliConfig {
        input_path,
        output_path,
        display_rows: 10,
        detail_records: 2,
        no_summary: false,
        export: vec![],
        no_verify: false,
        archive: false,
        verbose: false,
        monitor: false,
    }
}

#[test]
fn test_end_to_end_dataset_report() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let output_path = output_dir.path().to_str().unwrap().to_string();
    let config = base_config(write_fixture(&input_dir), output_path.clone());

    // Create storage and pipeline
    let storage = LocalStorage::new(output_path.clone());
    let pipeline = DatasetPipeline::new(storage, config);

    // Create and run ETL engine
    let engine = EtlEngine::new_with_monitoring(pipeline, false);
    let result = engine.run();

    assert!(result.is_ok());
    let output_file_path = result.unwrap();
    assert!(output_file_path.contains("dataset_report.txt"));

    let report =
        std::fs::read_to_string(Path::new(&output_path).join("dataset_report.txt")).unwrap();
    assert!(report.contains("📄 FILE ANALYSIS"));
    assert!(report.contains("Rows: 6"));
    assert!(report.contains("Columns: 10"));
    assert!(report.contains("🔑 KEY COLUMNS"));
    assert!(report.contains("📖 RECORD DETAILS (first 2 of 6)"));
    assert!(report.contains("📊 DATASET SUMMARY"));
    assert!(report.contains("Included: 2 (33.3%)"));
    assert!(report.contains("Preprints (bioRxiv): 1"));

    // The cleaned CSV keeps every typed record
    let clean =
        std::fs::read_to_string(Path::new(&output_path).join("cleaned_publications.csv")).unwrap();
    assert!(clean.starts_with("Title,Authors,Year"));
    assert_eq!(clean.lines().count(), 7); // header + 6 records
}

#[test]
fn test_summary_can_be_skipped() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let output_path = output_dir.path().to_str().unwrap().to_string();
    let mut config = base_config(write_fixture(&input_dir), output_path.clone());
    config.no_summary = true;

    let storage = LocalStorage::new(output_path.clone());
    let pipeline = DatasetPipeline::new(storage, config);
    let engine = EtlEngine::new(pipeline);

    assert!(engine.run().is_ok());
    let report =
        std::fs::read_to_string(Path::new(&output_path).join("dataset_report.txt")).unwrap();
    assert!(!report.contains("DATASET SUMMARY"));
    assert!(report.contains("FILE ANALYSIS"));
}

#[test]
fn test_export_produces_every_requested_format() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let output_path = output_dir.path().to_str().unwrap().to_string();
    let mut config = base_config(write_fixture(&input_dir), output_path.clone());
    config.export = ExportFormat::all().to_vec();

    let storage = LocalStorage::new(output_path.clone());
    let pipeline = ExportPipeline::new(storage, config);
    let engine = EtlEngine::new(pipeline);

    let result = engine.run();
    assert!(result.is_ok());
    assert!(result.unwrap().contains("properly_formatted_publications.csv"));

    // Plain CSV: no BOM, LF line endings
    let csv_bytes =
        std::fs::read(Path::new(&output_path).join("properly_formatted_publications.csv")).unwrap();
    assert!(!csv_bytes.starts_with(b"\xef\xbb\xbf"));
    assert!(csv_bytes.starts_with(b"Title,Authors,Year"));

    // Tab variant uses the same stem with a .tsv extension
    let tsv = std::fs::read_to_string(
        Path::new(&output_path).join("properly_formatted_publications.tsv"),
    )
    .unwrap();
    assert!(tsv.starts_with("Title\tAuthors\tYear"));

    // Pipe variant
    let pipe = std::fs::read_to_string(
        Path::new(&output_path).join("publications_pipe_separated.txt"),
    )
    .unwrap();
    assert!(pipe.starts_with("Title|Authors|Year"));

    // Spreadsheet variant carries a UTF-8 BOM and CRLF line endings
    let excel_bytes =
        std::fs::read(Path::new(&output_path).join("publications_excel_compatible.csv")).unwrap();
    assert!(excel_bytes.starts_with(b"\xef\xbb\xbf"));
    assert!(excel_bytes.windows(2).any(|w| w == b"\r\n"));

    // JSON keeps the original column names as keys
    let json_bytes =
        std::fs::read(Path::new(&output_path).join("properly_formatted_publications.json"))
            .unwrap();
    let values: Vec<serde_json::Value> = serde_json::from_slice(&json_bytes).unwrap();
    assert_eq!(values.len(), 6);
    assert_eq!(
        values[0]["Title"],
        "Spatial graph networks chart cardiomyocyte niches"
    );
    assert_eq!(values[0]["Database_source"], "PubMed");
}

#[test]
fn test_export_archive_bundles_all_formats() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let output_path = output_dir.path().to_str().unwrap().to_string();
    let mut config = base_config(write_fixture(&input_dir), output_path.clone());
    config.export = ExportFormat::all().to_vec();
    config.archive = true;

    let storage = LocalStorage::new(output_path.clone());
    let pipeline = ExportPipeline::new(storage, config);
    let engine = EtlEngine::new(pipeline);

    let result = engine.run();
    assert!(result.is_ok());
    let output_file_path = result.unwrap();
    assert!(output_file_path.contains("publication_exports.zip"));

    // Verify ZIP content
    let full_path = Path::new(&output_path).join("publication_exports.zip");
    assert!(full_path.exists());
    let zip_data = std::fs::read(&full_path).unwrap();
    let cursor = std::io::Cursor::new(zip_data);
    let archive = zip::ZipArchive::new(cursor).unwrap();

    assert_eq!(archive.len(), 5);
    let file_names: Vec<&str> = archive.file_names().collect();
    assert!(file_names.contains(&"properly_formatted_publications.csv"));
    assert!(file_names.contains(&"publications_excel_compatible.csv"));
    assert!(file_names.contains(&"properly_formatted_publications.json"));
}

#[test]
fn test_missing_input_is_a_config_error() {
    let output_dir = TempDir::new().unwrap();
    let output_path = output_dir.path().to_str().unwrap().to_string();
    let config = base_config("./no-such-publications.csv".to_string(), output_path.clone());

    let storage = LocalStorage::new(output_path);
    let pipeline = DatasetPipeline::new(storage, config);
    let engine = EtlEngine::new(pipeline);

    let err = engine.run().unwrap_err();
    assert!(matches!(err, EtlError::ConfigError { .. }));
    assert_eq!(err.severity(), ErrorSeverity::Medium);
}

#[test]
fn test_rows_with_implausible_years_are_skipped() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let output_path = output_dir.path().to_str().unwrap().to_string();

    let mut fixture = FIXTURE.to_string();
    fixture.push_str(
        "Ancient manuscript on heart anatomy,Unknown,1492,Archives,none,PubMed,Exclude,Out of scope,Historical anatomy text.,SRC_0007\n",
    );
    let input_path = input_dir.path().join("publications.csv");
    std::fs::write(&input_path, fixture).unwrap();

    let config = base_config(
        input_path.to_str().unwrap().to_string(),
        output_path.clone(),
    );
    let storage = LocalStorage::new(output_path.clone());
    let pipeline = DatasetPipeline::new(storage, config);
    let engine = EtlEngine::new(pipeline);

    assert!(engine.run().is_ok());
    let report =
        std::fs::read_to_string(Path::new(&output_path).join("dataset_report.txt")).unwrap();
    assert!(report.contains("Rows: 7"));
    assert!(report.contains("⚠️ Skipped 1 rows that could not be typed"));

    // Only the 6 typed records survive into the cleaned CSV
    let clean =
        std::fs::read_to_string(Path::new(&output_path).join("cleaned_publications.csv")).unwrap();
    assert_eq!(clean.lines().count(), 7);
}
