use crate::core::{ConfigProvider, Pipeline, Storage, TransformResult};
use crate::domain::dataset::Dataset;
use crate::domain::model::{Artifact, Decision, Publication, KEY_COLUMNS};
use crate::domain::stats;
use crate::domain::table::{fill, render_table, truncate};
use crate::utils::error::Result;

/// 資料集報告管道：讀取篩選表、輸出格式化報告與清理後的 CSV
pub struct DatasetPipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
}

impl<S: Storage, C: ConfigProvider> DatasetPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }
}

impl<S: Storage, C: ConfigProvider> Pipeline for DatasetPipeline<S, C> {
    type Extracted = Dataset;

    fn extract(&self) -> Result<Dataset> {
        tracing::debug!("🔍 Reading dataset from: {}", self.config.input_path());
        let dataset = Dataset::from_path(self.config.input_path())?;
        tracing::debug!(
            "📥 Loaded {} rows ({} typed, {} skipped)",
            dataset.raw.row_count(),
            dataset.publications.len(),
            dataset.skipped_rows
        );
        Ok(dataset)
    }

    fn transform(&self, dataset: Dataset) -> Result<TransformResult> {
        let mut sections = vec![
            file_analysis_section(&dataset),
            head_table_section(&dataset, 5),
            key_columns_section(&dataset, self.config.display_rows()),
            detail_section(&dataset, self.config.detail_records()),
        ];
        if self.config.with_summary() {
            sections.push(summary_section(&dataset));
        }
        let report = compose_report(&sections);

        let artifacts = vec![
            Artifact::text("dataset_report.txt", report.clone()),
            Artifact::new("cleaned_publications.csv", dataset.clean_csv_bytes()?),
        ];

        Ok(TransformResult {
            processed_records: dataset.raw.row_count(),
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
        Ok(format!("{}/dataset_report.txt", self.config.output_path()))
    }
}

/// Joins report sections with blank lines, trimming stray trailing newlines.
pub fn compose_report(sections: &[String]) -> String {
    sections
        .iter()
        .map(|s| s.trim_end())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 檔案結構總覽：列數、欄位型別與缺漏值
pub fn file_analysis_section(dataset: &Dataset) -> String {
    let mut out = String::new();
    out.push_str("📄 FILE ANALYSIS\n");
    out.push_str(&format!("Rows: {}\n", dataset.raw.row_count()));
    out.push_str(&format!("Columns: {}\n", dataset.raw.column_count()));
    out.push_str("Column overview:\n");
    for (idx, (name, kind)) in dataset.raw.column_kinds().iter().enumerate() {
        out.push_str(&format!("  {:>2}. {} ({})\n", idx + 1, name, kind));
    }

    let missing: Vec<(String, usize)> = dataset
        .raw
        .missing_per_column()
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .collect();
    if missing.is_empty() {
        out.push_str("Missing values: none\n");
    } else {
        let formatted: Vec<String> = missing
            .iter()
            .map(|(name, count)| format!("{}: {}", name, count))
            .collect();
        out.push_str(&format!("Missing values: {}\n", formatted.join(", ")));
    }

    if dataset.skipped_rows > 0 {
        out.push_str(&format!(
            "⚠️ Skipped {} rows that could not be typed\n",
            dataset.skipped_rows
        ));
    }
    out
}

pub fn head_table_section(dataset: &Dataset, rows: usize) -> String {
    let shown = dataset.raw.head(rows);
    format!(
        "📋 FIRST {} ROWS (all columns)\n{}",
        shown.len(),
        render_table(&dataset.raw.columns, shown, 18)
    )
}

/// 核心欄位預覽；缺少標準欄位時退回提示訊息
pub fn key_columns_section(dataset: &Dataset, rows: usize) -> String {
    let indices: Vec<usize> = KEY_COLUMNS
        .iter()
        .filter_map(|name| dataset.raw.column_index(name))
        .collect();
    if indices.is_empty() {
        return "🔑 KEY COLUMNS\nNone of the standard screening columns are present\n".to_string();
    }
    match dataset.raw.select_columns(&indices) {
        Some(selected) => format!(
            "🔑 KEY COLUMNS\n{}",
            render_table(&selected.columns, selected.head(rows), 40)
        ),
        None => "🔑 KEY COLUMNS\nNone of the standard screening columns are present\n".to_string(),
    }
}

fn detail_field(label: &str, value: &str) -> String {
    format!("  {:<10}{}\n", label, fill(value, 75, 12))
}

pub fn detail_section(dataset: &Dataset, count: usize) -> String {
    let shown = dataset.publications.len().min(count);
    let mut out = format!(
        "📖 RECORD DETAILS (first {} of {})\n",
        shown,
        dataset.publications.len()
    );
    for (idx, publication) in dataset.publications.iter().take(count).enumerate() {
        out.push('\n');
        out.push_str(&format!("Record {}\n", idx + 1));
        out.push_str(&detail_field("Title:", &publication.title));
        out.push_str(&detail_field("Authors:", &publication.authors));
        out.push_str(&detail_field("Year:", &publication.year.to_string()));
        out.push_str(&detail_field("Venue:", &publication.venue));
        out.push_str(&detail_field("DOI/URL:", &publication.doi_url));
        out.push_str(&detail_field("Source:", &publication.source));
        out.push_str(&detail_field("Decision:", &publication.decision.to_string()));
        out.push_str(&detail_field("Reason:", &publication.reason));
        out.push_str(&detail_field(
            "Abstract:",
            &truncate(&publication.abstract_text, 200),
        ));
        out.push_str(&detail_field("ID:", &publication.source_id));
    }
    out
}

/// 統計摘要：納入率、年份分布、來源、期刊與篩選原因
pub fn summary_section(dataset: &Dataset) -> String {
    let publications = &dataset.publications;
    let mut out = String::new();
    out.push_str("📊 DATASET SUMMARY\n");

    if publications.is_empty() {
        out.push_str("No typed records to summarize\n");
        return out;
    }

    let (included, excluded) = stats::decision_counts(publications);
    let total = publications.len();
    out.push('\n');
    out.push_str("Overview:\n");
    out.push_str(&format!("  Total publications: {}\n", total));
    out.push_str(&format!(
        "  Included: {} ({:.1}%)\n",
        included,
        stats::inclusion_rate(publications)
    ));
    out.push_str(&format!(
        "  Excluded: {} ({:.1}%)\n",
        excluded,
        100.0 - stats::inclusion_rate(publications)
    ));

    out.push('\n');
    out.push_str("Temporal coverage:\n");
    for (year, count) in stats::year_distribution(publications) {
        out.push_str(&format!("  {}: {}\n", year, count));
    }
    if let Some(years) = stats::year_stats(publications) {
        out.push_str(&format!(
            "  Range: {}-{}, mean {:.1}\n",
            years.min, years.max, years.mean
        ));
    }
    out.push_str(&format!(
        "  Published 2020 or later: {}\n",
        stats::recent_count(publications, 2020)
    ));

    out.push('\n');
    out.push_str("Database sources:\n");
    for (source, count) in stats::database_sources(publications) {
        out.push_str(&format!("  {}: {}\n", source, count));
    }

    out.push('\n');
    out.push_str("Top venues:\n");
    for (rank, (venue, count)) in stats::top_venues(publications, 10).iter().enumerate() {
        out.push_str(&format!("  {:>2}. {}: {}\n", rank + 1, venue, count));
    }

    out.push('\n');
    out.push_str("Screening reasons:\n");
    for decision in [Decision::Include, Decision::Exclude] {
        out.push_str(&format!("  {}:\n", decision));
        for (reason, count) in stats::reason_breakdown(publications, decision, 5) {
            out.push_str(&format!("    - {}: {}\n", truncate(&reason, 60), count));
        }
    }

    out.push('\n');
    out.push_str("Research impact:\n");
    out.push_str(&format!(
        "  High-impact venue records: {}\n",
        stats::high_impact_count(publications)
    ));
    out.push_str(&format!(
        "  Preprints (bioRxiv): {}\n",
        stats::preprint_count(publications)
    ));
    out.push_str(&format!(
        "  Unique venues: {}\n",
        stats::unique_venue_count(publications)
    ));
    out
}

/// 互動瀏覽用的紀錄過濾條件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFilter {
    Included,
    Excluded,
    Recent,
}

impl RecordFilter {
    pub fn label(&self) -> &'static str {
        match self {
            RecordFilter::Included => "Included records",
            RecordFilter::Excluded => "Excluded records",
            RecordFilter::Recent => "Published 2020 or later",
        }
    }

    pub fn matches(&self, publication: &Publication) -> bool {
        match self {
            RecordFilter::Included => publication.decision == Decision::Include,
            RecordFilter::Excluded => publication.decision == Decision::Exclude,
            RecordFilter::Recent => publication.year >= 2020,
        }
    }
}

pub fn filtered_section(dataset: &Dataset, filter: RecordFilter, max_rows: usize) -> String {
    let matching: Vec<&Publication> = dataset
        .publications
        .iter()
        .filter(|p| filter.matches(p))
        .collect();

    let mut out = format!(
        "🔍 FILTERED VIEW: {} ({} records)\n",
        filter.label(),
        matching.len()
    );
    if matching.is_empty() {
        out.push_str("No matching records\n");
        return out;
    }

    let columns: Vec<String> = vec![
        "Title".to_string(),
        "Authors".to_string(),
        "Year".to_string(),
        "Journal_Conference".to_string(),
        "Decision".to_string(),
    ];
    let rows: Vec<Vec<String>> = matching
        .iter()
        .take(max_rows)
        .map(|p| {
            vec![
                p.title.clone(),
                p.authors.clone(),
                p.year.to_string(),
                p.venue.clone(),
                p.decision.to_string(),
            ]
        })
        .collect();
    out.push_str(&render_table(&columns, &rows, 40));
    if matching.len() > rows.len() {
        out.push_str(&format!(
            "Showing {} of {} matching records\n",
            rows.len(),
            matching.len()
        ));
    }
    out
}
