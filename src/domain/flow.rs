//! PRISMA flow model: phase targets, exclusion breakdowns and the report
//! structure rendered as JSON, CSV summaries and an ASCII flowchart.

use crate::domain::agreement::AgreementStats;
use crate::domain::synthesis::StudyCharacteristics;
use crate::utils::error::{EtlError, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// 篩選流程四個階段的目標數字
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowTargets {
    pub initial_records: u64,
    pub title_abstract_excluded: u64,
    pub full_text_excluded: u64,
    pub final_included: u64,
}

impl Default for FlowTargets {
    fn default() -> Self {
        Self {
            initial_records: 462,
            title_abstract_excluded: 60,
            full_text_excluded: 314,
            final_included: 88,
        }
    }
}

impl FlowTargets {
    pub fn after_title_abstract(&self) -> Option<u64> {
        self.initial_records.checked_sub(self.title_abstract_excluded)
    }

    pub fn total_excluded(&self) -> u64 {
        self.title_abstract_excluded + self.full_text_excluded
    }

    /// The phase counts must chain: initial - excluded at each stage lands
    /// exactly on the final included count.
    pub fn is_consistent(&self) -> bool {
        self.after_title_abstract()
            .and_then(|after| after.checked_sub(self.full_text_excluded))
            == Some(self.final_included)
    }

    pub fn exclusion_ratio(&self) -> f64 {
        if self.initial_records == 0 {
            return 0.0;
        }
        self.total_excluded() as f64 / self.initial_records as f64
    }

    pub fn inclusion_rate_percent(&self) -> f64 {
        if self.initial_records == 0 {
            return 0.0;
        }
        self.final_included as f64 / self.initial_records as f64 * 100.0
    }
}

/// One exclusion reason with its tally. TOML configs list these as
/// `[[screening.title_abstract]]` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: u64,
}

/// Ordered exclusion reasons for one screening phase. Serialized as a JSON
/// object so readers see `{"reason": count, ...}` in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExclusionBreakdown {
    reasons: Vec<ReasonCount>,
}

impl ExclusionBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        Self {
            reasons: counts
                .into_iter()
                .map(|(reason, count)| ReasonCount {
                    reason: reason.into(),
                    count,
                })
                .collect(),
        }
    }

    /// Adds to an existing reason or appends a new one at the end.
    pub fn add(&mut self, reason: &str, count: u64) {
        if let Some(entry) = self.reasons.iter_mut().find(|r| r.reason == reason) {
            entry.count += count;
        } else {
            self.reasons.push(ReasonCount {
                reason: reason.to_string(),
                count,
            });
        }
    }

    pub fn total(&self) -> u64 {
        self.reasons.iter().map(|r| r.count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReasonCount> {
        self.reasons.iter()
    }

    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }
}

impl From<Vec<ReasonCount>> for ExclusionBreakdown {
    fn from(reasons: Vec<ReasonCount>) -> Self {
        Self { reasons }
    }
}

impl Serialize for ExclusionBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.reasons.len()))?;
        for entry in &self.reasons {
            map.serialize_entry(&entry.reason, &entry.count)?;
        }
        map.end()
    }
}

/// Baseline title/abstract exclusion reasons (sums to 60).
pub fn default_title_abstract_reasons() -> Vec<ReasonCount> {
    [
        ("duplicate_methodologies", 10),
        ("insufficient_deep_learning", 10),
        ("preliminary_results", 8),
        ("no_spatial_resolution", 7),
        ("non_cardiac_focus", 6),
        ("insufficient_methodology", 6),
        ("small_sample_sizes", 4),
        ("theoretical_only", 4),
        ("other_reasons", 5),
    ]
    .into_iter()
    .map(|(reason, count)| ReasonCount {
        reason: reason.to_string(),
        count,
    })
    .collect()
}

/// Baseline full-text exclusion reasons (sums to 314).
pub fn default_full_text_reasons() -> Vec<ReasonCount> {
    [
        ("not_cardiomyocyte_focused", 95),
        ("methodological_overlap_redundancy", 85),
        ("insufficient_reproducibility", 60),
        ("bulk_transcriptomics_only", 45),
        ("no_spatial_integration", 29),
    ]
    .into_iter()
    .map(|(reason, count)| ReasonCount {
        reason: reason.to_string(),
        count,
    })
    .collect()
}

/// "snake_case_reason" → "Snake Case Reason" for display.
pub fn reason_label(reason: &str) -> String {
    reason
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Serialize)]
pub struct StudyInfo {
    pub name: String,
    pub focus: String,
    pub date_range: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentificationSection {
    pub records_identified: u64,
    pub databases_searched: Vec<String>,
    pub search_strategy: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreeningSection {
    pub records_screened: u64,
    pub records_excluded: u64,
    pub exclusion_reasons: ExclusionBreakdown,
    pub inter_rater_reliability: AgreementStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct EligibilitySection {
    pub full_text_assessed: u64,
    pub full_text_excluded: u64,
    pub exclusion_reasons: ExclusionBreakdown,
    pub inclusion_criteria: Vec<String>,
    pub exclusion_criteria: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncludedSection {
    pub studies_included: u64,
    pub inclusion_rate_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_characteristics: Option<StudyCharacteristics>,
}

/// 完整的 PRISMA 流程報告，可序列化為 JSON 並渲染為文字
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub generated_at: String,
    pub study: StudyInfo,
    pub identification: IdentificationSection,
    pub screening: ScreeningSection,
    pub eligibility: EligibilitySection,
    pub included: IncludedSection,
}

impl FlowReport {
    /// Checks the arithmetic of the whole flow: breakdown totals match their
    /// phase counts and the counts chain down to the included total.
    pub fn validate(&self) -> Result<()> {
        let screening_total = self.screening.exclusion_reasons.total();
        if screening_total != self.screening.records_excluded {
            return Err(EtlError::ValidationError {
                message: format!(
                    "Title/abstract exclusion reasons sum to {} but {} records were excluded",
                    screening_total, self.screening.records_excluded
                ),
            });
        }
        let eligibility_total = self.eligibility.exclusion_reasons.total();
        if eligibility_total != self.eligibility.full_text_excluded {
            return Err(EtlError::ValidationError {
                message: format!(
                    "Full-text exclusion reasons sum to {} but {} records were excluded",
                    eligibility_total, self.eligibility.full_text_excluded
                ),
            });
        }
        let after_screening = self
            .screening
            .records_screened
            .checked_sub(self.screening.records_excluded);
        if after_screening != Some(self.eligibility.full_text_assessed) {
            return Err(EtlError::ValidationError {
                message: "Records assessed full-text do not match records surviving screening"
                    .to_string(),
            });
        }
        let after_eligibility = self
            .eligibility
            .full_text_assessed
            .checked_sub(self.eligibility.full_text_excluded);
        if after_eligibility != Some(self.included.studies_included) {
            return Err(EtlError::ValidationError {
                message: "Included studies do not match records surviving full-text assessment"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Phase-by-phase narrative for the console report.
    pub fn narrative(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Study: {}\n", self.study.name));
        out.push_str(&format!("Focus: {}\n", self.study.focus));
        out.push_str(&format!("Search window: {}\n", self.study.date_range));
        out.push('\n');

        out.push_str("📍 PHASE 1: IDENTIFICATION\n");
        out.push_str(&format!(
            "Records identified through database searching: {}\n",
            self.identification.records_identified
        ));
        out.push_str(&format!(
            "Databases searched ({}): {}\n",
            self.identification.databases_searched.len(),
            self.identification.databases_searched.join(", ")
        ));
        out.push_str(&format!(
            "Search strategy: {}\n",
            self.identification.search_strategy
        ));
        out.push('\n');

        out.push_str("📍 PHASE 2: TITLE/ABSTRACT SCREENING\n");
        out.push_str(&format!(
            "Records screened: {}\n",
            self.screening.records_screened
        ));
        out.push_str(&format!(
            "Records excluded: {}\n",
            self.screening.records_excluded
        ));
        out.push_str("Exclusion reasons:\n");
        for entry in self.screening.exclusion_reasons.iter() {
            out.push_str(&format!(
                "  - {}: {}\n",
                reason_label(&entry.reason),
                entry.count
            ));
        }
        let reliability = &self.screening.inter_rater_reliability;
        out.push_str(&format!(
            "Inter-rater reliability: κ = {:.3} ({})\n",
            reliability.cohens_kappa, reliability.interpretation
        ));
        out.push('\n');

        out.push_str("📍 PHASE 3: FULL-TEXT ELIGIBILITY\n");
        out.push_str(&format!(
            "Full-text articles assessed: {}\n",
            self.eligibility.full_text_assessed
        ));
        out.push_str(&format!(
            "Full-text articles excluded: {}\n",
            self.eligibility.full_text_excluded
        ));
        out.push_str("Exclusion reasons:\n");
        let initial = self.identification.records_identified.max(1) as f64;
        for entry in self.eligibility.exclusion_reasons.iter() {
            out.push_str(&format!(
                "  - {}: {} ({:.1}% of identified)\n",
                reason_label(&entry.reason),
                entry.count,
                entry.count as f64 / initial * 100.0
            ));
        }
        out.push('\n');

        out.push_str("📍 PHASE 4: INCLUDED\n");
        out.push_str(&format!(
            "Studies included in final synthesis: {}\n",
            self.included.studies_included
        ));
        out.push_str(&format!(
            "Overall inclusion rate: {:.1}%\n",
            self.included.inclusion_rate_percent
        ));
        out
    }

    /// ASCII flowchart of the selection process.
    pub fn flowchart(&self) -> String {
        let border = "=".repeat(80);
        let mut out = String::new();
        out.push_str(&border);
        out.push('\n');
        out.push_str(&format!("{:^80}\n", "PRISMA STUDY SELECTION FLOWCHART"));
        out.push_str(&format!("{:^80}\n", self.study.name));
        out.push_str(&border);
        out.push('\n');
        out.push('\n');

        out.push_str("IDENTIFICATION\n");
        out.push_str(&format!(
            "├─ Records identified through database searching: {}\n",
            self.identification.records_identified
        ));
        out.push_str(&format!(
            "│  Databases: {}\n",
            self.identification.databases_searched.join(", ")
        ));
        out.push_str("│\n");

        out.push_str("SCREENING (Title/Abstract)\n");
        out.push_str(&format!(
            "├─ Records screened: {}\n",
            self.screening.records_screened
        ));
        out.push_str(&format!(
            "├─ Records excluded: {}\n",
            self.screening.records_excluded
        ));
        let mut screening_reasons = self.screening.exclusion_reasons.iter().peekable();
        while let Some(entry) = screening_reasons.next() {
            let connector = if screening_reasons.peek().is_some() {
                "│  ├─"
            } else {
                "│  └─"
            };
            out.push_str(&format!(
                "{} {}: {}\n",
                connector,
                reason_label(&entry.reason),
                entry.count
            ));
        }
        out.push_str("│\n");

        out.push_str("ELIGIBILITY (Full-text)\n");
        out.push_str(&format!(
            "├─ Full-text articles assessed: {}\n",
            self.eligibility.full_text_assessed
        ));
        out.push_str(&format!(
            "├─ Full-text articles excluded: {}\n",
            self.eligibility.full_text_excluded
        ));
        let mut eligibility_reasons = self.eligibility.exclusion_reasons.iter().peekable();
        while let Some(entry) = eligibility_reasons.next() {
            let connector = if eligibility_reasons.peek().is_some() {
                "│  ├─"
            } else {
                "│  └─"
            };
            out.push_str(&format!(
                "{} {}: {}\n",
                connector,
                reason_label(&entry.reason),
                entry.count
            ));
        }
        out.push_str("│\n");

        out.push_str("INCLUDED\n");
        out.push_str(&format!(
            "└─ Studies included in final synthesis: {}\n",
            self.included.studies_included
        ));
        out.push('\n');

        let reliability = &self.screening.inter_rater_reliability;
        out.push_str("QUALITY ASSURANCE\n");
        out.push_str(&format!(
            "Inter-rater reliability (Cohen's kappa): {:.3} ({})\n",
            reliability.cohens_kappa, reliability.interpretation
        ));
        out.push_str(&format!(
            "Inclusion rate: {:.1}% of initially identified records\n",
            self.included.inclusion_rate_percent
        ));
        out.push_str(&border);
        out.push('\n');
        out
    }

    /// Per-phase counts as CSV rows, header first.
    pub fn summary_rows(&self) -> Vec<Vec<String>> {
        let screening_cumulative = self.screening.records_excluded;
        let eligibility_cumulative = screening_cumulative + self.eligibility.full_text_excluded;
        vec![
            vec![
                "PRISMA_Phase".to_string(),
                "Records_Count".to_string(),
                "Excluded_Count".to_string(),
                "Cumulative_Exclusion".to_string(),
            ],
            vec![
                "Identification".to_string(),
                self.identification.records_identified.to_string(),
                "0".to_string(),
                "0".to_string(),
            ],
            vec![
                "Title/Abstract Screening".to_string(),
                self.screening.records_screened.to_string(),
                self.screening.records_excluded.to_string(),
                screening_cumulative.to_string(),
            ],
            vec![
                "Full-text Assessment".to_string(),
                self.eligibility.full_text_assessed.to_string(),
                self.eligibility.full_text_excluded.to_string(),
                eligibility_cumulative.to_string(),
            ],
            vec![
                "Final Inclusion".to_string(),
                self.included.studies_included.to_string(),
                "0".to_string(),
                eligibility_cumulative.to_string(),
            ],
        ]
    }

    /// Every exclusion reason as CSV rows, header first. Percentages are
    /// relative to the initially identified records.
    pub fn exclusion_rows(&self) -> Vec<Vec<String>> {
        let initial = self.identification.records_identified.max(1) as f64;
        let mut rows = vec![vec![
            "Phase".to_string(),
            "Exclusion_Reason".to_string(),
            "Count".to_string(),
            "Percentage_of_Initial".to_string(),
        ]];
        for (phase, breakdown) in [
            ("Title/Abstract", &self.screening.exclusion_reasons),
            ("Full-text", &self.eligibility.exclusion_reasons),
        ] {
            for entry in breakdown.iter() {
                let percentage = (entry.count as f64 / initial * 10000.0).round() / 100.0;
                rows.push(vec![
                    phase.to_string(),
                    reason_label(&entry.reason),
                    entry.count.to_string(),
                    format!("{:.2}", percentage),
                ]);
            }
        }
        rows
    }
}
