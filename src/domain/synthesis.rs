//! Seeded generation of a synthetic study pool and the screening passes that
//! drive the simulated selection flow.

use crate::domain::flow::{ExclusionBreakdown, ReasonCount};
use crate::domain::stats;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationType {
    JournalArticle,
    ConferencePaper,
    Abstract,
    Editorial,
}

/// 模擬研究的特徵旗標；篩選規則據此判斷去留
#[derive(Debug, Clone)]
pub struct SyntheticStudy {
    pub id: String,
    pub year: u16,
    pub journal: String,
    pub has_gnn: bool,
    pub has_rnn: bool,
    pub has_attention: bool,
    pub spatial_omics: bool,
    pub cardiac_focus: bool,
    pub full_text_available: bool,
    pub peer_reviewed: bool,
    pub english: bool,
    pub publication_type: PublicationType,
    pub sufficient_methodology: bool,
    pub has_spatial_resolution: bool,
    pub has_empirical_data: bool,
    pub sample_size: u32,
}

impl SyntheticStudy {
    pub fn uses_deep_learning(&self) -> bool {
        self.has_gnn || self.has_rnn || self.has_attention
    }
}

#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub count: usize,
    /// The first `favored` studies are drawn with high-quality feature odds
    /// so that enough candidates survive full-text screening.
    pub favored: usize,
    pub journals: Vec<String>,
    pub year_min: u16,
    pub year_max: u16,
}

/// Draws the synthetic pool. Favored studies get strongly tilted feature
/// probabilities; the remainder are a coin flip per feature.
pub fn generate_studies<R: Rng>(rng: &mut R, params: &GenerationParams) -> Vec<SyntheticStudy> {
    let mut studies = Vec::with_capacity(params.count);
    for index in 0..params.count {
        let favored = index < params.favored;
        let journal = if params.journals.is_empty() {
            "Unknown".to_string()
        } else {
            params.journals[rng.gen_range(0..params.journals.len())].clone()
        };
        let publication_type = if favored {
            let draw: f64 = rng.gen();
            if draw < 0.97 {
                PublicationType::JournalArticle
            } else if draw < 0.99 {
                PublicationType::ConferencePaper
            } else if draw < 0.995 {
                PublicationType::Abstract
            } else {
                PublicationType::Editorial
            }
        } else {
            let draw: f64 = rng.gen();
            if draw < 0.25 {
                PublicationType::JournalArticle
            } else if draw < 0.50 {
                PublicationType::ConferencePaper
            } else if draw < 0.75 {
                PublicationType::Abstract
            } else {
                PublicationType::Editorial
            }
        };
        let study = SyntheticStudy {
            id: format!("STUDY_{:04}", index + 1),
            year: rng.gen_range(params.year_min..=params.year_max),
            journal,
            has_gnn: rng.gen_bool(if favored { 0.85 } else { 0.5 }),
            has_rnn: rng.gen_bool(if favored { 0.75 } else { 0.5 }),
            has_attention: rng.gen_bool(if favored { 0.9 } else { 0.5 }),
            spatial_omics: rng.gen_bool(if favored { 0.95 } else { 0.5 }),
            cardiac_focus: rng.gen_bool(if favored { 0.98 } else { 0.5 }),
            full_text_available: rng.gen_bool(if favored { 0.97 } else { 0.5 }),
            peer_reviewed: rng.gen_bool(if favored { 0.95 } else { 0.5 }),
            english: rng.gen_bool(if favored { 0.98 } else { 0.5 }),
            publication_type,
            sufficient_methodology: rng.gen_bool(if favored { 0.97 } else { 0.5 }),
            has_spatial_resolution: rng.gen_bool(if favored { 0.98 } else { 0.5 }),
            has_empirical_data: rng.gen_bool(if favored { 0.97 } else { 0.5 }),
            sample_size: if favored {
                rng.gen_range(60..800)
            } else {
                rng.gen_range(10..1000)
            },
        };
        studies.push(study);
    }
    studies
}

/// The formal eligibility rule set applied during full-text review.
pub fn meets_inclusion_criteria(study: &SyntheticStudy, year_min: u16, year_max: u16) -> bool {
    study.uses_deep_learning()
        && study.spatial_omics
        && study.cardiac_focus
        && study.peer_reviewed
        && study.english
        && (year_min..=year_max).contains(&study.year)
        && study.full_text_available
}

/// First matching full-text exclusion reason, or `None` when the study stays.
/// The order mirrors how reviewers triage: publication type first, then data
/// modality, then methodological quality.
pub fn exclusion_reason(study: &SyntheticStudy, small_sample_threshold: u32) -> Option<&'static str> {
    if matches!(
        study.publication_type,
        PublicationType::Abstract | PublicationType::Editorial
    ) {
        return Some("conference_abstracts_letters_editorials");
    }
    if !study.has_spatial_resolution {
        return Some("bulk_transcriptomics_only");
    }
    if !study.uses_deep_learning() {
        return Some("insufficient_deep_learning");
    }
    if !study.cardiac_focus {
        return Some("non_cardiac_tissue");
    }
    if !study.sufficient_methodology {
        return Some("insufficient_methodology");
    }
    if !study.has_empirical_data {
        return Some("theoretical_only");
    }
    if study.sample_size < small_sample_threshold {
        return Some("small_sample_sizes");
    }
    None
}

/// Title/abstract pass: removes random studies according to the planned
/// per-reason counts. Returns the surviving pool and the realized breakdown.
pub fn title_abstract_screening<R: Rng>(
    rng: &mut R,
    mut pool: Vec<SyntheticStudy>,
    planned: &[ReasonCount],
) -> (Vec<SyntheticStudy>, ExclusionBreakdown) {
    let mut breakdown = ExclusionBreakdown::new();
    for entry in planned {
        let mut removed = 0u64;
        for _ in 0..entry.count {
            if pool.is_empty() {
                break;
            }
            let idx = rng.gen_range(0..pool.len());
            pool.swap_remove(idx);
            removed += 1;
        }
        if removed > 0 {
            breakdown.add(&entry.reason, removed);
        }
    }
    (pool, breakdown)
}

/// Full-text pass: applies the rule-based exclusion reasons, then trims any
/// surplus eligible studies at random, booking them as methodological overlap.
pub fn full_text_screening<R: Rng>(
    rng: &mut R,
    pool: Vec<SyntheticStudy>,
    final_target: usize,
    small_sample_threshold: u32,
) -> (Vec<SyntheticStudy>, ExclusionBreakdown) {
    let mut breakdown = ExclusionBreakdown::new();
    let mut kept = Vec::new();
    for study in pool {
        match exclusion_reason(&study, small_sample_threshold) {
            Some(reason) => breakdown.add(reason, 1),
            None => kept.push(study),
        }
    }
    while kept.len() > final_target {
        let idx = rng.gen_range(0..kept.len());
        kept.swap_remove(idx);
        breakdown.add("methodological_overlap_redundancy", 1);
    }
    (kept, breakdown)
}

/// Draws the simulated inter-rater κ from the configured range.
pub fn sample_kappa<R: Rng>(rng: &mut R, range: [f64; 2]) -> f64 {
    let kappa = if range[0] >= range[1] {
        range[0]
    } else {
        rng.gen_range(range[0]..=range[1])
    };
    (kappa * 1000.0).round() / 1000.0
}

/// Aggregate profile of the included cohort for the report appendix.
#[derive(Debug, Clone, Serialize)]
pub struct StudyCharacteristics {
    pub year_distribution: BTreeMap<u16, usize>,
    pub top_journals: Vec<(String, usize)>,
    pub graph_models: usize,
    pub sequence_models: usize,
    pub attention_models: usize,
    pub spatial_omics: usize,
    pub sample_size_mean: f64,
    pub sample_size_median: f64,
    pub sample_size_min: u32,
    pub sample_size_max: u32,
}

impl StudyCharacteristics {
    pub fn summarize(studies: &[SyntheticStudy]) -> Self {
        let mut year_distribution: BTreeMap<u16, usize> = BTreeMap::new();
        for study in studies {
            *year_distribution.entry(study.year).or_insert(0) += 1;
        }
        let mut top_journals = stats::value_counts(studies.iter().map(|s| s.journal.as_str()));
        top_journals.truncate(5);

        let mut sizes: Vec<u32> = studies.iter().map(|s| s.sample_size).collect();
        sizes.sort_unstable();
        let (mean, median, min, max) = if sizes.is_empty() {
            (0.0, 0.0, 0, 0)
        } else {
            let sum: u64 = sizes.iter().map(|&s| u64::from(s)).sum();
            let mean = sum as f64 / sizes.len() as f64;
            let mid = sizes.len() / 2;
            let median = if sizes.len() % 2 == 0 {
                (sizes[mid - 1] + sizes[mid]) as f64 / 2.0
            } else {
                sizes[mid] as f64
            };
            (
                (mean * 10.0).round() / 10.0,
                median,
                sizes[0],
                sizes[sizes.len() - 1],
            )
        };

        Self {
            year_distribution,
            top_journals,
            graph_models: studies.iter().filter(|s| s.has_gnn).count(),
            sequence_models: studies.iter().filter(|s| s.has_rnn).count(),
            attention_models: studies.iter().filter(|s| s.has_attention).count(),
            spatial_omics: studies.iter().filter(|s| s.spatial_omics).count(),
            sample_size_mean: mean,
            sample_size_median: median,
            sample_size_min: min,
            sample_size_max: max,
        }
    }
}
