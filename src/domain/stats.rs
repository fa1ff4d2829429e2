//! Descriptive statistics over the publication records.

use crate::domain::model::{Decision, Publication};
use std::collections::HashMap;

/// Venues treated as high impact when they appear as a substring of the
/// Journal_Conference field.
pub const HIGH_IMPACT_VENUES: [&str; 5] = [
    "Nature",
    "Cell",
    "Science",
    "Nature Methods",
    "Nature Communications",
];

/// Counts distinct values, ordered by count descending then value ascending.
pub fn value_counts<'a, I>(values: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    let mut pairs: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearStats {
    pub min: u16,
    pub max: u16,
    pub mean: f64,
}

pub fn year_stats(publications: &[Publication]) -> Option<YearStats> {
    if publications.is_empty() {
        return None;
    }
    let mut min = u16::MAX;
    let mut max = u16::MIN;
    let mut sum = 0u64;
    for publication in publications {
        min = min.min(publication.year);
        max = max.max(publication.year);
        sum += u64::from(publication.year);
    }
    Some(YearStats {
        min,
        max,
        mean: sum as f64 / publications.len() as f64,
    })
}

/// Publication counts per year, ascending by year.
pub fn year_distribution(publications: &[Publication]) -> Vec<(u16, usize)> {
    let mut counts: HashMap<u16, usize> = HashMap::new();
    for publication in publications {
        *counts.entry(publication.year).or_insert(0) += 1;
    }
    let mut pairs: Vec<(u16, usize)> = counts.into_iter().collect();
    pairs.sort_by_key(|&(year, _)| year);
    pairs
}

pub fn decision_counts(publications: &[Publication]) -> (usize, usize) {
    let included = publications
        .iter()
        .filter(|p| p.decision == Decision::Include)
        .count();
    (included, publications.len() - included)
}

pub fn inclusion_rate(publications: &[Publication]) -> f64 {
    if publications.is_empty() {
        return 0.0;
    }
    let (included, _) = decision_counts(publications);
    included as f64 / publications.len() as f64 * 100.0
}

pub fn top_venues(publications: &[Publication], n: usize) -> Vec<(String, usize)> {
    let mut counts = value_counts(publications.iter().map(|p| p.venue.as_str()));
    counts.truncate(n);
    counts
}

pub fn database_sources(publications: &[Publication]) -> Vec<(String, usize)> {
    value_counts(publications.iter().map(|p| p.source.as_str()))
}

/// The most frequent screening reasons among records with the given decision.
pub fn reason_breakdown(
    publications: &[Publication],
    decision: Decision,
    n: usize,
) -> Vec<(String, usize)> {
    let mut counts = value_counts(
        publications
            .iter()
            .filter(|p| p.decision == decision)
            .map(|p| p.reason.as_str()),
    );
    counts.truncate(n);
    counts
}

pub fn recent_count(publications: &[Publication], since: u16) -> usize {
    publications.iter().filter(|p| p.year >= since).count()
}

pub fn high_impact_count(publications: &[Publication]) -> usize {
    publications
        .iter()
        .filter(|p| HIGH_IMPACT_VENUES.iter().any(|v| p.venue.contains(v)))
        .count()
}

pub fn preprint_count(publications: &[Publication]) -> usize {
    publications
        .iter()
        .filter(|p| p.venue.contains("bioRxiv"))
        .count()
}

pub fn unique_venue_count(publications: &[Publication]) -> usize {
    let venues: std::collections::HashSet<&str> =
        publications.iter().map(|p| p.venue.as_str()).collect();
    venues.len()
}
