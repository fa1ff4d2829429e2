//! Inter-rater reliability between the two screening reviewers.

use serde::{Serialize, Serializer};
use std::fmt;

/// 2x2 screening decision matrix for two independent reviewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub both_include: u64,
    pub include_exclude: u64,
    pub exclude_include: u64,
    pub both_exclude: u64,
}

impl Default for ConfusionMatrix {
    fn default() -> Self {
        Self {
            both_include: 75,
            include_exclude: 8,
            exclude_include: 9,
            both_exclude: 370,
        }
    }
}

impl ConfusionMatrix {
    pub fn total(&self) -> u64 {
        self.both_include + self.include_exclude + self.exclude_include + self.both_exclude
    }

    pub fn observed_agreement(&self) -> f64 {
        (self.both_include + self.both_exclude) as f64 / self.total() as f64
    }

    /// Chance agreement from the marginal proportions of each reviewer.
    pub fn expected_agreement(&self) -> f64 {
        let n = self.total() as f64;
        let row_include = (self.both_include + self.include_exclude) as f64 / n;
        let row_exclude = (self.exclude_include + self.both_exclude) as f64 / n;
        let col_include = (self.both_include + self.exclude_include) as f64 / n;
        let col_exclude = (self.include_exclude + self.both_exclude) as f64 / n;
        row_include * col_include + row_exclude * col_exclude
    }

    /// κ = (Po - Pe) / (1 - Pe); defined as 1.0 when chance agreement is total.
    pub fn cohens_kappa(&self) -> f64 {
        let po = self.observed_agreement();
        let pe = self.expected_agreement();
        if (1.0 - pe).abs() < f64::EPSILON {
            return 1.0;
        }
        (po - pe) / (1.0 - pe)
    }
}

/// Landis & Koch (1977) interpretation bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgreementInterpretation {
    Poor,
    Slight,
    Fair,
    Moderate,
    Substantial,
    AlmostPerfect,
}

impl AgreementInterpretation {
    pub fn from_kappa(kappa: f64) -> Self {
        if kappa < 0.0 {
            AgreementInterpretation::Poor
        } else if kappa < 0.20 {
            AgreementInterpretation::Slight
        } else if kappa < 0.40 {
            AgreementInterpretation::Fair
        } else if kappa < 0.60 {
            AgreementInterpretation::Moderate
        } else if kappa < 0.80 {
            AgreementInterpretation::Substantial
        } else {
            AgreementInterpretation::AlmostPerfect
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgreementInterpretation::Poor => "Poor agreement",
            AgreementInterpretation::Slight => "Slight agreement",
            AgreementInterpretation::Fair => "Fair agreement",
            AgreementInterpretation::Moderate => "Moderate agreement",
            AgreementInterpretation::Substantial => "Substantial agreement",
            AgreementInterpretation::AlmostPerfect => "Almost perfect agreement",
        }
    }
}

impl fmt::Display for AgreementInterpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for AgreementInterpretation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Confidence {
    High,
    Moderate,
    Low,
}

impl Confidence {
    pub fn from_kappa(kappa: f64) -> Self {
        if kappa >= 0.75 {
            Confidence::High
        } else if kappa >= 0.60 {
            Confidence::Moderate
        } else {
            Confidence::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityAssessment {
    pub threshold: f64,
    pub meets_threshold: bool,
    pub confidence: Confidence,
}

/// 報告中的信度統計；由矩陣推導或直接以 κ 值建構
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgreementStats {
    pub cohens_kappa: f64,
    pub interpretation: AgreementInterpretation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_agreement: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disagreement_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_agreement: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_agreement: Option<f64>,
    pub quality: QualityAssessment,
}

impl AgreementStats {
    pub fn from_matrix(matrix: &ConfusionMatrix, threshold: f64) -> Self {
        let kappa = round3(matrix.cohens_kappa());
        let po = matrix.observed_agreement();
        Self {
            cohens_kappa: kappa,
            interpretation: AgreementInterpretation::from_kappa(kappa),
            percent_agreement: Some(round1(po * 100.0)),
            disagreement_rate: Some(round1((1.0 - po) * 100.0)),
            observed_agreement: Some(round3(po)),
            expected_agreement: Some(round3(matrix.expected_agreement())),
            quality: QualityAssessment {
                threshold,
                meets_threshold: kappa >= threshold,
                confidence: Confidence::from_kappa(kappa),
            },
        }
    }

    /// For simulated runs where only a κ value is drawn, without a matrix.
    pub fn from_kappa(kappa: f64, threshold: f64) -> Self {
        let kappa = round3(kappa);
        Self {
            cohens_kappa: kappa,
            interpretation: AgreementInterpretation::from_kappa(kappa),
            percent_agreement: None,
            disagreement_rate: None,
            observed_agreement: None,
            expected_agreement: None,
            quality: QualityAssessment {
                threshold,
                meets_threshold: kappa >= threshold,
                confidence: Confidence::from_kappa(kappa),
            },
        }
    }
}

/// Renders the decision matrix with row and column totals.
pub fn matrix_table(matrix: &ConfusionMatrix) -> String {
    let row_include = matrix.both_include + matrix.include_exclude;
    let row_exclude = matrix.exclude_include + matrix.both_exclude;
    let col_include = matrix.both_include + matrix.exclude_include;
    let col_exclude = matrix.include_exclude + matrix.both_exclude;

    let mut out = String::new();
    out.push_str("Reviewer Decision Matrix:\n");
    out.push_str(&format!(
        "{:>28}{:>10}{:>10}\n",
        "Include", "Exclude", "Total"
    ));
    out.push_str(&format!(
        "Reviewer 1 Include{:>10}{:>10}{:>10}\n",
        matrix.both_include, matrix.include_exclude, row_include
    ));
    out.push_str(&format!(
        "Reviewer 1 Exclude{:>10}{:>10}{:>10}\n",
        matrix.exclude_include, matrix.both_exclude, row_exclude
    ));
    out.push_str(&format!(
        "{:>18}{:>10}{:>10}{:>10}\n",
        "Total",
        col_include,
        col_exclude,
        matrix.total()
    ));
    out
}

/// Step-by-step κ derivation for the printed report.
pub fn calculation_details(matrix: &ConfusionMatrix, threshold: f64) -> String {
    let n = matrix.total() as f64;
    let po = matrix.observed_agreement();
    let pe = matrix.expected_agreement();
    let kappa = round3(matrix.cohens_kappa());
    let row_include = (matrix.both_include + matrix.include_exclude) as f64 / n;
    let row_exclude = (matrix.exclude_include + matrix.both_exclude) as f64 / n;
    let col_include = (matrix.both_include + matrix.exclude_include) as f64 / n;
    let col_exclude = (matrix.include_exclude + matrix.both_exclude) as f64 / n;

    let mut out = String::new();
    out.push_str("Cohen's Kappa Calculation:\n");
    out.push_str(&format!(
        "Step 1 - Observed agreement (Po): ({} + {}) / {} = {:.3}\n",
        matrix.both_include,
        matrix.both_exclude,
        matrix.total(),
        po
    ));
    out.push_str(&format!(
        "Step 2 - Expected agreement (Pe): ({:.3} × {:.3}) + ({:.3} × {:.3}) = {:.3}\n",
        row_include, col_include, row_exclude, col_exclude, pe
    ));
    out.push_str(&format!(
        "Step 3 - Kappa: ({:.3} - {:.3}) / (1 - {:.3}) = {:.3}\n",
        po, pe, pe, kappa
    ));
    out.push('\n');
    out.push_str("Interpretation scale (Landis & Koch):\n");
    out.push_str("  < 0.00       Poor agreement\n");
    out.push_str("  0.00 - 0.20  Slight agreement\n");
    out.push_str("  0.21 - 0.40  Fair agreement\n");
    out.push_str("  0.41 - 0.60  Moderate agreement\n");
    out.push_str("  0.61 - 0.80  Substantial agreement\n");
    out.push_str("  0.81 - 1.00  Almost perfect agreement\n");
    out.push('\n');
    out.push_str(&format!(
        "Result: κ = {:.3} ({}), threshold {:.2} {}\n",
        kappa,
        AgreementInterpretation::from_kappa(kappa),
        threshold,
        if kappa >= threshold { "met ✅" } else { "not met ❌" }
    ));
    out
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matrix_kappa_value() {
        let matrix = ConfusionMatrix::default();
        assert_eq!(matrix.total(), 462);
        assert!((matrix.observed_agreement() - 0.963).abs() < 0.001);
        assert!((matrix.expected_agreement() - 0.704).abs() < 0.001);
        assert_eq!(round3(matrix.cohens_kappa()), 0.876);
    }

    #[test]
    fn test_stats_from_default_matrix() {
        let stats = AgreementStats::from_matrix(&ConfusionMatrix::default(), 0.60);
        assert_eq!(stats.cohens_kappa, 0.876);
        assert_eq!(stats.interpretation, AgreementInterpretation::AlmostPerfect);
        assert_eq!(stats.percent_agreement, Some(96.3));
        assert_eq!(stats.disagreement_rate, Some(3.7));
        assert!(stats.quality.meets_threshold);
        assert_eq!(stats.quality.confidence, Confidence::High);
    }

    #[test]
    fn test_interpretation_band_edges() {
        assert_eq!(
            AgreementInterpretation::from_kappa(-0.1),
            AgreementInterpretation::Poor
        );
        assert_eq!(
            AgreementInterpretation::from_kappa(0.0),
            AgreementInterpretation::Slight
        );
        assert_eq!(
            AgreementInterpretation::from_kappa(0.45),
            AgreementInterpretation::Moderate
        );
        assert_eq!(
            AgreementInterpretation::from_kappa(0.79),
            AgreementInterpretation::Substantial
        );
        assert_eq!(
            AgreementInterpretation::from_kappa(0.80),
            AgreementInterpretation::AlmostPerfect
        );
    }

    #[test]
    fn test_perfect_agreement_degenerate_pe() {
        let matrix = ConfusionMatrix {
            both_include: 0,
            include_exclude: 0,
            exclude_include: 0,
            both_exclude: 100,
        };
        assert_eq!(matrix.cohens_kappa(), 1.0);
    }

    #[test]
    fn test_from_kappa_leaves_matrix_fields_unset() {
        let stats = AgreementStats::from_kappa(0.8124, 0.60);
        assert_eq!(stats.cohens_kappa, 0.812);
        assert!(stats.percent_agreement.is_none());
        assert!(stats.observed_agreement.is_none());
        let json = serde_json::to_string(&stats).unwrap();
        assert!(!json.contains("percent_agreement"));
        assert!(json.contains("Almost perfect agreement"));
    }

    #[test]
    fn test_matrix_table_shows_marginals() {
        let table = matrix_table(&ConfusionMatrix::default());
        assert!(table.contains("75"));
        assert!(table.contains("370"));
        assert!(table.contains("83"));
        assert!(table.contains("379"));
        assert!(table.contains("462"));
    }

    #[test]
    fn test_calculation_details_walks_the_formula() {
        let details = calculation_details(&ConfusionMatrix::default(), 0.60);
        assert!(details.contains("(75 + 370) / 462 = 0.963"));
        assert!(details.contains("= 0.704"));
        assert!(details.contains("κ = 0.876"));
        assert!(details.contains("met ✅"));
    }
}
