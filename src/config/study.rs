use crate::domain::agreement::ConfusionMatrix;
use crate::domain::flow::{
    default_full_text_reasons, default_title_abstract_reasons, ExclusionBreakdown, FlowTargets,
    ReasonCount,
};
use crate::domain::synthesis::GenerationParams;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_range, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// PRISMA 流程的研究配置；所有區段都有內建預設值，
/// TOML 檔案只需覆寫想調整的部分
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StudyConfig {
    pub study: StudySection,
    pub targets: FlowTargets,
    pub screening: ScreeningConfig,
    pub agreement: AgreementConfig,
    pub identification: IdentificationConfig,
    pub criteria: CriteriaConfig,
    pub characteristics: CharacteristicsConfig,
    pub output: OutputConfig,
    pub simulation: SimulationConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudySection {
    pub name: String,
    pub description: String,
    pub focus: String,
    /// [起始年, 結束年]
    pub date_range: [u16; 2],
    pub languages: Vec<String>,
}

impl Default for StudySection {
    fn default() -> Self {
        Self {
            name: "Deep Learning for Cardiomyocyte Analysis in Spatial Omics".to_string(),
            description: "Systematic review of deep learning methods applied to spatially \
                          resolved omics data of cardiomyocytes"
                .to_string(),
            focus: "cardiomyocyte spatial omics".to_string(),
            date_range: [2019, 2025],
            languages: vec!["English".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    pub title_abstract: Vec<ReasonCount>,
    pub full_text: Vec<ReasonCount>,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            title_abstract: default_title_abstract_reasons(),
            full_text: default_full_text_reasons(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgreementConfig {
    pub both_include: u64,
    pub include_exclude: u64,
    pub exclude_include: u64,
    pub both_exclude: u64,
    /// 模擬時抽樣 κ 的範圍
    pub kappa_range: [f64; 2],
    pub quality_threshold: f64,
}

impl Default for AgreementConfig {
    fn default() -> Self {
        Self {
            both_include: 75,
            include_exclude: 8,
            exclude_include: 9,
            both_exclude: 370,
            kappa_range: [0.75, 0.95],
            quality_threshold: 0.60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentificationConfig {
    pub databases: Vec<String>,
    pub search_strategy: String,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            databases: [
                "PubMed",
                "Web of Science",
                "Embase",
                "IEEE Xplore",
                "ACM Digital Library",
                "Scopus",
                "arXiv",
                "bioRxiv",
                "medRxiv",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            search_strategy: "Keyword blocks combining deep learning architectures, spatial \
                              omics assays and cardiac cell types"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CriteriaConfig {
    pub inclusion: Vec<String>,
    pub exclusion: Vec<String>,
}

impl Default for CriteriaConfig {
    fn default() -> Self {
        Self {
            inclusion: [
                "Deep learning architecture applied to spatial omics data",
                "Cardiomyocyte or cardiac tissue focus",
                "Peer-reviewed publication in English",
                "Full text available within the search window",
                "Empirical evaluation with reported sample sizes",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclusion: [
                "Conference abstracts, letters or editorials",
                "Bulk transcriptomics without spatial resolution",
                "No deep learning component",
                "Non-cardiac tissue focus",
                "Insufficient methodological detail for reproduction",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacteristicsConfig {
    /// 模擬研究抽樣期刊的候選名單
    pub journals: Vec<String>,
}

impl Default for CharacteristicsConfig {
    fn default() -> Self {
        Self {
            journals: [
                "Nature Methods",
                "Nature Communications",
                "Cell Systems",
                "Genome Biology",
                "Bioinformatics",
                "Nucleic Acids Research",
                "BMC Bioinformatics",
                "Circulation Research",
                "Frontiers in Cardiovascular Medicine",
                "bioRxiv",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
    pub include_flowchart: bool,
    pub include_summary: bool,
    /// 在檔名加入時間戳記，避免覆蓋先前的結果
    pub timestamp_files: bool,
    pub archive: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "./prisma-output".to_string(),
            include_flowchart: true,
            include_summary: true,
            timestamp_files: false,
            archive: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    /// 額外生成的高品質候選數，確保全文審查後仍能達到目標數
    pub high_quality_buffer: u64,
    pub small_sample_threshold: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            high_quality_buffer: 50,
            small_sample_threshold: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl StudyConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            return Err(EtlError::MissingConfigError {
                field: format!("config file: {}", path.as_ref().display()),
            });
        }
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${STUDY_NAME})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        // 使用正規表達式匹配 ${VAR_NAME} 格式
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("study.name", &self.study.name)?;
        validate_non_empty_string("study.focus", &self.study.focus)?;

        // 年份範圍
        validate_range("study.date_range[0]", self.study.date_range[0], 2000, 2030)?;
        validate_range("study.date_range[1]", self.study.date_range[1], 2000, 2030)?;
        if self.study.date_range[0] > self.study.date_range[1] {
            return Err(EtlError::ConfigValidationError {
                field: "study.date_range".to_string(),
                message: "Start year is after end year".to_string(),
            });
        }

        // 流程目標數字
        validate_range("targets.initial_records", self.targets.initial_records, 100, 10000)?;
        validate_range(
            "targets.final_included",
            self.targets.final_included,
            10,
            self.targets.initial_records,
        )?;
        if !self.targets.is_consistent() {
            return Err(EtlError::ConfigValidationError {
                field: "targets".to_string(),
                message: format!(
                    "{} - {} - {} does not equal {}",
                    self.targets.initial_records,
                    self.targets.title_abstract_excluded,
                    self.targets.full_text_excluded,
                    self.targets.final_included
                ),
            });
        }
        if self.targets.exclusion_ratio() > 0.95 {
            return Err(EtlError::ConfigValidationError {
                field: "targets".to_string(),
                message: format!(
                    "Exclusion ratio {:.2} exceeds the plausible maximum 0.95",
                    self.targets.exclusion_ratio()
                ),
            });
        }

        // 排除原因的小計必須等於階段總數
        let ta_total: u64 = self.screening.title_abstract.iter().map(|r| r.count).sum();
        if ta_total != self.targets.title_abstract_excluded {
            return Err(EtlError::ConfigValidationError {
                field: "screening.title_abstract".to_string(),
                message: format!(
                    "Reasons sum to {} but targets.title_abstract_excluded is {}",
                    ta_total, self.targets.title_abstract_excluded
                ),
            });
        }
        let ft_total: u64 = self.screening.full_text.iter().map(|r| r.count).sum();
        if ft_total != self.targets.full_text_excluded {
            return Err(EtlError::ConfigValidationError {
                field: "screening.full_text".to_string(),
                message: format!(
                    "Reasons sum to {} but targets.full_text_excluded is {}",
                    ft_total, self.targets.full_text_excluded
                ),
            });
        }

        // 信度設定
        validate_range("agreement.kappa_range[0]", self.agreement.kappa_range[0], 0.0, 1.0)?;
        validate_range("agreement.kappa_range[1]", self.agreement.kappa_range[1], 0.0, 1.0)?;
        if self.agreement.kappa_range[0] > self.agreement.kappa_range[1] {
            return Err(EtlError::ConfigValidationError {
                field: "agreement.kappa_range".to_string(),
                message: "Lower bound is above upper bound".to_string(),
            });
        }
        validate_range(
            "agreement.quality_threshold",
            self.agreement.quality_threshold,
            0.0,
            1.0,
        )?;
        if self.matrix().total() == 0 {
            return Err(EtlError::ConfigValidationError {
                field: "agreement".to_string(),
                message: "Decision matrix is empty".to_string(),
            });
        }

        // 清單不可為空
        if self.identification.databases.is_empty() {
            return Err(EtlError::ConfigValidationError {
                field: "identification.databases".to_string(),
                message: "At least one database is required".to_string(),
            });
        }
        if self.characteristics.journals.is_empty() {
            return Err(EtlError::ConfigValidationError {
                field: "characteristics.journals".to_string(),
                message: "At least one journal is required".to_string(),
            });
        }

        Ok(())
    }

    /// 取得審查者決策矩陣
    pub fn matrix(&self) -> ConfusionMatrix {
        ConfusionMatrix {
            both_include: self.agreement.both_include,
            include_exclude: self.agreement.include_exclude,
            exclude_include: self.agreement.exclude_include,
            both_exclude: self.agreement.both_exclude,
        }
    }

    pub fn title_abstract_breakdown(&self) -> ExclusionBreakdown {
        self.screening.title_abstract.clone().into()
    }

    pub fn full_text_breakdown(&self) -> ExclusionBreakdown {
        self.screening.full_text.clone().into()
    }

    /// 模擬生成參數；偏好數 = 目標納入數 + 高品質緩衝
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            count: self.targets.initial_records as usize,
            favored: (self.targets.final_included + self.simulation.high_quality_buffer) as usize,
            journals: self.characteristics.journals.clone(),
            year_min: self.study.date_range[0],
            year_max: self.study.date_range[1],
        }
    }

    pub fn date_range_label(&self) -> String {
        format!("{}-{}", self.study.date_range[0], self.study.date_range[1])
    }

    /// 取得監控設定
    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl Validate for StudyConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
