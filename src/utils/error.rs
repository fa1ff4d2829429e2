use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

/// 錯誤分類，用於日誌與報告
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Data,
    Validation,
    System,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Config => "Config",
            ErrorCategory::Data => "Data",
            ErrorCategory::Validation => "Validation",
            ErrorCategory::System => "System",
        };
        write!(f, "{}", name)
    }
}

/// 錯誤嚴重程度，決定程式的退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorSeverity::Low => "Low",
            ErrorSeverity::Medium => "Medium",
            ErrorSeverity::High => "High",
            ErrorSeverity::Critical => "Critical",
        };
        write!(f, "{}", name)
    }
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Config,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ZipError(_)
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
            EtlError::ValidationError { .. } => ErrorCategory::Validation,
            EtlError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorSeverity::Medium,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ZipError(_)
            | EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. } => ErrorSeverity::High,
            EtlError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// 給終端使用者看的簡短訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::ConfigError { message } => format!("配置問題: {}", message),
            EtlError::InvalidConfigValueError { field, value, .. } => {
                format!("配置欄位 '{}' 的值 '{}' 無效", field, value)
            }
            EtlError::MissingConfigError { field } => format!("缺少必要配置: {}", field),
            EtlError::ConfigValidationError { field, message } => {
                format!("配置欄位 '{}' 驗證失敗: {}", field, message)
            }
            EtlError::CsvError(_) => "資料檔案格式有問題，無法解析".to_string(),
            EtlError::SerializationError(_) => "資料序列化失敗".to_string(),
            EtlError::ZipError(_) => "壓縮檔案建立失敗".to_string(),
            EtlError::ProcessingError { message } => format!("資料處理失敗: {}", message),
            EtlError::ValidationError { message } => format!("驗證失敗: {}", message),
            EtlError::IoError(_) => "檔案讀寫失敗".to_string(),
        }
    }

    /// 對應的復原建議
    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::ConfigError { .. } => "請檢查命令列參數與配置檔案".to_string(),
            EtlError::InvalidConfigValueError { reason, .. } => reason.clone(),
            EtlError::MissingConfigError { field } => {
                format!("請在配置檔案或命令列中提供 '{}'", field)
            }
            EtlError::ConfigValidationError { .. } => "請修正配置值後重新執行".to_string(),
            EtlError::CsvError(_) => "請確認檔案是有效的 CSV/TSV，且每一列欄位數一致".to_string(),
            EtlError::SerializationError(_) => "請檢查資料內容是否包含無效字元".to_string(),
            EtlError::ZipError(_) => "請確認輸出目錄有足夠空間與寫入權限".to_string(),
            EtlError::ProcessingError { .. } => "請檢查輸入資料的內容與格式".to_string(),
            EtlError::ValidationError { .. } => "請檢查數字設定是否前後一致".to_string(),
            EtlError::IoError(_) => "請確認檔案路徑存在且有讀寫權限".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
