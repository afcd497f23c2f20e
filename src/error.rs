use thiserror::Error;

#[derive(Error, Debug)]
pub enum SoaLedgerError {
    #[error("Could not decode spreadsheet: {0}")]
    Parse(String),

    #[error("Template not found. Tried: {}", tried.join(", "))]
    TemplateMissing { tried: Vec<String> },

    #[error("Template is missing worksheet '{0}'")]
    TemplateSheetMissing(String),

    #[error("Failed to patch template: {0}")]
    TemplatePatch(String),

    #[error("No lot records found in master's list")]
    NoLotRecords,

    #[error("Could not extract file id from filename '{0}'")]
    MissingFileId(String),

    #[error("No row found for file id {file_id}")]
    TargetRowNotFound { file_id: String },

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Destination write failed: {0}")]
    WriteFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "sheets")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SoaLedgerError {
    /// Whether the destination signalled a quota / rate-limit condition.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            SoaLedgerError::RateLimited(_) => true,
            SoaLedgerError::WriteFailed(message) => is_rate_limit_message(message),
            #[cfg(feature = "sheets")]
            SoaLedgerError::Http(err) => {
                err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS)
            }
            _ => false,
        }
    }
}

impl From<calamine::Error> for SoaLedgerError {
    fn from(err: calamine::Error) -> Self {
        SoaLedgerError::Parse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SoaLedgerError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        SoaLedgerError::TemplatePatch(err.to_string())
    }
}

/// Quota errors are not always reported with a 429 status; the message is checked as well.
pub fn is_rate_limit_message(message: &str) -> bool {
    message.contains("Quota exceeded") || message.contains("429")
}

pub type Result<T> = std::result::Result<T, SoaLedgerError>;
