// Repository trait for archived run reports
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::report::ReportRecord;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("report {0} does not exist")]
    NotFound(u64),
    #[error("invalid report file name: {0:?}")]
    InvalidName(String),
    #[error("archive I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive index is corrupt: {0}")]
    Index(#[from] serde_json::Error),
}

/// Local persistent store of generated reports, keyed by auto-increment id.
/// Document bytes are immutable once written; only the file name can change.
#[async_trait]
pub trait ReportArchive: Send + Sync {
    async fn add(&self, file_name: &str, document: &[u8]) -> Result<ReportRecord, ArchiveError>;

    /// All records, newest first.
    async fn list(&self) -> Result<Vec<ReportRecord>, ArchiveError>;

    async fn fetch(&self, id: u64) -> Result<(ReportRecord, Vec<u8>), ArchiveError>;

    async fn delete(&self, id: u64) -> Result<(), ArchiveError>;

    async fn rename(&self, id: u64, file_name: &str) -> Result<ReportRecord, ArchiveError>;
}

/// File names are shown to the operator and used as download names.
pub fn check_file_name(file_name: &str) -> Result<&str, ArchiveError> {
    let trimmed = file_name.trim();
    let bad = trimmed.is_empty()
        || trimmed.len() > 255
        || trimmed.contains(['/', '\\', '"'])
        || trimmed.chars().any(char::is_control);
    if bad {
        return Err(ArchiveError::InvalidName(file_name.to_string()));
    }
    Ok(trimmed)
}
