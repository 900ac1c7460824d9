// Filesystem report archive - Index file plus one blob per report
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::application::report_archive::{ArchiveError, ReportArchive};
use crate::domain::report::ReportRecord;

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct ArchiveIndex {
    next_id: u64,
    records: Vec<ReportRecord>,
}

#[derive(Debug)]
pub struct FileReportArchive {
    directory: PathBuf,
    // Serializes index read-modify-write cycles.
    index_lock: Mutex<()>,
}

impl FileReportArchive {
    pub async fn open(directory: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory)
            .await
            .with_context(|| format!("Failed to create archive directory {}", directory.display()))?;
        Ok(Self {
            directory,
            index_lock: Mutex::new(()),
        })
    }

    fn document_path(&self, id: u64) -> PathBuf {
        self.directory.join(format!("{}.report", id))
    }

    async fn read_index(&self) -> Result<ArchiveIndex, ArchiveError> {
        match tokio::fs::read(self.directory.join(INDEX_FILE)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ArchiveIndex {
                next_id: 1,
                records: Vec::new(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_index(&self, index: &ArchiveIndex) -> Result<(), ArchiveError> {
        let bytes = serde_json::to_vec_pretty(index)?;
        write_atomically(&self.directory.join(INDEX_FILE), &bytes).await
    }
}

/// Write to a sibling temp file and rename over the target, so readers never
/// observe a partial file.
async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), ArchiveError> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl ReportArchive for FileReportArchive {
    async fn add(&self, file_name: &str, document: &[u8]) -> Result<ReportRecord, ArchiveError> {
        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;

        let id = index.next_id.max(1);
        write_atomically(&self.document_path(id), document).await?;

        let record = ReportRecord {
            id,
            file_name: file_name.to_string(),
            size_bytes: document.len() as u64,
            created_at: Utc::now(),
        };
        index.next_id = id + 1;
        index.records.push(record.clone());

        if let Err(e) = self.write_index(&index).await {
            // Keep the directory consistent with the index on failure.
            let _ = tokio::fs::remove_file(self.document_path(id)).await;
            return Err(e);
        }
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<ReportRecord>, ArchiveError> {
        let _guard = self.index_lock.lock().await;
        let mut records = self.read_index().await?.records;
        records.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(records)
    }

    async fn fetch(&self, id: u64) -> Result<(ReportRecord, Vec<u8>), ArchiveError> {
        let _guard = self.index_lock.lock().await;
        let record = self
            .read_index()
            .await?
            .records
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(ArchiveError::NotFound(id))?;
        let document = tokio::fs::read(self.document_path(id)).await?;
        Ok((record, document))
    }

    async fn delete(&self, id: u64) -> Result<(), ArchiveError> {
        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;
        let before = index.records.len();
        index.records.retain(|r| r.id != id);
        if index.records.len() == before {
            return Err(ArchiveError::NotFound(id));
        }
        self.write_index(&index).await?;

        match tokio::fs::remove_file(self.document_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn rename(&self, id: u64, file_name: &str) -> Result<ReportRecord, ArchiveError> {
        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;
        let record = index
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ArchiveError::NotFound(id))?;
        record.file_name = file_name.to_string();
        let updated = record.clone();
        self.write_index(&index).await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_list_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FileReportArchive::open(dir.path()).await.unwrap();

        let first = archive.add("a.json", b"{\"a\":1}").await.unwrap();
        let second = archive.add("b.json", b"{\"b\":2}").await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        let listed = archive.list().await.unwrap();
        let ids: Vec<u64> = listed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1]);

        let (record, bytes) = archive.fetch(1).await.unwrap();
        assert_eq!(record.file_name, "a.json");
        assert_eq!(bytes, b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_delete() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FileReportArchive::open(dir.path()).await.unwrap();

        archive.add("a.json", b"1").await.unwrap();
        let second = archive.add("b.json", b"2").await.unwrap();
        archive.delete(second.id).await.unwrap();
        assert!(matches!(
            archive.delete(second.id).await,
            Err(ArchiveError::NotFound(2))
        ));

        let third = archive.add("c.json", b"3").await.unwrap();
        assert_eq!(third.id, 3);
        assert!(matches!(archive.fetch(2).await, Err(ArchiveError::NotFound(2))));
    }

    #[tokio::test]
    async fn test_rename_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FileReportArchive::open(dir.path()).await.unwrap();
        let record = archive.add("old.json", b"payload").await.unwrap();

        let renamed = archive.rename(record.id, "new.json").await.unwrap();
        assert_eq!(renamed.file_name, "new.json");
        assert_eq!(renamed.created_at, record.created_at);

        let (fetched, bytes) = archive.fetch(record.id).await.unwrap();
        assert_eq!(fetched.file_name, "new.json");
        assert_eq!(bytes, b"payload");

        assert!(matches!(
            archive.rename(99, "x.json").await,
            Err(ArchiveError::NotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_archive_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let archive = FileReportArchive::open(dir.path()).await.unwrap();
            archive.add("kept.json", b"x").await.unwrap();
        }
        let archive = FileReportArchive::open(dir.path()).await.unwrap();
        assert_eq!(archive.list().await.unwrap().len(), 1);
        assert_eq!(archive.add("next.json", b"y").await.unwrap().id, 2);
    }
}
