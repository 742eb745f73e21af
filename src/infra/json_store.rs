use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::domain::repository::{Record, RecordRepository};

#[derive(Debug, thiserror::Error)]
pub enum JsonStoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt record file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// JSONファイルによるRecordRepository実装。
/// 1エンティティ種別 = 1 JSONファイル（レコードの配列）。
pub struct JsonRecordFile<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonRecordFile<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 書き込み途中の一時ファイル。ファイル名全体に `.tmp` を付けるので、
    /// 同じディレクトリで語幹が同じファイル同士でも衝突しない。
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, source: std::io::Error) -> JsonStoreError {
        JsonStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl<T: Record> RecordRepository<T> for JsonRecordFile<T> {
    type Error = JsonStoreError;

    fn load(&self) -> Result<Vec<T>, Self::Error> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| self.io_err(e))?;
        let records: Vec<T> =
            serde_json::from_str(&content).map_err(|source| JsonStoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(records)
    }

    /// 一時ファイルに書いてからrenameする。途中で失敗しても既存ファイルは残る。
    fn save(&self, records: &[T]) -> Result<(), Self::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let content = serde_json::to_string_pretty(records)?;
        let tmp = self.tmp_path();
        let mut file = std::fs::File::create(&tmp).map_err(|e| self.io_err(e))?;
        file.write_all(content.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
