use std::collections::HashMap;

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::domain::error::DomainError;
use crate::domain::repository::{Record, RecordRepository};

use super::error::AppError;

/// 1エンティティ種別の全件をメモリに保持するストア。
///
/// open時に全件読み込み、flushで全件を書き戻す。読み取りは共有ロック、
/// 追加・更新・flushは排他ロックで行う。メモリ上の内容は常に最後に
/// 成功したflushの内容を含む（未flushの変更はクラッシュで失われうる）。
pub struct RecordStore<T: Record, R: RecordRepository<T>> {
    repo: R,
    inner: RwLock<Inner<T>>,
}

struct Inner<T> {
    records: Vec<T>,
    /// record_id → 最初に現れた位置
    by_id: HashMap<String, usize>,
    dirty: bool,
}

impl<T: Record> Inner<T> {
    fn new(records: Vec<T>) -> Self {
        let mut inner = Self {
            records,
            by_id: HashMap::new(),
            dirty: false,
        };
        inner.reindex();
        inner
    }

    fn reindex(&mut self) {
        self.by_id.clear();
        for (pos, record) in self.records.iter().enumerate() {
            self.by_id
                .entry(record.record_id().to_string())
                .or_insert(pos);
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }
}

impl<T: Record, R: RecordRepository<T>> RecordStore<T, R> {
    /// 保存先から全件を読み込んでストアを開く。
    pub fn open(repo: R) -> Result<Self, AppError> {
        let records = repo.load().map_err(|e| {
            tracing::error!(kind = T::KIND, location = %repo.location(), error = %e, "failed to load store");
            AppError::CorruptStore(Box::new(e))
        })?;
        validate_loaded(&records).map_err(|e| {
            tracing::error!(kind = T::KIND, location = %repo.location(), error = %e, "invalid record in store");
            AppError::CorruptStore(Box::new(e))
        })?;
        tracing::info!(
            kind = T::KIND,
            location = %repo.location(),
            records = records.len(),
            "store opened"
        );
        Ok(Self {
            repo,
            inner: RwLock::new(Inner::new(records)),
        })
    }

    pub fn location(&self) -> String {
        self.repo.location()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 最後のflush以降に変更があるか。
    pub fn is_dirty(&self) -> bool {
        self.inner.read().dirty
    }

    /// 条件に合う全件（読み込み順）。該当なしは空。
    pub fn query<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        let inner = self.inner.read();
        inner
            .records
            .iter()
            .filter(|&r| predicate(r))
            .cloned()
            .collect()
    }

    /// フィールドの完全一致検索。
    pub fn find_by(&self, field: T::Field, value: &str) -> Vec<T> {
        let found = self.query(|r| r.matches(field, value));
        tracing::debug!(kind = T::KIND, ?field, hits = found.len(), "find_by");
        found
    }

    /// IDインデックスによる1件取得。
    pub fn get(&self, id: &str) -> Option<T> {
        let inner = self.inner.read();
        inner.position(id).map(|pos| inner.records[pos].clone())
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.inner.read().records.clone()
    }

    /// メモリ上に追加する。flushはしない。
    pub fn append(&self, record: T) {
        self.write().push(record);
    }

    /// IDで1件を更新する。`f` が失敗した場合レコードは変更されない。
    pub fn update<O, F>(&self, id: &str, f: F) -> Result<Option<O>, AppError>
    where
        F: FnOnce(&mut T) -> Result<O, AppError>,
    {
        self.write().update(id, f)
    }

    /// 全件を保存先に書き戻す。
    pub fn flush(&self) -> Result<(), AppError> {
        self.write().flush()
    }

    /// 未flushの変更があれば書き戻して閉じる。
    pub fn close(self) -> Result<(), AppError> {
        if self.is_dirty() {
            self.flush()?;
        }
        tracing::info!(kind = T::KIND, location = %self.repo.location(), "store closed");
        Ok(())
    }

    /// 排他ロックを取得する。検査・追加・flushを一つの書き込みとして行う場合に使う。
    pub fn write(&self) -> StoreWriter<'_, T, R> {
        StoreWriter {
            repo: &self.repo,
            inner: self.inner.write(),
        }
    }
}

impl<T: Record, R: RecordRepository<T>> Drop for RecordStore<T, R> {
    fn drop(&mut self) {
        if self.inner.get_mut().dirty {
            tracing::warn!(
                kind = T::KIND,
                location = %self.repo.location(),
                "store dropped with unflushed changes"
            );
        }
    }
}

/// 読み込んだファイルの内容が不正。`AppError::CorruptStore` に包んで返す。
#[derive(Debug, thiserror::Error)]
pub enum InvalidRecord {
    #[error("{kind} {id}: {source}")]
    Rule {
        kind: &'static str,
        id: String,
        #[source]
        source: DomainError,
    },
    #[error("{kind} id {id} appears more than once")]
    DuplicateId { kind: &'static str, id: String },
}

/// 全件の不変条件とIDの一意性を検査する。
fn validate_loaded<T: Record>(records: &[T]) -> Result<(), InvalidRecord> {
    let mut seen = std::collections::HashSet::new();
    for record in records {
        record.validate().map_err(|source| InvalidRecord::Rule {
            kind: T::KIND,
            id: record.record_id().to_string(),
            source,
        })?;
        if !seen.insert(record.record_id()) {
            return Err(InvalidRecord::DuplicateId {
                kind: T::KIND,
                id: record.record_id().to_string(),
            });
        }
    }
    Ok(())
}

/// 排他ロック中のストア操作。dropでロックを解放する。
pub struct StoreWriter<'a, T: Record, R: RecordRepository<T>> {
    repo: &'a R,
    inner: RwLockWriteGuard<'a, Inner<T>>,
}

impl<T: Record, R: RecordRepository<T>> StoreWriter<'_, T, R> {
    pub fn records(&self) -> &[T] {
        &self.inner.records
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.position(id).is_some()
    }

    pub fn push(&mut self, record: T) {
        let pos = self.inner.records.len();
        self.inner
            .by_id
            .entry(record.record_id().to_string())
            .or_insert(pos);
        self.inner.records.push(record);
        self.inner.dirty = true;
    }

    pub fn update<O, F>(&mut self, id: &str, f: F) -> Result<Option<O>, AppError>
    where
        F: FnOnce(&mut T) -> Result<O, AppError>,
    {
        let Some(pos) = self.inner.position(id) else {
            return Ok(None);
        };
        // 複製に適用し、成功した場合のみ差し替える
        let mut draft = self.inner.records[pos].clone();
        let out = f(&mut draft)?;
        let id_changed = draft.record_id() != id;
        self.inner.records[pos] = draft;
        if id_changed {
            self.inner.reindex();
        }
        self.inner.dirty = true;
        Ok(Some(out))
    }

    pub fn flush(&mut self) -> Result<(), AppError> {
        self.repo.save(&self.inner.records).map_err(|e| {
            tracing::error!(kind = T::KIND, location = %self.repo.location(), error = %e, "flush failed");
            AppError::Persistence(Box::new(e))
        })?;
        self.inner.dirty = false;
        tracing::info!(
            kind = T::KIND,
            location = %self.repo.location(),
            records = self.inner.records.len(),
            "store flushed"
        );
        Ok(())
    }
}
