//! Shared test harness for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use library_store::application::books::BookManager;
use library_store::application::users::UserManager;
use library_store::config::WritePolicy;
use library_store::domain::error::DomainError;
use library_store::domain::model::book::Book;
use library_store::domain::model::user::{Role, User};
use library_store::domain::password::PasswordScheme;
use library_store::domain::repository::{Record, RecordRepository};

// =============================================================================
// InMemoryRepo — テスト用リポジトリ
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum InMemoryError {
    #[error("in-memory store: simulated write failure")]
    WriteFailed,
    #[error("in-memory store: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Default)]
struct Shared {
    json: Mutex<Option<String>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

/// ファイルI/O不要のインメモリリポジトリ。
/// Cloneしたハンドルはマネージャーに渡した後も同じ内容を観察できる。
#[derive(Clone, Default)]
pub struct InMemoryRepo {
    shared: Arc<Shared>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// 生のJSONを保存済み内容として置く。
    pub fn with_json(json: &str) -> Self {
        let repo = Self::new();
        *repo.shared.json.lock() = Some(json.to_string());
        repo
    }

    pub fn with_records<T: Record>(records: &[T]) -> Self {
        Self::with_json(&serde_json::to_string(records).unwrap())
    }

    pub fn save_count(&self) -> usize {
        self.shared.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.shared.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn stored<T: Record>(&self) -> Vec<T> {
        match self.shared.json.lock().as_deref() {
            Some(json) => serde_json::from_str(json).unwrap(),
            None => Vec::new(),
        }
    }
}

impl<T: Record> RecordRepository<T> for InMemoryRepo {
    type Error = InMemoryError;

    fn load(&self) -> Result<Vec<T>, Self::Error> {
        match self.shared.json.lock().as_deref() {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, records: &[T]) -> Result<(), Self::Error> {
        if self.shared.fail_saves.load(Ordering::SeqCst) {
            return Err(InMemoryError::WriteFailed);
        }
        let json = serde_json::to_string(records)?;
        *self.shared.json.lock() = Some(json);
        self.shared.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

// =============================================================================
// PlainScheme — 高速なテスト用PasswordScheme
// =============================================================================

/// 接頭辞を付けるだけのスキーム。照合回数を数える。
#[derive(Default)]
pub struct PlainScheme {
    verifications: AtomicUsize,
}

impl PlainScheme {
    pub fn verifications(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }
}

impl PasswordScheme for PlainScheme {
    fn hash(&self, plaintext: &str) -> Result<String, DomainError> {
        Ok(format!("plain${plaintext}"))
    }

    fn verify(&self, candidate: &str, stored_hash: &str) -> bool {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        stored_hash == format!("plain${candidate}")
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn flush_on_write() -> WritePolicy {
    WritePolicy {
        flush_on_write: true,
    }
}

pub fn batched() -> WritePolicy {
    WritePolicy {
        flush_on_write: false,
    }
}

pub fn user_manager(
    repo: InMemoryRepo,
    policy: WritePolicy,
) -> (UserManager<InMemoryRepo>, Arc<PlainScheme>) {
    let scheme = Arc::new(PlainScheme::default());
    let manager = UserManager::open(repo, scheme.clone(), policy).unwrap();
    (manager, scheme)
}

pub fn book_manager(repo: InMemoryRepo, policy: WritePolicy) -> BookManager<InMemoryRepo> {
    BookManager::open(repo, policy).unwrap()
}

/// `plain$<password>` でハッシュ済みの利用者。
pub fn user(email: &str, password: &str) -> User {
    User::new("Test", "User", email, format!("plain${password}"), Role::User)
}

pub fn book(title: &str, id: &str) -> Book {
    Book::new(title, "Test Author", vec!["Fiction".into()], "blurb").with_id(id.into())
}

pub fn day(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, n, 9, 0, 0).unwrap()
}

pub fn two_weeks_from(at: DateTime<Utc>) -> DateTime<Utc> {
    at + Duration::days(14)
}

// =============================================================================
// Assertion helpers
// =============================================================================

/// 結果がErrで、メッセージに指定文字列を含むことをassert。
pub fn assert_error_contains<T: std::fmt::Debug>(
    result: Result<T, impl std::fmt::Display>,
    expected: &str,
) {
    match result {
        Err(e) => {
            let msg = e.to_string();
            assert!(
                msg.contains(expected),
                "Expected error containing '{expected}', got: '{msg}'"
            );
        }
        Ok(v) => panic!("Expected error containing '{expected}', got Ok({v:?})"),
    }
}
