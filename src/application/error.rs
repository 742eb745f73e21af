use crate::domain::error::DomainError;
use crate::domain::model::id::{BookId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// 読み込み失敗。ストアは開けない。
    #[error("corrupt store: {0}")]
    CorruptStore(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// 書き込み失敗。メモリ上の変更は保持され、再flushできる。
    #[error("persistence error: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("book not found: {0}")]
    BookNotFound(BookId),

    #[error("user not found: {0}")]
    UserNotFound(UserId),

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("record id already exists: {0}")]
    DuplicateId(String),
}
