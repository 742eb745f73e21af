use chrono::{DateTime, Utc};

use crate::config::WritePolicy;
use crate::domain::error::DomainError;
use crate::domain::model::book::{Book, BookField};
use crate::domain::model::id::{BookId, UserId};
use crate::domain::model::loan::Loan;
use crate::domain::repository::RecordRepository;

use super::error::AppError;
use super::store::RecordStore;

/// 蔵書のユースケース。変更は RecordStore の排他ロック内で
/// 検証 → 変更 → (方針に応じて) flush の順に行う。
pub struct BookManager<R: RecordRepository<Book>> {
    store: RecordStore<Book, R>,
    policy: WritePolicy,
}

impl<R: RecordRepository<Book>> BookManager<R> {
    pub fn open(repo: R, policy: WritePolicy) -> Result<Self, AppError> {
        Ok(Self {
            store: RecordStore::open(repo)?,
            policy,
        })
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn find_by(&self, field: BookField, value: &str) -> Vec<Book> {
        self.store.find_by(field, value)
    }

    pub fn get(&self, id: &BookId) -> Option<Book> {
        self.store.get(id.as_str())
    }

    pub fn all(&self) -> Vec<Book> {
        self.store.snapshot()
    }

    /// 蔵書を追加する。同じIDが既にあれば `DuplicateId`。
    pub fn add(&self, book: Book) -> Result<(), AppError> {
        let mut writer = self.store.write();
        if writer.contains(book.id().as_str()) {
            return Err(AppError::DuplicateId(book.id().to_string()));
        }
        tracing::info!(book = %book.id(), title = book.title(), "book added");
        writer.push(book);
        if self.policy.flush_on_write {
            writer.flush()?;
        }
        Ok(())
    }

    /// 貸出。貸出中なら `BookAlreadyLoaned`。
    pub fn checkout(
        &self,
        id: &BookId,
        borrower: UserId,
        checked_out_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    ) -> Result<Loan, AppError> {
        let loan = Loan::new(borrower, checked_out_at, due_at)?;
        self.mutate(id, |book| {
            book.add_loan(loan.clone()).inspect_err(|e| {
                tracing::warn!(book = %id, error = %e, "checkout rejected");
            })?;
            Ok(loan)
        })
    }

    /// 返却。貸出中でなければ `NoActiveLoan`。
    pub fn return_book(&self, id: &BookId, at: DateTime<Utc>) -> Result<Loan, AppError> {
        self.mutate(id, |book| Ok(book.return_loan(at)?.clone()))
    }

    /// 評価を加え、新しい平均値を返す。
    pub fn rate(&self, id: &BookId, rating: i32) -> Result<f64, AppError> {
        self.mutate(id, |book| {
            book.add_rating(rating).map_err(|e| {
                if let DomainError::InvalidRating(r) = e {
                    tracing::warn!(book = %id, rating = r, "rating rejected");
                }
                AppError::from(e)
            })
        })
    }

    /// 現在貸出中の本。
    pub fn loaned_books(&self) -> Vec<Book> {
        self.store.query(|b| b.is_loaned())
    }

    /// 期限切れの貸出（本IDと貸出）。
    pub fn overdue_loans(&self, now: DateTime<Utc>) -> Vec<(BookId, Loan)> {
        self.store
            .query(|b| b.active_loan().is_some_and(|l| l.is_overdue(now)))
            .into_iter()
            .filter_map(|b| b.active_loan().cloned().map(|l| (b.id().clone(), l)))
            .collect()
    }

    pub fn flush(&self) -> Result<(), AppError> {
        self.store.flush()
    }

    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    pub fn close(self) -> Result<(), AppError> {
        self.store.close()
    }

    // --- private ---

    fn mutate<O, F>(&self, id: &BookId, f: F) -> Result<O, AppError>
    where
        F: FnOnce(&mut Book) -> Result<O, AppError>,
    {
        let mut writer = self.store.write();
        let out = writer
            .update(id.as_str(), f)?
            .ok_or_else(|| AppError::BookNotFound(id.clone()))?;
        if self.policy.flush_on_write {
            writer.flush()?;
        }
        Ok(out)
    }
}
