use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::LibraryConfig;
use crate::domain::model::book::Book;
use crate::domain::model::id::{BookId, UserId};
use crate::domain::model::loan::Loan;
use crate::domain::model::user::User;
use crate::domain::password::PasswordScheme;
use crate::domain::repository::RecordRepository;
use crate::infra::json_store::JsonRecordFile;

use super::books::BookManager;
use super::error::AppError;
use super::users::UserManager;

/// 蔵書と利用者の両ストアをまとめた窓口。
///
/// 2つのストアは独立しており、両方にまたがる操作（貸出・返却）は
/// アトミックではない。本側の変更が成功し利用者側で失敗した場合、
/// 本の貸出記録だけが残る。
pub struct Library<UR: RecordRepository<User>, BR: RecordRepository<Book>> {
    pub users: UserManager<UR>,
    pub books: BookManager<BR>,
}

pub type JsonLibrary = Library<JsonRecordFile<User>, JsonRecordFile<Book>>;

impl JsonLibrary {
    /// 設定に従ってJSONファイルの両ストアを開く。
    pub fn open(config: &LibraryConfig, scheme: Arc<dyn PasswordScheme>) -> Result<Self, AppError> {
        let policy = config.write_policy();
        let users = UserManager::open(JsonRecordFile::new(config.users_path()), scheme, policy)?;
        let books = BookManager::open(JsonRecordFile::new(config.books_path()), policy)?;
        Ok(Self::new(users, books))
    }
}

impl<UR: RecordRepository<User>, BR: RecordRepository<Book>> Library<UR, BR> {
    pub fn new(users: UserManager<UR>, books: BookManager<BR>) -> Self {
        Self { users, books }
    }

    /// 本を利用者に貸し出し、利用者の借用一覧にも記録する。
    pub fn checkout(
        &self,
        book_id: &BookId,
        user_id: &UserId,
        checked_out_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    ) -> Result<Loan, AppError> {
        if self.users.get(user_id).is_none() {
            return Err(AppError::UserNotFound(user_id.clone()));
        }
        let loan = self
            .books
            .checkout(book_id, user_id.clone(), checked_out_at, due_at)?;
        self.users
            .update(user_id, |user| {
                user.add_book(book_id.clone());
                Ok(())
            })
            .inspect_err(|e| {
                tracing::error!(book = %book_id, user = %user_id, error = %e, "loan recorded on book but not on user");
            })?;
        Ok(loan)
    }

    /// 返却し、借り手の借用一覧から外す。借り手が既に存在しなければ本側のみ更新する。
    pub fn return_book(&self, book_id: &BookId, at: DateTime<Utc>) -> Result<Loan, AppError> {
        let loan = self.books.return_book(book_id, at)?;
        let result = self.users.update(loan.borrower(), |user| {
            user.remove_book(book_id);
            Ok(())
        });
        match result {
            Ok(()) => {}
            Err(AppError::UserNotFound(user)) => {
                tracing::warn!(book = %book_id, user = %user, "returned loan of unknown user");
            }
            Err(e) => return Err(e),
        }
        Ok(loan)
    }

    /// 両ストアを閉じる。両方とも試み、最初のエラーを返す。
    pub fn close(self) -> Result<(), AppError> {
        let users = self.users.close();
        let books = self.books.close();
        users.and(books)
    }
}
