use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{BookId, UserId};
use super::loan::Loan;
use crate::domain::error::DomainError;
use crate::domain::repository::Record;

pub const DEFAULT_COVER: &str = "/img/covers/default.jpg";

pub const MIN_RATING: i32 = 0;
pub const MAX_RATING: i32 = 5;

fn default_cover() -> String {
    DEFAULT_COVER.to_string()
}

/// `"cover": null` も既定画像として読む。
fn cover_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let cover: Option<String> = Option::deserialize(deserializer)?;
    Ok(cover.unwrap_or_else(default_cover))
}

/// 蔵書 — 集約ルート。貸出履歴と評価はここを経由して更新する。
///
/// 永続化フォーマットのキー名は既存データファイルと互換
/// （`loan` は貸出履歴、`ratings` は評価件数）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    title: String,
    author: String,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(rename = "loan", default)]
    loans: Vec<Loan>,
    #[serde(default = "default_cover", deserialize_with = "cover_or_default")]
    cover: String,
    #[serde(default)]
    rating: f64,
    #[serde(rename = "ratings", default)]
    rating_count: u32,
    #[serde(default)]
    id: BookId,
}

/// `find_by` で完全一致検索できるフィールド。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookField {
    Id,
    Title,
    Author,
}

impl Book {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        genres: Vec<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            genres,
            description: description.into(),
            loans: Vec::new(),
            cover: default_cover(),
            rating: 0.0,
            rating_count: 0,
            id: BookId::new(),
        }
    }

    /// 既知のIDで生成する（インポート・テスト用）。
    pub fn with_id(mut self, id: BookId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> &BookId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn genres(&self) -> &[String] {
        &self.genres
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn cover(&self) -> &str {
        &self.cover
    }

    pub fn rating(&self) -> f64 {
        self.rating
    }

    pub fn rating_count(&self) -> u32 {
        self.rating_count
    }

    /// 貸出履歴（古い順）。
    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = title.into();
        self
    }

    pub fn set_author(&mut self, author: impl Into<String>) -> &mut Self {
        self.author = author.into();
        self
    }

    pub fn set_genres(&mut self, genres: Vec<String>) -> &mut Self {
        self.genres = genres;
        self
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }

    /// カバー画像URL。Noneで既定画像に戻す。
    pub fn set_cover(&mut self, cover: Option<String>) -> &mut Self {
        self.cover = cover.unwrap_or_else(default_cover);
        self
    }

    // --- 貸出 ---

    pub fn active_loan(&self) -> Option<&Loan> {
        self.loans.iter().find(|l| l.is_active())
    }

    pub fn is_loaned(&self) -> bool {
        self.active_loan().is_some()
    }

    pub fn current_borrower(&self) -> Option<&UserId> {
        self.active_loan().map(|l| l.borrower())
    }

    /// 貸出を追加する。貸出中なら履歴は変更しない。
    pub fn add_loan(&mut self, loan: Loan) -> Result<(), DomainError> {
        if self.is_loaned() {
            return Err(DomainError::BookAlreadyLoaned(self.id.clone()));
        }
        self.loans.push(loan);
        Ok(())
    }

    /// 貸出中のLoanを返却済みにする。
    pub fn return_loan(&mut self, at: DateTime<Utc>) -> Result<&Loan, DomainError> {
        let id = self.id.clone();
        let loan = self
            .loans
            .iter_mut()
            .find(|l| l.is_active())
            .ok_or(DomainError::NoActiveLoan(id))?;
        loan.mark_returned(at)?;
        Ok(loan)
    }

    // --- 評価 ---

    /// 評価を1件加え、新しい平均値を返す。範囲外なら状態は変えない。
    pub fn add_rating(&mut self, rating: i32) -> Result<f64, DomainError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(DomainError::InvalidRating(rating));
        }
        // 逐次平均: rating*n の積を作らずに更新する
        let n = f64::from(self.rating_count) + 1.0;
        self.rating += (f64::from(rating) - self.rating) / n;
        self.rating = self
            .rating
            .clamp(f64::from(MIN_RATING), f64::from(MAX_RATING));
        self.rating_count += 1;
        Ok(self.rating)
    }
}

impl Record for Book {
    type Field = BookField;

    const KIND: &'static str = "book";

    fn record_id(&self) -> &str {
        self.id.as_str()
    }

    fn field_value(&self, field: BookField) -> &str {
        match field {
            BookField::Id => self.id.as_str(),
            BookField::Title => &self.title,
            BookField::Author => &self.author,
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        for loan in &self.loans {
            loan.validate()?;
        }
        if self.loans.iter().filter(|l| l.is_active()).count() > 1 {
            return Err(DomainError::MultipleActiveLoans(self.id.clone()));
        }
        if !(f64::from(MIN_RATING)..=f64::from(MAX_RATING)).contains(&self.rating) {
            return Err(DomainError::RatingOutOfRange(self.rating));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn make_book() -> Book {
        Book::new(
            "T",
            "Some Author",
            vec!["Fantasy".into()],
            "A small blurb",
        )
    }

    fn loan_for(user: &str) -> Loan {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        Loan::new(user.into(), at, at + Duration::days(14)).unwrap()
    }

    #[test]
    fn new_book_defaults() {
        let book = make_book();
        assert_eq!(book.cover(), DEFAULT_COVER);
        assert_eq!(book.rating(), 0.0);
        assert_eq!(book.rating_count(), 0);
        assert!(book.id().as_str().starts_with("book_"));
        assert!(!book.is_loaned());
    }

    #[test]
    fn rating_scenario() {
        let mut book = make_book();
        assert_eq!(book.add_rating(4).unwrap(), 4.0);
        assert_eq!(book.rating_count(), 1);
        assert_eq!(book.add_rating(2).unwrap(), 3.0);
        assert_eq!(book.rating_count(), 2);
    }

    #[test]
    fn reject_out_of_range_rating() {
        let mut book = make_book();
        book.add_rating(5).unwrap();

        assert!(matches!(
            book.add_rating(6),
            Err(DomainError::InvalidRating(6))
        ));
        assert!(matches!(
            book.add_rating(-1),
            Err(DomainError::InvalidRating(-1))
        ));
        assert_eq!(book.rating(), 5.0);
        assert_eq!(book.rating_count(), 1);
    }

    #[test]
    fn second_loan_rejected_while_active() {
        let mut book = make_book();
        book.add_loan(loan_for("user_a")).unwrap();
        assert!(book.is_loaned());

        let result = book.add_loan(loan_for("user_b"));
        assert!(matches!(result, Err(DomainError::BookAlreadyLoaned(_))));
        assert_eq!(book.loans().len(), 1);
        assert_eq!(book.current_borrower(), Some(&UserId::from("user_a")));
    }

    #[test]
    fn loan_after_return_is_accepted() {
        let mut book = make_book();
        book.add_loan(loan_for("user_a")).unwrap();
        let back = Utc.with_ymd_and_hms(2024, 5, 5, 9, 0, 0).unwrap();
        book.return_loan(back).unwrap();
        assert!(!book.is_loaned());

        book.add_loan(loan_for("user_b")).unwrap();
        assert_eq!(book.loans().len(), 2);
        assert_eq!(book.current_borrower(), Some(&UserId::from("user_b")));
    }

    #[test]
    fn return_without_active_loan_fails() {
        let mut book = make_book();
        let result = book.return_loan(Utc::now());
        assert!(matches!(result, Err(DomainError::NoActiveLoan(_))));
    }

    #[test]
    fn setters_chain_and_cover_resets() {
        let mut book = make_book();
        book.set_title("New")
            .set_author("Other")
            .set_cover(Some("https://covers.example/1.jpg".into()));
        assert_eq!(book.title(), "New");
        assert_eq!(book.author(), "Other");
        assert_eq!(book.cover(), "https://covers.example/1.jpg");

        book.set_cover(None);
        assert_eq!(book.cover(), DEFAULT_COVER);
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let json = r#"{"title":"Dune","author":"Frank Herbert","genres":["SF"],"description":"d"}"#;
        let book: Book = serde_json::from_str(json).unwrap();
        assert_eq!(book.cover(), DEFAULT_COVER);
        assert!(book.loans().is_empty());
        assert!(book.id().as_str().starts_with("book_"));
    }

    #[test]
    fn validate_rejects_broken_loan_history() {
        let json = r#"{"title":"T","author":"A","id":"book_bad","loan":[
            {"borrower":"user_a","checked_out_at":"2024-01-01T09:00:00Z","due_at":"2024-01-15T09:00:00Z"},
            {"borrower":"user_b","checked_out_at":"2024-01-02T09:00:00Z","due_at":"2024-01-16T09:00:00Z"}
        ]}"#;
        let book: Book = serde_json::from_str(json).unwrap();
        assert!(matches!(
            book.validate(),
            Err(DomainError::MultipleActiveLoans(_))
        ));

        let json = r#"{"title":"T","author":"A","loan":[
            {"borrower":"user_a","checked_out_at":"2024-01-15T09:00:00Z","due_at":"2024-01-01T09:00:00Z"}
        ]}"#;
        let book: Book = serde_json::from_str(json).unwrap();
        assert!(matches!(book.validate(), Err(DomainError::InvalidLoanPeriod)));

        let json = r#"{"title":"T","author":"A","rating":7.5,"ratings":2}"#;
        let book: Book = serde_json::from_str(json).unwrap();
        assert!(matches!(book.validate(), Err(DomainError::RatingOutOfRange(_))));
    }

    #[test]
    fn validate_accepts_built_book() {
        let mut book = make_book();
        book.add_loan(loan_for("user_a")).unwrap();
        book.add_rating(4).unwrap();
        assert!(book.validate().is_ok());
    }

    #[test]
    fn field_lookup() {
        let book = make_book().with_id("book_x".into());
        assert_eq!(book.field_value(BookField::Id), "book_x");
        assert_eq!(book.field_value(BookField::Author), "Some Author");
    }
}
