use super::model::id::BookId;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("book already loaned: {0}")]
    BookAlreadyLoaned(BookId),

    #[error("book has no active loan: {0}")]
    NoActiveLoan(BookId),

    #[error("loan already returned")]
    LoanAlreadyReturned,

    #[error("loan due date precedes its checkout date")]
    InvalidLoanPeriod,

    #[error("loan returned before it was checked out")]
    InvalidReturnDate,

    #[error("book has more than one active loan: {0}")]
    MultipleActiveLoans(BookId),

    #[error("stored rating {0} is outside 0..=5")]
    RatingOutOfRange(f64),

    #[error("invalid rating {0}: must be between 0 and 5")]
    InvalidRating(i32),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}
