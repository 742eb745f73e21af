use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::UserId;
use crate::domain::error::DomainError;

/// 貸出の状態。Active → Returned の一方向のみ遷移する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanState {
    Active,
    Returned,
}

/// 1回分の貸出記録。Bookが所有し、Bookを通じて操作する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    borrower: UserId,
    checked_out_at: DateTime<Utc>,
    due_at: DateTime<Utc>,
    #[serde(default)]
    returned_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn new(
        borrower: UserId,
        checked_out_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if due_at < checked_out_at {
            return Err(DomainError::InvalidLoanPeriod);
        }
        Ok(Self {
            borrower,
            checked_out_at,
            due_at,
            returned_at: None,
        })
    }

    pub fn borrower(&self) -> &UserId {
        &self.borrower
    }

    pub fn checked_out_at(&self) -> DateTime<Utc> {
        self.checked_out_at
    }

    pub fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        self.returned_at
    }

    pub fn state(&self) -> LoanState {
        match self.returned_at {
            Some(_) => LoanState::Returned,
            None => LoanState::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == LoanState::Active
    }

    /// 返却されておらず、期限を過ぎているか。
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now > self.due_at
    }

    /// 期限・返却日時が貸出日時より前でないか。
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.due_at < self.checked_out_at {
            return Err(DomainError::InvalidLoanPeriod);
        }
        match self.returned_at {
            Some(at) if at < self.checked_out_at => Err(DomainError::InvalidReturnDate),
            _ => Ok(()),
        }
    }

    /// Active → Returned。二度目の返却はエラー。
    pub(crate) fn mark_returned(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.is_active() {
            return Err(DomainError::LoanAlreadyReturned);
        }
        self.returned_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn new_loan_is_active() {
        let loan = Loan::new("user_1".into(), start(), start() + Duration::days(14)).unwrap();
        assert_eq!(loan.state(), LoanState::Active);
        assert!(loan.returned_at().is_none());
    }

    #[test]
    fn reject_due_before_checkout() {
        let result = Loan::new("user_1".into(), start(), start() - Duration::days(1));
        assert!(matches!(result, Err(DomainError::InvalidLoanPeriod)));
    }

    #[test]
    fn returns_exactly_once() {
        let mut loan = Loan::new("user_1".into(), start(), start() + Duration::days(14)).unwrap();
        let back = start() + Duration::days(3);
        loan.mark_returned(back).unwrap();
        assert_eq!(loan.state(), LoanState::Returned);

        let again = loan.mark_returned(back + Duration::days(1));
        assert!(matches!(again, Err(DomainError::LoanAlreadyReturned)));
        assert_eq!(loan.returned_at(), Some(back));
    }

    #[test]
    fn overdue_only_while_active() {
        let mut loan = Loan::new("user_1".into(), start(), start() + Duration::days(14)).unwrap();
        let late = start() + Duration::days(20);
        assert!(!loan.is_overdue(start() + Duration::days(2)));
        assert!(loan.is_overdue(late));

        loan.mark_returned(late).unwrap();
        assert!(!loan.is_overdue(late + Duration::days(1)));
    }
}
