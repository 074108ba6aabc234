//! Persistence interface the HTTP layer depends on.

use async_trait::async_trait;

use crate::errors::Result;
use crate::loan::{Loan, NewLoan};

#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Insert a new loan in `proposed` state and return it with its id.
    async fn create(&self, loan: NewLoan) -> Result<Loan>;

    /// Load a loan, or [`LoanError::NotFound`](crate::errors::LoanError::NotFound).
    async fn find_by_id(&self, id: i64) -> Result<Loan>;

    /// Write back a loan previously read from this store.
    ///
    /// The write only succeeds if nobody saved the loan since it was read;
    /// otherwise [`LoanError::Conflict`](crate::errors::LoanError::Conflict).
    /// Returns the stored loan with its new version.
    async fn save(&self, loan: &Loan) -> Result<Loan>;
}
