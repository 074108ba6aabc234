//! Loan state machine.
//!
//! Every transition is guarded by a single state-equality check and then by
//! payload validation. All checks run before the first field is written, so
//! a rejected transition leaves the loan exactly as it was.

use rust_decimal::Decimal;
use tracing::debug;

use crate::errors::{LoanError, Result};
use crate::loan::{Approval, Disbursement, Loan, LoanState, NewLoan};

/// Highest accepted annual rate, in percent.
const MAX_RATE_PERCENT: Decimal = Decimal::ONE_HUNDRED;

/// Validate a proposal. The returned [`NewLoan`] is created in
/// [`LoanState::Proposed`] by the store.
pub fn propose(borrower_id: &str, principal: Decimal, rate: Decimal) -> Result<NewLoan> {
    require_non_empty("borrowerId", borrower_id)?;
    if principal <= Decimal::ZERO {
        return Err(LoanError::Validation(format!(
            "principalAmount must be positive (got {principal})"
        )));
    }
    if rate < Decimal::ZERO || rate > MAX_RATE_PERCENT {
        return Err(LoanError::Validation(format!(
            "rate must be a percentage between 0 and {MAX_RATE_PERCENT} (got {rate})"
        )));
    }

    Ok(NewLoan {
        borrower_id: borrower_id.to_string(),
        principal,
        rate,
    })
}

impl Loan {
    /// Fail with [`LoanError::InvalidState`] unless the loan is in `required`.
    pub fn ensure_state(&self, required: LoanState) -> Result<()> {
        if self.state == required {
            Ok(())
        } else {
            Err(LoanError::InvalidState {
                required,
                actual: self.state,
            })
        }
    }

    /// `proposed` → `approved`.
    pub fn approve(&mut self, approval: Approval) -> Result<()> {
        self.ensure_state(LoanState::Proposed)?;
        require_non_empty("proofImageUrl", &approval.proof_image_url)?;
        require_non_empty("fieldValidatorId", &approval.field_validator_id)?;

        self.approval = Some(approval);
        self.advance(LoanState::Approved);
        Ok(())
    }

    /// `approved` → `invested`.
    ///
    /// The amount is added to the running `invested_amount`, which may never
    /// exceed the principal.
    pub fn invest(&mut self, amount: Decimal, investor_id: Option<String>) -> Result<()> {
        self.ensure_state(LoanState::Approved)?;
        if amount <= Decimal::ZERO {
            return Err(LoanError::Validation(format!(
                "amount must be positive (got {amount})"
            )));
        }
        let available = self.remaining_capacity();
        if amount > available {
            return Err(LoanError::CapacityExceeded {
                requested: amount,
                available,
            });
        }

        self.invested_amount += amount;
        self.investor_id = investor_id;
        self.advance(LoanState::Invested);
        Ok(())
    }

    /// `invested` → `disbursed`.
    pub fn disburse(&mut self, disbursement: Disbursement) -> Result<()> {
        self.ensure_state(LoanState::Invested)?;
        require_non_empty("agreementLetterUrl", &disbursement.agreement_letter_url)?;
        require_non_empty("fieldOfficerId", &disbursement.field_officer_id)?;
        if let Some(approved_at) = self.approval_date() {
            if disbursement.disbursement_date < approved_at {
                return Err(LoanError::Validation(format!(
                    "disbursementDate {} precedes approvalDate {}",
                    disbursement.disbursement_date, approved_at
                )));
            }
        }

        self.disbursement = Some(disbursement);
        self.advance(LoanState::Disbursed);
        Ok(())
    }

    fn advance(&mut self, to: LoanState) {
        debug_assert!(
            !self.state.is_terminal(),
            "loan {} is already {}",
            self.id,
            self.state
        );
        debug_assert_eq!(
            self.state.next(),
            Some(to),
            "invalid transition from {} to {}",
            self.state,
            to
        );
        debug!("Loan {} moving {} → {}", self.id, self.state, to);
        self.state = to;
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(LoanError::Validation(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}
