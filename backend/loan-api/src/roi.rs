//! Point-in-time simple-interest return estimate.
//!
//! ```text
//! years         = hours since approval / (24 × 365)
//! totalInterest = principal × (rate / 100) × years
//! ROI %         = totalInterest / principal × 100
//!               = (rate / 100) × years × 100
//! ```
//!
//! No leap years, no compounding, no repayments.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::errors::{LoanError, Result};
use crate::loan::Loan;

const SECONDS_PER_HOUR: i64 = 3_600;
const HOURS_PER_YEAR: i64 = 24 * 365;
const ROI_DECIMAL_PLACES: u32 = 8;

/// ROI in percent for `loan` as of `now`.
pub fn compute_roi(loan: &Loan, now: DateTime<Utc>) -> Result<Decimal> {
    let approved_at = loan.approval_date().ok_or_else(|| {
        LoanError::Precondition(format!("loan {} has not been approved", loan.id))
    })?;
    if loan.principal.is_zero() {
        return Err(LoanError::Precondition(format!(
            "loan {} has a zero principal",
            loan.id
        )));
    }
    if now < approved_at {
        return Err(LoanError::Precondition(format!(
            "ROI requested at {now}, before approval date {approved_at}"
        )));
    }

    let elapsed_hours =
        Decimal::from((now - approved_at).num_seconds()) / Decimal::from(SECONDS_PER_HOUR);
    let elapsed_years = elapsed_hours / Decimal::from(HOURS_PER_YEAR);
    let rate = loan.rate / Decimal::ONE_HUNDRED;

    // Principal cancels out of totalInterest / principal.
    let roi = rate
        .checked_mul(elapsed_years)
        .and_then(|fraction| fraction.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(|| {
            LoanError::Precondition(format!(
                "ROI for loan {} is outside the representable range",
                loan.id
            ))
        })?;
    Ok(roi.round_dp(ROI_DECIMAL_PLACES))
}
