//! The canonical loan entity and its lifecycle states.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a loan.
///
/// ```text
/// Proposed ──► Approved ──► Invested ──► Disbursed
/// ```
///
/// Transitions are strictly forward and never skip a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanState {
    Proposed,
    Approved,
    Invested,
    Disbursed,
}

impl LoanState {
    pub const ALL: [LoanState; 4] = [
        LoanState::Proposed,
        LoanState::Approved,
        LoanState::Invested,
        LoanState::Disbursed,
    ];

    /// Short identifier used in storage and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Approved => "approved",
            Self::Invested => "invested",
            Self::Disbursed => "disbursed",
        }
    }

    /// The only state this one may move to, or `None` once disbursed.
    pub fn next(&self) -> Option<LoanState> {
        match self {
            Self::Proposed => Some(Self::Approved),
            Self::Approved => Some(Self::Invested),
            Self::Invested => Some(Self::Disbursed),
            Self::Disbursed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for LoanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proposed" => Ok(Self::Proposed),
            "approved" => Ok(Self::Approved),
            "invested" => Ok(Self::Invested),
            "disbursed" => Ok(Self::Disbursed),
            other => Err(format!("unknown loan state '{other}'")),
        }
    }
}

/// Fields recorded when a field validator approves the loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub proof_image_url: String,
    pub field_validator_id: String,
    pub approval_date: DateTime<Utc>,
}

/// Fields recorded when the funds are handed to the borrower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disbursement {
    pub agreement_letter_url: String,
    pub field_officer_id: String,
    pub disbursement_date: DateTime<Utc>,
}

/// A validated loan proposal that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoan {
    pub borrower_id: String,
    pub principal: Decimal,
    /// Annual interest rate as a percentage (5.5 means 5.5 %).
    pub rate: Decimal,
}

/// A persisted loan.
///
/// The approval and disbursement sub-records are `None` until the matching
/// transition has happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: i64,
    pub borrower_id: String,
    #[serde(rename = "principalAmount", with = "rust_decimal::serde::float")]
    pub principal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    pub state: LoanState,
    #[serde(flatten)]
    pub approval: Option<Approval>,
    #[serde(with = "rust_decimal::serde::float")]
    pub invested_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investor_id: Option<String>,
    #[serde(flatten)]
    pub disbursement: Option<Disbursement>,
    /// Bumped by the store on every successful save.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// Principal not yet covered by investment.
    pub fn remaining_capacity(&self) -> Decimal {
        (self.principal - self.invested_amount).max(Decimal::ZERO)
    }

    pub fn approval_date(&self) -> Option<DateTime<Utc>> {
        self.approval.as_ref().map(|a| a.approval_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn state_round_trips_through_its_storage_name() {
        for state in LoanState::ALL {
            assert_eq!(state.as_str().parse::<LoanState>(), Ok(state));
        }
        assert!("cancelled".parse::<LoanState>().is_err());
    }

    #[test]
    fn states_progress_linearly() {
        assert_eq!(LoanState::Proposed.next(), Some(LoanState::Approved));
        assert_eq!(LoanState::Approved.next(), Some(LoanState::Invested));
        assert_eq!(LoanState::Invested.next(), Some(LoanState::Disbursed));
        assert_eq!(LoanState::Disbursed.next(), None);
        assert!(LoanState::Disbursed.is_terminal());

        for pair in LoanState::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].next(), Some(pair[1]));
        }
    }

    #[test]
    fn serializes_with_camel_case_and_omits_unset_fields() {
        let now = Utc::now();
        let loan = Loan {
            id: 1,
            borrower_id: "12345".to_string(),
            principal: dec!(50000),
            rate: dec!(5.5),
            state: LoanState::Proposed,
            approval: None,
            invested_amount: Decimal::ZERO,
            investor_id: None,
            disbursement: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&loan).unwrap();
        assert_eq!(json["borrowerId"], "12345");
        assert_eq!(json["principalAmount"], 50000.0);
        assert_eq!(json["rate"], 5.5);
        assert_eq!(json["state"], "proposed");
        assert!(json.get("approvalDate").is_none());
        assert!(json.get("proofImageUrl").is_none());
        assert!(json.get("disbursementDate").is_none());
        assert!(json.get("investorId").is_none());
    }

    #[test]
    fn remaining_capacity_never_goes_negative() {
        let now = Utc::now();
        let mut loan = Loan {
            id: 1,
            borrower_id: "b".to_string(),
            principal: dec!(100),
            rate: dec!(1),
            state: LoanState::Approved,
            approval: None,
            invested_amount: dec!(40),
            investor_id: None,
            disbursement: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(loan.remaining_capacity(), dec!(60));
        loan.invested_amount = dec!(120);
        assert_eq!(loan.remaining_capacity(), Decimal::ZERO);
    }
}
