//! Database layer — pool setup, migrations, and the SQLite [`LoanStore`].

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::{LoanError, Result};
use crate::loan::{Approval, Disbursement, Loan, LoanState, NewLoan};
use crate::store::LoanStore;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

const LOAN_COLUMNS: &str = r#"
    id, borrower_id, principal, rate, state,
    approval_date, proof_image_url, field_validator_id,
    invested_amount, investor_id,
    agreement_letter_url, field_officer_id, disbursement_date,
    version, created_at, updated_at
"#;

/// A loan row exactly as stored; decimals are kept as TEXT.
#[derive(Debug, sqlx::FromRow)]
struct LoanRow {
    id: i64,
    borrower_id: String,
    principal: String,
    rate: String,
    state: String,
    approval_date: Option<DateTime<Utc>>,
    proof_image_url: Option<String>,
    field_validator_id: Option<String>,
    invested_amount: String,
    investor_id: Option<String>,
    agreement_letter_url: Option<String>,
    field_officer_id: Option<String>,
    disbursement_date: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LoanRow> for Loan {
    type Error = LoanError;

    fn try_from(row: LoanRow) -> Result<Self> {
        let id = row.id;
        let corrupt = |what: String| LoanError::Storage(format!("loan {id}: {what}"));

        let state: LoanState = row.state.parse().map_err(corrupt)?;

        let approval = match (
            row.approval_date,
            row.proof_image_url,
            row.field_validator_id,
        ) {
            (Some(approval_date), Some(proof_image_url), Some(field_validator_id)) => {
                Some(Approval {
                    proof_image_url,
                    field_validator_id,
                    approval_date,
                })
            }
            (None, None, None) => None,
            _ => return Err(corrupt("partially set approval fields".to_string())),
        };

        let disbursement = match (
            row.disbursement_date,
            row.agreement_letter_url,
            row.field_officer_id,
        ) {
            (Some(disbursement_date), Some(agreement_letter_url), Some(field_officer_id)) => {
                Some(Disbursement {
                    agreement_letter_url,
                    field_officer_id,
                    disbursement_date,
                })
            }
            (None, None, None) => None,
            _ => return Err(corrupt("partially set disbursement fields".to_string())),
        };

        if approval.is_some() != (state >= LoanState::Approved) {
            return Err(corrupt(format!("approval fields inconsistent with state {state}")));
        }
        if disbursement.is_some() != (state >= LoanState::Disbursed) {
            return Err(corrupt(format!(
                "disbursement fields inconsistent with state {state}"
            )));
        }

        Ok(Loan {
            id,
            borrower_id: row.borrower_id,
            principal: parse_decimal(id, "principal", &row.principal)?,
            rate: parse_decimal(id, "rate", &row.rate)?,
            state,
            approval,
            invested_amount: parse_decimal(id, "invested_amount", &row.invested_amount)?,
            investor_id: row.investor_id,
            disbursement,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn parse_decimal(id: i64, column: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| LoanError::Storage(format!("loan {id}: bad {column} '{raw}': {e}")))
}

/// [`LoanStore`] backed by a SQLite pool.
#[derive(Clone)]
pub struct SqliteLoanStore {
    pool: SqlitePool,
}

impl SqliteLoanStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanStore for SqliteLoanStore {
    async fn create(&self, loan: NewLoan) -> Result<Loan> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, LoanRow>(&format!(
            r#"
            INSERT INTO loans
                (borrower_id, principal, rate, state, invested_amount, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, '0', 1, ?5, ?5)
            RETURNING {LOAN_COLUMNS}
            "#
        ))
        .bind(&loan.borrower_id)
        .bind(loan.principal.to_string())
        .bind(loan.rate.to_string())
        .bind(LoanState::Proposed.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Loan::try_from(row)
    }

    async fn find_by_id(&self, id: i64) -> Result<Loan> {
        let row = sqlx::query_as::<_, LoanRow>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LoanError::NotFound(id))?;

        Loan::try_from(row)
    }

    async fn save(&self, loan: &Loan) -> Result<Loan> {
        let approval = loan.approval.as_ref();
        let disbursement = loan.disbursement.as_ref();

        // Compare-and-swap on `version` so concurrent read-modify-write
        // cycles on the same loan cannot silently overwrite each other.
        let row = sqlx::query_as::<_, LoanRow>(&format!(
            r#"
            UPDATE loans
            SET    borrower_id = ?1, principal = ?2, rate = ?3, state = ?4,
                   approval_date = ?5, proof_image_url = ?6, field_validator_id = ?7,
                   invested_amount = ?8, investor_id = ?9,
                   agreement_letter_url = ?10, field_officer_id = ?11, disbursement_date = ?12,
                   version = version + 1, updated_at = ?13
            WHERE  id = ?14 AND version = ?15
            RETURNING {LOAN_COLUMNS}
            "#
        ))
        .bind(&loan.borrower_id)
        .bind(loan.principal.to_string())
        .bind(loan.rate.to_string())
        .bind(loan.state.as_str())
        .bind(approval.map(|a| a.approval_date))
        .bind(approval.map(|a| a.proof_image_url.as_str()))
        .bind(approval.map(|a| a.field_validator_id.as_str()))
        .bind(loan.invested_amount.to_string())
        .bind(loan.investor_id.as_deref())
        .bind(disbursement.map(|d| d.agreement_letter_url.as_str()))
        .bind(disbursement.map(|d| d.field_officer_id.as_str()))
        .bind(disbursement.map(|d| d.disbursement_date))
        .bind(Utc::now())
        .bind(loan.id)
        .bind(loan.version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Loan::try_from(row),
            None => {
                let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM loans WHERE id = ?1")
                    .bind(loan.id)
                    .fetch_optional(&self.pool)
                    .await?;
                Err(match exists {
                    Some(_) => LoanError::Conflict(loan.id),
                    None => LoanError::NotFound(loan.id),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::propose;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    async fn memory_store() -> SqliteLoanStore {
        let pool = init_pool("sqlite::memory:", 1).await.unwrap();
        SqliteLoanStore::new(pool)
    }

    fn approval() -> Approval {
        Approval {
            proof_image_url: "proof.jpg".to_string(),
            field_validator_id: "emp123".to_string(),
            approval_date: Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_proposed_state() {
        let store = memory_store().await;
        let loan = store
            .create(propose("12345", dec!(50000), dec!(5.5)).unwrap())
            .await
            .unwrap();

        assert!(loan.id > 0);
        assert_eq!(loan.state, LoanState::Proposed);
        assert_eq!(loan.principal, dec!(50000));
        assert_eq!(loan.rate, dec!(5.5));
        assert_eq!(loan.invested_amount, Decimal::ZERO);
        assert_eq!(loan.version, 1);
        assert!(loan.approval.is_none());
        assert!(loan.disbursement.is_none());

        let second = store
            .create(propose("67890", dec!(100), dec!(1)).unwrap())
            .await
            .unwrap();
        assert_ne!(second.id, loan.id);
    }

    #[tokio::test]
    async fn find_by_id_returns_not_found_for_unknown_ids() {
        let store = memory_store().await;
        assert!(matches!(
            store.find_by_id(404).await,
            Err(LoanError::NotFound(404))
        ));
    }

    #[tokio::test]
    async fn save_persists_transitions_and_bumps_version() {
        let store = memory_store().await;
        let mut loan = store
            .create(propose("12345", dec!(50000), dec!(5.5)).unwrap())
            .await
            .unwrap();

        loan.approve(approval()).unwrap();
        let saved = store.save(&loan).await.unwrap();
        assert_eq!(saved.version, 2);

        let reloaded = store.find_by_id(loan.id).await.unwrap();
        assert_eq!(reloaded.state, LoanState::Approved);
        assert_eq!(reloaded.approval, Some(approval()));
        assert_eq!(reloaded.version, 2);

        let mut reloaded = reloaded;
        reloaded
            .invest(dec!(30000.25), Some("inv-1".to_string()))
            .unwrap();
        store.save(&reloaded).await.unwrap();

        let invested = store.find_by_id(loan.id).await.unwrap();
        assert_eq!(invested.state, LoanState::Invested);
        assert_eq!(invested.invested_amount, dec!(30000.25));
        assert_eq!(invested.investor_id.as_deref(), Some("inv-1"));
    }

    #[tokio::test]
    async fn stale_save_is_a_conflict() {
        let store = memory_store().await;
        let created = store
            .create(propose("12345", dec!(50000), dec!(5.5)).unwrap())
            .await
            .unwrap();

        let mut first = created.clone();
        let mut second = created;
        first.approve(approval()).unwrap();
        second.approve(approval()).unwrap();

        store.save(&first).await.unwrap();
        assert!(matches!(
            store.save(&second).await,
            Err(LoanError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn save_of_unknown_loan_is_not_found() {
        let store = memory_store().await;
        let mut ghost = store
            .create(propose("12345", dec!(50000), dec!(5.5)).unwrap())
            .await
            .unwrap();
        ghost.id += 100;

        assert!(matches!(
            store.save(&ghost).await,
            Err(LoanError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn inconsistent_rows_are_reported_as_corrupt() {
        let store = memory_store().await;
        let loan = store
            .create(propose("12345", dec!(50000), dec!(5.5)).unwrap())
            .await
            .unwrap();

        sqlx::query("UPDATE loans SET state = 'approved' WHERE id = ?1")
            .bind(loan.id)
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(matches!(
            store.find_by_id(loan.id).await,
            Err(LoanError::Storage(_))
        ));
    }
}
