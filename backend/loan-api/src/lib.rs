//! Peer-to-peer loan lifecycle service.
//!
//! A loan moves through a fixed, forward-only lifecycle:
//!
//! | Stage     | Endpoint                       | Records                                   |
//! |-----------|--------------------------------|-------------------------------------------|
//! | Proposed  | `POST /loans`                  | borrower, principal, rate                 |
//! | Approved  | `POST /loans/:id/approve`      | proof image, field validator, date        |
//! | Invested  | `POST /loans/:id/invest`       | invested amount, investor                 |
//! | Disbursed | `POST /loans/:id/disburse`     | agreement letter, field officer, date     |
//!
//! The state machine lives in [`lifecycle`], the ROI estimate in [`roi`].
//! Handlers in [`api`] talk to storage only through the [`store::LoanStore`]
//! trait; [`db`] provides the SQLite implementation.

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod lifecycle;
pub mod loan;
pub mod roi;
pub mod store;
