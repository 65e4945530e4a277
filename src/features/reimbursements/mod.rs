//! Reimbursement workflow feature.
//!
//! Employees submit reimbursements against monthly category budgets, reviewers
//! approve or reject them, and the event dispatcher forwards the resulting
//! domain events to the notifier and audit recorder.

pub mod dtos;
pub mod models;
pub mod services;
pub mod workers;

pub use services::{BudgetChecker, ReimbursementService};
pub use workers::EventDispatcher;
