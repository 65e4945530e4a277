//! Employee expense reimbursement tracker.
//!
//! Employees submit reimbursements against monthly per-category budgets,
//! reviewers approve or reject them, and administrators manage categories.
//! Services take the acting user explicitly; transport and authentication
//! live outside this crate.

pub mod core;
pub mod features;
pub mod modules;
pub mod shared;
