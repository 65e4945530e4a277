//! Modules layer - Infrastructure components for external integrations
//!
//! Contains the ledger store backends and the notifier, audit and file
//! storage collaborators used by the reimbursement workflow.

pub mod audit;
pub mod ledger;
pub mod notifier;
pub mod storage;
