//! Users as seen by the reimbursement workflow: stored users and the acting caller.

pub mod models;
