//! Access policy: role to permission mapping and the allow/deny decisions
//! consulted before every reimbursement and category operation.

mod policy;

pub use policy::{AccessPolicy, Action, ViewScope};
