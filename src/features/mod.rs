pub mod access;
pub mod categories;
pub mod reimbursements;
pub mod users;
