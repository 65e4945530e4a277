mod budget;
mod event;
mod reimbursement;

pub use budget::{BudgetCheck, BudgetScope};
pub use event::DomainEvent;
pub use reimbursement::{
    DecideOutcome, Decision, DeletedPolicy, NewReimbursement, Reimbursement, ReimbursementFilter,
    ReimbursementStats, ReimbursementStatus, ReviewDecision,
};
