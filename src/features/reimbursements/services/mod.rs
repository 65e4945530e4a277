mod budget_checker;
mod reimbursement_service;

pub use budget_checker::BudgetChecker;
pub use reimbursement_service::ReimbursementService;
