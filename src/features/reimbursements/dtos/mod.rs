mod reimbursement_dto;

pub use reimbursement_dto::{
    AttachmentUpload, BudgetStatusDto, DecideReimbursementDto, ReimbursementMetricsDto,
    ReimbursementResponseDto, SubmitReimbursementDto,
};
