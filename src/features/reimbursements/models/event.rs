use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Decision, Reimbursement};

/// Events emitted by the workflow after its state change has committed.
/// Consumed by the event dispatcher, never inline.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    SubmissionCreated {
        reimbursement: Reimbursement,
        actor_id: Uuid,
    },
    DecisionRecorded {
        reimbursement: Reimbursement,
        decision: Decision,
        actor_id: Uuid,
    },
    ReimbursementDeleted {
        reimbursement: Reimbursement,
        actor_id: Uuid,
        deleted_at: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn reimbursement(&self) -> &Reimbursement {
        match self {
            DomainEvent::SubmissionCreated { reimbursement, .. }
            | DomainEvent::DecisionRecorded { reimbursement, .. }
            | DomainEvent::ReimbursementDeleted { reimbursement, .. } => reimbursement,
        }
    }

    pub fn actor_id(&self) -> Uuid {
        match self {
            DomainEvent::SubmissionCreated { actor_id, .. }
            | DomainEvent::DecisionRecorded { actor_id, .. }
            | DomainEvent::ReimbursementDeleted { actor_id, .. } => *actor_id,
        }
    }

    /// Short action name stored in audit properties
    pub fn action(&self) -> &'static str {
        match self {
            DomainEvent::SubmissionCreated { .. } => "submitted",
            DomainEvent::DecisionRecorded {
                decision: Decision::Approved,
                ..
            } => "approved",
            DomainEvent::DecisionRecorded {
                decision: Decision::Rejected,
                ..
            } => "rejected",
            DomainEvent::ReimbursementDeleted { .. } => "deleted",
        }
    }

    /// Human readable description stored in the activity log
    pub fn description(&self) -> &'static str {
        match self {
            DomainEvent::SubmissionCreated { .. } => "Reimbursement submission",
            DomainEvent::DecisionRecorded {
                decision: Decision::Approved,
                ..
            } => "Reimbursement approved",
            DomainEvent::DecisionRecorded {
                decision: Decision::Rejected,
                ..
            } => "Reimbursement rejected",
            DomainEvent::ReimbursementDeleted { .. } => "Reimbursement deleted",
        }
    }
}
