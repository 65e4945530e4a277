//! Notifier collaborator: tells reviewers about new submissions.
//!
//! Delivery is pluggable through [`Notifier`]; [`TracingNotifier`] writes each
//! message as a structured log line.

mod template;

pub use template::format_rupiah;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::reimbursements::models::Reimbursement;
use crate::features::users::models::User;
use template::{render_submission, SubmissionTemplateContext};

pub const SUBMISSION_SUBJECT: &str = "New Reimbursement Submission";

/// Where reviewers find pending submissions
const REVIEW_URL: &str = "/manager/reimbursements";

/// A new submission, resolved with the names the message needs
#[derive(Debug, Clone)]
pub struct SubmissionNotice {
    pub reimbursement: Reimbursement,
    pub submitter_name: String,
    pub category_name: String,
}

/// Structured data attached to every submission notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub reimbursement_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub subject: String,
    pub body: String,
    pub payload: NotificationPayload,
}

impl SubmissionNotice {
    pub fn payload(&self) -> NotificationPayload {
        NotificationPayload {
            reimbursement_id: self.reimbursement.id,
            amount: self.reimbursement.amount,
        }
    }

    /// Render the message addressed to one recipient
    pub fn render_for(&self, recipient: &User) -> Result<NotificationMessage> {
        let body = render_submission(&SubmissionTemplateContext {
            recipient_name: &recipient.name,
            submitter_name: &self.submitter_name,
            title: &self.reimbursement.title,
            amount: self.reimbursement.amount,
            category_name: &self.category_name,
            review_url: REVIEW_URL,
        })?;

        Ok(NotificationMessage {
            subject: SUBMISSION_SUBJECT.to_string(),
            body,
            payload: self.payload(),
        })
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &SubmissionNotice, recipients: &[User]) -> Result<()>;
}

/// Notifier that only logs the rendered messages
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notice: &SubmissionNotice, recipients: &[User]) -> Result<()> {
        for recipient in recipients {
            let message = notice.render_for(recipient)?;
            tracing::info!(
                recipient = %recipient.email,
                reimbursement_id = %message.payload.reimbursement_id,
                amount = %message.payload.amount,
                "{}\n{}",
                message.subject,
                message.body
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_helpers::{pending_reimbursement, user};

    #[test]
    fn test_render_for_recipient() {
        let manager = user("Sari Manager", &["manager"]);
        let notice = SubmissionNotice {
            reimbursement: pending_reimbursement(Uuid::now_v7(), Uuid::now_v7(), 1_000_000),
            submitter_name: "Budi".to_string(),
            category_name: "Transportasi".to_string(),
        };

        let message = notice.render_for(&manager).unwrap();
        assert_eq!(message.subject, "New Reimbursement Submission");
        assert!(message.body.contains("Hello Sari Manager"));
        assert!(message.body.contains("Rp 1.000.000"));
        assert_eq!(message.payload.reimbursement_id, notice.reimbursement.id);
        assert_eq!(message.payload.amount, notice.reimbursement.amount);
    }

    #[tokio::test]
    async fn test_tracing_notifier_accepts_empty_recipients() {
        let notice = SubmissionNotice {
            reimbursement: pending_reimbursement(Uuid::now_v7(), Uuid::now_v7(), 5_000),
            submitter_name: "Budi".to_string(),
            category_name: "Konsumsi".to_string(),
        };
        assert!(TracingNotifier.notify(&notice, &[]).await.is_ok());
    }
}
