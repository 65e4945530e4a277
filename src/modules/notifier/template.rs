use std::sync::OnceLock;

use minijinja::{context, Environment};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::core::error::{AppError, Result};

const SUBMISSION_TEMPLATE: &str = "notifications/new_reimbursement_submission.jinja";

/// Global template environment
static TEMPLATE_ENV: OnceLock<Environment<'static>> = OnceLock::new();

fn environment() -> &'static Environment<'static> {
    TEMPLATE_ENV.get_or_init(|| {
        let mut env = Environment::new();
        if let Err(e) = env.add_template(
            SUBMISSION_TEMPLATE,
            include_str!("../../../templates/notifications/new_reimbursement_submission.jinja"),
        ) {
            tracing::warn!("Failed to load template {}: {}", SUBMISSION_TEMPLATE, e);
        }
        env
    })
}

/// Format an amount as Rupiah: whole units, `.` as thousands separator.
///
/// Fractions are truncated, e.g. `1000000.75` becomes `Rp 1.000.000`.
pub fn format_rupiah(amount: Decimal) -> String {
    let whole = amount.trunc().to_i128().unwrap_or_default();
    let digits = whole.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if whole < 0 {
        format!("Rp -{}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

pub struct SubmissionTemplateContext<'a> {
    pub recipient_name: &'a str,
    pub submitter_name: &'a str,
    pub title: &'a str,
    pub amount: Decimal,
    pub category_name: &'a str,
    pub review_url: &'a str,
}

pub fn render_submission(ctx: &SubmissionTemplateContext<'_>) -> Result<String> {
    let template = environment()
        .get_template(SUBMISSION_TEMPLATE)
        .map_err(|e| AppError::Internal(format!("Template '{}' not found: {}", SUBMISSION_TEMPLATE, e)))?;

    template
        .render(context! {
            recipient_name => ctx.recipient_name,
            submitter_name => ctx.submitter_name,
            title => ctx.title,
            amount => format_rupiah(ctx.amount),
            category_name => ctx.category_name,
            review_url => ctx.review_url,
        })
        .map_err(|e| AppError::Internal(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rupiah() {
        assert_eq!(format_rupiah(Decimal::new(1_000_000, 0)), "Rp 1.000.000");
        assert_eq!(format_rupiah(Decimal::new(700, 0)), "Rp 700");
        assert_eq!(format_rupiah(Decimal::new(12_345_678, 0)), "Rp 12.345.678");
        assert_eq!(format_rupiah(Decimal::ZERO), "Rp 0");
    }

    #[test]
    fn test_format_rupiah_truncates_fraction() {
        assert_eq!(format_rupiah(Decimal::new(100_000_075, 2)), "Rp 1.000.000");
        assert_eq!(format_rupiah(Decimal::new(99_999, 2)), "Rp 999");
    }

    #[test]
    fn test_render_submission() {
        let body = render_submission(&SubmissionTemplateContext {
            recipient_name: "Sari",
            submitter_name: "Budi",
            title: "Tiket kereta",
            amount: Decimal::new(350_000, 0),
            category_name: "Transportasi",
            review_url: "/manager/reimbursements",
        })
        .unwrap();

        assert!(body.starts_with("Hello Sari,"));
        assert!(body.contains("made by Budi"));
        assert!(body.contains("Title: Tiket kereta"));
        assert!(body.contains("Amount: Rp 350.000"));
        assert!(body.contains("Category: Transportasi"));
        assert!(body.contains("Please review it as soon as possible."));
    }
}
