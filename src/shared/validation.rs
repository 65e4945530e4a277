use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use validator::ValidationError;

lazy_static! {
    /// Regex for permission names: `<resource>.<ability>`
    /// - Valid: "reimbursement.view_all", "activity-log.view", "user.assign_role"
    /// - Invalid: "reimbursement", ".view", "Reimbursement.View", "user.assign-role"
    pub static ref PERMISSION_REGEX: Regex =
        Regex::new(r"^[a-z][a-z-]*\.[a-z][a-z_]*$").unwrap();

    /// Regex for role names: lowercase words joined by underscores
    /// - Valid: "admin", "finance_manager"
    /// - Invalid: "Admin", "_admin", "finance manager"
    pub static ref ROLE_REGEX: Regex = Regex::new(r"^[a-z][a-z0-9_]*$").unwrap();
}

/// Largest value a `NUMERIC(15, 2)` money column holds
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_319, 232_830, 0, false, 2);

/// Money is stored with two decimal places
pub const AMOUNT_SCALE: u32 = 2;

/// Shared bounds for money fields: at most two decimal places and no larger than `MAX_AMOUNT`
fn validate_money_bounds(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.normalize().scale() > AMOUNT_SCALE {
        let mut err = ValidationError::new("scale");
        err.message = Some("value must not have more than 2 decimal places".into());
        return Err(err);
    }
    if *amount > MAX_AMOUNT {
        let mut err = ValidationError::new("max");
        err.message = Some(format!("value must not be greater than {}", MAX_AMOUNT).into());
        return Err(err);
    }
    Ok(())
}

/// Amount must be strictly greater than zero and fit the money column
pub fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        let mut err = ValidationError::new("positive");
        err.message = Some("amount must be greater than 0".into());
        return Err(err);
    }
    validate_money_bounds(amount)
}

/// Amount may be zero but never negative, and must fit the money column
pub fn validate_non_negative_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("value must be at least 0".into());
        return Err(err);
    }
    validate_money_bounds(amount)
}

/// Rejects strings that are empty once surrounding whitespace is removed
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("field is required".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_regex_valid() {
        assert!(PERMISSION_REGEX.is_match("reimbursement.view_all"));
        assert!(PERMISSION_REGEX.is_match("activity-log.view"));
        assert!(PERMISSION_REGEX.is_match("user.assign_role"));
    }

    #[test]
    fn test_permission_regex_invalid() {
        assert!(!PERMISSION_REGEX.is_match("reimbursement")); // no ability
        assert!(!PERMISSION_REGEX.is_match(".view")); // no resource
        assert!(!PERMISSION_REGEX.is_match("Reimbursement.View")); // uppercase
        assert!(!PERMISSION_REGEX.is_match("user.assign-role")); // hyphen in ability
        assert!(!PERMISSION_REGEX.is_match("")); // empty
    }

    #[test]
    fn test_role_regex() {
        assert!(ROLE_REGEX.is_match("admin"));
        assert!(ROLE_REGEX.is_match("finance_manager"));
        assert!(!ROLE_REGEX.is_match("Admin"));
        assert!(!ROLE_REGEX.is_match("_admin"));
        assert!(!ROLE_REGEX.is_match("finance manager"));
    }

    #[test]
    fn test_amount_validators() {
        assert!(validate_positive_amount(&Decimal::new(1, 2)).is_ok());
        assert!(validate_positive_amount(&Decimal::ZERO).is_err());
        assert!(validate_positive_amount(&Decimal::new(-5, 0)).is_err());

        assert!(validate_non_negative_amount(&Decimal::ZERO).is_ok());
        assert!(validate_non_negative_amount(&Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn test_max_amount_matches_column_range() {
        assert_eq!(MAX_AMOUNT, Decimal::new(999_999_999_999_999, 2));
        assert_eq!(MAX_AMOUNT.to_string(), "9999999999999.99");
    }

    #[test]
    fn test_amount_scale_and_upper_bound() {
        // 0.001 would round to 0.00 in NUMERIC(15, 2)
        let err = validate_positive_amount(&Decimal::new(1, 3)).unwrap_err();
        assert_eq!(err.code, "scale");
        // Trailing zeros are fine
        assert!(validate_positive_amount(&Decimal::new(1_500, 3)).is_ok());

        assert!(validate_positive_amount(&MAX_AMOUNT).is_ok());
        let err = validate_positive_amount(&(MAX_AMOUNT + Decimal::new(1, 2))).unwrap_err();
        assert_eq!(err.code, "max");
        assert!(validate_positive_amount(&Decimal::MAX).is_err());

        assert!(validate_non_negative_amount(&MAX_AMOUNT).is_ok());
        assert!(validate_non_negative_amount(&Decimal::MAX).is_err());
        assert!(validate_non_negative_amount(&Decimal::new(5, 3)).is_err());
    }

    #[test]
    fn test_not_blank() {
        assert!(validate_not_blank("Taxi").is_ok());
        assert!(validate_not_blank("   ").is_err());
    }
}
