//! Validation utilities

use std::collections::HashSet;

use crate::config::ValidationConfig;
use crate::traits::*;
use crate::types::*;

/// Validate that an account code is valid
pub fn validate_account_code(code: &str, max_length: usize) -> LedgerResult<()> {
    if code.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account code cannot be empty".to_string(),
        ));
    }

    if code.len() > max_length {
        return Err(LedgerError::Validation(format!(
            "Account code cannot exceed {} characters",
            max_length
        )));
    }

    // Check for valid characters (alphanumeric, dashes, dots)
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err(LedgerError::Validation(
            "Account code can only contain alphanumeric characters, dashes, and dots".to_string(),
        ));
    }

    Ok(())
}

/// Validate that an account name is valid
pub fn validate_account_name(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account name cannot be empty".to_string(),
        ));
    }

    if name.len() > 100 {
        return Err(LedgerError::Validation(
            "Account name cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that a journal entry description is valid
pub fn validate_entry_description(description: &str, max_length: usize) -> LedgerResult<()> {
    if description.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Journal entry description cannot be empty".to_string(),
        ));
    }

    if description.len() > max_length {
        return Err(LedgerError::Validation(format!(
            "Journal entry description cannot exceed {} characters",
            max_length
        )));
    }

    Ok(())
}

/// Journal validator that layers length limits and duplicate-line checks
/// on top of the double-entry rules
pub struct EnhancedJournalValidator {
    max_description_length: usize,
}

impl EnhancedJournalValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            max_description_length: config.max_description_length,
        }
    }
}

impl Default for EnhancedJournalValidator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}

impl JournalValidator for EnhancedJournalValidator {
    fn validate_entry(&self, input: &JournalEntryInput) -> LedgerResult<()> {
        // Basic validation
        input.validate()?;

        validate_entry_description(&input.description, self.max_description_length)?;

        // Same account cannot appear twice on the same side of one entry
        let mut seen = HashSet::new();
        for line in &input.lines {
            let side = if line.debit_amount > zero() {
                BalanceSide::Debit
            } else {
                BalanceSide::Credit
            };
            if !seen.insert((line.account_id, side)) {
                return Err(LedgerError::Validation(format!(
                    "Account '{}' appears multiple times on the same side of the entry",
                    line.account_id
                )));
            }
        }

        Ok(())
    }
}

/// Account validator enforcing code format and length limits
pub struct EnhancedAccountValidator {
    max_code_length: usize,
}

impl EnhancedAccountValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            max_code_length: config.max_account_code_length,
        }
    }
}

impl Default for EnhancedAccountValidator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}

impl AccountValidator for EnhancedAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        validate_account_code(&account.code, self.max_code_length)?;
        validate_account_name(&account.name)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn input(description: &str) -> JournalEntryInput {
        let mut input = JournalEntryInput::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            description.to_string(),
            None,
        );
        input
            .lines
            .push(JournalLineInput::debit(Uuid::new_v4(), BigDecimal::from(5), None));
        input
            .lines
            .push(JournalLineInput::credit(Uuid::new_v4(), BigDecimal::from(5), None));
        input
    }

    #[test]
    fn test_account_code_rules() {
        assert!(validate_account_code("1000", 20).is_ok());
        assert!(validate_account_code("1000-01", 20).is_ok());
        assert!(validate_account_code("", 20).is_err());
        assert!(validate_account_code("10 00", 20).is_err());
        assert!(validate_account_code("123456", 5).is_err());
    }

    #[test]
    fn test_enhanced_validator_rejects_long_description() {
        let validator = EnhancedJournalValidator::new(&ValidationConfig {
            max_description_length: 10,
            ..ValidationConfig::default()
        });
        assert!(validator.validate_entry(&input("Short")).is_ok());
        let err = validator
            .validate_entry(&input("A description that is too long"))
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_enhanced_validator_rejects_duplicate_side() {
        let mut entry = input("Duplicate");
        let account = entry.lines[0].account_id;
        entry.lines[1] = JournalLineInput::credit(Uuid::new_v4(), BigDecimal::from(10), None);
        entry
            .lines
            .push(JournalLineInput::debit(account, BigDecimal::from(5), None));

        let err = EnhancedJournalValidator::default()
            .validate_entry(&entry)
            .unwrap_err();
        assert!(err.to_string().contains("multiple times"));
    }
}
