//! Ledger configuration
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration document.

use serde::{Deserialize, Serialize};

use crate::types::{LedgerError, LedgerResult};

/// Top-level configuration for a [`crate::Ledger`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LedgerConfig {
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Which accounts feed the dashboard's cash, receivables and payables figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_cash_account_codes")]
    pub cash_account_codes: Vec<String>,
    #[serde(default = "default_receivables_account_code")]
    pub receivables_account_code: String,
    #[serde(default = "default_payables_account_code")]
    pub payables_account_code: String,
    /// Number of posted entries listed as recent activity
    #[serde(default = "default_recent_entries_limit")]
    pub recent_entries_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            cash_account_codes: default_cash_account_codes(),
            receivables_account_code: default_receivables_account_code(),
            payables_account_code: default_payables_account_code(),
            recent_entries_limit: default_recent_entries_limit(),
        }
    }
}

fn default_cash_account_codes() -> Vec<String> {
    vec!["1000".to_string(), "1001".to_string()]
}

fn default_receivables_account_code() -> String {
    "1200".to_string()
}

fn default_payables_account_code() -> String {
    "2000".to_string()
}

fn default_recent_entries_limit() -> usize {
    5
}

/// Limits used by the enhanced validators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_max_description_length")]
    pub max_description_length: usize,
    #[serde(default = "default_max_account_code_length")]
    pub max_account_code_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_description_length: default_max_description_length(),
            max_account_code_length: default_max_account_code_length(),
        }
    }
}

fn default_max_description_length() -> usize {
    500
}

fn default_max_account_code_length() -> usize {
    20
}

impl LedgerConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json_str(json: &str) -> LedgerResult<Self> {
        let config: LedgerConfig = serde_json::from_str(json)
            .map_err(|e| LedgerError::Validation(format!("invalid ledger config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.dashboard.recent_entries_limit == 0 {
            return Err(LedgerError::Validation(
                "dashboard.recent_entries_limit must be greater than zero".to_string(),
            ));
        }
        if self.validation.max_description_length == 0 {
            return Err(LedgerError::Validation(
                "validation.max_description_length must be greater than zero".to_string(),
            ));
        }
        if self.validation.max_account_code_length == 0 {
            return Err(LedgerError::Validation(
                "validation.max_account_code_length must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
