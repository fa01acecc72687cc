//! Account registry: chart of accounts and active/inactive transitions

use std::collections::{HashMap, HashSet};

use crate::traits::*;
use crate::types::*;

/// Account manager for handling chart of accounts operations
pub struct AccountManager<S: LedgerStorage> {
    storage: S,
    validator: Box<dyn AccountValidator>,
}

impl<S: LedgerStorage> AccountManager<S> {
    /// Create a new account manager
    pub fn new(storage: S) -> Self {
        Self::with_validator(storage, Box::new(DefaultAccountValidator))
    }

    /// Create a new account manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn AccountValidator>) -> Self {
        Self { storage, validator }
    }

    /// Create a new account
    pub async fn create_account(
        &self,
        code: String,
        name: String,
        account_type: AccountType,
        parent_id: Option<AccountId>,
    ) -> LedgerResult<Account> {
        let account = Account::new(code, name, account_type, parent_id);

        self.validator.validate_account(&account)?;

        // Validate parent account exists if specified
        if let Some(parent_id) = account.parent_id {
            self.get_account_required(parent_id).await?;
        }

        if !self.storage.insert_account(&account).await? {
            tracing::warn!(code = %account.code, "account code already exists");
            return Err(LedgerError::DuplicateCode(account.code));
        }

        tracing::info!(
            account_id = %account.id,
            code = %account.code,
            account_type = %account.account_type,
            "account created"
        );
        Ok(account)
    }

    /// Rename or re-parent an account. Only those two columns are written, so
    /// a concurrent activation change is never overwritten.
    pub async fn update_account(
        &self,
        account_id: AccountId,
        name: String,
        parent_id: Option<AccountId>,
    ) -> LedgerResult<Account> {
        let mut candidate = self.get_account_required(account_id).await?;
        candidate.name = name;
        candidate.parent_id = parent_id;
        self.validator.validate_account(&candidate)?;

        let account = self
            .storage
            .update_account_details(account_id, &candidate.name, parent_id)
            .await
            .inspect_err(|err| tracing::warn!(%account_id, %err, "account update rejected"))?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;

        tracing::info!(account_id = %account.id, code = %account.code, "account updated");
        Ok(account)
    }

    /// Reactivate an account. No balance precondition applies.
    pub async fn activate(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.set_active(account_id, true).await
    }

    /// Deactivate an account whose all-time posted net balance is exactly
    /// zero. The balance is checked by storage in the same write that flips
    /// the flag, so a concurrent post either lands first and blocks this, or
    /// sees the account inactive and fails.
    pub async fn deactivate(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.set_active(account_id, false).await
    }

    async fn set_active(&self, account_id: AccountId, is_active: bool) -> LedgerResult<Account> {
        let account = self
            .storage
            .set_account_active(account_id, is_active)
            .await
            .inspect_err(|err| {
                tracing::warn!(%account_id, is_active, %err, "account activity change rejected")
            })?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;

        tracing::info!(code = %account.code, is_active, "account activity changed");
        Ok(account)
    }

    /// Get an account by ID
    pub async fn get_account(&self, account_id: AccountId) -> LedgerResult<Option<Account>> {
        self.storage.get_account(account_id).await
    }

    /// Get an account by ID, returning an error if not found
    pub async fn get_account_required(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    pub async fn get_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        self.storage.get_account_by_code(code).await
    }

    /// List all accounts
    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(None).await
    }

    /// List accounts by type
    pub async fn list_accounts_by_type(
        &self,
        account_type: AccountType,
    ) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(Some(account_type)).await
    }

    pub async fn list_active_accounts(&self) -> LedgerResult<Vec<Account>> {
        let accounts = self.storage.list_accounts(None).await?;
        Ok(accounts.into_iter().filter(|a| a.is_active).collect())
    }

    /// Get all direct child accounts of a parent account
    pub async fn child_accounts(&self, parent_id: AccountId) -> LedgerResult<Vec<Account>> {
        let all_accounts = self.list_accounts().await?;
        Ok(all_accounts
            .into_iter()
            .filter(|account| account.parent_id == Some(parent_id))
            .collect())
    }

    /// Get the full path to an account, root first
    pub async fn account_path(&self, account_id: AccountId) -> LedgerResult<Vec<Account>> {
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut current_account_id = Some(account_id);

        while let Some(id) = current_account_id {
            if !visited.insert(id) {
                return Err(LedgerError::Validation(format!(
                    "Account hierarchy contains a cycle at {}",
                    id
                )));
            }
            let account = self.get_account_required(id).await?;
            current_account_id = account.parent_id;
            path.insert(0, account);
        }

        Ok(path)
    }
}

/// Utility functions for working with accounts
pub mod utils {
    use super::*;

    /// Create a standard chart of accounts for a small business, keyed by a
    /// short slug ("cash", "sales_revenue", ...)
    pub async fn create_standard_chart<S: LedgerStorage>(
        account_manager: &AccountManager<S>,
    ) -> LedgerResult<HashMap<String, Account>> {
        const CHART: [(&str, &str, &str, AccountType); 12] = [
            ("cash", "1000", "Cash", AccountType::Asset),
            ("accounts_receivable", "1200", "Accounts Receivable", AccountType::Asset),
            ("inventory", "1300", "Inventory", AccountType::Asset),
            ("accounts_payable", "2000", "Accounts Payable", AccountType::Liability),
            ("loans_payable", "2100", "Loans Payable", AccountType::Liability),
            ("owners_equity", "3000", "Owner's Equity", AccountType::Equity),
            ("retained_earnings", "3200", "Retained Earnings", AccountType::Equity),
            ("sales_revenue", "4000", "Sales Revenue", AccountType::Revenue),
            ("service_revenue", "4100", "Service Revenue", AccountType::Revenue),
            ("cost_of_goods_sold", "5000", "Cost of Goods Sold", AccountType::Expense),
            ("rent_expense", "6000", "Rent Expense", AccountType::Expense),
            ("utilities_expense", "6100", "Utilities Expense", AccountType::Expense),
        ];

        let mut accounts = HashMap::new();
        for (slug, code, name, account_type) in CHART {
            let account = account_manager
                .create_account(code.to_string(), name.to_string(), account_type, None)
                .await?;
            accounts.insert(slug.to_string(), account);
        }

        Ok(accounts)
    }
}
