//! Core ledger facade composing the account registry, journal engine,
//! reconciliation matcher and report generator over one storage value

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::{AccountManager, BalanceCalculator, JournalManager};
use crate::config::LedgerConfig;
use crate::reconciliation::{ReconciliationEngine, ReconciliationSummary, UnreconciledStatements};
use crate::reports::*;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{EnhancedAccountValidator, EnhancedJournalValidator};

/// Main ledger struct that provides high-level accounting operations
pub struct Ledger<S: LedgerStorage> {
    accounts: AccountManager<S>,
    balances: BalanceCalculator<S>,
    journal: JournalManager<S>,
    reconciliation: ReconciliationEngine<S>,
    reports: ReportGenerator<S>,
    config: LedgerConfig,
}

impl<S: LedgerStorage + Clone> Ledger<S> {
    /// Create a new ledger instance with default configuration
    pub fn new(storage: S) -> Self {
        Self::with_validators(
            storage,
            LedgerConfig::default(),
            Box::new(DefaultAccountValidator),
            Box::new(DefaultJournalValidator),
        )
    }

    /// Create a ledger from a validated configuration. The enhanced
    /// validators are configured from its `validation` section.
    pub fn with_config(storage: S, config: LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;
        let account_validator = Box::new(EnhancedAccountValidator::new(&config.validation));
        let journal_validator = Box::new(EnhancedJournalValidator::new(&config.validation));
        Ok(Self::with_validators(
            storage,
            config,
            account_validator,
            journal_validator,
        ))
    }

    /// Create a new ledger with custom validators
    pub fn with_validators(
        storage: S,
        config: LedgerConfig,
        account_validator: Box<dyn AccountValidator>,
        journal_validator: Box<dyn JournalValidator>,
    ) -> Self {
        Self {
            accounts: AccountManager::with_validator(storage.clone(), account_validator),
            balances: BalanceCalculator::new(storage.clone()),
            journal: JournalManager::with_validator(storage.clone(), journal_validator),
            reconciliation: ReconciliationEngine::new(storage.clone()),
            reports: ReportGenerator::with_config(storage, config.dashboard.clone()),
            config,
        }
    }
}

impl<S: LedgerStorage> Ledger<S> {
    /// Use an invoicing subsystem for the dashboard's overdue receivables
    pub fn with_receivables(mut self, receivables: Arc<dyn ReceivablesSource>) -> Self {
        self.reports = self.reports.with_receivables(receivables);
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn accounts(&self) -> &AccountManager<S> {
        &self.accounts
    }

    pub fn balances(&self) -> &BalanceCalculator<S> {
        &self.balances
    }

    pub fn journal(&self) -> &JournalManager<S> {
        &self.journal
    }

    pub fn reconciliation(&self) -> &ReconciliationEngine<S> {
        &self.reconciliation
    }

    pub fn reports(&self) -> &ReportGenerator<S> {
        &self.reports
    }

    // Account registry

    /// Create a new account
    pub async fn create_account(
        &self,
        code: String,
        name: String,
        account_type: AccountType,
        parent_id: Option<AccountId>,
    ) -> LedgerResult<Account> {
        self.accounts
            .create_account(code, name, account_type, parent_id)
            .await
    }

    pub async fn update_account(
        &self,
        account_id: AccountId,
        name: String,
        parent_id: Option<AccountId>,
    ) -> LedgerResult<Account> {
        self.accounts.update_account(account_id, name, parent_id).await
    }

    pub async fn get_account(&self, account_id: AccountId) -> LedgerResult<Option<Account>> {
        self.accounts.get_account(account_id).await
    }

    pub async fn get_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        self.accounts.get_account_by_code(code).await
    }

    /// List all accounts ordered by code
    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.accounts.list_accounts().await
    }

    pub async fn list_accounts_by_type(
        &self,
        account_type: AccountType,
    ) -> LedgerResult<Vec<Account>> {
        self.accounts.list_accounts_by_type(account_type).await
    }

    pub async fn activate_account(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.accounts.activate(account_id).await
    }

    /// Deactivate an account; fails while its posted lines do not net to zero
    pub async fn deactivate_account(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.accounts.deactivate(account_id).await
    }

    /// Setup a standard chart of accounts for small business
    pub async fn setup_standard_chart_of_accounts(
        &self,
    ) -> LedgerResult<HashMap<String, Account>> {
        crate::ledger::account::utils::create_standard_chart(&self.accounts).await
    }

    // Balances

    /// Balance of an account as of a date, signed by its normal side
    pub async fn account_balance(
        &self,
        account_id: AccountId,
        as_of_date: NaiveDate,
    ) -> LedgerResult<BigDecimal> {
        self.balances
            .balance(account_id, DateRange::until(as_of_date))
            .await
    }

    pub async fn account_balance_between(
        &self,
        account_id: AccountId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<BigDecimal> {
        self.balances
            .balance(account_id, DateRange::between(start_date, end_date))
            .await
    }

    // Journal engine

    pub async fn create_entry(&self, input: JournalEntryInput) -> LedgerResult<JournalEntry> {
        self.journal.create_entry(input).await
    }

    pub async fn update_entry(
        &self,
        entry_id: JournalEntryId,
        input: JournalEntryInput,
    ) -> LedgerResult<JournalEntry> {
        self.journal.update_entry(entry_id, input).await
    }

    pub async fn post_entry(&self, entry_id: JournalEntryId) -> LedgerResult<JournalEntry> {
        self.journal.post_entry(entry_id).await
    }

    pub async fn void_entry(&self, entry_id: JournalEntryId) -> LedgerResult<JournalEntry> {
        self.journal.void_entry(entry_id).await
    }

    pub async fn delete_entry(&self, entry_id: JournalEntryId) -> LedgerResult<()> {
        self.journal.delete_entry(entry_id).await
    }

    /// Create and immediately post an entry
    pub async fn record_entry(&self, input: JournalEntryInput) -> LedgerResult<JournalEntry> {
        let entry = self.journal.create_entry(input).await?;
        self.journal.post_entry(entry.id).await
    }

    pub async fn get_entry(&self, entry_id: JournalEntryId) -> LedgerResult<Option<JournalEntry>> {
        self.journal.get_entry(entry_id).await
    }

    pub async fn list_entries(&self, status: Option<EntryStatus>) -> LedgerResult<Vec<JournalEntry>> {
        self.journal.list_entries(status).await
    }

    // Reconciliation

    pub async fn create_bank_account(
        &self,
        account_id: AccountId,
        name: String,
        account_number: Option<String>,
    ) -> LedgerResult<BankAccount> {
        self.reconciliation
            .create_bank_account(account_id, name, account_number)
            .await
    }

    pub async fn deactivate_bank_account(
        &self,
        bank_account_id: BankAccountId,
    ) -> LedgerResult<BankAccount> {
        self.reconciliation
            .deactivate_bank_account(bank_account_id)
            .await
    }

    pub async fn activate_bank_account(
        &self,
        bank_account_id: BankAccountId,
    ) -> LedgerResult<BankAccount> {
        self.reconciliation.activate_bank_account(bank_account_id).await
    }

    pub async fn list_active_bank_accounts(&self) -> LedgerResult<Vec<BankAccount>> {
        self.reconciliation.list_active_bank_accounts().await
    }

    pub async fn import_statement(
        &self,
        bank_account_id: BankAccountId,
        input: StatementLineInput,
    ) -> LedgerResult<BankStatementLine> {
        self.reconciliation
            .import_statement(bank_account_id, input)
            .await
    }

    pub async fn reconcile_statement(
        &self,
        statement_id: StatementLineId,
        journal_line_id: JournalLineId,
    ) -> LedgerResult<()> {
        self.reconciliation
            .reconcile_statement(statement_id, journal_line_id)
            .await
    }

    pub async fn unreconcile_statement(&self, statement_id: StatementLineId) -> LedgerResult<()> {
        self.reconciliation.unreconcile_statement(statement_id).await
    }

    pub async fn reconciled_balance(&self, bank_account_id: BankAccountId) -> LedgerResult<BigDecimal> {
        self.reconciliation.reconciled_balance(bank_account_id).await
    }

    pub async fn unreconciled_statements(
        &self,
        bank_account_id: BankAccountId,
    ) -> LedgerResult<UnreconciledStatements<'_, S>> {
        self.reconciliation
            .unreconciled_statements(bank_account_id)
            .await
    }

    pub async fn reconciliation_summary(
        &self,
        bank_account_id: BankAccountId,
    ) -> LedgerResult<ReconciliationSummary> {
        self.reconciliation
            .reconciliation_summary(bank_account_id)
            .await
    }

    // Reports

    pub async fn trial_balance(&self, as_of_date: NaiveDate) -> LedgerResult<TrialBalance> {
        self.reports.trial_balance(as_of_date).await
    }

    pub async fn profit_and_loss(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<ProfitAndLoss> {
        self.reports.profit_and_loss(start_date, end_date).await
    }

    pub async fn balance_sheet(&self, as_of_date: NaiveDate) -> LedgerResult<BalanceSheet> {
        self.reports.balance_sheet(as_of_date).await
    }

    pub async fn general_ledger(
        &self,
        account_id: AccountId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<GeneralLedger> {
        self.reports
            .general_ledger(account_id, start_date, end_date)
            .await
    }

    pub async fn dashboard(&self, as_of_date: NaiveDate) -> LedgerResult<Dashboard> {
        self.reports.dashboard(as_of_date).await
    }

    /// Validate the integrity of the ledger
    pub async fn validate_integrity(
        &self,
        as_of_date: NaiveDate,
    ) -> LedgerResult<LedgerIntegrityReport> {
        let trial_balance = self.reports.trial_balance(as_of_date).await?;
        let balance_sheet = self.reports.balance_sheet(as_of_date).await?;

        let mut issues = Vec::new();

        if !trial_balance.is_balanced {
            issues.push(format!(
                "Trial balance is not balanced: debits = {}, credits = {}",
                trial_balance.total_debits, trial_balance.total_credits
            ));
        }

        let total_liabilities_equity = &balance_sheet.total_liabilities
            + &balance_sheet.total_equity
            + &balance_sheet.retained_earnings;

        if !balance_sheet.is_balanced {
            issues.push(format!(
                "Balance sheet is not balanced: assets = {}, liabilities + equity = {}",
                balance_sheet.total_assets, total_liabilities_equity
            ));
        }

        if !issues.is_empty() {
            tracing::error!(as_of = %as_of_date, issues = issues.len(), "ledger integrity check failed");
        }

        Ok(LedgerIntegrityReport {
            as_of_date,
            is_valid: issues.is_empty(),
            issues,
            trial_balance_total_debits: trial_balance.total_debits,
            trial_balance_total_credits: trial_balance.total_credits,
            balance_sheet_total_assets: balance_sheet.total_assets,
            balance_sheet_total_liabilities_equity: total_liabilities_equity,
        })
    }
}

/// Report on ledger integrity and validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerIntegrityReport {
    pub as_of_date: NaiveDate,
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub trial_balance_total_debits: BigDecimal,
    pub trial_balance_total_credits: BigDecimal,
    pub balance_sheet_total_assets: BigDecimal,
    /// Liabilities plus equity plus retained earnings
    pub balance_sheet_total_liabilities_equity: BigDecimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::patterns;
    use crate::utils::memory_storage::MemoryStorage;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_ledger_basic_operations() {
        let ledger = Ledger::new(MemoryStorage::new());
        let chart = ledger.setup_standard_chart_of_accounts().await.unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();

        let input = patterns::owner_investment(
            today,
            "Initial capital",
            chart["cash"].id,
            chart["owners_equity"].id,
            dec("10000.00"),
        )
        .unwrap();
        let entry = ledger.record_entry(input).await.unwrap();
        assert_eq!(entry.status, EntryStatus::Posted);

        let cash = ledger.account_balance(chart["cash"].id, today).await.unwrap();
        assert_eq!(cash, dec("10000.00"));

        let report = ledger.validate_integrity(today).await.unwrap();
        assert!(report.is_valid, "{:?}", report.issues);
        assert_eq!(report.trial_balance_total_debits, dec("10000.00"));
    }

    #[tokio::test]
    async fn test_with_config_uses_enhanced_validation() {
        let mut config = LedgerConfig::default();
        config.validation.max_description_length = 10;
        let ledger = Ledger::with_config(MemoryStorage::new(), config).unwrap();
        let chart = ledger.setup_standard_chart_of_accounts().await.unwrap();

        let input = patterns::expense_payment(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "A description that is far too long",
            chart["rent_expense"].id,
            chart["cash"].id,
            dec("10.00"),
        )
        .unwrap();
        let err = ledger.create_entry(input).await.unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");

        let mut invalid = LedgerConfig::default();
        invalid.dashboard.recent_entries_limit = 0;
        assert!(Ledger::with_config(MemoryStorage::new(), invalid).is_err());
    }
}
