//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Conditional status change applied by [`LedgerStorage::transition_entry`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub entry_id: JournalEntryId,
    /// The write only applies if the stored entry still has this version
    pub expected_version: u64,
    pub to: EntryStatus,
    pub posted_at: Option<DateTime<Utc>>,
}

/// Raw debit and credit sums of posted lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineTotals {
    pub debits: BigDecimal,
    pub credits: BigDecimal,
}

impl Default for LineTotals {
    fn default() -> Self {
        Self {
            debits: zero(),
            credits: zero(),
        }
    }
}

impl LineTotals {
    /// Debits minus credits, regardless of normal side
    pub fn net(&self) -> BigDecimal {
        &self.debits - &self.credits
    }
}

/// Posted totals of one account, as returned by
/// [`LedgerStorage::account_totals`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountTotals {
    pub account: Account,
    /// Whether any posted line has ever hit the account
    pub has_activity: bool,
    /// One entry per requested range, in request order
    pub totals: Vec<LineTotals>,
}

impl AccountTotals {
    /// Balance over the `index`-th requested range, signed by normal side
    pub fn balance(&self, index: usize) -> BigDecimal {
        match self.totals.get(index) {
            Some(totals) => self
                .account
                .normal_balance()
                .signed_balance(&totals.debits, &totals.credits),
            None => zero(),
        }
    }

    /// Debits minus credits over the `index`-th requested range
    pub fn net(&self, index: usize) -> BigDecimal {
        self.totals.get(index).map(LineTotals::net).unwrap_or_else(zero)
    }
}

/// Storage abstraction for the ledger system
///
/// Every method is one atomic unit against the backing store: either all of
/// its writes become visible or none do. Methods returning `bool` are
/// conditional writes and report `false` when their precondition (unique
/// code, expected version, unlinked sides) does not hold, leaving the store
/// untouched. A relational backend implements these as single transactions
/// with `UPDATE ... WHERE version = $n` or row locks, so the guarantees hold
/// across processes.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Insert an account; `false` if its code is already taken
    async fn insert_account(&self, account: &Account) -> LedgerResult<bool>;

    async fn get_account(&self, account_id: AccountId) -> LedgerResult<Option<Account>>;

    async fn get_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>>;

    /// List accounts ordered by code, optionally filtered by type
    async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>>;

    /// Rename or re-parent an account, leaving every other column alone.
    ///
    /// The new parent must exist and must not be the account or one of its
    /// descendants (`Validation`); checked in the same write. `None` if the
    /// account does not exist.
    async fn update_account_details(
        &self,
        account_id: AccountId,
        name: &str,
        parent_id: Option<AccountId>,
    ) -> LedgerResult<Option<Account>>;

    /// Flip an account's active flag. Deactivation recomputes the all-time
    /// posted net in the same write and fails with `NonZeroBalance` unless it
    /// is exactly zero. `None` if the account does not exist.
    async fn set_account_active(
        &self,
        account_id: AccountId,
        is_active: bool,
    ) -> LedgerResult<Option<Account>>;

    /// Persist a draft entry, assigning the next entry number
    async fn insert_entry(&self, entry: JournalEntry) -> LedgerResult<JournalEntry>;

    async fn get_entry(&self, entry_id: JournalEntryId) -> LedgerResult<Option<JournalEntry>>;

    /// List entries ordered by entry date then entry number
    async fn list_entries(&self, status: Option<EntryStatus>) -> LedgerResult<Vec<JournalEntry>>;

    async fn count_entries(&self, status: Option<EntryStatus>) -> LedgerResult<u64>;

    /// Replace header and line set of an entry if its version matches
    async fn replace_entry(&self, entry: &JournalEntry, expected_version: u64)
        -> LedgerResult<bool>;

    /// Change an entry's status if its version matches.
    ///
    /// A change to `Posted` re-checks in the same write that every line's
    /// account still exists and is active (`InactiveAccount` otherwise). A
    /// change to `Void` also releases every reconciliation link held by the
    /// entry's lines in the same write.
    async fn transition_entry(&self, change: &StatusChange) -> LedgerResult<bool>;

    /// Remove an entry and its lines if its version matches
    async fn delete_entry(&self, entry_id: JournalEntryId, expected_version: u64)
        -> LedgerResult<bool>;

    /// Find a line together with its owning entry
    async fn find_line(
        &self,
        line_id: JournalLineId,
    ) -> LedgerResult<Option<(JournalEntry, JournalEntryLine)>>;

    /// Posted totals of every account for each requested range, plus
    /// all-time activity, read from one consistent snapshot. Ordered by
    /// account code.
    async fn account_totals(&self, ranges: &[DateRange]) -> LedgerResult<Vec<AccountTotals>>;

    /// Sum posted debit and credit amounts for an account within a range
    async fn sum_posted_lines(&self, account_id: AccountId, range: DateRange)
        -> LedgerResult<LineTotals>;

    /// Posted lines of an account within a range, ordered by entry date then
    /// entry number
    async fn posted_lines(&self, account_id: AccountId, range: DateRange)
        -> LedgerResult<Vec<PostedLine>>;

    async fn insert_bank_account(&self, bank_account: &BankAccount) -> LedgerResult<()>;

    async fn get_bank_account(
        &self,
        bank_account_id: BankAccountId,
    ) -> LedgerResult<Option<BankAccount>>;

    async fn list_bank_accounts(&self) -> LedgerResult<Vec<BankAccount>>;

    /// `None` if the bank account does not exist
    async fn set_bank_account_active(
        &self,
        bank_account_id: BankAccountId,
        is_active: bool,
    ) -> LedgerResult<Option<BankAccount>>;

    /// Append a statement line; the bank account must exist and be active
    async fn insert_statement_line(&self, line: &BankStatementLine) -> LedgerResult<()>;

    async fn get_statement_line(
        &self,
        statement_id: StatementLineId,
    ) -> LedgerResult<Option<BankStatementLine>>;

    /// Statement lines of a bank account ordered by statement date,
    /// optionally filtered on whether they are reconciled
    async fn list_statement_lines(
        &self,
        bank_account_id: BankAccountId,
        reconciled: Option<bool>,
    ) -> LedgerResult<Vec<BankStatementLine>>;

    /// Link a statement line to a journal line of a posted entry; `false` if
    /// either side is already linked
    async fn link_statement(&self, link: &ReconciliationLink) -> LedgerResult<bool>;

    /// Remove the link of a statement line, returning it if one existed
    async fn unlink_statement(
        &self,
        statement_id: StatementLineId,
    ) -> LedgerResult<Option<ReconciliationLink>>;
}

/// Trait for implementing custom account validation rules
pub trait AccountValidator: Send + Sync {
    /// Validate an account before saving
    fn validate_account(&self, account: &Account) -> LedgerResult<()>;
}

/// Trait for implementing custom journal entry validation rules
pub trait JournalValidator: Send + Sync {
    /// Validate a journal submission before it is stored
    fn validate_entry(&self, input: &JournalEntryInput) -> LedgerResult<()>;
}

/// Default account validator with basic rules
pub struct DefaultAccountValidator;

impl AccountValidator for DefaultAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        if account.code.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account code cannot be empty".to_string(),
            ));
        }

        if account.name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Default journal validator with the double-entry rules
pub struct DefaultJournalValidator;

impl JournalValidator for DefaultJournalValidator {
    fn validate_entry(&self, input: &JournalEntryInput) -> LedgerResult<()> {
        input.validate()
    }
}

/// Overdue receivables as reported by the invoicing collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverdueReceivables {
    pub count: u64,
    pub amount: BigDecimal,
}

impl Default for OverdueReceivables {
    fn default() -> Self {
        Self {
            count: 0,
            amount: zero(),
        }
    }
}

/// Source of receivables data the ledger does not own (invoices)
#[async_trait]
pub trait ReceivablesSource: Send + Sync {
    async fn overdue_receivables(&self, as_of_date: NaiveDate) -> LedgerResult<OverdueReceivables>;
}

/// Receivables source for deployments without an invoicing subsystem
pub struct NoReceivables;

#[async_trait]
impl ReceivablesSource for NoReceivables {
    async fn overdue_receivables(&self, _as_of_date: NaiveDate) -> LedgerResult<OverdueReceivables> {
        Ok(OverdueReceivables::default())
    }
}
