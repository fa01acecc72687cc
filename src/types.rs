//! Core types and data structures for the ledger engine

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type AccountId = Uuid;
pub type JournalEntryId = Uuid;
pub type JournalLineId = Uuid;
pub type BankAccountId = Uuid;
pub type StatementLineId = Uuid;

/// Number of fractional digits every monetary amount carries.
pub const AMOUNT_SCALE: i64 = 2;

/// Zero at the ledger's monetary scale.
pub fn zero() -> BigDecimal {
    BigDecimal::from(0).with_scale(AMOUNT_SCALE)
}

/// Check that an amount has at most two fractional digits and rescale it.
///
/// Amounts with more precision are rejected rather than rounded.
pub fn normalize_amount(amount: &BigDecimal) -> LedgerResult<BigDecimal> {
    let (_, scale) = amount.normalized().as_bigint_and_exponent();
    if scale > AMOUNT_SCALE {
        return Err(LedgerError::InvalidLine(format!(
            "amount {} has more than {} decimal places",
            amount, AMOUNT_SCALE
        )));
    }
    Ok(amount.with_scale(AMOUNT_SCALE))
}

/// Account types following standard accounting principles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    /// Assets - what the business owns (Cash, Receivables, Equipment, etc.)
    Asset,
    /// Liabilities - what the business owes (Loans, Accounts Payable, etc.)
    Liability,
    /// Equity - owner's interest in the business (Capital, Retained Earnings, etc.)
    Equity,
    /// Revenue - money earned by the business
    Revenue,
    /// Expenses - costs incurred by the business
    Expense,
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::Equity,
        AccountType::Revenue,
        AccountType::Expense,
    ];

    /// Returns the normal balance side for this account type
    /// Assets and Expenses normally have debit balances
    /// Liabilities, Equity, and Revenue normally have credit balances
    pub fn normal_balance(&self) -> BalanceSide {
        match self {
            AccountType::Asset | AccountType::Expense => BalanceSide::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                BalanceSide::Credit
            }
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccountType::Asset => "ASSET",
            AccountType::Liability => "LIABILITY",
            AccountType::Equity => "EQUITY",
            AccountType::Revenue => "REVENUE",
            AccountType::Expense => "EXPENSE",
        };
        f.write_str(name)
    }
}

/// The two sides of double-entry bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BalanceSide {
    /// Increases Assets and Expenses, decreases Liabilities, Equity, and Revenue
    Debit,
    /// Increases Liabilities, Equity, and Revenue, decreases Assets and Expenses
    Credit,
}

impl BalanceSide {
    /// Sign raw debit and credit sums according to this normal side.
    pub fn signed_balance(&self, debits: &BigDecimal, credits: &BigDecimal) -> BigDecimal {
        match self {
            BalanceSide::Debit => debits - credits,
            BalanceSide::Credit => credits - debits,
        }
    }
}

/// Chart-of-accounts record.
///
/// The normal balance side is derived from `account_type` and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Unique account code, e.g. "1000"
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    /// Optional parent account for hierarchical chart of accounts
    pub parent_id: Option<AccountId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new active account
    pub fn new(
        code: String,
        name: String,
        account_type: AccountType,
        parent_id: Option<AccountId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code,
            name,
            account_type,
            parent_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn normal_balance(&self) -> BalanceSide {
        self.account_type.normal_balance()
    }
}

/// Lifecycle state of a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryStatus {
    Draft,
    Posted,
    Void,
}

/// Operations that move a journal entry through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryAction {
    Edit,
    Post,
    Void,
    Delete,
}

impl EntryStatus {
    /// Total transition function of the entry state machine.
    ///
    /// Returns the resulting status, `None` when the entry is removed, or
    /// `InvalidStateTransition` for every pair not listed below.
    pub fn apply(self, action: EntryAction) -> LedgerResult<Option<EntryStatus>> {
        match (self, action) {
            (EntryStatus::Draft, EntryAction::Edit) => Ok(Some(EntryStatus::Draft)),
            (EntryStatus::Draft, EntryAction::Post) => Ok(Some(EntryStatus::Posted)),
            (EntryStatus::Draft, EntryAction::Delete) => Ok(None),
            (EntryStatus::Posted, EntryAction::Void) => Ok(Some(EntryStatus::Void)),
            (from, action) => Err(LedgerError::InvalidStateTransition { from, action }),
        }
    }

    /// Only posted lines count toward balances and reports.
    pub fn affects_balances(&self) -> bool {
        matches!(self, EntryStatus::Posted)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Posted => "posted",
            EntryStatus::Void => "void",
        };
        f.write_str(name)
    }
}

impl fmt::Display for EntryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryAction::Edit => "edit",
            EntryAction::Post => "post",
            EntryAction::Void => "void",
            EntryAction::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// One debit or credit line of a journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntryLine {
    pub id: JournalLineId,
    pub entry_id: JournalEntryId,
    pub account_id: AccountId,
    pub debit_amount: BigDecimal,
    pub credit_amount: BigDecimal,
    pub description: Option<String>,
}

impl JournalEntryLine {
    pub fn side(&self) -> BalanceSide {
        if self.debit_amount > zero() {
            BalanceSide::Debit
        } else {
            BalanceSide::Credit
        }
    }

    /// The nonzero amount of the line
    pub fn amount(&self) -> &BigDecimal {
        match self.side() {
            BalanceSide::Debit => &self.debit_amount,
            BalanceSide::Credit => &self.credit_amount,
        }
    }
}

/// A balanced set of debit/credit lines recorded as one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalEntryId,
    /// Sequential number assigned by storage; never reused
    pub entry_number: u64,
    pub entry_date: NaiveDate,
    pub description: String,
    /// Optional reference number (invoice number, check number, etc.)
    pub reference: Option<String>,
    pub status: EntryStatus,
    pub posted_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped by every write
    pub version: u64,
    pub lines: Vec<JournalEntryLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Build a draft entry from validated input. The entry number is
    /// assigned when storage persists it.
    pub fn draft(input: &JournalEntryInput) -> LedgerResult<Self> {
        Self::draft_with_id(Uuid::new_v4(), input)
    }

    /// Build a draft that keeps an existing entry identity, used when a
    /// draft's line set is replaced
    pub fn draft_with_id(id: JournalEntryId, input: &JournalEntryInput) -> LedgerResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id,
            entry_number: 0,
            entry_date: input.entry_date,
            description: input.description.clone(),
            reference: input.reference.clone(),
            status: EntryStatus::Draft,
            posted_at: None,
            version: 0,
            lines: input.to_lines(id)?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Human-readable entry number, e.g. `JE-000042`
    pub fn display_number(&self) -> String {
        format!("JE-{:06}", self.entry_number)
    }

    pub fn total_debits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit_amount).sum()
    }

    pub fn total_credits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit_amount).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debits() == self.total_credits()
    }

    /// Re-check the balance invariant on stored lines
    pub fn ensure_balanced(&self) -> LedgerResult<()> {
        ensure_balanced(self.total_debits(), self.total_credits())
    }
}

/// Line of a journal submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLineInput {
    pub account_id: AccountId,
    pub debit_amount: BigDecimal,
    pub credit_amount: BigDecimal,
    pub description: Option<String>,
}

impl JournalLineInput {
    pub fn debit(account_id: AccountId, amount: BigDecimal, description: Option<String>) -> Self {
        Self {
            account_id,
            debit_amount: amount,
            credit_amount: zero(),
            description,
        }
    }

    pub fn credit(account_id: AccountId, amount: BigDecimal, description: Option<String>) -> Self {
        Self {
            account_id,
            debit_amount: zero(),
            credit_amount: amount,
            description,
        }
    }

    /// Positive amounts debit the account, negative amounts credit it
    pub fn signed(account_id: AccountId, amount: BigDecimal, description: Option<String>) -> Self {
        if amount < zero() {
            Self::credit(account_id, amount.abs(), description)
        } else {
            Self::debit(account_id, amount, description)
        }
    }

    /// Check non-negativity, scale, and debit/credit exclusivity
    pub fn validate(&self) -> LedgerResult<()> {
        let debit = normalize_amount(&self.debit_amount)?;
        let credit = normalize_amount(&self.credit_amount)?;
        let nothing = zero();

        if debit < nothing || credit < nothing {
            return Err(LedgerError::InvalidLine(format!(
                "line for account {} has a negative amount",
                self.account_id
            )));
        }
        match (debit == nothing, credit == nothing) {
            (true, true) => Err(LedgerError::InvalidLine(format!(
                "line for account {} has neither a debit nor a credit amount",
                self.account_id
            ))),
            (false, false) => Err(LedgerError::InvalidLine(format!(
                "line for account {} has both a debit and a credit amount",
                self.account_id
            ))),
            _ => Ok(()),
        }
    }
}

/// Journal submission: the shape callers hand to `create_entry` and `update_entry`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntryInput {
    pub entry_date: NaiveDate,
    pub description: String,
    pub reference: Option<String>,
    pub lines: Vec<JournalLineInput>,
}

impl JournalEntryInput {
    pub fn new(entry_date: NaiveDate, description: String, reference: Option<String>) -> Self {
        Self {
            entry_date,
            description,
            reference,
            lines: Vec::new(),
        }
    }

    pub fn total_debits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit_amount).sum()
    }

    pub fn total_credits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit_amount).sum()
    }

    /// Structural validation: line count, per-line rules, then balance
    pub fn validate(&self) -> LedgerResult<()> {
        if self.lines.len() < 2 {
            return Err(LedgerError::Validation(
                "Journal entry must have at least two lines for double-entry bookkeeping"
                    .to_string(),
            ));
        }

        for line in &self.lines {
            line.validate()?;
        }

        ensure_balanced(self.total_debits(), self.total_credits())
    }

    fn to_lines(&self, entry_id: JournalEntryId) -> LedgerResult<Vec<JournalEntryLine>> {
        self.lines
            .iter()
            .map(|line| {
                Ok(JournalEntryLine {
                    id: Uuid::new_v4(),
                    entry_id,
                    account_id: line.account_id,
                    debit_amount: normalize_amount(&line.debit_amount)?,
                    credit_amount: normalize_amount(&line.credit_amount)?,
                    description: line.description.clone(),
                })
            })
            .collect()
    }
}

fn ensure_balanced(debits: BigDecimal, credits: BigDecimal) -> LedgerResult<()> {
    if debits == credits {
        return Ok(());
    }
    let difference = (&debits - &credits).abs();
    Err(LedgerError::UnbalancedEntry {
        debits,
        credits,
        difference,
    })
}

/// A posted line joined with its entry header, as read by balances and reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedLine {
    pub line_id: JournalLineId,
    pub entry_id: JournalEntryId,
    pub entry_number: u64,
    pub entry_date: NaiveDate,
    pub entry_description: String,
    pub line_description: Option<String>,
    pub account_id: AccountId,
    pub debit_amount: BigDecimal,
    pub credit_amount: BigDecimal,
}

/// Inclusive date range; open ends are unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn until(end: NaiveDate) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Everything strictly before `date`
    pub fn before(date: NaiveDate) -> Self {
        match date.pred_opt() {
            Some(end) => Self::until(end),
            // Nothing precedes the minimum date
            None => Self::between(NaiveDate::MAX, NaiveDate::MIN),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }
}

/// Bank account wrapping a general-ledger asset account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: BankAccountId,
    /// The general-ledger account this bank account reconciles against
    pub account_id: AccountId,
    pub name: String,
    pub account_number: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// External bank statement line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankStatementLine {
    pub id: StatementLineId,
    pub bank_account_id: BankAccountId,
    pub statement_date: NaiveDate,
    /// Deposits are positive, withdrawals negative
    pub amount: BigDecimal,
    pub description: String,
    pub reference: Option<String>,
    /// Matched journal line, if reconciled
    pub journal_line_id: Option<JournalLineId>,
    pub matched_at: Option<DateTime<Utc>>,
    pub imported_at: DateTime<Utc>,
}

impl BankStatementLine {
    pub fn is_reconciled(&self) -> bool {
        self.journal_line_id.is_some()
    }
}

/// Statement line as supplied by an import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLineInput {
    pub statement_date: NaiveDate,
    pub amount: BigDecimal,
    pub description: String,
    pub reference: Option<String>,
}

/// 1:1 link between a statement line and a journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationLink {
    pub statement_id: StatementLineId,
    pub journal_line_id: JournalLineId,
    pub matched_at: DateTime<Utc>,
}

/// Errors that can occur in the ledger system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Entry is not balanced: debits = {debits}, credits = {credits} (difference {difference})")]
    UnbalancedEntry {
        debits: BigDecimal,
        credits: BigDecimal,
        difference: BigDecimal,
    },
    #[error("Cannot {action} a {from} journal entry")]
    InvalidStateTransition { from: EntryStatus, action: EntryAction },
    #[error("Account {code} is inactive")]
    InactiveAccount { code: String },
    #[error("Account {code} has a non-zero balance of {balance}")]
    NonZeroBalance { code: String, balance: BigDecimal },
    #[error("Account code '{0}' already exists")]
    DuplicateCode(String),
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Journal line not found: {0}")]
    LineNotFound(JournalLineId),
    #[error("Bank account not found: {0}")]
    BankAccountNotFound(BankAccountId),
    #[error("Bank statement line not found: {0}")]
    StatementNotFound(StatementLineId),
    #[error("Statement line {statement_id} or journal line {journal_line_id} is already matched")]
    AlreadyMatched {
        statement_id: StatementLineId,
        journal_line_id: JournalLineId,
    },
    #[error("Statement line {0} is not matched")]
    NotMatched(StatementLineId),
    #[error("Invalid journal line: {0}")]
    InvalidLine(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Stable machine-readable error code
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::InactiveAccount { .. } => "INACTIVE_ACCOUNT",
            Self::NonZeroBalance { .. } => "NON_ZERO_BALANCE",
            Self::DuplicateCode(_) => "DUPLICATE_CODE",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::LineNotFound(_) => "LINE_NOT_FOUND",
            Self::BankAccountNotFound(_) => "BANK_ACCOUNT_NOT_FOUND",
            Self::StatementNotFound(_) => "STATEMENT_NOT_FOUND",
            Self::AlreadyMatched { .. } => "ALREADY_MATCHED",
            Self::NotMatched(_) => "NOT_MATCHED",
            Self::InvalidLine(_) => "INVALID_LINE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Infrastructure failures may be retried; domain errors never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn is_domain(&self) -> bool {
        !self.is_retryable()
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
