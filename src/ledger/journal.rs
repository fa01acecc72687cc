//! Journal engine: validation and lifecycle of journal entries
//!
//! The engine is the only writer of ledger-affecting state. Every transition
//! goes through [`EntryStatus::apply`] and is committed with a conditional
//! write on the entry's version, so two callers racing on the same entry
//! cannot both succeed.

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};

use crate::traits::*;
use crate::types::*;

/// Journal manager for handling journal entry operations
pub struct JournalManager<S: LedgerStorage> {
    storage: S,
    validator: Box<dyn JournalValidator>,
}

impl<S: LedgerStorage> JournalManager<S> {
    /// Create a new journal manager
    pub fn new(storage: S) -> Self {
        Self::with_validator(storage, Box::new(DefaultJournalValidator))
    }

    /// Create a new journal manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn JournalValidator>) -> Self {
        Self { storage, validator }
    }

    /// Validate a submission and store it as a draft with a fresh entry number
    pub async fn create_entry(&self, input: JournalEntryInput) -> LedgerResult<JournalEntry> {
        self.validate_input(&input).await?;

        let entry = self
            .storage
            .insert_entry(JournalEntry::draft(&input)?)
            .await?;

        tracing::info!(
            entry_id = %entry.id,
            entry_number = entry.entry_number,
            lines = entry.lines.len(),
            "journal entry created"
        );
        Ok(entry)
    }

    /// Replace the header and line set of a draft entry
    pub async fn update_entry(
        &self,
        entry_id: JournalEntryId,
        input: JournalEntryInput,
    ) -> LedgerResult<JournalEntry> {
        let current = self.get_entry_required(entry_id).await?;
        current.status.apply(EntryAction::Edit)?;
        self.validate_input(&input).await?;

        let replacement = JournalEntry::draft_with_id(entry_id, &input)?;
        if !self
            .storage
            .replace_entry(&replacement, current.version)
            .await?
        {
            return Err(self.conflict(entry_id, EntryAction::Edit).await);
        }

        tracing::info!(entry_id = %entry_id, "journal entry updated");
        self.get_entry_required(entry_id).await
    }

    /// Post a draft entry so its lines count toward balances.
    ///
    /// Posting is not idempotent: a second call fails with
    /// `InvalidStateTransition`.
    pub async fn post_entry(&self, entry_id: JournalEntryId) -> LedgerResult<JournalEntry> {
        let mut entry = self.get_entry_required(entry_id).await?;
        let status = entry
            .status
            .apply(EntryAction::Post)?
            .ok_or(LedgerError::InvalidStateTransition {
                from: entry.status,
                action: EntryAction::Post,
            })?;

        entry.ensure_balanced()?;

        let posted_at = Utc::now();
        let change = StatusChange {
            entry_id,
            expected_version: entry.version,
            to: status,
            posted_at: Some(posted_at),
        };
        // Storage re-checks that every line's account is still active
        let applied = self
            .storage
            .transition_entry(&change)
            .await
            .inspect_err(|err| tracing::warn!(entry_id = %entry_id, %err, "posting rejected"))?;
        if !applied {
            tracing::warn!(entry_id = %entry_id, "posting lost a concurrent update");
            return Err(self.conflict(entry_id, EntryAction::Post).await);
        }

        entry.status = status;
        entry.posted_at = Some(posted_at);
        entry.version += 1;
        tracing::info!(
            entry_id = %entry_id,
            entry_number = entry.entry_number,
            amount = %entry.total_debits(),
            "journal entry posted"
        );
        Ok(entry)
    }

    /// Void a posted entry. Its lines are kept but stop counting, and any
    /// reconciliation link on them is released.
    pub async fn void_entry(&self, entry_id: JournalEntryId) -> LedgerResult<JournalEntry> {
        let mut entry = self.get_entry_required(entry_id).await?;
        let status = entry
            .status
            .apply(EntryAction::Void)?
            .ok_or(LedgerError::InvalidStateTransition {
                from: entry.status,
                action: EntryAction::Void,
            })?;

        let change = StatusChange {
            entry_id,
            expected_version: entry.version,
            to: status,
            posted_at: None,
        };
        if !self.storage.transition_entry(&change).await? {
            return Err(self.conflict(entry_id, EntryAction::Void).await);
        }

        entry.status = status;
        entry.version += 1;
        tracing::info!(entry_id = %entry_id, entry_number = entry.entry_number, "journal entry voided");
        Ok(entry)
    }

    /// Hard-delete a draft entry and its lines
    pub async fn delete_entry(&self, entry_id: JournalEntryId) -> LedgerResult<()> {
        let entry = self.get_entry_required(entry_id).await?;
        entry.status.apply(EntryAction::Delete)?;

        if !self.storage.delete_entry(entry_id, entry.version).await? {
            return Err(self.conflict(entry_id, EntryAction::Delete).await);
        }

        tracing::info!(entry_id = %entry_id, entry_number = entry.entry_number, "journal entry deleted");
        Ok(())
    }

    /// Get a journal entry by ID
    pub async fn get_entry(&self, entry_id: JournalEntryId) -> LedgerResult<Option<JournalEntry>> {
        self.storage.get_entry(entry_id).await
    }

    /// Get a journal entry by ID, returning an error if not found
    pub async fn get_entry_required(&self, entry_id: JournalEntryId) -> LedgerResult<JournalEntry> {
        self.storage
            .get_entry(entry_id)
            .await?
            .ok_or(LedgerError::EntryNotFound(entry_id))
    }

    /// List entries ordered by entry date then entry number
    pub async fn list_entries(&self, status: Option<EntryStatus>) -> LedgerResult<Vec<JournalEntry>> {
        self.storage.list_entries(status).await
    }

    pub async fn count_entries(&self, status: Option<EntryStatus>) -> LedgerResult<u64> {
        self.storage.count_entries(status).await
    }

    /// Find a journal line together with its owning entry
    pub async fn find_line(
        &self,
        line_id: JournalLineId,
    ) -> LedgerResult<(JournalEntry, JournalEntryLine)> {
        self.storage
            .find_line(line_id)
            .await?
            .ok_or(LedgerError::LineNotFound(line_id))
    }

    /// The double-entry rules always run; a custom validator can only add
    /// rules on top of them.
    async fn validate_input(&self, input: &JournalEntryInput) -> LedgerResult<()> {
        let checked = input
            .validate()
            .and_then(|()| self.validator.validate_entry(input));
        if let Err(err) = checked {
            tracing::warn!(error = %err, "journal entry rejected");
            return Err(err);
        }

        // Verify all referenced accounts exist
        for line in &input.lines {
            if self.storage.get_account(line.account_id).await?.is_none() {
                return Err(LedgerError::AccountNotFound(line.account_id.to_string()));
            }
        }
        Ok(())
    }

    /// Explain why a conditional write lost: the entry moved to a state that
    /// no longer permits `action`, it vanished, or it was edited concurrently.
    async fn conflict(&self, entry_id: JournalEntryId, action: EntryAction) -> LedgerError {
        match self.storage.get_entry(entry_id).await {
            Ok(Some(entry)) => match entry.status.apply(action) {
                Err(err) => err,
                Ok(_) => LedgerError::Storage(format!(
                    "journal entry {} was modified concurrently, retry the {}",
                    entry_id, action
                )),
            },
            Ok(None) => LedgerError::EntryNotFound(entry_id),
            Err(err) => err,
        }
    }
}

/// Builder for journal submissions
#[derive(Debug)]
pub struct JournalEntryBuilder {
    input: JournalEntryInput,
}

impl JournalEntryBuilder {
    pub fn new(entry_date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            input: JournalEntryInput::new(entry_date, description.into(), None),
        }
    }

    /// Set the reference for the entry
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.input.reference = Some(reference.into());
        self
    }

    pub fn debit(mut self, account_id: AccountId, amount: BigDecimal, description: Option<String>) -> Self {
        self.input
            .lines
            .push(JournalLineInput::debit(account_id, amount, description));
        self
    }

    pub fn credit(mut self, account_id: AccountId, amount: BigDecimal, description: Option<String>) -> Self {
        self.input
            .lines
            .push(JournalLineInput::credit(account_id, amount, description));
        self
    }

    /// Positive amounts debit, negative amounts credit
    pub fn signed(mut self, account_id: AccountId, amount: BigDecimal, description: Option<String>) -> Self {
        self.input
            .lines
            .push(JournalLineInput::signed(account_id, amount, description));
        self
    }

    pub fn line(mut self, line: JournalLineInput) -> Self {
        self.input.lines.push(line);
        self
    }

    /// Build the submission, checking the double-entry rules locally
    pub fn build(self) -> LedgerResult<JournalEntryInput> {
        self.input.validate()?;
        Ok(self.input)
    }
}

/// Common posting patterns, including the entries synthesized for invoices
/// and payments by the invoicing collaborator
pub mod patterns {
    use super::*;

    /// Invoice issued on credit: debit receivables, credit revenue
    pub fn invoice_issued(
        date: NaiveDate,
        invoice_number: &str,
        receivables_account_id: AccountId,
        revenue_account_id: AccountId,
        amount: BigDecimal,
    ) -> LedgerResult<JournalEntryInput> {
        JournalEntryBuilder::new(date, format!("Invoice {}", invoice_number))
            .reference(invoice_number)
            .debit(receivables_account_id, amount.clone(), None)
            .credit(revenue_account_id, amount, None)
            .build()
    }

    /// Customer pays an invoice: debit cash, credit receivables
    pub fn invoice_payment_received(
        date: NaiveDate,
        invoice_number: &str,
        cash_account_id: AccountId,
        receivables_account_id: AccountId,
        amount: BigDecimal,
    ) -> LedgerResult<JournalEntryInput> {
        JournalEntryBuilder::new(date, format!("Payment for invoice {}", invoice_number))
            .reference(invoice_number)
            .debit(cash_account_id, amount.clone(), None)
            .credit(receivables_account_id, amount, None)
            .build()
    }

    /// Create a simple payment (debit expense, credit cash)
    pub fn expense_payment(
        date: NaiveDate,
        description: &str,
        expense_account_id: AccountId,
        cash_account_id: AccountId,
        amount: BigDecimal,
    ) -> LedgerResult<JournalEntryInput> {
        JournalEntryBuilder::new(date, description)
            .debit(expense_account_id, amount.clone(), None)
            .credit(cash_account_id, amount, None)
            .build()
    }

    /// Create an asset purchase (debit asset, credit cash/payables)
    pub fn asset_purchase(
        date: NaiveDate,
        description: &str,
        asset_account_id: AccountId,
        cash_or_payables_account_id: AccountId,
        amount: BigDecimal,
    ) -> LedgerResult<JournalEntryInput> {
        JournalEntryBuilder::new(date, description)
            .debit(asset_account_id, amount.clone(), None)
            .credit(cash_or_payables_account_id, amount, None)
            .build()
    }

    /// Cash received from a loan
    pub fn loan_received(
        date: NaiveDate,
        description: &str,
        cash_account_id: AccountId,
        loan_payable_account_id: AccountId,
        amount: BigDecimal,
    ) -> LedgerResult<JournalEntryInput> {
        JournalEntryBuilder::new(date, description)
            .debit(
                cash_account_id,
                amount.clone(),
                Some("Cash received from loan".to_string()),
            )
            .credit(
                loan_payable_account_id,
                amount,
                Some("Loan payable".to_string()),
            )
            .build()
    }

    /// Owner invests cash in the business
    pub fn owner_investment(
        date: NaiveDate,
        description: &str,
        cash_account_id: AccountId,
        equity_account_id: AccountId,
        amount: BigDecimal,
    ) -> LedgerResult<JournalEntryInput> {
        JournalEntryBuilder::new(date, description)
            .debit(
                cash_account_id,
                amount.clone(),
                Some("Cash invested by owner".to_string()),
            )
            .credit(
                equity_account_id,
                amount,
                Some("Owner's equity contribution".to_string()),
            )
            .build()
    }
}
