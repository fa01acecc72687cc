//! Bank reconciliation: statement import and 1:1 matching of statement lines
//! to posted journal lines
//!
//! The engine exclusively owns match links. Voiding a journal entry releases
//! the links on its lines inside the storage's void transition, so a
//! reconciled statement line never points at a line that stopped counting.

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::BalanceCalculator;
use crate::traits::*;
use crate::types::*;

/// Book versus bank position of one bank account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub bank_account_id: BankAccountId,
    /// Balance of the wrapped general-ledger account over posted entries
    pub book_balance: BigDecimal,
    pub reconciled_balance: BigDecimal,
    pub unreconciled_total: BigDecimal,
    pub unreconciled_count: usize,
}

/// Re-queryable view of the unmatched statement lines of a bank account.
///
/// Holds no snapshot: every [`fetch`](Self::fetch) reflects the match state
/// at the time of the call.
pub struct UnreconciledStatements<'a, S: LedgerStorage> {
    storage: &'a S,
    bank_account_id: BankAccountId,
}

impl<S: LedgerStorage> UnreconciledStatements<'_, S> {
    pub fn bank_account_id(&self) -> BankAccountId {
        self.bank_account_id
    }

    /// Unmatched lines ordered by statement date ascending
    pub async fn fetch(&self) -> LedgerResult<Vec<BankStatementLine>> {
        self.storage
            .list_statement_lines(self.bank_account_id, Some(false))
            .await
    }

    pub async fn count(&self) -> LedgerResult<usize> {
        Ok(self.fetch().await?.len())
    }

    pub async fn total(&self) -> LedgerResult<BigDecimal> {
        Ok(self.fetch().await?.iter().map(|line| &line.amount).sum())
    }
}

/// Reconciliation engine for bank statements
pub struct ReconciliationEngine<S: LedgerStorage> {
    storage: S,
    balances: BalanceCalculator<S>,
}

impl<S: LedgerStorage + Clone> ReconciliationEngine<S> {
    pub fn new(storage: S) -> Self {
        Self {
            balances: BalanceCalculator::new(storage.clone()),
            storage,
        }
    }
}

impl<S: LedgerStorage> ReconciliationEngine<S> {
    /// Register a bank account over an existing ASSET account
    pub async fn create_bank_account(
        &self,
        account_id: AccountId,
        name: String,
        account_number: Option<String>,
    ) -> LedgerResult<BankAccount> {
        let account = self
            .storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
        if account.account_type != AccountType::Asset {
            return Err(LedgerError::Validation(format!(
                "bank account must wrap an ASSET account, {} is {}",
                account.code, account.account_type
            )));
        }
        if !account.is_active {
            return Err(LedgerError::Validation(format!(
                "bank account cannot wrap inactive account {}",
                account.code
            )));
        }
        if name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Bank account name cannot be empty".to_string(),
            ));
        }

        let bank_account = BankAccount {
            id: Uuid::new_v4(),
            account_id,
            name,
            account_number,
            is_active: true,
            created_at: Utc::now(),
        };
        self.storage.insert_bank_account(&bank_account).await?;

        tracing::info!(
            bank_account_id = %bank_account.id,
            code = %account.code,
            "bank account created"
        );
        Ok(bank_account)
    }

    pub async fn get_bank_account(
        &self,
        bank_account_id: BankAccountId,
    ) -> LedgerResult<Option<BankAccount>> {
        self.storage.get_bank_account(bank_account_id).await
    }

    pub async fn get_bank_account_required(
        &self,
        bank_account_id: BankAccountId,
    ) -> LedgerResult<BankAccount> {
        self.storage
            .get_bank_account(bank_account_id)
            .await?
            .ok_or(LedgerError::BankAccountNotFound(bank_account_id))
    }

    pub async fn list_bank_accounts(&self) -> LedgerResult<Vec<BankAccount>> {
        self.storage.list_bank_accounts().await
    }

    pub async fn list_active_bank_accounts(&self) -> LedgerResult<Vec<BankAccount>> {
        let accounts = self.storage.list_bank_accounts().await?;
        Ok(accounts.into_iter().filter(|a| a.is_active).collect())
    }

    /// Stop accepting statement imports. Existing lines and matches stay.
    pub async fn deactivate_bank_account(
        &self,
        bank_account_id: BankAccountId,
    ) -> LedgerResult<BankAccount> {
        self.set_bank_account_active(bank_account_id, false).await
    }

    pub async fn activate_bank_account(
        &self,
        bank_account_id: BankAccountId,
    ) -> LedgerResult<BankAccount> {
        self.set_bank_account_active(bank_account_id, true).await
    }

    async fn set_bank_account_active(
        &self,
        bank_account_id: BankAccountId,
        is_active: bool,
    ) -> LedgerResult<BankAccount> {
        let bank_account = self
            .storage
            .set_bank_account_active(bank_account_id, is_active)
            .await?
            .ok_or(LedgerError::BankAccountNotFound(bank_account_id))?;

        tracing::info!(bank_account_id = %bank_account_id, is_active, "bank account activity changed");
        Ok(bank_account)
    }

    /// Append an unmatched line to the bank account's statement history
    pub async fn import_statement(
        &self,
        bank_account_id: BankAccountId,
        input: StatementLineInput,
    ) -> LedgerResult<BankStatementLine> {
        let bank_account = self.get_bank_account_required(bank_account_id).await?;
        if !bank_account.is_active {
            tracing::warn!(bank_account_id = %bank_account_id, "import rejected, bank account inactive");
            return Err(LedgerError::Validation(format!(
                "bank account {} is inactive",
                bank_account.name
            )));
        }

        let line = BankStatementLine {
            id: Uuid::new_v4(),
            bank_account_id,
            statement_date: input.statement_date,
            amount: normalize_amount(&input.amount)?,
            description: input.description,
            reference: input.reference,
            journal_line_id: None,
            matched_at: None,
            imported_at: Utc::now(),
        };
        self.storage.insert_statement_line(&line).await?;

        tracing::debug!(
            statement_id = %line.id,
            bank_account_id = %bank_account_id,
            amount = %line.amount,
            "statement line imported"
        );
        Ok(line)
    }

    pub async fn get_statement_line(
        &self,
        statement_id: StatementLineId,
    ) -> LedgerResult<BankStatementLine> {
        self.storage
            .get_statement_line(statement_id)
            .await?
            .ok_or(LedgerError::StatementNotFound(statement_id))
    }

    /// Link a statement line to a posted journal line on the bank's account
    pub async fn reconcile_statement(
        &self,
        statement_id: StatementLineId,
        journal_line_id: JournalLineId,
    ) -> LedgerResult<()> {
        let statement = self.get_statement_line(statement_id).await?;
        let bank_account = self
            .get_bank_account_required(statement.bank_account_id)
            .await?;
        let (entry, line) = self
            .storage
            .find_line(journal_line_id)
            .await?
            .ok_or(LedgerError::LineNotFound(journal_line_id))?;

        if entry.status != EntryStatus::Posted {
            return Err(LedgerError::Validation(format!(
                "journal line {} belongs to a {} entry, only posted lines can be reconciled",
                journal_line_id, entry.status
            )));
        }
        if line.account_id != bank_account.account_id {
            return Err(LedgerError::Validation(format!(
                "journal line {} does not post to the account of bank account {}",
                journal_line_id, bank_account.name
            )));
        }

        let link = ReconciliationLink {
            statement_id,
            journal_line_id,
            matched_at: Utc::now(),
        };
        if !self.storage.link_statement(&link).await? {
            tracing::warn!(
                statement_id = %statement_id,
                journal_line_id = %journal_line_id,
                "reconciliation rejected, already matched"
            );
            return Err(LedgerError::AlreadyMatched {
                statement_id,
                journal_line_id,
            });
        }

        tracing::info!(
            statement_id = %statement_id,
            journal_line_id = %journal_line_id,
            "statement line reconciled"
        );
        Ok(())
    }

    /// Remove the link of a statement line
    pub async fn unreconcile_statement(&self, statement_id: StatementLineId) -> LedgerResult<()> {
        match self.storage.unlink_statement(statement_id).await? {
            Some(link) => {
                tracing::info!(
                    statement_id = %statement_id,
                    journal_line_id = %link.journal_line_id,
                    "statement line unreconciled"
                );
                Ok(())
            }
            None => Err(LedgerError::NotMatched(statement_id)),
        }
    }

    /// Sum of the amounts of all matched statement lines
    pub async fn reconciled_balance(&self, bank_account_id: BankAccountId) -> LedgerResult<BigDecimal> {
        self.get_bank_account_required(bank_account_id).await?;
        let lines = self
            .storage
            .list_statement_lines(bank_account_id, Some(true))
            .await?;
        Ok(lines.iter().map(|line| &line.amount).sum())
    }

    pub async fn unreconciled_statements(
        &self,
        bank_account_id: BankAccountId,
    ) -> LedgerResult<UnreconciledStatements<'_, S>> {
        self.get_bank_account_required(bank_account_id).await?;
        Ok(UnreconciledStatements {
            storage: &self.storage,
            bank_account_id,
        })
    }

    /// Statement lines dated within `start..=end`, ordered by date
    pub async fn statements_between(
        &self,
        bank_account_id: BankAccountId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<Vec<BankStatementLine>> {
        self.get_bank_account_required(bank_account_id).await?;
        let range = DateRange::between(start, end);
        Ok(self
            .storage
            .list_statement_lines(bank_account_id, None)
            .await?
            .into_iter()
            .filter(|line| range.contains(line.statement_date))
            .collect())
    }

    pub async fn reconciliation_summary(
        &self,
        bank_account_id: BankAccountId,
    ) -> LedgerResult<ReconciliationSummary> {
        let bank_account = self.get_bank_account_required(bank_account_id).await?;
        let book_balance = self
            .balances
            .balance(bank_account.account_id, DateRange::all())
            .await?;

        let mut reconciled_balance = zero();
        let mut unreconciled_total = zero();
        let mut unreconciled_count = 0;
        for line in self
            .storage
            .list_statement_lines(bank_account_id, None)
            .await?
        {
            if line.is_reconciled() {
                reconciled_balance += &line.amount;
            } else {
                unreconciled_total += &line.amount;
                unreconciled_count += 1;
            }
        }

        Ok(ReconciliationSummary {
            bank_account_id,
            book_balance,
            reconciled_balance,
            unreconciled_total,
            unreconciled_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::JournalManager;
    use crate::utils::memory_storage::MemoryStorage;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    struct Fixture {
        engine: ReconciliationEngine<MemoryStorage>,
        journal: JournalManager<MemoryStorage>,
        bank: BankAccount,
        cash: Account,
        sales: Account,
    }

    async fn fixture() -> Fixture {
        let storage = MemoryStorage::new();
        let cash = Account::new("1000".into(), "Cash".into(), AccountType::Asset, None);
        let sales = Account::new("4000".into(), "Sales".into(), AccountType::Revenue, None);
        storage.insert_account(&cash).await.unwrap();
        storage.insert_account(&sales).await.unwrap();

        let engine = ReconciliationEngine::new(storage.clone());
        let bank = engine
            .create_bank_account(cash.id, "Operating".into(), Some("0042".into()))
            .await
            .unwrap();
        Fixture {
            engine,
            journal: JournalManager::new(storage),
            bank,
            cash,
            sales,
        }
    }

    impl Fixture {
        /// Post a cash sale and return the id of its cash line
        async fn posted_cash_line(&self, day: u32, amount: &str) -> (JournalEntryId, JournalLineId) {
            let mut input = JournalEntryInput::new(date(day), "Cash sale".into(), None);
            input
                .lines
                .push(JournalLineInput::debit(self.cash.id, dec(amount), None));
            input
                .lines
                .push(JournalLineInput::credit(self.sales.id, dec(amount), None));
            let entry = self.journal.create_entry(input).await.unwrap();
            let entry = self.journal.post_entry(entry.id).await.unwrap();
            (entry.id, entry.lines[0].id)
        }

        async fn import(&self, day: u32, amount: &str) -> BankStatementLine {
            self.engine
                .import_statement(
                    self.bank.id,
                    StatementLineInput {
                        statement_date: date(day),
                        amount: dec(amount),
                        description: "Deposit".into(),
                        reference: None,
                    },
                )
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_bank_account_must_wrap_asset() {
        let f = fixture().await;
        let err = f
            .engine
            .create_bank_account(f.sales.id, "Wrong".into(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
        assert_eq!(f.engine.list_bank_accounts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_gl_account_cannot_back_a_bank_account() {
        let f = fixture().await;
        let dormant = Account::new("1090".into(), "Dormant".into(), AccountType::Asset, None);
        f.engine.storage.insert_account(&dormant).await.unwrap();
        f.engine
            .storage
            .set_account_active(dormant.id, false)
            .await
            .unwrap();

        let err = f
            .engine
            .create_bank_account(dormant.id, "Old bank".into(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_inactive_bank_account_rejects_imports() {
        let f = fixture().await;
        let kept = f.import(1, "10.00").await;

        let closed = f.engine.deactivate_bank_account(f.bank.id).await.unwrap();
        assert!(!closed.is_active);
        assert!(f.engine.list_active_bank_accounts().await.unwrap().is_empty());
        assert_eq!(f.engine.list_bank_accounts().await.unwrap().len(), 1);

        let err = f
            .engine
            .import_statement(
                f.bank.id,
                StatementLineInput {
                    statement_date: date(2),
                    amount: dec("5.00"),
                    description: "Late deposit".into(),
                    reference: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");

        // History stays readable and matchable
        let (_, line_id) = f.posted_cash_line(1, "10.00").await;
        f.engine.reconcile_statement(kept.id, line_id).await.unwrap();
        assert_eq!(f.engine.reconciled_balance(f.bank.id).await.unwrap(), dec("10.00"));

        f.engine.activate_bank_account(f.bank.id).await.unwrap();
        f.import(3, "5.00").await;

        let err = f
            .engine
            .deactivate_bank_account(Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "BANK_ACCOUNT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_reconcile_twice_fails() {
        let f = fixture().await;
        let (_, line_id) = f.posted_cash_line(1, "150.00").await;
        let statement = f.import(2, "150.00").await;

        f.engine
            .reconcile_statement(statement.id, line_id)
            .await
            .unwrap();
        let err = f
            .engine
            .reconcile_statement(statement.id, line_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyMatched { .. }));

        // The journal side is taken too
        let other = f.import(3, "150.00").await;
        let err = f
            .engine
            .reconcile_statement(other.id, line_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ALREADY_MATCHED");
        assert_eq!(f.engine.reconciled_balance(f.bank.id).await.unwrap(), dec("150.00"));
    }

    #[tokio::test]
    async fn test_unreconcile_without_link_fails() {
        let f = fixture().await;
        let statement = f.import(1, "10.00").await;
        let err = f
            .engine
            .unreconcile_statement(statement.id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotMatched(id) if id == statement.id));
    }

    #[tokio::test]
    async fn test_only_posted_bank_lines_can_match() {
        let f = fixture().await;
        let statement = f.import(1, "20.00").await;

        let mut input = JournalEntryInput::new(date(1), "Draft".into(), None);
        input
            .lines
            .push(JournalLineInput::debit(f.cash.id, dec("20.00"), None));
        input
            .lines
            .push(JournalLineInput::credit(f.sales.id, dec("20.00"), None));
        let draft = f.journal.create_entry(input).await.unwrap();
        let err = f
            .engine
            .reconcile_statement(statement.id, draft.lines[0].id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");

        f.posted_cash_line(2, "20.00").await;
        let entries = f.journal.list_entries(Some(EntryStatus::Posted)).await.unwrap();
        let sales_line = entries[0].lines[1].id;
        let err = f
            .engine
            .reconcile_statement(statement.id, sales_line)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unreconciled_view_is_live_and_ordered() {
        let f = fixture().await;
        let (_, line_id) = f.posted_cash_line(1, "30.00").await;
        let late = f.import(20, "5.00").await;
        let early = f.import(2, "30.00").await;

        let view = f.engine.unreconciled_statements(f.bank.id).await.unwrap();
        let lines = view.fetch().await.unwrap();
        assert_eq!(
            lines.iter().map(|l| l.id).collect::<Vec<_>>(),
            vec![early.id, late.id]
        );

        f.engine.reconcile_statement(early.id, line_id).await.unwrap();
        let lines = view.fetch().await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, late.id);
        assert_eq!(view.total().await.unwrap(), dec("5.00"));
    }

    #[tokio::test]
    async fn test_void_releases_link_and_summary() {
        let f = fixture().await;
        let (entry_id, line_id) = f.posted_cash_line(1, "80.00").await;
        let statement = f.import(2, "80.00").await;
        f.import(3, "-12.50").await;
        f.engine
            .reconcile_statement(statement.id, line_id)
            .await
            .unwrap();

        let summary = f.engine.reconciliation_summary(f.bank.id).await.unwrap();
        assert_eq!(summary.book_balance, dec("80.00"));
        assert_eq!(summary.reconciled_balance, dec("80.00"));
        assert_eq!(summary.unreconciled_total, dec("-12.50"));
        assert_eq!(summary.unreconciled_count, 1);

        f.journal.void_entry(entry_id).await.unwrap();
        let statement = f.engine.get_statement_line(statement.id).await.unwrap();
        assert!(!statement.is_reconciled());

        let summary = f.engine.reconciliation_summary(f.bank.id).await.unwrap();
        assert_eq!(summary.book_balance, dec("0"));
        assert_eq!(summary.reconciled_balance, dec("0"));
        assert_eq!(summary.unreconciled_count, 2);

        let between = f
            .engine
            .statements_between(f.bank.id, date(3), date(31))
            .await
            .unwrap();
        assert_eq!(between.len(), 1);
    }
}
