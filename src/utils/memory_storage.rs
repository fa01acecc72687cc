//! In-memory storage implementation for testing

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    entries: HashMap<JournalEntryId, JournalEntry>,
    last_entry_number: u64,
    bank_accounts: HashMap<BankAccountId, BankAccount>,
    statements: HashMap<StatementLineId, BankStatementLine>,
    /// Reverse index of reconciliation links, journal line -> statement line
    links_by_line: HashMap<JournalLineId, StatementLineId>,
}

impl Tables {
    fn posted_lines(
        &self,
        account_id: AccountId,
        range: DateRange,
    ) -> impl Iterator<Item = (&JournalEntry, &JournalEntryLine)> + '_ {
        self.entries
            .values()
            .filter(move |entry| entry.status.affects_balances() && range.contains(entry.entry_date))
            .flat_map(|entry| entry.lines.iter().map(move |line| (entry, line)))
            .filter(move |(_, line)| line.account_id == account_id)
    }

    fn net_activity(&self, account_id: AccountId) -> BigDecimal {
        self.posted_lines(account_id, DateRange::all())
            .map(|(_, line)| &line.debit_amount - &line.credit_amount)
            .sum()
    }

    /// Walk up from `start`; true if `account_id` is on the way
    fn is_ancestor_or_self(&self, account_id: AccountId, start: AccountId) -> bool {
        let mut visited = HashSet::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if id == account_id {
                return true;
            }
            if !visited.insert(id) {
                return false;
            }
            current = self.accounts.get(&id).and_then(|a| a.parent_id);
        }
        false
    }

    fn ensure_accounts_active(&self, entry: &JournalEntry) -> LedgerResult<()> {
        for line in &entry.lines {
            let account = self
                .accounts
                .get(&line.account_id)
                .ok_or_else(|| LedgerError::AccountNotFound(line.account_id.to_string()))?;
            if !account.is_active {
                return Err(LedgerError::InactiveAccount {
                    code: account.code.clone(),
                });
            }
        }
        Ok(())
    }

    fn release_links(&mut self, entry_id: JournalEntryId) {
        let Some(entry) = self.entries.get(&entry_id) else {
            return;
        };
        let line_ids: Vec<JournalLineId> = entry.lines.iter().map(|l| l.id).collect();
        for line_id in line_ids {
            if let Some(statement_id) = self.links_by_line.remove(&line_id) {
                if let Some(statement) = self.statements.get_mut(&statement_id) {
                    statement.journal_line_id = None;
                    statement.matched_at = None;
                }
            }
        }
    }
}

/// In-memory storage implementation for testing and development
///
/// All tables sit behind one lock, so every trait call is atomic and readers
/// never observe a partially applied write. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing). Entry numbers keep increasing.
    pub fn clear(&self) -> LedgerResult<()> {
        let mut tables = self.write()?;
        let last_entry_number = tables.last_entry_number;
        *tables = Tables {
            last_entry_number,
            ..Tables::default()
        };
        Ok(())
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn insert_account(&self, account: &Account) -> LedgerResult<bool> {
        let mut tables = self.write()?;
        if tables.accounts.values().any(|a| a.code == account.code) {
            return Ok(false);
        }
        tables.accounts.insert(account.id, account.clone());
        Ok(true)
    }

    async fn get_account(&self, account_id: AccountId) -> LedgerResult<Option<Account>> {
        Ok(self.read()?.accounts.get(&account_id).cloned())
    }

    async fn get_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        Ok(self
            .read()?
            .accounts
            .values()
            .find(|account| account.code == code)
            .cloned())
    }

    async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>> {
        let tables = self.read()?;
        let mut filtered: Vec<Account> = tables
            .accounts
            .values()
            .filter(|account| account_type.is_none_or(|t| account.account_type == t))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(filtered)
    }

    async fn update_account_details(
        &self,
        account_id: AccountId,
        name: &str,
        parent_id: Option<AccountId>,
    ) -> LedgerResult<Option<Account>> {
        let mut tables = self.write()?;
        if !tables.accounts.contains_key(&account_id) {
            return Ok(None);
        }
        if let Some(parent_id) = parent_id {
            if !tables.accounts.contains_key(&parent_id) {
                return Err(LedgerError::AccountNotFound(parent_id.to_string()));
            }
            if tables.is_ancestor_or_self(account_id, parent_id) {
                return Err(LedgerError::Validation(format!(
                    "Account {} cannot be placed under one of its own descendants",
                    account_id
                )));
            }
        }

        let Some(stored) = tables.accounts.get_mut(&account_id) else {
            return Ok(None);
        };
        stored.name = name.to_string();
        stored.parent_id = parent_id;
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn set_account_active(
        &self,
        account_id: AccountId,
        is_active: bool,
    ) -> LedgerResult<Option<Account>> {
        let mut tables = self.write()?;
        let Some(code) = tables.accounts.get(&account_id).map(|a| a.code.clone()) else {
            return Ok(None);
        };
        if !is_active {
            let balance = tables.net_activity(account_id);
            if balance != BigDecimal::from(0) {
                return Err(LedgerError::NonZeroBalance { code, balance });
            }
        }

        let Some(stored) = tables.accounts.get_mut(&account_id) else {
            return Ok(None);
        };
        if stored.is_active != is_active {
            stored.is_active = is_active;
            stored.updated_at = Utc::now();
        }
        Ok(Some(stored.clone()))
    }

    async fn insert_entry(&self, mut entry: JournalEntry) -> LedgerResult<JournalEntry> {
        let mut tables = self.write()?;
        tables.last_entry_number += 1;
        entry.entry_number = tables.last_entry_number;
        entry.version = 1;
        tables.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get_entry(&self, entry_id: JournalEntryId) -> LedgerResult<Option<JournalEntry>> {
        Ok(self.read()?.entries.get(&entry_id).cloned())
    }

    async fn list_entries(&self, status: Option<EntryStatus>) -> LedgerResult<Vec<JournalEntry>> {
        let tables = self.read()?;
        let mut entries: Vec<JournalEntry> = tables
            .entries
            .values()
            .filter(|entry| status.is_none_or(|s| entry.status == s))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| (entry.entry_date, entry.entry_number));
        Ok(entries)
    }

    async fn count_entries(&self, status: Option<EntryStatus>) -> LedgerResult<u64> {
        let tables = self.read()?;
        let count = tables
            .entries
            .values()
            .filter(|entry| status.is_none_or(|s| entry.status == s))
            .count();
        Ok(count as u64)
    }

    async fn replace_entry(
        &self,
        entry: &JournalEntry,
        expected_version: u64,
    ) -> LedgerResult<bool> {
        let mut tables = self.write()?;
        let Some(stored) = tables.entries.get_mut(&entry.id) else {
            return Ok(false);
        };
        if stored.version != expected_version {
            return Ok(false);
        }
        let mut replacement = entry.clone();
        replacement.entry_number = stored.entry_number;
        replacement.created_at = stored.created_at;
        replacement.version = expected_version + 1;
        replacement.updated_at = Utc::now();
        *stored = replacement;
        Ok(true)
    }

    async fn transition_entry(&self, change: &StatusChange) -> LedgerResult<bool> {
        let mut tables = self.write()?;
        let Some(current) = tables.entries.get(&change.entry_id) else {
            return Ok(false);
        };
        if current.version != change.expected_version {
            return Ok(false);
        }
        if change.to == EntryStatus::Posted {
            tables.ensure_accounts_active(current)?;
        }

        let Some(stored) = tables.entries.get_mut(&change.entry_id) else {
            return Ok(false);
        };
        stored.status = change.to;
        if change.posted_at.is_some() {
            stored.posted_at = change.posted_at;
        }
        stored.version += 1;
        stored.updated_at = Utc::now();

        if change.to == EntryStatus::Void {
            tables.release_links(change.entry_id);
        }
        Ok(true)
    }

    async fn delete_entry(
        &self,
        entry_id: JournalEntryId,
        expected_version: u64,
    ) -> LedgerResult<bool> {
        let mut tables = self.write()?;
        let current_version = tables.entries.get(&entry_id).map(|entry| entry.version);
        if current_version != Some(expected_version) {
            return Ok(false);
        }
        tables.release_links(entry_id);
        tables.entries.remove(&entry_id);
        Ok(true)
    }

    async fn find_line(
        &self,
        line_id: JournalLineId,
    ) -> LedgerResult<Option<(JournalEntry, JournalEntryLine)>> {
        let tables = self.read()?;
        Ok(tables.entries.values().find_map(|entry| {
            entry
                .lines
                .iter()
                .find(|line| line.id == line_id)
                .map(|line| (entry.clone(), line.clone()))
        }))
    }

    async fn account_totals(&self, ranges: &[DateRange]) -> LedgerResult<Vec<AccountTotals>> {
        let tables = self.read()?;
        let mut by_account: HashMap<AccountId, AccountTotals> = tables
            .accounts
            .values()
            .map(|account| {
                let totals = AccountTotals {
                    account: account.clone(),
                    has_activity: false,
                    totals: vec![LineTotals::default(); ranges.len()],
                };
                (account.id, totals)
            })
            .collect();

        let posted = tables
            .entries
            .values()
            .filter(|entry| entry.status.affects_balances());
        for entry in posted {
            for line in &entry.lines {
                let Some(account) = by_account.get_mut(&line.account_id) else {
                    continue;
                };
                account.has_activity = true;
                for (range, totals) in ranges.iter().zip(account.totals.iter_mut()) {
                    if range.contains(entry.entry_date) {
                        totals.debits += &line.debit_amount;
                        totals.credits += &line.credit_amount;
                    }
                }
            }
        }

        let mut result: Vec<AccountTotals> = by_account.into_values().collect();
        result.sort_by(|a, b| a.account.code.cmp(&b.account.code));
        Ok(result)
    }

    async fn sum_posted_lines(
        &self,
        account_id: AccountId,
        range: DateRange,
    ) -> LedgerResult<LineTotals> {
        let tables = self.read()?;
        let mut totals = LineTotals::default();
        for (_, line) in tables.posted_lines(account_id, range) {
            totals.debits += &line.debit_amount;
            totals.credits += &line.credit_amount;
        }
        Ok(totals)
    }

    async fn posted_lines(
        &self,
        account_id: AccountId,
        range: DateRange,
    ) -> LedgerResult<Vec<PostedLine>> {
        let tables = self.read()?;
        let mut lines: Vec<PostedLine> = tables
            .posted_lines(account_id, range)
            .map(|(entry, line)| PostedLine {
                line_id: line.id,
                entry_id: entry.id,
                entry_number: entry.entry_number,
                entry_date: entry.entry_date,
                entry_description: entry.description.clone(),
                line_description: line.description.clone(),
                account_id: line.account_id,
                debit_amount: line.debit_amount.clone(),
                credit_amount: line.credit_amount.clone(),
            })
            .collect();
        lines.sort_by_key(|line| (line.entry_date, line.entry_number));
        Ok(lines)
    }

    async fn insert_bank_account(&self, bank_account: &BankAccount) -> LedgerResult<()> {
        self.write()?
            .bank_accounts
            .insert(bank_account.id, bank_account.clone());
        Ok(())
    }

    async fn get_bank_account(
        &self,
        bank_account_id: BankAccountId,
    ) -> LedgerResult<Option<BankAccount>> {
        Ok(self.read()?.bank_accounts.get(&bank_account_id).cloned())
    }

    async fn list_bank_accounts(&self) -> LedgerResult<Vec<BankAccount>> {
        let tables = self.read()?;
        let mut accounts: Vec<BankAccount> = tables.bank_accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(accounts)
    }

    async fn set_bank_account_active(
        &self,
        bank_account_id: BankAccountId,
        is_active: bool,
    ) -> LedgerResult<Option<BankAccount>> {
        let mut tables = self.write()?;
        Ok(tables.bank_accounts.get_mut(&bank_account_id).map(|bank| {
            bank.is_active = is_active;
            bank.clone()
        }))
    }

    async fn insert_statement_line(&self, line: &BankStatementLine) -> LedgerResult<()> {
        let mut tables = self.write()?;
        match tables.bank_accounts.get(&line.bank_account_id) {
            None => return Err(LedgerError::BankAccountNotFound(line.bank_account_id)),
            Some(bank) if !bank.is_active => {
                return Err(LedgerError::Validation(format!(
                    "bank account {} is inactive",
                    bank.name
                )))
            }
            Some(_) => {}
        }
        tables.statements.insert(line.id, line.clone());
        Ok(())
    }

    async fn get_statement_line(
        &self,
        statement_id: StatementLineId,
    ) -> LedgerResult<Option<BankStatementLine>> {
        Ok(self.read()?.statements.get(&statement_id).cloned())
    }

    async fn list_statement_lines(
        &self,
        bank_account_id: BankAccountId,
        reconciled: Option<bool>,
    ) -> LedgerResult<Vec<BankStatementLine>> {
        let tables = self.read()?;
        let mut lines: Vec<BankStatementLine> = tables
            .statements
            .values()
            .filter(|line| line.bank_account_id == bank_account_id)
            .filter(|line| reconciled.is_none_or(|r| line.is_reconciled() == r))
            .cloned()
            .collect();
        lines.sort_by_key(|line| (line.statement_date, line.imported_at));
        Ok(lines)
    }

    async fn link_statement(&self, link: &ReconciliationLink) -> LedgerResult<bool> {
        let mut tables = self.write()?;
        if tables.links_by_line.contains_key(&link.journal_line_id) {
            return Ok(false);
        }
        // Re-checked under the lock so a concurrent void cannot slip in
        let line_posted = tables.entries.values().any(|entry| {
            entry.status == EntryStatus::Posted
                && entry.lines.iter().any(|line| line.id == link.journal_line_id)
        });
        if !line_posted {
            return Err(LedgerError::Validation(format!(
                "journal line {} is not part of a posted entry",
                link.journal_line_id
            )));
        }
        let Some(statement) = tables.statements.get_mut(&link.statement_id) else {
            return Err(LedgerError::StatementNotFound(link.statement_id));
        };
        if statement.journal_line_id.is_some() {
            return Ok(false);
        }
        statement.journal_line_id = Some(link.journal_line_id);
        statement.matched_at = Some(link.matched_at);
        tables
            .links_by_line
            .insert(link.journal_line_id, link.statement_id);
        Ok(true)
    }

    async fn unlink_statement(
        &self,
        statement_id: StatementLineId,
    ) -> LedgerResult<Option<ReconciliationLink>> {
        let mut tables = self.write()?;
        let Some(statement) = tables.statements.get_mut(&statement_id) else {
            return Err(LedgerError::StatementNotFound(statement_id));
        };
        let (Some(journal_line_id), Some(matched_at)) =
            (statement.journal_line_id.take(), statement.matched_at.take())
        else {
            return Ok(None);
        };
        tables.links_by_line.remove(&journal_line_id);
        Ok(Some(ReconciliationLink {
            statement_id,
            journal_line_id,
            matched_at,
        }))
    }
}
