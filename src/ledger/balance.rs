//! Account balance computation over posted journal lines

use bigdecimal::BigDecimal;

use crate::traits::*;
use crate::types::*;

/// Aggregates posted debit/credit amounts into signed balances.
///
/// Nothing is cached: every call reads the posted lines through storage, so
/// draft and void entries never leak into a balance.
#[derive(Clone)]
pub struct BalanceCalculator<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> BalanceCalculator<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Raw debit and credit sums of posted lines within the range
    pub async fn totals(&self, account_id: AccountId, range: DateRange) -> LedgerResult<LineTotals> {
        self.storage.sum_posted_lines(account_id, range).await
    }

    /// Balance signed by the account's normal side
    pub async fn balance(&self, account_id: AccountId, range: DateRange) -> LedgerResult<BigDecimal> {
        let account = self
            .storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
        self.balance_of(&account, range).await
    }

    /// Same as [`balance`](Self::balance) for an account already in hand
    pub async fn balance_of(&self, account: &Account, range: DateRange) -> LedgerResult<BigDecimal> {
        let totals = self.totals(account.id, range).await?;
        Ok(account
            .normal_balance()
            .signed_balance(&totals.debits, &totals.credits))
    }

    /// All-time debits minus credits, regardless of account type
    pub async fn net_activity(&self, account_id: AccountId) -> LedgerResult<BigDecimal> {
        Ok(self.totals(account_id, DateRange::all()).await?.net())
    }

    /// Whether any posted line has ever hit the account
    pub async fn has_activity(&self, account_id: AccountId) -> LedgerResult<bool> {
        Ok(!self
            .storage
            .posted_lines(account_id, DateRange::all())
            .await?
            .is_empty())
    }

    /// Sum of the balances of every account of a type, from one snapshot
    pub async fn type_total(
        &self,
        account_type: AccountType,
        range: DateRange,
    ) -> LedgerResult<BigDecimal> {
        let snapshot = self.storage.account_totals(&[range]).await?;
        Ok(snapshot
            .iter()
            .filter(|totals| totals.account.account_type == account_type)
            .fold(zero(), |total, totals| total + totals.balance(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use chrono::{NaiveDate, Utc};
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    async fn post(
        storage: &MemoryStorage,
        day: u32,
        debit: &Account,
        credit: &Account,
        amount: &str,
    ) -> JournalEntry {
        let mut input = JournalEntryInput::new(date(day), "Test".to_string(), None);
        input
            .lines
            .push(JournalLineInput::debit(debit.id, dec(amount), None));
        input
            .lines
            .push(JournalLineInput::credit(credit.id, dec(amount), None));
        let entry = storage
            .insert_entry(JournalEntry::draft(&input).unwrap())
            .await
            .unwrap();
        let change = StatusChange {
            entry_id: entry.id,
            expected_version: entry.version,
            to: EntryStatus::Posted,
            posted_at: Some(Utc::now()),
        };
        assert!(storage.transition_entry(&change).await.unwrap());
        entry
    }

    async fn account(storage: &MemoryStorage, code: &str, account_type: AccountType) -> Account {
        let account = Account::new(code.to_string(), code.to_string(), account_type, None);
        storage.insert_account(&account).await.unwrap();
        account
    }

    #[tokio::test]
    async fn test_debit_and_credit_normal_balances() {
        let storage = MemoryStorage::new();
        let cash = account(&storage, "1000", AccountType::Asset).await;
        let loan = account(&storage, "2100", AccountType::Liability).await;
        let calculator = BalanceCalculator::new(storage.clone());

        post(&storage, 1, &cash, &loan, "500.00").await;
        post(&storage, 2, &loan, &cash, "120.25").await;

        let range = DateRange::all();
        assert_eq!(calculator.balance(cash.id, range).await.unwrap(), dec("379.75"));
        assert_eq!(calculator.balance(loan.id, range).await.unwrap(), dec("379.75"));
        assert_eq!(calculator.net_activity(loan.id).await.unwrap(), dec("-379.75"));
    }

    #[tokio::test]
    async fn test_range_is_inclusive() {
        let storage = MemoryStorage::new();
        let cash = account(&storage, "1000", AccountType::Asset).await;
        let sales = account(&storage, "4000", AccountType::Revenue).await;
        let calculator = BalanceCalculator::new(storage.clone());

        post(&storage, 1, &cash, &sales, "10.00").await;
        post(&storage, 15, &cash, &sales, "20.00").await;
        post(&storage, 31, &cash, &sales, "40.00").await;

        let balance = calculator
            .balance(sales.id, DateRange::between(date(1), date(15)))
            .await
            .unwrap();
        assert_eq!(balance, dec("30.00"));
        let until = calculator
            .balance(sales.id, DateRange::until(date(30)))
            .await
            .unwrap();
        assert_eq!(until, dec("30.00"));
    }

    #[tokio::test]
    async fn test_type_total_and_activity() {
        let storage = MemoryStorage::new();
        let cash = account(&storage, "1000", AccountType::Asset).await;
        let bank = account(&storage, "1010", AccountType::Asset).await;
        let equity = account(&storage, "3000", AccountType::Equity).await;
        let calculator = BalanceCalculator::new(storage.clone());

        post(&storage, 1, &cash, &equity, "100.00").await;
        post(&storage, 2, &bank, &equity, "50.00").await;

        let assets = calculator
            .type_total(AccountType::Asset, DateRange::all())
            .await
            .unwrap();
        assert_eq!(assets, dec("150.00"));
        assert!(calculator.has_activity(cash.id).await.unwrap());

        let unknown = calculator.balance(uuid::Uuid::new_v4(), DateRange::all()).await;
        assert_eq!(unknown.unwrap_err().kind(), "ACCOUNT_NOT_FOUND");
    }
}
