//! Financial statements derived on demand from posted journal lines
//!
//! Nothing here is persisted. Each statement is built from a single
//! [`LedgerStorage::account_totals`] snapshot, so concurrent posting can never
//! leave a report half before and half after an entry.

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::DashboardConfig;
use crate::traits::*;
use crate::types::*;

/// One account in a trial balance. The net balance sits on exactly one side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub debit_total: BigDecimal,
    pub credit_total: BigDecimal,
}

/// Trial balance - snapshot of all account balances at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of_date: NaiveDate,
    /// Ordered by account code
    pub rows: Vec<TrialBalanceRow>,
    pub total_debits: BigDecimal,
    pub total_credits: BigDecimal,
    pub is_balanced: bool,
}

/// Per-account amount inside a statement section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLine {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitAndLoss {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub revenue: Vec<ReportLine>,
    pub expenses: Vec<ReportLine>,
    pub total_revenue: BigDecimal,
    pub total_expenses: BigDecimal,
    pub net_income: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub as_of_date: NaiveDate,
    pub assets: Vec<ReportLine>,
    pub liabilities: Vec<ReportLine>,
    pub equity: Vec<ReportLine>,
    pub total_assets: BigDecimal,
    pub total_liabilities: BigDecimal,
    pub total_equity: BigDecimal,
    /// All-time net income up to the report date, not yet closed to equity
    pub retained_earnings: BigDecimal,
    /// assets == liabilities + equity + retained earnings
    pub is_balanced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralLedgerLine {
    pub line_id: JournalLineId,
    pub entry_id: JournalEntryId,
    pub entry_number: u64,
    pub entry_date: NaiveDate,
    pub description: String,
    pub debit_amount: BigDecimal,
    pub credit_amount: BigDecimal,
    /// Balance on the account's normal side after this line
    pub running_balance: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralLedger {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub opening_balance: BigDecimal,
    pub lines: Vec<GeneralLedgerLine>,
    pub closing_balance: BigDecimal,
}

/// Posted entry shown in the dashboard's recent activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentEntry {
    pub entry_id: JournalEntryId,
    pub entry_number: u64,
    pub entry_date: NaiveDate,
    pub description: String,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub as_of_date: NaiveDate,
    pub total_assets: BigDecimal,
    pub total_liabilities: BigDecimal,
    pub total_equity: BigDecimal,
    pub revenue_ytd: BigDecimal,
    pub expenses_ytd: BigDecimal,
    pub net_income_ytd: BigDecimal,
    pub cash_balance: BigDecimal,
    pub receivables_balance: BigDecimal,
    pub payables_balance: BigDecimal,
    pub pending_entries: u64,
    pub overdue_receivables_count: u64,
    pub overdue_receivables_amount: BigDecimal,
    pub recent_entries: Vec<RecentEntry>,
}

/// Builds trial balance, profit and loss, balance sheet, general ledger and
/// dashboard views
pub struct ReportGenerator<S: LedgerStorage> {
    storage: S,
    config: DashboardConfig,
    receivables: Arc<dyn ReceivablesSource>,
}

impl<S: LedgerStorage> ReportGenerator<S> {
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, DashboardConfig::default())
    }

    pub fn with_config(storage: S, config: DashboardConfig) -> Self {
        Self {
            storage,
            config,
            receivables: Arc::new(NoReceivables),
        }
    }

    /// Replace the source of overdue receivables shown on the dashboard
    pub fn with_receivables(mut self, receivables: Arc<dyn ReceivablesSource>) -> Self {
        self.receivables = receivables;
        self
    }

    /// Trial balance over every account with posted activity
    pub async fn trial_balance(&self, as_of_date: NaiveDate) -> LedgerResult<TrialBalance> {
        let snapshot = self
            .storage
            .account_totals(&[DateRange::until(as_of_date)])
            .await?;
        let mut rows = Vec::new();
        let mut total_debits = zero();
        let mut total_credits = zero();

        for totals in snapshot.into_iter().filter(|t| t.has_activity) {
            let net = totals.net(0);
            let (debit_total, credit_total) = if net >= zero() {
                (net, zero())
            } else {
                (zero(), net.abs())
            };
            total_debits += &debit_total;
            total_credits += &credit_total;
            let account = totals.account;
            rows.push(TrialBalanceRow {
                account_id: account.id,
                code: account.code,
                name: account.name,
                account_type: account.account_type,
                debit_total,
                credit_total,
            });
        }

        let is_balanced = total_debits == total_credits;
        if !is_balanced {
            tracing::error!(
                as_of = %as_of_date,
                debits = %total_debits,
                credits = %total_credits,
                "trial balance does not balance"
            );
        }
        Ok(TrialBalance {
            as_of_date,
            rows,
            total_debits,
            total_credits,
            is_balanced,
        })
    }

    /// Revenue minus expenses over an inclusive date range
    pub async fn profit_and_loss(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<ProfitAndLoss> {
        ensure_ordered(start_date, end_date)?;
        let snapshot = self
            .storage
            .account_totals(&[DateRange::between(start_date, end_date)])
            .await?;
        let (revenue, total_revenue) = section(&snapshot, AccountType::Revenue, 0);
        let (expenses, total_expenses) = section(&snapshot, AccountType::Expense, 0);
        let net_income = &total_revenue - &total_expenses;

        Ok(ProfitAndLoss {
            start_date,
            end_date,
            revenue,
            expenses,
            total_revenue,
            total_expenses,
            net_income,
        })
    }

    pub async fn balance_sheet(&self, as_of_date: NaiveDate) -> LedgerResult<BalanceSheet> {
        let snapshot = self
            .storage
            .account_totals(&[DateRange::until(as_of_date)])
            .await?;
        let (assets, total_assets) = section(&snapshot, AccountType::Asset, 0);
        let (liabilities, total_liabilities) = section(&snapshot, AccountType::Liability, 0);
        let (equity, total_equity) = section(&snapshot, AccountType::Equity, 0);

        let retained_earnings = type_total(&snapshot, AccountType::Revenue, 0)
            - type_total(&snapshot, AccountType::Expense, 0);
        let is_balanced = total_assets == &total_liabilities + &total_equity + &retained_earnings;
        if !is_balanced {
            tracing::error!(as_of = %as_of_date, "balance sheet does not balance");
        }

        Ok(BalanceSheet {
            as_of_date,
            assets,
            liabilities,
            equity,
            total_assets,
            total_liabilities,
            total_equity,
            retained_earnings,
            is_balanced,
        })
    }

    /// Posted lines of one account with a running balance, ordered by entry
    /// date then entry number
    pub async fn general_ledger(
        &self,
        account_id: AccountId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<GeneralLedger> {
        ensure_ordered(start_date, end_date)?;
        let account = self
            .storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
        let side = account.normal_balance();

        // One read covers both the opening balance and the listed lines
        let posted = self
            .storage
            .posted_lines(account_id, DateRange::until(end_date))
            .await?;
        let (earlier, in_range): (Vec<PostedLine>, Vec<PostedLine>) = posted
            .into_iter()
            .partition(|line| line.entry_date < start_date);

        let opening_balance = earlier.iter().fold(zero(), |balance, line| {
            balance + side.signed_balance(&line.debit_amount, &line.credit_amount)
        });
        let mut running_balance = opening_balance.clone();
        let lines = in_range
            .into_iter()
            .map(|line| {
                running_balance += side.signed_balance(&line.debit_amount, &line.credit_amount);
                GeneralLedgerLine {
                    line_id: line.line_id,
                    entry_id: line.entry_id,
                    entry_number: line.entry_number,
                    entry_date: line.entry_date,
                    description: line.line_description.unwrap_or(line.entry_description),
                    debit_amount: line.debit_amount,
                    credit_amount: line.credit_amount,
                    running_balance: running_balance.clone(),
                }
            })
            .collect();

        Ok(GeneralLedger {
            account_id,
            code: account.code,
            name: account.name,
            start_date,
            end_date,
            opening_balance,
            lines,
            closing_balance: running_balance,
        })
    }

    /// Summary figures as of a date; income figures cover the calendar year
    /// to date. Every balance figure comes from one snapshot.
    pub async fn dashboard(&self, as_of_date: NaiveDate) -> LedgerResult<Dashboard> {
        const UNTIL: usize = 0;
        const YTD: usize = 1;

        let year_start = NaiveDate::from_ymd_opt(as_of_date.year(), 1, 1)
            .ok_or_else(|| LedgerError::Validation(format!("no year start for {}", as_of_date)))?;
        let snapshot = self
            .storage
            .account_totals(&[
                DateRange::until(as_of_date),
                DateRange::between(year_start, as_of_date),
            ])
            .await?;

        let revenue_ytd = type_total(&snapshot, AccountType::Revenue, YTD);
        let expenses_ytd = type_total(&snapshot, AccountType::Expense, YTD);
        let cash_balance = self
            .config
            .cash_account_codes
            .iter()
            .fold(zero(), |total, code| total + balance_by_code(&snapshot, code, UNTIL));

        let overdue = self.receivables.overdue_receivables(as_of_date).await?;

        let mut posted = self.storage.list_entries(Some(EntryStatus::Posted)).await?;
        posted.retain(|entry| entry.entry_date <= as_of_date);
        let recent_entries = posted
            .iter()
            .rev()
            .take(self.config.recent_entries_limit)
            .map(|entry| RecentEntry {
                entry_id: entry.id,
                entry_number: entry.entry_number,
                entry_date: entry.entry_date,
                description: entry.description.clone(),
                amount: entry.total_debits(),
            })
            .collect();

        Ok(Dashboard {
            as_of_date,
            total_assets: type_total(&snapshot, AccountType::Asset, UNTIL),
            total_liabilities: type_total(&snapshot, AccountType::Liability, UNTIL),
            total_equity: type_total(&snapshot, AccountType::Equity, UNTIL),
            net_income_ytd: &revenue_ytd - &expenses_ytd,
            revenue_ytd,
            expenses_ytd,
            cash_balance,
            receivables_balance: balance_by_code(
                &snapshot,
                &self.config.receivables_account_code,
                UNTIL,
            ),
            payables_balance: balance_by_code(&snapshot, &self.config.payables_account_code, UNTIL),
            pending_entries: self.storage.count_entries(Some(EntryStatus::Draft)).await?,
            overdue_receivables_count: overdue.count,
            overdue_receivables_amount: overdue.amount,
            recent_entries,
        })
    }
}

/// Accounts of one type with a nonzero balance, plus their total
fn section(
    snapshot: &[AccountTotals],
    account_type: AccountType,
    range: usize,
) -> (Vec<ReportLine>, BigDecimal) {
    let mut lines = Vec::new();
    let mut total = zero();
    for totals in snapshot.iter().filter(|t| t.account.account_type == account_type) {
        let amount = totals.balance(range);
        if amount == zero() {
            continue;
        }
        total += &amount;
        lines.push(ReportLine {
            account_id: totals.account.id,
            code: totals.account.code.clone(),
            name: totals.account.name.clone(),
            amount,
        });
    }
    (lines, total)
}

fn type_total(snapshot: &[AccountTotals], account_type: AccountType, range: usize) -> BigDecimal {
    snapshot
        .iter()
        .filter(|t| t.account.account_type == account_type)
        .fold(zero(), |total, t| total + t.balance(range))
}

/// Balance of a configured account; unknown codes count as zero
fn balance_by_code(snapshot: &[AccountTotals], code: &str, range: usize) -> BigDecimal {
    snapshot
        .iter()
        .find(|t| t.account.code == code)
        .map(|t| t.balance(range))
        .unwrap_or_else(zero)
}

fn ensure_ordered(start_date: NaiveDate, end_date: NaiveDate) -> LedgerResult<()> {
    if start_date > end_date {
        return Err(LedgerError::Validation(format!(
            "start date {} is after end date {}",
            start_date, end_date
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AccountManager, JournalEntryBuilder, JournalManager};
    use crate::utils::memory_storage::MemoryStorage;
    use std::collections::HashMap;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    struct Books {
        storage: MemoryStorage,
        journal: JournalManager<MemoryStorage>,
        chart: HashMap<String, Account>,
    }

    impl Books {
        async fn new() -> Self {
            let storage = MemoryStorage::new();
            let accounts = AccountManager::new(storage.clone());
            let chart = crate::ledger::account::utils::create_standard_chart(&accounts)
                .await
                .unwrap();
            Self {
                journal: JournalManager::new(storage.clone()),
                storage,
                chart,
            }
        }

        fn id(&self, slug: &str) -> AccountId {
            self.chart[slug].id
        }

        async fn post(&self, day: NaiveDate, debit: &str, credit: &str, amount: &str) -> JournalEntry {
            let input = JournalEntryBuilder::new(day, format!("{} / {}", debit, credit))
                .debit(self.id(debit), dec(amount), None)
                .credit(self.id(credit), dec(amount), None)
                .build()
                .unwrap();
            let entry = self.journal.create_entry(input).await.unwrap();
            self.journal.post_entry(entry.id).await.unwrap()
        }

        fn reports(&self) -> ReportGenerator<MemoryStorage> {
            ReportGenerator::new(self.storage.clone())
        }
    }

    #[tokio::test]
    async fn test_trial_balance_rows_and_totals() {
        let books = Books::new().await;
        books.post(date(1, 1), "cash", "owners_equity", "1000.00").await;
        books.post(date(1, 5), "rent_expense", "cash", "250.00").await;
        books.post(date(1, 9), "accounts_receivable", "sales_revenue", "400.00").await;

        let tb = books.reports().trial_balance(date(1, 31)).await.unwrap();
        assert!(tb.is_balanced);
        assert_eq!(tb.total_debits, dec("1400.00"));
        assert_eq!(tb.total_credits, dec("1400.00"));

        let codes: Vec<&str> = tb.rows.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["1000", "1200", "3000", "4000", "6000"]);
        let equity = tb.rows.iter().find(|r| r.code == "3000").unwrap();
        assert_eq!(equity.credit_total, dec("1000.00"));
        assert_eq!(equity.debit_total, zero());
    }

    #[tokio::test]
    async fn test_trial_balance_as_of_earlier_date_keeps_active_rows() {
        let books = Books::new().await;
        books.post(date(1, 1), "cash", "owners_equity", "100.00").await;
        books.post(date(2, 1), "cash", "sales_revenue", "50.00").await;

        let tb = books.reports().trial_balance(date(1, 15)).await.unwrap();
        assert!(tb.is_balanced);
        let revenue = tb.rows.iter().find(|r| r.code == "4000").unwrap();
        assert_eq!(revenue.credit_total, zero());
        assert_eq!(tb.total_debits, dec("100.00"));
    }

    #[tokio::test]
    async fn test_profit_and_loss_respects_range() {
        let books = Books::new().await;
        books.post(date(1, 10), "cash", "sales_revenue", "700.00").await;
        books.post(date(1, 20), "utilities_expense", "cash", "120.00").await;
        books.post(date(2, 1), "cash", "service_revenue", "300.00").await;

        let pnl = books
            .reports()
            .profit_and_loss(date(1, 1), date(1, 31))
            .await
            .unwrap();
        assert_eq!(pnl.total_revenue, dec("700.00"));
        assert_eq!(pnl.total_expenses, dec("120.00"));
        assert_eq!(pnl.net_income, dec("580.00"));
        assert_eq!(pnl.revenue.len(), 1);

        let err = books
            .reports()
            .profit_and_loss(date(2, 1), date(1, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_balance_sheet_equation_holds() {
        let books = Books::new().await;
        books.post(date(1, 1), "cash", "owners_equity", "5000.00").await;
        books.post(date(1, 2), "cash", "loans_payable", "2000.00").await;
        books.post(date(1, 3), "cash", "sales_revenue", "800.00").await;
        books.post(date(1, 4), "rent_expense", "cash", "300.00").await;

        let sheet = books.reports().balance_sheet(date(1, 31)).await.unwrap();
        assert_eq!(sheet.total_assets, dec("7500.00"));
        assert_eq!(sheet.total_liabilities, dec("2000.00"));
        assert_eq!(sheet.total_equity, dec("5000.00"));
        assert_eq!(sheet.retained_earnings, dec("500.00"));
        assert!(sheet.is_balanced);
    }

    #[tokio::test]
    async fn test_general_ledger_running_balance() {
        let books = Books::new().await;
        books.post(date(1, 1), "cash", "owners_equity", "1000.00").await;
        books.post(date(1, 10), "rent_expense", "cash", "200.00").await;
        books.post(date(1, 10), "cash", "sales_revenue", "50.00").await;
        books.post(date(2, 1), "rent_expense", "cash", "200.00").await;

        let gl = books
            .reports()
            .general_ledger(books.id("cash"), date(1, 5), date(1, 31))
            .await
            .unwrap();
        assert_eq!(gl.opening_balance, dec("1000.00"));
        let running: Vec<BigDecimal> = gl.lines.iter().map(|l| l.running_balance.clone()).collect();
        assert_eq!(running, vec![dec("800.00"), dec("850.00")]);
        assert!(gl.lines[0].entry_number < gl.lines[1].entry_number);
        assert_eq!(gl.closing_balance, dec("850.00"));
    }

    #[tokio::test]
    async fn test_dashboard_counts_and_recent_entries() {
        let books = Books::new().await;
        books.post(date(1, 1), "cash", "owners_equity", "1000.00").await;
        books.post(date(3, 1), "accounts_receivable", "sales_revenue", "400.00").await;
        books.post(date(3, 2), "rent_expense", "accounts_payable", "90.00").await;
        let draft = JournalEntryBuilder::new(date(3, 3), "Pending")
            .debit(books.id("cash"), dec("1.00"), None)
            .credit(books.id("sales_revenue"), dec("1.00"), None)
            .build()
            .unwrap();
        books.journal.create_entry(draft).await.unwrap();

        let config = DashboardConfig {
            recent_entries_limit: 2,
            ..DashboardConfig::default()
        };
        let dashboard = ReportGenerator::with_config(books.storage.clone(), config)
            .dashboard(date(3, 31))
            .await
            .unwrap();

        assert_eq!(dashboard.cash_balance, dec("1000.00"));
        assert_eq!(dashboard.receivables_balance, dec("400.00"));
        assert_eq!(dashboard.payables_balance, dec("90.00"));
        assert_eq!(dashboard.net_income_ytd, dec("310.00"));
        assert_eq!(dashboard.pending_entries, 1);
        assert_eq!(dashboard.overdue_receivables_count, 0);
        assert_eq!(dashboard.recent_entries.len(), 2);
        assert_eq!(dashboard.recent_entries[0].entry_date, date(3, 2));
        assert_eq!(dashboard.recent_entries[0].amount, dec("90.00"));
    }
}
