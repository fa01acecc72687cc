//! Property tests for ledger-wide invariants

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use ledger_engine::{AccountType, JournalEntryBuilder, Ledger, MemoryStorage};
use proptest::prelude::*;

const ACCOUNTS: [(&str, AccountType); 6] = [
    ("1000", AccountType::Asset),
    ("1200", AccountType::Asset),
    ("2000", AccountType::Liability),
    ("3000", AccountType::Equity),
    ("4000", AccountType::Revenue),
    ("6000", AccountType::Expense),
];

/// (debit account index, credit account index, amount in cents, day of January)
type Posting = (usize, usize, i64, u32);

fn posting() -> impl Strategy<Value = Posting> {
    (0..ACCOUNTS.len(), 0..ACCOUNTS.len(), 1i64..10_000_000, 1u32..=31)
        .prop_filter("distinct accounts", |(d, c, _, _)| d != c)
}

fn cents(amount: i64) -> BigDecimal {
    BigDecimal::new(amount.into(), 2)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap()
}

/// Post every posting and return the ledger plus the account ids in
/// `ACCOUNTS` order
async fn build_ledger(
    postings: &[Posting],
) -> (Ledger<MemoryStorage>, Vec<ledger_engine::AccountId>) {
    let ledger = Ledger::new(MemoryStorage::new());
    let mut ids = Vec::new();
    for (code, account_type) in ACCOUNTS {
        let account = ledger
            .create_account(code.to_string(), code.to_string(), account_type, None)
            .await
            .unwrap();
        ids.push(account.id);
    }

    for (debit, credit, amount, d) in postings {
        let input = JournalEntryBuilder::new(day(*d), "Generated")
            .debit(ids[*debit], cents(*amount), None)
            .credit(ids[*credit], cents(*amount), None)
            .build()
            .unwrap();
        ledger.record_entry(input).await.unwrap();
    }
    (ledger, ids)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn trial_balance_columns_always_match(
        postings in prop::collection::vec(posting(), 0..20),
        as_of in 1u32..=31,
    ) {
        let rt = runtime();
        let (tb, sheet) = rt.block_on(async {
            let (ledger, _) = build_ledger(&postings).await;
            (
                ledger.trial_balance(day(as_of)).await.unwrap(),
                ledger.balance_sheet(day(as_of)).await.unwrap(),
            )
        });

        prop_assert_eq!(&tb.total_debits, &tb.total_credits);
        prop_assert!(tb.is_balanced);
        prop_assert!(sheet.is_balanced);
    }

    #[test]
    fn balances_follow_normal_side(postings in prop::collection::vec(posting(), 1..20)) {
        let rt = runtime();
        let balances = rt.block_on(async {
            let (ledger, ids) = build_ledger(&postings).await;
            let mut balances = Vec::new();
            for id in &ids {
                balances.push(ledger.account_balance(*id, day(31)).await.unwrap());
            }
            balances
        });

        for (index, (_, account_type)) in ACCOUNTS.iter().enumerate() {
            let debits: i64 = postings
                .iter()
                .filter(|(d, _, _, _)| *d == index)
                .map(|(_, _, amount, _)| amount)
                .sum();
            let credits: i64 = postings
                .iter()
                .filter(|(_, c, _, _)| *c == index)
                .map(|(_, _, amount, _)| amount)
                .sum();
            let expected = match account_type {
                AccountType::Asset | AccountType::Expense => debits - credits,
                _ => credits - debits,
            };
            prop_assert_eq!(&balances[index], &cents(expected));
        }
    }
}
