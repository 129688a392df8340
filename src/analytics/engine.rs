//! The transaction analytics aggregation engine.
//!
//! A family of pure functions that turn an owner-scoped, in-memory slice of
//! transactions into derived summaries: category totals, time-bucketed
//! totals, income-vs-expense comparisons, top categories, spending trends,
//! and the dashboard summary.
//!
//! The engine is deliberately store-agnostic: the query layer fetches a
//! consistent snapshot of one user's ledger and the engine does all
//! filtering, grouping, and ordering in memory, so that exactly one
//! implementation of every aggregate exists. The functions here hold no
//! state, perform no I/O, and cannot fail given their documented
//! preconditions: amounts are validated at transaction creation and query
//! parameters (granularity, limits, range bounds) are validated at the HTTP
//! boundary before the engine is invoked.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
};

use serde::Serialize;
use time::{Date, Month};

use crate::transaction::{Transaction, TransactionKind};

/// The number of categories [top_categories] falls back to when the caller
/// passes a zero limit.
pub const DEFAULT_TOP_CATEGORIES_LIMIT: usize = 10;

/// An inclusive date range with optional bounds.
///
/// A missing bound leaves that side of the range unbounded, so the default
/// value covers the whole ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// The first date included in the range, if bounded.
    pub start: Option<Date>,
    /// The last date included in the range, if bounded.
    pub end: Option<Date>,
}

impl DateRange {
    /// Create a date range from optional bounds.
    ///
    /// Callers are responsible for ensuring `start <= end` when both bounds
    /// are present; [params](crate::analytics) rejects inverted ranges
    /// before they get here.
    pub fn new(start: Option<Date>, end: Option<Date>) -> Self {
        Self { start, end }
    }

    /// Whether `date` falls within the range. Both bounds are inclusive.
    pub fn contains(&self, date: Date) -> bool {
        let on_or_after_start = self.start.is_none_or(|start| date >= start);
        let on_or_before_end = self.end.is_none_or(|end| date <= end);

        on_or_after_start && on_or_before_end
    }
}

/// The bucket size selector for time-based aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One bucket per calendar date.
    Day,
    /// One bucket per ISO week.
    Week,
    /// One bucket per calendar month.
    Month,
}

/// The total spend in one category over a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    /// The category label.
    pub category: String,
    /// The summed amount of all expenses in the category.
    pub total: f64,
    /// The number of transactions in the category.
    pub count: u64,
}

/// A [CategoryTotal] extended with the average transaction amount.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAverage {
    /// The category label.
    pub category: String,
    /// The summed amount of all expenses in the category.
    pub total: f64,
    /// The number of transactions in the category.
    pub count: u64,
    /// The mean transaction amount, i.e. `total / count`.
    pub average: f64,
}

/// The total for one time bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketTotal {
    /// The bucket label, e.g. "2024-01-15", "2024-W03", or "2024-01".
    pub bucket: String,
    /// The summed amount of the bucket's transactions.
    pub total: f64,
    /// The number of transactions in the bucket.
    pub count: u64,
}

/// Income and expense totals for one time bucket.
///
/// A bucket that only saw one kind of transaction reports zero for the
/// other kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    /// The bucket label, e.g. "2024-01-15", "2024-W03", or "2024-01".
    pub bucket: String,
    /// The summed income in the bucket.
    pub income: f64,
    /// The summed expenses in the bucket.
    pub expense: f64,
}

/// Total, count, and average for one transaction kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindSummary {
    /// The summed amount over all transactions of the kind.
    pub total: f64,
    /// The number of transactions of the kind.
    pub count: u64,
    /// The mean transaction amount, or zero when there are none.
    pub average: f64,
}

impl KindSummary {
    fn new(total: f64, count: u64) -> Self {
        let average = if count > 0 { total / count as f64 } else { 0.0 };

        Self {
            total,
            count,
            average,
        }
    }
}

/// The headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    /// Summary of all income in range.
    pub income: KindSummary,
    /// Summary of all expenses in range.
    pub expense: KindSummary,
    /// `income.total - expense.total`, exact (no rounding before the
    /// subtraction).
    pub net_income: f64,
    /// Net income as a percentage of gross income, rounded to two decimal
    /// places. Zero whenever there is no income, regardless of expenses.
    pub savings_rate: f64,
    /// The number of transactions of either kind in range.
    pub total_transactions: u64,
}

/// A time bucket identifier that orders by bucket start.
///
/// Only keys of a single variant are ever compared: each engine call uses
/// one granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum BucketKey {
    Day(Date),
    Week { year: i32, week: u8 },
    Month { year: i32, month: u8 },
}

impl BucketKey {
    fn for_date(date: Date, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Day => BucketKey::Day(date),
            Granularity::Week => {
                let (year, week, _) = date.to_iso_week_date();
                BucketKey::Week { year, week }
            }
            Granularity::Month => BucketKey::Month {
                year: date.year(),
                month: u8::from(date.month()),
            },
        }
    }

    fn label(&self) -> String {
        match self {
            BucketKey::Day(date) => date.to_string(),
            BucketKey::Week { year, week } => format!("{year}-W{week:02}"),
            BucketKey::Month { year, month } => format!("{year}-{month:02}"),
        }
    }
}

/// Sum expenses per category over `range`.
///
/// Only expense-kind transactions are counted. The result is ordered by
/// total descending; equal totals are broken by category name ascending so
/// the ranking is deterministic.
pub fn category_totals(transactions: &[Transaction], range: DateRange) -> Vec<CategoryTotal> {
    let mut totals: HashMap<&str, (f64, u64)> = HashMap::new();

    for transaction in expenses_in_range(transactions, range) {
        let entry = totals.entry(transaction.category.as_str()).or_insert((0.0, 0));
        entry.0 += transaction.amount;
        entry.1 += 1;
    }

    let mut result: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, (total, count))| CategoryTotal {
            category: category.to_owned(),
            total,
            count,
        })
        .collect();

    result.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });

    result
}

/// Sum transactions of `kind` into time buckets of `granularity` over
/// `range`.
///
/// Bucket keys are the calendar date for [Granularity::Day], the ISO year
/// and week for [Granularity::Week], and the year and month for
/// [Granularity::Month]. The result is ordered ascending by bucket start.
pub fn time_bucket_totals(
    transactions: &[Transaction],
    range: DateRange,
    granularity: Granularity,
    kind: TransactionKind,
) -> Vec<BucketTotal> {
    let mut totals: BTreeMap<BucketKey, (f64, u64)> = BTreeMap::new();

    for transaction in transactions
        .iter()
        .filter(|transaction| transaction.kind == kind && range.contains(transaction.date))
    {
        let key = BucketKey::for_date(transaction.date, granularity);
        let entry = totals.entry(key).or_insert((0.0, 0));
        entry.0 += transaction.amount;
        entry.1 += 1;
    }

    totals
        .into_iter()
        .map(|(key, (total, count))| BucketTotal {
            bucket: key.label(),
            total,
            count,
        })
        .collect()
}

/// Compare income against expenses per time bucket over `range`.
///
/// Equivalent to bucketing both kinds separately and left-joining on the
/// bucket key: a bucket with transactions of only one kind reports zero for
/// the other. The result is ordered ascending by bucket start.
pub fn income_vs_expense(
    transactions: &[Transaction],
    range: DateRange,
    granularity: Granularity,
) -> Vec<ComparisonRow> {
    let mut buckets: BTreeMap<BucketKey, (f64, f64)> = BTreeMap::new();

    for transaction in transactions
        .iter()
        .filter(|transaction| range.contains(transaction.date))
    {
        let key = BucketKey::for_date(transaction.date, granularity);
        let entry = buckets.entry(key).or_insert((0.0, 0.0));

        match transaction.kind {
            TransactionKind::Income => entry.0 += transaction.amount,
            TransactionKind::Expense => entry.1 += transaction.amount,
        }
    }

    buckets
        .into_iter()
        .map(|(key, (income, expense))| ComparisonRow {
            bucket: key.label(),
            income,
            expense,
        })
        .collect()
}

/// The `limit` highest-spend categories over `range`, with averages.
///
/// Ordering and tie-breaking follow [category_totals]. A zero `limit` falls
/// back to [DEFAULT_TOP_CATEGORIES_LIMIT] rather than erroring; callers
/// clamp negative input to zero before it gets here.
pub fn top_categories(
    transactions: &[Transaction],
    range: DateRange,
    limit: usize,
) -> Vec<CategoryAverage> {
    let limit = if limit == 0 {
        DEFAULT_TOP_CATEGORIES_LIMIT
    } else {
        limit
    };

    let mut result: Vec<CategoryAverage> = category_totals(transactions, range)
        .into_iter()
        .map(|category_total| CategoryAverage {
            average: category_total.total / category_total.count as f64,
            category: category_total.category,
            total: category_total.total,
            count: category_total.count,
        })
        .collect();

    result.truncate(limit);
    result
}

/// Monthly expense totals per category over the trailing window
/// `[today - months_back months, today]`.
///
/// `today` is an explicit parameter rather than an ambient clock read, so
/// the computation is deterministic and testable; handlers pass the current
/// UTC date. Month keys have the form "2024-03". A category/month pair
/// absent from the output means zero spend in that month, not an error.
pub fn spending_trends(
    transactions: &[Transaction],
    months_back: u32,
    today: Date,
) -> BTreeMap<String, BTreeMap<String, f64>> {
    let window = DateRange::new(Some(months_ago(today, months_back)), Some(today));
    let mut trends: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();

    for transaction in expenses_in_range(transactions, window) {
        let month_key = format!(
            "{:04}-{:02}",
            transaction.date.year(),
            u8::from(transaction.date.month())
        );

        *trends
            .entry(transaction.category.clone())
            .or_default()
            .entry(month_key)
            .or_insert(0.0) += transaction.amount;
    }

    trends
}

/// Compute the dashboard summary over `range`.
///
/// Both kinds get a [KindSummary] (zero-valued when absent). The savings
/// rate is zero whenever there is no income, and is rounded to two decimal
/// places; the net income is exact.
pub fn dashboard_summary(transactions: &[Transaction], range: DateRange) -> DashboardSummary {
    let mut income_total = 0.0;
    let mut income_count = 0;
    let mut expense_total = 0.0;
    let mut expense_count = 0;

    for transaction in transactions
        .iter()
        .filter(|transaction| range.contains(transaction.date))
    {
        match transaction.kind {
            TransactionKind::Income => {
                income_total += transaction.amount;
                income_count += 1;
            }
            TransactionKind::Expense => {
                expense_total += transaction.amount;
                expense_count += 1;
            }
        }
    }

    let income = KindSummary::new(income_total, income_count);
    let expense = KindSummary::new(expense_total, expense_count);

    let net_income = income.total - expense.total;
    let savings_rate = if income.total > 0.0 {
        round_to_2dp(net_income / income.total * 100.0)
    } else {
        0.0
    };

    DashboardSummary {
        total_transactions: income.count + expense.count,
        income,
        expense,
        net_income,
        savings_rate,
    }
}

fn expenses_in_range(
    transactions: &[Transaction],
    range: DateRange,
) -> impl Iterator<Item = &Transaction> {
    transactions.iter().filter(move |transaction| {
        transaction.kind == TransactionKind::Expense && range.contains(transaction.date)
    })
}

/// The date `months` calendar months before `date`, with the day clamped to
/// the target month's length.
fn months_ago(date: Date, months: u32) -> Date {
    let total_months = date.year() * 12 + i32::from(u8::from(date.month())) - 1 - months as i32;
    let year = total_months.div_euclid(12);
    let month = Month::try_from((total_months.rem_euclid(12) + 1) as u8).unwrap();
    let day = date.day().min(month.length(year));

    Date::from_calendar_date(year, month, day).unwrap()
}

fn round_to_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
