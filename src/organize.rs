//! The categorization pipeline: selects a period's ledger entries, numbers their items, asks a
//! classifier for a category per item, reconciles the answer against what was asked and renders
//! a totaled summary report.
//!
//! Reconciliation and rendering are pure functions so that they can be exercised with synthetic
//! classifier answers, including incomplete or duplicated ones.

use crate::api::{ClassifyRequest, Classifier};
use crate::model::{
    Assignment, CategorizedItem, DateEntry, Ledger, Period, CATEGORIES,
    CATEGORY_VOCABULARY_VERSION,
};
use crate::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::{debug, info, warn};

const RULE: &str = "────────────";

/// The outcome of organizing a period.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Organized {
    /// The period has no entries, so nothing was sent to the classifier.
    Nothing(Period),
    Report(Report),
}

/// Runs the categorization pipeline against a `Classifier`.
#[derive(Clone)]
pub struct Organizer {
    classifier: Arc<dyn Classifier>,
}

impl Organizer {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Organizes the entries of `ledger` that fall in `period`. A classifier failure fails the
    /// whole run; no partial report is produced.
    pub async fn organize(&self, ledger: &Ledger, period: Period) -> Result<Organized> {
        let entries = select(ledger, period);
        if entries.is_empty() {
            info!("Nothing to organize for {}", period.label());
            return Ok(Organized::Nothing(period));
        }

        let items = number(&entries);
        debug!(
            "Classifying {} items from {} entries",
            items.len(),
            entries.len()
        );
        let request = ClassifyRequest {
            items,
            vocabulary: CATEGORIES,
            vocabulary_version: CATEGORY_VOCABULARY_VERSION,
        };
        let assignments = self.classifier.classify(&request).await?;

        let reconciliation = reconcile(&request.items, assignments);
        reconciliation.log_discrepancies();
        Ok(Organized::Report(summarize(period, reconciliation)))
    }
}

/// The entries of `ledger` that fall in `period`, sorted by `DateKey`.
pub fn select(ledger: &Ledger, period: Period) -> Vec<&DateEntry> {
    let mut entries: Vec<&DateEntry> = ledger
        .entries()
        .iter()
        .filter(|e| period.contains(e.date()))
        .collect();
    entries.sort_by(|a, b| DateKey::parse(a.date()).cmp(&DateKey::parse(b.date())));
    entries
}

/// Orders ledger dates: canonical dates by calendar, then legacy `M/D` dates by month and day
/// (they carry no year), then anything unrecognized as a plain string.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub enum DateKey<'a> {
    Canonical(NaiveDate),
    Legacy(u32, u32),
    Other(&'a str),
}

impl<'a> DateKey<'a> {
    pub fn parse(date: &'a str) -> Self {
        if let Ok(d) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            return DateKey::Canonical(d);
        }
        let legacy = date
            .split_once('/')
            .and_then(|(m, d)| Some((m.parse().ok()?, d.parse().ok()?)));
        match legacy {
            Some((month, day)) => DateKey::Legacy(month, day),
            None => DateKey::Other(date),
        }
    }
}

/// Flattens the entries into items numbered from 1, keeping each entry's item order.
pub fn number(entries: &[&DateEntry]) -> Vec<CategorizedItem> {
    entries
        .iter()
        .flat_map(|entry| entry.items().iter().map(move |item| (*entry, item)))
        .enumerate()
        .map(|(ix, (entry, item))| CategorizedItem {
            id: ix as u32 + 1,
            date: entry.date().to_string(),
            display_date: display_date(entry.date()),
            name: item.name().to_string(),
            price: item.price(),
        })
        .collect()
}

/// Shows a canonical `YYYY-MM-DD` date as `M/D`. Anything else is shown as it is.
pub fn display_date(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(d) => d.format("%-m/%-d").to_string(),
        Err(_) => date.to_string(),
    }
}

/// A classifier answer checked against the items that were sent.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct Reconciliation {
    /// Items with the category they were given, in id order.
    pub resolved: Vec<(CategorizedItem, String)>,
    /// Ids in the answer that were never sent.
    pub unknown_ids: Vec<u32>,
    /// Ids that were answered more than once. The first answer wins.
    pub duplicate_ids: Vec<u32>,
    /// Ids that were sent but never answered. These items are left out of the report.
    pub missing_ids: Vec<u32>,
    /// How many items were sent.
    pub expected: usize,
    /// How many assignments came back.
    pub returned: usize,
}

impl Reconciliation {
    /// Whether every item received exactly one category and nothing unexpected came back.
    pub fn is_complete(&self) -> bool {
        self.unknown_ids.is_empty()
            && self.duplicate_ids.is_empty()
            && self.missing_ids.is_empty()
            && self.expected == self.returned
    }

    fn log_discrepancies(&self) {
        if self.expected != self.returned {
            warn!(
                "The classifier returned {} assignments for {} items",
                self.returned, self.expected
            );
        }
        if !self.unknown_ids.is_empty() {
            warn!("Dropping unknown ids from the classifier: {:?}", self.unknown_ids);
        }
        if !self.duplicate_ids.is_empty() {
            warn!(
                "The classifier answered these ids more than once: {:?}",
                self.duplicate_ids
            );
        }
        if !self.missing_ids.is_empty() {
            warn!(
                "The classifier did not categorize these ids: {:?}",
                self.missing_ids
            );
        }
    }
}

/// Matches each assignment to the item it names. Unknown ids are dropped, the first answer for
/// an id wins, and items that were never answered are reported as missing rather than defaulted.
pub fn reconcile(items: &[CategorizedItem], assignments: Vec<Assignment>) -> Reconciliation {
    let by_id: HashMap<u32, &CategorizedItem> = items.iter().map(|i| (i.id, i)).collect();
    let returned = assignments.len();

    let mut categories: HashMap<u32, String> = HashMap::new();
    let mut unknown_ids = BTreeSet::new();
    let mut duplicate_ids = BTreeSet::new();
    for Assignment { id, category } in assignments {
        if !by_id.contains_key(&id) {
            unknown_ids.insert(id);
            continue;
        }
        let category = category.trim();
        if categories.contains_key(&id) {
            duplicate_ids.insert(id);
            continue;
        }
        categories.insert(id, category.to_string());
    }

    let mut resolved = Vec::new();
    let mut missing_ids = Vec::new();
    for item in items {
        match categories.remove(&item.id) {
            Some(category) if !category.is_empty() => resolved.push((item.clone(), category)),
            _ => missing_ids.push(item.id),
        }
    }

    Reconciliation {
        resolved,
        unknown_ids: unknown_ids.into_iter().collect(),
        duplicate_ids: duplicate_ids.into_iter().collect(),
        missing_ids,
        expected: items.len(),
        returned,
    }
}

/// One category block of a report.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: u64,
    /// The category's items, sorted by date ascending.
    pub items: Vec<CategorizedItem>,
}

/// A categorized, totaled summary of one period.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Report {
    label: String,
    total: u64,
    /// Sorted by total descending.
    categories: Vec<CategoryTotal>,
    /// Items that received no category and are not counted anywhere in the report.
    uncategorized: usize,
}

impl Report {
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn categories(&self) -> &[CategoryTotal] {
        &self.categories
    }

    pub fn uncategorized(&self) -> usize {
        self.uncategorized
    }
}

/// Groups the resolved items by category and totals them. Categories are ordered by total
/// descending, ties broken by the order in which the category first appears.
pub fn summarize(period: Period, reconciliation: Reconciliation) -> Report {
    let mut categories: Vec<CategoryTotal> = Vec::new();
    for (item, category) in reconciliation.resolved {
        match categories.iter_mut().find(|c| c.category == category) {
            Some(group) => {
                group.total += item.price;
                group.items.push(item);
            }
            None => categories.push(CategoryTotal {
                category,
                total: item.price,
                items: vec![item],
            }),
        }
    }
    for group in categories.iter_mut() {
        group.items.sort_by(|a, b| {
            DateKey::parse(&a.date)
                .cmp(&DateKey::parse(&b.date))
                .then(a.id.cmp(&b.id))
        });
    }
    categories.sort_by(|a, b| b.total.cmp(&a.total));

    Report {
        label: period.label(),
        total: categories.iter().map(|c| c.total).sum(),
        categories,
        uncategorized: reconciliation.missing_ids.len(),
    }
}

/// Joins prices into an addition expression, e.g. `255 + 130 + 29`.
fn addition<'a>(prices: impl IntoIterator<Item = &'a u64>) -> String {
    prices
        .into_iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(" + ")
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "📊 {} 消費整理", self.label)?;
        writeln!(f)?;

        let all_prices: Vec<u64> = self
            .categories
            .iter()
            .flat_map(|c| c.items.iter().map(|i| i.price))
            .collect();
        writeln!(f, "💰 總計：{} = {}", addition(&all_prices), self.total)?;

        for group in &self.categories {
            writeln!(f)?;
            let prices: Vec<u64> = group.items.iter().map(|i| i.price).collect();
            writeln!(
                f,
                "【{}】{} = {}",
                group.category,
                addition(&prices),
                group.total
            )?;
            for item in &group.items {
                writeln!(f, "{} {} {}", item.display_date, item.name, item.price)?;
            }
        }

        if self.uncategorized > 0 {
            writeln!(f)?;
            writeln!(f, "⚠️ 有 {} 筆消費未能分類，未列入統計", self.uncategorized)?;
        }

        writeln!(f)?;
        writeln!(f, "{RULE}")?;
        write!(f, "📅 {} 分類排名", self.label)?;
        for (rank, group) in self.categories.iter().enumerate() {
            write!(f, "\n{}. {}：{}", rank + 1, group.category, group.total)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::KeywordClassifier;
    use crate::model::{Item, YearMonth};
    use crate::test::ScriptedClassifier;
    use chrono::Utc;

    fn entry(date: &str, items: &[(&str, u64)]) -> DateEntry {
        let items = items
            .iter()
            .map(|(name, price)| Item::new(name, *price).unwrap())
            .collect();
        DateEntry::new(date, items, Utc::now())
    }

    fn august() -> Period {
        Period::Month(YearMonth::new(2024, 8).unwrap())
    }

    fn sample_ledger() -> Ledger {
        Ledger::new(vec![
            entry("2024-08-03", &[("鮮奶", 255), ("吐司", 45)]),
            entry("8/4", &[("舊的鮮奶", 240)]),
            entry("2024-09-01", &[("蘋果", 99)]),
            entry("2024-08-01", &[("地瓜", 130), ("紅蘿蔔", 29), ("鮮奶", 255)]),
        ])
    }

    #[test]
    fn test_select_filters_and_sorts() {
        let ledger = sample_ledger();
        let dates: Vec<&str> = select(&ledger, august())
            .iter()
            .map(|e| e.date())
            .collect();
        assert_eq!(dates, vec!["2024-08-01", "2024-08-03"]);
    }

    #[test]
    fn test_select_whole_month() {
        let mut entries: Vec<DateEntry> = (1..=31)
            .map(|d| entry(&format!("2024-08-{d:02}"), &[("鮮奶", 255)]))
            .collect();
        entries.push(entry("2024-09-01", &[("鮮奶", 255)]));
        let ledger = Ledger::new(entries);
        let selected = select(&ledger, august());
        assert_eq!(selected.len(), 31);
        assert!(selected.iter().all(|e| e.date().starts_with("2024-08-")));
    }

    #[test]
    fn test_select_current_month_matches_explicit_month() {
        let month = YearMonth::current(chrono_tz::Asia::Taipei);
        let mut entries: Vec<DateEntry> = (1..=28)
            .map(|d| entry(&format!("{}-{d:02}", month.prefix()), &[("鮮奶", 255)]))
            .collect();
        entries.push(entry("1999-01-01", &[("鮮奶", 255)]));
        let ledger = Ledger::new(entries);
        let explicit = select(&ledger, Period::Month(month.to_string().parse().unwrap()));
        let current = select(&ledger, Period::Month(YearMonth::current(chrono_tz::Asia::Taipei)));
        assert_eq!(explicit, current);
        assert_eq!(current.len(), 28);
    }

    #[test]
    fn test_select_all_includes_legacy_dates() {
        let ledger = sample_ledger();
        let dates: Vec<&str> = select(&ledger, Period::All)
            .iter()
            .map(|e| e.date())
            .collect();
        assert_eq!(dates, vec!["2024-08-01", "2024-08-03", "2024-09-01", "8/4"]);
    }

    #[test]
    fn test_select_all_orders_legacy_dates_by_month_and_day() {
        let ledger = Ledger::new(vec![
            entry("12/31", &[("鮮奶", 255)]),
            entry("8/4", &[("鮮奶", 255)]),
            entry("10/1", &[("鮮奶", 255)]),
            entry("2024-10-01", &[("鮮奶", 255)]),
            entry("2024-08-04", &[("鮮奶", 255)]),
        ]);
        let dates: Vec<&str> = select(&ledger, Period::All)
            .iter()
            .map(|e| e.date())
            .collect();
        assert_eq!(
            dates,
            vec!["2024-08-04", "2024-10-01", "8/4", "10/1", "12/31"]
        );
    }

    #[test]
    fn test_date_key() {
        assert!(DateKey::parse("2024-08-04") < DateKey::parse("2024-10-01"));
        assert!(DateKey::parse("2024-12-31") < DateKey::parse("1/1"));
        assert!(DateKey::parse("8/4") < DateKey::parse("10/1"));
        assert!(DateKey::parse("10/1") < DateKey::parse("12/31"));
        assert_eq!(DateKey::parse("昨天"), DateKey::Other("昨天"));
    }

    #[test]
    fn test_number() {
        let ledger = sample_ledger();
        let items = number(&select(&ledger, august()));
        let summary: Vec<(u32, &str, &str)> = items
            .iter()
            .map(|i| (i.id, i.display_date.as_str(), i.name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, "8/1", "地瓜"),
                (2, "8/1", "紅蘿蔔"),
                (3, "8/1", "鮮奶"),
                (4, "8/3", "鮮奶"),
                (5, "8/3", "吐司"),
            ]
        );
    }

    #[test]
    fn test_display_date() {
        assert_eq!(display_date("2024-08-04"), "8/4");
        assert_eq!(display_date("2024-12-31"), "12/31");
        assert_eq!(display_date("8/4"), "8/4");
    }

    fn numbered() -> Vec<CategorizedItem> {
        number(&select(&sample_ledger(), august()))
    }

    #[test]
    fn test_reconcile_complete() {
        let items = numbered();
        let answer = vec![
            Assignment::new(1, "家裡煮"),
            Assignment::new(2, "家裡煮"),
            Assignment::new(3, "鮮奶"),
            Assignment::new(4, "鮮奶"),
            Assignment::new(5, "麵包"),
        ];
        let rec = reconcile(&items, answer);
        assert!(rec.is_complete());
        assert_eq!(rec.resolved.len(), 5);
    }

    #[test]
    fn test_reconcile_incomplete_duplicated_unknown() {
        let items = numbered();
        let answer = vec![
            Assignment::new(1, "家裡煮"),
            Assignment::new(1, "零嘴"),
            Assignment::new(3, " 鮮奶 "),
            Assignment::new(42, "鮮奶"),
            Assignment::new(5, ""),
        ];
        let rec = reconcile(&items, answer);
        assert!(!rec.is_complete());
        assert_eq!(rec.unknown_ids, vec![42]);
        assert_eq!(rec.duplicate_ids, vec![1]);
        assert_eq!(rec.missing_ids, vec![2, 4, 5]);
        assert_eq!(rec.expected, 5);
        assert_eq!(rec.returned, 5);
        let resolved: Vec<(u32, &str)> = rec
            .resolved
            .iter()
            .map(|(i, c)| (i.id, c.as_str()))
            .collect();
        assert_eq!(resolved, vec![(1, "家裡煮"), (3, "鮮奶")]);
    }

    #[test]
    fn test_summarize_complete_totals_add_up() {
        let items = numbered();
        let answer = items
            .iter()
            .map(|i| Assignment::new(i.id, KeywordClassifier::categorize(&i.name)))
            .collect();
        let report = summarize(august(), reconcile(&items, answer));

        let category_sum: u64 = report.categories().iter().map(|c| c.total).sum();
        assert_eq!(category_sum, report.total());
        assert_eq!(report.total(), 130 + 29 + 255 + 255 + 45);
        let mut ids: Vec<u32> = report
            .categories()
            .iter()
            .flat_map(|c| c.items.iter().map(|i| i.id))
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(report.uncategorized(), 0);
    }

    #[test]
    fn test_summarize_orders_categories_and_items() {
        let items = numbered();
        let answer = vec![
            Assignment::new(4, "鮮奶"),
            Assignment::new(3, "鮮奶"),
            Assignment::new(1, "家裡煮"),
            Assignment::new(2, "家裡煮"),
            Assignment::new(5, "麵包"),
        ];
        let report = summarize(august(), reconcile(&items, answer));
        let order: Vec<(&str, u64)> = report
            .categories()
            .iter()
            .map(|c| (c.category.as_str(), c.total))
            .collect();
        assert_eq!(order, vec![("鮮奶", 510), ("家裡煮", 159), ("麵包", 45)]);
        let milk_dates: Vec<&str> = report.categories()[0]
            .items
            .iter()
            .map(|i| i.date.as_str())
            .collect();
        assert_eq!(milk_dates, vec!["2024-08-01", "2024-08-03"]);
    }

    #[test]
    fn test_render_report() {
        let items = numbered();
        let answer = vec![
            Assignment::new(1, "家裡煮"),
            Assignment::new(2, "家裡煮"),
            Assignment::new(3, "鮮奶"),
            Assignment::new(4, "鮮奶"),
            Assignment::new(5, "麵包"),
        ];
        let report = summarize(august(), reconcile(&items, answer));
        let expected = "\
📊 2024年08月 消費整理

💰 總計：255 + 255 + 130 + 29 + 45 = 714

【鮮奶】255 + 255 = 510
8/1 鮮奶 255
8/3 鮮奶 255

【家裡煮】130 + 29 = 159
8/1 地瓜 130
8/1 紅蘿蔔 29

【麵包】45 = 45
8/3 吐司 45

────────────
📅 2024年08月 分類排名
1. 鮮奶：510
2. 家裡煮：159
3. 麵包：45";
        assert_eq!(report.to_string(), expected);
    }

    #[test]
    fn test_render_report_flags_uncategorized() {
        let items = numbered();
        let report = summarize(
            august(),
            reconcile(&items, vec![Assignment::new(5, "麵包")]),
        );
        assert_eq!(report.total(), 45);
        assert_eq!(report.uncategorized(), 4);
        assert!(report
            .to_string()
            .contains("⚠️ 有 4 筆消費未能分類，未列入統計"));
    }

    #[tokio::test]
    async fn test_organize_nothing() {
        let organizer = Organizer::new(Arc::new(KeywordClassifier));
        let period = Period::Month(YearMonth::new(2023, 1).unwrap());
        let organized = organizer.organize(&sample_ledger(), period).await.unwrap();
        assert_eq!(organized, Organized::Nothing(period));
    }

    #[tokio::test]
    async fn test_organize_sends_numbered_items() {
        let classifier = Arc::new(ScriptedClassifier::by_name(&[
            ("地瓜", "家裡煮"),
            ("紅蘿蔔", "家裡煮"),
            ("鮮奶", "鮮奶"),
            ("吐司", "麵包"),
        ]));
        let organizer = Organizer::new(classifier.clone());
        let organized = organizer.organize(&sample_ledger(), august()).await.unwrap();
        let report = match organized {
            Organized::Report(report) => report,
            other => panic!("expected a report, got {other:?}"),
        };
        assert_eq!(report.total(), 714);
        let sent = classifier.last_request().unwrap();
        assert_eq!(sent.items.len(), 5);
        assert_eq!(sent.vocabulary, CATEGORIES);
    }

    #[tokio::test]
    async fn test_organize_classifier_failure() {
        let organizer = Organizer::new(Arc::new(ScriptedClassifier::failing()));
        assert!(organizer.organize(&sample_ledger(), august()).await.is_err());
    }
}
