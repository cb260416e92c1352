use crate::model::Item;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One date's bucket of items within the `Ledger`.
///
/// The `date` is either canonical `YYYY-MM-DD` or a legacy `M/D` string. Entries are keyed by
/// exact string equality, so `8/4` and `2024-08-04` are different entries.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateEntry {
    date: String,
    items: Vec<Item>,
    timestamp: DateTime<Utc>,
}

impl DateEntry {
    pub fn new(date: impl Into<String>, items: Vec<Item>, timestamp: DateTime<Utc>) -> Self {
        Self {
            date: date.into(),
            items,
            timestamp,
        }
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// The instant of the last mutation of this entry.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The sum of the prices of this entry's items.
    pub fn total(&self) -> u64 {
        self.items.iter().map(Item::price).sum()
    }

    pub(crate) fn into_items(self) -> Vec<Item> {
        self.items
    }
}

/// The singleton aggregated document holding all date-grouped expense entries.
///
/// Entries are kept in first-seen-date order, not chronological order.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    #[serde(default)]
    entries: Vec<DateEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<DateTime<Utc>>,
}

impl Ledger {
    pub fn new(entries: Vec<DateEntry>) -> Self {
        Self {
            entries,
            last_updated: None,
        }
    }

    pub fn entries(&self) -> &[DateEntry] {
        &self.entries
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The number of items across all entries.
    pub fn item_count(&self) -> usize {
        self.entries.iter().map(|e| e.items.len()).sum()
    }

    /// Appends `items` to the entry whose date is exactly `date`, bumping its timestamp, or adds a
    /// new entry at the end when no such date exists yet.
    pub(crate) fn merge(&mut self, date: &str, items: Vec<Item>, now: DateTime<Utc>) {
        match self.entries.iter_mut().find(|e| e.date == date) {
            Some(entry) => {
                entry.items.extend(items);
                entry.timestamp = now;
            }
            None => self.entries.push(DateEntry::new(date, items, now)),
        }
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = Some(now);
    }
}

/// The backup slot document: the full `Ledger` as it was before the most recent add, plus the
/// time the snapshot was taken.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(flatten)]
    ledger: Ledger,
    backup_time: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(ledger: Ledger, backup_time: DateTime<Utc>) -> Self {
        Self {
            ledger,
            backup_time,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn backup_time(&self) -> DateTime<Utc> {
        self.backup_time
    }

    /// Drops the `backup_time` and returns the captured ledger.
    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(name: &str, price: u64) -> Item {
        Item::new(name, price).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_merge_appends_to_existing_date() {
        let mut ledger = Ledger::default();
        ledger.merge("2024-08-01", vec![item("鮮奶", 255)], at(1));
        ledger.merge("2024-08-02", vec![item("地瓜", 130)], at(2));
        ledger.merge("2024-08-01", vec![item("吐司", 45), item("蘋果", 99)], at(3));

        assert_eq!(ledger.entries().len(), 2);
        let first = &ledger.entries()[0];
        assert_eq!(first.date(), "2024-08-01");
        let names: Vec<&str> = first.items().iter().map(Item::name).collect();
        assert_eq!(names, vec!["鮮奶", "吐司", "蘋果"]);
        assert_eq!(first.timestamp(), at(3));
        assert_eq!(first.total(), 399);
        assert_eq!(ledger.entries()[1].timestamp(), at(2));
        assert_eq!(ledger.item_count(), 4);
    }

    #[test]
    fn test_merge_is_exact_string_match() {
        let mut ledger = Ledger::default();
        ledger.merge("8/4", vec![item("鮮奶", 255)], at(1));
        ledger.merge("2024-08-04", vec![item("鮮奶", 255)], at(2));
        assert_eq!(ledger.entries().len(), 2);
    }

    #[test]
    fn test_serialized_shape() {
        let mut ledger = Ledger::default();
        ledger.merge("2024-08-01", vec![item("鮮奶", 255)], at(0));
        ledger.touch(at(0));
        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["entries"][0]["date"], "2024-08-01");
        assert_eq!(json["entries"][0]["items"][0]["name"], "鮮奶");
        assert_eq!(json["entries"][0]["items"][0]["price"], 255);
        assert!(json.get("lastUpdated").is_some());

        let snapshot = Snapshot::new(ledger.clone(), at(5));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("backupTime").is_some());
        assert!(json.get("entries").is_some());
        let back: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back.into_ledger(), ledger);
    }

    #[test]
    fn test_missing_fields_default() {
        let ledger: Ledger = serde_json::from_str("{}").unwrap();
        assert!(ledger.is_empty());
        assert!(ledger.last_updated().is_none());
    }
}
