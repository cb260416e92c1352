//! Parsers for the free-form text people send: single expense lines, multi-line expense messages
//! and historical blocks of alternating date headers and item lines.

use crate::model::{DateEntry, Item};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// A name followed by the maximal trailing run of ASCII digits.
static EXPENSE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<name>.*?)(?P<price>[0-9]+)$").expect("valid regex"));

/// A legacy `M/D` date header, e.g. `8/4`.
static DATE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{1,2}/[0-9]{1,2}$").expect("valid regex"));

/// The items parsed out of one message along with the sum of their prices. An empty `Expenses`
/// means the message is not an expense record.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Expenses {
    items: Vec<Item>,
    total: u64,
}

impl Expenses {
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Splits one line into a leading name and a trailing positive integer price. Returns `None` for
/// anything that is not an expense line: no trailing digits, a zero or overflowing price, or an
/// empty name.
pub fn parse_line(line: &str) -> Option<Item> {
    let caps = EXPENSE_LINE.captures(line.trim())?;
    let price: u64 = caps["price"].parse().ok()?;
    Item::new(&caps["name"], price).ok()
}

/// Applies `parse_line` to every non-blank line of `text`, keeping the items that parse.
pub fn parse_expenses(text: &str) -> Expenses {
    let items: Vec<Item> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_line)
        .collect();
    let total = items.iter().map(Item::price).sum();
    Expenses { items, total }
}

/// Whether `line` is a date header in a historical block.
pub fn is_date_header(line: &str) -> bool {
    DATE_HEADER.is_match(line.trim())
}

/// Parses a block of alternating `M/D` date headers and item lines into date entries, in the
/// order the headers appear. A header without any valid items produces no entry, and item lines
/// that appear before the first header are dropped. Each entry is stamped with `now`.
pub fn parse_history(text: &str, now: DateTime<Utc>) -> Vec<DateEntry> {
    let mut entries = Vec::new();
    let mut open: Option<(String, Vec<Item>)> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_date_header(line) {
            flush(&mut entries, open.take(), now);
            open = Some((line.to_string(), Vec::new()));
            continue;
        }
        if let (Some((_, items)), Some(item)) = (open.as_mut(), parse_line(line)) {
            items.push(item);
        }
    }
    flush(&mut entries, open, now);
    entries
}

fn flush(entries: &mut Vec<DateEntry>, section: Option<(String, Vec<Item>)>, now: DateTime<Utc>) {
    if let Some((date, items)) = section {
        if !items.is_empty() {
            entries.push(DateEntry::new(date, items, now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, price: u64) -> Item {
        Item::new(name, price).unwrap()
    }

    #[test]
    fn test_parse_line_valid() {
        assert_eq!(parse_line("鮮奶 255"), Some(item("鮮奶", 255)));
        assert_eq!(parse_line("  鮮奶   255  "), Some(item("鮮奶", 255)));
        assert_eq!(parse_line("鮮奶255"), Some(item("鮮奶", 255)));
        assert_eq!(
            parse_line("全聯 衛生紙 大包 189"),
            Some(item("全聯 衛生紙 大包", 189))
        );
        assert_eq!(parse_line("7-11 咖啡 55"), Some(item("7-11 咖啡", 55)));
        assert_eq!(parse_line("蛋 007"), Some(item("蛋", 7)));
    }

    #[test]
    fn test_parse_line_takes_maximal_digit_run() {
        assert_eq!(parse_line("機油1200"), Some(item("機油", 1200)));
        assert_eq!(parse_line("iPhone 15 30000"), Some(item("iPhone 15", 30000)));
    }

    #[test]
    fn test_parse_line_misses() {
        assert_eq!(parse_line("哈囉大家好"), None);
        assert_eq!(parse_line("255"), None);
        assert_eq!(parse_line("   42   "), None);
        assert_eq!(parse_line("鮮奶 0"), None);
        assert_eq!(parse_line("鮮奶 255 元"), None);
        assert_eq!(parse_line("鮮奶 99999999999999999999999"), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn test_parse_expenses_two_lines() {
        let expenses = parse_expenses("地瓜 130\n紅蘿蔔 29");
        assert_eq!(expenses.items(), &[item("地瓜", 130), item("紅蘿蔔", 29)]);
        assert_eq!(expenses.total(), 159);
        assert_eq!(expenses.len(), 2);
    }

    #[test]
    fn test_parse_expenses_skips_noise() {
        let expenses = parse_expenses("今天買了\n\n地瓜 130\n好貴喔\r\n紅蘿蔔 29\r\n");
        assert_eq!(expenses.items(), &[item("地瓜", 130), item("紅蘿蔔", 29)]);
        assert_eq!(expenses.total(), 159);
    }

    #[test]
    fn test_parse_expenses_empty() {
        assert!(parse_expenses("").is_empty());
        assert!(parse_expenses("哈囉大家好").is_empty());
        assert_eq!(parse_expenses("哈囉大家好").total(), 0);
    }

    #[test]
    fn test_parse_history() {
        let text = "8/4\n鮮奶 255\n地瓜 130\n\n8/5\n沒有價格\n\n8/6\n蘋果 99\n";
        let entries = parse_history(text, Utc::now());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].date(), "8/4");
        assert_eq!(entries[0].items(), &[item("鮮奶", 255), item("地瓜", 130)]);
        assert_eq!(entries[1].date(), "8/6");
        assert_eq!(entries[1].items(), &[item("蘋果", 99)]);
    }

    #[test]
    fn test_parse_history_keeps_header_order() {
        let text = "12/31\n年菜 3000\n1/1\n紅包 600\n";
        let dates: Vec<String> = parse_history(text, Utc::now())
            .iter()
            .map(|e| e.date().to_string())
            .collect();
        assert_eq!(dates, vec!["12/31", "1/1"]);
    }

    #[test]
    fn test_parse_history_drops_items_before_first_header() {
        let text = "鮮奶 255\n8/4\n地瓜 130";
        let entries = parse_history(text, Utc::now());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].items(), &[item("地瓜", 130)]);
    }

    #[test]
    fn test_date_header_is_not_an_item() {
        assert!(is_date_header("8/4"));
        assert!(is_date_header("12/31"));
        assert!(!is_date_header("123/4"));
        assert!(!is_date_header("2024-08-04"));
        let entries = parse_history("8/4\n8/5\n鮮奶 255", Utc::now());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].date(), "8/5");
    }
}
