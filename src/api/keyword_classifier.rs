//! Implements the `Classifier` trait with fixed keyword rules.
//!
//! Note: this is compiled even in the production version of this app so that organize can run
//! without a network connection or an API key.

use crate::api::{ClassifyRequest, Classifier};
use crate::model::Assignment;
use crate::Result;

/// The label used when no rule matches.
pub const FALLBACK_CATEGORY: &str = "其他";

/// Keywords checked against item names, in priority order.
const RULES: &[(&str, &[&str])] = &[
    ("鮮奶", &["鮮奶", "牛奶", "奶粉", "優酪乳"]),
    ("保健品", &["維他命", "魚油", "益生菌", "葉黃素", "鈣片"]),
    ("機車", &["機車", "機油", "加油", "輪胎", "停車"]),
    (
        "水果",
        &["水果", "蘋果", "香蕉", "芭樂", "葡萄", "橘子", "西瓜", "草莓", "奇異果"],
    ),
    ("麵包", &["麵包", "吐司", "貝果", "可頌", "蛋糕"]),
    ("零嘴", &["餅乾", "洋芋片", "糖果", "巧克力", "零食", "布丁"]),
    (
        "生活用品",
        &["衛生紙", "洗衣", "洗碗", "牙膏", "洗髮", "沐浴", "垃圾袋", "電池"],
    ),
    (
        "家裡煮",
        &["菜", "肉", "蛋", "魚", "米", "地瓜", "蘿蔔", "豆腐", "雞", "麵"],
    ),
];

/// A `Classifier` that assigns each item the first category whose keywords appear in its name,
/// or `其他` when nothing matches. It always answers every id exactly once.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn categorize(name: &str) -> &'static str {
        RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| name.contains(k)))
            .map(|(category, _)| *category)
            .unwrap_or(FALLBACK_CATEGORY)
    }
}

#[async_trait::async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, request: &ClassifyRequest) -> Result<Vec<Assignment>> {
        Ok(request
            .items
            .iter()
            .map(|item| Assignment::new(item.id, Self::categorize(&item.name)))
            .collect())
    }
}
