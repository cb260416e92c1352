use serde::{Deserialize, Deserializer, Serialize};

/// The category vocabulary offered to the classifier. The classifier may invent new labels when
/// none of these fit.
pub const CATEGORIES: &[&str] = &[
    "鮮奶",
    "水果",
    "麵包",
    "零嘴",
    "保健品",
    "機車",
    "生活用品",
    "家裡煮",
];

/// Bumped whenever `CATEGORIES` changes so that classifier prompts can be told apart.
pub const CATEGORY_VOCABULARY_VERSION: u32 = 1;

/// An item numbered for a single organize run. The `id` is 1-based and never persisted.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CategorizedItem {
    pub id: u32,
    /// The ledger date the item was recorded under, used for sorting.
    pub date: String,
    /// The date as shown to people, e.g. `8/4`.
    pub display_date: String,
    pub name: String,
    pub price: u64,
}

/// One classifier answer: the category label for the item numbered `id`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(deserialize_with = "lenient_id")]
    pub id: u32,
    pub category: String,
}

impl Assignment {
    pub fn new(id: u32, category: impl Into<String>) -> Self {
        Self {
            id,
            category: category.into(),
        }
    }
}

/// Classifiers sometimes quote numbers, so accept both `1` and `"1"`.
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u32),
        Text(String),
    }

    match Id::deserialize(deserializer)? {
        Id::Number(n) => Ok(n),
        Id::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_accepts_quoted_ids() {
        let parsed: Vec<Assignment> =
            serde_json::from_str(r#"[{"id": 1, "category": "鮮奶"}, {"id": "2", "category": "水果"}]"#)
                .unwrap();
        assert_eq!(
            parsed,
            vec![Assignment::new(1, "鮮奶"), Assignment::new(2, "水果")]
        );
    }

    #[test]
    fn test_assignment_rejects_garbage_ids() {
        let parsed: serde_json::Result<Vec<Assignment>> =
            serde_json::from_str(r#"[{"id": "one", "category": "鮮奶"}]"#);
        assert!(parsed.is_err());
    }
}
