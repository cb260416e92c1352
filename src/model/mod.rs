//! Types that represent the core data model, such as `Item`, `DateEntry` and `Ledger`.
mod categorized;
mod item;
mod ledger;
mod period;

pub use categorized::{Assignment, CategorizedItem, CATEGORIES, CATEGORY_VOCABULARY_VERSION};
pub use item::Item;
pub use ledger::{DateEntry, Ledger, Snapshot};
pub use period::{Period, YearMonth};
