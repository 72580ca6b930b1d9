//! Static catalog of selectable categories (organizational units).
//!
//! The catalog is fixed at process start. Each category has a stable index
//! used as its selection key in postback payloads, and a full label that is
//! persisted verbatim as the remote tag name. Buttons show a truncated
//! display label instead; truncation never reaches the stored tag name.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Maximum number of characters shown on a menu button before truncation.
pub const BUTTON_LABEL_LIMIT: usize = 12;
pub const ELLIPSIS: &str = "...";
/// Platform-imposed button limit per menu unit.
pub const MENU_PAGE_SIZE: usize = 4;

pub const DEFAULT_CATEGORIES: [&str; 8] = [
    "คณะวิศวกรรมศาสตร์",
    "คณะวิทยาศาสตร์",
    "คณะบริหารธุรกิจ",
    "คณะนิติศาสตร์",
    "คณะมนุษยศาสตร์",
    "คณะแพทยศาสตร์",
    "คณะสถาปัตยกรรมศาสตร์",
    "คณะศึกษาศาสตร์",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CategoryIndex(pub usize);

impl fmt::Display for CategoryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
    index: CategoryIndex,
    label: String,
}

impl Category {
    pub fn index(&self) -> CategoryIndex {
        self.index
    }

    /// Full, untruncated label. This is the value stored as the tag name.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn display_label(&self) -> String {
        truncate_label(&self.label, BUTTON_LABEL_LIMIT)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("category catalog must contain at least one category")]
    Empty,
    #[error("category at index {index} has a blank label")]
    BlankLabel { index: usize },
    #[error("category label `{label}` appears more than once")]
    DuplicateLabel { label: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryCatalog {
    categories: Vec<Category>,
}

impl CategoryCatalog {
    pub fn new<I, S>(labels: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut categories = Vec::new();

        for (index, label) in labels.into_iter().enumerate() {
            let label = label.into();
            if label.trim().is_empty() {
                return Err(CatalogError::BlankLabel { index });
            }
            if !seen.insert(label.clone()) {
                return Err(CatalogError::DuplicateLabel { label });
            }
            categories.push(Category { index: CategoryIndex(index), label });
        }

        if categories.is_empty() {
            return Err(CatalogError::Empty);
        }

        Ok(Self { categories })
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn get(&self, index: CategoryIndex) -> Option<&Category> {
        self.categories.get(index.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(Category::label)
    }

    /// Categories shown on menu page `page`; empty when the page is past the end.
    pub fn page(&self, page: usize) -> &[Category] {
        let start = page.saturating_mul(MENU_PAGE_SIZE).min(self.categories.len());
        let end = start.saturating_add(MENU_PAGE_SIZE).min(self.categories.len());
        &self.categories[start..end]
    }

    pub fn page_count(&self) -> usize {
        self.categories.len().div_ceil(MENU_PAGE_SIZE)
    }
}

impl Default for CategoryCatalog {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES
                .iter()
                .enumerate()
                .map(|(index, label)| Category {
                    index: CategoryIndex(index),
                    label: (*label).to_owned(),
                })
                .collect(),
        }
    }
}

/// Shortens `label` to `limit` characters followed by [`ELLIPSIS`].
///
/// Counts Unicode scalar values, so multi-byte scripts are never split
/// in the middle of a character.
pub fn truncate_label(label: &str, limit: usize) -> String {
    if label.chars().count() <= limit {
        return label.to_owned();
    }

    let mut truncated: String = label.chars().take(limit).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

#[cfg(test)]
mod tests {
    use super::{
        truncate_label, CatalogError, CategoryCatalog, CategoryIndex, BUTTON_LABEL_LIMIT,
        DEFAULT_CATEGORIES,
    };

    #[test]
    fn default_catalog_keeps_source_order() {
        let catalog = CategoryCatalog::default();

        assert_eq!(catalog.len(), 8);
        assert_eq!(catalog.get(CategoryIndex(0)).map(|c| c.label()), Some(DEFAULT_CATEGORIES[0]));
        assert_eq!(catalog.get(CategoryIndex(7)).map(|c| c.label()), Some(DEFAULT_CATEGORIES[7]));
        assert!(catalog.get(CategoryIndex(8)).is_none());
    }

    #[test]
    fn short_labels_are_displayed_unchanged() {
        assert_eq!(truncate_label("Science", BUTTON_LABEL_LIMIT), "Science");
        assert_eq!(truncate_label("exactly12chr", BUTTON_LABEL_LIMIT), "exactly12chr");
    }

    #[test]
    fn long_labels_are_cut_with_ellipsis() {
        assert_eq!(truncate_label("Faculty of Engineering", 12), "Faculty of E...");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let label = "คณะสถาปัตยกรรมศาสตร์";
        let display = truncate_label(label, BUTTON_LABEL_LIMIT);

        assert_eq!(display.chars().count(), BUTTON_LABEL_LIMIT + 3);
        assert!(display.ends_with("..."));
        assert!(label.starts_with(display.trim_end_matches("...")));
    }

    #[test]
    fn display_label_never_changes_stored_label() {
        let catalog = CategoryCatalog::new(["Faculty of Architecture"]).expect("catalog");
        let category = catalog.get(CategoryIndex(0)).expect("category");

        assert_eq!(category.display_label(), "Faculty of A...");
        assert_eq!(category.label(), "Faculty of Architecture");
    }

    #[test]
    fn pages_split_by_four() {
        let catalog = CategoryCatalog::new(["a", "b", "c", "d", "e", "f"]).expect("catalog");

        let first: Vec<&str> = catalog.page(0).iter().map(|c| c.label()).collect();
        let second: Vec<&str> = catalog.page(1).iter().map(|c| c.label()).collect();

        assert_eq!(first, vec!["a", "b", "c", "d"]);
        assert_eq!(second, vec!["e", "f"]);
        assert!(catalog.page(2).is_empty());
        assert!(catalog.page(usize::MAX).is_empty());
        assert_eq!(catalog.page_count(), 2);
    }

    #[test]
    fn second_page_keeps_absolute_indices() {
        let catalog = CategoryCatalog::default();
        let indices: Vec<usize> = catalog.page(1).iter().map(|c| c.index().0).collect();

        assert_eq!(indices, vec![4, 5, 6, 7]);
    }

    #[test]
    fn catalog_rejects_empty_blank_and_duplicate_labels() {
        assert_eq!(CategoryCatalog::new(Vec::<String>::new()), Err(CatalogError::Empty));
        assert_eq!(CategoryCatalog::new(["ok", "  "]), Err(CatalogError::BlankLabel { index: 1 }));
        assert_eq!(
            CategoryCatalog::new(["same", "same"]),
            Err(CatalogError::DuplicateLabel { label: "same".to_owned() })
        );
    }
}
