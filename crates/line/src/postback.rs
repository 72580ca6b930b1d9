//! Typed codec for the postback data attached to menu buttons.
//!
//! Wire forms are `selectCategory:<i>` with `i` in decimal ASCII digits, and
//! `showMoreCategories`. Anything else decodes to `None`; an index outside the
//! catalog is a decode failure, never an out-of-range lookup.

use facultag_core::catalog::{CategoryCatalog, CategoryIndex};

pub const SELECT_CATEGORY_PREFIX: &str = "selectCategory:";
pub const SHOW_MORE_CATEGORIES: &str = "showMoreCategories";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostbackCommand {
    SelectCategory(CategoryIndex),
    ShowMoreCategories,
}

impl PostbackCommand {
    pub fn encode(&self) -> String {
        match self {
            Self::SelectCategory(index) => encode_postback(*index),
            Self::ShowMoreCategories => SHOW_MORE_CATEGORIES.to_owned(),
        }
    }

    pub fn decode(raw: &str, catalog: &CategoryCatalog) -> Option<Self> {
        if raw == SHOW_MORE_CATEGORIES {
            return Some(Self::ShowMoreCategories);
        }
        decode_postback(raw, catalog).map(Self::SelectCategory)
    }
}

pub fn encode_postback(index: CategoryIndex) -> String {
    format!("{SELECT_CATEGORY_PREFIX}{index}")
}

pub fn decode_postback(raw: &str, catalog: &CategoryCatalog) -> Option<CategoryIndex> {
    let digits = raw.strip_prefix(SELECT_CATEGORY_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    let index = CategoryIndex(digits.parse::<usize>().ok()?);
    catalog.get(index).map(|category| category.index())
}

#[cfg(test)]
mod tests {
    use facultag_core::catalog::{CategoryCatalog, CategoryIndex};

    use super::{decode_postback, encode_postback, PostbackCommand, SHOW_MORE_CATEGORIES};

    #[test]
    fn every_catalog_index_survives_the_codec() {
        let catalog = CategoryCatalog::default();
        for category in catalog.iter() {
            let encoded = encode_postback(category.index());
            assert_eq!(decode_postback(&encoded, &catalog), Some(category.index()));
        }
    }

    #[test]
    fn encoded_form_is_prefix_and_decimal_index() {
        assert_eq!(encode_postback(CategoryIndex(2)), "selectCategory:2");
        assert_eq!(PostbackCommand::ShowMoreCategories.encode(), "showMoreCategories");
    }

    #[test]
    fn malformed_payloads_decode_to_none() {
        let catalog = CategoryCatalog::default();
        for raw in [
            "",
            "selectCategory:",
            "selectCategory:-1",
            "selectCategory:+1",
            "selectCategory: 1",
            "selectCategory:1 ",
            "selectCategory:1a",
            "selectCategory:٣",
            "selectCategory:99999999999999999999999999",
            "selectcategory:1",
            "faculty_1",
        ] {
            assert_eq!(decode_postback(raw, &catalog), None, "payload {raw:?} should not decode");
        }
    }

    #[test]
    fn out_of_range_index_is_a_decode_failure() {
        let catalog = CategoryCatalog::new(["a", "b", "c"]).expect("catalog");
        assert_eq!(decode_postback("selectCategory:2", &catalog), Some(CategoryIndex(2)));
        assert_eq!(decode_postback("selectCategory:3", &catalog), None);
    }

    #[test]
    fn command_decode_distinguishes_show_more() {
        let catalog = CategoryCatalog::default();
        assert_eq!(
            PostbackCommand::decode(SHOW_MORE_CATEGORIES, &catalog),
            Some(PostbackCommand::ShowMoreCategories)
        );
        assert_eq!(
            PostbackCommand::decode("selectCategory:07", &catalog),
            Some(PostbackCommand::SelectCategory(CategoryIndex(7)))
        );
        assert_eq!(PostbackCommand::decode("showMoreCategories ", &catalog), None);
    }
}
