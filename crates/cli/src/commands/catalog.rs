use facultag_core::catalog::MENU_PAGE_SIZE;
use facultag_line::postback::encode_postback;
use serde::Serialize;

use crate::commands::{load_config, CommandResult};

/// Menu pages the bot can actually reach: the first page and the show-more page.
const REACHABLE_PAGES: usize = 2;

#[derive(Debug, Serialize)]
struct CatalogEntry {
    index: usize,
    label: String,
    button_label: String,
    postback: String,
    page: usize,
    reachable: bool,
}

pub fn run() -> CommandResult {
    let config = match load_config("catalog") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let catalog = match config.category_catalog() {
        Ok(catalog) => catalog,
        Err(error) => {
            return CommandResult::failure("catalog", "config_validation", error.to_string(), 2);
        }
    };

    let entries: Vec<CatalogEntry> = catalog
        .iter()
        .map(|category| {
            let page = category.index().0 / MENU_PAGE_SIZE;
            CatalogEntry {
                index: category.index().0,
                label: category.label().to_string(),
                button_label: category.display_label(),
                postback: encode_postback(category.index()),
                page,
                reachable: page < REACHABLE_PAGES,
            }
        })
        .collect();

    let unreachable = entries.iter().filter(|entry| !entry.reachable).count();
    let message = if unreachable == 0 {
        format!("{} categories over {} menu page(s)", catalog.len(), catalog.page_count())
    } else {
        format!(
            "{} categories over {} menu page(s); {unreachable} cannot be selected from the menu",
            catalog.len(),
            catalog.page_count()
        )
    };

    CommandResult::success_with_data("catalog", message, serde_json::to_value(entries).ok())
}
