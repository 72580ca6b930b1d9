pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;

pub use catalog::{Category, CategoryCatalog, CategoryIndex, CatalogError};
pub use domain::contact::{Contact, ContactProfile, UserId};
pub use domain::tag::{Tag, TagId};
pub use errors::{ApplicationError, InterfaceError};
