pub mod contact;
pub mod tag;
