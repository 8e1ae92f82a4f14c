pub mod cursor;
pub mod query;
