pub mod core;
pub mod error;
pub mod execution;
pub mod pagination;
pub mod records;
