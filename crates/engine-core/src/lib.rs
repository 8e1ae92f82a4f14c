pub mod connectors;
pub mod error;
pub mod logger;
pub mod pagination;
pub mod retry;
pub mod transform;
pub mod writer;
