pub mod ddl;
pub mod dialect;
pub mod mysql;
pub mod postgres;
pub mod query;
