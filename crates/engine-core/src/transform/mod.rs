pub mod mapping;
pub mod pipeline;
pub mod pruner;
