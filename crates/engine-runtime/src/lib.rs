pub mod checkpoint;
pub mod error;
pub mod pipeline;
pub mod state;

#[cfg(test)]
mod tests;
