pub mod chunk;
pub mod error;
pub mod execution;
pub mod plan;
pub mod source;

#[cfg(test)]
mod testing;
