//! Memory for thread stacks.

pub mod stack_pool;

pub use stack_pool::{StackPool, ThreadStack};
