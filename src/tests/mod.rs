//! Crate-level scenario tests driving the kernel through its trap entries.

pub mod helpers;

mod integration;
