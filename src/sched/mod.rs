//! Thread scheduling.
//!
//! Provides the round-robin scheduler and the index-linked wait list it uses
//! for threads blocked on console input.

pub mod rr;
pub mod wait_list;

pub use rr::{EntryPoints, InputWaiter, RoundRobinScheduler, SchedStats};
pub use wait_list::{Link, Linked, WaitList};
