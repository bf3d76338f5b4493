//! Thread control blocks.
//!
//! A thread is a register snapshot plus a stack. It is resumed by an
//! exception return exactly like returning from an interrupt, so there is no
//! separate "thread object" beyond its slot in the table.

use crate::arch::ContextFrame;
use crate::mem::ThreadStack;
use crate::sched::wait_list::{Link, Linked};
use core::fmt;

/// Index of a thread in the thread table.
///
/// Slots are reused after a thread exits, so an id only names a thread for
/// as long as that thread is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(usize);

impl ThreadId {
    /// The idle thread, permanently in slot 0.
    pub const IDLE: ThreadId = ThreadId(0);

    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Table index of this thread.
    pub fn index(self) -> usize {
        self.0
    }

    /// Whether this is the idle thread.
    pub fn is_idle(self) -> bool {
        self == Self::IDLE
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread scheduling state.
///
/// `Running` means schedulable. Several threads can be `Running` at once;
/// which one owns the CPU is tracked separately by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Slot is free
    Unused = 0,
    /// In the round-robin rotation
    Running = 1,
    /// Waiting for its tick countdown to reach zero
    Sleeping = 2,
    /// Queued on the console input wait list
    WaitingOnInput = 3,
}

/// Per-thread record.
pub struct Tcb {
    pub(crate) state: ThreadState,
    pub(crate) context: ContextFrame,
    pub(crate) stack: Option<&'static mut ThreadStack>,
    pub(crate) sleep_ticks: u32,
    pub(crate) wait_link: Link,
}

impl Tcb {
    /// An unused slot with no stack attached. `init` links it up.
    pub(crate) const EMPTY: Tcb = Tcb {
        state: ThreadState::Unused,
        context: ContextFrame::ZERO,
        stack: None,
        sleep_ticks: 0,
        wait_link: Link::isolated(0),
    };

    /// Current scheduling state.
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Saved register snapshot.
    pub fn context(&self) -> &ContextFrame {
        &self.context
    }

    /// Remaining ticks before a sleeping thread wakes up.
    pub fn sleep_ticks(&self) -> u32 {
        self.sleep_ticks
    }

    /// The thread's stack, once the scheduler has been initialized.
    pub fn stack(&self) -> Option<&ThreadStack> {
        self.stack.as_deref()
    }

    /// Whether the slot holds a live thread.
    pub fn is_alive(&self) -> bool {
        self.state != ThreadState::Unused
    }

    /// Initial stack pointer of this slot.
    pub(crate) fn stack_top(&self) -> u32 {
        self.stack.as_ref().map_or(0, |s| s.top() as usize as u32)
    }
}

impl Linked for Tcb {
    fn link(&self) -> &Link {
        &self.wait_link
    }

    fn link_mut(&mut self) -> &mut Link {
        &mut self.wait_link
    }
}

impl fmt::Debug for Tcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tcb")
            .field("state", &self.state)
            .field("sleep_ticks", &self.sleep_ticks)
            .field("pc", &format_args!("{:#010x}", self.context.pc))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot() {
        let tcb = Tcb::EMPTY;
        assert_eq!(tcb.state(), ThreadState::Unused);
        assert!(!tcb.is_alive());
        assert!(tcb.stack().is_none());
        assert_eq!(tcb.stack_top(), 0);
    }

    #[test]
    fn test_idle_id() {
        assert!(ThreadId::IDLE.is_idle());
        assert!(!ThreadId::new(3).is_idle());
        assert_eq!(ThreadId::new(3).index(), 3);
    }
}
