//! Statically allocated thread stacks.
//!
//! One fixed-size stack per thread table slot. The pool lives in `.bss` and is
//! handed out exactly once; each stack is then exclusively owned by its TCB.

use crate::config::{MAX_ARG_BYTES, MAX_THREADS, STACK_SIZE};
use portable_atomic::{AtomicBool, Ordering};

/// A single thread stack. ARM stacks grow downward from [`ThreadStack::top`].
#[repr(C, align(8))]
pub struct ThreadStack {
    bytes: [u8; STACK_SIZE],
}

impl ThreadStack {
    /// A zero-filled stack.
    pub const fn new() -> Self {
        Self {
            bytes: [0; STACK_SIZE],
        }
    }

    /// Lowest address of the stack memory.
    pub fn base(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    /// One past the highest address; the initial stack pointer.
    pub fn top(&self) -> *const u8 {
        self.bytes.as_ptr_range().end
    }

    /// Zero the whole stack.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Copy `data` to the top of the stack, 8-byte aligned, and return the
    /// offset of the copy from [`ThreadStack::base`].
    ///
    /// Returns `None` if `data` is longer than [`MAX_ARG_BYTES`], so at least
    /// `ARG_STACK_RESERVE` bytes stay free below the copy.
    pub fn push_block(&mut self, data: &[u8]) -> Option<usize> {
        if data.len() > MAX_ARG_BYTES {
            return None;
        }
        let offset = (STACK_SIZE - data.len()) & !7;
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        Some(offset)
    }

    /// Raw view of the stack contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for ThreadStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Backing memory for every thread stack, idle included.
#[repr(C, align(8))]
pub struct StackPool {
    stacks: [ThreadStack; MAX_THREADS],
}

static mut THREAD_STACKS: StackPool = StackPool::new();
static TAKEN: AtomicBool = AtomicBool::new(false);

impl StackPool {
    /// A zero-filled pool.
    pub const fn new() -> Self {
        Self {
            stacks: [const { ThreadStack::new() }; MAX_THREADS],
        }
    }

    /// Hand out the static pool. Returns `Some` exactly once.
    pub fn take() -> Option<&'static mut StackPool> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }
        // SAFETY: the flag above lets exactly one caller through, so this is
        // the only reference ever created to the static.
        Some(unsafe { &mut *core::ptr::addr_of_mut!(THREAD_STACKS) })
    }

    /// Split the pool into one exclusively owned stack per slot.
    pub fn split(&'static mut self) -> impl Iterator<Item = &'static mut ThreadStack> {
        self.stacks.iter_mut()
    }
}

impl Default for StackPool {
    fn default() -> Self {
        Self::new()
    }
}
