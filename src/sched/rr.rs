//! Round-robin scheduler over a fixed thread table.
//!
//! Slot 0 is the idle thread. It is never part of the rotation and is picked
//! only when no other thread is runnable. Every method here mutates state
//! shared with interrupt handlers and must run with IRQs masked.

use super::wait_list::WaitList;
use crate::arch::ContextFrame;
use crate::config::{MAX_ARG_BYTES, MAX_THREADS};
use crate::errors::{InitError, SpawnError};
use crate::mem::StackPool;
use crate::thread::{Tcb, ThreadId, ThreadState};

/// Addresses the scheduler seeds new contexts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoints {
    /// Idle loop
    pub idle: u32,
    /// Trampoline that calls the start function and then exits
    pub thread: u32,
}

/// A thread just removed from the input wait list.
///
/// Only obtainable from [`RoundRobinScheduler::pop_next_input_waiter`] and
/// consumed by [`RoundRobinScheduler::deliver_result_to`], which keeps the
/// late result write tied to a thread that is known to be off the CPU.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a woken waiter expects its syscall result"]
pub struct InputWaiter(ThreadId);

impl InputWaiter {
    /// The woken thread.
    pub fn id(&self) -> ThreadId {
        self.0
    }
}

/// Thread counts by state, idle excluded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedStats {
    /// Live threads
    pub live: usize,
    /// Threads in the rotation
    pub runnable: usize,
    /// Sleeping threads
    pub sleeping: usize,
    /// Threads blocked on console input
    pub waiting: usize,
}

/// Strict round-robin scheduler with an idle fallback.
pub struct RoundRobinScheduler {
    threads: [Tcb; MAX_THREADS],
    /// Next slot `pick_next` examines. Persists across calls.
    cursor: usize,
    current: ThreadId,
    input_waiters: WaitList,
    entry: EntryPoints,
    initialized: bool,
}

impl RoundRobinScheduler {
    /// An uninitialized scheduler. Call [`init`](Self::init) before use.
    pub const fn new() -> Self {
        Self {
            threads: [Tcb::EMPTY; MAX_THREADS],
            cursor: 1,
            current: ThreadId::IDLE,
            input_waiters: WaitList::new(),
            entry: EntryPoints { idle: 0, thread: 0 },
            initialized: false,
        }
    }

    /// Attach stacks, reset every slot and set up the idle thread.
    pub fn init(
        &mut self,
        stacks: &'static mut StackPool,
        entry: EntryPoints,
    ) -> Result<(), InitError> {
        if self.initialized {
            return Err(InitError::AlreadyInitialized);
        }

        for (index, (tcb, stack)) in self.threads.iter_mut().zip(stacks.split()).enumerate() {
            stack.clear();
            tcb.stack = Some(stack);
            tcb.state = ThreadState::Unused;
            tcb.context = ContextFrame::ZERO;
            tcb.sleep_ticks = 0;
            tcb.wait_link.init(index);
        }

        let idle = &mut self.threads[ThreadId::IDLE.index()];
        idle.state = ThreadState::Running;
        idle.context = ContextFrame::for_entry(entry.idle, idle.stack_top());

        self.input_waiters.clear();
        self.cursor = 1;
        self.current = ThreadId::IDLE;
        self.entry = entry;
        self.initialized = true;
        Ok(())
    }

    /// Whether [`init`](Self::init) has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Create a thread that runs `entry` with a copy of `args` on its stack.
    ///
    /// Scans forward from the rotation cursor, wrapping and skipping idle,
    /// for a free slot. Fails without side effects if none is free or if
    /// `args` does not fit on a stack.
    pub fn create_thread(&mut self, entry: u32, args: &[u8]) -> Result<ThreadId, SpawnError> {
        if !self.initialized {
            return Err(SpawnError::NotInitialized);
        }

        let slot = (0..MAX_THREADS)
            .map(|step| (self.cursor + step) % MAX_THREADS)
            .filter(|&index| index != ThreadId::IDLE.index())
            .find(|&index| self.threads[index].state == ThreadState::Unused)
            .ok_or(SpawnError::TableFull)?;

        if args.len() > MAX_ARG_BYTES {
            return Err(SpawnError::ArgumentsTooLarge {
                len: args.len(),
                limit: MAX_ARG_BYTES,
            });
        }

        let tcb = &mut self.threads[slot];
        let Some(stack) = tcb.stack.as_deref_mut() else {
            return Err(SpawnError::NotInitialized);
        };
        stack.clear();

        let top = stack.top() as usize as u32;
        let (sp, arg_ptr) = if args.is_empty() {
            (top, 0)
        } else {
            match stack.push_block(args) {
                Some(offset) => {
                    let addr = (stack.base() as usize + offset) as u32;
                    (addr, addr)
                }
                None => {
                    return Err(SpawnError::ArgumentsTooLarge {
                        len: args.len(),
                        limit: MAX_ARG_BYTES,
                    })
                }
            }
        };

        let mut context = ContextFrame::for_entry(self.entry.thread, sp);
        context.r[0] = entry;
        context.r[1] = arg_ptr;

        tcb.context = context;
        tcb.sleep_ticks = 0;
        tcb.wait_link.init(slot);
        tcb.state = ThreadState::Running;
        Ok(ThreadId::new(slot))
    }

    /// Make the next runnable thread current and return it.
    ///
    /// Examines at most `MAX_THREADS` slots starting at the cursor, advancing
    /// the cursor on every step. Falls back to idle if nothing is runnable.
    pub fn pick_next(&mut self) -> ThreadId {
        for _ in 0..MAX_THREADS {
            let index = self.cursor;
            self.cursor = (self.cursor + 1) % MAX_THREADS;

            if index == ThreadId::IDLE.index() {
                continue;
            }
            if self.threads[index].state == ThreadState::Running {
                self.current = ThreadId::new(index);
                return self.current;
            }
        }

        self.current = ThreadId::IDLE;
        self.current
    }

    /// Count down every sleeping thread; those reaching zero become runnable.
    pub fn tick(&mut self) {
        for tcb in self.threads.iter_mut().skip(1) {
            if tcb.state == ThreadState::Sleeping && tcb.sleep_ticks > 0 {
                tcb.sleep_ticks -= 1;
                if tcb.sleep_ticks == 0 {
                    tcb.state = ThreadState::Running;
                }
            }
        }
    }

    /// Put the current thread to sleep for `ticks` timer ticks (at least one).
    ///
    /// No-op for idle or before initialization.
    pub fn sleep_current(&mut self, ticks: u32) {
        if !self.has_current_thread() {
            return;
        }
        let tcb = &mut self.threads[self.current.index()];
        tcb.sleep_ticks = ticks.max(1);
        tcb.state = ThreadState::Sleeping;
    }

    /// Park the current thread on the input wait list.
    ///
    /// Returns `true` if the thread gave up the CPU and a reschedule is owed,
    /// `false` for idle or before initialization.
    pub fn block_current_on_input(&mut self) -> bool {
        if !self.has_current_thread() {
            return false;
        }
        let index = self.current.index();
        if self.threads[index].state != ThreadState::WaitingOnInput {
            self.threads[index].state = ThreadState::WaitingOnInput;
            self.input_waiters.append(&mut self.threads, index);
        }
        true
    }

    /// Whether any thread waits for console input.
    pub fn has_waiting_input(&self) -> bool {
        !self.input_waiters.is_empty()
    }

    /// Wake the longest-waiting input waiter and put it straight back into
    /// the rotation.
    pub fn pop_next_input_waiter(&mut self) -> Option<InputWaiter> {
        let index = self.input_waiters.pop_front(&mut self.threads)?;
        let tcb = &mut self.threads[index];
        tcb.sleep_ticks = 0;
        tcb.state = ThreadState::Running;
        Some(InputWaiter(ThreadId::new(index)))
    }

    /// Complete a woken waiter's blocked syscall by writing `value` into its
    /// saved return register.
    ///
    /// The waiter has not run since it blocked, so its saved snapshot is the
    /// authoritative copy of its registers.
    pub fn deliver_result_to(&mut self, waiter: InputWaiter, value: u32) {
        self.threads[waiter.0.index()].context.set_return_value(value);
    }

    /// Release the current thread's slot.
    ///
    /// Returns `false` for idle, which is never terminated.
    pub fn terminate_current(&mut self) -> bool {
        if !self.has_current_thread() {
            return false;
        }
        let index = self.current.index();
        self.input_waiters.remove(&mut self.threads, index);
        let tcb = &mut self.threads[index];
        tcb.sleep_ticks = 0;
        tcb.state = ThreadState::Unused;
        true
    }

    /// The thread on (or about to resume on) the CPU.
    pub fn current(&self) -> ThreadId {
        self.current
    }

    /// Store a trap snapshot as the current thread's saved context.
    pub fn save_current(&mut self, frame: &ContextFrame) {
        self.threads[self.current.index()].context = *frame;
    }

    /// Copy the current thread's saved context into `frame` for the return
    /// from the trap.
    pub fn restore_current(&self, frame: &mut ContextFrame) {
        *frame = self.threads[self.current.index()].context;
    }

    /// Saved context of the current thread.
    pub fn current_context_mut(&mut self) -> &mut ContextFrame {
        &mut self.threads[self.current.index()].context
    }

    /// Thread table entry for `id`.
    pub fn thread(&self, id: ThreadId) -> &Tcb {
        &self.threads[id.index()]
    }

    /// Scheduling state of slot `id`.
    pub fn state(&self, id: ThreadId) -> ThreadState {
        self.threads[id.index()].state
    }

    /// Thread ids blocked on input, in wake-up order.
    pub fn input_waiters(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.input_waiters.iter(&self.threads).map(ThreadId::new)
    }

    /// Thread counts by state.
    pub fn stats(&self) -> SchedStats {
        self.threads
            .iter()
            .skip(1)
            .fold(SchedStats::default(), |mut stats, tcb| {
                match tcb.state {
                    ThreadState::Unused => return stats,
                    ThreadState::Running => stats.runnable += 1,
                    ThreadState::Sleeping => stats.sleeping += 1,
                    ThreadState::WaitingOnInput => stats.waiting += 1,
                }
                stats.live += 1;
                stats
            })
    }

    fn has_current_thread(&self) -> bool {
        self.initialized && !self.current.is_idle()
    }
}

impl Default for RoundRobinScheduler {
    fn default() -> Self {
        Self::new()
    }
}
