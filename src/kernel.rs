//! Kernel abstraction: the trap entry layer.
//!
//! This module provides the main `Kernel` struct that owns the scheduler and
//! the board and turns every trap (syscall, IRQ, synchronous fault) into a
//! scheduling decision. The architecture glue saves the interrupted thread
//! into a [`ContextFrame`], hands it to one of the `on_*` methods and
//! restores whatever the frame holds afterwards, which is how a context
//! switch happens.

use crate::arch::{Arch, ContextFrame, FaultRegisters, IrqGuard};
use crate::bsp::{Board, Console, InterruptController, PreemptTimer};
use crate::diag;
use crate::errors::{InitError, KernelFault, SpawnError, ThreadFault};
use crate::mem::StackPool;
use crate::print::KernelWriter;
use crate::sched::{EntryPoints, RoundRobinScheduler, SchedStats};
use crate::syscall;
use crate::thread::ThreadId;
use core::marker::PhantomData;
use portable_atomic::{AtomicBool, Ordering};
use spin::MutexGuard;

/// What the architecture glue does once an entry function returns.
#[must_use = "a halt request must reach the architecture layer"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapAction {
    /// Restore the (possibly replaced) frame and return from the exception.
    Resume,
    /// Stop the CPU.
    Halt(KernelFault),
}

impl TrapAction {
    /// Halt via `A` if requested, otherwise return.
    pub fn resolve<A: Arch>(self) {
        if let TrapAction::Halt(_) = self {
            A::halt();
        }
    }
}

/// Main kernel handle.
///
/// Once a fatal fault has been reported every entry function returns
/// [`TrapAction::Halt`] without touching the scheduler.
///
/// # Type Parameters
///
/// * `A` - Architecture implementation
/// * `B` - Board implementation
pub struct Kernel<A: Arch, B: Board> {
    /// Scheduler state. Only ever locked with IRQs masked; a failed
    /// `try_lock` from a trap means re-entry and is fatal.
    scheduler: spin::Mutex<RoundRobinScheduler>,
    /// Board peripherals
    board: B,
    /// Set once a fatal fault has been reported
    halted: AtomicBool,
    /// Architecture marker (zero-sized)
    _arch: PhantomData<A>,
}

impl<A: Arch, B: Board> Kernel<A, B> {
    /// Create a new kernel instance around `board`.
    pub const fn new(board: B) -> Self {
        Self {
            scheduler: spin::Mutex::new(RoundRobinScheduler::new()),
            board,
            halted: AtomicBool::new(false),
            _arch: PhantomData,
        }
    }

    /// Initialize the board and the scheduler.
    ///
    /// Must run once, before [`start`](Self::start), with IRQs masked.
    pub fn init(&self, stacks: &'static mut StackPool) -> Result<(), InitError> {
        let _guard = IrqGuard::<A>::new();
        let mut sched = self.scheduler.lock();
        if sched.is_initialized() {
            return Err(InitError::AlreadyInitialized);
        }

        self.board.init();
        sched.init(
            stacks,
            EntryPoints {
                idle: A::idle_entry(),
                thread: A::thread_entry(),
            },
        )?;

        kprintln!("=== kernel started ===");
        Ok(())
    }

    /// Check if the kernel has been initialized.
    pub fn is_initialized(&self) -> bool {
        let _guard = IrqGuard::<A>::new();
        self.scheduler.lock().is_initialized()
    }

    /// Whether a fatal fault stopped the kernel.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// The board.
    pub fn board(&self) -> &B {
        &self.board
    }

    /// Create a thread from kernel context, before or after start.
    ///
    /// `entry` is the address of an `extern "C" fn(*mut u8)`; `args` is
    /// copied onto the new thread's stack and its address passed to `entry`.
    pub fn spawn(&self, entry: u32, args: &[u8]) -> Result<ThreadId, SpawnError> {
        let _guard = IrqGuard::<A>::new();
        self.scheduler.lock().create_thread(entry, args)
    }

    /// Thread counts by state.
    pub fn stats(&self) -> SchedStats {
        let _guard = IrqGuard::<A>::new();
        self.scheduler.lock().stats()
    }

    /// Run `f` with shared access to the scheduler.
    pub fn with_scheduler<R>(&self, f: impl FnOnce(&RoundRobinScheduler) -> R) -> R {
        let _guard = IrqGuard::<A>::new();
        f(&self.scheduler.lock())
    }

    /// Pick the first thread, arm the timer and return the snapshot to
    /// restore.
    pub fn prepare_start(&self) -> Result<ContextFrame, KernelFault> {
        if self.is_halted() {
            return Err(KernelFault::Halted);
        }
        let mut sched = self.lock_scheduler()?;
        sched.pick_next();
        self.board.timer().rearm();

        let mut frame = ContextFrame::ZERO;
        sched.restore_current(&mut frame);
        Ok(frame)
    }

    /// Leave the boot context and run threads. Never returns.
    pub fn start(&self) -> ! {
        A::disable_interrupts();
        match self.prepare_start() {
            // SAFETY: the frame comes from the scheduler and IRQs are masked.
            Ok(frame) => unsafe { A::first_context_restore(&frame) },
            Err(fault) => {
                let _ = self.fatal(fault);
                A::halt()
            }
        }
    }

    /// Syscall entry. `frame` holds the caller's registers with the resume
    /// address on its `svc` instruction; on return it holds the thread to
    /// resume.
    pub fn on_syscall(&self, frame: &mut ContextFrame) -> TrapAction {
        let _guard = IrqGuard::<A>::new();
        if self.is_halted() {
            return TrapAction::Halt(KernelFault::Halted);
        }
        if !frame.is_from_user() {
            return self.fatal(KernelFault::PrivilegedSyscall);
        }
        let mut sched = match self.lock_scheduler() {
            Ok(sched) => sched,
            Err(fault) => return self.fatal(fault),
        };

        sched.save_current(frame);
        let outcome = syscall::dispatch(&mut sched, self.board.console(), frame);

        let mut reschedule = outcome.reschedule;
        if outcome.handled {
            let saved = sched.current_context_mut();
            saved.set_return_value(outcome.value);
            if outcome.advance_pc {
                saved.advance_pc();
            }
        } else {
            let id = frame.syscall_id();
            self.report(ThreadFault::UnknownSyscall(id), frame, FaultRegisters::default());
            let thread = sched.current();
            if sched.terminate_current() {
                kprintln!("unknown syscall {} in thread {}, terminated", id, thread);
            }
            reschedule = true;
        }

        if reschedule {
            self.board.timer().rearm();
            sched.pick_next();
        }
        sched.restore_current(frame);
        TrapAction::Resume
    }

    /// IRQ entry. Services the preemption timer and UART receive.
    pub fn on_irq(&self, frame: &mut ContextFrame) -> TrapAction {
        let _guard = IrqGuard::<A>::new();
        if self.is_halted() {
            return TrapAction::Halt(KernelFault::Halted);
        }
        let mut sched = match self.lock_scheduler() {
            Ok(sched) => sched,
            Err(fault) => return self.fatal(fault),
        };
        ktrace!("irq from thread {} at {:#010x}", sched.current(), frame.pc);

        sched.save_current(frame);

        let irq = self.board.irq();
        let timer = self.board.timer();
        let console = self.board.console();

        if irq.timer_pending() {
            timer.acknowledge();
            timer.rearm();
            sched.tick();
            sched.pick_next();
        }

        if irq.uart_pending() {
            if console.rx_pending() {
                console.drain_rx();
            }
            console.clear_interrupts();
        }

        let mut woke = false;
        while sched.has_waiting_input() {
            let Some(byte) = console.try_getc() else {
                break;
            };
            let Some(waiter) = sched.pop_next_input_waiter() else {
                break;
            };
            ktrace!("input {:#04x} for thread {}", byte, waiter.id());
            sched.deliver_result_to(waiter, u32::from(byte));
            woke = true;
        }

        if woke && sched.current().is_idle() {
            timer.rearm();
            sched.pick_next();
        }

        sched.restore_current(frame);
        TrapAction::Resume
    }

    /// Synchronous fault entry (undefined instruction, prefetch abort, data
    /// abort). `frame.pc` holds the faulting instruction's address.
    pub fn on_fault(&self, fault: ThreadFault, frame: &mut ContextFrame) -> TrapAction {
        let _guard = IrqGuard::<A>::new();
        if self.is_halted() {
            return TrapAction::Halt(KernelFault::Halted);
        }
        self.report(fault, frame, A::fault_registers(fault));

        if !frame.is_from_user() {
            return self.fatal(KernelFault::PrivilegedException(fault));
        }
        let mut sched = match self.lock_scheduler() {
            Ok(sched) => sched,
            Err(kernel_fault) => return self.fatal(kernel_fault),
        };

        let thread = sched.current();
        if !sched.terminate_current() {
            return self.fatal(KernelFault::IdleFault(fault));
        }
        kprintln!("thread {} terminated", thread);

        self.board.timer().rearm();
        sched.pick_next();
        sched.restore_current(frame);
        TrapAction::Resume
    }

    fn lock_scheduler(&self) -> Result<MutexGuard<'_, RoundRobinScheduler>, KernelFault> {
        let sched = self.scheduler.try_lock().ok_or(KernelFault::SchedulerBusy)?;
        if !sched.is_initialized() {
            return Err(KernelFault::NotStarted);
        }
        Ok(sched)
    }

    fn report(&self, fault: ThreadFault, frame: &ContextFrame, regs: FaultRegisters) {
        let _ = diag::write_fault_report(&mut KernelWriter, fault, frame, regs);
    }

    fn fatal(&self, fault: KernelFault) -> TrapAction {
        self.halted.store(true, Ordering::Release);
        kprintln!("kernel panic: {}", fault);
        // End-of-transmission marks the halt for whoever reads the console.
        kprint!("\x04");
        TrapAction::Halt(fault)
    }
}
