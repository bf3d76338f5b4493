//! Architecture abstraction layer for interrupt masking, halting and the
//! first context restore.
//!
//! The kernel has no lock primitive other than interrupt masking. Every path
//! that mutates scheduler state runs inside an [`IrqGuard`].

use crate::errors::ThreadFault;
use core::marker::PhantomData;

pub mod frame;

pub use frame::ContextFrame;

/// Fault status and address registers captured for a synchronous fault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultRegisters {
    /// DFSR for data aborts, IFSR for prefetch aborts
    pub status: u32,
    /// DFAR for data aborts, IFAR for prefetch aborts
    pub address: u32,
}

/// Architecture abstraction trait.
///
/// # Safety
///
/// Implementations touch processor state directly. `first_context_restore`
/// must only be handed a snapshot produced by the scheduler.
pub trait Arch {
    /// Enable IRQ delivery on the current CPU.
    fn enable_interrupts();

    /// Disable IRQ delivery on the current CPU.
    fn disable_interrupts();

    /// Check if IRQs are currently enabled.
    fn interrupts_enabled() -> bool;

    /// Mask all interrupts permanently and stop in a low-power wait loop.
    fn halt() -> !;

    /// Load `frame` into the CPU and resume at its resume address in the
    /// mode its status word selects.
    ///
    /// # Safety
    ///
    /// Must be called from a privileged mode with interrupts masked; `frame`
    /// must describe a runnable thread with a valid stack.
    unsafe fn first_context_restore(frame: &ContextFrame) -> !;

    /// Address of the idle loop.
    fn idle_entry() -> u32;

    /// Address of the trampoline new threads start in. It receives the start
    /// function in `r0` and the argument pointer in `r1`.
    fn thread_entry() -> u32;

    /// Read the fault status registers that belong to `fault`.
    fn fault_registers(fault: ThreadFault) -> FaultRegisters;
}

/// Critical section guard: masks IRQs on creation and restores the previous
/// mask state on every exit path.
#[must_use = "interrupts are unmasked again as soon as the guard is dropped"]
pub struct IrqGuard<A: Arch> {
    restore: bool,
    _arch: PhantomData<(A, *const ())>,
}

impl<A: Arch> IrqGuard<A> {
    /// Mask IRQs until the guard is dropped.
    pub fn new() -> Self {
        let restore = A::interrupts_enabled();
        A::disable_interrupts();
        Self {
            restore,
            _arch: PhantomData,
        }
    }
}

impl<A: Arch> Default for IrqGuard<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Arch> Drop for IrqGuard<A> {
    fn drop(&mut self) {
        if self.restore {
            A::enable_interrupts();
        }
    }
}

/// A no-op architecture implementation for host testing.
///
/// Entry addresses are fixed fake values; halting panics.
pub struct NoOpArch;

impl NoOpArch {
    /// Idle loop address reported on the host.
    pub const IDLE_ENTRY: u32 = 0x0000_1000;
    /// Thread trampoline address reported on the host.
    pub const THREAD_ENTRY: u32 = 0x0000_2000;
}

impl Arch for NoOpArch {
    fn enable_interrupts() {}

    fn disable_interrupts() {}

    fn interrupts_enabled() -> bool {
        true
    }

    fn halt() -> ! {
        panic!("CPU halted");
    }

    unsafe fn first_context_restore(_frame: &ContextFrame) -> ! {
        panic!("no context restore on the host");
    }

    fn idle_entry() -> u32 {
        Self::IDLE_ENTRY
    }

    fn thread_entry() -> u32 {
        Self::THREAD_ENTRY
    }

    fn fault_registers(_fault: ThreadFault) -> FaultRegisters {
        FaultRegisters::default()
    }
}

// Raspberry Pi 2 - 32-bit ARMv7-A only
#[cfg(target_arch = "arm")]
pub mod armv7;
#[cfg(target_arch = "arm")]
pub mod armv7_boot;
#[cfg(target_arch = "arm")]
pub mod armv7_vectors;

#[cfg(target_arch = "arm")]
pub use armv7::Armv7Arch as DefaultArch;

// For testing/std-shim on non-ARM hosts
#[cfg(not(target_arch = "arm"))]
pub use NoOpArch as DefaultArch;

#[cfg(all(not(target_arch = "arm"), not(any(test, feature = "std-shim"))))]
compile_error!("This kernel only runs on 32-bit ARMv7-A. Use --target armv7a-none-eabi or enable the std-shim feature for host builds.");
