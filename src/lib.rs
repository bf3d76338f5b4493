#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(unreachable_pub)]

//! Bare-metal preemptive round-robin kernel for the Raspberry Pi 2.
//!
//! Threads run unprivileged and reach the kernel only through traps: a
//! syscall, the preemption timer or UART interrupt, or a synchronous fault.
//! Every trap saves the interrupted thread into a register snapshot, lets the
//! kernel decide who runs next and returns into whatever snapshot is then
//! current.
//!
//! # Target Platform
//!
//! - **Hardware**: Raspberry Pi 2 (BCM2836, Cortex-A7)
//! - **Architecture**: ARMv7-A, 32-bit, single core
//! - **Environment**: Bare-metal (no operating system)
//!
//! # Features
//!
//! - `std-shim`: Enable compatibility layer for building on the host
//! - `trace-irq`: Log every interrupt entry on the console
//!
//! # Quick Start
//!
//! ```ignore
//! use preemptive_kernel::arch::armv7_vectors::KERNEL;
//!
//! extern "C" fn worker(arg: *mut u8) {
//!     let c = unsafe { *arg };
//!     for _ in 0..10 {
//!         preemptive_kernel::syscall::user::putc(c);
//!     }
//! }
//!
//! #[no_mangle]
//! fn kernel_main() {
//!     KERNEL.spawn(worker as usize as u32, b"a").expect("spawn");
//! }
//! ```
//!
//! # Architecture
//!
//! - `arch`: register snapshot layout, interrupt masking, vector table and
//!   trap trampolines
//! - `bsp`: PL011 UART, system timer and interrupt controller
//! - `sched`: fixed thread table, round-robin selection, sleeping and
//!   blocking on console input
//! - `syscall`: syscall decoding and dispatch
//! - `kernel`: trap entry layer tying the above together

#[cfg(test)]
extern crate std;

#[macro_use]
pub mod print;

// Core modules
pub mod arch;
pub mod bsp;
pub mod config;
pub mod diag;
pub mod errors;
pub mod kernel;
pub mod mem;
pub mod sched;
pub mod syscall;
pub mod thread;

#[cfg(test)]
mod tests;

// Panic handler for bare-metal
#[cfg(all(not(test), not(feature = "std-shim")))]
use core::panic::PanicInfo;

#[cfg(all(not(test), not(feature = "std-shim")))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    kprintln!("kernel panic: {}", info);
    <arch::DefaultArch as arch::Arch>::halt()
}

// ============================================================================
// Public API
// ============================================================================

// Architecture abstraction
pub use arch::{Arch, ContextFrame, DefaultArch};

// Kernel
pub use kernel::{Kernel, TrapAction};

// Scheduler
pub use sched::{RoundRobinScheduler, SchedStats};

// Threads
pub use thread::{ThreadId, ThreadState};

// Memory management
pub use mem::{StackPool, ThreadStack};

// Errors
pub use errors::{InitError, KernelFault, SpawnError, ThreadFault};
