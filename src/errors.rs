//! Error types for thread creation, user faults and fatal kernel faults.
//!
//! Errors never unwind. Scheduler primitives report failure through
//! `Result`/`Option`, the syscall dispatcher through its outcome record, and
//! the trap entry layer through [`TrapAction`](crate::kernel::TrapAction).

use core::fmt;

/// Errors that can occur when creating a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// The scheduler has not been initialized yet
    NotInitialized,
    /// Every non-idle slot of the thread table is in use
    TableFull,
    /// The argument block does not fit on a thread stack
    ArgumentsTooLarge {
        /// Requested argument block size in bytes
        len: usize,
        /// Per-thread stack budget in bytes
        limit: usize,
    },
}

/// Errors returned by kernel initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// `init` already ran
    AlreadyInitialized,
}

/// A recoverable fault raised by an unprivileged thread.
///
/// The offending thread is terminated; the kernel keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadFault {
    /// Undefined instruction trap
    UndefinedInstruction,
    /// Instruction fetch abort
    PrefetchAbort,
    /// Data access abort
    DataAbort,
    /// Syscall with an id the dispatcher does not handle
    UnknownSyscall(u32),
}

/// A fault the kernel cannot recover from. The CPU is halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelFault {
    /// A syscall was issued from a privileged mode
    PrivilegedSyscall,
    /// A synchronous exception was taken from a privileged mode
    PrivilegedException(ThreadFault),
    /// The idle thread faulted; there is nothing left to fall back to
    IdleFault(ThreadFault),
    /// Scheduler state was already borrowed when a trap arrived
    SchedulerBusy,
    /// A trap arrived before the scheduler was initialized
    NotStarted,
    /// A trap arrived after an earlier fatal fault stopped the kernel
    Halted,
}

impl ThreadFault {
    /// Human readable exception name used in fault reports.
    pub fn name(self) -> &'static str {
        match self {
            ThreadFault::UndefinedInstruction => "Undefined Instruction",
            ThreadFault::PrefetchAbort => "Prefetch Abort",
            ThreadFault::DataAbort => "Data Abort",
            ThreadFault::UnknownSyscall(_) => "Supervisor Call",
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::NotInitialized => write!(f, "scheduler not initialized"),
            SpawnError::TableFull => write!(f, "thread table is full"),
            SpawnError::ArgumentsTooLarge { len, limit } => {
                write!(f, "argument block of {len} bytes exceeds stack budget of {limit} bytes")
            }
        }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::AlreadyInitialized => write!(f, "kernel already initialized"),
        }
    }
}

impl fmt::Display for ThreadFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadFault::UnknownSyscall(id) => write!(f, "unknown syscall {id}"),
            other => f.write_str(other.name()),
        }
    }
}

impl fmt::Display for KernelFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelFault::PrivilegedSyscall => write!(f, "syscall from privileged mode"),
            KernelFault::PrivilegedException(fault) => {
                write!(f, "{fault} in privileged mode")
            }
            KernelFault::IdleFault(fault) => write!(f, "{fault} in idle thread"),
            KernelFault::SchedulerBusy => write!(f, "scheduler re-entered from trap"),
            KernelFault::NotStarted => write!(f, "trap before scheduler initialization"),
            KernelFault::Halted => write!(f, "kernel already halted"),
        }
    }
}
