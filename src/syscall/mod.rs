//! Syscall decoding and dispatch.
//!
//! A thread traps with `svc #0`, the syscall id in `r0` and up to three
//! arguments in `r1..r3`. The dispatcher works on the trap snapshot and
//! reports what the entry layer has to do next through a [`SyscallOutcome`];
//! it never touches the snapshot itself.

use crate::arch::ContextFrame;
use crate::bsp::Console;
use crate::config::MAX_ARG_BYTES;
use crate::errors::SpawnError;
use crate::sched::RoundRobinScheduler;

#[cfg(target_arch = "arm")]
pub mod user;

/// Syscall numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Sysnum {
    Exit = 0,
    Putc = 1,
    Getc = 2,
    CreateThread = 3,
    Sleep = 4,
    /// Reserved. Never handled; issuing it is treated as a bad syscall.
    Undefined = 5,
}

impl TryFrom<u32> for Sysnum {
    type Error = ();

    fn try_from(x: u32) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(Self::Exit),
            1 => Ok(Self::Putc),
            2 => Ok(Self::Getc),
            3 => Ok(Self::CreateThread),
            4 => Ok(Self::Sleep),
            5 => Ok(Self::Undefined),
            _ => Err(()),
        }
    }
}

/// What the entry layer must do after a syscall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallOutcome {
    /// Return value for the caller's `r0`. Meaningful only if `handled`.
    pub value: u32,
    /// False for unknown or unserviceable ids.
    pub handled: bool,
    /// Whether a scheduling decision is required before returning.
    pub reschedule: bool,
    /// Whether the caller resumes after its `svc` instruction.
    pub advance_pc: bool,
}

impl SyscallOutcome {
    /// A serviced syscall.
    pub const fn done(value: u32, reschedule: bool, advance_pc: bool) -> Self {
        Self {
            value,
            handled: true,
            reschedule,
            advance_pc,
        }
    }

    /// A syscall the kernel refuses to service.
    pub const fn unhandled() -> Self {
        Self {
            value: 0,
            handled: false,
            reschedule: true,
            advance_pc: false,
        }
    }
}

/// Service the syscall described by `frame` on behalf of the current thread.
///
/// `frame` must already be saved as the current thread's context.
pub fn dispatch<C: Console>(
    sched: &mut RoundRobinScheduler,
    console: &C,
    frame: &ContextFrame,
) -> SyscallOutcome {
    match Sysnum::try_from(frame.syscall_id()) {
        Ok(Sysnum::Exit) => exit(sched),
        Ok(Sysnum::Putc) => putc(console, frame),
        Ok(Sysnum::Getc) => getc(sched, console),
        Ok(Sysnum::CreateThread) => create_thread(sched, frame),
        Ok(Sysnum::Sleep) => sleep(sched, frame),
        Ok(Sysnum::Undefined) | Err(()) => SyscallOutcome::unhandled(),
    }
}

fn exit(sched: &mut RoundRobinScheduler) -> SyscallOutcome {
    sched.terminate_current();
    // The caller is gone, nothing to resume.
    SyscallOutcome::done(0, true, false)
}

fn putc<C: Console>(console: &C, frame: &ContextFrame) -> SyscallOutcome {
    console.putc((frame.arg0() & 0xFF) as u8);
    SyscallOutcome::done(0, false, true)
}

fn getc<C: Console>(sched: &mut RoundRobinScheduler, console: &C) -> SyscallOutcome {
    if let Some(byte) = console.try_getc() {
        return SyscallOutcome::done(u32::from(byte), false, true);
    }

    if !sched.block_current_on_input() {
        return SyscallOutcome::unhandled();
    }

    // The real value is written into the saved context on wake-up.
    SyscallOutcome::done(0, true, true)
}

fn create_thread(sched: &mut RoundRobinScheduler, frame: &ContextFrame) -> SyscallOutcome {
    let entry = frame.arg0();
    let ptr = frame.arg1();
    let len = frame.arg2() as usize;

    // Checked before the user pointer is turned into a slice.
    let result = if len > MAX_ARG_BYTES {
        Err(SpawnError::ArgumentsTooLarge {
            len,
            limit: MAX_ARG_BYTES,
        })
    } else if ptr == 0 || len == 0 {
        sched.create_thread(entry, &[])
    } else {
        // SAFETY: threads share the kernel's flat address space and the
        // block is copied before the caller runs again.
        let args = unsafe { user_block(ptr, len) };
        sched.create_thread(entry, args)
    };

    match result {
        Ok(_) => SyscallOutcome::done(0, false, true),
        Err(err) => {
            kprintln!("create_thread failed: {}", err);
            SyscallOutcome::done(1, false, true)
        }
    }
}

/// `len` bytes of thread memory at `addr`.
///
/// # Safety
///
/// `addr..addr + len` must be readable for the lifetime of the slice.
#[cfg(not(test))]
unsafe fn user_block<'a>(addr: u32, len: usize) -> &'a [u8] {
    unsafe { core::slice::from_raw_parts(addr as usize as *const u8, len) }
}

#[cfg(test)]
unsafe fn user_block<'a>(addr: u32, len: usize) -> &'a [u8] {
    crate::tests::helpers::user_block(addr, len)
}

fn sleep(sched: &mut RoundRobinScheduler, frame: &ContextFrame) -> SyscallOutcome {
    sched.sleep_current(frame.arg0());
    SyscallOutcome::done(0, true, true)
}
