//! Syscall wrappers for code running in User mode.

use super::Sysnum;
use core::arch::asm;

#[inline(always)]
fn invoke(id: Sysnum, arg0: u32, arg1: u32, arg2: u32) -> u32 {
    let mut r0 = id as u32;
    // SAFETY: `svc` traps into the kernel, which preserves every register
    // except r0.
    unsafe {
        asm!(
            "svc #0",
            inout("r0") r0,
            in("r1") arg0,
            in("r2") arg1,
            in("r3") arg2,
            options(nostack),
        );
    }
    r0
}

/// Terminate the calling thread.
pub fn exit() -> ! {
    invoke(Sysnum::Exit, 0, 0, 0);
    // The kernel never resumes an exited thread.
    loop {
        core::hint::spin_loop();
    }
}

/// Write one byte to the console.
pub fn putc(byte: u8) {
    invoke(Sysnum::Putc, u32::from(byte), 0, 0);
}

/// Read one byte from the console, blocking until one arrives.
pub fn getc() -> u8 {
    invoke(Sysnum::Getc, 0, 0, 0) as u8
}

/// Start a thread running `entry` with a copy of `args`.
///
/// Returns `false` if the thread table is full or `args` is too large.
pub fn create_thread(entry: extern "C" fn(*mut u8), args: &[u8]) -> bool {
    invoke(
        Sysnum::CreateThread,
        entry as usize as u32,
        args.as_ptr() as usize as u32,
        args.len() as u32,
    ) == 0
}

/// Sleep for at least `ticks` preemption ticks.
pub fn sleep(ticks: u32) {
    invoke(Sysnum::Sleep, ticks, 0, 0);
}

/// Issue the reserved syscall id. The kernel terminates the caller.
pub fn undefined() {
    invoke(Sysnum::Undefined, 0, 0, 0);
}
