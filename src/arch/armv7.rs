//! ARMv7-A (32-bit) architecture implementation.
//!
//! Interrupt masking, halting, fault register access, the first context
//! restore and the two user-mode entry points every thread starts in.

use super::frame::{OFFSET_PC, OFFSET_PSR, OFFSET_SP_USR};
use super::{Arch, ContextFrame, FaultRegisters};
use crate::errors::ThreadFault;
use crate::syscall::user;
use core::arch::{asm, naked_asm};

/// The Cortex-A7 of the BCM2836 in AArch32 state.
pub struct Armv7Arch;

/// CPSR I bit.
const CPSR_IRQ_DISABLED: u32 = 1 << 7;

impl Arch for Armv7Arch {
    fn enable_interrupts() {
        unsafe { asm!("cpsie i", options(nomem, nostack)) }
    }

    fn disable_interrupts() {
        unsafe { asm!("cpsid i", options(nomem, nostack)) }
    }

    fn interrupts_enabled() -> bool {
        let cpsr: u32;
        unsafe { asm!("mrs {}, cpsr", out(reg) cpsr, options(nomem, nostack)) }
        cpsr & CPSR_IRQ_DISABLED == 0
    }

    fn halt() -> ! {
        unsafe { asm!("cpsid if", options(nomem, nostack)) }
        loop {
            unsafe { asm!("wfi", options(nomem, nostack)) }
        }
    }

    unsafe fn first_context_restore(frame: &ContextFrame) -> ! {
        // SAFETY: caller guarantees a privileged mode with IRQs masked and a
        // scheduler-built frame. `movs pc, lr` copies SPSR into CPSR.
        unsafe {
            asm!(
                "ldr r1, [r0, #{psr}]",
                "msr spsr_cxsf, r1",
                "ldr lr, [r0, #{resume}]",
                "add r1, r0, #{sp_usr}",
                "ldmia r1, {{sp, lr}}^",
                "nop",
                "ldmia r0, {{r0-r12}}",
                "movs pc, lr",
                psr = const OFFSET_PSR,
                resume = const OFFSET_PC,
                sp_usr = const OFFSET_SP_USR,
                in("r0") frame as *const ContextFrame,
                options(noreturn),
            )
        }
    }

    fn idle_entry() -> u32 {
        idle_loop as usize as u32
    }

    fn thread_entry() -> u32 {
        thread_trampoline as usize as u32
    }

    fn fault_registers(fault: ThreadFault) -> FaultRegisters {
        match fault {
            ThreadFault::DataAbort => FaultRegisters {
                status: read_dfsr(),
                address: read_dfar(),
            },
            ThreadFault::PrefetchAbort => FaultRegisters {
                status: read_ifsr(),
                address: read_ifar(),
            },
            _ => FaultRegisters::default(),
        }
    }
}

fn read_dfsr() -> u32 {
    let value: u32;
    unsafe { asm!("mrc p15, 0, {}, c5, c0, 0", out(reg) value, options(nomem, nostack)) }
    value
}

fn read_dfar() -> u32 {
    let value: u32;
    unsafe { asm!("mrc p15, 0, {}, c6, c0, 0", out(reg) value, options(nomem, nostack)) }
    value
}

fn read_ifsr() -> u32 {
    let value: u32;
    unsafe { asm!("mrc p15, 0, {}, c5, c0, 1", out(reg) value, options(nomem, nostack)) }
    value
}

fn read_ifar() -> u32 {
    let value: u32;
    unsafe { asm!("mrc p15, 0, {}, c6, c0, 2", out(reg) value, options(nomem, nostack)) }
    value
}

/// Idle thread body. Runs in User mode; `wfi` is allowed there on ARMv7.
#[unsafe(naked)]
extern "C" fn idle_loop() -> ! {
    naked_asm!("1:", "wfi", "b 1b");
}

/// First code every thread runs: call `entry(arg)`, then exit.
extern "C" fn thread_trampoline(entry: extern "C" fn(*mut u8), arg: *mut u8) -> ! {
    entry(arg);
    user::exit()
}
