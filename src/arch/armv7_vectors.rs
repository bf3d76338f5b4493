//! ARMv7-A exception vector table and trap trampolines.
//!
//! The table holds eight branch instructions and is installed through VBAR.
//! Every used entry branches to a stub that:
//!
//! 1. turns the banked `lr` into the address the thread should resume at
//!    (IRQ: `lr - 4`, SVC/undefined/prefetch: address of the trapping
//!    instruction, data abort: `lr - 8`);
//! 2. builds a [`ContextFrame`] on the mode stack from `r0-r12`, the user
//!    bank `sp`/`lr`, the resume address and `SPSR`;
//! 3. calls the matching kernel entry with a pointer to that frame;
//! 4. restores whatever the frame holds afterwards and returns with
//!    `movs pc, lr`, which is where a context switch takes effect.
//!
//! Reset and FIQ are never expected and spin in place.

use super::armv7::Armv7Arch;
use super::frame::{OFFSET_PC, OFFSET_PSR, OFFSET_SP_USR};
use super::ContextFrame;
use crate::bsp::Bcm2836;
use crate::errors::ThreadFault;
use crate::kernel::Kernel;
use core::arch::{asm, global_asm, naked_asm};

/// Stack space a stub reserves for its frame. The frame is 68 bytes; the
/// extra word keeps the mode stack 8-byte aligned for the call.
const TRAP_FRAME_SIZE: usize = 72;

static_assertions::const_assert!(TRAP_FRAME_SIZE >= super::frame::FRAME_SIZE);
static_assertions::const_assert_eq!(TRAP_FRAME_SIZE % 8, 0);

/// The kernel instance all traps are routed to.
pub static KERNEL: Kernel<Armv7Arch, Bcm2836> = Kernel::new(Bcm2836::new());

global_asm!(
    ".pushsection .text.vectors, \"ax\"",
    ".balign 32",
    ".global _vectors",
    "_vectors:",
    "b .",            // reset
    "b {undef}",      // undefined instruction
    "b {svc}",        // supervisor call
    "b {prefetch}",   // prefetch abort
    "b {data}",       // data abort
    "b .",            // reserved
    "b {irq}",        // IRQ
    "b .",            // FIQ
    ".popsection",
    undef = sym undef_stub,
    svc = sym svc_stub,
    prefetch = sym prefetch_stub,
    data = sym data_abort_stub,
    irq = sym irq_stub,
);

/// Generate a trap stub. `$adjust` is subtracted from the banked `lr`.
macro_rules! trap_stub {
    ($name:ident, $adjust:literal, $entry:ident) => {
        #[unsafe(naked)]
        unsafe extern "C" fn $name() {
            naked_asm!(
                concat!("sub lr, lr, #", $adjust),
                "sub sp, sp, #{size}",
                "stmia sp, {{r0-r12}}",
                "add r0, sp, #{sp_usr}",
                "stmia r0, {{sp, lr}}^",
                "str lr, [sp, #{resume}]",
                "mrs r1, spsr",
                "str r1, [sp, #{psr}]",
                "mov r0, sp",
                "bl {entry}",
                "ldr r1, [sp, #{psr}]",
                "msr spsr_cxsf, r1",
                "ldr lr, [sp, #{resume}]",
                "add r0, sp, #{sp_usr}",
                "ldmia r0, {{sp, lr}}^",
                "nop",
                "ldmia sp, {{r0-r12}}",
                "add sp, sp, #{size}",
                "movs pc, lr",
                size = const TRAP_FRAME_SIZE,
                sp_usr = const OFFSET_SP_USR,
                resume = const OFFSET_PC,
                psr = const OFFSET_PSR,
                entry = sym $entry,
            );
        }
    };
}

trap_stub!(undef_stub, 4, kernel_undef_entry);
trap_stub!(svc_stub, 4, kernel_syscall_entry);
trap_stub!(prefetch_stub, 4, kernel_prefetch_entry);
trap_stub!(data_abort_stub, 8, kernel_data_abort_entry);
trap_stub!(irq_stub, 4, kernel_irq_entry);

extern "C" fn kernel_syscall_entry(frame: &mut ContextFrame) {
    KERNEL.on_syscall(frame).resolve::<Armv7Arch>();
}

extern "C" fn kernel_irq_entry(frame: &mut ContextFrame) {
    KERNEL.on_irq(frame).resolve::<Armv7Arch>();
}

extern "C" fn kernel_undef_entry(frame: &mut ContextFrame) {
    KERNEL
        .on_fault(ThreadFault::UndefinedInstruction, frame)
        .resolve::<Armv7Arch>();
}

extern "C" fn kernel_prefetch_entry(frame: &mut ContextFrame) {
    KERNEL
        .on_fault(ThreadFault::PrefetchAbort, frame)
        .resolve::<Armv7Arch>();
}

extern "C" fn kernel_data_abort_entry(frame: &mut ContextFrame) {
    KERNEL
        .on_fault(ThreadFault::DataAbort, frame)
        .resolve::<Armv7Arch>();
}

/// Point VBAR at the vector table.
///
/// # Safety
///
/// Must run in a privileged mode with the mode stacks already set up.
pub unsafe fn install_vector_table() {
    extern "C" {
        static _vectors: u8;
    }
    unsafe {
        let base = core::ptr::addr_of!(_vectors) as usize as u32;
        asm!(
            "mcr p15, 0, {}, c12, c0, 0",
            "isb",
            in(reg) base,
            options(nostack),
        );
    }
}
