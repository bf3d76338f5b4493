//! Boot code for the Raspberry Pi 2.
//!
//! This module handles early initialization before the kernel starts:
//! - parking secondary cores
//! - leaving HYP mode if the firmware entered there
//! - stack setup for every exception mode
//! - BSS clearing
//! - vector installation, board and kernel initialization
//!
//! # Memory Layout
//!
//! The firmware loads `kernel7.img` at 0x8000. The linker script must place
//! `.text.boot` first and define `__bss_start` and `__bss_end`.

use super::armv7::Armv7Arch;
use super::armv7_vectors::{install_vector_table, KERNEL};
use super::Arch;
use crate::mem::StackPool;
use core::arch::naked_asm;

/// Stack size for each exception mode.
const MODE_STACK_SIZE: usize = 4096;

/// Stacks for SVC, IRQ, abort and undefined mode, in that order.
#[repr(C, align(8))]
struct ModeStacks([u8; MODE_STACK_SIZE * 4]);

static mut MODE_STACKS: ModeStacks = ModeStacks([0; MODE_STACK_SIZE * 4]);

/// Kernel entry point.
///
/// This is the first code executed after the GPU firmware loads the kernel.
///
/// # Safety
///
/// This function must be the first thing in `.text.boot` section.
#[link_section = ".text.boot"]
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn _start() -> ! {
    naked_asm!(
        ".arch_extension virt",
        // Only core 0 runs the kernel
        "mrc p15, 0, r0, c0, c0, 5",
        "ands r0, r0, #3",
        "bne 3f",

        // HYP (0x1A) -> SVC with IRQ and FIQ masked
        "mrs r0, cpsr",
        "and r1, r0, #0x1F",
        "cmp r1, #0x1A",
        "bne 1f",
        "bic r0, r0, #0x1F",
        "orr r0, r0, #0xD3",
        "msr spsr_hyp, r0",
        "adr r0, 1f",
        "msr elr_hyp, r0",
        "eret",

        "1:",
        "cpsid if",
        "ldr r0, ={stacks}",
        "cps #0x12", // IRQ
        "add sp, r0, #{irq_top}",
        "cps #0x17", // abort
        "add sp, r0, #{abt_top}",
        "cps #0x1B", // undefined
        "add sp, r0, #{und_top}",
        "cps #0x13", // SVC
        "add sp, r0, #{svc_top}",

        // Clear BSS
        "ldr r0, =__bss_start",
        "ldr r1, =__bss_end",
        "mov r2, #0",
        "2:",
        "cmp r0, r1",
        "strlo r2, [r0], #4",
        "blo 2b",

        "b {boot_rust}",

        // Secondary cores wait forever
        "3:",
        "wfe",
        "b 3b",
        stacks = sym MODE_STACKS,
        svc_top = const MODE_STACK_SIZE,
        irq_top = const MODE_STACK_SIZE * 2,
        abt_top = const MODE_STACK_SIZE * 3,
        und_top = const MODE_STACK_SIZE * 4,
        boot_rust = sym boot_rust,
    );
}

/// Rust boot code - called after basic ASM setup, in SVC mode with IRQs
/// masked.
unsafe extern "C" fn boot_rust() -> ! {
    unsafe { install_vector_table() };
    start_kernel()
}

/// Initialize the board and kernel, let the application spawn its threads
/// through `kernel_main`, then run them.
pub fn start_kernel() -> ! {
    let Some(stacks) = StackPool::take() else {
        kprintln!("kernel panic: thread stacks already taken");
        Armv7Arch::halt()
    };
    if let Err(err) = KERNEL.init(stacks) {
        kprintln!("kernel panic: {}", err);
        Armv7Arch::halt();
    }

    extern "Rust" {
        fn kernel_main();
    }
    // SAFETY: provided by the application; runs once with IRQs masked.
    unsafe { kernel_main() };

    KERNEL.start()
}
