//! BCM2836 legacy (ARM side) interrupt controller.
//!
//! Pending and enable registers come in pairs: bank 1 covers GPU sources
//! 0-31 (the system timer channels), bank 2 covers 32-63 (the PL011 is 57).

use super::bcm2836::PERIPHERAL_BASE;
use super::InterruptController;
use core::ptr::{read_volatile, write_volatile};

const IRQ_BASE: usize = PERIPHERAL_BASE + 0xB200;
const IRQ_PENDING_1: usize = IRQ_BASE + 0x04;
const IRQ_PENDING_2: usize = IRQ_BASE + 0x08;
const IRQ_ENABLE_1: usize = IRQ_BASE + 0x10;
const IRQ_ENABLE_2: usize = IRQ_BASE + 0x14;
const IRQ_DISABLE_1: usize = IRQ_BASE + 0x1C;
const IRQ_DISABLE_2: usize = IRQ_BASE + 0x20;

/// GPU interrupt source number of the PL011 UART.
pub const UART_IRQ: u32 = 57;

/// Bit of `UART_IRQ` in the second bank.
const UART_BIT: u32 = 1 << (UART_IRQ - 32);

/// Interrupt controller with the system timer channel the kernel uses.
pub struct LegacyIrqController {
    timer_channel: u32,
}

impl LegacyIrqController {
    /// Controller routing system timer channel `timer_channel`.
    pub const fn new(timer_channel: u32) -> Self {
        Self { timer_channel }
    }

    fn timer_bit(&self) -> u32 {
        1 << self.timer_channel
    }

    /// Stop routing the timer channel.
    pub fn disable_timer(&self) {
        unsafe { write_volatile(IRQ_DISABLE_1 as *mut u32, self.timer_bit()) }
    }

    /// Stop routing the UART.
    pub fn disable_uart(&self) {
        unsafe { write_volatile(IRQ_DISABLE_2 as *mut u32, UART_BIT) }
    }
}

impl InterruptController for LegacyIrqController {
    fn timer_pending(&self) -> bool {
        unsafe { read_volatile(IRQ_PENDING_1 as *const u32) & self.timer_bit() != 0 }
    }

    fn uart_pending(&self) -> bool {
        unsafe { read_volatile(IRQ_PENDING_2 as *const u32) & UART_BIT != 0 }
    }

    fn enable_timer(&self) {
        // Enable registers are write-one-to-set.
        unsafe { write_volatile(IRQ_ENABLE_1 as *mut u32, self.timer_bit()) }
    }

    fn enable_uart(&self) {
        unsafe { write_volatile(IRQ_ENABLE_2 as *mut u32, UART_BIT) }
    }
}
