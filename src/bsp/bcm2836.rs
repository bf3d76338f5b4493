//! Raspberry Pi 2 (BCM2836) board.

use super::irq::LegacyIrqController;
use super::pl011::Pl011;
use super::systimer::SystemTimer;
use super::{Board, InterruptController};
use crate::config::{TIMER_CHANNEL, TIMER_INTERVAL_US};

/// Peripheral base as seen from the ARM core.
pub const PERIPHERAL_BASE: usize = 0x3F00_0000;

/// The board's peripherals.
pub struct Bcm2836 {
    uart: Pl011,
    timer: SystemTimer,
    irq: LegacyIrqController,
}

impl Bcm2836 {
    /// Board handle. Hardware is untouched until [`Board::init`].
    pub const fn new() -> Self {
        Self {
            uart: Pl011::new(),
            timer: SystemTimer::new(TIMER_CHANNEL, TIMER_INTERVAL_US),
            irq: LegacyIrqController::new(TIMER_CHANNEL),
        }
    }
}

impl Default for Bcm2836 {
    fn default() -> Self {
        Self::new()
    }
}

impl Board for Bcm2836 {
    type Console = Pl011;
    type Timer = SystemTimer;
    type Irq = LegacyIrqController;

    fn init(&self) {
        // SAFETY: runs once from the boot path, before any thread exists.
        unsafe { self.uart.init() };
        self.uart.enable_rx_interrupt();
        self.irq.enable_uart();
        self.irq.enable_timer();
    }

    fn console(&self) -> &Pl011 {
        &self.uart
    }

    fn timer(&self) -> &SystemTimer {
        &self.timer
    }

    fn irq(&self) -> &LegacyIrqController {
        &self.irq
    }
}
