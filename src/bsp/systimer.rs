//! BCM2836 system timer (free running 1 MHz counter with four compare
//! channels).

use super::bcm2836::PERIPHERAL_BASE;
use super::PreemptTimer;
use core::ptr::{read_volatile, write_volatile};

const SYSTIMER_BASE: usize = PERIPHERAL_BASE + 0x3000;
const SYSTIMER_CS: usize = SYSTIMER_BASE + 0x00; // Control/status (match flags)
const SYSTIMER_CLO: usize = SYSTIMER_BASE + 0x04; // Counter, lower 32 bits
const SYSTIMER_C0: usize = SYSTIMER_BASE + 0x0C; // Compare 0, C1..C3 follow

/// Number of compare channels.
pub const CHANNELS: u32 = 4;

/// One compare channel driven as a periodic preemption source.
pub struct SystemTimer {
    channel: u32,
    interval: u32,
}

impl SystemTimer {
    /// Timer on compare `channel` firing every `interval` microseconds.
    pub const fn new(channel: u32, interval: u32) -> Self {
        Self { channel, interval }
    }

    fn valid(&self) -> bool {
        self.channel < CHANNELS
    }

    fn compare_register(&self) -> usize {
        SYSTIMER_C0 + self.channel as usize * 4
    }

    /// Lower 32 bits of the free running counter.
    pub fn now(&self) -> u32 {
        unsafe { read_volatile(SYSTIMER_CLO as *const u32) }
    }
}

impl PreemptTimer for SystemTimer {
    fn acknowledge(&self) {
        if !self.valid() {
            return;
        }
        // Match flags are write-one-to-clear.
        unsafe { write_volatile(SYSTIMER_CS as *mut u32, 1 << self.channel) }
    }

    fn rearm(&self) {
        if !self.valid() {
            return;
        }
        let deadline = self.now().wrapping_add(self.interval);
        unsafe { write_volatile(self.compare_register() as *mut u32, deadline) }
    }
}
