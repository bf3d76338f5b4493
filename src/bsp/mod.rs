//! Board support: the peripherals the kernel core talks to.
//!
//! The scheduler and entry layer only see the traits below. The BCM2836
//! implementations drive the real registers; tests substitute mocks.

pub mod bcm2836;
pub mod gpio;
pub mod irq;
pub mod pl011;
pub mod systimer;

pub use bcm2836::Bcm2836;

/// Serial console with a software receive buffer.
pub trait Console {
    /// Transmit one byte, waiting while the transmit FIFO is full.
    fn putc(&self, byte: u8);

    /// Take the oldest buffered byte, if any. Never blocks.
    fn try_getc(&self) -> Option<u8>;

    /// Whether the receive interrupt is asserted.
    fn rx_pending(&self) -> bool;

    /// Move bytes from the hardware FIFO into the software buffer until the
    /// FIFO is empty or the buffer is full.
    fn drain_rx(&self);

    /// Clear every pending UART interrupt.
    fn clear_interrupts(&self);
}

/// Periodic preemption timer.
pub trait PreemptTimer {
    /// Clear the pending compare match.
    fn acknowledge(&self);

    /// Schedule the next compare match one preemption window from now.
    fn rearm(&self);
}

/// Interrupt controller view limited to the kernel's two sources.
pub trait InterruptController {
    /// Whether the preemption timer channel has a pending interrupt.
    fn timer_pending(&self) -> bool;

    /// Whether the UART has a pending interrupt.
    fn uart_pending(&self) -> bool;

    /// Route the preemption timer channel to the CPU.
    fn enable_timer(&self);

    /// Route the UART to the CPU.
    fn enable_uart(&self);
}

/// A complete board: console, timer and interrupt controller.
pub trait Board {
    /// Console implementation.
    type Console: Console;
    /// Preemption timer implementation.
    type Timer: PreemptTimer;
    /// Interrupt controller implementation.
    type Irq: InterruptController;

    /// Bring the peripherals up and unmask their interrupt sources.
    ///
    /// Called once, before the first thread runs and with IRQs masked.
    fn init(&self);

    /// The console.
    fn console(&self) -> &Self::Console;

    /// The preemption timer.
    fn timer(&self) -> &Self::Timer;

    /// The interrupt controller.
    fn irq(&self) -> &Self::Irq;
}
