//! PL011 UART driver.
//!
//! Transmission is synchronous. Reception is interrupt driven: the IRQ
//! handler drains the hardware FIFO into a software ring that syscalls read
//! without blocking.
//!
//! # Memory Map
//!
//! Peripheral base for BCM2836: 0x3F000000
//! - PL011 UART base: 0x3F201000

use super::bcm2836::PERIPHERAL_BASE;
use super::gpio::{self, Function};
use super::Console;
use crate::config::UART_RX_BUFFER_SIZE;
use core::fmt::{self, Write};
use core::ptr::{read_volatile, write_volatile};
use heapless::Deque;

// PL011 UART registers
const UART0_BASE: usize = PERIPHERAL_BASE + 0x20_1000;
const UART0_DR: usize = UART0_BASE + 0x00; // Data Register
const UART0_FR: usize = UART0_BASE + 0x18; // Flag Register
const UART0_LCRH: usize = UART0_BASE + 0x2C; // Line Control Register
const UART0_CR: usize = UART0_BASE + 0x30; // Control Register
const UART0_IFLS: usize = UART0_BASE + 0x34; // FIFO Level Select
const UART0_IMSC: usize = UART0_BASE + 0x38; // Interrupt Mask Set/Clear
const UART0_MIS: usize = UART0_BASE + 0x40; // Masked Interrupt Status
const UART0_ICR: usize = UART0_BASE + 0x44; // Interrupt Clear Register

// Flag register bits
const FR_BUSY: u32 = 1 << 3; // Transmitting
const FR_RXFE: u32 = 1 << 4; // Receive FIFO empty
const FR_TXFF: u32 = 1 << 5; // Transmit FIFO full

const LCRH_FEN: u32 = 1 << 4; // FIFO enable
const CR_UARTEN: u32 = 1 << 0;
const CR_TXE: u32 = 1 << 8;
const CR_RXE: u32 = 1 << 9;
const INT_RX: u32 = 1 << 4; // Receive interrupt (IMSC/MIS bit)
const ICR_ALL: u32 = 0x7FF;
const IFLS_RX_HALF: u32 = 0b010 << 3;

/// Bytes received but not yet read by a thread.
pub type RxRing = Deque<u8, UART_RX_BUFFER_SIZE>;

/// Move bytes from `next_byte` into `ring` until the source runs dry or the
/// ring is full. Bytes that do not fit stay in the source.
pub fn fill_ring(ring: &mut RxRing, mut next_byte: impl FnMut() -> Option<u8>) {
    while !ring.is_full() {
        match next_byte() {
            Some(byte) => {
                // Cannot fail, the ring was checked above.
                let _ = ring.push_back(byte);
            }
            None => break,
        }
    }
}

#[inline]
fn read_reg(reg: usize) -> u32 {
    unsafe { read_volatile(reg as *const u32) }
}

#[inline]
fn write_reg(reg: usize, value: u32) {
    unsafe { write_volatile(reg as *mut u32, value) }
}

/// Transmit a single byte, spinning while the FIFO is full.
pub fn send_byte(byte: u8) {
    while read_reg(UART0_FR) & FR_TXFF != 0 {
        core::hint::spin_loop();
    }
    write_reg(UART0_DR, byte as u32);
}

/// Transmit a string.
pub fn send_str(s: &str) {
    for byte in s.bytes() {
        send_byte(byte);
    }
}

/// Global UART writer for use with `write!` macro.
pub struct UartWriter;

impl Write for UartWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        send_str(s);
        Ok(())
    }
}

/// PL011 UART0 with its software receive ring.
pub struct Pl011 {
    rx: spin::Mutex<RxRing>,
}

impl Pl011 {
    /// Driver with an empty receive ring. Does not touch the hardware.
    pub const fn new() -> Self {
        Self {
            rx: spin::Mutex::new(Deque::new()),
        }
    }

    /// Route GPIO14/15 to the UART, configure FIFOs and enable RX and TX.
    ///
    /// # Safety
    ///
    /// Must be called once during system initialization.
    /// Modifies GPIO and UART hardware registers.
    pub unsafe fn init(&self) {
        unsafe {
            gpio::set_function(14, Function::Alt0); // TXD0
            gpio::set_function(15, Function::Alt0); // RXD0
        }

        // Disable and let the transmitter drain before reconfiguring
        write_reg(UART0_CR, read_reg(UART0_CR) & !CR_UARTEN);
        while read_reg(UART0_FR) & FR_BUSY != 0 {
            core::hint::spin_loop();
        }

        write_reg(UART0_IMSC, 0);
        write_reg(UART0_ICR, ICR_ALL);

        // Toggling FEN flushes the FIFOs
        write_reg(UART0_LCRH, read_reg(UART0_LCRH) & !LCRH_FEN);
        write_reg(UART0_LCRH, read_reg(UART0_LCRH) | LCRH_FEN);
        write_reg(UART0_IFLS, IFLS_RX_HALF);

        write_reg(UART0_CR, read_reg(UART0_CR) | CR_RXE | CR_TXE | CR_UARTEN);
    }

    /// Unmask the receive interrupt.
    pub fn enable_rx_interrupt(&self) {
        write_reg(UART0_IMSC, read_reg(UART0_IMSC) | INT_RX);
    }

    fn read_fifo_byte() -> Option<u8> {
        if read_reg(UART0_FR) & FR_RXFE != 0 {
            None
        } else {
            Some((read_reg(UART0_DR) & 0xFF) as u8)
        }
    }
}

impl Default for Pl011 {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for Pl011 {
    fn putc(&self, byte: u8) {
        send_byte(byte);
    }

    fn try_getc(&self) -> Option<u8> {
        self.rx.lock().pop_front()
    }

    fn rx_pending(&self) -> bool {
        read_reg(UART0_MIS) & INT_RX != 0
    }

    fn drain_rx(&self) {
        fill_ring(&mut self.rx.lock(), Self::read_fifo_byte);
    }

    fn clear_interrupts(&self) {
        write_reg(UART0_ICR, ICR_ALL);
    }
}
