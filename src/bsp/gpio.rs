//! GPIO function selection.

use super::bcm2836::PERIPHERAL_BASE;
use core::ptr::{read_volatile, write_volatile};

const GPIO_BASE: usize = PERIPHERAL_BASE + 0x20_0000;
const GPFSEL0: usize = GPIO_BASE + 0x00; // Function select 0 (pins 0-9)

/// Number of pins the function select registers cover.
pub const PIN_COUNT: u32 = 54;

/// Pin function, with the 3-bit encoding the GPFSEL registers use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Function {
    Input = 0b000,
    Output = 0b001,
    Alt0 = 0b100,
    Alt1 = 0b101,
    Alt2 = 0b110,
    Alt3 = 0b111,
    Alt4 = 0b011,
    Alt5 = 0b010,
}

/// Compute the new value of a function select register after setting
/// `pin` to `function`. Other pins in the register keep their bits.
pub fn fsel_value(current: u32, pin: u32, function: Function) -> u32 {
    let shift = (pin % 10) * 3;
    (current & !(0b111 << shift)) | ((function as u32) << shift)
}

/// Byte offset of the function select register holding `pin`.
fn fsel_register(pin: u32) -> usize {
    GPFSEL0 + (pin / 10) as usize * 4
}

/// Select `function` for `pin`. Out of range pins are ignored.
///
/// # Safety
///
/// Performs MMIO on the BCM2836 GPIO block.
pub unsafe fn set_function(pin: u32, function: Function) {
    if pin >= PIN_COUNT {
        return;
    }
    let reg = fsel_register(pin);
    unsafe {
        let current = read_volatile(reg as *const u32);
        write_volatile(reg as *mut u32, fsel_value(current, pin, function));
    }
}
