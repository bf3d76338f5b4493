//! Compile-time kernel configuration.

/// Capacity of the thread table, including the idle thread in slot 0.
pub const MAX_THREADS: usize = 32;

/// Size in bytes of every thread stack.
pub const STACK_SIZE: usize = 2048;

/// Stack space kept free below a thread's argument block for the trampoline
/// and the entry function's first frames.
pub const ARG_STACK_RESERVE: usize = 256;

/// Largest argument block `create_thread` accepts.
pub const MAX_ARG_BYTES: usize = STACK_SIZE - ARG_STACK_RESERVE;

/// System timer compare channel used for preemption.
///
/// Channels 0 and 2 are claimed by the VideoCore firmware.
pub const TIMER_CHANNEL: u32 = 1;

/// Length of one preemption window, in system timer ticks (1 MHz).
pub const TIMER_INTERVAL_US: u32 = 100_000;

/// Capacity of the software receive ring behind the UART.
pub const UART_RX_BUFFER_SIZE: usize = 128;

static_assertions::const_assert!(MAX_THREADS >= 2);
static_assertions::const_assert!(MAX_THREADS <= u8::MAX as usize);
static_assertions::const_assert_eq!(STACK_SIZE % 8, 0);
static_assertions::const_assert_eq!(ARG_STACK_RESERVE % 8, 0);
static_assertions::const_assert!(ARG_STACK_RESERVE < STACK_SIZE);
