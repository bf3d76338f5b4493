//! Test helper utilities: a scripted board and kernel/scheduler setup.

use crate::arch::NoOpArch;
use crate::bsp::{Board, Console, InterruptController, PreemptTimer};
use crate::config::UART_RX_BUFFER_SIZE;
use crate::kernel::Kernel;
use crate::mem::StackPool;
use crate::sched::{EntryPoints, RoundRobinScheduler};
use core::cell::{Cell, RefCell};
use std::boxed::Box;
use std::collections::VecDeque;
use std::vec::Vec;

/// Console that records output and serves input from two queues: `fifo`
/// stands in for the hardware FIFO, `ring` for the software buffer.
#[derive(Default)]
pub struct MockConsole {
    pub output: RefCell<Vec<u8>>,
    pub fifo: RefCell<VecDeque<u8>>,
    pub ring: RefCell<VecDeque<u8>>,
    pub rx_irq: Cell<bool>,
    pub clears: Cell<usize>,
}

impl MockConsole {
    /// Bytes arriving at the hardware FIFO.
    pub fn receive(&self, bytes: &[u8]) {
        self.fifo.borrow_mut().extend(bytes.iter().copied());
        self.rx_irq.set(true);
    }

    /// Bytes already sitting in the software buffer.
    pub fn buffer(&self, bytes: &[u8]) {
        self.ring.borrow_mut().extend(bytes.iter().copied());
    }

    pub fn output(&self) -> Vec<u8> {
        self.output.borrow().clone()
    }
}

impl Console for MockConsole {
    fn putc(&self, byte: u8) {
        self.output.borrow_mut().push(byte);
    }

    fn try_getc(&self) -> Option<u8> {
        self.ring.borrow_mut().pop_front()
    }

    fn rx_pending(&self) -> bool {
        self.rx_irq.get()
    }

    fn drain_rx(&self) {
        let mut fifo = self.fifo.borrow_mut();
        let mut ring = self.ring.borrow_mut();
        while ring.len() < UART_RX_BUFFER_SIZE {
            match fifo.pop_front() {
                Some(byte) => ring.push_back(byte),
                None => break,
            }
        }
    }

    fn clear_interrupts(&self) {
        self.rx_irq.set(false);
        self.clears.set(self.clears.get() + 1);
    }
}

/// Timer that counts acknowledgements and re-arms.
#[derive(Default)]
pub struct MockTimer {
    pub acks: Cell<usize>,
    pub rearms: Cell<usize>,
}

impl PreemptTimer for MockTimer {
    fn acknowledge(&self) {
        self.acks.set(self.acks.get() + 1);
    }

    fn rearm(&self) {
        self.rearms.set(self.rearms.get() + 1);
    }
}

/// Interrupt controller with settable pending lines.
#[derive(Default)]
pub struct MockIrq {
    pub timer: Cell<bool>,
    pub uart: Cell<bool>,
    pub timer_enabled: Cell<bool>,
    pub uart_enabled: Cell<bool>,
}

impl InterruptController for MockIrq {
    fn timer_pending(&self) -> bool {
        self.timer.get()
    }

    fn uart_pending(&self) -> bool {
        self.uart.get()
    }

    fn enable_timer(&self) {
        self.timer_enabled.set(true);
    }

    fn enable_uart(&self) {
        self.uart_enabled.set(true);
    }
}

#[derive(Default)]
pub struct MockBoard {
    pub console: MockConsole,
    pub timer: MockTimer,
    pub irq: MockIrq,
    pub inits: Cell<usize>,
}

impl MockBoard {
    /// Raise the timer interrupt line. The kernel acknowledges through the
    /// timer; the mock drops the line on the next `lower_all`.
    pub fn raise_timer(&self) {
        self.irq.timer.set(true);
    }

    /// Raise the UART interrupt line with `bytes` in the hardware FIFO.
    pub fn raise_uart(&self, bytes: &[u8]) {
        self.console.receive(bytes);
        self.irq.uart.set(true);
    }

    pub fn lower_all(&self) {
        self.irq.timer.set(false);
        self.irq.uart.set(false);
    }
}

impl Board for MockBoard {
    type Console = MockConsole;
    type Timer = MockTimer;
    type Irq = MockIrq;

    fn init(&self) {
        self.inits.set(self.inits.get() + 1);
        self.irq.enable_uart();
        self.irq.enable_timer();
    }

    fn console(&self) -> &MockConsole {
        &self.console
    }

    fn timer(&self) -> &MockTimer {
        &self.timer
    }

    fn irq(&self) -> &MockIrq {
        &self.irq
    }
}

pub type TestKernel = Kernel<NoOpArch, MockBoard>;

/// A fresh stack pool that lives for the rest of the test binary.
pub fn leaked_stacks() -> &'static mut StackPool {
    Box::leak(Box::new(StackPool::new()))
}

pub const ENTRY_POINTS: EntryPoints = EntryPoints {
    idle: NoOpArch::IDLE_ENTRY,
    thread: NoOpArch::THREAD_ENTRY,
};

/// An initialized scheduler with nothing but idle.
pub fn scheduler() -> Box<RoundRobinScheduler> {
    let mut sched = Box::new(RoundRobinScheduler::new());
    sched
        .init(leaked_stacks(), ENTRY_POINTS)
        .expect("fresh scheduler");
    sched
}

/// An initialized kernel on a mock board.
pub fn kernel() -> Box<TestKernel> {
    let kernel = Box::new(Kernel::new(MockBoard::default()));
    kernel.init(leaked_stacks()).expect("fresh kernel");
    kernel
}

/// Fake start function addresses, distinct per thread.
pub fn entry(n: u32) -> u32 {
    0x0001_0000 + n * 0x100
}

/// First fake address handed out by [`map_user_block`].
const USER_WINDOW_BASE: u32 = 0x4000_0000;

std::thread_local! {
    static USER_BLOCKS: RefCell<Vec<(u32, &'static [u8])>> = const { RefCell::new(Vec::new()) };
}

/// Place `bytes` in a fake thread address space and return its 32-bit
/// address. Host pointers do not fit in a syscall argument register.
pub fn map_user_block(bytes: &[u8]) -> u32 {
    let block: &'static [u8] = Box::leak(bytes.to_vec().into_boxed_slice());
    USER_BLOCKS.with(|blocks| {
        let mut blocks = blocks.borrow_mut();
        let addr = USER_WINDOW_BASE + blocks.len() as u32 * 0x1_0000;
        blocks.push((addr, block));
        addr
    })
}

/// Resolve `len` bytes at an address from [`map_user_block`].
pub fn user_block(addr: u32, len: usize) -> &'static [u8] {
    USER_BLOCKS.with(|blocks| {
        let &(base, block) = blocks
            .borrow()
            .iter()
            .find(|&&(base, block)| addr >= base && ((addr - base) as usize) < block.len())
            .expect("unmapped thread address");
        let start = (addr - base) as usize;
        &block[start..start + len]
    })
}
