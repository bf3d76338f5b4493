//! Integration tests: whole trap sequences through the kernel entry layer.
//!
//! A "thread" here is just its saved snapshot. Syscalls are simulated by
//! writing the ABI registers into the frame the last trap returned and
//! trapping again with it.

use super::helpers::{entry, kernel, TestKernel};
use crate::arch::{ContextFrame, NoOpArch};
use crate::kernel::TrapAction;
use crate::syscall::Sysnum;
use crate::thread::{ThreadId, ThreadState};

/// Trap with `svc` from the thread whose snapshot is `frame`.
fn syscall(kernel: &TestKernel, frame: &mut ContextFrame, id: Sysnum, args: [u32; 3]) {
    frame.r[0] = id as u32;
    frame.r[1..4].copy_from_slice(&args);
    assert_eq!(kernel.on_syscall(frame), TrapAction::Resume);
}

/// One preemption tick.
fn tick(kernel: &TestKernel, frame: &mut ContextFrame) {
    kernel.board().raise_timer();
    assert_eq!(kernel.on_irq(frame), TrapAction::Resume);
    kernel.board().lower_all();
}

/// Bytes arriving on the UART.
fn input(kernel: &TestKernel, frame: &mut ContextFrame, bytes: &[u8]) {
    kernel.board().raise_uart(bytes);
    assert_eq!(kernel.on_irq(frame), TrapAction::Resume);
    kernel.board().lower_all();
}

fn current(kernel: &TestKernel) -> ThreadId {
    kernel.with_scheduler(|s| s.current())
}

fn state(kernel: &TestKernel, id: ThreadId) -> ThreadState {
    kernel.with_scheduler(|s| s.state(id))
}

fn saved(kernel: &TestKernel, id: ThreadId) -> ContextFrame {
    kernel.with_scheduler(|s| *s.thread(id).context())
}

fn is_idle_frame(frame: &ContextFrame) -> bool {
    frame.pc == NoOpArch::IDLE_ENTRY
}

mod lifecycle_tests {
    use super::*;
    use crate::errors::{InitError, KernelFault};
    use crate::mem::StackPool;
    use std::boxed::Box;

    #[test]
    fn test_init_brings_up_board_once() {
        let kernel = kernel();
        assert!(kernel.is_initialized());
        assert_eq!(kernel.board().inits.get(), 1);
        assert!(kernel.board().irq.timer_enabled.get());
        assert!(kernel.board().irq.uart_enabled.get());

        let again = kernel.init(Box::leak(Box::new(StackPool::new())));
        assert_eq!(again, Err(InitError::AlreadyInitialized));
        assert_eq!(kernel.board().inits.get(), 1);
    }

    #[test]
    fn test_start_before_init_fails() {
        let kernel = Box::new(TestKernel::new(Default::default()));
        assert_eq!(kernel.prepare_start(), Err(KernelFault::NotStarted));
    }

    #[test]
    fn test_start_without_threads_runs_idle() {
        let kernel = kernel();
        let frame = kernel.prepare_start().expect("start");
        assert!(is_idle_frame(&frame));
        assert!(frame.is_from_user());
        assert_eq!(kernel.board().timer.rearms.get(), 1);
    }

    #[test]
    fn test_first_thread_frame() {
        let kernel = kernel();
        let id = kernel.spawn(entry(1), b"abc").expect("spawn");
        let frame = kernel.prepare_start().expect("start");

        assert_eq!(current(&kernel), id);
        assert_eq!(frame.pc, NoOpArch::THREAD_ENTRY);
        assert_eq!(frame.r[0], entry(1));
        assert_eq!(frame.r[1], frame.sp_usr);
        assert!(frame.is_from_user());
    }

    #[test]
    fn test_exit_frees_slot_and_switches() {
        let kernel = kernel();
        let a = kernel.spawn(entry(1), &[]).expect("spawn");
        let b = kernel.spawn(entry(2), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");

        syscall(&kernel, &mut frame, Sysnum::Exit, [0; 3]);
        assert_eq!(state(&kernel, a), ThreadState::Unused);
        assert_eq!(current(&kernel), b);
        assert_eq!(frame.r[0], entry(2));

        syscall(&kernel, &mut frame, Sysnum::Exit, [0; 3]);
        assert!(is_idle_frame(&frame));
        assert_eq!(kernel.stats().live, 0);
        assert_eq!(state(&kernel, b), ThreadState::Unused);
    }

    #[test]
    fn test_create_thread_syscall() {
        let kernel = kernel();
        kernel.spawn(entry(1), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");
        let pc = frame.pc;

        syscall(&kernel, &mut frame, Sysnum::CreateThread, [entry(2), 0, 0]);
        assert_eq!(frame.r[0], 0);
        assert_eq!(frame.pc, pc + 4);
        assert_eq!(kernel.stats().live, 2);

        let limit = crate::config::MAX_ARG_BYTES as u32;
        syscall(&kernel, &mut frame, Sysnum::CreateThread, [entry(3), 0x8000, limit + 1]);
        assert_eq!(frame.r[0], 1);
        assert_eq!(kernel.stats().live, 2);
    }

    #[test]
    fn test_create_thread_syscall_reports_full_table() {
        let kernel = kernel();
        for n in 1..crate::config::MAX_THREADS as u32 {
            kernel.spawn(entry(n), &[]).expect("spawn");
        }
        let mut frame = kernel.prepare_start().expect("start");
        syscall(&kernel, &mut frame, Sysnum::CreateThread, [entry(99), 0, 0]);
        assert_eq!(frame.r[0], 1);
    }
}

mod syscall_tests {
    use super::*;

    #[test]
    fn test_putc_returns_to_caller() {
        let kernel = kernel();
        let a = kernel.spawn(entry(1), &[]).expect("spawn");
        kernel.spawn(entry(2), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");
        let pc = frame.pc;

        syscall(&kernel, &mut frame, Sysnum::Putc, [u32::from(b'x'), 0, 0]);
        assert_eq!(kernel.board().console.output(), b"x");
        assert_eq!(current(&kernel), a);
        assert_eq!(frame.pc, pc + 4);
        assert_eq!(frame.r[0], 0);
    }

    #[test]
    fn test_sleep_wakes_after_ticks() {
        let kernel = kernel();
        let a = kernel.spawn(entry(1), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");

        syscall(&kernel, &mut frame, Sysnum::Sleep, [2, 0, 0]);
        assert_eq!(state(&kernel, a), ThreadState::Sleeping);
        assert!(is_idle_frame(&frame));

        tick(&kernel, &mut frame);
        assert!(is_idle_frame(&frame));
        tick(&kernel, &mut frame);
        assert_eq!(current(&kernel), a);
        assert_eq!(frame.pc, NoOpArch::THREAD_ENTRY + 4);
    }

    #[test]
    fn test_sleep_rearms_timer() {
        let kernel = kernel();
        kernel.spawn(entry(1), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");
        let before = kernel.board().timer.rearms.get();

        syscall(&kernel, &mut frame, Sysnum::Sleep, [1, 0, 0]);
        assert_eq!(kernel.board().timer.rearms.get(), before + 1);
    }

    #[test]
    fn test_unknown_syscall_terminates_caller() {
        let kernel = kernel();
        let a = kernel.spawn(entry(1), &[]).expect("spawn");
        let b = kernel.spawn(entry(2), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");

        syscall(&kernel, &mut frame, Sysnum::Undefined, [0; 3]);
        assert_eq!(state(&kernel, a), ThreadState::Unused);
        assert_eq!(current(&kernel), b);
        assert!(!kernel.is_halted());

        frame.r[0] = 0xDEAD;
        assert_eq!(kernel.on_syscall(&mut frame), TrapAction::Resume);
        assert_eq!(state(&kernel, b), ThreadState::Unused);
        assert!(is_idle_frame(&frame));
    }
}

mod input_tests {
    use super::*;

    #[test]
    fn test_getc_with_buffered_byte() {
        let kernel = kernel();
        let a = kernel.spawn(entry(1), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");

        // No waiter: the byte stays buffered.
        input(&kernel, &mut frame, b"k");
        assert_eq!(kernel.board().console.ring.borrow().len(), 1);

        syscall(&kernel, &mut frame, Sysnum::Getc, [0; 3]);
        assert_eq!(current(&kernel), a);
        assert_eq!(frame.r[0], u32::from(b'k'));
    }

    #[test]
    fn test_getc_blocks_until_input() {
        let kernel = kernel();
        let a = kernel.spawn(entry(1), &[]).expect("spawn");
        let b = kernel.spawn(entry(2), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");

        syscall(&kernel, &mut frame, Sysnum::Getc, [0; 3]);
        assert_eq!(state(&kernel, a), ThreadState::WaitingOnInput);
        assert_eq!(current(&kernel), b);

        // Blocked threads are skipped by preemption.
        tick(&kernel, &mut frame);
        assert_eq!(current(&kernel), b);

        input(&kernel, &mut frame, b"q");
        assert_eq!(state(&kernel, a), ThreadState::Running);
        let resumed = saved(&kernel, a);
        assert_eq!(resumed.r[0], u32::from(b'q'));
        assert_eq!(resumed.pc, NoOpArch::THREAD_ENTRY + 4);
        // The running thread keeps the CPU until the next tick.
        assert_eq!(current(&kernel), b);

        tick(&kernel, &mut frame);
        assert_eq!(current(&kernel), a);
        assert_eq!(frame.r[0], u32::from(b'q'));
        assert!(kernel.board().console.clears.get() >= 1);
    }

    #[test]
    fn test_waiters_wake_in_fifo_order() {
        let kernel = kernel();
        let ids: std::vec::Vec<_> = (1..=3)
            .map(|n| kernel.spawn(entry(n), &[]).expect("spawn"))
            .collect();
        let mut frame = kernel.prepare_start().expect("start");
        for _ in &ids {
            syscall(&kernel, &mut frame, Sysnum::Getc, [0; 3]);
        }
        assert!(is_idle_frame(&frame));

        input(&kernel, &mut frame, b"xy");
        assert_eq!(saved(&kernel, ids[0]).r[0], u32::from(b'x'));
        assert_eq!(saved(&kernel, ids[1]).r[0], u32::from(b'y'));
        assert_eq!(state(&kernel, ids[2]), ThreadState::WaitingOnInput);

        input(&kernel, &mut frame, b"z");
        assert_eq!(state(&kernel, ids[2]), ThreadState::Running);
        assert_eq!(saved(&kernel, ids[2]).r[0], u32::from(b'z'));
    }

    #[test]
    fn test_input_wakes_idle_cpu_immediately() {
        let kernel = kernel();
        let a = kernel.spawn(entry(1), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");

        syscall(&kernel, &mut frame, Sysnum::Getc, [0; 3]);
        assert!(is_idle_frame(&frame));

        input(&kernel, &mut frame, b"z");
        assert_eq!(current(&kernel), a);
        assert_eq!(frame.r[0], u32::from(b'z'));
        assert_eq!(frame.pc, NoOpArch::THREAD_ENTRY + 4);
    }

    #[test]
    fn test_waiter_survives_other_thread_exit() {
        let kernel = kernel();
        let a = kernel.spawn(entry(1), &[]).expect("spawn");
        let b = kernel.spawn(entry(2), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");

        syscall(&kernel, &mut frame, Sysnum::Getc, [0; 3]);
        assert_eq!(current(&kernel), b);
        syscall(&kernel, &mut frame, Sysnum::Exit, [0; 3]);

        input(&kernel, &mut frame, b"r");
        assert_eq!(current(&kernel), a);
        assert_eq!(frame.r[0], u32::from(b'r'));
        assert!(!kernel.with_scheduler(|s| s.has_waiting_input()));
    }
}

mod preemption_tests {
    use super::*;

    #[test]
    fn test_timer_rotates_threads() {
        let kernel = kernel();
        for n in 1..=3 {
            kernel.spawn(entry(n), &[]).expect("spawn");
        }
        let mut frame = kernel.prepare_start().expect("start");

        let mut seen = std::vec![frame.r[0]];
        for _ in 0..5 {
            tick(&kernel, &mut frame);
            seen.push(frame.r[0]);
        }
        assert_eq!(
            seen,
            [entry(1), entry(2), entry(3), entry(1), entry(2), entry(3)]
        );
        assert_eq!(kernel.board().timer.acks.get(), 5);
    }

    #[test]
    fn test_preempted_registers_survive() {
        let kernel = kernel();
        let a = kernel.spawn(entry(1), &[]).expect("spawn");
        kernel.spawn(entry(2), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");

        frame.r[4] = 0x4444;
        frame.r[12] = 0xCCCC;
        frame.pc = 0x0002_0040;
        frame.lr_usr = 0x0002_0100;
        let snapshot = frame;

        tick(&kernel, &mut frame);
        assert_ne!(current(&kernel), a);
        assert_eq!(saved(&kernel, a), snapshot);

        tick(&kernel, &mut frame);
        assert_eq!(current(&kernel), a);
        assert_eq!(frame, snapshot);
    }

    #[test]
    fn test_spurious_irq_keeps_current_thread() {
        let kernel = kernel();
        let a = kernel.spawn(entry(1), &[]).expect("spawn");
        kernel.spawn(entry(2), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");
        let before = frame;

        assert_eq!(kernel.on_irq(&mut frame), TrapAction::Resume);
        assert_eq!(current(&kernel), a);
        assert_eq!(frame, before);
    }
}

mod fault_tests {
    use super::*;
    use crate::arch::frame::PSR_MODE_SVC;
    use crate::errors::{KernelFault, ThreadFault};

    #[test]
    fn test_user_fault_terminates_thread() {
        let kernel = kernel();
        let a = kernel.spawn(entry(1), &[]).expect("spawn");
        let b = kernel.spawn(entry(2), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");

        for fault in [
            ThreadFault::DataAbort,
            ThreadFault::PrefetchAbort,
            ThreadFault::UndefinedInstruction,
        ] {
            let victim = current(&kernel);
            if victim.is_idle() {
                break;
            }
            assert_eq!(kernel.on_fault(fault, &mut frame), TrapAction::Resume);
            assert_eq!(state(&kernel, victim), ThreadState::Unused);
        }
        assert_eq!(state(&kernel, a), ThreadState::Unused);
        assert_eq!(state(&kernel, b), ThreadState::Unused);
        assert!(is_idle_frame(&frame));
        assert!(!kernel.is_halted());
    }

    #[test]
    fn test_privileged_fault_halts() {
        let kernel = kernel();
        kernel.spawn(entry(1), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");
        frame.psr = PSR_MODE_SVC;

        let action = kernel.on_fault(ThreadFault::DataAbort, &mut frame);
        assert_eq!(
            action,
            TrapAction::Halt(KernelFault::PrivilegedException(ThreadFault::DataAbort))
        );
        assert!(kernel.is_halted());
        assert_eq!(kernel.stats().live, 1);
    }

    #[test]
    fn test_privileged_syscall_halts() {
        let kernel = kernel();
        let mut frame = kernel.prepare_start().expect("start");
        frame.psr = PSR_MODE_SVC;
        frame.r[0] = Sysnum::Putc as u32;

        assert_eq!(
            kernel.on_syscall(&mut frame),
            TrapAction::Halt(KernelFault::PrivilegedSyscall)
        );
        assert!(kernel.is_halted());
        assert!(kernel.board().console.output().is_empty());
    }

    #[test]
    fn test_no_scheduling_after_halt() {
        let kernel = kernel();
        let a = kernel.spawn(entry(1), &[]).expect("spawn");
        kernel.spawn(entry(2), &[]).expect("spawn");
        let mut frame = kernel.prepare_start().expect("start");
        assert_eq!(current(&kernel), a);

        let mut privileged = frame;
        privileged.psr = PSR_MODE_SVC;
        let action = kernel.on_fault(ThreadFault::DataAbort, &mut privileged);
        assert!(matches!(action, TrapAction::Halt(KernelFault::PrivilegedException(_))));
        let acks = kernel.board().timer.acks.get();
        let rearms = kernel.board().timer.rearms.get();

        kernel.board().raise_timer();
        let before = frame;
        assert_eq!(kernel.on_irq(&mut frame), TrapAction::Halt(KernelFault::Halted));
        assert_eq!(frame, before);

        frame.r[0] = Sysnum::Exit as u32;
        assert_eq!(kernel.on_syscall(&mut frame), TrapAction::Halt(KernelFault::Halted));
        assert_eq!(
            kernel.on_fault(ThreadFault::UndefinedInstruction, &mut frame),
            TrapAction::Halt(KernelFault::Halted)
        );
        assert_eq!(kernel.prepare_start(), Err(KernelFault::Halted));

        assert_eq!(current(&kernel), a);
        assert_eq!(state(&kernel, a), ThreadState::Running);
        assert_eq!(kernel.board().timer.acks.get(), acks);
        assert_eq!(kernel.board().timer.rearms.get(), rearms);
    }

    #[test]
    fn test_idle_fault_halts() {
        let kernel = kernel();
        let mut frame = kernel.prepare_start().expect("start");
        let action = kernel.on_fault(ThreadFault::UndefinedInstruction, &mut frame);
        assert_eq!(
            action,
            TrapAction::Halt(KernelFault::IdleFault(ThreadFault::UndefinedInstruction))
        );
    }
}
