//! Register snapshot exchanged with the trap trampolines.
//!
//! The layout of [`ContextFrame`] is shared with the assembly in
//! `armv7_vectors.rs` and `armv7.rs`; the offsets below are the contract.
//!
//! | offset | field                      |
//! |--------|----------------------------|
//! | 0..48  | `r0`..`r12`                |
//! | 52     | `sp_usr`                   |
//! | 56     | `lr_usr`                   |
//! | 60     | resume address             |
//! | 64     | saved program status (SPSR)|

use core::mem::{offset_of, size_of};

/// Version of the snapshot layout. Bump when any offset changes.
pub const FRAME_LAYOUT_VERSION: u32 = 1;

/// Byte offset of `r0`.
pub const OFFSET_R0: usize = 0;
/// Byte offset of the banked user stack pointer.
pub const OFFSET_SP_USR: usize = 52;
/// Byte offset of the banked user link register.
pub const OFFSET_LR_USR: usize = 56;
/// Byte offset of the resume address.
pub const OFFSET_PC: usize = 60;
/// Byte offset of the saved program status register.
pub const OFFSET_PSR: usize = 64;
/// Size of the snapshot in bytes.
pub const FRAME_SIZE: usize = 68;

/// CPSR mode field mask.
pub const PSR_MODE_MASK: u32 = 0x1F;
/// User mode encoding.
pub const PSR_MODE_USR: u32 = 0b1_0000;
/// Supervisor mode encoding.
pub const PSR_MODE_SVC: u32 = 0b1_0011;
/// Thumb execution state bit.
pub const PSR_THUMB: u32 = 1 << 5;
/// FIQ mask bit.
pub const PSR_FIQ_MASK: u32 = 1 << 6;
/// IRQ mask bit.
pub const PSR_IRQ_MASK: u32 = 1 << 7;

/// Status word every thread starts with: User mode, FIQ masked, IRQ enabled.
pub const THREAD_INITIAL_PSR: u32 = PSR_MODE_USR | PSR_FIQ_MASK;

/// Size of an ARM instruction, the distance "advance PC" moves.
pub const INSTRUCTION_SIZE: u32 = 4;

/// Saved register state of one thread at a trap boundary.
///
/// Authoritative only while the owning thread is not on the CPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextFrame {
    /// General-purpose registers `r0`..`r12`
    pub r: [u32; 13],
    /// User mode stack pointer
    pub sp_usr: u32,
    /// User mode link register
    pub lr_usr: u32,
    /// Address execution resumes at after the exception return
    pub pc: u32,
    /// Program status of the interrupted mode
    pub psr: u32,
}

static_assertions::const_assert_eq!(size_of::<ContextFrame>(), FRAME_SIZE);
static_assertions::const_assert_eq!(offset_of!(ContextFrame, r), OFFSET_R0);
static_assertions::const_assert_eq!(offset_of!(ContextFrame, sp_usr), OFFSET_SP_USR);
static_assertions::const_assert_eq!(offset_of!(ContextFrame, lr_usr), OFFSET_LR_USR);
static_assertions::const_assert_eq!(offset_of!(ContextFrame, pc), OFFSET_PC);
static_assertions::const_assert_eq!(offset_of!(ContextFrame, psr), OFFSET_PSR);

impl ContextFrame {
    /// An all-zero snapshot.
    pub const ZERO: Self = Self {
        r: [0; 13],
        sp_usr: 0,
        lr_usr: 0,
        pc: 0,
        psr: 0,
    };

    /// Builds the snapshot of a thread that has never run.
    ///
    /// `entry` may carry the interworking bit; it selects Thumb state.
    pub fn for_entry(entry: u32, stack_pointer: u32) -> Self {
        let mut frame = Self::ZERO;
        frame.sp_usr = stack_pointer;
        frame.pc = entry & !1;
        frame.psr = THREAD_INITIAL_PSR;
        if entry & 1 != 0 {
            frame.psr |= PSR_THUMB;
        }
        frame
    }

    /// Syscall identifier (`r0`).
    pub fn syscall_id(&self) -> u32 {
        self.r[0]
    }

    /// First syscall argument (`r1`).
    pub fn arg0(&self) -> u32 {
        self.r[1]
    }

    /// Second syscall argument (`r2`).
    pub fn arg1(&self) -> u32 {
        self.r[2]
    }

    /// Third syscall argument (`r3`).
    pub fn arg2(&self) -> u32 {
        self.r[3]
    }

    /// Writes the syscall return value (`r0`).
    pub fn set_return_value(&mut self, value: u32) {
        self.r[0] = value;
    }

    /// Moves the resume address past the trapping instruction.
    pub fn advance_pc(&mut self) {
        self.pc = self.pc.wrapping_add(INSTRUCTION_SIZE);
    }

    /// Processor mode the trap was taken from.
    pub fn mode(&self) -> u32 {
        self.psr & PSR_MODE_MASK
    }

    /// Whether the trap was taken from unprivileged (User) mode.
    pub fn is_from_user(&self) -> bool {
        self.mode() == PSR_MODE_USR
    }
}
