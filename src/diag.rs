//! Fault reports.

use crate::arch::{ContextFrame, FaultRegisters};
use crate::errors::ThreadFault;
use core::fmt::{self, Write};

/// Describe the fault status field of a DFSR/IFSR value (short descriptor
/// format: FS[4] is bit 10, FS[3:0] are bits 3:0).
pub fn fault_status_description(fsr: u32) -> &'static str {
    match (fsr & 0xF) | ((fsr >> 6) & 0x10) {
        0b00000 => "No function, reset value",
        0b00001 => "Alignment fault",
        0b00010 => "Debug event fault",
        0b00011 => "Access Flag fault on Section",
        0b00100 => "Cache maintenance operation fault",
        0b00101 => "Translation fault on Section",
        0b00110 => "Access Flag fault on Page",
        0b00111 => "Translation fault on Page",
        0b01000 => "Precise External Abort",
        0b01001 => "Domain fault on Section",
        0b01011 => "Domain fault on Page",
        0b01100 => "External abort on Section",
        0b01101 => "Permission fault on Section",
        0b01110 => "External abort on Page",
        0b01111 => "Permission fault on Page",
        0b10000 => "TLB conflict abort",
        0b10100 | 0b11010 => "Implementation defined fault",
        0b10110 => "External Abort",
        0b11000 => "Asynchronous parity error on memory access",
        0b11001 => "Synchronous parity error on memory access",
        0b11100 => "Synchronous parity error on translation table walk on section",
        0b11110 => "Synchronous parity error on translation table walk on page",
        _ => "Invalid fault status register value",
    }
}

/// Write a report for `fault` raised with register snapshot `frame`.
pub fn write_fault_report<W: Write>(
    out: &mut W,
    fault: ThreadFault,
    frame: &ContextFrame,
    regs: FaultRegisters,
) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "############ {} at {:#010x} ############", fault.name(), frame.pc)?;

    match fault {
        ThreadFault::DataAbort => {
            writeln!(
                out,
                "Data Fault Status Register: {:#010x} -> {}",
                regs.status,
                fault_status_description(regs.status)
            )?;
            writeln!(out, "Data Fault Address Register: {:#010x}", regs.address)?;
        }
        ThreadFault::PrefetchAbort => {
            writeln!(
                out,
                "Instruction Fault Status Register: {:#010x} -> {}",
                regs.status,
                fault_status_description(regs.status)
            )?;
            writeln!(out, "Instruction Fault Address Register: {:#010x}", regs.address)?;
        }
        ThreadFault::UnknownSyscall(id) => {
            writeln!(out, "Unknown syscall {id}")?;
        }
        ThreadFault::UndefinedInstruction => {}
    }

    writeln!(out)?;
    writeln!(out, ">> Register snapshot <<")?;
    let r = &frame.r;
    writeln!(out, "R0: {:#010x}  R5: {:#010x}  R10: {:#010x}", r[0], r[5], r[10])?;
    writeln!(out, "R1: {:#010x}  R6: {:#010x}  R11: {:#010x}", r[1], r[6], r[11])?;
    writeln!(out, "R2: {:#010x}  R7: {:#010x}  R12: {:#010x}", r[2], r[7], r[12])?;
    writeln!(out, "R3: {:#010x}  R8: {:#010x}  SP:  {:#010x}", r[3], r[8], frame.sp_usr)?;
    writeln!(out, "R4: {:#010x}  R9: {:#010x}  LR:  {:#010x}", r[4], r[9], frame.lr_usr)?;
    writeln!(out, "PC: {:#010x}  PSR: {:#010x}", frame.pc, frame.psr)
}
