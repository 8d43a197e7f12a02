//! Read-only rendering of core state for debuggers and fault reports.

use std::fmt::Write as _;
use std::io;

use crate::disasm::disassemble_one;
use crate::memory::MemoryBus;
use crate::state::{Flag, Flags, Register};
use crate::{Cpu, DebuggerError, Fault};

/// Bytes shown on either side of a faulting address in a fault report.
pub const FAULT_WINDOW_RADIUS: u64 = 16;

const BYTES_PER_ROW: u64 = 16;

/// One `NAME: 0x...` line per register.
///
/// # Errors
///
/// Propagates register file faults.
pub fn render_registers(cpu: &Cpu) -> Result<String, Fault> {
    let mut out = String::new();
    for register in Register::ALL {
        let value = cpu.register(register)?;
        let _ = writeln!(out, "{:<3}: {value:#018x}", register.name());
    }
    Ok(out)
}

/// Flags as `C Z N V I`, with `-` for clear bits.
#[must_use]
pub fn render_flags(flags: Flags) -> String {
    let letters: Vec<String> = Flag::ALL
        .into_iter()
        .map(|flag| {
            if flags.get(flag) {
                flag.letter().to_string()
            } else {
                "-".to_owned()
            }
        })
        .collect();
    format!("FLAGS: {}\n", letters.join(" "))
}

/// Hex view of `len` bytes from `start`, sixteen per row. Unreadable bytes
/// show as `??`.
#[must_use]
pub fn view_memory(bus: &MemoryBus, start: u64, len: u64) -> String {
    render_memory(bus, start, len, None)
}

/// Like [`view_memory`], with the byte at `highlight` shown as `[..]`.
#[must_use]
pub fn view_memory_highlighted(bus: &MemoryBus, start: u64, len: u64, highlight: u64) -> String {
    render_memory(bus, start, len, Some(highlight))
}

fn render_memory(bus: &MemoryBus, start: u64, len: u64, highlight: Option<u64>) -> String {
    let mut out = String::new();
    let mut offset = 0;
    while offset < len {
        let row_start = start.wrapping_add(offset);
        let _ = write!(out, "{row_start:#018x}:");
        for column in 0..BYTES_PER_ROW.min(len - offset) {
            let address = row_start.wrapping_add(column);
            let cell = bus
                .read8(address)
                .map_or_else(|_| "??".to_owned(), |byte| format!("{byte:02x}"));
            if highlight == Some(address) {
                let _ = write!(out, " [{cell}]");
            } else {
                let _ = write!(out, " {cell}");
            }
        }
        out.push('\n');
        offset += BYTES_PER_ROW;
    }
    out
}

/// Full diagnostic for a fault: summary, registers, flags, a highlighted
/// memory window and the instruction at the fault address when it decodes.
#[must_use]
pub fn fault_report(cpu: &Cpu, fault: &Fault) -> String {
    let mut out = format!(
        "fault {:#04x} ({:?}): {fault}\n",
        fault.code(),
        fault.class()
    );

    match render_registers(cpu) {
        Ok(registers) => out.push_str(&registers),
        Err(error) => {
            let _ = writeln!(out, "registers unavailable: {error}");
        }
    }
    out.push_str(&render_flags(cpu.flags()));

    let focus = fault
        .address()
        .or_else(|| cpu.register(Register::Ip).ok());
    if let Some(focus) = focus {
        let start = focus.saturating_sub(FAULT_WINDOW_RADIUS);
        let _ = writeln!(out, "memory around {focus:#x}:");
        out.push_str(&view_memory_highlighted(
            cpu.bus(),
            start,
            FAULT_WINDOW_RADIUS * 2,
            focus,
        ));
        if let Some(row) = disassemble_one(cpu.bus(), focus) {
            let _ = writeln!(out, "instruction: {}", row.text());
        }
    }
    out
}

/// Stock debugger callback: steps once, then writes the register and flag views.
///
/// # Errors
///
/// Returns the step's fault or an output error.
pub fn step_and_render<W: io::Write>(cpu: &mut Cpu, output: &mut W) -> Result<u16, DebuggerError> {
    let opcode = cpu.step()?;
    write!(
        output,
        "{}{}",
        render_registers(cpu)?,
        render_flags(cpu.flags())
    )?;
    Ok(opcode)
}
