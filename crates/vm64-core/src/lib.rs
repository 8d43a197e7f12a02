//! Core of the vm64 software CPU: a 64-bit register machine executing a
//! fixed-width instruction set against a bus of memory-mapped devices.

/// Emits a `log` record when `$level` is within the core's configured filter.
macro_rules! diag {
    ($filter:expr, $level:expr, $($arg:tt)+) => {
        if $level <= $filter {
            log::log!($level, $($arg)+);
        }
    };
}

/// Fault taxonomy shared by every fallible core operation.
pub mod fault;
pub use fault::{Fault, FaultClass};

/// Device contract, RAM device and the region bus.
pub mod memory;
pub use memory::{Device, Memory, MemoryBus, Region, Width};

/// Public host-facing configuration and integration types.
pub mod api;
pub use api::{
    CoreConfig, CoreLink, DebuggerError, RunOutcome, DEFAULT_INTERRUPT_VECTOR_BASE,
    DEFAULT_STACK_POINTER, INTERRUPT_LINES,
};

/// Register file and flags.
pub mod state;
pub use state::{Flag, Flags, Register, RegisterFile, REGISTER_COUNT};

/// Opcode table shared by the executor, disassembler and assembler.
pub mod encoding;
pub use encoding::{lookup_mnemonic, Opcode, OpcodeInfo, OperandKind, OperandShape, OPCODE_TABLE};

/// The CPU core and its run loops.
pub mod cpu;
pub use cpu::{Cpu, FRAME_WORDS};

/// Instruction dispatch and ALU semantics.
pub mod execute;
pub use execute::{AluOp, Condition, FlagsUpdate};

/// Run-loop throttle.
pub mod timing;
pub use timing::Throttle;

/// Disassembly of instructions on the bus.
pub mod disasm;
pub use disasm::{disassemble_one, disassemble_window, DisassemblyRow};

/// Register, flag and memory rendering for debuggers and fault reports.
pub mod debug;
pub use debug::{
    fault_report, render_flags, render_registers, step_and_render, view_memory,
    view_memory_highlighted,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
