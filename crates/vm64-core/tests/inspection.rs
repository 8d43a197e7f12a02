//! Disassembly and fault inspection over a loaded program.

use log as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use vm64_core::{
    disassemble_window, fault_report, CoreConfig, Cpu, Memory, MemoryBus, Opcode, Register,
};

fn loaded_bus(program: &[u8]) -> MemoryBus {
    let mut bus = MemoryBus::new();
    bus.map(Box::new(Memory::new(0x100)), 0, 0xff, true).unwrap();
    bus.load(0, program).unwrap();
    bus
}

#[test]
fn window_lists_consecutive_instructions() {
    let mut program = Vec::new();
    program.extend(Opcode::Ldi.value().to_le_bytes());
    program.push(Register::R1.index() as u8);
    program.extend(0x2a_u64.to_le_bytes());
    program.extend(Opcode::Add.value().to_le_bytes());
    program.extend([Register::R1.index() as u8, Register::Acc.index() as u8]);
    program.extend([0x34, 0x12]);
    program.extend(Opcode::Hlt.value().to_le_bytes());
    let bus = loaded_bus(&program);

    let rows = disassemble_window(&bus, 0, 4);
    let listing: Vec<_> = rows.iter().map(|row| (row.address, row.text())).collect();

    assert_eq!(
        listing,
        vec![
            (0, "LDI R1, 0x2a".to_owned()),
            (11, "ADD R1, ACC".to_owned()),
            (15, ".word 0x1234 ; INVALID".to_owned()),
            (17, "HLT".to_owned()),
        ]
    );
}

#[test]
fn fault_report_points_at_the_faulting_instruction() {
    let bus = loaded_bus(&[0x00, 0x00, 0x34, 0x12]);
    let config = CoreConfig {
        initial_stack_pointer: 0xf8,
        ..CoreConfig::default()
    };
    let mut cpu = Cpu::new(bus, config).unwrap();

    let fault = cpu.run().unwrap_err();
    let report = fault_report(&cpu, &fault);

    assert!(report.contains("invalid opcode 0x1234 at 0x2"));
    assert!(report.contains("IP : 0x0000000000000004"));
    assert!(report.contains("[34]"));
    assert!(report.contains("instruction: .word 0x1234 ; INVALID"));
}
