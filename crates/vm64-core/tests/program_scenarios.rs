//! End-to-end programs run through the public core API.

use std::cell::Cell;
use std::io::Cursor;
use std::rc::Rc;
use std::time::{Duration, Instant};

use log as _;
use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use vm64_core::{
    step_and_render, CoreConfig, CoreLink, Cpu, Device, Fault, Flag, Memory, MemoryBus, Opcode,
    Register, FRAME_WORDS,
};

const STACK_TOP: u64 = 0xff8;
const VECTOR_BASE: u64 = 0xc00;

fn op(opcode: Opcode) -> Vec<u8> {
    opcode.value().to_le_bytes().to_vec()
}

fn reg(register: Register) -> u8 {
    register.index() as u8
}

fn with_reg_imm(opcode: Opcode, register: Register, imm: u64) -> Vec<u8> {
    let mut bytes = op(opcode);
    bytes.push(reg(register));
    bytes.extend_from_slice(&imm.to_le_bytes());
    bytes
}

fn with_reg_reg(opcode: Opcode, a: Register, b: Register) -> Vec<u8> {
    let mut bytes = op(opcode);
    bytes.extend_from_slice(&[reg(a), reg(b)]);
    bytes
}

fn with_addr(opcode: Opcode, address: u64) -> Vec<u8> {
    let mut bytes = op(opcode);
    bytes.extend_from_slice(&address.to_le_bytes());
    bytes
}

fn config() -> CoreConfig {
    CoreConfig {
        initial_stack_pointer: STACK_TOP,
        interrupt_vector_base: VECTOR_BASE,
        ..CoreConfig::default()
    }
}

fn cpu_with(program: &[u8]) -> Cpu {
    let mut bus = MemoryBus::new();
    bus.map(Box::new(Memory::new(0x1000)), 0, 0xfff, true)
        .unwrap();
    bus.load(0, program).unwrap();
    Cpu::new(bus, config()).unwrap()
}

#[test]
fn add_two_loaded_registers_and_halt() {
    let program = [
        with_reg_imm(Opcode::Ldi, Register::R1, 5),
        with_reg_imm(Opcode::Ldi, Register::R2, 7),
        with_reg_reg(Opcode::Add, Register::R1, Register::R2),
        op(Opcode::Hlt),
    ]
    .concat();
    let mut cpu = cpu_with(&program);

    let outcome = cpu.run().unwrap();

    assert_eq!(outcome.steps, 3);
    assert_eq!(cpu.register(Register::R1).unwrap(), 12);
    assert!(!cpu.flag(Flag::Zero));
    assert!(!cpu.flag(Flag::Negative));
}

#[test]
fn countdown_loop_runs_until_zero() {
    let mut program = [
        with_reg_imm(Opcode::Ldi, Register::R1, 4),
        with_reg_imm(Opcode::Ldi, Register::R2, 0),
    ]
    .concat();
    let loop_start = program.len() as u64;
    program.extend(with_reg_imm(Opcode::Addi, Register::R2, 3));
    program.extend(with_reg_imm(Opcode::Subi, Register::R1, 1));
    program.extend(with_addr(Opcode::Jne, loop_start));
    program.extend(op(Opcode::Hlt));
    let mut cpu = cpu_with(&program);

    let outcome = cpu.run().unwrap();

    assert_eq!(cpu.register(Register::R2).unwrap(), 12);
    assert_eq!(outcome.steps, 2 + 4 * 3);
}

#[test]
fn invalid_opcode_stops_the_run_with_a_fault() {
    let program = [with_reg_imm(Opcode::Ldi, Register::R1, 1), vec![0xee, 0xee]].concat();
    let mut cpu = cpu_with(&program);
    assert_eq!(
        cpu.run(),
        Err(Fault::InvalidOpcode {
            opcode: 0xeeee,
            address: 11
        })
    );
    assert_eq!(cpu.register(Register::R1).unwrap(), 1);
}

#[test]
fn running_off_the_mapped_range_faults() {
    let mut bus = MemoryBus::new();
    bus.map(Box::new(Memory::new(4)), 0, 3, true).unwrap();
    let mut cpu = Cpu::new(bus, config()).unwrap();
    assert_eq!(cpu.run(), Err(Fault::UnmappedAddress { address: 4 }));
}

#[rstest]
#[case(Opcode::Jeq, 0, false)]
#[case(Opcode::Jeq, 5, true)]
#[case(Opcode::Jgt, 6, true)]
#[case(Opcode::Jlt, 4, true)]
#[case(Opcode::Jge, 4, false)]
#[case(Opcode::Jle, 5, true)]
fn compare_then_conditional_jump(#[case] jump: Opcode, #[case] value: u64, #[case] taken: bool) {
    let mut program = [
        with_reg_imm(Opcode::Ldi, Register::R1, value),
        with_reg_imm(Opcode::Cmpi, Register::R1, 5),
        with_addr(jump, 0x400),
        op(Opcode::Hlt),
    ]
    .concat();
    program.resize(0x400, 0);
    program.extend(with_reg_imm(Opcode::Ldi, Register::R7, 1));
    program.extend(op(Opcode::Hlt));
    let mut cpu = cpu_with(&program);

    cpu.run().unwrap();

    assert_eq!(cpu.register(Register::R7).unwrap(), u64::from(taken));
}

#[test]
fn software_interrupt_runs_handler_and_resumes() {
    let mut program = [
        with_reg_imm(Opcode::Ldi, Register::R1, 3),
        op(Opcode::Int),
        7_u16.to_le_bytes().to_vec(),
        op(Opcode::Hlt),
    ]
    .concat();
    program.resize(0x600, 0);
    program.extend(with_reg_imm(Opcode::Ldi, Register::Acc, 0x77));
    program.extend(with_reg_imm(Opcode::Ldi, Register::R1, 0));
    program.extend(op(Opcode::Rti));
    let mut cpu = cpu_with(&program);
    cpu.bus_mut().write64(VECTOR_BASE + 7 * 8, 0x600).unwrap();

    let outcome = cpu.run().unwrap();

    assert_eq!(outcome.steps, 5);
    assert_eq!(cpu.register(Register::Acc).unwrap(), 0x77);
    assert_eq!(cpu.register(Register::R1).unwrap(), 3);
    assert_eq!(cpu.register(Register::Sp).unwrap(), STACK_TOP);
    assert!(!cpu.in_interrupt_handler());
}

#[test]
fn masked_software_interrupt_falls_through() {
    let program = [
        with_reg_imm(Opcode::Ldi, Register::Im, 0),
        op(Opcode::Int),
        2_u16.to_le_bytes().to_vec(),
        op(Opcode::Hlt),
    ]
    .concat();
    let mut cpu = cpu_with(&program);

    assert_eq!(cpu.run().unwrap().steps, 2);
    assert_eq!(cpu.register(Register::Sp).unwrap(), STACK_TOP);
}

/// Raises a fixed interrupt vector whenever a byte is written to it.
struct Doorbell {
    link: Rc<Cell<Option<CoreLink>>>,
    vector: u16,
}

impl Doorbell {
    fn ring(&self) {
        let link = self.link.take();
        if let Some(link) = &link {
            link.raise(self.vector);
        }
        self.link.set(link);
    }
}

impl Device for Doorbell {
    fn name(&self) -> &str {
        "Doorbell"
    }
    fn size(&self) -> u64 {
        1
    }
    fn read8(&self, _address: u64) -> Result<u8, Fault> {
        Ok(0)
    }
    fn read16(&self, _address: u64) -> Result<u16, Fault> {
        Ok(0)
    }
    fn read32(&self, _address: u64) -> Result<u32, Fault> {
        Ok(0)
    }
    fn read64(&self, _address: u64) -> Result<u64, Fault> {
        Ok(0)
    }
    fn write8(&mut self, _address: u64, _value: u8) -> Result<(), Fault> {
        self.ring();
        Ok(())
    }
    fn write16(&mut self, _address: u64, _value: u16) -> Result<(), Fault> {
        self.ring();
        Ok(())
    }
    fn write32(&mut self, _address: u64, _value: u32) -> Result<(), Fault> {
        self.ring();
        Ok(())
    }
    fn write64(&mut self, _address: u64, _value: u64) -> Result<(), Fault> {
        self.ring();
        Ok(())
    }
    fn attach_core(&mut self, link: CoreLink) {
        self.link.set(Some(link));
    }
    fn destroy(&mut self) -> bool {
        self.link.set(None);
        true
    }
}

#[test]
fn device_raised_interrupt_is_delivered_before_next_fetch() {
    let mut program = [
        with_reg_imm(Opcode::Ldi, Register::R1, 9),
        with_addr(Opcode::Stb, 0x2000),
        op(Opcode::Hlt),
    ]
    .concat();
    program.resize(0x500, 0);
    program.extend(with_reg_imm(Opcode::Ldi, Register::Mb, 0x42));
    program.extend(op(Opcode::Rti));

    let mut cpu = cpu_with(&program);
    cpu.bus_mut().write64(VECTOR_BASE + 3 * 8, 0x500).unwrap();
    let link = Rc::new(Cell::new(None));
    cpu.map(
        Box::new(Doorbell {
            link: Rc::clone(&link),
            vector: 3,
        }),
        0x2000,
        0x2000,
        true,
    )
    .unwrap();

    let outcome = cpu.run().unwrap();

    assert_eq!(cpu.register(Register::Mb).unwrap(), 0x42);
    assert_eq!(outcome.steps, 4);
}

#[test]
fn throttled_run_is_slowed_to_target_rate() {
    let program = [op(Opcode::Nop), op(Opcode::Nop), op(Opcode::Nop), op(Opcode::Hlt)].concat();
    let mut bus = MemoryBus::new();
    bus.map(Box::new(Memory::new(0x1000)), 0, 0xfff, true)
        .unwrap();
    bus.load(0, &program).unwrap();
    let config = CoreConfig {
        target_steps_per_second: Some(100),
        ..config()
    };
    let mut cpu = Cpu::new(bus, config).unwrap();

    let started = Instant::now();
    assert_eq!(cpu.run().unwrap().steps, 3);
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[test]
fn debugger_session_steps_on_command() {
    let program = [
        with_reg_imm(Opcode::Ldi, Register::R1, 1),
        with_reg_imm(Opcode::Ldi, Register::R2, 2),
        with_reg_imm(Opcode::Ldi, Register::R3, 3),
        with_reg_imm(Opcode::Ldi, Register::R4, 4),
        op(Opcode::Hlt),
    ]
    .concat();
    let mut cpu = cpu_with(&program);
    let mut output = Vec::new();

    cpu.attach_debugger(Cursor::new("2\nq\n"), &mut output, step_and_render)
        .unwrap();
    assert_eq!(cpu.register(Register::R2).unwrap(), 2);
    assert_eq!(cpu.register(Register::R3).unwrap(), 0);

    cpu.attach_debugger(Cursor::new("\nc\n"), &mut output, step_and_render)
        .unwrap();
    assert_eq!(cpu.register(Register::R4).unwrap(), 4);

    let transcript = String::from_utf8(output).unwrap();
    assert!(transcript.starts_with("> "));
    assert!(transcript.contains("R2 : 0x0000000000000002"));
}

#[test]
fn debugger_surfaces_faults() {
    let mut cpu = cpu_with(&[0xee, 0xee]);
    let result = cpu.attach_debugger(Cursor::new("1\n"), Vec::new(), |cpu, _out| {
        Ok(cpu.step()?)
    });
    assert!(matches!(
        result,
        Err(vm64_core::DebuggerError::Fault(Fault::InvalidOpcode { .. }))
    ));
}

proptest! {
    #[test]
    fn call_then_rtc_restores_ip_and_general_registers(
        values in proptest::array::uniform8(any::<u64>()),
    ) {
        let mut program = Vec::new();
        for (register, value) in Register::GENERAL.into_iter().zip(values) {
            program.extend(with_reg_imm(Opcode::Ldi, register, value));
        }
        program.extend(with_addr(Opcode::Pushi, 0));
        program.extend(with_addr(Opcode::Call, 0x800));
        let return_address = program.len() as u64;
        program.extend(op(Opcode::Hlt));
        program.resize(0x800, 0);
        for register in Register::GENERAL {
            program.extend(with_reg_imm(Opcode::Ldi, register, 0));
        }
        program.extend(op(Opcode::Rtc));

        let mut cpu = cpu_with(&program);
        for _ in 0..10 {
            cpu.step().unwrap();
        }
        prop_assert_eq!(
            cpu.register(Register::Sp).unwrap(),
            STACK_TOP - 8 - FRAME_WORDS * 8
        );
        for _ in 0..9 {
            cpu.step().unwrap();
        }

        prop_assert_eq!(cpu.register(Register::Ip).unwrap(), return_address);
        for (register, value) in Register::GENERAL.into_iter().zip(values) {
            prop_assert_eq!(cpu.register(register).unwrap(), value);
        }
        prop_assert_eq!(cpu.register(Register::Sp).unwrap(), STACK_TOP);
    }
}
