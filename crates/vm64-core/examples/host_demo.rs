//! Minimal host: conventional memory map, a short program exercising loops,
//! calls and a software interrupt, and a state fingerprint at halt.

use log as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use vm64_core::{
    render_flags, render_registers, CoreConfig, Cpu, Fault, Memory, MemoryBus, Opcode, Register,
    DEFAULT_INTERRUPT_VECTOR_BASE,
};

const PROGRAM_BASE: u64 = 0x0000;
const STACK_BASE: u64 = 0xFFFF_0000;

/// Assembles instructions into a flat byte image with a running address.
#[derive(Default)]
struct Image {
    bytes: Vec<u8>,
}

impl Image {
    fn here(&self) -> u64 {
        PROGRAM_BASE + self.bytes.len() as u64
    }

    fn op(&mut self, opcode: Opcode) -> &mut Self {
        self.bytes.extend_from_slice(&opcode.value().to_le_bytes());
        self
    }

    fn reg(&mut self, register: Register) -> &mut Self {
        self.bytes.push(register.index() as u8);
        self
    }

    fn u16(&mut self, value: u16) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn u64(&mut self, value: u64) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn patch_u64(&mut self, offset: usize, value: u64) {
        self.bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }
}

fn build_program() -> Image {
    let mut image = Image::default();
    image.op(Opcode::Ldi).reg(Register::R1).u64(10);
    image.op(Opcode::Ldi).reg(Register::R2).u64(0);

    let loop_start = image.here();
    image.op(Opcode::Add).reg(Register::R2).reg(Register::R1);
    image.op(Opcode::Subi).reg(Register::R1).u64(1);
    image.op(Opcode::Jne).u64(loop_start);

    image.op(Opcode::Pushi).u64(0);
    image.op(Opcode::Call);
    let call_target = image.bytes.len();
    image.u64(0);
    image.op(Opcode::Int).u16(1);
    image.op(Opcode::Hlt);

    let double = image.here();
    image.patch_u64(call_target, double);
    image.op(Opcode::Tf).reg(Register::Acc).reg(Register::R2);
    image.op(Opcode::Add).reg(Register::Acc).reg(Register::R2);
    image.op(Opcode::Rtc);

    image
}

fn handler() -> Image {
    let mut image = Image::default();
    image.op(Opcode::Ldi).reg(Register::Mb).u64(1);
    image.op(Opcode::Rti);
    image
}

fn fingerprint(cpu: &Cpu) -> Result<u64, Fault> {
    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for register in Register::ALL {
        for byte in cpu.register(register)?.to_le_bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x1000_0000_01B3);
        }
    }
    Ok(hash)
}

fn main() -> Result<(), Fault> {
    let mut bus = MemoryBus::new();
    bus.map(Box::new(Memory::new(0x1_0000)), PROGRAM_BASE, 0xFFFF, true)?;
    bus.map(
        Box::new(Memory::with_name("Vectors", 64 * 8)),
        DEFAULT_INTERRUPT_VECTOR_BASE,
        DEFAULT_INTERRUPT_VECTOR_BASE + 64 * 8 - 1,
        true,
    )?;
    // The default SP sits two bytes below 4 GiB, so the first push spills
    // past the region end into the device's slack.
    bus.map(
        Box::new(Memory::with_name("Stack", 0x1_0008)),
        STACK_BASE,
        0xFFFF_FFFF,
        true,
    )?;

    let program = build_program();
    let handler_address = 0x8000;
    bus.load(PROGRAM_BASE, &program.bytes)?;
    bus.load(handler_address, &handler().bytes)?;
    bus.write64(DEFAULT_INTERRUPT_VECTOR_BASE + 8, handler_address)?;

    let mut cpu = Cpu::new(bus, CoreConfig::default())?;
    let outcome = cpu.run()?;

    println!("halted after {} steps", outcome.steps);
    print!("{}", render_registers(&cpu)?);
    print!("{}", render_flags(cpu.flags()));
    println!("fingerprint: {:#018x}", fingerprint(&cpu)?);
    Ok(())
}
