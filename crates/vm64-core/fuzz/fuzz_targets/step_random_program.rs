#![no_main]

use libfuzzer_sys::fuzz_target;
use vm64_core::{disassemble_window, CoreConfig, Cpu, Memory, MemoryBus, Opcode};

const RAM_BYTES: usize = 0x1000;
const MAX_STEPS: usize = 256;

fuzz_target!(|data: &[u8]| {
    let mut bus = MemoryBus::new();
    if bus
        .map(Box::new(Memory::new(RAM_BYTES)), 0, RAM_BYTES as u64 - 1, true)
        .is_err()
    {
        return;
    }
    let image = &data[..data.len().min(RAM_BYTES)];
    if bus.load(0, image).is_err() {
        return;
    }

    let _ = disassemble_window(&bus, 0, 16);

    let config = CoreConfig {
        initial_stack_pointer: RAM_BYTES as u64 - 8,
        interrupt_vector_base: 0x800,
        ..CoreConfig::default()
    };
    let Ok(mut cpu) = Cpu::new(bus, config) else {
        return;
    };

    for _ in 0..MAX_STEPS {
        match cpu.step() {
            Ok(opcode) if opcode == Opcode::Hlt.value() => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
});
