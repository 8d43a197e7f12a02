//! The CPU core: register file, flags, stack and frame protocol, interrupt
//! delivery and the run, step and debugger loops.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::rc::Rc;
use std::time::Instant;

use log::Level;

use crate::api::InterruptQueue;
use crate::debug;
use crate::encoding::Opcode;
use crate::memory::{Device, MemoryBus, Width};
use crate::state::{Flag, Flags, Register, RegisterFile};
use crate::timing::Throttle;
use crate::{CoreConfig, CoreLink, DebuggerError, Fault, RunOutcome};

/// Words pushed by [`Cpu::push_state`]: R1..R8, IP and the frame size.
pub const FRAME_WORDS: u64 = 10;

/// A single core bound to the bus it exclusively owns.
#[derive(Debug)]
pub struct Cpu {
    bus: MemoryBus,
    registers: RegisterFile,
    flags: Flags,
    stack_frame_size: u64,
    in_interrupt_handler: bool,
    pending_interrupts: InterruptQueue,
    config: CoreConfig,
}

impl Cpu {
    /// Binds a new core to `bus`.
    ///
    /// IM starts with every line enabled and SP = FP =
    /// [`CoreConfig::initial_stack_pointer`]. Every mapped device receives a
    /// [`CoreLink`] to the new core.
    ///
    /// # Errors
    ///
    /// Propagates register file faults.
    pub fn new(mut bus: MemoryBus, config: CoreConfig) -> Result<Self, Fault> {
        let pending_interrupts = Rc::new(RefCell::new(VecDeque::new()));
        bus.set_log_level(config.log_level);
        bus.set_owning_core(&CoreLink::new(&pending_interrupts));

        let mut cpu = Self {
            bus,
            registers: RegisterFile::new(),
            flags: Flags::default(),
            stack_frame_size: 0,
            in_interrupt_handler: false,
            pending_interrupts,
            config,
        };
        cpu.set_register(Register::Im, u64::MAX)?;
        cpu.set_register(Register::Sp, cpu.config.initial_stack_pointer)?;
        cpu.set_register(Register::Fp, cpu.config.initial_stack_pointer)?;
        Ok(cpu)
    }

    /// Configuration the core was built with.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The bus this core executes against.
    #[must_use]
    pub const fn bus(&self) -> &MemoryBus {
        &self.bus
    }

    /// Mutable access to the bus, e.g. to load a program.
    pub const fn bus_mut(&mut self) -> &mut MemoryBus {
        &mut self.bus
    }

    /// Releases the bus, tearing the core down.
    #[must_use]
    pub fn into_bus(self) -> MemoryBus {
        self.bus
    }

    /// Maps a device on the owned bus and hands it a link to this core.
    ///
    /// # Errors
    ///
    /// Propagates [`MemoryBus::map`] faults.
    pub fn map(
        &mut self,
        device: Box<dyn Device>,
        start: u64,
        end: u64,
        rebase: bool,
    ) -> Result<(), Fault> {
        self.bus.map(device, start, end, rebase)?;
        self.bus.set_owning_core(&self.link());
        Ok(())
    }

    /// A fresh non-owning handle onto this core's interrupt line.
    #[must_use]
    pub fn link(&self) -> CoreLink {
        CoreLink::new(&self.pending_interrupts)
    }

    /// Reads a register.
    ///
    /// # Errors
    ///
    /// Propagates register file faults.
    pub fn register(&self, register: Register) -> Result<u64, Fault> {
        self.registers.get(register)
    }

    /// Writes a register.
    ///
    /// # Errors
    ///
    /// Propagates register file faults.
    pub fn set_register(&mut self, register: Register, value: u64) -> Result<(), Fault> {
        self.registers.set(register, value)
    }

    /// Reads a register by its assembly name.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnknownRegisterName`] for names outside the register set.
    pub fn register_by_name(&self, name: &str) -> Result<u64, Fault> {
        self.register(Register::from_name(name)?)
    }

    /// Writes a register by its assembly name.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnknownRegisterName`] for names outside the register set.
    pub fn set_register_by_name(&mut self, name: &str, value: u64) -> Result<(), Fault> {
        self.set_register(Register::from_name(name)?, value)
    }

    /// Current flags register.
    #[must_use]
    pub const fn flags(&self) -> Flags {
        self.flags
    }

    /// Reads one flag.
    #[must_use]
    pub const fn flag(&self, flag: Flag) -> bool {
        self.flags.get(flag)
    }

    /// Sets or clears one flag.
    pub const fn set_flag(&mut self, flag: Flag, enabled: bool) {
        self.flags.set(flag, enabled);
    }

    pub(crate) const fn flags_mut(&mut self) -> &mut Flags {
        &mut self.flags
    }

    pub(crate) const fn register_file(&self) -> &RegisterFile {
        &self.registers
    }

    /// Bytes of arguments and locals accounted to the current frame.
    #[must_use]
    pub const fn stack_frame_size(&self) -> u64 {
        self.stack_frame_size
    }

    /// Whether an interrupt handler is executing.
    #[must_use]
    pub const fn in_interrupt_handler(&self) -> bool {
        self.in_interrupt_handler
    }

    pub(crate) const fn set_in_interrupt_handler(&mut self, value: bool) {
        self.in_interrupt_handler = value;
    }

    fn fetch_width(&mut self, width: Width) -> Result<u64, Fault> {
        let ip = self.register(Register::Ip)?;
        let value = self.bus.read(ip, width)?;
        self.set_register(Register::Ip, ip.wrapping_add(u64::from(width.bytes())))?;
        Ok(value)
    }

    /// Reads a byte at IP and advances IP past it.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    #[allow(clippy::cast_possible_truncation)]
    pub fn fetch(&mut self) -> Result<u8, Fault> {
        self.fetch_width(Width::Byte).map(|value| value as u8)
    }

    /// Reads a 16-bit value at IP and advances IP past it.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    #[allow(clippy::cast_possible_truncation)]
    pub fn fetch16(&mut self) -> Result<u16, Fault> {
        self.fetch_width(Width::Word).map(|value| value as u16)
    }

    /// Reads a 32-bit value at IP and advances IP past it.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    #[allow(clippy::cast_possible_truncation)]
    pub fn fetch32(&mut self) -> Result<u32, Fault> {
        self.fetch_width(Width::Dword).map(|value| value as u32)
    }

    /// Reads a 64-bit value at IP and advances IP past it.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    pub fn fetch64(&mut self) -> Result<u64, Fault> {
        self.fetch_width(Width::Qword)
    }

    /// Fetches a register selector byte and returns the register's byte
    /// offset in the register file, `(byte % 14) * 8`.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    pub fn fetch_register_index(&mut self) -> Result<u64, Fault> {
        self.fetch_register().map(Register::offset)
    }

    /// Fetches a register selector byte.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    pub fn fetch_register(&mut self) -> Result<Register, Fault> {
        self.fetch().map(Register::from_selector)
    }

    /// Writes `value` at SP, then moves SP down by `width`.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    pub fn push(&mut self, width: Width, value: u64) -> Result<(), Fault> {
        let sp = self.register(Register::Sp)?;
        self.bus.write(sp, width, value)?;
        self.set_register(Register::Sp, sp.wrapping_sub(u64::from(width.bytes())))
    }

    /// Moves SP up by `width`, then reads the value there.
    ///
    /// Only 64-bit pops take part in frame-size accounting.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    pub fn pop(&mut self, width: Width) -> Result<u64, Fault> {
        let sp = self
            .register(Register::Sp)?
            .wrapping_add(u64::from(width.bytes()));
        self.set_register(Register::Sp, sp)?;
        if width == Width::Qword {
            self.stack_frame_size = self.stack_frame_size.wrapping_sub(8);
        }
        self.bus.read(sp, width)
    }

    /// Pushes an 8-bit value.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    pub fn push8(&mut self, value: u8) -> Result<(), Fault> {
        self.push(Width::Byte, value.into())
    }

    /// Pushes a 16-bit value.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    pub fn push16(&mut self, value: u16) -> Result<(), Fault> {
        self.push(Width::Word, value.into())
    }

    /// Pushes a 32-bit value.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    pub fn push32(&mut self, value: u32) -> Result<(), Fault> {
        self.push(Width::Dword, value.into())
    }

    /// Pushes a 64-bit value.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    pub fn push64(&mut self, value: u64) -> Result<(), Fault> {
        self.push(Width::Qword, value)
    }

    /// Pops an 8-bit value.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    #[allow(clippy::cast_possible_truncation)]
    pub fn pop8(&mut self) -> Result<u8, Fault> {
        self.pop(Width::Byte).map(|value| value as u8)
    }

    /// Pops a 16-bit value.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    #[allow(clippy::cast_possible_truncation)]
    pub fn pop16(&mut self) -> Result<u16, Fault> {
        self.pop(Width::Word).map(|value| value as u16)
    }

    /// Pops a 32-bit value.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    #[allow(clippy::cast_possible_truncation)]
    pub fn pop32(&mut self) -> Result<u32, Fault> {
        self.pop(Width::Dword).map(|value| value as u32)
    }

    /// Pops a 64-bit value and shrinks the frame-size counter by 8.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    pub fn pop64(&mut self) -> Result<u64, Fault> {
        self.pop(Width::Qword)
    }

    /// Saves R1..R8, IP and `stack_frame_size + 8`, then starts a new frame
    /// at the current SP.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    pub fn push_state(&mut self) -> Result<(), Fault> {
        for register in Register::GENERAL {
            self.push64(self.register(register)?)?;
        }
        self.push64(self.register(Register::Ip)?)?;
        self.push64(self.stack_frame_size.wrapping_add(8))?;

        self.set_register(Register::Fp, self.register(Register::Sp)?)?;
        self.stack_frame_size = 0;
        Ok(())
    }

    /// Unwinds the frame at FP: restores the frame size, IP and R8..R1,
    /// discards the caller's count-prefixed arguments and moves FP past the
    /// caller's frame.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    pub fn pop_state(&mut self) -> Result<(), Fault> {
        let frame_pointer = self.register(Register::Fp)?;
        self.set_register(Register::Sp, frame_pointer)?;

        let saved_frame_size = self.pop64()?;
        self.stack_frame_size = saved_frame_size;

        let ip = self.pop64()?;
        self.set_register(Register::Ip, ip)?;
        for register in Register::GENERAL.into_iter().rev() {
            let value = self.pop64()?;
            self.set_register(register, value)?;
        }

        let argument_count = self.pop64()?;
        for _ in 0..argument_count {
            self.pop64()?;
        }

        self.set_register(Register::Fp, frame_pointer.wrapping_add(saved_frame_size))
    }

    /// Dispatches interrupt `vector` through the vector table.
    ///
    /// Masked lines (bit `vector % 64` clear in IM) are ignored. Outside a
    /// handler a zero argument count and a full frame are saved first; inside
    /// one, IP is redirected without saving.
    ///
    /// # Errors
    ///
    /// Propagates bus faults.
    pub fn handle_interrupt(&mut self, vector: u16) -> Result<(), Fault> {
        let line = vector % crate::api::INTERRUPT_LINES;
        if self.register(Register::Im)? & (1_u64 << line) == 0 {
            diag!(
                self.config.log_level,
                Level::Debug,
                "interrupt {vector} (line {line}) is masked"
            );
            return Ok(());
        }

        let slot = self
            .config
            .interrupt_vector_base
            .wrapping_add(u64::from(line) * 8);
        let handler = self.bus.read64(slot)?;

        if !self.in_interrupt_handler {
            self.push64(0)?;
            self.push_state()?;
        }

        diag!(
            self.config.log_level,
            Level::Debug,
            "dispatching interrupt {vector} (line {line}) to {handler:#x}"
        );
        self.in_interrupt_handler = true;
        self.set_register(Register::Ip, handler)
    }

    /// Queues interrupt `vector` for delivery before the next fetch.
    pub fn raise_interrupt(&self, vector: u16) {
        self.pending_interrupts.borrow_mut().push_back(vector);
    }

    /// Delivers at most one pending interrupt, then fetches and executes one
    /// instruction. Returns the executed opcode.
    ///
    /// # Errors
    ///
    /// Returns the fault that stopped the instruction.
    pub fn step(&mut self) -> Result<u16, Fault> {
        let pending = self.pending_interrupts.borrow_mut().pop_front();
        if let Some(vector) = pending {
            self.handle_interrupt(vector)?;
        }

        let opcode = self.fetch16()?;
        self.execute(opcode)
    }

    /// Steps until `HLT`, throttled when configured.
    ///
    /// # Errors
    ///
    /// Returns the first fault; a full fault report is logged at error level.
    pub fn run(&mut self) -> Result<RunOutcome, Fault> {
        let throttle = self.config.target_steps_per_second.map(Throttle::new);
        let mut outcome = RunOutcome::default();

        loop {
            let started = Instant::now();
            let opcode = match self.step() {
                Ok(opcode) => opcode,
                Err(fault) => {
                    diag!(
                        self.config.log_level,
                        Level::Error,
                        "{}",
                        debug::fault_report(self, &fault)
                    );
                    return Err(fault);
                }
            };

            if let Some(dump) = self.step_dump()? {
                log::debug!("\n{dump}");
            }

            if opcode == Opcode::Hlt.value() {
                return Ok(outcome);
            }
            outcome.steps += 1;

            if let Some(throttle) = &throttle {
                throttle.pace(started);
            }
        }
    }

    /// Register and flag dump for `debug_each_step`. The flag opts in on its
    /// own, so `log_level` does not filter it.
    fn step_dump(&self) -> Result<Option<String>, Fault> {
        if !self.config.debug_each_step {
            return Ok(None);
        }
        Ok(Some(format!(
            "{}{}",
            debug::render_registers(self)?,
            debug::render_flags(self.flags)
        )))
    }

    /// Drives the core from line commands read from `input`.
    ///
    /// `q` ends the session, a positive number `n` calls `callback` `n`
    /// times, `c` calls it until it reports `HLT`, and any other line calls
    /// it once. Repeated calls stop early on `HLT`. The core never advances
    /// on its own; `callback` must step it.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error or fault.
    pub fn attach_debugger<R, W, F>(
        &mut self,
        mut input: R,
        mut output: W,
        mut callback: F,
    ) -> Result<(), DebuggerError>
    where
        R: BufRead,
        W: Write,
        F: FnMut(&mut Self, &mut W) -> Result<u16, DebuggerError>,
    {
        let halt = Opcode::Hlt.value();
        let mut line = String::new();

        loop {
            write!(output, "> ")?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                return Ok(());
            }

            let repeat = match line.trim() {
                "q" => return Ok(()),
                "c" => None,
                command => Some(command.parse::<u64>().ok().filter(|n| *n > 0).unwrap_or(1)),
            };

            match repeat {
                Some(count) => {
                    for _ in 0..count {
                        if callback(self, &mut output)? == halt {
                            break;
                        }
                    }
                }
                None => while callback(self, &mut output)? != halt {},
            }
        }
    }
}
