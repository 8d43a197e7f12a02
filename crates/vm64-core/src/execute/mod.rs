//! Instruction dispatch.
//!
//! Operands are consumed through the fetch path in stream order, so IP always
//! ends past the whole instruction, whether or not a jump is taken.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    unknown_lints,
    missing_docs
)]

mod flags;
mod helpers;

pub use flags::FlagsUpdate;
pub use helpers::{compare, AluOp, Condition};

use crate::encoding::{Opcode, OperandShape};
use crate::memory::Width;
use crate::state::{Flag, Register};
use crate::{Cpu, Fault};

impl Cpu {
    /// Executes one already-fetched opcode and returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::InvalidOpcode`] for values outside the instruction
    /// set, or any fault raised while consuming operands or touching memory.
    pub fn execute(&mut self, opcode: u16) -> Result<u16, Fault> {
        let Some(op) = Opcode::from_u16(opcode) else {
            let address = self.register(Register::Ip)?.wrapping_sub(2);
            return Err(Fault::InvalidOpcode { opcode, address });
        };

        match op {
            Opcode::Nop | Opcode::Hlt => {}

            Opcode::Ldi => self.load_immediate(Width::Qword)?,
            Opcode::Ldbi => self.load_immediate(Width::Byte)?,
            Opcode::Ldwi => self.load_immediate(Width::Word)?,
            Opcode::Lddi => self.load_immediate(Width::Dword)?,
            Opcode::Ldm => self.load_memory(Width::Qword)?,
            Opcode::Ldbm => self.load_memory(Width::Byte)?,
            Opcode::Ldwm => self.load_memory(Width::Word)?,
            Opcode::Lddm => self.load_memory(Width::Dword)?,
            Opcode::St => self.store(Width::Qword, 0)?,
            Opcode::Stb => self.store(Width::Byte, 7)?,
            Opcode::Stw => self.store(Width::Word, 6)?,
            Opcode::Std => self.store(Width::Dword, 4)?,
            Opcode::Tf => {
                let destination = self.fetch_register()?;
                let source = self.fetch_register()?;
                self.set_register(destination, self.register(source)?)?;
            }

            Opcode::Addi | Opcode::Add => self.execute_alu(op, AluOp::Add)?,
            Opcode::Subi | Opcode::Sub => self.execute_alu(op, AluOp::Sub)?,
            Opcode::Muli | Opcode::Mul => self.execute_alu(op, AluOp::Mul)?,
            Opcode::Divi | Opcode::Div => self.execute_alu(op, AluOp::Div)?,
            Opcode::Modi | Opcode::Mod => self.execute_alu(op, AluOp::Mod)?,
            Opcode::Mulis | Opcode::Muls => self.execute_alu(op, AluOp::MulSigned)?,
            Opcode::Divis | Opcode::Divs => self.execute_alu(op, AluOp::DivSigned)?,
            Opcode::Andi | Opcode::And => self.execute_alu(op, AluOp::And)?,
            Opcode::Ori | Opcode::Or => self.execute_alu(op, AluOp::Or)?,
            Opcode::Xori | Opcode::Xor => self.execute_alu(op, AluOp::Xor)?,
            Opcode::Noti | Opcode::Not => self.execute_alu(op, AluOp::Not)?,
            Opcode::Shli | Opcode::Shl => self.execute_alu(op, AluOp::Shl)?,
            Opcode::Shri | Opcode::Shr => self.execute_alu(op, AluOp::Shr)?,
            Opcode::Rori | Opcode::Ror => self.execute_alu(op, AluOp::Ror)?,
            Opcode::Roli | Opcode::Rol => self.execute_alu(op, AluOp::Rol)?,

            Opcode::Cmp | Opcode::Cmpi => {
                let (register, rhs) = self.register_and_operand(op)?;
                compare(self.register(register)?, rhs).apply(self.flags_mut());
            }

            Opcode::Jmp | Opcode::Jmpr => self.jump(op, Condition::Always, false)?,
            Opcode::Jeq | Opcode::Jeqr => self.jump(op, Condition::Equal, false)?,
            Opcode::Jne | Opcode::Jner => self.jump(op, Condition::NotEqual, false)?,
            Opcode::Jgt | Opcode::Jgtr => self.jump(op, Condition::Greater, false)?,
            Opcode::Jlt | Opcode::Jltr => self.jump(op, Condition::Less, false)?,
            Opcode::Jge | Opcode::Jger => self.jump(op, Condition::GreaterOrEqual, false)?,
            Opcode::Jle | Opcode::Jler => self.jump(op, Condition::LessOrEqual, false)?,

            Opcode::Bra | Opcode::Brar => self.jump(op, Condition::Always, true)?,
            Opcode::Beq | Opcode::Beqr => self.jump(op, Condition::Equal, true)?,
            Opcode::Bne | Opcode::Bner => self.jump(op, Condition::NotEqual, true)?,
            Opcode::Bgt | Opcode::Bgtr => self.jump(op, Condition::Greater, true)?,
            Opcode::Blt | Opcode::Bltr => self.jump(op, Condition::Less, true)?,
            Opcode::Bge | Opcode::Bger => self.jump(op, Condition::GreaterOrEqual, true)?,
            Opcode::Ble | Opcode::Bler => self.jump(op, Condition::LessOrEqual, true)?,

            Opcode::Ret => {
                let address = self.pop64()?;
                self.set_register(Register::Ip, address)?;
            }

            Opcode::Push => {
                let register = self.fetch_register()?;
                self.push64(self.register(register)?)?;
            }
            Opcode::Pushi => {
                let value = self.fetch64()?;
                self.push64(value)?;
            }
            Opcode::Pop => {
                let register = self.fetch_register()?;
                let value = self.pop64()?;
                self.set_register(register, value)?;
            }

            Opcode::Call => {
                let target = self.fetch64()?;
                self.call(target)?;
            }
            Opcode::Callr => {
                let register = self.fetch_register()?;
                let target = self.register(register)?;
                self.call(target)?;
            }
            Opcode::Rtc => self.pop_state()?,

            Opcode::Clc => self.set_flag(Flag::Carry, false),
            Opcode::Sec => self.set_flag(Flag::Carry, true),
            Opcode::Clz => self.set_flag(Flag::Zero, false),
            Opcode::Sez => self.set_flag(Flag::Zero, true),
            Opcode::Cln => self.set_flag(Flag::Negative, false),
            Opcode::Sen => self.set_flag(Flag::Negative, true),
            Opcode::Clv => self.set_flag(Flag::Overflow, false),
            Opcode::Sev => self.set_flag(Flag::Overflow, true),
            Opcode::Cli => self.set_flag(Flag::Interrupt, false),
            Opcode::Sei => self.set_flag(Flag::Interrupt, true),

            Opcode::Int => {
                let vector = self.fetch16()?;
                self.handle_interrupt(vector)?;
            }
            Opcode::Rti => {
                self.set_in_interrupt_handler(false);
                self.pop_state()?;
            }
        }

        Ok(opcode)
    }

    fn register_and_operand(&mut self, op: Opcode) -> Result<(Register, u64), Fault> {
        let register = self.fetch_register()?;
        let operand = match op.shape() {
            OperandShape::RegisterRegister => {
                let source = self.fetch_register()?;
                self.register(source)?
            }
            _ => self.fetch64()?,
        };
        Ok((register, operand))
    }

    fn execute_alu(&mut self, op: Opcode, alu: AluOp) -> Result<(), Fault> {
        let (destination, rhs) = self.register_and_operand(op)?;
        let (result, update) = alu.apply(self.register(destination)?, rhs);
        self.set_register(destination, result)?;
        update.apply(self.flags_mut());
        Ok(())
    }

    /// Branches (`links`) push the return address before jumping.
    fn jump(&mut self, op: Opcode, condition: Condition, links: bool) -> Result<(), Fault> {
        let target = match op.shape() {
            OperandShape::Register => {
                let register = self.fetch_register()?;
                self.register(register)?
            }
            _ => self.fetch64()?,
        };
        if !condition.holds(self.flags()) {
            return Ok(());
        }
        if links {
            self.push64(self.register(Register::Ip)?)?;
        }
        self.set_register(Register::Ip, target)
    }

    fn call(&mut self, target: u64) -> Result<(), Fault> {
        self.push_state()?;
        self.set_register(Register::Ip, target)
    }

    fn load_immediate(&mut self, width: Width) -> Result<(), Fault> {
        let register = self.fetch_register()?;
        let value = match width {
            Width::Byte => u64::from(self.fetch()?),
            Width::Word => u64::from(self.fetch16()?),
            Width::Dword => u64::from(self.fetch32()?),
            Width::Qword => self.fetch64()?,
        };
        self.set_register(register, value)
    }

    fn load_memory(&mut self, width: Width) -> Result<(), Fault> {
        let register = self.fetch_register()?;
        let address = self.fetch64()?;
        let value = self.bus().read(address, width)?;
        self.set_register(register, value)
    }

    /// Narrow stores take the slice at `slice_offset` within the register's
    /// 8-byte span in the register file.
    fn store(&mut self, width: Width, slice_offset: u64) -> Result<(), Fault> {
        let offset = self.fetch_register_index()?;
        let address = self.fetch64()?;
        let value = self.register_file().read(offset + slice_offset, width)?;
        self.bus_mut().write(address, width, value)
    }
}
