//! Machine state (C1) and the fetch-execute driver (C7).

use crate::cpu::{self, VmError};
use crate::host::Io;
use crate::image_loader;
use crate::instruction::Instruction;
use crate::memory::Memory;
use crate::registers::{Condition, Registers};
use crate::trap::Outcome;
use std::io;

pub const PC_START: u16 = 0x3000;

pub enum StopReason {
    Halted,
}

pub struct Vm {
    registers: Registers,
    memory: Memory,
    io: Box<dyn Io>,
}

impl Vm {
    pub fn new(io: Box<dyn Io>) -> Self {
        Self {
            registers: Registers::new(),
            memory: Memory::new(),
            io,
        }
    }

    /// Loads one object image, in place, at its recorded origin.
    pub fn load_image(&mut self, path: &str) -> io::Result<usize> {
        image_loader::load(path, &mut self.memory)
    }

    /// Resets `PC` to the conventional load address and `COND` to `ZRO`,
    /// as the driver contract requires after loading every image.
    pub fn reset_entry_point(&mut self) {
        self.registers.pc = PC_START;
        self.registers.condition = Condition::Zro;
    }

    /// Runs the fetch-execute loop until `TRAP_HALT` or an illegal opcode.
    pub fn run(&mut self) -> Result<StopReason, VmError> {
        loop {
            let instruction = self.memory.read(self.registers.pc, &mut *self.io);
            self.registers.pc = self.registers.pc.wrapping_add(1);

            let decoded = Instruction::decode(instruction);
            match cpu::execute(decoded, &mut self.registers, &mut self.memory, &mut *self.io)? {
                Outcome::Continue => {}
                Outcome::Halt => return Ok(StopReason::Halted),
            }
        }
    }

    #[cfg(test)]
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    #[cfg(test)]
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }
}
