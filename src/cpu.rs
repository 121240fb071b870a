//! The decoder + executor (C4): dispatches one decoded `Instruction`
//! against the machine state, mutating registers and memory in place.

use crate::host::Io;
use crate::instruction::{Condition, Instruction, Register::*};
use crate::memory::Memory;
use crate::registers::{Condition as Flag, Registers};
use crate::sign_extend::SignExtend;
use crate::trap::{self, Outcome};
use std::io;

#[derive(Debug)]
pub enum VmError {
    IllegalOpcode(String),
}

/// Executes one already-fetched instruction. `registers.pc` must already
/// hold the address *after* the fetch, since offsets are relative to the
/// incremented PC.
pub fn execute(
    instruction: Instruction,
    registers: &mut Registers,
    memory: &mut Memory,
    io: &mut dyn Io,
) -> Result<Outcome, VmError> {
    match instruction {
        Instruction::Br(Condition { n, z, p }, pc_offset) => {
            let taken = (n && registers.condition == Flag::Neg)
                || (z && registers.condition == Flag::Zro)
                || (p && registers.condition == Flag::Pos);

            if taken {
                registers.pc = registers.pc.wrapping_add(pc_offset.sign_extend(9));
            }
            Ok(Outcome::Continue)
        }

        Instruction::Add(dr, sr1, sr2) => {
            let value = registers.read(sr1).wrapping_add(registers.read(sr2));
            registers.write(dr, value);
            registers.update_flags(dr);
            Ok(Outcome::Continue)
        }

        Instruction::AddImm(dr, sr1, imm5) => {
            let value = registers.read(sr1).wrapping_add(imm5.sign_extend(5));
            registers.write(dr, value);
            registers.update_flags(dr);
            Ok(Outcome::Continue)
        }

        Instruction::Ld(dr, pc_offset) => {
            let address = registers.pc.wrapping_add(pc_offset.sign_extend(9));
            let value = memory.read(address, io);
            registers.write(dr, value);
            registers.update_flags(dr);
            Ok(Outcome::Continue)
        }

        Instruction::St(sr, pc_offset) => {
            let address = registers.pc.wrapping_add(pc_offset.sign_extend(9));
            memory.write(address, registers.read(sr));
            Ok(Outcome::Continue)
        }

        Instruction::Jsr(pc_offset) => {
            let return_address = registers.pc;
            registers.pc = registers.pc.wrapping_add(pc_offset.sign_extend(11));
            registers.write(R7, return_address);
            Ok(Outcome::Continue)
        }

        Instruction::Jsrr(base_r) => {
            let return_address = registers.pc;
            registers.pc = registers.read(base_r);
            registers.write(R7, return_address);
            Ok(Outcome::Continue)
        }

        Instruction::And(dr, sr1, sr2) => {
            let value = registers.read(sr1) & registers.read(sr2);
            registers.write(dr, value);
            registers.update_flags(dr);
            Ok(Outcome::Continue)
        }

        Instruction::AndImm(dr, sr1, imm5) => {
            let value = registers.read(sr1) & imm5.sign_extend(5);
            registers.write(dr, value);
            registers.update_flags(dr);
            Ok(Outcome::Continue)
        }

        Instruction::Ldr(dr, base_r, offset) => {
            let address = registers.read(base_r).wrapping_add(offset.sign_extend(6));
            let value = memory.read(address, io);
            registers.write(dr, value);
            registers.update_flags(dr);
            Ok(Outcome::Continue)
        }

        Instruction::Str(sr, base_r, offset) => {
            let address = registers.read(base_r).wrapping_add(offset.sign_extend(6));
            memory.write(address, registers.read(sr));
            Ok(Outcome::Continue)
        }

        Instruction::Rti => Err(VmError::IllegalOpcode("RTI".to_string())),

        Instruction::Not(dr, sr) => {
            registers.write(dr, !registers.read(sr));
            registers.update_flags(dr);
            Ok(Outcome::Continue)
        }

        Instruction::Ldi(dr, pc_offset) => {
            let indirect = memory.read(registers.pc.wrapping_add(pc_offset.sign_extend(9)), io);
            let value = memory.read(indirect, io);
            registers.write(dr, value);
            registers.update_flags(dr);
            Ok(Outcome::Continue)
        }

        Instruction::Sti(sr, pc_offset) => {
            let indirect = memory.read(registers.pc.wrapping_add(pc_offset.sign_extend(9)), io);
            memory.write(indirect, registers.read(sr));
            Ok(Outcome::Continue)
        }

        Instruction::Jmp(base_r) => {
            registers.pc = registers.read(base_r);
            Ok(Outcome::Continue)
        }

        Instruction::Res => Err(VmError::IllegalOpcode("RES".to_string())),

        Instruction::Lea(dr, pc_offset) => {
            registers.write(dr, registers.pc.wrapping_add(pc_offset.sign_extend(9)));
            Ok(Outcome::Continue)
        }

        Instruction::Trap(trap_vector) => {
            registers.write(R7, registers.pc);
            trap::execute(trap_vector, registers, memory, io).map_err(vm_io_error)
        }
    }
}

fn vm_io_error(error: io::Error) -> VmError {
    // A trap routine's underlying stdin/stdout call failed. There is no
    // recognized recovery at the instruction level; surface it the same
    // way an illegal opcode is surfaced, so the driver aborts cleanly.
    VmError::IllegalOpcode(format!("trap I/O error: {}", error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockIo;
    use crate::instruction::Register::*;
    use crate::trap::TrapVector;

    fn new_machine() -> (Registers, Memory, MockIo) {
        let mut registers = Registers::new();
        registers.pc = 0x3000;
        (registers, Memory::new(), MockIo::new(&[]))
    }

    #[test]
    fn add_register_mode() {
        let (mut registers, mut memory, mut io) = new_machine();
        registers.write(R1, 3);
        registers.write(R2, 2);

        execute(Instruction::Add(R3, R1, R2), &mut registers, &mut memory, &mut io).unwrap();

        assert_eq!(registers.read(R3), 5);
        assert_eq!(registers.condition, Flag::Pos);
    }

    #[test]
    fn add_immediate_mode() {
        let (mut registers, mut memory, mut io) = new_machine();
        registers.write(R1, 3);

        execute(
            Instruction::AddImm(R2, R1, 1),
            &mut registers,
            &mut memory,
            &mut io,
        )
        .unwrap();

        assert_eq!(registers.read(R2), 4);
        assert_eq!(registers.condition, Flag::Pos);
    }

    #[test]
    fn ldi_indirection() {
        let (mut registers, mut memory, mut io) = new_machine();
        memory.write(0x3001, 0x3002);
        memory.write(0x3002, 42);

        execute(Instruction::Ldi(R0, 1), &mut registers, &mut memory, &mut io).unwrap();

        assert_eq!(registers.read(R0), 42);
        assert_eq!(registers.condition, Flag::Pos);
    }

    #[test]
    fn jmp_and_ret() {
        let (mut registers, mut memory, mut io) = new_machine();
        registers.write(R7, 0x4000);

        execute(Instruction::Jmp(R7), &mut registers, &mut memory, &mut io).unwrap();

        assert_eq!(registers.pc, 0x4000);
    }

    #[test]
    fn br_taken_on_matching_flag() {
        let (mut registers, mut memory, mut io) = new_machine();
        registers.condition = Flag::Neg;

        let condition = Condition {
            n: true,
            z: false,
            p: false,
        };
        execute(Instruction::Br(condition, 5), &mut registers, &mut memory, &mut io).unwrap();

        assert_eq!(registers.pc, 0x3005);
    }

    #[test]
    fn br_not_taken_on_mismatched_flag() {
        let (mut registers, mut memory, mut io) = new_machine();
        registers.condition = Flag::Pos;

        let condition = Condition {
            n: true,
            z: false,
            p: false,
        };
        execute(Instruction::Br(condition, 5), &mut registers, &mut memory, &mut io).unwrap();

        assert_eq!(registers.pc, 0x3000);
    }

    #[test]
    fn br_max_negative_offset_lands_on_target() {
        let (mut registers, mut memory, mut io) = new_machine();
        registers.condition = Flag::Zro;
        registers.pc = 0x3100;

        let condition = Condition {
            n: false,
            z: true,
            p: false,
        };
        // -256 as a 9-bit field: 0b1_0000_0000
        execute(
            Instruction::Br(condition, 0b1_0000_0000),
            &mut registers,
            &mut memory,
            &mut io,
        )
        .unwrap();

        assert_eq!(registers.pc, 0x3000);
    }

    #[test]
    fn jsr_long_form_saves_r7_and_jumps() {
        let (mut registers, mut memory, mut io) = new_machine();

        execute(Instruction::Jsr(0), &mut registers, &mut memory, &mut io).unwrap();

        assert_eq!(registers.pc, 0x3000);
        assert_eq!(registers.read(R7), 0x3000);
    }

    #[test]
    fn jsr_max_negative_offset() {
        let (mut registers, mut memory, mut io) = new_machine();
        registers.pc = 0x3400;

        // -1024 as an 11-bit field: 0b100_0000_0000
        execute(
            Instruction::Jsr(0b100_0000_0000),
            &mut registers,
            &mut memory,
            &mut io,
        )
        .unwrap();

        assert_eq!(registers.pc, 0x3000);
        assert_eq!(registers.read(R7), 0x3400);
    }

    #[test]
    fn jsrr_saves_r7_and_jumps_to_base_register() {
        let (mut registers, mut memory, mut io) = new_machine();
        registers.write(R3, 0x5000);

        execute(Instruction::Jsrr(R3), &mut registers, &mut memory, &mut io).unwrap();

        assert_eq!(registers.pc, 0x5000);
        assert_eq!(registers.read(R7), 0x3000);
    }

    #[test]
    fn not_complements_bits_and_double_not_restores_value() {
        let (mut registers, mut memory, mut io) = new_machine();
        let original = 0b1111_1111_1101_0110;
        registers.write(R2, original);

        execute(Instruction::Not(R1, R2), &mut registers, &mut memory, &mut io).unwrap();
        let complemented = registers.read(R1);
        assert_eq!(complemented, !original);

        execute(Instruction::Not(R3, R1), &mut registers, &mut memory, &mut io).unwrap();
        assert_eq!(registers.read(R3), original);
    }

    #[test]
    fn ldr_and_str_round_trip_through_memory() {
        let (mut registers, mut memory, mut io) = new_machine();
        registers.write(R2, 0x4000);

        execute(
            Instruction::Str(R1, R2, 3),
            &mut registers,
            &mut memory,
            &mut io,
        )
        .unwrap();
        registers.write(R1, 99);
        execute(
            Instruction::Str(R1, R2, 3),
            &mut registers,
            &mut memory,
            &mut io,
        )
        .unwrap();

        execute(
            Instruction::Ldr(R3, R2, 3),
            &mut registers,
            &mut memory,
            &mut io,
        )
        .unwrap();
        assert_eq!(registers.read(R3), 99);
    }

    #[test]
    fn lea_computes_address_without_reading_memory() {
        let (mut registers, mut memory, mut io) = new_machine();

        execute(Instruction::Lea(R1, 2), &mut registers, &mut memory, &mut io).unwrap();

        assert_eq!(registers.read(R1), 0x3002);
    }

    #[test]
    fn trap_saves_r7_before_dispatch() {
        let (mut registers, mut memory, mut io) = new_machine();

        execute(
            Instruction::Trap(TrapVector::Halt),
            &mut registers,
            &mut memory,
            &mut io,
        )
        .unwrap();

        assert_eq!(registers.read(R7), 0x3000);
    }

    #[test]
    fn trap_halt_signals_outcome_halt() {
        let (mut registers, mut memory, mut io) = new_machine();

        let outcome = execute(
            Instruction::Trap(TrapVector::Halt),
            &mut registers,
            &mut memory,
            &mut io,
        )
        .unwrap();

        assert!(matches!(outcome, Outcome::Halt));
    }

    #[test]
    fn rti_is_illegal() {
        let (mut registers, mut memory, mut io) = new_machine();

        let result = execute(Instruction::Rti, &mut registers, &mut memory, &mut io);

        assert!(matches!(result, Err(VmError::IllegalOpcode(_))));
    }

    #[test]
    fn res_is_illegal() {
        let (mut registers, mut memory, mut io) = new_machine();

        let result = execute(Instruction::Res, &mut registers, &mut memory, &mut io);

        assert!(matches!(result, Err(VmError::IllegalOpcode(_))));
    }
}
