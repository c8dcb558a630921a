//! Decoding of raw NCS images into the instruction arena.
//!
//! An NCS file is the 8-byte magic `"NCS V1.0"`, a `0x42` tag byte with the
//! total file size as big-endian u32, then the instruction stream: opcode
//! byte, type byte, operands. Addresses are absolute file offsets, so the
//! first instruction sits at 0x0D.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use anyhow::{bail, Context, Result};
use byteorder::{BigEndian, ReadBytesExt};

use crate::cfg;
use crate::game::GameId;
use crate::model::{AddressKind, ConstValue, Instruction, NcsProgram};
use crate::opcode::{InstructionType, Opcode};

const MAGIC: &[u8; 8] = b"NCS V1.0";
const TAG_SCRIPT_SIZE: u8 = 0x42;
const HEADER_SIZE: usize = 13;

/// Parse a whole NCS image into a program with instructions, blocks and
/// subroutines. Stack analysis is not performed.
pub fn load_ncs(buf: &[u8], game: GameId) -> Result<NcsProgram> {
    if buf.len() < HEADER_SIZE {
        bail!("bytecode too small: {} bytes", buf.len());
    }
    if &buf[0..8] != MAGIC {
        bail!("magic mismatch: expect {:?}, got {:?}", MAGIC, &buf[0..8]);
    }

    let mut cur = Cursor::new(buf);
    cur.set_position(8);

    let tag = cur.read_u8().context("read size tag")?;
    if tag != TAG_SCRIPT_SIZE {
        bail!("missing script size tag: got 0x{:02X}", tag);
    }
    let size = cur.read_u32::<BigEndian>().context("read script size")?;
    if size as usize != buf.len() {
        bail!("script size mismatch: header={}, actual={}", size, buf.len());
    }

    let mut program = NcsProgram::new(game);
    program.size = size;

    while (cur.position() as usize) < buf.len() {
        let at = cur.position();
        let instr = decode_instruction(buf, &mut cur)
            .with_context(|| format!("decode instruction at 0x{:08x}", at))?;
        program.instructions.push(instr);
    }

    link_instructions(&mut program)?;
    cfg::build_cfg(&mut program)?;

    Ok(program)
}

fn decode_instruction(buf: &[u8], cur: &mut Cursor<&[u8]>) -> Result<Instruction> {
    let start = cur.position();
    let address = start as u32;

    let opcode = Opcode::from_byte(cur.read_u8().context("read opcode")?)?;
    let itype = InstructionType::from_byte(cur.read_u8().context("read instruction type")?)?;

    let mut instr = Instruction::new(address, opcode, itype);

    match opcode {
        Opcode::CpDownSp | Opcode::CpTopSp | Opcode::CpDownBp | Opcode::CpTopBp => {
            instr.args.push(cur.read_i32::<BigEndian>()?);
            instr.args.push(cur.read_u16::<BigEndian>()? as i32);
        }

        Opcode::Const => match itype {
            InstructionType::Int => {
                instr.const_value = Some(ConstValue::Int(cur.read_i32::<BigEndian>()?));
            }
            InstructionType::Float => {
                instr.const_value = Some(ConstValue::Float(cur.read_f32::<BigEndian>()?));
            }
            InstructionType::String => {
                let len = cur.read_u16::<BigEndian>()? as usize;
                let mut raw = vec![0u8; len];
                cur.read_exact(&mut raw).context("read CONST string")?;
                let s = raw.iter().map(|&b| b as char).collect::<String>();
                instr.const_value = Some(ConstValue::String(s));
            }
            InstructionType::Object => {
                instr.const_value = Some(ConstValue::Object(cur.read_u32::<BigEndian>()?));
            }
            _ => bail!("bad CONST type {:?}", itype),
        },

        Opcode::Action => {
            instr.args.push(cur.read_u16::<BigEndian>()? as i32);
            instr.args.push(cur.read_u8()? as i32);
        }

        Opcode::Eq | Opcode::Neq => {
            // Struct comparisons carry the compared byte size.
            if itype == InstructionType::StructStruct {
                instr.args.push(cur.read_u16::<BigEndian>()? as i32);
            }
        }

        Opcode::MovSp | Opcode::DecSp | Opcode::IncSp | Opcode::DecBp | Opcode::IncBp => {
            instr.args.push(cur.read_i32::<BigEndian>()?);
        }

        Opcode::Jmp | Opcode::Jsr | Opcode::Jz | Opcode::Jnz => {
            instr.args.push(cur.read_i32::<BigEndian>()?);
        }

        Opcode::Destruct => {
            instr.args.push(cur.read_u16::<BigEndian>()? as i32);
            instr.args.push(cur.read_i16::<BigEndian>()? as i32);
            instr.args.push(cur.read_u16::<BigEndian>()? as i32);
        }

        Opcode::StoreState => {
            instr.args.push(cur.read_u32::<BigEndian>()? as i32);
            instr.args.push(cur.read_u32::<BigEndian>()? as i32);
        }

        Opcode::StoreStateAll => {
            instr.args.push(cur.read_u8()? as i32);
        }

        Opcode::WriteArray
        | Opcode::ReadArray
        | Opcode::GetRef
        | Opcode::GetRefArray => {
            instr.args.push(cur.read_i32::<BigEndian>()?);
            instr.args.push(cur.read_u16::<BigEndian>()? as i32);
        }

        // No operands beyond the type byte.
        Opcode::RsAdd
        | Opcode::LogAnd
        | Opcode::LogOr
        | Opcode::IncOr
        | Opcode::ExcOr
        | Opcode::BoolAnd
        | Opcode::Geq
        | Opcode::Gt
        | Opcode::Lt
        | Opcode::Leq
        | Opcode::ShLeft
        | Opcode::ShRight
        | Opcode::UShRight
        | Opcode::Add
        | Opcode::Sub
        | Opcode::Mul
        | Opcode::Div
        | Opcode::Mod
        | Opcode::Neg
        | Opcode::Comp
        | Opcode::Not
        | Opcode::Retn
        | Opcode::SaveBp
        | Opcode::RestoreBp
        | Opcode::Nop => {}
    }

    let end = cur.position();
    instr.bytes = buf[start as usize..end as usize].to_vec();

    Ok(instr)
}

/// Resolve followers, branch targets and address kinds over the decoded
/// instruction list.
fn link_instructions(program: &mut NcsProgram) -> Result<()> {
    let mut by_address: HashMap<u32, usize> = HashMap::new();
    for (i, instr) in program.instructions.iter().enumerate() {
        by_address.insert(instr.address, i);
    }

    let count = program.instructions.len();

    // Followers first: linear successor unless control never falls through.
    for i in 0..count {
        let instr = &program.instructions[i];
        let follower = if instr.opcode.is_terminator() || i + 1 == count {
            None
        } else {
            Some(i + 1)
        };
        program.instructions[i].follower = follower;
    }

    // Branch targets.
    for i in 0..count {
        let instr = &program.instructions[i];

        let branches = match instr.opcode {
            Opcode::Jmp | Opcode::Jsr => {
                let target = branch_target(&by_address, instr.address, instr.args[0])?;
                vec![target]
            }
            Opcode::Jz | Opcode::Jnz => {
                let target = branch_target(&by_address, instr.address, instr.args[0])?;
                match instr.follower {
                    Some(f) => vec![target, f],
                    None => vec![target],
                }
            }
            Opcode::StoreState => {
                // The stored resume point is the code behind the JMP that
                // immediately follows the STORESTATE.
                match instr.follower {
                    Some(f) if program.instructions[f].opcode == Opcode::Jmp => {
                        match by_address.get(
                            &(program.instructions[f].address
                                + program.instructions[f].bytes.len() as u32),
                        ) {
                            Some(&t) => vec![t],
                            None => Vec::new(),
                        }
                    }
                    _ => Vec::new(),
                }
            }
            _ => Vec::new(),
        };

        program.instructions[i].branches = branches;
    }

    // Address kinds, most significant kind wins.
    for i in 0..count {
        let (opcode, target, follower) = {
            let instr = &program.instructions[i];
            (instr.opcode, instr.branches.first().copied(), instr.follower)
        };

        match opcode {
            Opcode::Jmp | Opcode::Jz | Opcode::Jnz => {
                if let Some(target) = target {
                    mark_address(program, target, AddressKind::JumpTarget);
                }
            }
            Opcode::Jsr => {
                if let Some(target) = target {
                    mark_address(program, target, AddressKind::SubRoutine);
                }
                if let Some(f) = follower {
                    mark_address(program, f, AddressKind::Tail);
                }
            }
            Opcode::StoreState => {
                if let Some(target) = target {
                    mark_address(program, target, AddressKind::StoreState);
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn branch_target(by_address: &HashMap<u32, usize>, address: u32, offset: i32) -> Result<usize> {
    let target = address as i64 + offset as i64;
    if target < 0 {
        bail!("branch target underflow at 0x{:08x}", address);
    }
    match by_address.get(&(target as u32)) {
        Some(&i) => Ok(i),
        None => bail!(
            "branch target 0x{:08x} is not an instruction boundary",
            target
        ),
    }
}

fn mark_address(program: &mut NcsProgram, instr: usize, kind: AddressKind) {
    let current = program.instructions[instr].address_kind;
    let rank = |k: AddressKind| match k {
        AddressKind::None => 0,
        AddressKind::Tail => 1,
        AddressKind::JumpTarget => 2,
        AddressKind::StoreState => 3,
        AddressKind::SubRoutine => 4,
    };
    if rank(kind) > rank(current) {
        program.instructions[instr].address_kind = kind;
    }
}
