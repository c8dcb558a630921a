//! The NCS virtual machine instruction set.
//!
//! Every instruction is encoded as an opcode byte followed by a type
//! qualifier byte and a variable number of big-endian operands.

use anyhow::{bail, Result};

/// VM opcodes of compiled NWScript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    CpDownSp,
    RsAdd,
    CpTopSp,
    Const,
    Action,
    LogAnd,
    LogOr,
    IncOr,
    ExcOr,
    BoolAnd,
    Eq,
    Neq,
    Geq,
    Gt,
    Lt,
    Leq,
    ShLeft,
    ShRight,
    UShRight,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Comp,
    MovSp,
    StoreStateAll,
    Jmp,
    Jsr,
    Jz,
    Retn,
    Destruct,
    Not,
    DecSp,
    IncSp,
    Jnz,
    CpDownBp,
    CpTopBp,
    DecBp,
    IncBp,
    SaveBp,
    RestoreBp,
    StoreState,
    Nop,
    WriteArray,
    ReadArray,
    GetRef,
    GetRefArray,
}

impl Opcode {
    pub fn from_byte(b: u8) -> Result<Opcode> {
        use Opcode::*;
        Ok(match b {
            0x01 => CpDownSp,
            0x02 => RsAdd,
            0x03 => CpTopSp,
            0x04 => Const,
            0x05 => Action,
            0x06 => LogAnd,
            0x07 => LogOr,
            0x08 => IncOr,
            0x09 => ExcOr,
            0x0A => BoolAnd,
            0x0B => Eq,
            0x0C => Neq,
            0x0D => Geq,
            0x0E => Gt,
            0x0F => Lt,
            0x10 => Leq,
            0x11 => ShLeft,
            0x12 => ShRight,
            0x13 => UShRight,
            0x14 => Add,
            0x15 => Sub,
            0x16 => Mul,
            0x17 => Div,
            0x18 => Mod,
            0x19 => Neg,
            0x1A => Comp,
            0x1B => MovSp,
            0x1C => StoreStateAll,
            0x1D => Jmp,
            0x1E => Jsr,
            0x1F => Jz,
            0x20 => Retn,
            0x21 => Destruct,
            0x22 => Not,
            0x23 => DecSp,
            0x24 => IncSp,
            0x25 => Jnz,
            0x26 => CpDownBp,
            0x27 => CpTopBp,
            0x28 => DecBp,
            0x29 => IncBp,
            0x2A => SaveBp,
            0x2B => RestoreBp,
            0x2C => StoreState,
            0x2D => Nop,
            0x30 => WriteArray,
            0x32 => ReadArray,
            0x37 => GetRef,
            0x39 => GetRefArray,
            _ => bail!("unknown opcode 0x{:02X}", b),
        })
    }

    pub fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            CpDownSp => "CPDOWNSP",
            RsAdd => "RSADD",
            CpTopSp => "CPTOPSP",
            Const => "CONST",
            Action => "ACTION",
            LogAnd => "LOGAND",
            LogOr => "LOGOR",
            IncOr => "INCOR",
            ExcOr => "EXCOR",
            BoolAnd => "BOOLAND",
            Eq => "EQ",
            Neq => "NEQ",
            Geq => "GEQ",
            Gt => "GT",
            Lt => "LT",
            Leq => "LEQ",
            ShLeft => "SHLEFT",
            ShRight => "SHRIGHT",
            UShRight => "USHRIGHT",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Mod => "MOD",
            Neg => "NEG",
            Comp => "COMP",
            MovSp => "MOVSP",
            StoreStateAll => "STORESTATEALL",
            Jmp => "JMP",
            Jsr => "JSR",
            Jz => "JZ",
            Retn => "RETN",
            Destruct => "DESTRUCT",
            Not => "NOT",
            DecSp => "DECSP",
            IncSp => "INCSP",
            Jnz => "JNZ",
            CpDownBp => "CPDOWNBP",
            CpTopBp => "CPTOPBP",
            DecBp => "DECBP",
            IncBp => "INCBP",
            SaveBp => "SAVEBP",
            RestoreBp => "RESTOREBP",
            StoreState => "STORESTATE",
            Nop => "NOP",
            WriteArray => "WRITEARRAY",
            ReadArray => "READARRAY",
            GetRef => "GETREF",
            GetRefArray => "GETREFARRAY",
        }
    }

    /// True for the jump family whose first operand is a relative offset.
    pub fn is_jump(self) -> bool {
        matches!(self, Opcode::Jmp | Opcode::Jsr | Opcode::Jz | Opcode::Jnz)
    }

    /// True when control never falls through to the next instruction.
    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Jmp | Opcode::Retn)
    }
}

/// The operand-type qualifier byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionType {
    None,
    Direct,
    Int,
    Float,
    String,
    Object,
    /// Engine type 0..5 (effect, event, ...; game-specific).
    Engine(u8),
    IntInt,
    FloatFloat,
    ObjectObject,
    StringString,
    StructStruct,
    IntFloat,
    FloatInt,
    EnginePair(u8),
    VectorVector,
    VectorFloat,
    FloatVector,
}

impl InstructionType {
    pub fn from_byte(b: u8) -> Result<InstructionType> {
        use InstructionType::*;
        Ok(match b {
            0x00 => None,
            0x01 => Direct,
            0x03 => Int,
            0x04 => Float,
            0x05 => String,
            0x06 => Object,
            0x10..=0x15 => Engine(b - 0x10),
            0x20 => IntInt,
            0x21 => FloatFloat,
            0x22 => ObjectObject,
            0x23 => StringString,
            0x24 => StructStruct,
            0x25 => IntFloat,
            0x26 => FloatInt,
            0x30..=0x35 => EnginePair(b - 0x30),
            0x3A => VectorVector,
            0x3B => VectorFloat,
            0x3C => FloatVector,
            _ => bail!("unknown instruction type 0x{:02X}", b),
        })
    }

    /// The mnemonic suffix, e.g. `II` in `EQII`.
    pub fn suffix(self) -> String {
        use InstructionType::*;
        match self {
            None | Direct => std::string::String::new(),
            Int => "I".to_string(),
            Float => "F".to_string(),
            String => "S".to_string(),
            Object => "O".to_string(),
            Engine(i) => format!("E{}", i),
            IntInt => "II".to_string(),
            FloatFloat => "FF".to_string(),
            ObjectObject => "OO".to_string(),
            StringString => "SS".to_string(),
            StructStruct => "TT".to_string(),
            IntFloat => "IF".to_string(),
            FloatInt => "FI".to_string(),
            EnginePair(i) => format!("E{0}E{0}", i),
            VectorVector => "VV".to_string(),
            VectorFloat => "VF".to_string(),
            FloatVector => "FV".to_string(),
        }
    }
}
