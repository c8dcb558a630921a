//! Pure text-formatting helpers shared by the output modes.

use std::fmt::Write as _;

use crate::game;
use crate::model::{
    AddressKind, ConstValue, Instruction, NcsProgram, SubRoutine, SubRoutineKind, Variable,
    VariableType,
};

/// Hex dump of an instruction's raw bytes, space separated.
pub fn format_bytes(instr: &Instruction) -> String {
    let mut out = String::with_capacity(instr.bytes.len() * 3);
    for (i, b) in instr.bytes.iter().enumerate() {
        if i != 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", b);
    }
    out
}

/// Mnemonic plus operand rendering, e.g. `CPDOWNSP -8 4` or `JSR fn_0000002a`.
pub fn format_instruction(program: &NcsProgram, instr: &Instruction) -> String {
    use crate::opcode::Opcode;

    let mut out = format!("{}{}", instr.opcode.name(), instr.itype.suffix());

    match instr.opcode {
        Opcode::Jmp | Opcode::Jsr | Opcode::Jz | Opcode::Jnz => {
            if let Some(&target) = instr.branches.first() {
                let target = &program.instructions[target];
                let mut label = format_jump_label_name(program, target);
                if label.is_empty() {
                    label = format_jump_destination(target.address);
                }
                out.push(' ');
                out.push_str(&label);
            }
        }
        Opcode::Action => {
            let _ = write!(
                out,
                " {} {}",
                game::get_function_name(program.game, instr.args[0]),
                instr.args[1]
            );
        }
        Opcode::Const => {
            out.push(' ');
            out.push_str(&format_instruction_data(instr));
        }
        _ => {
            for arg in &instr.args {
                let _ = write!(out, " {}", arg);
            }
        }
    }

    out
}

/// Constant-literal rendering for CONST opcodes.
pub fn format_instruction_data(instr: &Instruction) -> String {
    match &instr.const_value {
        Some(ConstValue::Int(v)) => v.to_string(),
        Some(ConstValue::Float(v)) => format!("{:?}", v),
        Some(ConstValue::String(v)) => quote_string(v),
        Some(ConstValue::Object(v)) => v.to_string(),
        None => String::new(),
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// The human label of an instruction address, or "" for unlabeled addresses.
pub fn format_jump_label_name(program: &NcsProgram, instr: &Instruction) -> String {
    match instr.address_kind {
        AddressKind::None | AddressKind::Tail => String::new(),
        AddressKind::JumpTarget => format_jump_destination(instr.address),
        AddressKind::StoreState => format!("sta_{:08x}", instr.address),
        AddressKind::SubRoutine => match program.subroutine_at(instr.address) {
            Some(sub) => format_sub_label_name(sub),
            None => format!("fn_{:08x}", instr.address),
        },
    }
}

/// The human label of a subroutine.
pub fn format_sub_label_name(sub: &SubRoutine) -> String {
    match sub.kind {
        SubRoutineKind::Start => "_start".to_string(),
        SubRoutineKind::Global => "_global".to_string(),
        SubRoutineKind::StoreState => format!("sta_{:08x}", sub.address),
        SubRoutineKind::Normal => format!("fn_{:08x}", sub.address),
    }
}

/// Synthetic label for a bare address.
pub fn format_jump_destination(address: u32) -> String {
    format!("loc_{:08x}", address)
}

/// Deterministic spelling of an analysed variable.
///
/// Globals (no creator) spell as `global`; the NSS global declarations append
/// the numeric id themselves.
pub fn format_variable_name(var: &Variable) -> String {
    if var.creator.is_none() {
        return "global".to_string();
    }
    let prefix = match var.vtype {
        VariableType::Int => "i",
        VariableType::Float => "f",
        VariableType::String => "s",
        VariableType::Object => "o",
        VariableType::Vector => "v",
        VariableType::Resource => "r",
        _ => "var",
    };
    format!("{}{}", prefix, var.id)
}

/// Subroutine signature with parameter types only, generic type names.
pub fn format_signature(program: &NcsProgram, sub: &SubRoutine) -> String {
    signature(program, sub, false)
}

/// Subroutine signature with named parameters, e.g. for NSS headers.
pub fn format_signature_with_names(program: &NcsProgram, sub: &SubRoutine) -> String {
    signature(program, sub, true)
}

fn signature(program: &NcsProgram, sub: &SubRoutine, with_names: bool) -> String {
    let mut out = format!(
        "{} {}(",
        game::get_variable_type_name(sub.return_type, program.game),
        format_sub_label_name(sub)
    );
    for (i, &pid) in sub.params.iter().enumerate() {
        if i != 0 {
            out.push_str(", ");
        }
        let var = &program.variables[pid];
        out.push_str(&game::get_variable_type_name(var.vtype, program.game));
        if with_names {
            out.push(' ');
            out.push_str(&format_variable_name(var));
        }
    }
    out.push(')');
    out
}
