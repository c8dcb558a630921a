//! Best-effort reconstruction of the original NWScript source.
//!
//! Driven entirely by the analysis annotations: global variables become
//! declarations, per-opcode variable operations become assignments and
//! calls, `Return`/`IfCond` control structures become statements. The
//! output is not expected to compile.

use std::fmt::Write;

use anyhow::Result;

use crate::format::{
    format_instruction_data, format_jump_label_name, format_signature_with_names,
    format_variable_name,
};
use crate::game;
use crate::model::{BlockId, ControlStructure, Instruction, SubRoutine, VariableType};
use crate::opcode::Opcode;

use super::Disassembler;

fn write_indent<W: Write>(out: &mut W, indent: usize) -> Result<()> {
    for _ in 0..indent {
        out.write_str("\t")?;
    }
    Ok(())
}

impl<'a> Disassembler<'a> {
    /// Write the partial NSS reconstruction of the whole program.
    pub fn create_nss<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_str("// Decompiled using ncsdis")?;
        out.write_str("\n\n")?;

        for &gid in &self.program.globals {
            let var = &self.program.variables[gid];
            writeln!(
                out,
                "{} {}{}",
                game::get_variable_type_name(var.vtype, self.program.game),
                format_variable_name(var),
                var.id
            )?;
        }

        for sub in &self.program.subroutines {
            self.write_nss_subroutine(out, sub)?;
        }

        Ok(())
    }

    /// Convenience wrapper returning the NSS reconstruction as a string.
    pub fn nss(&self) -> Result<String> {
        let mut out = String::new();
        self.create_nss(&mut out)?;
        Ok(out)
    }

    fn write_nss_subroutine<W: Write>(&self, out: &mut W, sub: &SubRoutine) -> Result<()> {
        out.write_str("\n\n")?;
        out.write_str(&format_signature_with_names(self.program, sub))?;
        out.write_str(" {\n")?;

        assert!(sub.returns.len() <= 1);

        // Successors are reached through the call edges and control
        // annotations, so only the entry block is walked directly.
        self.write_nss_block(out, sub.blocks[0], 1)?;

        out.write_str("}")?;
        Ok(())
    }

    fn write_nss_block<W: Write>(&self, out: &mut W, block_id: BlockId, indent: usize) -> Result<()> {
        let block = &self.program.blocks[block_id];

        for &iid in &block.instructions {
            self.write_nss_instruction(out, &self.program.instructions[iid], indent)?;
        }

        for kind in &block.children_types {
            if kind.is_subroutine_call() {
                write_indent(out, indent)?;

                let instr = &self.program.instructions[*block.instructions.last().unwrap()];
                let callee = &self.program.instructions[instr.branches[0]];

                out.write_str(&format_jump_label_name(self.program, callee))?;
                out.write_str("(")?;
                for (i, &vid) in instr.variables.iter().enumerate() {
                    out.write_str(&format_variable_name(&self.program.variables[vid]))?;
                    if i + 1 < instr.variables.len() {
                        out.write_str(", ")?;
                    }
                }
                out.write_str(");\n")?;

                // children[0] is the call edge; the flow continues in the
                // post-call fallthrough block.
                self.write_nss_block(out, block.children[1], indent)?;
            }
        }

        for control in &block.controls {
            match control {
                ControlStructure::Return { retn } => {
                    write_indent(out, indent)?;

                    let retn = &self.program.blocks[*retn];
                    if !retn.instructions.is_empty() {
                        let last = &self.program.instructions[*retn.instructions.last().unwrap()];
                        if last.stack.is_empty() {
                            out.write_str("return;\n")?;
                            continue;
                        }

                        let first = &self.program.instructions[retn.instructions[0]];
                        let var = &self.program.variables[first.variables[0]];
                        writeln!(out, "return {};", format_variable_name(var))?;
                    } else {
                        out.write_str("return;\n")?;
                    }
                }
                ControlStructure::IfCond { .. } => {
                    self.write_nss_if(out, control, indent)?;
                }
                // TODO: while / do-while reconstruction.
                _ => {}
            }
        }

        Ok(())
    }

    fn write_nss_if<W: Write>(&self, out: &mut W, control: &ControlStructure, indent: usize) -> Result<()> {
        let ControlStructure::IfCond {
            cond,
            if_true,
            if_else,
            if_next,
        } = control
        else {
            return Ok(());
        };

        write_indent(out, indent)?;

        let cond_block = &self.program.blocks[*cond];
        let last = &self.program.instructions[*cond_block.instructions.last().unwrap()];
        let cond_var = &self.program.variables[last.variables[0]];

        writeln!(out, "if ({}) {{", format_variable_name(cond_var))?;

        if let Some(if_true) = if_true {
            self.write_nss_block(out, *if_true, indent + 1)?;
        }

        write_indent(out, indent)?;
        out.write_str("}")?;

        if let Some(if_else) = if_else {
            out.write_str(" else {\n")?;
            self.write_nss_block(out, *if_else, indent + 1)?;

            write_indent(out, indent)?;
            out.write_str("}")?;
        }
        out.write_str("\n")?;

        if let Some(if_next) = if_next {
            self.write_nss_block(out, *if_next, indent)?;
        }

        Ok(())
    }

    fn write_nss_instruction<W: Write>(
        &self,
        out: &mut W,
        instr: &Instruction,
        indent: usize,
    ) -> Result<()> {
        let program = self.program;
        let game = program.game;

        match instr.opcode {
            Opcode::Const => {
                let v = &program.variables[instr.variables[0]];
                write_indent(out, indent)?;
                writeln!(
                    out,
                    "{} {} = {};",
                    game::get_variable_type_name(v.vtype, game),
                    format_variable_name(v),
                    format_instruction_data(instr)
                )?;
            }

            Opcode::Action => {
                let param_count = instr.args[1] as usize;

                write_indent(out, indent)?;

                // More variables than parameters means the call leaves a
                // return value on the stack.
                if instr.variables.len() > param_count {
                    let ret = &program.variables[*instr.variables.last().unwrap()];
                    write!(
                        out,
                        "{} {} = ",
                        game::get_variable_type_name(ret.vtype, game),
                        format_variable_name(ret)
                    )?;
                }

                write!(out, "{}(", game::get_function_name(game, instr.args[0]))?;
                for i in 0..param_count {
                    let var = &program.variables[instr.variables[i]];
                    out.write_str(&format_variable_name(var))?;
                    if i + 1 < param_count {
                        out.write_str(", ")?;
                    }
                }
                out.write_str(");\n")?;
            }

            Opcode::CpDownBp | Opcode::CpDownSp | Opcode::CpTopBp | Opcode::CpTopSp => {
                let src = &program.variables[instr.variables[0]];
                let dst = &program.variables[instr.variables[1]];

                write_indent(out, indent)?;
                writeln!(
                    out,
                    "{} {} = {};",
                    game::get_variable_type_name(dst.vtype, game),
                    format_variable_name(dst),
                    format_variable_name(src)
                )?;
            }

            Opcode::LogAnd => self.write_nss_binary(out, instr, "&&", indent)?,
            Opcode::LogOr => self.write_nss_binary(out, instr, "||", indent)?,
            Opcode::Eq => self.write_nss_binary(out, instr, "==", indent)?,
            Opcode::Leq => self.write_nss_binary(out, instr, "<=", indent)?,
            Opcode::Lt => self.write_nss_binary(out, instr, "<", indent)?,
            Opcode::Geq => self.write_nss_binary(out, instr, ">=", indent)?,
            Opcode::Gt => self.write_nss_binary(out, instr, ">", indent)?,

            Opcode::Not => {
                let v = &program.variables[instr.variables[0]];
                // The result sits in slot 2, same as the binary ops.
                let result = &program.variables[instr.variables[2]];

                write_indent(out, indent)?;
                writeln!(
                    out,
                    "{} {} = !{};",
                    game::get_variable_type_name(result.vtype, game),
                    format_variable_name(result),
                    format_variable_name(v)
                )?;
            }

            Opcode::RsAdd => {
                let v = &program.variables[instr.variables[0]];

                write_indent(out, indent)?;
                write!(
                    out,
                    "{} {} = ",
                    game::get_variable_type_name(v.vtype, game),
                    format_variable_name(v)
                )?;

                let zero = match v.vtype {
                    VariableType::String => "\"\"",
                    VariableType::Int => "0",
                    VariableType::Float => "0.0",
                    // TODO: how empty objects and engine types are
                    // initialized is still unknown.
                    _ => "0",
                };
                out.write_str(zero)?;
                out.write_str(";\n")?;
            }

            _ => {}
        }

        Ok(())
    }

    fn write_nss_binary<W: Write>(
        &self,
        out: &mut W,
        instr: &Instruction,
        op: &str,
        indent: usize,
    ) -> Result<()> {
        let v1 = &self.program.variables[instr.variables[0]];
        let v2 = &self.program.variables[instr.variables[1]];
        let result = &self.program.variables[instr.variables[2]];

        write_indent(out, indent)?;
        writeln!(
            out,
            "{} {} = {} {} {};",
            game::get_variable_type_name(result.vtype, self.program.game),
            format_variable_name(result),
            format_variable_name(v1),
            op,
            format_variable_name(v2)
        )?;

        Ok(())
    }
}
