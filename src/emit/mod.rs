//! The output side of the disassembler.
//!
//! A [`Disassembler`] borrows a decoded (and possibly stack-analysed)
//! [`NcsProgram`] and renders it into a text sink in one of four modes:
//! a full listing, bare assembly, a GraphViz control-flow graph, or a
//! best-effort NSS source reconstruction. The program is never mutated.

pub mod dot;
pub mod nss;

use std::fmt::Write;

use anyhow::Result;

use crate::format::{format_bytes, format_instruction, format_jump_label_name, format_signature};
use crate::game;
use crate::model::{
    AddressKind, Instruction, NcsProgram, StackAnalyzeState, SubRoutine, SubRoutineKind,
};

pub struct Disassembler<'a> {
    program: &'a NcsProgram,
}

impl<'a> Disassembler<'a> {
    pub fn new(program: &'a NcsProgram) -> Self {
        Self { program }
    }

    /// Full listing: address, raw bytes and mnemonic per instruction, with
    /// jump-label prologues and optional per-instruction stack dumps.
    pub fn create_listing<W: Write>(&self, out: &mut W, print_stack: bool) -> Result<()> {
        self.write_info(out)?;
        self.write_engine_types(out)?;

        for instr in &self.program.instructions {
            self.write_jump_label(out, instr)?;

            if self.program.has_stack_analysis && print_stack {
                self.write_stack(out, instr, 36)?;
            }

            writeln!(
                out,
                "  {:08X} {:<26} {}",
                instr.address,
                format_bytes(instr),
                format_instruction(self.program, instr)
            )?;

            // No natural follower: visually separate the flow break.
            if instr.follower.is_none() {
                writeln!(out, "  -------- -------------------------- ---")?;
            }
        }

        Ok(())
    }

    /// Bare assembly: mnemonics only, blank line as flow separator.
    pub fn create_assembly<W: Write>(&self, out: &mut W, print_stack: bool) -> Result<()> {
        self.write_info(out)?;
        self.write_engine_types(out)?;

        for instr in &self.program.instructions {
            self.write_jump_label(out, instr)?;

            if self.program.has_stack_analysis && print_stack {
                self.write_stack(out, instr, 0)?;
            }

            writeln!(out, "  {}", format_instruction(self.program, instr))?;

            if instr.follower.is_none() {
                writeln!(out)?;
            }
        }

        Ok(())
    }

    /// Convenience wrapper returning the listing as a string.
    pub fn listing(&self, print_stack: bool) -> Result<String> {
        let mut out = String::new();
        self.create_listing(&mut out, print_stack)?;
        Ok(out)
    }

    /// Convenience wrapper returning the assembly as a string.
    pub fn assembly(&self, print_stack: bool) -> Result<String> {
        let mut out = String::new();
        self.create_assembly(&mut out, print_stack)?;
        Ok(out)
    }

    fn write_info<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(
            out,
            "; {} bytes, {} instructions\n",
            self.program.size,
            self.program.instructions.len()
        )?;
        Ok(())
    }

    fn write_engine_types<W: Write>(&self, out: &mut W) -> Result<()> {
        let count = game::get_engine_type_count(self.program.game);
        if count == 0 {
            return Ok(());
        }

        writeln!(out, "; Engine types:")?;
        for i in 0..count {
            let name = game::get_engine_type_name(self.program.game, i);
            if name.is_empty() {
                continue;
            }
            writeln!(out, "; {}: {}", game::get_generic_engine_type_name(i), name)?;
        }
        writeln!(out)?;

        Ok(())
    }

    fn write_jump_label<W: Write>(&self, out: &mut W, instr: &Instruction) -> Result<()> {
        let mut label = format_jump_label_name(self.program, instr);
        if label.is_empty() {
            return Ok(());
        }
        label.push(':');

        let signature = self.instruction_signature(instr);
        if !signature.is_empty() {
            label.push_str(" ; ");
            label.push_str(&signature);
        }

        writeln!(out, "{}", label)?;
        Ok(())
    }

    /// Per-instruction stack frame dump, boxed with `.---`/`'---` rails.
    fn write_stack<W: Write>(&self, out: &mut W, instr: &Instruction, indent: usize) -> Result<()> {
        let pad = " ".repeat(indent);

        writeln!(out, "{}; .--- Stack: {:>4} ---", pad, instr.stack.len())?;

        for (slot, &vid) in instr.stack.iter().enumerate() {
            let var = &self.program.variables[vid];

            let mut siblings = String::new();
            for sib in &var.siblings {
                if !siblings.is_empty() {
                    siblings.push(',');
                }
                siblings.push_str(&sib.to_string());
            }
            if !siblings.is_empty() {
                siblings = format!(" ({})", siblings);
            }

            let creator = var
                .creator
                .map(|i| self.program.instructions[i].address)
                .unwrap_or(0);

            writeln!(
                out,
                "{}; | {:>4} - {:>6}: {:<8} ({:08X}){}",
                pad,
                slot,
                var.id,
                game::get_variable_type_name(var.vtype, self.program.game).to_lowercase(),
                creator,
                siblings
            )?;
        }

        writeln!(out, "{}; '--- ---------- ---", pad)?;
        Ok(())
    }

    /// A subroutine's signature, or "" when it has none worth showing.
    pub(crate) fn subroutine_signature(&self, sub: &SubRoutine) -> String {
        if !self.program.has_stack_analysis {
            return String::new();
        }

        if matches!(
            sub.kind,
            SubRoutineKind::Start | SubRoutineKind::Global | SubRoutineKind::StoreState
        ) {
            return String::new();
        }

        if sub.stack_analyze_state != StackAnalyzeState::Finished {
            return String::new();
        }

        format_signature(self.program, sub)
    }

    fn instruction_signature(&self, instr: &Instruction) -> String {
        if !self.program.has_stack_analysis {
            return String::new();
        }

        if instr.address_kind != AddressKind::SubRoutine {
            return String::new();
        }
        let Some(block) = instr.block else {
            return String::new();
        };
        let Some(sub) = self.program.blocks[block].subroutine else {
            return String::new();
        };

        self.subroutine_signature(&self.program.subroutines[sub])
    }
}
