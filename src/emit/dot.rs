//! GraphViz dot output: one node cluster per subroutine, basic blocks as
//! boxed nodes (large blocks split into chains of nodes), edges colored by
//! flow kind.

use std::fmt::Write;

use anyhow::Result;

use crate::format::{
    format_instruction, format_jump_destination, format_jump_label_name, format_sub_label_name,
};
use crate::model::{Block, BlockEdgeKind, ControlStructure};

use super::Disassembler;

/// Max number of instructions rendered into a single dot node.
const MAX_NODE_SIZE: usize = 10;

/// How many nodes a block of `block_size` instructions is divided into.
fn nodes_per_block(block_size: usize) -> usize {
    ((block_size + MAX_NODE_SIZE - 1) / MAX_NODE_SIZE).max(1)
}

/// GraphViz label escaping.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out
}

fn control_tag(control: &ControlStructure) -> &'static str {
    match control {
        ControlStructure::None => "<NONE>",
        ControlStructure::DoWhileHead => "<DOWHILEHEAD>",
        ControlStructure::DoWhileTail => "<DOWHILETAIL>",
        ControlStructure::DoWhileNext => "<DOWHILENEXT>",
        ControlStructure::WhileHead => "<WHILEHEAD>",
        ControlStructure::WhileTail => "<WHILETAIL>",
        ControlStructure::WhileNext => "<WHILENEXT>",
        ControlStructure::Break => "<BREAK>",
        ControlStructure::Continue => "<CONTINUE>",
        ControlStructure::Return { .. } => "<RETURN>",
        ControlStructure::IfCond { .. } => "<IFCOND>",
        ControlStructure::IfTrue => "<IFTRUE>",
        ControlStructure::IfElse => "<IFELSE>",
        ControlStructure::IfNext => "<IFNEXT>",
    }
}

/// The control-annotation prefix of a block label.
fn block_control(block: &Block) -> String {
    let mut control = String::new();
    for c in &block.controls {
        control.push_str(control_tag(c));
        control.push_str("\\n");
    }
    if !control.is_empty() {
        control.push_str("\\n");
    }
    control
}

fn edge_color(kind: BlockEdgeKind) -> &'static str {
    match kind {
        BlockEdgeKind::Unconditional => "color=blue",
        BlockEdgeKind::ConditionalTrue => "color=green",
        BlockEdgeKind::ConditionalFalse => "color=red",
        BlockEdgeKind::SubRoutineCall => "color=cyan",
        BlockEdgeKind::SubRoutineTail => "color=orange",
        BlockEdgeKind::SubRoutineStore => "color=purple",
        BlockEdgeKind::Dead => "color=gray40",
    }
}

impl<'a> Disassembler<'a> {
    /// Write the whole program as a GraphViz digraph, one cluster per
    /// subroutine. Render with graphviz's `dot` tool.
    pub fn create_dot<W: Write>(&self, out: &mut W, print_control_types: bool) -> Result<()> {
        out.write_str("digraph {\n")?;
        out.write_str("  overlap=false\n")?;
        out.write_str("  concentrate=true\n")?;
        out.write_str("  splines=ortho\n\n")?;

        self.write_dot_clustered_blocks(out, print_control_types)?;
        self.write_dot_block_edges(out)?;

        out.write_str("}\n")?;
        Ok(())
    }

    /// Convenience wrapper returning the dot graph as a string.
    pub fn dot(&self, print_control_types: bool) -> Result<String> {
        let mut out = String::new();
        self.create_dot(&mut out, print_control_types)?;
        Ok(out)
    }

    fn write_dot_clustered_blocks<W: Write>(
        &self,
        out: &mut W,
        print_control_types: bool,
    ) -> Result<()> {
        for sub in &self.program.subroutines {
            let empty = match sub.blocks.first() {
                Some(&b) => self.program.blocks[b].instructions.is_empty(),
                None => true,
            };
            if empty {
                continue;
            }

            writeln!(out, "  subgraph cluster_s{:08X} {{", sub.address)?;
            out.write_str("    style=filled\n    color=lightgrey\n")?;

            let mut label = self.subroutine_signature(sub);
            if label.is_empty() {
                label = format_sub_label_name(sub);
            }
            if label.is_empty() {
                label = format_jump_destination(sub.address);
            }
            writeln!(out, "    label=\"{}\"\n", label)?;

            self.write_dot_blocks(out, print_control_types, &sub.blocks)?;

            out.write_str("  }\n\n")?;
        }

        Ok(())
    }

    fn write_dot_blocks<W: Write>(
        &self,
        out: &mut W,
        print_control_types: bool,
        blocks: &[usize],
    ) -> Result<()> {
        for (bi, &bid) in blocks.iter().enumerate() {
            let block = &self.program.blocks[bid];

            // Blocks with a huge amount of instructions mess up the layout,
            // so they get divided into several equal-sized nodes.
            let node_count = nodes_per_block(block.instructions.len());
            let lines_per_node = (block.instructions.len() + node_count - 1) / node_count;

            let mut labels = vec![String::new(); node_count];

            let control = if print_control_types {
                block_control(block)
            } else {
                String::new()
            };

            let first = &self.program.instructions[block.instructions[0]];
            let mut head = format_jump_label_name(self.program, first);
            if head.is_empty() {
                head = format_jump_destination(first.address);
            }
            labels[0] = format!("{}{}:\\l", control, head);

            for (i, &iid) in block.instructions.iter().enumerate() {
                let instr = &self.program.instructions[iid];
                let _ = write!(
                    labels[i / lines_per_node],
                    "  {}\\l",
                    quote(&format_instruction(self.program, instr))
                );
            }

            for (i, label) in labels.iter().enumerate() {
                writeln!(
                    out,
                    "    \"b{:08X}_{}\" [ shape=\"box\" label=\"{}\" ]",
                    block.address, i, label
                )?;
            }

            // Dotted chain between the nodes of a divided block.
            if node_count > 1 {
                out.write_str("    ")?;
                for i in 0..node_count {
                    if i != 0 {
                        out.write_str(" -> ")?;
                    }
                    write!(out, "b{:08X}_{}", block.address, i)?;
                }
                out.write_str(" [ style=dotted ]\n")?;
            }

            if bi + 1 != blocks.len() {
                out.write_str("\n")?;
            }
        }

        Ok(())
    }

    fn write_dot_block_edges<W: Write>(&self, out: &mut W) -> Result<()> {
        for block in &self.program.blocks {
            assert_eq!(block.children.len(), block.children_types.len());

            let last_index = nodes_per_block(block.instructions.len()) - 1;

            for (i, &child_id) in block.children.iter().enumerate() {
                let child = &self.program.blocks[child_id];

                write!(
                    out,
                    "  b{:08X}_{} -> b{:08X}_0",
                    block.address, last_index, child.address
                )?;

                let mut attr = edge_color(block.children_types[i]).to_string();

                // Jump back: make the edge bold.
                if child.address < block.address {
                    attr.push_str(" style=bold");
                }

                // Edges between subroutines must not influence the node rank.
                if block.subroutine != child.subroutine {
                    attr.push_str(" constraint=false");
                }

                writeln!(out, " [ {} ]", attr)?;
            }
        }

        Ok(())
    }
}
