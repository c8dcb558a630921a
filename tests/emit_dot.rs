mod common;

use common::*;

use ncsdis::emit::Disassembler;
use ncsdis::game::GameId;
use ncsdis::model::{BlockEdgeKind, ControlStructure, NcsProgram, SubRoutineKind};
use ncsdis::opcode::{InstructionType, Opcode};

/// A single subroutine holding one straight-line block of `count` NOPs.
fn nop_block_program(base: u32, count: usize) -> NcsProgram {
    let mut program = analysed_program(GameId::Jade);
    program.size = count as u32 * 2;

    let mut instrs = Vec::new();
    for i in 0..count {
        instrs.push(push_instr(
            &mut program,
            base + i as u32 * 2,
            Opcode::Nop,
            InstructionType::None,
        ));
    }
    let block = push_block(&mut program, instrs);
    push_sub(&mut program, SubRoutineKind::Normal, vec![block]);
    program
}

fn node_count(dot: &str, addr: u32) -> usize {
    (0..64)
        .take_while(|i| dot.contains(&format!("\"b{:08X}_{}\"", addr, i)))
        .count()
}

#[test]
fn preamble_is_literal() {
    let program = nop_block_program(0x10, 1);
    let dot = Disassembler::new(&program).dot(false).unwrap();
    assert!(dot.starts_with("digraph {\n  overlap=false\n  concentrate=true\n  splines=ortho\n\n"));
    assert!(dot.ends_with("}\n"));
}

#[test]
fn block_subdivision_boundaries() {
    for (count, nodes) in [(1, 1), (9, 1), (10, 1), (11, 2), (20, 2), (21, 3)] {
        let program = nop_block_program(0x100, count);
        let dot = Disassembler::new(&program).dot(false).unwrap();
        assert_eq!(node_count(&dot, 0x100), nodes, "block of {} instructions", count);

        if nodes == 1 {
            // A single node must never produce a stray subdivision edge.
            assert!(!dot.contains("style=dotted"), "block of {} instructions", count);
        }
    }
}

#[test]
fn large_block_subdivision_edge() {
    let program = nop_block_program(0x100, 25);
    let dot = Disassembler::new(&program).dot(false).unwrap();

    assert_eq!(node_count(&dot, 0x100), 3);
    assert!(dot.contains("b00000100_0 -> b00000100_1 -> b00000100_2 [ style=dotted ]"));
}

#[test]
fn backward_conditional_edge_is_bold_red() {
    let mut program = analysed_program(GameId::Jade);
    program.size = 8;

    let lo = push_instr(&mut program, 0x10, Opcode::Nop, InstructionType::None);
    let hi = push_instr(&mut program, 0x20, Opcode::Jz, InstructionType::None);
    let lo_block = push_block(&mut program, vec![lo]);
    let hi_block = push_block(&mut program, vec![hi]);
    push_sub(&mut program, SubRoutineKind::Normal, vec![hi_block, lo_block]);

    link_edge(&mut program, hi_block, lo_block, BlockEdgeKind::ConditionalFalse);

    let dot = Disassembler::new(&program).dot(false).unwrap();
    assert!(dot.contains("  b00000020_0 -> b00000010_0 [ color=red style=bold ]\n"));
}

#[test]
fn cross_subroutine_edges_drop_rank_constraint() {
    let mut program = analysed_program(GameId::Jade);
    program.size = 8;

    let caller = push_instr(&mut program, 0x10, Opcode::Jsr, InstructionType::None);
    let callee = push_instr(&mut program, 0x20, Opcode::Retn, InstructionType::None);
    let caller_block = push_block(&mut program, vec![caller]);
    let callee_block = push_block(&mut program, vec![callee]);
    push_sub(&mut program, SubRoutineKind::Start, vec![caller_block]);
    push_sub(&mut program, SubRoutineKind::Normal, vec![callee_block]);

    link_edge(&mut program, caller_block, callee_block, BlockEdgeKind::SubRoutineCall);

    let dot = Disassembler::new(&program).dot(false).unwrap();
    assert!(dot.contains("  b00000010_0 -> b00000020_0 [ color=cyan constraint=false ]\n"));
}

#[test]
fn edge_colors_match_flow_kinds() {
    let kinds = [
        (BlockEdgeKind::Unconditional, "color=blue"),
        (BlockEdgeKind::ConditionalTrue, "color=green"),
        (BlockEdgeKind::ConditionalFalse, "color=red"),
        (BlockEdgeKind::SubRoutineCall, "color=cyan"),
        (BlockEdgeKind::SubRoutineTail, "color=orange"),
        (BlockEdgeKind::SubRoutineStore, "color=purple"),
        (BlockEdgeKind::Dead, "color=gray40"),
    ];

    let mut program = analysed_program(GameId::Jade);
    program.size = 64;

    let src = push_instr(&mut program, 0x10, Opcode::Nop, InstructionType::None);
    let src_block = push_block(&mut program, vec![src]);

    let mut blocks = vec![src_block];
    for (i, (kind, _)) in kinds.iter().enumerate() {
        let instr = push_instr(
            &mut program,
            0x20 + i as u32 * 2,
            Opcode::Nop,
            InstructionType::None,
        );
        let block = push_block(&mut program, vec![instr]);
        link_edge(&mut program, src_block, block, *kind);
        blocks.push(block);
    }
    push_sub(&mut program, SubRoutineKind::Normal, blocks);

    let dot = Disassembler::new(&program).dot(false).unwrap();

    for (i, (_, color)) in kinds.iter().enumerate() {
        let line = format!(
            "  b00000010_0 -> b{:08X}_0 [ {} ]\n",
            0x20 + i as u32 * 2,
            color
        );
        assert!(dot.contains(&line), "missing edge: {}", line);
    }

    // One dot edge per CFG edge.
    assert_eq!(dot.matches("  b00000010_0 -> ").count(), kinds.len());
}

#[test]
fn empty_subroutines_are_skipped() {
    let mut program = analysed_program(GameId::Jade);
    program.size = 2;

    // A subroutine whose entry block has no instructions at all.
    program.blocks.push(ncsdis::model::Block::new(0x30));
    let mut sub = ncsdis::model::SubRoutine::new(0x30, SubRoutineKind::Normal);
    sub.blocks = vec![0];
    program.subroutines.push(sub);

    let dot = Disassembler::new(&program).dot(false).unwrap();
    assert!(!dot.contains("cluster_s00000030"));
}

#[test]
fn control_annotations_prefix_labels() {
    let mut program = nop_block_program(0x10, 1);
    program.blocks[0].controls = vec![
        ControlStructure::IfCond {
            cond: 0,
            if_true: None,
            if_else: None,
            if_next: None,
        },
        ControlStructure::Return { retn: 0 },
    ];

    let with = Disassembler::new(&program).dot(true).unwrap();
    assert!(with.contains("label=\"<IFCOND>\\n<RETURN>\\n\\n"));

    let without = Disassembler::new(&program).dot(false).unwrap();
    assert!(!without.contains("<IFCOND>"));
}

#[test]
fn labels_are_graphviz_quoted() {
    let mut program = analysed_program(GameId::Jade);
    program.size = 8;

    let id = push_instr(&mut program, 0x10, Opcode::Const, InstructionType::String);
    program.instructions[id].const_value =
        Some(ncsdis::model::ConstValue::String("a\"b".to_string()));
    let block = push_block(&mut program, vec![id]);
    push_sub(&mut program, SubRoutineKind::Normal, vec![block]);

    let dot = Disassembler::new(&program).dot(false).unwrap();
    // The instruction renders as `CONSTS "a\"b"`; GraphViz quoting then
    // escapes every backslash and double quote in the label.
    assert!(dot.contains(r#"CONSTS \"a\\\"b\""#));
}
