//! Basic-block and subroutine recovery over the decoded instruction list.
//!
//! Leaders are branch targets, subroutine entries, stored resume points and
//! the instructions following a flow break. Blocks are the spans between
//! leaders; edges carry a [`BlockEdgeKind`]. Subroutines are discovered from
//! JSR and STORESTATE targets and own the blocks reachable from their entry
//! without crossing a call edge.

use std::collections::{BTreeSet, HashMap, VecDeque};

use anyhow::{bail, Result};

use crate::model::{
    AddressKind, Block, BlockEdgeKind, BlockId, InstrId, NcsProgram, SubRoutine, SubRoutineKind,
};
use crate::opcode::Opcode;

/// Fill in `blocks` and `subroutines` of a program whose instruction arena
/// is already decoded and linked.
pub fn build_cfg(program: &mut NcsProgram) -> Result<()> {
    if program.instructions.is_empty() {
        return Ok(());
    }

    let leaders = compute_leaders(program);
    build_blocks(program, &leaders)?;
    connect_edges(program)?;
    build_subroutines(program);

    Ok(())
}

fn compute_leaders(program: &NcsProgram) -> BTreeSet<InstrId> {
    let mut leaders: BTreeSet<InstrId> = BTreeSet::new();
    leaders.insert(0);

    for (i, instr) in program.instructions.iter().enumerate() {
        match instr.opcode {
            Opcode::Jmp => {
                leaders.insert(instr.branches[0]);
                if i + 1 < program.instructions.len() {
                    leaders.insert(i + 1);
                }
            }
            Opcode::Jz | Opcode::Jnz | Opcode::Jsr => {
                leaders.insert(instr.branches[0]);
                if let Some(f) = instr.follower {
                    leaders.insert(f);
                }
            }
            Opcode::Retn => {
                if i + 1 < program.instructions.len() {
                    leaders.insert(i + 1);
                }
            }
            Opcode::StoreState => {
                if let Some(&target) = instr.branches.first() {
                    leaders.insert(target);
                }
                if let Some(f) = instr.follower {
                    leaders.insert(f);
                }
            }
            _ => {}
        }
    }

    leaders
}

fn build_blocks(program: &mut NcsProgram, leaders: &BTreeSet<InstrId>) -> Result<()> {
    if !leaders.contains(&0) {
        bail!("missing entry leader");
    }

    let leader_list: Vec<InstrId> = leaders.iter().copied().collect();

    let mut blocks: Vec<Block> = Vec::with_capacity(leader_list.len());
    for (id, &start) in leader_list.iter().enumerate() {
        let end = leader_list
            .get(id + 1)
            .copied()
            .unwrap_or(program.instructions.len());

        let mut block = Block::new(program.instructions[start].address);
        for instr in start..end {
            block.instructions.push(instr);
            program.instructions[instr].block = Some(id);
        }
        blocks.push(block);
    }

    program.blocks = blocks;
    Ok(())
}

fn connect_edges(program: &mut NcsProgram) -> Result<()> {
    let instr_block: HashMap<InstrId, BlockId> = program
        .instructions
        .iter()
        .enumerate()
        .filter_map(|(i, instr)| instr.block.map(|b| (i, b)))
        .collect();

    let block_of = |instr: InstrId| -> Result<BlockId> {
        match instr_block.get(&instr) {
            Some(&b) => Ok(b),
            None => bail!("instruction {} not assigned to a block", instr),
        }
    };

    for bid in 0..program.blocks.len() {
        let Some(&last_id) = program.blocks[bid].instructions.last() else {
            continue;
        };
        let last = &program.instructions[last_id];

        let mut children: Vec<BlockId> = Vec::new();
        let mut children_types: Vec<BlockEdgeKind> = Vec::new();

        match last.opcode {
            Opcode::Jmp => {
                children.push(block_of(last.branches[0])?);
                children_types.push(BlockEdgeKind::Unconditional);
            }
            Opcode::Jz => {
                // JZ branches when the condition came out false.
                children.push(block_of(last.branches[0])?);
                children_types.push(BlockEdgeKind::ConditionalFalse);
                if let Some(f) = last.follower {
                    children.push(block_of(f)?);
                    children_types.push(BlockEdgeKind::ConditionalTrue);
                }
            }
            Opcode::Jnz => {
                children.push(block_of(last.branches[0])?);
                children_types.push(BlockEdgeKind::ConditionalTrue);
                if let Some(f) = last.follower {
                    children.push(block_of(f)?);
                    children_types.push(BlockEdgeKind::ConditionalFalse);
                }
            }
            Opcode::Jsr => {
                children.push(block_of(last.branches[0])?);
                children_types.push(BlockEdgeKind::SubRoutineCall);
                if let Some(f) = last.follower {
                    children.push(block_of(f)?);
                    children_types.push(BlockEdgeKind::SubRoutineTail);
                }
            }
            Opcode::StoreState => {
                if let Some(&target) = last.branches.first() {
                    children.push(block_of(target)?);
                    children_types.push(BlockEdgeKind::SubRoutineStore);
                }
                if let Some(f) = last.follower {
                    children.push(block_of(f)?);
                    children_types.push(BlockEdgeKind::Unconditional);
                }
            }
            Opcode::Retn => {}
            _ => {
                if let Some(f) = last.follower {
                    children.push(block_of(f)?);
                    children_types.push(BlockEdgeKind::Unconditional);
                }
            }
        }

        program.blocks[bid].children = children;
        program.blocks[bid].children_types = children_types;
    }

    Ok(())
}

fn build_subroutines(program: &mut NcsProgram) {
    // Entry blocks: the program start, every JSR target and every stored
    // resume point.
    let mut entries: Vec<(BlockId, SubRoutineKind)> = Vec::new();
    let mut seen: BTreeSet<BlockId> = BTreeSet::new();

    if let Some(block) = program.instructions[0].block {
        entries.push((block, SubRoutineKind::Start));
        seen.insert(block);
    }

    for instr in &program.instructions {
        let (kind, targets): (SubRoutineKind, &[InstrId]) = match instr.opcode {
            Opcode::Jsr => (SubRoutineKind::Normal, &instr.branches[..1]),
            Opcode::StoreState => (SubRoutineKind::StoreState, &instr.branches[..]),
            _ => continue,
        };
        for &target in targets {
            if let Some(block) = program.instructions[target].block {
                if seen.insert(block) {
                    entries.push((block, kind));
                }
            }
        }
    }
    entries.sort_by_key(|&(block, _)| program.blocks[block].address);

    for (entry, kind) in entries {
        add_subroutine(program, entry, kind);
    }

    // Unreachable blocks get a pseudo-subroutine at their own address.
    for bid in 0..program.blocks.len() {
        if program.blocks[bid].subroutine.is_none() && !program.blocks[bid].instructions.is_empty()
        {
            add_subroutine(program, bid, SubRoutineKind::Normal);
        }
    }
}

/// Claim every block reachable from `entry` without crossing a call or
/// store edge, then derive the subroutine's kind refinements and returns.
fn add_subroutine(program: &mut NcsProgram, entry: BlockId, kind: SubRoutineKind) {
    let sub_id = program.subroutines.len();
    let address = program.blocks[entry].address;

    let mut blocks: Vec<BlockId> = Vec::new();
    let mut queue: VecDeque<BlockId> = VecDeque::new();
    queue.push_back(entry);

    while let Some(bid) = queue.pop_front() {
        if program.blocks[bid].subroutine.is_some() {
            continue;
        }
        program.blocks[bid].subroutine = Some(sub_id);
        blocks.push(bid);

        let block = &program.blocks[bid];
        for (i, &child) in block.children.iter().enumerate() {
            match block.children_types[i] {
                BlockEdgeKind::SubRoutineCall | BlockEdgeKind::SubRoutineStore => {}
                _ => queue.push_back(child),
            }
        }
    }

    let mut kind = kind;
    if kind == SubRoutineKind::Normal {
        let saves_bp = blocks.iter().any(|&b| {
            program.blocks[b]
                .instructions
                .iter()
                .any(|&i| program.instructions[i].opcode == Opcode::SaveBp)
        });
        if saves_bp {
            kind = SubRoutineKind::Global;
        }
    }

    // The entry instruction carries the subroutine label in listings.
    if let Some(&first) = program.blocks[entry].instructions.first() {
        program.instructions[first].address_kind = AddressKind::SubRoutine;
    }

    let mut sub = SubRoutine::new(address, kind);
    sub.blocks = blocks;

    // A unique exit block is recorded as the return; several exits stay
    // unresolved until analysis merges them.
    let returns: Vec<BlockId> = sub
        .blocks
        .iter()
        .copied()
        .filter(|&b| {
            program.blocks[b]
                .instructions
                .last()
                .map(|&i| program.instructions[i].opcode == Opcode::Retn)
                .unwrap_or(false)
        })
        .collect();
    if returns.len() == 1 {
        sub.returns = returns;
    }

    program.subroutines.push(sub);
}
