//! Shared helpers for building analysed programs by hand.
//!
//! The emitter consumes a pre-analysed model, so the tests assemble the
//! arenas directly instead of running a loader.

#![allow(dead_code)]

use ncsdis::game::GameId;
use ncsdis::model::{
    BlockEdgeKind, BlockId, Instruction, InstrId, NcsProgram, StackAnalyzeState, SubId,
    SubRoutine, SubRoutineKind, VarId, Variable, VariableType,
};
use ncsdis::opcode::{InstructionType, Opcode};

pub fn analysed_program(game: GameId) -> NcsProgram {
    let mut program = NcsProgram::new(game);
    program.has_stack_analysis = true;
    program
}

pub fn push_instr(
    program: &mut NcsProgram,
    address: u32,
    opcode: Opcode,
    itype: InstructionType,
) -> InstrId {
    program.instructions.push(Instruction::new(address, opcode, itype));
    program.instructions.len() - 1
}

/// A variable with a display id and a creator, so it spells `i<id>` etc.
pub fn push_var(
    program: &mut NcsProgram,
    id: usize,
    vtype: VariableType,
    creator: Option<InstrId>,
) -> VarId {
    let mut var = Variable::new(id, vtype);
    var.creator = creator;
    program.variables.push(var);
    program.variables.len() - 1
}

/// A block over the given instructions; back-references are fixed up.
pub fn push_block(program: &mut NcsProgram, instructions: Vec<InstrId>) -> BlockId {
    let id = program.blocks.len();
    let address = program.instructions[instructions[0]].address;

    let mut block = ncsdis::model::Block::new(address);
    block.instructions = instructions.clone();
    program.blocks.push(block);

    for instr in instructions {
        program.instructions[instr].block = Some(id);
    }
    id
}

/// A subroutine over the given blocks; the first block is the entry.
pub fn push_sub(
    program: &mut NcsProgram,
    kind: SubRoutineKind,
    blocks: Vec<BlockId>,
) -> SubId {
    let id = program.subroutines.len();
    let address = program.blocks[blocks[0]].address;

    let mut sub = SubRoutine::new(address, kind);
    sub.stack_analyze_state = StackAnalyzeState::Finished;
    sub.blocks = blocks.clone();
    program.subroutines.push(sub);

    for block in blocks {
        program.blocks[block].subroutine = Some(id);
    }
    id
}

pub fn link_edge(program: &mut NcsProgram, from: BlockId, to: BlockId, kind: BlockEdgeKind) {
    program.blocks[from].children.push(to);
    program.blocks[from].children_types.push(kind);
}
