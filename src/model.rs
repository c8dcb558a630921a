use std::collections::BTreeSet;

use crate::game::GameId;
use crate::opcode::{InstructionType, Opcode};

/// Index into `NcsProgram::instructions`.
pub type InstrId = usize;
/// Index into `NcsProgram::blocks`.
pub type BlockId = usize;
/// Index into `NcsProgram::subroutines`.
pub type SubId = usize;
/// Index into `NcsProgram::variables`.
pub type VarId = usize;

/// A compiled script as a whole.
///
/// Instructions, blocks, subroutines and variables form a cyclic graph, so
/// each entity kind lives in its own arena and cross-references are plain
/// indices. The emitter only ever borrows the program read-only.
#[derive(Debug, Clone)]
pub struct NcsProgram {
    pub game: GameId,
    /// Total byte size of the script image, header included.
    pub size: u32,
    pub instructions: Vec<Instruction>,
    pub blocks: Vec<Block>,
    pub subroutines: Vec<SubRoutine>,
    pub variables: Vec<Variable>,
    /// The program's initial stack before `main` runs.
    pub globals: Vec<VarId>,
    pub has_stack_analysis: bool,
}

impl NcsProgram {
    pub fn new(game: GameId) -> Self {
        Self {
            game,
            size: 0,
            instructions: Vec::new(),
            blocks: Vec::new(),
            subroutines: Vec::new(),
            variables: Vec::new(),
            globals: Vec::new(),
            has_stack_analysis: false,
        }
    }

    pub fn subroutine_at(&self, address: u32) -> Option<&SubRoutine> {
        self.subroutines.iter().find(|s| s.address == address)
    }
}

impl Default for NcsProgram {
    fn default() -> Self {
        Self::new(GameId::Nwn)
    }
}

/// One decoded instruction.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub address: u32,
    pub opcode: Opcode,
    pub itype: InstructionType,
    /// Raw encoded bytes, for the listing view.
    pub bytes: Vec<u8>,
    /// Decoded integer operands.
    pub args: Vec<i32>,
    /// Decoded literal for CONST.
    pub const_value: Option<ConstValue>,
    /// The natural successor; empty for terminators and the last instruction.
    pub follower: Option<InstrId>,
    pub branches: Vec<InstrId>,
    pub address_kind: AddressKind,
    pub block: Option<BlockId>,
    /// Stack snapshot after this instruction, slot 0 topmost. Populated only
    /// once the owning subroutine's stack analysis finished.
    pub stack: Vec<VarId>,
    /// Variables consumed/produced by this opcode; layout is per-opcode.
    pub variables: Vec<VarId>,
}

impl Instruction {
    pub fn new(address: u32, opcode: Opcode, itype: InstructionType) -> Self {
        Self {
            address,
            opcode,
            itype,
            bytes: Vec::new(),
            args: Vec::new(),
            const_value: None,
            follower: None,
            branches: Vec::new(),
            address_kind: AddressKind::None,
            block: None,
            stack: Vec::new(),
            variables: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i32),
    Float(f32),
    String(String),
    Object(u32),
}

/// What kind of jump destination an instruction's address is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    None,
    /// The unlabeled instruction right after a JSR.
    Tail,
    JumpTarget,
    SubRoutine,
    StoreState,
}

/// A maximal straight-line instruction run.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub address: u32,
    pub instructions: Vec<InstrId>,
    pub children: Vec<BlockId>,
    /// Parallel to `children`.
    pub children_types: Vec<BlockEdgeKind>,
    pub subroutine: Option<SubId>,
    pub controls: Vec<ControlStructure>,
}

impl Block {
    pub fn new(address: u32) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }
}

/// Semantic classification of a CFG edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEdgeKind {
    Unconditional,
    ConditionalTrue,
    ConditionalFalse,
    SubRoutineCall,
    SubRoutineTail,
    SubRoutineStore,
    Dead,
}

impl BlockEdgeKind {
    pub fn is_subroutine_call(self) -> bool {
        matches!(self, BlockEdgeKind::SubRoutineCall)
    }
}

/// A control-flow annotation on a block, recovered by control-flow analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlStructure {
    None,
    DoWhileHead,
    DoWhileTail,
    DoWhileNext,
    WhileHead,
    WhileTail,
    WhileNext,
    Break,
    Continue,
    Return {
        /// The block producing the return value.
        retn: BlockId,
    },
    IfCond {
        cond: BlockId,
        if_true: Option<BlockId>,
        if_else: Option<BlockId>,
        if_next: Option<BlockId>,
    },
    IfTrue,
    IfElse,
    IfNext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubRoutineKind {
    Start,
    Global,
    StoreState,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackAnalyzeState {
    NotStarted,
    Running,
    Finished,
    Failed,
}

/// A function-like unit. The first block is the entry.
#[derive(Debug, Clone)]
pub struct SubRoutine {
    pub address: u32,
    pub blocks: Vec<BlockId>,
    /// At most one return block once analysis has merged the exits.
    pub returns: Vec<BlockId>,
    pub kind: SubRoutineKind,
    pub stack_analyze_state: StackAnalyzeState,
    /// Parameter variables, for signature formatting.
    pub params: Vec<VarId>,
    pub return_type: VariableType,
}

impl SubRoutine {
    pub fn new(address: u32, kind: SubRoutineKind) -> Self {
        Self {
            address,
            blocks: Vec::new(),
            returns: Vec::new(),
            kind,
            stack_analyze_state: StackAnalyzeState::NotStarted,
            params: Vec::new(),
            return_type: VariableType::Void,
        }
    }
}

/// Semantic type of a stack slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    Void,
    Int,
    Float,
    String,
    Resource,
    Object,
    Vector,
    Struct,
    Engine(u8),
    Any,
}

/// A typed stack slot inferred by stack analysis.
#[derive(Debug, Clone)]
pub struct Variable {
    pub id: usize,
    pub vtype: VariableType,
    pub creator: Option<InstrId>,
    /// Ids of variables holding the same logical value at other stack
    /// heights. Ordered so dumps are deterministic.
    pub siblings: BTreeSet<usize>,
}

impl Variable {
    pub fn new(id: usize, vtype: VariableType) -> Self {
        Self {
            id,
            vtype,
            creator: None,
            siblings: BTreeSet::new(),
        }
    }
}
