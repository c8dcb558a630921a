pub mod cfg;
pub mod emit;
pub mod format;
pub mod game;
pub mod loader;
pub mod model;
pub mod opcode;

pub use emit::Disassembler;
pub use game::GameId;
pub use loader::load_ncs;
pub use model::NcsProgram;
