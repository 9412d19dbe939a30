pub mod instruction;

pub use instruction::{InstructionSet, ReplacementInstruction};
