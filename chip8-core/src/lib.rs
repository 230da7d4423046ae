pub mod constants;
mod cpu;
mod error;
mod keys;
mod opcode;
mod vm;

pub use self::vm::{Flow, Hz};

/// Version of this implementation, as reported by the CLI.
pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Read-only view of the 64x32 monochrome screen, row-major.
pub type Chip8DisplayBuffer<'a> = &'a [bool; constants::DISPLAY_BUFFER_SIZE];

pub mod prelude {
    pub use super::{
        error::{Chip8Error, Chip8Result},
        keys::KeyCode,
        opcode::Instruction,
        vm::{Chip8Conf, Chip8Vm, Flow, Hz},
    };
}
