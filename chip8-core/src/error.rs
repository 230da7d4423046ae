//! Result and errors.
use std::fmt::{self, Display, Formatter};
use std::io;

use crate::constants::MAX_ROM_SIZE;

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug)]
pub enum Chip8Error {
    /// Attempt to load a program that can't fit in VM memory.
    RomTooLarge { size: usize },
    /// Fetched word matches no known instruction. The program
    /// counter is left pointing at the offending word.
    IllegalOpcode { opcode: u16, pc: u16 },
    /// CALL would nest deeper than the 16 levels the stack holds.
    StackOverflow,
    /// RET with no pending frame on the stack.
    StackUnderflow,
    Io(io::Error),
    Fmt(fmt::Error),
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::RomTooLarge { size } => write!(
                f,
                "program is {size} bytes; VM memory can hold at most {MAX_ROM_SIZE}"
            ),
            Self::IllegalOpcode { opcode, pc } => {
                write!(f, "illegal opcode {opcode:04X} at {pc:04X}")
            }
            Self::StackOverflow => write!(f, "call stack overflow"),
            Self::StackUnderflow => write!(f, "call stack underflow"),
            Self::Io(err) => write!(f, "{}", err),
            Self::Fmt(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Chip8Error {}

impl From<io::Error> for Chip8Error {
    fn from(err: io::Error) -> Self {
        Chip8Error::Io(err)
    }
}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}
