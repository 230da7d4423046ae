//! Instruction words and their decoding.
//!
//! Instructions are two bytes, big-endian, with the opcode class in
//! the topmost nibble. Depending on the class the rest of the word
//! holds register indices, an immediate byte, an immediate nibble,
//! or a 12-bit address:
//!
//! - `nnn` - lowest 12 bits, a memory address
//! - `n`   - lowest 4 bits, a nibble immediate
//! - `x`   - lower 4 bits of the high byte, register index
//! - `y`   - upper 4 bits of the low byte, register index
//! - `kk`  - the low byte, a byte immediate
use std::fmt::{self, Display, Formatter};

use crate::constants::Address;

/// Extract the opcode class from an instruction word.
#[inline(always)]
pub fn op_class(word: u16) -> u8 {
    (word >> 12) as u8
}

/// Extract operand NNN from an instruction word.
#[inline(always)]
pub fn op_nnn(word: u16) -> Address {
    word & 0x0FFF
}

/// Extract operand X from an instruction word.
#[inline(always)]
pub fn op_x(word: u16) -> u8 {
    ((word >> 8) & 0xF) as u8
}

/// Extract operand Y from an instruction word.
#[inline(always)]
pub fn op_y(word: u16) -> u8 {
    ((word >> 4) & 0xF) as u8
}

/// Extract operand N from an instruction word.
#[inline(always)]
pub fn op_n(word: u16) -> u8 {
    (word & 0xF) as u8
}

/// Extract operand KK from an instruction word.
#[inline(always)]
pub fn op_kk(word: u16) -> u8 {
    (word & 0xFF) as u8
}

/// A decoded instruction, one variant per operation the machine knows.
///
/// Decoding up front keeps the execute step an exhaustive `match`
/// instead of a table keyed by every concrete 16-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// 00E0 - Clear the display.
    Cls,
    /// 00EE - Return from a subroutine.
    Ret,
    /// 1nnn - Jump to address.
    Jp { nnn: Address },
    /// 2nnn - Call subroutine.
    Call { nnn: Address },
    /// 3xkk - Skip next instruction if Vx == kk.
    SeByte { vx: u8, kk: u8 },
    /// 4xkk - Skip next instruction if Vx != kk.
    SneByte { vx: u8, kk: u8 },
    /// 5xy0 - Skip next instruction if Vx == Vy.
    SeReg { vx: u8, vy: u8 },
    /// 6xkk - Set Vx = kk.
    LdByte { vx: u8, kk: u8 },
    /// 7xkk - Set Vx = Vx + kk. The carry flag is untouched.
    AddByte { vx: u8, kk: u8 },
    /// 8xy0 - Set Vx = Vy.
    LdReg { vx: u8, vy: u8 },
    /// 8xy1 - Set Vx = Vx | Vy.
    Or { vx: u8, vy: u8 },
    /// 8xy2 - Set Vx = Vx & Vy.
    And { vx: u8, vy: u8 },
    /// 8xy3 - Set Vx = Vx ^ Vy.
    Xor { vx: u8, vy: u8 },
    /// 8xy4 - Set Vx = Vx + Vy, VF = carry.
    AddReg { vx: u8, vy: u8 },
    /// 8xy5 - Set Vx = Vx - Vy, VF = not borrow.
    Sub { vx: u8, vy: u8 },
    /// 8xy6 - Set VF to the lowest bit of Vx, then Vx = Vx >> 1.
    Shr { vx: u8 },
    /// 8xy7 - Set Vx = Vy - Vx, VF = not borrow.
    Subn { vx: u8, vy: u8 },
    /// 8xyE - Set VF to the highest bit of Vx, then Vx = Vx << 1.
    Shl { vx: u8 },
    /// 9xy0 - Skip next instruction if Vx != Vy.
    SneReg { vx: u8, vy: u8 },
    /// Annn - Set I = nnn.
    LdIndex { nnn: Address },
    /// Bnnn - Jump to address nnn + V0.
    JpV0 { nnn: Address },
    /// Cxkk - Set Vx to a random byte masked with kk.
    Rnd { vx: u8, kk: u8 },
    /// Dxyn - Draw an 8-wide, n-tall sprite from memory at I
    /// to position (Vx, Vy), VF = collision.
    Drw { vx: u8, vy: u8, n: u8 },
    /// Ex9E - Skip next instruction if the key in Vx is down.
    Skp { vx: u8 },
    /// ExA1 - Skip next instruction if the key in Vx is up.
    Sknp { vx: u8 },
    /// Fx07 - Set Vx to the delay timer value.
    LdFromDelay { vx: u8 },
    /// Fx0A - Stall until a key is pressed, store its value in Vx.
    WaitKey { vx: u8 },
    /// Fx15 - Set the delay timer to Vx.
    LdDelay { vx: u8 },
    /// Fx18 - Set the sound timer to Vx.
    LdSound { vx: u8 },
    /// Fx1E - Set I = I + Vx.
    AddIndex { vx: u8 },
    /// Fx29 - Set I to the font sprite address for digit Vx.
    LdFont { vx: u8 },
    /// Fx33 - Store the decimal digits of Vx at I, I+1 and I+2.
    StoreBcd { vx: u8 },
    /// Fx55 - Store registers V0..=Vx in memory starting at I.
    StoreRegs { vx: u8 },
    /// Fx65 - Load registers V0..=Vx from memory starting at I.
    LoadRegs { vx: u8 },
}

impl Instruction {
    /// Decode an instruction word.
    ///
    /// Dispatch is two-level: the top nibble selects the class, and
    /// for the classes that overload their top nibble (0x0, 0x8, 0xE
    /// and 0xF) the low byte or low nibble disambiguates. Words that
    /// match no operation decode to `None`.
    pub fn decode(word: u16) -> Option<Instruction> {
        use Instruction as I;

        let (nnn, x, y, n, kk) = (op_nnn(word), op_x(word), op_y(word), op_n(word), op_kk(word));

        let instruction = match op_class(word) {
            0x0 => match word {
                0x00E0 => I::Cls,
                0x00EE => I::Ret,
                // 0nnn (SYS addr) ran native RCA 1802 routines on the
                // original hardware. No modern interpreter supports it.
                _ => return None,
            },
            0x1 => I::Jp { nnn },
            0x2 => I::Call { nnn },
            0x3 => I::SeByte { vx: x, kk },
            0x4 => I::SneByte { vx: x, kk },
            0x5 => match n {
                0x0 => I::SeReg { vx: x, vy: y },
                _ => return None,
            },
            0x6 => I::LdByte { vx: x, kk },
            0x7 => I::AddByte { vx: x, kk },
            0x8 => match n {
                0x0 => I::LdReg { vx: x, vy: y },
                0x1 => I::Or { vx: x, vy: y },
                0x2 => I::And { vx: x, vy: y },
                0x3 => I::Xor { vx: x, vy: y },
                0x4 => I::AddReg { vx: x, vy: y },
                0x5 => I::Sub { vx: x, vy: y },
                0x6 => I::Shr { vx: x },
                0x7 => I::Subn { vx: x, vy: y },
                0xE => I::Shl { vx: x },
                _ => return None,
            },
            0x9 => match n {
                0x0 => I::SneReg { vx: x, vy: y },
                _ => return None,
            },
            0xA => I::LdIndex { nnn },
            0xB => I::JpV0 { nnn },
            0xC => I::Rnd { vx: x, kk },
            0xD => I::Drw { vx: x, vy: y, n },
            0xE => match kk {
                0x9E => I::Skp { vx: x },
                0xA1 => I::Sknp { vx: x },
                _ => return None,
            },
            0xF => match kk {
                0x07 => I::LdFromDelay { vx: x },
                0x0A => I::WaitKey { vx: x },
                0x15 => I::LdDelay { vx: x },
                0x18 => I::LdSound { vx: x },
                0x1E => I::AddIndex { vx: x },
                0x29 => I::LdFont { vx: x },
                0x33 => I::StoreBcd { vx: x },
                0x55 => I::StoreRegs { vx: x },
                0x65 => I::LoadRegs { vx: x },
                _ => return None,
            },
            _ => unreachable!("opcode class is 4 bits"),
        };

        Some(instruction)
    }

    /// Conventional assembly mnemonic for the operation.
    pub fn mnemonic(&self) -> &'static str {
        use Instruction as I;

        match self {
            I::Cls => "CLS",
            I::Ret => "RET",
            I::Jp { .. } => "JP",
            I::Call { .. } => "CALL",
            I::SeByte { .. } | I::SeReg { .. } => "SE",
            I::SneByte { .. } | I::SneReg { .. } => "SNE",
            I::LdByte { .. }
            | I::LdReg { .. }
            | I::LdIndex { .. }
            | I::LdFromDelay { .. }
            | I::WaitKey { .. }
            | I::LdDelay { .. }
            | I::LdSound { .. }
            | I::LdFont { .. }
            | I::StoreBcd { .. }
            | I::StoreRegs { .. }
            | I::LoadRegs { .. } => "LD",
            I::AddByte { .. } | I::AddReg { .. } | I::AddIndex { .. } => "ADD",
            I::Or { .. } => "OR",
            I::And { .. } => "AND",
            I::Xor { .. } => "XOR",
            I::Sub { .. } => "SUB",
            I::Shr { .. } => "SHR",
            I::Subn { .. } => "SUBN",
            I::Shl { .. } => "SHL",
            I::JpV0 { .. } => "JP",
            I::Rnd { .. } => "RND",
            I::Drw { .. } => "DRW",
            I::Skp { .. } => "SKP",
            I::Sknp { .. } => "SKNP",
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use Instruction as I;

        let name = self.mnemonic();
        match *self {
            I::Cls | I::Ret => write!(f, "{name}"),
            I::Jp { nnn } | I::Call { nnn } => write!(f, "{name} {nnn:03X}"),
            I::JpV0 { nnn } => write!(f, "{name} V0, {nnn:03X}"),
            I::LdIndex { nnn } => write!(f, "{name} I, {nnn:03X}"),
            I::SeByte { vx, kk }
            | I::SneByte { vx, kk }
            | I::LdByte { vx, kk }
            | I::AddByte { vx, kk }
            | I::Rnd { vx, kk } => write!(f, "{name} V{vx:X}, {kk:02X}"),
            I::SeReg { vx, vy }
            | I::SneReg { vx, vy }
            | I::LdReg { vx, vy }
            | I::Or { vx, vy }
            | I::And { vx, vy }
            | I::Xor { vx, vy }
            | I::AddReg { vx, vy }
            | I::Sub { vx, vy }
            | I::Subn { vx, vy } => write!(f, "{name} V{vx:X}, V{vy:X}"),
            I::Shr { vx } | I::Shl { vx } | I::Skp { vx } | I::Sknp { vx } => {
                write!(f, "{name} V{vx:X}")
            }
            I::Drw { vx, vy, n } => write!(f, "{name} V{vx:X}, V{vy:X}, {n:X}"),
            I::LdFromDelay { vx } => write!(f, "{name} V{vx:X}, DT"),
            I::WaitKey { vx } => write!(f, "{name} V{vx:X}, K"),
            I::LdDelay { vx } => write!(f, "{name} DT, V{vx:X}"),
            I::LdSound { vx } => write!(f, "{name} ST, V{vx:X}"),
            I::AddIndex { vx } => write!(f, "{name} I, V{vx:X}"),
            I::LdFont { vx } => write!(f, "{name} F, V{vx:X}"),
            I::StoreBcd { vx } => write!(f, "{name} B, V{vx:X}"),
            I::StoreRegs { vx } => write!(f, "{name} [I], V{vx:X}"),
            I::LoadRegs { vx } => write!(f, "{name} V{vx:X}, [I]"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_operand_fields() {
        let word: u16 = 0xABCD;
        assert_eq!(op_class(word), 0xA);
        assert_eq!(op_nnn(word), 0xBCD);
        assert_eq!(op_x(word), 0xB);
        assert_eq!(op_y(word), 0xC);
        assert_eq!(op_n(word), 0xD);
        assert_eq!(op_kk(word), 0xCD);
    }

    #[test]
    fn test_decode_covers_every_operation() {
        use Instruction as I;

        let cases: &[(u16, Instruction)] = &[
            (0x00E0, I::Cls),
            (0x00EE, I::Ret),
            (0x1ABC, I::Jp { nnn: 0xABC }),
            (0x2ABC, I::Call { nnn: 0xABC }),
            (0x31FE, I::SeByte { vx: 1, kk: 0xFE }),
            (0x41FE, I::SneByte { vx: 1, kk: 0xFE }),
            (0x5120, I::SeReg { vx: 1, vy: 2 }),
            (0x61FE, I::LdByte { vx: 1, kk: 0xFE }),
            (0x71FE, I::AddByte { vx: 1, kk: 0xFE }),
            (0x8120, I::LdReg { vx: 1, vy: 2 }),
            (0x8121, I::Or { vx: 1, vy: 2 }),
            (0x8122, I::And { vx: 1, vy: 2 }),
            (0x8123, I::Xor { vx: 1, vy: 2 }),
            (0x8124, I::AddReg { vx: 1, vy: 2 }),
            (0x8125, I::Sub { vx: 1, vy: 2 }),
            (0x8126, I::Shr { vx: 1 }),
            (0x8127, I::Subn { vx: 1, vy: 2 }),
            (0x812E, I::Shl { vx: 1 }),
            (0x9120, I::SneReg { vx: 1, vy: 2 }),
            (0xAABC, I::LdIndex { nnn: 0xABC }),
            (0xBABC, I::JpV0 { nnn: 0xABC }),
            (0xC1FE, I::Rnd { vx: 1, kk: 0xFE }),
            (0xD125, I::Drw { vx: 1, vy: 2, n: 5 }),
            (0xE19E, I::Skp { vx: 1 }),
            (0xE1A1, I::Sknp { vx: 1 }),
            (0xF107, I::LdFromDelay { vx: 1 }),
            (0xF10A, I::WaitKey { vx: 1 }),
            (0xF115, I::LdDelay { vx: 1 }),
            (0xF118, I::LdSound { vx: 1 }),
            (0xF11E, I::AddIndex { vx: 1 }),
            (0xF129, I::LdFont { vx: 1 }),
            (0xF133, I::StoreBcd { vx: 1 }),
            (0xF155, I::StoreRegs { vx: 1 }),
            (0xF165, I::LoadRegs { vx: 1 }),
        ];
        // Every operation except 0nnn (SYS), which is rejected.
        assert_eq!(cases.len(), 34);

        for (word, expected) in cases {
            assert_eq!(Instruction::decode(*word), Some(*expected), "{word:04X}");
        }
    }

    #[test]
    fn test_decode_rejects_unknown_words() {
        for word in [0x0000u16, 0x0123, 0x00EF, 0x5121, 0x8128, 0x812F, 0x9121, 0xE19F, 0xE1A2, 0xF100, 0xF166, 0xFFFF] {
            assert_eq!(Instruction::decode(word), None, "{word:04X}");
        }
    }

    #[test]
    fn test_display_renders_operands() {
        let drw = Instruction::decode(0xD125).unwrap();
        assert_eq!(drw.to_string(), "DRW V1, V2, 5");

        let se = Instruction::decode(0x310A).unwrap();
        assert_eq!(se.to_string(), "SE V1, 0A");

        let ret = Instruction::decode(0x00EE).unwrap();
        assert_eq!(ret.to_string(), "RET");
    }
}
