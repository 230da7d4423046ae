//! Virtual machine.
use std::{
    fmt::{self, Write},
    time::Duration,
};

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    constants::*,
    cpu::Chip8Cpu,
    error::{Chip8Error, Chip8Result},
    keys::KeyCode,
    opcode::Instruction,
    Chip8DisplayBuffer,
};

/// Fetch-decode-execute engine.
///
/// The VM owns the whole machine state and a random number
/// generator, and advances one instruction per [`Chip8Vm::step`]
/// call. It performs no I/O: the caller feeds in key state, reads
/// the display buffer out, and drives the 60Hz timer cadence via
/// [`Chip8Vm::tick_timers`] at whatever pace it sees fit.
pub struct Chip8Vm {
    cpu: Chip8Cpu,
    rng: SmallRng,
    conf: Chip8Conf,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        let rng = match conf.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        Chip8Vm {
            cpu: Chip8Cpu::new(),
            rng,
            conf,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Load a program into virtual RAM, resetting the machine.
    pub fn load_rom(&mut self, rom: &[u8]) -> Chip8Result<()> {
        self.cpu.load_program(rom)
    }

    pub fn display_buffer(&self) -> Chip8DisplayBuffer {
        &self.cpu.display
    }
}

/// Outcome of a single successful step.
///
/// Tells the caller what kind of instruction just ran, so an outer
/// loop can redraw the screen, toggle the buzzer, or notice that the
/// program is spinning on keyboard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// Returned for 1nnn (`JP addr`), Bnnn (`JP V0, addr`),
    /// 2nnn (`CALL addr`) and 00EE (`RET`).
    Jump,
    /// The display buffer changed and can be presented.
    Draw,
    /// The sound timer was written.
    Sound,
    /// Waiting for a keypress.
    ///
    /// Triggered by Fx0A (`LD Vx, K`) while no key is down. The
    /// program counter was rolled back so the same instruction is
    /// refetched on the next step; the wait is cooperative and
    /// control still returns to the caller every step.
    KeyWait,
}

/// VM Configuration Parameters.
#[derive(Default, Clone)]
pub struct Chip8Conf {
    /// Step cadence hint for the driving loop. Not used by the core itself.
    pub clock_frequency: Option<Hz>,
    /// Fixed seed for the machine-owned random number generator,
    /// so tests can make `RND Vx, byte` deterministic.
    pub rng_seed: Option<u64>,
}

/// CPU clock frequency, in hertz (per second)
#[derive(Debug, Default, Clone, Copy)]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Interpreter
impl Chip8Vm {
    /// Sets the state of a single keypad key.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        self.cpu.set_key_state(key.into(), pressed);
    }

    /// Replace the whole keyboard state. `true` is pressed.
    pub fn set_keys(&mut self, keys: [bool; KEY_COUNT]) {
        self.cpu.keys = keys;
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear_keys(&mut self) {
        self.cpu.keys.fill(false);
    }

    /// Count down the delay and sound timers and maintain the buzzer
    /// switch.
    ///
    /// The caller owns the cadence; the reference rate is
    /// [`TIMER_FREQUENCY`] ticks per second, independent of how fast
    /// instructions are stepped.
    pub fn tick_timers(&mut self) {
        self.cpu.tick_delay();
        self.cpu.tick_sound();

        // Buzzer is on while the sound timer counts down, then
        // turned off when the timer reaches zero.
        if self.cpu.sound_timer > 0 && !self.cpu.buzzer_state {
            self.cpu.buzzer_state = true;
        } else if self.cpu.sound_timer == 0 && self.cpu.buzzer_state {
            self.cpu.buzzer_state = false;
        }
    }

    /// Execute the instruction at the program counter.
    ///
    /// One step is one complete fetch-decode-execute cycle. An
    /// illegal word fails without touching any machine state, with
    /// the program counter still addressing the offending word.
    pub fn step(&mut self) -> Chip8Result<Flow> {
        let word = self.cpu.fetch();
        let instruction = Instruction::decode(word).ok_or(Chip8Error::IllegalOpcode {
            opcode: word,
            pc: self.cpu.pc as u16,
        })?;

        op_trace(self.cpu.pc, &instruction);

        self.cpu.pc += 2;
        self.exec(instruction)
    }

    /// Step the machine a fixed number of times, stopping early on
    /// the first error.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;
        for _ in 0..step_count {
            flow = self.step()?;
        }
        Ok(flow)
    }

    /// Conditionally skip the next instruction.
    #[inline]
    fn skip_when(&mut self, condition: bool) {
        if condition {
            self.cpu.pc += 2;
        }
    }

    fn exec(&mut self, instruction: Instruction) -> Chip8Result<Flow> {
        use Instruction as I;

        let mut flow = Flow::Ok;

        match instruction {
            I::Cls => {
                self.cpu.clear_display();
                flow = Flow::Draw;
            }
            I::Ret => {
                if self.cpu.sp == 0 {
                    return Err(Chip8Error::StackUnderflow);
                }
                self.cpu.sp -= 1;
                self.cpu.pc = self.cpu.stack[self.cpu.sp] as usize;
                flow = Flow::Jump;
            }
            I::Jp { nnn } => {
                self.cpu.pc = nnn as usize;
                flow = Flow::Jump;
            }
            I::Call { nnn } => {
                if self.cpu.sp == STACK_SIZE {
                    return Err(Chip8Error::StackOverflow);
                }
                // The program counter already advanced past the CALL,
                // so this is the return address.
                self.cpu.stack[self.cpu.sp] = self.cpu.pc as Address;
                self.cpu.sp += 1;
                self.cpu.pc = nnn as usize;
                flow = Flow::Jump;
            }
            I::SeByte { vx, kk } => {
                self.skip_when(self.cpu.registers[vx as usize] == kk);
            }
            I::SneByte { vx, kk } => {
                self.skip_when(self.cpu.registers[vx as usize] != kk);
            }
            I::SeReg { vx, vy } => {
                self.skip_when(self.cpu.registers[vx as usize] == self.cpu.registers[vy as usize]);
            }
            I::LdByte { vx, kk } => {
                self.cpu.registers[vx as usize] = kk;
            }
            I::AddByte { vx, kk } => {
                // No carry flag for the immediate form.
                let x = self.cpu.registers[vx as usize];
                self.cpu.registers[vx as usize] = x.wrapping_add(kk);
            }
            I::LdReg { vx, vy } => {
                self.cpu.registers[vx as usize] = self.cpu.registers[vy as usize];
            }
            I::Or { vx, vy } => {
                self.cpu.registers[vx as usize] |= self.cpu.registers[vy as usize];
            }
            I::And { vx, vy } => {
                self.cpu.registers[vx as usize] &= self.cpu.registers[vy as usize];
            }
            I::Xor { vx, vy } => {
                self.cpu.registers[vx as usize] ^= self.cpu.registers[vy as usize];
            }
            I::AddReg { vx, vy } => {
                // Operands are latched before any write so the flag
                // is correct even when Vx or Vy is VF itself.
                let (x, y) = (self.cpu.registers[vx as usize], self.cpu.registers[vy as usize]);
                let sum = x as u16 + y as u16;
                self.cpu.registers[vx as usize] = sum as u8;
                self.cpu.registers[FLAG_REGISTER] = (sum > 0xFF) as u8;
            }
            I::Sub { vx, vy } => {
                let (x, y) = (self.cpu.registers[vx as usize], self.cpu.registers[vy as usize]);
                self.cpu.registers[vx as usize] = x.wrapping_sub(y);
                self.cpu.registers[FLAG_REGISTER] = (x > y) as u8;
            }
            I::Shr { vx } => {
                let x = self.cpu.registers[vx as usize];
                self.cpu.registers[vx as usize] = x >> 1;
                self.cpu.registers[FLAG_REGISTER] = x & 1;
            }
            I::Subn { vx, vy } => {
                let (x, y) = (self.cpu.registers[vx as usize], self.cpu.registers[vy as usize]);
                self.cpu.registers[vx as usize] = y.wrapping_sub(x);
                self.cpu.registers[FLAG_REGISTER] = (y > x) as u8;
            }
            I::Shl { vx } => {
                let x = self.cpu.registers[vx as usize];
                self.cpu.registers[vx as usize] = x << 1;
                self.cpu.registers[FLAG_REGISTER] = x >> 7;
            }
            I::SneReg { vx, vy } => {
                self.skip_when(self.cpu.registers[vx as usize] != self.cpu.registers[vy as usize]);
            }
            I::LdIndex { nnn } => {
                self.cpu.index = nnn;
            }
            I::JpV0 { nnn } => {
                self.cpu.pc = (nnn as usize + self.cpu.registers[0] as usize) & ADDR_MASK;
                flow = Flow::Jump;
            }
            I::Rnd { vx, kk } => {
                self.cpu.registers[vx as usize] = self.rng.gen::<u8>() & kk;
            }
            I::Drw { vx, vy, n } => {
                let x0 = self.cpu.registers[vx as usize] as usize;
                let y0 = self.cpu.registers[vy as usize] as usize;
                let mut collision = false;

                for row in 0..n as usize {
                    // Each sprite row is 8 bits for 8 pixels,
                    // most significant bit leftmost.
                    let sprite = self.cpu.read_ram(self.cpu.index as usize + row);
                    for col in 0..8 {
                        if sprite & (0x80 >> col) == 0 {
                            continue;
                        }
                        // Sprites wrap around both screen edges.
                        let d = ((x0 + col) & DISPLAY_WIDTH_MASK)
                            + ((y0 + row) & DISPLAY_HEIGHT_MASK) * DISPLAY_WIDTH;

                        // XOR erases a pixel when old and new are both on.
                        collision |= self.cpu.display[d];
                        self.cpu.display[d] ^= true;
                    }
                }

                self.cpu.registers[FLAG_REGISTER] = collision as u8;
                flow = Flow::Draw;
            }
            I::Skp { vx } => {
                self.skip_when(self.cpu.key_state(self.cpu.registers[vx as usize]));
            }
            I::Sknp { vx } => {
                self.skip_when(!self.cpu.key_state(self.cpu.registers[vx as usize]));
            }
            I::LdFromDelay { vx } => {
                self.cpu.registers[vx as usize] = self.cpu.delay_timer;
            }
            I::WaitKey { vx } => match self.cpu.first_key() {
                Some(key) => {
                    self.cpu.registers[vx as usize] = key;
                }
                None => {
                    // Roll back so the same instruction is refetched
                    // next step.
                    self.cpu.pc -= 2;
                    flow = Flow::KeyWait;
                }
            },
            I::LdDelay { vx } => {
                self.cpu.delay_timer = self.cpu.registers[vx as usize];
            }
            I::LdSound { vx } => {
                self.cpu.sound_timer = self.cpu.registers[vx as usize];
                self.cpu.buzzer_state = self.cpu.sound_timer > 0;
                flow = Flow::Sound;
            }
            I::AddIndex { vx } => {
                let x = self.cpu.registers[vx as usize] as u16;
                self.cpu.index = self.cpu.index.wrapping_add(x) & ADDR_MASK as u16;
            }
            I::LdFont { vx } => {
                let digit = self.cpu.registers[vx as usize] as usize;
                self.cpu.index = (FONTSET_START + digit * FONTSET_HEIGHT) as Address;
            }
            I::StoreBcd { vx } => {
                let x = self.cpu.registers[vx as usize];
                let addr = self.cpu.index as usize;
                self.cpu.write_ram(addr, x / 100 % 10);
                self.cpu.write_ram(addr + 1, x / 10 % 10);
                self.cpu.write_ram(addr + 2, x % 10);
            }
            I::StoreRegs { vx } => {
                let addr = self.cpu.index as usize;
                for v in 0..=vx as usize {
                    self.cpu.write_ram(addr + v, self.cpu.registers[v]);
                }
            }
            I::LoadRegs { vx } => {
                let addr = self.cpu.index as usize;
                for v in 0..=vx as usize {
                    self.cpu.registers[v] = self.cpu.read_ram(addr + v);
                }
            }
        }

        Ok(flow)
    }
}

/// Read-only views for drivers and tests.
impl Chip8Vm {
    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.cpu.registers
    }

    pub fn pc(&self) -> u16 {
        self.cpu.pc as u16
    }

    pub fn index(&self) -> Address {
        self.cpu.index
    }

    pub fn delay_timer(&self) -> u8 {
        self.cpu.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.cpu.sound_timer
    }

    /// Whether a tone should currently be playing.
    pub fn sound_active(&self) -> bool {
        self.cpu.buzzer_state
    }
}

/// Troubleshooting
#[allow(dead_code)]
#[doc(hidden)]
impl Chip8Vm {
    /// Returns the contents of program memory as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let iter = self
            .cpu
            .ram
            .iter()
            .enumerate()
            .skip(MEM_START)
            .take(count)
            .step_by(2);
        let mut buf = String::new();

        for (i, op) in iter {
            writeln!(buf, "{:04X}: {:02X}{:02X}", i, op, self.cpu.ram[i + 1])?;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        for y in 0..DISPLAY_HEIGHT {
            for x in 0..DISPLAY_WIDTH {
                if self.cpu.display[x + y * DISPLAY_WIDTH] {
                    write!(buf, "#")?;
                } else {
                    write!(buf, ".")?;
                }
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(pc: usize, instruction: &Instruction) {
    println!("{pc:04X}: {instruction}");
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: usize, _: &Instruction) {}

#[cfg(test)]
mod test {
    use super::*;

    /// VM with a fixed RNG seed so tests are deterministic.
    fn new_vm(rom: &[u8]) -> Chip8Vm {
        let mut vm = Chip8Vm::new(Chip8Conf {
            rng_seed: Some(0xC8),
            ..Chip8Conf::default()
        });
        vm.load_rom(rom).unwrap();
        vm
    }

    #[test]
    fn test_clock_hz() {
        let interval: Duration = Hz(60).into();
        assert_eq!(interval.as_millis(), 16);
    }

    /// LD V0, 10; LD V1, 5; ADD V0, V1
    #[test]
    fn test_add_program() {
        let mut vm = new_vm(&[0x60, 0x0A, 0x61, 0x05, 0x80, 0x14]);
        vm.run_steps(3).unwrap();
        assert_eq!(vm.cpu.registers[0], 15);
        assert_eq!(vm.cpu.registers[0xF], 0);
    }

    /// 8xy4: VF is 1 exactly when the 9-bit sum exceeds 255, and the
    /// stored result is the sum mod 256.
    #[test]
    fn test_add_reg_carry() {
        for (x, y) in [(0xFFu8, 0x11u8), (0xFF, 0x01), (0xFE, 0x01), (0x80, 0x80), (0, 0)] {
            let mut vm = new_vm(&[0x80, 0x14]);
            vm.cpu.registers[0] = x;
            vm.cpu.registers[1] = y;
            vm.step().unwrap();

            let sum = x as u16 + y as u16;
            assert_eq!(vm.cpu.registers[0], sum as u8, "{x} + {y}");
            assert_eq!(vm.cpu.registers[0xF], (sum > 0xFF) as u8, "{x} + {y}");
        }
    }

    /// 8xy5: result is (Vx - Vy) mod 256; VF is 1 iff Vx > Vy.
    #[test]
    fn test_sub_borrow() {
        for (x, y, result, flag) in [
            (0x33u8, 0x11u8, 0x22u8, 1u8),
            (0x11, 0x12, 0xFF, 0),
            (0x11, 0x11, 0x00, 0),
        ] {
            let mut vm = new_vm(&[0x80, 0x15]);
            vm.cpu.registers[0] = x;
            vm.cpu.registers[1] = y;
            vm.step().unwrap();
            assert_eq!(vm.cpu.registers[0], result);
            assert_eq!(vm.cpu.registers[0xF], flag);
        }
    }

    /// SUBN V0, V1 with V0=5, V1=10: V0 = 10 - 5, no borrow.
    #[test]
    fn test_subn_reverse_operands() {
        let mut vm = new_vm(&[0x80, 0x17]);
        vm.cpu.registers[0] = 5;
        vm.cpu.registers[1] = 10;
        vm.step().unwrap();
        assert_eq!(vm.cpu.registers[0], 5);
        assert_eq!(vm.cpu.registers[0xF], 1);
    }

    #[test]
    fn test_shr_captures_low_bit() {
        for (x, result, flag) in [(0x05u8, 0x02u8, 1u8), (0x04, 0x02, 0), (0xFF, 0x7F, 1)] {
            let mut vm = new_vm(&[0x80, 0x06]);
            vm.cpu.registers[0] = x;
            vm.step().unwrap();
            assert_eq!(vm.cpu.registers[0], result);
            assert_eq!(vm.cpu.registers[0xF], flag);
        }
    }

    #[test]
    fn test_shl_captures_high_bit() {
        for (x, result, flag) in [(0xFFu8, 0xFEu8, 1u8), (0x04, 0x08, 0), (0x80, 0x00, 1)] {
            let mut vm = new_vm(&[0x80, 0x0E]);
            vm.cpu.registers[0] = x;
            vm.step().unwrap();
            assert_eq!(vm.cpu.registers[0], result);
            assert_eq!(vm.cpu.registers[0xF], flag);
        }
    }

    #[test]
    fn test_skip_equal_byte() {
        // SE V0, 0x0A with V0 == 0x0A skips the next instruction.
        let mut vm = new_vm(&[0x30, 0x0A]);
        vm.cpu.registers[0] = 0x0A;
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, MEM_START + 4);

        // ...and falls through when not equal.
        let mut vm = new_vm(&[0x30, 0x0A]);
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, MEM_START + 2);
    }

    #[test]
    fn test_add_byte_has_no_carry_flag() {
        let mut vm = new_vm(&[0x70, 0xFF]);
        vm.cpu.registers[0] = 2;
        vm.cpu.registers[0xF] = 0xAA; // sentinel
        vm.step().unwrap();
        assert_eq!(vm.cpu.registers[0], 1);
        assert_eq!(vm.cpu.registers[0xF], 0xAA);
    }

    /// Drawing the same sprite twice at the same position restores
    /// the previous pixels, with the second draw flagging collision.
    #[test]
    fn test_draw_is_xor_idempotent() {
        // LD I, 0x50 (glyph for 0); DRW V0, V1, 5; DRW V0, V1, 5
        let mut vm = new_vm(&[0xA0, 0x50, 0xD0, 0x15, 0xD0, 0x15]);

        vm.run_steps(2).unwrap();
        assert!(vm.display_buffer().iter().any(|px| *px));
        assert_eq!(vm.cpu.registers[0xF], 0);

        assert_eq!(vm.step().unwrap(), Flow::Draw);
        assert!(vm.display_buffer().iter().all(|px| !px));
        assert_eq!(vm.cpu.registers[0xF], 1);
    }

    /// A colliding row followed by a clean row must not lower VF back
    /// to zero within the same draw.
    #[test]
    fn test_draw_collision_is_latched() {
        // Sprite rows at I: [0xFF, 0xFF]. First draw one row, then
        // draw two rows over it; only the first row collides.
        let mut vm = new_vm(&[0xA2, 0x10, 0xD0, 0x11, 0xD0, 0x12]);
        vm.cpu.ram[0x210] = 0xFF;
        vm.cpu.ram[0x211] = 0xFF;

        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.registers[0xF], 0);

        vm.step().unwrap();
        assert_eq!(vm.cpu.registers[0xF], 1);
        // Row 0 erased, row 1 drawn.
        assert!(!vm.cpu.display[0]);
        assert!(vm.cpu.display[DISPLAY_WIDTH]);
    }

    #[test]
    fn test_draw_wraps_both_axes() {
        // Single row sprite 0b1100_0000 drawn at (62, 31).
        let mut vm = new_vm(&[0xA2, 0x10, 0xD0, 0x11]);
        vm.cpu.ram[0x210] = 0xC0;
        vm.cpu.registers[0] = 62;
        vm.cpu.registers[1] = 31;
        vm.run_steps(2).unwrap();

        let last_row = 31 * DISPLAY_WIDTH;
        assert!(vm.cpu.display[last_row + 62]);
        assert!(vm.cpu.display[last_row + 63]);
        // Only two pixels set, no spill into row 0 or column 0.
        assert_eq!(vm.cpu.display.iter().filter(|px| **px).count(), 2);
    }

    /// CALL then RET lands on the instruction after the CALL, at
    /// every legal nesting depth.
    #[test]
    fn test_call_ret_round_trip() {
        for depth in 0..STACK_SIZE {
            // CALL 0x204; (at 0x204) RET
            let mut vm = new_vm(&[0x22, 0x04, 0x00, 0x00, 0x00, 0xEE]);
            vm.cpu.sp = depth;

            assert_eq!(vm.step().unwrap(), Flow::Jump);
            assert_eq!(vm.cpu.pc, 0x204);
            assert_eq!(vm.cpu.sp, depth + 1);

            assert_eq!(vm.step().unwrap(), Flow::Jump);
            assert_eq!(vm.cpu.pc, MEM_START + 2);
            assert_eq!(vm.cpu.sp, depth);
        }
    }

    #[test]
    fn test_call_overflows_at_16_frames() {
        let mut vm = new_vm(&[0x22, 0x00]);
        vm.cpu.sp = STACK_SIZE;
        assert!(matches!(vm.step(), Err(Chip8Error::StackOverflow)));
    }

    #[test]
    fn test_ret_underflows_on_empty_stack() {
        let mut vm = new_vm(&[0x00, 0xEE]);
        assert!(matches!(vm.step(), Err(Chip8Error::StackUnderflow)));
    }

    /// Fx0A: the machine must stall until a key is pressed, then
    /// store that key and continue.
    #[test]
    fn test_wait_key() {
        let mut vm = new_vm(&[
            0xF1, 0x0A, // LD V1, K
            0x62, 0x42, // LD V2, 0x42  ; sentinel
        ]);

        // machine must stall
        for _ in 0..5 {
            assert_eq!(vm.step().unwrap(), Flow::KeyWait);
            assert_eq!(vm.cpu.pc, MEM_START);
        }

        vm.set_key(KeyCode::Key5, true);

        // machine will now advance
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, MEM_START + 2);
        assert_eq!(vm.cpu.registers[1], 0x05);

        vm.step().unwrap();
        assert_eq!(vm.cpu.registers[2], 0x42);
    }

    #[test]
    fn test_skip_on_key_state() {
        // SKP V0 with key 7 down skips.
        let mut vm = new_vm(&[0xE0, 0x9E]);
        vm.cpu.registers[0] = 7;
        vm.set_keys({
            let mut keys = [false; KEY_COUNT];
            keys[7] = true;
            keys
        });
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, MEM_START + 4);

        // SKNP V0 with the same key down falls through.
        let mut vm = new_vm(&[0xE0, 0xA1]);
        vm.cpu.registers[0] = 7;
        vm.set_key(KeyCode::Key7, true);
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, MEM_START + 2);
    }

    /// Fx33 on 234 writes digits 2, 3, 4 at I, I+1, I+2.
    #[test]
    fn test_store_bcd() {
        let mut vm = new_vm(&[0xA3, 0x00, 0xF0, 0x33]);
        vm.cpu.registers[0] = 234;
        vm.run_steps(2).unwrap();
        assert_eq!(&vm.cpu.ram[0x300..0x303], &[2, 3, 4]);
    }

    #[test]
    fn test_store_and_load_registers() {
        // LD I, 0x300; LD [I], V3; then LD V3, [I] restores.
        let mut vm = new_vm(&[0xA3, 0x00, 0xF3, 0x55, 0xF3, 0x65]);
        vm.cpu.registers[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        vm.run_steps(2).unwrap();
        assert_eq!(&vm.cpu.ram[0x300..0x304], &[0xDE, 0xAD, 0xBE, 0xEF]);
        // V4 was not dumped.
        assert_eq!(vm.cpu.ram[0x304], 0);

        vm.cpu.registers[..4].fill(0);
        vm.step().unwrap();
        assert_eq!(&vm.cpu.registers[..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_jump_with_offset() {
        let mut vm = new_vm(&[0xB2, 0x10]);
        vm.cpu.registers[0] = 0x02;
        assert_eq!(vm.step().unwrap(), Flow::Jump);
        assert_eq!(vm.cpu.pc, 0x212);
    }

    #[test]
    fn test_rnd_applies_mask() {
        // RND V0, 0x0F leaves the high nibble clear, whatever the roll.
        for _ in 0..8 {
            let mut vm = new_vm(&[0xC0, 0x0F, 0x12, 0x00]);
            vm.step().unwrap();
            assert_eq!(vm.cpu.registers[0] & 0xF0, 0);
        }
    }

    #[test]
    fn test_rnd_is_deterministic_per_seed() {
        let mut a = new_vm(&[0xC0, 0xFF]);
        let mut b = new_vm(&[0xC0, 0xFF]);
        a.step().unwrap();
        b.step().unwrap();
        assert_eq!(a.cpu.registers[0], b.cpu.registers[0]);
    }

    #[test]
    fn test_illegal_opcode_leaves_state_untouched() {
        let mut vm = new_vm(&[0x5A, 0xB1]); // 5xy1 does not exist
        let err = vm.step().unwrap_err();
        assert!(matches!(
            err,
            Chip8Error::IllegalOpcode { opcode: 0x5AB1, pc } if pc == MEM_START as u16
        ));
        assert_eq!(vm.cpu.pc, MEM_START);
    }

    #[test]
    fn test_font_address_lookup() {
        let mut vm = new_vm(&[0xF0, 0x29]);
        vm.cpu.registers[0] = 0xA;
        vm.step().unwrap();
        assert_eq!(vm.cpu.index as usize, FONTSET_START + 0xA * FONTSET_HEIGHT);
    }

    #[test]
    fn test_add_index_wraps_to_12_bits() {
        let mut vm = new_vm(&[0xF0, 0x1E]);
        vm.cpu.index = 0xFFE;
        vm.cpu.registers[0] = 0x04;
        vm.step().unwrap();
        assert_eq!(vm.cpu.index, 0x002);
    }

    #[test]
    fn test_timers_only_move_on_tick() {
        // LD V0, 5; LD DT, V0; LD ST, V0
        let mut vm = new_vm(&[0x60, 0x05, 0xF0, 0x15, 0xF0, 0x18]);
        vm.run_steps(2).unwrap();
        assert_eq!(vm.delay_timer(), 5);

        assert_eq!(vm.step().unwrap(), Flow::Sound);
        assert_eq!(vm.sound_timer(), 5);
        assert!(vm.sound_active());

        // Stepping never decrements; that cadence belongs to the caller.
        assert_eq!(vm.delay_timer(), 5);

        for expected in (0..5).rev() {
            vm.tick_timers();
            assert_eq!(vm.delay_timer(), expected);
            assert_eq!(vm.sound_timer(), expected);
        }
        assert!(!vm.sound_active());
    }

    #[test]
    fn test_read_delay_timer() {
        let mut vm = new_vm(&[0xF1, 0x07]);
        vm.cpu.delay_timer = 0x42;
        vm.step().unwrap();
        assert_eq!(vm.cpu.registers[1], 0x42);
    }

    #[test]
    fn test_clear_display() {
        let mut vm = new_vm(&[0x00, 0xE0]);
        vm.cpu.display[100] = true;
        assert_eq!(vm.step().unwrap(), Flow::Draw);
        assert!(vm.display_buffer().iter().all(|px| !px));
    }
}
