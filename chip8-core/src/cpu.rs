//! CPU and memory state.
use crate::{
    constants::*,
    error::{Chip8Error, Chip8Result},
};

/// Core state for a Chip-8 machine.
///
/// Every mutable cell of the emulated machine lives here, and only
/// the VM step loop mutates it. Keyboard state is written in by the
/// caller between steps and is read-only as far as the CPU is
/// concerned.
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the current position in the program.
    pub(crate) pc: usize,
    /// Stack pointer, counting the number of live call frames.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 15 (VF) is also the carry flag, borrow switch or
    /// collision flag depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// (I) Pointer register used for temporarily storing an address.
    /// Since addresses are 12 bits, only the lowest bits are significant.
    pub(crate) index: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0. While it has a non-zero
    /// value, a beep is played.
    pub(crate) sound_timer: u8,
    /// Switch tracking whether the buzzer should be on or off.
    pub(crate) buzzer_state: bool,
    /// Keyboard input state. `true` is pressed.
    pub(crate) keys: [bool; KEY_COUNT],

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Return addresses for pending subroutine calls. A dedicated
    /// 16-bit slot per frame; return addresses are never squeezed
    /// into byte-wide main memory.
    pub(crate) stack: [Address; STACK_SIZE],
    /// Screen buffer that sprites are drawn to.
    pub(crate) display: Box<[bool; DISPLAY_BUFFER_SIZE]>,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        Self {
            pc: MEM_START,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            index: 0,
            delay_timer: 0,
            sound_timer: 0,
            buzzer_state: false,
            keys: [false; KEY_COUNT],

            ram: Box::new([0; MEM_SIZE]),
            stack: [0; STACK_SIZE],
            display: Box::new([false; DISPLAY_BUFFER_SIZE]),
        }
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Load a program image, resetting the whole machine.
    ///
    /// Registers, timers, stack, keys and display are zeroed, the
    /// builtin font is written to its reserved region, the program
    /// bytes are copied in at [`MEM_START`] and the program counter
    /// is pointed at them.
    pub(crate) fn load_program(&mut self, rom: &[u8]) -> Chip8Result<()> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(Chip8Error::RomTooLarge { size: rom.len() });
        }

        // Start with clean memory to avoid leaking a previous program.
        self.ram.fill(0);
        self.stack.fill(0);
        self.display.fill(false);
        self.registers.fill(0);
        self.keys.fill(false);
        self.index = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.buzzer_state = false;

        self.ram[FONTSET_START..FONTSET_START + FONTSET.len()].copy_from_slice(&FONTSET);
        self.ram[MEM_START..MEM_START + rom.len()].copy_from_slice(rom);

        self.pc = MEM_START;
        self.sp = 0;

        Ok(())
    }

    /// Fetch the big-endian instruction word at the program counter.
    #[inline(always)]
    pub(crate) fn fetch(&self) -> u16 {
        let hi = self.ram[self.pc & ADDR_MASK] as u16;
        let lo = self.ram[(self.pc + 1) & ADDR_MASK] as u16;
        (hi << 8) | lo
    }

    /// Read a byte of memory, with the address masked to 12 bits.
    #[inline(always)]
    pub(crate) fn read_ram(&self, addr: usize) -> u8 {
        self.ram[addr & ADDR_MASK]
    }

    /// Write a byte of memory, with the address masked to 12 bits.
    #[inline(always)]
    pub(crate) fn write_ram(&mut self, addr: usize, value: u8) {
        self.ram[addr & ADDR_MASK] = value;
    }

    pub(crate) fn clear_display(&mut self) {
        self.display.fill(false);
    }

    pub(crate) fn set_key_state(&mut self, key_id: u8, pressed: bool) {
        if (key_id as usize) < KEY_COUNT {
            self.keys[key_id as usize] = pressed;
        }
    }

    pub(crate) fn key_state(&self, key_id: u8) -> bool {
        match self.keys.get(key_id as usize) {
            Some(pressed) => *pressed,
            None => false,
        }
    }

    /// Retrieve the value of the first key that is pressed down.
    #[inline]
    pub(crate) fn first_key(&self) -> Option<u8> {
        self.keys.iter().position(|pressed| *pressed).map(|k| k as u8)
    }

    /// Count down the delay timer, stopping at zero.
    #[inline]
    pub(crate) fn tick_delay(&mut self) {
        let (val, underflow) = self.delay_timer.overflowing_sub(1);
        if !underflow {
            self.delay_timer = val;
        }
    }

    /// Count down the sound timer, stopping at zero.
    #[inline]
    pub(crate) fn tick_sound(&mut self) {
        let (val, underflow) = self.sound_timer.overflowing_sub(1);
        if !underflow {
            self.sound_timer = val;
        }
    }
}
