//! Wire-level helpers for an HD44780 driven in 4-bit mode through a PCF8574
//! I2C expander.
//!
//! Expander pin map: P0=RS, P1=RW, P2=EN, P3=backlight, P4..P7=D4..D7.

/// Default 7-bit address of the common PCF8574 backpack.
pub const DEFAULT_ADDRESS: u8 = 0x27;

pub const COLUMNS: u8 = 16;
pub const ROWS: u8 = 2;

pub const RS: u8 = 0x01;
pub const RW: u8 = 0x02;
pub const EN: u8 = 0x04;
pub const BACKLIGHT: u8 = 0x08;

pub const CMD_CLEAR: u8 = 0x01;
pub const CMD_HOME: u8 = 0x02;
/// Increment cursor, no display shift.
pub const CMD_ENTRY_MODE: u8 = 0x06;
/// Display on, cursor off, blink off.
pub const CMD_DISPLAY_ON: u8 = 0x0C;
pub const CMD_DISPLAY_OFF: u8 = 0x08;
/// 4-bit bus, two lines, 5x8 font.
pub const CMD_FUNCTION_SET: u8 = 0x28;
pub const CMD_SET_DDRAM: u8 = 0x80;

/// Nibbles of the power-on reset dance: three times 8-bit, then 4-bit.
pub const INIT_8BIT_NIBBLE: u8 = 0x3;
pub const INIT_4BIT_NIBBLE: u8 = 0x2;

const ROW_OFFSETS: [u8; ROWS as usize] = [0x00, 0x40];

/// Register targeted by a transfer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Register {
    Command,
    Data,
}

#[inline]
pub const fn expander_byte(nibble: u8, register: Register, backlight: bool) -> u8 {
    let rs = match register {
        Register::Command => 0,
        Register::Data => RS,
    };
    let bl = if backlight { BACKLIGHT } else { 0 };
    ((nibble & 0x0F) << 4) | rs | bl
}

/// One nibble strobed through EN: latched on the falling edge.
#[inline]
pub const fn nibble_frame(nibble: u8, register: Register, backlight: bool) -> [u8; 2] {
    let byte = expander_byte(nibble, register, backlight);
    [byte | EN, byte]
}

/// A full byte as two strobed nibbles, high nibble first.
#[inline]
pub const fn byte_frame(value: u8, register: Register, backlight: bool) -> [u8; 4] {
    let high = nibble_frame(value >> 4, register, backlight);
    let low = nibble_frame(value & 0x0F, register, backlight);
    [high[0], high[1], low[0], low[1]]
}

/// `Set DDRAM address` command for a cell, or `None` off-screen.
#[inline]
pub fn ddram_command(col: u8, row: u8) -> Option<u8> {
    if col >= COLUMNS {
        return None;
    }
    let offset = ROW_OFFSETS.get(row as usize)?;
    Some(CMD_SET_DDRAM | (offset + col))
}

/// Maps a char onto the controller's ROM. Only printable ASCII is shown
/// as-is.
#[inline]
pub fn rom_code(c: char) -> u8 {
    if c.is_ascii() && !c.is_ascii_control() {
        c as u8
    } else {
        b'?'
    }
}
