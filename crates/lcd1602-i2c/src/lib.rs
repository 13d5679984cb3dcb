#![cfg_attr(not(test), no_std)]

//! HD44780 16x2 character LCD driver over a PCF8574 I2C backpack.

pub mod protocol;

use embedded_hal::{delay::DelayNs, i2c::I2c};

use protocol::Register;

/// Driver configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// 7-bit expander address.
    pub address: u8,
    /// Backlight state applied at init.
    pub backlight: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: protocol::DEFAULT_ADDRESS,
            backlight: true,
        }
    }
}

impl Config {
    pub const fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }
}

/// Driver errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Error<E> {
    /// I2C transfer failed.
    I2c(E),
    /// Cursor position is off-screen.
    InvalidPosition,
}

pub type DriverResult<E> = Result<(), Error<E>>;

/// LCD1602 driver.
#[derive(Debug)]
pub struct Lcd1602<I2C> {
    i2c: I2C,
    config: Config,
    backlight: bool,
}

impl<I2C> Lcd1602<I2C>
where
    I2C: I2c,
{
    /// Creates a new driver instance. Nothing is sent until
    /// [`Self::initialize`].
    pub fn new(i2c: I2C, config: Config) -> Self {
        Self {
            i2c,
            config,
            backlight: config.backlight,
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Releases the owned bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Power-on reset into 4-bit mode, then display on with a cleared screen.
    pub fn initialize<D: DelayNs>(&mut self, delay: &mut D) -> DriverResult<I2C::Error> {
        delay.delay_ms(50);
        self.write_expander(&[protocol::expander_byte(0, Register::Command, self.backlight)])?;

        self.write_nibble(protocol::INIT_8BIT_NIBBLE)?;
        delay.delay_us(4_500);
        self.write_nibble(protocol::INIT_8BIT_NIBBLE)?;
        delay.delay_us(150);
        self.write_nibble(protocol::INIT_8BIT_NIBBLE)?;
        delay.delay_us(150);
        self.write_nibble(protocol::INIT_4BIT_NIBBLE)?;

        self.command(protocol::CMD_FUNCTION_SET)?;
        self.command(protocol::CMD_DISPLAY_ON)?;
        self.clear(delay)?;
        self.command(protocol::CMD_ENTRY_MODE)
    }

    /// Clears the screen and homes the cursor.
    pub fn clear<D: DelayNs>(&mut self, delay: &mut D) -> DriverResult<I2C::Error> {
        self.command(protocol::CMD_CLEAR)?;
        delay.delay_us(2_000);
        Ok(())
    }

    pub fn set_display(&mut self, on: bool) -> DriverResult<I2C::Error> {
        self.command(if on {
            protocol::CMD_DISPLAY_ON
        } else {
            protocol::CMD_DISPLAY_OFF
        })
    }

    pub fn set_backlight(&mut self, on: bool) -> DriverResult<I2C::Error> {
        self.backlight = on;
        self.write_expander(&[protocol::expander_byte(0, Register::Command, on)])
    }

    pub fn set_cursor(&mut self, col: u8, row: u8) -> DriverResult<I2C::Error> {
        let command = protocol::ddram_command(col, row).ok_or(Error::InvalidPosition)?;
        self.command(command)
    }

    /// Writes at the cursor. Characters outside printable ASCII show as `?`.
    pub fn write_str(&mut self, text: &str) -> DriverResult<I2C::Error> {
        for c in text.chars() {
            self.data(protocol::rom_code(c))?;
        }
        Ok(())
    }

    /// Rewrites a whole row, truncating or space-padding to the panel width.
    pub fn write_line(&mut self, row: u8, text: &str) -> DriverResult<I2C::Error> {
        self.set_cursor(0, row)?;

        let mut written = 0;
        for c in text.chars().take(protocol::COLUMNS as usize) {
            self.data(protocol::rom_code(c))?;
            written += 1;
        }
        for _ in written..protocol::COLUMNS {
            self.data(b' ')?;
        }
        Ok(())
    }

    fn command(&mut self, value: u8) -> DriverResult<I2C::Error> {
        let frame = protocol::byte_frame(value, Register::Command, self.backlight);
        self.write_expander(&frame)
    }

    fn data(&mut self, value: u8) -> DriverResult<I2C::Error> {
        let frame = protocol::byte_frame(value, Register::Data, self.backlight);
        self.write_expander(&frame)
    }

    fn write_nibble(&mut self, nibble: u8) -> DriverResult<I2C::Error> {
        let frame = protocol::nibble_frame(nibble, Register::Command, self.backlight);
        self.write_expander(&frame)
    }

    fn write_expander(&mut self, bytes: &[u8]) -> DriverResult<I2C::Error> {
        self.i2c
            .write(self.config.address, bytes)
            .map_err(Error::I2c)
    }
}
