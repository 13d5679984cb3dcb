use embedded_hal::{delay::DelayNs, i2c::I2c};
use focus_core::render::{Line, Screen};
use lcd1602_i2c::{Config, Error as LcdError, Lcd1602};
use log::{info, warn};

/// Board-level adapter that renders [`Screen`]s onto the LCD1602.
///
/// Rows are only rewritten when their text changed since the last frame.
#[derive(Debug)]
pub struct CharacterDisplay<I2C> {
    lcd: Lcd1602<I2C>,
    shown: [Option<Line>; 2],
    fault_logged: bool,
}

impl<I2C> CharacterDisplay<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C, config: Config) -> Self {
        Self {
            lcd: Lcd1602::new(i2c, config),
            shown: [None, None],
            fault_logged: false,
        }
    }

    pub fn initialize<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), LcdError<I2C::Error>> {
        self.lcd.initialize(delay)?;
        self.shown = [None, None];
        info!("display: lcd1602 ready addr=0x{:02x}", self.lcd.config().address);
        Ok(())
    }

    /// Draws a frame. Bus errors are logged once and otherwise ignored so a
    /// flaky display never stalls the poll loop.
    pub fn render(&mut self, screen: &Screen) -> bool {
        let lines = screen.lines();

        for (row, line) in lines.into_iter().enumerate() {
            if self.shown[row].as_ref() == Some(&line) {
                continue;
            }
            if let Err(err) = self.lcd.write_line(row as u8, &line) {
                if !self.fault_logged {
                    warn!("display: write failed row={} err={:?}", row, err);
                    self.fault_logged = true;
                }
                self.shown[row] = None;
                return false;
            }
            self.shown[row] = Some(line);
        }

        self.fault_logged = false;
        true
    }
}
