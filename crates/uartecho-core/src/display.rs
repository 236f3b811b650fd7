//! Character-cell model of the two-line OLED used on the board.

use crate::sink::DiagnosticSink;
use crate::transport::decimal_digit;
use crate::Result;

pub const ROWS: usize = 2;
pub const COLS: usize = 16;

/// Label drawn at (1, 1) on boot.
pub const RX_LABEL: &str = "RxData:";
/// Column where the received byte is shown, right after the label.
pub const RX_COLUMN: u8 = 8;

/// Rows and columns are 1-based. Anything that falls outside the grid is
/// clipped.
#[derive(Debug, Clone)]
pub struct TextDisplay {
    cells: [[u8; COLS]; ROWS],
    cursor: (u8, u8),
    initialized: bool,
}

impl Default for TextDisplay {
    fn default() -> Self {
        Self {
            cells: [[b' '; COLS]; ROWS],
            cursor: (1, 1),
            initialized: false,
        }
    }
}

impl TextDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self) {
        self.clear();
        self.initialized = true;
        log::debug!("display initialized ({ROWS}x{COLS})");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn clear(&mut self) {
        self.cells = [[b' '; COLS]; ROWS];
        self.cursor = (1, 1);
    }

    pub fn show_char(&mut self, row: u8, col: u8, ch: u8) {
        let (r, c) = (usize::from(row), usize::from(col));
        if (1..=ROWS).contains(&r) && (1..=COLS).contains(&c) {
            self.cells[r - 1][c - 1] = ch;
        }
        self.cursor = (row, col.saturating_add(1));
    }

    pub fn show_string(&mut self, row: u8, col: u8, s: &str) {
        for (i, &b) in s.as_bytes().iter().enumerate() {
            let Ok(offset) = u8::try_from(i) else { break };
            self.show_char(row, col.saturating_add(offset), b);
        }
    }

    /// Uppercase hex, zero padded to `length` digits; higher digits dropped.
    pub fn show_hex_num(&mut self, row: u8, col: u8, number: u32, length: u8) {
        for i in 0..length {
            let shift = 4 * u32::from(length - i - 1);
            let nibble = number.checked_shr(shift).unwrap_or(0) & 0xF;
            let ch = b"0123456789ABCDEF"[nibble as usize];
            self.show_char(row, col.saturating_add(i), ch);
        }
    }

    pub fn show_num(&mut self, row: u8, col: u8, number: u32, length: u8) {
        for i in 0..length {
            let digit = decimal_digit(number, u32::from(length - i - 1));
            self.show_char(row, col.saturating_add(i), b'0' + digit);
        }
    }

    pub fn row_text(&self, row: u8) -> Option<String> {
        let r = usize::from(row);
        if !(1..=ROWS).contains(&r) {
            return None;
        }
        Some(String::from_utf8_lossy(&self.cells[r - 1]).into_owned())
    }
}

impl DiagnosticSink for TextDisplay {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        for &b in bytes {
            if b == b'\n' {
                self.cursor = (self.cursor.0.saturating_add(1), 1);
            } else {
                let (row, col) = self.cursor;
                self.show_char(row, col, b);
            }
        }
        Ok(())
    }

    fn write_hex(&mut self, byte: u8) -> Result<()> {
        let (row, col) = self.cursor;
        self.show_hex_num(row, col, u32::from(byte), 2);
        Ok(())
    }

    fn record(&mut self, byte: u8) -> Result<()> {
        self.show_hex_num(1, RX_COLUMN, u32::from(byte), 2);
        Ok(())
    }
}
