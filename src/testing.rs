//! Hardware stand-ins for host tests.
//!
//! Shared by the unit tests and, through the `testing` feature, by
//! `tests/integration.rs`.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use embedded_hal::digital::{self, ErrorKind, InputPin, OutputPin};
use embedded_storage_async::nor_flash::{
    ErrorType as FlashErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash,
};

use crate::error::{DisplayError, Error, StorageError};
use crate::relay::LineAllocator;
use crate::storage::StatusStorage;
use crate::ui::CharDisplay;

// ═══════════════════════════════════════════════════════════════════════════
// Storage
// ═══════════════════════════════════════════════════════════════════════════

/// [`StatusStorage`] kept in a `Vec`.
#[derive(Default)]
pub struct MemoryStorage {
    doc: Option<Vec<u8>>,
    pub saves: usize,
    /// Hand back a flipped byte on every load.
    pub corrupt_reads: bool,
    pub fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(doc: &[u8]) -> Self {
        Self { doc: Some(doc.to_vec()), ..Self::default() }
    }

    pub fn contents(&self) -> Option<&[u8]> {
        self.doc.as_deref()
    }
}

impl StatusStorage for MemoryStorage {
    async fn load<'a>(&mut self, buf: &'a mut [u8]) -> Result<Option<&'a [u8]>, StorageError> {
        let Some(doc) = &self.doc else {
            return Ok(None);
        };
        let out = buf.get_mut(..doc.len()).ok_or(StorageError::BufferTooSmall)?;
        out.copy_from_slice(doc);
        if self.corrupt_reads {
            if let Some(first) = out.first_mut() {
                *first ^= 0xFF;
            }
        }
        Ok(Some(out))
    }

    async fn save(&mut self, doc: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Flash);
        }
        self.doc = Some(doc.to_vec());
        self.saves += 1;
        Ok(())
    }
}

/// Erasable in-RAM NOR flash, 4 pages of 4 KB.
pub struct RamFlash {
    data: Vec<u8>,
}

impl RamFlash {
    pub const SIZE: usize = 4 * 4096;

    pub fn new() -> Self {
        Self { data: std::vec![0xFF; Self::SIZE] }
    }

    fn span(&mut self, offset: u32, len: usize) -> Result<&mut [u8], NorFlashErrorKind> {
        let start = offset as usize;
        self.data
            .get_mut(start..start + len)
            .ok_or(NorFlashErrorKind::OutOfBounds)
    }
}

impl Default for RamFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashErrorType for RamFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for RamFlash {
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let len = bytes.len();
        bytes.copy_from_slice(self.span(offset, len)?);
        Ok(())
    }

    fn capacity(&self) -> usize {
        Self::SIZE
    }
}

impl NorFlash for RamFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = 4096;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from as usize % Self::ERASE_SIZE != 0 || to as usize % Self::ERASE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        self.span(from, (to - from) as usize)?.fill(0xFF);
        Ok(())
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if offset as usize % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        // NOR programming only clears bits.
        for (cell, byte) in self.span(offset, bytes.len())?.iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Digital lines
// ═══════════════════════════════════════════════════════════════════════════

/// Input line whose level the test sets through a shared handle.
#[derive(Clone)]
pub struct MockInput(Rc<Cell<bool>>);

impl MockInput {
    pub fn new(high: bool) -> Self {
        Self(Rc::new(Cell::new(high)))
    }

    pub fn set(&self, high: bool) {
        self.0.set(high);
    }
}

impl digital::ErrorType for MockInput {
    type Error = Infallible;
}

impl InputPin for MockInput {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
}

/// Input line that always fails.
pub struct BrokenPin;

impl digital::ErrorType for BrokenPin {
    type Error = ErrorKind;
}

impl InputPin for BrokenPin {
    fn is_high(&mut self) -> Result<bool, ErrorKind> {
        Err(ErrorKind::Other)
    }

    fn is_low(&mut self) -> Result<bool, ErrorKind> {
        Err(ErrorKind::Other)
    }
}

#[derive(Default)]
struct LineState {
    level: bool,
    broken: bool,
}

type LineMap = Rc<RefCell<BTreeMap<u8, LineState>>>;

/// [`LineAllocator`] recording every line it hands out.
#[derive(Default)]
pub struct MockLines {
    lines: LineMap,
    acquired: usize,
}

impl MockLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Level of `line`, `None` if it was never acquired.
    pub fn level(&self, line: u8) -> Option<bool> {
        self.lines.borrow().get(&line).map(|s| s.level)
    }

    pub fn acquired(&self) -> usize {
        self.acquired
    }

    /// Make every later write to `line` fail.
    pub fn break_line(&self, line: u8) {
        self.lines.borrow_mut().entry(line).or_default().broken = true;
    }
}

pub struct MockLine {
    line: u8,
    lines: LineMap,
}

impl MockLine {
    fn drive(&mut self, level: bool) -> Result<(), ErrorKind> {
        let mut lines = self.lines.borrow_mut();
        let state = lines.entry(self.line).or_default();
        if state.broken {
            return Err(ErrorKind::Other);
        }
        state.level = level;
        Ok(())
    }
}

impl digital::ErrorType for MockLine {
    type Error = ErrorKind;
}

impl OutputPin for MockLine {
    fn set_low(&mut self) -> Result<(), ErrorKind> {
        self.drive(false)
    }

    fn set_high(&mut self) -> Result<(), ErrorKind> {
        self.drive(true)
    }
}

impl LineAllocator for MockLines {
    type Line = MockLine;

    fn acquire(&mut self, line: u8, on: bool) -> Result<MockLine, Error> {
        self.acquired += 1;
        let mut pin = MockLine { line, lines: self.lines.clone() };
        pin.drive(on).map_err(|_| Error::Gpio)?;
        Ok(pin)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Display
// ═══════════════════════════════════════════════════════════════════════════

/// One call made on a [`RecordingDisplay`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Clear,
    MoveTo(u8, u8),
    Text(u8, u8, String),
    Glyph(u8, u8, bool),
    ShowCursor(u8, u8),
    HideCursor(u8, u8),
}

/// [`CharDisplay`] that logs every call and keeps a character grid.
pub struct RecordingDisplay {
    cols: u8,
    rows: u8,
    pub ops: Vec<Op>,
    pub grid: Vec<Vec<char>>,
    pub cursor_row: Option<u8>,
}

impl RecordingDisplay {
    pub fn new(cols: u8, rows: u8) -> Self {
        Self {
            cols,
            rows,
            ops: Vec::new(),
            grid: std::vec![std::vec![' '; cols as usize]; rows as usize],
            cursor_row: None,
        }
    }

    /// Text currently on `row`, trailing blanks removed.
    pub fn line(&self, row: u8) -> String {
        let s: String = self.grid[row as usize].iter().collect();
        s.trim_end().into()
    }

    /// Device name on `row`: the text between the cursor column and the
    /// glyph, blanks trimmed.
    pub fn name(&self, row: u8) -> String {
        let end = self.cols.saturating_sub(2) as usize;
        let s: String = self.grid[row as usize][1..end].iter().collect();
        s.trim().into()
    }

    /// Glyph state on `row`, `None` when no glyph is drawn there.
    pub fn glyph(&self, row: u8) -> Option<bool> {
        let cells = &self.grid[row as usize];
        let col = self.cols.saturating_sub(2) as usize;
        match (cells[col], cells[col + 1]) {
            ('[', '*') => Some(true),
            ('[', _) => Some(false),
            _ => None,
        }
    }

    fn check(&self, col: u8, row: u8) -> Result<(), DisplayError> {
        if col < self.cols && row < self.rows {
            Ok(())
        } else {
            Err(DisplayError::OutOfBounds { col, row })
        }
    }
}

impl CharDisplay for RecordingDisplay {
    fn size(&self) -> (u8, u8) {
        (self.cols, self.rows)
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.ops.push(Op::Clear);
        for row in &mut self.grid {
            row.fill(' ');
        }
        self.cursor_row = None;
        Ok(())
    }

    fn move_cursor_to(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
        self.check(col, row)?;
        self.ops.push(Op::MoveTo(col, row));
        Ok(())
    }

    fn write_string(&mut self, col: u8, row: u8, text: &str) -> Result<(), DisplayError> {
        self.check(col, row)?;
        self.ops.push(Op::Text(col, row, text.into()));
        let cells = &mut self.grid[row as usize][col as usize..];
        for (cell, c) in cells.iter_mut().zip(text.chars()) {
            *cell = c;
        }
        Ok(())
    }

    fn show_glyph(&mut self, col: u8, row: u8, on: bool) -> Result<(), DisplayError> {
        self.check(col, row)?;
        self.ops.push(Op::Glyph(col, row, on));
        let glyph = if on { ['[', '*'] } else { ['[', ' '] };
        for (cell, c) in self.grid[row as usize][col as usize..].iter_mut().zip(glyph) {
            *cell = c;
        }
        Ok(())
    }

    fn show_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
        self.check(col, row)?;
        self.ops.push(Op::ShowCursor(col, row));
        self.grid[row as usize][col as usize] = '>';
        self.cursor_row = Some(row);
        Ok(())
    }

    fn hide_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
        self.check(col, row)?;
        self.ops.push(Op::HideCursor(col, row));
        self.grid[row as usize][col as usize] = ' ';
        if self.cursor_row == Some(row) {
            self.cursor_row = None;
        }
        Ok(())
    }

    fn report_fatal_error(&mut self, message: &str) -> ! {
        panic!("fatal: {message}");
    }
}
