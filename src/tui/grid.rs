use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
}

impl Default for Style {
    fn default() -> Self {
        Self { fg: Color::Reset, bg: Color::Reset }
    }
}

impl Style {
    #[must_use]
    pub const fn fg(fg: Color) -> Self {
        Self { fg, bg: Color::Reset }
    }

    #[must_use]
    pub const fn inverted() -> Self {
        Self { fg: Color::Black, bg: Color::White }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: Style,
}

impl Default for Cell {
    fn default() -> Self {
        Self { ch: ' ', style: Style::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenSize {
    pub columns: u16,
    pub rows: u16,
}

impl ScreenSize {
    #[must_use]
    pub const fn new(columns: u16, rows: u16) -> Self {
        Self { columns, rows }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct Point {
    pub x: usize,
    pub y: usize,
}

/// Dense `rows x columns` character grid. Every cell always holds a value,
/// blank cells are spaces.
#[derive(Debug, Clone)]
pub struct Grid {
    size: ScreenSize,
    cells: Vec<Cell>,
}

impl Grid {
    #[must_use]
    pub fn new(size: ScreenSize) -> Self {
        let n = usize::from(size.columns) * usize::from(size.rows);
        Self { size, cells: vec![Cell::default(); n] }
    }

    #[must_use]
    pub fn size(&self) -> ScreenSize {
        self.size
    }

    /// Reallocate for a new size; no cell of the old size survives.
    pub fn resize(&mut self, size: ScreenSize) {
        *self = Self::new(size);
    }

    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    fn offset(&self, x: usize, y: usize) -> Option<usize> {
        (x < usize::from(self.size.columns) && y < usize::from(self.size.rows))
            .then(|| y * usize::from(self.size.columns) + x)
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<&Cell> {
        self.offset(x, y).map(|i| &self.cells[i])
    }

    pub fn set(&mut self, x: usize, y: usize, ch: char, style: Style) {
        if let Some(i) = self.offset(x, y) {
            self.cells[i] = Cell { ch, style };
        }
    }

    /// Write `s` from column `x`, clipping at both edges. Columns left of
    /// zero are skipped, so a negative start scrolls the text horizontally.
    pub fn put_str(&mut self, x: isize, y: usize, s: &str, style: Style) {
        for (i, ch) in s.chars().enumerate() {
            let col = x + isize::try_from(i).unwrap_or(isize::MAX);
            if let Ok(col) = usize::try_from(col) {
                if col >= usize::from(self.size.columns) {
                    break;
                }
                self.set(col, y, ch, style);
            }
        }
    }

    pub fn fill_row(&mut self, y: usize, style: Style) {
        for x in 0..usize::from(self.size.columns) {
            self.set(x, y, ' ', style);
        }
    }

    #[must_use]
    pub fn row_text(&self, y: usize) -> String {
        (0..usize::from(self.size.columns)).filter_map(|x| self.get(x, y)).map(|c| c.ch).collect()
    }

    /// All rows, each followed by `\n`.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(self.cells.len() + usize::from(self.size.rows));
        for y in 0..usize::from(self.size.rows) {
            out.push_str(&self.row_text(y));
            out.push('\n');
        }
        out
    }

    /// Queue every cell to `out` and flush.
    ///
    /// # Errors
    /// Returns any I/O error from the terminal.
    pub fn flush<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut current: Option<Style> = None;
        for y in 0..self.size.rows {
            queue!(out, MoveTo(0, y))?;
            for x in 0..usize::from(self.size.columns) {
                let Some(cell) = self.get(x, usize::from(y)) else { continue };
                if current != Some(cell.style) {
                    queue!(out, SetForegroundColor(cell.style.fg), SetBackgroundColor(cell.style.bg))?;
                    current = Some(cell.style);
                }
                queue!(out, Print(cell.ch))?;
            }
        }
        queue!(out, ResetColor)?;
        out.flush()
    }
}
