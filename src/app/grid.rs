//! Cursor arithmetic for items laid out row by row in a fixed column count.

/// Width taken by the details panel and margins next to the grid.
pub const DETAILS_RESERVED_WIDTH: u16 = 46;
const THREE_COLUMN_MIN: u16 = 120;
const TWO_COLUMN_MIN: u16 = 80;

pub fn columns_for_width(terminal_width: u16) -> usize {
    let available = terminal_width.saturating_sub(DETAILS_RESERVED_WIDTH);
    if available >= THREE_COLUMN_MIN {
        3
    } else if available >= TWO_COLUMN_MIN {
        2
    } else {
        1
    }
}

pub fn row_count(items: usize, cols: usize) -> usize {
    let cols = cols.max(1);
    items.div_ceil(cols)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridCursor {
    pub row: usize,
    pub col: usize,
}

impl GridCursor {
    pub fn index(&self, cols: usize) -> usize {
        self.row * cols.max(1) + self.col
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Place the cursor on `index` (clamped to the list) for a new column count.
    pub fn relayout(&mut self, index: usize, cols: usize, items: usize) {
        let cols = cols.max(1);
        let index = index.min(items.saturating_sub(1));
        self.row = index / cols;
        self.col = index % cols;
    }

    pub fn move_up(&mut self) {
        self.row = self.row.saturating_sub(1);
    }

    pub fn move_left(&mut self) {
        self.col = self.col.saturating_sub(1);
    }

    pub fn move_down(&mut self, cols: usize, items: usize) {
        if self.index(cols) + cols.max(1) < items {
            self.row += 1;
        }
    }

    pub fn move_right(&mut self, cols: usize, items: usize) {
        if self.col + 1 < cols && self.index(cols) + 1 < items {
            self.col += 1;
        }
    }
}
