//! Grid model: one coordinate space shared by the snake arena and the stack.
//!
//! Rows `0..arena_rows` belong to the arena layer, the rows below them to the
//! stack layer. A packaged snake therefore falls out of the arena straight into
//! the stack without any coordinate translation.

use std::ops::Range;

/// Columns of the play field (both layers).
pub const COLS: i32 = 20;
/// Rows of the snake arena.
pub const ARENA_ROWS: i32 = 10;
/// Rows of the stack.
pub const STACK_ROWS: i32 = 20;

/// Integer grid coordinate. `row` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub col: i32,
    pub row: i32,
}

impl Cell {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// Neighbour one step in `dir`.
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self::new(self.col + dx, self.row + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Self; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    pub fn is_perpendicular(self, other: Self) -> bool {
        self != other && self != other.opposite()
    }
}

/// Unit of game matter: a snake segment or a block/landed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub cell: Cell,
    /// Upgrade tier 0..=6, drives colour.
    pub rank: u8,
    /// Points this tile is worth when its row is cleared.
    pub value: u32,
}

impl Tile {
    pub fn new(cell: Cell, rank: u8, value: u32) -> Self {
        Self { cell, rank, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Static floor of the snake field. A placed tile means walkable.
    Arena,
    /// Dynamic occupancy of landed tiles.
    Stack,
}

/// Rectangular band of rows holding one flag per cell.
#[derive(Debug, Clone)]
struct Band {
    rows: Range<i32>,
    cols: i32,
    flags: Vec<bool>,
}

impl Band {
    fn new(rows: Range<i32>, cols: i32, fill: bool) -> Self {
        let len = (rows.end - rows.start).max(0) * cols;
        Self {
            rows,
            cols,
            flags: vec![fill; len as usize],
        }
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        if cell.col < 0 || cell.col >= self.cols || !self.rows.contains(&cell.row) {
            return None;
        }
        Some(((cell.row - self.rows.start) * self.cols + cell.col) as usize)
    }
}

/// Two-layer occupancy grid. No mutation happens outside the methods below.
#[derive(Debug, Clone)]
pub struct Grid {
    arena: Band,
    stack: Band,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(COLS, ARENA_ROWS, STACK_ROWS)
    }
}

impl Grid {
    /// Fully floored arena on top, empty stack below it.
    pub fn new(cols: i32, arena_rows: i32, stack_rows: i32) -> Self {
        assert!(cols > 0 && arena_rows > 0 && stack_rows > 0, "grid dimensions must be positive");
        Self {
            arena: Band::new(0..arena_rows, cols, true),
            stack: Band::new(arena_rows..arena_rows + stack_rows, cols, false),
        }
    }

    pub fn cols(&self) -> i32 {
        self.arena.cols
    }

    pub fn arena_rows(&self) -> Range<i32> {
        self.arena.rows.clone()
    }

    pub fn stack_rows(&self) -> Range<i32> {
        self.stack.rows.clone()
    }

    fn band(&self, layer: Layer) -> &Band {
        match layer {
            Layer::Arena => &self.arena,
            Layer::Stack => &self.stack,
        }
    }

    /// `None` when the layer has no cell at `cell`, otherwise its flag.
    pub fn occupancy(&self, layer: Layer, cell: Cell) -> Option<bool> {
        let band = self.band(layer);
        band.index(cell).map(|i| band.flags[i])
    }

    /// True if the layer has a cell slot at `cell` (occupied or not).
    pub fn contains(&self, layer: Layer, cell: Cell) -> bool {
        self.band(layer).index(cell).is_some()
    }

    pub fn is_occupied(&self, layer: Layer, cell: Cell) -> bool {
        self.occupancy(layer, cell).unwrap_or(false)
    }

    /// Panics if the layer has no slot at `cell`: writing outside a layer is a bug.
    pub fn set_occupied(&mut self, layer: Layer, cell: Cell, occupied: bool) {
        let band = match layer {
            Layer::Arena => &mut self.arena,
            Layer::Stack => &mut self.stack,
        };
        let Some(i) = band.index(cell) else {
            panic!("set_occupied({layer:?}, {cell:?}): cell is outside the layer");
        };
        band.flags[i] = occupied;
    }

    /// In bounds for the snake: the arena has a floor tile there.
    pub fn is_in_bounds(&self, cell: Cell) -> bool {
        self.is_occupied(Layer::Arena, cell)
    }

    /// Arena cells whose four neighbours are all walkable (never against a wall).
    pub fn spawn_cells(&self) -> Vec<Cell> {
        let mut out = Vec::new();
        for row in self.arena.rows.clone() {
            for col in 0..self.arena.cols {
                let cell = Cell::new(col, row);
                if self.is_in_bounds(cell)
                    && Direction::ALL.iter().all(|&d| self.is_in_bounds(cell.step(d)))
                {
                    out.push(cell);
                }
            }
        }
        out
    }

    /// A stack row is full when every column is occupied.
    pub fn is_row_full(&self, row: i32) -> bool {
        if !self.stack.rows.contains(&row) {
            return false;
        }
        (0..self.stack.cols).all(|col| self.is_occupied(Layer::Stack, Cell::new(col, row)))
    }

    pub fn clear_row(&mut self, row: i32) {
        for col in 0..self.stack.cols {
            self.set_occupied(Layer::Stack, Cell::new(col, row), false);
        }
    }

    /// Number of occupied stack cells; used to check occupancy against tile positions.
    #[cfg(test)]
    pub fn stack_occupied_count(&self) -> usize {
        self.stack.flags.iter().filter(|&&f| f).count()
    }
}
