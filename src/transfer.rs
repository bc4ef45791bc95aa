//! Block transfer: a finished snake becomes the block the stack phase drops.

use crate::grid::{Cell, Tile};
use crate::snake::SnakeBody;

/// Snake tiles re-homed into the stack phase. Same positions, values and ranks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallingBlock {
    tiles: Vec<Tile>,
}

impl FallingBlock {
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.tiles.iter().map(|t| t.cell)
    }

    /// Move every tile by (dx, dy) cells.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        for t in &mut self.tiles {
            t.cell = Cell::new(t.cell.col + dx, t.cell.row + dy);
        }
    }

    pub fn into_tiles(self) -> Vec<Tile> {
        self.tiles
    }
}

/// Consumes the body; the snake phase keeps no copy.
pub fn package(body: SnakeBody) -> FallingBlock {
    let tiles = body
        .into_tiles()
        .into_iter()
        .map(|seg| Tile::new(seg.cell, seg.rank, seg.value))
        .collect();
    FallingBlock { tiles }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_every_tile_exactly_once() {
        let segments = vec![
            Tile::new(Cell::new(4, 2), 3, 6),
            Tile::new(Cell::new(3, 2), 3, 6),
            Tile::new(Cell::new(3, 2), 3, 6),
            Tile::new(Cell::new(3, 3), 3, 6),
        ];
        let block = package(SnakeBody::from_tiles(segments.clone()));
        assert_eq!(block.len(), segments.len());
        let mut got: Vec<_> = block.tiles().iter().map(|t| (t.cell, t.value, t.rank)).collect();
        let mut want: Vec<_> = segments.iter().map(|t| (t.cell, t.value, t.rank)).collect();
        got.sort();
        want.sort();
        assert_eq!(got, want);
    }

    #[test]
    fn empty_body_packages_to_empty_block() {
        let block = package(SnakeBody::default());
        assert!(block.is_empty());
        assert_eq!(block.cells().count(), 0);
    }

    #[test]
    fn translate_moves_all_tiles() {
        let mut block = package(SnakeBody::new(Cell::new(1, 1)));
        block.translate(-1, 2);
        assert_eq!(block.cells().collect::<Vec<_>>(), vec![Cell::new(0, 3)]);
    }
}
