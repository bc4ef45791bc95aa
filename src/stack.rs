//! Stack phase: the packaged snake falls, lands, and full rows are cleared.

use crate::GameConfig;
use crate::game::{Ctx, GameEvent};
use crate::grid::{Cell, Direction, Grid, Layer, Tile};
use crate::timer::{Cooldown, TimerSet};
use crate::transfer::FallingBlock;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackTimer {
    Fall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    /// No block; the snake phase is running.
    Idle,
    Descending,
    Landed,
    MatchCheck,
    Resolved,
    GameOver,
    HandoffToSnake,
}

/// Owns the falling block and every tile that has landed this match.
#[derive(Debug, Clone)]
pub struct StackPhase {
    block: FallingBlock,
    pile: Vec<Tile>,
    /// Cells of the block that landed last; drives overflow and match checks.
    landed: Vec<Cell>,
    state: StackState,
    timers: TimerSet<StackTimer>,
    lateral: Cooldown,
    drop: Cooldown,
}

impl StackPhase {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            block: FallingBlock::default(),
            pile: Vec::new(),
            landed: Vec::new(),
            state: StackState::Idle,
            timers: TimerSet::new(),
            lateral: Cooldown::new(Duration::from_millis(config.lateral_repeat_ms)),
            drop: Cooldown::new(Duration::from_millis(config.drop_repeat_ms)),
        }
    }

    /// Start dropping `block`, one row per `fall_delay`.
    pub fn enter(&mut self, block: FallingBlock, fall_delay: Duration) {
        assert!(!block.is_empty(), "stack phase entered with an empty block");
        self.block = block;
        self.landed.clear();
        self.state = StackState::Descending;
        self.lateral.reset();
        self.drop.reset();
        self.timers.every(StackTimer::Fall, fall_delay);
    }

    /// Back to idle after the coordinator took the handoff.
    pub fn park(&mut self) {
        self.timers.cancel_all();
        self.state = StackState::Idle;
    }

    /// A move is legal only if it is legal for every tile. Arena floor lets a
    /// tile through, an occupied stack cell blocks it, no cell at all blocks it.
    pub fn can_move(&self, grid: &Grid, dir: Direction) -> bool {
        self.block.cells().all(|cell| {
            let target = cell.step(dir);
            match grid.occupancy(Layer::Stack, target) {
                Some(occupied) => !occupied,
                None => grid.is_in_bounds(target),
            }
        })
    }

    /// Player input. Left/right and down are rate-limited separately.
    pub fn shift(&mut self, dir: Direction, grid: &Grid) -> bool {
        if self.state != StackState::Descending {
            return false;
        }
        let gate = match dir {
            Direction::Left | Direction::Right => &mut self.lateral,
            Direction::Down => &mut self.drop,
            Direction::Up => return false,
        };
        if !gate.try_fire() || !self.can_move(grid, dir) {
            return false;
        }
        let (dx, dy) = dir.delta();
        self.block.translate(dx, dy);
        true
    }

    pub fn tick(&mut self, dt: Duration, ctx: &mut Ctx<'_>) -> StackState {
        if self.state != StackState::Descending {
            return self.state;
        }
        self.lateral.tick(dt);
        self.drop.tick(dt);
        for key in self.timers.advance(dt) {
            match key {
                StackTimer::Fall => {
                    if self.can_move(ctx.grid, Direction::Down) {
                        self.block.translate(0, 1);
                    } else {
                        self.timers.cancel_all();
                        self.state = StackState::Landed;
                        self.resolve(ctx);
                        return self.state;
                    }
                }
            }
        }
        self.state
    }

    /// Run Landed through to GameOver or HandoffToSnake within the current tick.
    fn resolve(&mut self, ctx: &mut Ctx<'_>) {
        loop {
            self.state = match self.state {
                StackState::Landed => {
                    self.land(ctx.grid);
                    ctx.events.push(GameEvent::BlockLanded);
                    if self.overflowed(ctx.grid) {
                        StackState::GameOver
                    } else {
                        StackState::MatchCheck
                    }
                }
                StackState::MatchCheck => {
                    let rows = self.matching_rows(ctx.grid);
                    if !rows.is_empty() {
                        self.clear_rows(&rows, ctx);
                    }
                    StackState::Resolved
                }
                StackState::Resolved => {
                    ctx.state.blocks_landed += 1;
                    StackState::HandoffToSnake
                }
                StackState::Idle
                | StackState::Descending
                | StackState::GameOver
                | StackState::HandoffToSnake => return,
            };
        }
    }

    fn land(&mut self, grid: &mut Grid) {
        let tiles = std::mem::take(&mut self.block).into_tiles();
        self.landed = tiles.iter().map(|t| t.cell).collect();
        for t in &tiles {
            // Tiles resting in the arena have no stack cell to mark.
            if grid.contains(Layer::Stack, t.cell) {
                grid.set_occupied(Layer::Stack, t.cell, true);
            }
        }
        self.pile.extend(tiles);
    }

    /// No room above a landed tile means the stack has reached the top.
    fn overflowed(&self, grid: &Grid) -> bool {
        self.landed
            .iter()
            .any(|c| !grid.contains(Layer::Stack, c.step(Direction::Up)))
    }

    /// Full rows touched by the last landed block, ascending.
    pub fn matching_rows(&self, grid: &Grid) -> Vec<i32> {
        let mut rows: Vec<i32> = self
            .landed
            .iter()
            .map(|c| c.row)
            .filter(|&r| grid.is_row_full(r))
            .collect();
        rows.sort_unstable();
        rows.dedup();
        rows
    }

    fn clear_rows(&mut self, rows: &[i32], ctx: &mut Ctx<'_>) {
        let multiplier = rows.len() as u32;
        for &row in rows {
            ctx.grid.clear_row(row);
        }
        let mut points = 0;
        self.pile.retain(|t| {
            if rows.contains(&t.cell.row) {
                points += t.value * multiplier;
                false
            } else {
                true
            }
        });
        ctx.state.score += points;
        for &row in rows {
            self.compact(row, ctx.grid);
        }
        tracing::info!(?rows, points, "rows cleared");
        ctx.events.push(GameEvent::RowsCleared {
            rows: rows.to_vec(),
            points,
        });
    }

    /// Drop every stack tile above `row` by one, un-marking first so tiles
    /// never collide with their own old cells.
    fn compact(&mut self, row: i32, grid: &mut Grid) {
        let above: Vec<usize> = self
            .pile
            .iter()
            .enumerate()
            .filter(|(_, t)| t.cell.row < row && grid.contains(Layer::Stack, t.cell))
            .map(|(i, _)| i)
            .collect();
        for &i in &above {
            grid.set_occupied(Layer::Stack, self.pile[i].cell, false);
        }
        for &i in &above {
            self.pile[i].cell = self.pile[i].cell.step(Direction::Down);
        }
        for &i in &above {
            grid.set_occupied(Layer::Stack, self.pile[i].cell, true);
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> StackState {
        self.state
    }

    pub fn block(&self) -> &FallingBlock {
        &self.block
    }

    pub fn pile(&self) -> &[Tile] {
        &self.pile
    }

    #[cfg(test)]
    pub(crate) fn seed_pile(&mut self, tiles: Vec<Tile>, grid: &mut Grid) {
        for t in &tiles {
            grid.set_occupied(Layer::Stack, t.cell, true);
        }
        self.pile.extend(tiles);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::Harness;
    use crate::grid::{ARENA_ROWS, COLS, STACK_ROWS};
    use crate::snake::SnakeBody;
    use crate::transfer::package;
    use std::collections::HashSet;

    const BOTTOM: i32 = ARENA_ROWS + STACK_ROWS - 1;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn block_of(cells: &[(i32, i32)], value: u32) -> FallingBlock {
        package(SnakeBody::from_tiles(
            cells
                .iter()
                .map(|&(c, r)| Tile::new(Cell::new(c, r), 2, value))
                .collect(),
        ))
    }

    fn row_tiles(row: i32, cols: std::ops::Range<i32>, value: u32) -> Vec<Tile> {
        cols.map(|c| Tile::new(Cell::new(c, row), 1, value)).collect()
    }

    fn phase() -> StackPhase {
        StackPhase::new(&GameConfig::default())
    }

    /// Occupancy matches the distinct cells of the pile.
    fn assert_synced(stack: &StackPhase, grid: &Grid) {
        let cells: HashSet<Cell> = stack.pile().iter().map(|t| t.cell).collect();
        assert_eq!(grid.stack_occupied_count(), cells.len());
        for c in cells {
            assert!(grid.is_occupied(Layer::Stack, c), "{c:?} not marked");
        }
    }

    #[test]
    fn block_passes_from_arena_into_stack() {
        let h = Harness::new(1);
        let mut stack = phase();
        stack.enter(block_of(&[(5, ARENA_ROWS - 1)], 0), ms(100));
        assert!(stack.can_move(&h.grid, Direction::Down));
        assert!(stack.can_move(&h.grid, Direction::Left));
    }

    #[test]
    fn moves_blocked_by_walls_and_landed_tiles() {
        let mut h = Harness::new(1);
        let mut stack = phase();
        stack.seed_pile(vec![Tile::new(Cell::new(3, BOTTOM), 0, 0)], &mut h.grid);
        stack.enter(block_of(&[(0, BOTTOM - 1), (1, BOTTOM - 1)], 0), ms(100));
        assert!(!stack.can_move(&h.grid, Direction::Left));
        assert!(stack.can_move(&h.grid, Direction::Down));
        assert!(stack.can_move(&h.grid, Direction::Right));

        let mut stack = phase();
        stack.seed_pile(vec![Tile::new(Cell::new(3, BOTTOM), 0, 0)], &mut h.grid);
        stack.enter(block_of(&[(2, BOTTOM)], 0), ms(100));
        assert!(!stack.can_move(&h.grid, Direction::Right));
        assert!(!stack.can_move(&h.grid, Direction::Down));
    }

    #[test]
    fn rejected_shift_changes_nothing() {
        let h = Harness::new(1);
        let mut stack = phase();
        stack.enter(block_of(&[(0, 12)], 0), ms(100));
        assert!(!stack.shift(Direction::Left, &h.grid));
        assert!(!stack.shift(Direction::Up, &h.grid));
        assert_eq!(stack.block().cells().next(), Some(Cell::new(0, 12)));
    }

    #[test]
    fn shifts_are_rate_limited_per_axis() {
        let mut h = Harness::new(1);
        let mut stack = phase();
        stack.enter(block_of(&[(5, 12)], 0), Duration::from_secs(60));
        assert!(stack.shift(Direction::Right, &h.grid));
        assert!(!stack.shift(Direction::Right, &h.grid));
        assert!(stack.shift(Direction::Down, &h.grid));
        assert!(!stack.shift(Direction::Down, &h.grid));
        stack.tick(ms(70), &mut h.ctx());
        assert!(stack.shift(Direction::Down, &h.grid));
        assert!(!stack.shift(Direction::Left, &h.grid));
        stack.tick(ms(30), &mut h.ctx());
        assert!(stack.shift(Direction::Left, &h.grid));
        assert_eq!(stack.block().cells().next(), Some(Cell::new(5, 14)));
    }

    #[test]
    fn falls_lands_and_hands_off() {
        let mut h = Harness::new(1);
        let mut stack = phase();
        stack.enter(block_of(&[(4, BOTTOM - 2), (5, BOTTOM - 2)], 2), ms(100));
        assert_eq!(stack.tick(ms(200), &mut h.ctx()), StackState::Descending);
        assert_eq!(stack.tick(ms(100), &mut h.ctx()), StackState::HandoffToSnake);
        assert!(stack.block().is_empty());
        assert_eq!(stack.pile().len(), 2);
        assert!(h.grid.is_occupied(Layer::Stack, Cell::new(4, BOTTOM)));
        assert_eq!(h.state.blocks_landed, 1);
        assert_eq!(h.state.score, 0);
        assert!(h.events.contains(&GameEvent::BlockLanded));
        // Parked phase ignores time and input.
        stack.park();
        assert_eq!(stack.tick(ms(1000), &mut h.ctx()), StackState::Idle);
        assert!(!stack.shift(Direction::Left, &h.grid));
    }

    #[test]
    fn single_full_row_scores_and_compacts() {
        let mut h = Harness::new(1);
        let mut stack = phase();
        stack.seed_pile(row_tiles(BOTTOM, 0..COLS - 1, 3), &mut h.grid);
        // Tile resting above the bottom row must drop into it after the clear.
        stack.seed_pile(vec![Tile::new(Cell::new(0, BOTTOM - 1), 1, 5)], &mut h.grid);
        stack.enter(block_of(&[(COLS - 1, BOTTOM - 1)], 3), ms(100));
        assert_eq!(stack.tick(ms(200), &mut h.ctx()), StackState::HandoffToSnake);

        assert_eq!(h.state.score, 3 * 20);
        assert!(h.events.contains(&GameEvent::RowsCleared {
            rows: vec![BOTTOM],
            points: 60
        }));
        assert_eq!(stack.pile().len(), 1);
        assert_eq!(stack.pile()[0].cell, Cell::new(0, BOTTOM));
        assert!(!h.grid.is_row_full(BOTTOM));
        assert!(!h.grid.is_occupied(Layer::Stack, Cell::new(0, BOTTOM - 1)));
        assert_synced(&stack, &h.grid);
    }

    #[test]
    fn simultaneous_rows_multiply_tile_value() {
        let mut h = Harness::new(1);
        let mut stack = phase();
        stack.seed_pile(row_tiles(BOTTOM, 1..COLS, 3), &mut h.grid);
        stack.seed_pile(row_tiles(BOTTOM - 1, 1..COLS, 3), &mut h.grid);
        stack.seed_pile(row_tiles(BOTTOM - 3, 5..6, 1), &mut h.grid);
        stack.seed_pile(row_tiles(BOTTOM - 2, 5..6, 1), &mut h.grid);
        // Vertical block fills column 0 of both rows.
        stack.enter(block_of(&[(0, BOTTOM), (0, BOTTOM - 1)], 4), ms(100));
        assert_eq!(stack.tick(ms(100), &mut h.ctx()), StackState::HandoffToSnake);

        // 38 seeded tiles of 3 plus two block tiles of 4, each doubled.
        assert_eq!(h.state.score, (38 * 3 + 2 * 4) * 2);
        let mut cells: Vec<Cell> = stack.pile().iter().map(|t| t.cell).collect();
        cells.sort();
        // The two loose tiles fall once per cleared row.
        assert_eq!(cells, vec![Cell::new(5, BOTTOM - 1), Cell::new(5, BOTTOM)]);
        assert_synced(&stack, &h.grid);
    }

    #[test]
    fn rows_with_gaps_do_not_match() {
        let mut h = Harness::new(1);
        let mut stack = phase();
        stack.seed_pile(row_tiles(BOTTOM, 2..COLS, 3), &mut h.grid);
        stack.enter(block_of(&[(0, BOTTOM - 1)], 3), ms(100));
        assert_eq!(stack.tick(ms(200), &mut h.ctx()), StackState::HandoffToSnake);
        assert_eq!(h.state.score, 0);
        assert_eq!(stack.pile().len(), 19);
        assert_synced(&stack, &h.grid);
    }

    #[test]
    fn landing_without_room_above_is_game_over() {
        let mut h = Harness::new(1);
        let mut stack = phase();
        let top = ARENA_ROWS;
        stack.seed_pile(vec![Tile::new(Cell::new(7, top + 1), 0, 0)], &mut h.grid);
        stack.enter(block_of(&[(7, top - 1)], 0), ms(100));
        assert_eq!(stack.tick(ms(100), &mut h.ctx()), StackState::Descending);
        assert_eq!(stack.tick(ms(100), &mut h.ctx()), StackState::GameOver);
        assert_eq!(h.state.blocks_landed, 0);
        // Terminal: further time does nothing.
        assert_eq!(stack.tick(ms(1000), &mut h.ctx()), StackState::GameOver);
    }

    #[test]
    #[should_panic(expected = "empty block")]
    fn entering_with_empty_block_panics() {
        phase().enter(FallingBlock::default(), ms(100));
    }
}
