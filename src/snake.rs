//! Snake phase: steer a growing snake around the arena collecting apples
//! until the round clock runs out.

use crate::GameConfig;
use crate::game::{Ctx, GameEvent};
use crate::grid::{Cell, Direction, Grid, Tile};
use crate::timer::TimerSet;
use rand::Rng;
use std::time::Duration;

/// Where a fresh snake appears each round.
pub const SPAWN_CELL: Cell = Cell::new(0, 0);
/// Apple pickups that still lengthen the body; later ones only add value.
pub const GROWTH_CAP: u32 = 7;
pub const MAX_RANK: u8 = 6;
const APPLE_VALUE_STEP: u32 = 2;
const SECOND: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnakeTimer {
    Countdown,
    RoundClock,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crash {
    Wall,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnakeStatus {
    Running,
    TimeUp,
    Crashed(Crash),
    OutOfLives,
}

/// Ordered segments, head first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnakeBody {
    segments: Vec<Tile>,
}

impl SnakeBody {
    pub fn new(head: Cell) -> Self {
        Self {
            segments: vec![Tile::new(head, 0, 0)],
        }
    }

    #[cfg(test)]
    pub fn from_tiles(segments: Vec<Tile>) -> Self {
        Self { segments }
    }

    pub fn head(&self) -> Option<Cell> {
        self.segments.first().map(|t| t.cell)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.segments
    }

    pub fn into_tiles(self) -> Vec<Tile> {
        self.segments
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.segments.iter().any(|t| t.cell == cell)
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Chain shift: every segment takes the place of the one ahead, head moves to `head`.
    fn shift_to(&mut self, head: Cell) {
        for i in (1..self.segments.len()).rev() {
            self.segments[i].cell = self.segments[i - 1].cell;
        }
        if let Some(first) = self.segments.first_mut() {
            first.cell = head;
        }
    }

    /// Append a copy of the tail on the tail's cell; the next shift separates them.
    fn grow(&mut self) {
        if let Some(&tail) = self.segments.last() {
            self.segments.push(tail);
        }
    }

    fn upgrade(&mut self, rank: u8, value: u32) {
        for t in &mut self.segments {
            t.rank = rank;
            t.value = value;
        }
    }

    fn hits_itself(&self) -> bool {
        match self.segments.split_first() {
            Some((head, rest)) => rest.iter().any(|t| t.cell == head.cell),
            None => false,
        }
    }
}

/// Uniform sample of `n` distinct cells from `pool` (fewer if the pool is smaller).
pub fn sample_cells<R: Rng + ?Sized>(rng: &mut R, pool: &[Cell], n: usize) -> Vec<Cell> {
    rand::seq::index::sample(rng, pool.len(), n.min(pool.len()))
        .into_iter()
        .map(|i| pool[i])
        .collect()
}

#[derive(Debug, Clone)]
pub struct SnakePhase {
    heading: Direction,
    direction: Direction,
    body: SnakeBody,
    apple_count: u32,
    apple_value: u32,
    time_remaining: u32,
    countdown: u32,
    counting: bool,
    active: bool,
    apple: Option<Cell>,
    poison: Vec<Cell>,
    poison_count: usize,
    move_delay: Duration,
    timers: TimerSet<SnakeTimer>,
    status: SnakeStatus,
}

impl SnakePhase {
    /// Fresh round state. The snake starts moving once `countdown` has been shown
    /// counting down to zero, one step per second.
    pub fn new(config: &GameConfig, move_delay: Duration, countdown: u32) -> Self {
        Self {
            heading: Direction::Right,
            direction: Direction::Right,
            body: SnakeBody::new(SPAWN_CELL),
            apple_count: 0,
            apple_value: 0,
            time_remaining: config.round_secs,
            countdown,
            counting: false,
            active: false,
            apple: None,
            poison: Vec::new(),
            poison_count: config.poison_count,
            move_delay,
            timers: TimerSet::new(),
            status: SnakeStatus::Running,
        }
    }

    /// Spawn this round's apples and arm its timers.
    pub fn begin(&mut self, ctx: &mut Ctx<'_>) {
        let pool = self.free_cells(ctx.grid);
        self.poison = sample_cells(&mut *ctx.rng, &pool, self.poison_count);
        self.spawn_apple(ctx);
        if self.countdown > 0 {
            self.counting = true;
            self.timers
                .repeat(SnakeTimer::Countdown, SECOND, self.countdown + 1);
        } else {
            self.start();
        }
    }

    fn start(&mut self) {
        self.counting = false;
        self.active = true;
        self.timers
            .repeat(SnakeTimer::RoundClock, SECOND, self.time_remaining);
        self.timers.every(SnakeTimer::Move, self.move_delay);
    }

    fn finish(&mut self, status: SnakeStatus) {
        self.timers.cancel_all();
        self.active = false;
        self.status = status;
    }

    pub fn tick(&mut self, dt: Duration, ctx: &mut Ctx<'_>) -> SnakeStatus {
        if self.status != SnakeStatus::Running {
            return self.status;
        }
        for key in self.timers.advance(dt) {
            match key {
                SnakeTimer::Countdown if self.countdown == 0 => self.start(),
                SnakeTimer::Countdown => {
                    self.countdown -= 1;
                    ctx.events.push(GameEvent::CountdownTick(self.countdown));
                }
                SnakeTimer::RoundClock => {
                    self.time_remaining = self.time_remaining.saturating_sub(1);
                    if self.time_remaining == 0 {
                        self.finish(SnakeStatus::TimeUp);
                    }
                }
                SnakeTimer::Move => {
                    self.advance(ctx);
                }
            }
            if self.status != SnakeStatus::Running {
                return self.status;
            }
        }
        if self.active && self.apple.is_none() {
            self.spawn_apple(ctx);
        }
        self.status
    }

    /// Accepted only when perpendicular to the committed direction.
    pub fn set_heading(&mut self, dir: Direction) -> bool {
        if !self.active || !dir.is_perpendicular(self.direction) {
            return false;
        }
        self.heading = dir;
        true
    }

    /// Move one cell along `heading`, then resolve collisions and pickups.
    pub fn advance(&mut self, ctx: &mut Ctx<'_>) -> SnakeStatus {
        let Some(head) = self.body.head() else {
            return self.status;
        };
        let target = head.step(self.heading);
        if !ctx.grid.is_in_bounds(target) {
            self.crash(Crash::Wall);
            return self.status;
        }
        self.body.shift_to(target);
        self.direction = self.heading;
        if self.body.hits_itself() {
            self.crash(Crash::Body);
            return self.status;
        }
        if self.apple == Some(target) {
            self.on_apple_eaten(ctx);
        }
        if let Some(i) = self.poison.iter().position(|&c| c == target) {
            self.poison.swap_remove(i);
            self.on_poison_eaten(ctx);
        }
        self.status
    }

    fn crash(&mut self, crash: Crash) {
        tracing::debug!(?crash, "snake crashed");
        self.body.clear();
        self.heading = Direction::Right;
        self.finish(SnakeStatus::Crashed(crash));
    }

    fn on_apple_eaten(&mut self, ctx: &mut Ctx<'_>) {
        if self.apple_count < GROWTH_CAP {
            self.body.grow();
        }
        self.apple_count += 1;
        self.apple_value += APPLE_VALUE_STEP;
        let rank = self.apple_count.min(u32::from(MAX_RANK)) as u8;
        self.body.upgrade(rank, self.apple_value);
        self.apple = None;
        ctx.events.push(GameEvent::AppleEaten {
            snake_value: self.snake_value(),
        });
        self.spawn_apple(ctx);
    }

    fn on_poison_eaten(&mut self, ctx: &mut Ctx<'_>) {
        ctx.state.lives = ctx.state.lives.saturating_sub(1);
        ctx.events.push(GameEvent::PoisonEaten {
            lives_left: ctx.state.lives,
        });
        if ctx.state.lives == 0 {
            self.finish(SnakeStatus::OutOfLives);
        }
    }

    fn free_cells(&self, grid: &Grid) -> Vec<Cell> {
        grid.spawn_cells()
            .into_iter()
            .filter(|&c| !self.body.contains(c) && !self.poison.contains(&c) && self.apple != Some(c))
            .collect()
    }

    fn spawn_apple(&mut self, ctx: &mut Ctx<'_>) {
        let pool = self.free_cells(ctx.grid);
        self.apple = sample_cells(&mut *ctx.rng, &pool, 1).first().copied();
    }

    /// Hand the body over at round end; the phase keeps nothing and fires nothing.
    pub fn take_body(&mut self) -> SnakeBody {
        self.timers.cancel_all();
        self.apple = None;
        self.poison.clear();
        std::mem::take(&mut self.body)
    }

    pub fn body(&self) -> &SnakeBody {
        &self.body
    }

    #[cfg(test)]
    pub fn heading(&self) -> Direction {
        self.heading
    }

    #[cfg(test)]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn apple(&self) -> Option<Cell> {
        self.apple
    }

    pub fn poison(&self) -> &[Cell] {
        &self.poison
    }

    #[cfg(test)]
    pub fn apple_count(&self) -> u32 {
        self.apple_count
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    /// Value on screen while counting down; zero means "go".
    pub fn countdown(&self) -> Option<u32> {
        self.counting.then_some(self.countdown)
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[cfg(test)]
    pub fn status(&self) -> SnakeStatus {
        self.status
    }

    /// Score the body would carry into the stack: value × length.
    pub fn snake_value(&self) -> u32 {
        self.apple_value * self.body.len() as u32
    }

    #[cfg(test)]
    pub(crate) fn place_apple(&mut self, cell: Option<Cell>) {
        self.apple = cell;
    }

    #[cfg(test)]
    pub(crate) fn place_poison(&mut self, cells: Vec<Cell>) {
        self.poison = cells;
    }

    #[cfg(test)]
    pub(crate) fn replace_body(&mut self, body: SnakeBody) {
        self.body = body;
    }
}
