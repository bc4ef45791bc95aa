//! Game state: match bookkeeping and the snake ⇄ stack phase alternation.

use crate::GameConfig;
use crate::grid::{Cell, Direction, Grid, Tile};
use crate::snake::{Crash, SnakePhase, SnakeStatus};
use crate::stack::{StackPhase, StackState};
use crate::transfer::package;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::ops::Range;
use std::time::Duration;

/// Score, lives and level: everything that survives a phase switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchState {
    pub score: u32,
    pub lives: u32,
    pub level: u32,
    /// Blocks landed since the last level-up.
    pub blocks_landed: u32,
    /// Snake move delay and block fall delay.
    pub speed: Duration,
}

impl MatchState {
    pub fn new(config: &GameConfig) -> Self {
        let level = config.initial_level.clamp(1, config.max_level);
        Self {
            score: 0,
            lives: config.starting_lives,
            level,
            blocks_landed: 0,
            speed: speed_for_level(config, level),
        }
    }
}

/// Delay for `level`: one step faster per level, never below the floor.
pub fn speed_for_level(config: &GameConfig, level: u32) -> Duration {
    let step = config.speed_step_ms * u64::from(level.saturating_sub(1));
    let ms = config
        .initial_speed_ms
        .saturating_sub(step)
        .max(config.min_speed_ms)
        .max(1);
    Duration::from_millis(ms)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Snake,
    Stack,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCause {
    WallCollision,
    SelfCollision,
    OutOfLives,
    StackOverflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchEnd {
    pub score: u32,
    pub level: u32,
    pub cause: EndCause,
}

/// Fire-and-forget sound cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    EatApple,
    EatPoison,
    RowMatch,
    GameOver,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    CountdownTick(u32),
    RoundStarted { round: u32 },
    AppleEaten { snake_value: u32 },
    PoisonEaten { lives_left: u32 },
    BlockLanded,
    RowsCleared { rows: Vec<i32>, points: u32 },
    LevelUp { level: u32 },
    PhaseChanged(PhaseKind),
    MatchEnded(MatchEnd),
}

impl GameEvent {
    pub fn cue(&self) -> Option<Cue> {
        match self {
            Self::AppleEaten { .. } => Some(Cue::EatApple),
            Self::PoisonEaten { .. } => Some(Cue::EatPoison),
            Self::RowsCleared { .. } => Some(Cue::RowMatch),
            Self::MatchEnded(_) => Some(Cue::GameOver),
            _ => None,
        }
    }
}

/// What the active phase may touch during one tick or input.
pub struct Ctx<'a> {
    pub grid: &'a mut Grid,
    pub state: &'a mut MatchState,
    pub rng: &'a mut SmallRng,
    pub events: &'a mut Vec<GameEvent>,
}

/// Everything the host needs to draw one frame.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub phase: PhaseKind,
    pub snake: Vec<Tile>,
    pub block: Vec<Tile>,
    pub pile: Vec<Tile>,
    pub apple: Option<Cell>,
    pub poison: Vec<Cell>,
    pub score: u32,
    pub level: u32,
    pub lives: u32,
    pub time_left: u32,
    pub countdown: Option<u32>,
    pub snake_value: u32,
    pub round: u32,
    pub cols: i32,
    pub arena_rows: Range<i32>,
    pub stack_rows: Range<i32>,
}

/// Phase coordinator for one match.
#[derive(Debug)]
pub struct Game {
    config: GameConfig,
    grid: Grid,
    state: MatchState,
    rng: SmallRng,
    events: Vec<GameEvent>,
    phase: PhaseKind,
    snake: SnakePhase,
    stack: StackPhase,
    round: u32,
    outcome: Option<MatchEnd>,
}

impl Game {
    /// New match, first round counting down. `seed` makes spawns reproducible.
    pub fn new(config: GameConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let state = MatchState::new(&config);
        let snake = SnakePhase::new(&config, state.speed, config.countdown_secs);
        let stack = StackPhase::new(&config);
        let mut game = Self {
            grid: Grid::default(),
            state,
            rng,
            events: Vec::new(),
            phase: PhaseKind::Snake,
            snake,
            stack,
            round: 1,
            outcome: None,
            config,
        };
        game.begin_round();
        tracing::info!(level = game.state.level, "match started");
        game
    }

    fn begin_round(&mut self) {
        let Self {
            grid,
            state,
            rng,
            events,
            snake,
            ..
        } = self;
        let mut ctx = Ctx {
            grid,
            state,
            rng,
            events,
        };
        snake.begin(&mut ctx);
        self.events.push(GameEvent::RoundStarted { round: self.round });
    }

    pub fn tick(&mut self, dt: Duration) {
        match self.phase {
            PhaseKind::Snake => {
                let Self {
                    grid,
                    state,
                    rng,
                    events,
                    snake,
                    ..
                } = self;
                let mut ctx = Ctx {
                    grid,
                    state,
                    rng,
                    events,
                };
                let status = snake.tick(dt, &mut ctx);
                match status {
                    SnakeStatus::Running => {}
                    SnakeStatus::TimeUp => self.enter_stack(),
                    SnakeStatus::Crashed(Crash::Wall) => self.end_match(EndCause::WallCollision),
                    SnakeStatus::Crashed(Crash::Body) => self.end_match(EndCause::SelfCollision),
                    SnakeStatus::OutOfLives => self.end_match(EndCause::OutOfLives),
                }
            }
            PhaseKind::Stack => {
                let Self {
                    grid,
                    state,
                    rng,
                    events,
                    stack,
                    ..
                } = self;
                let mut ctx = Ctx {
                    grid,
                    state,
                    rng,
                    events,
                };
                let stack_state = stack.tick(dt, &mut ctx);
                match stack_state {
                    StackState::HandoffToSnake => self.resume_snake(),
                    StackState::GameOver => self.end_match(EndCause::StackOverflow),
                    _ => {}
                }
            }
            PhaseKind::Ended => {}
        }
    }

    /// Directional input; routed to whichever phase is active. Rejected input is silent.
    pub fn input(&mut self, dir: Direction) -> bool {
        match self.phase {
            PhaseKind::Snake => self.snake.set_heading(dir),
            PhaseKind::Stack => self.stack.shift(dir, &self.grid),
            PhaseKind::Ended => false,
        }
    }

    fn enter_stack(&mut self) {
        let block = package(self.snake.take_body());
        tracing::info!(round = self.round, tiles = block.len(), "round over, dropping block");
        self.stack.enter(block, self.state.speed);
        self.phase = PhaseKind::Stack;
        self.events.push(GameEvent::PhaseChanged(PhaseKind::Stack));
    }

    fn resume_snake(&mut self) {
        self.stack.park();
        self.level_check();
        self.round += 1;
        self.snake = SnakePhase::new(&self.config, self.state.speed, 0);
        self.phase = PhaseKind::Snake;
        self.events.push(GameEvent::PhaseChanged(PhaseKind::Snake));
        self.begin_round();
        tracing::debug!(round = self.round, score = self.state.score, "snake resumed");
    }

    fn level_check(&mut self) {
        let state = &mut self.state;
        if state.level >= self.config.max_level {
            state.blocks_landed = 0;
            return;
        }
        if state.blocks_landed >= self.config.blocks_per_level {
            state.level += 1;
            state.speed = speed_for_level(&self.config, state.level);
            state.blocks_landed = 0;
            tracing::info!(level = state.level, speed_ms = state.speed.as_millis() as u64, "level up");
            self.events.push(GameEvent::LevelUp { level: state.level });
        }
    }

    /// Single exit for every loss condition.
    fn end_match(&mut self, cause: EndCause) {
        if self.phase == PhaseKind::Ended {
            return;
        }
        self.snake.take_body();
        self.stack.park();
        let end = MatchEnd {
            score: self.state.score,
            level: self.state.level,
            cause,
        };
        tracing::info!(?cause, score = end.score, level = end.level, "match ended");
        self.outcome = Some(end);
        self.phase = PhaseKind::Ended;
        self.events.push(GameEvent::MatchEnded(end));
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn outcome(&self) -> Option<MatchEnd> {
        self.outcome
    }

    #[cfg(test)]
    pub fn phase(&self) -> PhaseKind {
        self.phase
    }

    #[cfg(test)]
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    #[cfg(test)]
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn snapshot(&self) -> Snapshot {
        let snake_live = self.phase == PhaseKind::Snake;
        Snapshot {
            phase: self.phase,
            snake: self.snake.body().tiles().to_vec(),
            block: self.stack.block().tiles().to_vec(),
            pile: self.stack.pile().to_vec(),
            apple: self.snake.apple(),
            poison: self.snake.poison().to_vec(),
            score: self.state.score,
            level: self.state.level,
            lives: self.state.lives,
            time_left: if snake_live { self.snake.time_remaining() } else { 0 },
            countdown: self.snake.countdown().filter(|_| snake_live),
            snake_value: self.snake.snake_value(),
            round: self.round,
            cols: self.grid.cols(),
            arena_rows: self.grid.arena_rows(),
            stack_rows: self.grid.stack_rows(),
        }
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut MatchState {
        &mut self.state
    }

    /// Skip the snake round and drop `block` straight away.
    #[cfg(test)]
    pub(crate) fn force_stack(&mut self, block: crate::transfer::FallingBlock) {
        self.snake.take_body();
        self.stack.enter(block, self.state.speed);
        self.phase = PhaseKind::Stack;
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::ARENA_ROWS;
    use crate::snake::SnakeBody;

    const FRAME: Duration = Duration::from_millis(16);

    fn run_until(game: &mut Game, limit: Duration, done: impl Fn(&Game) -> bool) {
        let mut t = Duration::ZERO;
        while t < limit && !done(game) {
            game.tick(FRAME);
            t += FRAME;
        }
    }

    fn single_tile_block(col: i32, row: i32, value: u32) -> crate::transfer::FallingBlock {
        package(SnakeBody::from_tiles(vec![Tile::new(Cell::new(col, row), 1, value)]))
    }

    #[test]
    fn new_match_defaults() {
        let game = Game::new(GameConfig::default(), Some(1));
        let s = game.state();
        assert_eq!((s.score, s.lives, s.level, s.blocks_landed), (0, 3, 1, 0));
        assert_eq!(s.speed, Duration::from_millis(170));
        assert_eq!(game.phase(), PhaseKind::Snake);
        let snap = game.snapshot();
        assert_eq!(snap.countdown, Some(3));
        assert_eq!(snap.poison.len(), 5);
        assert!(snap.apple.is_some());
    }

    #[test]
    fn speed_never_drops_below_floor() {
        let config = GameConfig::default();
        assert_eq!(speed_for_level(&config, 2), Duration::from_millis(160));
        assert_eq!(speed_for_level(&config, 10), Duration::from_millis(80));
        assert_eq!(speed_for_level(&config, 50), Duration::from_millis(config.min_speed_ms));
    }

    #[test]
    fn wall_crash_ends_match_once_without_life_loss() {
        let mut game = Game::new(GameConfig::default(), Some(7));
        run_until(&mut game, Duration::from_secs(15), |g| g.phase() == PhaseKind::Ended);
        let end = game.outcome().expect("snake drives into the right wall");
        assert_eq!(end.cause, EndCause::WallCollision);
        assert_eq!(game.state().lives, 3);
        let ended = game
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::MatchEnded(_)))
            .count();
        assert_eq!(ended, 1);
        game.tick(Duration::from_secs(5));
        assert!(game.drain_events().is_empty());
        assert!(!game.input(Direction::Down));
    }

    #[test]
    fn timeout_packages_snake_and_returns_after_landing() {
        let config = GameConfig {
            round_secs: 2,
            ..GameConfig::default()
        };
        let mut game = Game::new(config, Some(3));
        run_until(&mut game, Duration::from_secs(10), |g| g.phase() == PhaseKind::Stack);
        assert_eq!(game.phase(), PhaseKind::Stack);
        let snap = game.snapshot();
        assert!(snap.snake.is_empty());
        assert_eq!(snap.block.len(), 1);
        assert!(snap.poison.is_empty());
        assert_eq!(snap.block[0].cell.row, 0);

        // Lateral input goes to the block now.
        assert!(game.input(Direction::Left));

        run_until(&mut game, Duration::from_secs(10), |g| g.phase() == PhaseKind::Snake);
        assert_eq!(game.phase(), PhaseKind::Snake);
        assert_eq!(game.round(), 2);
        let snap = game.snapshot();
        assert_eq!(snap.pile.len(), 1);
        assert_eq!(snap.pile[0].cell.row, ARENA_ROWS + crate::grid::STACK_ROWS - 1);
        assert_eq!(snap.countdown, None);
        assert_eq!(snap.time_left, 2);
        assert_eq!(snap.lives, 3);
        assert_eq!(game.state().blocks_landed, 1);
        let events = game.drain_events();
        assert!(events.contains(&GameEvent::PhaseChanged(PhaseKind::Stack)));
        assert!(events.contains(&GameEvent::RoundStarted { round: 2 }));
    }

    #[test]
    fn tenth_landed_block_levels_up() {
        let mut game = Game::new(GameConfig::default(), Some(4));
        game.state_mut().blocks_landed = 9;
        game.force_stack(single_tile_block(0, 29, 0));
        run_until(&mut game, Duration::from_secs(1), |g| g.phase() == PhaseKind::Snake);
        let s = game.state();
        assert_eq!(s.level, 2);
        assert_eq!(s.speed, Duration::from_millis(160));
        assert_eq!(s.blocks_landed, 0);
        assert!(game.drain_events().contains(&GameEvent::LevelUp { level: 2 }));
    }

    #[test]
    fn ninth_block_does_not_level_up() {
        let mut game = Game::new(GameConfig::default(), Some(4));
        game.state_mut().blocks_landed = 8;
        game.force_stack(single_tile_block(0, 29, 0));
        run_until(&mut game, Duration::from_secs(1), |g| g.phase() == PhaseKind::Snake);
        assert_eq!(game.state().level, 1);
        assert_eq!(game.state().blocks_landed, 9);
    }

    #[test]
    fn level_is_capped() {
        let config = GameConfig {
            initial_level: 10,
            ..GameConfig::default()
        };
        let mut game = Game::new(config, Some(4));
        game.state_mut().blocks_landed = 9;
        game.force_stack(single_tile_block(0, 29, 0));
        run_until(&mut game, Duration::from_secs(1), |g| g.phase() == PhaseKind::Snake);
        assert_eq!(game.state().level, 10);
        assert_eq!(game.state().blocks_landed, 0);
    }

    #[test]
    fn stack_overflow_ends_match_with_score() {
        let mut game = Game::new(GameConfig::default(), Some(5));
        game.state_mut().score = 42;
        // Rests on the top stack row with only arena above it.
        game.force_stack(single_tile_block(3, ARENA_ROWS - 3, 1));
        game.grid
            .set_occupied(crate::grid::Layer::Stack, Cell::new(3, ARENA_ROWS + 1), true);
        run_until(&mut game, Duration::from_secs(2), |g| g.phase() == PhaseKind::Ended);
        let end = game.outcome().expect("overflow ends the match");
        assert_eq!(end.cause, EndCause::StackOverflow);
        assert_eq!(end.score, 42);
    }

    #[test]
    fn cues_follow_events() {
        assert_eq!(GameEvent::BlockLanded.cue(), None);
        assert_eq!(
            GameEvent::RowsCleared { rows: vec![1], points: 2 }.cue(),
            Some(Cue::RowMatch)
        );
        assert_eq!(GameEvent::PoisonEaten { lives_left: 1 }.cue(), Some(Cue::EatPoison));
    }
}
