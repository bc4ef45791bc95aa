//! App: terminal init, main loop, tick and key handling.

use crate::audio::{self, AudioSink};
use crate::game::{Game, GameEvent, MatchEnd, PhaseKind};
use crate::grid::Direction;
use crate::highscores::{self, BestScore, FileStore, ScoreStore};
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::ui::{self, RowFlash, View};
use crate::{Args, GameConfig};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};

/// Longest step fed to the game in one frame.
const MAX_FRAME_DT: Duration = Duration::from_millis(100);
const TOAST_TTL: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    GameOver,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    MainMenu,
    Exit,
}

impl QuitOption {
    fn next(self) -> Self {
        match self {
            Self::Resume => Self::MainMenu,
            Self::MainMenu => Self::Exit,
            Self::Exit => Self::Resume,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Resume => Self::Exit,
            Self::MainMenu => Self::Resume,
            Self::Exit => Self::MainMenu,
        }
    }
}

pub struct App {
    args: Args,
    config: GameConfig,
    theme: Theme,
    game: Game,
    screen: Screen,
    paused: bool,
    quit_selected: QuitOption,
    store: Box<dyn ScoreStore>,
    audio: Box<dyn AudioSink>,
    best: Option<BestScore>,
    new_record: bool,
    menu_level: u32,
    row_flash: Option<RowFlash>,
    toast: Option<(String, Instant)>,
    last_frame: Instant,
}

/// Short sidebar message for an event, if it deserves one.
fn toast_for(ev: &GameEvent) -> Option<String> {
    match ev {
        GameEvent::CountdownTick(0) => Some("Go!".to_string()),
        GameEvent::RoundStarted { round } if *round > 1 => Some(format!("Round {round}")),
        GameEvent::AppleEaten { snake_value } => Some(format!("Apple! worth {snake_value}")),
        GameEvent::PoisonEaten { lives_left } => Some(format!("Poison! {lives_left} left")),
        GameEvent::RowsCleared { rows, points } => {
            Some(format!("+{points} ({} rows)", rows.len()))
        }
        GameEvent::LevelUp { level } => Some(format!("Level {level}!")),
        GameEvent::PhaseChanged(PhaseKind::Stack) => Some("Drop it!".to_string()),
        _ => None,
    }
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Result<Self> {
        let audio = audio::sink(args.bell);
        Ok(Self::with_collaborators(
            args,
            config,
            theme,
            Box::new(FileStore::from_env()),
            audio,
        ))
    }

    fn with_collaborators(
        args: Args,
        config: GameConfig,
        theme: Theme,
        store: Box<dyn ScoreStore>,
        audio: Box<dyn AudioSink>,
    ) -> Self {
        let best = match store.load_best() {
            Ok(best) => best,
            Err(err) => {
                tracing::warn!(%err, "best score unreadable, starting fresh");
                None
            }
        };
        let screen = if args.no_menu {
            Screen::Playing
        } else {
            Screen::Menu
        };
        Self {
            game: Game::new(config.clone(), args.seed),
            menu_level: config.initial_level,
            config,
            theme,
            screen,
            paused: false,
            quit_selected: QuitOption::Resume,
            store,
            audio,
            best,
            new_record: false,
            row_flash: None,
            toast: None,
            last_frame: Instant::now(),
            args,
        }
    }

    fn reset_game(&mut self) {
        self.config.initial_level = self.menu_level;
        self.game = Game::new(self.config.clone(), self.args.seed);
        self.screen = Screen::Playing;
        self.paused = false;
        self.new_record = false;
        self.row_flash = None;
        self.toast = None;
        self.last_frame = Instant::now();
    }

    /// Route what the core reported to sound, effects and persistence.
    fn handle_events(&mut self) {
        for ev in self.game.drain_events() {
            if let Some(cue) = ev.cue() {
                self.audio.play(cue);
            }
            if let Some(text) = toast_for(&ev) {
                self.toast = Some((text, Instant::now()));
            }
            match ev {
                GameEvent::RowsCleared { rows, .. } => self.row_flash = Some(RowFlash::new(rows)),
                GameEvent::MatchEnded(end) => self.on_match_end(end),
                _ => {}
            }
        }
    }

    fn on_match_end(&mut self, end: MatchEnd) {
        match highscores::submit(self.store.as_mut(), &self.args.username, end.score) {
            Ok(standing) => {
                self.new_record = standing.new_record;
                self.best = standing.best;
            }
            Err(err) => tracing::error!(%err, score = end.score, "could not save best score"),
        }
        self.screen = Screen::GameOver;
        self.paused = false;
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal =
            ratatui::Terminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;
        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.args.frame_rate.max(1.0));
        self.last_frame = Instant::now();
        loop {
            let now = Instant::now();
            let dt = now.saturating_duration_since(self.last_frame).min(MAX_FRAME_DT);
            self.last_frame = now;

            if self.screen == Screen::Playing && !self.paused {
                self.game.tick(dt);
            }
            self.handle_events();
            if self.toast.as_ref().is_some_and(|(_, at)| at.elapsed() >= TOAST_TTL) {
                self.toast = None;
            }

            let snapshot = self.game.snapshot();
            let view = View {
                screen: self.screen,
                snapshot: &snapshot,
                theme: &self.theme,
                paused: self.paused,
                username: &self.args.username,
                best: self.best.as_ref(),
                outcome: self.game.outcome(),
                new_record: self.new_record,
                round_secs: self.config.round_secs,
                menu_level: self.menu_level,
                quit_selected: self.quit_selected,
                toast: self.toast.as_ref().map(|(text, _)| text.as_str()),
            };
            let flash = &mut self.row_flash;
            terminal.draw(|f| ui::draw(f, &view, flash, now))?;
            if self.row_flash.as_ref().is_some_and(RowFlash::done) {
                self.row_flash = None;
            }

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if !event::poll(timeout)? {
                continue;
            }
            while event::poll(Duration::ZERO)? {
                let Event::Key(key) = event::read()? else {
                    continue;
                };
                // Held keys repeat; the stack phase rate-limits them itself.
                if key.kind == KeyEventKind::Release {
                    continue;
                }
                if !self.on_action(key_to_action(key)) {
                    return Ok(());
                }
            }
        }
    }

    /// Apply one action; `false` means leave the app.
    fn on_action(&mut self, action: Action) -> bool {
        if action == Action::ForceQuit {
            return false;
        }
        match self.screen {
            Screen::Menu => match action {
                Action::Quit => return false,
                Action::Steer(Direction::Left) => {
                    self.menu_level = self.menu_level.saturating_sub(1).max(1);
                }
                Action::Steer(Direction::Right) => {
                    self.menu_level = (self.menu_level + 1).min(self.config.max_level);
                }
                Action::Confirm => self.reset_game(),
                _ => {}
            },
            Screen::Playing => match action {
                Action::Pause => self.paused = !self.paused,
                Action::Quit => {
                    self.screen = Screen::QuitMenu;
                    self.quit_selected = QuitOption::Resume;
                }
                Action::Steer(dir) if !self.paused => {
                    self.game.input(dir);
                }
                _ => {}
            },
            Screen::QuitMenu => match action {
                Action::Steer(Direction::Down | Direction::Right) => {
                    self.quit_selected = self.quit_selected.next();
                }
                Action::Steer(Direction::Up | Direction::Left) => {
                    self.quit_selected = self.quit_selected.prev();
                }
                Action::Confirm => match self.quit_selected {
                    QuitOption::Resume => self.screen = Screen::Playing,
                    QuitOption::MainMenu => {
                        self.screen = Screen::Menu;
                        self.paused = false;
                    }
                    QuitOption::Exit => return false,
                },
                Action::Pause | Action::Quit => self.screen = Screen::Playing,
                _ => {}
            },
            Screen::GameOver => match action {
                Action::Quit => return false,
                Action::Restart | Action::Confirm => self.reset_game(),
                _ => {}
            },
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Muted;
    use crate::game::{EndCause, PhaseKind};
    use crate::highscores::MemoryStore;
    use clap::Parser;

    fn app(extra: &[&str]) -> App {
        let mut argv = vec!["snaketris", "--username", "ada", "--seed", "1"];
        argv.extend_from_slice(extra);
        let args = Args::parse_from(argv);
        let config = GameConfig {
            initial_level: args.level,
            ..GameConfig::default()
        };
        App::with_collaborators(
            args,
            config,
            Theme::default(),
            Box::new(MemoryStore::default()),
            Box::new(Muted),
        )
    }

    #[test]
    fn menu_picks_level_then_starts() {
        let mut app = app(&[]);
        assert_eq!(app.screen, Screen::Menu);
        app.on_action(Action::Steer(Direction::Left));
        assert_eq!(app.menu_level, 1);
        for _ in 0..12 {
            app.on_action(Action::Steer(Direction::Right));
        }
        assert_eq!(app.menu_level, 10);
        app.on_action(Action::Confirm);
        assert_eq!(app.screen, Screen::Playing);
        assert_eq!(app.game.state().level, 10);
    }

    #[test]
    fn match_end_records_best_and_shows_game_over() {
        let mut app = app(&["--no-menu"]);
        app.on_match_end(MatchEnd {
            score: 90,
            level: 2,
            cause: EndCause::StackOverflow,
        });
        assert_eq!(app.screen, Screen::GameOver);
        assert!(app.new_record);
        assert_eq!(app.best.as_ref().map(|b| (b.username.as_str(), b.score)), Some(("ada", 90)));
        assert!(app.on_action(Action::Restart));
        assert_eq!(app.screen, Screen::Playing);
        assert!(!app.new_record);
        assert_eq!(app.game.phase(), PhaseKind::Snake);
    }

    #[test]
    fn lower_score_keeps_previous_best() {
        let mut app = app(&["--no-menu"]);
        let end = |score| MatchEnd {
            score,
            level: 1,
            cause: EndCause::OutOfLives,
        };
        app.on_match_end(end(50));
        app.on_match_end(end(20));
        assert!(!app.new_record);
        assert_eq!(app.best.as_ref().map(|b| b.score), Some(50));
    }

    #[test]
    fn quit_menu_cycles_and_exits() {
        let mut app = app(&["--no-menu"]);
        assert!(app.on_action(Action::Quit));
        assert_eq!(app.screen, Screen::QuitMenu);
        app.on_action(Action::Steer(Direction::Down));
        assert_eq!(app.quit_selected, QuitOption::MainMenu);
        app.on_action(Action::Steer(Direction::Down));
        assert_eq!(app.quit_selected, QuitOption::Exit);
        assert!(!app.on_action(Action::Confirm));
    }

    #[test]
    fn toasts_describe_events() {
        assert_eq!(toast_for(&GameEvent::CountdownTick(2)), None);
        assert_eq!(toast_for(&GameEvent::CountdownTick(0)).as_deref(), Some("Go!"));
        assert_eq!(toast_for(&GameEvent::RoundStarted { round: 1 }), None);
        assert_eq!(
            toast_for(&GameEvent::RowsCleared {
                rows: vec![28, 29],
                points: 80
            })
            .as_deref(),
            Some("+80 (2 rows)")
        );
        assert_eq!(toast_for(&GameEvent::BlockLanded), None);
    }

    #[test]
    fn ctrl_c_exits_from_every_screen() {
        use crate::input::key_to_action;
        use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

        let ctrl_c = key_to_action(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        let mut app = app(&["--no-menu"]);
        assert!(!app.on_action(ctrl_c));
        assert!(app.on_action(Action::Quit));
        assert_eq!(app.screen, Screen::QuitMenu);
        assert!(!app.on_action(ctrl_c));
        for screen in [Screen::Menu, Screen::GameOver] {
            app.screen = screen;
            assert!(!app.on_action(ctrl_c));
        }
    }

    #[test]
    fn pause_toggles() {
        let mut app = app(&["--no-menu"]);
        app.on_action(Action::Pause);
        assert!(app.paused);
        app.on_action(Action::Pause);
        assert!(!app.paused);
    }
}
