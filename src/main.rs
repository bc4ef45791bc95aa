//! Snaketris: grow a snake in the arena, then drop it as a block and clear rows.

mod app;
mod audio;
mod game;
mod grid;
mod highscores;
mod input;
mod snake;
mod stack;
mod theme;
mod timer;
mod transfer;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// Gameplay constants. Everything timing-related is in milliseconds or seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub round_secs: u32,
    pub countdown_secs: u32,
    pub poison_count: usize,
    pub starting_lives: u32,
    pub initial_level: u32,
    pub initial_speed_ms: u64,
    pub speed_step_ms: u64,
    pub min_speed_ms: u64,
    pub max_level: u32,
    pub blocks_per_level: u32,
    pub lateral_repeat_ms: u64,
    pub drop_repeat_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_secs: 10,
            countdown_secs: 3,
            poison_count: 5,
            starting_lives: 3,
            initial_level: 1,
            initial_speed_ms: 170,
            speed_step_ms: 10,
            min_speed_ms: 50,
            max_level: 10,
            blocks_per_level: 10,
            lateral_repeat_ms: 100,
            drop_repeat_ms: 70,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }
    let theme = match theme::Theme::load(args.theme.as_deref(), args.palette) {
        Ok(theme) => theme,
        Err(err) => {
            tracing::warn!(%err, "theme not loaded, using defaults");
            theme::Theme::default_for_palette(args.palette)
        }
    };
    let config = GameConfig {
        initial_level: args.level,
        ..GameConfig::default()
    };
    let mut app = App::new(args, config, theme)?;
    app.run()?;
    Ok(())
}

/// The terminal belongs to the UI, so logs only go to a file.
fn init_logging(path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 2..=8;

fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// 2 to 8 characters from `A-Z a-z 0-9 - _`.
fn parse_username(s: &str) -> Result<String, String> {
    if !s.chars().all(is_username_char) {
        return Err("only letters, digits, '-' and '_' are allowed".to_string());
    }
    if !USERNAME_LEN.contains(&s.len()) {
        return Err("must be 2 to 8 characters long".to_string());
    }
    Ok(s.to_string())
}

/// `$USER` cut down to a valid name, else "player".
fn default_username() -> String {
    std::env::var("USER")
        .ok()
        .map(|u| {
            u.chars()
                .filter(|&c| is_username_char(c))
                .take(*USERNAME_LEN.end())
                .collect::<String>()
        })
        .filter(|u| parse_username(u).is_ok())
        .unwrap_or_else(|| "player".to_string())
}

/// Snake meets falling blocks in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "snaketris",
    version,
    about = "Grow a snake for ten seconds, then drop it into the stack and clear rows.",
    long_about = "Snaketris alternates two phases.\n\n\
        SNAKE: steer from the top-left corner, eat apples to grow and raise the snake's \
        value, avoid poison (costs a life), walls and your own body (end the match).\n\n\
        STACK: when the round clock runs out the snake drops as a block. Slide it left or \
        right and land it; every full row scores the value of its tiles.\n\n\
        CONTROLS:\n  Arrows or h/j/k/l  Steer / move block   P  Pause   Q / Esc  Quit"
)]
pub struct Args {
    /// Name stored next to the best score (2-8 of A-Z, 0-9, '-', '_').
    #[arg(short, long, default_value_t = default_username(), value_parser = parse_username)]
    pub username: String,

    /// Starting level (1-10). Higher levels move and fall faster.
    #[arg(short, long, default_value = "1", value_name = "N",
        value_parser = clap::value_parser!(u32).range(1..=10))]
    pub level: u32,

    /// Seed for apple placement; the same seed gives the same layout.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Skip main menu and start game immediately.
    #[arg(long)]
    pub no_menu: bool,

    /// Target render frames per second.
    #[arg(long, default_value = "30.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Ring the terminal bell on apples, poison, cleared rows and game over.
    #[arg(long)]
    pub bell: bool,

    /// Write logs to this file (RUST_LOG filters, default info).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
