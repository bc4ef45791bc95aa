//! Layout and drawing: menu, playfield, sidebar, countdown, pause, quit menu, game over.

use crate::app::{QuitOption, Screen};
use crate::game::{EndCause, MatchEnd, PhaseKind, Snapshot};
use crate::grid::Cell;
use crate::highscores::BestScore;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

const SIDEBAR_WIDTH: u16 = 26;
const ROW_FLASH_MS: u32 = 450;

/// How many terminal cells one world cell takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zoom {
    /// Two world rows per terminal row (`▀` with fg/bg), one column wide.
    Half,
    /// One world row per terminal row, two columns wide.
    Full,
}

impl Zoom {
    /// Largest zoom whose board, border and sidebar fit in `area`.
    fn for_area(area: Rect, cols: u16, rows: u16) -> Self {
        let (w, h) = board_size(Zoom::Full, cols, rows);
        if area.width >= w + 2 + SIDEBAR_WIDTH && area.height >= h + 2 {
            Zoom::Full
        } else {
            Zoom::Half
        }
    }
}

/// Board size in terminal cells, border excluded.
fn board_size(zoom: Zoom, cols: u16, rows: u16) -> (u16, u16) {
    match zoom {
        Zoom::Half => (cols, rows.div_ceil(2)),
        Zoom::Full => (cols * 2, rows),
    }
}

/// Everything a frame needs besides the snapshot.
pub struct View<'a> {
    pub screen: Screen,
    pub snapshot: &'a Snapshot,
    pub theme: &'a Theme,
    pub paused: bool,
    pub username: &'a str,
    pub best: Option<&'a BestScore>,
    pub outcome: Option<MatchEnd>,
    pub new_record: bool,
    pub round_secs: u32,
    pub menu_level: u32,
    pub quit_selected: QuitOption,
    pub toast: Option<&'a str>,
}

/// Cleared stack rows flashing white, then fading back to the board.
pub struct RowFlash {
    rows: Vec<i32>,
    effect: Option<Effect>,
    last_process: Option<Instant>,
}

impl RowFlash {
    pub fn new(rows: Vec<i32>) -> Self {
        Self {
            rows,
            effect: None,
            last_process: None,
        }
    }

    pub fn done(&self) -> bool {
        self.effect.as_ref().is_some_and(|e| e.done())
    }
}

pub fn draw(frame: &mut Frame, view: &View, flash: &mut Option<RowFlash>, now: Instant) {
    let area = frame.area();
    match view.screen {
        Screen::Menu => draw_menu(frame, view, area),
        Screen::Playing | Screen::QuitMenu => {
            let board = draw_game(frame, view, area);
            if let Some(flash) = flash {
                apply_row_flash(frame, view, board, flash, now);
            }
            if let Some(n) = view.snapshot.countdown {
                draw_countdown(frame, view.theme, board, n);
            }
            if view.paused {
                draw_pause_overlay(frame, view.theme, area);
            }
            if view.screen == Screen::QuitMenu {
                draw_quit_menu(frame, view.theme, view.quit_selected);
            }
        }
        Screen::GameOver => {
            draw_game(frame, view, area);
            draw_game_over(frame, view, area);
        }
    }
}

/// Colour of every world cell, row-major from the top of the arena.
pub fn world_colors(snap: &Snapshot, theme: &Theme) -> Vec<Color> {
    let cols = snap.cols.max(0) as usize;
    let top = snap.arena_rows.start;
    let bottom = snap.stack_rows.end;
    let rows = (bottom - top).max(0) as usize;
    let mut out = vec![theme.bg; cols * rows];
    let index = |cell: Cell| {
        let inside = (0..snap.cols).contains(&cell.col) && (top..bottom).contains(&cell.row);
        inside.then(|| (cell.row - top) as usize * cols + cell.col as usize)
    };
    for row in snap.arena_rows.clone() {
        for col in 0..snap.cols {
            if let Some(i) = index(Cell::new(col, row)) {
                out[i] = theme.arena;
            }
        }
    }
    let tiles = snap.pile.iter().chain(&snap.block).chain(&snap.snake);
    for t in tiles {
        if let Some(i) = index(t.cell) {
            out[i] = theme.rank_color(t.rank);
        }
    }
    for &p in &snap.poison {
        if let Some(i) = index(p) {
            out[i] = theme.poison;
        }
    }
    if let Some(i) = snap.apple.and_then(index) {
        out[i] = theme.apple;
    }
    out
}

fn draw_menu(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let popup_w = 46u16;
    let popup_h = 20u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };

    let title = Line::from(vec![
        Span::styled(" Snake ", Style::default().fg(theme.apple).bold()),
        Span::styled("tris ", Style::default().fg(theme.rank_color(3)).bold()),
    ]);
    let key_style = Style::default().fg(theme.rank_color(1));
    let fg_style = Style::default().fg(theme.main_fg);
    let best = match view.best {
        Some(b) => format!(" Best: {} by {} ", b.score, b.username),
        None => " Best: none yet ".to_string(),
    };
    let level_spans: Vec<Span> = (1..=10u32)
        .map(|l| {
            let style = if l == view.menu_level {
                Style::default().fg(Color::Black).bg(theme.title).bold()
            } else {
                fg_style
            };
            Span::styled(format!("{l:>2} "), style)
        })
        .collect();

    let lines = vec![
        Line::from(""),
        title,
        Line::from(""),
        Line::from(Span::styled(format!(" Player: {} ", view.username), fg_style)),
        Line::from(Span::styled(best, fg_style)),
        Line::from(""),
        Line::from(Span::styled(
            " ─ STARTING LEVEL ─ ",
            Style::default().fg(theme.div_line),
        )),
        Line::from(level_spans),
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled(
            " [ START ] ",
            Style::default().fg(Color::Black).bg(theme.title).bold(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(" ↔ ", key_style),
            Span::from("LEVEL   "),
            Span::styled(" ENTER ", key_style),
            Span::from("PLAY   "),
            Span::styled(" Q ", key_style),
            Span::from("QUIT"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " Eat apples, dodge poison, then drop the snake. ",
            Style::default().fg(theme.inactive_fg),
        )),
    ];

    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

/// Draw playfield + sidebar centred in `area`; returns the board rect (inside the border).
fn draw_game(frame: &mut Frame, view: &View, area: Rect) -> Rect {
    let snap = view.snapshot;
    let cols = snap.cols.max(0) as u16;
    let rows = (snap.stack_rows.end - snap.arena_rows.start).max(0) as u16;
    let zoom = Zoom::for_area(area, cols, rows);
    let (bw, bh) = board_size(zoom, cols, rows);
    let (pw, ph) = (bw + 2, bh + 2);
    let total_w = pw + SIDEBAR_WIDTH;

    let horiz_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph),
            Constraint::Fill(1),
        ])
        .split(horiz_chunks[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert_chunks[1]);

    let board = draw_playfield(frame, view, inner[0], zoom);
    draw_sidebar(frame, view, inner[1]);
    board
}

fn draw_playfield(frame: &mut Frame, view: &View, area: Rect, zoom: Zoom) -> Rect {
    let snap = view.snapshot;
    let theme = view.theme;
    let title = match snap.phase {
        PhaseKind::Snake => format!(" Snaketris  Round {} ", snap.round),
        PhaseKind::Stack => format!(" Snaketris  Round {}  Drop! ", snap.round),
        PhaseKind::Ended => " Snaketris ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, theme.title));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let cols = snap.cols.max(0) as usize;
    let rows = (snap.stack_rows.end - snap.arena_rows.start).max(0) as usize;
    let (bw, bh) = board_size(zoom, cols as u16, rows as u16);
    let board = Rect {
        x: inner.x,
        y: inner.y,
        width: bw.min(inner.width),
        height: bh.min(inner.height),
    };
    let colors = world_colors(snap, theme);
    let at = |col: usize, row: usize| {
        if row < rows {
            colors[row * cols + col]
        } else {
            theme.bg
        }
    };

    let buf = frame.buffer_mut();
    for y in 0..board.height {
        for x in 0..board.width {
            let (symbol, style) = match zoom {
                Zoom::Half => {
                    let row = y as usize * 2;
                    let (top, bot) = (at(x as usize, row), at(x as usize, row + 1));
                    ("▀", Style::default().fg(top).bg(bot))
                }
                Zoom::Full => {
                    let c = at(x as usize / 2, y as usize);
                    (" ", Style::default().bg(c))
                }
            };
            buf[(board.x + x, board.y + y)]
                .set_symbol(symbol)
                .set_style(style);
        }
    }
    board
}

/// Buffer positions covered by world `rows` on the board.
fn row_positions(board: Rect, snap: &Snapshot, rows: &[i32]) -> HashSet<(u16, u16)> {
    let world_rows = (snap.stack_rows.end - snap.arena_rows.start).max(0) as u16;
    let half = board.height < world_rows;
    let mut set = HashSet::new();
    for &row in rows {
        let local = (row - snap.arena_rows.start).max(0) as u16;
        let y = board.y + if half { local / 2 } else { local };
        if y >= board.y + board.height {
            continue;
        }
        for x in board.x..board.x + board.width {
            set.insert((x, y));
        }
    }
    set
}

/// Create the flash effect on first use, then advance it by the time since the last frame.
fn apply_row_flash(frame: &mut Frame, view: &View, board: Rect, flash: &mut RowFlash, now: Instant) {
    let delta = flash
        .last_process
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    flash.last_process = Some(now);

    let positions = row_positions(board, view.snapshot, &flash.rows);
    let buf = frame.buffer_mut();
    for &(x, y) in &positions {
        buf[(x, y)].set_symbol(" ").set_style(Style::default().bg(Color::White));
    }

    if flash.effect.is_none() {
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            positions.contains(&(pos.x, pos.y))
        }));
        let bg = view.theme.bg;
        let effect = fx::fade_to(bg, bg, (ROW_FLASH_MS, Interpolation::QuadOut))
            .with_filter(filter)
            .with_area(board);
        flash.effect = Some(effect);
    }
    if let Some(effect) = &mut flash.effect {
        frame.render_effect(effect, board, TfxDuration::from_millis(delta_ms));
    }
}

fn draw_countdown(frame: &mut Frame, theme: &Theme, board: Rect, n: u32) {
    let w = 9u16.min(board.width);
    let h = 3u16.min(board.height);
    let r = Rect {
        x: board.x + board.width.saturating_sub(w) / 2,
        y: board.y + (board.height / 3).saturating_sub(h / 2),
        width: w,
        height: h,
    };
    let label = if n == 0 { " GO! ".to_string() } else { format!(" {n} ") };
    Paragraph::new(Line::from(Span::styled(
        label,
        Style::default().fg(theme.title).bold(),
    )))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.inactive_fg).bg(theme.bg)),
    )
    .render(r, frame.buffer_mut());
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 5u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P  Resume    Q  Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

fn cause_label(cause: EndCause) -> &'static str {
    match cause {
        EndCause::WallCollision => " Hit the wall ",
        EndCause::SelfCollision => " Bit your own tail ",
        EndCause::OutOfLives => " Out of lives ",
        EndCause::StackOverflow => " Stack overflow ",
    }
}

fn draw_game_over(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let popup_w = 34u16;
    let popup_h = 12u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let fg = Style::default().fg(theme.main_fg);
    let (score, level, cause) = match view.outcome {
        Some(end) => (end.score, end.level, cause_label(end.cause)),
        None => (view.snapshot.score, view.snapshot.level, " Game Over "),
    };
    let best = view.best.map_or(score, |b| b.score);
    let mut lines: Vec<Line> = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(Span::styled(cause, Style::default().fg(theme.inactive_fg))),
        Line::from(""),
        Line::from(Span::styled(format!(" Score: {score} "), fg)),
        Line::from(Span::styled(format!(" Best: {best} "), fg)),
        Line::from(Span::styled(format!(" Level: {level} "), fg)),
    ];
    if view.new_record {
        lines.push(Line::from(Span::styled(
            " New record! ",
            Style::default().fg(Color::Yellow).bold(),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" R  Restart    Q  Quit ", fg)));
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
            .title(Span::styled(" Snaketris ", theme.title)),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_sidebar(frame: &mut Frame, view: &View, area: Rect) {
    let snap = view.snapshot;
    let theme = view.theme;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8), // Stats
            Constraint::Length(5), // Round clock + message
            Constraint::Length(4), // Rank colours
        ])
        .split(area);

    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let stats_inner = stats_block.inner(chunks[0]);
    stats_block.render(chunks[0], frame.buffer_mut());
    let best = view.best.map_or(0, |b| b.score).max(snap.score);
    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    let stats_lines = vec![
        stat("Player: ", view.username.to_string()),
        stat("Score:  ", snap.score.to_string()),
        stat("Best:   ", best.to_string()),
        stat("Level:  ", snap.level.to_string()),
        Line::from(vec![
            Span::styled("Lives:  ", title_style),
            Span::styled("♥ ".repeat(snap.lives as usize), Style::default().fg(theme.rank_color(3))),
        ]),
        stat("Snake:  ", snap.snake_value.to_string()),
    ];
    Paragraph::new(ratatui::text::Text::from(stats_lines)).render(stats_inner, frame.buffer_mut());

    let clock_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let clock_inner = clock_block.inner(chunks[1]);
    clock_block.render(chunks[1], frame.buffer_mut());
    let clock_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Length(1)])
        .split(clock_inner);
    let phase_label = match snap.phase {
        PhaseKind::Snake if snap.countdown.is_some() => "Get ready",
        PhaseKind::Snake => "Snake",
        PhaseKind::Stack => "Stack",
        PhaseKind::Ended => "Over",
    };
    Paragraph::new(Line::from(vec![
        Span::styled(phase_label, title_style),
        Span::styled(format!("  {}s", snap.time_left), fg_style),
    ]))
    .render(clock_layout[0], frame.buffer_mut());
    let ratio = if view.round_secs > 0 {
        (f64::from(snap.time_left) / f64::from(view.round_secs)).min(1.0)
    } else {
        0.0
    };
    let bar_color = if ratio > 0.6 {
        Color::Green
    } else if ratio > 0.3 {
        Color::Yellow
    } else {
        Color::Red
    };
    Gauge::default()
        .ratio(ratio)
        .label("")
        .gauge_style(Style::default().fg(bar_color))
        .render(clock_layout[1], frame.buffer_mut());
    if let Some(text) = view.toast {
        Paragraph::new(Line::from(Span::styled(text, Style::default().fg(theme.title).bold())))
            .render(clock_layout[2], frame.buffer_mut());
    }

    let ranks_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let ranks_inner = ranks_block.inner(chunks[2]);
    ranks_block.render(chunks[2], frame.buffer_mut());
    let ranks_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(ranks_inner);
    Paragraph::new(Line::from(Span::styled("Ranks", title_style)))
        .render(ranks_layout[0], frame.buffer_mut());
    draw_rank_strip(frame, theme, ranks_layout[1]);
}

/// One swatch per rank, lowest first.
fn draw_rank_strip(frame: &mut Frame, theme: &Theme, area: Rect) {
    let n = theme.ranks.len() as u16;
    let block_w = (area.width / n).max(1);
    for (i, &c) in theme.ranks.iter().enumerate() {
        let r = Rect {
            x: area.x + (i as u16) * block_w,
            y: area.y,
            width: block_w,
            height: area.height.min(1),
        }
        .intersection(area);
        Paragraph::new("█")
            .style(Style::default().fg(c).bg(c))
            .render(r, frame.buffer_mut());
    }
}

pub fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let area = frame.area();
    let qw = 24u16.min(area.width);
    let qh = 8u16.min(area.height);
    let quit_rect = Rect {
        x: area.x + area.width.saturating_sub(qw) / 2,
        y: area.y + area.height.saturating_sub(qh) / 2,
        width: qw,
        height: qh,
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .title(" Quit? ");

    for y in quit_rect.y..quit_rect.y + quit_rect.height {
        for x in quit_rect.x..quit_rect.x + quit_rect.width {
            frame.buffer_mut()[(x, y)].set_style(Style::default().bg(theme.bg));
        }
    }

    let inner = block.inner(quit_rect);
    block.render(quit_rect, frame.buffer_mut());

    let options = [
        (QuitOption::Resume, " Resume "),
        (QuitOption::MainMenu, " Main Menu "),
        (QuitOption::Exit, " Exit "),
    ];
    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == selected {
            Style::default().fg(theme.bg).bg(theme.title).bold()
        } else {
            Style::default().fg(theme.title)
        };
        let rx = inner.x + (inner.width.saturating_sub(label.len() as u16)) / 2;
        let ry = inner.y + 1 + i as u16 * 2;
        if ry < inner.y + inner.height {
            frame.buffer_mut().set_string(rx, ry, label, style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameConfig;
    use crate::game::Game;
    use crate::grid::{ARENA_ROWS, COLS, STACK_ROWS, Tile};

    fn snapshot() -> Snapshot {
        Game::new(GameConfig::default(), Some(11)).snapshot()
    }

    #[test]
    fn world_colors_layers_tiles_over_bands() {
        let theme = Theme::default();
        let mut snap = snapshot();
        snap.pile = vec![Tile::new(Cell::new(3, 29), 4, 8)];
        let colors = world_colors(&snap, &theme);
        let cols = COLS as usize;
        assert_eq!(colors.len(), cols * (ARENA_ROWS + STACK_ROWS) as usize);
        // Head at the spawn corner, stack band below the arena.
        assert_eq!(colors[0], theme.rank_color(0));
        assert_eq!(colors[cols * ARENA_ROWS as usize], theme.bg);
        assert_eq!(colors[cols * 29 + 3], theme.rank_color(4));
        let apple = snap.apple.expect("apple spawned");
        assert_eq!(colors[apple.row as usize * cols + apple.col as usize], theme.apple);
        for p in &snap.poison {
            assert_eq!(colors[p.row as usize * cols + p.col as usize], theme.poison);
        }
    }

    #[test]
    fn zoom_falls_back_to_half_blocks_on_small_terminals() {
        let small = Rect::new(0, 0, 80, 24);
        let large = Rect::new(0, 0, 120, 40);
        assert_eq!(Zoom::for_area(small, 20, 30), Zoom::Half);
        assert_eq!(Zoom::for_area(large, 20, 30), Zoom::Full);
        assert_eq!(board_size(Zoom::Half, 20, 30), (20, 15));
    }

    #[test]
    fn flash_rows_map_to_buffer_rows() {
        let snap = snapshot();
        let board = Rect::new(1, 1, 20, 15);
        let set = row_positions(board, &snap, &[28, 29]);
        // Both world rows share terminal row 1 + 14 in half-block mode.
        assert_eq!(set.len(), 20);
        assert!(set.contains(&(1, 15)));
    }
}
