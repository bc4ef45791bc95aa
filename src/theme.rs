//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::snake::MAX_RANK;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

const RANKS: usize = MAX_RANK as usize + 1;

/// Tile colours by rank plus UI colours loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Snake/tile colours by rank (0..=6): grey, blue, yellow, red, purple, orange, cyan.
    pub ranks: [Color; RANKS],
    pub apple: Color,
    pub poison: Color,
    /// Stack background.
    pub bg: Color,
    /// Arena floor, drawn above the stack.
    pub arena: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (score, level).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Secondary text, countdown and paused overlays.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

const ONEDARK_RANKS: [Color; RANKS] = [
    rgb(0x8B919C), // grey
    rgb(0x61AFEF), // blue
    rgb(0xE5C07B), // yellow
    rgb(0xE06C75), // red
    rgb(0xC678DD), // purple
    rgb(0xD19A66), // orange
    rgb(0x56B6C2), // cyan
];

impl Theme {
    pub fn onedark_default() -> Self {
        Self {
            ranks: ONEDARK_RANKS,
            apple: rgb(0x98C379),
            poison: rgb(0xBE5046),
            bg: rgb(0x31353F),
            arena: rgb(0x282C34),
            div_line: rgb(0x3F444F),
            main_fg: rgb(0xABB2BF),
            title: rgb(0xE5C07B),
            inactive_fg: rgb(0x5C6370),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or the file is missing.
    /// `palette` selects colour variant: Normal (theme), HighContrast, or Colorblind.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    pub fn default_for_palette(palette: crate::Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    /// Override rank and apple colours for high-contrast or colorblind.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.ranks = [
                    rgb(0xC0C0C0),
                    rgb(0x0088FF),
                    rgb(0xFFFF00),
                    rgb(0xFF0000),
                    rgb(0xFF00FF),
                    rgb(0xFF8800),
                    rgb(0x00FFFF),
                ];
                self.apple = rgb(0x00FF00);
                self.poison = rgb(0x8800FF);
            }
            crate::Palette::Colorblind => {
                // Okabe-Ito; apple and poison never differ by red/green alone.
                self.ranks = [
                    rgb(0xBBBBBB),
                    rgb(0x0072B2),
                    rgb(0xF0E442),
                    rgb(0xD55E00),
                    rgb(0xCC79A7),
                    rgb(0xE69F00),
                    rgb(0x56B4E9),
                ];
                self.apple = rgb(0x009E73);
                self.poison = rgb(0x000000);
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str, fallback: Color| {
            map.get(key)
                .and_then(|v| parse_hex(v).ok())
                .unwrap_or(fallback)
        };
        let d = Self::onedark_default();
        Self {
            ranks: [
                get("inactive_fg", d.ranks[0]),
                get("cpu_box", d.ranks[1]),
                get("title", d.ranks[2]),
                get("cpu_end", d.ranks[3]),
                get("net_box", d.ranks[4]),
                get("temp_mid", d.ranks[5]),
                get("hi_fg", d.ranks[6]),
            ],
            apple: get("mem_box", d.apple),
            poison: get("temp_end", d.poison),
            bg: get("meter_bg", d.bg),
            arena: get("main_bg", d.arena),
            div_line: get("div_line", d.div_line),
            main_fg: get("main_fg", d.main_fg),
            title: get("title", d.title),
            inactive_fg: get("inactive_fg", d.inactive_fg),
        }
    }

    /// Colour of a tile of `rank`; ranks past the top share its colour.
    #[inline]
    pub fn rank_color(&self, rank: u8) -> Color {
        self.ranks[(rank as usize).min(RANKS - 1)]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    if !s.is_ascii() {
        return Err(invalid());
    }
    let channel = |range: std::ops::Range<usize>, scale: u8| {
        u8::from_str_radix(&s[range], 16)
            .map(|v| v * scale)
            .map_err(|_| invalid())
    };
    let (r, g, b) = match s.len() {
        6 => (channel(0..2, 1)?, channel(2..4, 1)?, channel(4..6, 1)?),
        3 => (channel(0..1, 17)?, channel(1..2, 17)?, channel(2..3, 17)?),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}
