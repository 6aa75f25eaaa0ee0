//! Paneltui — Panel de Pon-style block-matching puzzle game in the terminal.

mod app;
mod board;
mod game;
mod input;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};
use thiserror::Error;

/// Options derived from CLI that shape a session (board geometry, colour
/// count, rise cadence, cascade animation pacing).
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub rows: usize,
    pub cols: usize,
    pub colors: u8,
    pub initial_empty_rows: usize,
    pub rise_interval_ms: u64,
    pub cascade_step_ms: u64,
    /// Staggered cascade resolution (frame-by-frame); false = instant.
    pub animate: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("colors must be between 3 and 8, got {0} (run-avoided generation needs 3)")]
    Colors(u8),
    #[error("cols must be at least 3 (minimum match length), got {0}")]
    Cols(usize),
    #[error("rows must be at least 2, got {0}")]
    Rows(usize),
    #[error("empty-rows must be smaller than rows ({0} >= {1})")]
    EmptyRows(usize, usize),
    #[error("rise interval must be non-zero")]
    RiseInterval,
}

impl GameConfig {
    /// Fail fast on configurations that can never form a valid session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(3..=8).contains(&self.colors) {
            return Err(ConfigError::Colors(self.colors));
        }
        if self.cols < board::MIN_RUN {
            return Err(ConfigError::Cols(self.cols));
        }
        if self.rows < 2 {
            return Err(ConfigError::Rows(self.rows));
        }
        if self.initial_empty_rows >= self.rows {
            return Err(ConfigError::EmptyRows(self.initial_empty_rows, self.rows));
        }
        if self.rise_interval_ms == 0 {
            return Err(ConfigError::RiseInterval);
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = GameConfig {
        rows: args.rows as usize,
        cols: args.cols as usize,
        colors: args.colors,
        initial_empty_rows: args.empty_rows as usize,
        rise_interval_ms: args.rise_interval_ms,
        cascade_step_ms: args.cascade_step_ms,
        animate: !args.no_animation,
    };
    config.validate()?;
    let mut app = App::new(args, config, theme)?;
    app.run()?;
    Ok(())
}

/// Panel de Pon-style puzzle game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "paneltui",
    version,
    about = "Panel de Pon-style block-matching puzzle in the terminal. Swap adjacent tiles to line up three of a colour; the board rises from below.",
    long_about = "Paneltui is a terminal puzzle game in the Panel de Pon / Tetris Attack lineage.\n\n\
        A cursor selects a horizontal pair of tiles. Swap them to form runs of three or more \
        of a colour; matched tiles vanish, the rest fall, and chains score extra. Every few \
        seconds the whole board rises one row — when tiles are pushed past the top, the game ends.\n\n\
        CONTROLS (normal):\n  Arrows      Move cursor   Enter/Space  Swap pair\n  P           Pause         Q / Esc      Quit\n\n\
        CONTROLS (vim):\n  h/j/k/l     Move cursor   x or Space   Swap pair\n  p           Pause         q            Quit\n\n\
        Click a tile to place the cursor there. Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Board height in rows.
    #[arg(long, default_value = "12", value_name = "ROWS")]
    pub rows: u16,

    /// Board width in columns.
    #[arg(long, default_value = "6", value_name = "COLS")]
    pub cols: u16,

    /// Number of tile colours (3-8).
    #[arg(short = 'k', long, default_value = "5", value_name = "N")]
    pub colors: u8,

    /// Rows left empty at the top of a freshly generated board.
    #[arg(long, default_value = "6", value_name = "N")]
    pub empty_rows: u16,

    /// Milliseconds between automatic rises of the board.
    #[arg(short = 'r', long, default_value = "3000", value_name = "MS")]
    pub rise_interval_ms: u64,

    /// Milliseconds between staggered cascade frames (clear / fall steps).
    #[arg(long, default_value = "160", value_name = "MS")]
    pub cascade_step_ms: u64,

    /// Disable cascade animation (resolve swaps and rises instantly).
    #[arg(long)]
    pub no_animation: bool,

    /// Skip main menu and start a game immediately.
    #[arg(long)]
    pub no_menu: bool,

    /// Target render frames per second.
    #[arg(long, default_value = "30.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Path to theme file (btop-style theme[key]="value"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,
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
