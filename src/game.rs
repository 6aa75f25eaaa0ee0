//! Session state: board, cursor, running flag, chain scoring, event handling.

use crate::board::{Board, Cascade, CascadeStep, Pos, random_row};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Score per cleared cell, multiplied by the 1-based chain index.
const POINTS_PER_CELL: u32 = 10;

/// Discrete session event. The whole interaction surface routes through
/// [`GameState::apply`] so the engine stays independent of any UI binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    /// Swap the pair under the cursor and cascade-resolve.
    Swap,
    /// Move the cursor to a clicked cell (column clamped to the pair range).
    PointTo { row: usize, col: usize },
    /// One step of the rise schedule.
    Rise,
    /// Start a new game (the only event honoured while not running).
    Start,
}

/// What triggered the cascade currently in flight. Only a rise checks the
/// loss condition when its cascade settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CascadeOrigin {
    Swap,
    Rise,
}

/// Session: the board plus cursor, running flag and score. The cursor
/// addresses a horizontal pair, `(row, col)` and `(row, col + 1)`, so its
/// column is clamped to `cols - 2`.
#[derive(Debug)]
pub struct GameState {
    pub board: Board,
    pub cursor: Pos,
    /// False before the first start and after a loss.
    pub running: bool,
    pub score: u32,
    /// Longest chain seen this session.
    pub max_chain: u32,
    /// Rises survived this session.
    pub rises: u32,
    config: crate::GameConfig,
    cascade: Option<(Cascade, CascadeOrigin)>,
    rng: StdRng,
}

impl GameState {
    pub fn new(config: &crate::GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Deterministic construction for tests.
    pub fn with_rng(config: &crate::GameConfig, rng: StdRng) -> Self {
        Self {
            board: Board::new(config.rows, config.cols),
            cursor: Pos::new(config.rows - 1, 0),
            running: false,
            score: 0,
            max_chain: 0,
            rises: 0,
            config: config.clone(),
            cascade: None,
            rng,
        }
    }

    /// A cascade is mid-animation; board mutation waits until it settles.
    pub fn cascade_in_progress(&self) -> bool {
        self.cascade.is_some()
    }

    /// Number of tile colours in play.
    pub fn colors(&self) -> u8 {
        self.config.colors
    }

    /// Apply one event. Everything except `Start` is a no-op while not
    /// running; movement at a boundary clamps rather than failing; swap and
    /// rise are skipped while a cascade is in flight (one mutator at a time).
    pub fn apply(&mut self, event: Event) {
        if !self.running {
            if event == Event::Start {
                self.start();
            }
            return;
        }
        match event {
            Event::Start => self.start(),
            Event::MoveLeft => self.cursor.col = self.cursor.col.saturating_sub(1),
            Event::MoveRight => {
                self.cursor.col = (self.cursor.col + 1).min(self.config.cols - 2);
            }
            Event::MoveUp => self.cursor.row = self.cursor.row.saturating_sub(1),
            Event::MoveDown => {
                self.cursor.row = (self.cursor.row + 1).min(self.config.rows - 1);
            }
            Event::PointTo { row, col } => {
                self.cursor = Pos::new(
                    row.min(self.config.rows - 1),
                    col.min(self.config.cols - 2),
                );
            }
            Event::Swap => {
                if !self.cascade_in_progress() {
                    self.swap_pair();
                }
            }
            Event::Rise => {
                if !self.cascade_in_progress() {
                    self.rise();
                }
            }
        }
    }

    /// Reinitialise the board (run-avoided generation), reset the cursor and
    /// counters, and start running.
    fn start(&mut self) {
        self.board = Board::generate(
            self.config.rows,
            self.config.cols,
            self.config.colors,
            self.config.initial_empty_rows,
            &mut self.rng,
        );
        self.cursor = Pos::new(self.config.rows - 1, 0);
        self.running = true;
        self.score = 0;
        self.max_chain = 0;
        self.rises = 0;
        self.cascade = None;
    }

    /// Swap the pair under the cursor unconditionally (a swap that yields no
    /// match is not reverted), then cascade.
    fn swap_pair(&mut self) {
        let a = self.cursor;
        let b = Pos::new(a.row, a.col + 1);
        self.board.swap(a, b);
        self.begin_cascade(CascadeOrigin::Swap);
    }

    /// Shift the board up one row and append a fresh random row, then
    /// cascade. The loss check runs when the cascade settles.
    fn rise(&mut self) {
        let row = random_row(self.config.cols, self.config.colors, &mut self.rng);
        self.board.rise(row);
        self.rises += 1;
        self.begin_cascade(CascadeOrigin::Rise);
    }

    fn begin_cascade(&mut self, origin: CascadeOrigin) {
        self.cascade = Some((self.board.clone().cascade(), origin));
        if !self.config.animate {
            while self.advance_cascade().is_some() {}
        }
    }

    /// Pull the next cascade frame into the board. Returns the step for the
    /// presentation layer (cleared cells drive the fade effect), or `None`
    /// once the board is stable — at which point a rise-originated cascade
    /// checks the loss condition.
    pub fn advance_cascade(&mut self) -> Option<CascadeStep> {
        let (cascade, origin) = self.cascade.as_mut()?;
        if let Some(step) = cascade.next() {
            self.board = step.board.clone();
            self.score += step.cleared.len() as u32 * POINTS_PER_CELL * step.chain;
            self.max_chain = self.max_chain.max(step.chain);
            return Some(step);
        }
        let origin = *origin;
        self.cascade = None;
        if origin == CascadeOrigin::Rise && self.board.top_row_occupied() {
            self.running = false;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameConfig;

    fn config() -> GameConfig {
        GameConfig {
            rows: 12,
            cols: 6,
            colors: 5,
            initial_empty_rows: 6,
            rise_interval_ms: 3000,
            cascade_step_ms: 120,
            animate: false,
        }
    }

    fn started(seed: u64) -> GameState {
        let mut state = GameState::with_rng(&config(), StdRng::seed_from_u64(seed));
        state.apply(Event::Start);
        state
    }

    #[test]
    fn test_start_generates_stable_running_board() {
        let state = started(1);
        assert!(state.running);
        assert!(state.board.is_stable());
        assert_eq!(state.cursor, Pos::new(11, 0));
        assert_eq!(state.score, 0);
    }

    #[test]
    fn test_events_ignored_before_start() {
        let mut state = GameState::with_rng(&config(), StdRng::seed_from_u64(2));
        let before = state.board.clone();
        state.apply(Event::Swap);
        state.apply(Event::Rise);
        state.apply(Event::MoveLeft);
        assert_eq!(state.board, before);
        assert!(!state.running);
        assert_eq!(state.rises, 0);
    }

    #[test]
    fn test_cursor_clamps_at_all_boundaries() {
        let mut state = started(3);
        for _ in 0..20 {
            state.apply(Event::MoveLeft);
            state.apply(Event::MoveDown);
        }
        assert_eq!(state.cursor, Pos::new(11, 0));
        for _ in 0..20 {
            state.apply(Event::MoveRight);
            state.apply(Event::MoveUp);
        }
        // Column stops at cols - 2 so the pair stays in bounds.
        assert_eq!(state.cursor, Pos::new(0, 4));
    }

    #[test]
    fn test_point_to_clamps_column_to_pair_range() {
        let mut state = started(4);
        state.apply(Event::PointTo { row: 5, col: 5 });
        assert_eq!(state.cursor, Pos::new(5, 4));
        state.apply(Event::PointTo { row: 99, col: 2 });
        assert_eq!(state.cursor, Pos::new(11, 2));
    }

    #[test]
    fn test_swap_is_not_reverted_without_match() {
        let mut state = started(5);
        state.board = Board::new(12, 6);
        state.board.set(11, 0, 1);
        state.board.set(11, 1, 2);
        state.apply(Event::PointTo { row: 11, col: 0 });
        state.apply(Event::Swap);
        // No match arises, yet the swap sticks.
        assert_eq!(state.board.get(11, 0), Some(2));
        assert_eq!(state.board.get(11, 1), Some(1));
        assert!(state.board.is_stable());
    }

    #[test]
    fn test_rise_with_clear_top_keeps_running() {
        let mut state = started(6);
        state.apply(Event::Rise);
        // Half the board started empty; one rise cannot reach the top.
        assert!(state.running);
        assert_eq!(state.rises, 1);
        assert!(state.board.is_stable());
    }

    #[test]
    fn test_rise_into_occupied_top_ends_session() {
        let mut state = started(7);
        // Fill every row below the top with a stable checker of pair-columns
        // so the next rise pushes tiles into row 0.
        for r in 1..12 {
            for c in 0..6 {
                let color = 1 + ((r % 2) * 2 + c / 2 % 2) as u8;
                state.board.set(r, c, color);
            }
        }
        assert!(state.board.is_stable());
        // The rise pushes the filled stack into row 0. In the freak case where
        // the freshly appended row clears itself entirely (dropping the stack
        // back down), the next rise finishes the job.
        for _ in 0..5 {
            if !state.running {
                break;
            }
            state.apply(Event::Rise);
            assert_eq!(state.running, !state.board.top_row_occupied());
        }
        assert!(!state.running);
    }

    #[test]
    fn test_no_rise_after_loss() {
        let mut state = started(8);
        state.running = false;
        let before = state.board.clone();
        state.apply(Event::Rise);
        assert_eq!(state.board, before);
        assert_eq!(state.rises, 0);
    }

    #[test]
    fn test_chain_scoring_scales_with_chain_index() {
        let mut state = started(9);
        state.board = Board::new(12, 6);
        // Vertical 2s clear first; the 1 above falls to complete a row of 1s.
        state.board.set(8, 1, 1);
        state.board.set(9, 1, 2);
        state.board.set(10, 1, 2);
        state.board.set(11, 1, 2);
        state.board.set(11, 0, 1);
        state.board.set(11, 2, 1);
        state.apply(Event::PointTo { row: 11, col: 4 });
        // Swap two empty cells: legal, changes nothing, but runs the resolver
        // on a board that already has a match.
        state.apply(Event::Swap);
        assert!(state.board.is_stable());
        assert_eq!(state.board.fill_count(), 0);
        // Chain 1: 3 cells * 10 * 1; chain 2: 3 cells * 10 * 2.
        assert_eq!(state.score, 30 + 60);
        assert_eq!(state.max_chain, 2);
    }

    #[test]
    fn test_staggered_cascade_defers_mutation() {
        let mut cfg = config();
        cfg.animate = true;
        let mut state = GameState::with_rng(&cfg, StdRng::seed_from_u64(10));
        state.apply(Event::Start);
        state.board = Board::new(12, 6);
        state.board.set(11, 0, 3);
        state.board.set(11, 1, 3);
        state.board.set(11, 3, 3);
        state.apply(Event::PointTo { row: 11, col: 2 });
        state.apply(Event::Swap);
        // Swap happened, but the clear waits for the first advance.
        assert!(state.cascade_in_progress());
        assert_eq!(state.board.fill_count(), 3);
        let step = state.advance_cascade().unwrap();
        assert_eq!(step.chain, 1);
        assert_eq!(state.board.fill_count(), 0);
        assert!(state.advance_cascade().is_none());
        assert!(!state.cascade_in_progress());
    }

    #[test]
    fn test_swap_ignored_while_cascade_in_flight() {
        let mut cfg = config();
        cfg.animate = true;
        let mut state = GameState::with_rng(&cfg, StdRng::seed_from_u64(11));
        state.apply(Event::Start);
        state.board = Board::new(12, 6);
        state.board.set(11, 0, 2);
        state.board.set(11, 1, 2);
        state.board.set(11, 3, 2);
        state.apply(Event::PointTo { row: 11, col: 2 });
        state.apply(Event::Swap);
        assert!(state.cascade_in_progress());
        let during = state.board.clone();
        state.apply(Event::Swap);
        assert_eq!(state.board, during);
    }
}
