//! Board engine: grid model, match detection, gravity, cascade resolution, rise.

use rand::Rng;
use std::collections::{HashSet, VecDeque};

/// Minimum run length that counts as a match. Fixed by the rules, named for clarity.
pub const MIN_RUN: usize = 3;

/// Cell value: 0 = empty, 1..=colors = tile colour.
pub type Cell = u8;

/// Grid position. Row 0 is the top (danger) row; row `rows - 1` is the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// One maximal matched run along a single axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub color: Cell,
    pub cells: Vec<Pos>,
}

/// Playing board: rows × cols grid of cells. `cells[0]` is the top row.
///
/// Rows live in a `VecDeque` so a rise is a pop at the top plus a push at
/// the bottom. `Clone` deep-copies the storage; snapshots handed to the
/// presentation layer never alias the live board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    cols: usize,
    cells: VecDeque<Vec<Cell>>,
}

impl Board {
    /// Empty board of the given dimensions.
    pub fn new(rows: usize, cols: usize) -> Self {
        let cells = (0..rows).map(|_| vec![0; cols]).collect();
        Self { rows, cols, cells }
    }

    /// Random starting board: the top `empty_rows` rows stay empty, the rest
    /// are filled with colours drawn uniformly from `1..=colors`, skipping any
    /// colour that would complete a horizontal or vertical run of [`MIN_RUN`]
    /// with the two neighbours already placed. With `colors >= 3` at most two
    /// colours are excluded per cell, so a candidate always exists.
    pub fn generate<R: Rng>(
        rows: usize,
        cols: usize,
        colors: u8,
        empty_rows: usize,
        rng: &mut R,
    ) -> Self {
        let mut board = Self::new(rows, cols);
        for r in empty_rows..rows {
            for c in 0..cols {
                let forbidden_left = (c >= 2
                    && board.cells[r][c - 1] == board.cells[r][c - 2])
                    .then(|| board.cells[r][c - 1]);
                let forbidden_up = (r >= 2 && board.cells[r - 1][c] == board.cells[r - 2][c])
                    .then(|| board.cells[r - 1][c]);
                let candidates: Vec<Cell> = (1..=colors)
                    .filter(|&col| Some(col) != forbidden_left && Some(col) != forbidden_up)
                    .collect();
                board.cells[r][c] = candidates[rng.random_range(0..candidates.len())];
            }
        }
        board
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, cell: Cell) {
        if row < self.rows && col < self.cols {
            self.cells[row][col] = cell;
        }
    }

    /// Iterate rows top to bottom (for rendering).
    pub fn iter_rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.iter().map(Vec::as_slice)
    }

    /// Exchange two cells. Out-of-bounds positions make this a no-op.
    pub fn swap(&mut self, a: Pos, b: Pos) {
        if a.row >= self.rows || a.col >= self.cols || b.row >= self.rows || b.col >= self.cols {
            return;
        }
        let tmp = self.cells[a.row][a.col];
        self.cells[a.row][a.col] = self.cells[b.row][b.col];
        self.cells[b.row][b.col] = tmp;
    }

    /// Number of non-empty cells.
    pub fn fill_count(&self) -> usize {
        self.cells
            .iter()
            .map(|row| row.iter().filter(|&&c| c != 0).count())
            .sum()
    }

    /// True if any cell in the top row is occupied (the loss condition after a rise).
    pub fn top_row_occupied(&self) -> bool {
        self.cells.front().is_some_and(|row| row.iter().any(|&c| c != 0))
    }

    /// All maximal same-colour runs of length >= [`MIN_RUN`], scanned per row
    /// then per column. A cell sitting at a horizontal/vertical crossing
    /// appears in both runs; callers needing a deduplicated set use
    /// [`Board::matched_cells`].
    pub fn find_runs(&self) -> Vec<Run> {
        let mut runs = Vec::new();
        // horizontal
        for r in 0..self.rows {
            let mut c = 0;
            while c < self.cols {
                let color = self.cells[r][c];
                let mut end = c + 1;
                while end < self.cols && self.cells[r][end] == color {
                    end += 1;
                }
                if color != 0 && end - c >= MIN_RUN {
                    runs.push(Run {
                        color,
                        cells: (c..end).map(|cc| Pos::new(r, cc)).collect(),
                    });
                }
                c = end;
            }
        }
        // vertical
        for c in 0..self.cols {
            let mut r = 0;
            while r < self.rows {
                let color = self.cells[r][c];
                let mut end = r + 1;
                while end < self.rows && self.cells[end][c] == color {
                    end += 1;
                }
                if color != 0 && end - r >= MIN_RUN {
                    runs.push(Run {
                        color,
                        cells: (r..end).map(|rr| Pos::new(rr, c)).collect(),
                    });
                }
                r = end;
            }
        }
        runs
    }

    /// Union of all matched cells (each crossing cell counted once).
    pub fn matched_cells(&self) -> HashSet<Pos> {
        self.find_runs()
            .into_iter()
            .flat_map(|run| run.cells)
            .collect()
    }

    /// No run of length >= [`MIN_RUN`] anywhere on the board.
    pub fn is_stable(&self) -> bool {
        self.find_runs().is_empty()
    }

    /// Empty every listed cell.
    pub fn clear_cells<'a>(&mut self, cells: impl IntoIterator<Item = &'a Pos>) {
        for pos in cells {
            self.set(pos.row, pos.col, 0);
        }
    }

    /// Compact each column toward the bottom, preserving the relative order of
    /// its non-empty cells. Single write-cursor pass per column; idempotent.
    pub fn apply_gravity(&mut self) {
        for c in 0..self.cols {
            let mut write = self.rows;
            for r in (0..self.rows).rev() {
                let cell = self.cells[r][c];
                if cell != 0 {
                    write -= 1;
                    if write != r {
                        self.cells[write][c] = cell;
                        self.cells[r][c] = 0;
                    }
                }
            }
            for r in 0..write {
                self.cells[r][c] = 0;
            }
        }
    }

    /// Run the cascade loop (detect, clear, gravity) to completion. Returns
    /// the number of clearing iterations — the chain length; 0 means the
    /// board was already stable.
    pub fn resolve(&mut self) -> u32 {
        let mut chain = 0;
        loop {
            let matched = self.matched_cells();
            if matched.is_empty() {
                return chain;
            }
            self.clear_cells(&matched);
            self.apply_gravity();
            chain += 1;
        }
    }

    /// Staggered cascade: a finite lazy iterator yielding one [`CascadeStep`]
    /// per clearing iteration. The last step's board is the stable board; a
    /// board that is already stable yields nothing.
    pub fn cascade(self) -> Cascade {
        Cascade {
            board: self,
            chain: 0,
        }
    }

    /// Discard the top row, shift everything up and append `new_row` at the
    /// bottom. The caller resolves the result and checks the loss condition.
    pub fn rise(&mut self, new_row: Vec<Cell>) {
        debug_assert_eq!(new_row.len(), self.cols);
        self.cells.pop_front();
        self.cells.push_back(new_row);
    }
}

/// Fresh bottom row for a rise: every cell uniform in `1..=colors`.
/// No run-avoidance here; rises are allowed to land pre-made matches.
pub fn random_row<R: Rng>(cols: usize, colors: u8, rng: &mut R) -> Vec<Cell> {
    (0..cols).map(|_| rng.random_range(1..=colors)).collect()
}

/// Lazy cascade resolution over an owned board. See [`Board::cascade`].
#[derive(Debug, Clone)]
pub struct Cascade {
    board: Board,
    chain: u32,
}

impl Cascade {
    /// The board as of the most recent step (stable once the iterator ends).
    pub fn board(&self) -> &Board {
        &self.board
    }
}

/// One clear+gravity iteration of a staggered cascade.
#[derive(Debug, Clone)]
pub struct CascadeStep {
    /// Snapshot after this step's clear and gravity.
    pub board: Board,
    /// Cells cleared in this step (pre-gravity coordinates).
    pub cleared: HashSet<Pos>,
    /// 1-based chain index.
    pub chain: u32,
}

impl Iterator for Cascade {
    type Item = CascadeStep;

    fn next(&mut self) -> Option<CascadeStep> {
        let matched = self.board.matched_cells();
        if matched.is_empty() {
            return None;
        }
        self.board.clear_cells(&matched);
        self.board.apply_gravity();
        self.chain += 1;
        Some(CascadeStep {
            board: self.board.clone(),
            cleared: matched,
            chain: self.chain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn board_from(rows: &[&[Cell]]) -> Board {
        let mut board = Board::new(rows.len(), rows[0].len());
        for (r, row) in rows.iter().enumerate() {
            for (c, &cell) in row.iter().enumerate() {
                board.set(r, c, cell);
            }
        }
        board
    }

    #[test]
    fn test_horizontal_run_of_three_marks_only_the_run() {
        let board = board_from(&[&[1, 1, 2, 3, 3, 3]]);
        let matched = board.matched_cells();
        assert_eq!(
            matched,
            HashSet::from([Pos::new(0, 3), Pos::new(0, 4), Pos::new(0, 5)])
        );
    }

    #[test]
    fn test_run_of_two_is_not_a_match() {
        let board = board_from(&[&[1, 1, 0, 2, 2, 0]]);
        assert!(board.matched_cells().is_empty());
        assert!(board.is_stable());
    }

    #[test]
    fn test_vertical_run_detected() {
        let board = board_from(&[&[4, 0], &[4, 0], &[4, 2]]);
        let matched = board.matched_cells();
        assert_eq!(
            matched,
            HashSet::from([Pos::new(0, 0), Pos::new(1, 0), Pos::new(2, 0)])
        );
    }

    #[test]
    fn test_crossing_cell_counted_once_in_union() {
        // L shape: horizontal run in row 2 and vertical run in column 0
        // share the corner cell.
        let board = board_from(&[&[1, 0, 0], &[1, 0, 0], &[1, 1, 1]]);
        assert_eq!(board.find_runs().len(), 2);
        assert_eq!(board.matched_cells().len(), 5);
    }

    #[test]
    fn test_empty_cells_break_runs() {
        let board = board_from(&[&[2, 2, 0, 2, 2, 2]]);
        let matched = board.matched_cells();
        assert_eq!(matched.len(), 3);
        assert!(matched.contains(&Pos::new(0, 3)));
        assert!(!matched.contains(&Pos::new(0, 0)));
    }

    #[test]
    fn test_gravity_compacts_column_preserving_order() {
        // Column top-to-bottom [0,0,5,0,2,0] -> [0,0,0,0,5,2].
        let board = board_from(&[&[0], &[0], &[5], &[0], &[2], &[0]]);
        let mut after = board.clone();
        after.apply_gravity();
        let column: Vec<Cell> = (0..6).map(|r| after.get(r, 0).unwrap()).collect();
        assert_eq!(column, vec![0, 0, 0, 0, 5, 2]);
    }

    #[test]
    fn test_gravity_is_idempotent() {
        let mut once = board_from(&[&[1, 0, 3], &[0, 2, 0], &[0, 0, 4]]);
        once.apply_gravity();
        let mut twice = once.clone();
        twice.apply_gravity();
        assert_eq!(once, twice);
    }

    /// Clearing the vertical 2s drops the lone 1 onto the bottom row,
    /// completing a horizontal run of 1s: a two-step chain ending empty.
    fn chain_of_two() -> Board {
        board_from(&[
            &[0, 1, 0],
            &[0, 2, 0],
            &[0, 2, 0],
            &[1, 2, 1],
        ])
    }

    #[test]
    fn test_resolve_reaches_stable_board() {
        let mut resolved = chain_of_two();
        let chain = resolved.resolve();
        assert_eq!(chain, 2);
        assert!(resolved.is_stable());
        assert_eq!(resolved.fill_count(), 0);
    }

    #[test]
    fn test_cascade_fill_strictly_decreases() {
        let board = chain_of_two();
        let mut fill = board.fill_count();
        for step in board.cascade() {
            let next_fill = step.board.fill_count();
            assert!(next_fill < fill);
            fill = next_fill;
        }
    }

    #[test]
    fn test_cascade_last_step_matches_sync_resolve() {
        let board = chain_of_two();
        let mut sync = board.clone();
        let sync_chain = sync.resolve();
        let steps: Vec<CascadeStep> = board.cascade().collect();
        assert_eq!(steps.len() as u32, sync_chain);
        let last = steps.last().unwrap();
        assert_eq!(last.board, sync);
        assert!(last.board.is_stable());
        assert_eq!(last.chain, 2);
    }

    #[test]
    fn test_stable_board_yields_no_cascade_steps() {
        let board = board_from(&[&[1, 2, 1], &[2, 1, 2]]);
        assert!(board.is_stable());
        assert_eq!(board.cascade().count(), 0);
    }

    #[test]
    fn test_generate_has_no_preexisting_match() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let board = Board::generate(12, 6, 5, 6, &mut rng);
            assert!(board.is_stable());
        }
    }

    #[test]
    fn test_generate_leaves_top_rows_empty() {
        let mut rng = StdRng::seed_from_u64(11);
        let board = Board::generate(12, 6, 5, 6, &mut rng);
        for r in 0..6 {
            for c in 0..6 {
                assert_eq!(board.get(r, c), Some(0));
            }
        }
        for c in 0..6 {
            assert_ne!(board.get(11, c), Some(0));
        }
    }

    #[test]
    fn test_generate_with_three_colors_terminates() {
        // Worst case for run-avoidance: only one candidate colour may remain.
        let mut rng = StdRng::seed_from_u64(3);
        let board = Board::generate(12, 6, 3, 0, &mut rng);
        assert!(board.is_stable());
    }

    #[test]
    fn test_swap_then_swap_back_restores_board() {
        let board = board_from(&[&[1, 2, 3], &[4, 5, 1]]);
        let mut swapped = board.clone();
        let a = Pos::new(1, 0);
        let b = Pos::new(1, 1);
        swapped.swap(a, b);
        assert_ne!(swapped, board);
        swapped.swap(a, b);
        assert_eq!(swapped, board);
    }

    #[test]
    fn test_swap_out_of_bounds_is_noop() {
        let board = board_from(&[&[1, 2], &[3, 4]]);
        let mut after = board.clone();
        after.swap(Pos::new(0, 0), Pos::new(0, 9));
        assert_eq!(after, board);
    }

    #[test]
    fn test_rise_shifts_up_and_appends() {
        let mut board = board_from(&[&[0, 0], &[1, 2], &[3, 4]]);
        board.rise(vec![5, 5]);
        assert_eq!(board.get(0, 0), Some(1));
        assert_eq!(board.get(1, 1), Some(4));
        assert_eq!(board.get(2, 0), Some(5));
    }

    #[test]
    fn test_top_row_occupied() {
        let empty_top = board_from(&[&[0, 0], &[1, 2]]);
        assert!(!empty_top.top_row_occupied());
        let full_top = board_from(&[&[0, 3], &[1, 2]]);
        assert!(full_top.top_row_occupied());
    }

    #[test]
    fn test_random_row_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let row = random_row(6, 5, &mut rng);
        assert_eq!(row.len(), 6);
        assert!(row.iter().all(|&c| (1..=5).contains(&c)));
    }

    #[test]
    fn test_clone_is_deep() {
        let board = board_from(&[&[1, 2], &[3, 4]]);
        let mut copy = board.clone();
        copy.set(0, 0, 9);
        assert_eq!(board.get(0, 0), Some(1));
    }
}
