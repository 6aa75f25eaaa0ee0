//! Layout and drawing: menu, board, cursor, sidebar, pause, game over.

use crate::app::{QuitOption, Screen};
use crate::board::Pos;
use crate::game::GameState;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Each tile is 2 terminal cells wide and 1 high.
const TILE_W: u16 = 2;
const TILE_H: u16 = 1;

const SIDEBAR_WIDTH: u16 = 22;

/// Duration of the cascade-step fade (TachyonFX).
const CASCADE_FADE_MS: u32 = 220;

/// Board size in terminal cells including the border.
fn board_pixel_size(rows: u16, cols: u16) -> (u16, u16) {
    (cols * TILE_W + 2, rows * TILE_H + 2)
}

/// Board and sidebar rects from the centering layout. Drawing and mouse
/// hit-testing both go through this split; computing it twice with
/// different arithmetic would disagree whenever the leftover width or
/// height is odd.
fn game_areas(area: Rect, rows: u16, cols: u16) -> (Rect, Rect) {
    let (bw, bh) = board_pixel_size(rows, cols);
    let total_w = bw + SIDEBAR_WIDTH;
    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(bh),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(bw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);
    (inner[0], inner[1])
}

/// Inner board rect (tiles only, no border); the mouse handler uses this
/// to map clicks to cells.
pub fn board_inner_rect(area: Rect, rows: usize, cols: usize) -> Rect {
    let (board_area, _) = game_areas(area, rows as u16, cols as u16);
    Block::default().borders(Borders::ALL).inner(board_area)
}

/// Map a terminal position to a board cell, if it falls inside the board.
pub fn cell_at(board_rect: Rect, x: u16, y: u16) -> Option<(usize, usize)> {
    if !board_rect.contains(Position::new(x, y)) {
        return None;
    }
    let col = ((x - board_rect.x) / TILE_W) as usize;
    let row = ((y - board_rect.y) / TILE_H) as usize;
    Some((row, col))
}

/// Build set of buffer (x, y) positions covered by the cleared cells.
fn cleared_buffer_positions(board_rect: Rect, cleared: &[Pos]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for pos in cleared {
        let x0 = board_rect.x + (pos.col as u16) * TILE_W;
        let y0 = board_rect.y + (pos.row as u16) * TILE_H;
        for bx in x0..(x0 + TILE_W).min(board_rect.x + board_rect.width) {
            for by in y0..(y0 + TILE_H).min(board_rect.y + board_rect.height) {
                set.insert((bx, by));
            }
        }
    }
    set
}

/// Create or update the cascade fade effect and process it (fade the cells
/// cleared by the latest cascade step to the background colour).
fn apply_cascade_effect(
    frame: &mut Frame,
    theme: &Theme,
    board_rect: Rect,
    cleared: &[Pos],
    effect: &mut Option<Effect>,
    process_time: &mut Option<Instant>,
    now: Instant,
) {
    let delta = process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    let tfx_delta = TfxDuration::from_millis(delta_ms);
    *process_time = Some(now);

    if effect.is_none() {
        let cleared_set = cleared_buffer_positions(board_rect, cleared);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            cleared_set.contains(&(pos.x, pos.y))
        }));
        let bg = theme.bg;
        *effect = Some(
            fx::fade_to(bg, bg, (CASCADE_FADE_MS, Interpolation::Linear))
                .with_filter(filter)
                .with_area(board_rect),
        );
    }

    if let Some(effect) = effect {
        frame.render_effect(effect, board_rect, tfx_delta);
    }
}

/// Draw the current screen. `rise_ratio` is the fraction of the rise interval
/// elapsed (drives the pressure gauge); `cleared` holds the cells of the most
/// recent cascade step for the fade effect.
pub fn draw(
    frame: &mut Frame,
    screen: Screen,
    state: &GameState,
    theme: &Theme,
    paused: bool,
    area: Rect,
    rise_ratio: f64,
    cascade_effect: &mut Option<Effect>,
    cascade_effect_time: &mut Option<Instant>,
    cleared: &[Pos],
    now: Instant,
    quit_selected: Option<QuitOption>,
) {
    match screen {
        Screen::Menu => draw_menu(frame, theme, area),
        Screen::Playing => {
            draw_game(frame, state, theme, area, rise_ratio);
            if paused {
                draw_pause_overlay(frame, theme, area);
            }
            if !cleared.is_empty() {
                let board_rect = board_inner_rect(area, state.board.rows(), state.board.cols());
                apply_cascade_effect(
                    frame,
                    theme,
                    board_rect,
                    cleared,
                    cascade_effect,
                    cascade_effect_time,
                    now,
                );
            }
        }
        Screen::QuitMenu => {
            draw_game(frame, state, theme, area, rise_ratio);
            if let Some(opt) = quit_selected {
                draw_quit_menu(frame, theme, opt);
            }
        }
        Screen::GameOver => {
            draw_game(frame, state, theme, area, rise_ratio);
            draw_game_over(frame, state, theme, area);
        }
    }
}

fn draw_menu(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup_w = 44u16;
    let popup_h = 14u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };

    let title = Line::from(vec![
        Span::styled(" Panel ", Style::default().fg(theme.tiles[0]).bold()),
        Span::styled(" tui ", Style::default().fg(theme.main_fg).bold()),
    ]);
    let lines = vec![
        Line::from(""),
        title,
        Line::from(""),
        Line::from(Span::styled(
            "Swap tiles. Match three. Outlast the rise.",
            Style::default().fg(theme.inactive_fg),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(" ARROWS / hjkl ", Style::default().fg(theme.tiles[3])),
            Span::from("move cursor"),
        ]),
        Line::from(vec![
            Span::styled(" ENTER / SPACE ", Style::default().fg(theme.tiles[3])),
            Span::from("swap pair  "),
        ]),
        Line::from(vec![
            Span::styled("     CLICK     ", Style::default().fg(theme.tiles[3])),
            Span::from("place cursor"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " [ ENTER ] START ",
            Style::default().fg(Color::Black).bg(theme.title).bold(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " [Q] QUIT ",
            Style::default().fg(Color::Rgb(255, 80, 80)),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_game(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect, rise_ratio: f64) {
    let (board_area, sidebar_area) =
        game_areas(area, state.board.rows() as u16, state.board.cols() as u16);
    draw_board(frame, state, theme, board_area);
    draw_sidebar(frame, state, theme, sidebar_area, rise_ratio);
}

fn draw_board(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" Paneltui ", Style::default().fg(theme.title)));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let buf = frame.buffer_mut();
    for (r, row) in state.board.iter_rows().enumerate() {
        for (c, &cell) in row.iter().enumerate() {
            let color = if cell == 0 {
                theme.bg
            } else {
                theme.tile_color(cell)
            };
            let rx = inner.x + (c as u16) * TILE_W;
            let ry = inner.y + (r as u16) * TILE_H;
            for dx in 0..TILE_W {
                let x = rx + dx;
                if x < inner.x + inner.width && ry < inner.y + inner.height {
                    buf[(x, ry)]
                        .set_symbol(" ")
                        .set_style(Style::default().bg(color));
                }
            }
        }
    }

    // Cursor brackets around the selected pair: [ab cd ]
    let cur = state.cursor;
    let cy = inner.y + (cur.row as u16) * TILE_H;
    let left = inner.x + (cur.col as u16) * TILE_W;
    let right = inner.x + (cur.col as u16 + 2) * TILE_W - 1;
    let bracket = Style::default().fg(theme.title).bold();
    if left < inner.x + inner.width && cy < inner.y + inner.height {
        buf[(left, cy)].set_symbol("[").set_style(
            bracket.bg(cell_bg(state, theme, cur.row, cur.col)),
        );
    }
    if right < inner.x + inner.width && cy < inner.y + inner.height {
        buf[(right, cy)].set_symbol("]").set_style(
            bracket.bg(cell_bg(state, theme, cur.row, cur.col + 1)),
        );
    }
}

fn cell_bg(state: &GameState, theme: &Theme, row: usize, col: usize) -> Color {
    match state.board.get(row, col) {
        Some(cell) if cell != 0 => theme.tile_color(cell),
        _ => theme.bg,
    }
}

fn draw_sidebar(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect, rise_ratio: f64) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Stats (border + score, chain, rises)
            Constraint::Length(1), // gap
            Constraint::Length(4), // Rise gauge
            Constraint::Length(1), // gap
            Constraint::Length(4), // Colours strip
        ])
        .split(area);

    // --- Stats ---
    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let stats_inner = stats_block.inner(chunks[0]);
    stats_block.render(chunks[0], frame.buffer_mut());
    let stats_lines = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(state.score.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Chain: ", title_style),
            Span::styled(format!("x{}", state.max_chain.max(1)), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Rises: ", title_style),
            Span::styled(state.rises.to_string(), fg_style),
        ]),
    ];
    Paragraph::new(ratatui::text::Text::from(stats_lines))
        .render(stats_inner, frame.buffer_mut());

    // --- Rise pressure gauge ---
    let rise_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let rise_inner = rise_block.inner(chunks[2]);
    rise_block.render(chunks[2], frame.buffer_mut());
    let rise_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(rise_inner);
    Paragraph::new(Line::from(Span::styled("Next rise", title_style)))
        .render(rise_layout[0], frame.buffer_mut());
    let ratio = rise_ratio.clamp(0.0, 1.0);
    let bar_color = if ratio < 0.5 {
        Color::Green
    } else if ratio < 0.8 {
        Color::Yellow
    } else {
        Color::Red
    };
    Gauge::default()
        .ratio(ratio)
        .gauge_style(Style::default().fg(bar_color))
        .label("")
        .render(rise_layout[1], frame.buffer_mut());

    // --- Colours in play ---
    let colours_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let colours_inner = colours_block.inner(chunks[4]);
    colours_block.render(chunks[4], frame.buffer_mut());
    let colours_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(colours_inner);
    Paragraph::new(Line::from(Span::styled("Colours", title_style)))
        .render(colours_layout[0], frame.buffer_mut());
    let strip: Vec<Span> = (1..=state.colors())
        .map(|i| Span::styled("██", Style::default().fg(theme.tile_color(i))))
        .collect();
    Paragraph::new(Line::from(strip)).render(colours_layout[1], frame.buffer_mut());
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
            " P — Resume    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let popup_w = 36u16;
    let popup_h = 9u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " The stack reached the top ",
            Style::default().fg(Color::Black).bg(theme.tiles[0]).bold(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("Score ", Style::default().fg(theme.title)),
            Span::styled(state.score.to_string(), Style::default().fg(theme.main_fg)),
            Span::styled("   Best chain x", Style::default().fg(theme.title)),
            Span::styled(
                state.max_chain.max(1).to_string(),
                Style::default().fg(theme.main_fg),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " R — Restart    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let area = frame.area();
    let popup_w = 26u16;
    let popup_h = 7u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let entry = |label: &str, this: QuitOption| {
        if this == selected {
            Line::from(Span::styled(
                format!("> {label} <"),
                Style::default().fg(Color::Black).bg(theme.title).bold(),
            ))
        } else {
            Line::from(Span::styled(
                label.to_string(),
                Style::default().fg(theme.main_fg),
            ))
        }
    };
    let lines = vec![
        Line::from(""),
        entry("Resume", QuitOption::Resume),
        entry("Main menu", QuitOption::MainMenu),
        entry("Exit", QuitOption::Exit),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Re-derive the board placement with the raw Fill/Length/Fill splits
    /// the game screen renders with. Must stay equal to what the mouse
    /// handler uses, including areas where the leftover width or height
    /// is odd and the two Fill sides get unequal shares.
    fn drawn_board_inner(area: Rect, rows: u16, cols: u16) -> Rect {
        let (bw, bh) = board_pixel_size(rows, cols);
        let horiz = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Fill(1),
                Constraint::Length(bw + SIDEBAR_WIDTH),
                Constraint::Fill(1),
            ])
            .split(area);
        let vert = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Fill(1),
                Constraint::Length(bh),
                Constraint::Fill(1),
            ])
            .split(horiz[1]);
        let board_area = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(bw), Constraint::Length(SIDEBAR_WIDTH)])
            .split(vert[1])[0];
        Block::default().borders(Borders::ALL).inner(board_area)
    }

    #[test]
    fn test_hit_rect_matches_drawn_board_at_odd_remainders() {
        for (w, h) in [(39, 15), (40, 15), (39, 16), (80, 24), (120, 40)] {
            let area = Rect::new(0, 0, w, h);
            assert_eq!(
                board_inner_rect(area, 12, 6),
                drawn_board_inner(area, 12, 6),
                "area {w}x{h}"
            );
        }
    }

    #[test]
    fn test_cell_at_maps_board_corners() {
        let area = Rect::new(0, 0, 39, 15);
        let rect = board_inner_rect(area, 12, 6);
        assert_eq!(rect.width, 6 * TILE_W);
        assert_eq!(rect.height, 12 * TILE_H);
        assert_eq!(cell_at(rect, rect.x, rect.y), Some((0, 0)));
        assert_eq!(
            cell_at(rect, rect.x + rect.width - 1, rect.y + rect.height - 1),
            Some((11, 5))
        );
        // One cell left of the board is the border, not a tile.
        assert_eq!(cell_at(rect, rect.x - 1, rect.y), None);
    }
}
