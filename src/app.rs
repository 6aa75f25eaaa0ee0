//! App: terminal init, main loop, rise timer, cascade pacing, key handling.

use crate::board::Pos;
use crate::game::{Event, GameState};
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::{Args, GameConfig};
use anyhow::Result;
use crossterm::event::{
    self, Event as TermEvent, KeyCode, KeyEventKind, MouseButton, MouseEventKind,
};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

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

/// Owned rise schedule: an explicit deadline instead of ambient timer state,
/// so cancelling on loss or teardown is deterministic.
#[derive(Debug)]
struct RiseTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl RiseTimer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }

    fn due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    /// Fraction of the interval elapsed (0.0 just armed, 1.0 due).
    fn ratio(&self, now: Instant) -> f64 {
        match self.deadline {
            Some(d) => {
                let remaining = d.saturating_duration_since(now);
                1.0 - remaining.as_secs_f64() / self.interval.as_secs_f64()
            }
            None => 0.0,
        }
    }
}

pub struct App {
    args: Args,
    config: GameConfig,
    theme: Theme,
    state: GameState,
    screen: Screen,
    paused: bool,
    quit_selected: QuitOption,
    rise_timer: RiseTimer,
    /// When the next staggered cascade frame should be pulled.
    next_cascade_step: Option<Instant>,
    /// Cells cleared by the latest cascade step (drives the fade effect).
    last_cleared: Vec<Pos>,
    cascade_effect: Option<Effect>,
    cascade_effect_time: Option<Instant>,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Result<Self> {
        let state = GameState::new(&config);
        let screen = if args.no_menu {
            Screen::Playing
        } else {
            Screen::Menu
        };
        let rise_timer = RiseTimer::new(Duration::from_millis(config.rise_interval_ms));
        let mut app = Self {
            args,
            config,
            theme,
            state,
            screen,
            paused: false,
            quit_selected: QuitOption::Resume,
            rise_timer,
            next_cascade_step: None,
            last_cleared: Vec::new(),
            cascade_effect: None,
            cascade_effect_time: None,
        };
        if app.screen == Screen::Playing {
            app.start_game(Instant::now());
        }
        Ok(app)
    }

    fn start_game(&mut self, now: Instant) {
        self.state.apply(Event::Start);
        self.screen = Screen::Playing;
        self.paused = false;
        self.rise_timer.arm(now);
        self.next_cascade_step = None;
        self.last_cleared.clear();
        self.cascade_effect = None;
        self.cascade_effect_time = None;
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::MoveLeft => self.state.apply(Event::MoveLeft),
            Action::MoveRight => self.state.apply(Event::MoveRight),
            Action::MoveUp => self.state.apply(Event::MoveUp),
            Action::MoveDown => self.state.apply(Event::MoveDown),
            Action::Swap => {
                self.state.apply(Event::Swap);
                self.schedule_cascade(Instant::now());
            }
            Action::Pause | Action::Quit | Action::None => {}
        }
    }

    /// Start pacing frames if the last mutation left a cascade in flight.
    fn schedule_cascade(&mut self, now: Instant) {
        if self.state.cascade_in_progress() && self.next_cascade_step.is_none() {
            self.next_cascade_step = Some(now + Duration::from_millis(self.config.cascade_step_ms));
        }
    }

    /// Pull due cascade frames and react to the session ending (a rise that
    /// pushed tiles past the top only reports after its cascade settles).
    fn tick_cascade(&mut self, now: Instant) {
        if let Some(due) = self.next_cascade_step {
            if now >= due {
                match self.state.advance_cascade() {
                    Some(step) => {
                        self.last_cleared = step.cleared.into_iter().collect();
                        self.cascade_effect = None;
                        self.cascade_effect_time = None;
                        self.next_cascade_step =
                            Some(now + Duration::from_millis(self.config.cascade_step_ms));
                    }
                    None => {
                        self.next_cascade_step = None;
                    }
                }
            }
        }
        if !self.state.running && self.screen == Screen::Playing {
            self.rise_timer.cancel();
            self.screen = Screen::GameOver;
        }
    }

    fn tick_rise(&mut self, now: Instant) {
        if !self.rise_timer.due(now) {
            return;
        }
        if self.state.cascade_in_progress() {
            // Hold the rise until the board settles; re-check next frame.
            return;
        }
        self.state.apply(Event::Rise);
        self.rise_timer.arm(now);
        self.schedule_cascade(now);
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.args.frame_rate.max(1.0));
        loop {
            let now = Instant::now();
            let rise_ratio = if self.screen == Screen::Playing && !self.paused {
                self.rise_timer.ratio(now)
            } else {
                0.0
            };
            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    self.screen,
                    &self.state,
                    &self.theme,
                    self.paused,
                    f.area(),
                    rise_ratio,
                    &mut self.cascade_effect,
                    &mut self.cascade_effect_time,
                    &self.last_cleared,
                    now,
                    (self.screen == Screen::QuitMenu).then_some(self.quit_selected),
                )
            })?;

            // Drop the fade state once the effect has finished.
            if self.cascade_effect.as_ref().is_some_and(Effect::done) {
                self.cascade_effect = None;
                self.cascade_effect_time = None;
                self.last_cleared.clear();
            }

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        TermEvent::Key(key) => {
                            if key.kind != KeyEventKind::Press {
                                continue;
                            }
                            if self.handle_key(key)? {
                                return Ok(());
                            }
                        }
                        TermEvent::Mouse(mouse) => {
                            if self.screen == Screen::Playing
                                && !self.paused
                                && mouse.kind == MouseEventKind::Down(MouseButton::Left)
                            {
                                let area = terminal.get_frame().area();
                                let rect = crate::ui::board_inner_rect(
                                    area,
                                    self.state.board.rows(),
                                    self.state.board.cols(),
                                );
                                if let Some((row, col)) =
                                    crate::ui::cell_at(rect, mouse.column, mouse.row)
                                {
                                    self.state.apply(Event::PointTo { row, col });
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }

            if self.screen == Screen::Playing && !self.paused {
                let now = Instant::now();
                self.tick_cascade(now);
                if self.screen == Screen::Playing {
                    self.tick_rise(now);
                    self.tick_cascade(now);
                }
            }
        }
    }

    /// Returns Ok(true) when the app should exit.
    fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> Result<bool> {
        let action = key_to_action(key);
        match self.screen {
            Screen::Menu => match action {
                Action::Quit => return Ok(true),
                Action::Swap => self.start_game(Instant::now()),
                _ => {}
            },
            Screen::Playing => {
                if self.paused {
                    match action {
                        Action::Pause => {
                            self.paused = false;
                            // A deadline that lapsed while paused would fire
                            // instantly; give the player a fresh interval.
                            self.rise_timer.arm(Instant::now());
                        }
                        Action::Quit => {
                            self.screen = Screen::QuitMenu;
                            self.quit_selected = QuitOption::Resume;
                        }
                        _ => {}
                    }
                } else {
                    match action {
                        Action::Pause => self.paused = true,
                        Action::Quit => {
                            self.screen = Screen::QuitMenu;
                            self.quit_selected = QuitOption::Resume;
                        }
                        _ => self.apply_action(action),
                    }
                }
            }
            Screen::QuitMenu => match action {
                Action::MoveDown | Action::MoveRight => {
                    self.quit_selected = match self.quit_selected {
                        QuitOption::Resume => QuitOption::MainMenu,
                        QuitOption::MainMenu => QuitOption::Exit,
                        QuitOption::Exit => QuitOption::Resume,
                    };
                }
                Action::MoveUp | Action::MoveLeft => {
                    self.quit_selected = match self.quit_selected {
                        QuitOption::Resume => QuitOption::Exit,
                        QuitOption::MainMenu => QuitOption::Resume,
                        QuitOption::Exit => QuitOption::MainMenu,
                    };
                }
                Action::Swap => match self.quit_selected {
                    QuitOption::Resume => {
                        self.screen = Screen::Playing;
                        self.rise_timer.arm(Instant::now());
                    }
                    QuitOption::MainMenu => {
                        self.rise_timer.cancel();
                        self.screen = Screen::Menu;
                    }
                    QuitOption::Exit => return Ok(true),
                },
                Action::Pause | Action::Quit => {
                    self.screen = Screen::Playing;
                    self.rise_timer.arm(Instant::now());
                }
                _ => {}
            },
            Screen::GameOver => {
                if action == Action::Quit {
                    return Ok(true);
                }
                if matches!(key.code, KeyCode::Char('r') | KeyCode::Char('R')) {
                    self.start_game(Instant::now());
                }
            }
        }
        Ok(false)
    }
}
