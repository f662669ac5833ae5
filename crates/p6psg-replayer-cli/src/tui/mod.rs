//! Ratatui-based terminal UI for PSG playback.
//!
//! The UI is a pure observer: it sits on the driver's sink fanout, keeps
//! its own 16-byte register shadow plus the last note event per voice, and
//! renders at ~30 fps while the host loop ticks the driver at 500 Hz.
//! Nothing flows back into the core.

use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use p6psg_core::registers::{noise_bit, tone_bit};
use p6psg_core::{BackendSink, DriverSink, Fanout, NoteEvent, NullBackend, PsgDriver};
use p6psg_loader::Song;

use crate::host::TickScheduler;

/// PSG master clock on the PC-6001 (Hz); used only for the Hz display.
const MASTER_CLOCK_HZ: f64 = 2_000_000.0;

/// Render interval (about 30 fps).
const RENDER_PERIOD: Duration = Duration::from_millis(33);

const NOTE_NAMES: [&str; 13] = [
    "--", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Register shadow and note display state fed from the driver's sink.
#[derive(Default)]
pub struct UiState {
    regs: [u8; 16],
    notes: [Option<NoteEvent>; 3],
}

impl DriverSink for UiState {
    fn write_reg(&mut self, reg: u8, val: u8) {
        if let Some(slot) = self.regs.get_mut(reg as usize) {
            *slot = val;
        }
    }

    fn note_event(&mut self, event: &NoteEvent) {
        if let Some(slot) = self.notes.get_mut(event.channel as usize) {
            *slot = Some(*event);
        }
    }
}

impl UiState {
    /// Current 12-bit tone period for a voice, from the shadow.
    fn period(&self, ch: usize) -> u16 {
        let fine = self.regs[ch * 2] as u16;
        let coarse = (self.regs[ch * 2 + 1] as u16 & 0x0F) << 8;
        coarse | fine
    }

    /// Tone frequency in Hz, or 0.0 when the period is zero.
    fn frequency(&self, ch: usize) -> f64 {
        let period = self.period(ch);
        if period == 0 {
            return 0.0;
        }
        MASTER_CLOCK_HZ / (16.0 * period as f64)
    }

    /// Amplitude register value for a voice (0..=15).
    fn volume(&self, ch: usize) -> u8 {
        self.regs[8 + ch] & 0x0F
    }

    /// "C#5"-style label for the last note on a voice, "--" for silence.
    fn note_label(&self, ch: usize) -> String {
        match &self.notes[ch] {
            Some(ev) if !ev.is_rest && ev.note >= 1 && ev.note <= 12 => {
                format!("{}{}", NOTE_NAMES[ev.note as usize], ev.octave)
            }
            _ => "--".to_string(),
        }
    }
}

/// Play a song under the terminal UI. Returns when the song ends or the
/// user quits.
pub fn run(song: &Song, title: &str, debug: bool) -> io::Result<()> {
    let mut driver = PsgDriver::new();
    driver.set_debug(debug);
    let mut sink = Fanout::new(BackendSink::new(NullBackend), UiState::default());
    driver.init(&mut sink);
    for ch in 0..3 {
        driver.set_channel_data(ch, song.channel(ch));
    }
    driver.start();

    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let result = run_loop(&mut terminal, &mut driver, &mut sink, title);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    driver: &mut PsgDriver,
    sink: &mut Fanout<BackendSink<NullBackend>, UiState>,
    title: &str,
) -> io::Result<()> {
    let mut scheduler = TickScheduler::new(Instant::now());
    let mut paused = false;
    let mut last_render: Option<Instant> = None;

    while driver.is_playing() {
        // The 1 ms poll doubles as the tick sleep; the scheduler corrects
        // for however late it returns.
        if event::poll(Duration::from_millis(1))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        KeyCode::Char('c')
                            if key.modifiers.contains(KeyModifiers::CONTROL) =>
                        {
                            break;
                        }
                        KeyCode::Char(' ') => {
                            paused = !paused;
                            if !paused {
                                scheduler.resync(Instant::now());
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        let now = Instant::now();
        if !paused {
            for _ in 0..scheduler.due_ticks(now) {
                driver.tick(sink);
            }
        }

        if last_render.is_none_or(|at| now.duration_since(at) >= RENDER_PERIOD) {
            terminal.draw(|frame| draw(frame, driver, &sink.secondary, title, paused))?;
            last_render = Some(now);
        }
    }

    driver.stop(sink);
    Ok(())
}

fn draw(frame: &mut Frame, driver: &PsgDriver, ui: &UiState, title: &str, paused: bool) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Length(4),
            Constraint::Length(1),
        ])
        .split(frame.area());

    frame.render_widget(header(driver, title, paused), chunks[0]);
    frame.render_widget(voices(driver, ui), chunks[1]);
    frame.render_widget(register_panel(ui), chunks[2]);
    frame.render_widget(
        Paragraph::new("[q] quit   [space] pause").dim(),
        chunks[3],
    );
}

fn header(driver: &PsgDriver, title: &str, paused: bool) -> Paragraph<'static> {
    let bpm = driver.bpm_x10();
    let elapsed = driver.tick_count() as f64 * 0.002;
    let state = if paused { "PAUSED" } else { "PLAYING" };
    let line = Line::from(vec![
        Span::styled(title.to_string(), Style::default().fg(Color::Cyan).bold()),
        Span::raw(format!(
            "   bpm={}.{}   t={:6.1}s   ",
            bpm / 10,
            bpm % 10,
            elapsed
        )),
        Span::styled(state.to_string(), Style::default().fg(Color::Yellow)),
    ]);
    Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" P6 PSG Player "),
    )
}

fn voices(driver: &PsgDriver, ui: &UiState) -> Paragraph<'static> {
    let reg7 = driver.reg7_value();
    let mut lines = Vec::with_capacity(3);
    for ch in 0..3 {
        let volume = ui.volume(ch);
        let freq = ui.frequency(ch);
        let freq_text = if freq > 0.0 && volume > 0 {
            format!("{freq:7.1} Hz")
        } else {
            "    --- Hz".to_string()
        };
        let bar: String = "#".repeat(volume as usize);
        let tone_on = reg7 & tone_bit(ch) == 0;
        let noise_on = reg7 & noise_bit(ch) == 0;
        lines.push(Line::from(vec![
            Span::styled(
                format!(" {} ", ["A", "B", "C"][ch]),
                Style::default().fg(Color::Green).bold(),
            ),
            Span::raw(format!("{:<4}", ui.note_label(ch))),
            Span::raw(format!("{freq_text}  vol {volume:2} ")),
            Span::styled(format!("{bar:<15}"), Style::default().fg(Color::Magenta)),
            Span::raw(format!(
                "  tone {}  noise {}",
                if tone_on { "ON " } else { "off" },
                if noise_on { "ON " } else { "off" },
            )),
        ]));
    }
    Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Voices "))
}

fn register_panel(ui: &UiState) -> Paragraph<'static> {
    let row = |range: std::ops::Range<usize>| -> Line<'static> {
        let mut spans = Vec::new();
        for reg in range {
            spans.push(Span::styled(
                format!(" R{reg:X}"),
                Style::default().fg(Color::DarkGray),
            ));
            spans.push(Span::raw(format!(" {:02X} ", ui.regs[reg])));
        }
        Line::from(spans)
    };
    Paragraph::new(vec![row(0..8), row(8..16)])
        .block(Block::default().borders(Borders::ALL).title(" Registers "))
}
