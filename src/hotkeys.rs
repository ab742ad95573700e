//! Keyboard hotkey listener: a background thread that polls for single-key
//! commands and applies them to the shared stream configuration.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::config::{Preset, SharedConfig, QUALITY_STEP, WIDTH_STEP};

pub const HOTKEY_LEGEND: &str =
    "[1]=smooth  [2]=sharp  +/- fps  ]/[ quality  0/9 width  q=quit";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A single-key command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyCommand {
    PresetSmooth,
    PresetSharp,
    FpsUp,
    FpsDown,
    QualityUp,
    QualityDown,
    WidthUp,
    WidthDown,
    Quit,
}

impl HotkeyCommand {
    /// Map a key to its command. Unmapped keys return `None` and are
    /// ignored by the listener.
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            '1' => Some(HotkeyCommand::PresetSmooth),
            '2' => Some(HotkeyCommand::PresetSharp),
            '+' => Some(HotkeyCommand::FpsUp),
            '-' => Some(HotkeyCommand::FpsDown),
            ']' => Some(HotkeyCommand::QualityUp),
            '[' => Some(HotkeyCommand::QualityDown),
            '0' => Some(HotkeyCommand::WidthUp),
            '9' => Some(HotkeyCommand::WidthDown),
            'q' | 'Q' => Some(HotkeyCommand::Quit),
            _ => None,
        }
    }
}

/// One poll of a key input.
pub enum KeyPoll {
    Key(char),
    /// Nothing pending; poll again.
    Idle,
    /// The input is closed for good.
    Eof,
}

/// A source of command keys the listener can poll.
pub trait KeyInput: Send {
    fn next_key(&mut self) -> io::Result<KeyPoll>;
}

/// Single-key reads from a TTY via crossterm raw mode.
pub struct RawKeys;

impl RawKeys {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawKeys)
    }
}

impl KeyInput for RawKeys {
    fn next_key(&mut self) -> io::Result<KeyPoll> {
        if !event::poll(POLL_INTERVAL)? {
            return Ok(KeyPoll::Idle);
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                return Ok(KeyPoll::Idle);
            }
            // Raw mode swallows SIGINT; treat Ctrl+C as quit.
            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                return Ok(KeyPoll::Key('q'));
            }
            if let KeyCode::Char(c) = key.code {
                return Ok(KeyPoll::Key(c));
            }
        }
        Ok(KeyPoll::Idle)
    }
}

impl Drop for RawKeys {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Line-buffered fallback for non-TTY stdin: the first character of each
/// line is the command key.
pub struct LineKeys {
    lines: io::Lines<io::BufReader<io::Stdin>>,
}

impl LineKeys {
    pub fn new() -> Self {
        LineKeys {
            lines: io::BufReader::new(io::stdin()).lines(),
        }
    }
}

impl KeyInput for LineKeys {
    fn next_key(&mut self) -> io::Result<KeyPoll> {
        match self.lines.next() {
            Some(Ok(line)) => Ok(line
                .chars()
                .next()
                .map(KeyPoll::Key)
                .unwrap_or(KeyPoll::Idle)),
            Some(Err(e)) => Err(e),
            None => Ok(KeyPoll::Eof),
        }
    }
}

/// Background thread polling a [`KeyInput`] and applying commands.
pub struct HotkeyListener {
    handle: thread::JoinHandle<()>,
}

impl HotkeyListener {
    pub fn spawn(
        mut input: Box<dyn KeyInput>,
        config: SharedConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        let handle = thread::spawn(move || {
            if let Err(e) = listen_loop(input.as_mut(), &config, &running) {
                log::warn!("hotkey listener stopped: {}", e);
            }
        });
        HotkeyListener { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

fn listen_loop(
    input: &mut dyn KeyInput,
    config: &SharedConfig,
    running: &AtomicBool,
) -> io::Result<()> {
    while running.load(Ordering::Relaxed) {
        match input.next_key()? {
            KeyPoll::Key(key) => {
                let Some(cmd) = HotkeyCommand::from_key(key) else {
                    continue;
                };
                if apply_command(cmd, config) {
                    running.store(false, Ordering::Relaxed);
                    break;
                }
            }
            KeyPoll::Idle => {}
            KeyPoll::Eof => break,
        }
    }
    Ok(())
}

/// Apply a command to the shared config, announcing the new value.
/// Returns true when the command is a quit.
pub fn apply_command(cmd: HotkeyCommand, config: &SharedConfig) -> bool {
    match cmd {
        HotkeyCommand::PresetSmooth => {
            let cfg = config.apply_preset(Preset::Smooth);
            println!(
                "-> preset smooth (fps={} quality={} max_width={})",
                cfg.fps, cfg.jpeg_quality, cfg.max_width
            );
        }
        HotkeyCommand::PresetSharp => {
            let cfg = config.apply_preset(Preset::Sharp);
            println!(
                "-> preset sharp (fps={} quality={} max_width={})",
                cfg.fps, cfg.jpeg_quality, cfg.max_width
            );
        }
        HotkeyCommand::FpsUp => println!("-> fps={}", config.adjust_fps(1.0)),
        HotkeyCommand::FpsDown => println!("-> fps={}", config.adjust_fps(-1.0)),
        HotkeyCommand::QualityUp => println!("-> quality={}", config.adjust_quality(QUALITY_STEP)),
        HotkeyCommand::QualityDown => {
            println!("-> quality={}", config.adjust_quality(-QUALITY_STEP))
        }
        HotkeyCommand::WidthUp => println!("-> max_width={}", config.adjust_max_width(WIDTH_STEP)),
        HotkeyCommand::WidthDown => {
            println!("-> max_width={}", config.adjust_max_width(-WIDTH_STEP))
        }
        HotkeyCommand::Quit => {
            println!("-> quitting");
            return true;
        }
    }
    false
}

/// Best-effort terminal cleanup for exit paths where the raw-mode guard may
/// still be alive on the listener thread.
pub fn restore_terminal() {
    let _ = terminal::disable_raw_mode();
}
