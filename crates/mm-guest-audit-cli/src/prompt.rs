//! Password acquisition for username/password authentication.

use std::io::{self, IsTerminal, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::config::{ConfigError, ENV_PASSWORD};

/// Prompt on the terminal without echo, or fall back to `MM_PASSWORD`.
///
/// # Errors
///
/// Returns [`ConfigError::PasswordRequired`] when stdin is not a terminal
/// and `MM_PASSWORD` is unset or empty, or [`ConfigError::PasswordPrompt`]
/// if reading from the terminal fails.
pub fn obtain_password(env: impl Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
    if io::stdin().is_terminal() {
        return read_password("Password: ").map_err(ConfigError::PasswordPrompt);
    }
    password_from_env(env)
}

fn password_from_env(env: impl Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
    env(ENV_PASSWORD)
        .filter(|password| !password.is_empty())
        .ok_or(ConfigError::PasswordRequired)
}

/// Read a line from the terminal in raw mode so keystrokes are not echoed.
fn read_password(prompt: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;

    terminal::enable_raw_mode()?;
    let result = read_keys();
    let restored = terminal::disable_raw_mode();
    writeln!(stderr)?;

    let password = result?;
    restored?;
    Ok(password)
}

fn read_keys() -> io::Result<String> {
    let mut password = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        match apply_key(&mut password, key) {
            KeyOutcome::Continue => {}
            KeyOutcome::Done => return Ok(password),
            KeyOutcome::Cancelled => {
                return Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "password entry cancelled",
                ));
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Done,
    Cancelled,
}

fn apply_key(password: &mut String, key: KeyEvent) -> KeyOutcome {
    match key.code {
        KeyCode::Enter => KeyOutcome::Done,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            KeyOutcome::Cancelled
        }
        KeyCode::Esc => KeyOutcome::Cancelled,
        KeyCode::Backspace => {
            password.pop();
            KeyOutcome::Continue
        }
        KeyCode::Char(c) => {
            password.push(c);
            KeyOutcome::Continue
        }
        _ => KeyOutcome::Continue,
    }
}
