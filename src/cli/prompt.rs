//! Interactive prompts for command-line flows

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

/// Print `label` and read one line from stdin.
pub fn line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read input")?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

/// Apply one key press to a hidden input buffer. Returns `Some(done)` when the
/// prompt ends: `true` on Enter, `false` on cancel.
fn apply_key(buf: &mut String, key: KeyEvent) -> Option<bool> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Enter => Some(true),
        KeyCode::Esc => Some(false),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(false),
        KeyCode::Backspace => {
            buf.pop();
            None
        }
        KeyCode::Char(c) => {
            buf.push(c);
            None
        }
        _ => None,
    }
}

/// Read a password without echoing it.
pub fn password(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    terminal::enable_raw_mode().context("Failed to enable raw mode")?;
    let mut buf = String::new();
    let outcome = loop {
        match event::read() {
            Ok(Event::Key(key)) => {
                if let Some(done) = apply_key(&mut buf, key) {
                    break Ok(done);
                }
            }
            Ok(_) => {}
            Err(e) => break Err(e),
        }
    };
    terminal::disable_raw_mode().context("Failed to disable raw mode")?;
    println!();

    match outcome.context("Failed to read password")? {
        true => Ok(buf),
        false => anyhow::bail!("Cancelled"),
    }
}

/// Ask a yes/no question; anything but `y`/`yes` is no.
pub fn confirm(question: &str) -> Result<bool> {
    let answer = line(&format!("{} [y/N] ", question))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
