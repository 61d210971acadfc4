//! Terminal I/O utilities for CLI.
//!
//! Provides TTY detection and user prompting. Prompts go to stderr so stdout
//! only ever carries the JSON envelope.

use std::io::{self, BufRead, IsTerminal, Write};

pub fn is_stdin_tty() -> bool {
    io::stdin().is_terminal()
}

pub fn prompt(message: &str) -> lizzy::Result<String> {
    eprint!("{}", message);
    io::stderr().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line).map_err(|e| {
        lizzy::Error::new(
            lizzy::ErrorCode::InternalIoError,
            format!("Failed to read input: {}", e),
            serde_json::Value::Null,
        )
    })?;

    Ok(line.trim().to_string())
}

/// Yes/no question. An empty answer takes `default`.
pub fn confirm(message: &str, default: bool) -> lizzy::Result<bool> {
    let suffix = if default { "[Y/n]" } else { "[y/N]" };
    let answer = prompt(&format!("{} {} ", message, suffix))?;
    Ok(parse_confirmation(&answer, default))
}

fn parse_confirmation(answer: &str, default: bool) -> bool {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}

/// Numbered choice from `options`; returns the selected index.
pub fn select(message: &str, options: &[String]) -> lizzy::Result<usize> {
    eprintln!("{}", message);
    for (i, option) in options.iter().enumerate() {
        eprintln!("  {}. {}", i + 1, option);
    }

    let answer = prompt("Select number: ")?;
    parse_selection(&answer, options.len()).ok_or_else(|| {
        lizzy::Error::validation_invalid_argument(
            "selection",
            format!("Expected a number between 1 and {}", options.len()),
            Some(answer.clone()),
            None,
        )
    })
}

fn parse_selection(answer: &str, count: usize) -> Option<usize> {
    match answer.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n - 1),
        _ => None,
    }
}
