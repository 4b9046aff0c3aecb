//! Line-oriented session over a single [`Store`].

use std::io::{BufRead, Write};

use anyhow::Result;
use clap::Parser;
use thiserror::Error;

use crate::cli::{CliCommand, ShellLine};
use crate::commands;
use crate::core::Store;

const PROMPT: &str = "taskdeck> ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("unclosed {0} quote")]
    UnclosedQuote(char),
}

/// Run commands read from `input` until EOF or `quit`.
///
/// A failing line is reported on `output` and the session carries on.
pub fn run<R: BufRead, W: Write>(store: &mut Store, input: R, mut output: W, prompt: bool) -> Result<()> {
    if prompt {
        write!(output, "{}", PROMPT)?;
        output.flush()?;
    }
    for line in input.lines() {
        let line = line?;
        match split_words(&line) {
            Err(err) => writeln!(output, "error: {}", err)?,
            Ok(words) => match words.first().map(String::as_str) {
                None => {}
                Some("quit") | Some("exit") => break,
                Some(_) => run_line(store, words, &mut output)?,
            },
        }
        if prompt {
            write!(output, "{}", PROMPT)?;
            output.flush()?;
        }
    }
    Ok(())
}

fn run_line<W: Write>(store: &mut Store, words: Vec<String>, mut output: W) -> Result<()> {
    let command = match ShellLine::try_parse_from(words) {
        Ok(line) => line.command,
        Err(err) => {
            write!(output, "{}", err.render())?;
            return Ok(());
        }
    };
    if matches!(command, CliCommand::Shell) {
        writeln!(output, "error: already in a shell")?;
        return Ok(());
    }
    if let Err(err) = commands::execute(store, command, &mut output) {
        tracing::debug!(error = %err, "shell command failed");
        writeln!(output, "error: {:#}", err)?;
    }
    Ok(())
}

/// Split on whitespace, keeping single- or double-quoted runs together.
fn split_words(line: &str) -> Result<Vec<String>, LineError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for ch in line.chars() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(ch);
                in_word = true;
            }
        }
    }
    if let Some(open) = quote {
        return Err(LineError::UnclosedQuote(open));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
