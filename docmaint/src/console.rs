//! Line-oriented operator console.
//!
//! Prompts go to the output writer, answers come one line at a time from the
//! input reader. End of input surfaces as [`SessionError::Aborted`] so every
//! prompt loop has a way out.

use std::io::{self, BufRead, Write};

use crate::error::SessionError;

/// `Y` / `YES` in any case; everything else is a no.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_uppercase().as_str(), "Y" | "YES")
}

pub struct Console<I, W> {
    input: I,
    output: W,
}

impl<I: BufRead, W: Write> Console<I, W> {
    pub fn new(input: I, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, line: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.output, "{}", line.as_ref())?;
        self.output.flush()
    }

    pub fn blank(&mut self) -> io::Result<()> {
        self.say("")
    }

    pub fn read_line(&mut self) -> Result<String, SessionError> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(SessionError::Aborted);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    pub fn prompt(&mut self, question: impl AsRef<str>) -> Result<String, SessionError> {
        self.say(question)?;
        self.read_line()
    }

    pub fn confirm(&mut self, question: impl AsRef<str>) -> Result<bool, SessionError> {
        Ok(is_affirmative(&self.prompt(question)?))
    }

    pub fn into_output(self) -> W {
        self.output
    }
}
