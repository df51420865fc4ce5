//! Terminal implementation of [`Prompter`]: questions on stdout, answers from stdin.

use std::io::{self, BufRead, Write};

use daily_status_core::contract::Prompter;
use daily_status_core::error::BoxError;

#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompter;

impl StdinPrompter {
    fn read_answer(&self, prompt: &str) -> Result<String, BoxError> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;
        drop(stdout);

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err("no answer: stdin is closed".into());
        }
        Ok(line.trim().to_string())
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

impl Prompter for StdinPrompter {
    fn confirm(&self, question: &str) -> Result<bool, BoxError> {
        let answer = self.read_answer(&format!("{question} [y/N] "))?;
        Ok(is_yes(&answer))
    }

    fn ask(&self, question: &str) -> Result<String, BoxError> {
        self.read_answer(question)
    }
}
