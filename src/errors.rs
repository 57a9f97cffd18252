use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KconfigError {
    /// Lexer or parser reject. The message carries the `file:line` location
    /// and the offending line.
    #[error("{0}")]
    Syntax(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl KconfigError {
    pub(crate) fn tokenization(line: &str, filename: &str, linenr: usize) -> Self {
        KconfigError::Syntax(format!(
            "{}:{}: couldn't tokenize '{}'",
            filename,
            linenr,
            line.trim()
        ))
    }

    pub(crate) fn parse(line: &str, msg: &str, filename: &str, linenr: usize) -> Self {
        KconfigError::Syntax(format!(
            "{}:{}: couldn't parse '{}': {}",
            filename,
            linenr,
            line.trim(),
            msg
        ))
    }
}
