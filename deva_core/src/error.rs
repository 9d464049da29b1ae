//! Error channel shared by the compiler front end (not part of this crate)
//! and the execution core: one [`DevaError`] type, tagged by [`ErrorKind`],
//! carries everything the driver needs to print a diagnostic.

use std::fmt;

use crate::linemap::Line;

/// The four error kinds the language defines. Only [`ErrorKind::Runtime`]
/// and [`ErrorKind::Ice`] are raised by this crate; `Semantic` is reserved
/// for the (out-of-scope) compiler front end and `User` for code raised
/// explicitly by a running script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Semantic,
    Ice,
    Runtime,
    User,
}

#[derive(Debug, Clone)]
pub struct DevaError {
    pub kind: ErrorKind,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<Line>,
}

impl DevaError {
    pub fn runtime(message: impl Into<String>) -> Self {
        DevaError {
            kind: ErrorKind::Runtime,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn ice(message: impl Into<String>) -> Self {
        DevaError {
            kind: ErrorKind::Ice,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        DevaError {
            kind: ErrorKind::User,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    #[must_use]
    pub fn with_line(mut self, line: Line) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for DevaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Ice => {
                let file = self.file.as_deref().unwrap_or("<unknown>");
                write!(f, "{file}: Internal Compiler Error: {}", self.message)
            }
            _ => match (&self.file, self.line) {
                (Some(file), Some(line)) => {
                    write!(f, "{file}:{}: error: {}", line.0, self.message)
                }
                _ => write!(f, "error: {}", self.message),
            },
        }
    }
}

impl std::error::Error for DevaError {}

pub type DevaResult<T> = Result<T, DevaError>;
