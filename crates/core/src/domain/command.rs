// Command Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};

/// The command to supervise, split once into binary and arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    bin: String,
    args: Vec<String>,
}

impl Command {
    /// Build a command from a raw argument list (`argv[0]` is the binary).
    ///
    /// # Errors
    /// - `DomainError::EmptyCommand` if `args` is empty
    pub fn new<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let bin = args.next().ok_or(DomainError::EmptyCommand)?;

        Ok(Self {
            bin,
            args: args.collect(),
        })
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bin)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
