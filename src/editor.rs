//! Launching the user's text editor

use crate::error::{ErrorCategory, ErrorKind, LockboxError, Result};
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

/// Editor used when `$EDITOR` is unset or empty
pub const DEFAULT_EDITOR: &str = "vim";

/// Something that lets a user change the contents of a file in place.
pub trait Editor {
    /// Returns once editing is finished. An error means the edit must be
    /// discarded.
    fn edit(&self, path: &Path) -> Result<()>;
}

/// Runs an external program with the file path as its last argument.
#[derive(Debug, Clone)]
pub struct CommandEditor {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandEditor {
    /// Parses an editor command line such as `vim` or `code --wait`.
    ///
    /// Splitting is on whitespace only; quoting is not supported.
    pub fn new(command: &str) -> Self {
        let mut parts = command.split_whitespace().map(OsString::from);
        let program = parts.next().unwrap_or_else(|| DEFAULT_EDITOR.into());
        Self {
            program,
            args: parts.collect(),
        }
    }

    /// Editor from an `$EDITOR`-style value, defaulting to vim.
    pub fn from_value(value: Option<OsString>) -> Self {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return Self::new(DEFAULT_EDITOR);
        };
        if let Some(command) = value.to_str() {
            return Self::new(command);
        }
        // Not UTF-8: treat the whole value as the program path.
        Self {
            program: value,
            args: Vec::new(),
        }
    }

    /// Editor named by `$EDITOR`, defaulting to vim.
    pub fn from_env() -> Self {
        Self::from_value(std::env::var_os("EDITOR"))
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }
}

impl Editor for CommandEditor {
    fn edit(&self, path: &Path) -> Result<()> {
        tracing::debug!(editor = ?self.program, "launching editor");
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .status()
            .map_err(|e| {
                LockboxError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Editor,
                    format!("failed to launch editor {:?}", self.program),
                    e,
                )
            })?;

        if !status.success() {
            return Err(LockboxError::with_kind(
                ErrorCategory::User,
                ErrorKind::Editor,
                format!("editor {:?} exited with {}", self.program, status),
            ));
        }
        Ok(())
    }
}
