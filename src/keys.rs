//! Key discovery
//!
//! A key is looked up from an ordered list of sources and the first one that
//! has a key wins. The standard order is:
//!
//! 1. the `--key` flag,
//! 2. `.lockbox.key` in the current directory,
//! 3. the file named by `$LOCKBOX_KEY`,
//! 4. `.lockbox.key` in the home directory,
//!
//! and if none of them has a key the user is prompted.

use crate::error::{ErrorCategory, ErrorKind, LockboxError, Result};
use crate::passphrase::PassphraseReader;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Name of the key file looked for in the current and home directories
pub const DEFAULT_KEYFILE_NAME: &str = ".lockbox.key";

/// Environment variable holding the path of a key file
pub const DEFAULT_KEY_ENVVAR: &str = "LOCKBOX_KEY";

/// One place a key might come from.
pub trait KeySource {
    /// Human-readable description used in logs. Never includes the key.
    fn describe(&self) -> String;

    /// `Ok(None)` means this source has no key and the next one should be tried.
    fn lookup(&self) -> Result<Option<Zeroizing<String>>>;
}

/// A key given directly, e.g. on the command line.
pub struct ExplicitKey(Zeroizing<String>);

impl ExplicitKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Zeroizing::new(key.into()))
    }
}

impl KeySource for ExplicitKey {
    fn describe(&self) -> String {
        "--key".to_string()
    }

    fn lookup(&self) -> Result<Option<Zeroizing<String>>> {
        Ok(Some(self.0.clone()))
    }
}

/// A key stored in a file. The whole file is the key, read as text with
/// universal newlines and otherwise untouched.
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KeySource for KeyFile {
    fn describe(&self) -> String {
        format!("key file {}", self.path.display())
    }

    fn lookup(&self) -> Result<Option<Zeroizing<String>>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        match fs::read_to_string(&self.path) {
            Ok(key) => Ok(Some(normalize_newlines(&Zeroizing::new(key)))),
            // Raced with a delete between the check and the read.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                Err(LockboxError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::KeyUnavailable,
                    format!("key file {} is not valid UTF-8", self.path.display()),
                    e,
                ))
            }
            Err(e) => Err(LockboxError::io(
                format!("failed to read key file {}", self.path.display()),
                e,
            )),
        }
    }
}

/// `\r\n` and lone `\r` become `\n`, matching key files written on any platform.
fn normalize_newlines(text: &str) -> Zeroizing<String> {
    let mut out = Zeroizing::new(String::with_capacity(text.len()));
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            chars.next_if_eq(&'\n');
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}

/// Tries each source in order, then falls back to a prompt.
pub struct KeyResolver {
    sources: Vec<Box<dyn KeySource>>,
}

impl KeyResolver {
    pub fn new(sources: Vec<Box<dyn KeySource>>) -> Self {
        Self { sources }
    }

    /// Builds the standard lookup order from explicitly supplied environment
    /// values, so callers (and tests) decide where they come from.
    pub fn standard(
        explicit: Option<String>,
        current_dir: Option<PathBuf>,
        key_env: Option<OsString>,
        home_dir: Option<PathBuf>,
    ) -> Self {
        let mut sources: Vec<Box<dyn KeySource>> = Vec::new();
        if let Some(key) = explicit {
            sources.push(Box::new(ExplicitKey::new(key)));
        }
        if let Some(dir) = current_dir {
            sources.push(Box::new(KeyFile::new(dir.join(DEFAULT_KEYFILE_NAME))));
        }
        if let Some(path) = key_env.filter(|p| !p.is_empty()) {
            sources.push(Box::new(KeyFile::new(path)));
        }
        if let Some(home) = home_dir {
            sources.push(Box::new(KeyFile::new(home.join(DEFAULT_KEYFILE_NAME))));
        }
        Self::new(sources)
    }

    /// The standard lookup order for this process: working directory,
    /// `$LOCKBOX_KEY` and `$HOME`.
    pub fn from_env(explicit: Option<String>) -> Self {
        Self::standard(
            explicit,
            std::env::current_dir().ok(),
            std::env::var_os(DEFAULT_KEY_ENVVAR),
            std::env::var_os("HOME").map(PathBuf::from),
        )
    }

    /// First key any source has, without prompting.
    pub fn find(&self) -> Result<Option<Zeroizing<String>>> {
        for source in &self.sources {
            if let Some(key) = source.lookup()? {
                tracing::debug!(source = %source.describe(), "using key");
                return Ok(Some(key));
            }
            tracing::trace!(source = %source.describe(), "no key");
        }
        Ok(None)
    }

    /// First key any source has, prompting through `prompt` if none does.
    pub fn resolve(&self, prompt: &mut dyn PassphraseReader) -> Result<Zeroizing<String>> {
        if let Some(key) = self.find()? {
            return Ok(key);
        }
        tracing::debug!("no key source matched, prompting");
        prompt.read_passphrase()
    }
}
