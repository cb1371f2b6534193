//! Lockbox - user-friendly symmetric-key encryption of text files
//!
//! The core is [`kdf`] (passphrase to key) and [`envelope`] (authenticated,
//! timestamped tokens). Everything else wires that core to files, key files,
//! prompts and editors.

#![forbid(unsafe_code)]

pub mod editor;
pub mod envelope;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod keys;
pub mod passphrase;

pub use envelope::{decrypt, encrypt, generate_key};
pub use error::{ErrorCategory, ErrorKind, LockboxError, Result};
pub use kdf::derive;
