//! File-level lock, unlock, edit and key generation
//!
//! This module connects the token codec in [`crate::envelope`] to the
//! filesystem. Nothing here ever writes to an output before the
//! cryptographic step that produces its contents has succeeded.

use crate::editor::Editor;
use crate::envelope;
use crate::error::{ErrorCategory, ErrorKind, LockboxError, Result};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use zeroize::Zeroizing;

/// Encrypt a text file with a key
///
/// Reads UTF-8 plaintext from `input_path`, encrypts it and writes the token
/// to `output_path`.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn lock_file(input_path: &Path, output_path: &Path, key: &str) -> Result<()> {
    tracing::debug!(input = %input_path.display(), output = %output_path.display(), "locking");
    let plaintext = read_text(input_path, "input file")?;
    let token = envelope::encrypt(&plaintext, key);
    write_file_secure(output_path, token.as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;
    tracing::info!(output = %output_path.display(), "locked");
    Ok(())
}

/// Decrypt a token file with a key
///
/// Reads the token from `input_path`, decrypts it and writes the plaintext
/// to `output_path`. A wrong key leaves `output_path` untouched.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn unlock_file(input_path: &Path, output_path: &Path, key: &str) -> Result<()> {
    tracing::debug!(input = %input_path.display(), output = %output_path.display(), "unlocking");
    let token = read_text(input_path, "input file")?;
    let plaintext = Zeroizing::new(
        envelope::decrypt(&token, key).map_err(|e| e.with_context("failed to unlock"))?,
    );
    write_file_secure(output_path, plaintext.as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;
    tracing::info!(output = %output_path.display(), "unlocked");
    Ok(())
}

/// Edit an encrypted file in place
///
/// This function:
/// 1. Decrypts the existing file at `path`, if there is one
/// 2. Writes the plaintext to a private temporary file and runs `editor` on it
/// 3. Reads the edited plaintext back and encrypts it with the same key
/// 4. Checks the new token opens to the edited plaintext
/// 5. Atomically replaces `path` (tempfile + fsync + rename)
///
/// Any failure before step 5 leaves `path` exactly as it was. If `path` does
/// not exist a new encrypted file is created. If an existing file's content
/// was not changed it is left alone.
pub fn edit_file(path: &Path, key: &str, editor: &dyn Editor) -> Result<()> {
    let original = match fs::read(path) {
        Ok(bytes) => {
            let token = String::from_utf8(bytes).map_err(|e| {
                LockboxError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!("{} is not a lockbox file", path.display()),
                    e,
                )
            })?;
            let plaintext = envelope::decrypt(&token, key)
                .map_err(|e| e.with_context(format!("failed to unlock {}", path.display())))?;
            Some(Zeroizing::new(plaintext))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "creating new encrypted file");
            None
        }
        Err(e) => return Err(read_error(path, e)),
    };

    let mut scratch = tempfile::Builder::new()
        .prefix(".lockbox-edit-")
        .suffix(".txt")
        .tempfile()
        .map_err(|e| {
            LockboxError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to create tempfile",
                e,
            )
        })?;
    if let Some(plaintext) = &original {
        scratch.write_all(plaintext.as_bytes()).map_err(|e| {
            LockboxError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to write to tempfile",
                e,
            )
        })?;
    }
    // Close our handle so the editor is free to replace the file; the path
    // is still removed when `scratch` drops.
    let scratch = scratch.into_temp_path();

    editor
        .edit(&scratch)
        .map_err(|e| e.with_context("editing aborted; encrypted file left unchanged"))?;

    let edited = Zeroizing::new(read_text(&scratch, "edited file")?);
    drop(scratch);

    if original
        .as_ref()
        .is_some_and(|plaintext| plaintext.as_str() == edited.as_str())
    {
        tracing::info!(path = %path.display(), "no changes");
        return Ok(());
    }

    let token = envelope::encrypt(&edited, key);
    let reopened = Zeroizing::new(
        envelope::decrypt(&token, key).map_err(|e| e.with_context("re-encryption check failed"))?,
    );
    if reopened.as_str() != edited.as_str() {
        return Err(LockboxError::new(
            ErrorCategory::Internal,
            "re-encrypted content does not match edited content",
        ));
    }

    replace_atomically(path, token.as_bytes())?;
    tracing::info!(path = %path.display(), "saved");
    Ok(())
}

/// Generate a new key and write it to `output_path`
///
/// Refuses to overwrite an existing file. The key file is created with mode
/// 0o600 on Unix systems.
pub fn genkey_file(output_path: &Path) -> Result<()> {
    let key = Zeroizing::new(envelope::generate_key());

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(output_path).map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            LockboxError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::KeyFileExists,
                format!(
                    "Key already exists at {}. Will not overwrite existing key.",
                    output_path.display()
                ),
                e,
            )
        } else {
            LockboxError::io(format!("failed to create {}", output_path.display()), e)
        }
    })?;
    file.write_all(key.as_bytes()).map_err(|e| {
        LockboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to write {}", output_path.display()),
            e,
        )
    })?;
    tracing::info!(output = %output_path.display(), "generated key");
    Ok(())
}

/// Verify a token file and return the Unix time it was created at
pub fn inspect_file(input_path: &Path, key: &str) -> Result<u64> {
    let token = read_text(input_path, "input file")?;
    envelope::token_timestamp(&token, key).map_err(|e| e.with_context("failed to verify"))
}

fn read_text(path: &Path, what: &str) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    String::from_utf8(bytes).map_err(|e| {
        LockboxError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} {} is not valid UTF-8", what, path.display()),
            e,
        )
    })
}

/// Replace `path` with `contents` so that either the old or the new file
/// exists, never a partial one.
fn replace_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::Builder::new()
        .prefix(".lockbox-")
        .tempfile_in(dir)
        .map_err(|e| {
            LockboxError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to create tempfile",
                e,
            )
        })?;

    temp_file.write_all(contents).map_err(|e| {
        LockboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        LockboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        LockboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                LockboxError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }
    temp_file.persist(path).map_err(|e| {
        LockboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                LockboxError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;

        file.write_all(contents).map_err(|e| {
            LockboxError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(|e| {
            LockboxError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }
}

fn read_error(path: &Path, err: io::Error) -> LockboxError {
    LockboxError::io(format!("failed to read from {}", path.display()), err)
}
