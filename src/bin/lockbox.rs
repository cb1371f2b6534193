//! Lockbox CLI - symmetric-key encryption of text files
//!
//! Keys are taken from `--key`, `--key-stdin`, `./.lockbox.key`, the file
//! named by `$LOCKBOX_KEY` or `~/.lockbox.key`, in that order, and otherwise
//! prompted for.

use clap::{Parser, Subcommand};
use std::error::Error as _;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use lockbox::editor::CommandEditor;
use lockbox::file_ops;
use lockbox::keys::KeyResolver;
use lockbox::passphrase::{PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};
use lockbox::{LockboxError, Result};

#[derive(Parser)]
#[command(name = "lockbox")]
#[command(version)]
#[command(about = "User-friendly symmetric-key encryption of text files.", long_about = None)]
struct Cli {
    /// Read the key from stdin; only --key takes precedence over it
    #[arg(long, global = true)]
    key_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Symmetric encryption of plaintext input file to ciphertext output file
    #[command(visible_alias = "write")]
    Lock {
        /// Plaintext file to encrypt
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// File to write the ciphertext to
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// An encryption key
        #[arg(long)]
        key: Option<String>,
    },

    /// Symmetric decryption of ciphertext input file to plaintext output file
    #[command(visible_alias = "read")]
    Unlock {
        /// Ciphertext file to decrypt
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// File to write the plaintext to
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// An encryption key
        #[arg(long)]
        key: Option<String>,
    },

    /// Decrypts the given file and opens its contents in a temporary file for
    /// editing. Once saved, the updated contents are re-encrypted back to the
    /// original file.
    Edit {
        /// Encrypted file to edit; created if it does not exist
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// An encryption key
        #[arg(long)]
        key: Option<String>,
    },

    /// Generates a cryptographically strong key and writes it to the given
    /// output path
    Genkey {
        /// Where to write the key; must not exist yet
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },

    /// Verifies an encrypted file and prints when it was encrypted
    Inspect {
        /// Ciphertext file to verify
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// An encryption key
        #[arg(long)]
        key: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lockbox=warn")),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();
    let key_stdin = cli.key_stdin;

    let result = match cli.command {
        Commands::Lock { input, output, key } => resolve_key(key, key_stdin)
            .and_then(|key| file_ops::lock_file(&input, &output, &key)),
        Commands::Unlock { input, output, key } => resolve_key(key, key_stdin)
            .and_then(|key| file_ops::unlock_file(&input, &output, &key)),
        Commands::Edit { path, key } => resolve_key(key, key_stdin)
            .and_then(|key| file_ops::edit_file(&path, &key, &CommandEditor::from_env())),
        Commands::Genkey { output } => file_ops::genkey_file(&output).map(|()| {
            println!("Key has been written to {}", output.display());
        }),
        Commands::Inspect { input, key } => resolve_key(key, key_stdin)
            .and_then(|key| file_ops::inspect_file(&input, &key))
            .map(|timestamp| println!("valid token, encrypted at Unix time {timestamp}")),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", render(&e));
        process::exit(1);
    }
}

/// A piped key counts as explicit, so it is tried before any key file.
fn resolve_key(explicit: Option<String>, key_stdin: bool) -> Result<Zeroizing<String>> {
    let explicit = match explicit {
        None if key_stdin => {
            let mut key =
                ReaderPassphraseReader::new(Box::new(std::io::stdin())).read_passphrase()?;
            Some(std::mem::take(&mut *key))
        }
        explicit => explicit,
    };
    KeyResolver::from_env(explicit).resolve(&mut TerminalPassphraseReader::new())
}

/// The message followed by every message in its source chain.
fn render(err: &LockboxError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}
