//! keyforge: deterministic key factory with an encrypted vault
//!
//! Thin front-end over the keyforge crates: it prompts for the
//! passphrase, owns the [`Session`] for the duration of one command, and
//! routes to the core. All real behaviour lives in the libraries.
//!
//! Exit codes: 0 on success, 1 on any error. Signals keep their default
//! disposition, so an interrupted run exits 130 (SIGINT) or 143 (SIGTERM).

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use keyforge_core::{Session, DEFAULT_USER_LABEL, DEFAULT_VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "keyforge",
    version,
    about = "Derive SSH keys, signing keys, wallets, and TOTP secrets from one passphrase"
)]
struct Cli {
    /// User label mixed into the master salt (case-insensitive)
    #[arg(long, global = true, default_value = DEFAULT_USER_LABEL)]
    label: String,

    /// Derivation version mixed into the master salt
    #[arg(long = "seed-version", global = true, default_value_t = DEFAULT_VERSION)]
    seed_version: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create (or re-open) the vault and show its status
    Init,

    /// Generate key material for one service
    Generate {
        #[command(subcommand)]
        kind: GenerateKind,
    },

    /// Vault maintenance
    Vault {
        #[command(subcommand)]
        action: VaultAction,
    },

    /// Password records
    Pass {
        #[command(subcommand)]
        action: PassAction,
    },

    /// Print the current TOTP code for a service
    Totp { service: String },

    /// Write the vault to an export container
    Export {
        /// Container: json, encrypted, or backup
        #[arg(long, default_value = "json")]
        format: String,
        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<std::path::PathBuf>,
    },

    /// Replace the vault from an export container
    Import { file: std::path::PathBuf },
}

#[derive(Subcommand, Debug)]
enum GenerateKind {
    /// OpenSSH Ed25519 keypair
    Ssh { hostname: Option<String> },
    /// Keyforge-armored signing key
    Gpg {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        comment: Option<String>,
        #[arg(long)]
        service: Option<String>,
    },
    /// HD wallet, Bitcoin branch
    Bitcoin { service: Option<String> },
    /// HD wallet, Ethereum branch
    Ethereum { service: Option<String> },
    /// TOTP shared secret, enrolled into the vault
    Totp { service: String },
}

#[derive(Subcommand, Debug)]
enum VaultAction {
    /// Record counts, path, and integrity check
    Status,
    /// Persist and push to the local backup directory
    Sync,
    /// List issued keys and addresses
    List,
}

#[derive(Subcommand, Debug)]
enum PassAction {
    /// Add a credential (prompts for the password)
    Add {
        site: String,
        username: String,
        #[arg(long)]
        notes: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Show one credential
    Get { site: String },
    /// List all sites
    List,
    /// Update fields of a credential (prompts for the password with --password)
    Update {
        site: String,
        #[arg(long)]
        username: Option<String>,
        /// Prompt for and set a new password
        #[arg(long)]
        password: bool,
        #[arg(long)]
        notes: Option<String>,
        /// Comma-separated tags, replacing the existing set
        #[arg(long)]
        tags: Option<String>,
    },
    /// Delete a credential
    Delete { site: String },
    /// Generate a random password (no vault interaction)
    Generate {
        #[arg(long, default_value_t = 20)]
        length: usize,
    },
}

fn main() -> ExitCode {
    keyforge_core::memory::disable_core_dumps();
    env_logger::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // `pass generate` needs no passphrase; everything else unlocks first
    if let Command::Pass {
        action: PassAction::Generate { length },
    } = &cli.command
    {
        return commands::pass_generate(*length);
    }

    let session = unlock(&cli)?;
    match cli.command {
        Command::Init => commands::init(&session),
        Command::Generate { kind } => commands::generate(&session, kind),
        Command::Vault { action } => commands::vault(&session, action),
        Command::Pass { action } => commands::pass(&session, action),
        Command::Totp { service } => commands::totp(&session, &service),
        Command::Export { format, output } => commands::export(&session, &format, output),
        Command::Import { file } => commands::import(&session, &file),
    }
}

fn unlock(cli: &Cli) -> Result<Session> {
    let passphrase = rpassword::prompt_password("Passphrase: ")?;

    if matches!(cli.command, Command::Init) {
        let report = keyforge_core::passphrase::analyze(&passphrase);
        for warning in &report.warnings {
            eprintln!("warning: {warning}");
        }
        if !report.strength.is_recommended() {
            eprintln!(
                "warning: passphrase strength is {} (~{:.0} bits of guessing work, key \
                 stretching included); everything you derive inherits this weakness",
                report.strength.label(),
                report.work_bits
            );
        }
        let confirm = rpassword::prompt_password("Confirm passphrase: ")?;
        anyhow::ensure!(passphrase == confirm, "passphrases do not match");
    }

    eprintln!("Deriving master seed (this takes a few seconds)…");
    Ok(Session::unlock(&passphrase, &cli.label, cli.seed_version))
}
