use anyhow::{Context, Result, bail};
use clap::Parser;
mod auth;
use auth::PasswordSource;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use unseal::{Decryptor, ENCRYPTED_EXT, EncryptedContainer, Storage, output_path_for};
use zeroize::Zeroizing;

#[derive(Debug, Parser)]
#[command(name = "unseal")]
#[command(
    version,
    about = "Recover plaintext from passphrase-encrypted backup archives."
)]
struct Cli {
    /// Encrypted file to recover
    #[arg(value_name = "ENCRYPTED_FILE")]
    file: PathBuf,

    /// Passphrase (prompted for when omitted)
    #[arg(env = "UNSEAL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Where to write the plaintext (default: input path without `.enc`)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Overwrite the output file if it already exists
    #[arg(short, long, default_value_t = false)]
    force: bool,

    /// Delete the encrypted file after a successful recovery
    #[arg(long, default_value_t = false)]
    remove_encrypted: bool,

    /// Log every profile attempt (same as RUST_LOG=debug)
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    // RUST_LOG wins over --verbose when set
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Unable to set global default subscriber");
    }
}

fn run(cli: Cli) -> Result<PathBuf> {
    let input = Storage::new(cli.file.clone());
    if !input.exists() {
        bail!("encrypted file '{}' not found", cli.file.display());
    }

    let output_path = match cli.output {
        Some(path) => path,
        None => output_path_for(&cli.file).with_context(|| {
            format!(
                "cannot derive output path: '{}' has no .{ENCRYPTED_EXT} suffix, pass --output",
                cli.file.display()
            )
        })?,
    };

    let output = Storage::new(output_path.clone());
    if output.is_same_file(&input) {
        bail!(
            "output '{}' is the encrypted file itself",
            output_path.display()
        );
    }
    if output.exists() && !cli.force {
        bail!(
            "output '{}' already exists (use --force to overwrite)",
            output_path.display()
        );
    }

    let data = input.load()?;
    let container = EncryptedContainer::parse(&data)
        .with_context(|| format!("failed to decrypt '{}'", cli.file.display()))?;

    let (mut password, source) = match cli.password {
        Some(pw) => (Zeroizing::new(pw), PasswordSource::Argument),
        None => auth::read_password()?,
    };

    let decryptor = Decryptor::default();
    let mut attempt = 1;
    let plaintext = loop {
        if password.is_empty() {
            bail!("password cannot be empty");
        }

        match decryptor.decrypt(&container, password) {
            Ok(plaintext) => break plaintext,
            Err(e) => {
                if auth::should_retry(source, &e, attempt) {
                    eprintln!("{e}");
                    if let Some(pw) = auth::prompt_again(&cli.file)? {
                        password = pw;
                        attempt += 1;
                        continue;
                    }
                }
                return Err(e)
                    .with_context(|| format!("failed to decrypt '{}'", cli.file.display()));
            }
        }
    };

    output.save(&plaintext)?;
    info!(
        input = %cli.file.display(),
        output = %output_path.display(),
        bytes = plaintext.len(),
        attempts = attempt,
        "decrypted"
    );

    if cli.remove_encrypted {
        if let Err(e) = input.remove() {
            warn!("could not remove encrypted file: {e}");
        }
    }

    Ok(output_path)
}

fn load_dotenv() {
    // a .env next to the invocation may carry UNSEAL_PASSWORD
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: ignoring .env: {e}");
        }
    }
}

fn main() -> ExitCode {
    load_dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(path) => {
            println!("decrypted: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
