use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal};
use std::path::Path;
use unseal::UnsealError;
use zeroize::Zeroizing;

/// Prompts allowed per file, including the first one.
pub const MAX_PROMPT_ATTEMPTS: u32 = 3;

/// Where the passphrase came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordSource {
    /// Command line or `UNSEAL_PASSWORD`.
    Argument,
    /// Piped stdin.
    Pipe,
    /// Interactive TTY prompt.
    Prompt,
}

/// Resolves the passphrase when none was given on the command line or in
/// `UNSEAL_PASSWORD`.
pub fn read_password() -> Result<(Zeroizing<String>, PasswordSource)> {
    //  stdin (Pipeline)
    //  printf "%s" "$SECRET" | unseal backup.tar.gz.enc
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().lock().read_line(&mut buf)?;
        trim_newline(&mut buf);

        if !buf.is_empty() {
            return Ok((buf, PasswordSource::Pipe));
        }
        bail!("No password provided");
    }

    //  Interactive (TTY)
    let pw = Zeroizing::new(rpassword::prompt_password("Password: ")?);
    if !pw.is_empty() {
        return Ok((pw, PasswordSource::Prompt));
    }

    bail!("No password provided")
}

/// Only a person at a prompt can fix a wrong passphrase; everything else is
/// final.
pub fn should_retry(source: PasswordSource, err: &UnsealError, attempt: u32) -> bool {
    source == PasswordSource::Prompt
        && matches!(err, UnsealError::AuthenticationFailed)
        && attempt < MAX_PROMPT_ATTEMPTS
}

/// Asks again after a failed attempt. `None` means the user gave up.
pub fn prompt_again(file: &Path) -> Result<Option<Zeroizing<String>>> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    let entry = rpassword::prompt_password(format!(
        "Enter password for {name} (empty or 'skip' to give up): "
    ))?;
    Ok(retry_entry(entry))
}

fn retry_entry(entry: String) -> Option<Zeroizing<String>> {
    let entry = Zeroizing::new(entry);
    if entry.is_empty() || entry.eq_ignore_ascii_case("skip") {
        return None;
    }
    Some(entry)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
