use anyhow::{Result, anyhow, bail};
use std::io::{self, BufRead, IsTerminal, Write};
use zeroize::Zeroizing;

pub const MASTER_PASSWORD_ENV: &str = "VAULTKEEP_MASTER_PASSWORD";

/// Master password for unlocking a store.
///
/// Taken from `VAULTKEEP_MASTER_PASSWORD`, then one line of piped stdin,
/// then an interactive prompt.
pub fn read_master_password() -> Result<Zeroizing<String>> {
    //  VAULTKEEP_MASTER_PASSWORD="supersecret" vaultkeep get github
    if let Ok(pw) = std::env::var(MASTER_PASSWORD_ENV) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    //  echo "supersecret" | vaultkeep get github --all
    if !io::stdin().is_terminal() {
        let pw = read_piped_line()?;
        if !pw.is_empty() {
            return Ok(pw);
        }
    } else {
        let pw = Zeroizing::new(rpassword::prompt_password("Master password: ")?);
        if !pw.is_empty() {
            return Ok(pw);
        }
    }

    bail!("no master password provided")
}

/// New master password, asked twice. Piped stdin supplies both lines.
///
/// `check` runs on the first answer before the confirmation is asked for.
pub fn read_new_password_with_confirmation<F>(check: F) -> Result<Zeroizing<String>>
where
    F: FnOnce(&str) -> Result<()>,
{
    let interactive = io::stdin().is_terminal();
    let read = |prompt: &str| -> Result<Zeroizing<String>> {
        if interactive {
            Ok(Zeroizing::new(rpassword::prompt_password(prompt)?))
        } else {
            read_piped_line()
        }
    };

    let pw1 = read("New master password: ")?;
    let first = if pw1.is_empty() {
        Err(anyhow!("password cannot be empty"))
    } else {
        check(&pw1)
    };
    report(interactive, first.is_ok());
    first?;

    let pw2 = read("Confirm master password: ")?;
    report(interactive, pw1 == pw2);
    if pw1 != pw2 {
        bail!("passwords do not match");
    }

    Ok(pw1)
}

fn report(interactive: bool, ok: bool) {
    if interactive {
        eprintln!("{}", if ok { "✔" } else { "✘" });
    }
}

/// Hidden prompt for a secret field. Returns an empty string when stdin is
/// not a terminal.
pub fn prompt_secret(prompt: &str) -> Result<Zeroizing<String>> {
    if !io::stdin().is_terminal() {
        return Ok(Zeroizing::new(String::new()));
    }
    Ok(Zeroizing::new(rpassword::prompt_password(prompt)?))
}

/// Visible prompt for a plain field. Returns an empty string when stdin is
/// not a terminal.
pub fn prompt_line(prompt: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        return Ok(String::new());
    }

    let mut stdout = io::stdout();
    write!(stdout, "{prompt}")?;
    stdout.flush()?;

    let mut buf = String::new();
    io::stdin().lock().read_line(&mut buf)?;
    trim_newline(&mut buf);
    Ok(buf)
}

/// Blocks until the user presses Enter.
pub fn wait_for_enter(prompt: &str) -> Result<()> {
    prompt_line(prompt).map(drop)
}

fn read_piped_line() -> Result<Zeroizing<String>> {
    let mut buf = Zeroizing::new(String::new());
    io::stdin().lock().read_line(&mut buf)?;
    trim_newline(&mut buf);
    Ok(buf)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
