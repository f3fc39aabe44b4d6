//! Password prompts
//!
//! Input is hidden on a terminal. When stdin is piped, each prompt reads one
//! line from it instead, so scripts can supply passwords.

use std::io::{BufRead, IsTerminal, Write};

use crate::crypto::SecureString;
use crate::error::{HearthError, HearthResult};

/// Prompt for a password (hidden input)
pub fn prompt_password(prompt: &str) -> HearthResult<SecureString> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return rpassword::prompt_password(prompt)
            .map(SecureString::new)
            .map_err(read_error);
    }
    eprint!("{}", prompt);
    read_password_line(&mut stdin.lock())
}

/// Read one password line from `reader`
pub fn read_password_line(reader: &mut impl BufRead) -> HearthResult<SecureString> {
    rpassword::read_password_from_bufread(reader)
        .map(SecureString::new)
        .map_err(read_error)
}

fn read_error(e: std::io::Error) -> HearthError {
    HearthError::Io(format!("Failed to read password: {}", e))
}

/// Prompt for a new password with confirmation
///
/// A terminal user is asked again after a mistake; piped input fails instead.
pub fn prompt_new_password(min_length: usize) -> HearthResult<SecureString> {
    let interactive = std::io::stdin().is_terminal();
    loop {
        let first = prompt_password("Enter new password: ")?;

        if first.chars().count() < min_length {
            let message = format!("Password must be at least {} characters", min_length);
            if !interactive {
                return Err(HearthError::Validation(message));
            }
            println!("{}. Please try again.", message);
            continue;
        }

        let second = prompt_password("Confirm password: ")?;

        if first.as_str() != second.as_str() {
            if !interactive {
                return Err(HearthError::Validation("Passwords do not match".into()));
            }
            println!("Passwords do not match. Please try again.");
            continue;
        }

        return Ok(first);
    }
}

/// Ask a yes/no question on stdout and read the answer from stdin
pub fn confirm(question: &str) -> HearthResult<bool> {
    print!("{} (yes/no): ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}
