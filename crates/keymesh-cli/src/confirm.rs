//! Interactive overwrite confirmation.

use std::io::{self, BufRead, Write};
use std::path::Path;

/// Ask before overwriting any of `paths` that already exist.
///
/// Returns `true` when none exist or the user answers yes.
pub fn overwrite_allowed(paths: &[&Path]) -> io::Result<bool> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    ask(paths, &mut stdin.lock(), &mut stdout.lock())
}

fn ask(paths: &[&Path], input: &mut impl BufRead, output: &mut impl Write) -> io::Result<bool> {
    let existing: Vec<&Path> = paths.iter().copied().filter(|p| p.exists()).collect();
    if existing.is_empty() {
        return Ok(true);
    }

    let names: Vec<String> = existing.iter().map(|p| p.display().to_string()).collect();
    write!(output, "Overwrite {}? [y/N] ", names.join(", "))?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
