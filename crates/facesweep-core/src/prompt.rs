//! Line-oriented operator prompts over any reader/writer pair.

use std::io::{self, BufRead, Write};
use std::path::Path;

/// Interpret a yes/no answer. `None` means "ask again".
pub fn parse_answer(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Print `prompt` (no newline) and read one trimmed line.
///
/// End of input is reported as [`io::ErrorKind::UnexpectedEof`].
pub fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> io::Result<String> {
    write!(output, "{prompt}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
    }
    Ok(line.trim().to_string())
}

/// Ask whether `path` should be removed until the operator gives a yes/no answer.
pub fn confirm_removal<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    path: &Path,
) -> io::Result<bool> {
    let prompt = format!("Do you want to remove this image? (y/n): {} ", path.display());
    loop {
        let answer = ask(input, output, &prompt)?;
        if let Some(remove) = parse_answer(&answer) {
            return Ok(remove);
        }
        writeln!(output, "Please respond with 'y' or 'n'.")?;
    }
}
