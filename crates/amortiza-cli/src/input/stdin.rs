use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Read loan parameters piped on stdin, as JSON or YAML.
///
/// Returns `None` when stdin is a terminal or the pipe is empty, so the
/// caller can fall back to command-line flags.
pub fn read_stdin<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_piped(&buffer)
}

fn parse_piped<T: DeserializeOwned>(buffer: &str) -> Result<Option<T>, Box<dyn std::error::Error>> {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if trimmed.starts_with('{') {
        let parsed = serde_json::from_str(trimmed)
            .map_err(|e| format!("Failed to parse JSON from stdin: {}", e))?;
        return Ok(Some(parsed));
    }
    let parsed = serde_yaml::from_str(trimmed)
        .map_err(|e| format!("Failed to parse YAML from stdin: {}", e))?;
    Ok(Some(parsed))
}
