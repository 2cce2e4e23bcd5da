use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// Key holding the envelopes in a stream event
const RECORDS_KEY: &str = "Records";

/// Read a direct invocation payload from a file, or stdin when no path is given
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read input from stdin")?;
            Ok(input)
        }
    }
}

/// Extract the envelope list from a direct invocation payload
///
/// Accepts a bare JSON array of envelopes or a stream event object
/// `{"Records": [...]}`. Individual envelopes are not validated here.
pub fn parse_batch(input: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(input).context("Invocation input is not valid JSON")?;

    match value {
        Value::Array(envelopes) => Ok(envelopes),
        Value::Object(mut event) => match event.remove(RECORDS_KEY) {
            Some(Value::Array(envelopes)) => Ok(envelopes),
            Some(_) => bail!("\"{}\" must be an array", RECORDS_KEY),
            None => bail!("Invocation object has no \"{}\" array", RECORDS_KEY),
        },
        _ => bail!("Invocation input must be an array or an object with \"{}\"", RECORDS_KEY),
    }
}
