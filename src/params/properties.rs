//! Minimal `.properties` file parsing.
//!
//! Generator install trees ship an optional `config/<name>-node.properties`
//! file. Only the subset of the format the generators actually use is
//! supported: one `key=value` (or `key: value`) pair per line, `#`/`!`
//! comment lines, blank lines ignored, keys and values trimmed.

use std::collections::HashMap;
use std::path::Path;

/// Parse a properties file into a key/value map.
///
/// Returns an empty map for an empty file. I/O errors propagate; the caller
/// decides whether a missing file is acceptable.
pub fn load_properties(path: &Path) -> std::io::Result<HashMap<String, String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_properties(&contents))
}

/// Parse properties from already-loaded file contents.
pub fn parse_properties(contents: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some(split_at) = line.find(['=', ':']) else {
            continue;
        };
        let key = line[..split_at].trim();
        let value = line[split_at + 1..].trim();
        if key.is_empty() {
            continue;
        }
        properties.insert(key.to_string(), value.to_string());
    }
    properties
}

/// Properties key holding the output file name override for `stage`.
pub fn output_file_key(stage: &str) -> String {
    format!("generator.{stage}.output-file")
}
