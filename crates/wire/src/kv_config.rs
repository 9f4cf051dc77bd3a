//! Shared `KEY=VALUE` config file grammar, used by the directory and client
//! binaries. Lines starting with `#` (after leading whitespace) are comments;
//! blank lines are ignored.

use std::collections::HashMap;

/// Parse a `KEY=VALUE` config file's contents into a lookup table.
pub fn parse(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_owned(), value.trim().to_owned());
        }
    }
    map
}
