//! String helpers shared by the runtime layers

/// Split `s` on `sep`, trim every piece and drop the empty ones
pub fn split_and_trim_non_empty(s: &str, sep: char) -> Vec<String> {
    s.split(sep)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a text block into entries: newline first, then semicolon
///
/// Surrounding whitespace is trimmed and empty entries are discarded.
pub fn split_blocks(s: &str) -> Vec<String> {
    split_and_trim_non_empty(s, '\n')
        .iter()
        .flat_map(|line| split_and_trim_non_empty(line, ';'))
        .collect()
}

/// Split `s` into a trimmed pair at the first `sep`
///
/// The second half is empty when `sep` does not occur.
pub fn split_pair(s: &str, sep: char) -> (String, String) {
    match s.split_once(sep) {
        Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
        None => (s.trim().to_string(), String::new()),
    }
}

/// Strip one level of matching single or double quotes
///
/// Quotes are kept when the inner text contains the same quote character.
pub fn unquote(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let q = bytes[0];
        if (q == b'"' || q == b'\'') && bytes[bytes.len() - 1] == q {
            let inner = &s[1..s.len() - 1];
            if !inner.as_bytes().contains(&q) {
                return inner;
            }
        }
    }
    s
}

/// Convert platform path separators to forward slashes
pub fn to_slash(s: &str) -> String {
    if std::path::MAIN_SEPARATOR == '/' {
        s.to_string()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
