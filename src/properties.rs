use crate::error::StratumError;
use crate::flat::{flat_to_tree, to_flat_map};
use crate::provider::{Provider, format_error};
use crate::tree::TreeNode;

/// Java-style `.properties`: `key=value` or `key: value` lines, `#` and `!`
/// comments, a trailing `\` continues the value on the next line.
///
/// Keys and values decode the usual escapes: `\t`, `\n`, `\r`, `\f`,
/// `\uXXXX` (surrogate pairs included), and `\` before any other character
/// stands for that character, so `\=`, `\:` and `\ ` put separators and
/// spaces into keys. Rendering escapes what parsing would otherwise misread.
///
/// Values are flat strings; lists and nesting follow the flat-map rules.
pub struct PropertiesProvider;

impl Provider for PropertiesProvider {
    fn name(&self) -> &str {
        "properties"
    }

    fn extensions(&self) -> &[&'static str] {
        &["properties"]
    }

    fn parse(&self, bytes: &[u8]) -> Result<TreeNode, StratumError> {
        let text = std::str::from_utf8(bytes).map_err(|e| format_error("properties", e))?;
        flat_to_tree(parse_lines(text)?, false)
    }

    fn render(&self, tree: &TreeNode) -> Result<Vec<u8>, StratumError> {
        let mut out = String::new();
        for (key, value) in to_flat_map(tree) {
            out.push_str(&escape(&key, true));
            out.push('=');
            out.push_str(&escape(&value, false));
            out.push('\n');
        }
        Ok(out.into_bytes())
    }
}

fn parse_lines(text: &str) -> Result<Vec<(String, String)>, StratumError> {
    let mut entries = Vec::new();
    let mut pending = String::new();
    for (number, raw) in text.lines().enumerate() {
        let line = if pending.is_empty() { raw.trim() } else { raw.trim_start() };
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }
        if ends_in_escape(line) {
            pending.push_str(&line[..line.len() - 1]);
            continue;
        }
        pending.push_str(line);
        let logical = std::mem::take(&mut pending);
        let line_no = number + 1;
        let Some(split) = separator(&logical) else {
            return Err(format_error(
                "properties",
                format!("line {line_no}: expected key=value, got '{logical}'"),
            ));
        };
        let key = unescape(trim_key(&logical[..split]), line_no)?;
        let value = unescape(logical[split + 1..].trim_start(), line_no)?;
        entries.push((key, value));
    }
    Ok(entries)
}

/// Whether `text` ends in an odd run of backslashes.
fn ends_in_escape(text: &str) -> bool {
    text.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Byte offset of the first unescaped `=` or `:`.
fn separator(line: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '=' | ':' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Trim trailing whitespace, keeping one escaped whitespace character.
fn trim_key(raw: &str) -> &str {
    let raw = raw.trim_start();
    let trimmed = raw.trim_end();
    match raw[trimmed.len()..].chars().next() {
        Some(c) if ends_in_escape(trimmed) => &raw[..trimmed.len() + c.len_utf8()],
        _ => trimmed,
    }
}

fn unescape(raw: &str, line_no: usize) -> Result<String, StratumError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => out.push(unicode_escape(&mut chars, line_no)?),
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

/// Decode the hex digits after `\\u`, joining a surrogate pair.
fn unicode_escape(chars: &mut std::str::Chars<'_>, line_no: usize) -> Result<char, StratumError> {
    let malformed = || format_error("properties", format!("line {line_no}: malformed \\uXXXX escape"));
    let high = hex4(chars).ok_or_else(malformed)?;
    if !(0xD800..0xDC00).contains(&high) {
        return char::from_u32(high).ok_or_else(malformed);
    }
    if chars.next() != Some('\\') || chars.next() != Some('u') {
        return Err(malformed());
    }
    let low = hex4(chars).filter(|low| (0xDC00..0xE000).contains(low)).ok_or_else(malformed)?;
    char::from_u32(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)).ok_or_else(malformed)
}

fn hex4(chars: &mut std::str::Chars<'_>) -> Option<u32> {
    let digits: String = chars.by_ref().take(4).collect();
    if digits.len() != 4 {
        return None;
    }
    u32::from_str_radix(&digits, 16).ok()
}

fn escape(text: &str, key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{c}' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' if key => {
                out.push('\\');
                out.push(c);
            }
            ' ' if key || i == 0 => out.push_str("\\ "),
            _ => out.push(c),
        }
    }
    out
}
