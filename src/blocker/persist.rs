//! Line format of `url_blocker.txt`
//!
//! Each pattern is one line of six `|`-separated fields:
//! `id|type|pattern|description|added_time|enabled`. Backslash, `|` and
//! newlines inside a field are escaped with a backslash.

use super::pattern::{BlockKind, BlockPattern};

pub(crate) const FIELD_COUNT: usize = 6;

pub(crate) fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Splits a line on unescaped `|` and unescapes every field
pub(crate) fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => current.push('\n'),
                Some(other) => current.push(other),
                None => current.push('\\'),
            },
            '|' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

pub(crate) fn format_line(pattern: &BlockPattern) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}",
        pattern.id,
        pattern.kind,
        escape_field(&pattern.pattern),
        escape_field(&pattern.description),
        pattern.added_time,
        u8::from(pattern.enabled)
    )
}

/// Parses one line; the error string says why the line was rejected
pub(crate) fn parse_line(line: &str) -> Result<BlockPattern, String> {
    let fields = split_fields(line);
    if fields.len() != FIELD_COUNT {
        return Err(format!("expected {} fields, got {}", FIELD_COUNT, fields.len()));
    }

    let id: u64 = fields[0]
        .parse()
        .map_err(|_| format!("invalid id '{}'", fields[0]))?;
    let kind: BlockKind = fields[1].parse().map_err(|e| format!("{}", e))?;
    let added_time: i64 = fields[4]
        .parse()
        .map_err(|_| format!("invalid timestamp '{}'", fields[4]))?;
    let enabled = match fields[5].as_str() {
        "1" => true,
        "0" => false,
        other => return Err(format!("invalid enabled flag '{}'", other)),
    };

    BlockPattern::new(id, kind, &fields[2], &fields[3], added_time, enabled)
        .map_err(|e| e.to_string())
}
