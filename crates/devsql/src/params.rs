//! Placeholder substitution for logged SQL.

use tokio_postgres::types::ToSql;

/// Replace `$n` placeholders with the `Debug` rendering of the matching
/// parameter.
///
/// The result is for display and duplicate detection only; it is never sent
/// to the server. Placeholders inside single-quoted literals or double-quoted
/// identifiers are kept, as are indices with no matching parameter. Doubled
/// quotes and backslash escapes in `E'...'` strings stay inside the literal.
pub fn interpolate(sql: &str, params: &[&(dyn ToSql + Sync)]) -> String {
    if params.is_empty() {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len() + params.len() * 8);
    let mut quote: Option<char> = None;
    // Inside an `E'...'` literal, where `\'` does not end the string.
    let mut escapes = false;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            (Some('\''), '\\') if escapes => {
                out.push(c);
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            }
            (Some(q), c) if c == q => {
                quote = None;
                out.push(c);
            }
            (Some(_), c) => out.push(c),
            (None, '\'' | '"') => {
                escapes = c == '\'' && is_escape_prefix(&sql[..i]);
                quote = Some(c);
                out.push(c);
            }
            (None, '$') => {
                let start = i + 1;
                let mut end = start;
                while let Some(&(j, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    end = j + 1;
                    chars.next();
                }
                let param = sql[start..end]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|idx| params.get(idx));
                match param {
                    Some(p) => out.push_str(&format!("{p:?}")),
                    None => out.push_str(&sql[i..end]),
                }
            }
            (None, c) => out.push(c),
        }
    }

    out
}

/// Whether `before` ends in a standalone `E`, making the next literal an
/// escape string.
fn is_escape_prefix(before: &str) -> bool {
    let mut rev = before.chars().rev();
    matches!(rev.next(), Some('E' | 'e'))
        && !rev.next().is_some_and(|p| p.is_ascii_alphanumeric() || p == '_')
}
