//! SQL formatting for log output.

/// Formats SQL text right before it is logged.
///
/// Formatting runs after truncation, so implementations see the shortened
/// statement.
pub trait SqlFormatter: Send + Sync {
    /// Format the SQL for display.
    fn format(&self, sql: &str) -> String;

    /// Whether [`SqlFormatter::format`] returns its input unchanged.
    ///
    /// Callers use this to skip the formatting call entirely.
    fn is_passthrough(&self) -> bool {
        false
    }
}

/// A formatter that leaves SQL as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughFormatter;

impl SqlFormatter for PassthroughFormatter {
    fn format(&self, sql: &str) -> String {
        sql.to_string()
    }

    fn is_passthrough(&self) -> bool {
        true
    }
}

const KEYWORDS: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "AVERAGE", "BETWEEN", "BY", "CASE", "COUNT", "CROSS", "DELETE",
    "DESC", "DISTINCT", "ELSE", "END", "EXISTS", "FALSE", "FOR", "FROM", "FULL", "GROUP",
    "HAVING", "ILIKE", "IN", "INNER", "INSERT", "INTO", "IS", "JOIN", "LEFT", "LIKE", "LIMIT",
    "MAX", "MIN", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER", "RETURNING", "RIGHT",
    "SELECT", "SET", "SUM", "THEN", "TRUE", "UNION", "UPDATE", "USING", "VALUES", "WHEN",
    "WHERE", "WITH",
];

/// Keywords that start a new line when reindenting (top level only).
const CLAUSE_KEYWORDS: &[&str] = &[
    "FROM", "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET", "UNION", "VALUES", "SET",
    "RETURNING", "JOIN", "LEFT", "RIGHT", "INNER", "FULL", "CROSS",
];

const JOIN_MODIFIERS: &[&str] = &["LEFT", "RIGHT", "INNER", "FULL", "CROSS", "OUTER"];

/// Uppercases SQL keywords, optionally putting each top-level clause on its
/// own line.
///
/// Quoted literals, quoted identifiers and comments are copied verbatim.
#[derive(Debug, Clone, Copy)]
pub struct KeywordFormatter {
    /// Break lines before top-level clauses.
    pub reindent: bool,
}

impl Default for KeywordFormatter {
    fn default() -> Self {
        Self { reindent: true }
    }
}

impl KeywordFormatter {
    /// Create a formatter with reindenting enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable reindenting.
    pub fn reindent(mut self, reindent: bool) -> Self {
        self.reindent = reindent;
        self
    }

    fn push_word(
        &self,
        out: &mut String,
        word: &str,
        depth: usize,
        prev: Option<&str>,
        is_call: bool,
    ) {
        let upper = word.to_ascii_uppercase();
        if !KEYWORDS.contains(&upper.as_str()) {
            out.push_str(word);
            return;
        }

        // `LEFT OUTER JOIN` stays on one line.
        let continues_join = upper == "JOIN" && prev.is_some_and(|p| JOIN_MODIFIERS.contains(&p));
        // `IS DISTINCT FROM` is an operator, not a clause.
        let distinct_from = upper == "FROM" && prev == Some("DISTINCT");
        let breaks = self.reindent
            && depth == 0
            && !is_call
            && !continues_join
            && !distinct_from
            && CLAUSE_KEYWORDS.contains(&upper.as_str())
            && !out.trim_end().is_empty();
        if breaks {
            let trimmed = out.trim_end().len();
            out.truncate(trimmed);
            out.push('\n');
        }
        out.push_str(&upper);
    }
}

impl SqlFormatter for KeywordFormatter {
    fn format(&self, sql: &str) -> String {
        let mut out = String::with_capacity(sql.len() + 16);
        let mut depth = 0usize;
        let mut prev_word: Option<String> = None;
        let mut chars = sql.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '\'' | '"' => {
                    let mut end = sql.len();
                    for (j, d) in chars.by_ref() {
                        if d == c {
                            end = j + d.len_utf8();
                            break;
                        }
                    }
                    out.push_str(&sql[i..end]);
                }
                '-' if chars.peek().is_some_and(|&(_, d)| d == '-') => {
                    let end = sql[i..].find('\n').map_or(sql.len(), |n| i + n);
                    out.push_str(&sql[i..end]);
                    while chars.peek().is_some_and(|&(j, _)| j < end) {
                        chars.next();
                    }
                }
                '/' if chars.peek().is_some_and(|&(_, d)| d == '*') => {
                    let end = sql[i + 2..].find("*/").map_or(sql.len(), |n| i + 2 + n + 2);
                    out.push_str(&sql[i..end]);
                    while chars.peek().is_some_and(|&(j, _)| j < end) {
                        chars.next();
                    }
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let mut end = i + 1;
                    while let Some(&(j, d)) = chars.peek() {
                        if !(d.is_ascii_alphanumeric() || d == '_') {
                            break;
                        }
                        end = j + 1;
                        chars.next();
                    }
                    let word = &sql[i..end];
                    let is_call = chars.peek().is_some_and(|&(_, d)| d == '(');
                    self.push_word(&mut out, word, depth, prev_word.as_deref(), is_call);
                    prev_word = Some(word.to_ascii_uppercase());
                }
                '(' => {
                    depth += 1;
                    out.push(c);
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    out.push(c);
                }
                c => out.push(c),
            }
        }

        out
    }
}
