//! Display-oriented SQL shortening.
//!
//! Two rewrites are applied, always in this order:
//!
//! 1. numeric `IN (...)` lists keep their first three items and end in `...`;
//! 2. the field list between `SELECT` and the first `FROM` becomes `...`.
//!
//! Both are idempotent. Keyword matching is case-sensitive: `SELECT`, `FROM`,
//! `IN` and the aggregate names must be uppercase, so lowercase SQL passes
//! through untouched.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::OnceLock;

/// Number of items kept from a numeric `IN` list.
const KEEP_IN_ITEMS: usize = 3;

const ELLIPSIS: &str = "...";

fn in_numbers_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"IN\s*\(([\d\s,]+)\)").expect("invalid built-in IN-list regex")
    })
}

fn select_fields_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SELECT .*? FROM").expect("invalid built-in SELECT regex"))
}

fn aggregate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^SELECT .*?(COUNT|SUM|AVERAGE|MIN|MAX).*? FROM")
            .expect("invalid built-in aggregate regex")
    })
}

/// Shorten numeric `IN (...)` lists to their first three items.
///
/// `IN (1,2,3,4,5)` becomes `IN (1, 2, 3, ...)`. Lists with three items or
/// fewer, and lists containing anything other than digits, whitespace and
/// commas, are left as they are.
pub fn truncate_in_lists(sql: &str) -> Cow<'_, str> {
    in_numbers_re().replace_all(sql, |caps: &Captures<'_>| {
        let items: Vec<&str> = caps[1].split(',').collect();
        if items.len() <= KEEP_IN_ITEMS {
            return caps[0].to_string();
        }
        let mut kept: Vec<&str> = items[..KEEP_IN_ITEMS].iter().map(|s| s.trim()).collect();
        kept.push(ELLIPSIS);
        format!("IN ({})", kept.join(", "))
    })
}

/// Whether the statement starts with a `SELECT` whose field list uses
/// `COUNT`, `SUM`, `AVERAGE`, `MIN` or `MAX`.
pub fn is_aggregate(sql: &str) -> bool {
    aggregate_re().is_match(sql)
}

/// Replace `SELECT <fields> FROM` with `SELECT ... FROM`.
///
/// When `collapse_aggregates` is `false`, aggregate statements (see
/// [`is_aggregate`]) keep their field list since it is short and says what
/// the query computes.
pub fn truncate_select_fields(sql: &str, collapse_aggregates: bool) -> Cow<'_, str> {
    if !collapse_aggregates && is_aggregate(sql) {
        return Cow::Borrowed(sql);
    }
    select_fields_re().replace_all(sql, "SELECT ... FROM")
}

/// Apply [`truncate_in_lists`] then [`truncate_select_fields`].
pub fn truncate_sql(sql: &str, collapse_aggregates: bool) -> Cow<'_, str> {
    match truncate_in_lists(sql) {
        Cow::Borrowed(s) => truncate_select_fields(s, collapse_aggregates),
        Cow::Owned(s) => Cow::Owned(truncate_select_fields(&s, collapse_aggregates).into_owned()),
    }
}
