//! Delimited-text encoding for the smartCARS wire format.
//!
//! Fields within a record are joined with `,` or `|` and records within a
//! list with `;`. The protocol has no escaping: any occurrence of the
//! delimiter inside a rendered value is stripped outright, which is what
//! deployed clients expect. Do not "fix" this into proper escaping.

use std::fmt::Display;

/// Join rendered fields with `separator`, removing the separator from each
/// field first.
pub fn join_fields<S: AsRef<str>>(separator: char, fields: &[S]) -> String {
    let joiner = separator.to_string();
    fields
        .iter()
        .map(|field| field.as_ref().replace(separator, ""))
        .collect::<Vec<_>>()
        .join(&joiner)
}

/// Render an optional scalar for the wire. Absent values are empty, never a
/// literal "null" token.
pub fn opt_field<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
