/// Appends one raw column value to `out` as a SQL literal.
///
/// An absent value becomes the bare token `NULL`. Everything else is wrapped
/// in single quotes with backslashes escaped before quotes; the single pass
/// over the bytes is equivalent to replacing `\` first and `'` second.
/// Numeric and boolean columns arrive as their textual form and take the
/// same path as strings.
pub fn serialize_value(value: Option<&[u8]>, out: &mut Vec<u8>) {
    match value {
        None => out.extend_from_slice(b"NULL"),
        Some(bytes) => {
            out.push(b'\'');
            for &b in bytes {
                match b {
                    b'\\' => out.extend_from_slice(b"\\\\"),
                    b'\'' => out.extend_from_slice(b"\\'"),
                    _ => out.push(b),
                }
            }
            out.push(b'\'');
        }
    }
}

/// Backtick-quotes an identifier for use in a statement.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
