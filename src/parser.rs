//! Splitting of single CSV lines into cleaned field values.
//!
//! A comma only separates fields when an even number of double quotes follows
//! it on the rest of the line. For lines with balanced quotes this is the usual
//! "not inside a quoted span" rule; for unbalanced lines it still yields a
//! best-effort split instead of an error.

/// Split `line` on unquoted commas and clean every field.
pub fn parse_line(line: &str) -> Vec<String> {
    split_fields(line).into_iter().map(clean_field).collect()
}

/// Split `line` on commas that are followed by an even number of quotes.
/// Fields are returned raw, quotes and whitespace untouched.
pub fn split_fields(line: &str) -> Vec<&str> {
    let mut quotes_left = line.bytes().filter(|&b| b == b'"').count();
    let mut fields = Vec::new();
    let mut start = 0;

    for (pos, byte) in line.bytes().enumerate() {
        match byte {
            b'"' => quotes_left -= 1,
            b',' if quotes_left % 2 == 0 => {
                fields.push(&line[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    fields.push(&line[start..]);
    fields
}

/// Trim whitespace, drop one layer of wrapping quotes and strip any quote left
/// inside the value. Doubled quotes (`""`) vanish completely.
pub fn clean_field(raw: &str) -> String {
    let trimmed = raw.trim();
    let unwrapped = if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    unwrapped.replace('"', "")
}

/// Normalize a raw header name into a stable configuration key:
/// lowercase, runs of non alphanumeric characters collapsed into `_`.
pub fn normalize_header(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for chr in raw.trim().chars() {
        if chr.is_alphanumeric() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.extend(chr.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    key
}
