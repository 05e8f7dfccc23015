//! Structural repair — textual fixes applied before a final strict parse.
//!
//! Three independent repairs, each tracking quote/escape state explicitly
//! so content outside string literals is never touched:
//! 1. raw newlines inside strings become escape sequences,
//! 2. oversized string values are truncated with a marker,
//! 3. strings that run into a structural delimiter get their missing
//!    closing quote back.

/// Longest string value kept intact; anything longer is cut to bound
/// downstream storage and comparison cost.
pub const MAX_STRING_LEN: usize = 2_000;

/// Appended to a truncated string value.
pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// Apply all three repairs in order.
pub fn repair_structure(text: &str) -> String {
    let escaped = escape_raw_newlines(text);
    let bounded = truncate_long_strings(&escaped, MAX_STRING_LEN);
    close_unterminated_strings(&bounded)
}

/// Replace literal newline/carriage-return characters inside quoted
/// strings with their escape sequences. Content outside strings is
/// untouched.
pub fn escape_raw_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if escaped {
            out.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => {
                out.push(ch);
                escaped = true;
            }
            '"' => {
                in_string = !in_string;
                out.push(ch);
            }
            '\n' if in_string => out.push_str("\\n"),
            '\r' if in_string => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }

    out
}

/// Truncate any quoted string longer than `max_len` characters, appending
/// [`TRUNCATION_MARKER`] before the closing quote. Surrounding structure
/// is preserved exactly.
pub fn truncate_long_strings(text: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut run_len = 0usize;
    let mut truncated = false;

    for ch in text.chars() {
        if !in_string {
            if ch == '"' {
                in_string = true;
                run_len = 0;
                truncated = false;
            }
            out.push(ch);
            continue;
        }

        if escaped {
            // Complete an escape sequence that started within budget.
            if !truncated {
                out.push(ch);
            }
            escaped = false;
            continue;
        }

        if ch == '"' {
            if truncated {
                out.push_str(TRUNCATION_MARKER);
            }
            in_string = false;
            out.push(ch);
            continue;
        }

        if run_len >= max_len {
            truncated = true;
            if ch == '\\' {
                escaped = true;
            }
            continue;
        }

        run_len += 1;
        if ch == '\\' {
            escaped = true;
        }
        out.push(ch);
    }

    out
}

/// Insert a closing quote where a string runs into a structural delimiter
/// (comma, closing brace/bracket) without one. A delimiter only counts as
/// structural when what follows it looks like structure rather than prose,
/// so "Vitamin C, as ascorbic acid" survives intact. A string still open
/// at end of input is closed there.
pub fn close_unterminated_strings(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 2);
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if escaped {
            out.push(ch);
            escaped = false;
            continue;
        }
        if !in_string {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
            continue;
        }
        match ch {
            '\\' => {
                out.push(ch);
                escaped = true;
            }
            '"' => {
                in_string = false;
                out.push(ch);
            }
            ',' | '}' | ']' => {
                if next_looks_structural(&chars[i + 1..]) {
                    out.push('"');
                    in_string = false;
                }
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }

    if in_string {
        out.push('"');
    }

    out
}

fn next_looks_structural(rest: &[char]) -> bool {
    matches!(
        rest.iter().find(|c| !c.is_whitespace()),
        None | Some('"') | Some('}') | Some(']')
    )
}
