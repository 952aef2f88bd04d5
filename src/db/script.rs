//! Multi-statement SQL script splitting.
//!
//! Migration files routinely hold many statements. The store executes one
//! statement at a time so a failure can name the statement that broke; the
//! split respects single- and double-quoted string literals and backslash
//! escapes, and leading `--` comment lines are stripped per statement.

/// Split a script into individual statements.
///
/// A `;` inside a quoted literal never splits. Empty statements (whitespace
/// or comments only) are dropped.
pub fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for ch in text.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_single || in_double => {
                current.push(ch);
                escaped = true;
            }
            '\'' if !in_double => {
                current.push(ch);
                in_single = !in_single;
            }
            '"' if !in_single => {
                current.push(ch);
                in_double = !in_double;
            }
            ';' if !in_single && !in_double => {
                push_statement(&mut statements, &current);
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    push_statement(&mut statements, &current);

    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let stripped = strip_leading_comments(raw);
    if !stripped.is_empty() {
        statements.push(stripped.to_string());
    }
}

/// Drop leading blank lines and `--` comment lines from a statement.
fn strip_leading_comments(raw: &str) -> &str {
    let mut rest = raw;
    loop {
        let trimmed = rest.trim_start();
        if trimmed.starts_with("--") {
            match trimmed.find('\n') {
                Some(nl) => rest = &trimmed[nl + 1..],
                None => return "",
            }
        } else {
            return trimmed.trim_end();
        }
    }
}

/// Statement text for error messages, truncated to 200 characters.
pub fn truncate_statement(stmt: &str) -> String {
    if stmt.chars().count() <= 200 {
        stmt.to_string()
    } else {
        let cut: String = stmt.chars().take(200).collect();
        format!("{}...", cut)
    }
}
