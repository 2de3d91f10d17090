//! Pulling SQL out of model answers and keeping it read-only.

use regex::Regex;

/// Keywords that may never appear in an assistant query.
pub const BLOCKED_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "REPLACE", "GRANT",
    "REVOKE", "ATTACH", "DETACH", "PRAGMA", "VACUUM",
];

/// Columns holding secrets.
pub const SENSITIVE_COLUMNS: &[&str] = &["password_hash", "otp_hash", "token"];

/// Find the SQL statement in a model answer.
///
/// A fenced ```sql block wins; otherwise the first `SELECT` up to its
/// semicolon (or the end of the text).
pub fn extract_sql(answer: &str) -> Option<String> {
    let fenced = Regex::new(r"(?is)```sql\s*(.*?)```").ok()?;
    if let Some(block) = fenced.captures(answer).and_then(|c| c.get(1)) {
        let sql = block.as_str().trim();
        if !sql.is_empty() {
            return Some(sql.to_string());
        }
    }

    let inline = Regex::new(r"(?is)\bSELECT\b[^;]*(?:;|$)").ok()?;
    inline
        .find(answer)
        .map(|m| m.as_str().trim().to_string())
        .filter(|sql| !sql.is_empty())
}

/// Check that `sql` is a single read-only statement.
///
/// Returns the statement without its trailing semicolon, or the reason it
/// was refused.
pub fn guard(sql: &str) -> Result<String, String> {
    let statement = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if statement.is_empty() {
        return Err("empty statement".into());
    }

    // Keywords inside string literals are data, not SQL.
    let literals = Regex::new(r"'(?:[^']|'')*'").map_err(|e| e.to_string())?;
    let code = literals.replace_all(statement, "''");

    if code.contains(';') {
        return Err("only a single statement is allowed".into());
    }
    if code.contains("--") || code.contains("/*") {
        return Err("comments are not allowed".into());
    }

    let words = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").map_err(|e| e.to_string())?;
    let first = words
        .find(&code)
        .map(|m| m.as_str().to_ascii_uppercase())
        .unwrap_or_default();
    if first != "SELECT" && first != "WITH" {
        return Err("only SELECT queries are allowed".into());
    }

    for token in words.find_iter(&code).map(|m| m.as_str()) {
        let upper = token.to_ascii_uppercase();
        if BLOCKED_KEYWORDS.contains(&upper.as_str()) {
            return Err(format!("keyword {upper} is not allowed"));
        }
        let lower = token.to_ascii_lowercase();
        if SENSITIVE_COLUMNS.contains(&lower.as_str()) {
            return Err(format!("column {lower} is not available"));
        }
    }

    Ok(statement.to_string())
}
