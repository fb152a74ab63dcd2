//! MySQL-to-T-SQL dialect translation.
//!
//! Translation is rule-based text rewriting, not AST transformation. The rules
//! form an ordered pipeline; each is applied globally and case-insensitively
//! to the whole text. The transform is pure and idempotent: re-applying it to
//! already-translated text is a no-op.

use regex::Regex;
use std::sync::LazyLock;

/// The ordered rewrite rules, applied top to bottom.
static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        // GROUP_CONCAT(expr) -> STRING_AGG(expr, ','). The argument must not
        // itself contain parentheses; nested calls are outside the rule set.
        (
            Regex::new(r"(?is)\bGROUP_CONCAT\s*\(([^)]*)\)").expect("invalid GROUP_CONCAT rule"),
            "STRING_AGG($1, ',')",
        ),
        // NOW() / CURRENT_TIMESTAMP() -> GETDATE()
        (
            Regex::new(r"(?i)\b(?:NOW|CURRENT_TIMESTAMP)\s*\(\s*\)").expect("invalid GETDATE rule"),
            "GETDATE()",
        ),
        // AUTO_INCREMENT -> IDENTITY(1,1)
        (
            Regex::new(r"(?i)\bAUTO_INCREMENT\b").expect("invalid IDENTITY rule"),
            "IDENTITY(1,1)",
        ),
        // `identifier` -> [identifier]
        (
            Regex::new(r"`([^`]+)`").expect("invalid quoting rule"),
            "[$1]",
        ),
        // Trailing top-level LIMIT n -> TOP n hoisted after SELECT [DISTINCT].
        // A LIMIT inside a subquery or CTE is not at the end of the text and
        // passes through untouched; the server rejects it.
        (
            Regex::new(
                r"(?is)^(?P<lead>\s*)(?P<select>SELECT)(?P<distinct>\s+DISTINCT)?\s+(?P<body>.+?)\s+LIMIT\s+(?P<n>\d+)\s*;?\s*$",
            )
            .expect("invalid LIMIT rule"),
            "$lead$select$distinct TOP $n $body",
        ),
    ]
});

/// Rewrite MySQL-flavored query text into T-SQL.
pub fn translate(sql: &str) -> String {
    let mut text = sql.to_string();
    for (pattern, replacement) in RULES.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    text
}
