use super::sql::{WhereConfig, WhereConfigOwned};

use anyhow::{anyhow, Result};
use rusqlite::types;
use serde::{Deserialize, Serialize};

///
/// How much of a caller supplied expression is trusted
/// * `Trusted` - only quoted literals are taken out of the expression, the rest is passed through
/// * `Strict` - additionally every token must be a known column, a number, a quoted literal
///   or an allowed operator, keyword or function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterPolicy {
    #[default]
    Trusted,
    Strict,
}

pub const ALLOWED_KEYWORDS: [&str; 9] = [
    "AND", "OR", "NOT", "IS", "NULL", "LIKE", "GLOB", "BETWEEN", "IN",
];

pub const ALLOWED_FUNCTIONS: [&str; 15] = [
    "ABS", "ROUND", "LOWER", "UPPER", "LENGTH", "SUBSTR", "TRIM", "COALESCE", "IFNULL", "DATE",
    "TIME", "DATETIME", "JULIANDAY", "STRFTIME", "REPLACE",
];

const ALLOWED_OPERATORS: [&str; 17] = [
    "<=", ">=", "<>", "!=", "==", "||", "=", "<", ">", "+", "-", "*", "/", "%", "(", ")", ",",
];

/// Characters that start a statement parameter (`?`, `?1`, `:name`, `@name`, `$name`)
const PARAMETER_MARKERS: [char; 4] = ['?', ':', '@', '$'];

///
/// Replace every quoted literal of an expression with a `?` placeholder.
///
/// Literals are delimited by matching single or double quotes,
/// a doubled quote inside a literal stands for the quote itself (`'it''s'`).
/// Parameter markers outside of a literal are refused,
/// every bound value of the expression has to come from a literal.
/// # Returns
/// the rewritten expression and the literals, quotes stripped, in left-to-right order
/// # Examples
/// ```
/// use pathstore::sqlite::filter::extract_literals;
/// let (expr, literals) = extract_literals(r#"temperature > '100.4' AND entry_time < "2022-03-30""#).unwrap();
/// assert_eq!(expr, "temperature > ? AND entry_time < ?");
/// assert_eq!(literals, vec!["100.4", "2022-03-30"]);
/// ```
pub fn extract_literals(expr: &str) -> Result<(String, Vec<String>)> {
    let mut rewritten = String::with_capacity(expr.len());
    let mut literals = vec![];
    let mut chars = expr.chars().peekable();
    while let Some(c) = chars.next() {
        if PARAMETER_MARKERS.contains(&c) {
            return Err(anyhow!(
                "`{}` would be a statement parameter in the expression `{}`, quote the value instead",
                c,
                expr
            ));
        }
        if c != '\'' && c != '"' {
            rewritten.push(c);
            continue;
        }
        let quote = c;
        let mut literal = String::new();
        let mut closed = false;
        while let Some(inner) = chars.next() {
            if inner != quote {
                literal.push(inner);
                continue;
            }
            if chars.peek() == Some(&quote) {
                chars.next();
                literal.push(quote);
                continue;
            }
            closed = true;
            break;
        }
        if !closed {
            return Err(anyhow!(
                "Unterminated literal in the filter `{}`, every {} needs a closing match",
                expr,
                quote
            ));
        }
        rewritten.push('?');
        literals.push(literal);
    }
    Ok((rewritten, literals))
}

///
/// Whether the whole expression sits inside one pair of parentheses, e.g. `(a = ?)`
/// but not `(a = ?) OR (b = ?)`
fn is_enclosed(expr: &str) -> bool {
    if !expr.starts_with('(') || !expr.ends_with(')') {
        return false;
    }
    let mut depth = 0;
    for (i, c) in expr.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return i == expr.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

///
/// Compile a filter expression into a parameterized condition and merge it with a base condition.
///
/// The literals of the filter are bound after the values of the base condition,
/// so the n-th `?` of the result always corresponds to the n-th value.
/// # Arguments
/// * `filter` - the caller's filter, e.g. `(temperature > '100.4')`
/// * `base` - the equality conditions built from the request parameters and their values
/// # Examples
/// ```
/// use pathstore::sqlite::filter::compile_filter;
/// use rusqlite::types::Value;
/// let values = vec![Value::Text("7".to_string())];
/// let (clause, params) = compile_filter("(temperature > '100.4')", ("user_id=?", &values)).unwrap();
/// assert_eq!(clause, "user_id=? AND (temperature > ?)");
/// assert_eq!(params, vec![Value::Text("7".to_string()), Value::Text("100.4".to_string())]);
/// ```
pub fn compile_filter(filter: &str, base: WhereConfig) -> Result<WhereConfigOwned> {
    let (base_clause, base_params) = base;
    let (rewritten, literals) = extract_literals(filter.trim())?;
    let mut params = base_params.to_vec();
    params.extend(literals.into_iter().map(types::Value::Text));
    let clause = match (base_clause.trim().is_empty(), rewritten.is_empty()) {
        (_, true) => base_clause.to_string(),
        (true, false) => rewritten,
        (false, false) if is_enclosed(&rewritten) => format!("{base_clause} AND {rewritten}"),
        (false, false) => format!("{base_clause} AND ({rewritten})"),
    };
    Ok((clause, params))
}

fn next_operator(rest: &str) -> Option<&'static str> {
    ALLOWED_OPERATORS.into_iter().find(|op| rest.starts_with(op))
}

///
/// Verify a caller expression against the allow-list of [FilterPolicy::Strict].
/// Quoted literals are always allowed, they are taken out with [extract_literals] first.
/// # Arguments
/// * `expr` - the expression as the caller wrote it
/// * `columns` - the columns of the target table
pub fn verify_expression(expr: &str, columns: &[&str]) -> Result<()> {
    let (expr, _) = extract_literals(expr.trim())?;
    let reject = |token: &str| {
        anyhow!(
            "`{}` is not allowed in the expression `{}`. \nAllowed: columns {:?}, operators {:?}, keywords {:?}, functions {:?}",
            token,
            expr,
            columns,
            ALLOWED_OPERATORS,
            ALLOWED_KEYWORDS,
            ALLOWED_FUNCTIONS
        )
    };
    for banned in ["--", "/*", "*/", ";"] {
        if expr.contains(banned) {
            return Err(reject(banned));
        }
    }
    let mut i = 0;
    while i < expr.len() {
        let rest = &expr[i..];
        let Some(c) = rest.chars().next() else {
            break;
        };
        if c.is_whitespace() || c == '?' {
            // `?` only stands for a literal here
            i += c.len_utf8();
        } else if c.is_ascii_digit() || c == '.' {
            let len = rest
                .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
                .unwrap_or(rest.len());
            i += len;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let len = rest
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                .unwrap_or(rest.len());
            let word = &rest[..len];
            let upper = word.to_uppercase();
            let is_call = rest[len..].trim_start().starts_with('(');
            let known = columns.iter().any(|col| col.eq_ignore_ascii_case(word))
                || ALLOWED_KEYWORDS.contains(&upper.as_str())
                || (is_call && ALLOWED_FUNCTIONS.contains(&upper.as_str()));
            if !known {
                return Err(reject(word));
            }
            i += len;
        } else if let Some(op) = next_operator(rest) {
            i += op.len();
        } else {
            return Err(reject(&c.to_string()));
        }
    }
    Ok(())
}

///
/// [compile_filter] with the policy applied to the filter before it is merged
pub fn compile_filter_with(
    policy: FilterPolicy,
    filter: &str,
    base: WhereConfig,
    columns: &[&str],
) -> Result<WhereConfigOwned> {
    if policy == FilterPolicy::Strict {
        verify_expression(filter, columns)?;
    }
    compile_filter(filter, base)
}
