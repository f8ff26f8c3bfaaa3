//! Mod Rewriter: once `$mod M` has set a modulus expression, rewrites `x %+= y` / `%-=` / `%*=`
//! / `%/=` into modular equivalents (with a Fermat modular inverse for division).

use lazy_static::lazy_static;
use regex::Regex;

use crate::scan::split_comment;

lazy_static! {
    static ref MOD_OP_RE: Regex = Regex::new(r"^(\s*)(.+?)\s*%([+\-*/])=\s*(.+)$").unwrap();
}

/// Rewrites a single compound modular-assignment line. Non-matching lines, or lines while no
/// modulus is active, are returned unchanged. The trailing comment (if any) is preserved.
pub fn process_mod_ops(line: &str, mod_value: Option<&str>) -> String {
    let mod_value = match mod_value {
        Some(m) => m,
        None => return line.to_string(),
    };

    let (code_part, comment_part) = split_comment(line);
    let caps = match MOD_OP_RE.captures(code_part) {
        Some(c) => c,
        None => return line.to_string(),
    };

    let indent = &caps[1];
    let lhs = caps[2].trim();
    let op = &caps[3];
    let rhs = caps[4].trim();
    let mod_expr = format!("({})", mod_value);

    let new_code = if op == "/" {
        format!("{}{}=({}*pow({},{}-2,{}))%{}", indent, lhs, lhs, rhs, mod_expr, mod_expr, mod_expr)
    } else {
        format!("{}{}=({}{}({}))%{}", indent, lhs, lhs, op, rhs, mod_expr)
    };

    let combined = if !comment_part.trim().is_empty() {
        format!("{} {}", new_code, comment_part.trim_end())
    } else {
        new_code
    };

    format!("{}\n", combined.trim_end())
}
