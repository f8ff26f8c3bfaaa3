//! Recursion Detector: scans the final emit stream for a `def` whose body calls itself, and
//! reports whether a recursion-limit preamble is needed.

use lazy_static::lazy_static;
use regex::Regex;

use crate::scan::{indent_length, is_index_safe};
use crate::sourceline::SourceLine;

lazy_static! {
    static ref DEF_RE: Regex = Regex::new(r"^(async\s+)?def\s+([a-zA-Z_]\w*)").unwrap();
}

/// Returns true if any function in `lines` contains an index-safe call to its own name,
/// using an indent-based scope stack (a nested `def` closes its enclosing scopes once the
/// indentation returns to or below its own).
pub fn detect_recursion(lines: &[SourceLine]) -> bool {
    let mut scope_stack: Vec<(String, usize)> = Vec::new();

    for sl in lines {
        let text = &sl.content;
        let stripped = text.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let indent = indent_length(text);
        while let Some(&(_, scope_indent)) = scope_stack.last() {
            if indent <= scope_indent {
                scope_stack.pop();
            } else {
                break;
            }
        }

        if let Some(caps) = DEF_RE.captures(stripped) {
            let func_name = caps[2].to_string();
            scope_stack.push((func_name, indent));
            continue;
        }

        if let Some((current_func, _)) = scope_stack.last() {
            let pattern = format!(r"\b{}\s*\(", regex::escape(current_func));
            let re = Regex::new(&pattern).unwrap();
            for m in re.find_iter(text) {
                if is_index_safe(text, m.start()) {
                    return true;
                }
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourceline::split_into_lines;

    #[test]
    fn detects_direct_self_recursion() {
        let lines = split_into_lines("def f():\n    return f()\n", None);
        assert!(detect_recursion(&lines));
    }

    #[test]
    fn non_recursive_function_is_not_flagged() {
        let lines = split_into_lines("def f():\n    return g()\n", None);
        assert!(!detect_recursion(&lines));
    }

    #[test]
    fn scope_closes_on_dedent() {
        let lines = split_into_lines("def f():\n    pass\ndef g():\n    f()\n", None);
        assert!(!detect_recursion(&lines));
    }
}
