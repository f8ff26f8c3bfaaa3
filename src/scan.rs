//! Low-level text scanning helpers shared by the expansion driver: string/comment-aware
//! position checks, bracket-aware argument splitting and indentation bookkeeping.

use crate::sourceline::SourceLine;

/// Returns whether byte offset `target` in `text` sits outside any `'`/`"` string literal and
/// before the first unescaped `#` comment marker. Most macro/define matches are gated on this
/// before being accepted.
pub fn is_index_safe(text: &str, target: usize) -> bool {
    let mut in_sq = false;
    let mut in_dq = false;
    let mut escape = false;

    for (i, c) in text.char_indices() {
        if i == target {
            return !(in_sq || in_dq);
        }
        if c == '#' && !in_sq && !in_dq {
            return false;
        }
        if escape {
            escape = false;
            continue;
        }
        if c == '\\' {
            escape = true;
            continue;
        }
        if c == '\'' && !in_dq {
            in_sq = !in_sq;
        } else if c == '"' && !in_sq {
            in_dq = !in_dq;
        }
    }
    true
}

/// Splits `text` at the first index-safe `#`, returning `(code, comment)` where `comment`
/// (if any) still includes the `#` itself.
pub fn split_comment(text: &str) -> (&str, &str) {
    let mut in_sq = false;
    let mut in_dq = false;
    let mut escape = false;

    for (i, c) in text.char_indices() {
        if c == '#' && !in_sq && !in_dq {
            return (&text[..i], &text[i..]);
        }
        if escape {
            escape = false;
            continue;
        }
        if c == '\\' {
            escape = true;
            continue;
        }
        if c == '\'' && !in_dq {
            in_sq = !in_sq;
        } else if c == '"' && !in_sq {
            in_dq = !in_dq;
        }
    }
    (text, "")
}

/// Length, in characters, of the leading run of plain spaces/tabs.
pub fn indent_length(text: &str) -> usize {
    text.chars().take_while(|&c| c == ' ' || c == '\t').count()
}

/// Splits `text` on top-level commas, tracking `()[]{}` nesting depth and `'`/`"` string
/// literals (with backslash escaping), discarding empty trailing fragments. Used both for
/// macro-call argument lists and for placeholder-tuple splitting.
pub fn smart_split_args(text: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut in_quote = false;
    let mut quote_char = ' ';
    let mut escape = false;

    for c in text.chars() {
        if escape {
            current.push(c);
            escape = false;
            continue;
        }
        if c == '\\' {
            current.push(c);
            escape = true;
            continue;
        }

        if in_quote {
            if c == quote_char {
                in_quote = false;
            }
            current.push(c);
        } else {
            match c {
                '"' | '\'' => {
                    in_quote = true;
                    quote_char = c;
                    current.push(c);
                }
                '(' | '[' | '{' => {
                    depth += 1;
                    current.push(c);
                }
                ')' | ']' | '}' => {
                    depth -= 1;
                    current.push(c);
                }
                ',' if depth == 0 => {
                    args.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(c),
            }
        }
    }
    if !current.trim().is_empty() {
        args.push(current.trim().to_string());
    }

    args.into_iter().filter(|a| !a.is_empty()).collect()
}

/// De-indents a block of lines so the shallowest non-blank line starts at column 0, and
/// replaces blank lines with a bare newline (preserving their origin).
pub fn dedent_block(lines: &[SourceLine]) -> Vec<SourceLine> {
    if lines.is_empty() {
        return Vec::new();
    }

    let indent_len = lines
        .iter()
        .find(|l| !l.content.trim().is_empty())
        .map(|l| indent_length(&l.content))
        .unwrap_or(0);

    lines
        .iter()
        .map(|sl| {
            if sl.content.trim().is_empty() {
                SourceLine::new("\n".to_string(), sl.origin_file.clone(), sl.origin_line)
            } else {
                let chars: Vec<char> = sl.content.chars().collect();
                let new_text: String = if chars.len() >= indent_len {
                    chars[indent_len..].iter().collect()
                } else {
                    sl.content.trim_start().to_string()
                };
                SourceLine::new(new_text, sl.origin_file.clone(), sl.origin_line)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_safe_respects_quotes_and_comments() {
        let text = "a = \"b#c\" # real comment";
        let hash_inside_string = text.find('#').unwrap();
        assert!(!is_index_safe(text, hash_inside_string));
        let real_hash = text.rfind('#').unwrap();
        assert!(!is_index_safe(text, real_hash));
        assert!(is_index_safe(text, 0));
    }

    #[test]
    fn split_comment_keeps_hash_in_strings_intact() {
        let (code, comment) = split_comment("a %+= 1 # add one");
        assert_eq!(code, "a %+= 1 ");
        assert_eq!(comment, "# add one");
    }

    #[test]
    fn smart_split_args_respects_nesting_and_quotes() {
        let args = smart_split_args("a, (b, c), \"d, e\"");
        assert_eq!(args, vec!["a", "(b, c)", "\"d, e\""]);
    }
}
