//! Macro-operator rewriting (`!len(x)`, `x![i]`, `x![a:b]`, `x![a:b:c]`) and final identifier
//! substitution against a call-site binding map.

use std::collections::HashMap;
use std::io::Error;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::error::*;

/// A value a parameter name is bound to: either a single token (non-variadic argument, or a
/// scalar method placeholder) or a list of tokens (a variadic parameter, or a starred
/// method-placeholder tuple).
#[derive(Debug, Clone)]
pub enum BoundValue {
    Scalar(String),
    List(Vec<String>),
}

impl BoundValue {
    fn render(&self) -> String {
        match self {
            BoundValue::Scalar(s) => s.clone(),
            BoundValue::List(items) => items.join(", "),
        }
    }
}

pub type Bindings = HashMap<String, BoundValue>;

lazy_static! {
    static ref LEN_RE: Regex = Regex::new(r"!len\(\s*([a-zA-Z_]\w*)\s*\)").unwrap();
    static ref ACCESSOR_RE: Regex = Regex::new(r"([a-zA-Z_]\w*)!\[\s*(.*?)\s*\]").unwrap();
    static ref IDENT_RE: Regex = Regex::new(r"[a-zA-Z_]\w*").unwrap();
}

/// Rewrites `!len(x)` and `x![...]` forms in `text` against `bindings`. Returns
/// `Err(MacroIndexError-shaped std::io::Error)` if an index/slice operator is used on an
/// incompatible binding or is out of range.
pub fn process_macro_ops(text: &str, bindings: &Bindings) -> Result<String, Error> {
    let after_len = LEN_RE.replace_all(text, |caps: &Captures| {
        let name = &caps[1];
        match bindings.get(name) {
            Some(BoundValue::List(items)) => items.len().to_string(),
            Some(BoundValue::Scalar(_)) => "1".to_string(),
            None => caps[0].to_string(),
        }
    });

    rewrite_accessors(&after_len, bindings)
}

fn rewrite_accessors(text: &str, bindings: &Bindings) -> Result<String, Error> {
    let mut result = String::with_capacity(text.len());
    let mut last_end = 0;

    for caps in ACCESSOR_RE.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        result.push_str(&text[last_end..whole.start()]);

        let name = &caps[1];
        let content = caps[2].trim();

        match bindings.get(name) {
            Some(binding) => {
                result.push_str(&apply_accessor(name, binding, content)?);
            }
            None => result.push_str(whole.as_str()),
        }
        last_end = whole.end();
    }
    result.push_str(&text[last_end..]);
    Ok(result)
}

fn apply_accessor(name: &str, binding: &BoundValue, content: &str) -> Result<String, Error> {
    if content.contains(':') {
        let list: Vec<String> = match binding {
            BoundValue::List(items) => items.clone(),
            BoundValue::Scalar(s) => vec![s.clone()],
        };
        let parts: Vec<&str> = content.split(':').collect();
        let start_str = parts.first().copied().unwrap_or("").trim();
        let end_str = parts.get(1).copied().unwrap_or("").trim();
        let step_str = parts.get(2).copied().unwrap_or("").trim();

        let len = list.len() as i64;
        let start = if start_str.is_empty() { 0 } else {
            start_str.parse::<i64>().map_err(|_| error!("Invalid slice start in {}![{}]", name, content))?
        };
        let end = if end_str.is_empty() { len } else {
            end_str.parse::<i64>().map_err(|_| error!("Invalid slice end in {}![{}]", name, content))?
        };
        let step = if step_str.is_empty() { 1 } else {
            step_str.parse::<i64>().map_err(|_| error!("Invalid slice step in {}![{}]", name, content))?
        };

        let sliced = python_slice(&list, start, end, step);
        Ok(sliced.join(", "))
    } else {
        let idx: i64 = content
            .parse()
            .map_err(|_| error!("Invalid index in {}![{}]", name, content))?;

        match binding {
            BoundValue::List(items) => {
                let len = items.len() as i64;
                let resolved = if idx < 0 { idx + len } else { idx };
                if resolved < 0 || resolved >= len {
                    Err(error!("Macro index out of range: {}![{}] (len={})", name, idx, items.len()))
                } else {
                    Ok(items[resolved as usize].clone())
                }
            }
            BoundValue::Scalar(s) => {
                if idx == 0 {
                    Ok(s.clone())
                } else {
                    Err(error!("Cannot use index operator ![] on non-variadic: {}", name))
                }
            }
        }
    }
}

/// Python-style `list[start:end:step]` slicing over `&[String]`, returning owned clones.
fn python_slice(list: &[String], start: i64, end: i64, step: i64) -> Vec<String> {
    if step == 0 || list.is_empty() {
        return Vec::new();
    }
    let len = list.len() as i64;
    let clamp = |i: i64| -> i64 {
        let i = if i < 0 { i + len } else { i };
        i.max(0).min(len)
    };

    let mut out = Vec::new();
    if step > 0 {
        let mut i = clamp(start);
        let end = clamp(end);
        while i < end {
            out.push(list[i as usize].clone());
            i += step;
        }
    } else {
        let mut i = clamp(start).min(len - 1);
        let end = clamp(end);
        while i > end {
            out.push(list[i as usize].clone());
            i += step;
        }
    }
    out
}

/// Replaces every whole-word occurrence of each bound name in `text` with its rendered value.
/// This is a blunt word-boundary regex substitution, not gated by `is_index_safe` — callers
/// rely on that when rewriting macro bodies.
pub fn safe_replace(text: &str, bindings: &Bindings) -> String {
    IDENT_RE
        .replace_all(text, |caps: &Captures| {
            let word = &caps[0];
            match bindings.get(word) {
                Some(v) => v.render(),
                None => word.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings_from(pairs: &[(&str, BoundValue)]) -> Bindings {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn len_of_variadic() {
        let bindings = bindings_from(&[("xs", BoundValue::List(vec!["7".into(), "8".into(), "9".into()]))]);
        let out = process_macro_ops("!len(xs)", &bindings).unwrap();
        assert_eq!(out, "3");
    }

    #[test]
    fn indexing_and_step_slicing() {
        let bindings = bindings_from(&[("xs", BoundValue::List(vec!["7".into(), "8".into(), "9".into()]))]);
        assert_eq!(process_macro_ops("xs![0]", &bindings).unwrap(), "7");
        assert_eq!(process_macro_ops("xs![-1]", &bindings).unwrap(), "9");
        assert_eq!(process_macro_ops("xs![::2]", &bindings).unwrap(), "7, 9");
    }

    #[test]
    fn out_of_range_index_errors() {
        let bindings = bindings_from(&[("xs", BoundValue::List(vec!["7".into()]))]);
        assert!(process_macro_ops("xs![5]", &bindings).is_err());
    }

    #[test]
    fn safe_replace_substitutes_bound_identifiers() {
        let bindings = bindings_from(&[("x", BoundValue::Scalar("3+1".into()))]);
        assert_eq!(safe_replace("x*x", &bindings), "3+1*3+1");
    }
}
