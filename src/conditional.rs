//! Conditional Processor: evaluates `!if/!elif/!else` chains inside macro bodies against the
//! current call-site bindings.

use std::io::Error;

use lazy_static::lazy_static;
use regex::Regex;

use crate::condeval::evaluate_condition;
use crate::macro_ops::{process_macro_ops, safe_replace, Bindings};
use crate::scan::indent_length;
use crate::sourceline::SourceLine;

lazy_static! {
    static ref IF_RE: Regex = Regex::new(r"^!if\s+(.+?):\s*(.*)$").unwrap();
    static ref ELIF_RE: Regex = Regex::new(r"^!elif\s+(.+?):\s*(.*)$").unwrap();
    static ref ELSE_RE: Regex = Regex::new(r"^!else:\s*(.*)$").unwrap();
}

/// Evaluates `!if`/`!elif`/`!else` chains in `lines` against `bindings`, recursively processing
/// the chosen branch's block, and returns the lines that survive.
pub fn process_conditionals(lines: &[SourceLine], bindings: &Bindings) -> Result<Vec<SourceLine>, Error> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let sl = &lines[i];
        let stripped = sl.content.trim();

        if let Some(caps) = IF_RE.captures(stripped) {
            let mut chain_resolved = false;
            let mut block_to_append: Vec<SourceLine> = Vec::new();

            let raw_expr = caps[1].trim().to_string();
            let inline_code = caps[2].trim().to_string();
            let cond_met = eval_branch_condition(&raw_expr, bindings)?;

            let (block, next_i) = if !inline_code.is_empty() {
                (vec![sl.with_content(format!("{}\n", inline_code))], i + 1)
            } else {
                extract_block(lines, i + 1, indent_length(&sl.content))
            };
            i = next_i;

            if cond_met {
                block_to_append = block;
                chain_resolved = true;
            }

            loop {
                if i >= lines.len() {
                    break;
                }
                let next_sl = &lines[i];
                let next_stripped = next_sl.content.trim();

                if let Some(caps) = ELIF_RE.captures(next_stripped) {
                    let raw_expr = caps[1].trim().to_string();
                    let inline_code = caps[2].trim().to_string();
                    let cond_met = eval_branch_condition(&raw_expr, bindings)?;

                    let (elif_block, next_i) = if !inline_code.is_empty() {
                        (vec![next_sl.with_content(format!("{}\n", inline_code))], i + 1)
                    } else {
                        extract_block(lines, i + 1, indent_length(&next_sl.content))
                    };
                    i = next_i;

                    if !chain_resolved && cond_met {
                        block_to_append = elif_block;
                        chain_resolved = true;
                    }
                } else if let Some(caps) = ELSE_RE.captures(next_stripped) {
                    let inline_code = caps[1].trim().to_string();

                    let (else_block, next_i) = if !inline_code.is_empty() {
                        (vec![next_sl.with_content(format!("{}\n", inline_code))], i + 1)
                    } else {
                        extract_block(lines, i + 1, indent_length(&next_sl.content))
                    };
                    i = next_i;

                    if !chain_resolved {
                        block_to_append = else_block;
                    }
                    break;
                } else {
                    break;
                }
            }

            result.extend(process_conditionals(&block_to_append, bindings)?);
            continue;
        }

        result.push(sl.clone());
        i += 1;
    }

    Ok(result)
}

fn eval_branch_condition(raw_expr: &str, bindings: &Bindings) -> Result<bool, Error> {
    let expr = process_macro_ops(raw_expr, bindings)?;
    let expr = safe_replace(&expr, bindings);
    Ok(evaluate_condition(&expr))
}

/// Consumes lines strictly more indented than `base_indent_len` starting at `start_idx`,
/// stopping at the first non-blank line that isn't. Blank lines are always absorbed.
fn extract_block(lines: &[SourceLine], start_idx: usize, base_indent_len: usize) -> (Vec<SourceLine>, usize) {
    let mut block = Vec::new();
    let mut i = start_idx;

    while i < lines.len() {
        let sl = &lines[i];
        if sl.is_blank() {
            block.push(sl.clone());
            i += 1;
            continue;
        }
        if indent_length(&sl.content) > base_indent_len {
            block.push(sl.clone());
            i += 1;
        } else {
            break;
        }
    }

    (block, i)
}
