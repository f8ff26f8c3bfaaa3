//! Expansion Driver: the fixed-point loop that repeatedly finds the next macro/define call-site
//! in the source stream and splices in its expanded body, plus the directives (`$using`, `$mod`,
//! `$cases`, `?`-debug lines) that live alongside it at the top level.

use std::collections::{HashMap, HashSet};
use std::io::Error;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::conditional::process_conditionals;
use crate::definition::{parse_definitions, Active, Definition, DefinitionKind, DefinitionSlot, Placeholder};
use crate::error::*;
use crate::loader::expand_files;
use crate::macro_ops::{process_macro_ops, safe_replace, BoundValue, Bindings};
use crate::modrewrite::process_mod_ops;
use crate::namespace::{extract_namespaces, Namespaces};
use crate::scan::{indent_length, is_index_safe, dedent_block, smart_split_args};
use crate::arith::try_eval_math;
use crate::sourceline::SourceLine;

/// Call-sites that keep triggering further expansion past this many rounds on the same line are
/// treated as a runaway (self-referential) macro rather than legitimate nesting.
pub const MAX_EXPANSION_DEPTH: u32 = 2000;

lazy_static! {
    static ref DEBUG_LINE_RE: Regex = Regex::new(r"^(\s*)\?(.*)$").unwrap();
}

fn merge_definitions(active: &mut HashMap<String, DefinitionSlot>, order: &mut Vec<String>, incoming: HashMap<String, DefinitionSlot>) {
    for (name, slot) in incoming {
        if !active.contains_key(&name) {
            order.push(name.clone());
            active.insert(name.clone(), DefinitionSlot::default());
        }
        active.get_mut(&name).unwrap().merge_from(&slot);
    }
}

/// Scans from `text[start_idx..]` for the `)` that balances the `(` immediately preceding
/// `start_idx`, tracking nested parens and quoted strings. Returns its byte offset.
fn find_call_end(text: &str, start_idx: usize) -> Option<usize> {
    let mut depth: i32 = 1;
    let mut in_quote = false;
    let mut quote_char = '\0';
    let mut escape = false;

    for (i, c) in text.char_indices() {
        if i < start_idx {
            continue;
        }
        if escape {
            escape = false;
            continue;
        }
        if c == '\\' {
            escape = true;
            continue;
        }
        if in_quote {
            if c == quote_char {
                in_quote = false;
            }
        } else {
            match c {
                '"' | '\'' => {
                    in_quote = true;
                    quote_char = c;
                }
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
        }
        if depth == 0 {
            return Some(i);
        }
    }
    None
}

/// Erases every occurrence of `match_str` from `original.content`, dropping the line entirely if
/// nothing but whitespace is left.
fn erase_match(original: &SourceLine, match_str: &str) -> Vec<SourceLine> {
    let new_content = original.content.replace(match_str, "");
    if new_content.trim().is_empty() {
        Vec::new()
    } else {
        vec![original.with_content(new_content)]
    }
}

/// Looks for the next live call-site of any registered name in `sl` and, if found, returns its
/// expansion. `order` fixes iteration order (first-registration order) since two macro names both
/// matching one line is a pathological but real tie to break deterministically.
pub fn process_line_expansion(
    active_definitions: &HashMap<String, DefinitionSlot>,
    order: &[String],
    is_exec_mode: bool,
    sl: &SourceLine,
) -> Result<(bool, Vec<SourceLine>), Error> {
    let line_content = &sl.content;

    for name in order {
        let slot = match active_definitions.get(name) {
            Some(s) => s,
            None => continue,
        };
        let active = match slot.active(is_exec_mode) {
            Some(a) => a,
            None => continue,
        };

        match active {
            Active::Tombstone { is_macro_style: false } => {
                let re = Regex::new(&format!(r"\b{}\b", regex::escape(name))).unwrap();
                for m in re.find_iter(line_content) {
                    if is_index_safe(line_content, m.start()) {
                        return Ok((true, erase_match(sl, name)));
                    }
                }
            }
            Active::Tombstone { is_macro_style: true } => {
                let re = Regex::new(&format!(r"\b{}\s*\(", regex::escape(name))).unwrap();
                for m in re.find_iter(line_content) {
                    if !is_index_safe(line_content, m.start()) {
                        continue;
                    }
                    if let Some(end_idx) = find_call_end(line_content, m.end()) {
                        let full_match = &line_content[m.start()..end_idx + 1];
                        return Ok((true, erase_match(sl, full_match)));
                    }
                }
            }
            Active::Live(def) => match &def.kind {
                DefinitionKind::Define => {
                    let re = Regex::new(&format!(r"\b{}\b", regex::escape(name))).unwrap();
                    for m in re.find_iter(line_content) {
                        if is_index_safe(line_content, m.start()) {
                            return Ok((true, expand_body(def, &[], sl, name, None)?));
                        }
                    }
                }
                DefinitionKind::Invocable if def.has_placeholder() => {
                    let obj_pattern = r"(?:\([^)]*\)|[a-zA-Z0-9_]+(?:\[[^\]]*\])*)";
                    let pattern = format!(r"({})\.{}\s*\(", obj_pattern, regex::escape(name));
                    let re = Regex::new(&pattern).unwrap();
                    for caps in re.captures_iter(line_content) {
                        let whole = caps.get(0).unwrap();
                        if !is_index_safe(line_content, whole.start()) {
                            continue;
                        }
                        let caller_obj = caps.get(1).unwrap().as_str();
                        if let Some(end_idx) = find_call_end(line_content, whole.end()) {
                            let full_match = &line_content[whole.start()..end_idx + 1];
                            let args_str = &line_content[whole.end()..end_idx];
                            let call_args: Vec<String> = smart_split_args(args_str).iter().map(|a| try_eval_math(a)).collect();
                            return Ok((true, expand_body(def, &call_args, sl, full_match, Some(caller_obj))?));
                        }
                    }
                }
                DefinitionKind::Invocable => {
                    let re = Regex::new(&format!(r"\b{}\s*\(", regex::escape(name))).unwrap();
                    for m in re.find_iter(line_content) {
                        if m.start() > 0 && line_content[..m.start()].ends_with('.') {
                            continue;
                        }
                        if !is_index_safe(line_content, m.start()) {
                            continue;
                        }
                        if let Some(end_idx) = find_call_end(line_content, m.end()) {
                            let full_match = &line_content[m.start()..end_idx + 1];
                            let args_str = &line_content[m.end()..end_idx];
                            let call_args: Vec<String> = smart_split_args(args_str).iter().map(|a| try_eval_math(a)).collect();
                            return Ok((true, expand_body(def, &call_args, sl, full_match, None)?));
                        }
                    }
                }
            },
        }
    }

    Ok((false, vec![sl.clone()]))
}

/// Binds `call_args`/`caller_obj` to `def`'s parameters and placeholder, processes the body's
/// conditionals and macro-operators, and re-indents the result at the call site.
fn expand_body(def: &Definition, call_args: &[String], original_sl: &SourceLine, match_str: &str, caller_obj: Option<&str>) -> Result<Vec<SourceLine>, Error> {
    let mut bindings: Bindings = HashMap::new();

    if let Some(caller_obj) = caller_obj {
        match &def.placeholder {
            Placeholder::Variadic(name) => {
                let mut val = caller_obj.trim().to_string();
                if val.starts_with('(') && val.ends_with(')') {
                    val = val[1..val.len() - 1].to_string();
                }
                bindings.insert(name.clone(), BoundValue::List(smart_split_args(&val)));
            }
            Placeholder::Tuple(vars) => {
                let val = caller_obj.trim();
                if val.starts_with('(') && val.ends_with(')') {
                    let inner_vals = smart_split_args(&val[1..val.len() - 1]);
                    for (var_name, var_val) in vars.iter().zip(inner_vals.iter()) {
                        bindings.insert(var_name.clone(), BoundValue::Scalar(var_val.clone()));
                    }
                }
            }
            Placeholder::Single(name) => {
                bindings.insert(name.clone(), BoundValue::Scalar(caller_obj.to_string()));
            }
            Placeholder::None => {}
        }
    }

    let mut used = 0usize;
    for param in &def.params {
        if param.is_variadic {
            let variadic_args: Vec<String> = if used < call_args.len() { call_args[used..].to_vec() } else { Vec::new() };
            bindings.insert(param.name.clone(), BoundValue::List(variadic_args));
            break;
        }

        let val = if used < call_args.len() {
            let v = call_args[used].clone();
            used += 1;
            v
        } else if let Some(ref default) = param.default {
            default.clone()
        } else {
            "None".to_string()
        };
        bindings.insert(param.name.clone(), BoundValue::Scalar(val));
    }

    let processed_lines = process_conditionals(&def.body, &bindings)?;
    let mut final_lines = Vec::with_capacity(processed_lines.len());
    for sl in &processed_lines {
        let txt = process_macro_ops(&sl.content, &bindings)?;
        let txt = safe_replace(&txt, &bindings);
        final_lines.push(sl.with_content(txt));
    }

    let valid_lines: Vec<&SourceLine> = final_lines.iter().filter(|l| !l.is_blank()).collect();
    let is_whole_line = original_sl.content.trim() == match_str;

    if !is_whole_line && valid_lines.len() == 1 {
        let body_txt = valid_lines[0].content.trim();
        let new_content = original_sl.content.replace(match_str, body_txt);
        return Ok(vec![original_sl.with_content(new_content)]);
    }
    if !is_whole_line && valid_lines.is_empty() {
        let new_content = original_sl.content.replace(match_str, "");
        return Ok(if new_content.trim().is_empty() { Vec::new() } else { vec![original_sl.with_content(new_content)] });
    }

    if final_lines.is_empty() {
        return Ok(Vec::new());
    }

    let indent_len = indent_length(&original_sl.content);
    let base_indent: String = original_sl.content.chars().take(indent_len).collect();
    let dedented = dedent_block(&final_lines);

    Ok(dedented
        .iter()
        .map(|body_sl| {
            let trimmed = body_sl.content.trim_end_matches('\n');
            body_sl.with_content(format!("{}{}\n", base_indent, trimmed))
        })
        .collect())
}

/// Runs the whole pipeline over `main_file`: loading/including, namespace extraction, definition
/// registration, and the expansion loop, in `is_exec_mode` (debug lines/`$debug` definitions live)
/// or not.
pub fn transpile(main_file: &Path, is_exec_mode: bool) -> Result<Vec<SourceLine>, Error> {
    let mut visited = HashSet::new();
    let all_lines = expand_files(main_file, &mut visited);

    let mut namespaces = Namespaces::new();
    let main_code_lines = extract_namespaces(all_lines, &mut namespaces);

    let (global_defs, mut raw_code_lines) = parse_definitions(&main_code_lines);
    let mut active_definitions: HashMap<String, DefinitionSlot> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    merge_definitions(&mut active_definitions, &mut order, global_defs);

    if let Some(default_ns) = namespaces.map.get("default").cloned() {
        let (defs, raw) = parse_definitions(&default_ns);
        merge_definitions(&mut active_definitions, &mut order, defs);
        let mut combined = raw;
        combined.extend(raw_code_lines);
        raw_code_lines = combined;
    }

    let mut final_lines: Vec<SourceLine> = Vec::new();
    let mut cases_indent_level: usize = 0;
    let mut mod_value: Option<String> = None;
    let mut i = 0usize;
    let mut expansion_counter: u32 = 0;

    while i < raw_code_lines.len() {
        let mut sl = raw_code_lines[i].clone();
        let sline = sl.content.trim().to_string();

        if sline.starts_with("$using") {
            let rest = sline.splitn(2, char::is_whitespace).nth(1).unwrap_or("").trim();
            if !rest.is_empty() {
                let mut all_raw_codes = Vec::new();
                for target_ns in rest.split(',').map(|s| s.trim()) {
                    if let Some(ns_lines) = namespaces.map.get(target_ns).cloned() {
                        let (defs, raw) = parse_definitions(&ns_lines);
                        merge_definitions(&mut active_definitions, &mut order, defs);
                        all_raw_codes.extend(raw);
                    }
                }
                if !all_raw_codes.is_empty() {
                    let insert_at = i + 1;
                    let tail = raw_code_lines.split_off(insert_at);
                    raw_code_lines.extend(all_raw_codes);
                    raw_code_lines.extend(tail);
                }
            }
            i += 1;
            expansion_counter = 0;
            continue;
        }

        if sline.starts_with("$mod") {
            if let Some(value) = sline.split_whitespace().nth(1) {
                mod_value = Some(value.trim().to_string());
            }
            i += 1;
            continue;
        }

        let (expanded, new_lines) = process_line_expansion(&active_definitions, &order, is_exec_mode, &sl)?;
        if expanded {
            expansion_counter += 1;
            if expansion_counter > MAX_EXPANSION_DEPTH {
                return Err(error!("Infinite macro expansion detected at line {}: {}", sl.origin_line, sline));
            }
            let tail = raw_code_lines.split_off(i + 1);
            raw_code_lines.truncate(i);
            raw_code_lines.extend(new_lines);
            raw_code_lines.extend(tail);
            continue;
        }
        expansion_counter = 0;

        let mut sline = sline;
        if let Some(caps) = DEBUG_LINE_RE.captures(&sl.content) {
            if !is_exec_mode {
                i += 1;
                continue;
            }
            let mut new_content = format!("{}{}", &caps[1], &caps[2]);
            if !new_content.ends_with('\n') {
                new_content.push('\n');
            }
            sl = sl.with_content(new_content);
            sline = sl.content.trim().to_string();
        }

        if sline.starts_with("$cases") {
            if let Some(count_expr) = sline.splitn(2, char::is_whitespace).nth(1) {
                let count_expr = count_expr.trim();
                if count_expr != "1" {
                    let indent_len = indent_length(&sl.content);
                    let base_indent: String = sl.content.chars().take(indent_len).collect();
                    let extra_indent = "    ".repeat(cases_indent_level);
                    let loop_txt = format!("{}{}for _ in range({}):\n", base_indent, extra_indent, count_expr);
                    final_lines.push(sl.with_content(loop_txt));
                    cases_indent_level += 1;
                }
            }
            i += 1;
            continue;
        }

        let processed_content = process_mod_ops(&sl.content, mod_value.as_deref());
        let sl_to_add = sl.with_content(processed_content);

        if cases_indent_level > 0 && !sl_to_add.is_blank() {
            let new_content = format!("{}{}", "    ".repeat(cases_indent_level), sl_to_add.content);
            final_lines.push(sl_to_add.with_content(new_content));
        } else {
            final_lines.push(sl_to_add);
        }
        i += 1;
    }

    Ok(final_lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn expands_simple_define() {
        let dir = tempdir().unwrap();
        let main = write(&dir, "main.pyx", "!define PI: 3.14\nx = PI\n");
        let out = transpile(&main, false).unwrap();
        let texts: Vec<&str> = out.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(texts, vec!["x = 3.14\n"]);
    }

    #[test]
    fn expands_macro_call_with_args() {
        let dir = tempdir().unwrap();
        let main = write(&dir, "main.pyx", "!macro double(a): a*2\nprint(double(5))\n");
        let out = transpile(&main, false).unwrap();
        let texts: Vec<&str> = out.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(texts, vec!["print(5*2)\n"]);
    }

    #[test]
    fn method_placeholder_binds_receiver() {
        let dir = tempdir().unwrap();
        let main = write(&dir, "main.pyx", "!method v.double():\n    v*2\nresult = items.double()\n");
        let out = transpile(&main, false).unwrap();
        let texts: Vec<&str> = out.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(texts, vec!["result = items*2\n"]);
    }

    #[test]
    fn cases_one_is_noop_and_others_wrap_in_loop() {
        let dir = tempdir().unwrap();
        let main = write(&dir, "main.pyx", "$cases 1\nbody1\n$cases 3\nbody2\n");
        let out = transpile(&main, false).unwrap();
        let texts: Vec<&str> = out.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(texts, vec!["body1\n", "for _ in range(3):\n", "    body2\n"]);
    }

    #[test]
    fn debug_line_is_dropped_outside_exec_mode_and_kept_in_exec_mode() {
        let dir = tempdir().unwrap();
        let main = write(&dir, "main.pyx", "?print('debug')\nprint('live')\n");
        let normal = transpile(&main, false).unwrap();
        assert_eq!(normal.len(), 1);
        let exec = transpile(&main, true).unwrap();
        assert_eq!(exec.len(), 2);
        assert_eq!(exec[0].content, "print('debug')\n");
    }

    #[test]
    fn infinite_self_expansion_is_detected() {
        let dir = tempdir().unwrap();
        let main = write(&dir, "main.pyx", "!define LOOP: LOOP\nLOOP\n");
        assert!(transpile(&main, false).is_err());
    }
}
