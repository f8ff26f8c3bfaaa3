//! Definition Parser: parses `!macro`/`!method`/`!define` declarations (with optional `$debug`
//! prefix) out of a de-indented line sequence, and the `Definition` data model that backs them.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::scan::{dedent_block, smart_split_args};
use crate::sourceline::SourceLine;

/// The receiver binding of a `!method`-style definition.
#[derive(Debug, Clone)]
pub enum Placeholder {
    None,
    /// `v.push(x): ...` — `v` binds the whole receiver text.
    Single(String),
    /// `(a,b).swap(): ...` — the parenthesized receiver is split positionally.
    Tuple(Vec<String>),
    /// `*items.sum(): ...` — the receiver's comma-separated contents bind as a list.
    Variadic(String),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<String>,
    pub is_variadic: bool,
}

#[derive(Debug, Clone)]
pub enum DefinitionKind {
    Define,
    Invocable,
}

#[derive(Debug, Clone)]
pub struct Definition {
    pub name: String,
    pub kind: DefinitionKind,
    pub is_debug: bool,
    pub params: Vec<Param>,
    pub placeholder: Placeholder,
    pub body: Vec<SourceLine>,
}

impl Definition {
    pub fn has_placeholder(&self) -> bool {
        !matches!(self.placeholder, Placeholder::None)
    }

    pub fn is_macro_style(&self) -> bool {
        matches!(self.kind, DefinitionKind::Invocable)
    }
}

/// Holds up to two registrations of one name: the `normal` variant and the `$debug` variant.
#[derive(Debug, Clone, Default)]
pub struct DefinitionSlot {
    pub normal: Option<Definition>,
    pub debug: Option<Definition>,
}

/// What `active_definition` resolves a lookup to.
pub enum Active<'a> {
    Live(&'a Definition),
    /// A `$debug`-only definition resolved outside exec mode: its call-sites must be erased
    /// rather than expanded.
    Tombstone { is_macro_style: bool },
}

impl DefinitionSlot {
    pub fn merge_from(&mut self, other: &DefinitionSlot) {
        if let Some(ref d) = other.normal {
            self.normal = Some(d.clone());
        }
        if let Some(ref d) = other.debug {
            self.debug = Some(d.clone());
        }
    }

    pub fn active(&self, is_exec_mode: bool) -> Option<Active<'_>> {
        if is_exec_mode {
            if let Some(ref d) = self.debug {
                return Some(Active::Live(d));
            }
            if let Some(ref d) = self.normal {
                return Some(Active::Live(d));
            }
            None
        } else if let Some(ref d) = self.normal {
            Some(Active::Live(d))
        } else {
            self.debug.as_ref().map(|d| Active::Tombstone { is_macro_style: d.is_macro_style() })
        }
    }
}

lazy_static! {
    static ref MACRO_DECL_RE: Regex =
        Regex::new(r"^(\$debug\s+)?!(macro|method)\s+([*a-zA-Z0-9_.,()]+)\s*\((.*?)\)\s*:\s*(.*)$").unwrap();
    static ref DEFINE_DECL_RE: Regex = Regex::new(r"^(\$debug\s+)?!define\s+([a-zA-Z0-9_.]+)\s*:\s*(.*)$").unwrap();
}

fn parse_placeholder(name_part: &str) -> (String, Placeholder) {
    if let Some(dot) = name_part.find('.') {
        let (ph, rest) = name_part.split_at(dot);
        let name = rest[1..].trim().to_string();
        let ph = ph.trim();

        if let Some(stripped) = ph.strip_prefix('*') {
            (name, Placeholder::Variadic(stripped.to_string()))
        } else if ph.starts_with('(') && ph.ends_with(')') {
            let inner = &ph[1..ph.len() - 1];
            let vars: Vec<String> = inner.split(',').map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect();
            (name, Placeholder::Tuple(vars))
        } else {
            (name, Placeholder::Single(ph.to_string()))
        }
    } else {
        (name_part.to_string(), Placeholder::None)
    }
}

fn parse_params(args_str: &str) -> Vec<Param> {
    if args_str.trim().is_empty() {
        return Vec::new();
    }
    smart_split_args(args_str)
        .into_iter()
        .map(|raw| {
            let raw = raw.trim();
            if let Some(stripped) = raw.strip_prefix('*') {
                Param { name: stripped.trim().to_string(), default: None, is_variadic: true }
            } else if let Some(eq) = raw.find('=') {
                let (name, default) = raw.split_at(eq);
                Param { name: name.trim().to_string(), default: Some(default[1..].trim().to_string()), is_variadic: false }
            } else {
                Param { name: raw.to_string(), default: None, is_variadic: false }
            }
        })
        .collect()
}

fn build_definition(name_part: &str, args_str: &str, body_lines: Vec<SourceLine>, is_macro_keyword: bool, is_debug: bool) -> Definition {
    let (name, placeholder) = parse_placeholder(name_part);
    let mut body = dedent_block(&body_lines);
    while let Some(last) = body.last() {
        if last.is_blank() {
            body.pop();
        } else {
            break;
        }
    }

    Definition {
        name,
        kind: if is_macro_keyword { DefinitionKind::Invocable } else { DefinitionKind::Define },
        is_debug,
        params: if is_macro_keyword { parse_params(args_str) } else { Vec::new() },
        placeholder,
        body,
    }
}

/// Parses `!macro`/`!method`/`!define` declarations out of `source_lines` (already de-indented
/// relative to the block they were found in), returning the accumulated definition table plus
/// the lines that were not declarations, in order.
pub fn parse_definitions(source_lines: &[SourceLine]) -> (HashMap<String, DefinitionSlot>, Vec<SourceLine>) {
    let source_lines = dedent_block(source_lines);
    let mut definitions: HashMap<String, DefinitionSlot> = HashMap::new();
    let mut raw_lines = Vec::new();

    let mut i = 0;
    while i < source_lines.len() {
        let sl = &source_lines[i];
        let stripped = sl.content.trim();

        let macro_caps = MACRO_DECL_RE.captures(stripped);
        let define_caps = if macro_caps.is_none() { DEFINE_DECL_RE.captures(stripped) } else { None };

        if macro_caps.is_none() && define_caps.is_none() {
            raw_lines.push(sl.clone());
            i += 1;
            continue;
        }

        let (is_debug, is_macro_keyword, name_part, args_str, inline_body) = if let Some(caps) = &macro_caps {
            (
                caps.get(1).is_some(),
                true,
                caps[3].to_string(),
                caps[4].to_string(),
                caps[5].to_string(),
            )
        } else {
            let caps = define_caps.unwrap();
            (caps.get(1).is_some(), false, caps[2].to_string(), String::new(), caps[3].to_string())
        };

        let mut body = Vec::new();
        if !inline_body.trim().is_empty() {
            body.push(SourceLine::new(format!("{}\n", inline_body), sl.origin_file.clone(), sl.origin_line));
            i += 1;
        } else {
            i += 1;
            while i < source_lines.len() {
                let next = &source_lines[i];
                let starts_indented = next.content.starts_with(' ') || next.content.starts_with('\t');
                if !next.content.trim().is_empty() && !starts_indented {
                    break;
                }
                body.push(next.clone());
                i += 1;
            }
        }

        let def = build_definition(&name_part, &args_str, body, is_macro_keyword, is_debug);
        let slot = definitions.entry(def.name.clone()).or_insert_with(DefinitionSlot::default);
        if is_debug {
            slot.debug = Some(def);
        } else {
            slot.normal = Some(def);
        }
    }

    (definitions, raw_lines)
}
