//! Namespace Extractor: splits `$namespace N … $` blocks and single-line `$name N content`
//! injections out of the main stream into a `name -> lines` map.

use std::collections::HashMap;

use crate::sourceline::SourceLine;

/// Splits `text` on runs of whitespace, collapsing consecutive spaces/tabs into one separator,
/// up to `maxsplit` splits — the remainder after the last split is returned whole (its own
/// internal whitespace untouched). Mirrors Python's `str.split(None, maxsplit)`.
fn split_whitespace_run(text: &str, maxsplit: usize) -> Vec<&str> {
    let mut parts = Vec::with_capacity(maxsplit + 1);
    let mut rest = text;

    while parts.len() < maxsplit {
        let trimmed = rest.trim_start();
        match trimmed.find(char::is_whitespace) {
            Some(idx) => {
                parts.push(&trimmed[..idx]);
                rest = &trimmed[idx..];
            }
            None => {
                if !trimmed.is_empty() {
                    parts.push(trimmed);
                }
                return parts;
            }
        }
    }

    let trimmed = rest.trim_start();
    if !trimmed.is_empty() {
        parts.push(trimmed);
    }
    parts
}

#[derive(Default)]
pub struct Namespaces {
    pub map: HashMap<String, Vec<SourceLine>>,
}

impl Namespaces {
    pub fn new() -> Self {
        Namespaces { map: HashMap::new() }
    }

    fn entry(&mut self, name: &str) -> &mut Vec<SourceLine> {
        self.map.entry(name.to_string()).or_insert_with(Vec::new)
    }
}

/// Removes namespace blocks/injections from `source_lines`, feeding them into `namespaces`,
/// and returns the remaining main-stream lines in order.
pub fn extract_namespaces(source_lines: Vec<SourceLine>, namespaces: &mut Namespaces) -> Vec<SourceLine> {
    let mut main_lines = Vec::new();
    let mut current_ns: Option<String> = None;
    let mut buffer: Vec<SourceLine> = Vec::new();

    for sl in source_lines {
        let stripped = sl.content.trim();

        if stripped.starts_with("$namespace") {
            let mut parts = stripped.split_whitespace();
            parts.next();
            current_ns = Some(parts.next().unwrap_or("unknown").to_string());
            buffer = Vec::new();
            continue;
        }

        if stripped == "$" {
            if let Some(ns) = current_ns.take() {
                namespaces.entry(&ns).extend(buffer.drain(..));
            }
            continue;
        }

        if stripped.starts_with("$name") {
            let parts = split_whitespace_run(stripped, 2);
            if parts.len() >= 3 {
                let ns_name = parts[1];
                let content = parts[2].trim();
                if !content.is_empty() {
                    namespaces
                        .entry(ns_name)
                        .push(SourceLine::new(format!("{}\n", content), sl.origin_file.clone(), sl.origin_line));
                }
            }
            continue;
        }

        if current_ns.is_some() {
            buffer.push(sl);
        } else {
            main_lines.push(sl);
        }
    }

    main_lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourceline::split_into_lines;

    #[test]
    fn extracts_block_and_injected_namespaces() {
        let input = "\
a = 1
$namespace utils
def helper(): pass
$
b = 2
$name utils def other(): pass
c = 3
";
        let lines = split_into_lines(input, None);
        let mut namespaces = Namespaces::new();
        let main_lines = extract_namespaces(lines, &mut namespaces);

        let main_texts: Vec<&str> = main_lines.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(main_texts, vec!["a = 1\n", "b = 2\n", "c = 3\n"]);

        let utils: Vec<&str> = namespaces.map["utils"].iter().map(|l| l.content.as_str()).collect();
        assert_eq!(utils, vec!["def helper(): pass\n", "def other(): pass\n"]);
    }

    #[test]
    fn name_injection_tolerates_runs_of_whitespace() {
        let lines = split_into_lines("$name  utils   def other(): pass\n", None);
        let mut namespaces = Namespaces::new();
        extract_namespaces(lines, &mut namespaces);

        let utils: Vec<&str> = namespaces.map["utils"].iter().map(|l| l.content.as_str()).collect();
        assert_eq!(utils, vec!["def other(): pass\n"]);
    }
}
