//! The unit the whole pipeline operates on: one line of text plus where it came from.

use std::path::Path;

/// One line of input or output text, tagged with the file and 1-based line number it
/// originated from. Every transformation in this crate produces new `SourceLine`s rather than
/// mutating in place; when an expansion replaces a line, the replacement lines keep the
/// *caller's* origin so runtime diagnostics point at the invocation site, not the macro body.
#[derive(Debug, Clone)]
pub struct SourceLine {
    pub content: String,
    pub origin_file: Option<String>,
    pub origin_line: u32,
}

impl SourceLine {
    pub fn new(content: String, origin_file: Option<String>, origin_line: u32) -> Self {
        SourceLine { content, origin_file, origin_line }
    }

    pub fn with_content(&self, content: String) -> Self {
        SourceLine::new(content, self.origin_file.clone(), self.origin_line)
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

pub fn load_file(path: &Path) -> std::io::Result<Vec<SourceLine>> {
    let content = std::fs::read_to_string(path)?;
    let filename = basename(path);
    Ok(split_into_lines(&content, Some(filename)))
}

/// Splits raw file content into `SourceLine`s, numbering from 1 and keeping the trailing
/// newline on every line but the (possibly missing) final one.
pub fn split_into_lines(content: &str, origin_file: Option<String>) -> Vec<SourceLine> {
    let mut lines = Vec::new();
    let mut lineno: u32 = 1;
    let mut rest = content;

    loop {
        match rest.find('\n') {
            Some(idx) => {
                let (line, remainder) = rest.split_at(idx + 1);
                lines.push(SourceLine::new(line.to_string(), origin_file.clone(), lineno));
                rest = remainder;
                lineno += 1;
            }
            None => {
                if !rest.is_empty() {
                    lines.push(SourceLine::new(rest.to_string(), origin_file.clone(), lineno));
                }
                break;
            }
        }
    }
    lines
}
