//! Assembler & Source Map: concatenates the optional header/original-code/recursion-preamble
//! blocks around the processed body and builds the dense `emit line -> source line` map that
//! later lets runtime errors be pointed back at the author's original file.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::sourceline::SourceLine;

/// Used when `--header-b64` is absent or fails to decode as UTF-8. The actual disclaimer text is
/// the caller's concern; this is just a placeholder so `--header-b64` has something to fall back
/// on.
pub const DEFAULT_HEADER: &str = "This file was generated by a preprocessor. Do not edit directly.";

pub struct Assembled {
    pub output_lines: Vec<String>,
    /// 0-based output-line index to the `SourceLine` it came from. Only body lines are present;
    /// header/original/preamble lines have no entry.
    pub line_map: HashMap<usize, SourceLine>,
}

pub struct AssembleOptions<'a> {
    pub include_header: bool,
    pub include_original: bool,
    pub comment_style: &'a str,
    pub header_b64: Option<&'a str>,
    pub original_source: &'a str,
    pub has_recursion: bool,
}

fn resolve_header(header_b64: Option<&str>) -> String {
    match header_b64 {
        Some(encoded) => BASE64
            .decode(encoded)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_else(|| DEFAULT_HEADER.to_string()),
        None => DEFAULT_HEADER.to_string(),
    }
}

/// Builds the final output text and its source map from the processed body.
pub fn assemble(body: &[SourceLine], opts: &AssembleOptions) -> Assembled {
    let mut output_lines = Vec::new();

    if opts.include_header {
        let header_content = resolve_header(opts.header_b64);
        output_lines.push(format!("{}\n", opts.comment_style));
        output_lines.push(format!("{}\n", header_content));
        output_lines.push(format!("{}\n", opts.comment_style));
    }

    if opts.include_original {
        output_lines.push(format!("{}\n", opts.comment_style));
        output_lines.push("[Original Code]\n".to_string());
        output_lines.push(format!("{}\n", opts.original_source));
        output_lines.push(format!("{}\n", opts.comment_style));
    }

    if opts.has_recursion {
        output_lines.push("import sys\n".to_string());
        output_lines.push("sys.setrecursionlimit(10 ** 6)\n".to_string());
    }

    let mut line_map = HashMap::with_capacity(body.len());
    let mut idx = output_lines.len();
    for sl in body {
        output_lines.push(sl.content.clone());
        line_map.insert(idx, sl.clone());
        idx += 1;
    }

    Assembled { output_lines, line_map }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourceline::split_into_lines;

    fn body() -> Vec<SourceLine> {
        split_into_lines("print(1)\nprint(2)\n", Some("in.pyx".to_string()))
    }

    #[test]
    fn bare_body_has_no_offset() {
        let opts = AssembleOptions {
            include_header: false,
            include_original: false,
            comment_style: "'''",
            header_b64: None,
            original_source: "",
            has_recursion: false,
        };
        let assembled = assemble(&body(), &opts);
        assert_eq!(assembled.output_lines, vec!["print(1)\n", "print(2)\n"]);
        assert_eq!(assembled.line_map[&0].content, "print(1)\n");
        assert_eq!(assembled.line_map[&1].content, "print(2)\n");
    }

    #[test]
    fn header_and_original_push_body_offset_and_have_no_map_entries() {
        let opts = AssembleOptions {
            include_header: true,
            include_original: true,
            comment_style: "'''",
            header_b64: None,
            original_source: "orig text",
            has_recursion: true,
        };
        let assembled = assemble(&body(), &opts);
        let body_start = assembled.output_lines.len() - 2;
        assert_eq!(assembled.output_lines[body_start], "print(1)\n");
        assert!(!assembled.line_map.contains_key(&0));
        assert_eq!(assembled.line_map[&body_start].content, "print(1)\n");
    }

    #[test]
    fn invalid_base64_header_falls_back_to_default() {
        let opts = AssembleOptions {
            include_header: true,
            include_original: false,
            comment_style: "'''",
            header_b64: Some("not-valid-base64!!"),
            original_source: "",
            has_recursion: false,
        };
        let assembled = assemble(&body(), &opts);
        assert_eq!(assembled.output_lines[1], format!("{}\n", DEFAULT_HEADER));
    }
}
