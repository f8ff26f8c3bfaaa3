//! Runs the transpiled body through an external interpreter process for `--run`, and remaps any
//! traceback frames pointing at the synthetic output file back to the author's original source.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::process::Command;

use lazy_static::lazy_static;
use regex::Regex;

use crate::sourceline::SourceLine;

/// Filename the synthetic script is written under, so a traceback frame referencing it
/// unambiguously identifies generated code rather than a real file on disk.
pub const SYNTHETIC_FILENAME: &str = "generated_pyx.py";

lazy_static! {
    static ref FRAME_RE: Regex = Regex::new(r#"^(\s*)File "(.+)", line (\d+)(?:, in (.+))?\s*$"#).unwrap();
}

pub struct ExecResult {
    pub exit_code: Option<i32>,
    pub interrupted: bool,
}

/// Writes `code` to a temp file named [`SYNTHETIC_FILENAME`], runs it under `interpreter`, and
/// prints its stdout verbatim and its stderr with any `SYNTHETIC_FILENAME` traceback frames
/// rewritten to point at `line_map`'s originating lines.
pub fn execute(interpreter: &str, code: &str, line_map: &HashMap<usize, SourceLine>, quiet: bool) -> io::Result<ExecResult> {
    let dir = tempfile::tempdir()?;
    let script_path = dir.path().join(SYNTHETIC_FILENAME);
    fs::write(&script_path, code)?;

    if !quiet {
        println!(">> Executing...");
        println!("{}", "-".repeat(20));
    }

    let output = Command::new(interpreter).arg(&script_path).current_dir(dir.path()).output()?;

    if !output.stdout.is_empty() {
        print!("{}", String::from_utf8_lossy(&output.stdout));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let interrupted = stderr.contains("KeyboardInterrupt");

    if interrupted {
        println!("\n>> Execution Interrupted.");
    } else if !stderr.trim().is_empty() {
        eprint!("{}", remap_traceback(&stderr, line_map));
    }

    Ok(ExecResult { exit_code: output.status.code(), interrupted })
}

/// Rewrites every `File "generated_pyx.py", line N[, in func]` frame (and its source-snippet
/// line) to name the original file/line/text, via `line_map`. Frames for any other file, and the
/// final `ExceptionType: message` line, pass through untouched.
fn remap_traceback(stderr: &str, line_map: &HashMap<usize, SourceLine>) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if let Some(caps) = FRAME_RE.captures(line) {
            let indent = &caps[1];
            let filename = &caps[2];

            if filename == SYNTHETIC_FILENAME {
                let lineno: usize = caps[3].parse().unwrap_or(0);
                let funcname = caps.get(4).map(|m| m.as_str());
                let mapped_idx = lineno.saturating_sub(1);

                match line_map.get(&mapped_idx) {
                    Some(src) => {
                        let origin = src.origin_file.as_deref().unwrap_or("Generated Code");
                        match funcname {
                            Some(f) => out.push_str(&format!("{}File \"{}\", line {}, in {}\n", indent, origin, src.origin_line, f)),
                            None => out.push_str(&format!("{}File \"{}\", line {}\n", indent, origin, src.origin_line)),
                        }
                        out.push_str(&format!("{}    {}\n", indent, src.content.trim()));
                    }
                    None => out.push_str(&format!("{}File \"Generated Code\", line {}\n", indent, lineno)),
                }

                i += 1;
                if i < lines.len() && !FRAME_RE.is_match(lines[i]) && !looks_like_final_error_line(lines[i]) {
                    i += 1;
                }
                continue;
            }
        }

        out.push_str(line);
        out.push('\n');
        i += 1;
    }

    out
}

fn looks_like_final_error_line(line: &str) -> bool {
    !line.starts_with(' ') && !line.starts_with('\t') && line.contains(':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourceline::SourceLine;

    fn sample_map() -> HashMap<usize, SourceLine> {
        let mut map = HashMap::new();
        map.insert(2, SourceLine::new("real_call()\n".to_string(), Some("script.pyx".to_string()), 7));
        map
    }

    #[test]
    fn remaps_frame_for_synthetic_file() {
        let stderr = "Traceback (most recent call last):\n  File \"generated_pyx.py\", line 3, in <module>\n    real_call()\nValueError: boom\n";
        let remapped = remap_traceback(stderr, &sample_map());
        assert!(remapped.contains("File \"script.pyx\", line 7, in <module>"));
        assert!(remapped.contains("real_call()"));
        assert!(remapped.contains("ValueError: boom"));
    }

    #[test]
    fn leaves_other_file_frames_untouched() {
        let stderr = "  File \"/usr/lib/other.py\", line 10, in helper\n    pass\n";
        let remapped = remap_traceback(stderr, &sample_map());
        assert_eq!(remapped, stderr);
    }

    #[test]
    fn unmapped_synthetic_line_falls_back_to_generated_code_label() {
        let stderr = "  File \"generated_pyx.py\", line 99, in <module>\n    whatever()\n";
        let remapped = remap_traceback(stderr, &sample_map());
        assert!(remapped.contains("File \"Generated Code\", line 99"));
    }
}
