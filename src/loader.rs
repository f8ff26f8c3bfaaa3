//! Loader & Includer: reads a file into `SourceLine`s and depth-first, cycle-safe resolves
//! `$expand <path>` directives into one flat sequence.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::warning;
use crate::sourceline::{load_file, SourceLine};

/// Recursively expands `$expand` directives starting at `path`. `visited` is the set of
/// canonicalized paths already loaded in this run; a path that reappears (an `$expand` cycle,
/// direct or diamond) contributes zero further lines, which is intentional.
pub fn expand_files(path: &Path, visited: &mut HashSet<PathBuf>) -> Vec<SourceLine> {
    let abs_path = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => path.to_path_buf(),
    };

    if visited.contains(&abs_path) {
        return Vec::new();
    }
    visited.insert(abs_path.clone());

    let raw_lines = match load_file(path) {
        Ok(lines) => lines,
        Err(_) => {
            warning(
                format!("Included file \"{}\" not found.", path.display()),
                Some("include-missing"),
                (None, None),
            );
            return Vec::new();
        }
    };

    let base_dir = abs_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let mut out = Vec::with_capacity(raw_lines.len());

    for sl in raw_lines {
        let stripped = sl.content.trim();
        if stripped.starts_with("$expand") {
            let mut parts = stripped.splitn(2, char::is_whitespace);
            parts.next();
            match parts.next() {
                Some(target) if !target.trim().is_empty() => {
                    let target_path = base_dir.join(target.trim());
                    out.extend(expand_files(&target_path, visited));
                }
                _ => {
                    // `$expand` with no argument: silently ignored.
                }
            }
        } else {
            out.push(sl);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn expand_resolves_relative_includes() {
        let dir = tempdir().unwrap();
        let main_path = dir.path().join("main.pyx");
        let inc_path = dir.path().join("inc.pyx");

        fs::File::create(&inc_path).unwrap().write_all(b"included_line\n").unwrap();
        fs::File::create(&main_path)
            .unwrap()
            .write_all(b"before\n$expand inc.pyx\nafter\n")
            .unwrap();

        let mut visited = HashSet::new();
        let lines = expand_files(&main_path, &mut visited);
        let texts: Vec<&str> = lines.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(texts, vec!["before\n", "included_line\n", "after\n"]);
    }

    #[test]
    fn expand_breaks_self_cycles() {
        let dir = tempdir().unwrap();
        let main_path = dir.path().join("cycle.pyx");
        fs::File::create(&main_path)
            .unwrap()
            .write_all(b"$expand cycle.pyx\ndone\n")
            .unwrap();

        let mut visited = HashSet::new();
        let lines = expand_files(&main_path, &mut visited);
        let texts: Vec<&str> = lines.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(texts, vec!["done\n"]);
    }

    #[test]
    fn malformed_expand_is_ignored() {
        let dir = tempdir().unwrap();
        let main_path = dir.path().join("bad.pyx");
        fs::File::create(&main_path).unwrap().write_all(b"$expand\nkept\n").unwrap();

        let mut visited = HashSet::new();
        let lines = expand_files(&main_path, &mut visited);
        let texts: Vec<&str> = lines.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(texts, vec!["kept\n"]);
    }
}
