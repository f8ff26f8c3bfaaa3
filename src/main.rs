#[macro_use]
extern crate serde_derive;
extern crate docopt;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::iter::FromIterator;
use std::path::Path;

use docopt::Docopt;

use macroforge::clipboard::copy_to_clipboard;
use macroforge::driver::transpile;
use macroforge::error::{init_warnings, print_warning_summary};
use macroforge::exec::execute;
use macroforge::recursion::detect_recursion;
use macroforge::sourceline::SourceLine;
use macroforge::sourcemap::{assemble, AssembleOptions};

const USAGE: &str = "
macroforge

Usage:
    macroforge [options] [-w <name>]... <file>
    macroforge (-h | --help)
    macroforge --version

Options:
    -r --run                     Execute the transpiled output.
    -c --copy                    Copy the transpiled output to the clipboard.
    -o --out <path>              Write the transpiled output to <path> (UTF-8 with BOM).
    --no-header                  Omit the boilerplate header block.
    --no-original                Omit the quoted original-source block.
    --comment-style <style>      Fencing token for the header/original blocks. [default: ''']
    --header-b64 <header>        Base64-encoded UTF-8 header content.
    --interpreter <bin>          Interpreter binary to invoke for --run. [default: python3]
    -q --quiet                   Suppress the execution banner and warning summary.
    -w --warning <name>          Mute a named warning class (repeatable).
    -h --help                    Show usage information and exit.
    --version                    Print the version number and exit.
";

#[derive(Debug, Deserialize)]
struct Args {
    arg_file: String,
    flag_run: bool,
    flag_copy: bool,
    flag_out: Option<String>,
    flag_no_header: bool,
    flag_no_original: bool,
    flag_comment_style: String,
    flag_header_b64: Option<String>,
    flag_interpreter: String,
    flag_quiet: bool,
    flag_warning: Vec<String>,
    flag_version: bool,
}

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runs the full pipeline for `file` in `is_exec_mode`, printing `Transpile Error: ...` and
/// returning `None` on failure instead of aborting the whole run — a `--out`/`--copy` request and
/// a `--run` request are independent and one failing shouldn't sink the other.
fn build(file: &Path, is_exec_mode: bool, args: &Args) -> Option<(String, HashMap<usize, SourceLine>)> {
    let body = match transpile(file, is_exec_mode) {
        Ok(body) => body,
        Err(e) => {
            println!("Transpile Error: {}", e);
            return None;
        }
    };

    let has_recursion = detect_recursion(&body);
    let original_source = if args.flag_no_original { String::new() } else { fs::read_to_string(file).unwrap_or_default() };

    let opts = AssembleOptions {
        include_header: !args.flag_no_header,
        include_original: !args.flag_no_original,
        comment_style: &args.flag_comment_style,
        header_b64: args.flag_header_b64.as_deref(),
        original_source: &original_source,
        has_recursion,
    };

    let assembled = assemble(&body, &opts);
    Some((assembled.output_lines.join(""), assembled.line_map))
}

fn main() {
    let args: Args = Docopt::new(USAGE).and_then(|d| d.deserialize()).unwrap_or_else(|e| e.exit());

    if args.flag_version {
        println!("v{}", VERSION);
        std::process::exit(0);
    }

    init_warnings(HashSet::from_iter(args.flag_warning.clone()));

    let file = Path::new(&args.arg_file);
    if !file.exists() {
        println!("Error: Main file not found: {}", args.arg_file);
        return;
    }

    let mut code_export: Option<String> = None;

    if args.flag_out.is_some() || args.flag_copy {
        if let Some((code, _)) = build(file, false, &args) {
            if let Some(ref out_path) = args.flag_out {
                let mut content = String::from("\u{feff}");
                content.push_str(&code);
                match fs::File::create(out_path).and_then(|mut f| f.write_all(content.as_bytes())) {
                    Ok(()) => println!("Saved to {}", out_path),
                    Err(e) => println!("Error: Failed to write {}: {}", out_path, e),
                }
            }
            if args.flag_copy && !args.flag_run {
                copy_to_clipboard(&code);
            }
            code_export = Some(code);
        }
    }

    if args.flag_run {
        if let Some((code_exec, line_map)) = build(file, true, &args) {
            match execute(&args.flag_interpreter, &code_exec, &line_map, args.flag_quiet) {
                Ok(_) => {}
                Err(e) => println!("Error: Failed to run interpreter \"{}\": {}", args.flag_interpreter, e),
            }
        }

        if args.flag_copy {
            if let Some(ref code) = code_export {
                println!("{}", "-".repeat(20));
                copy_to_clipboard(code);
            }
        }
    }

    if !args.flag_quiet {
        print_warning_summary();
    }
}
