#![macro_use]

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::io::Error;

use colored::*;

pub static mut WARNINGS_MAXIMUM: u32 = 10;
static mut WARNINGS_RAISED: Option<HashMap<String, u32>> = None;
static mut WARNINGS_MUTED: Option<HashSet<String>> = None;

/// Builds a plain `std::io::Error` from a format string, exactly like the rest of this crate's
/// fallible code expects. There is no rich error hierarchy here: every failure mode in the
/// preprocessor (malformed directive, macro index out of range, infinite expansion, ...) is
/// represented as one of these with a descriptive message.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => (
        std::io::Error::new(std::io::ErrorKind::Other, format!($($arg)*))
    )
}

pub trait ErrorExt<T> {
    fn prepend_error<M: AsRef<[u8]> + Display>(self, msg: M) -> Result<T, Error>;
    fn print_error(self, exit: bool);
}

impl<T> ErrorExt<T> for Result<T, Error> {
    fn prepend_error<M: AsRef<[u8]> + Display>(self, msg: M) -> Result<T, Error> {
        match self {
            Ok(t) => Ok(t),
            Err(e) => Err(error!("{}\n{}", msg, e)),
        }
    }

    fn print_error(self, exit: bool) {
        if let Err(error) = self {
            eprintln!("{}: {}", "error".red().bold(), error);

            if exit {
                print_warning_summary();
                std::process::exit(1);
            }
        }
    }
}

/// Initializes the warning-muting machinery. Must be called once before any `warning(...)` call;
/// `muted` is the set of warning names passed via `-w`/`--warning` on the command line.
pub fn init_warnings(muted: HashSet<String>) {
    unsafe {
        WARNINGS_MUTED = Some(muted);
        WARNINGS_RAISED = Some(HashMap::new());
    }
}

/// Emits a warning to stderr, subject to the per-name occurrence cap and mute list. `name` should
/// be a short stable identifier (e.g. `"include-missing"`) so repeats of the same warning class
/// can be capped independently of other classes.
pub fn warning<M: AsRef<[u8]> + Display>(msg: M, name: Option<&'static str>, location: (Option<M>, Option<u32>)) {
    unsafe {
        if WARNINGS_MUTED.is_none() {
            init_warnings(HashSet::new());
        }

        if let Some(name) = name {
            let raised = *WARNINGS_RAISED.as_ref().unwrap().get(name).unwrap_or(&0);
            WARNINGS_RAISED.as_mut().unwrap().insert(name.to_string(), raised + 1);

            if raised >= WARNINGS_MAXIMUM {
                return;
            }

            if WARNINGS_MUTED.as_ref().unwrap().contains(name) {
                return;
            }
        }
    }

    let loc_str = if location.0.is_some() && location.1.is_some() {
        format!("In file {}:{}: ", location.0.unwrap(), location.1.unwrap())
    } else if location.0.is_some() {
        format!("In file {}: ", location.0.unwrap())
    } else if location.1.is_some() {
        format!("In line {}: ", location.1.unwrap())
    } else {
        "".to_string()
    };

    let name_str = match name {
        Some(name) => format!(" [{}]", name),
        None => "".to_string(),
    };

    eprintln!("{}{}: {}{}", loc_str, "warning".yellow().bold(), msg, name_str);
}

pub fn print_warning_summary() {
    unsafe {
        if WARNINGS_RAISED.is_none() || WARNINGS_MUTED.is_none() {
            return;
        }

        for (name, raised) in WARNINGS_RAISED.as_ref().unwrap().iter() {
            if WARNINGS_MUTED.as_ref().unwrap().contains(name) {
                continue;
            }

            if *raised <= WARNINGS_MAXIMUM {
                continue;
            }
            let excess = *raised - WARNINGS_MAXIMUM;

            if excess > 1 {
                warning(
                    format!(
                        "{} warnings of type \"{}\" were suppressed to prevent spam. Use \"-w {}\" to disable these warnings entirely.",
                        excess, name, name
                    ),
                    None,
                    (None, None),
                );
            } else {
                warning(
                    format!(
                        "{} warning of type \"{}\" was suppressed to prevent spam. Use \"-w {}\" to disable these warnings entirely.",
                        excess, name, name
                    ),
                    None,
                    (None, None),
                );
            }
        }
    }
}
