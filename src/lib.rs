#[macro_use]
pub mod error;

pub mod arith;
pub mod clipboard;
pub mod condeval;
pub mod conditional;
pub mod definition;
pub mod driver;
pub mod exec;
pub mod loader;
pub mod macro_ops;
pub mod modrewrite;
pub mod namespace;
pub mod recursion;
pub mod scan;
pub mod sourceline;
pub mod sourcemap;
