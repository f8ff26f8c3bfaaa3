use std::fs;
use std::fs::File;
use std::io::Write;

use tempfile::tempdir;

use macroforge::driver::transpile;
use macroforge::recursion::detect_recursion;

fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    File::create(&path).unwrap().write_all(content.as_bytes()).unwrap();
    path
}

fn run(content: &str) -> String {
    let dir = tempdir().unwrap();
    let main = write(&dir, "main.pyx", content);
    let body = transpile(&main, false).unwrap();
    body.iter().map(|l| l.content.as_str()).collect()
}

#[test]
fn directive_free_input_is_idempotent() {
    let input = "x = 1\nprint(x)\n";
    assert_eq!(run(input), input);
}

#[test]
fn self_referential_expand_is_finite_and_cyclebroken() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.pyx");
    fs::write(&a, "before\n$expand a.pyx\nafter\n").unwrap();
    let body = transpile(&a, false).unwrap();
    let texts: Vec<&str> = body.iter().map(|l| l.content.as_str()).collect();
    assert_eq!(texts, vec!["before\n", "after\n"]);
}

#[test]
fn cases_one_is_a_pure_noop() {
    assert_eq!(run("$cases 1\nonly_line()\n"), "only_line()\n");
}

#[test]
fn cases_n_wraps_in_a_repetition_loop() {
    assert_eq!(run("$cases 3\nroll()\n"), "for _ in range(3):\n    roll()\n");
}

#[test]
fn debug_lines_strip_outside_exec_and_survive_in_exec_mode() {
    let dir = tempdir().unwrap();
    let main = write(&dir, "main.pyx", "?checkpoint()\nlive()\n");
    assert_eq!(transpile(&main, false).unwrap().len(), 1);

    let exec = transpile(&main, true).unwrap();
    assert_eq!(exec.len(), 2);
    assert_eq!(exec[0].content, "checkpoint()\n");
}

#[test]
fn debug_only_macro_is_tombstoned_outside_exec_mode() {
    let out = run("$debug !macro noisy(x): log(x)\nnoisy(5)\nkeep = 1\n");
    assert_eq!(out, "keep = 1\n");
}

#[test]
fn macro_op_len_and_slice_inside_variadic_body() {
    let out = run("!macro describe(*xs): (!len(xs), xs![0], xs![1:])\ndescribe(7, 8, 9)\n");
    assert_eq!(out, "(3, 7, 8, 9)\n");
}

#[test]
fn variadic_macro_absorbs_trailing_args() {
    let out = run("!macro total(*nums): sum([nums])\nprint(total(1, 2, 3))\n");
    assert_eq!(out, "print(sum([1, 2, 3]))\n");
}

#[test]
fn method_style_variadic_placeholder_binds_tuple_contents() {
    let out = run("!method *items.joined(): \",\".join([items])\nx = (a, b, c).joined()\n");
    assert_eq!(out, "x = \",\".join([a, b, c])\n");
}

#[test]
fn conditional_picks_branch_from_call_site_binding() {
    let out = run("!macro classify(n):\n    !if n > 0: pos = True\n    !else: pos = False\nclassify(5)\n");
    assert_eq!(out, "pos = True\n");
}

#[test]
fn mod_rewriter_only_applies_after_mod_directive() {
    let out = run("a %+= 1\n$mod 7\nb %+= 1\n");
    assert_eq!(out, "a %+= 1\nb=(b+(1))%(7)\n");
}

#[test]
fn namespace_definitions_are_pulled_in_by_using() {
    let out = run("$namespace helpers\n!define GREETING: \"hi\"\n$\nmsg = GREETING\n$using helpers\nmsg2 = GREETING\n");
    assert_eq!(out, "msg = GREETING\nmsg2 = \"hi\"\n");
}

#[test]
fn function_recursion_is_detected_for_preamble_decision() {
    let dir = tempdir().unwrap();
    let main = write(&dir, "main.pyx", "def fact(n):\n    return fact(n-1)\n");
    let body = transpile(&main, false).unwrap();
    assert!(detect_recursion(&body));
}

#[test]
fn non_recursive_program_does_not_trigger_preamble() {
    let dir = tempdir().unwrap();
    let main = write(&dir, "main.pyx", "def helper(n):\n    return n + 1\n");
    let body = transpile(&main, false).unwrap();
    assert!(!detect_recursion(&body));
}
