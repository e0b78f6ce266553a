use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn easel_run_quickstart() {
    let mut cmd = Command::cargo_bin("easel").expect("binary exists");
    cmd.arg("run").arg("demos/quickstart.el");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Hello from Easel!"))
        .stdout(predicate::str::contains("a = 7"))
        .stdout(predicate::str::contains("add(2, 40) = 42"))
        .stdout(predicate::str::contains("limit = 100"));
}

#[test]
fn easel_run_collections() {
    let mut cmd = Command::cargo_bin("easel").expect("binary exists");
    cmd.arg("run").arg("demos/collections.el");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("total = 6"))
        .stdout(predicate::str::contains("apples: 3"))
        .stdout(predicate::str::contains("last = 3"))
        .stdout(predicate::str::contains("nested = hello"));
}

#[test]
fn easel_run_iterators() {
    let mut cmd = Command::cargo_bin("easel").expect("binary exists");
    cmd.arg("run").arg("demos/iterators.el");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("[0, 4, 16, 36, 64]"))
        .stdout(predicate::str::contains("count = 30"));
}

#[test]
fn easel_run_resolves_imports_beside_script() {
    let mut cmd = Command::cargo_bin("easel").expect("binary exists");
    cmd.arg("run").arg("demos/modules/main.el");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Hello from a module!"));
}

#[test]
fn easel_eval_snippet() {
    let mut cmd = Command::cargo_bin("easel").expect("binary exists");
    cmd.arg("eval").arg("println(40 + 2)");
    cmd.assert().success().stdout("42\n");
}

#[test]
fn easel_eval_reports_runtime_errors() {
    let mut cmd = Command::cargo_bin("easel").expect("binary exists");
    cmd.arg("eval").arg("println(inf + -inf)");
    cmd.assert().failure();
}

#[test]
fn easel_run_script_from_temp_dir() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("job.el");
    fs::write(
        &script,
        "lib = import \"lib.el\"\nprintln(lib.twice(21))\n",
    )
    .expect("write script");
    fs::write(dir.path().join("lib.el"), "pub twice = |v| => v * 2\n").expect("write lib");

    let mut cmd = Command::cargo_bin("easel").expect("binary exists");
    cmd.arg("run").arg(&script);
    cmd.assert().success().stdout("42\n");
}
