use std::{cell::RefCell, io::Write, rc::Rc};

use easel::{
    diagnostics::{DiagnosticKind, EaselError},
    machine::Machine,
    package::Registry,
    source::MemorySource,
    value::Value,
};

fn machine_with(files: &[(&str, &str)]) -> (Machine, Rc<RefCell<Vec<u8>>>) {
    let buffer: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    let out: Rc<RefCell<dyn Write>> = buffer.clone();
    let registry = Registry::with_output(out);
    let mut source = MemorySource::new();
    for (path, text) in files {
        source.insert(*path, *text);
    }
    (Machine::new(registry, source), buffer)
}

fn run_with(files: &[(&str, &str)], source: &str) -> String {
    let (mut machine, buffer) = machine_with(files);
    machine
        .compile_source("main.el", source)
        .expect("compile should succeed")
        .run()
        .expect("run should succeed");
    let bytes = buffer.borrow().clone();
    String::from_utf8(bytes).expect("output is UTF-8")
}

fn run(source: &str) -> String {
    run_with(&[], source)
}

fn run_err(source: &str) -> EaselError {
    let (mut machine, _) = machine_with(&[]);
    match machine.compile_source("main.el", source) {
        Ok(program) => program.run().expect_err("expected runtime error"),
        Err(err) => err,
    }
}

fn error_kind(source: &str) -> DiagnosticKind {
    run_err(source).kind().expect("diagnostic error")
}

fn exports(source: &str) -> Value {
    let (mut machine, _) = machine_with(&[]);
    let program = machine
        .compile_source("main.el", source)
        .expect("compile should succeed");
    program.run().expect("run should succeed");
    program.exports()
}

#[test]
fn operator_precedence_binds_mul_tighter() {
    assert_eq!(run("a = 1 + 2 * 3\nprintln(a)"), "7\n");
}

#[test]
fn equal_precedence_associates_left() {
    assert_eq!(run("println(10 - 2 - 3)"), "5\n");
    assert_eq!(run("println(100 / 10 / 2)"), "5\n");
}

#[test]
fn function_literal_with_expression_body() {
    assert_eq!(run("f = |x, y| => x + y\nprintln(f(2, 40))"), "42\n");
}

#[test]
fn function_block_body_returns_through_frame() {
    let source = r#"
clamp = |v, top| => {
    if v > top {
        return top
    }
    return v
}
println(clamp(9, 5), " ", clamp(3, 5))
"#;
    assert_eq!(run(source), "5 3\n");
}

#[test]
fn function_without_return_yields_none() {
    assert_eq!(run("f = || => {}\nprintln(f())"), "none\n");
}

#[test]
fn for_loop_sums_values() {
    assert_eq!(run("s = 0\nfor v in [1,2,3] { s = s + v }\nprintln(s)"), "6\n");
}

#[test]
fn for_loop_two_binds_gets_index_and_value() {
    let source = "s = 0\nfor i, v in [10, 20, 30] { s = s + i * v }\nprintln(s)";
    // 0*10 + 1*20 + 2*30
    assert_eq!(run(source), "80\n");
}

#[test]
fn for_loop_zero_binds_runs_per_element() {
    assert_eq!(run("n = 0\nfor [5, 6, 7] { n = n + 1 }\nprintln(n)"), "3\n");
}

#[test]
fn for_loop_over_object_follows_insertion_order() {
    let source = "o = {\"a\": 1, \"b\": 2}\nfor k, v in o { println(k) }";
    assert_eq!(run(source), "a\nb\n");
}

#[test]
fn negative_array_index_counts_from_end() {
    assert_eq!(run("println([1,2,3][-1])"), "3\n");
}

#[test]
fn block_expression_produces_return_value() {
    assert_eq!(run("a = block { return 1 }\nprintln(a)"), "1\n");
    assert_eq!(run("a = block { }\nprintln(a)"), "none\n");
}

#[test]
fn while_loop_with_break_and_continue() {
    let source = r#"
i = 0
s = 0
while true {
    i = i + 1
    if i > 5 {
        break
    }
    if i % 2 == 0 {
        continue
    }
    s = s + i
}
println(s)
"#;
    assert_eq!(run(source), "9\n");
}

#[test]
fn closures_capture_their_defining_scope() {
    let source = r#"
x = 1
get = || => x
x = 2
println(get())
"#;
    assert_eq!(run(source), "2\n");
}

#[test]
fn counter_closure_keeps_state() {
    let source = r#"
make = || => {
    n = 0
    return || => {
        n += 1
        return n
    }
}
tick = make()
tick()
tick()
println(tick())
"#;
    assert_eq!(run(source), "3\n");
}

#[test]
fn augmented_assignment_applies_operator() {
    assert_eq!(run("a = 1\na += 4\nprintln(a)"), "5\n");
    assert_eq!(run("a = 10\na -= 2\na *= 3\nprintln(a)"), "24\n");
}

#[test]
fn else_if_chain_picks_matching_branch() {
    let source = r#"
grade = |n| => {
    if n >= 90 {
        return "a"
    } else if n >= 80 {
        return "b"
    } else {
        return "c"
    }
}
println(grade(95), grade(85), grade(10))
"#;
    assert_eq!(run(source), "abc\n");
}

#[test]
fn string_escapes_decode() {
    assert_eq!(run(r#"println("a\tb\u0041\U0001f3b1")"#), "a\tbA\u{1f3b1}\n");
}

#[test]
fn number_literal_bases() {
    assert_eq!(run("println(0xff + 0b1 + 0o10)"), "264\n");
    assert_eq!(run("println(10_000)"), "10000\n");
}

#[test]
fn number_rendering_round_trips() {
    assert_eq!(run("println(1000.0203405)"), "1000.0203405\n");
    assert_eq!(run("println(0.1 + 0.2)"), "0.3\n");
    assert_eq!(run("println(-inf)"), "-inf\n");
}

#[test]
fn euclidean_modulus_for_integers() {
    assert_eq!(run("println(-4 % 3)"), "2\n");
}

#[test]
fn duplicate_object_keys_overwrite_value() {
    assert_eq!(run("o = {\"a\": 1, \"a\": 2}\nprintln(len(o), o[\"a\"])"), "12\n");
}

#[test]
fn multi_index_walks_nested_objects() {
    assert_eq!(run(r#"println({1: {"foo": "hello"}}[1, "foo"])"#), "hello\n");
    assert_eq!(run(r#"println({1: {"foo": "hello"}}[1]["foo"])"#), "hello\n");
}

#[test]
fn string_selector_pieces() {
    assert_eq!(run(r#"println({"0foo": {"bar": "hi"}}."0foo".bar)"#), "hi\n");
}

#[test]
fn composite_keys_index_objects() {
    assert_eq!(run(r#"println({[1, 2]: "pair"}[[1, 2]])"#), "pair\n");
}

#[test]
fn scoped_blocks_do_not_leak_new_names() {
    let leaked = run_err("if true { y = 1 }\nprintln(y)");
    assert!(leaked.to_string().contains("not defined"), "{leaked}");

    // Existing outer names are written through.
    assert_eq!(run("y = 1\nif true { y = 2 }\nprintln(y)"), "2\n");
}

#[test]
fn builtins_cover_numeric_helpers() {
    assert_eq!(run("println(len(\"hello\"), len([1]), len({}))"), "510\n");
    assert_eq!(run("println(min(3, 1, 2), max(3, 1, 2))"), "13\n");
    assert_eq!(run("println(min(\"pear\", \"fig\"), max(\"pear\", \"fig\"))"), "figpear\n");
    assert_eq!(run("println(sum(1, 2, 3), abs(-4), pow(2, 8))"), "64256\n");
}

#[test]
fn builtins_cover_predicates() {
    assert_eq!(
        run("println(is_none(none), is_bool(true), is_number(1), is_string(\"\"))"),
        "truetruetruetrue\n"
    );
    assert_eq!(
        run("println(is_array([]), is_object({}), is_func(|| => 1))"),
        "truetruetrue\n"
    );
    assert_eq!(run("println(iterable([]), iterable(1))"), "truefalse\n");
    assert_eq!(run("println(bool(0), bool(3), bool(\"\"), bool(none))"), "falsetruefalsefalse\n");
    assert_eq!(run("println(all(1, true, \"x\"), any(0, false, \"\"))"), "truefalse\n");
}

#[test]
fn str_renders_canonically() {
    assert_eq!(run("println(str(42) + str(none) + str([1, 2]))"), "42none[1, 2]\n");
}

#[test]
fn bytes_arrays_lift_to_numbers() {
    assert_eq!(run("b = str_bytes(\"hi\")\nprintln(b[0], b[-1])"), "104105\n");
    assert_eq!(run("b = str_bytes(\"hi\")\nprintln(len(b + b))"), "4\n");
    let source = "b = str_bytes(\"ab\")\ns = 0\nfor v in b { s = s + v }\nprintln(s)";
    assert_eq!(run(source), "195\n");
    assert_eq!(run("println(str_bytes(\"ab\") == [97, 98])"), "true\n");
}

#[test]
fn iter_package_pipeline() {
    let source = r#"
using iter

res = iter.
    range(10, 100, 3).
    where(|v| => v % 2 == 0).
    select(|v| => v * 2).
    max(10).
    list()
println(res)
println(iter.range(100).count())
"#;
    assert_eq!(
        run(source),
        "[20, 32, 44, 56, 68, 80, 92, 104, 116, 128]\n100\n"
    );
}

#[test]
fn iter_from_restarts_collections() {
    let source = r#"
using iter as it

res = it.from([3, 1, 2]).max(2).list()
println(res)
for pair in it.from({"a": 1}).list() {
    println(pair.key, pair.value)
}
"#;
    assert_eq!(run(source), "[3, 1]\na1\n");
}

#[test]
fn pub_names_surface_in_exports() {
    let module = exports("pub x = 10\npub f = |v| => v + 1\ny = 2");
    let object = module.as_object().expect("exports object");
    assert_eq!(object.len(), 2);
    assert_eq!(object.get_named("x").unwrap().to_string(), "10");
    assert!(object.get_named("y").is_none());
}

#[test]
fn import_returns_pub_object() {
    let files = [("m.el", "pub x = 10\n")];
    assert_eq!(run_with(&files, "println((import \"m.el\").x)"), "10\n");
}

#[test]
fn import_runs_each_file_once() {
    let files = [("m.el", "println(\"loaded\")\npub x = 1\n")];
    let source = "a = import \"m.el\"\nb = import \"m.el\"\nprintln(a.x + b.x)";
    assert_eq!(run_with(&files, source), "loaded\n2\n");
}

#[test]
fn import_supports_transitive_modules() {
    let files = [
        ("inner.el", "pub base = 40\n"),
        ("outer.el", "pub total = (import \"inner.el\").base + 2\n"),
    ];
    assert_eq!(
        run_with(&files, "println((import \"outer.el\").total)"),
        "42\n"
    );
}

#[test]
fn import_cycle_is_detected() {
    let files = [
        ("a.el", "pub x = (import \"b.el\").y\n"),
        ("b.el", "pub y = (import \"a.el\").x\n"),
    ];
    let (mut machine, _) = machine_with(&files);
    let err = machine
        .compile_source("main.el", "import \"a.el\"")
        .expect("compile should succeed")
        .run()
        .expect_err("cycle should fail");
    assert!(err.to_string().contains("import cycle"), "{err}");
}

#[test]
fn import_rejects_non_regular_files() {
    use easel::source::DirSource;
    let dir = tempfile::tempdir().expect("create temp dir");
    std::fs::create_dir(dir.path().join("sub.el")).expect("create directory");
    let mut machine = Machine::new(Registry::new(), DirSource::new(dir.path()));
    let err = machine
        .eval_source("import \"sub.el\"")
        .expect_err("directories must not import");
    assert_eq!(err.kind(), Some(DiagnosticKind::Runtime));
    assert!(err.to_string().contains("not a regular file"), "{err}");
}

#[test]
fn import_missing_module_is_runtime_error() {
    let err = run_err("import \"ghost.el\"");
    assert_eq!(err.kind(), Some(DiagnosticKind::Runtime));
    assert!(err.to_string().contains("not found"), "{err}");
}

#[test]
fn import_path_validation_is_compile_time() {
    let escaping = run_err("import \"../outside.el\"");
    assert_eq!(escaping.kind(), Some(DiagnosticKind::Compile));
    assert!(escaping.to_string().contains("escape"), "{escaping}");

    let absolute = run_err("import \"/etc/hosts\"");
    assert_eq!(absolute.kind(), Some(DiagnosticKind::Compile));

    let empty = run_err("import \"\"");
    assert_eq!(empty.kind(), Some(DiagnosticKind::Compile));
}

#[test]
fn top_level_return_in_block_stops_script() {
    let source = "println(\"first\")\nif true {\n    return\n}\nprintln(\"second\")";
    assert_eq!(run(source), "first\n");
}

#[test]
fn compile_error_taxonomy() {
    for source in [
        "return 1",
        "break",
        "continue",
        "f = || => { break }",
        "using ghost_package",
        "f = |a, a| => a",
        "a += 1",
        "if true { pub x = 1 }",
        "pub x += 1",
        "pub x = 1\npub x = 2",
        "1 = 2",
        "-a = 2",
        "a.b = 2",
        "a + b = 2",
        "println(\"\\q: \\u00\")",
        "println(0b2)",
    ] {
        assert_eq!(
            error_kind(source),
            DiagnosticKind::Compile,
            "{source:?} should be a compile error"
        );
    }
}

#[test]
fn runtime_error_taxonomy() {
    for source in [
        "println(\"1\" == 1)",
        "println(\"1\" < 1)",
        "println(1 < true)",
        "println(1())",
        "(|a| => a)(1, 2)",
        "println({\"a\": 1}[\"b\"])",
        "println([1, 2, 3][3])",
        "println([1, 2, 3][0.5])",
        "for v in 42 { }",
        "f = || => 1\no = {f: 1}",
        "println(inf + -inf)",
        "println(inf - inf)",
        "println(0 / 0)",
        "println(inf / inf)",
        "println(0 * inf)",
        "println(5 % 0)",
        "println(5 % inf)",
        "while 1 { }",
        "if 1 { }",
        "println(missing)",
        "println(-\"x\")",
        "println(not 1)",
    ] {
        assert_eq!(
            error_kind(source),
            DiagnosticKind::Runtime,
            "{source:?} should be a runtime error"
        );
    }
}

#[test]
fn syntax_and_lexical_errors_are_classified() {
    assert_eq!(error_kind("a = "), DiagnosticKind::Syntax);
    assert_eq!(error_kind("if { }"), DiagnosticKind::Syntax);
    assert_eq!(error_kind("a = 1 b = 2"), DiagnosticKind::Syntax);
    assert_eq!(error_kind("\"unterminated"), DiagnosticKind::Lexical);
    assert_eq!(error_kind("a $ b"), DiagnosticKind::Lexical);
}

#[test]
fn infinity_arithmetic_that_succeeds() {
    assert_eq!(run("println(inf + 111)"), "inf\n");
    assert_eq!(run("println(inf - -inf)"), "inf\n");
    assert_eq!(run("println(1 / 0)"), "inf\n");
    assert_eq!(run("println(-1 / 0)"), "-inf\n");
    assert_eq!(run("println(5 / inf)"), "0\n");
    assert_eq!(run("println(inf == inf)"), "true\n");
}

#[test]
fn structural_equality_is_deep() {
    assert_eq!(run("println([1, \"2\", true] == [1, \"2\", true])"), "true\n");
    assert_eq!(
        run("println({1: \"x\", \"foo\": {true: false}} == {1: \"x\", \"foo\": {true: false}})"),
        "true\n"
    );
    assert_eq!(run("println({} == {1: 2})"), "false\n");
    assert_eq!(run("f = || => 1\nprintln(f == f)"), "false\n");
}

#[test]
fn concatenation_of_strings_and_arrays() {
    assert_eq!(run("println(\"hello\" + \" world\")"), "hello world\n");
    assert_eq!(run("println([1] + [2, 3])"), "[1, 2, 3]\n");
}

#[test]
fn boolean_operators_are_strict() {
    assert_eq!(run("println(1 == 1 or 1 != 1)"), "true\n");
    assert_eq!(run("println(true and false)"), "false\n");
    // Both sides evaluate: a type fault on the right is never skipped.
    assert_eq!(error_kind("println(false and (1 == \"1\"))"), DiagnosticKind::Runtime);
}

#[test]
fn print_does_not_append_newline() {
    assert_eq!(run("print(\"a\", 1)\nprint(\"b\")"), "a1b");
}

#[test]
fn arguments_shadow_outer_names() {
    let source = "x = 1\nf = |x| => x * 10\nprintln(f(5), \" \", x)";
    assert_eq!(run(source), "50 1\n");
}

#[test]
fn recursion_through_global_binding() {
    let source = r#"
fact = |n| => {
    if n <= 1 {
        return 1
    }
    return fact(n - 1) * n
}
println(fact(5))
"#;
    assert_eq!(run(source), "120\n");
}
