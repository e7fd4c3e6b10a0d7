// Foxscream end-to-end language tests

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use foxscream_core::{ErrorKind, Runtime, RuntimeConfig};
use pretty_assertions::assert_eq;
use serde_json::json;

/// Output sink shared between a runtime and the test reading it
#[derive(Clone, Default)]
struct Captured(Rc<RefCell<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capturing_runtime() -> (Runtime, Captured) {
    let sink = Captured::default();
    let runtime = Runtime::new().with_output(Box::new(sink.clone()));
    (runtime, sink)
}

fn eval(source: &str) -> String {
    Runtime::new().run(source).unwrap().to_string()
}

fn error_kind(source: &str) -> ErrorKind {
    Runtime::new().run(source).unwrap_err().kind
}

// ==================== Scopes ====================

#[test]
fn test_parameter_shadows_global() {
    let source = "x = 1
                  fn f(x) { x = 10; x }
                  [f(5), x]";
    assert_eq!(eval(source), "[10, 1]");
}

#[test]
fn test_assignment_in_block_lands_in_enclosing_declaration_scope() {
    let mut rt = Runtime::new();
    rt.run("{ { y = 5 } }").unwrap();
    assert_eq!(rt.get_global("y").unwrap().to_string(), "5");
    assert_eq!(rt.live_scopes(), 1);
}

#[test]
fn test_assignment_in_function_stays_local() {
    assert_eq!(error_kind("fn f() { z = 3 }; f(); z"), ErrorKind::UndeclaredName);
}

#[test]
fn test_closure_snapshot() {
    assert_eq!(eval("x = 1; f = fn() { return x }; x = 2; f()"), "1");
}

#[test]
fn test_captured_names_are_copied_per_call() {
    let source = "n = 1
                  fn bump() { n += 1; n }
                  [bump(), bump(), n]";
    assert_eq!(eval(source), "[2, 2, 1]");
}

#[test]
fn test_scope_dump_ignores_block_grouping() {
    let mut flat = Runtime::new();
    flat.run("a = 1; b = [1, 2]; a += 1; c = \"done\"").unwrap();

    let mut grouped = Runtime::new();
    grouped
        .run("{ a = 1 }; { b = [1, 2]; { a += 1 } }; label l: { c = \"done\"; leave l }")
        .unwrap();

    assert_eq!(flat.dump_scope(), "a = 2\nb = [1, 2]\nc = \"done\"");
    assert_eq!(grouped.dump_scope(), flat.dump_scope());
}

// ==================== Control flow ====================

#[test]
fn test_break_stops_loop_at_exact_iteration() {
    let mut rt = Runtime::new();
    let value = rt
        .run(
            "last = 0
             for i in [1, 2, 3] { last = i; if i == 2 { break } }
             last",
        )
        .unwrap();
    assert_eq!(value.to_string(), "2");
    assert_eq!(rt.live_scopes(), 1);
    // Nothing left pending in the global scope
    assert_eq!(rt.run("last + 1").unwrap().to_string(), "3");
}

#[test]
fn test_return_from_nested_loops() {
    let source = "fn find(xs) {
                      for x in xs { for y in [0] { if x > 2 { return x } } }
                      return -1
                  }
                  [find([1, 5, 3]), find([1])]";
    assert_eq!(eval(source), "[5, -1]");
}

#[test]
fn test_top_level_return_ends_program() {
    let mut rt = Runtime::new();
    assert_eq!(rt.run("x = 1; return 5; x = 2").unwrap().to_string(), "5");
    assert_eq!(rt.get_global("x").unwrap().to_string(), "1");
}

#[test]
fn test_continue_to_outer_label() {
    let source = "pairs = []
                  label outer: for i in [1, 2] {
                      for j in [1, 2] {
                          if j == 2 { continue outer }
                          pairs += [[i, j]]
                      }
                  }
                  pairs";
    assert_eq!(eval(source), "[[1, 1], [2, 1]]");
}

// ==================== Defer ====================

#[test]
fn test_defers_run_in_reverse_order() {
    let (mut rt, out) = capturing_runtime();
    rt.run("{ defer print(\"a\"); defer print(\"b\"); print(\"c\") }")
        .unwrap();
    assert_eq!(out.text(), "c\nb\na\n");
}

#[test]
fn test_block_value_is_last_executed_defer() {
    assert_eq!(eval("{ defer \"a\"; defer \"b\"; \"c\" }"), "a");
}

#[test]
fn test_defer_return_replaces_returned_value() {
    assert_eq!(eval("fn f() { defer return 2; return 1 }; f()"), "2");
}

#[test]
fn test_defers_run_while_error_unwinds() {
    let (mut rt, out) = capturing_runtime();
    let error = rt
        .run("fn f() { defer print(\"cleanup\"); 1 / 0 }; f()")
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::DivisionByZero);
    assert_eq!(out.text(), "cleanup\n");
    assert_eq!(rt.live_scopes(), 1);
}

// ==================== Classes ====================

#[test]
fn test_nearest_field_wins() {
    let source = "class A { x = 1 }
                  class B of A { y = 2 }
                  class C of B { x = 5 }
                  [C().x, C().y, B().x]";
    assert_eq!(eval(source), "[5, 2, 1]");
}

#[test]
fn test_equal_distance_fields_are_ambiguous() {
    let source = "class A { x = 1 }
                  class B { x = 2 }
                  class C of A, B { }
                  C().x";
    assert_eq!(error_kind(source), ErrorKind::AmbiguousField);
}

#[test]
fn test_diamond_inheritance_is_not_ambiguous() {
    let source = "class Base { v = 1 }
                  class L of Base { }
                  class R of Base { }
                  class D of L, R { }
                  D().v";
    assert_eq!(eval(source), "1");
}

#[test]
fn test_methods_write_fields_back() {
    let source = "class Point {
                      x = 0
                      y = 0
                      fn init(a, b) { x = a; y = b }
                      fn sum() { x + y }
                      fn shift(d) { x += d }
                  }
                  p = Point(1, 2)
                  p.shift(10)
                  [p.sum(), p.x, p.y]";
    assert_eq!(eval(source), "[13, 11, 2]");
}

#[test]
fn test_instances_do_not_share_template_values() {
    let source = "class Bag { items = [] }
                  a = Bag()
                  b = Bag()
                  a.items += [1]
                  [len(a.items), len(b.items)]";
    assert_eq!(eval(source), "[1, 0]");
}

#[test]
fn test_trait_methods_reach_instances() {
    let source = "trait class Named { fn hello() { \"hi\" } }
                  class P has Named { }
                  [P().hello(), P() of Named]";
    assert_eq!(eval(source), "[\"hi\", true]");
}

#[test]
fn test_methods_call_siblings_by_bare_name() {
    let source = "class Counter {
                      x = 0
                      fn bump() { x += 1 }
                      fn twice() { bump(); bump() }
                  }
                  c = Counter()
                  c.twice()
                  c.x";
    assert_eq!(eval(source), "2");
}

#[test]
fn test_missing_field_is_unknown() {
    for source in [
        "class K { }; K().missing",
        "class K { }; K.missing",
        "n = 5; n.missing",
    ] {
        let error = Runtime::new().run(source).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnknownField);
        assert!(error.message.contains("'missing'"), "{}", error.message);
    }
}

#[test]
fn test_class_without_init_rejects_arguments() {
    assert_eq!(error_kind("class E { }; E(1)"), ErrorKind::ArityMismatch);
}

// ==================== Overloads ====================

#[test]
fn test_exact_class_overload_beats_ancestor() {
    let source = "fn f(a: int) { \"int\" }
                  fn f(a: number) { \"number\" }
                  [f(5), f(2.5)]";
    assert_eq!(eval(source), "[\"int\", \"number\"]");
}

#[test]
fn test_equal_distance_overloads_are_ambiguous() {
    let source = "fn f(a: int, b: number) { 1 }
                  fn f(a: number, b: int) { 2 }
                  f(1, 1)";
    assert_eq!(error_kind(source), ErrorKind::AmbiguousOverload);
}

#[test]
fn test_return_type_with_exclusion_fits_wider_binding() {
    assert_eq!(eval("fn f() -> number - float { 1 }; x: number = f(); x"), "1");
    assert_eq!(
        error_kind("fn f() -> number - float { 1 }; y: float = f()"),
        ErrorKind::TypeError
    );
}

#[test]
fn test_nearer_method_definition_wins() {
    let source = "class A { fn who() { \"A\" } }
                  class B of A { fn who() { \"B\" } }
                  class C of B { }
                  C().who()";
    assert_eq!(eval(source), "B");
}

// ==================== Runtime surface ====================

#[test]
fn test_state_survives_an_error() {
    let mut rt = Runtime::new();
    rt.run("x = 1").unwrap();
    let error = rt.run("x = 2; missing_name").unwrap_err();
    assert_eq!(error.kind, ErrorKind::UndeclaredName);
    assert_eq!(rt.run("x").unwrap().to_string(), "2");

    rt.run("fn f() { for i in [1] { { 1 / 0 } } }").unwrap();
    assert!(rt.run("f()").is_err());
    assert_eq!(rt.live_scopes(), 1);
    assert_eq!(rt.run("x + 1").unwrap().to_string(), "3");
}

#[test]
fn test_print_writes_to_output_sink() {
    let (mut rt, out) = capturing_runtime();
    rt.run("print(\"hi\", 1, [1, \"a\"]); print()").unwrap();
    assert_eq!(out.text(), "hi 1 [1, \"a\"]\n\n");
}

#[test]
fn test_json_dump_lists_user_globals() {
    let mut rt = Runtime::new();
    rt.run("n = 1; s = \"t\"; arr = [1, 2.5]").unwrap();
    assert_eq!(
        rt.dump_scope_json(),
        json!([
            {"name": "arr", "type": "array", "value": [1, 2.5]},
            {"name": "n", "type": "int", "value": 1},
            {"name": "s", "type": "str", "value": "t"},
        ])
    );
}

#[test]
fn test_self_containing_array_is_printable_and_comparable() {
    let mut rt = Runtime::new();
    rt.run("a = [1]; a[0] = a; b = [1]; b[0] = b").unwrap();
    assert_eq!(rt.run("a == b").unwrap().to_string(), "true");
    assert_eq!(rt.run("str(a)").unwrap().to_string(), "[[...]]");
    assert_eq!(rt.dump_scope(), "a = [[...]]\nb = [[...]]");
    assert_eq!(
        rt.dump_scope_json(),
        json!([
            {"name": "a", "type": "array", "value": ["[...]"]},
            {"name": "b", "type": "array", "value": ["[...]"]},
        ])
    );
}

#[test]
fn test_oversized_repetition_raises() {
    assert_eq!(error_kind("\"ab\" * 9223372036854775807"), ErrorKind::ValueError);
    assert_eq!(error_kind("[0] * 9223372036854775807"), ErrorKind::ValueError);
}

#[test]
fn test_call_depth_follows_config() {
    let mut rt = Runtime::with_config(RuntimeConfig::new("depth.fox").with_max_call_depth(8));
    rt.run("fn down(n) { if n == 0 { 0 } else { down(n - 1) } }")
        .unwrap();
    assert_eq!(rt.run("down(5)").unwrap().to_string(), "0");
    let error = rt.run("down(50)").unwrap_err();
    assert_eq!(error.kind, ErrorKind::RuntimeError);
    assert_eq!(error.file, "depth.fox");
}
