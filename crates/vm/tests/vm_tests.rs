//! Integration tests for the Glint interpreter.
//!
//! Tests cover:
//! - Control flow: if/elif/else, while, for, short-circuit operators
//! - `return` out of nested blocks and `try` regions
//! - try/catch binding and uncaught error reporting
//! - Name resolution order and the assignment rule for variables
//! - Parameter binding with keywords and defaults
//! - Classes, statics and operator overloading
//! - Host embedding: modules, objects, member access, termination
//! - Breakpoint and exception handlers

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use glint_common::{
    is_hidden, Arguments, BranchKind, BreakpointAction, ExecutionState, Instruction, Limits,
    NativeModule, Object, Procedure, Program, ProgramParts, RuntimeError, ScriptError, Value,
};
use glint_parser::{parse_program, parse_program_with, ParseOptions};
use proptest::prelude::*;

// ============================================================
// Helpers
// ============================================================

/// Output sink the test can read back after the run.
#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn quiet_state() -> ExecutionState {
    ExecutionState::new().with_output(io::sink())
}

/// Parse and initialize `source`, panicking on any error.
fn run(source: &str) -> Rc<Program> {
    let program = parse_program(source, "test.gl");
    let mut state = quiet_state();
    if let Err(e) = glint_vm::initialize(&mut state, &program) {
        panic!("run failed: {e}");
    }
    program
}

/// Parse and initialize `source`, expecting it to fail.
fn run_err(source: &str) -> ScriptError {
    let program = parse_program(source, "test.gl");
    let mut state = quiet_state();
    glint_vm::initialize(&mut state, &program).expect_err("run should fail")
}

fn member(program: &Program, name: &str) -> Value {
    program
        .get_member(name)
        .unwrap()
        .unwrap_or_else(|| panic!("no member '{name}'"))
}

fn num(n: f64) -> Value {
    Value::Number(n)
}

// ============================================================
// Control flow
// ============================================================

#[test]
fn if_else_picks_branch() {
    let program = run("if (true) { x = 1; } else { x = 2; }");
    assert_eq!(member(&program, "x"), num(1.0));
    let program = run("if (false) { x = 1; } else { x = 2; }");
    assert_eq!(member(&program, "x"), num(2.0));
}

#[test]
fn elif_cascade() {
    let source = "def grade(n) {
        if (n > 90) { return 'a'; }
        elif (n > 70) { return 'b'; }
        else if (n > 50) { return 'c'; }
        else { return 'd'; }
    }
    a = grade(95); b = grade(80); c = grade(60); d = grade(10);";
    let program = run(source);
    assert_eq!(member(&program, "a"), Value::str("a"));
    assert_eq!(member(&program, "b"), Value::str("b"));
    assert_eq!(member(&program, "c"), Value::str("c"));
    assert_eq!(member(&program, "d"), Value::str("d"));
}

#[test]
fn while_counts() {
    let program = run("i = 0; n = 0; while (i < 5) { i = i + 1; n = n + i; }");
    assert_eq!(member(&program, "i"), num(5.0));
    assert_eq!(member(&program, "n"), num(15.0));
}

#[test]
fn for_sums_range() {
    let program = run("sum = 0; for (v : range(0, 5)) { sum = sum + v; }");
    assert_eq!(member(&program, "sum"), num(10.0));
}

#[test]
fn for_evaluates_iterable_once() {
    let source = "calls = 0;
    def items() { calls = calls + 1; return range(0, 5); }
    sum = 0;
    for (v : items()) { sum = sum + v; }";
    let program = run(source);
    assert_eq!(member(&program, "sum"), num(10.0));
    assert_eq!(member(&program, "calls"), num(1.0));
}

#[test]
fn for_over_map_yields_pairs() {
    let source = "m = {}; m['a'] = 1; m['b'] = 2;
    total = 0; keys = 0;
    for (entry : m) { total = total + entry.second; keys = keys + len(entry.first); }";
    let program = run(source);
    assert_eq!(member(&program, "total"), num(3.0));
    assert_eq!(member(&program, "keys"), num(2.0));
}

#[test]
fn top_level_for_keeps_counters_private() {
    let program = run("total = 0;\nfor (v : [1, 2, 3]) { for (w : [10]) { total = total + v + w; } }");
    assert_eq!(member(&program, "total"), num(36.0));
    let names: Vec<String> = program
        .member_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    assert_eq!(names, ["total", "v", "w"]);
    assert!(program
        .members_snapshot()
        .iter()
        .all(|(name, _)| !is_hidden(name)));
}

#[test]
fn short_circuit_skips_right_side() {
    let source = "calls = 0;
    def touch() { calls = calls + 1; return true; }
    a = false && touch();
    b = true || touch();
    c = true && touch();";
    let program = run(source);
    assert_eq!(member(&program, "a"), Value::Bool(false));
    assert_eq!(member(&program, "b"), Value::Bool(true));
    assert_eq!(member(&program, "c"), Value::Bool(true));
    assert_eq!(member(&program, "calls"), num(1.0));
}

#[test]
fn condition_must_be_bool() {
    let e = run_err("if (1) { x = 1; }");
    assert_eq!(
        e.runtime_error(),
        Some(&RuntimeError::type_mismatch("condition", "bool", "number"))
    );
}

// ============================================================
// Return
// ============================================================

#[test]
fn return_from_nested_blocks() {
    let source = "def find(xs, want) {
        for (x : xs) {
            if (x == want) {
                while (true) { return 'found'; }
            }
        }
        return 'missing';
    }
    a = find([1, 2, 3], 2);
    b = find([1, 2, 3], 9);";
    let program = run(source);
    assert_eq!(member(&program, "a"), Value::str("found"));
    assert_eq!(member(&program, "b"), Value::str("missing"));
}

#[test]
fn bare_return_gives_null() {
    let program = run("def f() { return; } r = f(); def g() { x = 1; } s = g();");
    assert_eq!(member(&program, "r"), Value::None);
    assert_eq!(member(&program, "s"), Value::None);
}

#[test]
fn return_inside_try_leaves_handler() {
    let reports = Rc::new(RefCell::new(0));
    let source = "def guarded() { try { return 1; } catch : e { return 2; } }
    def fail() { return nope; }
    r = guarded();
    fail();";
    let program = parse_program(source, "test.gl");
    let mut state = quiet_state();
    let count = reports.clone();
    state.set_exception_handler(move |_, _| *count.borrow_mut() += 1);
    assert!(glint_vm::initialize(&mut state, &program).is_err());
    assert_eq!(member(&program, "r"), num(1.0));
    // The try region in `guarded` is gone, so the later error is uncaught.
    assert_eq!(*reports.borrow(), 1);
}

#[test]
fn recursion_computes_fib() {
    let program = run(
        "def fib(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); }
        r = fib(15);",
    );
    assert_eq!(member(&program, "r"), num(610.0));
}

#[test]
fn recursion_limit_is_reported_at_callee() {
    let program = parse_program(
        "x = 1;\ndef down(n) { return down(n + 1); }\ndown(0);\n",
        "test.gl",
    );
    let mut state = quiet_state().with_limits(Limits {
        max_call_depth: 32,
        ..Limits::default()
    });
    let e = glint_vm::initialize(&mut state, &program).unwrap_err();
    assert_eq!(e.to_string(), "test.gl:2:1: call depth exceeded limit 32");
    assert!(state.call_stack.is_empty());
}

// ============================================================
// try / catch
// ============================================================

#[test]
fn catch_binds_message_and_continues() {
    let program = run("try { x = 1 / 0; } catch : e { result = e; } after = 1;");
    let Value::Str(message) = member(&program, "result") else {
        panic!("catch binding is not a string");
    };
    assert!(message.starts_with("test.gl:1:"));
    assert!(message.ends_with("division by zero"));
    assert_eq!(member(&program, "after"), num(1.0));
    assert!(!program.has_member("x"));
}

#[test]
fn catch_takes_errors_from_callees() {
    let source = "def deep() { return [1, 2][5]; }
    def middle() { return deep(); }
    try { middle(); } catch : e { caught = e; }";
    let program = run(source);
    let caught = member(&program, "caught").to_string();
    assert!(caught.ends_with("index 5 out of bounds (length 2)"), "{caught}");
}

#[test]
fn unbound_catch_discards_message() {
    let program = run("try { raise('x'); } catch { ok = true; }");
    assert_eq!(member(&program, "ok"), Value::Bool(true));
}

#[test]
fn nested_try_rethrows_to_outer() {
    let source = "try {
        try { raise('inner'); } catch : e { raise('again ' + e); }
    } catch : outer { msg = outer; }";
    let program = run(source);
    assert!(member(&program, "msg").to_string().contains("again test.gl"));
}

#[test]
fn raise_carries_value_text() {
    let e = run_err("raise('boom');");
    assert_eq!(e.to_string(), "test.gl:1:1: boom");
}

// ============================================================
// Names and assignment
// ============================================================

#[test]
fn assignment_updates_existing_member() {
    let program = run("count = 0; def bump() { count = count + 1; } bump(); bump();");
    assert_eq!(member(&program, "count"), num(2.0));
}

#[test]
fn assignment_in_procedure_creates_local() {
    let program = run("def f() { fresh = 1; return fresh + 1; } r = f();");
    assert_eq!(member(&program, "r"), num(2.0));
    assert!(!program.has_member("fresh"));
}

#[test]
fn parameter_shadows_member_on_assignment() {
    let program = run("x = 10; def f(x) { x = x + 5; return x; } r = f(1);");
    assert_eq!(member(&program, "r"), num(6.0));
    assert_eq!(member(&program, "x"), num(10.0));
}

#[test]
fn unknown_variable_is_located() {
    let e = run_err("x = 1;\ny = nope;\n");
    assert_eq!(e.to_string(), "test.gl:2:5: unknown variable 'nope'");
}

#[test]
fn unknown_function_is_reported() {
    let e = run_err("missing(1);");
    assert_eq!(
        e.runtime_error(),
        Some(&RuntimeError::UnknownFunction("missing".to_string()))
    );
}

#[test]
fn program_member_wins_over_module() {
    let program = parse_program("speed = 3; def get() { return speed; }", "test.gl");
    program.register_module(
        NativeModule::new("engine")
            .with_value("speed", num(99.0))
            .with_value("gravity", num(9.5))
            .into_value(),
    );
    let mut state = quiet_state();
    let r = glint_vm::call_member(&mut state, &program, "get", Arguments::default()).unwrap();
    assert_eq!(r, num(3.0));
    let other = parse_program("g = gravity;", "g.gl");
    other.register_module(
        NativeModule::new("engine")
            .with_value("gravity", num(9.5))
            .into_value(),
    );
    glint_vm::initialize(&mut state, &other).unwrap();
    assert_eq!(member(&other, "g"), num(9.5));
}

#[test]
fn module_wins_over_builtin() {
    let program = parse_program("r = len('abc');", "test.gl");
    program.register_module(
        NativeModule::new("engine")
            .with_function("len", |_, _| Ok(num(-1.0)))
            .into_value(),
    );
    let mut state = quiet_state();
    glint_vm::initialize(&mut state, &program).unwrap();
    assert_eq!(member(&program, "r"), num(-1.0));
}

#[test]
fn builtins_load_as_values() {
    let program = run("f = len; r = f([1, 2]);");
    assert_eq!(member(&program, "r"), num(2.0));
}

// ============================================================
// Parameter binding
// ============================================================

#[test]
fn keywords_and_defaults_bind() {
    let source = "def move(dx, dy = 0) { return dx * 10 + dy; }
    a = move(1);
    b = move(dy = 2, dx = 3);
    c = move(4, dy = 5);";
    let program = run(source);
    assert_eq!(member(&program, "a"), num(10.0));
    assert_eq!(member(&program, "b"), num(32.0));
    assert_eq!(member(&program, "c"), num(45.0));
}

#[test]
fn binding_errors_surface() {
    let head = "def move(dx, dy = 0) { return dx; }\n";
    let e = run_err(&format!("{head}move(dx = 1, 2);"));
    assert_eq!(
        e.runtime_error(),
        Some(&RuntimeError::PositionalAfterKeyword {
            function: "move".to_string()
        })
    );
    let e = run_err(&format!("{head}move();"));
    assert_eq!(
        e.to_string(),
        "test.gl:2:1: missing argument 'dx' in call to move"
    );
    let e = run_err(&format!("{head}move(1, speed = 2);"));
    assert!(matches!(
        e.runtime_error(),
        Some(RuntimeError::UnknownKeyword { .. })
    ));
}

// ============================================================
// Classes
// ============================================================

#[test]
fn instances_have_separate_members() {
    let source = "class C { def __init__(v) { this.x = v; } def get() { return this.x; } }
    c = C(5); d = C(9);
    cx = c.x; dx = d.x; got = c.get();";
    let program = run(source);
    assert_eq!(member(&program, "cx"), num(5.0));
    assert_eq!(member(&program, "dx"), num(9.0));
    assert_eq!(member(&program, "got"), num(5.0));
}

#[test]
fn class_without_constructor_rejects_arguments() {
    let program = run("class Empty { } e = Empty(); t = e.__type__;");
    assert_eq!(member(&program, "t"), Value::str("Empty"));
    let e = run_err("class Empty { } e = Empty(1);");
    assert_eq!(
        e.runtime_error(),
        Some(&RuntimeError::TooManyArguments {
            function: "Empty".to_string(),
            expected: 0,
            found: 1
        })
    );
}

#[test]
fn statics_are_shared() {
    let source = "class Counter {
        static count = 0;
        static def next() { Counter.count = Counter.count + 1; return Counter.count; }
    }
    Counter.next();
    n = Counter.next();
    total = Counter.count;";
    let program = run(source);
    assert_eq!(member(&program, "n"), num(2.0));
    assert_eq!(member(&program, "total"), num(2.0));
}

#[test]
fn statics_resolve_as_plain_names_in_class_code() {
    let source = "class Counter {
        static step = 2;
        static limit = step * 10;
        static count = 0;
        static def next() { count = count + step; return count; }
        def peek() { return count; }
    }
    Counter.next();
    n = Counter.next();
    p = Counter().peek();
    total = Counter.count;
    limit = Counter.limit;";
    let program = run(source);
    assert_eq!(member(&program, "n"), num(4.0));
    assert_eq!(member(&program, "p"), num(4.0));
    assert_eq!(member(&program, "total"), num(4.0));
    assert_eq!(member(&program, "limit"), num(20.0));
    assert!(!program.has_member("count"));
    assert!(!program.has_member("step"));
}

#[test]
fn member_calls_can_be_spelled_out() {
    let source = "class C { def __init__() { } }
    a = C();
    a.setMember('x', 1);
    y = a.setMember('z', 2);
    v = a.getMember('x');
    b = a.x;
    c = a.z;";
    let program = run(source);
    assert_eq!(member(&program, "y"), num(2.0));
    assert_eq!(member(&program, "v"), num(1.0));
    assert_eq!(member(&program, "b"), num(1.0));
    assert_eq!(member(&program, "c"), num(2.0));
}

#[test]
fn member_assignment_leaves_stack_balanced() {
    let source = "class P { def __init__() { this.n = 0; } }
    p = P();
    def bump(q) { q.n = q.n + 1; q.n = q.n + 1; return q.n; }
    r = bump(p);";
    let program = run(source);
    assert_eq!(member(&program, "r"), num(2.0));
}

#[test]
fn operators_dispatch_to_methods() {
    let source = "class V {
        def __init__(x) { this.x = x; }
        def __add__(o) { return V(this.x + o.x); }
        def __eq__(o) { return this.x == o.x; }
    }
    s = V(1) + V(2);
    sx = s.x;
    same = V(4) == V(4);";
    let program = run(source);
    assert_eq!(member(&program, "sx"), num(3.0));
    assert_eq!(member(&program, "same"), Value::Bool(true));
}

#[test]
fn bound_methods_keep_receiver() {
    let source = "class P { def __init__(n) { this.n = n; } def get() { return this.n; } }
    p = P(7); f = p.get; r = f();";
    let program = run(source);
    assert_eq!(member(&program, "r"), num(7.0));
}

// ============================================================
// Values and built-ins
// ============================================================

#[test]
fn equal_keys_collapse() {
    let source = "m = {}; m[3] = 'a'; m[1 + 2] = 'b';
    n = len(m); v = m[3];
    s = Set(3, 3.0, 1 + 2); k = len(s);";
    let program = run(source);
    assert_eq!(member(&program, "n"), num(1.0));
    assert_eq!(member(&program, "v"), Value::str("b"));
    assert_eq!(member(&program, "k"), num(1.0));
}

#[test]
fn missing_key_fails() {
    let e = run_err("m = {}; v = m['nope'];");
    assert_eq!(
        e.runtime_error(),
        Some(&RuntimeError::KeyNotFound("nope".to_string()))
    );
}

#[test]
fn len_dispatches_like_a_method_call() {
    let source = "class Bag { def size() { return 7; } }
    n = len(Bag());
    s = len('abcd');
    m = len({1 : 2});";
    let program = run(source);
    assert_eq!(member(&program, "n"), num(7.0));
    assert_eq!(member(&program, "s"), num(4.0));
    assert_eq!(member(&program, "m"), num(1.0));

    let e = run_err("class Empty { }\nn = len(Empty());");
    assert_eq!(e.to_string(), "test.gl:2:5: Empty has no member 'size'");
}

#[test]
fn range_respects_length_limit() {
    let program = parse_program("xs = range(0, 8);\nys = range(0, 1e12);\n", "test.gl");
    let mut state = quiet_state().with_limits(Limits {
        max_range_length: 8,
        ..Limits::default()
    });
    let e = glint_vm::initialize(&mut state, &program).unwrap_err();
    assert_eq!(member(&program, "xs").to_string(), "[0, 1, 2, 3, 4, 5, 6, 7]");
    assert_eq!(
        e.runtime_error(),
        Some(&RuntimeError::RangeTooLong {
            length: 1e12,
            limit: 8
        })
    );
    assert!(e.to_string().starts_with("test.gl:2:"));
}

#[test]
fn division_by_zero_fails() {
    let e = run_err("x = 1 / 0;");
    assert_eq!(e.runtime_error(), Some(&RuntimeError::DivisionByZero));
}

#[test]
fn list_operations() {
    let source = "xs = [3, 1];
    xs.append(2);
    xs[0] = 5;
    n = len(xs);
    first = xs[0];
    joined = str(xs);";
    let program = run(source);
    assert_eq!(member(&program, "n"), num(3.0));
    assert_eq!(member(&program, "first"), num(5.0));
    assert_eq!(member(&program, "joined"), Value::str("[5, 1, 2]"));
}

#[test]
fn print_writes_output() {
    let buffer = SharedBuffer::default();
    let program = parse_program("print('sum', 1 + 2); print(null, true);", "test.gl");
    let mut state = ExecutionState::new().with_output(buffer.clone());
    glint_vm::initialize(&mut state, &program).unwrap();
    assert_eq!(buffer.text(), "sum 3\nnull true\n");
}

// ============================================================
// Host embedding
// ============================================================

#[test]
fn host_calls_members() {
    let program = parse_program(
        "total = 0; def update(dt) { total = total + dt; return total; }",
        "test.gl",
    );
    let mut state = quiet_state();
    for _ in 0..3 {
        glint_vm::call_member(
            &mut state,
            &program,
            "update",
            Arguments::positional(vec![num(0.5)]),
        )
        .unwrap();
    }
    assert_eq!(member(&program, "total"), num(1.5));

    program.set_member("total", num(10.0)).unwrap();
    let r = glint_vm::call_member(
        &mut state,
        &program,
        "update",
        Arguments::positional(vec![num(1.0)]),
    )
    .unwrap();
    assert_eq!(r, num(11.0));
}

#[test]
fn host_call_of_missing_member_fails() {
    let program = parse_program("x = 1;", "test.gl");
    let mut state = quiet_state();
    let e = glint_vm::call_member(&mut state, &program, "nope", Arguments::default()).unwrap_err();
    assert_eq!(e.to_string(), "test.gl:0:0: unknown function 'nope'");
}

#[test]
fn initialization_runs_once() {
    let program = parse_program("runs = 0; runs = runs + 1;", "test.gl");
    let mut state = quiet_state();
    glint_vm::initialize(&mut state, &program).unwrap();
    program.set_member("runs", num(7.0)).unwrap();
    glint_vm::initialize(&mut state, &program).unwrap();
    assert_eq!(member(&program, "runs"), num(7.0));
}

#[test]
fn parse_error_is_raised_on_every_use() {
    let program = parse_program("x = ;", "bad.gl");
    let mut state = quiet_state();
    for _ in 0..2 {
        let e = glint_vm::initialize(&mut state, &program).unwrap_err();
        assert!(matches!(e, ScriptError::Parse(_)));
    }
    assert!(glint_vm::call_member(&mut state, &program, "x", Arguments::default()).is_err());
}

/// A host vector type.
struct Vec3 {
    x: f64,
    y: f64,
    z: f64,
}

impl Object for Vec3 {
    fn type_name(&self) -> &str {
        "vec3"
    }

    fn get_member(&self, _state: &mut ExecutionState, name: &str) -> Result<Value, RuntimeError> {
        match name {
            "x" => Ok(num(self.x)),
            "y" => Ok(num(self.y)),
            "z" => Ok(num(self.z)),
            _ => Err(RuntimeError::unknown_member("vec3", name)),
        }
    }

    fn call_method(
        &self,
        state: &mut ExecutionState,
        name: &str,
        args: Arguments,
    ) -> Result<Value, RuntimeError> {
        match name {
            "length" => {
                args.expect_len("length", 0)?;
                Ok(num((self.x * self.x + self.y * self.y + self.z * self.z).sqrt()))
            }
            _ => {
                let _ = state;
                Err(RuntimeError::unknown_member("vec3", name))
            }
        }
    }

    fn describe(&self) -> String {
        format!("vec3({}, {}, {})", self.x, self.y, self.z)
    }
}

fn engine_module() -> Value {
    NativeModule::new("engine")
        .with_function("vec3", |_, args| {
            args.expect_len("vec3", 3)?;
            Ok(Value::Object(Rc::new(Vec3 {
                x: args.number("vec3", 0)?,
                y: args.number("vec3", 1)?,
                z: args.number("vec3", 2)?,
            })))
        })
        .into_value()
}

#[test]
fn host_objects_through_module_factory() {
    let program = parse_program(
        "v = vec3(1, 2, 2); y = v.y; l = v.length(); s = str(v);",
        "test.gl",
    );
    program.register_module(engine_module());
    let mut state = quiet_state();
    glint_vm::initialize(&mut state, &program).unwrap();
    assert_eq!(member(&program, "y"), num(2.0));
    assert_eq!(member(&program, "l"), num(3.0));
    assert_eq!(member(&program, "s"), Value::str("vec3(1, 2, 2)"));
}

#[test]
fn host_object_members_are_read_only() {
    let program = parse_program("v = vec3(1, 2, 3);\nv.x = 4;\n", "test.gl");
    program.register_module(engine_module());
    let mut state = quiet_state();
    let e = glint_vm::initialize(&mut state, &program).unwrap_err();
    assert_eq!(
        e.to_string(),
        "test.gl:2:3: member 'x' of vec3 cannot be assigned"
    );
}

#[test]
fn factory_errors_are_located_at_call() {
    let program = parse_program("v = vec3(1, 2);", "test.gl");
    program.register_module(engine_module());
    let mut state = quiet_state();
    let e = glint_vm::initialize(&mut state, &program).unwrap_err();
    assert!(e.to_string().starts_with("test.gl:1:"));
    assert!(matches!(
        e.runtime_error(),
        Some(RuntimeError::MissingArgument { .. })
    ));
}

#[test]
fn host_invokes_procedure_values() {
    let program = run("def add(a, b) { return a + b; }");
    let add = member(&program, "add");
    let mut state = quiet_state();
    let r = glint_vm::invoke(
        &mut state,
        &add,
        Arguments::positional(vec![num(2.0), num(3.0)]),
    )
    .unwrap();
    assert_eq!(r, num(5.0));
    let e = glint_vm::invoke(&mut state, &num(1.0), Arguments::default()).unwrap_err();
    assert_eq!(e.to_string(), "<host>:0:0: number is not callable");
}

#[test]
fn host_termination_stops_run() {
    let program = parse_program("x = 1;\ny = 2;\n", "test.gl");
    let mut state = quiet_state();
    state.terminate();
    let e = glint_vm::initialize(&mut state, &program).unwrap_err();
    assert_eq!(e, ScriptError::Terminated);
    assert!(!program.has_member("x"));
}

// ============================================================
// Debugging callbacks
// ============================================================

#[test]
fn exception_handler_sees_full_stack_once() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let source = "def inner() { return nope; }\ndef outer() { return inner(); }\nouter();\n";
    let program = parse_program(source, "test.gl");
    let mut state = quiet_state();
    let log = seen.clone();
    state.set_exception_handler(move |error, stack| {
        let names: Vec<String> = stack.iter().map(|c| c.function.to_string()).collect();
        log.borrow_mut().push((error.to_string(), names));
    });
    let e = glint_vm::initialize(&mut state, &program).unwrap_err();
    assert_eq!(e.to_string(), "test.gl:1:22: unknown variable 'nope'");

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "test.gl:1:22: unknown variable 'nope'");
    assert_eq!(seen[0].1, ["<module>", "outer", "inner"]);
}

#[test]
fn exception_handler_skips_caught_errors() {
    let calls = Rc::new(RefCell::new(0));
    let source = "def inner() { return nope; }
    def outer() { try { return inner(); } catch : e { return 'caught'; } }
    r = outer();";
    let program = parse_program(source, "test.gl");
    let mut state = quiet_state();
    let count = calls.clone();
    state.set_exception_handler(move |_, _| *count.borrow_mut() += 1);
    glint_vm::initialize(&mut state, &program).unwrap();
    assert_eq!(member(&program, "r"), Value::str("caught"));
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn breakpoint_fires_on_active_line() {
    let source = "a = 1;\ndef f(n) {\n  b = n * 2;\n  return b;\n}\nc = f(a);\n";
    let program = parse_program(source, "test.gl");
    assert_eq!(program.set_breakpoint(4, true), 1);

    let hits = Rc::new(RefCell::new(Vec::new()));
    let log = hits.clone();
    let mut state = quiet_state();
    state.set_breakpoint_handler(move |stack| {
        let top = stack.last().unwrap();
        log.borrow_mut().push((
            top.function.to_string(),
            top.line,
            top.local("b").cloned(),
            top.local("n").cloned(),
        ));
        BreakpointAction::Continue
    });
    glint_vm::initialize(&mut state, &program).unwrap();
    assert_eq!(
        hits.borrow().as_slice(),
        [("f".to_string(), 4, Some(num(2.0)), Some(num(1.0)))]
    );
    assert_eq!(member(&program, "c"), num(2.0));
}

#[test]
fn step_stops_at_every_statement() {
    let source = "x = 1;\ny = 2;\nz = 3;\n";
    let program = parse_program(source, "test.gl");
    program.set_breakpoint(1, true);

    let lines = Rc::new(RefCell::new(Vec::new()));
    let log = lines.clone();
    let mut state = quiet_state();
    state.set_breakpoint_handler(move |stack| {
        log.borrow_mut().push(stack[0].line);
        BreakpointAction::Step
    });
    glint_vm::initialize(&mut state, &program).unwrap();
    assert_eq!(lines.borrow().as_slice(), [1, 2, 3]);
}

#[test]
fn breakpoint_terminate_stops_run() {
    let program = parse_program("x = 1;\ny = 2;\nz = 3;\n", "test.gl");
    program.set_breakpoint(2, true);
    let mut state = quiet_state();
    state.set_breakpoint_handler(|_| BreakpointAction::Terminate);
    let e = glint_vm::initialize(&mut state, &program).unwrap_err();
    assert_eq!(e, ScriptError::Terminated);
    assert_eq!(member(&program, "x"), num(1.0));
    assert!(!program.has_member("y"));
    assert!(state.is_terminated());
}

#[test]
fn termination_is_not_catchable() {
    let program = parse_program("try {\n  x = 1;\n} catch : e {\n  caught = e;\n}\n", "test.gl");
    program.set_breakpoint(2, true);
    let mut state = quiet_state();
    state.set_breakpoint_handler(|_| BreakpointAction::Terminate);
    assert_eq!(
        glint_vm::initialize(&mut state, &program),
        Err(ScriptError::Terminated)
    );
    assert!(!program.has_member("caught"));
}

// ============================================================
// Engine invariants
// ============================================================

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "leaves")]
fn malformed_branch_panics_in_debug() {
    let program = Rc::new_cyclic(|scope| {
        let code = vec![
            Instruction::Value(Value::Bool(true)),
            Instruction::Branch {
                kind: BranchKind::Always,
                offset: 50,
            },
        ];
        let init = Procedure::new("<module>", Vec::new(), code, 1, scope.clone());
        Program::new(
            "broken.gl",
            [0; 32],
            ProgramParts {
                init: Some(Rc::new(init)),
                ..ProgramParts::default()
            },
        )
    });
    let mut state = quiet_state();
    let _ = glint_vm::initialize(&mut state, &program);
}

// ============================================================
// Properties
// ============================================================

fn statement() -> impl Strategy<Value = String> {
    prop_oneof![
        (1u8..9).prop_map(|n| format!("a = a + {n};")),
        Just("b = b * 2 - a;".to_string()),
        (1u8..20).prop_map(|n| format!("if (a < {n}) {{ b = b + 1; }} else {{ a = a - 1; }}")),
        (0u8..5).prop_map(|n| format!("for (v : range(0, {n})) {{ a = a + v; }}")),
        Just("try { raise(a); } catch : e { b = b + 1; }".to_string()),
    ]
}

fn final_state(source: &str, breakpoints: bool) -> (Value, Value) {
    let options = ParseOptions {
        filename: "p.gl".to_string(),
        breakpoints,
    };
    let program = parse_program_with(source, &options);
    for line in 1..=source.lines().count() as u32 {
        program.set_breakpoint(line, true);
    }
    let mut state = quiet_state();
    state.set_breakpoint_handler(|_| BreakpointAction::Continue);
    glint_vm::initialize(&mut state, &program).unwrap();
    (member(&program, "a"), member(&program, "b"))
}

proptest! {
    #[test]
    fn breakpoints_do_not_change_results(statements in prop::collection::vec(statement(), 1..12)) {
        let source = format!("a = 0;\nb = 1;\n{}\n", statements.join("\n"));
        prop_assert_eq!(final_state(&source, true), final_state(&source, false));
    }
}
