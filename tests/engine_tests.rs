//! End-to-end engine tests: source in, console records out.

use tsi_common::options::EngineOptions;

fn run_lines(source: &str) -> Vec<String> {
    let (report, lines) =
        tsi::run_capturing(source, &EngineOptions::default()).expect("engine fault");
    assert!(
        !report.diagnostics.iter().any(|d| d.is_error()),
        "diagnostics for {source:?}: {:?}",
        report.diagnostics
    );
    assert!(
        report.unhandled_error.is_none(),
        "unhandled error: {:?}",
        report.unhandled_error
    );
    lines
}

fn run_lines_strict(source: &str) -> (tsi::RunReport, Vec<String>) {
    tsi::run_capturing(source, &EngineOptions::strict()).expect("engine fault")
}

/// Like `run_lines`, with the timer flush requested (timers never fire
/// without one).
fn run_lines_flushing(source: &str) -> Vec<String> {
    let options = EngineOptions {
        flush_timers: true,
        ..Default::default()
    };
    let (report, lines) = tsi::run_capturing(source, &options).expect("engine fault");
    assert!(
        !report.diagnostics.iter().any(|d| d.is_error()),
        "diagnostics for {source:?}: {:?}",
        report.diagnostics
    );
    assert!(
        report.unhandled_error.is_none(),
        "unhandled error: {:?}",
        report.unhandled_error
    );
    lines
}

// =============================================================================
// The canonical scenarios
// =============================================================================

#[test]
fn class_and_inheritance() {
    let lines = run_lines(
        "class A { v: number; constructor(v: number) { this.v = v } } class B extends A { dbl(): number { return this.v * 2 } } console.log(new B(21).dbl())",
    );
    assert_eq!(lines, vec!["42"]);
}

#[test]
fn array_pipeline() {
    let lines = run_lines(
        "console.log([1,2,3,4,5].filter(n => n%2==1).map(n => n*2).reduce((a,b)=>a+b,0))",
    );
    assert_eq!(lines, vec!["16"]);
}

#[test]
fn narrowing_via_typeof() {
    let lines = run_lines(
        "function f(x: string|number): number { if (typeof x === \"string\") return x.length; return x } console.log(f(\"hello\")); console.log(f(7))",
    );
    assert_eq!(lines, vec!["5", "7"]);
}

#[test]
fn labeled_loop_control() {
    let lines = run_lines(
        "let s=0; outer: for (let i=0;i<5;i++){ for(let j=0;j<5;j++){ if(j===3) continue outer; s+=1 } } console.log(s)",
    );
    assert_eq!(lines, vec!["15"]);
}

#[test]
fn async_await_order() {
    let lines = run_lines(
        "async function g(){ return 1 } async function f(){ console.log(\"a\"); const x = await g(); console.log(x); console.log(\"c\") } f(); console.log(\"b\")",
    );
    assert_eq!(lines, vec!["a", "b", "1", "c"]);
}

#[test]
fn getter_setter_and_frozen_non_strict() {
    let lines = run_lines(
        "class T { private _x=0; get x(){return this._x} set x(v:number){this._x=v} } const t = new T(); t.x=5; Object.freeze(t); t.x=9; console.log(t.x)",
    );
    assert_eq!(lines, vec!["5"]);
}

#[test]
fn getter_setter_and_frozen_strict_throws() {
    let (report, _) = run_lines_strict(
        "class T { _x=0; get x(){return this._x} set x(v:number){this._x=v} } const t = new T(); t.x=5; Object.freeze(t); t.x=9; console.log(t.x)",
    );
    let error = report.unhandled_error.expect("expected a TypeError");
    assert!(error.contains("TypeError"), "got: {error}");
}

// =============================================================================
// Values and operators
// =============================================================================

#[test]
fn number_formatting() {
    let lines = run_lines("console.log(1); console.log(0.5); console.log(2e21); console.log(-0)");
    assert_eq!(lines, vec!["1", "0.5", "2e+21", "0"]);
}

#[test]
fn plus_stringifies() {
    let lines = run_lines("console.log(1 + \"a\"); console.log(\"n=\" + 42); console.log(1 + 2)");
    assert_eq!(lines, vec!["1a", "n=42", "3"]);
}

#[test]
fn equality_semantics() {
    let lines = run_lines(
        "console.log(1 == \"1\"); console.log(1 === 1); console.log(null == undefined); console.log(null === undefined); console.log(NaN === NaN)",
    );
    assert_eq!(lines, vec!["true", "true", "true", "false", "false"]);
}

#[test]
fn bigint_arithmetic_stays_exact() {
    let lines = run_lines(
        "const big = 9007199254740993n; console.log(big + 1n); console.log(typeof big)",
    );
    assert_eq!(lines, vec!["9007199254740994", "bigint"]);
}

#[test]
fn bigint_number_mix_is_a_runtime_error() {
    let (report, _) = tsi::run_capturing(
        "const a: any = 1n; const b: any = 1; console.log(a + b)",
        &EngineOptions::default(),
    )
    .expect("engine fault");
    let error = report.unhandled_error.expect("expected TypeError");
    assert!(error.contains("TypeError"));
}

#[test]
fn typeof_table() {
    let lines = run_lines(
        "console.log(typeof 1); console.log(typeof \"s\"); console.log(typeof true); console.log(typeof undefined); console.log(typeof null); console.log(typeof (() => 0)); console.log(typeof {}); console.log(typeof Symbol(\"t\"))",
    );
    assert_eq!(
        lines,
        vec!["number", "string", "boolean", "undefined", "object", "function", "object", "symbol"]
    );
}

#[test]
fn optional_chain_short_circuits() {
    let lines = run_lines(
        "const o: any = null; console.log(o?.a.b.c); const p: any = { q: { n: 3 } }; console.log(p?.q?.n); console.log(p.missing?.())",
    );
    assert_eq!(lines, vec!["undefined", "3", "undefined"]);
}

#[test]
fn nullish_and_logical_assignment() {
    let lines = run_lines(
        "let a: any = null; a ??= 5; console.log(a); let b: any = 0; b ||= 7; console.log(b); let c: any = 1; c &&= 9; console.log(c)",
    );
    assert_eq!(lines, vec!["5", "7", "9"]);
}

#[test]
fn increments_are_atomic_on_the_target() {
    let lines = run_lines(
        "let n = 1; console.log(n++); console.log(n); console.log(++n); const xs = [10]; xs[0] += 5; console.log(xs[0])",
    );
    assert_eq!(lines, vec!["1", "2", "3", "15"]);
}

#[test]
fn delete_and_in_operators() {
    let lines = run_lines(
        "const o: any = { a: 1, b: 2 }; console.log(\"a\" in o); delete o.a; console.log(\"a\" in o); console.log(o)",
    );
    assert_eq!(lines, vec!["true", "false", "{b: 2}"]);
}

// =============================================================================
// Strings, templates, regex
// =============================================================================

#[test]
fn template_literals_interpolate() {
    let lines = run_lines(
        "const name = \"world\"; const n = 6 * 7; console.log(`hello ${name}, ${n}!`)",
    );
    assert_eq!(lines, vec!["hello world, 42!"]);
}

#[test]
fn tagged_template_cooked_array_is_interned() {
    let lines = run_lines(
        "let first: any = null; function tag(strings: any, value: any) { if (first === null) { first = strings; } return strings === first; } for (let i = 0; i < 2; i++) { console.log(tag`a${i}b`); }",
    );
    assert_eq!(lines, vec!["true", "true"]);
}

#[test]
fn string_methods() {
    let lines = run_lines(
        "const s = \"Hello World\"; console.log(s.toUpperCase()); console.log(s.includes(\"World\")); console.log(s.split(\" \")); console.log(s.slice(0, 5)); console.log(\"5\".padStart(3, \"0\"))",
    );
    assert_eq!(
        lines,
        vec!["HELLO WORLD", "true", "[\"Hello\", \"World\"]", "Hello", "005"]
    );
}

#[test]
fn regex_literals_execute() {
    let lines = run_lines(
        "const re = /ab+c/; console.log(re.test(\"xabbbcx\")); console.log(re.test(\"ac\")); console.log(\"a1b2\".replace(/[0-9]/g, \"#\"))",
    );
    assert_eq!(lines, vec!["true", "false", "a#b#"]);
}

// =============================================================================
// Objects, arrays, stringifier
// =============================================================================

#[test]
fn object_stringifier_insertion_order() {
    let lines = run_lines(
        "const o = { b: 1, a: \"x\", inner: { t: true } }; console.log(o); console.log([1, \"two\", [3]])",
    );
    assert_eq!(
        lines,
        vec!["{b: 1, a: \"x\", inner: {t: true}}", "[1, \"two\", [3]]"]
    );
}

#[test]
fn instance_stringifier_shows_class_name() {
    let lines = run_lines(
        "class Point { constructor(public x: number, public y: number) {} } console.log(new Point(1, 2)); console.log(Point); console.log(() => 0)",
    );
    assert_eq!(lines, vec!["Point { x: 1, y: 2 }", "[class Point]", "[Function]"]);
}

#[test]
fn spread_and_shorthand() {
    let lines = run_lines(
        "const base = { a: 1 }; const more = { ...base, b: 2 }; console.log(more); const xs = [1, 2]; const ys = [0, ...xs, 3]; console.log(ys); const a = 7; console.log({ a })",
    );
    assert_eq!(lines, vec!["{a: 1, b: 2}", "[0, 1, 2, 3]", "{a: 7}"]);
}

#[test]
fn destructuring_declarations() {
    let lines = run_lines(
        "const {a, b: renamed = 5, ...rest} = { a: 1, b: undefined, c: 3, d: 4 }; console.log(a); console.log(renamed); console.log(rest); const [x, , y = 9, ...tail] = [10, 20, undefined, 40, 50]; console.log(x); console.log(y); console.log(tail)",
    );
    assert_eq!(
        lines,
        vec!["1", "5", "{c: 3, d: 4}", "10", "9", "[40, 50]"]
    );
}

#[test]
fn array_mutators_respect_freeze() {
    let lines = run_lines(
        "const xs = [1, 2, 3]; Object.freeze(xs); xs.push(4); xs[0] = 9; xs.reverse(); console.log(xs)",
    );
    assert_eq!(lines, vec!["[1, 2, 3]"]);
}

#[test]
fn sealed_objects_allow_updates_but_not_new_keys() {
    let lines = run_lines(
        "const o: any = { a: 1 }; Object.seal(o); o.a = 2; o.b = 3; console.log(o); console.log(Object.isSealed(o))",
    );
    assert_eq!(lines, vec!["{a: 2}", "true"]);
}

#[test]
fn json_round_trip() {
    let lines = run_lines(
        "const parsed = JSON.parse(\"{\\\"a\\\": [1, 2], \\\"b\\\": null}\"); console.log(parsed.a[1]); console.log(JSON.stringify({ x: 1, s: \"hi\", list: [true, null] }))",
    );
    assert_eq!(lines, vec!["2", "{\"x\":1,\"s\":\"hi\",\"list\":[true,null]}"]);
}

// =============================================================================
// Functions and closures
// =============================================================================

#[test]
fn closure_capture_is_by_reference() {
    let lines = run_lines(
        "function counter() { let n = 0; return { inc: () => { n += 1; }, get: () => n }; } const c = counter(); c.inc(); c.inc(); console.log(c.get())",
    );
    assert_eq!(lines, vec!["2"]);
}

#[test]
fn captured_let_mutations_flow_both_ways() {
    let lines = run_lines(
        "let shared = 1; const bump = () => { shared += 10; }; bump(); console.log(shared); shared = 100; const read = () => shared; console.log(read())",
    );
    assert_eq!(lines, vec!["11", "100"]);
}

#[test]
fn named_function_expression_self_reference() {
    let lines = run_lines(
        "const f = function fact(n: number): number { return n <= 1 ? 1 : n * fact(n - 1); }; console.log(f(5))",
    );
    assert_eq!(lines, vec!["120"]);
}

#[test]
fn default_and_rest_parameters() {
    let lines = run_lines(
        "function greet(name: string = \"anon\", ...extras: number[]) { return name + \":\" + extras.length; } console.log(greet()); console.log(greet(\"a\", 1, 2, 3))",
    );
    assert_eq!(lines, vec!["anon:0", "a:3"]);
}

#[test]
fn arrow_this_is_lexical() {
    let lines = run_lines(
        "class Box { value = 7; grab() { const f = () => this.value; return f(); } } console.log(new Box().grab())",
    );
    assert_eq!(lines, vec!["7"]);
}

#[test]
fn function_length_and_name() {
    let lines = run_lines(
        "function two(a: number, b: number, c?: number) { return a; } console.log(two.length); console.log(two.name)",
    );
    assert_eq!(lines, vec!["2", "two"]);
}

// =============================================================================
// Control flow and completions
// =============================================================================

#[test]
fn switch_with_fallthrough_and_default() {
    let lines = run_lines(
        "function pick(n: number): string { let out = \"\"; switch (n) { case 1: out += \"one \"; case 2: out += \"two\"; break; default: out = \"other\"; } return out; } console.log(pick(1)); console.log(pick(2)); console.log(pick(9))",
    );
    assert_eq!(lines, vec!["one two", "two", "other"]);
}

#[test]
fn try_catch_binds_any_thrown_value() {
    let lines = run_lines(
        "try { throw { code: 42 }; } catch (e: any) { console.log(e.code); } try { throw \"text\"; } catch (e) { console.log(e); }",
    );
    assert_eq!(lines, vec!["42", "text"]);
}

#[test]
fn finally_always_runs_and_supersedes() {
    let lines = run_lines(
        "function f(): number { try { return 1; } finally { console.log(\"cleanup\"); } } console.log(f()); function g(): number { try { throw new Error(\"x\"); } finally { return 9; } } console.log(g())",
    );
    assert_eq!(lines, vec!["cleanup", "1", "9"]);
}

#[test]
fn loops_consume_their_own_break_and_continue() {
    let lines = run_lines(
        "let log = \"\"; for (let i = 0; i < 5; i++) { if (i === 1) continue; if (i === 3) break; log += i; } console.log(log); let j = 0; do { j++; } while (j < 3); console.log(j); let k = 10; while (k > 0) { k -= 4; } console.log(k)",
    );
    assert_eq!(lines, vec!["02", "3", "-2"]);
}

#[test]
fn for_in_enumerates_own_string_keys_in_insertion_order() {
    let lines = run_lines(
        "const o: any = { z: 1, a: 2 }; o.m = 3; let keys = \"\"; for (const k in o) { keys += k; } console.log(keys)",
    );
    assert_eq!(lines, vec!["zam"]);
}

#[test]
fn for_of_over_arrays_strings_maps_sets() {
    let lines = run_lines(
        "let acc = \"\"; for (const x of [1, 2]) { acc += x; } for (const ch of \"ab\") { acc += ch; } const m = new Map([[\"k\", 9]]); for (const pair of m) { acc += pair[0] + pair[1]; } const s = new Set([7]); for (const v of s) { acc += v; } console.log(acc)",
    );
    assert_eq!(lines, vec!["12abk97"]);
}

#[test]
fn uncaught_throw_reports_to_host() {
    let (report, lines) = tsi::run_capturing(
        "console.log(\"before\"); throw new RangeError(\"boom\"); ",
        &EngineOptions::default(),
    )
    .expect("engine fault");
    assert_eq!(lines, vec!["before"]);
    assert_eq!(report.exit_code(), 1);
    let error = report.unhandled_error.expect("unhandled");
    assert!(error.contains("RangeError: boom"));
}

// =============================================================================
// Classes
// =============================================================================

#[test]
fn field_initializers_run_in_declaration_order_before_ctor() {
    let lines = run_lines(
        "let order = \"\"; function mark(tag: string): number { order += tag; return 0; } class C { a = mark(\"a\"); b = mark(\"b\"); constructor() { mark(\"c\"); } } new C(); console.log(order)",
    );
    assert_eq!(lines, vec!["abc"]);
}

#[test]
fn implicit_derived_constructor_passes_arguments_through() {
    let lines = run_lines(
        "class A { v: number; constructor(v: number) { this.v = v; } } class B extends A {} console.log(new B(5).v)",
    );
    assert_eq!(lines, vec!["5"]);
}

#[test]
fn super_method_calls_bind_the_current_instance() {
    let lines = run_lines(
        "class A { who(): string { return \"A:\" + this.tag(); } tag(): string { return \"base\"; } } class B extends A { tag(): string { return \"derived\"; } who(): string { return super.who() + \"!\"; } } console.log(new B().who())",
    );
    assert_eq!(lines, vec!["A:derived!"]);
}

#[test]
fn static_members_and_blocks() {
    let lines = run_lines(
        "class Registry { static count = 0; static { Registry.count = 10; } static bump(): number { return ++Registry.count; } } console.log(Registry.bump()); console.log(Registry.count)",
    );
    assert_eq!(lines, vec!["11", "11"]);
}

#[test]
fn private_fields_are_fenced() {
    let lines = run_lines(
        "class Counter { #n = 0; bump(): number { this.#n += 1; return this.#n; } } const c = new Counter(); c.bump(); console.log(c.bump())",
    );
    assert_eq!(lines, vec!["2"]);
}

#[test]
fn instanceof_walks_the_chain() {
    let lines = run_lines(
        "class A {} class B extends A {} const b = new B(); console.log(b instanceof B); console.log(b instanceof A); console.log(({}) instanceof A); console.log([1] instanceof Array)",
    );
    assert_eq!(lines, vec!["true", "true", "false", "true"]);
}

#[test]
fn super_must_run_before_this() {
    let (report, _) = tsi::run_capturing(
        "class A { constructor() {} } class B extends A { v: number; constructor() { this.v = 1; super(); } } new B()",
        &EngineOptions::default(),
    )
    .expect("engine fault");
    let error = report.unhandled_error.expect("expected ReferenceError");
    assert!(error.contains("ReferenceError"), "got {error}");
}

#[test]
fn error_subclasses_carry_message_and_chain() {
    let lines = run_lines(
        "class AppError extends Error { constructor(m: string) { super(m); } } try { throw new AppError(\"bad state\"); } catch (e: any) { console.log(e instanceof AppError); console.log(e instanceof Error); console.log(e.message); }",
    );
    assert_eq!(lines, vec!["true", "true", "bad state"]);
}

// =============================================================================
// Enums and namespaces
// =============================================================================

#[test]
fn numeric_enum_with_reverse_mapping() {
    let lines = run_lines(
        "enum Color { Red, Green = 10, Blue } console.log(Color.Red); console.log(Color.Blue); console.log(Color[10])",
    );
    assert_eq!(lines, vec!["0", "11", "Green"]);
}

#[test]
fn const_enum_members_inline() {
    let lines = run_lines(
        "const enum Flags { A = 1, B = 2 } console.log(Flags.A + Flags.B)",
    );
    assert_eq!(lines, vec!["3"]);
}

#[test]
fn namespaces_evaluate_to_frozen_objects() {
    let lines = run_lines(
        "namespace Geometry { export function area(w: number, h: number): number { return w * h; } export const unit = 1; } console.log(Geometry.area(3, 4)); console.log(Geometry.unit)",
    );
    assert_eq!(lines, vec!["12", "1"]);
}

#[test]
fn namespace_members_without_export_stay_private() {
    // The helper is callable from inside the namespace, but never lands
    // on the namespace object itself.
    let lines = run_lines(
        "namespace Pricing { const rate = 0.25; function tax(n: number): number { return n * rate; } export function total(n: number): number { return n + tax(n); } } const ns: any = Pricing; console.log(ns.total(100)); console.log(ns.rate); console.log(ns.tax)",
    );
    assert_eq!(lines, vec!["125", "undefined", "undefined"]);
}

// =============================================================================
// Generators
// =============================================================================

#[test]
fn generator_next_sequence() {
    let lines = run_lines(
        "function* gen() { yield 1; yield 2; return 3; } const g = gen(); console.log(g.next().value); console.log(g.next().value); const last = g.next(); console.log(last.value); console.log(last.done); console.log(g.next().done)",
    );
    assert_eq!(lines, vec!["1", "2", "3", "true", "true"]);
}

#[test]
fn generator_effects_are_lazy() {
    let lines = run_lines(
        "function* g() { console.log(\"first\"); yield 1; console.log(\"second\"); yield 2; } const it = g(); console.log(\"created\"); it.next(); it.next()",
    );
    assert_eq!(lines, vec!["created", "first", "second"]);
}

#[test]
fn generator_receives_sent_values() {
    let lines = run_lines(
        "function* echo() { const a = yield 1; console.log(a); const b = yield 2; console.log(b); } const g = echo(); g.next(); g.next(\"x\"); g.next(\"y\")",
    );
    assert_eq!(lines, vec!["x", "y"]);
}

#[test]
fn generator_loops_preserve_state() {
    let lines = run_lines(
        "function* upto(n: number) { for (let i = 0; i < n; i++) { yield i; } } let total = 0; for (const v of upto(4)) { total += v; } console.log(total)",
    );
    assert_eq!(lines, vec!["6"]);
}

#[test]
fn yield_star_delegates_all_three_channels() {
    let lines = run_lines(
        "function* inner() { yield 1; yield 2; return \"done\"; } function* outer() { const r = yield* inner(); console.log(r); yield 3; } const g = outer(); console.log(g.next().value); console.log(g.next().value); console.log(g.next().value)",
    );
    assert_eq!(lines, vec!["1", "2", "done", "3"]);
}

#[test]
fn generator_throw_lands_in_try() {
    let lines = run_lines(
        "function* g() { try { yield 1; } catch (e) { console.log(\"caught \" + e); yield 2; } } const it = g(); it.next(); console.log(it.throw(\"oops\").value)",
    );
    assert_eq!(lines, vec!["caught oops", "2"]);
}

#[test]
fn generator_return_runs_finally() {
    let lines = run_lines(
        "function* g() { try { yield 1; yield 2; } finally { console.log(\"cleanup\"); } } const it = g(); it.next(); const r = it.return(99); console.log(r.value); console.log(r.done)",
    );
    assert_eq!(lines, vec!["cleanup", "99", "true"]);
}

// =============================================================================
// Async and the event loop
// =============================================================================

#[test]
fn promise_then_chains_run_fifo() {
    let lines = run_lines(
        "const p1 = Promise.resolve(1); const p2 = Promise.resolve(2); p1.then(v => console.log(v)); p2.then(v => console.log(v)); console.log(\"sync\")",
    );
    assert_eq!(lines, vec!["sync", "1", "2"]);
}

#[test]
fn promise_resolution_is_once_only() {
    let lines = run_lines(
        "let settle: any; const p = new Promise((resolve, reject) => { settle = { resolve, reject }; }); p.then(v => console.log(\"got \" + v), e => console.log(\"err \" + e)); settle.resolve(\"first\"); settle.resolve(\"second\"); settle.reject(\"third\")",
    );
    assert_eq!(lines, vec!["got first"]);
}

#[test]
fn promise_catch_and_finally() {
    let lines = run_lines(
        "Promise.reject(\"bad\").catch(e => { console.log(\"caught \" + e); return 1; }).finally(() => console.log(\"finally\")).then(v => console.log(\"then \" + v))",
    );
    assert_eq!(lines, vec!["caught bad", "finally", "then 1"]);
}

#[test]
fn await_rejected_promise_throws_into_catch() {
    let lines = run_lines(
        "async function f() { try { await Promise.reject(new Error(\"nope\")); } catch (e: any) { console.log(\"caught \" + e.message); } } f()",
    );
    assert_eq!(lines, vec!["caught nope"]);
}

#[test]
fn await_non_promise_still_defers_one_tick() {
    let lines = run_lines(
        "async function f() { const v = await 5; console.log(\"inner \" + v); } f(); console.log(\"outer\")",
    );
    assert_eq!(lines, vec!["outer", "inner 5"]);
}

#[test]
fn promise_all_collects_in_order() {
    let lines = run_lines(
        "async function main() { const all = await Promise.all([Promise.resolve(1), 2, Promise.resolve(3)]); console.log(all); } main()",
    );
    assert_eq!(lines, vec!["[1, 2, 3]"]);
}

#[test]
fn async_loops_accumulate_across_awaits() {
    let lines = run_lines(
        "async function f() { let total = 0; for (const n of [1, 2, 3]) { total += await Promise.resolve(n); } console.log(total); } f()",
    );
    assert_eq!(lines, vec!["6"]);
}

#[test]
fn timers_do_not_fire_without_a_flush() {
    let lines = run_lines(
        "setTimeout(() => console.log(\"never\"), 0); console.log(\"sync\")",
    );
    assert_eq!(lines, vec!["sync"]);
}

#[test]
fn timers_fire_on_the_virtual_clock_in_due_order() {
    let lines = run_lines_flushing(
        "setTimeout(() => console.log(\"late\"), 20); setTimeout(() => console.log(\"early\"), 5); setTimeout(() => console.log(\"tie-1\"), 10); setTimeout(() => console.log(\"tie-2\"), 10); console.log(\"sync\")",
    );
    assert_eq!(lines, vec!["sync", "early", "tie-1", "tie-2", "late"]);
}

#[test]
fn cancelled_timers_do_not_fire() {
    let lines = run_lines_flushing(
        "const id = setTimeout(() => console.log(\"never\"), 5); clearTimeout(id); setTimeout(() => console.log(\"kept\"), 6)",
    );
    assert_eq!(lines, vec!["kept"]);
}

#[test]
fn microtasks_run_before_macrotasks() {
    let lines = run_lines_flushing(
        "setTimeout(() => console.log(\"timer\"), 0); Promise.resolve().then(() => console.log(\"micro\")); console.log(\"sync\")",
    );
    assert_eq!(lines, vec!["sync", "micro", "timer"]);
}

// =============================================================================
// Modules
// =============================================================================

#[test]
fn module_graph_runs_in_dependency_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("math.ts"),
        "export function double(n: number): number { return n * 2; }\nexport const BASE = 21;\n",
    )
    .expect("write");
    std::fs::write(
        dir.path().join("main.ts"),
        "import { double, BASE } from \"./math\";\nconsole.log(double(BASE));\n",
    )
    .expect("write");

    let sink = std::rc::Rc::new(std::cell::RefCell::new(
        tsi_runtime::interp::BufferSink::default(),
    ));
    let report = tsi::run_module_with_sink(
        &dir.path().join("main.ts"),
        &EngineOptions::default(),
        std::rc::Rc::clone(&sink) as _,
    )
    .expect("engine fault");
    assert!(
        !report.diagnostics.iter().any(|d| d.is_error()),
        "{:?}",
        report.diagnostics
    );
    assert_eq!(sink.borrow().lines, vec!["42"]);
}

#[test]
fn missing_module_is_a_resolution_diagnostic() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("main.ts"),
        "import { x } from \"./nowhere\";\nconsole.log(x);\n",
    )
    .expect("write");
    let report = tsi::run_module(&dir.path().join("main.ts"), &EngineOptions::default())
        .expect("engine fault");
    assert!(report.diagnostics.iter().any(|d| d.code == 4001));
}

// =============================================================================
// Checked-program gating
// =============================================================================

#[test]
fn type_errors_prevent_execution() {
    let (report, lines) = tsi::run_capturing(
        "const n: number = \"oops\"; console.log(\"ran\")",
        &EngineOptions::default(),
    )
    .expect("engine fault");
    assert!(report.diagnostics.iter().any(|d| d.code == 3002));
    assert!(lines.is_empty(), "execution happened despite errors");
}

#[test]
fn parse_errors_accumulate_and_gate() {
    let (report, lines) = tsi::run_capturing(
        "let = 1; let y 2; console.log(\"ran\")",
        &EngineOptions::default(),
    )
    .expect("engine fault");
    assert!(report.diagnostics.iter().filter(|d| d.is_error()).count() >= 2);
    assert!(lines.is_empty());
}
