//! Checker integration tests: assignability, narrowing, classes,
//! overloads, excess properties, determinism.

use tsi_checker::{check_program, CheckResult};
use tsi_common::options::EngineOptions;
use tsi_parser::Parser;

fn check(source: &str) -> CheckResult {
    check_with(source, EngineOptions::default().apply_strict_defaults())
}

fn check_strict(source: &str) -> CheckResult {
    check_with(source, EngineOptions::strict())
}

fn check_with(source: &str, options: EngineOptions) -> CheckResult {
    let parsed = Parser::new("test.ts", source).parse_program();
    assert!(
        !parsed.has_errors(),
        "parse errors: {:?}",
        parsed.diagnostics
    );
    check_program(&parsed.program, &options)
}

fn assert_clean(source: &str) {
    let result = check(source);
    assert!(
        !result.has_errors(),
        "unexpected diagnostics for {source:?}: {:?}",
        result.diagnostics
    );
}

fn assert_code(source: &str, code: u32) {
    let result = check(source);
    assert!(
        result.diagnostics.iter().any(|d| d.code == code),
        "expected code {code} for {source:?}, got: {:?}",
        result.diagnostics
    );
}

// =============================================================================
// Assignability
// =============================================================================

#[test]
fn primitive_mismatch_is_reported() {
    assert_code("let x: number = \"hello\";", 3002);
}

#[test]
fn literal_widening_into_mutable_bindings() {
    assert_clean("let x = 1; x = 2;");
    assert_clean("const tag = \"a\"; let s: string = tag;");
}

#[test]
fn union_acceptance() {
    assert_clean("let x: string | number = 1; x = \"two\";");
    assert_code("let x: string | number = true;", 3002);
}

#[test]
fn record_structural_compat() {
    assert_clean("interface P { x: number; y: number; } const p: P = { x: 1, y: 2 };");
    assert_code(
        "interface P { x: number; y: number; } const p: P = { x: 1 };",
        3002,
    );
}

#[test]
fn optional_fields_may_be_absent() {
    assert_clean("interface O { a: number; b?: string; } const o: O = { a: 1 };");
}

#[test]
fn excess_property_on_fresh_literal_only() {
    assert_code(
        "interface P { x: number; } const p: P = { x: 1, extra: 2 };",
        3004,
    );
    // A non-fresh value with extra members is fine.
    assert_clean(
        "interface P { x: number; } const wide = { x: 1, extra: 2 }; const a = wide; const p: P = a;",
    );
}

#[test]
fn function_param_contravariance() {
    assert_clean(
        "type Handler = (x: string | number) => void;\nconst h: Handler = (x: string | number) => {};",
    );
    // Callback with fewer parameters is accepted.
    assert_clean("type Cb = (a: number, b: number) => void; const c: Cb = (a: number) => {};");
}

#[test]
fn never_flows_everywhere_but_accepts_nothing() {
    assert_clean("function fail(): never { throw new Error(\"x\"); } let n: number = fail();");
    assert_code("let n: never = 1;", 3002);
}

#[test]
fn const_reassignment_is_an_error() {
    assert_code("const a = 1; a = 2;", 3009);
}

#[test]
fn readonly_property_write_is_an_error() {
    assert_code(
        "interface C { readonly id: number; } function f(c: C) { c.id = 5; }",
        3009,
    );
}

// =============================================================================
// Narrowing
// =============================================================================

#[test]
fn typeof_narrows_both_branches() {
    assert_clean(
        "function f(x: string | number): number { if (typeof x === \"string\") { return x.length; } return x; }",
    );
}

#[test]
fn typeof_narrowing_applies_after_terminating_then() {
    assert_clean(
        "function f(x: string | number): number { if (typeof x === \"string\") return x.length; return x; }",
    );
}

#[test]
fn equality_narrows_to_literal() {
    assert_clean(
        "function f(x: \"a\" | \"b\"): string { if (x === \"a\") { return x; } return x; }",
    );
}

#[test]
fn null_check_narrows() {
    assert_clean(
        "function f(x: string | null): number { if (x !== null) { return x.length; } return 0; }",
    );
}

#[test]
fn instanceof_narrows_to_class() {
    assert_clean(
        "class A { a(): number { return 1; } } class B extends A { b(): number { return 2; } }\nfunction f(x: A): number { if (x instanceof B) { return x.b(); } return x.a(); }",
    );
}

#[test]
fn predicate_narrows_argument() {
    assert_clean(
        "interface Fish { swim: () => void; }\nfunction isFish(pet: any): pet is Fish { return !!pet.swim; }\nfunction go(pet: any) { if (isFish(pet)) { pet.swim(); } }",
    );
}

#[test]
fn discriminated_union_tag_compare() {
    assert_clean(
        "interface Circle { kind: \"circle\"; radius: number; }\ninterface Square { kind: \"square\"; side: number; }\nfunction area(s: Circle | Square): number { if (s.kind === \"circle\") { return s.radius * 2; } return s.side; }",
    );
}

#[test]
fn assignment_invalidates_narrowing() {
    // After `x = 1`, the string narrowing must be gone; reading
    // `x.length` off the declared union is an error.
    let result = check(
        "function f(x: string | number) { if (typeof x === \"string\") { x = 1; const n: number = x.length; } }",
    );
    assert!(result.has_errors());
}

// =============================================================================
// Calls and generics
// =============================================================================

#[test]
fn arity_checking() {
    assert_code("function f(a: number, b: number): number { return a + b; } f(1);", 3006);
    assert_code(
        "function f(a: number): number { return a; } f(1, 2);",
        3006,
    );
}

#[test]
fn optional_params_pad_with_undefined() {
    assert_clean("function f(a: number, b?: number): number { return a; } f(1); f(1, 2);");
}

#[test]
fn rest_collects_remaining() {
    assert_clean(
        "function sum(...xs: number[]): number { return xs.length; } sum(); sum(1, 2, 3);",
    );
    assert_code(
        "function sum(...xs: number[]): number { return xs.length; } sum(\"a\");",
        3007,
    );
}

#[test]
fn argument_type_mismatch() {
    assert_code(
        "function f(a: number): number { return a; } f(\"no\");",
        3007,
    );
}

#[test]
fn generic_inference_from_arguments() {
    assert_clean(
        "function identity<T>(value: T): T { return value; } const n: number = identity(42);",
    );
}

#[test]
fn overloads_resolve_by_first_match() {
    assert_clean(
        "function pick(x: string): string;\nfunction pick(x: number): number;\nfunction pick(x: any): any { return x; }\nconst s: string = pick(\"a\");\nconst n: number = pick(1);",
    );
}

#[test]
fn no_overload_matches_is_reported() {
    assert_code(
        "function pick(x: string): string;\nfunction pick(x: number): number;\nfunction pick(x: any): any { return x; }\npick(true, true);",
        3008,
    );
}

#[test]
fn calling_a_non_function_is_an_error() {
    assert_code("const x = 1; x();", 3005);
}

#[test]
fn class_call_without_new_is_an_error() {
    assert_code("class C {} C();", 3005);
}

// =============================================================================
// Classes
// =============================================================================

#[test]
fn class_members_and_inheritance() {
    assert_clean(
        "class A { v: number; constructor(v: number) { this.v = v; } }\nclass B extends A { dbl(): number { return this.v * 2; } }\nconst b: A = new B(21);",
    );
}

#[test]
fn nominal_class_assignability() {
    // Same shape, unrelated declarations: not assignable.
    assert_code(
        "class A { x: number = 1; } class B { x: number = 1; } const a: A = new B();",
        3002,
    );
}

#[test]
fn instance_matches_interface_structurally() {
    assert_clean(
        "interface HasX { x: number; } class P { x: number = 1; } const h: HasX = new P();",
    );
}

#[test]
fn abstract_members_must_be_implemented() {
    assert_code(
        "abstract class Base { abstract area(): number; } class Impl extends Base {}",
        3013,
    );
    assert_clean(
        "abstract class Base { abstract area(): number; } class Impl extends Base { area(): number { return 1; } }",
    );
}

#[test]
fn cannot_instantiate_abstract_class() {
    assert_code("abstract class A {} new A();", 3017);
}

#[test]
fn override_without_base_is_an_error() {
    assert_code(
        "class A {} class B extends A { override missing(): void {} }",
        3015,
    );
}

#[test]
fn override_variance() {
    // Return type must stay covariant.
    assert_code(
        "class A { m(): number { return 1; } } class B extends A { m(): string { return \"x\"; } }",
        3014,
    );
    assert_clean(
        "class A { m(): number | string { return 1; } } class B extends A { m(): number { return 2; } }",
    );
}

#[test]
fn private_members_are_fenced() {
    assert_code(
        "class C { private secret: number = 1; } const c = new C(); c.secret;",
        3025,
    );
}

// =============================================================================
// Strict-mode family
// =============================================================================

#[test]
fn no_implicit_any_flags_unannotated_params() {
    let result = check_strict("function f(x) { return x; }");
    assert!(result.diagnostics.iter().any(|d| d.code == 3018));
}

#[test]
fn strict_requires_override_keyword() {
    let result = check_strict(
        "class A { m(): number { return 1; } } class B extends A { m(): number { return 2; } }",
    );
    assert!(result.diagnostics.iter().any(|d| d.code == 3016));
}

// =============================================================================
// Enums, aliases, misc
// =============================================================================

#[test]
fn enum_members_type_against_their_enum() {
    assert_clean("enum Color { Red, Green } const c: Color = Color.Green;");
    assert_clean("enum Color { Red, Green } const n: number = Color.Green;");
}

#[test]
fn const_enum_values_are_inlined() {
    let result = check("const enum Flags { A = 1, B = 2 } const x = Flags.B;");
    assert!(!result.has_errors());
    assert_eq!(result.type_map.inlined_enum_values.len(), 1);
}

#[test]
fn type_alias_expansion() {
    assert_clean("type Pair = [number, number]; const p: Pair = [1, 2];");
    assert_clean("type Box<T> = { value: T }; const b: Box<number> = { value: 1 };");
}

#[test]
fn keyof_produces_literal_union() {
    assert_clean(
        "interface P { a: number; b: number; } function pick(key: keyof P): void {} pick(\"a\");",
    );
    assert_code(
        "interface P { a: number; b: number; } function pick(key: keyof P): void {} pick(\"c\");",
        3007,
    );
}

#[test]
fn unknown_name_is_reported() {
    assert_code("mystery();", 3001);
}

#[test]
fn unknown_type_name_is_reported() {
    assert_code("let x: Missing;", 3011);
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn checking_is_deterministic() {
    let source = "class A { v: number = 0; } function f(x: string | number) { if (typeof x === \"string\") { return x.length; } return x; } const a = new A(); f(a.v);";
    let first = check(source);
    let second = check(source);
    let codes = |r: &CheckResult| {
        let mut v: Vec<(u32, u32)> = r.diagnostics.iter().map(|d| (d.start, d.code)).collect();
        v.sort_unstable();
        v
    };
    assert_eq!(codes(&first), codes(&second));
    assert_eq!(first.type_map.expr_count(), second.type_map.expr_count());
}
