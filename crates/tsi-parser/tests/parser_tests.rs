//! Parser integration tests: precedence, desugaring, recovery, ASI.

use tsi_parser::Parser;
use tsi_parser::ast::*;
use tsi_parser::printer::print_program;
use tsi_scanner::{Scanner, TokenKind};

fn parse_ok(source: &str) -> Program {
    let result = Parser::new("test.ts", source).parse_program();
    assert!(
        !result.has_errors(),
        "unexpected diagnostics: {:?}",
        result.diagnostics
    );
    result.program
}

fn first_expr(program: &Program) -> &Expr {
    match &program.statements[0].kind {
        StmtKind::Expression(expr) => expr,
        other => panic!("expected expression statement, got {other:?}"),
    }
}

#[test]
fn precedence_additive_vs_multiplicative() {
    let program = parse_ok("1 + 2 * 3;");
    let ExprKind::Binary { op, right, .. } = &first_expr(&program).kind else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinaryOp::Add);
    assert!(matches!(
        right.kind,
        ExprKind::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn exponentiation_is_right_associative() {
    let program = parse_ok("2 ** 3 ** 2;");
    let ExprKind::Binary { op, left, right } = &first_expr(&program).kind else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinaryOp::Exp);
    assert!(matches!(left.kind, ExprKind::Literal(Lit::Number(n)) if n == 2.0));
    assert!(matches!(
        right.kind,
        ExprKind::Binary {
            op: BinaryOp::Exp,
            ..
        }
    ));
}

#[test]
fn ternary_over_nullish() {
    let program = parse_ok("a ?? b ? c : d;");
    assert!(matches!(
        first_expr(&program).kind,
        ExprKind::Ternary { .. }
    ));
}

#[test]
fn optional_chain_forms() {
    let program = parse_ok("a?.b?.[0]?.();");
    // Outermost node is the optional call.
    assert!(matches!(
        &first_expr(&program).kind,
        ExprKind::Call { optional: true, .. }
    ));
}

#[test]
fn for_loop_desugars_to_while() {
    let program = parse_ok("for (let i = 0; i < 5; i++) { work(i); }");
    let StmtKind::Block(stmts) = &program.statements[0].kind else {
        panic!("expected block from for-desugar");
    };
    assert_eq!(stmts.len(), 2);
    assert!(matches!(stmts[0].kind, StmtKind::Var { .. }));
    let StmtKind::While { step, .. } = &stmts[1].kind else {
        panic!("expected while from for-desugar");
    };
    assert!(step.is_some());
}

#[test]
fn for_without_test_gets_true() {
    let program = parse_ok("for (;;) { break; }");
    let StmtKind::Block(stmts) = &program.statements[0].kind else {
        panic!("expected block");
    };
    let StmtKind::While { cond, .. } = &stmts[0].kind else {
        panic!("expected while");
    };
    assert!(matches!(cond.kind, ExprKind::Literal(Lit::Boolean(true))));
}

#[test]
fn object_destructuring_lowers_to_temporaries() {
    let program = parse_ok("const {a, b: c = 5} = obj;");
    let StmtKind::Var { decls, .. } = &program.statements[0].kind else {
        panic!("expected var");
    };
    // %tmp, a, %def, c
    assert!(decls[0].synthetic);
    assert!(decls[0].name.starts_with('%'));
    let names: Vec<&str> = decls
        .iter()
        .filter(|d| !d.synthetic)
        .map(|d| d.name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "c"]);
    // `a` reads off the temporary, preserving single evaluation of `obj`.
    let a_decl = decls.iter().find(|d| d.name == "a").unwrap();
    assert!(matches!(
        a_decl.init.as_ref().unwrap().kind,
        ExprKind::Get { .. }
    ));
}

#[test]
fn array_destructuring_with_rest() {
    let program = parse_ok("const [x, , y, ...rest] = items;");
    let StmtKind::Var { decls, .. } = &program.statements[0].kind else {
        panic!("expected var");
    };
    let names: Vec<&str> = decls
        .iter()
        .filter(|d| !d.synthetic)
        .map(|d| d.name.as_str())
        .collect();
    assert_eq!(names, vec!["x", "y", "rest"]);
}

#[test]
fn arrow_vs_grouping() {
    let program = parse_ok("(a, b) => a + b;");
    let ExprKind::Function(func) = &first_expr(&program).kind else {
        panic!("expected arrow function");
    };
    assert!(func.flags.contains(FunctionFlags::ARROW));
    assert_eq!(func.params.len(), 2);

    let program = parse_ok("(a);");
    assert!(matches!(
        first_expr(&program).kind,
        ExprKind::Grouping { .. }
    ));
}

#[test]
fn arrow_with_return_type() {
    let program = parse_ok("const f = (n: number): number => n * 2;");
    let StmtKind::Var { decls, .. } = &program.statements[0].kind else {
        panic!("expected var");
    };
    let ExprKind::Function(func) = &decls[0].init.as_ref().unwrap().kind else {
        panic!("expected arrow");
    };
    assert!(func.return_type.is_some());
}

#[test]
fn async_arrow() {
    let program = parse_ok("const f = async x => x;");
    let StmtKind::Var { decls, .. } = &program.statements[0].kind else {
        panic!("expected var");
    };
    let ExprKind::Function(func) = &decls[0].init.as_ref().unwrap().kind else {
        panic!("expected arrow");
    };
    assert!(func.flags.contains(FunctionFlags::ASYNC));
    assert!(func.flags.contains(FunctionFlags::ARROW));
}

#[test]
fn class_with_members() {
    let program = parse_ok(
        "class Point { x: number = 0; constructor(x: number) { this.x = x; } dist(): number { return this.x; } static origin() { return new Point(0); } get value() { return this.x; } }",
    );
    let StmtKind::Class(class) = &program.statements[0].kind else {
        panic!("expected class");
    };
    assert_eq!(class.name.as_deref(), Some("Point"));
    assert!(class.constructor().is_some());
    let statics: Vec<_> = class
        .members
        .iter()
        .filter(|m| match m {
            ClassMember::Method { modifiers, .. } => modifiers.contains(MemberModifiers::STATIC),
            _ => false,
        })
        .collect();
    assert_eq!(statics.len(), 1);
}

#[test]
fn implicit_constructor_is_not_synthesised_in_ast() {
    let program = parse_ok("class B extends A { }");
    let StmtKind::Class(class) = &program.statements[0].kind else {
        panic!("expected class");
    };
    // Pass-through construction is a runtime behaviour, not a parsed node.
    assert!(class.constructor().is_none());
    assert!(class.superclass.is_some());
}

#[test]
fn generator_and_yield() {
    let program = parse_ok("function* gen() { yield 1; yield* other(); }");
    let StmtKind::Function(func) = &program.statements[0].kind else {
        panic!("expected function");
    };
    assert!(func.flags.contains(FunctionFlags::GENERATOR));
    let FunctionBody::Block(body) = &func.body else {
        panic!();
    };
    let StmtKind::Expression(first) = &body[0].kind else {
        panic!();
    };
    assert!(matches!(
        first.kind,
        ExprKind::Yield {
            delegate: false,
            ..
        }
    ));
}

#[test]
fn yield_outside_generator_is_an_error() {
    let result = Parser::new("test.ts", "function f() { yield 1; }").parse_program();
    assert!(result.has_errors());
}

#[test]
fn asi_inserts_between_lines() {
    let program = parse_ok("let a = 1\nlet b = 2\na + b");
    assert_eq!(program.statements.len(), 3);
}

#[test]
fn return_asi_hazard() {
    let program = parse_ok("function f() { return\n1; }");
    let StmtKind::Function(func) = &program.statements[0].kind else {
        panic!();
    };
    let FunctionBody::Block(body) = &func.body else {
        panic!();
    };
    // `return` followed by a newline returns undefined.
    assert!(matches!(body[0].kind, StmtKind::Return(None)));
}

#[test]
fn recovery_reports_multiple_errors() {
    let result = Parser::new("test.ts", "let = 1; let y 2; let z = 3;").parse_program();
    assert!(result.has_errors());
    assert!(result.diagnostics.len() >= 2);
    // The parser still produced the valid trailing statement.
    assert!(result
        .program
        .statements
        .iter()
        .any(|s| matches!(&s.kind, StmtKind::Var { decls, .. } if decls.iter().any(|d| d.name == "z"))));
}

#[test]
fn labeled_continue_targets() {
    let program =
        parse_ok("outer: for (let i = 0; i < 3; i++) { for (let j = 0; j < 3; j++) { continue outer; } }");
    assert!(matches!(program.statements[0].kind, StmtKind::Labeled { .. }));
}

#[test]
fn unknown_label_is_an_error() {
    let result = Parser::new("test.ts", "while (x) { break missing; }").parse_program();
    assert!(result.has_errors());
}

#[test]
fn template_literals_parse_interleaved() {
    let program = parse_ok("`a${x}b${y}c`;");
    let ExprKind::TemplateLiteral { quasis, exprs } = &first_expr(&program).kind else {
        panic!("expected template literal");
    };
    assert_eq!(quasis.len(), 3);
    assert_eq!(exprs.len(), 2);
}

#[test]
fn tagged_template_keeps_tag() {
    let program = parse_ok("tag`a${x}b`;");
    assert!(matches!(
        first_expr(&program).kind,
        ExprKind::TaggedTemplate { .. }
    ));
}

#[test]
fn type_annotations_do_not_affect_expression_shape() {
    let program = parse_ok("let x: Map<string, number[]> = make();");
    let StmtKind::Var { decls, .. } = &program.statements[0].kind else {
        panic!();
    };
    assert!(decls[0].type_ann.is_some());
    assert!(matches!(
        decls[0].init.as_ref().unwrap().kind,
        ExprKind::Call { .. }
    ));
}

#[test]
fn satisfies_and_as_parse() {
    let program = parse_ok("const a = value as number; const b = config satisfies Options;");
    assert_eq!(program.statements.len(), 2);
}

#[test]
fn interface_and_type_alias() {
    let program = parse_ok(
        "interface Shape { area(): number; name: string; } type Pair = [number, number];",
    );
    assert!(matches!(
        program.statements[0].kind,
        StmtKind::Interface { .. }
    ));
    assert!(matches!(
        program.statements[1].kind,
        StmtKind::TypeAlias { .. }
    ));
}

#[test]
fn enum_members() {
    let program = parse_ok("enum Color { Red, Green = 10, Blue }");
    let StmtKind::Enum { members, is_const, .. } = &program.statements[0].kind else {
        panic!();
    };
    assert!(!is_const);
    assert_eq!(members.len(), 3);
    assert!(members[1].init.is_some());
}

#[test]
fn decorators_require_mode() {
    let source = "@sealed class C {}";
    let result = Parser::new("test.ts", source).parse_program();
    assert!(result.has_errors());

    let result = Parser::new("test.ts", source)
        .with_decorator_mode(tsi_common::options::DecoratorMode::Legacy)
        .parse_program();
    assert!(!result.has_errors());
    let StmtKind::Class(class) = &result.program.statements[0].kind else {
        panic!();
    };
    assert_eq!(class.decorators.len(), 1);
}

#[test]
fn round_trip_token_streams_match() {
    // Sources restricted to constructs the parser does not desugar.
    let sources = [
        "let x = 1 + 2 * 3;",
        "if (a < b) { log(a); } else { log(b); }",
        "while (ready()) { step(); }",
        "const f = function add(a, b) { return a + b; };",
        "items.filter(isOdd).map(double);",
        "throw new RangeError(\"bad\");",
    ];
    for source in sources {
        let program = parse_ok(source);
        let printed = print_program(&program);
        let (original, _) = Scanner::new("a.ts", source).scan();
        let (reprinted, _) = Scanner::new("b.ts", &printed).scan();
        let strip = |tokens: &[tsi_scanner::Token]| {
            tokens
                .iter()
                .map(|t| (t.kind, t.text.clone()))
                .filter(|(k, _)| *k != TokenKind::Semicolon)
                .collect::<Vec<_>>()
        };
        assert_eq!(
            strip(&original),
            strip(&reprinted),
            "round-trip mismatch for {source:?}: printed as {printed:?}"
        );
    }
}
