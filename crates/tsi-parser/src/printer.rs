//! Canonical source printer.
//!
//! Prints an AST back to source text whose token stream matches the
//! original input (up to automatic semicolon insertion), for the subset
//! the parser does not desugar. Used by round-trip tests and diagnostic
//! snippets.

use crate::ast::*;
use crate::types_ast::{TypeKeyword, TypeNode, TypeNodeKind};
use tsi_common::numeric::{format_bigint, format_number};

/// Print a whole program.
#[must_use]
pub fn print_program(program: &Program) -> String {
    let mut out = String::new();
    for stmt in &program.statements {
        print_stmt(stmt, &mut out);
        out.push('\n');
    }
    out
}

/// Print one statement.
pub fn print_stmt(stmt: &Stmt, out: &mut String) {
    match &stmt.kind {
        StmtKind::Expression(expr) => {
            print_expr(expr, out);
            out.push(';');
        }
        StmtKind::Var { kind, decls } => {
            out.push_str(match kind {
                VarKind::Var => "var ",
                VarKind::Let => "let ",
                VarKind::Const => "const ",
            });
            for (i, decl) in decls.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&decl.name);
                if let Some(ty) = &decl.type_ann {
                    out.push_str(": ");
                    print_type(ty, out);
                }
                if let Some(init) = &decl.init {
                    out.push_str(" = ");
                    print_expr(init, out);
                }
            }
            out.push(';');
        }
        StmtKind::Function(func) => print_function(func, true, out),
        StmtKind::Class(class) => print_class(class, out),
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            out.push_str("if (");
            print_expr(cond, out);
            out.push_str(") ");
            print_stmt(then, out);
            if let Some(otherwise) = otherwise {
                out.push_str(" else ");
                print_stmt(otherwise, out);
            }
        }
        StmtKind::While { cond, body, step } => {
            // A synthesised step means this was a `for`; print the loop form.
            out.push_str("while (");
            print_expr(cond, out);
            out.push_str(") ");
            if let Some(step) = step {
                out.push('{');
                print_stmt(body, out);
                out.push(' ');
                print_expr(step, out);
                out.push_str(";}");
            } else {
                print_stmt(body, out);
            }
        }
        StmtKind::DoWhile { body, cond } => {
            out.push_str("do ");
            print_stmt(body, out);
            out.push_str(" while (");
            print_expr(cond, out);
            out.push_str(");");
        }
        StmtKind::ForOf {
            binding,
            binding_kind,
            iterable,
            body,
        } => {
            out.push_str("for (");
            out.push_str(match binding_kind {
                VarKind::Var => "var ",
                VarKind::Let => "let ",
                VarKind::Const => "const ",
            });
            out.push_str(binding);
            out.push_str(" of ");
            print_expr(iterable, out);
            out.push_str(") ");
            print_stmt(body, out);
        }
        StmtKind::ForIn {
            binding,
            binding_kind,
            object,
            body,
        } => {
            out.push_str("for (");
            out.push_str(match binding_kind {
                VarKind::Var => "var ",
                VarKind::Let => "let ",
                VarKind::Const => "const ",
            });
            out.push_str(binding);
            out.push_str(" in ");
            print_expr(object, out);
            out.push_str(") ");
            print_stmt(body, out);
        }
        StmtKind::Switch {
            discriminant,
            cases,
        } => {
            out.push_str("switch (");
            print_expr(discriminant, out);
            out.push_str(") {");
            for case in cases {
                match &case.test {
                    Some(test) => {
                        out.push_str("case ");
                        print_expr(test, out);
                        out.push_str(": ");
                    }
                    None => out.push_str("default: "),
                }
                for stmt in &case.body {
                    print_stmt(stmt, out);
                    out.push(' ');
                }
            }
            out.push('}');
        }
        StmtKind::Block(stmts) => {
            out.push('{');
            for stmt in stmts {
                print_stmt(stmt, out);
                out.push(' ');
            }
            out.push('}');
        }
        StmtKind::Return(value) => {
            out.push_str("return");
            if let Some(value) = value {
                out.push(' ');
                print_expr(value, out);
            }
            out.push(';');
        }
        StmtKind::Break(label) => {
            out.push_str("break");
            if let Some(label) = label {
                out.push(' ');
                out.push_str(label);
            }
            out.push(';');
        }
        StmtKind::Continue(label) => {
            out.push_str("continue");
            if let Some(label) = label {
                out.push(' ');
                out.push_str(label);
            }
            out.push(';');
        }
        StmtKind::Labeled { label, body } => {
            out.push_str(label);
            out.push_str(": ");
            print_stmt(body, out);
        }
        StmtKind::Try {
            block,
            catch,
            finally,
        } => {
            out.push_str("try {");
            for stmt in block {
                print_stmt(stmt, out);
                out.push(' ');
            }
            out.push('}');
            if let Some(catch) = catch {
                out.push_str(" catch ");
                if let Some(binding) = &catch.binding {
                    out.push('(');
                    out.push_str(binding);
                    out.push_str(") ");
                }
                out.push('{');
                for stmt in &catch.body {
                    print_stmt(stmt, out);
                    out.push(' ');
                }
                out.push('}');
            }
            if let Some(finally) = finally {
                out.push_str(" finally {");
                for stmt in finally {
                    print_stmt(stmt, out);
                    out.push(' ');
                }
                out.push('}');
            }
        }
        StmtKind::Throw(expr) => {
            out.push_str("throw ");
            print_expr(expr, out);
            out.push(';');
        }
        StmtKind::Empty => out.push(';'),
        StmtKind::Interface { name, .. } => {
            out.push_str("interface ");
            out.push_str(name);
            out.push_str(" {}");
        }
        StmtKind::TypeAlias { name, type_ann, .. } => {
            out.push_str("type ");
            out.push_str(name);
            out.push_str(" = ");
            print_type(type_ann, out);
            out.push(';');
        }
        StmtKind::Enum { name, is_const, members } => {
            if *is_const {
                out.push_str("const ");
            }
            out.push_str("enum ");
            out.push_str(name);
            out.push_str(" {");
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&member.name);
                if let Some(init) = &member.init {
                    out.push_str(" = ");
                    print_expr(init, out);
                }
            }
            out.push('}');
        }
        StmtKind::Namespace { name, body } => {
            out.push_str("namespace ");
            out.push_str(name);
            out.push_str(" {");
            for stmt in body {
                print_stmt(stmt, out);
                out.push(' ');
            }
            out.push('}');
        }
        StmtKind::Import { source, .. } => {
            out.push_str("import \"");
            out.push_str(source);
            out.push_str("\";");
        }
        StmtKind::Export(kind) => {
            out.push_str("export ");
            match kind {
                ExportKind::Decl(stmt) => print_stmt(stmt, out),
                ExportKind::DefaultExpr(expr) => {
                    out.push_str("default ");
                    print_expr(expr, out);
                    out.push(';');
                }
                ExportKind::Named(specs) => {
                    out.push('{');
                    for (i, spec) in specs.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(&spec.local);
                        if spec.exported != spec.local {
                            out.push_str(" as ");
                            out.push_str(&spec.exported);
                        }
                    }
                    out.push_str("};");
                }
                ExportKind::Star { source } => {
                    out.push_str("* from \"");
                    out.push_str(source);
                    out.push_str("\";");
                }
            }
        }
    }
}

fn print_function(func: &FunctionData, declaration: bool, out: &mut String) {
    if func.flags.contains(FunctionFlags::ASYNC) {
        out.push_str("async ");
    }
    if func.flags.contains(FunctionFlags::ARROW) {
        print_params(&func.params, out);
        out.push_str(" => ");
        match &func.body {
            FunctionBody::Expr(expr) => print_expr(expr, out),
            FunctionBody::Block(stmts) => {
                out.push('{');
                for stmt in stmts {
                    print_stmt(stmt, out);
                    out.push(' ');
                }
                out.push('}');
            }
        }
        return;
    }
    out.push_str("function");
    if func.flags.contains(FunctionFlags::GENERATOR) {
        out.push('*');
    }
    if let Some(name) = &func.name {
        out.push(' ');
        out.push_str(name);
    }
    print_params(&func.params, out);
    if let Some(ret) = &func.return_type {
        out.push_str(": ");
        print_type(ret, out);
    }
    out.push(' ');
    match &func.body {
        FunctionBody::Block(stmts) => {
            out.push('{');
            for stmt in stmts {
                print_stmt(stmt, out);
                out.push(' ');
            }
            out.push('}');
        }
        FunctionBody::Expr(expr) => {
            out.push_str("{ return ");
            print_expr(expr, out);
            out.push_str("; }");
        }
    }
    let _ = declaration;
}

fn print_params(params: &[Param], out: &mut String) {
    out.push('(');
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        if param.rest {
            out.push_str("...");
        }
        out.push_str(&param.name);
        if param.optional {
            out.push('?');
        }
        if let Some(ty) = &param.type_ann {
            out.push_str(": ");
            print_type(ty, out);
        }
        if let Some(default) = &param.default {
            out.push_str(" = ");
            print_expr(default, out);
        }
    }
    out.push(')');
}

fn print_class(class: &ClassData, out: &mut String) {
    if class.is_abstract {
        out.push_str("abstract ");
    }
    out.push_str("class");
    if let Some(name) = &class.name {
        out.push(' ');
        out.push_str(name);
    }
    if let Some(superclass) = &class.superclass {
        out.push_str(" extends ");
        print_expr(superclass, out);
    }
    out.push_str(" {");
    for member in &class.members {
        match member {
            ClassMember::Constructor { func, .. } => {
                out.push_str("constructor");
                print_params(&func.params, out);
                out.push_str(" {");
                if let FunctionBody::Block(stmts) = &func.body {
                    for stmt in stmts {
                        print_stmt(stmt, out);
                        out.push(' ');
                    }
                }
                out.push_str("} ");
            }
            ClassMember::Method {
                key,
                func,
                modifiers,
                ..
            } => {
                print_modifiers(*modifiers, out);
                print_key(key, out);
                print_params(&func.params, out);
                if let Some(ret) = &func.return_type {
                    out.push_str(": ");
                    print_type(ret, out);
                }
                out.push_str(" {");
                if let FunctionBody::Block(stmts) = &func.body {
                    for stmt in stmts {
                        print_stmt(stmt, out);
                        out.push(' ');
                    }
                }
                out.push_str("} ");
            }
            ClassMember::Getter { key, func, modifiers, .. } => {
                print_modifiers(*modifiers, out);
                out.push_str("get ");
                print_key(key, out);
                print_params(&func.params, out);
                out.push_str(" {} ");
            }
            ClassMember::Setter { key, func, modifiers, .. } => {
                print_modifiers(*modifiers, out);
                out.push_str("set ");
                print_key(key, out);
                print_params(&func.params, out);
                out.push_str(" {} ");
            }
            ClassMember::Field {
                key,
                type_ann,
                init,
                modifiers,
                ..
            } => {
                print_modifiers(*modifiers, out);
                print_key(key, out);
                if let Some(ty) = type_ann {
                    out.push_str(": ");
                    print_type(ty, out);
                }
                if let Some(init) = init {
                    out.push_str(" = ");
                    print_expr(init, out);
                }
                out.push_str("; ");
            }
            ClassMember::StaticBlock(stmts) => {
                out.push_str("static {");
                for stmt in stmts {
                    print_stmt(stmt, out);
                    out.push(' ');
                }
                out.push_str("} ");
            }
        }
    }
    out.push('}');
}

fn print_modifiers(modifiers: MemberModifiers, out: &mut String) {
    if modifiers.contains(MemberModifiers::PUBLIC) {
        out.push_str("public ");
    }
    if modifiers.contains(MemberModifiers::PRIVATE) {
        out.push_str("private ");
    }
    if modifiers.contains(MemberModifiers::PROTECTED) {
        out.push_str("protected ");
    }
    if modifiers.contains(MemberModifiers::STATIC) {
        out.push_str("static ");
    }
    if modifiers.contains(MemberModifiers::ABSTRACT) {
        out.push_str("abstract ");
    }
    if modifiers.contains(MemberModifiers::OVERRIDE) {
        out.push_str("override ");
    }
    if modifiers.contains(MemberModifiers::READONLY) {
        out.push_str("readonly ");
    }
}

fn print_key(key: &PropertyKey, out: &mut String) {
    match key {
        PropertyKey::Ident(name) => out.push_str(name),
        PropertyKey::String(s) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
        PropertyKey::Number(n) => out.push_str(&format_number(*n)),
        PropertyKey::Private(name) => {
            out.push('#');
            out.push_str(name);
        }
        PropertyKey::Computed(expr) => {
            out.push('[');
            print_expr(expr, out);
            out.push(']');
        }
    }
}

/// Print one expression.
pub fn print_expr(expr: &Expr, out: &mut String) {
    match &expr.kind {
        ExprKind::Literal(lit) => print_lit(lit, out),
        ExprKind::Variable(name) => out.push_str(name),
        ExprKind::This => out.push_str("this"),
        ExprKind::Super { method } => {
            out.push_str("super");
            if let Some(method) = method {
                out.push('.');
                out.push_str(method);
            }
        }
        ExprKind::Grouping(inner) => {
            out.push('(');
            print_expr(inner, out);
            out.push(')');
        }
        ExprKind::Binary { op, left, right } => {
            print_expr(left, out);
            out.push(' ');
            out.push_str(binary_op_text(*op));
            out.push(' ');
            print_expr(right, out);
        }
        ExprKind::Logical { op, left, right } => {
            print_expr(left, out);
            out.push_str(match op {
                LogicalOp::And => " && ",
                LogicalOp::Or => " || ",
            });
            print_expr(right, out);
        }
        ExprKind::NullishCoalescing { left, right } => {
            print_expr(left, out);
            out.push_str(" ?? ");
            print_expr(right, out);
        }
        ExprKind::Unary { op, operand } => {
            out.push_str(match op {
                UnaryOp::Minus => "-",
                UnaryOp::Plus => "+",
                UnaryOp::Not => "!",
                UnaryOp::BitNot => "~",
                UnaryOp::Typeof => "typeof ",
                UnaryOp::Void => "void ",
            });
            print_expr(operand, out);
        }
        ExprKind::Ternary {
            cond,
            then,
            otherwise,
        } => {
            print_expr(cond, out);
            out.push_str(" ? ");
            print_expr(then, out);
            out.push_str(" : ");
            print_expr(otherwise, out);
        }
        ExprKind::Delete(target) => {
            out.push_str("delete ");
            print_expr(target, out);
        }
        ExprKind::Assign { target, value } => {
            print_target(target, out);
            out.push_str(" = ");
            print_expr(value, out);
        }
        ExprKind::CompoundAssign { target, op, value } => {
            print_target(target, out);
            out.push(' ');
            out.push_str(binary_op_text(*op));
            out.push_str("= ");
            print_expr(value, out);
        }
        ExprKind::LogicalAssign { target, op, value } => {
            print_target(target, out);
            out.push_str(match op {
                LogicalAssignOp::AndAnd => " &&= ",
                LogicalAssignOp::OrOr => " ||= ",
                LogicalAssignOp::Nullish => " ??= ",
            });
            print_expr(value, out);
        }
        ExprKind::Update { op, prefix, target } => {
            let op_text = match op {
                UpdateOp::Increment => "++",
                UpdateOp::Decrement => "--",
            };
            if *prefix {
                out.push_str(op_text);
                print_target(target, out);
            } else {
                print_target(target, out);
                out.push_str(op_text);
            }
        }
        ExprKind::Get { object, name, optional } => {
            print_expr(object, out);
            out.push_str(if *optional { "?." } else { "." });
            out.push_str(name);
        }
        ExprKind::GetIndex {
            object,
            index,
            optional,
        } => {
            print_expr(object, out);
            if *optional {
                out.push_str("?.");
            }
            out.push('[');
            print_expr(index, out);
            out.push(']');
        }
        ExprKind::PrivateGet { object, name } => {
            print_expr(object, out);
            out.push_str(".#");
            out.push_str(name);
        }
        ExprKind::Call {
            callee,
            args,
            optional,
            ..
        } => {
            print_expr(callee, out);
            if *optional {
                out.push_str("?.");
            }
            print_args(args, out);
        }
        ExprKind::New { callee, args, .. } => {
            out.push_str("new ");
            print_expr(callee, out);
            print_args(args, out);
        }
        ExprKind::Function(func) => print_function(func, false, out),
        ExprKind::ArrayLiteral(elements) => {
            out.push('[');
            for (i, element) in elements.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if element.spread {
                    out.push_str("...");
                }
                print_expr(&element.expr, out);
            }
            out.push(']');
        }
        ExprKind::ObjectLiteral(props) => {
            out.push('{');
            for (i, prop) in props.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                match prop {
                    ObjectProperty::KeyValue { key, value } => {
                        print_key(key, out);
                        out.push_str(": ");
                        print_expr(value, out);
                    }
                    ObjectProperty::Shorthand { name, .. } => out.push_str(name),
                    ObjectProperty::Spread(expr) => {
                        out.push_str("...");
                        print_expr(expr, out);
                    }
                    ObjectProperty::Method { key, func } => {
                        print_key(key, out);
                        print_params(&func.params, out);
                        out.push_str(" { ... }");
                    }
                    ObjectProperty::Getter { key, .. } => {
                        out.push_str("get ");
                        print_key(key, out);
                        out.push_str("() { ... }");
                    }
                    ObjectProperty::Setter { key, .. } => {
                        out.push_str("set ");
                        print_key(key, out);
                        out.push_str("(v) { ... }");
                    }
                }
            }
            out.push('}');
        }
        ExprKind::Spread(inner) => {
            out.push_str("...");
            print_expr(inner, out);
        }
        ExprKind::TemplateLiteral { quasis, exprs } => {
            out.push('`');
            for (i, quasi) in quasis.iter().enumerate() {
                out.push_str(&quasi.raw);
                if i < exprs.len() {
                    out.push_str("${");
                    print_expr(&exprs[i], out);
                    out.push('}');
                }
            }
            out.push('`');
        }
        ExprKind::TaggedTemplate { tag, quasis, exprs } => {
            print_expr(tag, out);
            out.push('`');
            for (i, quasi) in quasis.iter().enumerate() {
                out.push_str(&quasi.raw);
                if i < exprs.len() {
                    out.push_str("${");
                    print_expr(&exprs[i], out);
                    out.push('}');
                }
            }
            out.push('`');
        }
        ExprKind::RegexLiteral { pattern, flags } => {
            out.push('/');
            out.push_str(pattern);
            out.push('/');
            out.push_str(flags);
        }
        ExprKind::TypeAssertion { expr, type_ann } => {
            print_expr(expr, out);
            out.push_str(" as ");
            print_type(type_ann, out);
        }
        ExprKind::Satisfies { expr, type_ann } => {
            print_expr(expr, out);
            out.push_str(" satisfies ");
            print_type(type_ann, out);
        }
        ExprKind::NonNull(inner) => {
            print_expr(inner, out);
            out.push('!');
        }
        ExprKind::Await(inner) => {
            out.push_str("await ");
            print_expr(inner, out);
        }
        ExprKind::Yield { value, delegate } => {
            out.push_str("yield");
            if *delegate {
                out.push('*');
            }
            if let Some(value) = value {
                out.push(' ');
                print_expr(value, out);
            }
        }
        ExprKind::DynamicImport(path) => {
            out.push_str("import(");
            print_expr(path, out);
            out.push(')');
        }
        ExprKind::ImportMeta => out.push_str("import.meta"),
        ExprKind::ClassExpr(class) => print_class(class, out),
    }
}

fn print_args(args: &[Argument], out: &mut String) {
    out.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        if arg.spread {
            out.push_str("...");
        }
        print_expr(&arg.expr, out);
    }
    out.push(')');
}

fn print_target(target: &AssignTarget, out: &mut String) {
    match target {
        AssignTarget::Name(name) => out.push_str(name),
        AssignTarget::Property { object, name } => {
            print_expr(object, out);
            out.push('.');
            out.push_str(name);
        }
        AssignTarget::Index { object, index } => {
            print_expr(object, out);
            out.push('[');
            print_expr(index, out);
            out.push(']');
        }
        AssignTarget::Private { object, name } => {
            print_expr(object, out);
            out.push_str(".#");
            out.push_str(name);
        }
    }
}

fn print_lit(lit: &Lit, out: &mut String) {
    match lit {
        Lit::Number(n) => out.push_str(&format_number(*n)),
        Lit::String(s) => {
            out.push('"');
            for ch in s.chars() {
                match ch {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    _ => out.push(ch),
                }
            }
            out.push('"');
        }
        Lit::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Lit::BigInt(v) => {
            out.push_str(&format_bigint(v));
            out.push('n');
        }
        Lit::Null => out.push_str("null"),
        Lit::Undefined => out.push_str("undefined"),
    }
}

fn binary_op_text(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::Exp => "**",
        BinaryOp::EqEq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::EqEqEq => "===",
        BinaryOp::NotEqEq => "!==",
        BinaryOp::Lt => "<",
        BinaryOp::LtEq => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::GtEq => ">=",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::UShr => ">>>",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        BinaryOp::In => "in",
        BinaryOp::Instanceof => "instanceof",
    }
}

fn print_type(ty: &TypeNode, out: &mut String) {
    match &ty.kind {
        TypeNodeKind::Keyword(keyword) => out.push_str(match keyword {
            TypeKeyword::Number => "number",
            TypeKeyword::String => "string",
            TypeKeyword::Boolean => "boolean",
            TypeKeyword::Bigint => "bigint",
            TypeKeyword::Symbol => "symbol",
            TypeKeyword::Object => "object",
            TypeKeyword::Null => "null",
            TypeKeyword::Undefined => "undefined",
            TypeKeyword::Void => "void",
            TypeKeyword::Any => "any",
            TypeKeyword::Unknown => "unknown",
            TypeKeyword::Never => "never",
            TypeKeyword::This => "this",
        }),
        TypeNodeKind::Ref { name, type_args } => {
            out.push_str(name);
            if !type_args.is_empty() {
                out.push('<');
                for (i, arg) in type_args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    print_type(arg, out);
                }
                out.push('>');
            }
        }
        TypeNodeKind::Literal(lit) => print_lit(lit, out),
        TypeNodeKind::Array(element) => {
            print_type(element, out);
            out.push_str("[]");
        }
        TypeNodeKind::Union(members) => {
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    out.push_str(" | ");
                }
                print_type(member, out);
            }
        }
        TypeNodeKind::Intersection(members) => {
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    out.push_str(" & ");
                }
                print_type(member, out);
            }
        }
        TypeNodeKind::Parenthesized(inner) => {
            out.push('(');
            print_type(inner, out);
            out.push(')');
        }
        TypeNodeKind::Keyof(inner) => {
            out.push_str("keyof ");
            print_type(inner, out);
        }
        _ => out.push_str("unknown"),
    }
}
