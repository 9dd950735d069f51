use rlox as lox;

use lox::ast_printer::AstPrinter;
use lox::error::LoxError;
use lox::parser::{Expr, LiteralValue, Parser, Stmt};
use lox::scanner::Scanner;
use lox::token::Token;

fn parse(source: &str) -> (Vec<Stmt>, Vec<LoxError>) {
    let tokens: Vec<Token> = Scanner::new(source.as_bytes())
        .filter_map(Result::ok)
        .collect();

    Parser::new(tokens).parse()
}

/// Parse a single expression statement and return its printed prefix form.
fn parse_expr(source: &str) -> String {
    let (statements, errors) = parse(source);

    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert_eq!(statements.len(), 1);

    match &statements[0] {
        Stmt::Expression(expr) => AstPrinter::print(expr),
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn precedence_climbs_from_term_to_factor() {
    assert_eq!(parse_expr("1 + 2 * 3;"), "(+ 1.0 (* 2.0 3.0))");
    assert_eq!(parse_expr("1 * 2 - 3;"), "(- (* 1.0 2.0) 3.0)");
}

#[test]
fn grouping_overrides_precedence() {
    assert_eq!(parse_expr("(1 + 2) * 3;"), "(* (group (+ 1.0 2.0)) 3.0)");
}

#[test]
fn unary_operators_nest() {
    assert_eq!(parse_expr("!!true;"), "(! (! true))");
    assert_eq!(parse_expr("--1;"), "(- (- 1.0))");
}

#[test]
fn comparison_and_equality() {
    assert_eq!(parse_expr("1 < 2 == 3 >= 4;"), "(== (< 1.0 2.0) (>= 3.0 4.0))");
}

#[test]
fn logical_operators_bind_or_below_and() {
    assert_eq!(parse_expr("a or b and c;"), "(or a (and b c))");
}

#[test]
fn assignment_rewrites_variable_to_assign() {
    assert_eq!(parse_expr("a = 1;"), "(= a 1.0)");
    // Right-associative.
    assert_eq!(parse_expr("a = b = 2;"), "(= a (= b 2.0))");
}

#[test]
fn assignment_rewrites_get_to_set() {
    assert_eq!(parse_expr("a.b;"), "(. a b)");
    assert_eq!(parse_expr("a.b = 1;"), "(.= a b 1.0)");
    assert_eq!(parse_expr("a.b.c = 1;"), "(.= (. a b) c 1.0)");
}

#[test]
fn calls_and_property_chains() {
    assert_eq!(parse_expr("f(1, 2);"), "(call f 1.0 2.0)");
    assert_eq!(parse_expr("f()();"), "(call (call f))");
    assert_eq!(parse_expr("this.go();"), "(call (. this go))");
    assert_eq!(parse_expr("super.m();"), "(call (super m))");
}

#[test]
fn invalid_assignment_target_is_reported_not_fatal() {
    let (statements, errors) = parse("1 = 2; print 3;");

    // The bad assignment is reported but parsing stays on the statement
    // boundary: both statements come back.
    assert_eq!(statements.len(), 2);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("Invalid assignment target."));
    assert!(errors[0].to_string().contains("at '='"));
}

#[test]
fn for_loop_desugars_to_while() {
    let (statements, errors) = parse("for (var i = 0; i < 3; i = i + 1) print i;");

    assert!(errors.is_empty());
    assert_eq!(statements.len(), 1);

    // { var i; while (i < 3) { print i; i = i + 1; } }
    let inner = match &statements[0] {
        Stmt::Block(inner) => inner,
        other => panic!("expected block, got {:?}", other),
    };

    assert!(matches!(inner[0], Stmt::Var { .. }));

    let (condition, body) = match &inner[1] {
        Stmt::While { condition, body } => (condition, body),
        other => panic!("expected while, got {:?}", other),
    };

    assert_eq!(AstPrinter::print(condition), "(< i 3.0)");

    let body = match body.as_ref() {
        Stmt::Block(body) => body,
        other => panic!("expected block body, got {:?}", other),
    };

    assert!(matches!(body[0], Stmt::Print(_)));

    match &body[1] {
        Stmt::Expression(incr) => assert_eq!(AstPrinter::print(incr), "(= i (+ i 1.0))"),
        other => panic!("expected increment expression, got {:?}", other),
    }
}

#[test]
fn for_loop_without_clauses() {
    let (statements, errors) = parse("for (;;) break;");

    assert!(errors.is_empty());
    assert_eq!(statements.len(), 1);

    // No initializer: the outer block is elided; no condition: literal true.
    match &statements[0] {
        Stmt::While { condition, body } => {
            assert!(matches!(
                condition,
                Expr::Literal(LiteralValue::True)
            ));
            assert!(matches!(body.as_ref(), Stmt::Break));
        }

        other => panic!("expected while, got {:?}", other),
    }
}

#[test]
fn break_outside_loop_is_a_parse_error() {
    let (_, errors) = parse("break;");

    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .to_string()
        .contains("Must be inside a loop to use 'break'."));
}

#[test]
fn break_inside_nested_function_needs_its_own_loop() {
    let (_, errors) = parse("while (true) { fun f() { break; } }");

    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .to_string()
        .contains("Must be inside a loop to use 'break'."));

    let (_, errors) = parse("fun f() { while (true) break; }");

    assert!(errors.is_empty());
}

#[test]
fn at_most_255_arguments() {
    let args_255 = (0..255).map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
    let (_, errors) = parse(&format!("f({});", args_255));

    assert!(errors.is_empty());

    let args_256 = (0..256).map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
    let (_, errors) = parse(&format!("f({});", args_256));

    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .to_string()
        .contains("Can't have more than 255 arguments."));
}

#[test]
fn at_most_255_parameters() {
    let params_255 = (0..255)
        .map(|i| format!("p{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let (_, errors) = parse(&format!("fun f({}) {{}}", params_255));

    assert!(errors.is_empty());

    let params_256 = (0..256)
        .map(|i| format!("p{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let (_, errors) = parse(&format!("fun f({}) {{}}", params_256));

    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .to_string()
        .contains("Can't have more than 255 parameters."));
}

#[test]
fn panic_mode_recovers_at_statement_boundaries() {
    // Two broken declarations, one good statement: both errors surface and
    // the good statement survives.
    let (statements, errors) = parse("var 1 = 2; var 3 = 4; print 5;");

    assert_eq!(statements.len(), 1);
    assert!(matches!(statements[0], Stmt::Print(_)));
    assert_eq!(errors.len(), 2);

    for e in &errors {
        assert!(e.to_string().contains("Expect variable name."));
    }
}

#[test]
fn missing_semicolon_is_reported_at_end() {
    let (_, errors) = parse("print 1");

    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("at end"));
    assert!(errors[0].to_string().contains("Expect ';' after value."));
}

#[test]
fn class_declaration_shapes() {
    let (statements, errors) = parse("class B < A { init(x) { this.x = x; } m() { return 1; } }");

    assert!(errors.is_empty());
    assert_eq!(statements.len(), 1);

    match &statements[0] {
        Stmt::Class {
            name,
            superclass,
            methods,
        } => {
            assert_eq!(name.lexeme, "B");
            assert!(matches!(superclass, Some(Expr::Variable { .. })));
            assert_eq!(methods.len(), 2);
            assert_eq!(methods[0].name.lexeme, "init");
            assert_eq!(methods[0].params.len(), 1);
            assert_eq!(methods[1].name.lexeme, "m");
        }

        other => panic!("expected class, got {:?}", other),
    }
}

#[test]
fn empty_source_parses_to_nothing() {
    let (statements, errors) = parse("");

    assert!(statements.is_empty());
    assert!(errors.is_empty());
}
