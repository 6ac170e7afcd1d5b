// nala-parser - Parser tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use nala_parser::ast::{Expression, Statement};
use nala_parser::{Lexer, Parser, Program};

fn parse(source: &str) -> Program {
    let mut parser = Parser::new(Lexer::new(source));
    let program = parser.parse_program();
    assert_eq!(
        parser.errors(),
        &[] as &[String],
        "unexpected parse errors for {:?}",
        source
    );
    program
}

fn parse_errors(source: &str) -> Vec<String> {
    let mut parser = Parser::new(Lexer::new(source));
    parser.parse_program();
    parser.errors().to_vec()
}

fn single_expression(program: &Program) -> &Expression {
    assert_eq!(program.statements.len(), 1);
    match &program.statements[0] {
        Statement::Expression { expression, .. } => expression,
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_let_statements() {
    let cases = [
        ("let x = 5;", "x", "5"),
        ("let y = true;", "y", "true"),
        ("let foobar = y;", "foobar", "y"),
    ];

    for (source, expected_name, expected_value) in cases {
        let program = parse(source);
        assert_eq!(program.statements.len(), 1);
        match &program.statements[0] {
            Statement::Let { name, value, .. } => {
                assert_eq!(name.value, expected_name);
                assert_eq!(value.to_string(), expected_value);
            }
            other => panic!("expected let statement, got {:?}", other),
        }
    }
}

#[test]
fn test_return_statements() {
    let cases = [("return 5;", "5"), ("return x + y;", "(x + y)")];

    for (source, expected_value) in cases {
        let program = parse(source);
        match &program.statements[0] {
            Statement::Return { value, .. } => assert_eq!(value.to_string(), expected_value),
            other => panic!("expected return statement, got {:?}", other),
        }
    }
}

#[test]
fn test_semicolons_are_optional_terminators() {
    let program = parse("let x = 5 let y = 6 x + y");
    assert_eq!(program.statements.len(), 3);
}

#[test]
fn test_integer_literal() {
    let program = parse("5;");
    match single_expression(&program) {
        Expression::IntegerLiteral { value, .. } => assert_eq!(*value, 5),
        other => panic!("expected integer literal, got {:?}", other),
    }
}

#[test]
fn test_string_literal() {
    let program = parse("\"hello world\";");
    match single_expression(&program) {
        Expression::StringLiteral { value, .. } => assert_eq!(value, "hello world"),
        other => panic!("expected string literal, got {:?}", other),
    }
}

#[test]
fn test_boolean_literals() {
    for (source, expected) in [("true;", true), ("false;", false)] {
        let program = parse(source);
        match single_expression(&program) {
            Expression::BooleanLiteral { value, .. } => assert_eq!(*value, expected),
            other => panic!("expected boolean literal, got {:?}", other),
        }
    }
}

#[test]
fn test_prefix_expressions() {
    let cases = [
        ("!5;", "!", "5"),
        ("-15;", "-", "15"),
        ("!true;", "!", "true"),
    ];

    for (source, expected_operator, expected_right) in cases {
        let program = parse(source);
        match single_expression(&program) {
            Expression::Prefix {
                operator, right, ..
            } => {
                assert_eq!(operator, expected_operator);
                assert_eq!(right.to_string(), expected_right);
            }
            other => panic!("expected prefix expression, got {:?}", other),
        }
    }
}

#[test]
fn test_infix_expressions() {
    let operators = ["+", "-", "*", "/", "%", "<", ">", "==", "!="];

    for operator in operators {
        let source = format!("5 {} 6;", operator);
        let program = parse(&source);
        match single_expression(&program) {
            Expression::Infix {
                operator: parsed,
                left,
                right,
                ..
            } => {
                assert_eq!(parsed, operator);
                assert_eq!(left.to_string(), "5");
                assert_eq!(right.to_string(), "6");
            }
            other => panic!("expected infix expression, got {:?}", other),
        }
    }
}

#[test]
fn test_operator_precedence() {
    let cases = [
        ("-a * b", "((-a) * b)"),
        ("!-a", "(!(-a))"),
        ("a + b + c", "((a + b) + c)"),
        ("a + b - c", "((a + b) - c)"),
        ("a * b * c", "((a * b) * c)"),
        ("a * b / c", "((a * b) / c)"),
        ("a + b / c", "(a + (b / c))"),
        ("a + b % c", "(a + (b % c))"),
        ("a + b * c + d / e - f", "(((a + (b * c)) + (d / e)) - f)"),
        ("3 + 4; -5 * 5", "(3 + 4)((-5) * 5)"),
        ("5 > 4 == 3 < 4", "((5 > 4) == (3 < 4))"),
        ("5 < 4 != 3 > 4", "((5 < 4) != (3 > 4))"),
        ("3 + 4 * 5 == 3 * 1 + 4 * 5", "((3 + (4 * 5)) == ((3 * 1) + (4 * 5)))"),
        ("true", "true"),
        ("false", "false"),
        ("3 > 5 == false", "((3 > 5) == false)"),
        ("1 + (2 + 3) + 4", "((1 + (2 + 3)) + 4)"),
        ("(5 + 5) * 2", "((5 + 5) * 2)"),
        ("2 / (5 + 5)", "(2 / (5 + 5))"),
        ("-(5 + 5)", "(-(5 + 5))"),
        ("!(true == true)", "(!(true == true))"),
        ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
        (
            "add(a, b, 1, 2 * 3, 4 + 5, add(6, 7 * 8))",
            "add(a, b, 1, (2 * 3), (4 + 5), add(6, (7 * 8)))",
        ),
        ("add(a + b + c * d / f + g)", "add((((a + b) + ((c * d) / f)) + g))"),
        ("a * [1, 2, 3, 4][b * c] * d", "((a * ([1, 2, 3, 4][(b * c)])) * d)"),
        (
            "add(a * b[2], b[1], 2 * [1, 2][1])",
            "add((a * (b[2])), (b[1]), (2 * ([1, 2][1])))",
        ),
    ];

    for (source, expected) in cases {
        let program = parse(source);
        assert_eq!(program.to_string(), expected, "for source {:?}", source);
    }
}

#[test]
fn test_if_expression() {
    let program = parse("if (x < y) { x }");
    match single_expression(&program) {
        Expression::If {
            condition,
            consequence,
            alternative,
            ..
        } => {
            assert_eq!(condition.to_string(), "(x < y)");
            assert_eq!(consequence.to_string(), "x");
            assert!(alternative.is_none());
        }
        other => panic!("expected if expression, got {:?}", other),
    }
}

#[test]
fn test_if_else_expression() {
    let program = parse("if (x < y) { x } else { y }");
    match single_expression(&program) {
        Expression::If { alternative, .. } => {
            assert_eq!(alternative.as_ref().map(|a| a.to_string()), Some("y".into()));
        }
        other => panic!("expected if expression, got {:?}", other),
    }
}

#[test]
fn test_function_literal() {
    let program = parse("fn(x, y) { x + y; }");
    match single_expression(&program) {
        Expression::FunctionLiteral {
            parameters, body, ..
        } => {
            let names: Vec<&str> = parameters.iter().map(|p| p.value.as_str()).collect();
            assert_eq!(names, vec!["x", "y"]);
            assert_eq!(body.to_string(), "(x + y)");
        }
        other => panic!("expected function literal, got {:?}", other),
    }
}

#[test]
fn test_function_parameters() {
    let cases: [(&str, Vec<&str>); 3] = [
        ("fn() {};", vec![]),
        ("fn(x) {};", vec!["x"]),
        ("fn(x, y, z) {};", vec!["x", "y", "z"]),
    ];

    for (source, expected) in cases {
        let program = parse(source);
        match single_expression(&program) {
            Expression::FunctionLiteral { parameters, .. } => {
                let names: Vec<&str> = parameters.iter().map(|p| p.value.as_str()).collect();
                assert_eq!(names, expected);
            }
            other => panic!("expected function literal, got {:?}", other),
        }
    }
}

#[test]
fn test_call_expression() {
    let program = parse("add(1, 2 * 3, 4 + 5);");
    match single_expression(&program) {
        Expression::Call {
            function,
            arguments,
            ..
        } => {
            assert_eq!(function.to_string(), "add");
            let rendered: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
            assert_eq!(rendered, vec!["1", "(2 * 3)", "(4 + 5)"]);
        }
        other => panic!("expected call expression, got {:?}", other),
    }
}

#[test]
fn test_array_literal() {
    let program = parse("[1, 2 * 2, 3 + 3]");
    match single_expression(&program) {
        Expression::ArrayLiteral { elements, .. } => {
            assert_eq!(elements.len(), 3);
            assert_eq!(elements[1].to_string(), "(2 * 2)");
        }
        other => panic!("expected array literal, got {:?}", other),
    }
}

#[test]
fn test_empty_array_literal() {
    let program = parse("[]");
    match single_expression(&program) {
        Expression::ArrayLiteral { elements, .. } => assert!(elements.is_empty()),
        other => panic!("expected array literal, got {:?}", other),
    }
}

#[test]
fn test_index_expression() {
    let program = parse("myArray[1 + 1]");
    match single_expression(&program) {
        Expression::Index { left, index, .. } => {
            assert_eq!(left.to_string(), "myArray");
            assert_eq!(index.to_string(), "(1 + 1)");
        }
        other => panic!("expected index expression, got {:?}", other),
    }
}

#[test]
fn test_hash_literal_preserves_source_order() {
    let program = parse("{\"one\": 1, \"two\": 2, \"three\": 3}");
    match single_expression(&program) {
        Expression::HashLiteral { pairs, .. } => {
            let keys: Vec<String> = pairs.iter().map(|(k, _)| k.to_string()).collect();
            assert_eq!(keys, vec!["\"one\"", "\"two\"", "\"three\""]);
        }
        other => panic!("expected hash literal, got {:?}", other),
    }
}

#[test]
fn test_empty_hash_literal() {
    let program = parse("{}");
    match single_expression(&program) {
        Expression::HashLiteral { pairs, .. } => assert!(pairs.is_empty()),
        other => panic!("expected hash literal, got {:?}", other),
    }
}

#[test]
fn test_hash_literal_with_expression_keys() {
    let program = parse("{1 + 1: 2, true: 3}");
    match single_expression(&program) {
        Expression::HashLiteral { pairs, .. } => {
            assert_eq!(pairs[0].0.to_string(), "(1 + 1)");
            assert_eq!(pairs[1].0.to_string(), "true");
        }
        other => panic!("expected hash literal, got {:?}", other),
    }
}

#[test]
fn test_display_is_fixed_point_under_reparse() {
    let sources = [
        "let x = 1 + 2 * 3;",
        "if (x < y) { x } else { y }",
        "fn(a, b) { a + b }(1, 2)",
        "[1, \"two\", true][0]",
        "{\"k\": [1, 2], 3: fn() { 4 }}",
        "return -x;",
    ];

    for source in sources {
        let first = parse(source).to_string();
        let second = parse(&first).to_string();
        assert_eq!(first, second, "for source {:?}", source);
    }
}

#[test]
fn test_expected_token_errors() {
    let errors = parse_errors("let x 5;");
    assert_eq!(errors, vec!["expected next token to be =, got INT instead"]);

    let errors = parse_errors("let = 5;");
    assert_eq!(
        errors[0],
        "expected next token to be IDENT, got = instead"
    );
}

#[test]
fn test_integer_overflow_error() {
    let errors = parse_errors("92233720368547758089;");
    assert_eq!(
        errors,
        vec!["could not parse \"92233720368547758089\" as integer"]
    );
}

#[test]
fn test_no_prefix_parse_fn_error() {
    let errors = parse_errors("+ 5;");
    assert_eq!(errors, vec!["no prefix parse function found for +"]);
}

#[test]
fn test_illegal_token_is_rejected() {
    let errors = parse_errors("1 + @;");
    assert!(!errors.is_empty());
    assert!(errors[0].contains("ILLEGAL"), "got {:?}", errors);
}

#[test]
fn test_reserved_tokens_have_no_handlers() {
    assert!(!parse_errors("'").is_empty());
    assert!(!parse_errors("|").is_empty());
    assert!(!parse_errors("macro").is_empty());
}
