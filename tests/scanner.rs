use rlox as lox;

use lox::scanner::Scanner;
use lox::token::{Token, TokenType};

fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
    let scanner = Scanner::new(source.as_bytes());
    let tokens: Vec<Token> = scanner.filter_map(Result::ok).collect();

    assert_eq!(
        tokens.len(),
        expected.len(),
        "token count mismatch for {:?}: {:?}",
        source,
        tokens
    );

    for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
        assert_eq!(actual.token_type, *expected_type);
        assert_eq!(actual.lexeme, *expected_lexeme);
    }
}

#[test]
fn symbols() {
    assert_token_sequence(
        "({*.,+*})",
        &[
            (TokenType::LEFT_PAREN, "("),
            (TokenType::LEFT_BRACE, "{"),
            (TokenType::STAR, "*"),
            (TokenType::DOT, "."),
            (TokenType::COMMA, ","),
            (TokenType::PLUS, "+"),
            (TokenType::STAR, "*"),
            (TokenType::RIGHT_BRACE, "}"),
            (TokenType::RIGHT_PAREN, ")"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn one_and_two_character_operators() {
    assert_token_sequence(
        "! != = == < <= > >=",
        &[
            (TokenType::BANG, "!"),
            (TokenType::BANG_EQUAL, "!="),
            (TokenType::EQUAL, "="),
            (TokenType::EQUAL_EQUAL, "=="),
            (TokenType::LESS, "<"),
            (TokenType::LESS_EQUAL, "<="),
            (TokenType::GREATER, ">"),
            (TokenType::GREATER_EQUAL, ">="),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn keywords_and_identifiers() {
    assert_token_sequence(
        "var language = nil; while fortune Zebra _under",
        &[
            (TokenType::VAR, "var"),
            (TokenType::IDENTIFIER, "language"),
            (TokenType::EQUAL, "="),
            (TokenType::NIL, "nil"),
            (TokenType::SEMICOLON, ";"),
            (TokenType::WHILE, "while"),
            // Keyword prefix does not make an identifier a keyword.
            (TokenType::IDENTIFIER, "fortune"),
            (TokenType::IDENTIFIER, "Zebra"),
            (TokenType::IDENTIFIER, "_under"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn number_literals_carry_values() {
    let tokens: Vec<Token> = Scanner::new(b"12.5 7 0.25")
        .filter_map(Result::ok)
        .collect();

    let values: Vec<f64> = tokens
        .iter()
        .filter_map(|t| match t.token_type {
            TokenType::NUMBER(n) => Some(n),
            _ => None,
        })
        .collect();

    assert_eq!(values, vec![12.5, 7.0, 0.25]);
}

#[test]
fn string_literal_spans_lines() {
    let tokens: Vec<Token> = Scanner::new(b"\"one\ntwo\" x")
        .filter_map(Result::ok)
        .collect();

    match &tokens[0].token_type {
        TokenType::STRING(s) => assert_eq!(s, "one\ntwo"),
        other => panic!("expected string token, got {:?}", other),
    }

    // The identifier after the literal sits on line 2.
    assert_eq!(tokens[1].line, 2);
}

#[test]
fn comments_are_discarded() {
    assert_token_sequence(
        "1 // the rest vanishes ; + -\n2",
        &[
            (TokenType::NUMBER(1.0), "1"),
            (TokenType::NUMBER(2.0), "2"),
            (TokenType::EOF, ""),
        ],
    );

    assert_token_sequence(
        "1 /* a\nmulti-line\ncomment */ 2",
        &[
            (TokenType::NUMBER(1.0), "1"),
            (TokenType::NUMBER(2.0), "2"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn block_comment_terminator_needs_star_then_slash() {
    // A lone '*' or '/' inside the comment must not close it.
    assert_token_sequence(
        "/* star * and / slash */ 3",
        &[(TokenType::NUMBER(3.0), "3"), (TokenType::EOF, "")],
    );
}

#[test]
fn block_comments_do_not_nest() {
    // The first '*/' closes the comment, leaving the trailing '*/' as
    // ordinary tokens.
    let results: Vec<_> = Scanner::new(b"/* outer /* inner */ tail").collect();

    let lexemes: Vec<String> = results
        .iter()
        .filter_map(|r| r.as_ref().ok().map(|t| t.lexeme.clone()))
        .collect();

    assert_eq!(lexemes, vec!["tail".to_string(), "".to_string()]);
}

#[test]
fn unterminated_string_is_an_error() {
    let results: Vec<_> = Scanner::new(b"\"never closed").collect();

    let errors: Vec<String> = results
        .iter()
        .filter_map(|r| r.as_ref().err().map(|e| e.to_string()))
        .collect();

    assert_eq!(errors, vec!["[line 1] Error: Unterminated string."]);
}

#[test]
fn unterminated_block_comment_is_an_error() {
    let results: Vec<_> = Scanner::new(b"1 /* never closed").collect();

    let errors: Vec<String> = results
        .iter()
        .filter_map(|r| r.as_ref().err().map(|e| e.to_string()))
        .collect();

    assert_eq!(errors, vec!["[line 1] Error: Unterminated block comment."]);
}

#[test]
fn scanning_continues_past_unexpected_characters() {
    let results: Vec<_> = Scanner::new(b",.$(#").collect();

    // COMMA, DOT, error for '$', LEFT_PAREN, error for '#', EOF.
    assert_eq!(results.len(), 6);

    let error_count = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(error_count, 2);

    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            err.to_string().contains("Unexpected character"),
            "unexpected message: {}",
            err
        );
    }

    let tokens: Vec<&Token> = results.iter().filter_map(|r| r.as_ref().ok()).collect();

    assert_eq!(tokens[0].token_type, TokenType::COMMA);
    assert_eq!(tokens[1].token_type, TokenType::DOT);
    assert_eq!(tokens[2].token_type, TokenType::LEFT_PAREN);
    assert_eq!(tokens[3].token_type, TokenType::EOF);
}

#[test]
fn eof_is_last_and_unique() {
    let tokens: Vec<Token> = Scanner::new(b"var x = 1;").filter_map(Result::ok).collect();

    let eof_count = tokens
        .iter()
        .filter(|t| t.token_type == TokenType::EOF)
        .count();

    assert_eq!(eof_count, 1);
    assert_eq!(tokens.last().unwrap().token_type, TokenType::EOF);
}

#[test]
fn eof_carries_final_line_number() {
    let tokens: Vec<Token> = Scanner::new(b"1\n2\n3\n").filter_map(Result::ok).collect();

    assert_eq!(tokens.last().unwrap().line, 4);
}
