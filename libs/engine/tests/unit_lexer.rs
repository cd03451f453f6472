//! Lexer behavior through the public API.

use mathtex_engine::error::Error;
use mathtex_engine::lexer::{Lexer, LexerOptions};
use mathtex_engine::token::TokenType;

#[test]
fn positions_are_byte_offsets() {
    let tokens = Lexer::tokenize("12 + x").unwrap();
    assert_eq!(tokens[0].position, 0);
    assert_eq!(tokens[1].position, 3);
    assert_eq!(tokens[2].position, 5);
}

#[test]
fn scientific_notation() {
    let tokens = Lexer::tokenize("6.022e23").unwrap();
    assert_eq!(tokens[0].token_type, TokenType::Number);
    assert_eq!(tokens[0].value, "6.022e23");
}

#[test]
fn unicode_whitespace_is_skipped() {
    // Non-breaking space between the operands
    let tokens = Lexer::tokenize("1\u{00a0}+\u{2009}2").unwrap();
    let kinds: Vec<_> = tokens.iter().map(|t| t.token_type.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            TokenType::Number,
            TokenType::Plus,
            TokenType::Number,
            TokenType::Eof
        ]
    );
}

#[test]
fn unicode_minus_and_operators() {
    let tokens = Lexer::tokenize("a \u{2212} b ⊕ c ⇒ d").unwrap();
    let kinds: Vec<_> = tokens.iter().map(|t| t.token_type.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            TokenType::Identifier,
            TokenType::Minus,
            TokenType::Identifier,
            TokenType::Xor,
            TokenType::Identifier,
            TokenType::Implies,
            TokenType::Identifier,
            TokenType::Eof
        ]
    );
}

#[test]
fn double_bar_tokens() {
    let tokens = Lexer::tokenize("\\|v\\| ‖w‖").unwrap();
    assert_eq!(tokens[0].token_type, TokenType::DoublePipe);
    assert_eq!(tokens[2].token_type, TokenType::DoublePipe);
    assert_eq!(tokens[3].token_type, TokenType::DoublePipe);
}

#[test]
fn malformed_number_is_a_tokenization_error() {
    let error = Lexer::tokenize("1.").unwrap_err();
    assert!(matches!(error, Error::Tokenization { .. }));
}

#[test]
fn oversized_input_is_rejected_with_position_zero() {
    let big = "1".repeat(2 * 1024 * 1024);
    let error = Lexer::tokenize(&big).unwrap_err();
    assert_eq!(error.position(), Some(0));
}

#[test]
fn letter_run_modes() {
    let fused = Lexer::tokenize_with(
        "ab",
        LexerOptions {
            single_letter_identifiers: false,
            ..Default::default()
        },
        None,
    )
    .unwrap();
    assert_eq!(fused[0].value, "ab");

    let split = Lexer::tokenize("ab").unwrap();
    assert_eq!(split[0].value, "a");
    assert_eq!(split[1].value, "b");
}
