#[cfg(test)]
mod scanner_tests {
    use roxide as lox;

    use lox::scanner::*;
    use lox::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source);
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
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
    fn test_scanner_02_ternary_symbols() {
        assert_token_sequence(
            "a ? b : c",
            &[
                (TokenType::IDENTIFIER, "a"),
                (TokenType::QUESTION, "?"),
                (TokenType::IDENTIFIER, "b"),
                (TokenType::COLON, ":"),
                (TokenType::IDENTIFIER, "c"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_operators() {
        assert_token_sequence(
            "! != = == > >= < <= /",
            &[
                (TokenType::BANG, "!"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL, "="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::GREATER, ">"),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::LESS, "<"),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::SLASH, "/"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_keywords() {
        assert_token_sequence(
            "break continue trait use class fun while for",
            &[
                (TokenType::BREAK, "break"),
                (TokenType::CONTINUE, "continue"),
                (TokenType::TRAIT, "trait"),
                (TokenType::USE, "use"),
                (TokenType::CLASS, "class"),
                (TokenType::FUN, "fun"),
                (TokenType::WHILE, "while"),
                (TokenType::FOR, "for"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_05_literals() {
        let scanner = Scanner::new("12 3.14 \"hello\" ident _snake9");
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens[0].token_type, TokenType::NUMBER(0.0));
        assert_eq!(tokens[0].lexeme, "12");

        match &tokens[1].token_type {
            TokenType::NUMBER(n) => assert_eq!(*n, 3.14),
            other => panic!("Expected NUMBER, got {:?}", other),
        }

        match &tokens[2].token_type {
            TokenType::STRING(s) => assert_eq!(s, "hello"),
            other => panic!("Expected STRING, got {:?}", other),
        }

        assert_eq!(tokens[3].token_type, TokenType::IDENTIFIER);
        assert_eq!(tokens[3].lexeme, "ident");
    }

    #[test]
    fn test_scanner_06_number_followed_by_dot() {
        // `5.` is NUMBER then DOT: the fraction needs a following digit.
        assert_token_sequence(
            "5.",
            &[
                (TokenType::NUMBER(0.0), "5"),
                (TokenType::DOT, "."),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_07_line_comment_skipped() {
        assert_token_sequence(
            "1 // the rest is ignored ==\n2",
            &[
                (TokenType::NUMBER(0.0), "1"),
                (TokenType::NUMBER(0.0), "2"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_08_nested_block_comment() {
        assert_token_sequence(
            "1 /* outer /* inner */ still a comment */ 2",
            &[
                (TokenType::NUMBER(0.0), "1"),
                (TokenType::NUMBER(0.0), "2"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_09_unterminated_block_comment() {
        let scanner = Scanner::new("7\n/* /* closed */ but not the outer");
        let results: Vec<_> = scanner.collect();

        let errors: Vec<String> = results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .map(|e| e.to_string())
            .collect();

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Unterminated block comment"));

        // Reported with the line the comment started on.
        assert!(errors[0].contains("[line 2]"));
    }

    #[test]
    fn test_scanner_10_stray_comment_close() {
        let scanner = Scanner::new("*/");
        let results: Vec<_> = scanner.collect();

        let error = results[0].as_ref().expect_err("expected a scan error");
        assert!(error
            .to_string()
            .contains("Unexpected end of comment outside block comment"));
    }

    #[test]
    fn test_scanner_11_multiline_string_lines() {
        let scanner = Scanner::new("\"a\nb\"\nident");
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        match &tokens[0].token_type {
            TokenType::STRING(s) => assert_eq!(s, "a\nb"),
            other => panic!("Expected STRING, got {:?}", other),
        }

        // The identifier sits on line 3: the string spans lines 1-2.
        assert_eq!(tokens[1].token_type, TokenType::IDENTIFIER);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_scanner_12_unterminated_string() {
        let scanner = Scanner::new("\"no closing quote");
        let results: Vec<_> = scanner.collect();

        let error = results[0].as_ref().expect_err("expected a scan error");
        assert!(error.to_string().contains("Unterminated string"));
    }

    #[test]
    fn test_scanner_13_lexeme_round_trip() {
        // Concatenated lexemes reproduce the source modulo whitespace and
        // comments.
        let source = "var x = 1; // trailing\nprint x + 2.5; /* gone */ \"s\"";
        let scanner = Scanner::new(source);

        let joined: String = scanner
            .filter_map(Result::ok)
            .map(|t| t.lexeme)
            .collect();

        assert_eq!(joined, "varx=1;printx+2.5;\"s\"");
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",.$(#";
        let scanner = Scanner::new(source);

        // Collect all results (both tokens and errors)
        let results: Vec<_> = scanner.collect();

        // We expect this sequence:
        // 0: COMMA ','
        // 1: DOT '.'
        // 2: Error for '$'
        // 3: LEFT_PAREN '('
        // 4: Error for '#'
        // 5: EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::DOT, ".");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let error_count = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(error_count, 2, "Expected 2 error messages");

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            let message = err.to_string();
            assert!(
                message.contains("Unexpected character"),
                "Error message should contain 'Unexpected character', got: {}",
                message
            );
        }

        fn assert_token_matches(
            result: &Result<Token, lox::error::LoxError>,
            expected_type: TokenType,
            expected_lexeme: &str,
        ) {
            match result {
                Ok(token) => {
                    assert_eq!(
                        token.token_type, expected_type,
                        "Expected token type {:?}, got {:?}",
                        expected_type, token.token_type
                    );
                    assert_eq!(
                        token.lexeme, expected_lexeme,
                        "Expected lexeme '{}', got '{}'",
                        expected_lexeme, token.lexeme
                    );
                }
                Err(e) => panic!("Expected token but got error: {}", e),
            }
        }
    }
}
