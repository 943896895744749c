#[cfg(test)]
mod resolver_tests {
    use roxide as lox;

    use lox::error::LoxError;
    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::Scanner;
    use lox::token::Token;

    /// Scan, parse and resolve; returns the resolver verdict.
    fn resolve(source: &str) -> Result<(), LoxError> {
        let tokens: Vec<Token> = Scanner::new(source)
            .collect::<Result<Vec<_>, _>>()
            .expect("scan failed");

        let mut parser = Parser::new(tokens);
        let statements = parser.parse();

        assert!(
            !parser.had_error(),
            "unexpected parse errors: {:?}",
            parser.take_errors()
        );

        let mut interpreter = Interpreter::new();
        let mut resolver = Resolver::new(&mut interpreter);

        resolver.resolve(&statements)
    }

    fn expect_error(source: &str, fragment: &str) {
        match resolve(source) {
            Err(e) => {
                let message = e.to_string();
                assert!(
                    message.contains(fragment),
                    "expected error containing '{}', got: {}",
                    fragment,
                    message
                );
            }

            Ok(()) => panic!("expected resolve error containing '{}'", fragment),
        }
    }

    #[test]
    fn test_return_at_top_level() {
        expect_error("return 1;", "Can't return from top-level code");
    }

    #[test]
    fn test_return_value_from_initializer() {
        expect_error(
            "class Foo { init() { return 1; } }",
            "Can't return a value from an initializer.",
        );
    }

    #[test]
    fn test_bare_return_in_initializer_is_fine() {
        assert!(resolve("class Foo { init() { return; } }").is_ok());
    }

    #[test]
    fn test_this_outside_class() {
        expect_error("print this;", "Cannot use 'this' outside of a class");
    }

    #[test]
    fn test_this_in_method_is_fine() {
        assert!(resolve("class Foo { bar() { return this; } }").is_ok());
    }

    #[test]
    fn test_this_in_class_method_is_fine() {
        assert!(resolve("class Foo { class make() { return this; } }").is_ok());
    }

    #[test]
    fn test_this_in_trait_method_is_fine() {
        assert!(resolve("trait T { name() { return this; } }").is_ok());
    }

    #[test]
    fn test_super_outside_class() {
        expect_error("print super.m;", "Cannot use 'super' outside of a class.");
    }

    #[test]
    fn test_super_without_superclass() {
        expect_error(
            "class A { m() { return super.m; } }",
            "Cannot use 'super' in a class with no superclass.",
        );
    }

    #[test]
    fn test_super_in_trait() {
        expect_error(
            "trait T { m() { return super.m; } }",
            "Cannot use 'super' outside of a class.",
        );
    }

    #[test]
    fn test_super_in_subclass_is_fine() {
        assert!(resolve("class A {} class B < A { m() { return super.m; } }").is_ok());
    }

    #[test]
    fn test_break_outside_loop() {
        expect_error("break;", "Control flow statement used outside loop");
    }

    #[test]
    fn test_continue_outside_loop() {
        expect_error("continue;", "Control flow statement used outside loop");
    }

    #[test]
    fn test_break_does_not_cross_function_boundary() {
        expect_error(
            "while (true) { fun f() { break; } f(); }",
            "Control flow statement used outside loop",
        );
    }

    #[test]
    fn test_break_in_nested_loop_is_fine() {
        assert!(resolve("for (;;) { while (true) { break; } break; }").is_ok());
    }

    #[test]
    fn test_self_inheritance() {
        expect_error("class A < A {}", "A class can't inherit from itself.");
    }

    #[test]
    fn test_duplicate_declaration_in_scope() {
        expect_error(
            "{ var a = 1; var a = 2; print a; }",
            "Already a variable with this name in this scope",
        );
    }

    #[test]
    fn test_duplicate_declaration_allowed_at_global_scope() {
        assert!(resolve("var a = 1; var a = 2; print a;").is_ok());
    }

    #[test]
    fn test_read_own_initializer() {
        expect_error(
            "var a = 1; { var a = a; print a; }",
            "Can't read local variable in its own initializer",
        );
    }

    #[test]
    fn test_unused_local() {
        expect_error(
            "{ var a = 1; }",
            "Local variable 'a' is never used",
        );
    }

    #[test]
    fn test_unused_parameter_is_fine() {
        assert!(resolve("fun f(unused) { return 1; } f(1);").is_ok());
    }

    #[test]
    fn test_used_local_is_fine() {
        assert!(resolve("{ var a = 1; print a; }").is_ok());
    }

    #[test]
    fn test_assignment_counts_as_use() {
        assert!(resolve("{ var a = 1; a = 2; }").is_ok());
    }

    #[test]
    fn test_loop_variable_used_in_condition() {
        assert!(resolve("for (var i = 0; i < 3; i = i + 1) {}").is_ok());
    }
}
