#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    use roxide as lox;

    use lox::error::LoxError;
    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::Scanner;
    use lox::token::Token;

    /// Run the full pipeline and capture everything `print` wrote.
    fn run(source: &str) -> Result<String, LoxError> {
        let buffer: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let sink: Rc<RefCell<dyn Write>> = buffer.clone();

        let mut interpreter = Interpreter::with_output(sink);

        let tokens: Vec<Token> = Scanner::new(source).collect::<Result<Vec<_>, _>>()?;

        let mut parser = Parser::new(tokens);
        let statements = parser.parse();

        if let Some(e) = parser.take_errors().into_iter().next() {
            return Err(e);
        }

        Resolver::new(&mut interpreter).resolve(&statements)?;

        interpreter.interpret(&statements)?;

        let output = buffer.borrow().clone();
        Ok(String::from_utf8(output).expect("print output was not UTF-8"))
    }

    fn assert_output(source: &str, expected: &str) {
        match run(source) {
            Ok(output) => assert_eq!(output, expected),
            Err(e) => panic!("program failed: {}\nsource: {}", e, source),
        }
    }

    fn assert_runtime_error(source: &str, fragment: &str) {
        match run(source) {
            Err(LoxError::Runtime { message, .. }) => assert!(
                message.contains(fragment),
                "expected runtime error containing '{}', got: {}",
                fragment,
                message
            ),

            Err(other) => panic!("expected runtime error, got: {}", other),

            Ok(output) => panic!(
                "expected runtime error containing '{}', program printed: {}",
                fragment, output
            ),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Arithmetic, strings, printing
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_arithmetic() {
        assert_output("print 1 + 2;", "3\n");
        assert_output("print 7 - 2 * 3;", "1\n");
        assert_output("print (7 - 2) * 3;", "15\n");
        assert_output("print -4 / 2;", "-2\n");
    }

    #[test]
    fn test_number_formatting() {
        assert_output("print 2.5;", "2.5\n");
        assert_output("print 4.0;", "4\n");
        assert_output("print -0.0;", "0\n");
        assert_output("print 0 - 0;", "0\n");
    }

    #[test]
    fn test_string_concatenation_stringifies_other_operand() {
        assert_output("var a = \"x\"; print a + 1;", "x1\n");
        assert_output("print 1 + \"x\";", "1x\n");
        assert_output("print \"v=\" + true;", "v=true\n");
        assert_output("print \"n: \" + nil;", "n: nil\n");
    }

    #[test]
    fn test_plus_type_error() {
        assert_runtime_error(
            "print true + 1;",
            "Operands must be two numbers or two strings",
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_runtime_error("print 1 / 0;", "Division by zero");
    }

    #[test]
    fn test_unary_minus_requires_number() {
        assert_runtime_error("print -\"abc\";", "Operand must be a number.");
    }

    #[test]
    fn test_stringify_callables() {
        assert_output("fun foo() { return 1; } print foo;", "<fn foo>\n");
        assert_output("class A {} print A;", "<class A>\n");
        assert_output("print clock;", "<native fn: clock>\n");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Comparisons and equality
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_numeric_comparison() {
        assert_output("print 1 < 2;", "true\n");
        assert_output("print 2 <= 1;", "false\n");
    }

    #[test]
    fn test_string_comparison_is_lexicographic() {
        assert_output("print \"apple\" < \"banana\";", "true\n");
        assert_output("print \"b\" < \"a\";", "false\n");
    }

    #[test]
    fn test_boolean_comparison_false_before_true() {
        assert_output("print false < true;", "true\n");
        assert_output("print true <= false;", "false\n");
    }

    #[test]
    fn test_cross_type_comparison_is_error() {
        assert_runtime_error(
            "print 1 < \"2\";",
            "Cannot compare, expressions are of different types",
        );
    }

    #[test]
    fn test_unorderable_comparison_is_error() {
        assert_runtime_error("print nil < nil;", "Cannot compare, type is not orderable");
    }

    #[test]
    fn test_equality() {
        assert_output("print nil == nil;", "true\n");
        assert_output("print 1 == 1;", "true\n");
        assert_output("print 1 == \"1\";", "false\n");
        assert_output("print 1 == true;", "false\n");
        assert_output("print \"a\" != \"b\";", "true\n");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logical, ternary, comma
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_logical_operators_return_deciding_operand() {
        assert_output("print \"a\" or \"b\";", "a\n");
        assert_output("print nil or \"b\";", "b\n");
        assert_output("print nil and 2;", "nil\n");
        assert_output("print 1 and 2;", "2\n");
    }

    #[test]
    fn test_logical_short_circuit_skips_right_operand() {
        assert_output(
            "var called = false;
             fun touch() { called = true; return true; }
             var result = false and touch();
             print result;
             print called;",
            "false\nfalse\n",
        );
    }

    #[test]
    fn test_ternary_evaluates_only_chosen_branch() {
        assert_output(
            "fun boom() { return 1 / 0; }
             print true ? \"yes\" : boom();",
            "yes\n",
        );
        assert_output("print 0 ? \"zero is truthy\" : \"unreachable\";", "zero is truthy\n");
    }

    #[test]
    fn test_comma_returns_right_operand() {
        assert_output("print (1, 2, 3);", "3\n");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Variables and the undefined sentinel
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_uninitialized_read_is_error() {
        assert_runtime_error("var x; print x;", "Access of uninitialized variable 'x'");
    }

    #[test]
    fn test_uninitialized_never_reaches_operators() {
        assert_runtime_error("var a; a + 1;", "Access of uninitialized variable 'a'");
    }

    #[test]
    fn test_uninitialized_then_assigned() {
        assert_output("var a; a = 5; print a;", "5\n");
    }

    #[test]
    fn test_undefined_variable() {
        assert_runtime_error("print missing;", "Undefined variable 'missing'");
        assert_runtime_error("missing = 1;", "Undefined variable 'missing'");
    }

    #[test]
    fn test_shadowing_in_blocks() {
        assert_output(
            "var a = \"outer\";
             {
               var a = \"inner\";
               print a;
             }
             print a;",
            "inner\nouter\n",
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Control flow
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_while_with_break() {
        assert_output(
            "var i = 0;
             while (true) {
               i = i + 1;
               if (i == 3) break;
             }
             print i;",
            "3\n",
        );
    }

    #[test]
    fn test_for_continue_still_runs_increment() {
        assert_output(
            "var i = 0;
             for (var j = 0; j < 3; j = j + 1) {
               if (j == 1) continue;
               i = i + 1;
             }
             print i;",
            "2\n",
        );
    }

    #[test]
    fn test_while_continue_reevaluates_condition_only() {
        assert_output(
            "var sum = 0;
             var i = 0;
             while (i < 5) {
               i = i + 1;
               if (i == 2) continue;
               sum = sum + i;
             }
             print sum;",
            "13\n",
        );
    }

    #[test]
    fn test_continue_targets_nearest_loop_not_nearest_block() {
        assert_output(
            "var total = 0;
             var i = 0;
             while (i < 3) {
               i = i + 1;
               {
                 if (i == 2) continue;
                 total = total + i;
               }
             }
             print total;",
            "4\n",
        );
    }

    #[test]
    fn test_return_from_inside_for() {
        assert_output(
            "fun find() {
               for (var i = 0; i < 10; i = i + 1) {
                 if (i == 5) return i;
               }
               return -1;
             }
             print find();",
            "5\n",
        );
    }

    #[test]
    fn test_nested_loops_break_inner_only() {
        assert_output(
            "var count = 0;
             for (var i = 0; i < 3; i = i + 1) {
               for (var j = 0; j < 3; j = j + 1) {
                 if (j == 1) break;
                 count = count + 1;
               }
             }
             print count;",
            "3\n",
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Functions and closures
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_closure_counter_shares_environment_cell() {
        assert_output(
            "fun make() {
               var c = 0;
               fun inc() { c = c + 1; return c; }
               return inc;
             }
             var f = make();
             print f();
             print f();",
            "1\n2\n",
        );
    }

    #[test]
    fn test_two_closures_from_same_scope_share_state() {
        assert_output(
            "fun pair() {
               var n = 0;
               fun bump() { n = n + 1; return n; }
               fun read() { return n; }
               print bump();
               print read();
             }
             pair();",
            "1\n1\n",
        );
    }

    #[test]
    fn test_lambda_values() {
        assert_output(
            "var add = fun (a, b) { return a + b; };
             print add(1, 2);",
            "3\n",
        );
        assert_output(
            "fun apply(f) { return f(10); }
             print apply(fun (n) { return n * 2; });",
            "20\n",
        );
    }

    #[test]
    fn test_recursion() {
        assert_output(
            "fun fib(n) {
               if (n < 2) return n;
               return fib(n - 1) + fib(n - 2);
             }
             print fib(10);",
            "55\n",
        );
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_output("fun noop() {} print noop();", "nil\n");
    }

    #[test]
    fn test_arity_mismatch() {
        assert_runtime_error(
            "fun f(a) { return a; } f(1, 2);",
            "Expected 1 arguments but got 2",
        );
    }

    #[test]
    fn test_calling_non_callable() {
        assert_runtime_error("\"text\"();", "Can only call functions and classes");
    }

    #[test]
    fn test_arguments_evaluate_left_to_right() {
        assert_output(
            "fun take3(a, b, c) { return a; }
             var log = \"\";
             fun note(n) { log = log + n; return n; }
             take3(note(1), note(2), note(3));
             print log;",
            "123\n",
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Classes
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_fields_and_methods() {
        assert_output(
            "class Counter {
               init() { this.n = 0; }
               bump() { this.n = this.n + 1; return this.n; }
             }
             var c = Counter();
             c.bump();
             print c.bump();",
            "2\n",
        );
    }

    #[test]
    fn test_inherited_method() {
        assert_output(
            "class A { greet() { print \"hi\"; } }
             class B < A {}
             B().greet();",
            "hi\n",
        );
    }

    #[test]
    fn test_super_calls_superclass_method() {
        assert_output(
            "class A { method() { print \"A method\"; } }
             class B < A {
               method() { print \"B method\"; }
               test() { super.method(); }
             }
             B().test();",
            "A method\n",
        );
    }

    #[test]
    fn test_init_returns_this() {
        assert_output(
            "class Foo { init() {} }
             var foo = Foo();
             print foo.init() == foo;",
            "true\n",
        );
    }

    #[test]
    fn test_init_arity_checked() {
        assert_runtime_error(
            "class P { init(a, b) { this.a = a; this.b = b; } } P(1);",
            "Expected 2 arguments but got 1",
        );
    }

    #[test]
    fn test_getter_runs_on_access() {
        assert_output(
            "class Circle {
               init(radius) { this.radius = radius; }
               area { return 3 * this.radius * this.radius; }
             }
             var c = Circle(2);
             print c.area;",
            "12\n",
        );
    }

    #[test]
    fn test_class_method_binds_class_as_this() {
        assert_output(
            "class Math {
               class square(n) { return n * n; }
             }
             print Math.square(3);",
            "9\n",
        );
        assert_output(
            "class C {
               class itself() { return this; }
             }
             print C.itself() == C;",
            "true\n",
        );
    }

    #[test]
    fn test_class_methods_inherit() {
        assert_output(
            "class A { class tag() { return \"A\"; } }
             class B < A {}
             print B.tag();",
            "A\n",
        );
    }

    #[test]
    fn test_bound_method_remembers_instance() {
        assert_output(
            "class Speaker {
               init(word) { this.word = word; }
               say() { print this.word; }
             }
             var hello = Speaker(\"hello\").say;
             hello();",
            "hello\n",
        );
    }

    #[test]
    fn test_fields_shadow_methods() {
        assert_output(
            "class C {
               value() { return \"method\"; }
             }
             var c = C();
             c.value = \"field\";
             print c.value;",
            "field\n",
        );
    }

    #[test]
    fn test_undefined_property() {
        assert_runtime_error(
            "class C {} print C().missing;",
            "Undefined property 'missing'",
        );
    }

    #[test]
    fn test_get_on_non_instance() {
        assert_runtime_error("print 1.field;", "Cannot get property, not an instance");
    }

    #[test]
    fn test_set_on_non_instance() {
        assert_runtime_error("true.field = 1;", "Cannot set property, not an instance");
    }

    #[test]
    fn test_superclass_must_be_class() {
        assert_runtime_error("var NotAClass = 1; class B < NotAClass {}", "Superclass must be a class");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Traits
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_trait_methods_merge_into_class() {
        assert_output(
            "trait T { hello() { print \"T\"; } }
             class C { use T; }
             C().hello();",
            "T\n",
        );
    }

    #[test]
    fn test_class_wins_over_trait() {
        assert_output(
            "trait T { m() { print \"trait\"; } }
             class C {
               use T;
               m() { print \"class\"; }
             }
             C().m();",
            "class\n",
        );
    }

    #[test]
    fn test_duplicate_trait_methods_conflict() {
        assert_runtime_error(
            "trait T1 { m() { print 1; } }
             trait T2 { m() { print 2; } }
             class C { use T1, T2; }",
            "A previously used trait already provides method 'm'",
        );
    }

    #[test]
    fn test_trait_can_use_trait() {
        assert_output(
            "trait A { hello() { print \"A\"; } }
             trait B { use A; world() { print \"B\"; } }
             class C { use B; }
             C().hello();
             C().world();",
            "A\nB\n",
        );
    }

    #[test]
    fn test_trait_member_clashing_with_used_trait_is_error() {
        assert_runtime_error(
            "trait A { m() { print 1; } }
             trait B { use A; m() { print 2; } }",
            "A previously used trait already provides method 'm'",
        );
    }

    #[test]
    fn test_trait_class_methods_merge() {
        assert_output(
            "trait T { class make() { return \"made\"; } }
             class C { use T; }
             print C.make();",
            "made\n",
        );
    }

    #[test]
    fn test_using_non_trait_is_error() {
        assert_runtime_error(
            "class A {} class C { use A; }",
            "'A' is not a trait",
        );
    }

    #[test]
    fn test_trait_methods_see_this_of_consumer() {
        assert_output(
            "trait Named {
               describe() { print this.name; }
             }
             class Person {
               use Named;
               init(name) { this.name = name; }
             }
             Person(\"ada\").describe();",
            "ada\n",
        );
    }

    #[test]
    fn test_trait_is_not_callable() {
        assert_runtime_error(
            "trait T { m() { return 1; } } T();",
            "Can only call functions and classes",
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Driver behaviour
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_globals_survive_across_runs() {
        use lox::lox::Lox;

        let buffer: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let sink: Rc<RefCell<dyn Write>> = buffer.clone();

        let mut driver = Lox::with_output(sink);

        driver.run("var a = 40;");
        driver.run("print a + 2;");

        assert!(!driver.had_error());
        assert!(!driver.had_runtime_error());

        let output = String::from_utf8(buffer.borrow().clone()).expect("utf8");
        assert_eq!(output, "42\n");
    }

    #[test]
    fn test_closures_survive_across_runs() {
        use lox::lox::Lox;

        let buffer: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let sink: Rc<RefCell<dyn Write>> = buffer.clone();

        let mut driver = Lox::with_output(sink);

        driver.run("fun make() { var c = 0; fun inc() { c = c + 1; return c; } return inc; }");
        driver.run("var f = make();");
        driver.run("print f();");
        driver.run("print f();");

        assert!(!driver.had_error());
        assert!(!driver.had_runtime_error());

        let output = String::from_utf8(buffer.borrow().clone()).expect("utf8");
        assert_eq!(output, "1\n2\n");
    }

    #[test]
    fn test_static_error_sets_flag_and_skips_execution() {
        use lox::lox::Lox;

        let buffer: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let sink: Rc<RefCell<dyn Write>> = buffer.clone();

        let mut driver = Lox::with_output(sink);

        driver.run("print \"before\"; return 1;");

        assert!(driver.had_error());
        assert!(!driver.had_runtime_error());

        // Resolution failed, so nothing ran.
        assert!(buffer.borrow().is_empty());
    }

    #[test]
    fn test_runtime_error_sets_flag() {
        use lox::lox::Lox;

        let buffer: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let sink: Rc<RefCell<dyn Write>> = buffer.clone();

        let mut driver = Lox::with_output(sink);

        driver.run("print 1 / 0;");

        assert!(!driver.had_error());
        assert!(driver.had_runtime_error());
    }
}
