//! MiniC: a small C-like language
//!
//! A complete grammar written against the public builder API, used by the
//! integration tests and the `lexpeg` command-line tool. Rule names are the
//! upper-case element names seen in XML dumps and XPath queries
//! (`COMPILATION_UNIT`, `DEFINITION`, `FUNCTION_DEFINITION`, ...).
//!
//! The `BIN_*` rules wrap a single token and exist so that consumers can tell
//! a declared name from a referenced one. Expression rules collapse when they
//! have a single child, so `a = 1` yields one `ASSIGNMENT_EXPRESSION` and no
//! chain of intermediate nodes.

use crate::cfamily::{self, keyword, punctuator, NUMBER};
use crate::error::GrammarError;
use crate::expression::{one_or_more, optional, zero_or_more};
use crate::grammar::{Grammar, GrammarBuilder};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::recovery;
use crate::token::{EOF, IDENTIFIER};
use crate::{first_of, seq};

/// Name of the rule that absorbs unparsable top-level input
pub const RECOVERED_DEFINITION: &str = "RECOVERED_DEFINITION";

/// Build the MiniC grammar.
///
/// With `recover` set, top-level input that is not a definition is consumed
/// by `RECOVERED_DEFINITION` up to the next definition, instead of failing
/// the whole parse.
pub fn grammar(recover: bool) -> Result<Grammar, GrammarError> {
    let mut g = GrammarBuilder::new();

    let bin_type = g.rule("BIN_TYPE");
    let bin_function_definition = g.rule("BIN_FUNCTION_DEFINITION");
    let bin_parameter = g.rule("BIN_PARAMETER");
    let bin_variable_definition = g.rule("BIN_VARIABLE_DEFINITION");
    let bin_function_reference = g.rule("BIN_FUNCTION_REFERENCE");
    let bin_variable_reference = g.rule("BIN_VARIABLE_REFERENCE");
    let compilation_unit = g.rule("COMPILATION_UNIT");
    let definition = g.rule("DEFINITION");
    let recovered_definition = g.rule(RECOVERED_DEFINITION);
    let struct_definition = g.rule("STRUCT_DEFINITION");
    let struct_member = g.rule("STRUCT_MEMBER");
    let function_definition = g.rule("FUNCTION_DEFINITION");
    let variable_definition = g.rule("VARIABLE_DEFINITION");
    let parameters_list = g.rule("PARAMETERS_LIST");
    let parameter_declaration = g.rule("PARAMETER_DECLARATION");
    let compound_statement = g.rule("COMPOUND_STATEMENT");
    let variable_initializer = g.rule("VARIABLE_INITIALIZER");
    let argument_expression_list = g.rule("ARGUMENT_EXPRESSION_LIST");
    let statement = g.rule("STATEMENT");
    let expression_statement = g.rule("EXPRESSION_STATEMENT");
    let return_statement = g.rule("RETURN_STATEMENT");
    let continue_statement = g.rule("CONTINUE_STATEMENT");
    let break_statement = g.rule("BREAK_STATEMENT");
    let if_statement = g.rule("IF_STATEMENT");
    let while_statement = g.rule("WHILE_STATEMENT");
    let condition_clause = g.rule("CONDITION_CLAUSE");
    let else_clause = g.rule("ELSE_CLAUSE");
    let no_complexity_statement = g.rule("NO_COMPLEXITY_STATEMENT");
    let expression = g.rule("EXPRESSION");
    let assignment_expression = g.rule("ASSIGNMENT_EXPRESSION");
    let relational_expression = g.rule("RELATIONAL_EXPRESSION");
    let relational_operator = g.rule("RELATIONAL_OPERATOR");
    let additive_expression = g.rule("ADDITIVE_EXPRESSION");
    let additive_operator = g.rule("ADDITIVE_OPERATOR");
    let multiplicative_expression = g.rule("MULTIPLICATIVE_EXPRESSION");
    let multiplicative_operator = g.rule("MULTIPLICATIVE_OPERATOR");
    let unary_expression = g.rule("UNARY_EXPRESSION");
    let unary_operator = g.rule("UNARY_OPERATOR");
    let postfix_expression = g.rule("POSTFIX_EXPRESSION");
    let postfix_operator = g.rule("POSTFIX_OPERATOR");
    let primary_expression = g.rule("PRIMARY_EXPRESSION");

    // Bins
    g.define(bin_type, first_of![&keyword::INT, &keyword::VOID])?;
    g.define(bin_parameter, &IDENTIFIER)?;
    g.define(bin_function_definition, &IDENTIFIER)?;
    g.define(bin_variable_definition, &IDENTIFIER)?;
    g.define(bin_function_reference, &IDENTIFIER)?;
    g.define(bin_variable_reference, &IDENTIFIER)?;

    // Definitions
    if recover {
        g.define(
            compilation_unit,
            seq![zero_or_more(first_of![definition, recovered_definition]), &EOF],
        )?;
        g.define(
            recovered_definition,
            recovery::skip_to(first_of![definition, &EOF]),
        )?
        .recovery();
    } else {
        g.define(compilation_unit, seq![zero_or_more(definition), &EOF])?;
    }
    g.define(
        definition,
        first_of![struct_definition, function_definition, variable_definition],
    )?;
    g.define(
        struct_definition,
        seq![
            &keyword::STRUCT,
            &IDENTIFIER,
            &punctuator::LBRACE,
            one_or_more(seq![struct_member, &punctuator::SEMICOLON]),
            &punctuator::RBRACE
        ],
    )?;
    g.define(struct_member, seq![bin_type, &IDENTIFIER])?;
    g.define(
        function_definition,
        seq![
            bin_type,
            bin_function_definition,
            &punctuator::LPAREN,
            optional(parameters_list),
            &punctuator::RPAREN,
            compound_statement
        ],
    )?;
    g.define(
        variable_definition,
        seq![
            bin_type,
            bin_variable_definition,
            optional(variable_initializer),
            &punctuator::SEMICOLON
        ],
    )?;
    g.define(
        parameters_list,
        seq![
            parameter_declaration,
            zero_or_more(seq![&punctuator::COMMA, parameter_declaration])
        ],
    )?;
    g.define(parameter_declaration, seq![bin_type, bin_parameter])?;
    g.define(
        compound_statement,
        seq![
            &punctuator::LBRACE,
            zero_or_more(variable_definition),
            zero_or_more(statement),
            &punctuator::RBRACE
        ],
    )?;
    g.define(variable_initializer, seq![&punctuator::ASSIGN, expression])?;
    g.define(
        argument_expression_list,
        seq![expression, zero_or_more(seq![&punctuator::COMMA, expression])],
    )?;

    // Statements
    g.define(
        statement,
        first_of![
            expression_statement,
            compound_statement,
            return_statement,
            continue_statement,
            break_statement,
            if_statement,
            while_statement,
            no_complexity_statement
        ],
    )?;
    g.define(expression_statement, seq![expression, &punctuator::SEMICOLON])?;
    g.define(
        return_statement,
        seq![&keyword::RETURN, expression, &punctuator::SEMICOLON],
    )?;
    g.define(
        continue_statement,
        seq![&keyword::CONTINUE, &punctuator::SEMICOLON],
    )?;
    g.define(break_statement, seq![&keyword::BREAK, &punctuator::SEMICOLON])?;
    g.define(
        if_statement,
        seq![&keyword::IF, condition_clause, statement, optional(else_clause)],
    )?;
    g.define(
        while_statement,
        seq![&keyword::WHILE, condition_clause, statement],
    )?;
    g.define(
        condition_clause,
        seq![&punctuator::LPAREN, expression, &punctuator::RPAREN],
    )?;
    g.define(else_clause, seq![&keyword::ELSE, statement])?;
    g.define(no_complexity_statement, seq!["nocomplexity", statement])?;

    // Expressions
    g.define(expression, assignment_expression)?;
    g.define(
        assignment_expression,
        seq![
            relational_expression,
            optional(seq![&punctuator::ASSIGN, relational_expression])
        ],
    )?
    .skip_if_one_child();
    g.define(
        relational_expression,
        seq![
            additive_expression,
            optional(seq![relational_operator, relational_expression])
        ],
    )?
    .skip_if_one_child();
    g.define(
        relational_operator,
        first_of![
            &punctuator::EQ,
            &punctuator::NE,
            &punctuator::LT,
            &punctuator::LE,
            &punctuator::GT,
            &punctuator::GE
        ],
    )?;
    g.define(
        additive_expression,
        seq![
            multiplicative_expression,
            optional(seq![additive_operator, additive_expression])
        ],
    )?
    .skip_if_one_child();
    g.define(
        additive_operator,
        first_of![&punctuator::PLUS, &punctuator::MINUS],
    )?;
    g.define(
        multiplicative_expression,
        seq![
            unary_expression,
            optional(seq![multiplicative_operator, multiplicative_expression])
        ],
    )?
    .skip_if_one_child();
    g.define(
        multiplicative_operator,
        first_of![&punctuator::STAR, &punctuator::DIV],
    )?;
    g.define(
        unary_expression,
        first_of![seq![unary_operator, primary_expression], postfix_expression],
    )?
    .skip_if_one_child();
    g.define(
        unary_operator,
        first_of![&punctuator::INCREMENT, &punctuator::DECREMENT],
    )?;
    g.define(
        postfix_expression,
        first_of![
            seq![primary_expression, postfix_operator],
            seq![
                bin_function_reference,
                &punctuator::LPAREN,
                optional(argument_expression_list),
                &punctuator::RPAREN
            ],
            primary_expression
        ],
    )?
    .skip_if_one_child();
    g.define(
        postfix_operator,
        first_of![&punctuator::INCREMENT, &punctuator::DECREMENT],
    )?;
    g.define(
        primary_expression,
        first_of![
            &NUMBER,
            bin_variable_reference,
            seq![&punctuator::LPAREN, expression, &punctuator::RPAREN]
        ],
    )?;

    g.set_root(compilation_unit);
    Ok(g.build())
}

/// The standard C-family lexer
pub fn lexer() -> Lexer {
    cfamily::lexer()
}

/// Parser for MiniC sources
pub fn parser(recover: bool) -> Result<Parser, GrammarError> {
    Ok(Parser::new(lexer(), grammar(recover)?.compile()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(parser: &Parser, text: &str) -> Vec<String> {
        let outcome = parser.parse_str(text).unwrap();
        outcome
            .ast
            .root()
            .children()
            .map(|c| c.name().to_string())
            .collect()
    }

    #[test]
    fn test_grammar_compiles() {
        let grammar = grammar(false).unwrap();
        let compiled = grammar.compile().unwrap();
        assert_eq!(compiled.rule(compiled.root()).name(), "COMPILATION_UNIT");
        assert!(compiled.rule_by_name(RECOVERED_DEFINITION).is_some());
    }

    #[test]
    fn test_definitions() {
        let parser = parser(false).unwrap();
        let text = "struct point { int x; int y; };\nint count = 0;\nvoid main() { }";
        // The struct definition is followed by a stray ';', which is not a definition
        assert!(parser.parse_str(text).is_err());

        let text = "struct point { int x; int y; }\nint count = 0;\nvoid main() { }";
        assert_eq!(names(&parser, text), vec!["DEFINITION", "DEFINITION", "DEFINITION", "EOF"]);
    }

    #[test]
    fn test_statements_and_expressions() {
        let parser = parser(false).unwrap();
        let text = "int f(int a, int b) {\n  int c;\n  c = a + b * 2;\n  if (c > 10) return c; else { c++; }\n  while (c) nocomplexity c--;\n  return f(c, 1);\n}";
        let outcome = parser.parse_str(text).unwrap();
        let ast = &outcome.ast;
        let kinds: Vec<&str> = ast.iter().map(|n| n.name()).collect();
        for expected in [
            "FUNCTION_DEFINITION",
            "PARAMETERS_LIST",
            "IF_STATEMENT",
            "ELSE_CLAUSE",
            "WHILE_STATEMENT",
            "NO_COMPLEXITY_STATEMENT",
            "ASSIGNMENT_EXPRESSION",
            "ADDITIVE_EXPRESSION",
            "MULTIPLICATIVE_EXPRESSION",
            "POSTFIX_EXPRESSION",
            "ARGUMENT_EXPRESSION_LIST",
        ] {
            assert!(kinds.contains(&expected), "missing {expected}");
        }
        // Single-child expression rules collapse
        assert!(!kinds.contains(&"UNARY_EXPRESSION"));
    }

    #[test]
    fn test_recovery_variant() {
        let strict = parser(false).unwrap();
        let lenient = parser(true).unwrap();
        let text = "int a;\n}} garbage;\nint b;";
        assert!(strict.parse_str(text).is_err());

        let outcome = lenient.parse_str(text).unwrap();
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].rule, RECOVERED_DEFINITION);
        assert_eq!(outcome.diagnostics[0].line, 2);
        assert_eq!(outcome.diagnostics[0].skipped, 4);
        assert_eq!(
            names(&lenient, text),
            vec!["DEFINITION", RECOVERED_DEFINITION, "DEFINITION", "EOF"]
        );
    }
}
