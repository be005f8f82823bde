//! Error recovery through ordinary grammar rules
//!
//! A recovery rule consumes input the rest of the grammar could not
//! recognize, so the parse can go on after a syntax error. The machine has no
//! special handling for it: the rule is placed as the last alternative of a
//! repetition and flagged with [`RuleHandle::recovery`], and every node it
//! produces is reported afterwards as a [`Diagnostic`].
//!
//! Recovery rules must keep the default skip policy; a skipped node leaves no
//! trace to report.
//!
//! [`RuleHandle::recovery`]: crate::grammar::RuleHandle::recovery

use crate::ast::{Ast, AstNode};
use crate::expression::{any_token_but_not, one_or_more, optional, sequence, ParsingExpression};
use std::fmt;

/// One or more tokens up to a synchronization point, which is consumed too
pub fn skip_until(sync: impl Into<ParsingExpression>) -> ParsingExpression {
    let sync = sync.into();
    sequence(vec![one_or_more(any_token_but_not(sync.clone())), optional(sync)])
}

/// One or more tokens up to, but excluding, the first match of `stop`
pub fn skip_to(stop: impl Into<ParsingExpression>) -> ParsingExpression {
    one_or_more(any_token_but_not(stop))
}

/// A span of input consumed by a recovery rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Name of the recovery rule
    pub rule: String,
    pub line: usize,
    pub column: usize,
    /// Index of the first skipped token
    pub position: usize,
    /// Number of tokens consumed by the rule
    pub skipped: usize,
    /// Value of the last consumed token
    pub last_token: String,
    pub last_line: usize,
}

impl Diagnostic {
    fn from_node(node: AstNode<'_>) -> Diagnostic {
        let last = node.last_token();
        Diagnostic {
            rule: node.name().to_string(),
            line: node.token_line(),
            column: node.token_column(),
            position: node.from_index(),
            skipped: node.to_index() - node.from_index(),
            last_token: last.map(|t| t.value().to_string()).unwrap_or_default(),
            last_line: last.map_or(0, |t| t.line()),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Syntax error at line {}, column {}: skipped {} token(s) up to '{}' (line {}) [{}]",
            self.line, self.column, self.skipped, self.last_token, self.last_line, self.rule
        )
    }
}

/// Diagnostics for every recovered span of the tree, in source order.
///
/// A recovered node nested inside another recovered node is reported through
/// its outermost ancestor only.
pub fn diagnostics(ast: &Ast) -> Vec<Diagnostic> {
    ast.iter()
        .filter(|node| node.is_recovered())
        .filter(|node| !node.ancestors().any(|a| a.is_recovered()))
        .map(Diagnostic::from_node)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfamily::{self, punctuator, NUMBER};
    use crate::expression::zero_or_more;
    use crate::grammar::{GrammarBuilder, GrammarRuleKey};
    use crate::token::{EOF, IDENTIFIER};
    use crate::{first_of, seq};

    /// File := (Stmt | Recovered)* EOF
    fn parse(text: &str, recover: ParsingExpression) -> (Ast, GrammarRuleKey) {
        let mut g = GrammarBuilder::new();
        let file = g.rule("File");
        let stmt = g.rule("Stmt");
        let recovered = g.rule("Recovered");
        g.define(file, seq![zero_or_more(first_of![stmt, recovered]), &EOF])
            .unwrap();
        g.define(stmt, seq![&IDENTIFIER, "=", &NUMBER, ";"]).unwrap();
        g.define(recovered, recover).unwrap().recovery();
        g.set_root(file);
        let compiled = g.build().compile().unwrap();
        let tokens = cfamily::lexer().lex(text).unwrap();
        (crate::machine::parse(&compiled, &tokens).unwrap(), stmt)
    }

    #[test]
    fn test_skip_until_consumes_sync_token() {
        let (ast, stmt) = parse("a = 1; b = = 2; c = 3;", skip_until(&punctuator::SEMICOLON));
        assert_eq!(ast.root().children_of(stmt).len(), 2);

        let found = diagnostics(&ast);
        assert_eq!(
            found,
            vec![Diagnostic {
                rule: "Recovered".to_string(),
                line: 1,
                column: 7,
                position: 4,
                skipped: 5,
                last_token: ";".to_string(),
                last_line: 1,
            }]
        );
        assert_eq!(
            found[0].to_string(),
            "Syntax error at line 1, column 7: skipped 5 token(s) up to ';' (line 1) [Recovered]"
        );
    }

    #[test]
    fn test_skip_to_keeps_stop_token() {
        let (ast, stmt) = parse("a = 1;\n? ? x = 2;", skip_to(stmt));
        let found = diagnostics(&ast);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line, 2);
        assert_eq!(found[0].skipped, 2);
        assert_eq!(found[0].last_token, "?");
        assert_eq!(ast.root().children_of(stmt).len(), 2);
    }

    #[test]
    fn test_recovery_at_end_of_input() {
        let (ast, _) = parse("a = 1; oops", skip_until(";"));
        let found = diagnostics(&ast);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].last_token, "oops");
        assert_eq!(found[0].skipped, 1);
    }

    #[test]
    fn test_clean_input_has_no_diagnostics() {
        let (ast, _) = parse("a = 1; b = 2;", skip_until(";"));
        assert!(diagnostics(&ast).is_empty());
    }
}
