//! Visitor-driven traversal of syntax trees
//!
//! Visitors subscribe to the node types they care about and are called on
//! entry and exit of those nodes. Every token is reported once, the first
//! time a node carrying it is entered.

use crate::ast::{Ast, AstNode, AstNodeType};
use crate::token::Token;

pub trait AstVisitor {
    /// Node types for which `visit_node` and `leave_node` are called
    fn subscriptions(&self) -> Vec<AstNodeType> {
        Vec::new()
    }

    fn visit_file(&mut self, _ast: &Ast) {}

    fn visit_node(&mut self, _node: AstNode<'_>) {}

    fn visit_token(&mut self, _token: &Token) {}

    fn leave_node(&mut self, _node: AstNode<'_>) {}

    fn leave_file(&mut self, _ast: &Ast) {}
}

/// Runs a set of visitors over a tree in one pass.
///
/// Entry callbacks run in registration order, exit callbacks in reverse
/// order, so visitors nest like the nodes they observe.
pub struct AstWalker<'v> {
    visitors: Vec<&'v mut dyn AstVisitor>,
    subscriptions: Vec<Vec<AstNodeType>>,
    last_token: Option<usize>,
}

impl Default for AstWalker<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'v> AstWalker<'v> {
    pub fn new() -> Self {
        AstWalker {
            visitors: Vec::new(),
            subscriptions: Vec::new(),
            last_token: None,
        }
    }

    pub fn add_visitor(&mut self, visitor: &'v mut dyn AstVisitor) {
        self.subscriptions.push(visitor.subscriptions());
        self.visitors.push(visitor);
    }

    pub fn with_visitor(mut self, visitor: &'v mut dyn AstVisitor) -> Self {
        self.add_visitor(visitor);
        self
    }

    pub fn walk(&mut self, ast: &Ast) {
        self.last_token = None;
        for visitor in self.visitors.iter_mut() {
            visitor.visit_file(ast);
        }

        // (node, entered): a node is pushed once to enter it and once to leave it
        let mut stack = vec![(ast.root(), false)];
        while let Some((node, entered)) = stack.pop() {
            if entered {
                self.leave(node);
                continue;
            }
            self.enter(node);
            stack.push((node, true));
            let children: Vec<AstNode<'_>> = node.children().collect();
            stack.extend(children.into_iter().rev().map(|child| (child, false)));
        }

        for visitor in self.visitors.iter_mut().rev() {
            visitor.leave_file(ast);
        }
    }

    fn interested(&self, node: AstNode<'_>) -> Vec<usize> {
        let node_type = node.node_type();
        (0..self.visitors.len())
            .filter(|i| self.subscriptions[*i].contains(&node_type))
            .collect()
    }

    fn enter(&mut self, node: AstNode<'_>) {
        for i in self.interested(node) {
            self.visitors[i].visit_node(node);
        }
        if node.has_token() && self.last_token != Some(node.from_index()) {
            self.last_token = Some(node.from_index());
            if let Some(token) = node.token() {
                for visitor in self.visitors.iter_mut() {
                    visitor.visit_token(token);
                }
            }
        }
    }

    fn leave(&mut self, node: AstNode<'_>) {
        for i in self.interested(node).into_iter().rev() {
            self.visitors[i].leave_node(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfamily;
    use crate::expression::zero_or_more;
    use crate::grammar::{GrammarBuilder, GrammarRuleKey};
    use crate::seq;
    use crate::token::{EOF, IDENTIFIER};

    fn parse(text: &str) -> (Ast, GrammarRuleKey, GrammarRuleKey) {
        let mut g = GrammarBuilder::new();
        let file = g.rule("File");
        let block = g.rule("Block");
        let stmt = g.rule("Stmt");
        g.define(file, seq![zero_or_more(crate::first_of![block, stmt]), &EOF])
            .unwrap();
        g.define(block, seq!["{", zero_or_more(crate::first_of![block, stmt]), "}"])
            .unwrap();
        g.define(stmt, seq![&IDENTIFIER, ";"]).unwrap();
        g.set_root(file);
        let compiled = g.build().compile().unwrap();
        let ast = crate::machine::parse(&compiled, &cfamily::lexer().lex(text).unwrap()).unwrap();
        (ast, block, stmt)
    }

    #[derive(Default)]
    struct Counter {
        stmt: Option<GrammarRuleKey>,
        statements: usize,
        tokens: Vec<String>,
        files: usize,
    }

    impl AstVisitor for Counter {
        fn subscriptions(&self) -> Vec<AstNodeType> {
            self.stmt.map(AstNodeType::Rule).into_iter().collect()
        }

        fn visit_file(&mut self, _ast: &Ast) {
            self.files += 1;
        }

        fn visit_node(&mut self, _node: AstNode<'_>) {
            self.statements += 1;
        }

        fn visit_token(&mut self, token: &Token) {
            self.tokens.push(token.value().to_string());
        }
    }

    /// Records the maximum nesting of blocks
    struct Depth {
        block: GrammarRuleKey,
        current: usize,
        max: usize,
        events: Vec<String>,
    }

    impl AstVisitor for Depth {
        fn subscriptions(&self) -> Vec<AstNodeType> {
            vec![AstNodeType::Rule(self.block)]
        }

        fn visit_node(&mut self, _node: AstNode<'_>) {
            self.current += 1;
            self.max = self.max.max(self.current);
            self.events.push("visit".into());
        }

        fn leave_node(&mut self, _node: AstNode<'_>) {
            self.current -= 1;
            self.events.push("leave".into());
        }

        fn leave_file(&mut self, _ast: &Ast) {
            self.events.push("done".into());
        }
    }

    #[test]
    fn test_every_token_visited_once() {
        let (ast, _, stmt) = parse("a; { b; }");
        let mut counter = Counter {
            stmt: Some(stmt),
            ..Counter::default()
        };
        AstWalker::new().with_visitor(&mut counter).walk(&ast);
        assert_eq!(counter.files, 1);
        assert_eq!(counter.statements, 2);
        assert_eq!(counter.tokens, vec!["a", ";", "{", "b", ";", "}", "EOF"]);
    }

    #[test]
    fn test_subscriptions_and_nesting() {
        let (ast, block, stmt) = parse("{ { a; } } { b; }");
        let mut depth = Depth {
            block,
            current: 0,
            max: 0,
            events: Vec::new(),
        };
        let mut counter = Counter {
            stmt: Some(stmt),
            ..Counter::default()
        };
        AstWalker::new()
            .with_visitor(&mut depth)
            .with_visitor(&mut counter)
            .walk(&ast);
        assert_eq!(depth.max, 2);
        assert_eq!(depth.current, 0);
        assert_eq!(
            depth.events,
            vec!["visit", "visit", "leave", "leave", "visit", "leave", "done"]
        );
        assert_eq!(counter.statements, 2);
    }

    #[test]
    fn test_unsubscribed_visitor_sees_only_tokens() {
        let (ast, _, _) = parse("a;");
        let mut counter = Counter::default();
        AstWalker::new().with_visitor(&mut counter).walk(&ast);
        assert_eq!(counter.statements, 0);
        assert_eq!(counter.tokens.len(), 3);
    }
}
