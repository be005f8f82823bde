//! Navigation over ordered collections of nodes
//!
//! Every operation applies the single-node navigation of [`AstNode`] to each
//! member and concatenates the results in order. Nothing here fails: a query
//! with no result yields an empty selection.

use crate::ast::{AstNode, NodeTypeFilter};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AstSelect<'a> {
    nodes: Vec<AstNode<'a>>,
}

impl<'a> AstSelect<'a> {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<AstNode<'a>> {
        self.nodes.get(index).copied()
    }

    pub fn first(&self) -> Option<AstNode<'a>> {
        self.get(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = AstNode<'a>> + '_ {
        self.nodes.iter().copied()
    }

    pub fn as_slice(&self) -> &[AstNode<'a>] {
        &self.nodes
    }

    fn flat_map<I>(&self, f: impl Fn(AstNode<'a>) -> I) -> Self
    where
        I: IntoIterator<Item = AstNode<'a>>,
    {
        AstSelect {
            nodes: self.nodes.iter().flat_map(|n| f(*n)).collect(),
        }
    }

    pub fn children(&self) -> Self {
        self.flat_map(|n| n.children())
    }

    pub fn children_of(&self, filter: impl NodeTypeFilter) -> Self {
        self.flat_map(|n| n.children_of(&filter))
    }

    pub fn descendants(&self) -> Self {
        self.flat_map(|n| n.descendants())
    }

    pub fn descendants_of(&self, filter: impl NodeTypeFilter) -> Self {
        self.flat_map(|n| n.descendants_of(&filter))
    }

    pub fn parent(&self) -> Self {
        self.flat_map(|n| n.parent())
    }

    pub fn first_child(&self) -> Self {
        self.flat_map(|n| n.first_child())
    }

    pub fn first_child_of(&self, filter: impl NodeTypeFilter) -> Self {
        self.flat_map(|n| n.first_child_of(&filter))
    }

    pub fn last_child(&self) -> Self {
        self.flat_map(|n| n.last_child())
    }

    pub fn next_sibling(&self) -> Self {
        self.flat_map(|n| n.next_sibling())
    }

    pub fn previous_sibling(&self) -> Self {
        self.flat_map(|n| n.previous_sibling())
    }

    pub fn first_ancestor(&self, filter: impl NodeTypeFilter) -> Self {
        self.flat_map(|n| n.first_ancestor(&filter))
    }

    pub fn first_descendant(&self, filter: impl NodeTypeFilter) -> Self {
        self.flat_map(|n| n.first_descendant(&filter))
    }

    /// Members of the given types
    pub fn filter(&self, filter: impl NodeTypeFilter) -> Self {
        self.filter_by(|n| n.is(&filter))
    }

    pub fn filter_by(&self, predicate: impl Fn(&AstNode<'a>) -> bool) -> Self {
        AstSelect {
            nodes: self.nodes.iter().filter(|n| predicate(n)).copied().collect(),
        }
    }
}

impl<'a> From<Vec<AstNode<'a>>> for AstSelect<'a> {
    fn from(nodes: Vec<AstNode<'a>>) -> Self {
        AstSelect { nodes }
    }
}

impl<'a> FromIterator<AstNode<'a>> for AstSelect<'a> {
    fn from_iter<T: IntoIterator<Item = AstNode<'a>>>(iter: T) -> Self {
        AstSelect {
            nodes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for AstSelect<'a> {
    type Item = AstNode<'a>;
    type IntoIter = std::vec::IntoIter<AstNode<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Ast;
    use crate::cfamily::{self, punctuator, NUMBER};
    use crate::expression::{one_or_more, zero_or_more};
    use crate::grammar::{GrammarBuilder, GrammarRuleKey};
    use crate::seq;
    use crate::token::{EOF, IDENTIFIER};

    /// File := Stmt* EOF ; Stmt := IDENTIFIER "=" NUMBER+ ";"
    fn parse(text: &str) -> (Ast, GrammarRuleKey) {
        let mut g = GrammarBuilder::new();
        let file = g.rule("File");
        let stmt = g.rule("Stmt");
        g.define(file, seq![zero_or_more(stmt), &EOF]).unwrap();
        g.define(stmt, seq![&IDENTIFIER, "=", one_or_more(&NUMBER), ";"]).unwrap();
        g.set_root(file);
        let compiled = g.build().compile().unwrap();
        let tokens = cfamily::lexer().lex(text).unwrap();
        (crate::machine::parse(&compiled, &tokens).unwrap(), stmt)
    }

    #[test]
    fn test_children_of_selection() {
        let (ast, stmt) = parse("a = 1; b = 2 3;");
        let statements = ast.root().select().children_of(stmt);
        assert_eq!(statements.len(), 2);

        let numbers = statements.children_of(&NUMBER);
        let values: Vec<&str> = numbers.iter().map(|n| n.token_value()).collect();
        assert_eq!(values, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_navigation_keeps_order() {
        let (ast, stmt) = parse("a = 1; b = 2;");
        let names = ast.root().select().children_of(stmt).first_child();
        let values: Vec<&str> = names.iter().map(|n| n.token_value()).collect();
        assert_eq!(values, vec!["a", "b"]);

        let assigns = names.next_sibling();
        assert!(assigns.iter().all(|n| n.is(&punctuator::ASSIGN)));
        assert_eq!(assigns.previous_sibling(), names);
        assert_eq!(names.parent().len(), 2);
    }

    #[test]
    fn test_empty_results() {
        let (ast, stmt) = parse("");
        let none = ast.root().select().children_of(stmt);
        assert!(none.is_empty());
        assert!(none.children().is_empty());
        assert!(none.first().is_none());
        assert!(ast.root().select().parent().is_empty());
        assert!(ast.root().select().next_sibling().is_empty());
    }

    #[test]
    fn test_filters() {
        let (ast, stmt) = parse("a = 1; b = 22;");
        let all = ast.root().select().descendants();
        assert_eq!(all.filter(stmt).len(), 2);
        assert_eq!(all.filter(&NUMBER).len(), 2);
        let b = all.filter_by(|n| n.token_value() == "b");
        assert_eq!(b.len(), 2);
        assert!(b.iter().any(|n| n.is(&IDENTIFIER)));
        assert!(b.iter().any(|n| n.is(stmt)));
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let (ast, stmt) = parse("a = 1; b = 2;");
        let numbers = ast.root().select().descendants_of(&NUMBER);
        assert_eq!(numbers.first_ancestor(stmt).len(), 2);
        assert_eq!(
            ast.root().select().first_descendant(&NUMBER).first().unwrap().token_value(),
            "1"
        );
        assert_eq!(ast.root().select().last_child().first().unwrap().name(), "EOF");
    }
}
