//! Syntax tree produced by the parsing machine
//!
//! Nodes live in an arena owned by [`Ast`]; parent links are plain indices, so
//! the tree has a single owner and no reference cycles. Navigation goes
//! through the borrowed [`AstNode`] handle.
//!
//! The arena is filled in pre-order, so comparing two [`NodeId`]s of the same
//! tree compares their position in the source.

use crate::compiler::CompiledGrammar;
use crate::grammar::GrammarRuleKey;
use crate::parse_context::RawNode;
use crate::select::AstSelect;
use crate::token::{Token, TokenType};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Type of a node: the token it wraps or the rule that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AstNodeType {
    Token(&'static TokenType),
    Rule(GrammarRuleKey),
}

impl From<&'static TokenType> for AstNodeType {
    fn from(token_type: &'static TokenType) -> Self {
        AstNodeType::Token(token_type)
    }
}

impl From<GrammarRuleKey> for AstNodeType {
    fn from(key: GrammarRuleKey) -> Self {
        AstNodeType::Rule(key)
    }
}

/// Selects nodes by type
pub trait NodeTypeFilter {
    fn accepts(&self, node_type: AstNodeType) -> bool;
}

impl NodeTypeFilter for AstNodeType {
    fn accepts(&self, node_type: AstNodeType) -> bool {
        *self == node_type
    }
}

impl NodeTypeFilter for GrammarRuleKey {
    fn accepts(&self, node_type: AstNodeType) -> bool {
        AstNodeType::Rule(*self) == node_type
    }
}

impl NodeTypeFilter for &'static TokenType {
    fn accepts(&self, node_type: AstNodeType) -> bool {
        AstNodeType::Token(self) == node_type
    }
}

impl NodeTypeFilter for &[AstNodeType] {
    fn accepts(&self, node_type: AstNodeType) -> bool {
        self.contains(&node_type)
    }
}

impl<const N: usize> NodeTypeFilter for [AstNodeType; N] {
    fn accepts(&self, node_type: AstNodeType) -> bool {
        self.contains(&node_type)
    }
}

impl NodeTypeFilter for Vec<AstNodeType> {
    fn accepts(&self, node_type: AstNodeType) -> bool {
        self.contains(&node_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
struct NodeData {
    node_type: AstNodeType,
    name: Arc<str>,
    token: Option<usize>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    child_index: usize,
    /// Indices of the tokens covered by the node
    tokens: Range<usize>,
    recovered: bool,
}

/// A parsed tree together with the tokens it refers to
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    nodes: Vec<NodeData>,
    tokens: Arc<[Token]>,
}

impl Ast {
    /// Convert the machine's result into an arena.
    ///
    /// Works from an explicit stack, so the depth of the tree is bounded by
    /// memory rather than by the native stack.
    pub(crate) fn build(root: &RawNode, tokens: Arc<[Token]>, grammar: &CompiledGrammar) -> Ast {
        let mut ast = Ast {
            nodes: Vec::new(),
            tokens,
        };
        // Siblings are pushed in reverse so they come off the stack in order
        let mut stack: Vec<(&RawNode, Option<NodeId>, usize)> = vec![(root, None, 0)];
        while let Some((raw, parent, child_index)) = stack.pop() {
            let id = ast.push(raw, parent, child_index, grammar);
            if let Some(parent) = parent {
                ast.nodes[parent.0].children.push(id);
            }
            if let RawNode::Rule(rule) = raw {
                ast.nodes[id.0].children.reserve_exact(rule.children.len());
                stack.extend(
                    rule.children
                        .iter()
                        .enumerate()
                        .rev()
                        .map(|(i, child)| (child, Some(id), i)),
                );
            }
        }
        ast
    }

    fn push(
        &mut self,
        raw: &RawNode,
        parent: Option<NodeId>,
        child_index: usize,
        grammar: &CompiledGrammar,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let data = match raw {
            RawNode::Token(index) => {
                let token_type = self.tokens[*index].token_type();
                NodeData {
                    node_type: AstNodeType::Token(token_type),
                    name: Arc::from(token_type.name()),
                    token: Some(*index),
                    children: Vec::new(),
                    parent,
                    child_index,
                    tokens: *index..*index + 1,
                    recovered: false,
                }
            }
            RawNode::Rule(rule) => NodeData {
                node_type: AstNodeType::Rule(rule.rule),
                name: grammar.rule(rule.rule).shared_name(),
                token: (rule.from < rule.to).then_some(rule.from),
                children: Vec::new(),
                parent,
                child_index,
                tokens: rule.from..rule.to,
                recovered: grammar.rule(rule.rule).is_recovery(),
            },
        };
        self.nodes.push(data);
        id
    }

    pub fn root(&self) -> AstNode<'_> {
        AstNode {
            ast: self,
            id: NodeId(0),
        }
    }

    pub fn node(&self, id: NodeId) -> AstNode<'_> {
        AstNode { ast: self, id }
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All tokens of the parsed stream, EOF included
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// All nodes in pre-order
    pub fn iter(&self) -> impl Iterator<Item = AstNode<'_>> + '_ {
        (0..self.nodes.len()).map(move |i| self.node(NodeId(i)))
    }
}

/// Borrowed handle on a node of an [`Ast`]
#[derive(Clone, Copy)]
pub struct AstNode<'a> {
    ast: &'a Ast,
    id: NodeId,
}

impl<'a> AstNode<'a> {
    fn data(&self) -> &'a NodeData {
        &self.ast.nodes[self.id.0]
    }

    fn wrap(&self, id: NodeId) -> AstNode<'a> {
        AstNode { ast: self.ast, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn ast(&self) -> &'a Ast {
        self.ast
    }

    pub fn node_type(&self) -> AstNodeType {
        self.data().node_type
    }

    /// Rule name or token type name
    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    pub fn is(&self, filter: impl NodeTypeFilter) -> bool {
        filter.accepts(self.node_type())
    }

    pub fn rule_key(&self) -> Option<GrammarRuleKey> {
        match self.node_type() {
            AstNodeType::Rule(key) => Some(key),
            AstNodeType::Token(_) => None,
        }
    }

    /// Token of a leaf, or first token of a rule node
    pub fn token(&self) -> Option<&'a Token> {
        self.data().token.map(|i| &self.ast.tokens[i])
    }

    pub fn has_token(&self) -> bool {
        self.data().token.is_some()
    }

    pub fn token_value(&self) -> &'a str {
        self.token().map_or("", Token::value)
    }

    pub fn token_original_value(&self) -> &'a str {
        self.token().map_or("", Token::original_value)
    }

    pub fn token_line(&self) -> usize {
        self.token().map_or(0, Token::line)
    }

    pub fn token_column(&self) -> usize {
        self.token().map_or(0, Token::column)
    }

    /// Index of the first token covered by the node
    pub fn from_index(&self) -> usize {
        self.data().tokens.start
    }

    /// Index after the last token covered by the node
    pub fn to_index(&self) -> usize {
        self.data().tokens.end
    }

    /// Tokens covered by the node
    pub fn tokens(&self) -> &'a [Token] {
        &self.ast.tokens[self.data().tokens.clone()]
    }

    pub fn last_token(&self) -> Option<&'a Token> {
        self.tokens().last()
    }

    /// Whether the node was created by a rule flagged for error recovery
    pub fn is_recovered(&self) -> bool {
        self.data().recovered
    }

    pub fn children(&self) -> impl DoubleEndedIterator<Item = AstNode<'a>> + ExactSizeIterator + 'a {
        let ast = self.ast;
        self.data()
            .children
            .iter()
            .map(move |id| AstNode { ast, id: *id })
    }

    pub fn children_of(&self, filter: impl NodeTypeFilter) -> Vec<AstNode<'a>> {
        self.children().filter(|c| c.is(&filter)).collect()
    }

    pub fn number_of_children(&self) -> usize {
        self.data().children.len()
    }

    pub fn has_children(&self) -> bool {
        !self.data().children.is_empty()
    }

    pub fn has_direct_children(&self, filter: impl NodeTypeFilter) -> bool {
        self.children().any(|c| c.is(&filter))
    }

    pub fn first_child(&self) -> Option<AstNode<'a>> {
        self.children().next()
    }

    pub fn first_child_of(&self, filter: impl NodeTypeFilter) -> Option<AstNode<'a>> {
        self.children().find(|c| c.is(&filter))
    }

    pub fn last_child(&self) -> Option<AstNode<'a>> {
        self.children().next_back()
    }

    pub fn last_child_of(&self, filter: impl NodeTypeFilter) -> Option<AstNode<'a>> {
        self.children().rev().find(|c| c.is(&filter))
    }

    pub fn parent(&self) -> Option<AstNode<'a>> {
        self.data().parent.map(|id| self.wrap(id))
    }

    pub fn has_parent(&self) -> bool {
        self.data().parent.is_some()
    }

    /// Position among the parent's children
    pub fn child_index(&self) -> usize {
        self.data().child_index
    }

    pub fn next_sibling(&self) -> Option<AstNode<'a>> {
        let parent = self.parent()?;
        let next = *parent.data().children.get(self.child_index() + 1)?;
        Some(self.wrap(next))
    }

    pub fn previous_sibling(&self) -> Option<AstNode<'a>> {
        let parent = self.parent()?;
        let index = self.child_index().checked_sub(1)?;
        Some(self.wrap(parent.data().children[index]))
    }

    /// Next sibling, or the next sibling of the closest ancestor that has one
    pub fn next_ast_node(&self) -> Option<AstNode<'a>> {
        let mut node = *self;
        loop {
            if let Some(next) = node.next_sibling() {
                return Some(next);
            }
            node = node.parent()?;
        }
    }

    /// Previous sibling, or the previous sibling of the closest ancestor that has one
    pub fn previous_ast_node(&self) -> Option<AstNode<'a>> {
        let mut node = *self;
        loop {
            if let Some(previous) = node.previous_sibling() {
                return Some(previous);
            }
            node = node.parent()?;
        }
    }

    /// All descendants in pre-order, this node excluded
    pub fn descendants(&self) -> Vec<AstNode<'a>> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.data().children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            result.push(self.wrap(id));
            stack.extend(self.ast.nodes[id.0].children.iter().rev());
        }
        result
    }

    pub fn descendants_of(&self, filter: impl NodeTypeFilter) -> Vec<AstNode<'a>> {
        self.descendants()
            .into_iter()
            .filter(|d| d.is(&filter))
            .collect()
    }

    /// First matching descendant in pre-order
    pub fn first_descendant(&self, filter: impl NodeTypeFilter) -> Option<AstNode<'a>> {
        let mut stack: Vec<NodeId> = self.data().children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = self.wrap(id);
            if node.is(&filter) {
                return Some(node);
            }
            stack.extend(self.ast.nodes[id.0].children.iter().rev());
        }
        None
    }

    pub fn has_descendant(&self, filter: impl NodeTypeFilter) -> bool {
        self.first_descendant(filter).is_some()
    }

    pub fn ancestors(&self) -> impl Iterator<Item = AstNode<'a>> + 'a {
        std::iter::successors(self.parent(), |node| node.parent())
    }

    /// Closest matching ancestor, this node excluded
    pub fn first_ancestor(&self, filter: impl NodeTypeFilter) -> Option<AstNode<'a>> {
        self.ancestors().find(|a| a.is(&filter))
    }

    pub fn has_ancestor(&self, filter: impl NodeTypeFilter) -> bool {
        self.first_ancestor(filter).is_some()
    }

    /// Selection containing only this node
    pub fn select(&self) -> AstSelect<'a> {
        AstSelect::from(vec![*self])
    }
}

impl<T: NodeTypeFilter> NodeTypeFilter for &T {
    fn accepts(&self, node_type: AstNodeType) -> bool {
        (**self).accepts(node_type)
    }
}

impl PartialEq for AstNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.ast, other.ast) && self.id == other.id
    }
}

impl Eq for AstNode<'_> {}

impl std::hash::Hash for AstNode<'_> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for AstNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AstNode({}", self.name())?;
        if let Some(token) = self.token() {
            write!(f, " {:?} {}:{}", token.value(), token.line(), token.column())?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for AstNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if let Some(token) = self.token() {
            write!(f, " tokenValue='{}' tokenLine={} tokenColumn={}", token.value(), token.line(), token.column())?;
        }
        Ok(())
    }
}
