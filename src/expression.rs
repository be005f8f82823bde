//! Parsing expressions
//!
//! Rules are built from combinators rather than parsed from a grammar text:
//!
//! ```
//! use lexpeg::expression::optional;
//! use lexpeg::{first_of, seq, GrammarBuilder};
//! use lexpeg::cfamily::NUMBER;
//!
//! let mut g = GrammarBuilder::new();
//! let expr = g.rule("Expr");
//! g.define(expr, seq![&NUMBER, optional(seq![first_of!["+", "-"], &NUMBER])]).unwrap();
//! ```

use crate::grammar::GrammarRuleKey;
use crate::token::{self, Token, TokenType};
use std::fmt;

/// What a terminal accepts
#[derive(Debug, Clone, PartialEq)]
pub enum TokenMatcher {
    /// A token of the given type
    Type(&'static TokenType),
    /// A token with the given value
    Value(String),
    /// Any token but EOF
    Any,
    /// A token of one of the given types
    OneOf(Vec<&'static TokenType>),
    /// A balanced `from ... to` pair, nested pairs included
    Bridge {
        from: &'static TokenType,
        to: &'static TokenType,
    },
}

impl TokenMatcher {
    /// Number of tokens matched at `position`, if any
    pub fn matches(&self, tokens: &[Token], position: usize) -> Option<usize> {
        let token = tokens.get(position)?;
        let matched = match self {
            TokenMatcher::Type(t) => token.is(t),
            TokenMatcher::Value(v) => token.value() == v,
            TokenMatcher::Any => !token.is(&token::EOF),
            TokenMatcher::OneOf(types) => types.iter().any(|t| token.is(t)),
            TokenMatcher::Bridge { from, to } => {
                return Self::bridge_len(tokens, position, from, to)
            }
        };
        matched.then_some(1)
    }

    fn bridge_len(
        tokens: &[Token],
        position: usize,
        from: &TokenType,
        to: &TokenType,
    ) -> Option<usize> {
        if !tokens.get(position)?.is(from) {
            return None;
        }
        let mut depth = 0usize;
        for (offset, token) in tokens[position..].iter().enumerate() {
            if token.is(from) {
                depth += 1;
            } else if token.is(to) {
                depth -= 1;
                if depth == 0 {
                    return Some(offset + 1);
                }
            } else if token.is(&token::EOF) {
                return None;
            }
        }
        None
    }

    /// Description used in "expected ..." messages
    pub fn describe(&self) -> String {
        match self {
            TokenMatcher::Type(t) => t.describe(),
            TokenMatcher::Value(v) => format!("\"{}\"", v),
            TokenMatcher::Any => "any token".to_string(),
            TokenMatcher::OneOf(types) => types
                .iter()
                .map(|t| t.describe())
                .collect::<Vec<_>>()
                .join(" or "),
            TokenMatcher::Bridge { from, .. } => from.describe(),
        }
    }
}

impl fmt::Display for TokenMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenMatcher::Bridge { from, to } => write!(f, "bridge({}, {})", from, to),
            TokenMatcher::OneOf(types) => {
                let names: Vec<&str> = types.iter().map(|t| t.name()).collect();
                write!(f, "oneOf({})", names.join(", "))
            }
            TokenMatcher::Type(t) => f.write_str(t.name()),
            other => f.write_str(&other.describe()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsingExpression {
    Terminal(TokenMatcher),
    RuleRef(GrammarRuleKey),
    Sequence(Vec<ParsingExpression>),
    /// Ordered choice: the first alternative that matches wins
    FirstOf(Vec<ParsingExpression>),
    ZeroOrMore(Box<ParsingExpression>),
    OneOrMore(Box<ParsingExpression>),
    Optional(Box<ParsingExpression>),
    /// Negative lookahead, never consumes input
    Not(Box<ParsingExpression>),
    /// Positive lookahead, never consumes input
    And(Box<ParsingExpression>),
    /// Always fails
    Nothing,
}

impl ParsingExpression {
    /// Rules referenced anywhere in this expression, in order of appearance
    pub fn referenced_rules(&self) -> Vec<GrammarRuleKey> {
        let mut rules = Vec::new();
        self.collect_rules(&mut rules);
        rules
    }

    fn collect_rules(&self, rules: &mut Vec<GrammarRuleKey>) {
        match self {
            ParsingExpression::RuleRef(key) => rules.push(*key),
            ParsingExpression::Sequence(items) | ParsingExpression::FirstOf(items) => {
                items.iter().for_each(|e| e.collect_rules(rules))
            }
            ParsingExpression::ZeroOrMore(e)
            | ParsingExpression::OneOrMore(e)
            | ParsingExpression::Optional(e)
            | ParsingExpression::Not(e)
            | ParsingExpression::And(e) => e.collect_rules(rules),
            ParsingExpression::Terminal(_) | ParsingExpression::Nothing => {}
        }
    }
}

impl From<&'static TokenType> for ParsingExpression {
    fn from(token_type: &'static TokenType) -> Self {
        ParsingExpression::Terminal(TokenMatcher::Type(token_type))
    }
}

impl From<&str> for ParsingExpression {
    fn from(value: &str) -> Self {
        ParsingExpression::Terminal(TokenMatcher::Value(value.to_string()))
    }
}

impl From<GrammarRuleKey> for ParsingExpression {
    fn from(key: GrammarRuleKey) -> Self {
        ParsingExpression::RuleRef(key)
    }
}

impl From<TokenMatcher> for ParsingExpression {
    fn from(matcher: TokenMatcher) -> Self {
        ParsingExpression::Terminal(matcher)
    }
}

/// Sequence of expressions; a single expression is returned as is
pub fn sequence(items: Vec<ParsingExpression>) -> ParsingExpression {
    match <[ParsingExpression; 1]>::try_from(items) {
        Ok([single]) => single,
        Err(items) => ParsingExpression::Sequence(items),
    }
}

/// Ordered choice; a single alternative is returned as is
pub fn first_of(alternatives: Vec<ParsingExpression>) -> ParsingExpression {
    match <[ParsingExpression; 1]>::try_from(alternatives) {
        Ok([single]) => single,
        Err(alternatives) => ParsingExpression::FirstOf(alternatives),
    }
}

pub fn zero_or_more(e: impl Into<ParsingExpression>) -> ParsingExpression {
    ParsingExpression::ZeroOrMore(Box::new(e.into()))
}

pub fn one_or_more(e: impl Into<ParsingExpression>) -> ParsingExpression {
    ParsingExpression::OneOrMore(Box::new(e.into()))
}

pub fn optional(e: impl Into<ParsingExpression>) -> ParsingExpression {
    ParsingExpression::Optional(Box::new(e.into()))
}

pub fn not(e: impl Into<ParsingExpression>) -> ParsingExpression {
    ParsingExpression::Not(Box::new(e.into()))
}

pub fn and(e: impl Into<ParsingExpression>) -> ParsingExpression {
    ParsingExpression::And(Box::new(e.into()))
}

pub fn nothing() -> ParsingExpression {
    ParsingExpression::Nothing
}

pub fn token(token_type: &'static TokenType) -> ParsingExpression {
    token_type.into()
}

pub fn value(text: &str) -> ParsingExpression {
    text.into()
}

/// Any token except EOF
pub fn any_token() -> ParsingExpression {
    TokenMatcher::Any.into()
}

pub fn one_of(types: &[&'static TokenType]) -> ParsingExpression {
    TokenMatcher::OneOf(types.to_vec()).into()
}

pub fn bridge(from: &'static TokenType, to: &'static TokenType) -> ParsingExpression {
    TokenMatcher::Bridge { from, to }.into()
}

/// Any token that does not start a match of `e`
pub fn any_token_but_not(e: impl Into<ParsingExpression>) -> ParsingExpression {
    sequence(vec![not(e), any_token()])
}

/// Everything up to and including the first match of `e`
pub fn till(e: impl Into<ParsingExpression>) -> ParsingExpression {
    let e = e.into();
    sequence(vec![zero_or_more(any_token_but_not(e.clone())), e])
}

/// Everything up to, but excluding, the first match of any of `stops`
pub fn exclusive_till(stops: Vec<ParsingExpression>) -> ParsingExpression {
    zero_or_more(any_token_but_not(first_of(stops)))
}

/// Build a sequence from anything convertible into an expression
#[macro_export]
macro_rules! seq {
    ($($e:expr),+ $(,)?) => {
        $crate::expression::sequence(vec![$($crate::expression::ParsingExpression::from($e)),+])
    };
}

/// Build an ordered choice from anything convertible into an expression
#[macro_export]
macro_rules! first_of {
    ($($e:expr),+ $(,)?) => {
        $crate::expression::first_of(vec![$($crate::expression::ParsingExpression::from($e)),+])
    };
}
