//! lexpeg - channel lexer and packrat PEG engine for C-family sources
//!
//! Source text goes through a channel [`Lexer`] into a [`TokenStream`], which
//! a [`CompiledGrammar`] turns into an [`Ast`] on a backtracking parsing
//! machine with memoization. Trees are navigated with [`AstNode`],
//! [`AstSelect`], the [`AstWalker`] visitors or XPath queries.
//!
//! # Quick Start
//!
//! ```rust
//! use lexpeg::{cfamily, parse, seq, zero_or_more, GrammarBuilder, EOF, IDENTIFIER};
//!
//! let mut g = GrammarBuilder::new();
//! let file = g.rule("File");
//! let call = g.rule("Call");
//! g.define(file, seq![zero_or_more(call), &EOF]).unwrap();
//! g.define(call, seq![&IDENTIFIER, "(", ")", ";"]).unwrap();
//! g.set_root(file);
//! let grammar = g.build().compile().unwrap();
//!
//! let tokens = cfamily::lexer().lex("init(); run();").unwrap();
//! let ast = parse(&grammar, &tokens).unwrap();
//! assert_eq!(ast.root().children_of(call).len(), 2);
//! ```
//!
//! # Features
//!
//! - Ordered, first-match-wins lexer channels with comment trivia
//! - Grammars built from combinators, with forward references
//! - Packrat memoization and clean failure on left recursion
//! - Skip policies to keep trees shallow
//! - Error recovery through ordinary grammar rules

pub mod ast;
pub mod cfamily;
pub mod channels;
pub mod compiler;
pub mod config;
pub mod error;
pub mod expression;
pub mod grammar;
pub mod input_stream;
pub mod lexer;
pub mod machine;
pub mod minic;
pub mod parse_context;
pub mod parser;
pub mod recovery;
pub mod select;
pub mod token;
pub mod walker;
pub mod xml_node;
pub mod xpath;

// Re-export main API
pub use ast::{Ast, AstNode, AstNodeType, NodeId, NodeTypeFilter};
pub use compiler::{compile, CompiledGrammar, Instruction};
pub use config::{Config, LexerConfig, ParserConfig};
pub use error::{
    ConfigError, Error, FailureReason, GrammarError, LexError, ParseFailure, Result, XPathError,
};
pub use expression::{
    and, any_token, any_token_but_not, bridge, exclusive_till, first_of, not, nothing, one_of,
    one_or_more, optional, sequence, till, token, value, zero_or_more, ParsingExpression,
    TokenMatcher,
};
pub use grammar::{Grammar, GrammarBuilder, GrammarRuleKey, SkipPolicy};
pub use lexer::{Channel, Lexer, Preprocessor};
pub use machine::{parse, parse_with, parse_with_stats};
pub use parse_context::ParseStats;
pub use parser::{ParseOutcome, Parser};
pub use recovery::Diagnostic;
pub use select::AstSelect;
pub use token::{
    SourceRef, Token, TokenClass, TokenStream, TokenType, Trivia, TriviaKind, EOF, IDENTIFIER,
};
pub use walker::{AstVisitor, AstWalker};
pub use xpath::{TreeNavigator, XPathQuery};
