//! Backtracking parsing machine
//!
//! Executes a [`CompiledGrammar`] over a token stream. The machine keeps an
//! instruction pointer, the current token position and an explicit stack of
//! call and choice frames, so deep inputs never grow the native stack.
//!
//! Nodes of the rule being matched accumulate in one flat buffer; every frame
//! remembers the buffer length at the time it was pushed, and backtracking
//! truncates the buffer back to that mark. A rule node is created only when
//! its `Return` executes, so a partial match never leaves a node behind.

use crate::ast::Ast;
use crate::compiler::{CompiledGrammar, Instruction};
use crate::config::ParserConfig;
use crate::error::{FailureReason, ParseFailure};
use crate::grammar::GrammarRuleKey;
use crate::parse_context::{MemoEntry, ParseContext, ParseStats, RawNode, RawRule};
use crate::token::{self, Token, TokenStream};
use std::rc::Rc;
use tracing::{debug, trace};

/// Parse `tokens` with the default options
pub fn parse(grammar: &CompiledGrammar, tokens: &TokenStream) -> Result<Ast, ParseFailure> {
    parse_with(grammar, tokens, &ParserConfig::default())
}

pub fn parse_with(
    grammar: &CompiledGrammar,
    tokens: &TokenStream,
    config: &ParserConfig,
) -> Result<Ast, ParseFailure> {
    parse_with_stats(grammar, tokens, config).0
}

/// Parse and report execution statistics, whatever the outcome
pub fn parse_with_stats(
    grammar: &CompiledGrammar,
    tokens: &TokenStream,
    config: &ParserConfig,
) -> (Result<Ast, ParseFailure>, ParseStats) {
    let mut machine = Machine {
        grammar,
        program: grammar.program(),
        tokens: tokens.as_slice(),
        memoize: config.memoize,
        pc: 0,
        pos: 0,
        stack: Vec::new(),
        pending: Vec::new(),
        context: ParseContext::new(),
    };
    let result = machine
        .run()
        .map(|root| Ast::build(&root, tokens.shared(), grammar));
    let stats = machine.context.stats();

    if config.collect_stats {
        debug!(
            instructions = stats.instructions,
            backtracks = stats.backtracks,
            memo_hits = stats.memo_hits,
            memo_entries = stats.memo_entries,
            max_depth = stats.max_depth,
            "parse statistics"
        );
    }
    (result, stats)
}

#[derive(Debug)]
enum Frame {
    Call {
        rule: GrammarRuleKey,
        return_addr: usize,
        start: usize,
        mark: usize,
    },
    Choice {
        alternative: usize,
        pos: usize,
        mark: usize,
        predicate: bool,
    },
}

struct Machine<'p> {
    grammar: &'p CompiledGrammar,
    program: &'p [Instruction],
    tokens: &'p [Token],
    memoize: bool,
    pc: usize,
    pos: usize,
    stack: Vec<Frame>,
    /// Children collected for the rules on the stack
    pending: Vec<RawNode>,
    context: ParseContext,
}

impl Machine<'_> {
    fn run(&mut self) -> Result<RawNode, ParseFailure> {
        let program = self.program;
        loop {
            self.context.count_instruction();
            match &program[self.pc] {
                Instruction::Call { rule, addr } => self.call(*rule, *addr)?,
                Instruction::Return => self.ret(),
                Instruction::Choice(alternative) => {
                    self.push_choice(*alternative, false);
                }
                Instruction::PredicateChoice(alternative) => {
                    self.push_choice(*alternative, true);
                    self.context.enter_predicate();
                }
                Instruction::Commit(target) => {
                    self.pop_choice("Commit");
                    self.pc = *target;
                }
                Instruction::CommitVerify(target) => {
                    let (start, ..) = self.pop_choice("CommitVerify");
                    // An iteration that consumed nothing ends the loop
                    self.pc = if start == self.pos { self.pc + 1 } else { *target };
                }
                Instruction::BackCommit(target) => {
                    let (pos, mark, predicate) = self.pop_choice("BackCommit");
                    if predicate {
                        self.context.exit_predicate();
                    }
                    self.pos = pos;
                    self.pending.truncate(mark);
                    self.pc = *target;
                }
                Instruction::MatchToken(matcher) => {
                    match matcher.matches(self.tokens, self.pos) {
                        Some(len) => {
                            self.pending
                                .extend((self.pos..self.pos + len).map(RawNode::Token));
                            self.pos += len;
                            self.pc += 1;
                        }
                        None => {
                            self.context
                                .record_failure(self.pos, Some(matcher.describe()));
                            self.fail()?;
                        }
                    }
                }
                Instruction::Jump(target) => self.pc = *target,
                Instruction::Fail => {
                    self.context.record_failure(self.pos, None);
                    self.fail()?;
                }
                Instruction::FailTwice => {
                    let (pos, _, predicate) = self.pop_choice("FailTwice");
                    if predicate {
                        self.context.exit_predicate();
                    }
                    // The lookahead matched: the failure is where it started
                    self.pos = pos;
                    self.context.record_failure(self.pos, None);
                    self.fail()?;
                }
                Instruction::End => {
                    let Some(root) = self.pending.pop() else {
                        unreachable!("root rule returned without a node");
                    };
                    debug!(tokens = self.pos, "parse succeeded");
                    return Ok(root);
                }
            }
        }
    }

    fn memoized(&self, rule: GrammarRuleKey) -> bool {
        self.memoize && self.grammar.rule(rule).memoize()
    }

    fn push_choice(&mut self, alternative: usize, predicate: bool) {
        self.stack.push(Frame::Choice {
            alternative,
            pos: self.pos,
            mark: self.pending.len(),
            predicate,
        });
        self.pc += 1;
    }

    /// Pop the choice frame on top of the stack: (position, mark, predicate)
    fn pop_choice(&mut self, instruction: &str) -> (usize, usize, bool) {
        match self.stack.pop() {
            Some(Frame::Choice {
                pos,
                mark,
                predicate,
                ..
            }) => (pos, mark, predicate),
            frame => unreachable!("{} expects a choice frame, found {:?}", instruction, frame),
        }
    }

    fn call(&mut self, rule: GrammarRuleKey, addr: usize) -> Result<(), ParseFailure> {
        let return_addr = self.pc + 1;

        if self.memoized(rule) {
            let hit = self
                .context
                .memo_lookup(rule, self.pos)
                .map(|entry| match entry {
                    MemoEntry::Success { end, nodes } => Some((*end, nodes.clone())),
                    MemoEntry::Failure => None,
                });
            if let Some(hit) = hit {
                self.context.count_memo_hit();
                return match hit {
                    Some((end, nodes)) => {
                        self.pending.extend(nodes);
                        self.pos = end;
                        self.pc = return_addr;
                        Ok(())
                    }
                    None => self.fail(),
                };
            }
        }

        if !self.context.enter_rule(rule, self.pos) {
            let name = self.grammar.rule(rule).name().to_string();
            return Err(self.failure(self.pos, FailureReason::LeftRecursion { rule: name }));
        }
        trace!(
            rule = %self.grammar.rule(rule).name(),
            pos = self.pos,
            depth = self.context.depth(),
            "call"
        );
        self.stack.push(Frame::Call {
            rule,
            return_addr,
            start: self.pos,
            mark: self.pending.len(),
        });
        self.pc = addr;
        Ok(())
    }

    fn ret(&mut self) {
        let (rule, return_addr, start, mark) = match self.stack.pop() {
            Some(Frame::Call {
                rule,
                return_addr,
                start,
                mark,
            }) => (rule, return_addr, start, mark),
            frame => unreachable!("Return expects a call frame, found {:?}", frame),
        };
        self.context.exit_rule(rule, start);

        let children = self.pending.split_off(mark);
        let is_root = self.stack.is_empty();
        let nodes = if !is_root && self.grammar.rule(rule).skip_policy().should_skip(children.len()) {
            children
        } else {
            vec![RawNode::Rule(Rc::new(RawRule {
                rule,
                children,
                from: start,
                to: self.pos,
            }))]
        };

        if self.memoized(rule) {
            self.context
                .memo_success(rule, start, self.pos, nodes.clone());
        }
        self.pending.extend(nodes);
        self.pc = return_addr;
    }

    /// Unwind to the most recent choice frame and resume at its alternative
    fn fail(&mut self) -> Result<(), ParseFailure> {
        self.context.count_backtrack();
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Call { rule, start, .. } => {
                    self.context.exit_rule(rule, start);
                    if self.memoized(rule) {
                        self.context.memo_failure(rule, start);
                    }
                }
                Frame::Choice {
                    alternative,
                    pos,
                    mark,
                    predicate,
                } => {
                    if predicate {
                        self.context.exit_predicate();
                    }
                    self.pos = pos;
                    self.pending.truncate(mark);
                    self.pc = alternative;
                    return Ok(());
                }
            }
        }
        Err(self.failure(self.context.furthest(), FailureReason::NoViableAlternative))
    }

    fn failure(&self, position: usize, reason: FailureReason) -> ParseFailure {
        let (line, column, token_value) = match self.tokens.get(position).or(self.tokens.last()) {
            Some(t) if t.is(&token::EOF) => (t.line(), t.column(), "EOF".to_string()),
            Some(t) => (t.line(), t.column(), t.value().to_string()),
            None => (1, 0, "EOF".to_string()),
        };
        let expected = match reason {
            FailureReason::NoViableAlternative => self.context.expected().to_vec(),
            FailureReason::LeftRecursion { .. } => Vec::new(),
        };
        let failure = ParseFailure {
            line,
            column,
            position,
            token_value,
            expected,
            reason,
        };
        debug!(%failure, "parse failed");
        failure
    }
}
