//! Grammar compiler
//!
//! Lowers every rule into a contiguous block of [`Instruction`]s ending in
//! `Return`. The program starts with `Call(root) End`, so the machine only
//! has to start at address 0.
//!
//! Lowering of the combinators (`L:` marks a label):
//!
//! | expression        | instructions                                   |
//! |-------------------|------------------------------------------------|
//! | `FirstOf(a, b)`   | `Choice(L1) a Commit(L2) L1: b L2:`            |
//! | `Optional(e)`     | `Choice(L1) e Commit(L1) L1:`                  |
//! | `ZeroOrMore(e)`   | `L1: Choice(L2) e CommitVerify(L1) L2:`        |
//! | `OneOrMore(e)`    | `e` followed by `ZeroOrMore(e)`                |
//! | `Not(e)`          | `PredicateChoice(L1) e FailTwice L1:`          |
//! | `And(e)`          | `PredicateChoice(L1) e BackCommit(L2) L1: Fail L2:` |

use crate::error::GrammarError;
use crate::expression::{ParsingExpression, TokenMatcher};
use crate::grammar::{Grammar, GrammarRuleKey, SkipPolicy};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Invoke a rule whose body starts at `addr`
    Call { rule: GrammarRuleKey, addr: usize },
    Return,
    /// Push a backtrack point resuming at the given address
    Choice(usize),
    /// Like `Choice`, for the probe of a lookahead
    PredicateChoice(usize),
    /// Drop the last backtrack point and jump
    Commit(usize),
    /// Like `Commit`, but leaves the loop when the iteration consumed nothing
    CommitVerify(usize),
    /// Drop the last backtrack point, restore its position and jump
    BackCommit(usize),
    MatchToken(TokenMatcher),
    Jump(usize),
    /// Backtrack to the last choice point
    Fail,
    /// Drop the last backtrack point, then fail
    FailTwice,
    End,
}

impl Instruction {
    fn set_target(&mut self, target: usize) {
        match self {
            Instruction::Choice(a)
            | Instruction::PredicateChoice(a)
            | Instruction::Commit(a)
            | Instruction::CommitVerify(a)
            | Instruction::BackCommit(a)
            | Instruction::Jump(a) => *a = target,
            Instruction::Call { addr, .. } => *addr = target,
            _ => {}
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Call { rule, addr } => write!(f, "Call {} -> {}", rule, addr),
            Instruction::Return => write!(f, "Return"),
            Instruction::Choice(a) => write!(f, "Choice {}", a),
            Instruction::PredicateChoice(a) => write!(f, "PredicateChoice {}", a),
            Instruction::Commit(a) => write!(f, "Commit {}", a),
            Instruction::CommitVerify(a) => write!(f, "CommitVerify {}", a),
            Instruction::BackCommit(a) => write!(f, "BackCommit {}", a),
            Instruction::MatchToken(m) => write!(f, "Match {}", m),
            Instruction::Jump(a) => write!(f, "Jump {}", a),
            Instruction::Fail => write!(f, "Fail"),
            Instruction::FailTwice => write!(f, "FailTwice"),
            Instruction::End => write!(f, "End"),
        }
    }
}

/// Compiled form of one rule
#[derive(Debug, Clone)]
pub struct CompiledRule {
    key: GrammarRuleKey,
    name: Arc<str>,
    /// Instructions of the body; empty for undefined rules
    body: Range<usize>,
    skip: SkipPolicy,
    memoize: bool,
    recovery: bool,
}

impl CompiledRule {
    pub fn key(&self) -> GrammarRuleKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn entry(&self) -> Option<usize> {
        (!self.body.is_empty()).then_some(self.body.start)
    }

    pub fn skip_policy(&self) -> SkipPolicy {
        self.skip
    }

    pub fn memoize(&self) -> bool {
        self.memoize
    }

    pub fn is_recovery(&self) -> bool {
        self.recovery
    }
}

/// Executable program for the parsing machine; immutable and shareable
#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    program: Vec<Instruction>,
    rules: Vec<CompiledRule>,
    root: GrammarRuleKey,
}

impl CompiledGrammar {
    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    pub fn rule(&self, key: GrammarRuleKey) -> &CompiledRule {
        &self.rules[key.index()]
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn rule_by_name(&self, name: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.name() == name)
    }

    pub fn root(&self) -> GrammarRuleKey {
        self.root
    }

    /// Instructions of one rule's body
    pub fn instructions(&self, key: GrammarRuleKey) -> &[Instruction] {
        &self.program[self.rule(key).body.clone()]
    }
}

impl fmt::Display for CompiledGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut by_entry: Vec<&CompiledRule> =
            self.rules.iter().filter(|r| !r.body.is_empty()).collect();
        by_entry.sort_by_key(|r| r.body.start);
        let mut next = by_entry.iter().peekable();

        for (addr, instruction) in self.program.iter().enumerate() {
            if let Some(rule) = next.next_if(|r| r.body.start == addr) {
                writeln!(f, "; {} {}", rule.name, rule.key)?;
            }
            match instruction {
                Instruction::Call { rule, addr: target } => writeln!(
                    f,
                    "{:5}  Call {} -> {}",
                    addr,
                    self.rule(*rule).name,
                    target
                )?,
                other => writeln!(f, "{:5}  {}", addr, other)?,
            }
        }
        Ok(())
    }
}

/// Compile every defined rule of `grammar`.
///
/// Fails if the grammar has no root or if a defined rule references a rule
/// without a definition.
pub fn compile(grammar: &Grammar) -> Result<CompiledGrammar, GrammarError> {
    let root = grammar.root().ok_or(GrammarError::MissingRootRule)?;
    let root_rule = grammar.rule(root);
    if !root_rule.is_defined() {
        return Err(GrammarError::UnresolvedRule {
            rule: root_rule.name().to_string(),
            referenced_from: "<root>".to_string(),
        });
    }

    let mut compiler = Compiler {
        grammar,
        program: vec![
            Instruction::Call {
                rule: root,
                addr: 0,
            },
            Instruction::End,
        ],
    };

    let mut rules = Vec::with_capacity(grammar.rules().len());
    for rule in grammar.rules() {
        let start = compiler.program.len();
        if let Some(expression) = rule.expression() {
            compiler.lower(expression, rule.key())?;
            compiler.emit(Instruction::Return);
        }
        rules.push(CompiledRule {
            key: rule.key(),
            name: rule.shared_name(),
            body: start..compiler.program.len(),
            skip: rule.skip_policy(),
            memoize: rule.memoize(),
            recovery: rule.is_recovery(),
        });
    }

    // Link calls to rule entries
    let mut program = compiler.program;
    for instruction in &mut program {
        if let Instruction::Call { rule, .. } = *instruction {
            instruction.set_target(rules[rule.index()].body.start);
        }
    }

    debug!(
        rules = rules.len(),
        instructions = program.len(),
        root = %root_rule.name(),
        "compiled grammar"
    );
    Ok(CompiledGrammar {
        program,
        rules,
        root,
    })
}

struct Compiler<'g> {
    grammar: &'g Grammar,
    program: Vec<Instruction>,
}

impl Compiler<'_> {
    fn emit(&mut self, instruction: Instruction) -> usize {
        self.program.push(instruction);
        self.program.len() - 1
    }

    fn here(&self) -> usize {
        self.program.len()
    }

    /// Point the jump at `at` to the next emitted instruction
    fn patch_here(&mut self, at: usize) {
        let here = self.here();
        self.program[at].set_target(here);
    }

    fn lower(
        &mut self,
        expression: &ParsingExpression,
        current: GrammarRuleKey,
    ) -> Result<(), GrammarError> {
        match expression {
            ParsingExpression::Terminal(matcher) => {
                self.emit(Instruction::MatchToken(matcher.clone()));
            }
            ParsingExpression::RuleRef(key) => {
                let target = self.grammar.rule(*key);
                if !target.is_defined() {
                    return Err(GrammarError::UnresolvedRule {
                        rule: target.name().to_string(),
                        referenced_from: self.grammar.rule(current).name().to_string(),
                    });
                }
                self.emit(Instruction::Call { rule: *key, addr: 0 });
            }
            ParsingExpression::Sequence(items) => {
                for item in items {
                    self.lower(item, current)?;
                }
            }
            ParsingExpression::FirstOf(alternatives) => {
                let Some((last, init)) = alternatives.split_last() else {
                    self.emit(Instruction::Fail);
                    return Ok(());
                };
                let mut commits = Vec::with_capacity(init.len());
                for alternative in init {
                    let choice = self.emit(Instruction::Choice(0));
                    self.lower(alternative, current)?;
                    commits.push(self.emit(Instruction::Commit(0)));
                    self.patch_here(choice);
                }
                self.lower(last, current)?;
                for commit in commits {
                    self.patch_here(commit);
                }
            }
            ParsingExpression::Optional(e) => {
                let choice = self.emit(Instruction::Choice(0));
                self.lower(e, current)?;
                let commit = self.emit(Instruction::Commit(0));
                self.patch_here(choice);
                self.patch_here(commit);
            }
            ParsingExpression::ZeroOrMore(e) => self.lower_loop(e, current)?,
            ParsingExpression::OneOrMore(e) => {
                self.lower(e, current)?;
                self.lower_loop(e, current)?;
            }
            ParsingExpression::Not(e) => {
                let choice = self.emit(Instruction::PredicateChoice(0));
                self.lower(e, current)?;
                self.emit(Instruction::FailTwice);
                self.patch_here(choice);
            }
            ParsingExpression::And(e) => {
                let choice = self.emit(Instruction::PredicateChoice(0));
                self.lower(e, current)?;
                let back_commit = self.emit(Instruction::BackCommit(0));
                self.patch_here(choice);
                self.emit(Instruction::Fail);
                self.patch_here(back_commit);
            }
            ParsingExpression::Nothing => {
                self.emit(Instruction::Fail);
            }
        }
        Ok(())
    }

    fn lower_loop(
        &mut self,
        e: &ParsingExpression,
        current: GrammarRuleKey,
    ) -> Result<(), GrammarError> {
        let start = self.here();
        let choice = self.emit(Instruction::Choice(0));
        self.lower(e, current)?;
        self.emit(Instruction::CommitVerify(start));
        self.patch_here(choice);
        Ok(())
    }
}
