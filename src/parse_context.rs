//! Per-parse state of the parsing machine
//!
//! Tracks the (rule, position) pairs on the call stack for left-recursion
//! detection, the packrat memo table, and the furthest failure used for error
//! reporting. A context lives for exactly one parse.

use crate::grammar::GrammarRuleKey;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Tree fragment produced by the machine before the arena is built
#[derive(Debug, Clone)]
pub(crate) enum RawNode {
    /// Index of a consumed token
    Token(usize),
    Rule(Rc<RawRule>),
}

#[derive(Debug)]
pub(crate) struct RawRule {
    pub(crate) rule: GrammarRuleKey,
    pub(crate) children: Vec<RawNode>,
    pub(crate) from: usize,
    pub(crate) to: usize,
}

impl Drop for RawRule {
    /// Releases nested rules from a worklist instead of recursing per level
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(node) = stack.pop() {
            if let RawNode::Rule(rule) = node {
                // Shared subtrees stay alive with their other owners
                if let Ok(mut rule) = Rc::try_unwrap(rule) {
                    stack.append(&mut rule.children);
                }
            }
        }
    }
}

/// Memoized outcome of a rule at a position
#[derive(Debug, Clone)]
pub(crate) enum MemoEntry {
    /// Position after the match, and the nodes left for the caller
    Success { end: usize, nodes: Vec<RawNode> },
    Failure,
}

/// Execution statistics of one parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub instructions: u64,
    pub backtracks: u64,
    pub memo_hits: u64,
    pub memo_entries: usize,
    /// Deepest rule nesting reached
    pub max_depth: usize,
}

#[derive(Debug, Default)]
pub(crate) struct ParseContext {
    depth: usize,
    /// (rule, position) pairs currently on the call stack
    active: HashSet<(GrammarRuleKey, usize)>,
    memo: HashMap<(GrammarRuleKey, usize), MemoEntry>,
    /// Number of lookaheads being evaluated
    predicate_depth: usize,
    furthest: usize,
    expected: Vec<String>,
    stats: ParseStats,
}

impl ParseContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enter a rule at a position; false if that pair is already active
    pub(crate) fn enter_rule(&mut self, rule: GrammarRuleKey, position: usize) -> bool {
        if !self.active.insert((rule, position)) {
            return false;
        }
        self.depth += 1;
        self.stats.max_depth = self.stats.max_depth.max(self.depth);
        true
    }

    pub(crate) fn exit_rule(&mut self, rule: GrammarRuleKey, position: usize) {
        self.depth = self.depth.saturating_sub(1);
        self.active.remove(&(rule, position));
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn memo_lookup(&self, rule: GrammarRuleKey, position: usize) -> Option<&MemoEntry> {
        self.memo.get(&(rule, position))
    }

    pub(crate) fn memo_success(
        &mut self,
        rule: GrammarRuleKey,
        position: usize,
        end: usize,
        nodes: Vec<RawNode>,
    ) {
        self.memo
            .insert((rule, position), MemoEntry::Success { end, nodes });
    }

    /// Failures seen inside a lookahead are not recorded: replaying them
    /// later would hide their expectations from the error report.
    pub(crate) fn memo_failure(&mut self, rule: GrammarRuleKey, position: usize) {
        if !self.in_predicate() {
            self.memo.insert((rule, position), MemoEntry::Failure);
        }
    }

    pub(crate) fn enter_predicate(&mut self) {
        self.predicate_depth += 1;
    }

    pub(crate) fn exit_predicate(&mut self) {
        self.predicate_depth = self.predicate_depth.saturating_sub(1);
    }

    pub(crate) fn in_predicate(&self) -> bool {
        self.predicate_depth > 0
    }

    /// Note a failed match; ignored inside lookaheads
    pub(crate) fn record_failure(&mut self, position: usize, expected: Option<String>) {
        if self.in_predicate() {
            return;
        }
        if position > self.furthest {
            self.furthest = position;
            self.expected.clear();
        }
        if position == self.furthest {
            if let Some(expected) = expected {
                if !self.expected.contains(&expected) {
                    self.expected.push(expected);
                }
            }
        }
    }

    pub(crate) fn furthest(&self) -> usize {
        self.furthest
    }

    pub(crate) fn expected(&self) -> &[String] {
        &self.expected
    }

    pub(crate) fn count_instruction(&mut self) {
        self.stats.instructions += 1;
    }

    pub(crate) fn count_backtrack(&mut self) {
        self.stats.backtracks += 1;
    }

    pub(crate) fn count_memo_hit(&mut self) {
        self.stats.memo_hits += 1;
    }

    pub(crate) fn stats(&self) -> ParseStats {
        ParseStats {
            memo_entries: self.memo.len(),
            ..self.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarBuilder;

    fn keys() -> (GrammarRuleKey, GrammarRuleKey) {
        let mut g = GrammarBuilder::new();
        (g.rule("test"), g.rule("other"))
    }

    #[test]
    fn test_context_new() {
        let ctx = ParseContext::new();
        assert_eq!(ctx.depth(), 0);
        assert!(ctx.active.is_empty());
        assert_eq!(ctx.stats(), ParseStats::default());
    }

    #[test]
    fn test_enter_exit_rule() {
        let (test, other) = keys();
        let mut ctx = ParseContext::new();

        assert!(ctx.enter_rule(test, 0));
        assert_eq!(ctx.depth(), 1);

        // Same rule at the same position is left recursion
        assert!(!ctx.enter_rule(test, 0));
        assert_eq!(ctx.depth(), 1);

        // Same rule further on, or another rule at the same position, is fine
        assert!(ctx.enter_rule(test, 1));
        assert!(ctx.enter_rule(other, 0));
        assert_eq!(ctx.depth(), 3);

        ctx.exit_rule(other, 0);
        ctx.exit_rule(test, 1);
        ctx.exit_rule(test, 0);
        assert_eq!(ctx.depth(), 0);
        assert!(ctx.enter_rule(test, 0));
        assert_eq!(ctx.stats().max_depth, 3);
    }

    #[test]
    fn test_furthest_failure() {
        let mut ctx = ParseContext::new();
        ctx.record_failure(2, Some("\";\"".into()));
        ctx.record_failure(1, Some("NUMBER".into()));
        ctx.record_failure(2, Some("\",\"".into()));
        ctx.record_failure(2, Some("\";\"".into()));
        assert_eq!(ctx.furthest(), 2);
        assert_eq!(ctx.expected(), ["\";\"", "\",\""]);

        ctx.record_failure(3, None);
        assert_eq!(ctx.furthest(), 3);
        assert!(ctx.expected().is_empty());
    }

    #[test]
    fn test_predicate_failures_are_ignored() {
        let (test, _) = keys();
        let mut ctx = ParseContext::new();
        ctx.enter_predicate();
        ctx.record_failure(5, Some("x".into()));
        ctx.memo_failure(test, 5);
        ctx.exit_predicate();

        assert_eq!(ctx.furthest(), 0);
        assert!(ctx.memo_lookup(test, 5).is_none());

        ctx.memo_failure(test, 5);
        assert!(matches!(ctx.memo_lookup(test, 5), Some(MemoEntry::Failure)));
    }

    #[test]
    fn test_memo_success() {
        let (test, other) = keys();
        let mut ctx = ParseContext::new();
        ctx.memo_success(test, 0, 2, vec![RawNode::Token(0), RawNode::Token(1)]);
        match ctx.memo_lookup(test, 0) {
            Some(MemoEntry::Success { end, nodes }) => {
                assert_eq!(*end, 2);
                assert_eq!(nodes.len(), 2);
            }
            entry => panic!("unexpected memo entry {:?}", entry),
        }
        assert!(ctx.memo_lookup(other, 0).is_none());
        assert_eq!(ctx.stats().memo_entries, 1);
    }
}
