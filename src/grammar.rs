//! Grammar rule model
//!
//! Rules are created by name through a [`GrammarBuilder`] and can be
//! referenced before their body is defined. A body is given once with
//! [`GrammarBuilder::define`]; [`GrammarBuilder::override_definition`]
//! replaces it unconditionally, which lets a grammar specialize another one.

use crate::error::GrammarError;
use crate::expression::ParsingExpression;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identity of a rule, valid for the builder that created it and the
/// grammars built from that builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GrammarRuleKey(u32);

impl GrammarRuleKey {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GrammarRuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether the node of a rule is kept in the syntax tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipPolicy {
    #[default]
    Never,
    /// Always replaced by its children
    Always,
    /// Replaced by its child when it has exactly one
    IfOneChild,
}

impl SkipPolicy {
    pub fn should_skip(self, children: usize) -> bool {
        match self {
            SkipPolicy::Never => false,
            SkipPolicy::Always => true,
            SkipPolicy::IfOneChild => children == 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleDefinition {
    key: GrammarRuleKey,
    name: Arc<str>,
    expression: Option<ParsingExpression>,
    skip: SkipPolicy,
    memoize: bool,
    recovery: bool,
}

impl RuleDefinition {
    fn new(key: GrammarRuleKey, name: &str) -> Self {
        RuleDefinition {
            key,
            name: Arc::from(name),
            expression: None,
            skip: SkipPolicy::Never,
            memoize: true,
            recovery: false,
        }
    }

    pub fn key(&self) -> GrammarRuleKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn expression(&self) -> Option<&ParsingExpression> {
        self.expression.as_ref()
    }

    pub fn is_defined(&self) -> bool {
        self.expression.is_some()
    }

    pub fn skip_policy(&self) -> SkipPolicy {
        self.skip
    }

    pub fn memoize(&self) -> bool {
        self.memoize
    }

    /// Whether nodes of this rule mark input skipped by error recovery
    pub fn is_recovery(&self) -> bool {
        self.recovery
    }
}

/// Handle returned by the defining operations to tune a rule
pub struct RuleHandle<'g> {
    rule: &'g mut RuleDefinition,
}

impl RuleHandle<'_> {
    pub fn key(&self) -> GrammarRuleKey {
        self.rule.key
    }

    /// Never create a node for this rule
    pub fn skip(self) -> Self {
        self.rule.skip = SkipPolicy::Always;
        self
    }

    /// Only create a node when the rule matched more than one child
    pub fn skip_if_one_child(self) -> Self {
        self.rule.skip = SkipPolicy::IfOneChild;
        self
    }

    pub fn memoize(self, memoize: bool) -> Self {
        self.rule.memoize = memoize;
        self
    }

    pub fn recovery(self) -> Self {
        self.rule.recovery = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct GrammarBuilder {
    rules: Vec<RuleDefinition>,
    by_name: HashMap<String, GrammarRuleKey>,
    root: Option<GrammarRuleKey>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key of the rule called `name`, created on first use
    pub fn rule(&mut self, name: &str) -> GrammarRuleKey {
        if let Some(key) = self.by_name.get(name) {
            return *key;
        }
        let key = GrammarRuleKey(self.rules.len() as u32);
        self.rules.push(RuleDefinition::new(key, name));
        self.by_name.insert(name.to_string(), key);
        key
    }

    pub fn key(&self, name: &str) -> Option<GrammarRuleKey> {
        self.by_name.get(name).copied()
    }

    /// Give a rule its body; fails if it already has one
    pub fn define(
        &mut self,
        key: GrammarRuleKey,
        expression: impl Into<ParsingExpression>,
    ) -> Result<RuleHandle<'_>, GrammarError> {
        let rule = &mut self.rules[key.index()];
        if rule.expression.is_some() {
            return Err(GrammarError::DefinitionConflict {
                rule: rule.name.to_string(),
            });
        }
        rule.expression = Some(expression.into());
        Ok(RuleHandle { rule })
    }

    /// Give a rule its body, replacing any previous one
    pub fn override_definition(
        &mut self,
        key: GrammarRuleKey,
        expression: impl Into<ParsingExpression>,
    ) -> RuleHandle<'_> {
        let rule = &mut self.rules[key.index()];
        rule.expression = Some(expression.into());
        RuleHandle { rule }
    }

    /// Tune a rule without touching its body
    pub fn configure(&mut self, key: GrammarRuleKey) -> RuleHandle<'_> {
        RuleHandle {
            rule: &mut self.rules[key.index()],
        }
    }

    pub fn set_root(&mut self, key: GrammarRuleKey) -> &mut Self {
        self.root = Some(key);
        self
    }

    pub fn build(self) -> Grammar {
        Grammar {
            rules: Arc::from(self.rules),
            by_name: Arc::new(self.by_name),
            root: self.root,
        }
    }
}

/// Immutable set of rules with a designated root
#[derive(Debug, Clone)]
pub struct Grammar {
    rules: Arc<[RuleDefinition]>,
    by_name: Arc<HashMap<String, GrammarRuleKey>>,
    root: Option<GrammarRuleKey>,
}

impl Grammar {
    pub fn rule(&self, key: GrammarRuleKey) -> &RuleDefinition {
        &self.rules[key.index()]
    }

    pub fn rules(&self) -> &[RuleDefinition] {
        &self.rules
    }

    pub fn key(&self, name: &str) -> Option<GrammarRuleKey> {
        self.by_name.get(name).copied()
    }

    pub fn root(&self) -> Option<GrammarRuleKey> {
        self.root
    }

    /// Same rules, parsed from another entry point
    pub fn with_root(&self, root: GrammarRuleKey) -> Grammar {
        Grammar {
            rules: Arc::clone(&self.rules),
            by_name: Arc::clone(&self.by_name),
            root: Some(root),
        }
    }

    /// Lower this grammar into an executable program
    pub fn compile(&self) -> Result<crate::compiler::CompiledGrammar, GrammarError> {
        crate::compiler::compile(self)
    }
}
