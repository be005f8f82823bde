//! XPath queries over syntax trees
//!
//! A query is compiled once and evaluated against any tree whose nodes
//! implement [`TreeNavigator`]. Element names are rule or token type names;
//! nodes carrying a token expose the `tokenLine`, `tokenColumn` and
//! `tokenValue` attributes. A virtual document node sits above the root, so
//! `/File` selects the root when it is a `File` node.
//!
//! ```
//! use lexpeg::xpath::XPathQuery;
//!
//! let query = XPathQuery::compile("//Stmt[@tokenLine = 2 and not(Block)]").unwrap();
//! assert_eq!(query.as_str(), "//Stmt[@tokenLine = 2 and not(Block)]");
//! ```
//!
//! Supported: absolute and relative location paths, `//`, `.`, `..`, `*`,
//! `node()`, the axes `child`, `descendant`, `descendant-or-self`, `parent`,
//! `ancestor`, `ancestor-or-self`, `self`, `following-sibling`,
//! `preceding-sibling` and `attribute` (`@`), predicates (numeric predicates
//! select by position), `and`, `or`, comparisons, string and number literals,
//! and the functions `name`, `count`, `not`, `contains`, `starts-with`,
//! `string-length`, `string`, `position`, `last`, `true` and `false`.

use crate::ast::AstNode;
use crate::error::XPathError;

/// Read access to a tree, as needed by the evaluator
pub trait TreeNavigator: Copy + PartialEq {
    fn element_name(&self) -> &str;

    fn parent_node(&self) -> Option<Self>;

    fn child_nodes(&self) -> Vec<Self>;

    fn attribute_names(&self) -> &'static [&'static str];

    fn attribute(&self, name: &str) -> Option<String>;

    /// Value used when a node is compared or converted to a string
    fn string_value(&self) -> String;

    /// Rank of the node in document order
    fn document_position(&self) -> usize;
}

const TOKEN_ATTRIBUTES: &[&str] = &["tokenLine", "tokenColumn", "tokenValue"];

impl TreeNavigator for AstNode<'_> {
    fn element_name(&self) -> &str {
        self.name()
    }

    fn parent_node(&self) -> Option<Self> {
        self.parent()
    }

    fn child_nodes(&self) -> Vec<Self> {
        self.children().collect()
    }

    fn attribute_names(&self) -> &'static [&'static str] {
        if self.has_token() {
            TOKEN_ATTRIBUTES
        } else {
            &[]
        }
    }

    fn attribute(&self, name: &str) -> Option<String> {
        let token = self.token()?;
        match name {
            "tokenLine" => Some(token.line().to_string()),
            "tokenColumn" => Some(token.column().to_string()),
            "tokenValue" => Some(token.value().to_string()),
            _ => None,
        }
    }

    fn string_value(&self) -> String {
        self.token_value().to_string()
    }

    fn document_position(&self) -> usize {
        self.id().index()
    }
}

/// A compiled XPath expression
#[derive(Debug, Clone)]
pub struct XPathQuery {
    text: String,
    expr: Expr,
}

impl XPathQuery {
    pub fn compile(text: &str) -> Result<Self, XPathError> {
        let tokens = tokenize(text)?;
        let mut parser = QueryParser {
            tokens,
            pos: 0,
            end: text.len(),
        };
        let expr = parser.parse_expr()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error(format!("unexpected {}", token.describe())));
        }
        Ok(XPathQuery {
            text: text.to_string(),
            expr,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Nodes selected from `context`, in document order.
    ///
    /// Empty when the query does not evaluate to a node set. The virtual
    /// document node is never returned.
    pub fn select_nodes<N: TreeNavigator>(&self, context: N) -> Vec<N> {
        match self.evaluate(context) {
            Value::Nodes(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Item::Element(node) => Some(node),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn select_single_node<N: TreeNavigator>(&self, context: N) -> Option<N> {
        self.select_nodes(context).into_iter().next()
    }

    /// Result converted with the `string()` rules
    pub fn evaluate_string<N: TreeNavigator>(&self, context: N) -> String {
        to_string(&self.evaluate(context))
    }

    /// Result converted with the `boolean()` rules
    pub fn evaluate_boolean<N: TreeNavigator>(&self, context: N) -> bool {
        to_bool(&self.evaluate(context))
    }

    /// Result converted with the `number()` rules
    pub fn evaluate_number<N: TreeNavigator>(&self, context: N) -> f64 {
        to_number(&self.evaluate(context))
    }

    fn evaluate<N: TreeNavigator>(&self, context: N) -> Value<N> {
        let context = Context {
            item: Item::Element(context),
            position: 1,
            size: 1,
        };
        evaluate(&self.expr, &context)
    }
}

impl std::str::FromStr for XPathQuery {
    type Err = XPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        XPathQuery::compile(s)
    }
}

// ---------------------------------------------------------------------------
// Tokens

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Slash,
    DoubleSlash,
    Dot,
    DotDot,
    At,
    Star,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    ColonColon,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Literal(String),
    Number(f64),
    Name(String),
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Literal(s) => format!("literal '{}'", s),
            Tok::Number(n) => format!("number {}", n),
            Tok::Name(n) => format!("name '{}'", n),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Tok::Slash => "/",
            Tok::DoubleSlash => "//",
            Tok::Dot => ".",
            Tok::DotDot => "..",
            Tok::At => "@",
            Tok::Star => "*",
            Tok::LBracket => "[",
            Tok::RBracket => "]",
            Tok::LParen => "(",
            Tok::RParen => ")",
            Tok::Comma => ",",
            Tok::ColonColon => "::",
            Tok::Eq => "=",
            Tok::Ne => "!=",
            Tok::Lt => "<",
            Tok::Le => "<=",
            Tok::Gt => ">",
            Tok::Ge => ">=",
            Tok::Literal(_) | Tok::Number(_) | Tok::Name(_) => "",
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Split a query into tokens paired with their byte offsets
fn tokenize(text: &str) -> Result<Vec<(Tok, usize)>, XPathError> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let offset_of = |i: usize| chars.get(i).map_or(text.len(), |(o, _)| *o);
    let syntax = |offset: usize, message: &str| XPathError::Syntax {
        offset,
        message: message.to_string(),
    };

    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (start, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);
        let (tok, len) = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if next == Some('/') => (Tok::DoubleSlash, 2),
            '/' => (Tok::Slash, 1),
            '.' if next == Some('.') => (Tok::DotDot, 2),
            '.' if next.is_some_and(|n| n.is_ascii_digit()) => {
                let end = (i + 1..chars.len())
                    .find(|j| !chars[*j].1.is_ascii_digit())
                    .unwrap_or(chars.len());
                let literal = &text[start..offset_of(end)];
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| syntax(start, "invalid number"))?;
                (Tok::Number(value), end - i)
            }
            '.' => (Tok::Dot, 1),
            '@' => (Tok::At, 1),
            '*' => (Tok::Star, 1),
            '[' => (Tok::LBracket, 1),
            ']' => (Tok::RBracket, 1),
            '(' => (Tok::LParen, 1),
            ')' => (Tok::RParen, 1),
            ',' => (Tok::Comma, 1),
            ':' if next == Some(':') => (Tok::ColonColon, 2),
            '=' => (Tok::Eq, 1),
            '!' if next == Some('=') => (Tok::Ne, 2),
            '<' if next == Some('=') => (Tok::Le, 2),
            '<' => (Tok::Lt, 1),
            '>' if next == Some('=') => (Tok::Ge, 2),
            '>' => (Tok::Gt, 1),
            '\'' | '"' => {
                let close = (i + 1..chars.len())
                    .find(|j| chars[*j].1 == c)
                    .ok_or_else(|| syntax(start, "unterminated string literal"))?;
                let value = text[offset_of(i + 1)..offset_of(close)].to_string();
                (Tok::Literal(value), close + 1 - i)
            }
            c if c.is_ascii_digit() => {
                let mut end = i;
                while end < chars.len() && chars[end].1.is_ascii_digit() {
                    end += 1;
                }
                if end < chars.len() && chars[end].1 == '.' {
                    end += 1;
                    while end < chars.len() && chars[end].1.is_ascii_digit() {
                        end += 1;
                    }
                }
                let value = text[start..offset_of(end)]
                    .parse::<f64>()
                    .map_err(|_| syntax(start, "invalid number"))?;
                (Tok::Number(value), end - i)
            }
            c if is_name_start(c) => {
                let end = (i + 1..chars.len())
                    .find(|j| !is_name_char(chars[*j].1))
                    .unwrap_or(chars.len());
                (Tok::Name(text[start..offset_of(end)].to_string()), end - i)
            }
            other => {
                return Err(syntax(start, &format!("unexpected character '{}'", other)));
            }
        };
        tokens.push((tok, start));
        i += len;
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Syntax tree

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    SelfAxis,
    FollowingSibling,
    PrecedingSibling,
    Attribute,
}

impl Axis {
    fn from_name(name: &str) -> Option<Axis> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "self" => Axis::SelfAxis,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "attribute" => Axis::Attribute,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Name(String),
    /// `*`: any node of the axis' principal type
    Any,
    /// `node()`
    Node,
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

impl Step {
    fn descendant_or_self() -> Step {
        Step {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Name,
    Count,
    Not,
    Contains,
    StartsWith,
    StringLength,
    String,
    Position,
    Last,
    True,
    False,
}

impl Function {
    fn resolve(name: &str) -> Option<(Function, usize, usize)> {
        Some(match name {
            "name" => (Function::Name, 0, 1),
            "count" => (Function::Count, 1, 1),
            "not" => (Function::Not, 1, 1),
            "contains" => (Function::Contains, 2, 2),
            "starts-with" => (Function::StartsWith, 2, 2),
            "string-length" => (Function::StringLength, 0, 1),
            "string" => (Function::String, 0, 1),
            "position" => (Function::Position, 0, 0),
            "last" => (Function::Last, 0, 0),
            "true" => (Function::True, 0, 0),
            "false" => (Function::False, 0, 0),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Literal(String),
    Number(f64),
    Call(Function, Vec<Expr>),
    Path { absolute: bool, steps: Vec<Step> },
    /// Primary expression filtered by predicates, then navigated
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
}

// ---------------------------------------------------------------------------
// Parser

struct QueryParser {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
    end: usize,
}

impl QueryParser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_ahead(&self, offset: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(_, o)| *o)
    }

    fn consume(&mut self) -> Option<Tok> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn matches(&self, expected: &Tok) -> bool {
        self.peek() == Some(expected)
    }

    fn matches_name(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Tok::Name(n)) if n == name)
    }

    fn eat(&mut self, expected: &Tok) -> bool {
        if self.matches(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Tok) -> Result<(), XPathError> {
        if self.eat(&expected) {
            return Ok(());
        }
        let found = self
            .peek()
            .map_or_else(|| "end of query".to_string(), Tok::describe);
        Err(self.error(format!("expected '{}' but found {}", expected.symbol(), found)))
    }

    fn error(&self, message: String) -> XPathError {
        XPathError::Syntax {
            offset: self.offset(),
            message,
        }
    }

    // Expr: AndExpr ("or" AndExpr)*
    fn parse_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_and()?;
        while self.matches_name("or") {
            self.consume();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // AndExpr: EqualityExpr ("and" EqualityExpr)*
    fn parse_and(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_equality()?;
        while self.matches_name("and") {
            self.consume();
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // EqualityExpr: RelationalExpr (("=" | "!=") RelationalExpr)*
    fn parse_equality(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Eq) => CompareOp::Eq,
                Some(Tok::Ne) => CompareOp::Ne,
                _ => return Ok(left),
            };
            self.consume();
            let right = self.parse_relational()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    // RelationalExpr: PathExpr (("<" | "<=" | ">" | ">=") PathExpr)*
    fn parse_relational(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_path()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Lt) => CompareOp::Lt,
                Some(Tok::Le) => CompareOp::Le,
                Some(Tok::Gt) => CompareOp::Gt,
                Some(Tok::Ge) => CompareOp::Ge,
                _ => return Ok(left),
            };
            self.consume();
            let right = self.parse_path()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn starts_primary(&self) -> bool {
        match self.peek() {
            Some(Tok::Literal(_)) | Some(Tok::Number(_)) | Some(Tok::LParen) => true,
            Some(Tok::Name(name)) => {
                name != "node" && self.peek_ahead(1) == Some(&Tok::LParen)
            }
            _ => false,
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Tok::Name(_)) | Some(Tok::Star) | Some(Tok::Dot) | Some(Tok::DotDot) | Some(Tok::At)
        )
    }

    // PathExpr: "/" RelativePath? | "//" RelativePath | RelativePath
    //         | Primary Predicate* (("/" | "//") RelativePath)?
    fn parse_path(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&Tok::Slash) {
            let mut steps = Vec::new();
            if self.starts_step() {
                self.parse_relative(&mut steps)?;
            }
            return Ok(Expr::Path {
                absolute: true,
                steps,
            });
        }
        if self.eat(&Tok::DoubleSlash) {
            let mut steps = vec![Step::descendant_or_self()];
            self.parse_relative(&mut steps)?;
            return Ok(Expr::Path {
                absolute: true,
                steps,
            });
        }
        if self.starts_primary() {
            let primary = self.parse_primary()?;
            let predicates = self.parse_predicates()?;
            let mut steps = Vec::new();
            if self.eat(&Tok::Slash) {
                self.parse_relative(&mut steps)?;
            } else if self.eat(&Tok::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                self.parse_relative(&mut steps)?;
            }
            if predicates.is_empty() && steps.is_empty() {
                return Ok(primary);
            }
            return Ok(Expr::Filter {
                primary: Box::new(primary),
                predicates,
                steps,
            });
        }
        let mut steps = Vec::new();
        self.parse_relative(&mut steps)?;
        Ok(Expr::Path {
            absolute: false,
            steps,
        })
    }

    // RelativePath: Step (("/" | "//") Step)*
    fn parse_relative(&mut self, steps: &mut Vec<Step>) -> Result<(), XPathError> {
        steps.push(self.parse_step()?);
        loop {
            if self.eat(&Tok::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&Tok::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                return Ok(());
            }
        }
    }

    // Step: ("." | "..") Predicate* | ("@" | AxisName "::")? NodeTest Predicate*
    fn parse_step(&mut self) -> Result<Step, XPathError> {
        for (abbreviation, axis) in [(Tok::Dot, Axis::SelfAxis), (Tok::DotDot, Axis::Parent)] {
            if self.eat(&abbreviation) {
                return Ok(Step {
                    axis,
                    test: NodeTest::Node,
                    predicates: self.parse_predicates()?,
                });
            }
        }

        let axis = if self.eat(&Tok::At) {
            Axis::Attribute
        } else if self.peek_ahead(1) == Some(&Tok::ColonColon) {
            let Some(Tok::Name(name)) = self.peek().cloned() else {
                return Err(self.error("expected an axis name".to_string()));
            };
            let axis = Axis::from_name(&name)
                .ok_or_else(|| self.error(format!("unknown axis '{}'", name)))?;
            self.pos += 2;
            axis
        } else {
            Axis::Child
        };

        let test = match self.peek().cloned() {
            Some(Tok::Star) => {
                self.pos += 1;
                NodeTest::Any
            }
            Some(Tok::Name(name)) => {
                self.pos += 1;
                if name == "node" && self.matches(&Tok::LParen) {
                    self.expect(Tok::LParen)?;
                    self.expect(Tok::RParen)?;
                    NodeTest::Node
                } else {
                    NodeTest::Name(name)
                }
            }
            _ => return Err(self.error("expected a node test".to_string())),
        };

        Ok(Step {
            axis,
            test,
            predicates: self.parse_predicates()?,
        })
    }

    // Predicate: "[" Expr "]"
    fn parse_predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Tok::LBracket) {
            predicates.push(self.parse_expr()?);
            self.expect(Tok::RBracket)?;
        }
        Ok(predicates)
    }

    // Primary: Literal | Number | "(" Expr ")" | FunctionName "(" Args ")"
    fn parse_primary(&mut self) -> Result<Expr, XPathError> {
        let offset = self.offset();
        match self.consume() {
            Some(Tok::Literal(s)) => Ok(Expr::Literal(s)),
            Some(Tok::Number(n)) => Ok(Expr::Number(n)),
            Some(Tok::LParen) => {
                let expr = self.parse_expr()?;
                self.expect(Tok::RParen)?;
                Ok(expr)
            }
            Some(Tok::Name(name)) => {
                let (function, min, max) = Function::resolve(&name)
                    .ok_or_else(|| XPathError::UnknownFunction(name.clone()))?;
                self.expect(Tok::LParen)?;
                let mut args = Vec::new();
                if !self.matches(&Tok::RParen) {
                    args.push(self.parse_expr()?);
                    while self.eat(&Tok::Comma) {
                        args.push(self.parse_expr()?);
                    }
                }
                self.expect(Tok::RParen)?;
                if args.len() < min || args.len() > max {
                    return Err(XPathError::Syntax {
                        offset,
                        message: format!("wrong number of arguments for {}()", name),
                    });
                }
                Ok(Expr::Call(function, args))
            }
            _ => Err(XPathError::Syntax {
                offset,
                message: "expected an expression".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation

#[derive(Debug, Clone, Copy, PartialEq)]
enum Item<N> {
    /// Virtual document node above the given root
    Document(N),
    Element(N),
    Attribute(N, &'static str),
}

impl<N: TreeNavigator> Item<N> {
    fn order(&self) -> (usize, usize) {
        match self {
            Item::Document(_) => (0, 0),
            Item::Element(n) => (n.document_position() + 1, 0),
            Item::Attribute(n, name) => {
                let index = n
                    .attribute_names()
                    .iter()
                    .position(|a| a == name)
                    .unwrap_or(0);
                (n.document_position() + 1, index + 1)
            }
        }
    }

    fn name(&self) -> String {
        match self {
            Item::Document(_) => String::new(),
            Item::Element(n) => n.element_name().to_string(),
            Item::Attribute(_, name) => name.to_string(),
        }
    }

    fn string_value(&self) -> String {
        match self {
            Item::Document(n) | Item::Element(n) => n.string_value(),
            Item::Attribute(n, name) => n.attribute(name).unwrap_or_default(),
        }
    }

    fn document(&self) -> Item<N> {
        match self {
            Item::Document(root) => Item::Document(*root),
            Item::Element(n) | Item::Attribute(n, _) => {
                let mut root = *n;
                while let Some(parent) = root.parent_node() {
                    root = parent;
                }
                Item::Document(root)
            }
        }
    }

    fn children(&self) -> Vec<Item<N>> {
        match self {
            Item::Document(root) => vec![Item::Element(*root)],
            Item::Element(n) => n.child_nodes().into_iter().map(Item::Element).collect(),
            Item::Attribute(..) => Vec::new(),
        }
    }

    fn parent(&self) -> Option<Item<N>> {
        match self {
            Item::Document(_) => None,
            Item::Element(n) => Some(n.parent_node().map_or(Item::Document(*n), Item::Element)),
            Item::Attribute(n, _) => Some(Item::Element(*n)),
        }
    }

    fn descendants(&self) -> Vec<Item<N>> {
        let mut result = Vec::new();
        let mut stack: Vec<Item<N>> = self.children().into_iter().rev().collect();
        while let Some(item) = stack.pop() {
            result.push(item);
            stack.extend(item.children().into_iter().rev());
        }
        result
    }

    fn ancestors(&self) -> Vec<Item<N>> {
        std::iter::successors(self.parent(), |item| item.parent()).collect()
    }

    /// Siblings before (closest first) and after this element
    fn siblings(&self) -> (Vec<Item<N>>, Vec<Item<N>>) {
        let Item::Element(node) = self else {
            return (Vec::new(), Vec::new());
        };
        let Some(parent) = node.parent_node() else {
            return (Vec::new(), Vec::new());
        };
        let children = parent.child_nodes();
        let Some(index) = children.iter().position(|c| c == node) else {
            return (Vec::new(), Vec::new());
        };
        let preceding = children[..index].iter().rev().map(|n| Item::Element(*n)).collect();
        let following = children[index + 1..].iter().map(|n| Item::Element(*n)).collect();
        (preceding, following)
    }

    /// Nodes along `axis`, in axis order
    fn axis(&self, axis: Axis) -> Vec<Item<N>> {
        match axis {
            Axis::Child => self.children(),
            Axis::Descendant => self.descendants(),
            Axis::DescendantOrSelf => {
                let mut items = vec![*self];
                items.extend(self.descendants());
                items
            }
            Axis::Parent => self.parent().into_iter().collect(),
            Axis::Ancestor => self.ancestors(),
            Axis::AncestorOrSelf => {
                let mut items = vec![*self];
                items.extend(self.ancestors());
                items
            }
            Axis::SelfAxis => vec![*self],
            Axis::FollowingSibling => self.siblings().1,
            Axis::PrecedingSibling => self.siblings().0,
            Axis::Attribute => match self {
                Item::Element(n) => n
                    .attribute_names()
                    .iter()
                    .map(|name| Item::Attribute(*n, *name))
                    .collect(),
                _ => Vec::new(),
            },
        }
    }

    fn matches(&self, axis: Axis, test: &NodeTest) -> bool {
        match (axis, test, self) {
            (_, NodeTest::Node, _) => true,
            (Axis::Attribute, NodeTest::Any, Item::Attribute(..)) => true,
            (Axis::Attribute, NodeTest::Name(wanted), Item::Attribute(_, name)) => name == wanted,
            (Axis::Attribute, ..) => false,
            (_, NodeTest::Any, Item::Element(_)) => true,
            (_, NodeTest::Name(wanted), Item::Element(n)) => n.element_name() == wanted,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
enum Value<N> {
    Nodes(Vec<Item<N>>),
    Boolean(bool),
    Number(f64),
    String(String),
}

struct Context<N> {
    item: Item<N>,
    position: usize,
    size: usize,
}

fn evaluate<N: TreeNavigator>(expr: &Expr, ctx: &Context<N>) -> Value<N> {
    match expr {
        Expr::Or(a, b) => Value::Boolean(to_bool(&evaluate(a, ctx)) || to_bool(&evaluate(b, ctx))),
        Expr::And(a, b) => Value::Boolean(to_bool(&evaluate(a, ctx)) && to_bool(&evaluate(b, ctx))),
        Expr::Compare(op, a, b) => Value::Boolean(compare(*op, &evaluate(a, ctx), &evaluate(b, ctx))),
        Expr::Literal(s) => Value::String(s.clone()),
        Expr::Number(n) => Value::Number(*n),
        Expr::Call(function, args) => call(*function, args, ctx),
        Expr::Path { absolute, steps } => {
            let start = if *absolute {
                ctx.item.document()
            } else {
                ctx.item
            };
            Value::Nodes(apply_steps(vec![start], steps))
        }
        Expr::Filter {
            primary,
            predicates,
            steps,
        } => match evaluate(primary, ctx) {
            Value::Nodes(items) => Value::Nodes(apply_steps(filter(items, predicates), steps)),
            _ => Value::Nodes(Vec::new()),
        },
    }
}

fn apply_steps<N: TreeNavigator>(mut items: Vec<Item<N>>, steps: &[Step]) -> Vec<Item<N>> {
    for step in steps {
        let mut next = Vec::new();
        for item in &items {
            let candidates: Vec<Item<N>> = item
                .axis(step.axis)
                .into_iter()
                .filter(|c| c.matches(step.axis, &step.test))
                .collect();
            next.extend(filter(candidates, &step.predicates));
        }
        next.sort_by_key(|item| item.order());
        next.dedup();
        items = next;
    }
    items
}

/// Keep the items satisfying every predicate; positions follow the input order
fn filter<N: TreeNavigator>(mut items: Vec<Item<N>>, predicates: &[Expr]) -> Vec<Item<N>> {
    for predicate in predicates {
        let size = items.len();
        items = items
            .into_iter()
            .enumerate()
            .filter(|(i, item)| {
                let ctx = Context {
                    item: *item,
                    position: i + 1,
                    size,
                };
                match evaluate(predicate, &ctx) {
                    Value::Number(n) => n == (i + 1) as f64,
                    other => to_bool(&other),
                }
            })
            .map(|(_, item)| item)
            .collect();
    }
    items
}

fn call<N: TreeNavigator>(function: Function, args: &[Expr], ctx: &Context<N>) -> Value<N> {
    let arg = |i: usize| evaluate(&args[i], ctx);
    let string_arg = |i: usize| {
        if args.is_empty() {
            ctx.item.string_value()
        } else {
            to_string(&arg(i))
        }
    };
    match function {
        Function::Name => {
            let item = if args.is_empty() {
                Some(ctx.item)
            } else {
                match arg(0) {
                    Value::Nodes(items) => items.first().copied(),
                    _ => None,
                }
            };
            Value::String(item.map(|i| i.name()).unwrap_or_default())
        }
        Function::Count => match arg(0) {
            Value::Nodes(items) => Value::Number(items.len() as f64),
            _ => Value::Number(0.0),
        },
        Function::Not => Value::Boolean(!to_bool(&arg(0))),
        Function::Contains => Value::Boolean(to_string(&arg(0)).contains(to_string(&arg(1)).as_str())),
        Function::StartsWith => {
            Value::Boolean(to_string(&arg(0)).starts_with(to_string(&arg(1)).as_str()))
        }
        Function::StringLength => Value::Number(string_arg(0).chars().count() as f64),
        Function::String => Value::String(string_arg(0)),
        Function::Position => Value::Number(ctx.position as f64),
        Function::Last => Value::Number(ctx.size as f64),
        Function::True => Value::Boolean(true),
        Function::False => Value::Boolean(false),
    }
}

fn to_bool<N: TreeNavigator>(value: &Value<N>) -> bool {
    match value {
        Value::Nodes(items) => !items.is_empty(),
        Value::Boolean(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::String(s) => !s.is_empty(),
    }
}

fn to_number<N: TreeNavigator>(value: &Value<N>) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Boolean(b) => f64::from(u8::from(*b)),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Nodes(_) => to_string(value).trim().parse().unwrap_or(f64::NAN),
    }
}

fn to_string<N: TreeNavigator>(value: &Value<N>) -> String {
    match value {
        Value::Nodes(items) => items.first().map(Item::string_value).unwrap_or_default(),
        Value::Boolean(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => s.clone(),
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn compare<N: TreeNavigator>(op: CompareOp, left: &Value<N>, right: &Value<N>) -> bool {
    match (left, right) {
        (Value::Nodes(l), Value::Nodes(r)) => l.iter().any(|a| {
            let a = Value::<N>::String(a.string_value());
            r.iter()
                .any(|b| compare_atomic(op, &a, &Value::String(b.string_value())))
        }),
        (Value::Nodes(l), Value::Boolean(_)) => {
            compare_atomic(op, &Value::Boolean(!l.is_empty()), right)
        }
        (Value::Boolean(_), Value::Nodes(r)) => {
            compare_atomic(op, left, &Value::Boolean(!r.is_empty()))
        }
        (Value::Nodes(l), other) => l
            .iter()
            .any(|a| compare_atomic(op, &atomize(a, other), other)),
        (other, Value::Nodes(r)) => r
            .iter()
            .any(|b| compare_atomic(op, other, &atomize(b, other))),
        _ => compare_atomic(op, left, right),
    }
}

/// Convert a node to the type of the value it is compared with
fn atomize<N: TreeNavigator>(item: &Item<N>, other: &Value<N>) -> Value<N> {
    let text = item.string_value();
    match other {
        Value::Number(_) => Value::Number(text.trim().parse().unwrap_or(f64::NAN)),
        _ => Value::String(text),
    }
}

fn compare_atomic<N: TreeNavigator>(op: CompareOp, left: &Value<N>, right: &Value<N>) -> bool {
    match op {
        CompareOp::Eq | CompareOp::Ne => {
            let equal = match (left, right) {
                (Value::Boolean(_), _) | (_, Value::Boolean(_)) => to_bool(left) == to_bool(right),
                (Value::Number(_), _) | (_, Value::Number(_)) => to_number(left) == to_number(right),
                _ => to_string(left) == to_string(right),
            };
            equal == (op == CompareOp::Eq)
        }
        CompareOp::Lt => to_number(left) < to_number(right),
        CompareOp::Le => to_number(left) <= to_number(right),
        CompareOp::Gt => to_number(left) > to_number(right),
        CompareOp::Ge => to_number(left) >= to_number(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal tree; nodes must be added in document order
    struct Tree {
        names: Vec<&'static str>,
        values: Vec<&'static str>,
        parents: Vec<Option<usize>>,
        children: Vec<Vec<usize>>,
    }

    impl Tree {
        fn new(root: &'static str) -> Self {
            Tree {
                names: vec![root],
                values: vec![""],
                parents: vec![None],
                children: vec![Vec::new()],
            }
        }

        fn add(&mut self, parent: usize, name: &'static str, value: &'static str) -> usize {
            let id = self.names.len();
            self.names.push(name);
            self.values.push(value);
            self.parents.push(Some(parent));
            self.children.push(Vec::new());
            self.children[parent].push(id);
            id
        }

        fn node(&self, id: usize) -> Node<'_> {
            Node { tree: self, id }
        }
    }

    #[derive(Clone, Copy, Debug)]
    struct Node<'t> {
        tree: &'t Tree,
        id: usize,
    }

    impl std::fmt::Debug for Tree {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "Tree({} nodes)", self.names.len())
        }
    }

    impl PartialEq for Node<'_> {
        fn eq(&self, other: &Self) -> bool {
            std::ptr::eq(self.tree, other.tree) && self.id == other.id
        }
    }

    impl TreeNavigator for Node<'_> {
        fn element_name(&self) -> &str {
            self.tree.names[self.id]
        }

        fn parent_node(&self) -> Option<Self> {
            self.tree.parents[self.id].map(|id| self.tree.node(id))
        }

        fn child_nodes(&self) -> Vec<Self> {
            self.tree.children[self.id].iter().map(|id| self.tree.node(*id)).collect()
        }

        fn attribute_names(&self) -> &'static [&'static str] {
            if self.tree.values[self.id].is_empty() {
                &[]
            } else {
                &["tokenValue"]
            }
        }

        fn attribute(&self, name: &str) -> Option<String> {
            let value = self.tree.values[self.id];
            (name == "tokenValue" && !value.is_empty()).then(|| value.to_string())
        }

        fn string_value(&self) -> String {
            self.tree.values[self.id].to_string()
        }

        fn document_position(&self) -> usize {
            self.id
        }
    }

    fn query(text: &str) -> XPathQuery {
        XPathQuery::compile(text).unwrap()
    }

    /// tree(branch(leaf))
    fn chain() -> Tree {
        let mut tree = Tree::new("tree");
        let branch = tree.add(0, "branch", "");
        tree.add(branch, "leaf", "");
        tree
    }

    #[test]
    fn test_select_single_node() {
        let tree = chain();
        assert_eq!(query("branch/leaf").select_single_node(tree.node(0)), Some(tree.node(2)));
    }

    #[test]
    fn test_select_single_node_no_result() {
        let tree = Tree::new("tree");
        assert_eq!(query("branch").select_single_node(tree.node(0)), None);
    }

    #[test]
    fn test_select_nodes() {
        let mut tree = Tree::new("tree");
        let branch = tree.add(0, "branch", "");
        tree.add(branch, "leaf", "");
        tree.add(branch, "leaf", "");
        assert_eq!(query("//leaf").select_nodes(tree.node(0)).len(), 2);
        assert!(query("//branch").select_nodes(tree.node(branch)).len() == 1);
        assert!(query("//twig").select_nodes(tree.node(0)).is_empty());
    }

    #[test]
    fn test_relative_and_current_paths() {
        let tree = chain();
        assert_eq!(query("leaf").select_single_node(tree.node(1)), Some(tree.node(2)));
        assert_eq!(query(".").select_single_node(tree.node(1)), Some(tree.node(1)));
        assert_eq!(query("./leaf").select_single_node(tree.node(1)), Some(tree.node(2)));
        assert_eq!(query("..").select_single_node(tree.node(1)), Some(tree.node(0)));
    }

    #[test]
    fn test_parent_then_child() {
        let mut tree = Tree::new("tree");
        let branch1 = tree.add(0, "branch1", "");
        tree.add(branch1, "leaf", "");
        let branch2 = tree.add(0, "branch2", "");
        assert_eq!(
            query("../branch2").select_single_node(tree.node(branch1)),
            Some(tree.node(branch2))
        );
    }

    #[test]
    fn test_absolute_path_and_document_root() {
        let tree = chain();
        assert_eq!(query("/tree").select_single_node(tree.node(2)), Some(tree.node(0)));
        assert_eq!(query("//tree").select_nodes(tree.node(0)).len(), 1);
        assert!(query("/").select_nodes(tree.node(0)).is_empty());
        assert!(query("/..").select_nodes(tree.node(0)).is_empty());
        // The root's parent is the document, not an element
        assert!(query("/tree/..").select_nodes(tree.node(0)).is_empty());
        assert_eq!(query("count(/tree/ancestor::node())").evaluate_number(tree.node(0)), 1.0);
    }

    #[test]
    fn test_name_and_count_predicates() {
        let mut tree = Tree::new("tree");
        tree.add(0, "branch1", "");
        tree.add(0, "branch2", "");
        tree.add(0, "branch3", "");
        let root = tree.node(0);
        assert_eq!(query(".[name() = \"tree\"]").select_single_node(root), Some(root));
        assert_eq!(query(".[count(*) = 3]").select_single_node(root), Some(root));
        assert_eq!(query(".[count(*) = 2]").select_single_node(root), None);
    }

    #[test]
    fn test_positional_predicates() {
        let mut tree = Tree::new("list");
        for value in ["a", "b", "c"] {
            tree.add(0, "item", value);
        }
        let root = tree.node(0);
        assert_eq!(query("item[2]").evaluate_string(root), "b");
        assert_eq!(query("item[last()]").evaluate_string(root), "c");
        assert_eq!(query("item[position() > 1]").select_nodes(root).len(), 2);
        assert_eq!(query("(//item)[1]").evaluate_string(root), "a");
        // Reverse axes count from the context node
        assert_eq!(
            query("preceding-sibling::item[1]").evaluate_string(tree.node(3)),
            "b"
        );
        assert_eq!(query("following-sibling::*").select_nodes(tree.node(1)).len(), 2);
    }

    #[test]
    fn test_attributes_and_comparisons() {
        let mut tree = Tree::new("file");
        let stmt = tree.add(0, "stmt", "x");
        tree.add(stmt, "ident", "x");
        tree.add(0, "stmt", "10");
        let root = tree.node(0);
        assert_eq!(query("stmt[@tokenValue = 'x']").select_nodes(root).len(), 1);
        assert_eq!(query("stmt[@tokenValue > 5]").evaluate_string(root), "10");
        assert_eq!(query("string(stmt/@tokenValue)").evaluate_string(root), "x");
        assert_eq!(query("count(//@tokenValue)").evaluate_number(root), 3.0);
        assert_eq!(query("count(//@*)").evaluate_number(root), 3.0);
        assert!(query("//ident[. = 'x' and ancestor::stmt]").evaluate_boolean(root));
        assert!(query("stmt != stmt").evaluate_boolean(root));
        assert!(!query("stmt[@tokenValue = 'y'] or false()").evaluate_boolean(root));
    }

    #[test]
    fn test_string_functions() {
        let mut tree = Tree::new("file");
        tree.add(0, "ident", "counter");
        let root = tree.node(0);
        assert!(query("contains(ident/@tokenValue, 'unt')").evaluate_boolean(root));
        assert!(query("starts-with(ident, 'co')").evaluate_boolean(root));
        assert_eq!(query("string-length(ident)").evaluate_number(root), 7.0);
        assert_eq!(query("name(*)").evaluate_string(root), "ident");
        assert!(query("not(not(ident))").evaluate_boolean(root));
    }

    #[test]
    fn test_axes() {
        let mut tree = Tree::new("a");
        let b = tree.add(0, "b", "");
        let c = tree.add(b, "c", "");
        tree.add(c, "d", "");
        let d = tree.node(3);
        assert_eq!(query("ancestor::*").select_nodes(d).len(), 3);
        assert_eq!(query("ancestor-or-self::*").select_nodes(d).len(), 4);
        assert_eq!(query("ancestor::*[1]").select_single_node(d), Some(tree.node(c)));
        assert_eq!(query("self::d").select_single_node(d), Some(d));
        assert_eq!(query("descendant::*").select_nodes(tree.node(0)).len(), 3);
        assert_eq!(query("descendant-or-self::*").select_nodes(tree.node(0)).len(), 4);
        assert_eq!(query("parent::c").select_single_node(d), Some(tree.node(c)));
        assert_eq!(query("child::c/child::d").select_single_node(tree.node(b)), Some(d));
    }

    #[test]
    fn test_results_in_document_order_without_duplicates() {
        let mut tree = Tree::new("r");
        let x = tree.add(0, "x", "");
        tree.add(x, "y", "1");
        tree.add(x, "y", "2");
        let ids: Vec<usize> = query("//y/..//y")
            .select_nodes(tree.node(0))
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            XPathQuery::compile("//a["),
            Err(XPathError::Syntax { offset: 4, .. })
        ));
        assert!(matches!(XPathQuery::compile("'open"), Err(XPathError::Syntax { offset: 0, .. })));
        assert!(matches!(XPathQuery::compile("a b"), Err(XPathError::Syntax { offset: 2, .. })));
        assert!(matches!(XPathQuery::compile("a#"), Err(XPathError::Syntax { offset: 1, .. })));
        assert!(matches!(XPathQuery::compile("bogus::a"), Err(XPathError::Syntax { .. })));
        assert!(matches!(XPathQuery::compile("count()"), Err(XPathError::Syntax { .. })));
        assert_eq!(
            XPathQuery::compile("frobnicate(a)").unwrap_err(),
            XPathError::UnknownFunction("frobnicate".to_string())
        );
    }
}
