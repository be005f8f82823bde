//! End-to-end scenarios: source text through lexer, grammar and machine

use lexpeg::cfamily::{self, keyword, punctuator, NUMBER};
use lexpeg::recovery::{self, skip_until};
use lexpeg::xml_node::XmlNode;
use lexpeg::{
    first_of, parse, seq, zero_or_more, AstNodeType, AstVisitor, AstWalker, FailureReason,
    GrammarBuilder, GrammarError, LexerConfig, Token, TokenClass, TriviaKind, EOF, IDENTIFIER,
};
use rstest::rstest;

#[rstest]
#[case("1+2-3", vec!["1", "+", "2", "-", "3"])]
#[case("7", vec!["7"])]
#[case("10 - 20 + 30 - 40", vec!["10", "-", "20", "+", "30", "-", "40"])]
fn test_additive_expression(#[case] text: &str, #[case] expected: Vec<&str>) {
    // Expr := Term (("+" | "-") Term)* ; Term := NUMBER
    let mut g = GrammarBuilder::new();
    let expr = g.rule("Expr");
    let term = g.rule("Term");
    g.define(
        expr,
        seq![term, zero_or_more(seq![first_of!["+", "-"], term])],
    )
    .unwrap();
    g.define(term, &NUMBER).unwrap().skip();
    g.set_root(expr);
    let grammar = g.build().compile().unwrap();

    let tokens = cfamily::lexer().lex(text).unwrap();
    let ast = parse(&grammar, &tokens).unwrap();
    let root = ast.root();
    assert_eq!(root.name(), "Expr");
    let values: Vec<&str> = root.children().map(|c| c.token_value()).collect();
    assert_eq!(values, expected);
    assert!(root.children().all(|c| c.node_type() != AstNodeType::Rule(term)));
    assert!(root.first_child().unwrap().is(&NUMBER));
}

#[rstest]
#[case("\t")]
#[case(" \t \r\n\t")]
#[case("\\\n")]
fn test_whitespace_only_input(#[case] text: &str) {
    let tokens = cfamily::lexer().lex(text).unwrap();
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is(&EOF));
    assert!(!tokens[0].has_trivia());

    let retained = cfamily::standard_lexer(&LexerConfig::default().with_retain_whitespace(true))
        .lex(text)
        .unwrap();
    assert_eq!(retained.len(), 1);
    let eof = &retained[0];
    assert!(eof.trivia().iter().all(|t| t.kind() == TriviaKind::Skipped));
    let text_back: String = eof.trivia().iter().map(|t| t.text()).collect();
    assert_eq!(text_back, text);
}

#[test]
fn test_comment_attached_as_trivia() {
    // Decl := "int" IDENTIFIER ";" EOF
    let mut g = GrammarBuilder::new();
    let decl = g.rule("Decl");
    g.define(decl, seq![&keyword::INT, &IDENTIFIER, ";", &EOF])
        .unwrap();
    g.set_root(decl);
    let grammar = g.build().compile().unwrap();

    let tokens = cfamily::lexer().lex("/* hello */ int x;").unwrap();
    let int = &tokens[0];
    assert!(int.is(&keyword::INT));
    assert_eq!(int.column(), 12);
    assert_eq!(int.trivia().len(), 1);
    assert!(int.trivia()[0].is_comment());
    assert_eq!(int.trivia()[0].text(), "/* hello */");

    let ast = parse(&grammar, &tokens).unwrap();
    let root = ast.root();
    assert_eq!(root.number_of_children(), 4);
    assert!(root
        .descendants()
        .iter()
        .all(|n| n.token().map_or(true, |t| t.token_type().class() != TokenClass::Comment)));
    assert_eq!(root.token().unwrap().trivia()[0].text(), "/* hello */");
}

#[rstest]
#[case(true)]
#[case(false)]
fn test_left_recursive_cycle_fails_cleanly(#[case] memoize: bool) {
    let mut g = GrammarBuilder::new();
    let a = g.rule("A");
    let b = g.rule("B");
    g.define(a, b).unwrap();
    g.define(b, a).unwrap();
    g.set_root(a);
    let grammar = g.build().compile().unwrap();

    let tokens = cfamily::lexer().lex("x y z").unwrap();
    let config = lexpeg::ParserConfig::default().with_memoize(memoize);
    let failure = lexpeg::parse_with(&grammar, &tokens, &config).unwrap_err();
    assert!(matches!(failure.reason, FailureReason::LeftRecursion { .. }));
    assert_eq!(failure.line, 1);
    assert_eq!(failure.column, 0);
}

#[test]
fn test_recovery_on_semicolon() {
    // File := (Stmt | Recovered)* EOF ; Recovered := skip_until(";")
    let mut g = GrammarBuilder::new();
    let file = g.rule("File");
    let stmt = g.rule("Stmt");
    let recovered = g.rule("Recovered");
    g.define(file, seq![zero_or_more(first_of![stmt, recovered]), &EOF])
        .unwrap();
    g.define(stmt, seq![&IDENTIFIER, "=", &NUMBER, ";"]).unwrap();
    g.define(recovered, skip_until(&punctuator::SEMICOLON))
        .unwrap()
        .recovery();
    g.set_root(file);
    let grammar = g.build().compile().unwrap();

    let tokens = cfamily::lexer()
        .lex("a = 1;\nb = = 2 +;\nc = 3;")
        .unwrap();
    let ast = parse(&grammar, &tokens).unwrap();
    let markers = ast.root().children_of(recovered);
    assert_eq!(markers.len(), 1);
    assert_eq!(ast.root().children_of(stmt).len(), 2);

    let marker = markers[0];
    let skipped: Vec<&str> = marker.tokens().iter().map(|t| t.value()).collect();
    assert_eq!(skipped, vec!["b", "=", "=", "2", "+", ";"]);

    let diagnostics = recovery::diagnostics(&ast);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].last_token, ";");
    assert_eq!(diagnostics[0].line, 2);
    assert_eq!(diagnostics[0].position, 4);
}

#[test]
fn test_single_definition_and_override() {
    let mut g = GrammarBuilder::new();
    let rule = g.rule("Rule");
    g.define(rule, "a").unwrap();
    assert_eq!(
        g.define(rule, "b").err(),
        Some(GrammarError::DefinitionConflict {
            rule: "Rule".to_string()
        })
    );
    g.override_definition(rule, "c");
    g.override_definition(rule, "d");
    g.set_root(rule);
    let grammar = g.build().compile().unwrap();
    assert!(parse(&grammar, &cfamily::lexer().lex("d").unwrap()).is_ok());
    assert!(parse(&grammar, &cfamily::lexer().lex("a").unwrap()).is_err());
}

#[test]
fn test_unresolved_reference() {
    let mut g = GrammarBuilder::new();
    let root = g.rule("Root");
    let missing = g.rule("Missing");
    g.define(root, seq!["x", missing]).unwrap();
    g.set_root(root);
    assert_eq!(
        g.build().compile().err(),
        Some(GrammarError::UnresolvedRule {
            rule: "Missing".to_string(),
            referenced_from: "Root".to_string(),
        })
    );
}

#[test]
fn test_ordered_choice_prefers_first_alternative() {
    let mut g = GrammarBuilder::new();
    let root = g.rule("Root");
    let name = g.rule("Name");
    let word = g.rule("Word");
    g.define(root, seq![first_of![name, word], &EOF]).unwrap();
    g.define(name, &IDENTIFIER).unwrap();
    g.define(word, &IDENTIFIER).unwrap();
    g.set_root(root);
    let grammar = g.build().compile().unwrap();

    for _ in 0..3 {
        let ast = parse(&grammar, &cfamily::lexer().lex("hello").unwrap()).unwrap();
        assert_eq!(ast.root().first_child().unwrap().name(), "Name");
    }
}

#[test]
fn test_deeply_nested_input() {
    // File := Item EOF ; Item := "(" Item ")" | NUMBER
    let mut g = GrammarBuilder::new();
    let file = g.rule("File");
    let item = g.rule("Item");
    g.define(file, seq![item, &EOF]).unwrap();
    g.define(item, first_of![seq!["(", item, ")"], &NUMBER])
        .unwrap();
    g.set_root(file);
    let grammar = g.build().compile().unwrap();

    let depth = 100_000;
    let text = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    let tokens = cfamily::lexer().lex(&text).unwrap();
    let ast = parse(&grammar, &tokens).unwrap();

    assert_eq!(ast.root().descendants_of(item).len(), depth + 1);
    let number = ast.root().first_descendant(&NUMBER).unwrap();
    assert_eq!(number.token_value(), "1");
    assert_eq!(number.next_ast_node().unwrap().token_value(), ")");
    assert_eq!(number.ancestors().count(), depth + 2);

    let mut counter = TokenCounter::default();
    AstWalker::new().with_visitor(&mut counter).walk(&ast);
    assert_eq!(counter.tokens, tokens.len());

    let xml = XmlNode::from_ast(ast.root()).to_xml();
    assert!(xml.starts_with("<File "));
    assert!(xml.ends_with("</File>"));
}

#[derive(Default)]
struct TokenCounter {
    tokens: usize,
}

impl AstVisitor for TokenCounter {
    fn visit_token(&mut self, _token: &Token) {
        self.tokens += 1;
    }
}
