//! XPath queries over MiniC syntax trees

use lexpeg::{minic, Ast, XPathError, XPathQuery};
use rstest::{fixture, rstest};

const SOURCE: &str = "// sample\nint a;\n\nvoid f() { }\n";

#[fixture]
fn ast() -> Ast {
    minic::parser(false).unwrap().parse_str(SOURCE).unwrap().ast
}

fn query(text: &str) -> XPathQuery {
    XPathQuery::compile(text).unwrap()
}

#[rstest]
fn test_root_selection(ast: Ast) {
    let root = ast.root();
    assert_eq!(query("/COMPILATION_UNIT").select_single_node(root), Some(root));
    assert_eq!(query("/COMPILATION_UNIT[not(not(EOF))]").select_single_node(root), Some(root));
    assert_eq!(query("/DEFINITION").select_single_node(root), None);
}

#[rstest]
fn test_descendant_selection(ast: Ast) {
    let root = ast.root();
    let eof = query("//EOF").select_nodes(root);
    assert_eq!(eof.len(), 1);
    assert_eq!(eof[0].name(), "EOF");
    assert_eq!(eof[0].parent(), Some(root));
}

#[rstest]
fn test_attribute_predicate_matches_position(ast: Ast) {
    let root = ast.root();
    let by_line = query("DEFINITION[@tokenLine=4]").select_single_node(root);
    let by_position = query("DEFINITION[2]").select_single_node(root);
    assert!(by_line.is_some());
    assert_eq!(by_line, by_position);
    assert!(query("FUNCTION_DEFINITION")
        .select_single_node(by_line.unwrap())
        .is_some());
}

#[rstest]
#[case("string(/COMPILATION_UNIT/@tokenValue)", "int")]
#[case("count(//IDENTIFIER)", "2")]
#[case("count(//DEFINITION)", "2")]
#[case("name(/*)", "COMPILATION_UNIT")]
#[case("string(//DEFINITION[2]/@tokenLine)", "4")]
#[case("string(//VARIABLE_DEFINITION//IDENTIFIER)", "a")]
#[case("//FUNCTION_DEFINITION/BIN_FUNCTION_DEFINITION/IDENTIFIER/@tokenValue", "f")]
#[case("string(//IDENTIFIER[ancestor::FUNCTION_DEFINITION]/@tokenColumn)", "5")]
#[case("count(//DEFINITION[1]/following-sibling::*)", "2")]
fn test_evaluate_string(ast: Ast, #[case] text: &str, #[case] expected: &str) {
    assert_eq!(query(text).evaluate_string(ast.root()), expected);
}

#[rstest]
#[case("count(//IDENTIFIER) = 2", true)]
#[case("count(//IDENTIFIER) > 2", false)]
#[case("//IDENTIFIER = 'f'", true)]
#[case("//IDENTIFIER = 'g'", false)]
#[case("/COMPILATION_UNIT/DEFINITION and //COMPOUND_STATEMENT", true)]
#[case("starts-with(name(//DEFINITION/*), 'VARIABLE')", true)]
fn test_evaluate_boolean(ast: Ast, #[case] text: &str, #[case] expected: bool) {
    assert_eq!(query(text).evaluate_boolean(ast.root()), expected);
}

#[rstest]
fn test_relative_to_context(ast: Ast) {
    let function = query("//FUNCTION_DEFINITION").select_single_node(ast.root()).unwrap();
    assert_eq!(query("..").select_single_node(function), function.parent());
    assert_eq!(
        query("ancestor::COMPILATION_UNIT").select_single_node(function),
        Some(ast.root())
    );
    assert_eq!(query("COMPOUND_STATEMENT/*").select_nodes(function).len(), 2);
    assert!(query("preceding-sibling::*").select_nodes(function).is_empty());
    let definition = function.parent().unwrap();
    assert_eq!(query("preceding-sibling::*").select_nodes(definition).len(), 1);
}

#[rstest]
#[case("//DEFINITION[")]
#[case("/COMPILATION_UNIT/")]
#[case("@")]
#[case("count(//a, //b)")]
#[case("'unterminated")]
fn test_syntax_errors(#[case] text: &str) {
    assert!(matches!(XPathQuery::compile(text), Err(XPathError::Syntax { .. })));
}

#[test]
fn test_unknown_function() {
    assert_eq!(
        XPathQuery::compile("//IDENTIFIER[lower-case(.) = 'a']").unwrap_err(),
        XPathError::UnknownFunction("lower-case".to_string())
    );
}
