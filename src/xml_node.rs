//! XML rendering of syntax trees
//!
//! Every node becomes an element named after its rule or token type. Nodes
//! carrying a token get `tokenValue`, `tokenLine` and `tokenColumn`
//! attributes, the same names the XPath adapter exposes.

use crate::ast::{Ast, AstNode};

#[derive(Debug, Clone, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn from_ast(node: AstNode<'_>) -> XmlNode {
        // Each entry is an element under construction and its children still
        // to convert, in reverse
        let mut stack = vec![(Self::shell(node), Self::pending_children(node))];
        loop {
            let next = stack.last_mut().and_then(|(_, pending)| pending.pop());
            if let Some(child) = next {
                stack.push((Self::shell(child), Self::pending_children(child)));
                continue;
            }
            let (done, _) = match stack.pop() {
                Some(entry) => entry,
                None => unreachable!("the root entry is only popped once"),
            };
            match stack.last_mut() {
                Some((parent, _)) => parent.children.push(done),
                None => return done,
            }
        }
    }

    fn shell(node: AstNode<'_>) -> XmlNode {
        let attributes = match node.token() {
            Some(token) => vec![
                ("tokenValue".to_string(), token.value().to_string()),
                ("tokenLine".to_string(), token.line().to_string()),
                ("tokenColumn".to_string(), token.column().to_string()),
            ],
            None => Vec::new(),
        };
        XmlNode {
            name: node.name().to_string(),
            attributes,
            children: Vec::new(),
        }
    }

    fn pending_children(node: AstNode<'_>) -> Vec<AstNode<'_>> {
        node.children().rev().collect()
    }

    fn escape_xml_attr(s: &str) -> String {
        // Attribute values are single-quoted
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('\'', "&apos;")
    }

    fn open_tag(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attributes {
            out.push_str(&format!(" {}='{}'", k, Self::escape_xml_attr(v)));
        }
    }

    /// Single-line XML
    pub fn to_xml(&self) -> String {
        self.write(false)
    }

    /// One element per line, indented by two spaces per level
    pub fn to_xml_pretty(&self) -> String {
        self.write(true)
    }

    fn write(&self, pretty: bool) -> String {
        let newline = if pretty { "\n" } else { "" };
        let mut out = String::new();
        // (element, depth, closing)
        let mut stack = vec![(self, 0usize, false)];
        while let Some((node, depth, closing)) = stack.pop() {
            let indent = if pretty { "  ".repeat(depth) } else { String::new() };
            if closing {
                out.push_str(&format!("{}</{}>{}", indent, node.name, newline));
                continue;
            }
            out.push_str(&indent);
            node.open_tag(&mut out);
            if node.children.is_empty() {
                out.push_str("/>");
                out.push_str(newline);
                continue;
            }
            out.push('>');
            out.push_str(newline);
            stack.push((node, depth, true));
            stack.extend(node.children.iter().rev().map(|child| (child, depth + 1, false)));
        }
        out
    }
}

impl Drop for XmlNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

impl Ast {
    /// Pretty-printed XML dump of the whole tree
    pub fn to_xml(&self) -> String {
        XmlNode::from_ast(self.root()).to_xml_pretty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfamily::{self, NUMBER};
    use crate::grammar::GrammarBuilder;
    use crate::seq;
    use crate::token::{EOF, IDENTIFIER};

    fn parse(text: &str) -> Ast {
        let mut g = GrammarBuilder::new();
        let root = g.rule("Root");
        let value = g.rule("Value");
        g.define(root, seq![&IDENTIFIER, "=", value, &EOF]).unwrap();
        g.define(value, crate::first_of![&NUMBER, &cfamily::STRING]).unwrap();
        g.set_root(root);
        let compiled = g.build().compile().unwrap();
        crate::machine::parse(&compiled, &cfamily::lexer().lex(text).unwrap()).unwrap()
    }

    #[test]
    fn test_compact_xml() {
        let ast = parse("x = 1");
        let xml = XmlNode::from_ast(ast.root()).to_xml();
        assert_eq!(
            xml,
            "<Root tokenValue='x' tokenLine='1' tokenColumn='0'>\
             <IDENTIFIER tokenValue='x' tokenLine='1' tokenColumn='0'/>\
             <ASSIGN tokenValue='=' tokenLine='1' tokenColumn='2'/>\
             <Value tokenValue='1' tokenLine='1' tokenColumn='4'>\
             <NUMBER tokenValue='1' tokenLine='1' tokenColumn='4'/>\
             </Value>\
             <EOF tokenValue='EOF' tokenLine='1' tokenColumn='5'/>\
             </Root>"
        );
    }

    #[test]
    fn test_escaping() {
        let ast = parse("x = \"a<'&'>\"");
        let xml = XmlNode::from_ast(ast.root()).to_xml();
        assert!(xml.contains("tokenValue='\"a&lt;&apos;&amp;&apos;>\"'"));
    }

    #[test]
    fn test_pretty_xml() {
        let ast = parse("x = 1");
        let xml = ast.to_xml();
        let lines: Vec<&str> = xml.lines().collect();
        assert_eq!(lines.len(), 8);
        assert!(lines[0].starts_with("<Root "));
        assert!(lines[3].starts_with("  <Value "));
        assert!(lines[4].starts_with("    <NUMBER "));
        assert_eq!(lines[7], "</Root>");
    }
}
