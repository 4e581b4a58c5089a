//! Tree-sitter parser integration for Ruby
//!
//! Parses with the tree-sitter Ruby grammar and lowers the concrete tree into
//! [`SyntaxNode`], keeping only what matters for constant lookup.

use super::syntax::{ConstPath, SyntaxNode};
use anyhow::{Context, Result};
use tree_sitter::{Node, Parser};

/// Produces a syntax tree for one source file.
pub trait SourceParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<SyntaxNode>;
}

/// Default parser backed by `tree-sitter-ruby`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RubyParser;

impl SourceParser for RubyParser {
    fn parse(&self, source: &str) -> Result<SyntaxNode> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_ruby::LANGUAGE.into())
            .context("Failed to set tree-sitter language")?;

        let tree = parser
            .parse(source, None)
            .context("Failed to parse source code")?;

        Ok(lower(tree.root_node(), source.as_bytes()))
    }
}

fn node_text<'a>(node: Node<'_>, source: &'a [u8]) -> Option<&'a str> {
    node.utf8_text(source).ok()
}

fn lower(node: Node<'_>, source: &[u8]) -> SyntaxNode {
    match node.kind() {
        "module" => {
            let name_node = node.child_by_field_name("name");
            SyntaxNode::Module {
                name: name_node.and_then(|n| const_path(n, source)),
                body: lower_children(node, source, &[name_node]),
            }
        }
        "class" => {
            let name_node = node.child_by_field_name("name");
            let superclass_node = node.child_by_field_name("superclass");
            SyntaxNode::Class {
                name: name_node.and_then(|n| const_path(n, source)),
                superclass: superclass_node.map(|s| Box::new(lower(s, source))),
                body: lower_children(node, source, &[name_node, superclass_node]),
            }
        }
        "singleton_class" => SyntaxNode::SingletonClass {
            body: lower_children(node, source, &[]),
        },
        "constant" | "scope_resolution" => match const_path(node, source) {
            Some(path) => SyntaxNode::Constant(path),
            // `expr::Foo`: only the receiver expression can hold references
            None => SyntaxNode::Other(
                node.child_by_field_name("scope")
                    .map(|scope| vec![lower(scope, source)])
                    .unwrap_or_default(),
            ),
        },
        "assignment" | "operator_assignment" => {
            let left = node
                .child_by_field_name("left")
                .filter(|left| const_path(*left, source).is_some());
            SyntaxNode::Other(lower_children(node, source, &[left]))
        }
        _ => SyntaxNode::Other(lower_children(node, source, &[])),
    }
}

fn lower_children(node: Node<'_>, source: &[u8], skip: &[Option<Node<'_>>]) -> Vec<SyntaxNode> {
    let skipped: Vec<usize> = skip.iter().flatten().map(Node::id).collect();
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| !skipped.contains(&child.id()))
        .map(|child| lower(child, source))
        .collect()
}

/// Static constant path for `Foo`, `Foo::Bar` or `::Foo`; `None` if any part is dynamic.
fn const_path(node: Node<'_>, source: &[u8]) -> Option<ConstPath> {
    match node.kind() {
        "constant" => Some(ConstPath::relative([node_text(node, source)?])),
        "scope_resolution" => {
            let name = node.child_by_field_name("name")?;
            if name.kind() != "constant" {
                return None;
            }
            let name = node_text(name, source)?.to_string();
            match node.child_by_field_name("scope") {
                None => Some(ConstPath::absolute([name])),
                Some(scope) => {
                    let mut path = const_path(scope, source)?;
                    path.segments.push(name);
                    Some(path)
                }
            }
        }
        _ => None,
    }
}
