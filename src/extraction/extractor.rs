//! Reference-site extraction with lexical scope expansion.

use super::syntax::{ConstPath, SyntaxNode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How much work the extractor does per reference site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// No constant-reference resolution at all
    Off,
    /// Literal paths only, no nesting expansion
    Simple,
    /// Every lexical candidate, innermost scope first
    #[default]
    Expanded,
}

/// Ordered fully-qualified candidates for one reference site, most specific first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateGroup(Vec<String>);

impl CandidateGroup {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<&str>> for CandidateGroup {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

/// Collapses identical groups while keeping first-occurrence order.
#[derive(Default)]
struct GroupCollector {
    seen: HashSet<CandidateGroup>,
    groups: Vec<CandidateGroup>,
}

impl GroupCollector {
    fn push(&mut self, group: CandidateGroup) {
        if group.is_empty() || self.seen.contains(&group) {
            return;
        }
        self.seen.insert(group.clone());
        self.groups.push(group);
    }
}

/// Collect candidate groups for every reference site in `root`.
pub fn extract_candidates(root: &SyntaxNode, mode: ExtractionMode) -> Vec<CandidateGroup> {
    let mut collector = GroupCollector::default();
    match mode {
        ExtractionMode::Off => {}
        ExtractionMode::Simple => walk_simple(root, &mut collector),
        ExtractionMode::Expanded => walk_expanded(root, &mut Vec::new(), &mut collector),
    }
    collector.groups
}

fn walk_simple(node: &SyntaxNode, out: &mut GroupCollector) {
    match node {
        SyntaxNode::Module { name, body } => {
            if let Some(name) = name {
                out.push(literal_group(name));
            }
            body.iter().for_each(|child| walk_simple(child, out));
        }
        SyntaxNode::Class {
            name,
            superclass,
            body,
        } => {
            if let Some(name) = name {
                out.push(literal_group(name));
            }
            if let Some(superclass) = superclass {
                walk_simple(superclass, out);
            }
            body.iter().for_each(|child| walk_simple(child, out));
        }
        SyntaxNode::SingletonClass { body } | SyntaxNode::Other(body) => {
            body.iter().for_each(|child| walk_simple(child, out));
        }
        SyntaxNode::Constant(path) => out.push(literal_group(path)),
    }
}

fn walk_expanded(node: &SyntaxNode, nesting: &mut Vec<String>, out: &mut GroupCollector) {
    match node {
        SyntaxNode::Module { name, body } => {
            with_scope(name.as_ref(), nesting, |nesting| {
                body.iter()
                    .for_each(|child| walk_expanded(child, nesting, out));
            });
        }
        SyntaxNode::Class {
            name,
            superclass,
            body,
        } => {
            // the superclass is looked up from the enclosing scope
            if let Some(superclass) = superclass {
                walk_expanded(superclass, nesting, out);
            }
            with_scope(name.as_ref(), nesting, |nesting| {
                body.iter()
                    .for_each(|child| walk_expanded(child, nesting, out));
            });
        }
        SyntaxNode::SingletonClass { body } | SyntaxNode::Other(body) => {
            body.iter()
                .for_each(|child| walk_expanded(child, nesting, out));
        }
        SyntaxNode::Constant(path) => out.push(expand_with_nesting(path, nesting)),
    }
}

fn with_scope<F>(name: Option<&ConstPath>, nesting: &mut Vec<String>, body: F)
where
    F: FnOnce(&mut Vec<String>),
{
    match name {
        Some(name) => {
            nesting.push(name.qualified());
            body(nesting);
            nesting.pop();
        }
        None => body(nesting),
    }
}

fn literal_group(path: &ConstPath) -> CandidateGroup {
    CandidateGroup(vec![path.qualified()])
}

/// `N` under `[A, B]` becomes `A::B::N`, `A::N`, `N`.
///
/// Only the leftmost segment is looked up lexically, so prefixing the whole
/// path is equivalent to expanding that segment and appending the rest.
pub fn expand_with_nesting(path: &ConstPath, nesting: &[String]) -> CandidateGroup {
    let name = path.qualified();
    if path.absolute {
        return CandidateGroup(vec![name]);
    }

    let mut names = Vec::with_capacity(nesting.len() + 1);
    for depth in (1..=nesting.len()).rev() {
        names.push(format!("{}::{}", nesting[..depth].join("::"), name));
    }
    names.push(name);
    CandidateGroup(names)
}
