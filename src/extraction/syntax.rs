//! Minimal syntax model the extractor walks.
//!
//! Parsers lower their own trees into this shape; only the constructs that
//! affect constant lookup are distinguished, everything else is `Other`.

/// A `::`-separated constant path as written in source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstPath {
    /// Written with a leading `::` (top-level lookup only)
    pub absolute: bool,
    pub segments: Vec<String>,
}

impl ConstPath {
    pub fn relative<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            absolute: false,
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn absolute<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            absolute: true,
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse `A::B` or `::A::B`. Returns `None` for empty segments.
    pub fn parse(text: &str) -> Option<Self> {
        let (absolute, rest) = match text.strip_prefix("::") {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let segments: Vec<String> = rest.split("::").map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return None;
        }
        Some(Self { absolute, segments })
    }

    /// The path joined with `::`, without a leading `::`.
    pub fn qualified(&self) -> String {
        self.segments.join("::")
    }
}

impl std::fmt::Display for ConstPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.absolute {
            write!(f, "::")?;
        }
        write!(f, "{}", self.qualified())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxNode {
    /// `module Name ... end`; `name` is `None` when it is not a static path
    Module {
        name: Option<ConstPath>,
        body: Vec<SyntaxNode>,
    },
    /// `class Name < Superclass ... end`
    Class {
        name: Option<ConstPath>,
        superclass: Option<Box<SyntaxNode>>,
        body: Vec<SyntaxNode>,
    },
    /// `class << target ... end`; does not open a new lexical scope
    SingletonClass { body: Vec<SyntaxNode> },
    /// A constant read
    Constant(ConstPath),
    /// Any other construct; only its children matter
    Other(Vec<SyntaxNode>),
}

impl SyntaxNode {
    /// Convenience for building trees by hand.
    pub fn constant(text: &str) -> Self {
        match ConstPath::parse(text) {
            Some(path) => Self::Constant(path),
            None => Self::Other(Vec::new()),
        }
    }

    pub fn module(name: &str, body: Vec<SyntaxNode>) -> Self {
        Self::Module {
            name: ConstPath::parse(name),
            body,
        }
    }

    pub fn class(name: &str, superclass: Option<SyntaxNode>, body: Vec<SyntaxNode>) -> Self {
        Self::Class {
            name: ConstPath::parse(name),
            superclass: superclass.map(Box::new),
            body,
        }
    }
}
