use std::fmt;

/// The six root scopes of a CTF trace, in decoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Scope {
    PacketHeader = 0,
    PacketContext = 1,
    EventHeader = 2,
    EventCommonContext = 3,
    EventSpecificContext = 4,
    EventPayload = 5,
}

impl Scope {
    pub const ALL: [Scope; 6] = [
        Scope::PacketHeader,
        Scope::PacketContext,
        Scope::EventHeader,
        Scope::EventCommonContext,
        Scope::EventSpecificContext,
        Scope::EventPayload,
    ];

    /// Path tokens which make a path string absolute in this scope.
    pub fn absolute_prefix(&self) -> &'static [&'static str] {
        match self {
            Scope::PacketHeader => &["trace", "packet", "header"],
            Scope::PacketContext => &["stream", "packet", "context"],
            Scope::EventHeader => &["stream", "event", "header"],
            Scope::EventCommonContext => &["stream", "event", "context"],
            Scope::EventSpecificContext => &["event", "context"],
            Scope::EventPayload => &["event", "fields"],
        }
    }

    /// Finds the scope whose absolute prefix starts `tokens`.
    ///
    /// A prefix only counts when at least one token follows it.
    pub fn from_absolute_tokens(tokens: &[&str]) -> Option<Scope> {
        Self::ALL.into_iter().find(|scope| {
            let prefix = scope.absolute_prefix();
            tokens.len() > prefix.len() && tokens[..prefix.len()] == *prefix
        })
    }

    pub fn is_trace_scope(&self) -> bool {
        matches!(self, Scope::PacketHeader)
    }

    pub fn is_stream_scope(&self) -> bool {
        matches!(
            self,
            Scope::PacketContext | Scope::EventHeader | Scope::EventCommonContext
        )
    }

    /// Header scopes are decoder-only and have no IR counterpart.
    pub fn is_header(&self) -> bool {
        matches!(self, Scope::PacketHeader | Scope::EventHeader)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.absolute_prefix().join("."))
    }
}

/// One step of a field path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathIndex {
    /// Member of a structure or option of a variant.
    Member(usize),
    /// The element of an array or sequence.
    Element,
}

impl fmt::Display for PathIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathIndex::Member(i) => write!(f, "{}", i),
            PathIndex::Element => write!(f, "-1"),
        }
    }
}

/// Location of a field class relative to one of the root scopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    root: Scope,
    indexes: Vec<PathIndex>,
}

impl FieldPath {
    pub fn new(root: Scope, indexes: Vec<PathIndex>) -> Self {
        Self { root, indexes }
    }

    pub fn root(&self) -> Scope {
        self.root
    }

    pub fn indexes(&self) -> &[PathIndex] {
        &self.indexes
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Index of the lowest common ancestor of two paths within the same
    /// root scope: the first position at which they diverge.
    ///
    /// Returns `None` when one path is a prefix of the other.
    pub fn lca_index(&self, other: &FieldPath) -> Option<usize> {
        debug_assert_eq!(self.root, other.root);
        self.indexes
            .iter()
            .zip(other.indexes.iter())
            .position(|(a, b)| a != b)
    }

    /// Whether the field this path designates is decoded strictly before
    /// the field designated by `other`.
    pub fn precedes(&self, other: &FieldPath) -> bool {
        if self.root != other.root {
            return self.root < other.root;
        }

        match self.lca_index(other) {
            Some(lca) => match (self.indexes[lca], other.indexes[lca]) {
                (PathIndex::Member(a), PathIndex::Member(b)) => a < b,
                _ => false,
            },
            None => false,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.root)?;
        for index in &self.indexes {
            write!(f, ", {}", index)?;
        }
        write!(f, "]")
    }
}
