//! Rowan language glue for runtime-defined grammars.
//!
//! Node kinds are grammar symbol ids at runtime, so the rowan `Language`
//! impl is a thin transparent wrapper over the raw `u16` kind, with the
//! reserved error kind sitting above the symbol index space.

use crate::base::SymbolId;

/// A tree kind: either a grammar symbol id or the reserved error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKind(pub u16);

/// Synthetic kind for error markers: nodes wrapping skipped input and
/// tokens holding not-yet-reparsed spliced text.
pub const ERROR_KIND: NodeKind = NodeKind(u16::MAX - 1);

impl NodeKind {
    pub fn is_error(self) -> bool {
        self == ERROR_KIND
    }

    /// The grammar symbol behind this kind, unless it is a reserved kind.
    pub fn symbol(self) -> Option<SymbolId> {
        if self.is_error() { None } else { Some(SymbolId(self.0)) }
    }
}

impl From<SymbolId> for NodeKind {
    fn from(id: SymbolId) -> Self {
        NodeKind(id.0)
    }
}

/// Marker type for rowan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cst {}

impl rowan::Language for Cst {
    type Kind = NodeKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        NodeKind(raw.0)
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        rowan::SyntaxKind(kind.0)
    }
}

pub type SyntaxNode = rowan::SyntaxNode<Cst>;
pub type SyntaxToken = rowan::SyntaxToken<Cst>;
pub type SyntaxElement = rowan::SyntaxElement<Cst>;

/// Bottom-up green construction currency used by the parse engine.
pub(crate) type GreenElement = rowan::NodeOrToken<rowan::GreenNode, rowan::GreenToken>;

pub(crate) fn raw(kind: NodeKind) -> rowan::SyntaxKind {
    rowan::SyntaxKind(kind.0)
}
