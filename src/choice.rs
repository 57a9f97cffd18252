use std::cell::Cell;
use std::rc::Rc;

use crate::expr::Expr;
use crate::menu::NodeId;
use crate::symbol::SymbolId;
use crate::types::{SymbolType, Tristate};

/// Handle to a [`Choice`] in a [`Kconfig`](crate::Kconfig) instance's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChoiceId(pub(crate) u32);

impl ChoiceId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Distinguishes "no cached selection" from a cached `None` (no symbol
/// selected).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SelectionCache {
    Invalid,
    Cached(Option<SymbolId>),
}

/// A `choice` block: a group of bool/tristate symbols with exclusive
/// selection. The choice itself has a tristate mode:
///
/// - `n`: not visible, no symbol selectable (optional choices only),
/// - `m`: any number of members may be `m`, none may be `y`,
/// - `y`: exactly one member is `y`, the rest `n`.
///
/// The mode and selection are computed by the owning
/// [`Kconfig`](crate::Kconfig) (`choice_value`, `choice_selection`, ...).
pub struct Choice {
    /// Named choices can be reopened from several locations. Rare.
    pub(crate) name: Option<String>,
    pub(crate) ty: SymbolType,
    pub(crate) syms: Vec<SymbolId>,
    /// `(symbol, condition)` pairs from the choice's `default`s.
    pub(crate) defaults: Vec<(Rc<Expr>, Rc<Expr>)>,
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) is_optional: bool,

    pub(crate) user_value: Option<Tristate>,
    /// The member the user set to `y`. Remembered even while the mode is not
    /// `y`, so the choice snaps back to it when the mode returns to `y`.
    pub(crate) user_selection: Option<SymbolId>,

    pub(crate) cached_vis: Cell<Option<Tristate>>,
    pub(crate) cached_assignable: Cell<Option<&'static [Tristate]>>,
    pub(crate) cached_selection: Cell<SelectionCache>,
}

impl Choice {
    pub(crate) fn new(name: Option<String>) -> Choice {
        Choice {
            name,
            ty: SymbolType::Unknown,
            syms: Vec::new(),
            defaults: Vec::new(),
            nodes: Vec::new(),
            is_optional: false,
            user_value: None,
            user_selection: None,
            cached_vis: Cell::new(None),
            cached_assignable: Cell::new(None),
            cached_selection: Cell::new(SelectionCache::Invalid),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The declared type; inherited from the first typed member if the
    /// choice block itself carries none.
    pub fn raw_type(&self) -> SymbolType {
        self.ty
    }

    /// Member symbols, in definition order. Symbols that depend on an
    /// earlier member form an implicit submenu instead and are not members.
    pub fn syms(&self) -> &[SymbolId] {
        &self.syms
    }

    pub fn defaults(&self) -> &[(Rc<Expr>, Rc<Expr>)] {
        &self.defaults
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn is_optional(&self) -> bool {
        self.is_optional
    }

    /// The mode picked by the user, or `None`. Assigning `y`/`m` to a member
    /// symbol also sets this, which makes `.config` loading work naturally.
    pub fn user_value(&self) -> Option<Tristate> {
        self.user_value
    }

    pub fn user_selection(&self) -> Option<SymbolId> {
        self.user_selection
    }

    pub(crate) fn invalidate(&self) {
        self.cached_vis.set(None);
        self.cached_assignable.set(None);
        self.cached_selection.set(SelectionCache::Invalid);
    }
}
