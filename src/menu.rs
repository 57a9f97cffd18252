use std::rc::Rc;

use crate::choice::ChoiceId;
use crate::expr::Expr;
use crate::symbol::SymbolId;

/// Handle to a [`MenuNode`] in a [`Kconfig`](crate::Kconfig) instance's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a menu node carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuItem {
    Sym(SymbolId),
    Choice(ChoiceId),
    Menu,
    Comment,
}

/// A node in the menu tree. Every `config`, `menuconfig`, `choice`, `menu`,
/// and `comment` gets one; symbols and choices defined in several locations
/// get one per location. `if` blocks exist as items only during parsing;
/// finalization collapses them, as the C tools do.
///
/// The tree is linked through handles: `next` is the following sibling,
/// `list` the first child, `parent` the enclosing node. Submenus implied by
/// dependencies (a symbol depending on the symbol before it) are materialized
/// during finalization, so `list` can be set on symbol nodes too.
pub struct MenuNode {
    /// `None` marks an `if` node; these never survive finalization.
    pub(crate) item: Option<MenuItem>,
    pub(crate) prompt: Option<(String, Rc<Expr>)>,
    pub(crate) help: Option<String>,
    /// Effective `depends on` for the node, with parent dependencies
    /// propagated in.
    pub(crate) dep: Rc<Expr>,
    /// `visible if` conditions for menu nodes; `y` elsewhere.
    pub(crate) visibility: Rc<Expr>,
    /// Display hint: the symbol was defined with `menuconfig` here.
    pub(crate) is_menuconfig: bool,

    pub(crate) parent: Option<NodeId>,
    pub(crate) list: Option<NodeId>,
    pub(crate) next: Option<NodeId>,

    pub(crate) filename: Rc<str>,
    pub(crate) linenr: usize,
}

impl MenuNode {
    pub fn item(&self) -> Option<MenuItem> {
        self.item
    }

    /// `(text, condition)`. For menus and comments the text is the title.
    pub fn prompt(&self) -> Option<(&str, &Rc<Expr>)> {
        self.prompt.as_ref().map(|(t, c)| (t.as_str(), c))
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn dep(&self) -> &Rc<Expr> {
        &self.dep
    }

    pub fn visibility(&self) -> &Rc<Expr> {
        &self.visibility
    }

    pub fn is_menuconfig(&self) -> bool {
        self.is_menuconfig
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// First child node, or `None`.
    pub fn list(&self) -> Option<NodeId> {
        self.list
    }

    /// Next sibling node, or `None`.
    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn linenr(&self) -> usize {
        self.linenr
    }
}
