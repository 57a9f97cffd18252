use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fxhash::FxHashSet;

use crate::choice::ChoiceId;
use crate::expr::Expr;
use crate::menu::NodeId;
use crate::types::{SymbolType, Tristate};

/// Handle to a [`Symbol`] in a [`Kconfig`](crate::Kconfig) instance's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub(crate) u32);

impl SymbolId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A configuration symbol:
///
/// ```text
/// (menu)config FOO
///     ...
/// ```
///
/// Prompts and help texts live on the symbol's [`MenuNode`](crate::MenuNode)s
/// rather than the symbol itself, matching the C tools. Everything that can
/// change after parsing (the user value and the computed-value caches) sits
/// behind `Cell`/`RefCell` so reads stay shared.
///
/// Value, visibility, and assignability are computed by the owning
/// [`Kconfig`](crate::Kconfig) instance (`sym_str_value`, `sym_tri_value`,
/// `sym_visibility`, `sym_assignable`), since they depend on the whole
/// expression graph.
pub struct Symbol {
    pub(crate) name: String,
    pub(crate) ty: SymbolType,
    pub(crate) is_constant: bool,

    /// Menu nodes defining this symbol, in parse order. Empty for symbols
    /// that are only referenced.
    pub(crate) nodes: Vec<NodeId>,

    /// `(value, condition)` pairs from `default` properties.
    pub(crate) defaults: Vec<(Rc<Expr>, Rc<Expr>)>,
    /// `(target, condition)` pairs from `select` properties.
    pub(crate) selects: Vec<(SymbolId, Rc<Expr>)>,
    /// `(target, condition)` pairs from `imply` properties.
    pub(crate) implies: Vec<(SymbolId, Rc<Expr>)>,
    /// `(low, high, condition)` triples from `range` properties. The bounds
    /// are symbols; numeric literals parse into undefined symbols whose
    /// string value is their own name.
    pub(crate) ranges: Vec<(SymbolId, SymbolId, Rc<Expr>)>,

    /// OR of `selecting_symbol && condition` over every `select` targeting
    /// this symbol. Grows only during parsing.
    pub(crate) rev_dep: Rc<Expr>,
    /// Like `rev_dep`, for `imply`.
    pub(crate) weak_rev_dep: Rc<Expr>,
    /// OR of the `depends on` context over every definition location.
    pub(crate) direct_dep: Rc<Expr>,

    /// Set for symbols that are members of a choice.
    pub(crate) choice: Option<ChoiceId>,
    /// Environment variable named in `option env="..."`. Symbols bound to
    /// the environment never appear in written `.config` files.
    pub(crate) env_var: Option<String>,
    pub(crate) is_allnoconfig_y: bool,

    pub(crate) user_value: Option<String>,

    // Caches managed by the value engine.
    pub(crate) cached_str: RefCell<Option<String>>,
    pub(crate) cached_vis: Cell<Option<Tristate>>,
    pub(crate) cached_assignable: Cell<Option<&'static [Tristate]>>,
    pub(crate) write_to_conf: Cell<bool>,
    pub(crate) already_written: Cell<bool>,

    /// Symbols whose value may change when this symbol's value changes.
    /// Populated once during finalization; the transitive closure is cached
    /// in `cached_deps` on first invalidation.
    pub(crate) direct_dependents: FxHashSet<SymbolId>,
    pub(crate) cached_deps: RefCell<Option<Rc<Vec<SymbolId>>>>,
}

impl Symbol {
    pub(crate) fn new(name: String, is_constant: bool) -> Symbol {
        Symbol {
            name,
            ty: SymbolType::Unknown,
            is_constant,
            nodes: Vec::new(),
            defaults: Vec::new(),
            selects: Vec::new(),
            implies: Vec::new(),
            ranges: Vec::new(),
            // Placeholder; the instance rewires these to its `n` constant
            // right after allocation.
            rev_dep: Rc::new(Expr::Sym(SymbolId(0))),
            weak_rev_dep: Rc::new(Expr::Sym(SymbolId(0))),
            direct_dep: Rc::new(Expr::Sym(SymbolId(0))),
            choice: None,
            env_var: None,
            is_allnoconfig_y: false,
            user_value: None,
            cached_str: RefCell::new(None),
            cached_vis: Cell::new(None),
            cached_assignable: Cell::new(None),
            write_to_conf: Cell::new(false),
            already_written: Cell::new(false),
            direct_dependents: FxHashSet::default(),
            cached_deps: RefCell::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type. The *effective* type can differ: tristate symbols
    /// act as bool when modules are disabled or inside a `y`-mode choice;
    /// see [`Kconfig::sym_type`](crate::Kconfig::sym_type).
    pub fn raw_type(&self) -> SymbolType {
        self.ty
    }

    /// True for constant symbols (`y`/`m`/`n` and quoted strings interned
    /// from expressions).
    pub fn is_constant(&self) -> bool {
        self.is_constant
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn defaults(&self) -> &[(Rc<Expr>, Rc<Expr>)] {
        &self.defaults
    }

    pub fn selects(&self) -> &[(SymbolId, Rc<Expr>)] {
        &self.selects
    }

    pub fn implies(&self) -> &[(SymbolId, Rc<Expr>)] {
        &self.implies
    }

    pub fn ranges(&self) -> &[(SymbolId, SymbolId, Rc<Expr>)] {
        &self.ranges
    }

    pub fn rev_dep(&self) -> &Rc<Expr> {
        &self.rev_dep
    }

    pub fn weak_rev_dep(&self) -> &Rc<Expr> {
        &self.weak_rev_dep
    }

    pub fn direct_dep(&self) -> &Rc<Expr> {
        &self.direct_dep
    }

    pub fn choice(&self) -> Option<ChoiceId> {
        self.choice
    }

    pub fn env_var(&self) -> Option<&str> {
        self.env_var.as_deref()
    }

    pub fn is_allnoconfig_y(&self) -> bool {
        self.is_allnoconfig_y
    }

    /// The value assigned through `set_value()`/`.config` loading, or `None`.
    /// Does not necessarily match the computed value: visibility and reverse
    /// dependencies take precedence.
    pub fn user_value(&self) -> Option<&str> {
        self.user_value.as_deref()
    }

    /// A symbol is defined once some `config`/`menuconfig` block names it.
    pub fn is_defined(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub(crate) fn invalidate(&self) {
        *self.cached_str.borrow_mut() = None;
        self.cached_vis.set(None);
        self.cached_assignable.set(None);
    }
}
