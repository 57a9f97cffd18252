use std::cell::{Cell, Ref, RefCell};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::{env, fs};

use indexmap::IndexMap;
use regex::Regex;

use crate::choice::{Choice, ChoiceId};
use crate::expr::Expr;
use crate::menu::{MenuItem, MenuNode, NodeId};
use crate::symbol::{Symbol, SymbolId};
use crate::types::{parse_num, SymbolType, Tristate};
use crate::{finalize, parser, KconfigResult};

/// A parsed Kconfig configuration: the symbols, choices, and menu nodes of
/// one Kconfig file tree, plus the machinery to evaluate and (re)write it.
///
/// Instances are fully independent; nothing is process-global. An instance
/// is not meant for concurrent mutation, but separate instances can live on
/// separate threads.
///
/// Entities are stored in arenas on the instance and addressed by handle
/// ([`SymbolId`], [`ChoiceId`], [`NodeId`]); this keeps the inherently
/// cyclic symbol graph free of ownership cycles.
pub struct Kconfig {
    pub(crate) syms: Vec<Symbol>,
    pub(crate) choices: Vec<Choice>,
    pub(crate) nodes: Vec<MenuNode>,

    /// Named (non-constant) symbols, in first-reference order.
    pub(crate) sym_table: IndexMap<String, SymbolId>,
    /// Constant symbols: `n`/`m`/`y` plus interned quoted strings.
    pub(crate) const_table: IndexMap<String, SymbolId>,
    pub(crate) named_choices: IndexMap<String, ChoiceId>,
    /// Symbols in definition order; one entry per definition location.
    pub(crate) defined_syms: Vec<SymbolId>,

    pub(crate) top: NodeId,

    pub(crate) n: SymbolId,
    pub(crate) m: SymbolId,
    pub(crate) y: SymbolId,
    pub(crate) expr_n: Rc<Expr>,
    pub(crate) expr_m: Rc<Expr>,
    pub(crate) expr_y: Rc<Expr>,

    /// The modules symbol. Hardcoded to `MODULES`; `option modules` on any
    /// other symbol warns, like the C tools of the same era.
    pub(crate) modules: SymbolId,
    pub(crate) defconfig_list: Option<SymbolId>,

    pub(crate) srctree: Option<PathBuf>,
    pub(crate) config_prefix: String,
    pub(crate) default_config_path: PathBuf,
    pub(crate) set_re: Regex,
    pub(crate) unset_re: Regex,

    pub(crate) warnings: RefCell<Vec<String>>,
    pub(crate) warn_enabled: Cell<bool>,
    pub(crate) warn_to_stderr: Cell<bool>,
    pub(crate) warn_undef: Cell<bool>,
    pub(crate) config_changed: Cell<bool>,
}

impl Kconfig {
    /// Parses the Kconfig file at `path` (and everything it sources) and
    /// finalizes the menu tree.
    ///
    /// The environment is captured at this point: `$srctree` roots `source`
    /// lookups, `$CONFIG_` overrides the `.config` symbol prefix, and
    /// `$KCONFIG_CONFIG` sets the default `.config` path. Changing them
    /// afterwards has no effect on this instance.
    pub fn load<P: AsRef<Path>>(path: P) -> KconfigResult<Kconfig> {
        let mut kc = Kconfig::new_instance(path.as_ref());
        parser::parse_kconfig(&mut kc, path.as_ref())?;
        finalize::finalize(&mut kc);
        Ok(kc)
    }

    fn new_instance(path: &Path) -> Kconfig {
        let srctree = env::var_os("srctree").map(PathBuf::from);
        let config_prefix = env::var("CONFIG_").unwrap_or_else(|_| "CONFIG_".to_owned());
        let default_config_path = env::var_os("KCONFIG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".config"));

        let set_re = Regex::new(&format!(
            r"^{}([A-Za-z0-9_]+)=(.*)",
            regex::escape(&config_prefix)
        ))
        .unwrap();
        let unset_re = Regex::new(&format!(
            r"^# {}([A-Za-z0-9_]+) is not set",
            regex::escape(&config_prefix)
        ))
        .unwrap();

        let mut kc = Kconfig {
            syms: Vec::new(),
            choices: Vec::new(),
            nodes: Vec::new(),
            sym_table: IndexMap::new(),
            const_table: IndexMap::new(),
            named_choices: IndexMap::new(),
            defined_syms: Vec::new(),
            top: NodeId(0),
            n: SymbolId(0),
            m: SymbolId(1),
            y: SymbolId(2),
            expr_n: Rc::new(Expr::Sym(SymbolId(0))),
            expr_m: Rc::new(Expr::Sym(SymbolId(1))),
            expr_y: Rc::new(Expr::Sym(SymbolId(2))),
            modules: SymbolId(0),
            defconfig_list: None,
            srctree,
            config_prefix,
            default_config_path,
            set_re,
            unset_re,
            warnings: RefCell::new(Vec::new()),
            warn_enabled: Cell::new(true),
            warn_to_stderr: Cell::new(true),
            warn_undef: Cell::new(false),
            config_changed: Cell::new(false),
        };

        // The constant symbols. Their value is fixed up front and they are
        // never invalidated.
        for name in ["n", "m", "y"] {
            let id = SymbolId(kc.syms.len() as u32);
            let mut sym = Symbol::new(name.to_owned(), true);
            sym.ty = SymbolType::Tristate;
            *sym.cached_str.borrow_mut() = Some(name.to_owned());
            kc.syms.push(sym);
            kc.const_table.insert(name.to_owned(), id);
        }
        for id in [kc.n, kc.m, kc.y] {
            let sym = &mut kc.syms[id.index()];
            sym.rev_dep = Rc::clone(&kc.expr_n);
            sym.weak_rev_dep = Rc::clone(&kc.expr_n);
            sym.direct_dep = Rc::clone(&kc.expr_n);
        }

        kc.modules = kc.lookup_sym("MODULES");

        let filename: Rc<str> = Rc::from(path.to_string_lossy().as_ref());
        let top = MenuNode {
            item: Some(MenuItem::Menu),
            prompt: Some(("Linux Kernel Configuration".to_owned(), Rc::clone(&kc.expr_y))),
            help: None,
            dep: Rc::clone(&kc.expr_y),
            visibility: Rc::clone(&kc.expr_y),
            is_menuconfig: false,
            parent: None,
            list: None,
            next: None,
            filename,
            linenr: 1,
        };
        kc.top = NodeId(0);
        kc.nodes.push(top);

        kc
    }

    //
    // Entity access
    //

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.syms[id.index()]
    }

    pub(crate) fn sym_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.syms[id.index()]
    }

    pub fn choice(&self, id: ChoiceId) -> &Choice {
        &self.choices[id.index()]
    }

    pub(crate) fn choice_mut(&mut self, id: ChoiceId) -> &mut Choice {
        &mut self.choices[id.index()]
    }

    pub fn node(&self, id: NodeId) -> &MenuNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut MenuNode {
        &mut self.nodes[id.index()]
    }

    /// Looks up a (non-constant) symbol by name.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.sym_table.get(name).copied()
    }

    /// Looks up a constant symbol by name (`"y"`, interned strings, ...).
    pub fn lookup_const(&self, name: &str) -> Option<SymbolId> {
        self.const_table.get(name).copied()
    }

    /// All named symbols, in first-reference order. Includes symbols that
    /// are referenced but never defined.
    pub fn syms(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.sym_table.values().copied()
    }

    /// Defined symbols in definition order, one entry per definition
    /// location (a symbol defined twice appears twice).
    pub fn defined_syms(&self) -> &[SymbolId] {
        &self.defined_syms
    }

    /// Defined symbols in definition order, each exactly once.
    pub fn unique_defined_syms(&self) -> Vec<SymbolId> {
        let mut seen = fxhash::FxHashSet::default();
        self.defined_syms
            .iter()
            .copied()
            .filter(|&id| seen.insert(id))
            .collect()
    }

    pub fn choices(&self) -> impl Iterator<Item = ChoiceId> + '_ {
        (0..self.choices.len() as u32).map(ChoiceId)
    }

    /// The root of the menu tree.
    pub fn top_node(&self) -> NodeId {
        self.top
    }

    /// The top menu title, settable with `mainmenu`.
    pub fn mainmenu_text(&self) -> &str {
        self.node(self.top)
            .prompt
            .as_ref()
            .map(|(t, _)| t.as_str())
            .unwrap_or("")
    }

    pub fn modules_sym(&self) -> SymbolId {
        self.modules
    }

    pub fn defconfig_list_sym(&self) -> Option<SymbolId> {
        self.defconfig_list
    }

    pub fn srctree(&self) -> Option<&Path> {
        self.srctree.as_deref()
    }

    pub fn config_prefix(&self) -> &str {
        &self.config_prefix
    }

    /// The `.config` path from `$KCONFIG_CONFIG`, or `.config`.
    pub fn default_config_path(&self) -> &Path {
        &self.default_config_path
    }

    /// True once a `load_config()` changed the effective value of some
    /// defined symbol.
    pub fn config_changed(&self) -> bool {
        self.config_changed.get()
    }

    //
    // Symbol registration (used by the tokenizer/parser)
    //

    pub(crate) fn lookup_sym(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.sym_table.get(name) {
            return id;
        }
        let id = self.alloc_sym(name, false);
        self.sym_table.insert(name.to_owned(), id);
        id
    }

    pub(crate) fn lookup_const_sym(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.const_table.get(name) {
            return id;
        }
        let id = self.alloc_sym(name, true);
        self.const_table.insert(name.to_owned(), id);
        id
    }

    pub(crate) fn new_choice(&mut self, name: Option<String>) -> ChoiceId {
        let id = ChoiceId(self.choices.len() as u32);
        self.choices.push(Choice::new(name));
        id
    }

    /// Named choices can be reopened: the same name maps to the same choice.
    pub(crate) fn lookup_named_choice(&mut self, name: &str) -> ChoiceId {
        if let Some(&id) = self.named_choices.get(name) {
            return id;
        }
        let id = self.new_choice(Some(name.to_owned()));
        self.named_choices.insert(name.to_owned(), id);
        id
    }

    /// Allocates a symbol without registering it in any table. Used for
    /// `eval_string()` references to unknown symbols, which must not leak
    /// into the configuration.
    pub(crate) fn alloc_sym(&mut self, name: &str, is_constant: bool) -> SymbolId {
        let id = SymbolId(self.syms.len() as u32);
        let mut sym = Symbol::new(name.to_owned(), is_constant);
        sym.rev_dep = Rc::clone(&self.expr_n);
        sym.weak_rev_dep = Rc::clone(&self.expr_n);
        sym.direct_dep = Rc::clone(&self.expr_n);
        self.syms.push(sym);
        id
    }

    //
    // Warnings
    //

    /// Warnings collected so far, oldest first.
    pub fn warnings(&self) -> Ref<'_, Vec<String>> {
        self.warnings.borrow()
    }

    pub fn enable_warnings(&self) {
        self.warn_enabled.set(true);
    }

    pub fn disable_warnings(&self) {
        self.warn_enabled.set(false);
    }

    pub fn enable_stderr_warnings(&self) {
        self.warn_to_stderr.set(true);
    }

    pub fn disable_stderr_warnings(&self) {
        self.warn_to_stderr.set(false);
    }

    /// Enables warnings for assignments to undefined symbols. Off by
    /// default: kernel defconfigs trip thousands of them.
    pub fn enable_undef_warnings(&self) {
        self.warn_undef.set(true);
    }

    pub fn disable_undef_warnings(&self) {
        self.warn_undef.set(false);
    }

    pub(crate) fn warn(&self, msg: &str) {
        self.warn_at(msg, None, None);
    }

    pub(crate) fn warn_at(&self, msg: &str, filename: Option<&str>, linenr: Option<usize>) {
        if !self.warn_enabled.get() {
            return;
        }
        let full = match (filename, linenr) {
            (Some(f), Some(l)) => format!("{}:{}: warning: {}", f, l, msg),
            (Some(f), None) => format!("{}: warning: {}", f, msg),
            _ => format!("warning: {}", msg),
        };
        if self.warn_to_stderr.get() {
            eprintln!("{}", full);
        }
        self.warnings.borrow_mut().push(full);
    }

    pub(crate) fn warn_undef_assign(
        &self,
        msg: &str,
        filename: Option<&str>,
        linenr: Option<usize>,
    ) {
        if self.warn_undef.get() {
            self.warn_at(msg, filename, linenr);
        }
    }

    /// Appends a warning for every symbol that is referenced but never
    /// defined (skipping number-shaped names, which are numeric literals).
    /// Returns how many were found. Opt-in because large trees reference
    /// plenty of architecture symbols they never define.
    pub fn check_undefined(&self) -> usize {
        let mut count = 0;
        for &id in self.sym_table.values() {
            let sym = self.symbol(id);
            if sym.is_defined() || parse_num(&sym.name, 0).is_some() || id == self.modules {
                continue;
            }
            self.warn(&format!("undefined symbol {}", sym.name));
            count += 1;
        }
        count
    }

    //
    // Misc public operations
    //

    /// Resets all user values, as if no `.config` had ever been loaded and
    /// `set_value()` never called.
    pub fn unset_values(&mut self) {
        for i in 0..self.syms.len() {
            if self.syms[i].is_defined() {
                self.syms[i].user_value = None;
                self.syms[i].invalidate();
            }
        }
        for choice in &mut self.choices {
            choice.user_value = None;
            choice.user_selection = None;
            choice.invalidate();
        }
    }

    /// Evaluates an expression string, e.g. `"FOO && (BAR || m)"`, against
    /// the current configuration. `m` is rewritten to `m && MODULES` as in
    /// conditional expressions. References to unknown symbols warn and
    /// evaluate to `n`.
    pub fn eval_string(&mut self, s: &str) -> KconfigResult<Tristate> {
        let expr = parser::parse_expr_string(self, s)?;
        Ok(self.expr_value(&expr))
    }

    /// The defconfig file given by the `option defconfig_list` symbol: the
    /// first `default` with a satisfied condition that names an existing
    /// file (tried as-is, then under `$srctree`). `None` if there is no
    /// defconfig_list symbol or no default matches.
    pub fn defconfig_filename(&self) -> Option<PathBuf> {
        let list = self.defconfig_list?;
        for (val, cond) in &self.symbol(list).defaults {
            if self.expr_value(cond) == Tristate::No {
                continue;
            }
            if let Expr::Sym(vid) = &**val {
                let filename = PathBuf::from(self.sym_str_value(*vid));
                if let Ok(resolved) = self.resolve_path(&filename) {
                    return Some(resolved);
                }
            }
        }
        None
    }

    /// Reads `filename`, falling back to `$srctree/filename` for relative
    /// paths, like the C tools.
    pub(crate) fn read_file(&self, filename: &Path) -> io::Result<(String, PathBuf)> {
        match fs::read_to_string(filename) {
            Ok(contents) => Ok((contents, filename.to_owned())),
            Err(err) => {
                if filename.is_relative() {
                    if let Some(srctree) = &self.srctree {
                        let joined = srctree.join(filename);
                        if let Ok(contents) = fs::read_to_string(&joined) {
                            return Ok((contents, joined));
                        }
                    }
                }
                Err(err)
            }
        }
    }

    fn resolve_path(&self, filename: &Path) -> io::Result<PathBuf> {
        match fs::metadata(filename) {
            Ok(_) => Ok(filename.to_owned()),
            Err(err) => {
                if filename.is_relative() {
                    if let Some(srctree) = &self.srctree {
                        let joined = srctree.join(filename);
                        if fs::metadata(&joined).is_ok() {
                            return Ok(joined);
                        }
                    }
                }
                Err(err)
            }
        }
    }

    //
    // Kconfig-format printers. Composed over the public getters only, so
    // they stay honest as a debugging surface.
    //

    /// Renders a standalone Kconfig definition for the symbol, designed to
    /// reparse into an equivalent symbol. Prompts and help texts from the
    /// symbol's menu nodes are included as a convenience. Empty for
    /// undefined symbols.
    ///
    /// Choice members are a known lossy case: their prompt condition
    /// mentions the choice dependencies, which is not literal Kconfig input.
    pub fn sym_kconfig_str(&self, id: SymbolId) -> String {
        let sym = self.symbol(id);
        if sym.nodes().is_empty() {
            return String::new();
        }

        let mut lines: Vec<String> = Vec::new();
        for (i, &nid) in sym.nodes().iter().enumerate() {
            let node = self.node(nid);
            lines.push(format!(
                "{} {}",
                if node.is_menuconfig() { "menuconfig" } else { "config" },
                sym.name()
            ));

            if i == 0 && sym.raw_type() != SymbolType::Unknown {
                lines.push(format!("\t{}", sym.raw_type().name()));
            }

            if let Some((text, cond)) = node.prompt() {
                lines.push(self.prop_line(&format!("prompt \"{}\"", text), cond));
            }

            if i == 0 {
                if sym.is_allnoconfig_y() {
                    lines.push("\toption allnoconfig_y".to_owned());
                }
                if self.defconfig_list == Some(id) {
                    lines.push("\toption defconfig_list".to_owned());
                }
                if let Some(var) = sym.env_var() {
                    lines.push(format!("\toption env=\"{}\"", var));
                }
                if id == self.modules && sym.is_defined() {
                    lines.push("\toption modules".to_owned());
                }

                for (val, cond) in sym.defaults() {
                    lines.push(self.prop_line(&format!("default {}", self.expr_str(val)), cond));
                }
                for (target, cond) in sym.selects() {
                    lines.push(self.prop_line(
                        &format!("select {}", self.symbol(*target).name()),
                        cond,
                    ));
                }
                for (target, cond) in sym.implies() {
                    lines.push(self.prop_line(
                        &format!("imply {}", self.symbol(*target).name()),
                        cond,
                    ));
                }
                for (low, high, cond) in sym.ranges() {
                    lines.push(self.prop_line(
                        &format!(
                            "range {} {}",
                            self.sym_ref_str_pub(*low),
                            self.sym_ref_str_pub(*high)
                        ),
                        cond,
                    ));
                }
            }

            if let Some(help) = node.help() {
                lines.push("\thelp".to_owned());
                for line in help.lines() {
                    lines.push(format!("\t  {}", line));
                }
            }

            if i + 1 != sym.nodes().len() {
                lines.push(String::new());
            }
        }

        lines.join("\n") + "\n"
    }

    /// Like [`sym_kconfig_str`](Kconfig::sym_kconfig_str), for choices.
    pub fn choice_kconfig_str(&self, id: ChoiceId) -> String {
        let choice = self.choice(id);
        if choice.nodes().is_empty() {
            return String::new();
        }

        let mut lines: Vec<String> = Vec::new();
        for (i, &nid) in choice.nodes().iter().enumerate() {
            let node = self.node(nid);
            lines.push(match choice.name() {
                Some(name) => format!("choice {}", name),
                None => "choice".to_owned(),
            });

            if i == 0 && choice.raw_type() != SymbolType::Unknown {
                lines.push(format!("\t{}", choice.raw_type().name()));
            }

            if let Some((text, cond)) = node.prompt() {
                lines.push(self.prop_line(&format!("prompt \"{}\"", text), cond));
            }

            if i == 0 {
                for (val, cond) in choice.defaults() {
                    lines.push(self.prop_line(&format!("default {}", self.expr_str(val)), cond));
                }
                if choice.is_optional() {
                    lines.push("\toptional".to_owned());
                }
            }

            if let Some(help) = node.help() {
                lines.push("\thelp".to_owned());
                for line in help.lines() {
                    lines.push(format!("\t  {}", line));
                }
            }

            if i + 1 != choice.nodes().len() {
                lines.push(String::new());
            }
        }

        lines.join("\n") + "\n"
    }

    fn prop_line(&self, body: &str, cond: &Rc<Expr>) -> String {
        if self.is_const_leaf(cond, self.y) {
            format!("\t{}", body)
        } else {
            format!("\t{} if {}", body, self.expr_str(cond))
        }
    }

    fn sym_ref_str_pub(&self, id: SymbolId) -> String {
        let sym = self.symbol(id);
        if sym.is_constant() {
            format!("\"{}\"", sym.name())
        } else {
            sym.name().to_owned()
        }
    }
}
