//! The value engine: lazy computation of symbol and choice values under
//! tristate logic.
//!
//! Values, visibilities, and assignable sets are cached on the entities and
//! recomputed on demand. A user-value write invalidates the symbol plus
//! everything reachable through the inverted dependency index built at
//! finalization (breadth-first, with choice members dragging their siblings
//! along). Writing the modules symbol invalidates everything; its value
//! changes the effective type of every tristate.

use std::collections::VecDeque;
use std::rc::Rc;

use fxhash::FxHashSet;

use crate::choice::{ChoiceId, SelectionCache};
use crate::expr::Expr;
use crate::kconfig::Kconfig;
use crate::symbol::SymbolId;
use crate::types::{is_base_n, parse_num, SymbolType, Tristate};

impl Kconfig {
    //
    // Symbol values
    //

    /// The effective type. Tristate symbols act as bool while modules are
    /// off, and inside a choice that is in `y` mode.
    pub fn sym_type(&self, id: SymbolId) -> SymbolType {
        let sym = self.symbol(id);
        if sym.ty == SymbolType::Tristate && id != self.modules {
            if let Some(choice) = sym.choice() {
                if self.choice_value(choice) == Tristate::Yes {
                    return SymbolType::Bool;
                }
            }
            if self.sym_tri_value(self.modules) == Tristate::No {
                return SymbolType::Bool;
            }
        }
        sym.ty
    }

    /// The symbol's tristate value. `n` for non-bool/tristate symbols.
    pub fn sym_tri_value(&self, id: SymbolId) -> Tristate {
        if !self.symbol(id).ty.is_bool_or_tristate() {
            return Tristate::No;
        }
        Tristate::from_value_str(&self.sym_str_value(id)).unwrap_or(Tristate::No)
    }

    /// The symbol's value in string form (`"y"`/`"m"`/`"n"` for
    /// bool/tristate). Cached; recomputed only after an invalidating write.
    ///
    /// Undefined symbols evaluate to their own name. That Kconfig quirk is
    /// what makes numeric literals work: `3` in `N > 3` is an undefined
    /// symbol whose value is `"3"`.
    pub fn sym_str_value(&self, id: SymbolId) -> String {
        if let Some(cached) = self.symbol(id).cached_str.borrow().as_deref() {
            return cached.to_owned();
        }
        let value = self.calc_sym_value(id);
        *self.symbol(id).cached_str.borrow_mut() = Some(value.clone());
        value
    }

    fn calc_sym_value(&self, id: SymbolId) -> String {
        let sym = self.symbol(id);

        if sym.is_constant() || sym.ty == SymbolType::Unknown {
            return sym.name().to_owned();
        }

        let vis = self.sym_visibility(id);

        match sym.ty {
            SymbolType::Bool | SymbolType::Tristate => {
                let mut val = Tristate::No;

                match sym.choice() {
                    None => {
                        sym.write_to_conf.set(vis != Tristate::No);

                        let user = sym
                            .user_value()
                            .and_then(Tristate::from_value_str);

                        if vis != Tristate::No && user.is_some() {
                            // Visible symbol with a user value: clamp the
                            // user value to the visibility
                            val = user.unwrap().and(vis);
                        } else {
                            for (default, cond) in sym.defaults() {
                                let cond_val = self.expr_value(cond);
                                if cond_val != Tristate::No {
                                    sym.write_to_conf.set(true);
                                    val = self.expr_value(default).and(cond_val);
                                    break;
                                }
                            }

                            // Implies only count while the direct
                            // dependencies hold
                            if self.expr_value(sym.direct_dep()) != Tristate::No {
                                let weak = self.expr_value(sym.weak_rev_dep());
                                if weak != Tristate::No {
                                    sym.write_to_conf.set(true);
                                    val = val.or(weak);
                                }
                            }
                        }

                        // Selects force the lower bound regardless
                        let rev = self.expr_value(sym.rev_dep());
                        if rev != Tristate::No {
                            sym.write_to_conf.set(true);
                            val = val.or(rev);
                        }
                    }

                    Some(choice) => {
                        sym.write_to_conf.set(false);

                        if vis != Tristate::No {
                            let mode = self.choice_value(choice);
                            if mode != Tristate::No {
                                sym.write_to_conf.set(true);

                                if mode == Tristate::Yes {
                                    val = if self.choice_selection(choice) == Some(id) {
                                        Tristate::Yes
                                    } else {
                                        Tristate::No
                                    };
                                } else if matches!(sym.user_value(), Some("m") | Some("y")) {
                                    // Mode m: members are capped at m
                                    val = Tristate::Mod;
                                }
                            }
                        }
                    }
                }

                // m promotes to y for bools, and when an imply forces y
                if val == Tristate::Mod
                    && (self.sym_type(id) == SymbolType::Bool
                        || self.expr_value(sym.weak_rev_dep()) == Tristate::Yes)
                {
                    val = Tristate::Yes;
                }

                val.as_str().to_owned()
            }

            SymbolType::Int | SymbolType::Hex => self.calc_int_hex_value(id, vis),

            SymbolType::String => {
                sym.write_to_conf.set(vis != Tristate::No);

                if vis != Tristate::No && sym.user_value().is_some() {
                    return sym.user_value().unwrap().to_owned();
                }

                for (default, cond) in sym.defaults() {
                    if self.expr_value(cond) != Tristate::No {
                        sym.write_to_conf.set(true);
                        return self.default_leaf_str(default);
                    }
                }
                String::new()
            }

            SymbolType::Unknown => unreachable!("handled above"),
        }
    }

    fn calc_int_hex_value(&self, id: SymbolId, vis: Tristate) -> String {
        let sym = self.symbol(id);
        let base = sym.ty.base();

        // Is a range in effect?
        let mut active_range: Option<(i128, i128)> = None;
        for (low, high, cond) in sym.ranges() {
            if self.expr_value(cond) != Tristate::No {
                let low = parse_num(&self.sym_str_value(*low), base).unwrap_or(0);
                let high = parse_num(&self.sym_str_value(*high), base).unwrap_or(0);
                active_range = Some((low, high));
                break;
            }
        }

        sym.write_to_conf.set(vis != Tristate::No);

        if vis != Tristate::No {
            if let Some(user) = sym.user_value() {
                let in_range = parse_num(user, base).map_or(false, |num| {
                    active_range.map_or(true, |(low, high)| low <= num && num <= high)
                });
                if in_range {
                    // Well-formed user values keep the exact spelling they
                    // were assigned with (0x prefix and all)
                    return user.to_owned();
                }
            }
        }

        for (default, cond) in sym.defaults() {
            if self.expr_value(cond) == Tristate::No {
                continue;
            }
            sym.write_to_conf.set(true);

            let mut val = self.default_leaf_str(default);

            // Defaults outside an active range are clamped to the violated
            // bound and take on a canonical spelling
            if let (Some(num), Some((low, high))) = (parse_num(&val, base), active_range) {
                let clamped = if num < low {
                    Some(low)
                } else if num > high {
                    Some(high)
                } else {
                    None
                };
                if let Some(clamped) = clamped {
                    self.warn(&format!(
                        "the default {} on {} is outside its active range [{}, {}]",
                        val,
                        sym.name(),
                        low,
                        high
                    ));
                    val = self.format_int_hex(id, clamped);
                }
            }
            return val;
        }

        // No default. A positive range low end stands in for one.
        if let Some((low, _)) = active_range {
            if low > 0 {
                return self.format_int_hex(id, low);
            }
        }
        String::new()
    }

    pub(crate) fn format_int_hex(&self, id: SymbolId, num: i128) -> String {
        if self.symbol(id).ty == SymbolType::Hex {
            format!("{:#x}", num)
        } else {
            num.to_string()
        }
    }

    /// A `default` for a string/int/hex symbol is a symbol leaf; its string
    /// value is the default's value.
    pub(crate) fn default_leaf_str(&self, default: &Rc<Expr>) -> String {
        match &**default {
            Expr::Sym(id) => self.sym_str_value(*id),
            _ => self.expr_value(default).as_str().to_owned(),
        }
    }

    //
    // Visibility
    //

    /// The visibility of the symbol's prompts: the upper bound on what the
    /// user can assign. `n` for promptless symbols.
    pub fn sym_visibility(&self, id: SymbolId) -> Tristate {
        if let Some(vis) = self.symbol(id).cached_vis.get() {
            return vis;
        }
        let vis = self.calc_sym_visibility(id);
        self.symbol(id).cached_vis.set(Some(vis));
        vis
    }

    fn calc_sym_visibility(&self, id: SymbolId) -> Tristate {
        let sym = self.symbol(id);

        let mut vis = Tristate::No;
        for &node in sym.nodes() {
            if let Some((_, cond)) = self.node(node).prompt() {
                vis = vis.or(self.expr_value(cond));
            }
        }

        if let Some(choice) = sym.choice() {
            let choice_type = self.choice(choice).ty;

            // Non-tristate members of a tristate choice are only visible
            // when the choice is in y mode
            if choice_type == SymbolType::Tristate
                && sym.ty != SymbolType::Tristate
                && self.choice_value(choice) != Tristate::Yes
            {
                return Tristate::No;
            }

            // Tristate members at visibility m disappear while the choice
            // is in y mode
            if sym.ty == SymbolType::Tristate
                && vis == Tristate::Mod
                && self.choice_value(choice) == Tristate::Yes
            {
                return Tristate::No;
            }

            vis = vis.and(self.choice_visibility(choice));
        }

        // m is promoted to y for non-tristates and when modules are off
        if vis == Tristate::Mod
            && (sym.ty != SymbolType::Tristate
                || self.sym_tri_value(self.modules) == Tristate::No)
        {
            return Tristate::Yes;
        }
        vis
    }

    /// The tristate values the user could assign, lowest first. Empty for
    /// invisible and non-bool/tristate symbols; a single element means the
    /// symbol is locked to that value (e.g. by a select).
    pub fn sym_assignable(&self, id: SymbolId) -> &'static [Tristate] {
        if let Some(assignable) = self.symbol(id).cached_assignable.get() {
            return assignable;
        }
        let assignable = self.calc_sym_assignable(id);
        self.symbol(id).cached_assignable.set(Some(assignable));
        assignable
    }

    fn calc_sym_assignable(&self, id: SymbolId) -> &'static [Tristate] {
        use Tristate::{Mod, No, Yes};

        let sym = self.symbol(id);
        if !sym.ty.is_bool_or_tristate() {
            return &[];
        }

        let vis = self.sym_visibility(id);
        if vis == No {
            return &[];
        }

        let rev = self.expr_value(sym.rev_dep());
        let weak_is_y = self.expr_value(sym.weak_rev_dep()) == Yes;
        // m collapses into y for bools and y-implied symbols
        let no_m = self.sym_type(id) == SymbolType::Bool || weak_is_y;

        if vis == Yes {
            match rev {
                No => {
                    if no_m {
                        &[No, Yes]
                    } else {
                        &[No, Mod, Yes]
                    }
                }
                Mod => {
                    if no_m {
                        &[Yes]
                    } else {
                        &[Mod, Yes]
                    }
                }
                Yes => &[Yes],
            }
        } else {
            // vis == Mod
            match rev {
                No => {
                    if weak_is_y {
                        &[Yes]
                    } else {
                        &[Mod]
                    }
                }
                Mod => &[Mod],
                Yes => &[Yes],
            }
        }
    }

    //
    // Choice values
    //

    /// The effective choice type; tristate choices act as bool while
    /// modules are off.
    pub fn choice_type(&self, id: ChoiceId) -> SymbolType {
        let choice = self.choice(id);
        if choice.ty == SymbolType::Tristate
            && self.sym_tri_value(self.modules) == Tristate::No
        {
            return SymbolType::Bool;
        }
        choice.ty
    }

    /// The choice mode: `n` (nothing selectable), `m`, or `y`.
    pub fn choice_value(&self, id: ChoiceId) -> Tristate {
        let choice = self.choice(id);

        let mut val = match choice.user_value() {
            Some(user) => user.and(self.choice_visibility(id)),
            None => Tristate::No,
        };

        // Only optional choices can rest at n
        if val == Tristate::No && !choice.is_optional() {
            val = Tristate::Mod;
        }
        if val == Tristate::Mod && self.choice_type(id) == SymbolType::Bool {
            val = Tristate::Yes;
        }
        val
    }

    pub fn choice_visibility(&self, id: ChoiceId) -> Tristate {
        if let Some(vis) = self.choice(id).cached_vis.get() {
            return vis;
        }

        let choice = self.choice(id);
        let mut vis = Tristate::No;
        for &node in choice.nodes() {
            if let Some((_, cond)) = self.node(node).prompt() {
                vis = vis.or(self.expr_value(cond));
            }
        }

        if vis == Tristate::Mod
            && (choice.ty != SymbolType::Tristate
                || self.sym_tri_value(self.modules) == Tristate::No)
        {
            vis = Tristate::Yes;
        }

        self.choice(id).cached_vis.set(Some(vis));
        vis
    }

    /// The modes the user could put the choice in, lowest first.
    pub fn choice_assignable(&self, id: ChoiceId) -> &'static [Tristate] {
        if let Some(assignable) = self.choice(id).cached_assignable.get() {
            return assignable;
        }
        let assignable = self.calc_choice_assignable(id);
        self.choice(id).cached_assignable.set(Some(assignable));
        assignable
    }

    fn calc_choice_assignable(&self, id: ChoiceId) -> &'static [Tristate] {
        use Tristate::{Mod, No, Yes};

        let choice = self.choice(id);
        let vis = self.choice_visibility(id);

        match vis {
            No => &[],
            Yes => {
                if choice.is_optional() {
                    if self.choice_type(id) == SymbolType::Bool {
                        &[No, Yes]
                    } else {
                        &[No, Mod, Yes]
                    }
                } else if self.choice_type(id) == SymbolType::Bool {
                    &[Yes]
                } else {
                    &[Mod, Yes]
                }
            }
            Mod => {
                if choice.is_optional() {
                    &[No, Mod]
                } else {
                    &[Mod]
                }
            }
        }
    }

    /// The selected member while the choice is in `y` mode: the user's
    /// selection if it is visible, else the default selection. `None`
    /// outside `y` mode or when nothing is selectable.
    pub fn choice_selection(&self, id: ChoiceId) -> Option<SymbolId> {
        if let SelectionCache::Cached(selection) = self.choice(id).cached_selection.get() {
            return selection;
        }
        let selection = self.calc_choice_selection(id);
        self.choice(id)
            .cached_selection
            .set(SelectionCache::Cached(selection));
        selection
    }

    fn calc_choice_selection(&self, id: ChoiceId) -> Option<SymbolId> {
        if self.choice_value(id) != Tristate::Yes {
            return None;
        }

        if let Some(user_selection) = self.choice(id).user_selection() {
            if self.sym_visibility(user_selection) == Tristate::Yes {
                return Some(user_selection);
            }
        }

        self.choice_default_selection(id)
    }

    /// The member that would be selected had the user never chosen one.
    pub fn choice_default_selection(&self, id: ChoiceId) -> Option<SymbolId> {
        let choice = self.choice(id);

        for (default, cond) in choice.defaults() {
            if self.expr_value(cond) == Tristate::No {
                continue;
            }
            if let Expr::Sym(sym) = &**default {
                if self.sym_visibility(*sym) != Tristate::No {
                    return Some(*sym);
                }
            }
        }

        // Fall back on the first visible member
        choice
            .syms()
            .iter()
            .copied()
            .find(|&sym| self.sym_visibility(sym) != Tristate::No)
    }

    //
    // Writes
    //

    /// Sets the symbol's user value, like an assignment in a `.config`
    /// file, and recomputes everything that may depend on it.
    ///
    /// Returns `false` (with a warning) without storing anything when the
    /// value is malformed for the type or outside the assignable set.
    /// Assigning `m` to a bool clamps to `y` with a warning.
    pub fn set_value(&mut self, id: SymbolId, value: &str) -> bool {
        let ty = self.symbol(id).ty;

        if ty.is_bool_or_tristate() && self.symbol(id).is_defined() {
            let requested = if ty == SymbolType::Bool && value == "m" {
                Some(Tristate::Yes)
            } else {
                Tristate::from_value_str(value)
            };
            if let Some(tri) = requested {
                let assignable = self.sym_assignable(id);
                if !assignable.contains(&tri) {
                    let name = self.symbol(id).name().to_owned();
                    self.warn(&format!(
                        "the value \"{}\" is not currently assignable to {}; \
                         assignment ignored",
                        value, name
                    ));
                    return false;
                }
            }
        }

        if !self.set_value_no_invalidate(id, value, false) {
            return false;
        }

        if id == self.modules {
            // Changing MODULES has wide-ranging effects
            self.invalidate_all();
        } else {
            self.rec_invalidate(id);
        }
        true
    }

    pub fn set_tri_value(&mut self, id: SymbolId, value: Tristate) -> bool {
        self.set_value(id, value.as_str())
    }

    /// Clears the symbol's user value.
    pub fn unset_value(&mut self, id: SymbolId) {
        self.sym_mut(id).user_value = None;
        self.rec_invalidate(id);
    }

    /// The value-setting backend shared with `.config` loading, which skips
    /// the assignable check (an out-of-bounds stored value is simply
    /// overridden by evaluation) and suppresses the promptless warning.
    pub(crate) fn set_value_no_invalidate(
        &mut self,
        id: SymbolId,
        value: &str,
        suppress_prompt_warning: bool,
    ) -> bool {
        let ty = self.symbol(id).ty;
        let mut value = value.to_owned();

        let valid = match ty {
            SymbolType::Bool => match value.as_str() {
                "n" | "y" => true,
                "m" => {
                    let name = self.symbol(id).name().to_owned();
                    self.warn(&format!(
                        "the boolean symbol {} cannot be m; promoted to y",
                        name
                    ));
                    value = "y".to_owned();
                    true
                }
                _ => false,
            },
            SymbolType::Tristate => matches!(value.as_str(), "n" | "m" | "y"),
            SymbolType::String => true,
            SymbolType::Int => is_base_n(&value, 10),
            SymbolType::Hex => is_base_n(&value, 16),
            SymbolType::Unknown => false,
        };

        if !valid {
            let name = self.symbol(id).name().to_owned();
            self.warn(&format!(
                "the value \"{}\" is invalid for {}, which has type {}; \
                 assignment ignored",
                value,
                name,
                ty.name()
            ));
            return false;
        }

        if matches!(ty, SymbolType::Int | SymbolType::Hex) {
            self.warn_if_out_of_range(id, &value);
        }

        if !self.symbol(id).is_defined() {
            let name = self.symbol(id).name().to_owned();
            self.warn_undef_assign(
                &format!(
                    "assigning the value \"{}\" to the undefined symbol {} \
                     will have no effect",
                    value, name
                ),
                None,
                None,
            );
        }

        if !suppress_prompt_warning {
            let promptless = self
                .symbol(id)
                .nodes()
                .iter()
                .all(|&node| self.node(node).prompt().is_none());
            if promptless && self.symbol(id).is_defined() {
                let name = self.symbol(id).name().to_owned();
                self.warn(&format!(
                    "assigning the value \"{}\" to the promptless symbol {} \
                     will have no effect",
                    value, name
                ));
            }
        }

        self.sym_mut(id).user_value = Some(value.clone());

        // Assigning a choice member adjusts the containing choice's mode
        // and selection; this is what makes .config loading work
        if let Some(choice) = self.symbol(id).choice() {
            if ty.is_bool_or_tristate() {
                if value == "y" {
                    self.choice_mut(choice).user_value = Some(Tristate::Yes);
                    self.choice_mut(choice).user_selection = Some(id);
                } else if value == "m" {
                    self.choice_mut(choice).user_value = Some(Tristate::Mod);
                }
            }
        }

        true
    }

    fn warn_if_out_of_range(&self, id: SymbolId, value: &str) {
        let sym = self.symbol(id);
        let base = sym.ty.base();
        let num = match parse_num(value, base) {
            Some(num) => num,
            None => return,
        };
        for (low, high, cond) in sym.ranges() {
            if self.expr_value(cond) == Tristate::No {
                continue;
            }
            let low = parse_num(&self.sym_str_value(*low), base).unwrap_or(0);
            let high = parse_num(&self.sym_str_value(*high), base).unwrap_or(0);
            if num < low || num > high {
                self.warn(&format!(
                    "the value {} assigned to {} is outside its active range [{}, {}]",
                    value,
                    sym.name(),
                    low,
                    high
                ));
            }
            return;
        }
    }

    /// Sets the choice mode. `m` on a bool choice clamps to `y` with a
    /// warning.
    pub fn set_choice_value(&mut self, id: ChoiceId, value: Tristate) -> bool {
        let mut value = value;
        if self.choice(id).ty == SymbolType::Bool && value == Tristate::Mod {
            self.warn("the boolean choice cannot be in m mode; promoted to y");
            value = Tristate::Yes;
        }

        self.choice_mut(id).user_value = Some(value);
        self.invalidate_choice_members(id);
        true
    }

    /// Clears the choice's user mode and selection.
    pub fn unset_choice_value(&mut self, id: ChoiceId) {
        let choice = self.choice_mut(id);
        choice.user_value = None;
        choice.user_selection = None;
        self.invalidate_choice_members(id);
    }

    fn invalidate_choice_members(&mut self, id: ChoiceId) {
        // Invalidating any member drags the whole group (and its
        // dependents) along
        match self.choice(id).syms().first().copied() {
            Some(first) => self.rec_invalidate(first),
            None => self.choice(id).invalidate(),
        }
    }

    //
    // Invalidation
    //

    pub(crate) fn invalidate_all(&self) {
        for sym in &self.syms {
            if sym.is_defined() {
                sym.invalidate();
            }
        }
        for choice in &self.choices {
            choice.invalidate();
        }
    }

    pub(crate) fn rec_invalidate(&self, id: SymbolId) {
        self.invalidate_sym(id);
        for &dep in self.dependents(id).iter() {
            self.invalidate_sym(dep);
        }
    }

    fn invalidate_sym(&self, id: SymbolId) {
        let sym = self.symbol(id);
        sym.invalidate();
        if let Some(choice) = sym.choice() {
            self.choice(choice).invalidate();
        }
    }

    /// The set of symbols to invalidate when `id` changes: the
    /// breadth-first closure of the inverted dependency index, where every
    /// choice member reached also pulls in its siblings. Cached per symbol;
    /// the graph is fixed after finalization.
    fn dependents(&self, id: SymbolId) -> Rc<Vec<SymbolId>> {
        if let Some(cached) = self.symbol(id).cached_deps.borrow().as_ref() {
            return Rc::clone(cached);
        }

        let mut seen: FxHashSet<SymbolId> = FxHashSet::default();
        let mut queue: VecDeque<SymbolId> = VecDeque::new();
        let mut out: Vec<SymbolId> = Vec::new();

        self.push_frontier(id, &mut queue);

        while let Some(sym) = queue.pop_front() {
            if sym == id || !seen.insert(sym) {
                continue;
            }
            out.push(sym);
            self.push_frontier(sym, &mut queue);
        }

        let deps = Rc::new(out);
        *self.symbol(id).cached_deps.borrow_mut() = Some(Rc::clone(&deps));
        deps
    }

    fn push_frontier(&self, id: SymbolId, queue: &mut VecDeque<SymbolId>) {
        let sym = self.symbol(id);
        queue.extend(sym.direct_dependents.iter().copied());
        if let Some(choice) = sym.choice() {
            for &sibling in self.choice(choice).syms() {
                if sibling != id {
                    queue.push_back(sibling);
                }
            }
        }
    }
}
