//! Post-parse finalization of the menu tree.
//!
//! A single post-order pass over the node chain produced by the parser:
//!
//! 1. Implicit submenus: nodes that depend on the node before them are
//!    re-parented under it, mirroring `menu_finalize()` in the C tools.
//! 2. Promptless nodes with children are flattened so the tree has no
//!    invisible indentation jumps, and the `if` placeholder nodes are
//!    removed.
//! 3. Choices collect their member symbols and propagate types.
//!
//! Afterwards the inverted dependency index (`Symbol::direct_dependents`)
//! is built; the value engine uses it to invalidate cached values when a
//! user value changes.

use std::rc::Rc;

use crate::choice::ChoiceId;
use crate::expr::Expr;
use crate::kconfig::Kconfig;
use crate::menu::{MenuItem, NodeId};
use crate::symbol::SymbolId;
use crate::types::SymbolType;

pub(crate) fn finalize(kc: &mut Kconfig) {
    let top = kc.top_node();
    finalize_node(kc, top);
    build_dep(kc);
    check_select_imply_targets(kc);
}

fn finalize_node(kc: &mut Kconfig, node: NodeId) {
    if kc.node(node).list().is_some() {
        // The node has children; finalize them. A finalized child may have
        // swallowed its successors, so re-read `next` each step.
        let mut cur = kc.node(node).list();
        while let Some(child) = cur {
            finalize_node(kc, child);
            cur = kc.node(child).next();
        }
    } else if kc.node(node).item().is_some() {
        // No children (yet) -- look for following nodes that depend on
        // this one and build an implicit submenu out of them.
        check_auto_menu(kc, node);
    }

    if let Some(first) = kc.node(node).list() {
        flatten(kc, first);
        remove_if(kc, node);
    }

    // Empty choices are possible, so this sits outside the branches above
    if let Some(MenuItem::Choice(choice)) = kc.node(node).item() {
        finalize_choice(kc, node, choice);
    }
}

/// True if `node2` has an automatic menu dependency on `node1`: its prompt
/// condition (or, promptless, its `dep`) depends on `node1`'s symbol.
fn has_auto_menu_dep(kc: &Kconfig, node1: NodeId, node2: NodeId) -> bool {
    let sym = match kc.node(node1).item() {
        Some(MenuItem::Sym(sym)) => sym,
        _ => return false,
    };

    if let Some((_, cond)) = kc.node(node2).prompt() {
        return kc.expr_depends_on(cond, sym);
    }
    kc.expr_depends_on(kc.node(node2).dep(), sym)
}

/// Re-parents the run of following siblings that depend on `node` into a
/// submenu rooted at `node`.
fn check_auto_menu(kc: &mut Kconfig, node: NodeId) {
    let mut cur = node;
    loop {
        let next = match kc.node(cur).next() {
            Some(next) if has_auto_menu_dep(kc, node, next) => next,
            _ => break,
        };
        finalize_node(kc, next);
        cur = next;
        kc.node_mut(cur).parent = Some(node);
    }

    if cur != node {
        let first_child = kc.node(node).next();
        kc.node_mut(node).list = first_child;
        let after = kc.node(cur).next();
        kc.node_mut(node).next = after;
        kc.node_mut(cur).next = None;
    }
}

/// Splices the children of promptless nodes out to their parent's level.
fn flatten(kc: &mut Kconfig, first: NodeId) {
    let mut cur = Some(first);
    while let Some(node) = cur {
        let promptless = match kc.node(node).prompt() {
            None => true,
            Some((text, _)) => text.is_empty(),
        };

        if promptless && kc.node(node).list().is_some() {
            let parent = kc.node(node).parent();
            let mut last = kc.node(node).list().unwrap();
            loop {
                kc.node_mut(last).parent = parent;
                match kc.node(last).next() {
                    Some(next) => last = next,
                    None => break,
                }
            }

            let after = kc.node(node).next();
            kc.node_mut(last).next = after;
            let children = kc.node(node).list();
            kc.node_mut(node).next = children;
            kc.node_mut(node).list = None;
        }

        cur = kc.node(node).next();
    }
}

/// Unlinks `if` nodes (recognizable by their `None` item) from `node`'s
/// child list. Their children have already been flattened past them.
fn remove_if(kc: &mut Kconfig, node: NodeId) {
    let mut first = kc.node(node).list();
    while let Some(f) = first {
        if kc.node(f).item().is_some() {
            break;
        }
        first = kc.node(f).next();
    }

    let mut cur = first;
    while let Some(c) = cur {
        match kc.node(c).next() {
            Some(next) if kc.node(next).item().is_none() => {
                let skip = kc.node(next).next();
                kc.node_mut(c).next = skip;
            }
            other => cur = other,
        }
    }

    kc.node_mut(node).list = first;
}

/// Marks the symbols in the choice's child list as members and settles
/// types: an untyped choice inherits the first typed member's type, and
/// untyped members inherit the choice's.
fn finalize_choice(kc: &mut Kconfig, node: NodeId, choice: ChoiceId) {
    let mut cur = kc.node(node).list();
    while let Some(child) = cur {
        if let Some(MenuItem::Sym(sym)) = kc.node(child).item() {
            kc.sym_mut(sym).choice = Some(choice);
            kc.choice_mut(choice).syms.push(sym);
        }
        cur = kc.node(child).next();
    }

    if kc.choice(choice).ty == SymbolType::Unknown {
        let inferred = kc
            .choice(choice)
            .syms
            .iter()
            .map(|&sym| kc.symbol(sym).ty)
            .find(|&ty| ty != SymbolType::Unknown);
        if let Some(ty) = inferred {
            kc.choice_mut(choice).ty = ty;
        }
    }

    let choice_type = kc.choice(choice).ty;
    let members = kc.choice(choice).syms.clone();
    for sym in members {
        let ty = kc.symbol(sym).ty;
        if ty == SymbolType::Unknown {
            kc.sym_mut(sym).ty = choice_type;
        } else if !ty.is_bool_or_tristate() {
            let name = kc.symbol(sym).name().to_owned();
            kc.warn(&format!(
                "the choice member {} has type {}; only bool and tristate \
                 symbols can be choice members",
                name,
                ty.name()
            ));
        }
    }
}

/// Populates `Symbol::direct_dependents`: for every defined symbol, every
/// symbol mentioned in its prompts, defaults, ranges, reverse deps, or
/// direct deps gains it as a dependent. Choice members additionally depend
/// on their choice's prompts and defaults. The sets may be larger than
/// strictly necessary; no deep expression analysis is attempted.
fn build_dep(kc: &mut Kconfig) {
    for sym in kc.unique_defined_syms() {
        let prompt_conds: Vec<Rc<Expr>> = kc
            .symbol(sym)
            .nodes()
            .iter()
            .filter_map(|&node| kc.node(node).prompt().map(|(_, cond)| Rc::clone(cond)))
            .collect();
        for cond in &prompt_conds {
            make_depend_on(kc, sym, cond);
        }

        let defaults = kc.symbol(sym).defaults.clone();
        for (value, cond) in &defaults {
            make_depend_on(kc, sym, value);
            make_depend_on(kc, sym, cond);
        }

        let rev_dep = Rc::clone(&kc.symbol(sym).rev_dep);
        make_depend_on(kc, sym, &rev_dep);
        let weak_rev_dep = Rc::clone(&kc.symbol(sym).weak_rev_dep);
        make_depend_on(kc, sym, &weak_rev_dep);

        let ranges = kc.symbol(sym).ranges.clone();
        for (low, high, cond) in &ranges {
            add_dependent(kc, *low, sym);
            add_dependent(kc, *high, sym);
            make_depend_on(kc, sym, cond);
        }

        let direct_dep = Rc::clone(&kc.symbol(sym).direct_dep);
        make_depend_on(kc, sym, &direct_dep);

        if let Some(choice) = kc.symbol(sym).choice() {
            let choice_prompt_conds: Vec<Rc<Expr>> = kc
                .choice(choice)
                .nodes()
                .iter()
                .filter_map(|&node| kc.node(node).prompt().map(|(_, cond)| Rc::clone(cond)))
                .collect();
            for cond in &choice_prompt_conds {
                make_depend_on(kc, sym, cond);
            }

            let choice_defaults = kc.choice(choice).defaults.clone();
            for (_, cond) in &choice_defaults {
                make_depend_on(kc, sym, cond);
            }
        }
    }
}

/// Registers `sym` as a dependent of every non-constant symbol in `expr`.
fn make_depend_on(kc: &mut Kconfig, sym: SymbolId, expr: &Expr) {
    match expr {
        Expr::Sym(id) => add_dependent(kc, *id, sym),
        Expr::Not(e) => make_depend_on(kc, sym, e),
        Expr::And(a, b) | Expr::Or(a, b) => {
            make_depend_on(kc, sym, a);
            make_depend_on(kc, sym, b);
        }
        Expr::Cmp(_, lhs, rhs) => {
            add_dependent(kc, *lhs, sym);
            add_dependent(kc, *rhs, sym);
        }
    }
}

fn add_dependent(kc: &mut Kconfig, on: SymbolId, dependent: SymbolId) {
    // Constants never change value
    if kc.symbol(on).is_constant() {
        return;
    }
    kc.sym_mut(on).direct_dependents.insert(dependent);
}

/// `select` and `imply` only make sense against bool/tristate targets.
fn check_select_imply_targets(kc: &Kconfig) {
    for sym in kc.unique_defined_syms() {
        let source = kc.symbol(sym);
        for (verb, props) in [("selects", source.selects()), ("implies", source.implies())] {
            for (target, _) in props {
                let target_sym = kc.symbol(*target);
                if target_sym.raw_type() != SymbolType::Unknown
                    && !target_sym.raw_type().is_bool_or_tristate()
                {
                    kc.warn(&format!(
                        "{} {} the non-bool/tristate symbol {}",
                        source.name(),
                        verb,
                        target_sym.name()
                    ));
                }
            }
        }
    }
}
