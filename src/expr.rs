//! Dependency expressions and their evaluation.
//!
//! Expressions form trees with symbol handles at the leaves. Identical
//! subtrees are shared through `Rc` (the active `if`-stack condition is
//! reused by every property parsed under it); equality is structural where
//! it matters and identity is never relied on.
//!
//! The constants `y`, `m`, and `n` are the instance's three constant
//! tristate symbols, so a "missing" condition is simply the `y` leaf and
//! evaluation needs no special cases for it.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::kconfig::Kconfig;
use crate::symbol::SymbolId;
use crate::types::{parse_num, SymbolType, Tristate};

/// Comparison operators usable in expressions, e.g. `default y if N > 3`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Equal,
    Unequal,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Equal => "=",
            CmpOp::Unequal => "!=",
            CmpOp::Less => "<",
            CmpOp::LessEqual => "<=",
            CmpOp::Greater => ">",
            CmpOp::GreaterEqual => ">=",
        }
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Equal => ord == Ordering::Equal,
            CmpOp::Unequal => ord != Ordering::Equal,
            CmpOp::Less => ord == Ordering::Less,
            CmpOp::LessEqual => ord != Ordering::Greater,
            CmpOp::Greater => ord == Ordering::Greater,
            CmpOp::GreaterEqual => ord != Ordering::Less,
        }
    }
}

/// A dependency expression. Comparison operands are always symbols; the
/// grammar cannot produce anything else there, and numeric/string literals
/// intern as (constant or undefined) symbols anyway.
#[derive(Clone, Debug)]
pub enum Expr {
    Sym(SymbolId),
    Not(Rc<Expr>),
    And(Rc<Expr>, Rc<Expr>),
    Or(Rc<Expr>, Rc<Expr>),
    Cmp(CmpOp, SymbolId, SymbolId),
}

impl Kconfig {
    /// Evaluates `expr` to a tristate against the current configuration.
    pub fn expr_value(&self, expr: &Expr) -> Tristate {
        match expr {
            Expr::Sym(id) => self.sym_leaf_value(*id),
            Expr::Not(e) => self.expr_value(e).not(),
            Expr::And(a, b) => {
                let v1 = self.expr_value(a);
                // Short-circuit the n case
                if v1 == Tristate::No {
                    Tristate::No
                } else {
                    v1.and(self.expr_value(b))
                }
            }
            Expr::Or(a, b) => {
                let v1 = self.expr_value(a);
                // Short-circuit the y case
                if v1 == Tristate::Yes {
                    Tristate::Yes
                } else {
                    v1.or(self.expr_value(b))
                }
            }
            Expr::Cmp(op, lhs, rhs) => self.cmp_value(*op, *lhs, *rhs),
        }
    }

    /// A symbol used as an expression leaf. Bool/tristate symbols contribute
    /// their tristate value. A defined string/int/hex symbol counts as `y`
    /// exactly when its value is non-empty. Undefined and constant
    /// non-tristate symbols are always `n`.
    fn sym_leaf_value(&self, id: SymbolId) -> Tristate {
        let sym = self.symbol(id);
        match sym.ty {
            SymbolType::Bool | SymbolType::Tristate => self.sym_tri_value(id),
            SymbolType::Unknown => Tristate::No,
            _ => {
                if self.sym_str_value(id).is_empty() {
                    Tristate::No
                } else {
                    Tristate::Yes
                }
            }
        }
    }

    fn cmp_value(&self, op: CmpOp, lhs: SymbolId, rhs: SymbolId) -> Tristate {
        let lt = self.symbol(lhs).ty;
        let rt = self.symbol(rhs).ty;
        let lv = self.sym_str_value(lhs);
        let rv = self.sym_str_value(rhs);

        let ord = if lt == SymbolType::String && rt == SymbolType::String {
            lv.cmp(&rv)
        } else {
            // Try a numeric comparison, with the base taken from the symbol
            // types (inferred from the literal for untyped operands), and
            // fall back on a lexicographic one.
            match (parse_num(&lv, lt.base()), parse_num(&rv, rt.base())) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => {
                    if lt.base() != 0 || rt.base() != 0 {
                        self.warn(&format!(
                            "type mismatch in comparison: '{} {} {}'",
                            self.sym_ref_str(lhs),
                            op.as_str(),
                            self.sym_ref_str(rhs)
                        ));
                    }
                    lv.cmp(&rv)
                }
            }
        };

        if op.holds(ord) {
            Tristate::Yes
        } else {
            Tristate::No
        }
    }

    /// Renders `expr` the way it could appear in a Kconfig file, with
    /// parentheses only where C operator precedence requires them
    /// (`||` < `&&` < `!`/comparison).
    pub fn expr_str(&self, expr: &Expr) -> String {
        match expr {
            Expr::Sym(id) => self.sym_ref_str(*id),
            Expr::Not(e) => match &**e {
                Expr::Sym(_) => format!("!{}", self.expr_str(e)),
                _ => format!("!({})", self.expr_str(e)),
            },
            Expr::And(a, b) => {
                format!("{} && {}", self.and_operand_str(a), self.and_operand_str(b))
            }
            Expr::Or(a, b) => format!("{} || {}", self.expr_str(a), self.expr_str(b)),
            Expr::Cmp(op, lhs, rhs) => format!(
                "{} {} {}",
                self.sym_ref_str(*lhs),
                op.as_str(),
                self.sym_ref_str(*rhs)
            ),
        }
    }

    fn sym_ref_str(&self, id: SymbolId) -> String {
        let sym = self.symbol(id);
        if sym.is_constant {
            format!("\"{}\"", sym.name)
        } else {
            sym.name.clone()
        }
    }

    /// An operand of `&&` needs parentheses only if it is an `||`.
    fn and_operand_str(&self, expr: &Expr) -> String {
        if matches!(expr, Expr::Or(..)) {
            format!("({})", self.expr_str(expr))
        } else {
            self.expr_str(expr)
        }
    }

    /// True if `expr` depends on `sym` in the sense that decides implicit
    /// submenu creation: a direct reference, an ANDed reference, or one of
    /// the comparisons `sym = y`, `sym = m`, `sym != n` (in either operand
    /// order).
    pub fn expr_depends_on(&self, expr: &Expr, sym: SymbolId) -> bool {
        match expr {
            Expr::Sym(id) => *id == sym,
            Expr::Cmp(op @ (CmpOp::Equal | CmpOp::Unequal), lhs, rhs) => {
                let (mut left, mut right) = (*lhs, *rhs);
                if right == sym {
                    std::mem::swap(&mut left, &mut right);
                }
                if left != sym {
                    return false;
                }
                match op {
                    CmpOp::Equal => right == self.m || right == self.y,
                    CmpOp::Unequal => right == self.n,
                    _ => unreachable!(),
                }
            }
            Expr::And(a, b) => self.expr_depends_on(a, sym) || self.expr_depends_on(b, sym),
            _ => false,
        }
    }

    /// Builds `e1 && e2` with the trivial simplifications (`y` is dropped,
    /// `n` absorbs).
    pub(crate) fn make_and(&self, e1: &Rc<Expr>, e2: &Rc<Expr>) -> Rc<Expr> {
        if self.is_const_leaf(e1, self.y) {
            return Rc::clone(e2);
        }
        if self.is_const_leaf(e2, self.y) {
            return Rc::clone(e1);
        }
        if self.is_const_leaf(e1, self.n) || self.is_const_leaf(e2, self.n) {
            return Rc::clone(&self.expr_n);
        }
        Rc::new(Expr::And(Rc::clone(e1), Rc::clone(e2)))
    }

    /// Builds `e1 || e2` with the trivial simplifications (`n` is dropped,
    /// `y` absorbs).
    pub(crate) fn make_or(&self, e1: &Rc<Expr>, e2: &Rc<Expr>) -> Rc<Expr> {
        if self.is_const_leaf(e1, self.n) {
            return Rc::clone(e2);
        }
        if self.is_const_leaf(e2, self.n) {
            return Rc::clone(e1);
        }
        if self.is_const_leaf(e1, self.y) || self.is_const_leaf(e2, self.y) {
            return Rc::clone(&self.expr_y);
        }
        Rc::new(Expr::Or(Rc::clone(e1), Rc::clone(e2)))
    }

    /// True if the whole expression is exactly the constant leaf `id`.
    pub(crate) fn is_const_leaf(&self, expr: &Rc<Expr>, id: SymbolId) -> bool {
        matches!(&**expr, Expr::Sym(s) if *s == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmp_op_holds() {
        assert!(CmpOp::Equal.holds(Ordering::Equal));
        assert!(!CmpOp::Equal.holds(Ordering::Less));
        assert!(CmpOp::Unequal.holds(Ordering::Greater));
        assert!(CmpOp::LessEqual.holds(Ordering::Equal));
        assert!(CmpOp::LessEqual.holds(Ordering::Less));
        assert!(CmpOp::GreaterEqual.holds(Ordering::Greater));
        assert!(!CmpOp::Greater.holds(Ordering::Equal));
    }
}
