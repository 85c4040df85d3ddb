//! SMT-LIB style rendering of nodes and models.

use std::collections::BTreeMap;
use std::fmt::Write;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Signed;

use super::eval::Interp;
use super::node::{Func, NodeData, NodeId, SortData};
use super::{Engine, Step};
use crate::native::BuiltinOp;

fn op_name(op: BuiltinOp, int_sorted: bool) -> String {
    use BuiltinOp::*;
    let name = match op {
        True => "true",
        False => "false",
        Not => "not",
        And => "and",
        Or => "or",
        Xor => "xor",
        Implies => "=>",
        Eq => "=",
        Distinct => "distinct",
        Ite => "ite",
        Add => "+",
        Sub | Neg => "-",
        Mul => "*",
        Div if int_sorted => "div",
        Div => "/",
        Mod => "mod",
        Rem => "rem",
        Power => "^",
        Lt => "<",
        Le => "<=",
        Gt => ">",
        Ge => ">=",
        ToReal => "to_real",
        ToInt => "to_int",
        IsInt => "is_int",
        BvNot => "bvnot",
        BvNeg => "bvneg",
        BvAnd => "bvand",
        BvOr => "bvor",
        BvXor => "bvxor",
        BvNand => "bvnand",
        BvNor => "bvnor",
        BvXnor => "bvxnor",
        BvRedAnd => "bvredand",
        BvRedOr => "bvredor",
        BvAdd => "bvadd",
        BvSub => "bvsub",
        BvMul => "bvmul",
        BvUDiv => "bvudiv",
        BvURem => "bvurem",
        BvSDiv => "bvsdiv",
        BvSRem => "bvsrem",
        BvSMod => "bvsmod",
        BvShl => "bvshl",
        BvLShr => "bvlshr",
        BvAShr => "bvashr",
        BvRotateLeft => "ext_rotate_left",
        BvRotateRight => "ext_rotate_right",
        BvUlt => "bvult",
        BvUle => "bvule",
        BvUgt => "bvugt",
        BvUge => "bvuge",
        BvSlt => "bvslt",
        BvSle => "bvsle",
        BvSgt => "bvsgt",
        BvSge => "bvsge",
        Concat => "concat",
        Extract { high, low } => return format!("(_ extract {high} {low})"),
        ZeroExt(n) => return format!("(_ zero_extend {n})"),
        SignExt(n) => return format!("(_ sign_extend {n})"),
        Repeat(n) => return format!("(_ repeat {n})"),
        Int2Bv(n) => return format!("(_ int2bv {n})"),
        Bv2Int { signed: false } => "bv2int",
        Bv2Int { signed: true } => "sbv2int",
        Select => "select",
        Store => "store",
    };
    name.to_string()
}

/// Quote a symbol with `|...|` unless it is a plain SMT-LIB simple symbol.
fn quote_symbol(name: &str) -> String {
    let simple = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "~!@$%^&*_-+=<>.?/".contains(c));
    if simple {
        name.to_string()
    } else {
        format!("|{name}|")
    }
}

fn negate(text: String, negative: bool) -> String {
    if negative { format!("(- {text})") } else { text }
}

fn real_literal(value: &BigRational) -> String {
    let abs = value.abs();
    let text = if abs.is_integer() {
        format!("{}.0", abs.numer())
    } else {
        format!("(/ {}.0 {}.0)", abs.numer(), abs.denom())
    };
    negate(text, value.is_negative())
}

fn bv_literal(value: &BigInt, width: u32) -> String {
    if width % 4 == 0 {
        format!("#x{:0>w$}", value.to_str_radix(16), w = (width / 4) as usize)
    } else {
        format!("#b{:0>w$}", value.to_str_radix(2), w = width as usize)
    }
}

impl Engine {
    /// Render any node: term, sort or declaration.
    pub(super) fn render(&self, id: NodeId) -> Step<String> {
        let mut out = String::new();
        self.render_into(id, &mut out)?;
        Ok(out)
    }

    fn render_into(&self, id: NodeId, out: &mut String) -> Step<()> {
        match self.node(id)? {
            NodeData::Sort(data) => self.render_sort(data, out)?,
            NodeData::Decl(decl) => {
                let _ = write!(out, "(declare-fun {} (", quote_symbol(&decl.name));
                for (i, sort) in decl.domain.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.render_into(*sort, out)?;
                }
                out.push_str(") ");
                self.render_into(decl.range, out)?;
                out.push(')');
            }
            NodeData::Numeral { value, sort } => match self.sort_data(*sort)? {
                SortData::Int => out.push_str(&negate(value.abs().to_string(), value.is_negative())),
                SortData::BitVec(width) => out.push_str(&bv_literal(value.numer(), *width)),
                _ => out.push_str(&real_literal(value)),
            },
            NodeData::Algebraic {
                radicand, degree, ..
            } => {
                // Positive root of denom * x^degree - numer.
                let index = if degree % 2 == 0 { 2 } else { 1 };
                let power = format!("(^ x {degree})");
                let lead = if radicand.denom() == &BigInt::from(1) {
                    power
                } else {
                    format!("(* {} {power})", radicand.denom())
                };
                let _ = write!(
                    out,
                    "(root-obj (+ {lead} (- {})) {index})",
                    radicand.numer()
                );
            }
            NodeData::Elem { sort, index } => {
                self.render_sort_name(*sort, out)?;
                let _ = write!(out, "!val!{index}");
            }
            NodeData::App { func, args, sort } => {
                let head = match func {
                    Func::Builtin(op) => op_name(*op, *sort == self.int_sort),
                    Func::Decl(decl) => quote_symbol(&self.decl_data(*decl)?.name),
                    Func::ConstArray => {
                        let mut head = String::from("(as const ");
                        self.render_into(*sort, &mut head)?;
                        head.push(')');
                        head
                    }
                };
                if args.is_empty() {
                    out.push_str(&head);
                } else {
                    out.push('(');
                    out.push_str(&head);
                    for arg in args {
                        out.push(' ');
                        self.render_into(*arg, out)?;
                    }
                    out.push(')');
                }
            }
        }
        Ok(())
    }

    fn render_sort(&self, data: &SortData, out: &mut String) -> Step<()> {
        match data {
            SortData::Bool => out.push_str("Bool"),
            SortData::Int => out.push_str("Int"),
            SortData::Real => out.push_str("Real"),
            SortData::BitVec(w) => {
                let _ = write!(out, "(_ BitVec {w})");
            }
            SortData::Array { domain, range } => {
                out.push_str("(Array ");
                self.render_into(*domain, out)?;
                out.push(' ');
                self.render_into(*range, out)?;
                out.push(')');
            }
            SortData::Uninterpreted(symbol) => out.push_str(&quote_symbol(self.symbol_name(*symbol))),
        }
        Ok(())
    }

    fn render_sort_name(&self, sort: NodeId, out: &mut String) -> Step<()> {
        match self.sort_data(sort)? {
            SortData::Uninterpreted(symbol) => out.push_str(self.symbol_name(*symbol)),
            other => self.render_sort(other, out)?,
        }
        Ok(())
    }

    /// Render a model as a sequence of `define-fun` commands.
    pub(super) fn render_model(&self, interps: &BTreeMap<NodeId, Interp>) -> Step<String> {
        let mut lines = Vec::new();
        for (decl_id, interp) in interps {
            let decl = self.decl_data(*decl_id)?;
            let mut line = format!("(define-fun {} (", quote_symbol(&decl.name));
            for (i, sort) in decl.domain.iter().enumerate() {
                if i > 0 {
                    line.push(' ');
                }
                let _ = write!(line, "(x!{i} ");
                self.render_into(*sort, &mut line)?;
                line.push(')');
            }
            line.push_str(") ");
            self.render_into(decl.range, &mut line)?;
            line.push(' ');
            match interp {
                Interp::Const(value) => self.render_into(*value, &mut line)?,
                Interp::Func(func) => {
                    let mut body = self.render(func.default)?;
                    for (point, value) in func.entries.iter().rev() {
                        let mut guards = Vec::new();
                        for (i, arg) in point.iter().enumerate() {
                            guards.push(format!("(= x!{i} {})", self.render(*arg)?));
                        }
                        let guard = if guards.len() == 1 {
                            guards.remove(0)
                        } else {
                            format!("(and {})", guards.join(" "))
                        };
                        body = format!("(ite {guard} {} {body})", self.render(*value)?);
                    }
                    line.push_str(&body);
                }
            }
            line.push(')');
            lines.push((decl.name.clone(), line));
        }
        lines.sort();
        let mut out = String::new();
        for (_, line) in lines {
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals() {
        assert_eq!(
            real_literal(&BigRational::new(BigInt::from(5), BigInt::from(4))),
            "(/ 5.0 4.0)"
        );
        assert_eq!(
            real_literal(&BigRational::from_integer(BigInt::from(-2))),
            "(- 2.0)"
        );
        assert_eq!(bv_literal(&BigInt::from(10), 8), "#x0a");
        assert_eq!(bv_literal(&BigInt::from(5), 3), "#b101");
    }

    #[test]
    fn symbol_quoting() {
        assert_eq!(quote_symbol("x"), "x");
        assert_eq!(quote_symbol("k!1"), "k!1");
        assert_eq!(quote_symbol("two words"), "|two words|");
        assert_eq!(quote_symbol("1x"), "|1x|");
    }
}
