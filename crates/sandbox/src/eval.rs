//! Floating-point evaluation of closed expressions.

use num_traits::ToPrimitive;

use crate::expr::{Constant, Expr, Func};

/// Evaluate to a real `f64`. `None` when the expression has free symbols,
/// is complex, or contains an unevaluated node.
pub fn evaluate(e: &Expr) -> Option<f64> {
    let v = match e {
        Expr::Number(n) => n.to_f64()?,
        Expr::Symbol(_) => return None,
        Expr::Constant(c) => match c {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
            Constant::Infinity => f64::INFINITY,
            Constant::I | Constant::ComplexInfinity | Constant::NaN => return None,
        },
        Expr::Add(terms) => {
            let mut total = 0.0;
            for t in terms {
                total += evaluate(t)?;
            }
            total
        }
        Expr::Mul(factors) => {
            let mut total = 1.0;
            for f in factors {
                total *= evaluate(f)?;
            }
            total
        }
        Expr::Pow(base, exp) => {
            let b = evaluate(base)?;
            let x = evaluate(exp)?;
            if b < 0.0 && x.fract() != 0.0 {
                return None;
            }
            b.powf(x)
        }
        Expr::Func(f, arg) => {
            let a = evaluate(arg)?;
            match f {
                Func::Sin => a.sin(),
                Func::Cos => a.cos(),
                Func::Tan => a.tan(),
                Func::Asin if a.abs() <= 1.0 => a.asin(),
                Func::Acos if a.abs() <= 1.0 => a.acos(),
                Func::Asin | Func::Acos => return None,
                Func::Atan => a.atan(),
                Func::Sinh => a.sinh(),
                Func::Cosh => a.cosh(),
                Func::Tanh => a.tanh(),
                Func::Exp => a.exp(),
                Func::Log if a > 0.0 => a.ln(),
                Func::Log => return None,
                Func::Abs => a.abs(),
            }
        }
        Expr::Integral { .. } | Expr::Derivative { .. } | Expr::Limit { .. } => return None,
    };
    if v.is_nan() {
        None
    } else {
        Some(v)
    }
}
