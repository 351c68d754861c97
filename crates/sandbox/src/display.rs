//! Plain-text rendering of expressions, the form `print` and `str` produce.

use std::cmp::Ordering;
use std::fmt;

use num_traits::{One, Signed};

use crate::expr::{Expr, Func, Rational};

const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_POW: u8 = 3;
const PREC_ATOM: u8 = 4;

/// Terms of a sum in display order: descending degree, numbers last.
pub(crate) fn ordered_terms(terms: &[Expr]) -> Vec<Expr> {
    let mut out = terms.to_vec();
    out.sort_by(|a, b| {
        let a_num = matches!(a, Expr::Number(_));
        let b_num = matches!(b, Expr::Number(_));
        match a_num.cmp(&b_num) {
            Ordering::Equal => b
                .display_degree()
                .cmp(&a.display_degree())
                .then_with(|| has_function(b).cmp(&has_function(a))),
            other => other,
        }
    });
    out
}

fn has_function(e: &Expr) -> bool {
    e.any(&|node: &Expr| matches!(node, Expr::Func(..)))
}

/// Factors of a product in display order: numbers, constants, then the rest.
pub(crate) fn ordered_factors(factors: &[Expr]) -> Vec<Expr> {
    let mut out = factors.to_vec();
    out.sort_by_key(|f| match f {
        Expr::Number(_) => 0,
        Expr::Constant(_) => 1,
        _ => 2,
    });
    out
}

/// Structural split of a product into sign, numerator and denominator
/// factors. Works on unevaluated products too, so it never re-canonicalizes
/// the outer product.
pub(crate) struct Fraction {
    pub negative: bool,
    pub numer: Vec<Expr>,
    pub denom: Vec<Expr>,
}

pub(crate) fn split_fraction(factors: &[Expr]) -> Fraction {
    let mut negative = false;
    let mut numer = Vec::new();
    let mut denom = Vec::new();
    for factor in factors {
        match factor {
            Expr::Number(n) => {
                if n.is_negative() {
                    negative = !negative;
                }
                let n = n.abs();
                if !n.numer().is_one() || n.is_integer() {
                    numer.push(Expr::Number(Rational::from_integer(n.numer().clone())));
                }
                if !n.denom().is_one() {
                    denom.push(Expr::Number(Rational::from_integer(n.denom().clone())));
                }
            }
            Expr::Pow(base, exp) if exp.could_extract_minus_sign() => {
                denom.push(Expr::power((**base).clone(), -(**exp).clone()));
            }
            other => numer.push(other.clone()),
        }
    }
    numer.retain(|f| !f.is_one() || factors.len() == 1);
    Fraction {
        negative,
        numer,
        denom,
    }
}

fn precedence(e: &Expr) -> u8 {
    match e {
        Expr::Number(n) if n.is_negative() => PREC_ADD,
        Expr::Number(n) if !n.is_integer() => PREC_MUL,
        Expr::Add(_) => PREC_ADD,
        Expr::Mul(fs) if split_fraction(fs).negative => PREC_ADD,
        Expr::Mul(_) => PREC_MUL,
        Expr::Pow(_, exp) if is_half(exp) => PREC_ATOM,
        Expr::Pow(..) => PREC_POW,
        _ => PREC_ATOM,
    }
}

fn is_half(e: &Expr) -> bool {
    *e == Expr::frac(1, 2)
}

fn wrap(e: &Expr, level: u8) -> String {
    let s = to_str(e);
    if precedence(e) < level {
        format!("({})", s)
    } else {
        s
    }
}

fn number_str(n: &Rational) -> String {
    if n.is_integer() {
        n.numer().to_string()
    } else {
        format!("{}/{}", n.numer(), n.denom())
    }
}

fn join_factors(factors: &[Expr]) -> String {
    ordered_factors(factors)
        .iter()
        .map(|f| wrap(f, PREC_MUL))
        .collect::<Vec<_>>()
        .join("*")
}

fn mul_str(factors: &[Expr]) -> String {
    let fraction = split_fraction(factors);
    let sign = if fraction.negative { "-" } else { "" };
    let numer = if fraction.numer.is_empty() {
        "1".to_string()
    } else {
        join_factors(&fraction.numer)
    };
    if fraction.denom.is_empty() {
        return format!("{}{}", sign, numer);
    }
    let denom = if fraction.denom.len() == 1 {
        wrap(&fraction.denom[0], PREC_POW)
    } else {
        format!("({})", join_factors(&fraction.denom))
    };
    format!("{}{}/{}", sign, numer, denom)
}

fn add_str(terms: &[Expr]) -> String {
    let mut out = String::new();
    for (i, term) in ordered_terms(terms).iter().enumerate() {
        let rendered = to_str(term);
        match rendered.strip_prefix('-') {
            Some(rest) if i > 0 => {
                out.push_str(" - ");
                out.push_str(rest);
            }
            _ if i > 0 => {
                out.push_str(" + ");
                out.push_str(&rendered);
            }
            _ => out.push_str(&rendered),
        }
    }
    out
}

fn pow_str(base: &Expr, exp: &Expr) -> String {
    if is_half(exp) {
        return format!("sqrt({})", to_str(base));
    }
    if *exp == Expr::frac(-1, 2) {
        return format!("1/sqrt({})", to_str(base));
    }
    if *exp == Expr::int(-1) {
        return format!("1/{}", wrap(base, PREC_POW));
    }
    format!("{}**{}", wrap(base, PREC_ATOM), wrap(exp, PREC_ATOM))
}

/// Render an expression the way `print` shows it.
pub fn to_str(e: &Expr) -> String {
    match e {
        Expr::Number(n) => number_str(n),
        Expr::Symbol(s) => s.clone(),
        Expr::Constant(c) => c.name().to_string(),
        Expr::Add(terms) => add_str(terms),
        Expr::Mul(factors) => mul_str(factors),
        Expr::Pow(base, exp) => pow_str(base, exp),
        Expr::Func(f, arg) => format!("{}({})", f.name(), to_str(arg)),
        Expr::Integral {
            integrand,
            var,
            bounds,
        } => match bounds {
            Some(b) => format!(
                "Integral({}, ({}, {}, {}))",
                to_str(integrand),
                var,
                to_str(&b.lower),
                to_str(&b.upper)
            ),
            None => format!("Integral({}, {})", to_str(integrand), var),
        },
        Expr::Derivative { expr, var, order } => {
            if *order == 1 {
                format!("Derivative({}, {})", to_str(expr), var)
            } else {
                format!("Derivative({}, ({}, {}))", to_str(expr), var, order)
            }
        }
        Expr::Limit { expr, var, point } => {
            format!("Limit({}, {}, {})", to_str(expr), var, to_str(point))
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_str(self))
    }
}

impl fmt::Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Significant digits of an evaluated float when none are requested.
pub const DEFAULT_DIGITS: usize = 15;

/// Format a float with `digits` significant digits, as evaluated floats print.
/// An `f64` carries no more than [`DEFAULT_DIGITS`] reliable digits.
pub fn format_float(v: f64, digits: usize) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "oo" } else { "-oo" }.to_string();
    }
    let digits = digits.clamp(1, DEFAULT_DIGITS);
    if v == 0.0 {
        return "0".to_string();
    }
    let exponent = v.abs().log10().floor() as i32;
    if (-5..digits as i32).contains(&exponent) {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        let s = format!("{:.*}", decimals, v);
        return if s.contains('.') { s } else { format!("{}.", s) };
    }
    let s = format!("{:.*e}", digits - 1, v);
    match s.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
        _ => s,
    }
}

/// Shortest round-trip form of a plain float: `0.5`, `2.0`, `1e+20`.
pub fn python_float(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = v.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let s = format!("{:e}", v);
        return match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => s,
        };
    }
    let s = v.to_string();
    if s.contains('.') {
        s
    } else {
        format!("{}.0", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn x() -> Expr {
        Expr::symbol("x")
    }

    #[test]
    fn test_polynomial_order() {
        let e = Expr::power(x(), Expr::int(2)) + Expr::int(2) * x() + Expr::one();
        assert_eq!(to_str(&e), "x**2 + 2*x + 1");
        let e = Expr::power(x(), Expr::int(3)) - Expr::int(3) * x();
        assert_eq!(to_str(&e), "x**3 - 3*x");
    }

    #[test]
    fn test_fractions() {
        assert_eq!(to_str(&(x() / Expr::int(2))), "x/2");
        assert_eq!(to_str(&(Expr::one() / x())), "1/x");
        assert_eq!(to_str(&(x() / (x() + Expr::one()))), "x/(x + 1)");
        assert_eq!(to_str(&Expr::frac(-3, 4)), "-3/4");
    }

    #[test]
    fn test_powers_and_roots() {
        assert_eq!(to_str(&Expr::sqrt(x())), "sqrt(x)");
        assert_eq!(to_str(&Expr::power(x(), Expr::frac(1, 3))), "x**(1/3)");
        assert_eq!(to_str(&Expr::power(x() + Expr::one(), Expr::int(2))), "(x + 1)**2");
        assert_eq!(to_str(&Expr::sqrt(Expr::int(8))), "2*sqrt(2)");
    }

    #[test]
    fn test_functions_and_constants() {
        let e = Expr::apply(Func::Sin, x()) * Expr::int(-1);
        assert_eq!(to_str(&e), "-sin(x)");
        assert_eq!(to_str(&Expr::neg_infinity()), "-oo");
        assert_eq!(to_str(&(Expr::pi() * x())), "pi*x");
    }

    #[test]
    fn test_unevaluated_product_keeps_shape() {
        let e = Expr::product_unevaluated(vec![
            Expr::int(2),
            x(),
            x() + Expr::one(),
        ]);
        assert_eq!(to_str(&e), "2*x*(x + 1)");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(std::f64::consts::PI, DEFAULT_DIGITS), "3.14159265358979");
        assert_eq!(format_float(2.0, DEFAULT_DIGITS), "2.00000000000000");
        assert_eq!(format_float(1.0 / 3.0, DEFAULT_DIGITS), "0.333333333333333");
        assert_eq!(format_float(1e20, DEFAULT_DIGITS), "1.00000000000000e+20");
        assert_eq!(format_float(std::f64::consts::PI, 5), "3.1416");
    }

    #[test]
    fn test_python_float() {
        assert_eq!(python_float(0.5), "0.5");
        assert_eq!(python_float(2.0), "2.0");
        assert_eq!(python_float(1e20), "1e+20");
    }
}
