//! LaTeX rendering of expressions.

use num_bigint::BigInt;
use num_traits::{One, Signed};

use crate::display::{ordered_factors, ordered_terms, split_fraction};
use crate::expr::{Constant, Expr, Func, Rational};

const GREEK: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
    "lambda", "mu", "nu", "xi", "omicron", "rho", "sigma", "tau", "upsilon", "phi", "chi", "psi",
    "omega", "Gamma", "Delta", "Theta", "Lambda", "Xi", "Sigma", "Phi", "Psi", "Omega",
];

fn symbol_latex(name: &str) -> String {
    let (head, sub) = match name.split_once('_') {
        Some((head, sub)) if !head.is_empty() && !sub.is_empty() => (head, Some(sub)),
        _ => (name, None),
    };
    let head = if GREEK.contains(&head) {
        format!("\\{}", head)
    } else {
        head.to_string()
    };
    match sub {
        Some(sub) => format!("{}_{{{}}}", head, symbol_latex(sub)),
        None => head,
    }
}

fn number_latex(n: &Rational) -> String {
    if n.is_integer() {
        return n.numer().to_string();
    }
    let sign = if n.is_negative() { "- " } else { "" };
    format!("{}\\frac{{{}}}{{{}}}", sign, n.numer().abs(), n.denom())
}

fn constant_latex(c: Constant) -> &'static str {
    match c {
        Constant::Pi => "\\pi",
        Constant::E => "e",
        Constant::I => "i",
        Constant::Infinity => "\\infty",
        Constant::ComplexInfinity => "\\tilde{\\infty}",
        Constant::NaN => "\\text{NaN}",
    }
}

fn needs_parens_as_factor(e: &Expr) -> bool {
    match e {
        Expr::Add(_) => true,
        Expr::Number(n) => n.is_negative(),
        Expr::Mul(fs) => split_fraction(fs).negative,
        _ => false,
    }
}

fn needs_parens_as_base(e: &Expr) -> bool {
    match e {
        Expr::Add(_) | Expr::Mul(_) | Expr::Pow(..) => true,
        Expr::Number(n) => n.is_negative() || !n.is_integer(),
        _ => false,
    }
}

fn paren(s: &str) -> String {
    format!("\\left({}\\right)", s)
}

fn factor_list_latex(factors: &[Expr]) -> String {
    let ordered = ordered_factors(factors);
    let mut out = String::new();
    for (i, f) in ordered.iter().enumerate() {
        let rendered = if needs_parens_as_factor(f) {
            paren(&to_latex(f))
        } else {
            to_latex(f)
        };
        if i > 0 {
            // two adjacent numbers need an explicit operator
            let prev_numeric = matches!(ordered[i - 1], Expr::Number(_));
            let numeric = matches!(f, Expr::Number(_))
                || matches!(f, Expr::Pow(b, _) if matches!(**b, Expr::Number(_)));
            out.push_str(if prev_numeric && numeric && !is_sqrt(f) {
                " \\cdot "
            } else {
                " "
            });
        }
        out.push_str(&rendered);
    }
    out
}

fn is_sqrt(e: &Expr) -> bool {
    matches!(e, Expr::Pow(_, exp) if **exp == Expr::frac(1, 2))
}

fn mul_latex(factors: &[Expr]) -> String {
    let fraction = split_fraction(factors);
    let sign = if fraction.negative { "- " } else { "" };
    if fraction.denom.is_empty() {
        let numer = if fraction.numer.is_empty() {
            "1".to_string()
        } else {
            factor_list_latex(&fraction.numer)
        };
        return format!("{}{}", sign, numer);
    }
    format!(
        "{}\\frac{{{}}}{{{}}}",
        sign,
        fraction_part_latex(&fraction.numer),
        fraction_part_latex(&fraction.denom)
    )
}

/// One side of `\frac`, which groups its argument already: a lone sum
/// needs no parentheses.
fn fraction_part_latex(factors: &[Expr]) -> String {
    match factors {
        [] => "1".to_string(),
        [single @ Expr::Add(_)] => to_latex(single),
        _ => factor_list_latex(factors),
    }
}

fn add_latex(terms: &[Expr]) -> String {
    let mut out = String::new();
    for (i, term) in ordered_terms(terms).iter().enumerate() {
        let rendered = to_latex(term);
        match rendered.strip_prefix("- ").or_else(|| rendered.strip_prefix('-')) {
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

fn func_name_latex(f: Func) -> String {
    match f {
        Func::Sin | Func::Cos | Func::Tan | Func::Sinh | Func::Cosh | Func::Tanh | Func::Log => {
            format!("\\{}", f.name())
        }
        other => format!("\\operatorname{{{}}}", other.name()),
    }
}

fn func_latex(f: Func, arg: &Expr, power: Option<&Expr>) -> String {
    match f {
        Func::Exp => {
            let base = format!("e^{{{}}}", to_latex(arg));
            match power {
                Some(p) => format!("{}^{{{}}}", paren(&base), to_latex(p)),
                None => base,
            }
        }
        Func::Abs => {
            let base = format!("\\left|{{{}}}\\right|", to_latex(arg));
            match power {
                Some(p) => format!("{}^{{{}}}", base, to_latex(p)),
                None => base,
            }
        }
        _ => {
            let name = func_name_latex(f);
            match power {
                Some(p) => format!(
                    "{}^{{{}}}{{\\left({} \\right)}}",
                    name,
                    to_latex(p),
                    to_latex(arg)
                ),
                None => format!("{}{{\\left({} \\right)}}", name, to_latex(arg)),
            }
        }
    }
}

fn pow_latex(base: &Expr, exp: &Expr) -> String {
    if let Some(e) = exp.as_number() {
        if e.is_negative() {
            let positive = Expr::power(base.clone(), Expr::Number(-e.clone()));
            return format!("\\frac{{1}}{{{}}}", to_latex(&positive));
        }
        if e.numer().is_one() && !e.is_integer() {
            let radicand = to_latex(base);
            return if e.denom() == &BigInt::from(2) {
                format!("\\sqrt{{{}}}", radicand)
            } else {
                format!("\\sqrt[{}]{{{}}}", e.denom(), radicand)
            };
        }
        if let Expr::Func(f, arg) = base {
            if e.is_integer() {
                return func_latex(*f, arg, Some(exp));
            }
        }
    }
    let base_latex = if needs_parens_as_base(base) {
        paren(&to_latex(base))
    } else {
        to_latex(base)
    };
    format!("{}^{{{}}}", base_latex, to_latex(exp))
}

/// Render an expression as LaTeX.
pub fn to_latex(e: &Expr) -> String {
    match e {
        Expr::Number(n) => number_latex(n),
        Expr::Symbol(s) => symbol_latex(s),
        Expr::Constant(c) => constant_latex(*c).to_string(),
        Expr::Add(terms) => add_latex(terms),
        Expr::Mul(factors) => mul_latex(factors),
        Expr::Pow(base, exp) => pow_latex(base, exp),
        Expr::Func(f, arg) => func_latex(*f, arg, None),
        Expr::Integral {
            integrand,
            var,
            bounds,
        } => {
            let body = if matches!(**integrand, Expr::Add(_)) {
                paren(&to_latex(integrand))
            } else {
                to_latex(integrand)
            };
            match bounds {
                Some(b) => format!(
                    "\\int\\limits_{{{}}}^{{{}}} {}\\, d{}",
                    to_latex(&b.lower),
                    to_latex(&b.upper),
                    body,
                    symbol_latex(var)
                ),
                None => format!("\\int {}\\, d{}", body, symbol_latex(var)),
            }
        }
        Expr::Derivative { expr, var, order } => {
            let body = if matches!(**expr, Expr::Add(_) | Expr::Mul(_)) {
                paren(&to_latex(expr))
            } else {
                to_latex(expr)
            };
            if *order == 1 {
                format!("\\frac{{d}}{{d {}}} {}", symbol_latex(var), body)
            } else {
                format!(
                    "\\frac{{d^{{{}}}}}{{d {}^{{{}}}}} {}",
                    order,
                    symbol_latex(var),
                    order,
                    body
                )
            }
        }
        Expr::Limit { expr, var, point } => format!(
            "\\lim_{{{} \\to {}}}{}",
            symbol_latex(var),
            to_latex(point),
            paren(&to_latex(expr))
        ),
    }
}
