//! Algebraic rewriting: expansion, rational-function normalization,
//! factorization, simplification and equation solving.

mod poly;

pub use poly::{Poly, QPoly};

use std::collections::BTreeMap;

use num_traits::{One, Signed, Zero};

use crate::error::{SandboxError, SandboxResult};
use crate::eval::evaluate;
use crate::expr::{Expr, Func, Rational};

/// Products with more terms than this are left unexpanded.
const MAX_EXPANDED_TERMS: usize = 5_000;

/// Integer powers of sums above this are left unexpanded.
const MAX_EXPANDED_POWER: i64 = 64;

/// Recursion bound for isolating the unknown in `solve`.
const MAX_SOLVE_DEPTH: usize = 8;

// ── Expansion ──────────────────────────────────────────────────────────

fn multiply_out(a: &Expr, b: &Expr) -> Option<Expr> {
    let left = a.terms();
    let right = b.terms();
    if left.len() * right.len() > MAX_EXPANDED_TERMS {
        return None;
    }
    let mut out = Vec::with_capacity(left.len() * right.len());
    for l in &left {
        for r in &right {
            out.push(l.clone() * r.clone());
        }
    }
    Some(Expr::sum(out))
}

/// Distribute products over sums and expand integer powers of sums.
pub fn expand(e: &Expr) -> Expr {
    match e {
        Expr::Add(terms) => Expr::sum(terms.iter().map(expand).collect()),
        Expr::Mul(factors) => {
            let expanded: Vec<Expr> = factors.iter().map(expand).collect();
            let mut acc = Expr::one();
            for f in &expanded {
                match multiply_out(&acc, f) {
                    Some(next) => acc = next,
                    None => return Expr::product(expanded),
                }
            }
            acc
        }
        Expr::Pow(base, exp) => {
            let base = expand(base);
            match exp.as_small_integer() {
                Some(n) if (2..=MAX_EXPANDED_POWER).contains(&n) && matches!(base, Expr::Add(_)) => {
                    let mut acc = base.clone();
                    for _ in 1..n {
                        match multiply_out(&acc, &base) {
                            Some(next) => acc = next,
                            None => return Expr::power(base, (**exp).clone()),
                        }
                    }
                    acc
                }
                _ => Expr::power(base, expand(exp)),
            }
        }
        Expr::Func(f, arg) => Expr::apply(*f, expand(arg)),
        other => other.clone(),
    }
}

// ── Rational functions ─────────────────────────────────────────────────

/// Combine a sum of fractions over a common denominator.
pub fn together(e: &Expr) -> Expr {
    match e {
        Expr::Add(terms) => {
            let parts: Vec<(Expr, Expr)> = terms
                .iter()
                .map(|t| together(t).as_numer_denom())
                .collect();
            if parts.iter().all(|(_, d)| d.is_one()) {
                return e.clone();
            }

            let mut max_exp: BTreeMap<Expr, Rational> = BTreeMap::new();
            for (_, d) in &parts {
                for factor in d.factors() {
                    let (base, exp) = factor.as_base_exp();
                    let (base, exp) = match exp.as_number() {
                        Some(n) => (base, n.clone()),
                        None => (factor, Rational::one()),
                    };
                    let slot = max_exp.entry(base).or_insert_with(Rational::zero);
                    if exp > *slot {
                        *slot = exp;
                    }
                }
            }
            let common = Expr::product(
                max_exp
                    .into_iter()
                    .map(|(b, n)| Expr::power(b, Expr::Number(n)))
                    .collect(),
            );
            let numer = Expr::sum(
                parts
                    .into_iter()
                    .map(|(n, d)| expand(&(n * common.clone() / d)))
                    .collect(),
            );
            numer / common
        }
        Expr::Mul(factors) => Expr::product(factors.iter().map(together).collect()),
        Expr::Pow(base, exp) => Expr::power(together(base), (**exp).clone()),
        other => other.clone(),
    }
}

/// The only free symbol of `e`, if there is exactly one.
pub fn single_symbol(e: &Expr) -> Option<String> {
    let symbols = e.free_symbols();
    if symbols.len() == 1 {
        symbols.into_iter().next()
    } else {
        None
    }
}

/// Cancel common polynomial factors of numerator and denominator.
pub fn cancel(e: &Expr) -> Expr {
    let combined = together(e);
    let (numer, denom) = combined.as_numer_denom();
    if denom.is_one() {
        return expand(&numer);
    }
    let var = match single_symbol(&combined) {
        Some(v) => v,
        None => return combined,
    };
    let (pn, pd) = match (
        Poly::from_expr(&numer, &var).and_then(|p| p.to_rational()),
        Poly::from_expr(&denom, &var).and_then(|p| p.to_rational()),
    ) {
        (Some(n), Some(d)) if !d.is_zero() => (n, d),
        _ => return combined,
    };
    let g = pn.gcd(&pd);
    let (Some((n, _)), Some((d, _))) = (pn.div_rem(&g), pd.div_rem(&g)) else {
        return combined;
    };
    let scale = Rational::one() / d.leading();
    n.scale(&scale).to_expr(&var) / d.scale(&scale).to_expr(&var)
}

// ── Factorization ──────────────────────────────────────────────────────

/// Pull the common monomial out of a sum: `x**2*y + x*y**2 -> x*y*(x + y)`.
fn extract_common_monomial(e: &Expr) -> Option<(Expr, Expr)> {
    let terms = match e {
        Expr::Add(terms) => terms,
        _ => return None,
    };
    let mut common: Option<BTreeMap<Expr, Rational>> = None;
    for term in terms {
        let mut powers = BTreeMap::new();
        for factor in term.factors() {
            if matches!(factor, Expr::Number(_)) {
                continue;
            }
            let (base, exp) = factor.as_base_exp();
            if let Some(n) = exp.as_number() {
                if n.is_integer() && n.is_positive() {
                    powers.insert(base, n.clone());
                }
            }
        }
        common = Some(match common {
            None => powers,
            Some(prev) => prev
                .into_iter()
                .filter_map(|(b, n)| powers.get(&b).map(|m| (b, n.min(m.clone()))))
                .collect(),
        });
    }
    let common = common?;
    if common.is_empty() {
        return None;
    }
    let monomial = Expr::product(
        common
            .into_iter()
            .map(|(b, n)| Expr::power(b, Expr::Number(n)))
            .collect(),
    );
    let rest = expand(&(e.clone() / monomial.clone()));
    Some((monomial, rest))
}

fn factor_polynomial(e: &Expr) -> Vec<Expr> {
    let var = match single_symbol(e) {
        Some(v) => v,
        None => {
            return match extract_common_monomial(&expand(e)) {
                Some((monomial, rest)) => {
                    let mut out = monomial.factors();
                    out.push(rest);
                    out
                }
                None => vec![e.clone()],
            };
        }
    };
    let p = match Poly::from_expr(e, &var).and_then(|p| p.to_rational()) {
        Some(p) if p.degree() >= 1 => p,
        _ => return vec![e.clone()],
    };

    let (content, _) = p.primitive();
    let (roots, rest) = p.rational_roots();
    let x = Expr::symbol(var.as_str());

    let mut factors = if rest.degree() >= 1 {
        vec![Expr::Number(content), rest.to_expr(&var)]
    } else {
        vec![Expr::Number(content * rest.leading())]
    };
    for (root, mult) in roots {
        let linear = Expr::Number(Rational::from_integer(root.denom().clone())) * x.clone()
            - Expr::Number(Rational::from_integer(root.numer().clone()));
        factors.push(Expr::power(linear, Expr::int(mult as i64)));
    }
    factors
}

/// Factor over the rationals.
pub fn factor(e: &Expr) -> Expr {
    let combined = together(e);
    let (numer, denom) = combined.as_numer_denom();
    let mut factors = factor_polynomial(&numer);
    if !denom.is_one() {
        for f in factor_polynomial(&denom) {
            factors.push(Expr::power(f, Expr::int(-1)));
        }
    }
    Expr::product_unevaluated(factors)
}

// ── Simplification ─────────────────────────────────────────────────────

/// `c*sin(u)**2 + c*cos(u)**2 -> c`
fn pythagorean(e: &Expr) -> Expr {
    match e {
        Expr::Add(terms) => {
            let mut terms: Vec<Expr> = terms.iter().map(pythagorean).collect();
            let two = Expr::int(2);
            let mut i = 0;
            while i < terms.len() {
                let (coeff, rest) = terms[i].as_coeff_term();
                let partner = match &rest {
                    Expr::Pow(base, exp) if **exp == two => match &**base {
                        Expr::Func(Func::Sin, u) => Some(Expr::apply(Func::Cos, (**u).clone())),
                        _ => None,
                    },
                    _ => None,
                };
                if let Some(cos) = partner {
                    let target = Expr::Number(coeff.clone()) * Expr::power(cos, two.clone());
                    if let Some(j) = terms.iter().position(|t| *t == target) {
                        terms.remove(j.max(i));
                        terms.remove(j.min(i));
                        terms.push(Expr::Number(coeff));
                        i = 0;
                        continue;
                    }
                }
                i += 1;
            }
            Expr::sum(terms)
        }
        Expr::Mul(factors) => Expr::product(factors.iter().map(pythagorean).collect()),
        Expr::Pow(base, exp) => Expr::power(pythagorean(base), pythagorean(exp)),
        Expr::Func(f, arg) => Expr::apply(*f, pythagorean(arg)),
        other => other.clone(),
    }
}

fn simplify_arguments(e: &Expr) -> Expr {
    e.rebuild_with(&|node| match node {
        Expr::Func(f, arg) => Some(Expr::apply(*f, simplify(arg))),
        _ => None,
    })
}

/// Pick the smallest of a few equivalent rewritings.
pub fn simplify(e: &Expr) -> Expr {
    let e = pythagorean(&simplify_arguments(e));
    let mut best = e.clone();
    let mut candidates = vec![cancel(&e), expand(&e)];
    if !e.as_numer_denom().1.is_one() {
        candidates.push(together(&e));
    }
    for candidate in candidates {
        let candidate = pythagorean(&candidate);
        if candidate.node_count() < best.node_count() {
            best = candidate;
        }
    }
    best
}

// ── Solving ────────────────────────────────────────────────────────────

fn quadratic_roots(a: Expr, b: Expr, c: Expr) -> Vec<Expr> {
    let disc = expand(&(b.clone() * b.clone() - Expr::int(4) * a.clone() * c));
    let two_a = Expr::int(2) * a;
    if disc.is_zero() {
        return vec![-b / two_a];
    }
    let root = Expr::sqrt(disc);
    vec![
        expand(&((-b.clone() - root.clone()) / two_a.clone())),
        expand(&((-b + root) / two_a)),
    ]
}

fn solve_polynomial(p: &Poly, var: &str) -> SandboxResult<Vec<Expr>> {
    match p.degree() {
        0 => Ok(Vec::new()),
        1 => Ok(vec![-p.coeff(0) / p.coeff(1)]),
        2 => Ok(quadratic_roots(p.coeff(2), p.coeff(1), p.coeff(0))),
        n => {
            let q = p.to_rational().ok_or_else(|| {
                SandboxError::not_implemented(format!(
                    "solve: degree {} polynomial with symbolic coefficients",
                    n
                ))
            })?;
            let (roots, rest) = q.rational_roots();
            let mut out: Vec<Expr> = roots.into_iter().map(|(r, _)| Expr::Number(r)).collect();
            match rest.degree() {
                0 => {}
                1 | 2 => {
                    let rest = Poly::from_expr(&rest.to_expr(var), var).ok_or_else(|| {
                        SandboxError::value("solve: lost polynomial structure")
                    })?;
                    out.extend(solve_polynomial(&rest, var)?);
                }
                d => {
                    return Err(SandboxError::not_implemented(format!(
                        "solve: no closed form for a degree {} factor",
                        d
                    )))
                }
            }
            Ok(out)
        }
    }
}

/// Invert the single outer function that wraps the unknown.
fn isolate(e: &Expr, var: &str, depth: usize) -> SandboxResult<Vec<Expr>> {
    let cannot = || SandboxError::not_implemented(format!("solve: cannot isolate {} in {}", var, e));
    if depth >= MAX_SOLVE_DEPTH {
        return Err(cannot());
    }
    let (dependent, rest): (Vec<Expr>, Vec<Expr>) =
        e.terms().into_iter().partition(|t| t.contains_symbol(var));
    if dependent.len() != 1 {
        return Err(cannot());
    }
    let (coeff_factors, inner): (Vec<Expr>, Vec<Expr>) = dependent[0]
        .factors()
        .into_iter()
        .partition(|f| !f.contains_symbol(var));
    if inner.len() != 1 {
        return Err(cannot());
    }
    let value = -Expr::sum(rest) / Expr::product(coeff_factors);

    let targets: Vec<(Expr, Expr)> = match &inner[0] {
        Expr::Func(f, u) => {
            let u = (**u).clone();
            match f {
                Func::Exp => vec![(u, Expr::apply(Func::Log, value))],
                Func::Log => vec![(u, Expr::apply(Func::Exp, value))],
                Func::Sin => {
                    let a = Expr::apply(Func::Asin, value);
                    vec![(u.clone(), a.clone()), (u, Expr::pi() - a)]
                }
                Func::Cos => {
                    let a = Expr::apply(Func::Acos, value);
                    vec![
                        (u.clone(), a.clone()),
                        (u, Expr::int(2) * Expr::pi() - a),
                    ]
                }
                Func::Tan => vec![(u, Expr::apply(Func::Atan, value))],
                Func::Asin => vec![(u, Expr::apply(Func::Sin, value))],
                Func::Acos => vec![(u, Expr::apply(Func::Cos, value))],
                Func::Atan => vec![(u, Expr::apply(Func::Tan, value))],
                _ => return Err(cannot()),
            }
        }
        Expr::Pow(base, exp) if !exp.contains_symbol(var) => {
            let inverse = Expr::one() / (**exp).clone();
            vec![((**base).clone(), Expr::power(value, inverse))]
        }
        Expr::Pow(base, exp) if !base.contains_symbol(var) => {
            let log_value = Expr::apply(Func::Log, value) / Expr::apply(Func::Log, (**base).clone());
            vec![((**exp).clone(), log_value)]
        }
        _ => return Err(cannot()),
    };

    let mut out = Vec::new();
    for (inner, target) in targets {
        if target.is_undefined() {
            continue;
        }
        out.extend(solve_expr(&(inner - target), var, depth + 1)?);
    }
    Ok(out)
}

fn solve_expr(e: &Expr, var: &str, depth: usize) -> SandboxResult<Vec<Expr>> {
    if !e.contains_symbol(var) {
        return Ok(Vec::new());
    }
    if let Expr::Mul(factors) = e {
        let mut out = Vec::new();
        for f in factors.iter().filter(|f| f.contains_symbol(var)) {
            out.extend(solve_expr(f, var, depth)?);
        }
        return Ok(out);
    }
    if let Expr::Pow(base, exp) = e {
        if exp.as_number().map_or(false, Signed::is_positive) {
            return solve_expr(base, var, depth);
        }
    }
    match Poly::from_expr(e, var) {
        Some(p) => solve_polynomial(&p, var),
        None => isolate(e, var, depth),
    }
}

/// Solve `e = 0` for `var`. Roots that zero a denominator are dropped;
/// real roots come back in ascending order.
pub fn solve(e: &Expr, var: &str) -> SandboxResult<Vec<Expr>> {
    let combined = together(e);
    let (numer, denom) = combined.as_numer_denom();
    let mut roots = solve_expr(&numer, var, 0)?;
    roots.retain(|r| {
        let d = denom.subs(var, r);
        !d.is_zero() && !d.is_undefined()
    });
    roots.sort_by(|a, b| match (evaluate(a), evaluate(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.to_string().cmp(&b.to_string()),
    });
    roots.dedup();
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::to_str;
    use pretty_assertions::assert_eq;

    fn x() -> Expr {
        Expr::symbol("x")
    }

    fn sq(e: Expr) -> Expr {
        Expr::power(e, Expr::int(2))
    }

    #[test]
    fn test_expand() {
        let e = sq(x() + Expr::one());
        assert_eq!(to_str(&expand(&e)), "x**2 + 2*x + 1");
        let e = (x() + Expr::one()) * (x() - Expr::one());
        assert_eq!(to_str(&expand(&e)), "x**2 - 1");
    }

    #[test]
    fn test_together_and_cancel() {
        let e = Expr::one() / x() + Expr::one() / (x() + Expr::one());
        assert_eq!(to_str(&together(&e)), "(2*x + 1)/(x*(x + 1))");

        let e = (sq(x()) - Expr::one()) / (x() - Expr::one());
        assert_eq!(to_str(&cancel(&e)), "x + 1");
    }

    #[test]
    fn test_factor() {
        let e = sq(x()) - Expr::one();
        assert_eq!(to_str(&factor(&e)), "(x - 1)*(x + 1)");

        let e = Expr::int(2) * sq(x()) - x();
        assert_eq!(to_str(&factor(&e)), "x*(2*x - 1)");

        let e = sq(x()) + Expr::int(2) * x() + Expr::one();
        assert_eq!(to_str(&factor(&e)), "(x + 1)**2");
    }

    #[test]
    fn test_factor_keeps_irreducible_part() {
        let e = Expr::power(x(), Expr::int(4)) - Expr::one();
        assert_eq!(to_str(&factor(&e)), "(x - 1)*(x + 1)*(x**2 + 1)");
    }

    #[test]
    fn test_factor_common_monomial() {
        let y = Expr::symbol("y");
        let e = sq(x()) * y.clone() + x() * sq(y);
        assert_eq!(to_str(&factor(&e)), "x*y*(x + y)");
    }

    #[test]
    fn test_simplify() {
        let e = sq(Expr::apply(Func::Sin, x())) + sq(Expr::apply(Func::Cos, x()));
        assert_eq!(simplify(&e), Expr::one());

        let e = (sq(x()) - Expr::one()) / (x() - Expr::one());
        assert_eq!(to_str(&simplify(&e)), "x + 1");
    }

    #[test]
    fn test_solve_polynomials() {
        let roots = solve(&(sq(x()) - Expr::int(4)), "x").unwrap();
        assert_eq!(roots, vec![Expr::int(-2), Expr::int(2)]);

        let roots = solve(&(Expr::int(2) * x() - Expr::int(3)), "x").unwrap();
        assert_eq!(roots, vec![Expr::frac(3, 2)]);

        let cubic = Expr::power(x(), Expr::int(3)) - Expr::int(6) * sq(x()) + Expr::int(11) * x()
            - Expr::int(6);
        let roots = solve(&cubic, "x").unwrap();
        assert_eq!(roots, vec![Expr::int(1), Expr::int(2), Expr::int(3)]);
    }

    #[test]
    fn test_solve_irrational_and_complex() {
        let roots = solve(&(sq(x()) - Expr::int(2)), "x").unwrap();
        let strs: Vec<String> = roots.iter().map(to_str).collect();
        assert_eq!(strs, vec!["-sqrt(2)", "sqrt(2)"]);

        let roots = solve(&(sq(x()) + Expr::one()), "x").unwrap();
        let strs: Vec<String> = roots.iter().map(to_str).collect();
        assert_eq!(strs, vec!["-I", "I"]);
    }

    #[test]
    fn test_solve_drops_poles() {
        let e = (sq(x()) - Expr::one()) / (x() - Expr::one());
        assert_eq!(solve(&e, "x").unwrap(), vec![Expr::int(-1)]);
    }

    #[test]
    fn test_solve_transcendental() {
        let e = Expr::apply(Func::Exp, x()) - Expr::int(2);
        assert_eq!(solve(&e, "x").unwrap(), vec![Expr::apply(Func::Log, Expr::int(2))]);

        let e = Expr::apply(Func::Sin, x());
        assert_eq!(solve(&e, "x").unwrap(), vec![Expr::zero(), Expr::pi()]);
    }

    #[test]
    fn test_solve_quintic_without_rational_roots_fails() {
        let e = Expr::power(x(), Expr::int(5)) - x() + Expr::one();
        assert!(matches!(solve(&e, "x"), Err(SandboxError::NotImplemented(_))));
    }
}
