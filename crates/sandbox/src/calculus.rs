//! Differentiation, integration and limits.

use num_traits::{One, Signed, Zero};

use crate::algebra::{expand, together, Poly};
use crate::eval::evaluate;
use crate::expr::{rational, Bounds, Expr, Func, Rational};

/// Recursion bound for the integrator.
const MAX_INTEGRATION_DEPTH: usize = 6;

/// Maximum number of L'Hopital steps.
const MAX_LIMIT_DEPTH: usize = 6;

/// Placeholder variable for u-substitution.
const SUBSTITUTION_VAR: &str = "_u";

// ── Differentiation ────────────────────────────────────────────────────

/// First derivative of `e` with respect to `var`.
pub fn diff(e: &Expr, var: &str) -> Expr {
    if !e.contains_symbol(var) {
        return Expr::zero();
    }
    match e {
        Expr::Symbol(s) => {
            if s == var {
                Expr::one()
            } else {
                Expr::zero()
            }
        }
        Expr::Number(_) | Expr::Constant(_) => Expr::zero(),
        Expr::Add(terms) => Expr::sum(terms.iter().map(|t| diff(t, var)).collect()),
        Expr::Mul(factors) => {
            let mut terms = Vec::with_capacity(factors.len());
            for (i, f) in factors.iter().enumerate() {
                let df = diff(f, var);
                if df.is_zero() {
                    continue;
                }
                let mut product = Vec::with_capacity(factors.len());
                product.push(df);
                product.extend(
                    factors
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, g)| g.clone()),
                );
                terms.push(Expr::product(product));
            }
            Expr::sum(terms)
        }
        Expr::Pow(base, exp) => {
            let (b, n) = ((**base).clone(), (**exp).clone());
            if !n.contains_symbol(var) {
                // n * b^(n-1) * b'
                return n.clone() * Expr::power(b.clone(), n - Expr::one()) * diff(&b, var);
            }
            if !b.contains_symbol(var) {
                // b^n * log(b) * n'
                return e.clone() * Expr::apply(Func::Log, b) * diff(&n, var);
            }
            let log_b = Expr::apply(Func::Log, b.clone());
            e.clone() * (diff(&n, var) * log_b + n * diff(&b, var) / b)
        }
        Expr::Func(f, arg) => {
            let u = (**arg).clone();
            let du = diff(&u, var);
            let outer = match f {
                Func::Sin => Expr::apply(Func::Cos, u),
                Func::Cos => -Expr::apply(Func::Sin, u),
                Func::Tan => Expr::power(Expr::apply(Func::Tan, u), Expr::int(2)) + Expr::one(),
                Func::Asin => Expr::one() / Expr::sqrt(Expr::one() - Expr::power(u, Expr::int(2))),
                Func::Acos => -Expr::one() / Expr::sqrt(Expr::one() - Expr::power(u, Expr::int(2))),
                Func::Atan => Expr::one() / (Expr::power(u, Expr::int(2)) + Expr::one()),
                Func::Sinh => Expr::apply(Func::Cosh, u),
                Func::Cosh => Expr::apply(Func::Sinh, u),
                Func::Tanh => Expr::one() - Expr::power(Expr::apply(Func::Tanh, u), Expr::int(2)),
                Func::Exp => Expr::apply(Func::Exp, u),
                Func::Log => Expr::one() / u,
                Func::Abs => u.clone() / Expr::apply(Func::Abs, u),
            };
            outer * du
        }
        Expr::Integral {
            integrand,
            var: bound_var,
            bounds,
        } => match bounds {
            None if bound_var == var => (**integrand).clone(),
            Some(b) if !integrand.contains_symbol(var) || bound_var == var => {
                // Leibniz rule for variable limits
                let upper = integrand.subs(bound_var, &b.upper) * diff(&b.upper, var);
                let lower = integrand.subs(bound_var, &b.lower) * diff(&b.lower, var);
                upper - lower
            }
            _ => unevaluated_derivative(e, var, 1),
        },
        Expr::Derivative {
            expr,
            var: inner_var,
            order,
        } if inner_var == var => unevaluated_derivative(expr, var, order + 1),
        _ => unevaluated_derivative(e, var, 1),
    }
}

fn unevaluated_derivative(e: &Expr, var: &str, order: u32) -> Expr {
    Expr::Derivative {
        expr: Box::new(e.clone()),
        var: var.to_string(),
        order,
    }
}

/// `order`-th derivative.
pub fn diff_n(e: &Expr, var: &str, order: u32) -> Expr {
    (0..order).fold(e.clone(), |acc, _| diff(&acc, var))
}

// ── Integration ────────────────────────────────────────────────────────

fn x_of(var: &str) -> Expr {
    Expr::symbol(var)
}

/// `Some(a)` when `e` is `a*var + b` with `a`, `b` free of `var`.
fn linear_coefficient(e: &Expr, var: &str) -> Option<Expr> {
    let p = Poly::from_expr(e, var)?;
    if p.degree() == 1 {
        Some(p.coeff(1))
    } else {
        None
    }
}

/// Antiderivatives of the elementary table, with linear inner arguments.
fn integrate_table(e: &Expr, var: &str) -> Option<Expr> {
    let x = x_of(var);
    match e {
        Expr::Symbol(s) if s == var => Some(Expr::power(x, Expr::int(2)) / Expr::int(2)),
        Expr::Pow(base, exp) if !exp.contains_symbol(var) => {
            let a = linear_coefficient(base, var)?;
            let base = (**base).clone();
            if **exp == Expr::int(-1) {
                return Some(Expr::apply(Func::Log, base) / a);
            }
            let n1 = (**exp).clone() + Expr::one();
            Some(Expr::power(base, n1.clone()) / (n1 * a))
        }
        Expr::Pow(base, exp) if !base.contains_symbol(var) => {
            // b^(a*x + c) / (a*log(b))
            let a = linear_coefficient(exp, var)?;
            Some(e.clone() / (a * Expr::apply(Func::Log, (**base).clone())))
        }
        Expr::Func(f, arg) => {
            let a = linear_coefficient(arg, var)?;
            let u = (**arg).clone();
            let antiderivative = match f {
                Func::Sin => -Expr::apply(Func::Cos, u),
                Func::Cos => Expr::apply(Func::Sin, u),
                Func::Tan => -Expr::apply(Func::Log, Expr::apply(Func::Cos, u)),
                Func::Exp => Expr::apply(Func::Exp, u),
                Func::Log => u.clone() * Expr::apply(Func::Log, u.clone()) - u,
                Func::Sinh => Expr::apply(Func::Cosh, u),
                Func::Cosh => Expr::apply(Func::Sinh, u),
                Func::Tanh => Expr::apply(Func::Log, Expr::apply(Func::Cosh, u)),
                Func::Atan => {
                    u.clone() * Expr::apply(Func::Atan, u.clone())
                        - Expr::apply(Func::Log, Expr::power(u, Expr::int(2)) + Expr::one())
                            / Expr::int(2)
                }
                Func::Asin => {
                    u.clone() * Expr::apply(Func::Asin, u.clone())
                        + Expr::sqrt(Expr::one() - Expr::power(u, Expr::int(2)))
                }
                Func::Acos => {
                    u.clone() * Expr::apply(Func::Acos, u.clone())
                        - Expr::sqrt(Expr::one() - Expr::power(u, Expr::int(2)))
                }
                Func::Abs => return None,
            };
            Some(antiderivative / a)
        }
        _ => None,
    }
}

/// `1/(x**2 + k)` and `1/sqrt(k - x**2)` with positive rational `k`, plus
/// `(p*x + q)/(x**2 + b*x + c)` over an irreducible quadratic.
fn integrate_quadratic_forms(e: &Expr, var: &str) -> Option<Expr> {
    let x = x_of(var);
    let (numer, denom) = e.as_numer_denom();

    if let Expr::Pow(base, exp) = &denom {
        if **exp == Expr::frac(1, 2) && numer.is_one() {
            let p = Poly::from_expr(base, var)?.to_rational()?;
            let c = p.coeffs();
            if p.degree() == 2 && c[1].is_zero() && c[2].is_negative() && c[0].is_positive() {
                // 1/sqrt(k - m*x^2) = asin(x*sqrt(m/k)) / sqrt(m)
                let m = -c[2].clone();
                let ratio = Expr::sqrt(Expr::Number(&m / &c[0]));
                return Some(Expr::apply(Func::Asin, x * ratio) / Expr::sqrt(Expr::Number(m)));
            }
        }
    }

    let pn = Poly::from_expr(&numer, var)?.to_rational()?;
    let pd = Poly::from_expr(&denom, var)?.to_rational()?;
    if pd.degree() != 2 || pn.degree() > 1 {
        return None;
    }
    let lead = pd.leading();
    let d = pd.scale(&(Rational::one() / &lead));
    let n = pn.scale(&(Rational::one() / &lead));
    let b = d.coeffs()[1].clone();
    let c = d.coeffs()[0].clone();
    let k = &c - &b * &b / rational(4, 1);
    if !k.is_positive() {
        return None;
    }
    let p = n.coeffs().get(1).cloned().unwrap_or_default();
    let q = n.coeffs().first().cloned().unwrap_or_default();

    // p/2 * log(x^2 + b x + c) + (q - p b / 2) / sqrt(k) * atan((x + b/2) / sqrt(k))
    let quad = d.to_expr(var);
    let sqrt_k = Expr::sqrt(Expr::Number(k));
    let shift = x + Expr::Number(&b / rational(2, 1));
    let log_part = Expr::Number(&p / rational(2, 1)) * Expr::apply(Func::Log, quad);
    let atan_coeff = Expr::Number(&q - &p * &b / rational(2, 1)) / sqrt_k.clone();
    let atan_part = atan_coeff * Expr::apply(Func::Atan, shift / sqrt_k);
    Some(log_part + atan_part)
}

/// Partial fractions over distinct rational roots of the denominator.
fn integrate_partial_fractions(e: &Expr, var: &str) -> Option<Expr> {
    let (numer, denom) = e.as_numer_denom();
    if denom.is_one() {
        return None;
    }
    let pn = Poly::from_expr(&numer, var)?.to_rational()?;
    let pd = Poly::from_expr(&denom, var)?.to_rational()?;
    if pd.degree() < 2 {
        return None;
    }
    let (quotient, remainder) = pn.div_rem(&pd)?;
    let (roots, rest) = pd.rational_roots();
    if rest.degree() > 0 || roots.iter().any(|(_, m)| *m > 1) {
        return None;
    }
    let derivative = {
        let c = pd.coeffs();
        crate::algebra::QPoly::new(
            c.iter()
                .enumerate()
                .skip(1)
                .map(|(k, ck)| ck * rational(k as i64, 1))
                .collect(),
        )
    };
    let x = x_of(var);
    let mut terms = Vec::new();
    if !quotient.is_zero() {
        terms.push(integrate(&quotient.to_expr(var), var)?);
    }
    for (root, _) in roots {
        let residue = remainder.eval(&root) / derivative.eval(&root);
        terms.push(
            Expr::Number(residue) * Expr::apply(Func::Log, x.clone() - Expr::Number(root)),
        );
    }
    Some(Expr::sum(terms))
}

/// Substitute `u = g(x)` for each candidate inner expression `g`.
fn integrate_by_substitution(e: &Expr, var: &str, depth: usize) -> Option<Expr> {
    let mut candidates = Vec::new();
    collect_substitution_candidates(e, var, &mut candidates);
    candidates.sort();
    candidates.dedup();

    let u = Expr::symbol(SUBSTITUTION_VAR);
    for g in candidates {
        let dg = diff(&g, var);
        if dg.is_zero() {
            continue;
        }
        let ratio = e.clone() / dg;
        let replaced = ratio.rebuild_with(&|node| if *node == g { Some(u.clone()) } else { None });
        if replaced.contains_symbol(var) {
            continue;
        }
        if let Some(result) = integrate_depth(&replaced, SUBSTITUTION_VAR, depth + 1) {
            return Some(result.subs(SUBSTITUTION_VAR, &g));
        }
    }
    None
}

fn collect_substitution_candidates(e: &Expr, var: &str, out: &mut Vec<Expr>) {
    match e {
        Expr::Func(_, arg) => {
            out.push(e.clone());
            if arg.contains_symbol(var) && !matches!(**arg, Expr::Symbol(_)) {
                out.push((**arg).clone());
            }
            collect_substitution_candidates(arg, var, out);
        }
        Expr::Pow(base, exp) => {
            if base.contains_symbol(var) && !matches!(**base, Expr::Symbol(_)) {
                out.push((**base).clone());
            }
            if exp.contains_symbol(var) {
                out.push((**exp).clone());
            }
            collect_substitution_candidates(base, var, out);
        }
        Expr::Mul(items) | Expr::Add(items) => {
            for item in items {
                collect_substitution_candidates(item, var, out);
            }
        }
        _ => {}
    }
}

/// Polynomial factor for integration by parts: `x` or `x**n`.
fn is_polynomial_factor(f: &Expr, var: &str) -> bool {
    match f {
        Expr::Symbol(s) => s == var,
        Expr::Pow(base, exp) => {
            matches!(&**base, Expr::Symbol(s) if s == var)
                && exp.as_small_integer().map_or(false, |n| n > 0)
        }
        _ => false,
    }
}

/// `int u dv = u*v - int v du`, with `u` the polynomial part (or a logarithm
/// or inverse trigonometric factor).
fn integrate_by_parts(e: &Expr, var: &str, depth: usize) -> Option<Expr> {
    let factors = e.factors();
    if factors.len() < 2 {
        return None;
    }
    let pick = factors
        .iter()
        .position(|f| matches!(f, Expr::Func(Func::Log | Func::Atan | Func::Asin | Func::Acos, _)))
        .or_else(|| factors.iter().position(|f| is_polynomial_factor(f, var)))?;

    let u = factors[pick].clone();
    let dv = Expr::product(
        factors
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != pick)
            .map(|(_, f)| f.clone())
            .collect(),
    );
    let v = integrate_depth(&dv, var, depth + 1)?;
    let rest = integrate_depth(&expand(&(v.clone() * diff(&u, var))), var, depth + 1)?;
    Some(u * v - rest)
}

fn integrate_depth(e: &Expr, var: &str, depth: usize) -> Option<Expr> {
    if depth > MAX_INTEGRATION_DEPTH {
        return None;
    }
    if !e.contains_symbol(var) {
        return Some(e.clone() * x_of(var));
    }
    if let Expr::Add(terms) = e {
        let parts = terms
            .iter()
            .map(|t| integrate_depth(t, var, depth))
            .collect::<Option<Vec<_>>>()?;
        return Some(Expr::sum(parts));
    }

    // constant factors out
    let (constant, dependent): (Vec<Expr>, Vec<Expr>) = e
        .factors()
        .into_iter()
        .partition(|f| !f.contains_symbol(var));
    if !constant.is_empty() {
        let inner = integrate_depth(&Expr::product(dependent), var, depth)?;
        return Some(Expr::product(constant) * inner);
    }

    if let Some(result) = integrate_table(e, var) {
        return Some(result);
    }

    let expanded = expand(e);
    if expanded != *e {
        if let Some(result) = integrate_depth(&expanded, var, depth + 1) {
            return Some(result);
        }
    }

    integrate_quadratic_forms(e, var)
        .or_else(|| integrate_partial_fractions(e, var))
        .or_else(|| integrate_by_substitution(e, var, depth))
        .or_else(|| integrate_by_parts(e, var, depth))
}

/// Antiderivative without the constant of integration, `None` when no rule
/// applies.
pub fn integrate(e: &Expr, var: &str) -> Option<Expr> {
    integrate_depth(e, var, 0)
}

/// Evaluate `F(upper) - F(lower)`, taking limits at infinite bounds.
pub fn integrate_definite(e: &Expr, var: &str, lower: &Expr, upper: &Expr) -> Option<Expr> {
    let antiderivative = integrate(e, var)?;
    let at = |point: &Expr| -> Option<Expr> {
        if point.is_infinite() {
            limit(&antiderivative, var, point)
        } else {
            let v = antiderivative.subs(var, point);
            if v.is_undefined() {
                limit(&antiderivative, var, point)
            } else {
                Some(v)
            }
        }
    };
    let value = at(upper)? - at(lower)?;
    if value.is_undefined() {
        None
    } else {
        Some(expand(&value))
    }
}

/// The unevaluated integral node.
pub fn integral_node(e: &Expr, var: &str, bounds: Option<(Expr, Expr)>) -> Expr {
    Expr::Integral {
        integrand: Box::new(e.clone()),
        var: var.to_string(),
        bounds: bounds.map(|(lower, upper)| Box::new(Bounds { lower, upper })),
    }
}

// ── Limits ─────────────────────────────────────────────────────────────

/// A substituted value that is a genuine answer: finite, or a bare `oo`/`-oo`.
fn is_determinate(v: &Expr) -> bool {
    if v.is_undefined() {
        return false;
    }
    if v.is_positive_infinity() || v.is_negative_infinity() {
        return true;
    }
    !v.any(&|node: &Expr| node.is_positive_infinity())
}

fn signed_infinity(positive: bool) -> Expr {
    if positive {
        Expr::infinity()
    } else {
        Expr::neg_infinity()
    }
}

/// Sign of `e` just to the right of a finite point.
fn sign_near(e: &Expr, var: &str, point: &Expr) -> Option<bool> {
    let probe = point.clone() + Expr::frac(1, 1_000_000_000);
    let v = evaluate(&e.subs(var, &probe))?;
    if v == 0.0 {
        None
    } else {
        Some(v > 0.0)
    }
}

fn lhopital(numer: &Expr, denom: &Expr, var: &str, point: &Expr, depth: usize) -> Option<Expr> {
    let dn = diff(numer, var);
    let dd = diff(denom, var);
    if dd.is_zero() {
        return None;
    }
    limit_depth(&(dn / dd), var, point, depth + 1)
}

/// Degree comparison for rational functions at infinity.
fn rational_limit_at_infinity(e: &Expr, var: &str, point: &Expr) -> Option<Expr> {
    let (numer, denom) = e.as_numer_denom();
    let pn = Poly::from_expr(&numer, var)?.to_rational()?;
    let pd = Poly::from_expr(&denom, var)?.to_rational()?;
    if pd.is_zero() {
        return None;
    }
    let ratio = pn.leading() / pd.leading();
    let (dn, dd) = (pn.degree(), pd.degree());
    if pn.is_zero() || dn < dd {
        return Some(Expr::zero());
    }
    if dn == dd {
        return Some(Expr::Number(ratio));
    }
    let mut positive = ratio.is_positive();
    if point.is_negative_infinity() && (dn - dd) % 2 == 1 {
        positive = !positive;
    }
    Some(signed_infinity(positive))
}

fn limit_depth(e: &Expr, var: &str, point: &Expr, depth: usize) -> Option<Expr> {
    if !e.contains_symbol(var) {
        return Some(e.clone());
    }
    if depth > MAX_LIMIT_DEPTH {
        return None;
    }

    // f^g with the variable in both: exp(lim g*log(f))
    if let Expr::Pow(base, exp) = e {
        if base.contains_symbol(var) && exp.contains_symbol(var) {
            let inner = (**exp).clone() * Expr::apply(Func::Log, (**base).clone());
            let l = limit_depth(&inner, var, point, depth + 1)?;
            return Some(Expr::apply(Func::Exp, l));
        }
    }

    let direct = e.subs(var, point);
    if is_determinate(&direct) {
        return Some(direct);
    }

    if point.is_infinite() {
        if let Some(l) = rational_limit_at_infinity(e, var, point) {
            return Some(l);
        }
    }

    if let Expr::Func(f, arg) = e {
        let inner = limit_depth(arg, var, point, depth + 1)?;
        if *f == Func::Log && inner.is_zero() {
            return Some(Expr::neg_infinity());
        }
        let v = Expr::apply(*f, inner);
        return if is_determinate(&v) { Some(v) } else { None };
    }

    // 0*oo: move the vanishing side into a denominator
    if let Expr::Mul(factors) = e {
        let limits: Vec<Option<Expr>> = factors
            .iter()
            .map(|f| limit_depth(f, var, point, depth + 1))
            .collect();
        let infinite = limits
            .iter()
            .position(|l| l.as_ref().map_or(false, |l| l.is_infinite()));
        let vanishing = limits
            .iter()
            .position(|l| l.as_ref().map_or(false, Expr::is_zero));
        if let (Some(i), Some(z)) = (infinite, vanishing) {
            let without = |skip: usize| {
                Expr::product(
                    factors
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != skip)
                        .map(|(_, f)| f.clone())
                        .collect(),
                )
            };
            // try f/(1/g) with g the vanishing factor, then with g the infinite one
            return lhopital(&without(z), &(Expr::one() / factors[z].clone()), var, point, depth)
                .or_else(|| {
                    lhopital(&without(i), &(Expr::one() / factors[i].clone()), var, point, depth)
                });
        }
        if limits.iter().all(Option::is_some) {
            let product = Expr::product(limits.into_iter().flatten().collect());
            if is_determinate(&product) {
                return Some(product);
            }
        }
    }

    let (numer, denom) = e.as_numer_denom();
    if !denom.is_one() {
        let ln = limit_depth(&numer, var, point, depth + 1);
        let ld = limit_depth(&denom, var, point, depth + 1);
        if let (Some(ln), Some(ld)) = (ln, ld) {
            let both_zero = ln.is_zero() && ld.is_zero();
            let both_infinite = ln.is_infinite() && ld.is_infinite();
            if both_zero || both_infinite {
                return lhopital(&numer, &denom, var, point, depth);
            }
            if ld.is_zero() && !ln.is_zero() && !point.is_infinite() {
                let positive = sign_near(e, var, point)?;
                return Some(signed_infinity(positive));
            }
            let q = ln / ld;
            if is_determinate(&q) {
                return Some(q);
            }
        }
    }

    // oo - oo: combine over a common denominator and retry
    if let Expr::Add(_) = e {
        let combined = together(e);
        if combined != *e {
            return limit_depth(&combined, var, point, depth + 1);
        }
    }

    None
}

/// Limit of `e` as `var` approaches `point` (from the right at finite
/// points). `None` when no rule decides it.
pub fn limit(e: &Expr, var: &str, point: &Expr) -> Option<Expr> {
    limit_depth(e, var, point, 0).map(|l| expand(&l))
}
