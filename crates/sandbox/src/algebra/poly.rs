//! Univariate polynomials.
//!
//! [`Poly`] keeps arbitrary coefficients free of the main variable and is what
//! `solve` and `limit` inspect. [`QPoly`] is the rational-coefficient form used
//! for exact division, gcd and rational root search.

use std::collections::BTreeSet;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use super::expand;
use crate::expr::{Expr, Rational};

/// Degrees above this are not treated as polynomials.
const MAX_DEGREE: usize = 256;

/// Rational root search gives up beyond this constant or leading coefficient.
const MAX_ROOT_SEARCH: u64 = 1_000_000;

#[derive(Clone, Debug, PartialEq)]
pub struct Poly {
    coeffs: Vec<Expr>,
}

impl Poly {
    fn new(mut coeffs: Vec<Expr>) -> Self {
        while coeffs.last().map_or(false, Expr::is_zero) {
            coeffs.pop();
        }
        Self { coeffs }
    }

    /// Read `e` as a polynomial in `var`, expanding it first.
    pub fn from_expr(e: &Expr, var: &str) -> Option<Poly> {
        let expanded = expand(e);
        let mut buckets: Vec<Vec<Expr>> = Vec::new();
        for term in expanded.terms() {
            let (degree, coeff) = monomial(&term, var)?;
            if degree > MAX_DEGREE {
                return None;
            }
            if buckets.len() <= degree {
                buckets.resize_with(degree + 1, Vec::new);
            }
            buckets[degree].push(coeff);
        }
        Some(Poly::new(buckets.into_iter().map(Expr::sum).collect()))
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    pub fn coeff(&self, k: usize) -> Expr {
        self.coeffs.get(k).cloned().unwrap_or_else(Expr::zero)
    }

    pub fn leading(&self) -> Expr {
        self.coeffs.last().cloned().unwrap_or_else(Expr::zero)
    }

    pub fn to_rational(&self) -> Option<QPoly> {
        let coeffs = self
            .coeffs
            .iter()
            .map(|c| c.as_number().cloned())
            .collect::<Option<Vec<_>>>()?;
        Some(QPoly::new(coeffs))
    }
}

/// Degree and coefficient of a single term, `None` when the term is not a
/// monomial in `var`.
fn monomial(term: &Expr, var: &str) -> Option<(usize, Expr)> {
    let mut degree = 0usize;
    let mut coeff = Vec::new();
    for factor in term.factors() {
        if !factor.contains_symbol(var) {
            coeff.push(factor);
            continue;
        }
        match &factor {
            Expr::Symbol(s) if s == var => degree += 1,
            Expr::Pow(base, exp) if matches!(&**base, Expr::Symbol(s) if s == var) => {
                let n = exp.as_small_integer()?;
                if n < 0 {
                    return None;
                }
                degree += n as usize;
            }
            _ => return None,
        }
    }
    Some((degree, Expr::product(coeff)))
}

/// Polynomial with rational coefficients, lowest degree first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QPoly(Vec<Rational>);

impl QPoly {
    pub fn new(mut coeffs: Vec<Rational>) -> Self {
        while coeffs.last().map_or(false, Zero::is_zero) {
            coeffs.pop();
        }
        Self(coeffs)
    }

    fn linear(root_numer: BigInt, root_denom: BigInt) -> Self {
        // q*x - p
        QPoly::new(vec![
            Rational::from_integer(-root_numer),
            Rational::from_integer(root_denom),
        ])
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn degree(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn leading(&self) -> Rational {
        self.0.last().cloned().unwrap_or_else(Rational::zero)
    }

    pub fn coeffs(&self) -> &[Rational] {
        &self.0
    }

    pub fn eval(&self, x: &Rational) -> Rational {
        self.0
            .iter()
            .rev()
            .fold(Rational::zero(), |acc, c| acc * x + c)
    }

    pub fn scale(&self, k: &Rational) -> QPoly {
        QPoly::new(self.0.iter().map(|c| c * k).collect())
    }

    pub fn monic(&self) -> QPoly {
        if self.is_zero() {
            return self.clone();
        }
        self.scale(&(Rational::one() / self.leading()))
    }

    /// Polynomial long division; `None` for a zero divisor.
    pub fn div_rem(&self, divisor: &QPoly) -> Option<(QPoly, QPoly)> {
        if divisor.is_zero() {
            return None;
        }
        let mut rem = self.0.clone();
        let d = divisor.degree();
        let lead = divisor.leading();
        if self.is_zero() || self.degree() < d {
            return Some((QPoly::new(Vec::new()), self.clone()));
        }
        let mut quot = vec![Rational::zero(); self.degree() - d + 1];
        for k in (0..quot.len()).rev() {
            let c = &rem[k + d] / &lead;
            if !c.is_zero() {
                for (i, dc) in divisor.0.iter().enumerate() {
                    rem[k + i] -= &c * dc;
                }
            }
            quot[k] = c;
        }
        rem.truncate(d);
        Some((QPoly::new(quot), QPoly::new(rem)))
    }

    /// Monic greatest common divisor.
    pub fn gcd(&self, other: &QPoly) -> QPoly {
        let mut a = self.clone();
        let mut b = other.clone();
        while !b.is_zero() {
            let r = match a.div_rem(&b) {
                Some((_, r)) => r,
                None => break,
            };
            a = b;
            b = r;
        }
        a.monic()
    }

    /// Split into `content * primitive` with integer coefficients and a
    /// positive leading coefficient in the primitive part.
    pub fn primitive(&self) -> (Rational, QPoly) {
        if self.is_zero() {
            return (Rational::zero(), self.clone());
        }
        let lcm = self
            .0
            .iter()
            .fold(BigInt::one(), |acc, c| acc.lcm(c.denom()));
        let ints: Vec<BigInt> = self
            .0
            .iter()
            .map(|c| (c * Rational::from_integer(lcm.clone())).to_integer())
            .collect();
        let mut gcd = ints.iter().fold(BigInt::zero(), |acc, c| acc.gcd(c));
        if self.leading().is_negative() {
            gcd = -gcd;
        }
        let content = Rational::new(gcd.clone(), lcm);
        let prim = ints
            .into_iter()
            .map(|c| Rational::from_integer(c / &gcd))
            .collect();
        (content, QPoly::new(prim))
    }

    /// Rational roots with multiplicity, plus the cofactor left after
    /// dividing out every `(q*x - p)` factor. Roots come back sorted.
    pub fn rational_roots(&self) -> (Vec<(Rational, u32)>, QPoly) {
        let (_, mut rest) = self.primitive();
        let mut roots = Vec::new();

        let mut zero_mult = 0;
        while rest.degree() > 0 && rest.0[0].is_zero() {
            rest = QPoly::new(rest.0[1..].to_vec());
            zero_mult += 1;
        }
        if zero_mult > 0 {
            roots.push((Rational::zero(), zero_mult));
        }
        if rest.degree() == 0 {
            return (roots, rest);
        }

        let constant = rest.0[0].numer().abs().to_u64();
        let lead = rest.leading().numer().abs().to_u64();
        let (constant, lead) = match (constant, lead) {
            (Some(c), Some(l)) if c <= MAX_ROOT_SEARCH && l <= MAX_ROOT_SEARCH => (c, l),
            _ => return (roots, rest),
        };

        let mut candidates = BTreeSet::new();
        for p in divisors(constant) {
            for q in divisors(lead) {
                let r = Rational::new(BigInt::from(p), BigInt::from(q));
                candidates.insert(-r.clone());
                candidates.insert(r);
            }
        }

        for candidate in candidates {
            let mut mult = 0;
            while rest.degree() >= 1 && rest.eval(&candidate).is_zero() {
                let linear = QPoly::linear(candidate.numer().clone(), candidate.denom().clone());
                match rest.div_rem(&linear) {
                    Some((q, _)) => rest = q,
                    None => break,
                }
                mult += 1;
            }
            if mult > 0 {
                roots.push((candidate, mult));
            }
        }
        roots.sort();
        (roots, rest)
    }

    pub fn to_expr(&self, var: &str) -> Expr {
        let x = Expr::symbol(var);
        Expr::sum(
            self.0
                .iter()
                .enumerate()
                .filter(|(_, c)| !c.is_zero())
                .map(|(k, c)| {
                    Expr::Number(c.clone()) * Expr::power(x.clone(), Expr::int(k as i64))
                })
                .collect(),
        )
    }
}

fn divisors(n: u64) -> Vec<u64> {
    let mut out = Vec::new();
    let mut d = 1;
    while d * d <= n {
        if n % d == 0 {
            out.push(d);
            if d != n / d {
                out.push(n / d);
            }
        }
        d += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::rational;
    use pretty_assertions::assert_eq;

    fn q(coeffs: &[i64]) -> QPoly {
        QPoly::new(coeffs.iter().map(|&c| Rational::from_integer(c.into())).collect())
    }

    #[test]
    fn test_from_expr() {
        let x = Expr::symbol("x");
        let e = (x.clone() + Expr::one()) * (x.clone() - Expr::int(2));
        let p = Poly::from_expr(&e, "x").unwrap();
        assert_eq!(p.degree(), 2);
        assert_eq!(p.coeff(0), Expr::int(-2));
        assert_eq!(p.coeff(1), Expr::int(-1));
        assert_eq!(p.leading(), Expr::one());
    }

    #[test]
    fn test_from_expr_symbolic_coefficients() {
        let x = Expr::symbol("x");
        let a = Expr::symbol("a");
        let e = a.clone() * Expr::power(x.clone(), Expr::int(2)) + x.clone();
        let p = Poly::from_expr(&e, "x").unwrap();
        assert_eq!(p.leading(), a);
        assert!(p.to_rational().is_none());
    }

    #[test]
    fn test_not_a_polynomial() {
        let x = Expr::symbol("x");
        assert!(Poly::from_expr(&Expr::sqrt(x.clone()), "x").is_none());
        assert!(Poly::from_expr(&(Expr::one() / x), "x").is_none());
    }

    #[test]
    fn test_div_rem_and_gcd() {
        // (x^2 - 1) / (x - 1) = x + 1
        let (quot, rem) = q(&[-1, 0, 1]).div_rem(&q(&[-1, 1])).unwrap();
        assert_eq!(quot, q(&[1, 1]));
        assert!(rem.is_zero());

        let g = q(&[-1, 0, 1]).gcd(&q(&[1, 2, 1]));
        assert_eq!(g, q(&[1, 1]));
    }

    #[test]
    fn test_rational_roots() {
        // 2x^3 - 3x^2 + x = x(2x - 1)(x - 1)
        let (roots, rest) = q(&[0, 1, -3, 2]).rational_roots();
        assert_eq!(
            roots,
            vec![
                (Rational::zero(), 1),
                (rational(1, 2), 1),
                (Rational::one(), 1)
            ]
        );
        assert_eq!(rest.degree(), 0);
    }

    #[test]
    fn test_rational_roots_with_irreducible_cofactor() {
        // x^4 - 1 = (x - 1)(x + 1)(x^2 + 1)
        let (roots, rest) = q(&[-1, 0, 0, 0, 1]).rational_roots();
        assert_eq!(roots.len(), 2);
        assert_eq!(rest, q(&[1, 0, 1]));
    }

    #[test]
    fn test_primitive() {
        let p = QPoly::new(vec![rational(-1, 2), Rational::zero(), rational(-3, 2)]);
        let (content, prim) = p.primitive();
        assert_eq!(content, rational(-1, 2));
        assert_eq!(prim, q(&[1, 0, 3]));
    }
}
