//! Symbolic expressions.
//!
//! An [`Expr`] is always kept in canonical form: the constructors
//! [`Expr::sum`], [`Expr::product`], [`Expr::power`] and [`Expr::apply`] flatten
//! nested sums and products, fold numeric parts, collect like terms and
//! combine powers of equal bases. Structural equality of two canonical trees is
//! therefore a cheap (incomplete) test of mathematical equality.

use std::collections::{BTreeMap, BTreeSet};
use std::ops;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

pub type Rational = BigRational;

/// Largest integer exponent evaluated exactly on a rational base.
const MAX_EXACT_EXPONENT: i64 = 10_000;

/// Largest root degree whose perfect powers are extracted.
const MAX_ROOT_DEGREE: u32 = 64;

/// Trial-division bound used when extracting perfect powers.
const TRIAL_DIVISION_LIMIT: u32 = 10_000;

pub fn rational(numer: i64, denom: i64) -> Rational {
    BigRational::new(BigInt::from(numer), BigInt::from(denom))
}

pub fn integer(n: i64) -> Rational {
    BigRational::from_integer(BigInt::from(n))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Constant {
    Pi,
    E,
    I,
    Infinity,
    ComplexInfinity,
    NaN,
}

impl Constant {
    pub fn name(&self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::E => "E",
            Constant::I => "I",
            Constant::Infinity => "oo",
            Constant::ComplexInfinity => "zoo",
            Constant::NaN => "nan",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Log,
    Abs,
}

impl Func {
    pub fn name(&self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Asin => "asin",
            Func::Acos => "acos",
            Func::Atan => "atan",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
            Func::Tanh => "tanh",
            Func::Exp => "exp",
            Func::Log => "log",
            Func::Abs => "Abs",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "asin" => Func::Asin,
            "acos" => Func::Acos,
            "atan" => Func::Atan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "exp" => Func::Exp,
            "log" | "ln" => Func::Log,
            "Abs" => Func::Abs,
            _ => return None,
        })
    }

    fn is_odd(&self) -> bool {
        matches!(
            self,
            Func::Sin | Func::Tan | Func::Asin | Func::Atan | Func::Sinh | Func::Tanh
        )
    }

    fn is_even(&self) -> bool {
        matches!(self, Func::Cos | Func::Cosh)
    }
}

/// Bounds of a definite integral.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bounds {
    pub lower: Expr,
    pub upper: Expr,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expr {
    Number(Rational),
    Symbol(String),
    Constant(Constant),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Func(Func, Box<Expr>),
    /// Unevaluated integral
    Integral {
        integrand: Box<Expr>,
        var: String,
        bounds: Option<Box<Bounds>>,
    },
    /// Unevaluated derivative
    Derivative {
        expr: Box<Expr>,
        var: String,
        order: u32,
    },
    /// Unevaluated limit
    Limit {
        expr: Box<Expr>,
        var: String,
        point: Box<Expr>,
    },
}

impl Expr {
    pub fn zero() -> Expr {
        Expr::Number(Rational::zero())
    }

    pub fn one() -> Expr {
        Expr::Number(Rational::one())
    }

    pub fn int(n: i64) -> Expr {
        Expr::Number(integer(n))
    }

    pub fn frac(numer: i64, denom: i64) -> Expr {
        Expr::Number(rational(numer, denom))
    }

    pub fn symbol(name: impl Into<String>) -> Expr {
        Expr::Symbol(name.into())
    }

    pub fn pi() -> Expr {
        Expr::Constant(Constant::Pi)
    }

    pub fn infinity() -> Expr {
        Expr::Constant(Constant::Infinity)
    }

    pub fn neg_infinity() -> Expr {
        Expr::Mul(vec![Expr::int(-1), Expr::infinity()])
    }

    pub fn nan() -> Expr {
        Expr::Constant(Constant::NaN)
    }

    pub fn zoo() -> Expr {
        Expr::Constant(Constant::ComplexInfinity)
    }

    pub fn sqrt(arg: Expr) -> Expr {
        Expr::power(arg, Expr::frac(1, 2))
    }

    // ── Predicates ─────────────────────────────────────────────────────

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Number(n) if n.is_zero())
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Number(n) if n.is_one())
    }

    pub fn as_number(&self) -> Option<&Rational> {
        match self {
            Expr::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<BigInt> {
        match self {
            Expr::Number(n) if n.is_integer() => Some(n.to_integer()),
            _ => None,
        }
    }

    pub fn as_small_integer(&self) -> Option<i64> {
        self.as_integer().and_then(|n| n.to_i64())
    }

    pub fn is_positive_infinity(&self) -> bool {
        matches!(self, Expr::Constant(Constant::Infinity))
    }

    pub fn is_negative_infinity(&self) -> bool {
        matches!(self, Expr::Mul(fs) if fs.len() == 2
            && fs[0] == Expr::int(-1)
            && fs[1].is_positive_infinity())
    }

    /// `oo`, `-oo` or `zoo`
    pub fn is_infinite(&self) -> bool {
        self.is_positive_infinity()
            || self.is_negative_infinity()
            || matches!(self, Expr::Constant(Constant::ComplexInfinity))
    }

    /// `nan` or `zoo` anywhere in the tree
    pub fn is_undefined(&self) -> bool {
        self.any(&|e: &Expr| {
            matches!(
                e,
                Expr::Constant(Constant::NaN) | Expr::Constant(Constant::ComplexInfinity)
            )
        })
    }

    /// True when some node of the tree satisfies `pred`.
    pub fn any(&self, pred: &dyn Fn(&Expr) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        match self {
            Expr::Number(_) | Expr::Symbol(_) | Expr::Constant(_) => false,
            Expr::Add(items) | Expr::Mul(items) => items.iter().any(|e| e.any(pred)),
            Expr::Pow(b, e) => b.any(pred) || e.any(pred),
            Expr::Func(_, a) => a.any(pred),
            Expr::Integral {
                integrand, bounds, ..
            } => {
                integrand.any(pred)
                    || bounds
                        .as_ref()
                        .map_or(false, |b| b.lower.any(pred) || b.upper.any(pred))
            }
            Expr::Derivative { expr, .. } => expr.any(pred),
            Expr::Limit { expr, point, .. } => expr.any(pred) || point.any(pred),
        }
    }

    /// Whether `name` occurs free in the expression.
    pub fn contains_symbol(&self, name: &str) -> bool {
        self.free_symbols().contains(name)
    }

    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_free_symbols(&mut out);
        out
    }

    fn collect_free_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) | Expr::Constant(_) => {}
            Expr::Symbol(s) => {
                out.insert(s.clone());
            }
            Expr::Add(items) | Expr::Mul(items) => {
                for item in items {
                    item.collect_free_symbols(out);
                }
            }
            Expr::Pow(b, e) => {
                b.collect_free_symbols(out);
                e.collect_free_symbols(out);
            }
            Expr::Func(_, a) => a.collect_free_symbols(out),
            Expr::Integral {
                integrand,
                var,
                bounds,
            } => {
                let mut inner = BTreeSet::new();
                integrand.collect_free_symbols(&mut inner);
                match bounds {
                    Some(b) => {
                        inner.remove(var);
                        b.lower.collect_free_symbols(&mut inner);
                        b.upper.collect_free_symbols(&mut inner);
                    }
                    None => {
                        inner.insert(var.clone());
                    }
                }
                out.extend(inner);
            }
            Expr::Derivative { expr, var, .. } => {
                expr.collect_free_symbols(out);
                out.insert(var.clone());
            }
            Expr::Limit { expr, var, point } => {
                let mut inner = BTreeSet::new();
                expr.collect_free_symbols(&mut inner);
                inner.remove(var);
                point.collect_free_symbols(&mut inner);
                out.extend(inner);
            }
        }
    }

    /// A negative leading coefficient, used to normalize odd/even functions.
    pub fn could_extract_minus_sign(&self) -> bool {
        match self {
            Expr::Number(n) => n.is_negative(),
            Expr::Mul(fs) => matches!(fs.first(), Some(Expr::Number(n)) if n.is_negative()),
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        1 + match self {
            Expr::Number(_) | Expr::Symbol(_) | Expr::Constant(_) => 0,
            Expr::Add(items) | Expr::Mul(items) => items.iter().map(Expr::node_count).sum(),
            Expr::Pow(b, e) => b.node_count() + e.node_count(),
            Expr::Func(_, a) => a.node_count(),
            Expr::Integral { integrand, .. } => integrand.node_count(),
            Expr::Derivative { expr, .. } => expr.node_count(),
            Expr::Limit { expr, point, .. } => expr.node_count() + point.node_count(),
        }
    }

    // ── Decomposition ──────────────────────────────────────────────────

    /// Split into numeric coefficient and the remaining term.
    pub fn as_coeff_term(&self) -> (Rational, Expr) {
        match self {
            Expr::Number(n) => (n.clone(), Expr::one()),
            Expr::Mul(fs) => match fs.first() {
                Some(Expr::Number(n)) => {
                    let rest = if fs.len() == 2 {
                        fs[1].clone()
                    } else {
                        Expr::Mul(fs[1..].to_vec())
                    };
                    (n.clone(), rest)
                }
                _ => (Rational::one(), self.clone()),
            },
            other => (Rational::one(), other.clone()),
        }
    }

    /// Split into base and exponent; `exp(a)` reads as `E**a`.
    pub fn as_base_exp(&self) -> (Expr, Expr) {
        match self {
            Expr::Pow(b, e) => ((**b).clone(), (**e).clone()),
            Expr::Func(Func::Exp, a) => (Expr::Constant(Constant::E), (**a).clone()),
            other => (other.clone(), Expr::one()),
        }
    }

    /// Factors of a product (a single factor for anything else).
    pub fn factors(&self) -> Vec<Expr> {
        match self {
            Expr::Mul(fs) => fs.clone(),
            other => vec![other.clone()],
        }
    }

    /// Terms of a sum (a single term for anything else).
    pub fn terms(&self) -> Vec<Expr> {
        match self {
            Expr::Add(ts) => ts.clone(),
            other => vec![other.clone()],
        }
    }

    /// Split a product into numerator and denominator by exponent sign.
    pub fn as_numer_denom(&self) -> (Expr, Expr) {
        let mut numer = Vec::new();
        let mut denom = Vec::new();
        for factor in self.factors() {
            match &factor {
                Expr::Number(n) => {
                    numer.push(Expr::Number(Rational::from_integer(n.numer().clone())));
                    denom.push(Expr::Number(Rational::from_integer(n.denom().clone())));
                }
                _ => {
                    let (base, exp) = factor.as_base_exp();
                    if exp.could_extract_minus_sign() {
                        denom.push(Expr::power(base, -exp));
                    } else {
                        numer.push(factor);
                    }
                }
            }
        }
        (Expr::product(numer), Expr::product(denom))
    }

    // ── Canonical constructors ─────────────────────────────────────────

    fn with_coeff(coeff: Rational, rest: Expr) -> Expr {
        if coeff.is_one() {
            return rest;
        }
        if rest.is_one() {
            return Expr::Number(coeff);
        }
        match rest {
            Expr::Mul(fs) => {
                let mut out = Vec::with_capacity(fs.len() + 1);
                out.push(Expr::Number(coeff));
                out.extend(fs);
                Expr::Mul(out)
            }
            other => Expr::Mul(vec![Expr::Number(coeff), other]),
        }
    }

    pub fn sum(terms: Vec<Expr>) -> Expr {
        let mut constant = Rational::zero();
        let mut collected: BTreeMap<Expr, Rational> = BTreeMap::new();
        let mut complex_infinity = false;

        let mut stack = terms;
        while let Some(term) = stack.pop() {
            match term {
                Expr::Add(inner) => stack.extend(inner),
                Expr::Number(n) => constant += n,
                Expr::Constant(Constant::NaN) => return Expr::nan(),
                Expr::Constant(Constant::ComplexInfinity) => complex_infinity = true,
                other => {
                    let (coeff, rest) = other.as_coeff_term();
                    *collected.entry(rest).or_insert_with(Rational::zero) += coeff;
                }
            }
        }

        if complex_infinity {
            return Expr::zoo();
        }
        if let Some(coeff) = collected.get(&Expr::infinity()) {
            return if coeff.is_positive() {
                Expr::infinity()
            } else if coeff.is_negative() {
                Expr::neg_infinity()
            } else {
                Expr::nan()
            };
        }

        let mut out: Vec<Expr> = collected
            .into_iter()
            .filter(|(_, c)| !c.is_zero())
            .map(|(rest, c)| Expr::with_coeff(c, rest))
            .collect();
        if !constant.is_zero() {
            out.push(Expr::Number(constant));
        }
        match out.len() {
            0 => Expr::zero(),
            1 => out.remove(0),
            _ => {
                out.sort();
                Expr::Add(out)
            }
        }
    }

    pub fn product(factors: Vec<Expr>) -> Expr {
        let mut coeff = Rational::one();
        let mut powers: BTreeMap<Expr, Vec<Expr>> = BTreeMap::new();
        let mut infinite = false;
        let mut complex_infinity = false;

        let mut stack = factors;
        while let Some(factor) = stack.pop() {
            match factor {
                Expr::Mul(inner) => stack.extend(inner),
                Expr::Number(n) => coeff *= n,
                Expr::Constant(Constant::NaN) => return Expr::nan(),
                Expr::Constant(Constant::ComplexInfinity) => complex_infinity = true,
                Expr::Constant(Constant::Infinity) => infinite = true,
                other => {
                    let (base, exp) = other.as_base_exp();
                    powers.entry(base).or_default().push(exp);
                }
            }
        }

        if complex_infinity {
            return if coeff.is_zero() {
                Expr::nan()
            } else {
                Expr::zoo()
            };
        }
        if coeff.is_zero() {
            return if infinite { Expr::nan() } else { Expr::zero() };
        }

        let mut rebuilt = Vec::with_capacity(powers.len());
        let mut needs_pass = false;
        for (base, exps) in powers {
            match Expr::power(base, Expr::sum(exps)) {
                Expr::Number(n) => coeff *= n,
                Expr::Mul(inner) => {
                    needs_pass = true;
                    rebuilt.extend(inner);
                }
                other => rebuilt.push(other),
            }
        }

        if needs_pass {
            rebuilt.push(Expr::Number(coeff));
            if infinite {
                rebuilt.push(Expr::infinity());
            }
            return Expr::product(rebuilt);
        }
        if coeff.is_zero() {
            return Expr::zero();
        }
        if infinite {
            rebuilt.push(Expr::infinity());
            coeff = if coeff.is_negative() {
                -Rational::one()
            } else {
                Rational::one()
            };
        }
        if rebuilt.is_empty() {
            return Expr::Number(coeff);
        }
        rebuilt.sort();

        if rebuilt.len() == 1 && !coeff.is_one() {
            if let Expr::Add(terms) = &rebuilt[0] {
                return Expr::sum(
                    terms
                        .iter()
                        .map(|t| Expr::product(vec![Expr::Number(coeff.clone()), t.clone()]))
                        .collect(),
                );
            }
        }

        if coeff.is_one() && rebuilt.len() == 1 {
            return rebuilt.remove(0);
        }
        Expr::with_coeff(coeff, Expr::Mul(rebuilt))
    }

    /// Product kept exactly as given (sorted, numeric factors folded), used
    /// for factored forms that canonical multiplication would distribute.
    pub fn product_unevaluated(factors: Vec<Expr>) -> Expr {
        let mut coeff = Rational::one();
        let mut rest = Vec::new();
        for f in factors {
            match f {
                Expr::Number(n) => coeff *= n,
                other if other.is_one() => {}
                other => rest.push(other),
            }
        }
        if coeff.is_zero() {
            return Expr::zero();
        }
        rest.sort();
        match (coeff.is_one(), rest.len()) {
            (_, 0) => Expr::Number(coeff),
            (true, 1) => rest.remove(0),
            (true, _) => Expr::Mul(rest),
            (false, _) => {
                let mut out = vec![Expr::Number(coeff)];
                out.extend(rest);
                Expr::Mul(out)
            }
        }
    }

    pub fn power(base: Expr, exp: Expr) -> Expr {
        if exp.is_zero() {
            return Expr::one();
        }
        if exp.is_one() {
            return base;
        }
        if base.is_one() {
            return Expr::one();
        }
        if let (Expr::Number(b), Expr::Number(e)) = (&base, &exp) {
            return numeric_power(b, e);
        }
        if matches!(base, Expr::Constant(Constant::NaN)) || matches!(exp, Expr::Constant(Constant::NaN)) {
            return Expr::nan();
        }
        if matches!(base, Expr::Constant(Constant::E)) {
            return Expr::apply(Func::Exp, exp);
        }
        if base.is_positive_infinity() {
            if let Some(e) = exp.as_number() {
                return if e.is_positive() {
                    Expr::infinity()
                } else {
                    Expr::zero()
                };
            }
        }
        if exp.is_positive_infinity() {
            if let Some(b) = base.as_number() {
                let magnitude = b.abs();
                if magnitude > Rational::one() {
                    return Expr::infinity();
                }
                if magnitude < Rational::one() {
                    return Expr::zero();
                }
            }
        }
        if base.is_zero() {
            if let Some(e) = exp.as_number() {
                return if e.is_positive() {
                    Expr::zero()
                } else {
                    Expr::zoo()
                };
            }
        }

        if let Some(n) = exp.as_integer() {
            if matches!(base, Expr::Constant(Constant::I)) {
                let r = ((n % BigInt::from(4)) + BigInt::from(4)) % BigInt::from(4);
                return match r.to_u8().unwrap_or(0) {
                    0 => Expr::one(),
                    1 => Expr::Constant(Constant::I),
                    2 => Expr::int(-1),
                    _ => Expr::product(vec![Expr::int(-1), Expr::Constant(Constant::I)]),
                };
            }
            match base {
                Expr::Pow(b, e) => return Expr::power(*b, Expr::product(vec![*e, exp])),
                Expr::Mul(fs) => {
                    return Expr::product(
                        fs.into_iter()
                            .map(|f| Expr::power(f, exp.clone()))
                            .collect(),
                    )
                }
                Expr::Func(Func::Exp, a) => {
                    return Expr::apply(Func::Exp, Expr::product(vec![*a, exp]))
                }
                other => return Expr::Pow(Box::new(other), Box::new(exp)),
            }
        }

        // Pull a positive numeric coefficient out of a product: sqrt(4*x) = 2*sqrt(x)
        let positive_coeff = matches!(&base, Expr::Mul(fs)
            if matches!(fs.first(), Some(Expr::Number(c)) if c.is_positive()));
        if positive_coeff && exp.as_number().is_some() {
            let (coeff, rest) = base.as_coeff_term();
            return Expr::product(vec![
                Expr::power(Expr::Number(coeff), exp.clone()),
                Expr::power(rest, exp),
            ]);
        }

        Expr::Pow(Box::new(base), Box::new(exp))
    }

    pub fn apply(func: Func, arg: Expr) -> Expr {
        if matches!(arg, Expr::Constant(Constant::NaN)) {
            return Expr::nan();
        }
        if func.is_odd() && arg.could_extract_minus_sign() {
            return -Expr::apply(func, -arg);
        }
        if func.is_even() && arg.could_extract_minus_sign() {
            return Expr::apply(func, -arg);
        }

        match func {
            Func::Exp => {
                if arg.is_zero() {
                    return Expr::one();
                }
                if arg.is_one() {
                    return Expr::Constant(Constant::E);
                }
                if arg.is_positive_infinity() {
                    return Expr::infinity();
                }
                if arg.is_negative_infinity() {
                    return Expr::zero();
                }
                if let Expr::Func(Func::Log, inner) = &arg {
                    return (**inner).clone();
                }
                if let Expr::Mul(fs) = &arg {
                    if let [Expr::Number(c), Expr::Func(Func::Log, inner)] = fs.as_slice() {
                        return Expr::power((**inner).clone(), Expr::Number(c.clone()));
                    }
                }
            }
            Func::Log => {
                if arg.is_one() {
                    return Expr::zero();
                }
                if arg.is_zero() {
                    return Expr::zoo();
                }
                if matches!(arg, Expr::Constant(Constant::E)) {
                    return Expr::one();
                }
                if arg.is_positive_infinity() {
                    return Expr::infinity();
                }
                if let Expr::Func(Func::Exp, inner) = &arg {
                    return (**inner).clone();
                }
            }
            Func::Sin | Func::Cos | Func::Tan => {
                if let Some(value) = trig_special_value(func, &arg) {
                    return value;
                }
                let inverse = match func {
                    Func::Sin => Func::Asin,
                    Func::Cos => Func::Acos,
                    _ => Func::Atan,
                };
                if let Expr::Func(f, inner) = &arg {
                    if *f == inverse {
                        return (**inner).clone();
                    }
                }
            }
            Func::Asin => {
                if arg.is_zero() {
                    return Expr::zero();
                }
                if arg.is_one() {
                    return Expr::product(vec![Expr::frac(1, 2), Expr::pi()]);
                }
                if arg == Expr::frac(1, 2) {
                    return Expr::product(vec![Expr::frac(1, 6), Expr::pi()]);
                }
            }
            Func::Acos => {
                if arg.is_one() {
                    return Expr::zero();
                }
                if arg.is_zero() {
                    return Expr::product(vec![Expr::frac(1, 2), Expr::pi()]);
                }
                if arg == Expr::int(-1) {
                    return Expr::pi();
                }
                if arg == Expr::frac(1, 2) {
                    return Expr::product(vec![Expr::frac(1, 3), Expr::pi()]);
                }
            }
            Func::Atan => {
                if arg.is_zero() {
                    return Expr::zero();
                }
                if arg.is_one() {
                    return Expr::product(vec![Expr::frac(1, 4), Expr::pi()]);
                }
                if arg.is_positive_infinity() {
                    return Expr::product(vec![Expr::frac(1, 2), Expr::pi()]);
                }
            }
            Func::Sinh | Func::Tanh => {
                if arg.is_zero() {
                    return Expr::zero();
                }
            }
            Func::Cosh => {
                if arg.is_zero() {
                    return Expr::one();
                }
            }
            Func::Abs => {
                if let Some(n) = arg.as_number() {
                    return Expr::Number(n.abs());
                }
                if arg.could_extract_minus_sign() {
                    return Expr::apply(Func::Abs, -arg);
                }
                if arg.is_infinite() {
                    return Expr::infinity();
                }
                if matches!(
                    arg,
                    Expr::Func(Func::Abs, _)
                        | Expr::Constant(Constant::Pi)
                        | Expr::Constant(Constant::E)
                ) {
                    return arg;
                }
                if matches!(arg, Expr::Constant(Constant::I)) {
                    return Expr::one();
                }
            }
        }

        Expr::Func(func, Box::new(arg))
    }

    // ── Traversal ──────────────────────────────────────────────────────

    /// Rebuild the tree bottom-up through the canonical constructors, giving
    /// `replace` the first chance at every node.
    pub fn rebuild_with(&self, replace: &dyn Fn(&Expr) -> Option<Expr>) -> Expr {
        if let Some(replacement) = replace(self) {
            return replacement;
        }
        match self {
            Expr::Number(_) | Expr::Symbol(_) | Expr::Constant(_) => self.clone(),
            Expr::Add(ts) => Expr::sum(ts.iter().map(|t| t.rebuild_with(replace)).collect()),
            Expr::Mul(fs) => Expr::product(fs.iter().map(|f| f.rebuild_with(replace)).collect()),
            Expr::Pow(b, e) => Expr::power(b.rebuild_with(replace), e.rebuild_with(replace)),
            Expr::Func(f, a) => Expr::apply(*f, a.rebuild_with(replace)),
            Expr::Integral {
                integrand,
                var,
                bounds,
            } => Expr::Integral {
                integrand: Box::new(integrand.rebuild_with(replace)),
                var: var.clone(),
                bounds: bounds.as_ref().map(|b| {
                    Box::new(Bounds {
                        lower: b.lower.rebuild_with(replace),
                        upper: b.upper.rebuild_with(replace),
                    })
                }),
            },
            Expr::Derivative { expr, var, order } => Expr::Derivative {
                expr: Box::new(expr.rebuild_with(replace)),
                var: var.clone(),
                order: *order,
            },
            Expr::Limit { expr, var, point } => Expr::Limit {
                expr: Box::new(expr.rebuild_with(replace)),
                var: var.clone(),
                point: Box::new(point.rebuild_with(replace)),
            },
        }
    }

    /// Replace every free occurrence of `name` by `value`.
    pub fn subs(&self, name: &str, value: &Expr) -> Expr {
        match self {
            Expr::Symbol(s) if s == name => value.clone(),
            Expr::Number(_) | Expr::Symbol(_) | Expr::Constant(_) => self.clone(),
            Expr::Add(ts) => Expr::sum(ts.iter().map(|t| t.subs(name, value)).collect()),
            Expr::Mul(fs) => Expr::product(fs.iter().map(|f| f.subs(name, value)).collect()),
            Expr::Pow(b, e) => Expr::power(b.subs(name, value), e.subs(name, value)),
            Expr::Func(f, a) => Expr::apply(*f, a.subs(name, value)),
            Expr::Integral {
                integrand,
                var,
                bounds,
            } => {
                let integrand = if var == name {
                    (**integrand).clone()
                } else {
                    integrand.subs(name, value)
                };
                Expr::Integral {
                    integrand: Box::new(integrand),
                    var: var.clone(),
                    bounds: bounds.as_ref().map(|b| {
                        Box::new(Bounds {
                            lower: b.lower.subs(name, value),
                            upper: b.upper.subs(name, value),
                        })
                    }),
                }
            }
            Expr::Derivative { expr, var, order } => Expr::Derivative {
                expr: Box::new(if var == name {
                    (**expr).clone()
                } else {
                    expr.subs(name, value)
                }),
                var: var.clone(),
                order: *order,
            },
            Expr::Limit { expr, var, point } => Expr::Limit {
                expr: Box::new(if var == name {
                    (**expr).clone()
                } else {
                    expr.subs(name, value)
                }),
                var: var.clone(),
                point: Box::new(point.subs(name, value)),
            },
        }
    }

    /// Total polynomial degree, used to order terms for display.
    pub fn display_degree(&self) -> Rational {
        match self {
            Expr::Symbol(_) => Rational::one(),
            Expr::Pow(b, e) => match (&**b, e.as_number()) {
                (Expr::Symbol(_), Some(n)) => n.clone(),
                _ => b.display_degree(),
            },
            Expr::Mul(fs) => fs.iter().map(Expr::display_degree).sum(),
            Expr::Number(_) | Expr::Constant(_) => Rational::zero(),
            _ => Rational::zero(),
        }
    }
}

/// Rational base raised to a rational exponent, extracting perfect powers.
fn numeric_power(base: &Rational, exp: &Rational) -> Expr {
    if exp.is_integer() {
        let n = match exp.to_integer().to_i64() {
            Some(n) if n.abs() <= MAX_EXACT_EXPONENT => n,
            _ => {
                return Expr::Pow(
                    Box::new(Expr::Number(base.clone())),
                    Box::new(Expr::Number(exp.clone())),
                )
            }
        };
        if base.is_zero() {
            return if n > 0 { Expr::zero() } else { Expr::zoo() };
        }
        return Expr::Number(num_traits::pow::Pow::pow(base, n as i32));
    }

    if base.is_zero() {
        return if exp.is_positive() {
            Expr::zero()
        } else {
            Expr::zoo()
        };
    }

    let q = match exp.denom().to_u32() {
        Some(q) if q <= MAX_ROOT_DEGREE => q,
        _ => return raw_pow(base, exp),
    };
    let p = exp.numer().clone();

    if base.is_negative() {
        if q != 2 {
            return raw_pow(base, exp);
        }
        // (-b)^(p/2) = b^(p/2) * I^p
        let magnitude = numeric_power(&-base.clone(), exp);
        let i_part = Expr::power(Expr::Constant(Constant::I), Expr::Number(Rational::from_integer(p)));
        return Expr::product(vec![i_part, magnitude]);
    }

    let numer_part = integer_root_power(base.numer(), &p, q);
    let denom_part = integer_root_power(base.denom(), &-p, q);
    match (numer_part, denom_part) {
        (Some(a), Some(b)) if b.is_one() => a,
        (Some(a), Some(b)) if a.is_one() => b,
        (Some(a), Some(b)) => Expr::product(vec![a, b]),
        _ => raw_pow(base, exp),
    }
}

fn raw_pow(base: &Rational, exp: &Rational) -> Expr {
    Expr::Pow(
        Box::new(Expr::Number(base.clone())),
        Box::new(Expr::Number(exp.clone())),
    )
}

/// `n^(p/q)` for a positive integer `n`, as `c * m^(r/q)` with `m` free of
/// q-th powers. `None` when the exponent is too large to evaluate.
fn integer_root_power(n: &BigInt, p: &BigInt, q: u32) -> Option<Expr> {
    if n.is_one() {
        return Some(Expr::one());
    }
    let (k, m) = extract_perfect_power(n, q);
    let q_big = BigInt::from(q);
    // floor division so that 0 <= r < q
    let mut a = p / &q_big;
    let mut r = p % &q_big;
    if r.is_negative() {
        r += &q_big;
        a -= BigInt::one();
    }
    let p_small = p.to_i32()?;
    let a_small = a.to_i32()?;
    if p_small.unsigned_abs() as i64 > MAX_EXACT_EXPONENT || a_small.unsigned_abs() as i64 > MAX_EXACT_EXPONENT {
        return None;
    }

    let k_rat = Rational::from_integer(k);
    let m_rat = Rational::from_integer(m.clone());
    let coeff = num_traits::pow::Pow::pow(&k_rat, p_small) * num_traits::pow::Pow::pow(&m_rat, a_small);

    if r.is_zero() || m.is_one() {
        return Some(Expr::Number(coeff));
    }
    let radical = Expr::Pow(
        Box::new(Expr::Number(m_rat)),
        Box::new(Expr::Number(Rational::new(r, q_big))),
    );
    // already canonical; going through `product` would recurse back here
    if coeff.is_one() {
        Some(radical)
    } else {
        Some(Expr::Mul(vec![Expr::Number(coeff), radical]))
    }
}

/// Write `n = k^q * m` with `m` free of q-th powers (up to the trial bound).
fn extract_perfect_power(n: &BigInt, q: u32) -> (BigInt, BigInt) {
    let mut k = BigInt::one();
    let mut m = BigInt::one();
    let mut rest = n.clone();
    let mut d: u32 = 2;
    while d <= TRIAL_DIVISION_LIMIT {
        let divisor = BigInt::from(d);
        if &divisor * &divisor > rest {
            break;
        }
        let mut count = 0u32;
        while (&rest % &divisor).is_zero() {
            rest /= &divisor;
            count += 1;
        }
        if count > 0 {
            k *= num_traits::pow::Pow::pow(&divisor, count / q);
            m *= num_traits::pow::Pow::pow(&divisor, count % q);
        }
        d += if d == 2 { 1 } else { 2 };
    }
    if !rest.is_one() {
        let root = rest.nth_root(q);
        if num_traits::pow::Pow::pow(&root, q) == rest {
            k *= root;
        } else {
            m *= rest;
        }
    }
    (k, m)
}

/// sin/cos/tan at rational multiples of pi with a closed form.
fn trig_special_value(func: Func, arg: &Expr) -> Option<Expr> {
    let r = if arg.is_zero() {
        Rational::zero()
    } else {
        let (coeff, rest) = arg.as_coeff_term();
        if rest != Expr::pi() {
            return None;
        }
        coeff
    };
    match func {
        Func::Sin => sin_pi_multiple(&r),
        Func::Cos => sin_pi_multiple(&(rational(1, 2) - r)),
        Func::Tan => {
            let s = sin_pi_multiple(&r)?;
            let c = sin_pi_multiple(&(rational(1, 2) - r))?;
            if c.is_zero() {
                Some(Expr::zoo())
            } else {
                Some(s / c)
            }
        }
        _ => None,
    }
}

/// sin(r*pi) for the angles with a tabulated exact value.
fn sin_pi_multiple(r: &Rational) -> Option<Expr> {
    let two = integer(2);
    // reduce into [0, 2)
    let mut r = r - &two * (r / &two).floor();
    let mut sign = 1;
    if r >= Rational::one() {
        r -= Rational::one();
        sign = -1;
    }
    if r > rational(1, 2) {
        r = Rational::one() - r;
    }
    let value = if r.is_zero() {
        Expr::zero()
    } else if r == rational(1, 6) {
        Expr::frac(1, 2)
    } else if r == rational(1, 4) {
        Expr::product(vec![Expr::frac(1, 2), Expr::sqrt(Expr::int(2))])
    } else if r == rational(1, 3) {
        Expr::product(vec![Expr::frac(1, 2), Expr::sqrt(Expr::int(3))])
    } else if r == rational(1, 2) {
        Expr::one()
    } else {
        return None;
    };
    Some(if sign < 0 { -value } else { value })
}

impl ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::sum(vec![self, rhs])
    }
}

impl ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::sum(vec![self, -rhs])
    }
}

impl ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::product(vec![self, rhs])
    }
}

impl ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::product(vec![self, Expr::power(rhs, Expr::int(-1))])
    }
}

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::product(vec![Expr::int(-1), self])
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::int(n)
    }
}

impl From<Rational> for Expr {
    fn from(n: Rational) -> Self {
        Expr::Number(n)
    }
}
