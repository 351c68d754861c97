//! Engine and language builtins.
//!
//! Every engine function is reachable as an attribute of the engine module
//! and through `from sympy import ...`. Expression methods (`e.diff(x)`,
//! `e.subs(x, 2)`, ...) dispatch to the same functions with the receiver as
//! the first argument.

use num_bigint::BigInt;
use num_traits::{FromPrimitive, One, Signed, ToPrimitive, Zero};

use crate::algebra;
use crate::calculus;
use crate::display::DEFAULT_DIGITS;
use crate::error::{SandboxError, SandboxResult};
use crate::eval::evaluate;
use crate::expr::{Expr, Func, Rational};
use crate::interpreter::{binary_op, small_integer, Session};
use crate::script::ast::BinOp;
use crate::value::Value;

pub const ENGINE_MODULE: &str = "sympy";

const ENGINE_FUNCTIONS: &[&str] = &[
    "symbols", "Symbol", "Rational", "Integer", "S", "sympify", "sqrt", "exp", "log", "ln",
    "sin", "cos", "tan", "asin", "acos", "atan", "sinh", "cosh", "tanh", "Abs", "factorial",
    "Eq", "diff", "integrate", "limit", "expand", "simplify", "factor", "cancel", "together",
    "solve", "subs", "latex", "N", "Integral", "Derivative", "Limit",
];

const PYTHON_FUNCTIONS: &[&str] = &[
    "print", "str", "repr", "len", "abs", "float", "int", "round", "list", "tuple", "range",
    "sum", "min", "max",
];

/// Real engine names this sandbox does not provide.
const UNSUPPORTED: &[&str] = &[
    "Matrix", "ImmutableMatrix", "eye", "zeros", "ones", "det", "series", "dsolve", "Function",
    "Piecewise", "summation", "Sum", "product", "Product", "apart", "trigsimp", "nsimplify",
    "Q", "ask", "refine", "assuming", "lambdify", "Poly", "roots", "nsolve", "linsolve",
    "nonlinsolve", "solveset", "Interval", "FiniteSet", "plot", "Lambda", "Le", "Lt", "Ge",
    "Gt", "Ne", "floor", "ceiling", "gamma", "binomial", "gcd", "lcm", "Mod",
];

const METHODS: &[&str] = &[
    "diff", "subs", "expand", "simplify", "factor", "cancel", "together", "evalf", "n", "doit",
];

/// Orders above this are refused by `diff`.
const MAX_DIFF_ORDER: i64 = 100;

/// Largest argument `factorial` evaluates.
const MAX_FACTORIAL: i64 = 5000;

/// Longest list `range` builds.
const MAX_RANGE: i64 = 100_000;

// ── Name resolution ────────────────────────────────────────────────────

fn constant(name: &str) -> Option<Expr> {
    match name {
        "pi" => Some(Expr::pi()),
        "E" => Some(Expr::Constant(crate::expr::Constant::E)),
        "I" => Some(Expr::Constant(crate::expr::Constant::I)),
        "oo" => Some(Expr::infinity()),
        "zoo" => Some(Expr::zoo()),
        "nan" => Some(Expr::nan()),
        _ => None,
    }
}

/// Value of an engine attribute, if the engine provides it.
pub fn engine_value(name: &str) -> Option<Value> {
    if let Some(c) = constant(name) {
        return Some(Value::Expr(c));
    }
    ENGINE_FUNCTIONS
        .iter()
        .find(|f| **f == name)
        .map(|f| Value::Function(f))
}

/// Everything `from sympy import *` binds.
pub fn engine_namespace() -> Vec<(&'static str, Value)> {
    let constants = ["pi", "E", "I", "oo", "zoo", "nan"];
    constants
        .iter()
        .chain(ENGINE_FUNCTIONS)
        .filter_map(|name| engine_value(name).map(|v| (*name, v)))
        .collect()
}

pub fn python_builtin(name: &str) -> Option<Value> {
    PYTHON_FUNCTIONS
        .iter()
        .find(|f| **f == name)
        .map(|f| Value::Function(f))
}

pub fn is_unsupported(name: &str) -> bool {
    UNSUPPORTED.contains(&name)
}

pub fn unsupported(name: &str) -> SandboxError {
    SandboxError::not_implemented(format!("{} is not supported by this engine", name))
}

pub fn has_method(target: &Value, name: &str) -> bool {
    match target {
        Value::Expr(_) | Value::Equality(..) => METHODS.contains(&name),
        Value::List(_) | Value::Tuple(_) | Value::Decimal { .. } => {
            matches!(name, "subs" | "evalf" | "n")
        }
        Value::Str(_) => name == "format",
        _ => false,
    }
}

// ── Argument helpers ───────────────────────────────────────────────────

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> SandboxResult<()> {
    if args.len() >= min && args.len() <= max {
        return Ok(());
    }
    let expected = if min == max {
        format!("exactly {}", min)
    } else if args.len() < min {
        format!("at least {}", min)
    } else {
        format!("at most {}", max)
    };
    Err(SandboxError::type_error(format!(
        "{}() takes {} argument{} ({} given)",
        name,
        expected,
        if min == max && min == 1 { "" } else { "s" },
        args.len()
    )))
}

fn take_kwarg(kwargs: &mut Vec<(String, Value)>, key: &str) -> Option<Value> {
    let pos = kwargs.iter().position(|(k, _)| k == key)?;
    Some(kwargs.remove(pos).1)
}

fn no_kwargs(name: &str, kwargs: &[(String, Value)]) -> SandboxResult<()> {
    match kwargs.first() {
        Some((k, _)) => Err(SandboxError::type_error(format!(
            "{}() got an unexpected keyword argument '{}'",
            name, k
        ))),
        None => Ok(()),
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::None => false,
        Value::Bool(b) => *b,
        Value::Float(f) => *f != 0.0,
        Value::Decimal { value, .. } => *value != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::Expr(e) => !e.is_zero(),
        Value::List(items) | Value::Tuple(items) => !items.is_empty(),
        Value::Dict(items) => !items.is_empty(),
        _ => true,
    }
}

/// Convert a value to an exact expression.
pub fn to_expr(v: &Value) -> SandboxResult<Expr> {
    match v {
        Value::Expr(e) => Ok(e.clone()),
        Value::Bool(b) => Ok(Expr::int(*b as i64)),
        Value::Str(s) => match Session::sympify(s)? {
            Value::Expr(e) => Ok(e),
            other => to_expr(&other),
        },
        Value::Float(_) | Value::Decimal { .. } => Err(SandboxError::type_error(format!(
            "cannot use the float {} in an exact expression; use Rational instead",
            v
        ))),
        other => Err(SandboxError::type_error(format!(
            "cannot convert {} object to an expression",
            other.type_name()
        ))),
    }
}

fn to_symbol(v: &Value) -> SandboxResult<String> {
    match v {
        Value::Expr(Expr::Symbol(name)) => Ok(name.clone()),
        other => Err(SandboxError::value(format!(
            "expected a symbol, got {}",
            other
        ))),
    }
}

fn to_str_arg<'a>(name: &str, v: &'a Value) -> SandboxResult<&'a str> {
    match v {
        Value::Str(s) => Ok(s),
        other => Err(SandboxError::type_error(format!(
            "{}() expects a string, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn only_symbol(e: &Expr, purpose: &str) -> SandboxResult<Option<String>> {
    let free = e.free_symbols();
    match free.len() {
        0 => Ok(None),
        1 => Ok(free.into_iter().next()),
        _ => Err(SandboxError::value(format!(
            "the expression {} has several free symbols; specify the variable to {}",
            e, purpose
        ))),
    }
}

/// Apply `f` to every expression inside `v`, keeping its shape.
fn map_exprs(
    v: Value,
    name: &str,
    f: &dyn Fn(&Expr) -> SandboxResult<Expr>,
) -> SandboxResult<Value> {
    match v {
        Value::Expr(e) => f(&e).map(Value::Expr),
        Value::Equality(lhs, rhs) => Ok(make_eq(f(&lhs)?, f(&rhs)?)),
        Value::List(items) => items
            .into_iter()
            .map(|item| map_exprs(item, name, f))
            .collect::<SandboxResult<Vec<_>>>()
            .map(Value::List),
        Value::Tuple(items) => items
            .into_iter()
            .map(|item| map_exprs(item, name, f))
            .collect::<SandboxResult<Vec<_>>>()
            .map(Value::Tuple),
        v @ (Value::Float(_) | Value::Decimal { .. } | Value::Bool(_)) => Ok(v),
        Value::Str(s) => map_exprs(Value::Expr(to_expr(&Value::Str(s))?), name, f),
        other => Err(SandboxError::type_error(format!(
            "{}() does not apply to {} objects",
            name,
            other.type_name()
        ))),
    }
}

/// `Eq(lhs, rhs)`: reduces to a boolean when the sides are decidable.
fn make_eq(lhs: Expr, rhs: Expr) -> Value {
    if lhs == rhs {
        return Value::Bool(true);
    }
    let difference = lhs.clone() - rhs.clone();
    if difference.as_number().is_some() {
        return Value::Bool(difference.is_zero());
    }
    if difference.free_symbols().is_empty() {
        if let (Some(a), Some(b)) = (evaluate(&lhs), evaluate(&rhs)) {
            if (a - b).abs() > 1e-12 * a.abs().max(b.abs()).max(1.0) {
                return Value::Bool(false);
            }
        }
    }
    Value::Equality(Box::new(lhs), Box::new(rhs))
}

// ── Dispatch ───────────────────────────────────────────────────────────

pub fn call_function(
    session: &mut Session,
    name: &'static str,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> SandboxResult<Value> {
    match name {
        "print" => print(session, args, kwargs),
        "str" | "repr" | "len" | "abs" | "float" | "int" | "round" | "list" | "tuple"
        | "range" | "sum" | "min" | "max" => {
            no_kwargs(name, &kwargs)?;
            python_function(name, args)
        }
        _ => engine_function(name, args, kwargs),
    }
}

pub fn call_method(
    _session: &mut Session,
    receiver: Value,
    name: &str,
    mut args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> SandboxResult<Value> {
    match (name, &receiver) {
        ("format", Value::Str(template)) => {
            no_kwargs("format", &kwargs)?;
            str_format(template, &args)
        }
        ("doit", _) => {
            arity("doit", &args, 0, 0)?;
            map_exprs(receiver, "doit", &|e| Ok(doit(e)))
        }
        ("evalf" | "n", _) => {
            args.insert(0, receiver);
            engine_function("N", args, kwargs)
        }
        ("diff" | "subs" | "expand" | "simplify" | "factor" | "cancel" | "together", _) => {
            args.insert(0, receiver);
            engine_function(name, args, kwargs)
        }
        _ => Err(SandboxError::Attribute(format!(
            "'{}' object has no attribute '{}'",
            receiver.type_name(),
            name
        ))),
    }
}

fn print(
    session: &mut Session,
    args: Vec<Value>,
    mut kwargs: Vec<(String, Value)>,
) -> SandboxResult<Value> {
    let sep = match take_kwarg(&mut kwargs, "sep") {
        Some(Value::Str(s)) => s,
        Some(Value::None) | None => " ".to_string(),
        Some(other) => {
            return Err(SandboxError::type_error(format!(
                "sep must be None or a string, not {}",
                other.type_name()
            )))
        }
    };
    let end = match take_kwarg(&mut kwargs, "end") {
        Some(Value::Str(s)) => s,
        Some(Value::None) | None => "\n".to_string(),
        Some(other) => {
            return Err(SandboxError::type_error(format!(
                "end must be None or a string, not {}",
                other.type_name()
            )))
        }
    };
    no_kwargs("print", &kwargs)?;
    let line = args
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(&sep);
    session.write_output(&line);
    session.write_output(&end);
    Ok(Value::None)
}

// ── Language builtins ──────────────────────────────────────────────────

fn iterate(name: &str, v: Value) -> SandboxResult<Vec<Value>> {
    match v {
        Value::List(items) | Value::Tuple(items) => Ok(items),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Dict(items) => Ok(items.into_iter().map(|(k, _)| k).collect()),
        other => Err(SandboxError::type_error(format!(
            "{}(): '{}' object is not iterable",
            name,
            other.type_name()
        ))),
    }
}

fn float_value(v: &Value) -> SandboxResult<f64> {
    match v {
        Value::Float(f) => Ok(*f),
        Value::Decimal { value, .. } => Ok(*value),
        Value::Bool(b) => Ok(*b as i64 as f64),
        Value::Str(s) => s.trim().parse::<f64>().map_err(|_| {
            SandboxError::value(format!("could not convert string to float: '{}'", s))
        }),
        Value::Expr(e) => {
            evaluate(e).ok_or_else(|| SandboxError::type_error("Cannot convert expression to float"))
        }
        other => Err(SandboxError::type_error(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn python_function(name: &str, args: Vec<Value>) -> SandboxResult<Value> {
    match name {
        "str" | "repr" => {
            arity(name, &args, 0, 1)?;
            Ok(Value::Str(match args.first() {
                Some(v) if name == "repr" => v.repr(),
                Some(v) => v.to_string(),
                None => String::new(),
            }))
        }
        "len" => {
            arity(name, &args, 1, 1)?;
            let n = match &args[0] {
                Value::List(items) | Value::Tuple(items) => items.len(),
                Value::Dict(items) => items.len(),
                Value::Str(s) => s.chars().count(),
                other => {
                    return Err(SandboxError::type_error(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::int(n as i64))
        }
        "abs" => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Float(f) => Ok(Value::Float(f.abs())),
                Value::Decimal { value, digits } => Ok(Value::Decimal {
                    value: value.abs(),
                    digits: *digits,
                }),
                other => Ok(Value::Expr(Expr::apply(Func::Abs, to_expr(other)?))),
            }
        }
        "float" => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                Some(v) => float_value(v).map(Value::Float),
                None => Ok(Value::Float(0.0)),
            }
        }
        "int" => {
            arity(name, &args, 0, 1)?;
            let n = match args.first() {
                None => BigInt::zero(),
                Some(Value::Expr(Expr::Number(n))) => n.trunc().to_integer(),
                Some(Value::Str(s)) => s.trim().parse::<BigInt>().map_err(|_| {
                    SandboxError::value(format!("invalid literal for int() with base 10: '{}'", s))
                })?,
                Some(v) => {
                    let f = float_value(v)?;
                    BigInt::from_f64(f.trunc()).ok_or_else(|| {
                        SandboxError::value("cannot convert float infinity or NaN to integer")
                    })?
                }
            };
            Ok(Value::Expr(Expr::Number(Rational::from_integer(n))))
        }
        "round" => {
            arity(name, &args, 1, 2)?;
            let v = float_value(&args[0])?;
            match args.get(1) {
                None => BigInt::from_f64(v.round())
                    .map(|n| Value::Expr(Expr::Number(Rational::from_integer(n))))
                    .ok_or_else(|| SandboxError::value("cannot round infinity or NaN")),
                Some(digits) => {
                    let digits = small_integer(digits)
                        .ok_or_else(|| SandboxError::type_error("round() digits must be an integer"))?;
                    let scale = 10f64.powi(digits as i32);
                    Ok(Value::Float((v * scale).round() / scale))
                }
            }
        }
        "list" | "tuple" => {
            arity(name, &args, 0, 1)?;
            let items = match args.into_iter().next() {
                Some(v) => iterate(name, v)?,
                None => Vec::new(),
            };
            Ok(if name == "list" {
                Value::List(items)
            } else {
                Value::Tuple(items)
            })
        }
        "range" => {
            arity(name, &args, 1, 3)?;
            let ints = args
                .iter()
                .map(|a| {
                    small_integer(a).ok_or_else(|| {
                        SandboxError::type_error(format!(
                            "'{}' object cannot be interpreted as an integer",
                            a.type_name()
                        ))
                    })
                })
                .collect::<SandboxResult<Vec<_>>>()?;
            let (start, stop, step) = match ints.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => (0, 0, 1),
            };
            if step == 0 {
                return Err(SandboxError::value("range() arg 3 must not be zero"));
            }
            let span = stop
                .checked_sub(start)
                .ok_or_else(|| SandboxError::value("range is too large"))?;
            if span.checked_div(step).map_or(true, |len| len > MAX_RANGE) {
                return Err(SandboxError::value("range is too large"));
            }
            let mut out = Vec::new();
            let mut i = start;
            while (step > 0 && i < stop) || (step < 0 && i > stop) {
                out.push(Value::int(i));
                match i.checked_add(step) {
                    Some(next) => i = next,
                    None => break,
                }
            }
            Ok(Value::List(out))
        }
        "sum" => {
            arity(name, &args, 1, 2)?;
            let mut args = args.into_iter();
            let items = iterate(name, args.next().unwrap_or(Value::None))?;
            let start = args.next().unwrap_or_else(|| Value::int(0));
            items
                .into_iter()
                .try_fold(start, |acc, item| binary_op(BinOp::Add, acc, item))
        }
        "min" | "max" => {
            let items = if args.len() == 1 {
                iterate(name, args.into_iter().next().unwrap_or(Value::None))?
            } else {
                args
            };
            if items.is_empty() {
                return Err(SandboxError::value(format!(
                    "{}() arg is an empty sequence",
                    name
                )));
            }
            let mut best: Option<(f64, Value)> = None;
            for item in items {
                let key = float_value(&item).map_err(|_| {
                    SandboxError::type_error(format!(
                        "cannot determine truth value of a comparison with {}",
                        item
                    ))
                })?;
                let better = match &best {
                    None => true,
                    Some((b, _)) if name == "min" => key < *b,
                    Some((b, _)) => key > *b,
                };
                if better {
                    best = Some((key, item));
                }
            }
            Ok(best.map(|(_, v)| v).unwrap_or(Value::None))
        }
        other => Err(SandboxError::Name(other.to_string())),
    }
}

fn str_format(template: &str, args: &[Value]) -> SandboxResult<Value> {
    let mut out = String::new();
    let mut next = 0usize;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    field.push(c);
                }
                let index = match field.split(':').next().unwrap_or_default() {
                    "" => {
                        next += 1;
                        next - 1
                    }
                    digits => digits.parse::<usize>().map_err(|_| {
                        SandboxError::Key(format!("'{}'", digits))
                    })?,
                };
                let value = args.get(index).ok_or_else(|| {
                    SandboxError::Index(format!(
                        "Replacement index {} out of range for positional args tuple",
                        index
                    ))
                })?;
                out.push_str(&value.to_string());
            }
            other => out.push(other),
        }
    }
    Ok(Value::Str(out))
}

// ── Engine functions ───────────────────────────────────────────────────

fn float_func(func: Func, v: f64) -> SandboxResult<f64> {
    let exact = Rational::from_float(v)
        .ok_or_else(|| SandboxError::value("cannot evaluate a function of infinity or NaN"))?;
    evaluate(&Expr::apply(func, Expr::Number(exact)))
        .ok_or_else(|| SandboxError::value("complex floating-point results are not supported"))
}

fn unary_function(name: &str, func: Func, arg: Value) -> SandboxResult<Value> {
    match arg {
        Value::Float(v) => Ok(Value::Decimal {
            value: float_func(func, v)?,
            digits: DEFAULT_DIGITS,
        }),
        Value::Decimal { value, digits } => Ok(Value::Decimal {
            value: float_func(func, value)?,
            digits,
        }),
        other => {
            let e = to_expr(&other).map_err(|_| {
                SandboxError::type_error(format!(
                    "{}() does not apply to {} objects",
                    name,
                    other.type_name()
                ))
            })?;
            Ok(Value::Expr(Expr::apply(func, e)))
        }
    }
}

fn engine_function(
    name: &str,
    args: Vec<Value>,
    mut kwargs: Vec<(String, Value)>,
) -> SandboxResult<Value> {
    match name {
        "symbols" => {
            arity(name, &args, 1, 1)?;
            if take_kwarg(&mut kwargs, "cls").is_some() {
                return Err(unsupported("symbols(cls=...)"));
            }
            symbols(to_str_arg(name, &args[0])?)
        }
        "Symbol" => {
            arity(name, &args, 1, 1)?;
            let name = to_str_arg(name, &args[0])?;
            Ok(Value::Expr(Expr::symbol(name)))
        }
        "Rational" => {
            no_kwargs(name, &kwargs)?;
            arity(name, &args, 1, 2)?;
            let p = exact_number(&args[0])?;
            let q = match args.get(1) {
                Some(q) => exact_number(q)?,
                None => Expr::one(),
            };
            Ok(Value::Expr(p / q))
        }
        "Integer" => {
            no_kwargs(name, &kwargs)?;
            arity(name, &args, 1, 1)?;
            match exact_number(&args[0])? {
                Expr::Number(n) => Ok(Value::Expr(Expr::Number(n.trunc()))),
                other => Err(SandboxError::type_error(format!(
                    "Integer() expects a number, got {}",
                    other
                ))),
            }
        }
        "S" | "sympify" => {
            arity(name, &args, 1, 1)?;
            match args.into_iter().next() {
                Some(Value::Str(s)) => Session::sympify(&s),
                Some(v @ (Value::Float(_) | Value::Decimal { .. } | Value::Equality(..))) => Ok(v),
                Some(v @ (Value::List(_) | Value::Tuple(_))) => map_exprs(v, name, &|e| Ok(e.clone())),
                Some(v) => to_expr(&v).map(Value::Expr),
                None => Ok(Value::None),
            }
        }
        "sqrt" => {
            no_kwargs(name, &kwargs)?;
            arity(name, &args, 1, 1)?;
            match args.into_iter().next() {
                Some(Value::Float(v)) if v >= 0.0 => Ok(Value::Decimal {
                    value: v.sqrt(),
                    digits: DEFAULT_DIGITS,
                }),
                Some(Value::Decimal { value, digits }) if value >= 0.0 => Ok(Value::Decimal {
                    value: value.sqrt(),
                    digits,
                }),
                Some(v) => to_expr(&v).map(|e| Value::Expr(Expr::sqrt(e))),
                None => Ok(Value::None),
            }
        }
        "log" | "ln" => {
            no_kwargs(name, &kwargs)?;
            arity(name, &args, 1, if name == "log" { 2 } else { 1 })?;
            let mut args = args.into_iter();
            let value = unary_function(name, Func::Log, args.next().unwrap_or(Value::None))?;
            match args.next() {
                None => Ok(value),
                Some(base) => {
                    let base = unary_function(name, Func::Log, base)?;
                    binary_op(BinOp::Div, value, base)
                }
            }
        }
        "exp" | "sin" | "cos" | "tan" | "asin" | "acos" | "atan" | "sinh" | "cosh" | "tanh"
        | "Abs" => {
            no_kwargs(name, &kwargs)?;
            arity(name, &args, 1, 1)?;
            let func = Func::from_name(name)
                .ok_or_else(|| SandboxError::Name(name.to_string()))?;
            unary_function(name, func, args.into_iter().next().unwrap_or(Value::None))
        }
        "factorial" => {
            no_kwargs(name, &kwargs)?;
            arity(name, &args, 1, 1)?;
            factorial(&to_expr(&args[0])?)
        }
        "Eq" => {
            no_kwargs(name, &kwargs)?;
            arity(name, &args, 1, 2)?;
            let lhs = to_expr(&args[0])?;
            let rhs = match args.get(1) {
                Some(rhs) => to_expr(rhs)?,
                None => Expr::zero(),
            };
            Ok(make_eq(lhs, rhs))
        }
        "diff" => {
            no_kwargs(name, &kwargs)?;
            arity(name, &args, 1, usize::MAX)?;
            let mut args = args.into_iter();
            let target = args.next().unwrap_or(Value::None);
            let spec: Vec<Value> = args.collect();
            map_exprs(target, name, &|e| differentiate(e, &spec))
        }
        "integrate" => {
            take_kwarg(&mut kwargs, "conds");
            take_kwarg(&mut kwargs, "manual");
            no_kwargs(name, &kwargs)?;
            arity(name, &args, 1, usize::MAX)?;
            let mut args = args.into_iter();
            let target = to_expr(&args.next().unwrap_or(Value::None))?;
            let spec: Vec<Value> = args.collect();
            integrate(&target, &spec, true).map(Value::Expr)
        }
        "Integral" => {
            no_kwargs(name, &kwargs)?;
            arity(name, &args, 1, usize::MAX)?;
            let mut args = args.into_iter();
            let target = to_expr(&args.next().unwrap_or(Value::None))?;
            let spec: Vec<Value> = args.collect();
            integrate(&target, &spec, false).map(Value::Expr)
        }
        "limit" | "Limit" => {
            arity(name, &args, 3, 4)?;
            let dir = match take_kwarg(&mut kwargs, "dir").or_else(|| args.get(3).cloned()) {
                Some(Value::Str(d)) => d,
                None => "+".to_string(),
                Some(other) => {
                    return Err(SandboxError::type_error(format!(
                        "limit direction must be a string, got {}",
                        other.type_name()
                    )))
                }
            };
            no_kwargs(name, &kwargs)?;
            let e = to_expr(&args[0])?;
            let var = to_symbol(&args[1])?;
            let point = to_expr(&args[2])?;
            if name == "Limit" {
                return Ok(Value::Expr(limit_node(&e, &var, &point)));
            }
            limit(&e, &var, &point, &dir).map(Value::Expr)
        }
        "Derivative" => {
            no_kwargs(name, &kwargs)?;
            arity(name, &args, 1, usize::MAX)?;
            let target = to_expr(&args[0])?;
            let spec = diff_spec(&target, &args[1..])?;
            Ok(Value::Expr(spec.into_iter().fold(target, |acc, (var, order)| {
                Expr::Derivative {
                    expr: Box::new(acc),
                    var,
                    order,
                }
            })))
        }
        "expand" | "simplify" | "factor" | "cancel" | "together" => {
            arity(name, &args, 1, 1)?;
            let transform: fn(&Expr) -> Expr = match name {
                "expand" => algebra::expand,
                "simplify" => algebra::simplify,
                "factor" => algebra::factor,
                "cancel" => algebra::cancel,
                _ => algebra::together,
            };
            let target = args.into_iter().next().unwrap_or(Value::None);
            map_exprs(target, name, &|e| Ok(transform(e)))
        }
        "solve" => solve(args, kwargs),
        "subs" => {
            no_kwargs(name, &kwargs)?;
            arity(name, &args, 2, 3)?;
            let mut args = args.into_iter();
            let target = args.next().unwrap_or(Value::None);
            let pairs = substitution_pairs(args.collect())?;
            map_exprs(target, name, &|e| Ok(substitute(e, &pairs)))
        }
        "latex" => {
            arity(name, &args, 1, 1)?;
            let mode = take_kwarg(&mut kwargs, "mode");
            let rendered = args[0].to_latex();
            Ok(Value::Str(match mode {
                Some(Value::Str(m)) if m == "inline" => format!("${}$", rendered),
                Some(Value::Str(m)) if m == "equation" => {
                    format!("\\begin{{equation}}{}\\end{{equation}}", rendered)
                }
                _ => rendered,
            }))
        }
        "N" => {
            arity(name, &args, 1, 2)?;
            let digits = match take_kwarg(&mut kwargs, "n").or_else(|| args.get(1).cloned()) {
                Some(d) => small_integer(&d)
                    .filter(|d| *d > 0)
                    .ok_or_else(|| SandboxError::type_error("precision must be a positive integer"))?
                    as usize,
                None => DEFAULT_DIGITS,
            };
            take_kwarg(&mut kwargs, "chop");
            let substitutions = take_kwarg(&mut kwargs, "subs");
            no_kwargs(name, &kwargs)?;
            let mut target = args.into_iter().next().unwrap_or(Value::None);
            if let Some(pairs) = substitutions {
                target = engine_function("subs", vec![target, pairs], Vec::new())?;
            }
            numeric(target, digits)
        }
        other => Err(SandboxError::Name(other.to_string())),
    }
}

fn exact_number(v: &Value) -> SandboxResult<Expr> {
    match v {
        Value::Float(f) | Value::Decimal { value: f, .. } => Rational::from_float(*f)
            .map(Expr::Number)
            .ok_or_else(|| SandboxError::value("cannot convert infinity or NaN to a rational")),
        other => {
            let e = to_expr(other)?;
            if e.as_number().is_some() {
                Ok(e)
            } else {
                Err(SandboxError::type_error(format!("invalid input: {}", e)))
            }
        }
    }
}

fn symbols(spec: &str) -> SandboxResult<Value> {
    let mut names = Vec::new();
    for token in spec.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        match token.split_once(':') {
            Some((head, range)) => {
                // x0:3 -> x0, x1, x2
                let prefix = head.trim_end_matches(|c: char| c.is_ascii_digit());
                let start: i64 = head[prefix.len()..].parse().unwrap_or(0);
                let stop: i64 = range
                    .parse()
                    .map_err(|_| SandboxError::value(format!("invalid symbol range '{}'", token)))?;
                let span = stop
                    .checked_sub(start)
                    .ok_or_else(|| SandboxError::value("symbol range is too large"))?;
                if span > MAX_RANGE {
                    return Err(SandboxError::value("symbol range is too large"));
                }
                names.extend((start..stop).map(|i| format!("{}{}", prefix, i)));
            }
            None => names.push(token.to_string()),
        }
    }
    if names.is_empty() {
        return Err(SandboxError::value("no symbols given"));
    }
    let sequence = names.len() > 1 || spec.contains(':') || spec.trim_end().ends_with(',');
    let mut values: Vec<Value> = names
        .into_iter()
        .map(|n| Value::Expr(Expr::symbol(n)))
        .collect();
    if sequence {
        Ok(Value::Tuple(values))
    } else {
        Ok(values.pop().unwrap_or(Value::None))
    }
}

fn factorial(e: &Expr) -> SandboxResult<Value> {
    let n = match e.as_number() {
        Some(n) if n.is_integer() => n.to_integer(),
        Some(_) => {
            return Err(SandboxError::not_implemented(
                "factorial of a non-integer is not supported",
            ))
        }
        None => {
            return Err(SandboxError::not_implemented(format!(
                "factorial of the symbolic argument {} is not supported",
                e
            )))
        }
    };
    if n.is_negative() {
        return Ok(Value::Expr(Expr::zoo()));
    }
    let n = n
        .to_i64()
        .filter(|n| *n <= MAX_FACTORIAL)
        .ok_or_else(|| SandboxError::value("factorial argument is too large"))?;
    let mut acc = BigInt::one();
    for k in 2..=n {
        acc *= k;
    }
    Ok(Value::Expr(Expr::Number(Rational::from_integer(acc))))
}

/// Variables and orders from `diff`-style arguments: `x`, `x, 2`, `(x, 2)`.
fn diff_spec(target: &Expr, spec: &[Value]) -> SandboxResult<Vec<(String, u32)>> {
    let mut out: Vec<(String, u32)> = Vec::new();
    for item in spec {
        match item {
            Value::Expr(Expr::Symbol(name)) => out.push((name.clone(), 1)),
            Value::Tuple(pair) | Value::List(pair) if pair.len() == 2 => {
                let var = to_symbol(&pair[0])?;
                out.push((var, diff_order(&pair[1])?));
            }
            Value::Expr(e) if e.as_integer().is_some() => match out.last_mut() {
                Some(last) => last.1 = diff_order(item)?,
                None => {
                    return Err(SandboxError::value(format!(
                        "Can't calculate derivative wrt {}.",
                        e
                    )))
                }
            },
            other => {
                return Err(SandboxError::value(format!(
                    "Can't calculate derivative wrt {}.",
                    other
                )))
            }
        }
    }
    if out.is_empty() {
        if let Some(var) = only_symbol(target, "differentiate")? {
            out.push((var, 1));
        }
    }
    Ok(out)
}

fn diff_order(v: &Value) -> SandboxResult<u32> {
    small_integer(v)
        .filter(|n| (0..=MAX_DIFF_ORDER).contains(n))
        .map(|n| n as u32)
        .ok_or_else(|| SandboxError::value(format!("invalid derivative order {}", v)))
}

fn differentiate(e: &Expr, spec: &[Value]) -> SandboxResult<Expr> {
    let spec = diff_spec(e, spec)?;
    if spec.is_empty() {
        // a constant
        return Ok(Expr::zero());
    }
    Ok(spec
        .iter()
        .fold(e.clone(), |acc, (var, order)| calculus::diff_n(&acc, var, *order)))
}

/// Integrate over each `x` or `(x, a, b)` in turn. Unresolved integrals stay
/// as unevaluated nodes; `evaluate = false` builds the nodes directly.
fn integrate(target: &Expr, spec: &[Value], evaluate: bool) -> SandboxResult<Expr> {
    let mut ranges: Vec<(String, Option<(Expr, Expr)>)> = Vec::new();
    for item in spec {
        match item {
            Value::Expr(Expr::Symbol(name)) => ranges.push((name.clone(), None)),
            Value::Tuple(parts) | Value::List(parts) if parts.len() == 3 => {
                let var = to_symbol(&parts[0])?;
                ranges.push((var, Some((to_expr(&parts[1])?, to_expr(&parts[2])?))));
            }
            Value::Tuple(parts) | Value::List(parts) if parts.len() == 1 => {
                ranges.push((to_symbol(&parts[0])?, None));
            }
            other => {
                return Err(SandboxError::value(format!(
                    "invalid integration variable or limits: {}",
                    other
                )))
            }
        }
    }
    if ranges.is_empty() {
        match only_symbol(target, "integrate with respect to")? {
            Some(var) => ranges.push((var, None)),
            None => {
                return Err(SandboxError::value(format!(
                    "specify the integration variable to integrate {}",
                    target
                )))
            }
        }
    }

    let mut current = target.clone();
    for (var, bounds) in ranges {
        current = match (&bounds, evaluate) {
            (None, true) => calculus::integrate(&current, &var)
                .unwrap_or_else(|| calculus::integral_node(&current, &var, None)),
            (Some((lower, upper)), true) => {
                calculus::integrate_definite(&current, &var, lower, upper)
                    .unwrap_or_else(|| calculus::integral_node(&current, &var, bounds.clone()))
            }
            (_, false) => calculus::integral_node(&current, &var, bounds.clone()),
        };
    }
    Ok(current)
}

fn limit_node(e: &Expr, var: &str, point: &Expr) -> Expr {
    Expr::Limit {
        expr: Box::new(e.clone()),
        var: var.to_string(),
        point: Box::new(point.clone()),
    }
}

fn one_sided_limit(e: &Expr, var: &str, point: &Expr, from_left: bool) -> Option<Expr> {
    if !from_left || point.is_infinite() {
        return calculus::limit(e, var, point);
    }
    // approach from the left: x = point - t with t -> 0+
    let t = Expr::symbol(var);
    let reflected = e.subs(var, &(point.clone() - t));
    calculus::limit(&reflected, var, &Expr::zero())
}

fn limit(e: &Expr, var: &str, point: &Expr, dir: &str) -> SandboxResult<Expr> {
    let result = match dir {
        "+" => one_sided_limit(e, var, point, false),
        "-" => one_sided_limit(e, var, point, true),
        "+-" => {
            let right = one_sided_limit(e, var, point, false);
            let left = one_sided_limit(e, var, point, true);
            match (right, left) {
                (Some(r), Some(l)) if r == l => Some(r),
                (Some(r), Some(l)) => {
                    return Err(SandboxError::value(format!(
                        "The limit does not exist since left hand limit = {} and right hand limit = {}",
                        l, r
                    )))
                }
                _ => None,
            }
        }
        other => {
            return Err(SandboxError::value(format!(
                "direction must be one of '+', '-' or '+-', not '{}'",
                other
            )))
        }
    };
    Ok(result.unwrap_or_else(|| limit_node(e, var, point)))
}

/// Evaluate every unevaluated integral, derivative and limit inside `e`.
pub fn doit(e: &Expr) -> Expr {
    e.rebuild_with(&|node| match node {
        Expr::Integral {
            integrand,
            var,
            bounds,
        } => {
            let integrand = doit(integrand);
            let result = match bounds {
                Some(b) => calculus::integrate_definite(&integrand, var, &doit(&b.lower), &doit(&b.upper)),
                None => calculus::integrate(&integrand, var),
            };
            Some(result.unwrap_or_else(|| {
                calculus::integral_node(
                    &integrand,
                    var,
                    bounds.as_ref().map(|b| (b.lower.clone(), b.upper.clone())),
                )
            }))
        }
        Expr::Derivative { expr, var, order } => Some(calculus::diff_n(&doit(expr), var, *order)),
        Expr::Limit { expr, var, point } => {
            let inner = doit(expr);
            Some(calculus::limit(&inner, var, point).unwrap_or_else(|| limit_node(&inner, var, point)))
        }
        _ => None,
    })
}

fn solve(args: Vec<Value>, mut kwargs: Vec<(String, Value)>) -> SandboxResult<Value> {
    arity("solve", &args, 1, 2)?;
    let as_dicts = take_kwarg(&mut kwargs, "dict").map_or(false, |v| truthy(&v));
    take_kwarg(&mut kwargs, "rational");
    no_kwargs("solve", &kwargs)?;

    let mut args = args.into_iter();
    let equation = match args.next().unwrap_or(Value::None) {
        Value::List(items) | Value::Tuple(items) if items.len() == 1 => {
            items.into_iter().next().unwrap_or(Value::None)
        }
        Value::List(_) | Value::Tuple(_) => {
            return Err(SandboxError::not_implemented(
                "systems of equations are not supported",
            ))
        }
        other => other,
    };
    let e = match equation {
        Value::Equality(lhs, rhs) => *lhs - *rhs,
        Value::Bool(true) => return Ok(Value::List(Vec::new())),
        other => to_expr(&other)?,
    };
    let var = match args.next() {
        Some(Value::List(items)) | Some(Value::Tuple(items)) if items.len() == 1 => {
            to_symbol(&items[0])?
        }
        Some(Value::List(_)) | Some(Value::Tuple(_)) => {
            return Err(SandboxError::not_implemented(
                "solving for several symbols is not supported",
            ))
        }
        Some(v) => to_symbol(&v)?,
        None => match only_symbol(&e, "solve for")? {
            Some(var) => var,
            None => return Ok(Value::List(Vec::new())),
        },
    };
    let roots = algebra::solve(&e, &var)?;
    Ok(Value::List(
        roots
            .into_iter()
            .map(|root| {
                if as_dicts {
                    Value::Dict(vec![(Value::Expr(Expr::symbol(var.as_str())), Value::Expr(root))])
                } else {
                    Value::Expr(root)
                }
            })
            .collect(),
    ))
}

/// `(old, new)` pairs from `subs(old, new)`, `subs({old: new})` or
/// `subs([(old, new), ...])`.
fn substitution_pairs(args: Vec<Value>) -> SandboxResult<Vec<(Expr, Expr)>> {
    let pair = |old: &Value, new: &Value| -> SandboxResult<(Expr, Expr)> {
        Ok((to_expr(old)?, to_expr(new)?))
    };
    match args.as_slice() {
        [old, new] => Ok(vec![pair(old, new)?]),
        [Value::Dict(items)] => items.iter().map(|(k, v)| pair(k, v)).collect(),
        [Value::List(items)] | [Value::Tuple(items)] => items
            .iter()
            .map(|item| match item {
                Value::Tuple(p) | Value::List(p) if p.len() == 2 => pair(&p[0], &p[1]),
                other => Err(SandboxError::value(format!(
                    "subs() expects (old, new) pairs, got {}",
                    other
                ))),
            })
            .collect(),
        _ => Err(SandboxError::value(
            "subs() expects (old, new), a dict or a list of pairs",
        )),
    }
}

fn substitute(e: &Expr, pairs: &[(Expr, Expr)]) -> Expr {
    pairs.iter().fold(e.clone(), |acc, (old, new)| match old {
        Expr::Symbol(name) => acc.subs(name, new),
        _ => acc.rebuild_with(&|node| (node == old).then(|| new.clone())),
    })
}

/// `N(v, digits)`: closed expressions become floats, anything with free
/// symbols comes back unchanged.
fn numeric(v: Value, digits: usize) -> SandboxResult<Value> {
    match v {
        Value::Expr(e) => {
            let e = doit(&e);
            Ok(match evaluate(&e) {
                Some(value) => Value::Decimal { value, digits },
                None => Value::Expr(e),
            })
        }
        Value::Float(value) | Value::Decimal { value, .. } => Ok(Value::Decimal { value, digits }),
        Value::Bool(b) => Ok(Value::Bool(b)),
        Value::List(items) => items
            .into_iter()
            .map(|item| numeric(item, digits))
            .collect::<SandboxResult<Vec<_>>>()
            .map(Value::List),
        Value::Tuple(items) => items
            .into_iter()
            .map(|item| numeric(item, digits))
            .collect::<SandboxResult<Vec<_>>>()
            .map(Value::Tuple),
        Value::Equality(lhs, rhs) => Ok(Value::Equality(lhs, rhs)),
        Value::Str(s) => numeric(Value::Expr(to_expr(&Value::Str(s))?), digits),
        other => Err(SandboxError::type_error(format!(
            "cannot evaluate {} object numerically",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(code: &str) -> String {
        Session::new().run(code).unwrap()
    }

    fn run_err(code: &str) -> SandboxError {
        Session::new().run(code).unwrap_err()
    }

    #[test]
    fn test_symbols() {
        assert_eq!(run("x = sp.symbols('x')\nprint(x)"), "x\n");
        assert_eq!(run("a, b = sp.symbols('a, b')\nprint(a*b)"), "a*b\n");
        assert_eq!(run("print(sp.symbols('x0:3'))"), "(x0, x1, x2)\n");
        assert_eq!(run("print(sp.symbols('t,'))"), "(t,)\n");
        assert_eq!(run("x = sp.symbols('x', real=True)\nprint(x + 1)"), "x + 1\n");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(run("print(sp.Rational(3, 6))"), "1/2\n");
        assert_eq!(run("print(sp.Integer(7) / 2)"), "7/2\n");
        assert_eq!(run("print(sp.sqrt(12))"), "2*sqrt(3)\n");
        assert_eq!(run("print(sp.factorial(5))"), "120\n");
        assert_eq!(run("print(sp.N(sp.sqrt(2), 5))"), "1.4142\n");
        assert_eq!(run("print(sp.pi.evalf())"), "3.14159265358979\n");
    }

    #[test]
    fn test_calculus_functions() {
        let code = "x = sp.symbols('x')\n\
                    print(sp.diff(sp.sin(x)**2, x))\n\
                    print(sp.diff(x**4, x, 2))\n\
                    print(sp.integrate(x**2, (x, 0, 3)))\n\
                    print(sp.limit(sp.sin(x)/x, x, 0))\n\
                    print(sp.limit(1/x, x, 0, dir='-'))";
        assert_eq!(run(code), "2*sin(x)*cos(x)\n12*x**2\n9\n1\n-oo\n");
    }

    #[test]
    fn test_methods() {
        let code = "x, y = sp.symbols('x y')\n\
                    f = (x + y)**2\n\
                    print(f.expand())\n\
                    print(f.subs(y, 1).expand())\n\
                    print(f.subs({x: 1, y: 2}))\n\
                    print((x**2 - 1).factor())\n\
                    print(f.diff(x))";
        assert_eq!(
            run(code),
            "x**2 + 2*x*y + y**2\nx**2 + 2*x + 1\n9\n(x - 1)*(x + 1)\n2*x + 2*y\n"
        );
    }

    #[test]
    fn test_unevaluated_and_doit() {
        let code = "x = sp.symbols('x')\n\
                    I1 = sp.Integral(x**2, (x, 0, 1))\n\
                    print(sp.latex(I1))\n\
                    print(I1.doit())\n\
                    print(sp.Derivative(x**3, x).doit())";
        assert_eq!(
            run(code),
            "\\int\\limits_{0}^{1} x^{2}\\, dx\n1/3\n3*x**2\n"
        );
    }

    #[test]
    fn test_equations() {
        let code = "x = sp.symbols('x')\n\
                    eq = sp.Eq(2*x + 1, 5)\n\
                    print(eq, eq.lhs, eq.rhs)\n\
                    print(sp.solve(eq, x))\n\
                    print(sp.solve(x**2 - 2, x))\n\
                    print(sp.latex(sp.solve(x**2 - 4)))\n\
                    print(sp.Eq(2, 2), sp.Eq(x, x))";
        assert_eq!(
            run(code),
            "Eq(2*x + 1, 5) 2*x + 1 5\n[2]\n[-sqrt(2), sqrt(2)]\n\\left[ -2, \\  2\\right]\nTrue True\n"
        );
    }

    #[test]
    fn test_solve_dict() {
        let out = run("x = sp.symbols('x')\nprint(sp.solve(x - 3, x, dict=True))");
        assert_eq!(out, "[{x: 3}]\n");
    }

    #[test]
    fn test_print_options() {
        assert_eq!(run("print(1, 2, sep=', ', end='!')"), "1, 2!");
        assert_eq!(run("print('{} + {}'.format(1, 2))"), "1 + 2\n");
        assert_eq!(run("print(sum([1, 2, 3]), max(1, 5, 2), len('abc'))"), "6 5 3\n");
        assert_eq!(run("print(list(range(3)))"), "[0, 1, 2]\n");
    }

    #[test]
    fn test_errors_read_like_tracebacks() {
        assert_eq!(
            run_err("x = sp.symbols('x')\nsp.diff(x**2, 2)").to_string(),
            "ValueError: Can't calculate derivative wrt 2."
        );
        assert!(matches!(
            run_err("x, y = sp.symbols('x y')\nsp.solve([x + y, x - y], [x, y])"),
            SandboxError::NotImplemented(_)
        ));
        assert!(matches!(
            run_err("x = sp.symbols('x')\nsp.factorial(x)"),
            SandboxError::NotImplemented(_)
        ));
        assert!(matches!(
            run_err("sp.sin(1, 2)"),
            SandboxError::Type(_)
        ));
    }

    #[test]
    fn test_range_bounds_never_overflow() {
        let err = run_err("print(list(range(-9223372036854775808, 9223372036854775807)))");
        assert_eq!(err, SandboxError::value("range is too large"));
        assert!(matches!(
            run_err("range(9223372036854775807, -9223372036854775808, -1)"),
            SandboxError::Value(_)
        ));
        assert!(matches!(
            run_err("range(0, -9223372036854775808, -1)"),
            SandboxError::Value(_)
        ));
        assert_eq!(
            run("print(list(range(9223372036854775805, 9223372036854775807)))"),
            "[9223372036854775805, 9223372036854775806]\n"
        );
        assert_eq!(run("print(list(range(5, 0, -2)))"), "[5, 3, 1]\n");
        assert!(matches!(
            run_err("sp.symbols('x9223372036854775807:-9223372036854775808')"),
            SandboxError::Value(_)
        ));
    }

    #[test]
    fn test_precision_is_capped_at_float_digits() {
        assert_eq!(run("print(sp.N(sp.pi, 100))"), "3.14159265358979\n");
        assert_eq!(run("print(sp.pi.evalf(30))"), "3.14159265358979\n");
    }

    #[test]
    fn test_evalf_with_substitutions() {
        let code = "x, y = sp.symbols('x y')\n\
                    print((x**2 + 1).evalf(subs={x: 2}))\n\
                    print(sp.N(x*y, subs={x: 1, y: sp.Rational(1, 4)}))\n\
                    print((x + y).evalf(subs={x: 1}))";
        assert_eq!(run(code), "5.00000000000000\n0.250000000000000\ny + 1\n");
    }

    #[test]
    fn test_unresolved_integral_stays_unevaluated() {
        let out = run("x = sp.symbols('x')\nprint(sp.integrate(sp.exp(x**2), x))");
        assert_eq!(out, "Integral(exp(x**2), x)\n");
    }
}
