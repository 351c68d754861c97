//! Verification Session
//!
//! A [`Session`] is the shared namespace one verification batch runs in.
//! It starts out holding only the engine module (bound as `sympy` and `sp`);
//! every fragment run through it sees the bindings earlier fragments made,
//! and each run returns exactly what that fragment printed.

use std::collections::HashMap;

use num_traits::{Signed, ToPrimitive, Zero};
use tracing::{debug, trace};

use crate::builtins::{self, ENGINE_MODULE};
use crate::error::{SandboxError, SandboxResult};
use crate::eval::evaluate;
use crate::expr::{Expr, Rational};
use crate::script::ast::{BinOp, CmpOp, FPart, Node, Stmt, UnaryOp};
use crate::script::{parse_expression, parse_program};
use crate::value::Value;

/// Integer exponents of plain numbers beyond this are refused.
const MAX_NUMERIC_EXPONENT: i64 = 10_000;

/// Longest string a repetition or a format width may build.
const MAX_TEXT_LEN: usize = 1_000_000;

/// Significant digits of floats produced by mixed float arithmetic.
const FLOAT_DIGITS: usize = crate::display::DEFAULT_DIGITS;

pub struct Session {
    globals: HashMap<String, Value>,
    output: String,
    /// Unbound names evaluate to symbols, as when reading `S("x + 1")`.
    auto_symbols: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session seeded with the engine module only.
    pub fn new() -> Self {
        let mut globals = HashMap::new();
        globals.insert(
            ENGINE_MODULE.to_string(),
            Value::Module(ENGINE_MODULE.to_string()),
        );
        globals.insert("sp".to_string(), Value::Module(ENGINE_MODULE.to_string()));
        Self {
            globals,
            output: String::new(),
            auto_symbols: false,
        }
    }

    /// Run one fragment and return everything it printed.
    ///
    /// The fragment is parsed in full before anything executes, so a syntax
    /// error anywhere leaves the namespace untouched.
    pub fn run(&mut self, code: &str) -> SandboxResult<String> {
        let program = parse_program(code)?;
        self.output.clear();
        debug!(statements = program.len(), "running fragment");
        for (line, stmt) in program {
            trace!(line, "executing statement");
            self.exec(stmt)?;
        }
        Ok(std::mem::take(&mut self.output))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub(crate) fn write_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    // ── Statements ─────────────────────────────────────────────────────

    fn exec(&mut self, stmt: Stmt) -> SandboxResult<()> {
        match stmt {
            Stmt::Assign { targets, value } => {
                let value = self.eval(&value)?;
                self.assign(targets, value)
            }
            Stmt::AugAssign { target, op, value } => {
                let current = self.lookup(&target)?;
                let rhs = self.eval(&value)?;
                let updated = binary_op(op, current, rhs)?;
                self.globals.insert(target, updated);
                Ok(())
            }
            Stmt::Expr(node) => self.eval(&node).map(|_| ()),
            Stmt::Import { module, alias } => {
                if module != ENGINE_MODULE && !module.starts_with("sympy.") {
                    return Err(no_module(&module));
                }
                let bound = alias.unwrap_or_else(|| ENGINE_MODULE.to_string());
                self.globals
                    .insert(bound, Value::Module(ENGINE_MODULE.to_string()));
                Ok(())
            }
            Stmt::FromImport { module, names } => {
                for (name, alias) in names {
                    let value = import_name(&module, &name)?;
                    self.globals.insert(alias.unwrap_or(name), value);
                }
                Ok(())
            }
            Stmt::FromImportAll { module } => {
                if module != ENGINE_MODULE {
                    return Err(no_module(&module));
                }
                for (name, value) in builtins::engine_namespace() {
                    self.globals.insert(name.to_string(), value);
                }
                Ok(())
            }
            Stmt::Pass => Ok(()),
        }
    }

    fn assign(&mut self, targets: Vec<String>, value: Value) -> SandboxResult<()> {
        if targets.len() == 1 {
            if let Some(name) = targets.into_iter().next() {
                self.globals.insert(name, value);
            }
            return Ok(());
        }
        let items = match value {
            Value::Tuple(items) | Value::List(items) => items,
            other => {
                return Err(SandboxError::type_error(format!(
                    "cannot unpack non-iterable {} object",
                    other.type_name()
                )))
            }
        };
        if items.len() < targets.len() {
            return Err(SandboxError::value(format!(
                "not enough values to unpack (expected {}, got {})",
                targets.len(),
                items.len()
            )));
        }
        if items.len() > targets.len() {
            return Err(SandboxError::value(format!(
                "too many values to unpack (expected {})",
                targets.len()
            )));
        }
        for (name, item) in targets.into_iter().zip(items) {
            self.globals.insert(name, item);
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> SandboxResult<Value> {
        if let Some(value) = self.globals.get(name) {
            return Ok(value.clone());
        }
        if let Some(function) = builtins::python_builtin(name) {
            return Ok(function);
        }
        if self.auto_symbols {
            return Ok(builtins::engine_value(name).unwrap_or_else(|| Value::Expr(Expr::symbol(name))));
        }
        Err(SandboxError::Name(name.to_string()))
    }

    // ── Expressions ────────────────────────────────────────────────────

    pub(crate) fn eval(&mut self, node: &Node) -> SandboxResult<Value> {
        match node {
            Node::Number(n) => Ok(Value::Expr(Expr::Number(n.clone()))),
            Node::Str(s) => Ok(Value::Str(s.clone())),
            Node::FStr(parts) => self.eval_fstring(parts).map(Value::Str),
            Node::Bool(b) => Ok(Value::Bool(*b)),
            Node::None => Ok(Value::None),
            Node::Name(name) => self.lookup(name),
            Node::List(items) => Ok(Value::List(self.eval_all(items)?)),
            Node::Tuple(items) => Ok(Value::Tuple(self.eval_all(items)?)),
            Node::Dict(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (k, v) in items {
                    out.push((self.eval(k)?, self.eval(v)?));
                }
                Ok(Value::Dict(out))
            }
            Node::Attr(target, name) => {
                let target = self.eval(target)?;
                get_attr(target, name)
            }
            Node::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                index_value(&target, &index)
            }
            Node::Call { func, args, kwargs } => {
                let callee = self.eval(func)?;
                let args = self.eval_all(args)?;
                let mut evaluated = Vec::with_capacity(kwargs.len());
                for (k, v) in kwargs {
                    evaluated.push((k.clone(), self.eval(v)?));
                }
                self.call(callee, args, evaluated)
            }
            Node::Unary(op, operand) => {
                let operand = self.eval(operand)?;
                unary_op(*op, operand)
            }
            Node::Binary(op, l, r) => {
                let l = self.eval(l)?;
                let r = self.eval(r)?;
                binary_op(*op, l, r)
            }
            Node::Compare(op, l, r) => {
                let l = self.eval(l)?;
                let r = self.eval(r)?;
                let equal = values_equal(&l, &r);
                Ok(Value::Bool(match op {
                    CmpOp::Eq => equal,
                    CmpOp::Ne => !equal,
                }))
            }
        }
    }

    fn eval_all(&mut self, nodes: &[Node]) -> SandboxResult<Vec<Value>> {
        nodes.iter().map(|n| self.eval(n)).collect()
    }

    fn eval_fstring(&mut self, parts: &[FPart]) -> SandboxResult<String> {
        let mut out = String::new();
        for part in parts {
            match part {
                FPart::Text(text) => out.push_str(text),
                FPart::Field { value, spec } => {
                    let value = self.eval(value)?;
                    match spec {
                        Some(spec) => out.push_str(&format_with_spec(&value, spec)?),
                        None => out.push_str(&value.to_string()),
                    }
                }
            }
        }
        Ok(out)
    }

    fn call(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> SandboxResult<Value> {
        match callee {
            Value::Function(name) => builtins::call_function(self, name, args, kwargs),
            Value::Method(receiver, name) => {
                builtins::call_method(self, *receiver, &name, args, kwargs)
            }
            other => Err(SandboxError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    /// Read `text` as an expression where unknown names become symbols.
    pub(crate) fn sympify(text: &str) -> SandboxResult<Value> {
        let node = parse_expression(text)?;
        let mut scratch = Session {
            globals: HashMap::new(),
            output: String::new(),
            auto_symbols: true,
        };
        scratch.eval(&node)
    }
}

fn no_module(module: &str) -> SandboxError {
    SandboxError::Import(format!("No module named '{}'", module))
}

fn import_name(module: &str, name: &str) -> SandboxResult<Value> {
    match module {
        ENGINE_MODULE => {
            if let Some(value) = builtins::engine_value(name) {
                return Ok(value);
            }
            if builtins::is_unsupported(name) {
                return Err(builtins::unsupported(name));
            }
            Err(SandboxError::Import(format!(
                "cannot import name '{}' from '{}'",
                name, module
            )))
        }
        "sympy.abc" => Ok(Value::Expr(Expr::symbol(name))),
        other => Err(no_module(other)),
    }
}

// ── Attributes and indexing ────────────────────────────────────────────

fn get_attr(target: Value, name: &str) -> SandboxResult<Value> {
    match &target {
        Value::Module(module) => {
            if let Some(value) = builtins::engine_value(name) {
                return Ok(value);
            }
            if builtins::is_unsupported(name) {
                return Err(builtins::unsupported(name));
            }
            Err(SandboxError::Attribute(format!(
                "module '{}' has no attribute '{}'",
                module, name
            )))
        }
        Value::Equality(lhs, _) if name == "lhs" => Ok(Value::Expr((**lhs).clone())),
        Value::Equality(_, rhs) if name == "rhs" => Ok(Value::Expr((**rhs).clone())),
        Value::Expr(e) if name == "free_symbols" => Ok(Value::List(
            e.free_symbols()
                .into_iter()
                .map(|s| Value::Expr(Expr::symbol(s)))
                .collect(),
        )),
        _ if builtins::has_method(&target, name) => Ok(Value::Method(Box::new(target), name.to_string())),
        other => Err(SandboxError::Attribute(format!(
            "'{}' object has no attribute '{}'",
            other.type_name(),
            name
        ))),
    }
}

fn index_value(target: &Value, index: &Value) -> SandboxResult<Value> {
    let sequence = |items: &[Value], kind: &str| -> SandboxResult<Value> {
        let i = as_index(index, kind)?;
        let len = items.len() as i64;
        let i = if i < 0 { i + len } else { i };
        if i < 0 || i >= len {
            return Err(SandboxError::Index(format!("{} index out of range", kind)));
        }
        Ok(items[i as usize].clone())
    };
    match target {
        Value::List(items) => sequence(items, "list"),
        Value::Tuple(items) => sequence(items, "tuple"),
        Value::Str(s) => {
            let chars: Vec<Value> = s.chars().map(|c| Value::Str(c.to_string())).collect();
            sequence(&chars, "string")
        }
        Value::Dict(items) => items
            .iter()
            .find(|(k, _)| values_equal(k, index))
            .map(|(_, v)| v.clone())
            .ok_or_else(|| SandboxError::Key(index.repr())),
        other => Err(SandboxError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn as_index(index: &Value, kind: &str) -> SandboxResult<i64> {
    match index {
        Value::Bool(b) => Ok(*b as i64),
        Value::Expr(e) => e.as_small_integer().ok_or_else(|| {
            SandboxError::type_error(format!(
                "{} indices must be integers, not {}",
                kind,
                index.type_name()
            ))
        }),
        other => Err(SandboxError::type_error(format!(
            "{} indices must be integers, not {}",
            kind,
            other.type_name()
        ))),
    }
}

// ── Operators ──────────────────────────────────────────────────────────

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Pow => "**",
    }
}

fn unsupported_operands(op: BinOp, l: &Value, r: &Value) -> SandboxError {
    SandboxError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op_symbol(op),
        l.type_name(),
        r.type_name()
    ))
}

/// Numeric view of a value for float arithmetic.
fn float_of(v: &Value) -> Option<f64> {
    match v {
        Value::Float(f) => Some(*f),
        Value::Decimal { value, .. } => Some(*value),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Expr(e) => evaluate(e),
        _ => None,
    }
}

fn float_op(op: BinOp, a: f64, b: f64) -> SandboxResult<f64> {
    match op {
        BinOp::Add => Ok(a + b),
        BinOp::Sub => Ok(a - b),
        BinOp::Mul => Ok(a * b),
        BinOp::Div if b == 0.0 => Err(SandboxError::ZeroDivision("float division by zero".to_string())),
        BinOp::Div => Ok(a / b),
        BinOp::Pow if a == 0.0 && b < 0.0 => Err(SandboxError::ZeroDivision(
            "0.0 cannot be raised to a negative power".to_string(),
        )),
        BinOp::Pow => {
            let v = a.powf(b);
            if v.is_nan() {
                Err(SandboxError::value(
                    "complex floating-point results are not supported",
                ))
            } else {
                Ok(v)
            }
        }
    }
}

pub(crate) fn expr_op(op: BinOp, a: Expr, b: Expr) -> SandboxResult<Expr> {
    let both_numbers = a.as_number().is_some() && b.as_number().is_some();
    match op {
        BinOp::Add => Ok(a + b),
        BinOp::Sub => Ok(a - b),
        BinOp::Mul => Ok(a * b),
        BinOp::Div => {
            if both_numbers && b.is_zero() {
                return Err(SandboxError::ZeroDivision("division by zero".to_string()));
            }
            Ok(a / b)
        }
        BinOp::Pow => {
            if let (Some(base), Some(exp)) = (a.as_number(), b.as_number()) {
                if base.is_zero() && exp.is_negative() {
                    return Err(SandboxError::ZeroDivision(
                        "0 cannot be raised to a negative power".to_string(),
                    ));
                }
                let trivial_base = base.is_zero() || base.abs() == Rational::from_integer(1.into());
                let too_large = exp.to_integer().abs() > MAX_NUMERIC_EXPONENT.into();
                if !trivial_base && too_large {
                    return Err(SandboxError::value("exponent too large"));
                }
            }
            Ok(Expr::power(a, b))
        }
    }
}

pub(crate) fn binary_op(op: BinOp, l: Value, r: Value) -> SandboxResult<Value> {
    match (&l, &r) {
        (Value::Expr(a), Value::Expr(b)) => expr_op(op, a.clone(), b.clone()).map(Value::Expr),
        (Value::Bool(_), Value::Expr(_)) | (Value::Expr(_), Value::Bool(_)) | (Value::Bool(_), Value::Bool(_)) => {
            let a = bool_to_expr(l);
            let b = bool_to_expr(r);
            binary_op(op, a, b)
        }
        (Value::Float(_) | Value::Decimal { .. }, _) | (_, Value::Float(_) | Value::Decimal { .. }) => {
            float_binary(op, &l, &r)
        }
        (Value::Str(a), Value::Str(b)) if op == BinOp::Add => Ok(Value::Str(format!("{}{}", a, b))),
        (Value::Str(s), Value::Expr(n)) | (Value::Expr(n), Value::Str(s)) if op == BinOp::Mul => {
            let times = n.as_small_integer().ok_or_else(|| unsupported_operands(op, &l, &r))?;
            let times = usize::try_from(times.max(0)).unwrap_or(usize::MAX);
            match s.len().checked_mul(times) {
                Some(len) if len <= MAX_TEXT_LEN => Ok(Value::Str(s.repeat(times))),
                _ => Err(SandboxError::value("repeated string is too long")),
            }
        }
        (Value::List(a), Value::List(b)) if op == BinOp::Add => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (Value::Tuple(a), Value::Tuple(b)) if op == BinOp::Add => {
            Ok(Value::Tuple(a.iter().chain(b).cloned().collect()))
        }
        _ => Err(unsupported_operands(op, &l, &r)),
    }
}

/// Float arithmetic. Plain floats stay plain against exact numbers; an
/// evaluated float or a symbolic constant makes the result an evaluated float.
fn float_binary(op: BinOp, l: &Value, r: &Value) -> SandboxResult<Value> {
    let (a, b) = match (float_of(l), float_of(r)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(SandboxError::type_error(format!(
                "cannot combine a float with the symbolic expression in {} {} {}; use Rational instead",
                l,
                op_symbol(op),
                r
            )))
        }
    };
    let value = float_op(op, a, b)?;
    let digits = [l, r]
        .iter()
        .filter_map(|v| match v {
            Value::Decimal { digits, .. } => Some(*digits),
            _ => None,
        })
        .min();
    let constant = [l, r]
        .iter()
        .any(|v| matches!(v, Value::Expr(e) if e.as_number().is_none()));
    Ok(match digits {
        Some(digits) => Value::Decimal { value, digits },
        None if constant => Value::Decimal {
            value,
            digits: FLOAT_DIGITS,
        },
        None => Value::Float(value),
    })
}

fn bool_to_expr(v: Value) -> Value {
    match v {
        Value::Bool(b) => Value::int(b as i64),
        other => other,
    }
}

fn unary_op(op: UnaryOp, v: Value) -> SandboxResult<Value> {
    match (op, v) {
        (UnaryOp::Pos, v @ (Value::Expr(_) | Value::Float(_) | Value::Decimal { .. })) => Ok(v),
        (UnaryOp::Neg, Value::Expr(e)) => Ok(Value::Expr(-e)),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, Value::Decimal { value, digits }) => Ok(Value::Decimal {
            value: -value,
            digits,
        }),
        (op, Value::Bool(b)) => unary_op(op, Value::int(b as i64)),
        (op, other) => Err(SandboxError::type_error(format!(
            "bad operand type for unary {}: '{}'",
            if op == UnaryOp::Neg { "-" } else { "+" },
            other.type_name()
        ))),
    }
}

/// `==` as the language defines it: structural for expressions, numeric
/// across floats and numbers.
pub(crate) fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Expr(a), Value::Expr(b)) => a == b,
        (Value::Float(_) | Value::Decimal { .. }, _) | (_, Value::Float(_) | Value::Decimal { .. }) => {
            match (float_of(l), float_of(r)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (Value::Bool(a), Value::Expr(e)) | (Value::Expr(e), Value::Bool(a)) => {
            e.as_small_integer() == Some(*a as i64)
        }
        (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => l == r,
    }
}

// ── Formatting ─────────────────────────────────────────────────────────

/// Apply a format spec such as `.3f`, `.2e`, `d` or `>10`.
fn format_with_spec(value: &Value, spec: &str) -> SandboxResult<String> {
    let kind = spec.chars().last().filter(|c| c.is_ascii_alphabetic() || *c == '%');
    let body = match kind {
        Some(_) => &spec[..spec.len() - 1],
        None => spec,
    };
    let precision = body
        .split_once('.')
        .and_then(|(_, p)| p.parse::<usize>().ok());
    if precision.is_some_and(|p| p > MAX_TEXT_LEN) {
        return Err(SandboxError::value("format precision is too large"));
    }
    let numeric = || {
        float_of(value).ok_or_else(|| {
            SandboxError::type_error(format!(
                "unsupported format string passed to {}.__format__",
                value.type_name()
            ))
        })
    };
    let text = match kind {
        Some('f') | Some('F') => format!("{:.*}", precision.unwrap_or(6), numeric()?),
        Some('e') | Some('E') => {
            let s = format!("{:.*e}", precision.unwrap_or(6), numeric()?);
            match s.split_once('e') {
                Some((mantissa, exp)) => {
                    let (sign, digits) = match exp.strip_prefix('-') {
                        Some(d) => ('-', d),
                        None => ('+', exp),
                    };
                    format!("{}e{}{:0>2}", mantissa, sign, digits)
                }
                None => s,
            }
        }
        Some('g') | Some('G') => {
            crate::display::format_float(numeric()?, precision.unwrap_or(6))
        }
        Some('%') => format!("{:.*}%", precision.unwrap_or(6), numeric()? * 100.0),
        Some('d') => match value {
            Value::Expr(e) if e.as_integer().is_some() => e.to_string(),
            _ => {
                return Err(SandboxError::value(format!(
                    "Unknown format code 'd' for object of type '{}'",
                    value.type_name()
                )))
            }
        },
        _ => value.to_string(),
    };
    // width and alignment
    let width: String = body
        .split('.')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    match width.parse::<usize>() {
        Ok(w) if w > MAX_TEXT_LEN => Err(SandboxError::value("format width is too large")),
        Ok(w) if body.starts_with('<') => Ok(format!("{:<w$}", text, w = w)),
        Ok(w) if body.starts_with('^') => Ok(format!("{:^w$}", text, w = w)),
        Ok(w) => Ok(format!("{:>w$}", text, w = w)),
        Err(_) => Ok(text),
    }
}

/// Numeric value of an integer-valued argument.
pub(crate) fn small_integer(v: &Value) -> Option<i64> {
    match v {
        Value::Expr(e) => e.as_small_integer(),
        Value::Bool(b) => Some(*b as i64),
        Value::Float(f) if f.fract() == 0.0 => f.to_i64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(code: &str) -> SandboxResult<String> {
        Session::new().run(code)
    }

    #[test]
    fn test_print_latex_of_derivative() {
        let out = run("import sympy as sp\nx = sp.symbols('x')\nprint(sp.latex(sp.diff(x**2, x)))").unwrap();
        assert_eq!(out, "2 x\n");
    }

    #[test]
    fn test_namespace_persists_across_runs() {
        let mut session = Session::new();
        session.run("x = sp.Symbol('x')\nf = x**3").unwrap();
        let out = session.run("print(sp.diff(f, x))").unwrap();
        assert_eq!(out, "3*x**2\n");
    }

    #[test]
    fn test_unbound_name() {
        let err = run("print(y + 1)").unwrap_err();
        assert_eq!(err.to_string(), "NameError: name 'y' is not defined");
    }

    #[test]
    fn test_import_rules() {
        assert!(run("from sympy import *\nprint(sin(pi/6))").is_ok());
        assert_eq!(
            run("import numpy as np").unwrap_err(),
            SandboxError::Import("No module named 'numpy'".to_string())
        );
        assert!(matches!(
            run("from sympy import Matrix").unwrap_err(),
            SandboxError::NotImplemented(_)
        ));
        assert!(matches!(
            run("from sympy import nosuchthing").unwrap_err(),
            SandboxError::Import(_)
        ));
        assert_eq!(run("from sympy.abc import t\nprint(t**2)").unwrap(), "t**2\n");
    }

    #[test]
    fn test_tuple_unpacking() {
        let out = run("x, y = sp.symbols('x y')\nprint(x + y, x*y)").unwrap();
        assert_eq!(out, "x + y x*y\n");
        let err = run("a, b = sp.symbols('a b c')").unwrap_err();
        assert!(matches!(err, SandboxError::Value(_)));
    }

    #[test]
    fn test_exact_arithmetic() {
        assert_eq!(run("print(1/2 + 1/3)").unwrap(), "5/6\n");
        assert_eq!(run("print(2**10, 0.25)").unwrap(), "1024 1/4\n");
        assert!(matches!(
            run("print(1/0)").unwrap_err(),
            SandboxError::ZeroDivision(_)
        ));
    }

    #[test]
    fn test_float_arithmetic() {
        assert_eq!(run("print(float(1/4) * 2)").unwrap(), "0.5\n");
        assert_eq!(run("print(sp.N(sp.pi) + 1)").unwrap(), "4.14159265358979\n");
        assert!(matches!(
            run("x = sp.Symbol('x')\nprint(float(2) * x)").unwrap_err(),
            SandboxError::Type(_)
        ));
    }

    #[test]
    fn test_comparisons() {
        let out = run("x = sp.Symbol('x')\nprint(x + x == 2*x, x != x)").unwrap();
        assert_eq!(out, "True False\n");
    }

    #[test]
    fn test_fstrings_and_indexing() {
        let code = "x = sp.Symbol('x')\nsols = sp.solve(x**2 - 4, x)\nprint(f'roots: {sols[0]} and {sols[-1]}, n={len(sols)}')";
        assert_eq!(run(code).unwrap(), "roots: -2 and 2, n=2\n");
        assert_eq!(run("print(f'{1/3:.4f}')").unwrap(), "0.3333\n");
        assert!(matches!(
            run("print([1, 2][5])").unwrap_err(),
            SandboxError::Index(_)
        ));
    }

    #[test]
    fn test_oversized_text_is_refused() {
        assert_eq!(run("print('ab' * 3)").unwrap(), "ababab\n");
        assert!(matches!(
            run("print('ab' * 10**12)").unwrap_err(),
            SandboxError::Value(_)
        ));
        assert!(matches!(
            run("print('x' * 9223372036854775807)").unwrap_err(),
            SandboxError::Value(_)
        ));
        assert!(matches!(
            run("print(f'{1:>99999999}')").unwrap_err(),
            SandboxError::Value(_)
        ));
        assert!(matches!(
            run("print(f'{1/3:.99999999f}')").unwrap_err(),
            SandboxError::Value(_)
        ));
    }

    #[test]
    fn test_augmented_assignment() {
        let out = run("total = 1\ntotal += 2\ntotal *= 5\nprint(total)").unwrap();
        assert_eq!(out, "15\n");
    }

    #[test]
    fn test_attribute_errors() {
        assert!(matches!(
            run("sp.nosuch").unwrap_err(),
            SandboxError::Attribute(_)
        ));
        assert!(matches!(
            run("x = sp.Symbol('x')\nx.nosuch()").unwrap_err(),
            SandboxError::Attribute(_)
        ));
        assert!(matches!(
            run("sp.Matrix([[1, 2]])").unwrap_err(),
            SandboxError::NotImplemented(_)
        ));
    }

    #[test]
    fn test_syntax_error_runs_nothing() {
        let mut session = Session::new();
        let err = session.run("a = 1\nb = (2 +").unwrap_err();
        assert!(matches!(err, SandboxError::Syntax { line: 2, .. }));
        assert!(session.get("a").is_none());
    }

    #[test]
    fn test_sympify_strings() {
        let out = run("e = sp.S('x**2 + 1/2')\nprint(e, sp.latex(e))").unwrap();
        assert_eq!(out, "x**2 + 1/2 x^{2} + \\frac{1}{2}\n");
    }
}
