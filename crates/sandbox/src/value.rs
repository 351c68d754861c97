//! Runtime values of the verification language.

use std::fmt;

use num_traits::{One, Zero};

use crate::display::{format_float, python_float};
use crate::expr::{Constant, Expr};
use crate::latex::to_latex;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    /// A plain float, as `float(...)` returns
    Float(f64),
    /// An evaluated float with its significant digits, as `N` returns
    Decimal { value: f64, digits: usize },
    Str(String),
    Expr(Expr),
    /// `Eq(lhs, rhs)` that did not reduce to a boolean
    Equality(Box<Expr>, Box<Expr>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Module(String),
    Function(&'static str),
    Method(Box<Value>, String),
}

impl Value {
    pub fn int(n: i64) -> Value {
        Value::Expr(Expr::int(n))
    }

    /// Type name as the interpreter reports it in errors.
    pub fn type_name(&self) -> String {
        match self {
            Value::None => "NoneType".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Decimal { .. } => "Float".to_string(),
            Value::Str(_) => "str".to_string(),
            Value::Expr(e) => expr_type_name(e),
            Value::Equality(..) => "Equality".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Tuple(_) => "tuple".to_string(),
            Value::Dict(_) => "dict".to_string(),
            Value::Module(_) => "module".to_string(),
            Value::Function(_) => "function".to_string(),
            Value::Method(..) => "method".to_string(),
        }
    }

    /// Form used inside containers: strings are quoted.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => other.to_string(),
        }
    }

    pub fn to_latex(&self) -> String {
        match self {
            Value::None => "\\text{None}".to_string(),
            Value::Bool(b) => format!("\\text{{{}}}", if *b { "True" } else { "False" }),
            Value::Float(v) => python_float(*v),
            Value::Decimal { value, digits } => format_float(*value, *digits),
            Value::Str(s) => format!("\\mathtt{{\\text{{{}}}}}", s),
            Value::Expr(e) => to_latex(e),
            Value::Equality(lhs, rhs) => format!("{} = {}", to_latex(lhs), to_latex(rhs)),
            Value::List(items) => format!("\\left[ {}\\right]", latex_items(items)),
            Value::Tuple(items) => format!("\\left( {}\\right)", latex_items(items)),
            Value::Dict(items) => {
                let inner = items
                    .iter()
                    .map(|(k, v)| format!("{} : {}", k.to_latex(), v.to_latex()))
                    .collect::<Vec<_>>()
                    .join(", \\  ");
                format!("\\left\\{{ {}\\right\\}}", inner)
            }
            other => format!("\\text{{{}}}", other),
        }
    }
}

fn latex_items(items: &[Value]) -> String {
    items
        .iter()
        .map(Value::to_latex)
        .collect::<Vec<_>>()
        .join(", \\  ")
}

fn expr_type_name(e: &Expr) -> String {
    match e {
        Expr::Number(n) if n.is_zero() => "Zero".to_string(),
        Expr::Number(n) if n.is_one() => "One".to_string(),
        Expr::Number(n) if (-n).is_one() => "NegativeOne".to_string(),
        Expr::Number(n) if n.is_integer() => "Integer".to_string(),
        Expr::Number(_) => "Rational".to_string(),
        Expr::Symbol(_) => "Symbol".to_string(),
        Expr::Constant(c) => match c {
            Constant::Pi => "Pi",
            Constant::E => "Exp1",
            Constant::I => "ImaginaryUnit",
            Constant::Infinity => "Infinity",
            Constant::ComplexInfinity => "ComplexInfinity",
            Constant::NaN => "NaN",
        }
        .to_string(),
        Expr::Add(_) => "Add".to_string(),
        Expr::Mul(_) => "Mul".to_string(),
        Expr::Pow(..) => "Pow".to_string(),
        Expr::Func(f, _) => f.name().to_string(),
        Expr::Integral { .. } => "Integral".to_string(),
        Expr::Derivative { .. } => "Derivative".to_string(),
        Expr::Limit { .. } => "Limit".to_string(),
    }
}

fn join_repr(items: &[Value]) -> String {
    items.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(b) => f.write_str(if *b { "True" } else { "False" }),
            Value::Float(v) => f.write_str(&python_float(*v)),
            Value::Decimal { value, digits } => f.write_str(&format_float(*value, *digits)),
            Value::Str(s) => f.write_str(s),
            Value::Expr(e) => write!(f, "{}", e),
            Value::Equality(lhs, rhs) => write!(f, "Eq({}, {})", lhs, rhs),
            Value::List(items) => write!(f, "[{}]", join_repr(items)),
            Value::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0].repr()),
            Value::Tuple(items) => write!(f, "({})", join_repr(items)),
            Value::Dict(items) => {
                let inner = items
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{{}}}", inner)
            }
            Value::Module(name) => write!(f, "<module '{}'>", name),
            Value::Function(name) => write!(f, "<function {}>", name),
            Value::Method(_, name) => write!(f, "<bound method {}>", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display() {
        let x = Expr::symbol("x");
        let list = Value::List(vec![
            Value::Expr(-Expr::one()),
            Value::Expr(x.clone()),
            Value::Str("a".to_string()),
        ]);
        assert_eq!(list.to_string(), "[-1, x, 'a']");
        assert_eq!(Value::Tuple(vec![Value::int(1)]).to_string(), "(1,)");
        assert_eq!(
            Value::Equality(Box::new(x), Box::new(Expr::int(2))).to_string(),
            "Eq(x, 2)"
        );
        assert_eq!(
            Value::Decimal {
                value: 0.5,
                digits: 15
            }
            .to_string(),
            "0.500000000000000"
        );
    }

    #[test]
    fn test_latex() {
        let list = Value::List(vec![Value::int(-2), Value::int(2)]);
        assert_eq!(list.to_latex(), "\\left[ -2, \\  2\\right]");
        let eq = Value::Equality(Box::new(Expr::symbol("y")), Box::new(Expr::frac(1, 2)));
        assert_eq!(eq.to_latex(), "y = \\frac{1}{2}");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Expr(Expr::symbol("x")).type_name(), "Symbol");
        assert_eq!(Value::Expr(Expr::int(7)).type_name(), "Integer");
        assert_eq!(Value::Expr(Expr::frac(1, 3)).type_name(), "Rational");
        assert_eq!(Value::Str(String::new()).type_name(), "str");
    }
}
