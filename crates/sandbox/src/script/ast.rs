//! Syntax tree of verification fragments.

use crate::expr::Rational;

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// `a = e` or `a, b = e`
    Assign { targets: Vec<String>, value: Node },
    /// `a += e` and friends
    AugAssign {
        target: String,
        op: BinOp,
        value: Node,
    },
    Expr(Node),
    /// `import sympy [as sp]`
    Import {
        module: String,
        alias: Option<String>,
    },
    /// `from sympy import a, b as c`
    FromImport {
        module: String,
        names: Vec<(String, Option<String>)>,
    },
    /// `from sympy import *`
    FromImportAll { module: String },
    Pass,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
}

/// A piece of an f-string.
#[derive(Clone, Debug, PartialEq)]
pub enum FPart {
    Text(String),
    Field { value: Node, spec: Option<String> },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// Integer and decimal literals, both exact
    Number(Rational),
    Str(String),
    FStr(Vec<FPart>),
    Bool(bool),
    None,
    Name(String),
    List(Vec<Node>),
    Tuple(Vec<Node>),
    Dict(Vec<(Node, Node)>),
    Attr(Box<Node>, String),
    Index(Box<Node>, Box<Node>),
    Call {
        func: Box<Node>,
        args: Vec<Node>,
        kwargs: Vec<(String, Node)>,
    },
    Unary(UnaryOp, Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Compare(CmpOp, Box<Node>, Box<Node>),
}

impl Node {
    pub(crate) fn binary(op: BinOp, l: Node, r: Node) -> Node {
        Node::Binary(op, Box::new(l), Box::new(r))
    }
}

/// Postfix part of a primary expression.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Trailer {
    Call(Vec<Arg>),
    Attr(String),
    Index(Node),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Arg {
    Positional(Node),
    Keyword(String, Node),
}

impl Trailer {
    pub(crate) fn apply(self, target: Node) -> Node {
        match self {
            Trailer::Call(args) => {
                let mut positional = Vec::new();
                let mut kwargs = Vec::new();
                for arg in args {
                    match arg {
                        Arg::Positional(n) => positional.push(n),
                        Arg::Keyword(k, v) => kwargs.push((k, v)),
                    }
                }
                Node::Call {
                    func: Box::new(target),
                    args: positional,
                    kwargs,
                }
            }
            Trailer::Attr(name) => Node::Attr(Box::new(target), name),
            Trailer::Index(index) => Node::Index(Box::new(target), Box::new(index)),
        }
    }
}
