//! Proof Cascade Sandbox
//!
//! A self-contained symbolic mathematics engine and the interpreter that runs
//! model-written verification fragments against it. Fragments are written in
//! a small Python subset with a `sympy`-shaped namespace:
//!
//! ```text
//! import sympy as sp
//! x = sp.symbols('x')
//! print(sp.latex(sp.diff(x**3, x)))
//! ```
//!
//! A [`Session`] holds the bindings of one proof: every step's fragment runs
//! in the same namespace, so names defined by earlier steps stay visible.

pub mod algebra;
pub mod builtins;
pub mod calculus;
pub mod display;
pub mod error;
pub mod eval;
pub mod expr;
pub mod interpreter;
pub mod latex;
pub mod script;
pub mod value;

pub use error::{SandboxError, SandboxResult};
pub use expr::Expr;
pub use interpreter::Session;
pub use value::Value;
