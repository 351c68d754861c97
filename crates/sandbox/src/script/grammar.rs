//! PEG grammar for one logical line of a verification fragment.

use num_bigint::BigInt;
use num_traits::Pow;

use super::ast::{Arg, BinOp, CmpOp, FPart, Node, Stmt, Trailer, UnaryOp};
use crate::expr::Rational;

/// Exponents beyond this in a decimal literal are rejected.
const MAX_LITERAL_EXPONENT: i64 = 1000;

peg::parser!(
    pub grammar script() for str {
        pub rule statement() -> Stmt
            = _ s:simple_statement() _ { s }

        rule simple_statement() -> Stmt
            = "import" gap() module:dotted_name() alias:(gap() "as" gap() a:identifier() { a })? {
                Stmt::Import { module, alias }
            }
            / "from" gap() module:dotted_name() gap() "import" _ "*" {
                Stmt::FromImportAll { module }
            }
            / "from" gap() module:dotted_name() gap() "import" _ names:import_names() {
                Stmt::FromImport { module, names }
            }
            / "pass" !ident_char() { Stmt::Pass }
            / targets:assign_targets() _ "=" !"=" _ value:expression_list() {
                Stmt::Assign { targets, value }
            }
            / target:identifier() _ op:aug_op() _ value:expression_list() {
                Stmt::AugAssign { target, op, value }
            }
            / e:expression_list() { Stmt::Expr(e) }

        rule import_names() -> Vec<(String, Option<String>)>
            = "(" _ names:(import_name() ++ (_ "," _)) _ ","? _ ")" { names }
            / names:(import_name() ++ (_ "," _)) { names }

        rule import_name() -> (String, Option<String>)
            = name:identifier() alias:(gap() "as" gap() a:identifier() { a })? { (name, alias) }

        rule assign_targets() -> Vec<String>
            = "(" _ t:(identifier() ++ (_ "," _)) _ ","? _ ")" { t }
            / "[" _ t:(identifier() ++ (_ "," _)) _ ","? _ "]" { t }
            / t:(identifier() ++ (_ "," _)) (_ ",")? { t }

        rule aug_op() -> BinOp
            = "**=" { BinOp::Pow }
            / "+=" { BinOp::Add }
            / "-=" { BinOp::Sub }
            / "*=" { BinOp::Mul }
            / "/=" { BinOp::Div }

        rule dotted_name() -> String
            = n:$(identifier() ("." identifier())*) { n.to_string() }

        // ── Expressions ────────────────────────────────────────────────

        rule expression_list() -> Node
            = first:expression() rest:(_ "," _ e:expression() { e })* trailing:(_ "," { () })? {
                if rest.is_empty() && trailing.is_none() {
                    first
                } else {
                    let mut items = vec![first];
                    items.extend(rest);
                    Node::Tuple(items)
                }
            }

        pub rule expression() -> Node
            = l:arith() r:(_ op:cmp_op() _ r:arith() { (op, r) })? {
                match r {
                    Some((op, r)) => Node::Compare(op, Box::new(l), Box::new(r)),
                    None => l,
                }
            }

        rule cmp_op() -> CmpOp
            = "==" { CmpOp::Eq }
            / "!=" { CmpOp::Ne }

        rule arith() -> Node
            = l:term() rest:(_ op:add_op() _ r:term() { (op, r) })* {
                rest.into_iter().fold(l, |acc, (op, r)| Node::binary(op, acc, r))
            }

        rule add_op() -> BinOp
            = "+" !"=" { BinOp::Add }
            / "-" !"=" { BinOp::Sub }

        rule term() -> Node
            = l:factor() rest:(_ op:mul_op() _ r:factor() { (op, r) })* {
                rest.into_iter().fold(l, |acc, (op, r)| Node::binary(op, acc, r))
            }

        rule mul_op() -> BinOp
            = "*" !['*' | '='] { BinOp::Mul }
            / "/" !['/' | '='] { BinOp::Div }

        rule factor() -> Node
            = "-" _ f:factor() { Node::Unary(UnaryOp::Neg, Box::new(f)) }
            / "+" _ f:factor() { Node::Unary(UnaryOp::Pos, Box::new(f)) }
            / power()

        // right associative, and `-x**2` is `-(x**2)`
        rule power() -> Node
            = b:postfix() e:(_ pow_op() _ e:factor() { e })? {
                match e {
                    Some(e) => Node::binary(BinOp::Pow, b, e),
                    None => b,
                }
            }

        rule pow_op()
            = "**" !"=" / "^"

        rule postfix() -> Node
            = a:atom() trailers:(_ t:trailer() { t })* {
                trailers.into_iter().fold(a, |acc, t| t.apply(acc))
            }

        rule trailer() -> Trailer
            = "(" _ args:(arg() ** (_ "," _)) _ ","? _ ")" { Trailer::Call(args) }
            / "." _ name:identifier() { Trailer::Attr(name) }
            / "[" _ index:expression_list() _ "]" { Trailer::Index(index) }

        rule arg() -> Arg
            = name:identifier() _ "=" !"=" _ value:expression() { Arg::Keyword(name, value) }
            / value:expression() { Arg::Positional(value) }

        rule atom() -> Node
            = string()
            / number()
            / "(" _ ")" { Node::Tuple(Vec::new()) }
            / "(" _ e:expression_list() _ ")" { e }
            / "[" _ items:(expression() ** (_ "," _)) _ ","? _ "]" { Node::List(items) }
            / "{" _ items:(dict_item() ** (_ "," _)) _ ","? _ "}" { Node::Dict(items) }
            / name:identifier() {
                match name.as_str() {
                    "True" => Node::Bool(true),
                    "False" => Node::Bool(false),
                    "None" => Node::None,
                    _ => Node::Name(name),
                }
            }

        rule dict_item() -> (Node, Node)
            = k:expression() _ ":" _ v:expression() { (k, v) }

        rule number() -> Node
            = n:$(quiet!{
                ['0'..='9']+ ("." ['0'..='9']*)? exponent()?
                / "." ['0'..='9']+ exponent()?
            }) {? decimal_literal(n).map(Node::Number).ok_or("number literal") }
            / expected!("number")

        rule exponent()
            = ['e' | 'E'] ['+' | '-']? ['0'..='9']+

        rule string() -> Node
            = prefix:$(['f' | 'F' | 'r' | 'R']?) body:quoted() {? string_node(prefix, body) }

        rule quoted() -> &'input str
            = "\"" s:$((!['"' | '\\'] [_] / "\\" [_])*) "\"" { s }
            / "'" s:$((!['\'' | '\\'] [_] / "\\" [_])*) "'" { s }

        rule identifier() -> String
            = n:$(quiet!{['a'..='z' | 'A'..='Z' | '_'] ident_char()*}) { n.to_string() }
            / expected!("identifier")

        rule ident_char()
            = ['a'..='z' | 'A'..='Z' | '_' | '0'..='9']

        rule _() = quiet!{[' ' | '\t']*}
        rule gap() = quiet!{[' ' | '\t']+}
    }
);

/// Exact value of an integer or decimal literal such as `12`, `0.25` or
/// `1.5e-3`.
fn decimal_literal(text: &str) -> Option<Rational> {
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(i) => (&text[..i], text[i + 1..].parse::<i64>().ok()?),
        None => (text, 0),
    };
    if exponent.abs() > MAX_LITERAL_EXPONENT {
        return None;
    }
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = format!("{}{}", int_part, frac_part);
    let numer: BigInt = if digits.is_empty() {
        BigInt::from(0)
    } else {
        digits.parse().ok()?
    };
    let scale = exponent - frac_part.len() as i64;
    let ten = BigInt::from(10);
    let value = if scale >= 0 {
        Rational::from_integer(numer * Pow::pow(&ten, scale as u64))
    } else {
        Rational::new(numer, Pow::pow(&ten, (-scale) as u64))
    };
    Some(value)
}

fn string_node(prefix: &str, body: &str) -> Result<Node, &'static str> {
    match prefix {
        "r" | "R" => Ok(Node::Str(body.to_string())),
        "f" | "F" => fstring_parts(&unescape(body)).map(Node::FStr),
        _ => Ok(Node::Str(unescape(body))),
    }
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            // unknown escapes are kept verbatim
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Split an f-string body into literal text and `{expr[!conv][:spec]}` fields.
fn fstring_parts(body: &str) -> Result<Vec<FPart>, &'static str> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                text.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                text.push('}');
            }
            '}' => return Err("single '}' is not allowed in f-string"),
            '{' => {
                let mut field = String::new();
                let mut depth = 0usize;
                let mut quote: Option<char> = None;
                let mut closed = false;
                for c in chars.by_ref() {
                    match quote {
                        Some(q) if c == q => quote = None,
                        Some(_) => {}
                        None => match c {
                            '\'' | '"' => quote = Some(c),
                            '(' | '[' | '{' => depth += 1,
                            ')' | ']' => depth = depth.saturating_sub(1),
                            '}' if depth == 0 => {
                                closed = true;
                                break;
                            }
                            '}' => depth -= 1,
                            _ => {}
                        },
                    }
                    field.push(c);
                }
                if !closed {
                    return Err("f-string: expecting '}'");
                }
                if !text.is_empty() {
                    parts.push(FPart::Text(std::mem::take(&mut text)));
                }
                parts.push(fstring_field(&field)?);
            }
            other => text.push(other),
        }
    }
    if !text.is_empty() {
        parts.push(FPart::Text(text));
    }
    Ok(parts)
}

fn fstring_field(field: &str) -> Result<FPart, &'static str> {
    // top-level `:` starts the format spec and `!` a conversion
    let mut depth = 0usize;
    let mut end = field.len();
    let mut spec = None;
    for (i, c) in field.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => {
                end = end.min(i);
                spec = Some(field[i + 1..].to_string());
                break;
            }
            '!' if depth == 0 && !field[i + 1..].starts_with('=') => end = end.min(i),
            _ => {}
        }
    }
    let source = field[..end].trim();
    if source.is_empty() {
        return Err("f-string: empty expression not allowed");
    }
    let value = script::expression(source).map_err(|_| "f-string: invalid expression")?;
    Ok(FPart::Field { value, spec })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::rational;
    use pretty_assertions::assert_eq;

    fn name(n: &str) -> Node {
        Node::Name(n.to_string())
    }

    fn num(n: i64) -> Node {
        Node::Number(Rational::from_integer(n.into()))
    }

    #[test]
    fn test_precedence() {
        // -x**2 + 3*x
        let parsed = script::expression("-x**2 + 3*x").unwrap();
        let expected = Node::binary(
            BinOp::Add,
            Node::Unary(
                UnaryOp::Neg,
                Box::new(Node::binary(BinOp::Pow, name("x"), num(2))),
            ),
            Node::binary(BinOp::Mul, num(3), name("x")),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_power_is_right_associative() {
        let parsed = script::expression("2**3^x").unwrap();
        let expected = Node::binary(
            BinOp::Pow,
            num(2),
            Node::binary(BinOp::Pow, num(3), name("x")),
        );
        assert_eq!(parsed, expected);
        assert!(script::expression("2**-1").is_ok());
    }

    #[test]
    fn test_decimal_literals_are_exact() {
        assert_eq!(decimal_literal("0.25"), Some(rational(1, 4)));
        assert_eq!(decimal_literal("1.5e-3"), Some(rational(3, 2000)));
        assert_eq!(decimal_literal("2E2"), Some(rational(200, 1)));
        assert_eq!(decimal_literal(".5"), Some(rational(1, 2)));
    }

    #[test]
    fn test_calls_attributes_and_keywords() {
        let parsed = script::expression("sp.limit(f, x, 0, dir='+').doit()").unwrap();
        match parsed {
            Node::Call { func, args, kwargs } => {
                assert!(args.is_empty() && kwargs.is_empty());
                match *func {
                    Node::Attr(inner, method) => {
                        assert_eq!(method, "doit");
                        match *inner {
                            Node::Call { args, kwargs, .. } => {
                                assert_eq!(args.len(), 3);
                                assert_eq!(kwargs, vec![("dir".to_string(), Node::Str("+".to_string()))]);
                            }
                            other => panic!("unexpected {:?}", other),
                        }
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_statements() {
        assert_eq!(
            script::statement("import sympy as sp").unwrap(),
            Stmt::Import {
                module: "sympy".to_string(),
                alias: Some("sp".to_string())
            }
        );
        assert_eq!(
            script::statement("from sympy import *").unwrap(),
            Stmt::FromImportAll {
                module: "sympy".to_string()
            }
        );
        assert_eq!(
            script::statement("x, y = symbols('x y')").unwrap(),
            Stmt::Assign {
                targets: vec!["x".to_string(), "y".to_string()],
                value: Node::Call {
                    func: Box::new(name("symbols")),
                    args: vec![Node::Str("x y".to_string())],
                    kwargs: Vec::new(),
                }
            }
        );
        assert!(matches!(
            script::statement("total += 1").unwrap(),
            Stmt::AugAssign { op: BinOp::Add, .. }
        ));
        // a keyword prefix does not make an import
        assert!(matches!(
            script::statement("important = 1").unwrap(),
            Stmt::Assign { .. }
        ));
        assert!(matches!(
            script::statement("x == 1").unwrap(),
            Stmt::Expr(Node::Compare(CmpOp::Eq, _, _))
        ));
    }

    #[test]
    fn test_fstring() {
        let parsed = script::expression("f'value: {N(v):.3f} {{ok}}'").unwrap();
        match parsed {
            Node::FStr(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], FPart::Text("value: ".to_string()));
                assert!(matches!(&parts[1], FPart::Field { spec: Some(s), .. } if s == ".3f"));
                assert_eq!(parts[2], FPart::Text(" {ok}".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_syntax() {
        assert!(script::statement("x = (1 + ").is_err());
        assert!(script::statement("for i in range(3):").is_err());
        assert!(script::expression("2x").is_err());
    }
}
