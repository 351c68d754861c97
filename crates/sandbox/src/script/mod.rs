//! Verification fragment parsing.
//!
//! Source text is first cut into logical lines: comments are dropped,
//! physical lines inside brackets or after a trailing backslash are joined,
//! and `;` separates statements. Each logical line is then parsed on its own
//! by the PEG grammar, keeping the physical line number for diagnostics.

pub mod ast;
mod grammar;

use crate::error::{SandboxError, SandboxResult};
use ast::{Node, Stmt};

/// Statement keywords that open an indented block.
const BLOCK_KEYWORDS: &[&str] = &[
    "for", "while", "if", "elif", "else", "def", "class", "with", "try", "except", "finally",
    "lambda", "return",
];

#[derive(Clone, Debug, PartialEq)]
pub struct LogicalLine {
    /// 1-based physical line the statement starts on
    pub line: usize,
    pub text: String,
}

/// Parse a whole fragment. Nothing runs when any line fails to parse.
pub fn parse_program(source: &str) -> SandboxResult<Vec<(usize, Stmt)>> {
    logical_lines(source)?
        .into_iter()
        .map(|l| parse_statement(&l).map(|stmt| (l.line, stmt)))
        .collect()
}

/// Parse a standalone expression, as `S("...")` and `sympify` need.
pub fn parse_expression(source: &str) -> SandboxResult<Node> {
    grammar::script::expression(source.trim()).map_err(|err| {
        SandboxError::syntax(
            1,
            format!(
                "invalid syntax at column {}, expected {}",
                err.location.column, err.expected
            ),
        )
    })
}

fn parse_statement(line: &LogicalLine) -> SandboxResult<Stmt> {
    if line.text.starts_with([' ', '\t']) {
        return Err(SandboxError::syntax(line.line, "unexpected indent"));
    }
    let first_word = line
        .text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default();
    if BLOCK_KEYWORDS.contains(&first_word) {
        return Err(SandboxError::syntax(
            line.line,
            format!("'{}' statements are not supported", first_word),
        ));
    }
    grammar::script::statement(&line.text).map_err(|err| {
        SandboxError::syntax(
            line.line,
            format!(
                "invalid syntax at column {}, expected {}",
                err.location.column, err.expected
            ),
        )
    })
}

/// Split source into logical lines, after removing the indentation common
/// to every non-blank line.
pub fn logical_lines(source: &str) -> SandboxResult<Vec<LogicalLine>> {
    let source = dedent(source);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut start_line = 1;
    let mut line = 1;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            match c {
                '\\' => {
                    current.push(c);
                    if let Some(next) = chars.next() {
                        if next == '\n' {
                            line += 1;
                        }
                        current.push(next);
                    }
                }
                '\n' => {
                    return Err(SandboxError::syntax(
                        line,
                        "EOL while scanning string literal",
                    ))
                }
                _ => {
                    if c == q {
                        quote = None;
                    }
                    current.push(c);
                }
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '#' => {
                while chars.peek().map_or(false, |&n| n != '\n') {
                    chars.next();
                }
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                if depth == 0 {
                    return Err(SandboxError::syntax(line, format!("unmatched '{}'", c)));
                }
                depth -= 1;
                current.push(c);
            }
            '\\' if chars.peek() == Some(&'\n') => {
                chars.next();
                line += 1;
                current.push(' ');
            }
            '\n' => {
                line += 1;
                if depth > 0 {
                    current.push(' ');
                } else {
                    flush(&mut current, start_line, &mut lines);
                    start_line = line;
                }
            }
            ';' if depth == 0 => {
                flush(&mut current, start_line, &mut lines);
                // the next statement continues on the same physical line
                while chars.peek().map_or(false, |&n| n == ' ' || n == '\t') {
                    chars.next();
                }
                start_line = line;
            }
            '\r' => {}
            _ => current.push(c),
        }
    }

    if quote.is_some() {
        return Err(SandboxError::syntax(line, "EOL while scanning string literal"));
    }
    if depth > 0 {
        return Err(SandboxError::syntax(
            start_line,
            "unexpected EOF while parsing",
        ));
    }
    flush(&mut current, start_line, &mut lines);
    Ok(lines)
}

fn flush(current: &mut String, start_line: usize, lines: &mut Vec<LogicalLine>) {
    let text = current.trim_end().to_string();
    if !text.trim().is_empty() {
        lines.push(LogicalLine {
            line: start_line,
            text,
        });
    }
    current.clear();
}

fn dedent(source: &str) -> String {
    let indent = source
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    if indent == 0 {
        return source.to_string();
    }
    source
        .lines()
        .map(|l| if l.len() >= indent { &l[indent..] } else { l.trim_start() })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(source: &str) -> Vec<(usize, String)> {
        logical_lines(source)
            .unwrap()
            .into_iter()
            .map(|l| (l.line, l.text))
            .collect()
    }

    #[test]
    fn test_comments_and_separators() {
        let source = "import sympy as sp  # engine\nx = sp.Symbol('x'); y = x**2\n\nprint('#not a comment')";
        assert_eq!(
            texts(source),
            vec![
                (1, "import sympy as sp".to_string()),
                (2, "x = sp.Symbol('x')".to_string()),
                (2, "y = x**2".to_string()),
                (4, "print('#not a comment')".to_string()),
            ]
        );
    }

    #[test]
    fn test_bracket_and_backslash_continuation() {
        let source = "f = (x +\n     1)\ng = x + \\\n    2\nh = 3";
        assert_eq!(
            texts(source),
            vec![
                (1, "f = (x +      1)".to_string()),
                (3, "g = x +      2".to_string()),
                (5, "h = 3".to_string()),
            ]
        );
    }

    #[test]
    fn test_common_indent_is_removed() {
        let source = "    x = 1\n    y = 2";
        assert_eq!(
            texts(source),
            vec![(1, "x = 1".to_string()), (2, "y = 2".to_string())]
        );
    }

    #[test]
    fn test_syntax_errors_carry_line_numbers() {
        assert_eq!(
            parse_program("x = 1\ny = (x + 2").unwrap_err(),
            SandboxError::syntax(2, "unexpected EOF while parsing")
        );
        assert!(matches!(
            parse_program("x = 1\nprint('open)").unwrap_err(),
            SandboxError::Syntax { line: 2, .. }
        ));
        assert!(matches!(
            parse_program("x = 1\n  y = 2\nz = 3").unwrap_err(),
            SandboxError::Syntax { line: 2, .. }
        ));
        assert!(matches!(
            parse_program("for i in range(3):\n    print(i)").unwrap_err(),
            SandboxError::Syntax { line: 1, .. }
        ));
        assert!(matches!(
            parse_program("x = = 2").unwrap_err(),
            SandboxError::Syntax { line: 1, .. }
        ));
    }

    #[test]
    fn test_parse_program() {
        let program = parse_program("from sympy import symbols, diff\nx = symbols('x')\nprint(diff(x**2, x))")
            .unwrap();
        assert_eq!(program.len(), 3);
        assert_eq!(program[2].0, 3);
    }
}
