//! Arithmetic expression evaluation for `/calc`.
//!
//! The allow-list gate runs before the parser and is a hard precondition:
//! any character outside digits, `+ - * / ( ) .` and whitespace rejects the
//! whole expression without evaluating anything.

use std::sync::OnceLock;

use regex::Regex;

/// Characters permitted in a calc expression.
pub fn is_allowed(expr: &str) -> bool {
    static ALLOWED: OnceLock<Regex> = OnceLock::new();
    ALLOWED
        .get_or_init(|| Regex::new(r"^[0-9+\-*/().\s]+$").unwrap())
        .is_match(expr)
}

/// Malformed expression (unbalanced parens, dangling operator, empty input).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid expression")]
pub struct InvalidExpression;

/// Evaluate an expression that already passed `is_allowed`.
///
/// Standard precedence: `*` and `/` bind tighter than `+` and `-`;
/// unary minus is supported. Division by zero follows IEEE 754.
pub fn evaluate(expr: &str) -> Result<f64, InvalidExpression> {
    let mut parser = Parser::new(expr);
    let value = parser.expression()?;
    parser.skip_whitespace();
    if parser.pos < parser.input.len() {
        return Err(InvalidExpression);
    }
    Ok(value)
}

/// Recursive-descent parser over the byte slice.
struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(expr: &'a str) -> Self {
        Self {
            input: expr.as_bytes(),
            pos: 0,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.input.get(self.pos).copied()
    }

    fn expression(&mut self) -> Result<f64, InvalidExpression> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                b'+' => {
                    self.pos += 1;
                    value += self.term()?;
                }
                b'-' => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, InvalidExpression> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                b'*' => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                b'/' => {
                    self.pos += 1;
                    value /= self.factor()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, InvalidExpression> {
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some(b'+') => {
                self.pos += 1;
                self.factor()
            }
            Some(b'(') => {
                self.pos += 1;
                let value = self.expression()?;
                if self.peek() != Some(b')') {
                    return Err(InvalidExpression);
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.number(),
            _ => Err(InvalidExpression),
        }
    }

    fn number(&mut self) -> Result<f64, InvalidExpression> {
        self.skip_whitespace();
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(&c) = self.input.get(self.pos) {
            match c {
                b'0'..=b'9' => self.pos += 1,
                b'.' if !seen_dot => {
                    seen_dot = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| InvalidExpression)?;
        text.parse::<f64>().map_err(|_| InvalidExpression)
    }
}

/// Render a result the way the original bot printed it: integers stay
/// integers, everything else uses the default float formatting.
pub fn format_result(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_accepts_arithmetic() {
        assert!(is_allowed("2+2*3"));
        assert!(is_allowed(" (1.5 - 2) / 4 "));
    }

    #[test]
    fn allow_list_rejects_letters_and_symbols() {
        assert!(!is_allowed("2+system"));
        assert!(!is_allowed("1;2"));
        assert!(!is_allowed("2^3"));
        assert!(!is_allowed("0x10"));
        assert!(!is_allowed(""));
    }

    #[test]
    fn precedence_and_parens() {
        assert_eq!(evaluate("2+2*3").unwrap(), 8.0);
        assert_eq!(evaluate("(2+2)*3").unwrap(), 12.0);
        assert_eq!(evaluate("10 - 4 / 2").unwrap(), 8.0);
    }

    #[test]
    fn unary_minus() {
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
        assert_eq!(evaluate("2 * -3").unwrap(), -6.0);
        assert_eq!(evaluate("--4").unwrap(), 4.0);
    }

    #[test]
    fn decimals() {
        assert_eq!(evaluate("1.5 * 2").unwrap(), 3.0);
        assert_eq!(evaluate(".5 + .5").unwrap(), 1.0);
    }

    #[test]
    fn malformed_expressions_rejected() {
        assert!(evaluate("").is_err());
        assert!(evaluate("2+").is_err());
        assert!(evaluate("(2+3").is_err());
        assert!(evaluate("2 3").is_err());
        assert!(evaluate("*4").is_err());
        assert!(evaluate("()").is_err());
    }

    #[test]
    fn division_by_zero_is_infinite() {
        assert!(evaluate("1/0").unwrap().is_infinite());
    }

    #[test]
    fn result_formatting() {
        assert_eq!(format_result(4.0), "4");
        assert_eq!(format_result(1.5), "1.5");
        assert_eq!(format_result(-2.0), "-2");
    }
}
