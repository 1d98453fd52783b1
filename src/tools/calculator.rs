//! Arithmetic evaluator over a fixed grammar: number literals, `+ - * / ^`,
//! parentheses, unary minus, the constants `pi` and `e`, and an allow-list
//! of math functions. There is no dynamic evaluation of any kind — input
//! outside the grammar is a [`CalcError`].

use crate::error::CalcError;

pub const TOOL_NAME: &str = "calculator";

/// Evaluate an arithmetic expression and render the result.
///
/// Integral results print without a fractional part ("7", not "7.0") so the
/// output reads like a calculator.
pub fn evaluate(expression: &str) -> Result<String, CalcError> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.parse_expression()?;
    parser.expect_end()?;
    Ok(format_number(value))
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ─── Tokenizer ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| CalcError::BadNumber(literal.clone()))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(CalcError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

// ─── Recursive-descent parser/evaluator ──────────────────
//
// expression := term (('+' | '-') term)*
// term       := unary (('*' | '/') unary)*
// unary      := '-' unary | power
// power      := atom ('^' unary)?          (right-associative)
// atom       := number | ident '(' expression ')' | ident | '(' expression ')'

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_end(&self) -> Result<(), CalcError> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(CalcError::UnexpectedToken(self.pos))
        }
    }

    fn parse_expression(&mut self) -> Result<f64, CalcError> {
        let mut value = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    value += self.parse_term()?;
                }
                Some(Token::Minus) => {
                    self.advance();
                    value -= self.parse_term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn parse_term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    value *= self.parse_unary()?;
                }
                Some(Token::Slash) => {
                    self.advance();
                    let divisor = self.parse_unary()?;
                    if divisor == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn parse_unary(&mut self) -> Result<f64, CalcError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            return Ok(-self.parse_unary()?);
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<f64, CalcError> {
        let base = self.parse_atom()?;
        if matches!(self.peek(), Some(Token::Caret)) {
            self.advance();
            // Right-associative: 2^3^2 is 2^(3^2).
            let exponent = self.parse_unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<f64, CalcError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Ident(name)) => self.parse_ident(&name),
            Some(Token::LParen) => {
                let value = self.parse_expression()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    Some(_) => Err(CalcError::UnexpectedToken(self.pos - 1)),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some(_) => Err(CalcError::UnexpectedToken(self.pos - 1)),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn parse_ident(&mut self, name: &str) -> Result<f64, CalcError> {
        // Constants first; they take no argument list.
        match name {
            "pi" => return Ok(std::f64::consts::PI),
            "e" => return Ok(std::f64::consts::E),
            _ => {}
        }

        let func = function_for(name)
            .ok_or_else(|| CalcError::UnknownIdentifier(name.to_string()))?;

        match self.advance() {
            Some(Token::LParen) => {}
            Some(_) => return Err(CalcError::UnexpectedToken(self.pos - 1)),
            None => return Err(CalcError::UnexpectedEnd),
        }
        let arg = self.parse_expression()?;
        match self.advance() {
            Some(Token::RParen) => Ok(func(arg)),
            Some(_) => Err(CalcError::UnexpectedToken(self.pos - 1)),
            None => Err(CalcError::UnexpectedEnd),
        }
    }
}

/// The fixed function allow-list.
fn function_for(name: &str) -> Option<fn(f64) -> f64> {
    Some(match name {
        "sqrt" => f64::sqrt,
        "abs" => f64::abs,
        "sin" => f64::sin,
        "cos" => f64::cos,
        "tan" => f64::tan,
        "ln" => f64::ln,
        "log" => f64::log10,
        "exp" => f64::exp,
        "floor" => f64::floor,
        "ceil" => f64::ceil,
        "round" => f64::round,
        _ => return None,
    })
}
