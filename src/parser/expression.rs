//! Expression grammar, lowest precedence first:
//!
//! ```text
//! expression     := relational (("&&" | "and" | "||" | "or") expression)?
//! relational     := simple (relop relational | "in" simple)?
//! simple         := ("-" | "+")? ("!" | "not")? term (("+" | "-") term)*
//! term           := power ("*" power)*
//! power          := factor ("^" power)?
//! factor         := "(" expression ")"
//!                 | ("-" | "+" | "!" | "not") factor
//!                 | operand ("|" identifier (":" operand)?)*
//! operand        := literal | identifier ("." (identifier | integer))*
//! ```
//!
//! Levels without a right-hand side collapse into their left operand.

use super::Parser;
use crate::ast::{BinaryOp, Expr, FilterCall, PathPart, UnaryOp, Variable};
use crate::error::Result;
use crate::lexer::{Token, TokenKind};
use crate::value::Value;

const RELATIONAL_OPERATORS: &[&str] = &["==", "!=", "<>", "<", "<=", ">", ">="];

impl<'a> Parser<'a> {
    /// Parse an expression starting at the cursor
    pub fn parse_expression(&mut self) -> Result<Expr> {
        let left = self.parse_relational()?;

        let op = self
            .match_one(TokenKind::Symbol, &["&&", "||"])
            .or_else(|| self.match_one(TokenKind::Keyword, &["and", "or"]));

        match op {
            Some(token) => {
                let right = self.parse_expression()?;
                self.binary(left, token, right)
            }
            None => Ok(left),
        }
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let left = self.parse_simple()?;

        if let Some(token) = self.match_one(TokenKind::Symbol, RELATIONAL_OPERATORS) {
            let right = self.parse_relational()?;
            return self.binary(left, token, right);
        }

        if let Some(token) = self.match_keyword("in") {
            let right = self.parse_simple()?;
            return self.binary(left, token, right);
        }

        Ok(left)
    }

    fn parse_simple(&mut self) -> Result<Expr> {
        let sign = self.match_one(TokenKind::Symbol, &["-", "+"]);
        let negate = self.match_symbol("!").or_else(|| self.match_keyword("not"));

        let mut expr = self.parse_term()?;

        // Flags bind to the first term only: logical negation first, then the sign
        if negate.is_some() {
            expr = unary(UnaryOp::Not, expr);
        }
        if let Some(sign) = sign {
            expr = unary(sign_op(sign), expr);
        }

        while let Some(token) = self.match_one(TokenKind::Symbol, &["+", "-"]) {
            let right = self.parse_term()?;
            expr = self.binary(expr, token, right)?;
        }

        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut expr = self.parse_power()?;

        loop {
            if let Some(token) = self.match_symbol("*") {
                let right = self.parse_power()?;
                expr = self.binary(expr, token, right)?;
            } else if let Some(token) = self.peek(TokenKind::Symbol, "/") {
                return Err(self.error_at(token, "operator '/' is not supported"));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_factor()?;

        match self.match_symbol("^") {
            Some(token) => {
                let exponent = self.parse_power()?;
                self.binary(base, token, exponent)
            }
            None => Ok(base),
        }
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        if self.match_symbol("(").is_some() {
            let expr = self.parse_expression()?;
            if self.match_symbol(")").is_none() {
                return Err(self.error("Closing bracket expected after expression"));
            }
            return Ok(expr);
        }

        if let Some(token) = self.match_one(TokenKind::Symbol, &["-", "+"]) {
            let operand = self.parse_factor()?;
            return Ok(unary(sign_op(token), operand));
        }

        if self.match_symbol("!").is_some() || self.match_keyword("not").is_some() {
            let operand = self.parse_factor()?;
            return Ok(unary(UnaryOp::Not, operand));
        }

        let base = self.parse_operand()?;

        let mut filters = Vec::new();
        while self.match_symbol("|").is_some() {
            let name = self
                .match_type(TokenKind::Identifier)
                .ok_or_else(|| self.error("Filter name must be an identifier"))?;

            let arg = if self.match_symbol(":").is_some() {
                Some(self.parse_operand()?)
            } else {
                None
            };

            filters.push(FilterCall {
                name: name.value.clone(),
                token: name.clone(),
                arg,
            });
        }

        if filters.is_empty() {
            Ok(base)
        } else {
            Ok(Expr::Filtered {
                base: Box::new(base),
                filters,
            })
        }
    }

    /// A literal or a variable path
    fn parse_operand(&mut self) -> Result<Expr> {
        let token = match self.current() {
            Some(token) => token,
            None => return Err(self.error("Unexpected end of expression")),
        };

        match token.kind {
            TokenKind::Number => {
                self.consume();
                parse_number(token).ok_or_else(|| {
                    self.error_at(token, format!("Invalid number '{}'", token.value))
                })
            }
            TokenKind::String => {
                self.consume();
                Ok(Expr::Literal(Value::String(token.value.clone())))
            }
            TokenKind::Keyword => {
                let value = match token.value.as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    "nil" | "none" => Value::Nil,
                    other => {
                        return Err(self.error_at(token, format!("Unexpected keyword '{}'", other)))
                    }
                };
                self.consume();
                Ok(Expr::Literal(value))
            }
            TokenKind::Identifier => {
                self.consume();
                self.parse_variable(token)
            }
            _ => Err(self.error_at(
                token,
                format!(
                    "Expected a number, string, keyword or identifier, found '{}'",
                    token.value
                ),
            )),
        }
    }

    fn parse_variable(&mut self, first: &'a Token) -> Result<Expr> {
        let mut parts = vec![PathPart::Key(first.value.clone())];

        while self.match_symbol(".").is_some() {
            let part = match self.current() {
                Some(token) => token,
                None => return Err(self.error("Variable part expected after '.'")),
            };

            match part.kind {
                TokenKind::Identifier => parts.push(PathPart::Key(part.value.clone())),
                // `list.0.1` lexes the trailing indexes as one float
                TokenKind::Number => {
                    for digits in part.value.split('.') {
                        let index = digits.parse::<usize>().map_err(|_| {
                            self.error_at(part, format!("Invalid index '{}'", part.value))
                        })?;
                        parts.push(PathPart::Index(index));
                    }
                }
                _ => {
                    return Err(self.error_at(
                        part,
                        "Expected an identifier or number after '.'",
                    ))
                }
            }
            self.consume();
        }

        Ok(Expr::Variable(Variable {
            token: first.clone(),
            parts,
        }))
    }

    fn binary(&self, left: Expr, token: &Token, right: Expr) -> Result<Expr> {
        let op = BinaryOp::from_token(token)
            .ok_or_else(|| self.error_at(token, format!("Unknown operator '{}'", token.value)))?;
        Ok(Expr::Binary {
            left: Box::new(left),
            op,
            token: token.clone(),
            right: Box::new(right),
        })
    }
}

fn parse_number(token: &Token) -> Option<Expr> {
    let value = if token.value.contains('.') {
        Value::Float(token.value.parse::<f64>().ok()?)
    } else {
        Value::Integer(token.value.parse::<i64>().ok()?)
    };
    Some(Expr::Literal(value))
}

fn sign_op(token: &Token) -> UnaryOp {
    if token.value == "-" {
        UnaryOp::Negative
    } else {
        UnaryOp::Positive
    }
}

fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary {
        op,
        operand: Box::new(operand),
    }
}
