// Rapport - a banded report generator.
// Copyright (C) 2025 Free Software Foundation, Inc.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

use std::cmp::Ordering;
use std::collections::HashMap;

use indexmap::IndexMap;
use thiserror::Error as ThisError;

use crate::value::Value;

#[derive(ThisError, Clone, Debug, PartialEq, Eq)]
pub enum ExprError {
    #[error("syntax error at offset {offset} in {expr:?}")]
    Syntax { expr: String, offset: usize },

    #[error("unknown column {0:?}")]
    UnknownColumn(String),

    #[error("unknown parameter {0:?}")]
    UnknownParameter(String),

    #[error("division by zero in {0:?}")]
    DivideByZero(String),
}

/// What an expression may read: the current row (by column name), and the
/// run's parameters.
pub struct EvalContext<'a> {
    pub row: &'a [Value],
    pub columns: &'a IndexMap<String, usize>,
    pub parameters: &'a HashMap<String, Value>,
}

/// The formula engine the report engine calls into.  Field formulas and
/// suppression predicates are strings in whatever language the evaluator
/// implements; the layout engine only needs a value back (or an error,
/// which it propagates to the run driver).
pub trait Evaluator {
    fn eval(&mut self, expr: &str, ctx: &EvalContext) -> Result<Value, ExprError>;
}

/// A small built-in evaluator: `{column}` and `{?parameter}` references,
/// number/string/bool literals, arithmetic, comparisons, `and`/`or`.
/// Enough for the CLI and the test suite; embedders with a real scripting
/// engine implement [Evaluator] over it instead.
#[derive(Default)]
pub struct BasicEvaluator;

impl Evaluator for BasicEvaluator {
    fn eval(&mut self, expr: &str, ctx: &EvalContext) -> Result<Value, ExprError> {
        let mut parser = Parser {
            expr,
            pos: 0,
            ctx,
        };
        let value = parser.or_expr()?;
        parser.skip_ws();
        if parser.pos != expr.len() {
            return Err(parser.syntax_error());
        }
        Ok(value)
    }
}

struct Parser<'a> {
    expr: &'a str,
    pos: usize,
    ctx: &'a EvalContext<'a>,
}

impl Parser<'_> {
    fn syntax_error(&self) -> ExprError {
        ExprError::Syntax {
            expr: self.expr.into(),
            offset: self.pos,
        }
    }

    fn rest(&self) -> &str {
        &self.expr[self.pos..]
    }

    fn skip_ws(&mut self) {
        self.pos += self
            .rest()
            .find(|c: char| !c.is_whitespace())
            .unwrap_or(self.rest().len());
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_ws();
        let rest = self.rest();
        if rest.starts_with(keyword)
            && !rest[keyword.len()..]
                .starts_with(|c: char| c.is_alphanumeric() || c == '_')
        {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn or_expr(&mut self) -> Result<Value, ExprError> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = Value::Bool(left.is_truthy() || right.is_truthy());
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Value, ExprError> {
        let mut left = self.comparison()?;
        while self.eat_keyword("and") {
            let right = self.comparison()?;
            left = Value::Bool(left.is_truthy() && right.is_truthy());
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Value, ExprError> {
        let left = self.additive()?;
        for (token, test) in [
            ("==", [false, true, false]),
            ("!=", [true, false, true]),
            ("<=", [true, true, false]),
            (">=", [false, true, true]),
            ("<", [true, false, false]),
            (">", [false, false, true]),
        ] {
            if self.eat(token) {
                let right = self.additive()?;
                let ordering = compare(&left, &right);
                let index = match ordering {
                    Ordering::Less => 0,
                    Ordering::Equal => 1,
                    Ordering::Greater => 2,
                };
                return Ok(Value::Bool(test[index]));
            }
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Value, ExprError> {
        let mut left = self.multiplicative()?;
        loop {
            if self.eat("+") {
                let right = self.multiplicative()?;
                left = match (&left, &right) {
                    (Value::String(_), _) | (_, Value::String(_)) => {
                        Value::String(format!("{left}{right}"))
                    }
                    _ => Value::number(left.as_number() + right.as_number()),
                };
            } else if self.eat("-") {
                let right = self.multiplicative()?;
                left = Value::number(left.as_number() - right.as_number());
            } else {
                return Ok(left);
            }
        }
    }

    fn multiplicative(&mut self) -> Result<Value, ExprError> {
        let mut left = self.unary()?;
        loop {
            if self.eat("*") {
                let right = self.unary()?;
                left = Value::number(left.as_number() * right.as_number());
            } else if self.eat("/") {
                let right = self.unary()?;
                if right.as_number() == 0.0 {
                    return Err(ExprError::DivideByZero(self.expr.into()));
                }
                left = Value::number(left.as_number() / right.as_number());
            } else {
                return Ok(left);
            }
        }
    }

    fn unary(&mut self) -> Result<Value, ExprError> {
        if self.eat("-") {
            Ok(Value::number(-self.unary()?.as_number()))
        } else if self.eat_keyword("not") {
            Ok(Value::Bool(!self.unary()?.is_truthy()))
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> Result<Value, ExprError> {
        self.skip_ws();
        if self.eat("(") {
            let value = self.or_expr()?;
            if !self.eat(")") {
                return Err(self.syntax_error());
            }
            return Ok(value);
        }
        if self.eat("{") {
            return self.reference();
        }
        if let Some(quote) = ['\'', '"'].into_iter().find(|&q| self.rest().starts_with(q)) {
            self.pos += 1;
            let Some(len) = self.rest().find(quote) else {
                return Err(self.syntax_error());
            };
            let s = self.rest()[..len].to_string();
            self.pos += len + 1;
            return Ok(Value::String(s));
        }
        if self.eat_keyword("true") {
            return Ok(Value::Bool(true));
        }
        if self.eat_keyword("false") {
            return Ok(Value::Bool(false));
        }
        self.number()
    }

    /// `{name}` is a column reference, `{?name}` a parameter reference.
    fn reference(&mut self) -> Result<Value, ExprError> {
        let parameter = self.eat("?");
        let Some(len) = self.rest().find('}') else {
            return Err(self.syntax_error());
        };
        let name = self.rest()[..len].trim().to_string();
        self.pos += len + 1;
        if parameter {
            match self.ctx.parameters.get(&name) {
                Some(value) => Ok(value.clone()),
                None => Err(ExprError::UnknownParameter(name)),
            }
        } else {
            match self.ctx.columns.get(&name) {
                Some(&index) => Ok(self.ctx.row.get(index).cloned().unwrap_or_default()),
                None => Err(ExprError::UnknownColumn(name)),
            }
        }
    }

    fn number(&mut self) -> Result<Value, ExprError> {
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(self.rest().len());
        let Ok(x) = self.rest()[..len].parse::<f64>() else {
            return Err(self.syntax_error());
        };
        self.pos += len;
        Ok(Value::number(x))
    }
}

/// Total comparison: numbers numerically, everything else by display
/// form.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}
