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

use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::NaiveDate;
use ordered_float::OrderedFloat;

/// A runtime datum: one cell of a data row, the result of a formula, or a
/// group's watched value.
///
/// Group change detection compares `Value`s for equality, so equality must
/// be total; `OrderedFloat` keeps NaN from poisoning the comparison.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Value {
    #[default]
    Empty,
    Bool(bool),
    Number(OrderedFloat<f64>),
    String(String),
    Date(NaiveDate),
}

impl Value {
    pub fn number(x: f64) -> Self {
        Self::Number(OrderedFloat(x))
    }

    /// Parses a raw cell from a character-separated source.  Numbers and
    /// ISO dates are recognized; anything else is a string.
    pub fn parse(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.is_empty() {
            Self::Empty
        } else if let Ok(x) = cell.parse::<f64>() {
            Self::number(x)
        } else if let Ok(date) = NaiveDate::parse_from_str(cell, "%Y-%m-%d") {
            Self::Date(date)
        } else {
            Self::String(cell.into())
        }
    }

    /// The numeric reading of this value, as the aggregate accumulator
    /// sees it.  Strings are parsed; anything unparseable counts as 0.
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Empty => 0.0,
            Self::Bool(b) => *b as u8 as f64,
            Self::Number(x) => x.0,
            Self::String(s) => s.trim().parse().unwrap_or(0.0),
            Self::Date(_) => 0.0,
        }
    }

    /// How a suppression predicate's result is read: `false`, zero, the
    /// empty value, and the empty string are all falsey.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Empty => false,
            Self::Bool(b) => *b,
            Self::Number(x) => x.0 != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Date(_) => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::Empty
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Empty => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(x) => {
                if x.0 == x.0.trunc() && x.0.abs() < 1e15 {
                    write!(f, "{}", x.0 as i64)
                } else {
                    write!(f, "{}", x.0)
                }
            }
            Self::String(s) => write!(f, "{s}"),
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::number(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}
