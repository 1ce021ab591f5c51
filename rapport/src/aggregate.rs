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

use enum_iterator::Sequence;
use serde::Deserialize;

/// A reduction applied to the values accumulated since the last group
/// boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Sequence)]
#[serde(rename_all = "lowercase")]
pub enum Summary {
    /// `subtotal` is the historical name for `sum` and is still accepted
    /// in definitions.
    #[serde(alias = "subtotal")]
    Sum,
    Min,
    Max,
    Count,
    Average,
    StdDev,
}

impl Summary {
    /// Every function name, for diagnostics and tooling.
    pub fn names() -> impl Iterator<Item = &'static str> {
        enum_iterator::all::<Summary>().map(|function| function.as_str())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Summary::Sum => "sum",
            Summary::Min => "min",
            Summary::Max => "max",
            Summary::Count => "count",
            Summary::Average => "average",
            Summary::StdDev => "stddev",
        }
    }

    /// Reduces `values`.  `Min` and `Max` have no meaningful result for
    /// an empty accumulator and return `None`; every other function is
    /// total, with 0 for empty input (and for fewer than two values, for
    /// the sample standard deviation).
    pub fn compute(&self, values: &[f64]) -> Option<f64> {
        match self {
            Summary::Sum => Some(values.iter().sum()),
            Summary::Min => values.iter().copied().reduce(f64::min),
            Summary::Max => values.iter().copied().reduce(f64::max),
            Summary::Count => Some(values.len() as f64),
            Summary::Average => {
                if values.is_empty() {
                    Some(0.0)
                } else {
                    Some(values.iter().sum::<f64>() / values.len() as f64)
                }
            }
            Summary::StdDev => {
                let n = values.len();
                if n < 2 {
                    return Some(0.0);
                }
                let mean = values.iter().sum::<f64>() / n as f64;
                let sum_of_squares: f64 =
                    values.iter().map(|x| (x - mean) * (x - mean)).sum();
                Some((sum_of_squares / (n - 1) as f64).sqrt())
            }
        }
    }
}

/// The accumulator behind one aggregate field, reset at group boundaries.
/// Storage grows as values arrive; the displayed value is always the
/// reduction over everything accumulated so far, so a partial aggregate
/// shown before the group footer is meaningful.
#[derive(Debug, Default)]
pub struct AggregateState {
    values: Vec<f64>,
    started: bool,
}

impl AggregateState {
    /// Clears all state.  Called once at the beginning of each run.
    pub fn initialize(&mut self) {
        self.values.clear();
        self.started = false;
    }

    /// Appends the observed field's value for the current row, first
    /// clearing the accumulator if this is the first row of the run or
    /// the owning group started a new value.
    pub fn update(&mut self, value: f64, group_is_new: bool) {
        if !self.started || group_is_new {
            self.values.clear();
            self.started = true;
        }
        self.values.push(value);
    }

    pub fn value(&self, function: Summary) -> Option<f64> {
        function.compute(&self.values)
    }
}
