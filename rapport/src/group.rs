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

use serde::Deserialize;

use crate::section::{SectionArea, SectionRole};
use crate::value::Value;

/// The column or formula whose row-to-row changes define the group
/// boundary.  Columns are resolved to row positions at load time.
#[derive(Clone, Debug)]
pub enum Selectable {
    Column { index: usize },
    Formula(String),
}

/// The order the data source is expected to deliver the group's values
/// in.  The engine itself never sorts; this is carried so a query layer
/// can build an ORDER BY from the definition.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// One grouping level.  Groups are stored outermost first, and that
/// order is load-bearing: it drives header propagation and footer
/// nesting in the layout engine.
#[derive(Clone, Debug)]
pub struct Group {
    pub selectable: Selectable,
    pub sort: SortOrder,
    pub headers: SectionArea,
    pub footers: SectionArea,
}

impl Group {
    pub fn new(selectable: Selectable, sort: SortOrder) -> Self {
        Self {
            selectable,
            sort,
            headers: SectionArea::new(SectionRole::GroupHeader),
            footers: SectionArea::new(SectionRole::GroupFooter),
        }
    }
}

/// Per-run change tracking for one group.
#[derive(Debug)]
pub struct GroupState {
    value: Option<Value>,
    new_value: bool,
    first_value: bool,
    record_count: u64,
}

impl Default for GroupState {
    fn default() -> Self {
        Self {
            value: None,
            new_value: true,
            first_value: true,
            record_count: 1,
        }
    }
}

impl GroupState {
    /// Prepares the group for a run.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Compares the current row's watched value against the previous
    /// row's, by value equality.
    pub fn update_value(&mut self, value: Value) {
        match &self.value {
            None => {
                self.value = Some(value);
                self.first_value = true;
                self.new_value = true;
            }
            Some(previous) if *previous == value => {
                self.new_value = false;
                self.first_value = false;
            }
            Some(_) => {
                self.value = Some(value);
                self.new_value = true;
                self.first_value = false;
            }
        }
    }

    pub fn update_counter(&mut self) {
        if self.new_value {
            self.record_count = 1;
        } else {
            self.record_count += 1;
        }
    }

    /// True exactly once per distinct run of identical watched values.
    pub fn is_new_value(&self) -> bool {
        self.new_value
    }

    /// True while the first value ever seen in this run is current.
    pub fn is_first_value(&self) -> bool {
        self.first_value
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// The watched value for the current row; `None` before the first
    /// row arrives.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Makes the next footer emission fire even though this group's own
    /// value did not change.  Called when an outer group's change sweeps
    /// this one up in the footer cascade.
    pub fn force_footer_output(&mut self) {
        self.new_value = true;
    }
}
