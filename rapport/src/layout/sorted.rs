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

use std::collections::HashMap;

use crate::field::{Field, FieldIndex};
use crate::section::Section;

/// Reading-order field emission: top to bottom, then left to right.
///
/// The order is computed once per section and kept for the lifetime of
/// the engine — positions cannot change during a run — and a new engine
/// (hence a new run) starts empty, so edits between runs are picked up.
#[derive(Default)]
pub struct FieldOrder {
    cache: HashMap<usize, Vec<FieldIndex>>,
}

impl FieldOrder {
    /// The section's field indices sorted by `y`, then `x`.  The sort is
    /// stable, so coincident fields keep their definition order and the
    /// result is deterministic regardless of how the fields were
    /// inserted.
    pub fn ordered(&mut self, section: &Section, fields: &[Field]) -> &[FieldIndex] {
        self.cache.entry(section.key).or_insert_with(|| {
            let mut order = section.fields.clone();
            order.sort_by(|&a, &b| {
                let (a, b) = (&fields[a].bounds, &fields[b].bounds);
                a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
            });
            order
        })
    }
}
