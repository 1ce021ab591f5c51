/* Rapport - a banded report generator.
 * Copyright (C) 2025 Free Software Foundation, Inc.
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>. */

use std::fs::read_to_string;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use itertools::Itertools;

use rapport::aggregate::Summary;
use rapport::report::ReportDef;
use rapport::source::{CsvSource, RowSource};

/// Loads a report definition, resolves it, and prints a summary.
///
/// Without a data file only the definition itself is checked; with one,
/// every column, field, and group reference is bound exactly as `run`
/// would bind it, so reference errors surface here instead of at render
/// time.
#[derive(Args, Clone, Debug)]
pub struct Check {
    /// Report definition file (JSON).
    report: PathBuf,

    /// Data file whose columns the definition should bind against.
    data: Option<PathBuf>,
}

impl Check {
    pub fn run(self) -> Result<()> {
        let def = ReportDef::from_json(&read_to_string(&self.report)?)?;

        let Some(data) = &self.data else {
            println!("{}: definition parses", self.report.display());
            println!("  groups: {}", def.groups.len());
            println!("  detail sections: {}", def.details.len());
            return Ok(());
        };

        let source = CsvSource::open(data)?;
        let report = def.resolve(&source.columns().to_vec())?;

        println!("{}: resolves against {}", self.report.display(), data.display());
        if !report.title.is_empty() {
            println!("  title: {}", report.title);
        }
        println!("  columns: {}", report.columns.keys().join(", "));
        println!("  fields: {}", report.fields.len());
        println!("  groups: {}", report.groups.len());
        println!(
            "  aggregate fields: {} (functions: {})",
            report.aggregate_fields().len(),
            Summary::names().join(", ")
        );
        Ok(())
    }
}
