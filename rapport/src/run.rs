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

use std::collections::HashMap;
use std::fs::{read_to_string, File};
use std::io::{stdout, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use thiserror::Error as ThisError;

use rapport::error::StderrReporter;
use rapport::expr::BasicEvaluator;
use rapport::layout::charsep::CharSepDriver;
use rapport::report::{ReportDef, RunSummary};
use rapport::source::{CsvSource, RowSource};
use rapport::value::Value;

/// Runs a report against a CSV data file and writes delimited text
/// output.
#[derive(Args, Clone, Debug)]
pub struct Run {
    /// Report definition file (JSON).
    report: PathBuf,

    /// Data file (CSV with a header line), sorted by the report's group
    /// columns.
    data: PathBuf,

    /// Output file [default: standard output].
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Field delimiter for the output.
    #[arg(long, short = 'd', default_value = "\t")]
    delimiter: char,

    /// Sets a report parameter.
    #[arg(long = "parameter", short = 'p', value_name = "NAME=VALUE",
          value_parser = parse_parameter)]
    parameters: Vec<(String, String)>,
}

#[derive(ThisError, Clone, Debug)]
#[error("{0}: expected NAME=VALUE")]
struct ParameterSyntaxError(String);

fn parse_parameter(arg: &str) -> Result<(String, String), ParameterSyntaxError> {
    match arg.split_once('=') {
        Some((name, value)) => Ok((name.trim().to_string(), value.to_string())),
        None => Err(ParameterSyntaxError(arg.to_string())),
    }
}

impl Run {
    pub fn run(self) -> Result<()> {
        let def = ReportDef::from_json(&read_to_string(&self.report)?)?;
        let mut source = CsvSource::open(&self.data)?;
        let report = def.resolve(&source.columns().to_vec())?;

        let parameters: HashMap<String, Value> = self
            .parameters
            .iter()
            .map(|(name, value)| (name.clone(), Value::parse(value)))
            .collect();

        let summary = match &self.output {
            Some(path) => self.execute(
                &report,
                &mut source,
                BufWriter::new(File::create(path)?),
                parameters,
            )?,
            None => self.execute(&report, &mut source, stdout().lock(), parameters)?,
        };
        eprintln!("{} rows, {} pages", summary.rows, summary.pages);
        Ok(())
    }

    fn execute<W: Write>(
        &self,
        report: &rapport::report::Report,
        source: &mut CsvSource<File>,
        out: W,
        parameters: HashMap<String, Value>,
    ) -> Result<RunSummary> {
        Ok(report.execute(
            source,
            CharSepDriver::new(out, self.delimiter),
            &mut BasicEvaluator,
            &mut StderrReporter,
            parameters,
        )?)
    }
}
