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

//! The report definition, its resolution into a runnable [Report], and the
//! run loop that pulls rows from a [RowSource] and drives the
//! [LayoutEngine].
//!
//! Definitions are loaded in two phases.  Deserialization produces a
//! [ReportDef], in which fields refer to one another by id and to data by
//! column name.  [ReportDef::resolve] then binds every reference to an
//! index — fields into one arena, columns into row positions — and
//! rejects anything dangling, so nothing is looked up by name while rows
//! are streaming.

use std::collections::{HashMap, HashSet};
use std::mem;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Deserialize;

use crate::aggregate::{AggregateState, Summary};
use crate::error::{Error, Reporter, Result};
use crate::expr::{EvalContext, Evaluator};
use crate::field::{Field, FieldIndex, FieldKind, IdAllocator, Rect, Special};
use crate::format::{Format, FormattedValueCache, FormatterCache};
use crate::group::{Group, GroupState, Selectable, SortOrder};
use crate::layout::driver::Driver;
use crate::layout::LayoutEngine;
use crate::paper::{Orientation, PageSetup, PaperSize};
use crate::section::{Line, Section, SectionArea, SectionRole, DEFAULT_SECTION_HEIGHT};
use crate::source::RowSource;
use crate::value::Value;

/// A report definition as read from a definition file, with by-name and
/// by-id references still unresolved.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReportDef {
    pub title: String,
    pub paper: PaperDef,

    /// Declared parameters with their default values.
    pub parameters: HashMap<String, serde_json::Value>,

    pub report_headers: Vec<SectionDef>,
    pub report_footers: Vec<SectionDef>,
    pub page_headers: Vec<SectionDef>,
    pub page_footers: Vec<SectionDef>,
    pub details: Vec<SectionDef>,

    /// Outermost group first.
    pub groups: Vec<GroupDef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PaperDef {
    pub size: PaperSize,
    pub orientation: Orientation,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SectionDef {
    pub height: f64,
    pub fields: Vec<FieldDef>,
    pub lines: Vec<Line>,
    pub suppress: Option<String>,
    pub hidden: bool,
    pub page_break: bool,
}

impl Default for SectionDef {
    fn default() -> Self {
        Self {
            height: DEFAULT_SECTION_HEIGHT,
            fields: Vec::new(),
            lines: Vec::new(),
            suppress: None,
            hidden: false,
            page_break: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FieldDef {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub kind: FieldKindDef,
    #[serde(default)]
    pub bounds: Rect,
    #[serde(default)]
    pub format: Format,
    #[serde(default = "default_true")]
    pub visible: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKindDef {
    Column(String),
    Text(String),
    Formula(String),
    Aggregate {
        function: Summary,
        /// Id of the field whose values are accumulated.  The field may
        /// be defined later in the file; resolution is what rejects
        /// dangling ids.
        field: u64,
        #[serde(default)]
        group: Option<usize>,
    },
    Special(Special),
    Parameter(String),
    Image(String),
}

#[derive(Debug, Deserialize)]
pub struct GroupDef {
    #[serde(flatten)]
    pub selectable: SelectableDef,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default)]
    pub headers: Vec<SectionDef>,
    #[serde(default)]
    pub footers: Vec<SectionDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectableDef {
    Column(String),
    Formula(String),
}

impl ReportDef {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Binds the definition against a data source's column list,
    /// producing a runnable report.  All reference errors surface here,
    /// not mid-run.
    pub fn resolve(self, columns: &[String]) -> Result<Report> {
        Resolver::new(columns, &self).resolve(self)
    }
}

/// A resolved report: one field arena, five fixed section areas, groups
/// outermost first.  Immutable for the duration of a run; all mutable
/// state lives in [RunState].
#[derive(Debug)]
pub struct Report {
    pub title: String,
    pub page_setup: PageSetup,
    pub fields: Vec<Field>,
    pub report_headers: SectionArea,
    pub report_footers: SectionArea,
    pub page_headers: SectionArea,
    pub page_footers: SectionArea,
    pub details: SectionArea,
    pub groups: Vec<Group>,
    pub columns: IndexMap<String, usize>,
    /// Declared parameters and their defaults.
    pub parameters: HashMap<String, Value>,
    aggregate_fields: Vec<FieldIndex>,
    aggregate_slots: usize,
}

impl Report {
    pub fn aggregate_fields(&self) -> &[FieldIndex] {
        &self.aggregate_fields
    }
}

struct Resolver {
    columns: IndexMap<String, usize>,
    declared_parameters: HashSet<String>,
    group_count: usize,
    fields: Vec<Field>,
    ids: IndexMap<u64, FieldIndex>,
    allocator: IdAllocator,
    /// Aggregates whose target id still needs to become an arena index:
    /// `(aggregate arena index, target id)`.
    pending: Vec<(FieldIndex, u64)>,
    next_section_key: usize,
    slots: usize,
}

impl Resolver {
    fn new(columns: &[String], def: &ReportDef) -> Self {
        Self {
            columns: columns
                .iter()
                .enumerate()
                .map(|(index, name)| (name.clone(), index))
                .collect(),
            declared_parameters: def.parameters.keys().cloned().collect(),
            group_count: def.groups.len(),
            fields: Vec::new(),
            ids: IndexMap::new(),
            allocator: IdAllocator::default(),
            pending: Vec::new(),
            next_section_key: 0,
            slots: 0,
        }
    }

    fn resolve(mut self, def: ReportDef) -> Result<Report> {
        let report_headers = self.area(SectionRole::ReportHeader, def.report_headers)?;
        let page_headers = self.area(SectionRole::PageHeader, def.page_headers)?;
        let details = self.area(SectionRole::Detail, def.details)?;
        let page_footers = self.area(SectionRole::PageFooter, def.page_footers)?;
        let report_footers = self.area(SectionRole::ReportFooter, def.report_footers)?;

        let mut groups = Vec::with_capacity(def.groups.len());
        for group_def in def.groups {
            let selectable = match group_def.selectable {
                SelectableDef::Column(name) => Selectable::Column {
                    index: self.column(&name)?,
                },
                SelectableDef::Formula(expr) => Selectable::Formula(expr),
            };
            let mut group = Group::new(selectable, group_def.sort);
            group.headers = self.area(SectionRole::GroupHeader, group_def.headers)?;
            group.footers = self.area(SectionRole::GroupFooter, group_def.footers)?;
            groups.push(group);
        }

        // Second phase: aggregate targets exist by now, or never will.
        for (index, target_id) in mem::take(&mut self.pending) {
            let Some(&target) = self.ids.get(&target_id) else {
                return Err(Error::UnknownField(self.fields[index].id, target_id));
            };
            if !self.fields[target].kind.can_be_aggregated() {
                return Err(Error::NotAggregatable(
                    self.fields[index].id,
                    self.fields[target].id,
                ));
            }
            match &mut self.fields[index].kind {
                FieldKind::Aggregate { target: t, .. } => *t = target,
                _ => unreachable!(),
            }
        }

        let aggregate_fields = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, field)| matches!(field.kind, FieldKind::Aggregate { .. }))
            .map(|(index, _)| index)
            .collect();

        let mut parameters = HashMap::new();
        for (name, default) in def.parameters {
            parameters.insert(name, json_value(default));
        }

        Ok(Report {
            title: def.title,
            page_setup: PageSetup::new(def.paper.size, def.paper.orientation),
            fields: self.fields,
            report_headers,
            report_footers,
            page_headers,
            page_footers,
            details,
            groups,
            columns: self.columns,
            parameters,
            aggregate_fields,
            aggregate_slots: self.slots,
        })
    }

    fn column(&self, name: &str) -> Result<usize> {
        match self.columns.get(name) {
            Some(&index) => Ok(index),
            None => Err(Error::UnknownColumn(name.into())),
        }
    }

    /// Converts one area's section list.  Header and footer areas always
    /// end up with at least one section, as in the designer.
    fn area(&mut self, role: SectionRole, defs: Vec<SectionDef>) -> Result<SectionArea> {
        let mut area = SectionArea::new(role);
        for def in defs {
            let section = self.section(def)?;
            area.push(section);
        }
        if area.is_empty() {
            area.push(Section::empty(self.section_key()));
        }
        Ok(area)
    }

    fn section_key(&mut self) -> usize {
        let key = self.next_section_key;
        self.next_section_key += 1;
        key
    }

    fn section(&mut self, def: SectionDef) -> Result<Section> {
        let mut fields = Vec::with_capacity(def.fields.len());
        for field_def in def.fields {
            fields.push(self.field(field_def)?);
        }
        Ok(Section {
            key: self.section_key(),
            min_height: def.height,
            fields,
            lines: def.lines,
            suppression: def.suppress,
            hidden: def.hidden,
            page_break: def.page_break,
        })
    }

    fn field(&mut self, def: FieldDef) -> Result<FieldIndex> {
        let id = match def.id {
            Some(id) => {
                if self.ids.contains_key(&id) {
                    return Err(Error::DuplicateField(id));
                }
                self.allocator.saw(id);
                id
            }
            None => self.allocator.allocate(),
        };

        if !def.format.date_format_is_valid() {
            return Err(Error::InvalidDateFormat(
                id,
                def.format.date.clone().unwrap_or_default(),
            ));
        }

        let kind = match def.kind {
            FieldKindDef::Column(name) => FieldKind::Column {
                index: self.column(&name)?,
            },
            FieldKindDef::Text(text) => FieldKind::Text(text),
            FieldKindDef::Formula(expr) => FieldKind::Formula(expr),
            FieldKindDef::Aggregate {
                function,
                field,
                group,
            } => {
                if let Some(group) = group {
                    if group >= self.group_count {
                        return Err(Error::UnknownGroup(id, group));
                    }
                }
                let slot = self.slots;
                self.slots += 1;
                // `target` is fixed up in the second phase.
                self.pending.push((self.fields.len(), field));
                FieldKind::Aggregate {
                    function,
                    target: FieldIndex::MAX,
                    group,
                    slot,
                }
            }
            FieldKindDef::Special(special) => FieldKind::Special(special),
            FieldKindDef::Parameter(name) => {
                if !self.declared_parameters.contains(&name) {
                    return Err(Error::UnknownParameter(name));
                }
                FieldKind::Parameter(name)
            }
            FieldKindDef::Image(path) => FieldKind::Image { path },
        };

        let index = self.fields.len();
        self.fields.push(Field {
            id,
            bounds: def.bounds,
            format: def.format,
            visible: def.visible,
            kind,
        });
        self.ids.insert(id, index);
        Ok(index)
    }
}

fn json_value(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Empty,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(x) => Value::number(x.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => Value::parse(&s),
        other => Value::String(other.to_string()),
    }
}

/// Per-run mutable state: the current and previous row, group change
/// tracking, aggregate accumulators, and the formatted-value caches.
/// Created at the start of each execution and discarded at the end.
pub struct RunState<'a> {
    report: &'a Report,
    evaluator: &'a mut dyn Evaluator,
    parameters: HashMap<String, Value>,
    row: Vec<Value>,
    previous_row: Vec<Value>,
    previous_active: bool,
    row_number: u64,
    page_number: u32,
    run_date: NaiveDate,
    groups: Vec<GroupState>,
    aggregates: Vec<AggregateState>,
    caches: Vec<FormattedValueCache>,
    formatters: FormatterCache,
    /// Formula results for the current row; cleared whenever the row
    /// context changes.
    formula_values: HashMap<FieldIndex, Value>,
}

impl<'a> RunState<'a> {
    pub fn new(
        report: &'a Report,
        evaluator: &'a mut dyn Evaluator,
        parameters: HashMap<String, Value>,
    ) -> Result<Self> {
        for name in parameters.keys() {
            if !report.parameters.contains_key(name) {
                return Err(Error::UnknownParameter(name.clone()));
            }
        }
        let mut merged = report.parameters.clone();
        merged.extend(parameters);

        let mut aggregates: Vec<AggregateState> = (0..report.aggregate_slots)
            .map(|_| AggregateState::default())
            .collect();
        for state in &mut aggregates {
            state.initialize();
        }

        Ok(Self {
            report,
            evaluator,
            parameters: merged,
            row: Vec::new(),
            previous_row: Vec::new(),
            previous_active: false,
            row_number: 0,
            page_number: 0,
            run_date: chrono::Local::now().date_naive(),
            groups: report.groups.iter().map(|_| GroupState::default()).collect(),
            aggregates,
            caches: report.fields.iter().map(|_| Default::default()).collect(),
            formatters: FormatterCache::default(),
            formula_values: HashMap::new(),
        })
    }

    /// Makes `row` the current row and the old current row the previous
    /// row.
    pub fn advance_row(&mut self, row: Vec<Value>) {
        self.previous_row = mem::replace(&mut self.row, row);
        self.previous_active = false;
        self.row_number += 1;
        self.formula_values.clear();
    }

    /// Switches the row context to the previous row so that group
    /// footers render against the data they summarize.  The streaming
    /// replacement for a cursor's `previous()`.
    pub fn use_previous_row(&mut self, active: bool) {
        self.previous_active = active;
        self.formula_values.clear();
    }

    fn effective_row(&self) -> &[Value] {
        if self.previous_active {
            &self.previous_row
        } else {
            &self.row
        }
    }

    pub fn row_number(&self) -> u64 {
        self.row_number
    }

    pub fn set_page_number(&mut self, page_number: u32) {
        self.page_number = page_number;
    }

    fn eval(&mut self, expr: &str) -> Result<Value> {
        let report = self.report;
        let Self {
            evaluator,
            row,
            previous_row,
            previous_active,
            parameters,
            ..
        } = self;
        let row: &[Value] = if *previous_active { previous_row } else { row };
        Ok(evaluator.eval(
            expr,
            &EvalContext {
                row,
                columns: &report.columns,
                parameters,
            },
        )?)
    }

    /// Refreshes every group's watched value from the current row.
    pub fn update_groups(&mut self) -> Result<()> {
        let report = self.report;
        for (index, group) in report.groups.iter().enumerate() {
            let value = match &group.selectable {
                Selectable::Column { index } => {
                    self.effective_row().get(*index).cloned().unwrap_or_default()
                }
                Selectable::Formula(expr) => self.eval(expr)?,
            };
            self.groups[index].update_value(value);
        }
        Ok(())
    }

    pub fn update_group_counters(&mut self) {
        for group in &mut self.groups {
            group.update_counter();
        }
    }

    /// Feeds every aggregate its observed field's value for this row.
    /// Runs after [Self::update_groups] so group boundaries reset the
    /// accumulators, including boundaries forced by an outer group's
    /// footer cascade.
    pub fn update_aggregates(&mut self) -> Result<()> {
        let report = self.report;
        for &index in report.aggregate_fields() {
            let (target, group, slot) = match &report.fields[index].kind {
                FieldKind::Aggregate {
                    target, group, slot, ..
                } => (*target, *group, *slot),
                _ => continue,
            };
            let value = self.field_value(target)?.as_number();
            let group_is_new = group.is_some_and(|g| self.groups[g].is_new_value());
            self.aggregates[slot].update(value, group_is_new);
        }
        Ok(())
    }

    pub fn group_is_new(&self, index: usize) -> bool {
        self.groups[index].is_new_value()
    }

    pub fn force_footer_output(&mut self, index: usize) {
        self.groups[index].force_footer_output();
    }

    pub fn group_record_count(&self, index: usize) -> u64 {
        self.groups[index].record_count()
    }

    /// The current value of one field.
    pub fn field_value(&mut self, index: FieldIndex) -> Result<Value> {
        let report = self.report;
        let field = &report.fields[index];
        Ok(match &field.kind {
            FieldKind::Column { index } => {
                self.effective_row().get(*index).cloned().unwrap_or_default()
            }
            FieldKind::Text(text) => Value::String(text.clone()),
            FieldKind::Formula(expr) => match self.formula_values.get(&index) {
                Some(value) => value.clone(),
                None => {
                    let value = self.eval(expr)?;
                    self.formula_values.insert(index, value.clone());
                    value
                }
            },
            FieldKind::Aggregate { function, slot, .. } => {
                match self.aggregates[*slot].value(*function) {
                    Some(x) => Value::number(x),
                    None => Value::Empty,
                }
            }
            FieldKind::Special(special) => match special {
                Special::PageNumber => Value::number(self.page_number as f64),
                Special::RowNumber => Value::number(self.row_number as f64),
                Special::RecordCount => match self.groups.last() {
                    Some(group) => Value::number(group.record_count() as f64),
                    None => Value::number(self.row_number as f64),
                },
                Special::ReportDate => Value::Date(self.run_date),
                Special::ReportTitle => Value::String(report.title.clone()),
            },
            FieldKind::Parameter(name) => {
                self.parameters.get(name).cloned().unwrap_or_default()
            }
            FieldKind::Image { path } => Value::String(path.clone()),
        })
    }

    /// The formatted display string for one field.
    pub fn field_display(&mut self, index: FieldIndex) -> Result<String> {
        let value = self.field_value(index)?;
        let report = self.report;
        let field = &report.fields[index];
        let Self {
            caches, formatters, ..
        } = self;
        Ok(caches[index]
            .formatted(&value, &field.format, &field.bounds, formatters)
            .to_string())
    }

    /// The vertical space one field needs for the current row.
    pub fn field_output_height(&mut self, index: FieldIndex) -> Result<f64> {
        let value = self.field_value(index)?;
        let report = self.report;
        let field = &report.fields[index];
        let Self {
            caches, formatters, ..
        } = self;
        Ok(caches[index].output_height(&value, &field.format, &field.bounds, formatters))
    }

    /// A section's output height for the current row: the designed
    /// minimum, or the bottom edge of its tallest field.  Field content
    /// varies per row, so this is never cached across rows.
    pub fn section_output_height(&mut self, section: &Section) -> Result<f64> {
        let mut height = section.min_height;
        for &index in &section.fields {
            let bottom = self.report.fields[index].bounds.y + self.field_output_height(index)?;
            if bottom > height {
                height = bottom;
            }
        }
        Ok(height)
    }

    /// Whether the section prints for the current row.
    pub fn section_visible(&mut self, section: &Section) -> Result<bool> {
        if section.hidden {
            return Ok(false);
        }
        match &section.suppression {
            None => Ok(true),
            Some(expr) => Ok(!self.eval(expr)?.is_truthy()),
        }
    }

    /// Forces evaluation of every formula field in the section, whether
    /// or not the section will be drawn.
    pub fn evaluate_formulas_in(&mut self, section: &Section) -> Result<()> {
        for &index in &section.fields {
            if matches!(self.report.fields[index].kind, FieldKind::Formula(_)) {
                self.field_value(index)?;
            }
        }
        Ok(())
    }
}

/// What a finished run reports back.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: u64,
    pub pages: u32,
}

impl Report {
    /// Runs the report: pulls every row from `source` and drives the
    /// layout engine through the
    /// footers → headers → detail sequence, with the last-row flush at
    /// end of data.
    ///
    /// Driver failures are reported through `reporter` and stop row
    /// processing without an `Err`; expression failures and source
    /// failures return `Err` after output has been released.
    pub fn execute<S, D>(
        &self,
        source: &mut S,
        driver: D,
        evaluator: &mut dyn Evaluator,
        reporter: &mut dyn Reporter,
        parameters: HashMap<String, Value>,
    ) -> Result<RunSummary>
    where
        S: RowSource + ?Sized,
        D: Driver,
    {
        let mut run = RunState::new(self, evaluator, parameters)?;
        let mut engine = LayoutEngine::new(self, driver, reporter);
        let result = run_rows(&mut run, &mut engine, source);
        if result.is_err() {
            engine.cancel();
        }
        source.close();
        result.map(|()| RunSummary {
            rows: run.row_number(),
            pages: engine.page_number(),
        })
    }
}

fn run_rows<S, D>(
    run: &mut RunState,
    engine: &mut LayoutEngine<D>,
    source: &mut S,
) -> Result<()>
where
    S: RowSource + ?Sized,
    D: Driver,
{
    // One row of lookahead tells us which row is the last; a source
    // failure is treated as end of data and surfaced after the report
    // has been closed out.
    let (mut pending, mut source_error) = match source.read_row() {
        Ok(row) => (row, None),
        Err(error) => (None, Some(error)),
    };

    engine.start(run)?;

    if pending.is_some() {
        let mut first = true;
        while let Some(row) = pending.take() {
            if !engine.wants_more_data() {
                break;
            }
            let next = match source_error {
                Some(_) => None,
                None => match source.read_row() {
                    Ok(row) => row,
                    Err(error) => {
                        source_error = Some(error);
                        None
                    }
                },
            };
            let is_last_row = next.is_none();

            run.advance_row(row);
            run.update_groups()?;

            // Footers summarize the rows before this one, so they render
            // against the previous row.
            if !first {
                run.use_previous_row(true);
                engine.group_footers(run, false)?;
                run.use_previous_row(false);
            }

            run.update_group_counters();
            run.update_aggregates()?;

            engine.group_headers(run, is_last_row)?;
            engine.detail(run, is_last_row)?;

            first = false;
            pending = next;
        }
        engine.group_footers(run, true)?;
    }

    engine.end(run)?;
    match source_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
