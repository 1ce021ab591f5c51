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

//! Scenario tests: each drives a full report run against an in-memory
//! row source and asserts on the exact stream of events a capturing
//! driver saw.  The stream is what every real driver is built on, so
//! these pin down section ordering, page breaking, and the group
//! header/footer rules in one place.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Error as IoError, ErrorKind};
use std::rc::Rc;

use enum_map::{enum_map, EnumMap};
use serde_json::json;

use crate::error::{CollectingReporter, Result};
use crate::expr::{BasicEvaluator, EvalContext, Evaluator, ExprError};
use crate::field::{Field, FieldKind, Rect};
use crate::format::Format;
use crate::layout::driver::{DrawField, Driver};
use crate::layout::sorted::FieldOrder;
use crate::paper::Axis2;
use crate::report::{Report, ReportDef, RunSummary};
use crate::section::{Line, Section, SectionRole};
use crate::source::Rows;
use crate::value::Value;

/// Records every hook invocation as one line of text.
struct Capture {
    log: Rc<RefCell<Vec<String>>>,

    /// Fail `output_field` for this content, to exercise driver-failure
    /// handling.
    fail_on_field: Option<String>,
}

impl Capture {
    fn push(&self, event: impl Into<String>) {
        self.log.borrow_mut().push(event.into());
    }
}

impl Driver for Capture {
    fn name(&self) -> Cow<'static, str> {
        Cow::from("capture")
    }

    fn start(&mut self, _setup: &crate::paper::PageSetup) -> Result<()> {
        self.push("start");
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.push("end");
        Ok(())
    }

    fn start_page(&mut self, page_number: u32) -> Result<()> {
        self.push(format!("start-page {page_number}"));
        Ok(())
    }

    fn end_page(&mut self) -> Result<()> {
        self.push("end-page");
        Ok(())
    }

    fn output_field(&mut self, field: &DrawField) -> Result<()> {
        if self.fail_on_field.as_deref() == Some(field.content.as_str()) {
            return Err(IoError::new(ErrorKind::BrokenPipe, "capture failure").into());
        }
        self.push(format!("field {}", field.content));
        Ok(())
    }

    fn output_line(&mut self, _line: &Line) -> Result<()> {
        self.push("line");
        Ok(())
    }

    fn end_section(&mut self, role: SectionRole) -> Result<()> {
        self.push(format!("end-section {}", role.as_str()));
        Ok(())
    }

    fn flush(&mut self) {
        self.push("flush");
    }
}

/// An area definition that contributes nothing to any page.
fn quiet() -> serde_json::Value {
    json!([{"height": 0.0, "hidden": true}])
}

fn resolve(def: serde_json::Value, columns: &[&str], page_height: f64) -> Report {
    let def: ReportDef = serde_json::from_value(def).unwrap();
    let columns: Vec<String> = columns.iter().map(|s| s.to_string()).collect();
    let mut report = def.resolve(&columns).unwrap();
    report.page_setup.paper = enum_map! { Axis2::X => 500.0, Axis2::Y => page_height };
    report.page_setup.margins = EnumMap::from_fn(|_| [0.0; 2]);
    report
}

fn run_report(report: &Report, source: &mut Rows) -> (Vec<String>, RunSummary) {
    let (log, errors, summary) = run_with(report, source, None, &mut BasicEvaluator);
    assert_eq!(errors, Vec::<String>::new());
    (log, summary)
}

fn run_with(
    report: &Report,
    source: &mut Rows,
    fail_on_field: Option<&str>,
    evaluator: &mut dyn Evaluator,
) -> (Vec<String>, Vec<String>, RunSummary) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let driver = Capture {
        log: Rc::clone(&log),
        fail_on_field: fail_on_field.map(String::from),
    };
    let mut reporter = CollectingReporter::default();
    let summary = report
        .execute(source, driver, evaluator, &mut reporter, HashMap::new())
        .unwrap();
    (
        Rc::try_unwrap(log).unwrap().into_inner(),
        reporter.errors,
        summary,
    )
}

#[track_caller]
fn assert_events(actual: &[String], expected: &[&str]) {
    let actual = actual.join("\n");
    let expected = expected.join("\n");
    if actual != expected {
        eprintln!("Unexpected section stream:\n--- expected\n+++ actual");
        for result in diff::lines(&expected, &actual) {
            match result {
                diff::Result::Left(line) => eprintln!("-{line}"),
                diff::Result::Both(line, _) => eprintln!(" {line}"),
                diff::Result::Right(line) => eprintln!("+{line}"),
            }
        }
        panic!("section stream mismatch");
    }
}

fn fields_drawn(log: &[String]) -> Vec<String> {
    log.iter()
        .filter_map(|event| event.strip_prefix("field "))
        .map(String::from)
        .collect()
}

fn threshold_report(page_height: f64) -> Report {
    resolve(
        json!({
            "report_headers": quiet(),
            "report_footers": quiet(),
            "page_headers": quiet(),
            "page_footers": quiet(),
            "details": [{"height": 10.0}],
        }),
        &["x"],
        page_height,
    )
}

#[test]
fn sections_exactly_filling_a_page_do_not_break() {
    let report = threshold_report(40.0);
    let mut source = Rows::new(["x"])
        .with_row([1.0])
        .with_row([2.0])
        .with_row([3.0])
        .with_row([4.0]);
    let (log, summary) = run_report(&report, &mut source);
    assert_events(
        &log,
        &[
            "start",
            "start-page 1",
            "end-section detail",
            "end-section detail",
            "end-section detail",
            "end-section detail",
            "end-page",
            "end",
            "flush",
        ],
    );
    assert_eq!(summary, RunSummary { rows: 4, pages: 1 });
}

#[test]
fn exceeding_a_page_by_epsilon_breaks_before_the_offending_section() {
    let report = threshold_report(39.9);
    let mut source = Rows::new(["x"])
        .with_row([1.0])
        .with_row([2.0])
        .with_row([3.0])
        .with_row([4.0]);
    let (log, summary) = run_report(&report, &mut source);
    assert_events(
        &log,
        &[
            "start",
            "start-page 1",
            "end-section detail",
            "end-section detail",
            "end-section detail",
            "end-page",
            "start-page 2",
            "end-section detail",
            "end-page",
            "end",
            "flush",
        ],
    );
    assert_eq!(summary.pages, 2);
}

fn grouped_report() -> Report {
    let marker = |text: &str| {
        json!({"height": 5.0, "fields": [
            {"text": text, "bounds": {"height": 5.0}, "format": {"size": 4.0}}
        ]})
    };
    resolve(
        json!({
            "report_headers": quiet(),
            "report_footers": quiet(),
            "page_headers": quiet(),
            "page_footers": quiet(),
            "details": [{"height": 10.0, "fields": [
                {"column": "city", "bounds": {"height": 10.0}, "format": {"size": 8.0}}
            ]}],
            "groups": [
                {"column": "region",
                 "headers": [marker("hdr-region")],
                 "footers": [marker("ftr-region")]},
                {"column": "city",
                 "headers": [marker("hdr-city")],
                 "footers": [marker("ftr-city")]}
            ],
        }),
        &["region", "city"],
        1000.0,
    )
}

/// Two nested groups over three rows: an inner-only change on row 2 and
/// an outer change on row 3.  This pins down header propagation (outer
/// change re-fires the inner header; inner change alone does not touch
/// the outer), the footer cascade (the outer change flushes the inner
/// footer first, even though the inner value did not change), and the
/// last-row flush (both footers exactly once, inner before outer).
#[test]
fn group_header_and_footer_rules() {
    let report = grouped_report();
    let mut source = Rows::new(["region", "city"])
        .with_row(["east", "springfield"])
        .with_row(["east", "shelbyville"])
        .with_row(["west", "shelbyville"]);
    let (log, summary) = run_report(&report, &mut source);
    assert_events(
        &log,
        &[
            "start",
            "start-page 1",
            // Row 1: first value fires every header, outermost first.
            "field hdr-region",
            "end-section group header",
            "field hdr-city",
            "end-section group header",
            "field springfield",
            "end-section detail",
            // Row 2: only the inner group changed.
            "field ftr-city",
            "end-section group footer",
            "field hdr-city",
            "end-section group header",
            "field shelbyville",
            "end-section detail",
            // Row 3: the outer group changed; the inner footer fires
            // first even though "shelbyville" carried over, and both
            // headers re-fire.
            "field ftr-city",
            "end-section group footer",
            "field ftr-region",
            "end-section group footer",
            "field hdr-region",
            "end-section group header",
            "field hdr-city",
            "end-section group header",
            "field shelbyville",
            "end-section detail",
            // Last-row flush: every footer once, inner before outer.
            "field ftr-city",
            "end-section group footer",
            "field ftr-region",
            "end-section group footer",
            "end-page",
            "end",
            "flush",
        ],
    );
    assert_eq!(summary, RunSummary { rows: 3, pages: 1 });
}

/// The end-to-end pagination scenario: three rows grouped by office,
/// detail height 10, page-footer height 5, group-footer height 3, page
/// height 30.  The group footer for "A" fires before row 3's detail, and
/// the detail no longer fits above the reserved page footer, so the page
/// breaks between the two.
#[test]
fn page_breaks_between_group_footer_and_next_detail() {
    let report = resolve(
        json!({
            "report_headers": quiet(),
            "report_footers": quiet(),
            "page_headers": quiet(),
            "page_footers": [{"height": 5.0}],
            "details": [{"height": 10.0, "fields": [
                {"column": "office", "bounds": {"height": 10.0}, "format": {"size": 8.0}}
            ]}],
            "groups": [{"column": "office",
                        "headers": quiet(),
                        "footers": [{"height": 3.0}]}],
        }),
        &["office"],
        30.0,
    );
    let mut source = Rows::new(["office"])
        .with_row(["A"])
        .with_row(["A"])
        .with_row(["B"]);
    let (log, summary) = run_report(&report, &mut source);
    assert_events(
        &log,
        &[
            "start",
            "start-page 1",
            "field A",
            "end-section detail",
            "field A",
            "end-section detail",
            "end-section group footer",
            "end-section page footer",
            "end-page",
            "start-page 2",
            "field B",
            "end-section detail",
            "end-section group footer",
            "end-section page footer",
            "end-page",
            "end",
            "flush",
        ],
    );
    assert_eq!(summary, RunSummary { rows: 3, pages: 2 });
}

/// Aggregate reset across a group boundary, through the whole pipeline:
/// sum over [2, 24, 3] then [12, 42] shows 29 and then 54, never 83.
#[test]
fn group_scoped_sum_resets_at_the_boundary() {
    let report = resolve(
        json!({
            "report_headers": quiet(),
            "report_footers": quiet(),
            "page_headers": quiet(),
            "page_footers": quiet(),
            "details": [{"height": 10.0, "fields": [
                {"id": 1, "column": "sales", "bounds": {"height": 10.0}, "format": {"size": 8.0}}
            ]}],
            "groups": [{"column": "office",
                        "headers": quiet(),
                        "footers": [{"height": 10.0, "fields": [
                            {"aggregate": {"function": "sum", "field": 1, "group": 0},
                             "bounds": {"height": 10.0}, "format": {"size": 8.0}}
                        ]}]}],
        }),
        &["office", "sales"],
        1000.0,
    );
    let mut source = Rows::new(["office", "sales"])
        .with_row([Value::from("A"), Value::number(2.0)])
        .with_row([Value::from("A"), Value::number(24.0)])
        .with_row([Value::from("A"), Value::number(3.0)])
        .with_row([Value::from("B"), Value::number(12.0)])
        .with_row([Value::from("B"), Value::number(42.0)]);
    let (log, _) = run_report(&report, &mut source);
    assert_eq!(
        fields_drawn(&log),
        ["2", "24", "3", "29", "12", "42", "54"]
    );
}

/// Page-number and row-number fields read engine state, and the page
/// header refreshes as pages turn.
#[test]
fn special_fields_track_engine_state() {
    let report = resolve(
        json!({
            "report_headers": quiet(),
            "report_footers": quiet(),
            "page_headers": [{"height": 10.0, "fields": [
                {"special": "page_number", "bounds": {"height": 10.0}, "format": {"size": 8.0}}
            ]}],
            "page_footers": quiet(),
            "details": [{"height": 10.0, "fields": [
                {"special": "row_number", "bounds": {"height": 10.0}, "format": {"size": 8.0}}
            ]}],
        }),
        &["x"],
        25.0,
    );
    let mut source = Rows::new(["x"]).with_row([1.0]).with_row([2.0]);
    let (log, summary) = run_report(&report, &mut source);
    // Page 1 carries row 1; row 2 no longer fits under the header.
    assert_eq!(fields_drawn(&log), ["1", "1", "2", "2"]);
    assert_eq!(summary.pages, 2);
}

/// A rowless run still emits report headers and footers once, and a
/// min over an empty accumulator renders as absent, not as a sentinel
/// extreme.  The header's rule is drawn after its fields.
#[test]
fn rowless_report_and_empty_min() {
    let report = resolve(
        json!({
            "report_headers": [{"height": 10.0,
                                "lines": [{"x1": 0.0, "y1": 9.0, "x2": 500.0, "y2": 9.0}],
                                "fields": [
                {"text": "title", "bounds": {"height": 10.0}, "format": {"size": 8.0}}
            ]}],
            "report_footers": [{"height": 10.0, "fields": [
                {"aggregate": {"function": "min", "field": 1},
                 "bounds": {"height": 10.0}, "format": {"size": 8.0}}
            ]}],
            "page_headers": quiet(),
            "page_footers": quiet(),
            "details": [{"height": 10.0, "hidden": true, "fields": [
                {"id": 1, "column": "sales", "bounds": {"height": 10.0}, "format": {"size": 8.0}}
            ]}],
        }),
        &["office", "sales"],
        1000.0,
    );
    let (log, summary) = run_report(&report, &mut Rows::new(["office", "sales"]));
    assert_events(
        &log,
        &[
            "start",
            "start-page 1",
            "field title",
            "line",
            "end-section report header",
            "field ",
            "end-section report footer",
            "end-page",
            "end",
            "flush",
        ],
    );
    assert_eq!(summary, RunSummary { rows: 0, pages: 1 });
}

/// A section's page-break flag forces a new page unless the section
/// lands right after a page header (i.e. it is already at the top).
#[test]
fn page_break_flag_is_suppressed_at_the_top_of_a_page() {
    let report = resolve(
        json!({
            "report_headers": quiet(),
            "report_footers": quiet(),
            "page_headers": [{"height": 0.0}],
            "page_footers": quiet(),
            "details": [{"height": 10.0, "page_break": true}],
        }),
        &["x"],
        1000.0,
    );
    let mut source = Rows::new(["x"]).with_row([1.0]).with_row([2.0]);
    let (log, summary) = run_report(&report, &mut source);
    assert_events(
        &log,
        &[
            "start",
            "start-page 1",
            "end-section page header",
            // Row 1 is right below the page header: no forced break.
            "end-section detail",
            // Row 2 carries the flag into the middle of a page.
            "end-page",
            "start-page 2",
            "end-section page header",
            "end-section detail",
            "end-page",
            "end",
            "flush",
        ],
    );
    assert_eq!(summary.pages, 2);
}

/// A group header taller than the space left above the reserved footer
/// area triggers the late per-section check: the early page-length check
/// does not count header heights, so only `output_section` can catch it.
#[test]
fn oversized_group_header_breaks_before_drawing() {
    let report = resolve(
        json!({
            "report_headers": quiet(),
            "report_footers": quiet(),
            "page_headers": quiet(),
            "page_footers": quiet(),
            "details": [{"height": 10.0}],
            "groups": [{"column": "g",
                        "headers": [{"height": 35.0}],
                        "footers": quiet()}],
        }),
        &["g"],
        40.0,
    );
    let mut source = Rows::new(["g"]).with_row(["A"]).with_row(["B"]);
    let (log, summary) = run_report(&report, &mut source);
    assert_events(
        &log,
        &[
            "start",
            "start-page 1",
            // Row 1: the header fits a fresh page (35 <= 40)...
            "end-section group header",
            // ...but the detail no longer does (35 + 10 > 40).
            "end-page",
            "start-page 2",
            "end-section detail",
            // Row 2: the early check passes (10 + 10 <= 40), yet the
            // header itself cannot fit above the bottom of the page.
            "end-page",
            "start-page 3",
            "end-section group header",
            "end-page",
            "start-page 4",
            "end-section detail",
            "end-page",
            "end",
            "flush",
        ],
    );
    assert_eq!(summary.pages, 4);
}

/// Counts evaluations per expression while delegating to the basic
/// evaluator.
#[derive(Default)]
struct CountingEvaluator {
    counts: HashMap<String, usize>,
    inner: BasicEvaluator,
}

impl Evaluator for CountingEvaluator {
    fn eval(&mut self, expr: &str, ctx: &EvalContext) -> std::result::Result<Value, ExprError> {
        *self.counts.entry(expr.into()).or_default() += 1;
        self.inner.eval(expr, ctx)
    }
}

/// A suppressed section draws nothing and accumulates no height, but its
/// formulas are still evaluated for every row.
#[test]
fn suppressed_sections_still_evaluate_formulas() {
    let report = resolve(
        json!({
            "report_headers": quiet(),
            "report_footers": quiet(),
            "page_headers": quiet(),
            "page_footers": quiet(),
            "details": [{"height": 10.0,
                         "suppress": "{x} > 1",
                         "fields": [
                {"formula": "{x} * 2", "bounds": {"height": 10.0}, "format": {"size": 8.0}}
            ]}],
        }),
        &["x"],
        1000.0,
    );
    let mut source = Rows::new(["x"]).with_row([1.0]).with_row([2.0]);
    let mut evaluator = CountingEvaluator::default();
    let (log, errors, _) = run_with(&report, &mut source, None, &mut evaluator);
    assert_eq!(errors, Vec::<String>::new());

    // Only row 1 is visible.
    assert_eq!(fields_drawn(&log), ["2"]);
    // The formula ran for the suppressed row too.
    assert_eq!(evaluator.counts["{x} * 2"], 2);
}

/// A failing driver stops row processing but the run still closes
/// cleanly, with the failure reported exactly once.
#[test]
fn driver_failure_cancels_but_closes_output() {
    let report = resolve(
        json!({
            "report_headers": quiet(),
            "report_footers": quiet(),
            "page_headers": quiet(),
            "page_footers": quiet(),
            "details": [{"height": 10.0, "fields": [
                {"column": "x", "bounds": {"height": 10.0}, "format": {"size": 8.0}}
            ]}],
        }),
        &["x"],
        1000.0,
    );
    let mut source = Rows::new(["x"])
        .with_row([1.0])
        .with_row([2.0])
        .with_row([3.0]);
    let (log, errors, _) = run_with(&report, &mut source, Some("2"), &mut BasicEvaluator);

    assert_eq!(errors.len(), 1);
    assert_eq!(fields_drawn(&log), ["1"]);
    // Output resources were still released.
    assert_eq!(log.last().map(String::as_str), Some("flush"));
}

/// Reading order is top-to-bottom then left-to-right, stable, and
/// independent of insertion order.
#[test]
fn reading_order_is_deterministic() {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    let positions = [
        ("a", 0.0, 0.0),
        ("b", 0.0, 50.0),
        ("m", 5.0, 25.0),
        ("c", 10.0, 0.0),
        ("d", 10.0, 50.0),
    ];
    let fields: Vec<Field> = positions
        .iter()
        .enumerate()
        .map(|(id, &(label, y, x))| Field {
            id: id as u64 + 1,
            bounds: Rect {
                x,
                y,
                ..Rect::default()
            },
            format: Format::default(),
            visible: true,
            kind: FieldKind::Text(label.into()),
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..10 {
        let mut section = Section::empty(0);
        section.fields = (0..fields.len()).collect();
        section.fields.shuffle(&mut rng);

        let mut order = FieldOrder::default();
        let labels: Vec<&str> = order
            .ordered(&section, &fields)
            .iter()
            .map(|&index| match &fields[index].kind {
                FieldKind::Text(label) => label.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(labels, ["a", "b", "m", "c", "d"]);
    }
}

/// The cached ordering is reused for a section within one engine
/// lifetime.
#[test]
fn reading_order_is_cached_per_section() {
    let fields: Vec<Field> = (0..2)
        .map(|i| Field {
            id: i + 1,
            bounds: Rect::default(),
            format: Format::default(),
            visible: true,
            kind: FieldKind::Text(format!("f{i}")),
        })
        .collect();
    let mut section = Section::empty(7);
    section.fields = vec![1, 0];

    let mut order = FieldOrder::default();
    let first = order.ordered(&section, &fields).to_vec();

    // Same key, different field list: the cache answers.
    section.fields = vec![0];
    let second = order.ordered(&section, &fields).to_vec();
    assert_eq!(first, second);
}
