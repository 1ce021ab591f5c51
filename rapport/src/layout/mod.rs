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

//! The pagination state machine.
//!
//! The run loop calls, for each row, `group_headers` → `detail` →
//! (next row's) `group_footers`, and the engine decides which sections to
//! emit, when a group's header or footer fires, and when to break to a
//! new page.  All drawing goes through a [Driver]; the section stream it
//! sees is identical regardless of which driver is attached.

use smallvec::SmallVec;

use crate::error::{Reporter, Result};
use crate::field::{FieldIndex, FieldKind};
use crate::paper::Axis2;
use crate::report::{Report, RunState};
use crate::section::{Section, SectionArea, SectionRole};

pub mod charsep;
pub mod driver;
mod sorted;
#[cfg(test)]
mod tests;

use self::driver::{DrawField, Driver};
use self::sorted::FieldOrder;

pub struct LayoutEngine<'a, D: Driver> {
    report: &'a Report,
    driver: D,
    reporter: &'a mut dyn Reporter,

    page_width: f64,
    page_height: f64,

    /// 1-based; incremented as each page starts.
    page_number: u32,
    used_height: f64,
    new_page: bool,
    wants_more_data: bool,
    previous_role: Option<SectionRole>,

    /// Reading-order emission, for drivers that ask for it.
    sorted: Option<FieldOrder>,
}

impl<'a, D: Driver> LayoutEngine<'a, D> {
    pub fn new(report: &'a Report, driver: D, reporter: &'a mut dyn Reporter) -> Self {
        let size = report.page_setup.printable_size();
        let sorted = driver.wants_sorted_fields().then(FieldOrder::default);
        Self {
            report,
            driver,
            reporter,
            page_width: size[Axis2::X],
            page_height: size[Axis2::Y],
            page_number: 0,
            used_height: 0.0,
            new_page: true,
            wants_more_data: true,
            previous_role: None,
            sorted,
        }
    }

    /// True until the run is cancelled or the driver fails.  Once false,
    /// every per-row call is a no-op, so a partially-built report can
    /// still be closed cleanly.
    pub fn wants_more_data(&self) -> bool {
        self.wants_more_data
    }

    /// The current page number.  Valid only after [Self::start].
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Printable page width in points.  Valid only after [Self::start].
    pub fn page_width(&self) -> f64 {
        self.page_width
    }

    /// Printable page height in points.  Valid only after [Self::start].
    pub fn page_height(&self) -> f64 {
        self.page_height
    }

    /// Runs a driver hook.  A failure is reported exactly once and stops
    /// all further output.
    fn hook(&mut self, f: impl FnOnce(&mut D) -> Result<()>) {
        if !self.wants_more_data {
            return;
        }
        if let Err(error) = f(&mut self.driver) {
            self.reporter.report(&error);
            self.wants_more_data = false;
        }
    }

    /// Begins the run: emits the report headers (once) and the first
    /// page's page headers.
    pub fn start(&mut self, run: &mut RunState) -> Result<()> {
        self.new_page = true;
        self.used_height = 0.0;
        self.page_number = 0;
        if self.wants_more_data {
            let report = self.report;
            self.hook(|d| d.start(&report.page_setup));
            self.start_page(run)?;
        }
        Ok(())
    }

    /// Ends the run: report footers, the final page end, and resource
    /// release.  Output is released even if the run was cancelled.
    pub fn end(&mut self, run: &mut RunState) -> Result<()> {
        if self.wants_more_data {
            let report = self.report;
            for section in &report.report_footers {
                self.output_section(run, section, SectionRole::ReportFooter)?;
            }
            self.end_page(run)?;
            self.hook(|d| d.end());
        }
        self.driver.flush();
        Ok(())
    }

    /// Abandons the run.  Idempotent; all further per-row calls become
    /// no-ops, but output is still released.
    pub fn cancel(&mut self) {
        self.wants_more_data = false;
        self.driver.flush();
    }

    /// Emits the headers of every group with a new value, and of every
    /// group inside one: once any header fires, all groups after it fire
    /// too.
    ///
    /// Formulas in the headers about to fire are evaluated before the
    /// page-length check, because the check evaluates detail and footer
    /// formulas that may depend on values set here.
    pub fn group_headers(&mut self, run: &mut RunState, is_last_row: bool) -> Result<()> {
        if !self.wants_more_data {
            return Ok(());
        }
        let report = self.report;

        let mut header_will_fire = false;
        for (index, group) in report.groups.iter().enumerate() {
            if header_will_fire || run.group_is_new(index) {
                for section in &group.headers {
                    run.evaluate_formulas_in(section)?;
                }
                header_will_fire = true;
            }
        }

        self.check_remaining_page_length(run, is_last_row, true)?;

        let mut header_was_output = false;
        for (index, group) in report.groups.iter().enumerate() {
            if header_was_output || run.group_is_new(index) {
                for section in &group.headers {
                    self.output_section(run, section, SectionRole::GroupHeader)?;
                }
                header_was_output = true;
            }
        }
        Ok(())
    }

    /// Emits every detail section for the current row.
    pub fn detail(&mut self, run: &mut RunState, is_last_row: bool) -> Result<()> {
        if !self.wants_more_data {
            return Ok(());
        }
        self.check_remaining_page_length(run, is_last_row, true)?;
        let report = self.report;
        for section in &report.details {
            self.output_section(run, section, SectionRole::Detail)?;
        }
        Ok(())
    }

    /// Emits the footers of every group from the first changed one
    /// inward, innermost first.  Groups swept up by an outer change are
    /// forced to fire even though their own value did not change, which
    /// also resets their record counts and aggregates when the next
    /// update runs.
    pub fn group_footers(&mut self, run: &mut RunState, is_last_row: bool) -> Result<()> {
        if !self.wants_more_data {
            return Ok(());
        }
        self.check_remaining_page_length(run, is_last_row, false)?;

        let report = self.report;
        let mut footer_was_output = false;
        let mut to_output: SmallVec<[usize; 4]> = SmallVec::new();
        for index in 0..report.groups.len() {
            if footer_was_output || run.group_is_new(index) || is_last_row {
                if footer_was_output {
                    run.force_footer_output(index);
                }
                to_output.push(index);
                footer_was_output = true;
            }
        }

        // Innermost first.
        for &index in to_output.iter().rev() {
            for section in &report.groups[index].footers {
                self.output_section(run, section, SectionRole::GroupFooter)?;
            }
        }
        Ok(())
    }

    /// Ends the page early if the current row's sections will not fit
    /// above the reserved page-footer area, then starts a pending page.
    /// Which sections are active — and how tall they are — varies row to
    /// row, so the heights are recomputed on every call.
    fn check_remaining_page_length(
        &mut self,
        run: &mut RunState,
        is_last_row: bool,
        include_detail: bool,
    ) -> Result<()> {
        let report = self.report;
        let detail_height = if include_detail {
            area_height(run, &report.details)?
        } else {
            0.0
        };
        let mut footer_height = area_height(run, &report.page_footers)?;
        if is_last_row {
            footer_height += area_height(run, &report.report_footers)?;
        }

        if self.used_height + footer_height + detail_height > self.page_height {
            self.end_page(run)?;
        }
        if self.new_page {
            self.start_page(run)?;
        }
        Ok(())
    }

    fn start_page(&mut self, run: &mut RunState) -> Result<()> {
        if !self.wants_more_data {
            return Ok(());
        }
        self.page_number += 1;
        self.used_height = 0.0;
        self.new_page = false;
        run.set_page_number(self.page_number);

        let page_number = self.page_number;
        self.hook(|d| d.start_page(page_number));

        let report = self.report;
        if self.page_number == 1 {
            for section in &report.report_headers {
                self.output_section(run, section, SectionRole::ReportHeader)?;
            }
        }
        for section in &report.page_headers {
            self.output_section(run, section, SectionRole::PageHeader)?;
        }
        Ok(())
    }

    fn end_page(&mut self, run: &mut RunState) -> Result<()> {
        if !self.wants_more_data {
            return Ok(());
        }
        let report = self.report;
        for section in &report.page_footers {
            self.output_section(run, section, SectionRole::PageFooter)?;
        }
        self.new_page = true;
        self.hook(|d| d.end_page());
        Ok(())
    }

    fn output_section(
        &mut self,
        run: &mut RunState,
        section: &Section,
        role: SectionRole,
    ) -> Result<()> {
        if !self.wants_more_data {
            return Ok(());
        }
        if run.section_visible(section)? {
            // A requested page break, unless we are already at the top
            // of a page.
            if section.page_break && self.previous_role != Some(SectionRole::PageHeader) {
                self.end_page(run)?;
                self.start_page(run)?;
            }

            // A section whose row-driven content grew can overflow into
            // the reserved page-footer area even after
            // check_remaining_page_length ran for this row.
            let output_height = run.section_output_height(section)?;
            if role != SectionRole::PageFooter {
                let footer_height = area_height(run, &self.report.page_footers)?;
                if self.page_height - self.used_height - footer_height < output_height {
                    self.end_page(run)?;
                    self.start_page(run)?;
                }
            }

            run.evaluate_formulas_in(section)?;
            self.draw_section(run, section, role)?;

            self.used_height += output_height;
            self.previous_role = Some(role);
        } else {
            // Hidden sections still evaluate their formulas so that
            // fields depending on them stay correct.
            run.evaluate_formulas_in(section)?;
        }
        Ok(())
    }

    /// Hands the section's visible fields, then its lines, to the
    /// driver.
    fn draw_section(
        &mut self,
        run: &mut RunState,
        section: &Section,
        role: SectionRole,
    ) -> Result<()> {
        let report = self.report;
        let order: SmallVec<[FieldIndex; 8]> = match &mut self.sorted {
            Some(sorted) => sorted
                .ordered(section, &report.fields)
                .iter()
                .copied()
                .collect(),
            None => section.fields.iter().copied().collect(),
        };

        for index in order {
            let field = &report.fields[index];
            if !field.visible {
                continue;
            }
            let content = run.field_display(index)?;
            let draw = DrawField { field, content };
            match &field.kind {
                FieldKind::Image { .. } => self.hook(|d| d.output_image(&draw)),
                _ => self.hook(|d| d.output_field(&draw)),
            }
        }
        for line in &section.lines {
            if line.visible {
                self.hook(|d| d.output_line(line));
            }
        }
        self.hook(|d| d.end_section(role));
        Ok(())
    }
}

fn area_height(run: &mut RunState, area: &SectionArea) -> Result<f64> {
    let mut sum = 0.0;
    for section in area {
        if run.section_visible(section)? {
            sum += run.section_output_height(section)?;
        }
    }
    Ok(sum)
}
