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

use std::borrow::Cow;

use crate::error::Result;
use crate::field::Field;
use crate::paper::PageSetup;
use crate::section::{Line, SectionRole};

/// One field ready to draw: already positioned (via `field.bounds`) and
/// already formatted.  Drivers never decide pagination and never
/// re-format.
pub struct DrawField<'a> {
    pub field: &'a Field,
    pub content: String,
}

/// An output driver.
///
/// The layout engine calls the lifecycle hooks in document order — one
/// `start`, page cycles of `start_page`/`end_page`, one `end` — and the
/// drawing hooks for each visible field, image, and line of each section
/// it emits.  A hook that fails stops the run: the engine reports the
/// error once and skips all further output, so a driver does not see
/// another call after returning `Err` (other than `flush`).
pub trait Driver {
    fn name(&self) -> Cow<'static, str>;

    fn start(&mut self, setup: &PageSetup) -> Result<()> {
        let _ = setup;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_page(&mut self, page_number: u32) -> Result<()> {
        let _ = page_number;
        Ok(())
    }

    fn end_page(&mut self) -> Result<()> {
        Ok(())
    }

    fn output_field(&mut self, field: &DrawField) -> Result<()>;

    /// Image fields arrive here; drivers that cannot place images fall
    /// back to drawing the reference as text.
    fn output_image(&mut self, image: &DrawField) -> Result<()> {
        self.output_field(image)
    }

    fn output_line(&mut self, line: &Line) -> Result<()> {
        let _ = line;
        Ok(())
    }

    /// Called after a section's fields and lines have been drawn.
    /// Line-oriented drivers use this as their record separator.
    fn end_section(&mut self, role: SectionRole) -> Result<()> {
        let _ = role;
        Ok(())
    }

    /// Returns true if the driver needs fields in reading order
    /// (top-to-bottom, left-to-right) rather than definition order.
    fn wants_sorted_fields(&self) -> bool {
        false
    }

    /// Ensures everything written so far has been handed off.  Called
    /// during shutdown on every exit path, including cancellation.
    fn flush(&mut self) {}
}
