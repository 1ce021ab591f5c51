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

//! A banded report generator: report definitions are resolved against a
//! row source, streamed one row at a time through a pagination and
//! grouping engine, and drawn through a pluggable output driver.

pub mod aggregate;
pub mod error;
pub mod expr;
pub mod field;
pub mod format;
pub mod group;
pub mod layout;
pub mod paper;
pub mod report;
pub mod section;
pub mod source;
pub mod value;
