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

use enum_map::{enum_map, Enum, EnumMap};
use serde::Deserialize;

/// The number of points per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

#[derive(Copy, Clone, Debug, Enum, PartialEq, Eq)]
pub enum Axis2 {
    X,
    Y,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperSize {
    #[default]
    Letter,
    Legal,
    A4,
    A5,
    Halfletter,
}

impl PaperSize {
    /// Portrait dimensions in points.
    pub fn points(self) -> EnumMap<Axis2, f64> {
        let (w, h) = match self {
            PaperSize::Letter => (612.0, 792.0),
            PaperSize::Legal => (612.0, 1008.0),
            PaperSize::A4 => (595.0, 842.0),
            PaperSize::A5 => (420.0, 595.0),
            PaperSize::Halfletter => (396.0, 612.0),
        };
        enum_map! { Axis2::X => w, Axis2::Y => h }
    }
}

/// Page geometry for one report run.
#[derive(Debug)]
pub struct PageSetup {
    /// Paper size in points.
    pub paper: EnumMap<Axis2, f64>,

    /// Margin width in points.
    pub margins: EnumMap<Axis2, [f64; 2]>,

    pub orientation: Orientation,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            paper: PaperSize::Letter.points(),
            margins: EnumMap::from_fn(|_| [0.5 * POINTS_PER_INCH; 2]),
            orientation: Orientation::default(),
        }
    }
}

impl PageSetup {
    pub fn new(size: PaperSize, orientation: Orientation) -> Self {
        let points = size.points();
        let paper = match orientation {
            Orientation::Portrait => points,
            Orientation::Landscape => {
                enum_map! { Axis2::X => points[Axis2::Y], Axis2::Y => points[Axis2::X] }
            }
        };
        Self {
            paper,
            orientation,
            ..Self::default()
        }
    }

    /// Paper size less the margins.  The layout engine lays sections out
    /// within this area.
    pub fn printable_size(&self) -> EnumMap<Axis2, f64> {
        EnumMap::from_fn(|axis| self.paper[axis] - self.margins[axis][0] - self.margins[axis][1])
    }
}
