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

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use unicode_linebreak::linebreaks;
use unicode_width::UnicodeWidthStr;

use crate::field::Rect;
use crate::value::Value;

/// Vertical slack added per line of output text.
const LINE_SIZE_FUDGE_FACTOR: f64 = 1.2;

/// Approximate width of one character cell as a fraction of the font size.
/// Character drivers get exact reading order from field positions; this
/// factor only has to make wrap heights plausible.
const CELL_WIDTH_FACTOR: f64 = 0.6;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorzAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// How one field renders its value: type face parameters plus optional
/// number and date format strings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Format {
    /// Font size in points.
    pub size: f64,

    pub bold: bool,

    /// Wrap string values into the field's bounds width?
    pub wrap: bool,

    pub align: HorzAlign,

    /// Number format pattern, e.g. `$#,##0.00`.
    pub number: Option<String>,

    /// Date format in strftime syntax, e.g. `%d %b %Y`.
    pub date: Option<String>,
}

impl Default for Format {
    fn default() -> Self {
        Self {
            size: 11.0,
            bold: false,
            wrap: false,
            align: HorzAlign::default(),
            number: None,
            date: None,
        }
    }
}

impl Format {
    /// Returns false if the date format string contains an item chrono
    /// cannot render.  Checked once at report load time so a bad format
    /// cannot panic mid-run.
    pub fn date_format_is_valid(&self) -> bool {
        match &self.date {
            None => true,
            Some(f) => !StrftimeItems::new(f).any(|item| matches!(item, Item::Error)),
        }
    }
}

/// A parsed subset of DecimalFormat patterns: literal prefix and suffix
/// around an integer part (`#`/`0`, optional `,` grouping) and fraction
/// part (`0` required digits, `#` optional digits).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NumberFormat {
    prefix: String,
    suffix: String,
    grouping: bool,
    min_int: usize,
    min_frac: usize,
    max_frac: usize,
}

impl NumberFormat {
    pub fn parse(pattern: &str) -> Self {
        let is_pattern_char = |c: char| matches!(c, '#' | '0' | ',' | '.');
        let start = pattern.find(is_pattern_char).unwrap_or(pattern.len());
        let rest = &pattern[start..];
        let len = rest
            .char_indices()
            .find(|(_, c)| !is_pattern_char(*c))
            .map_or(rest.len(), |(index, _)| index);
        let number = &rest[..len];
        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        Self {
            prefix: pattern[..start].into(),
            suffix: rest[len..].into(),
            grouping: int_part.contains(','),
            min_int: int_part.chars().filter(|&c| c == '0').count().max(1),
            min_frac: frac_part.chars().filter(|&c| c == '0').count(),
            max_frac: frac_part.len(),
        }
    }

    pub fn format(&self, x: f64) -> String {
        let rounded = format!("{:.*}", self.max_frac, x.abs());
        let (int, frac) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));

        let mut frac = frac.to_string();
        while frac.len() > self.min_frac && frac.ends_with('0') {
            frac.pop();
        }

        let mut int = int.to_string();
        while int.len() < self.min_int {
            int.insert(0, '0');
        }
        if self.grouping {
            int = group_thousands(&int);
        }

        let mut out = String::new();
        let rounds_to_zero =
            int.bytes().all(|b| b == b'0') && frac.bytes().all(|b| b == b'0');
        if x < 0.0 && !rounds_to_zero {
            out.push('-');
        }
        out.push_str(&self.prefix);
        out.push_str(&int);
        if !frac.is_empty() {
            out.push('.');
            out.push_str(&frac);
        }
        out.push_str(&self.suffix);
        out
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let n = digits.len();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (n - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Number formats parsed once per distinct pattern, owned by the run.
#[derive(Default)]
pub struct FormatterCache {
    numbers: HashMap<String, NumberFormat>,
}

impl FormatterCache {
    pub fn number(&mut self, pattern: &str) -> &NumberFormat {
        self.numbers
            .entry(pattern.into())
            .or_insert_with(|| NumberFormat::parse(pattern))
    }
}

/// Wraps `text` into lines of at most `max_cells` display cells, breaking
/// at Unicode line-break opportunities.  A single unbreakable word longer
/// than `max_cells` is left on its own overlong line.
pub fn wrap(text: &str, max_cells: usize) -> Vec<String> {
    let max_cells = max_cells.max(1);
    let mut lines = Vec::new();
    for segment in text.split('\n') {
        let mut start = 0;
        let mut prev = None;
        for (pos, _) in linebreaks(segment) {
            if segment[start..pos].trim_end().width() > max_cells {
                if let Some(p) = prev.filter(|&p| p > start) {
                    lines.push(segment[start..p].trim_end().to_string());
                    start = p;
                }
            }
            prev = Some(pos);
        }
        lines.push(segment[start..].trim_end().to_string());
    }
    lines
}

/// Memoizes one field's formatted string and required output height for
/// the last raw value seen.  Field content changes row to row, so both
/// are recomputed exactly when the value changes; `invalidate` covers
/// format edits between runs.
#[derive(Default)]
pub struct FormattedValueCache {
    value: Option<Value>,
    formatted: String,
    height: f64,
}

impl FormattedValueCache {
    pub fn formatted(
        &mut self,
        value: &Value,
        format: &Format,
        bounds: &Rect,
        formatters: &mut FormatterCache,
    ) -> &str {
        self.refresh(value, format, bounds, formatters);
        &self.formatted
    }

    pub fn output_height(
        &mut self,
        value: &Value,
        format: &Format,
        bounds: &Rect,
        formatters: &mut FormatterCache,
    ) -> f64 {
        self.refresh(value, format, bounds, formatters);
        self.height
    }

    pub fn invalidate(&mut self) {
        self.value = None;
    }

    fn refresh(
        &mut self,
        value: &Value,
        format: &Format,
        bounds: &Rect,
        formatters: &mut FormatterCache,
    ) {
        if self.value.as_ref() == Some(value) {
            return;
        }

        self.formatted = match value {
            Value::Number(x) => match &format.number {
                Some(pattern) => formatters.number(pattern).format(x.0),
                None => value.to_string(),
            },
            Value::Date(date) => match &format.date {
                Some(f) => date.format(f).to_string(),
                None => value.to_string(),
            },
            _ => {
                let s = value.to_string();
                if format.wrap {
                    let cells = (bounds.width / (format.size * CELL_WIDTH_FACTOR)) as usize;
                    wrap(&s, cells).join("\n")
                } else {
                    s
                }
            }
        };

        // The field's designed height is the minimum.
        self.height = bounds.height;
        if !self.formatted.is_empty() {
            let h =
                self.formatted.lines().count() as f64 * format.size * LINE_SIZE_FUDGE_FACTOR;
            if h > self.height {
                self.height = h;
            }
        }

        self.value = Some(value.clone());
    }
}
