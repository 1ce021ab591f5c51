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
use std::fmt::Display;
use std::io::Write;

use crate::error::Result;
use crate::layout::driver::{DrawField, Driver};
use crate::section::SectionRole;

/// A character-separated text driver: one output line per section,
/// fields separated by `delimiter` in reading order.  Lines and images
/// have no text representation here; images degrade to their reference
/// string (the default `output_image`) and rules are ignored.
pub struct CharSepDriver<W: Write> {
    out: W,
    options: SepOptions,

    /// No field written yet on the current line.
    first: bool,
}

#[derive(Copy, Clone, Debug)]
struct SepOptions {
    quote: char,
    delimiter: char,
}

impl SepOptions {
    fn char_needs_quoting(&self, c: char) -> bool {
        c == '\r' || c == '\n' || c == self.quote || c == self.delimiter
    }

    fn needs_quoting(&self, s: &str) -> bool {
        s.chars().any(|c| self.char_needs_quoting(c))
    }
}

/// One field value, quoted on demand the way delimited-data consumers
/// expect: embedded quotes doubled, the whole value quoted if it
/// contains the quote, the delimiter, or a line break.
struct SepField<'a> {
    text: &'a str,
    options: SepOptions,
}

impl Display for SepField<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.options.needs_quoting(self.text) {
            let quote = self.options.quote;
            write!(f, "{quote}")?;
            for c in self.text.chars() {
                if c == quote {
                    write!(f, "{c}")?;
                }
                write!(f, "{c}")?;
            }
            write!(f, "{quote}")
        } else {
            write!(f, "{}", self.text)
        }
    }
}

impl<W: Write> CharSepDriver<W> {
    pub fn new(out: W, delimiter: char) -> Self {
        Self {
            out,
            options: SepOptions {
                quote: '"',
                delimiter,
            },
            first: true,
        }
    }
}

impl<W: Write> Driver for CharSepDriver<W> {
    fn name(&self) -> Cow<'static, str> {
        Cow::from("charsep")
    }

    fn wants_sorted_fields(&self) -> bool {
        true
    }

    fn output_field(&mut self, field: &DrawField) -> Result<()> {
        if self.first {
            self.first = false;
        } else {
            write!(self.out, "{}", self.options.delimiter)?;
        }
        write!(
            self.out,
            "{}",
            SepField {
                text: &field.content,
                options: self.options,
            }
        )?;
        Ok(())
    }

    fn end_section(&mut self, _role: SectionRole) -> Result<()> {
        writeln!(self.out)?;
        self.first = true;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }
}
