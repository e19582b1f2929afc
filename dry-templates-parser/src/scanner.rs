// MIT License
//
// Copyright (c) 2024 Jerome Johnson
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Delimiter scanning
//!
//! Splits text into literal runs and `{{ ... }}` expressions. The closing
//! delimiter is found by counting braces, so expressions may contain their
//! own braces, as object literals do:
//!
//! ```text
//! Hello {{view "card", {title: title}}}!
//! ^^^^^^  prefix
//!       ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^ segment
//!         ^^^^^^^^^^^^^^^^^^^^^^^^^^^   content
//!                                      ^ postfix
//! ```

use crate::error::{ErrorKind, ParseError, Result};
use crate::expression::Expression;
use crate::expression::ExpressionParser;

/// One delimited expression found in a template string
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    /// Text before the opening delimiter
    pub prefix: &'a str,
    /// Text between the delimiters, untrimmed
    pub content: &'a str,
    /// Text after the closing delimiter
    pub postfix: &'a str,
}

/// A piece of scanned text
#[derive(Debug)]
pub enum Piece<'a> {
    Literal(&'a str),
    Expression(Expression),
}

/// Finds the index just past the closing run for `num` already open chars
/// starting at `i`. Every open char nests one level deeper and every close
/// char returns one level.
pub(crate) fn match_braces(
    text: &str,
    mut num: usize,
    mut i: usize,
    open: char,
    close: char,
) -> Option<usize> {
    i += num;
    while num > 0 {
        let rest = text.get(i..)?;
        let next_close = rest.find(close);
        let next_open = rest.find(open);
        match (next_close, next_open) {
            (Some(c), o) if o.is_none_or(|o| c < o) => {
                i += c + 1;
                num -= 1;
            }
            (_, Some(o)) => {
                i += o + 1;
                num += 1;
            }
            _ => return None,
        }
    }
    Some(i)
}

impl<'a> Segment<'a> {
    /// Finds the first expression in `src`
    pub fn from(src: &'a str) -> Result<Option<Self>> {
        let start = match src.find("{{") {
            Some(start) => start,
            None => return Ok(None),
        };
        let end = match_braces(src, 2, start, '{', '}').ok_or_else(|| {
            ParseError::new(
                ErrorKind::MismatchedDelimiters,
                format!("Mismatched braces in: {}", src),
            )
        })?;
        Ok(Some(Self {
            prefix: &src[..start],
            content: &src[start + 2..end - 2],
            postfix: &src[end..],
        }))
    }
}

/// Scans `data`, handing literal text and parsed expressions to `on_piece`
/// in order. Empty literals and empty `{{}}` are skipped.
///
/// Every segment's postfix starts past its closing `}}`, so
/// `ScannerNoProgress` is unreachable unless that invariant breaks.
pub(crate) fn scan<'a>(
    data: &'a str,
    parser: &ExpressionParser,
    mut on_piece: impl FnMut(Piece<'a>) -> Result<()>,
) -> Result<()> {
    let mut current = data;
    while !current.is_empty() {
        let segment = match Segment::from(current).map_err(|err| {
            ParseError::new(err.kind, format!("Mismatched braces in: {}", data))
        })? {
            Some(segment) => segment,
            None => return on_piece(Piece::Literal(current)),
        };
        if segment.postfix.len() >= current.len() {
            return Err(ParseError::new(
                ErrorKind::ScannerNoProgress,
                format!("Error parsing template text: {}", data),
            ));
        }
        if !segment.prefix.is_empty() {
            on_piece(Piece::Literal(segment.prefix))?;
        }
        if !segment.content.trim().is_empty() {
            on_piece(Piece::Expression(parser.parse(segment.content)?))?;
        }
        current = segment.postfix;
    }
    Ok(())
}
