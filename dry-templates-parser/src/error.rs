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

//! Error handling for the template parser
//!
//! Every failure aborts the whole compile. Errors carry a [`ErrorKind`] for
//! callers that want to branch on the cause, and a message that accumulates
//! context (the expression, then the template) as it bubbles up.

use thiserror::Error;

/// Cause of a template parsing failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A `{{` with no matching `}}`
    MismatchedDelimiters,
    /// A closing tag that does not match the open element
    MismatchedTag,
    /// A `{{/...}}` that does not match the open block
    MismatchedBlock,
    /// An `else` with no block able to take it
    UnexpectedElse,
    /// A `<view>` element without a `name` attribute
    MissingViewName,
    /// A view name that the registry cannot resolve
    ViewNotFound,
    /// An `<attribute>` or `<array>` element without a literal name
    MissingLiteralName,
    /// An expression of a shape that is not allowed where it was found
    UnexpectedExpression,
    /// An attribute value that produced no content
    AttributeParseError,
    /// The text scanner stopped advancing
    ScannerNoProgress,
    /// A scope was closed that was never opened, or left open
    UnbalancedScope,
    /// The path expression grammar rejected its input
    ExpressionSyntax,
}

/// Error type for template parsing failures
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub(crate) kind: ErrorKind,
    pub(crate) message: String,
}

/// Returns the last 32 characters of a string for error context
pub(crate) fn rcap(src: &str) -> &str {
    static CAP_AT: usize = 32;

    if src.len() > CAP_AT {
        let mut start = src.len() - CAP_AT;
        while !src.is_char_boundary(start) {
            start += 1;
        }
        &src[start..]
    } else {
        src
    }
}

impl ParseError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a syntax error for the path expression grammar
    pub(crate) fn syntax(message: &str, near: &str) -> Self {
        Self::new(
            ErrorKind::ExpressionSyntax,
            format!("{} near \"{}\"", message, rcap(near)),
        )
    }

    /// Creates an error for an expression that was not expected here
    pub(crate) fn unexpected(source: &str) -> Self {
        Self::new(
            ErrorKind::UnexpectedExpression,
            format!("Error parsing template: {}", source),
        )
    }

    /// The cause of this error
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The full message, including any appended context
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Appends context to the message, keeping the kind
    pub fn append(mut self, context: &str) -> Self {
        self.message.push_str(context);
        self
    }
}

/// Result type for template parsing operations
pub type Result<T> = std::result::Result<T, ParseError>;
