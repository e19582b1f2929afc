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

//! Expression tokenization
//!
//! This module splits the body of a path expression into tokens for the
//! grammar in [`crate::grammar`]. Tokens borrow from the source and carry the
//! remaining text, so the grammar walks them with [`Token::first`] and
//! [`Token::next`].
//!
//! # Token Types
//!
//! - Identifiers: `user`, `this`, `true`, `$render`
//! - Aliases: `#item`
//! - Attributes: `@title`
//! - Numbers: `42`, `1.5`, `2e3`
//! - Strings: `"double"` or `'single'`, with backslash escapes
//! - Punctuation and operators: `.`, `[`, `(`, `{`, `,`, `:`, `?`, `===`, `&&`, ...

use crate::error::{ParseError, Result, rcap};

/// Types of tokens that can be read from an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Identifier,
    /// An alias prefixed with # (value excludes the #)
    Alias,
    /// A view attribute prefixed with @ (value excludes the @)
    Attribute,
    Number,
    /// A quoted string (value includes the quotes)
    Str,
    Punct,
}

/// A token read from an expression
#[derive(Debug, Clone, Copy)]
pub struct Token<'a> {
    /// The type of token
    pub token_type: TokenType,
    /// The token's value
    pub value: &'a str,
    /// The remaining text after this token
    pub tail: &'a str,
}

/// Longest first, so `===` wins over `==` and `=`
static PUNCTUATION: [&str; 26] = [
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", ".", "[", "]", "(", ")", "{", "}", ",",
    ":", "?", "!", "+", "-", "*", "/", "%", "<", ">",
];

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Finds the end of an identifier
fn find_end(src: &str) -> usize {
    for (i, c) in src.char_indices() {
        if !is_identifier_char(c) {
            return i;
        }
    }
    src.len()
}

/// Finds the end of a quoted string, including the closing quote
fn find_end_of_string(src: &str) -> Result<usize> {
    let quote = match src.chars().next() {
        Some(quote) => quote,
        None => return Err(ParseError::syntax("expected string", src)),
    };
    let cliped = &src[1..];
    let mut escaped = false;
    for (i, c) in cliped.char_indices() {
        match c {
            '\\' => escaped = !escaped,
            c if c == quote && !escaped => return Ok(i + 2),
            _ => escaped = false,
        }
    }
    Err(ParseError::syntax("unterminated string", rcap(src)))
}

/// Finds the end of a number: digits, an optional fraction and exponent
fn find_end_of_number(src: &str) -> usize {
    let bytes = src.as_bytes();
    let digits = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    let mut end = digits(0);
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        end = digits(end + 1);
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exponent = end + 1;
        if exponent < bytes.len() && (bytes[exponent] == b'+' || bytes[exponent] == b'-') {
            exponent += 1;
        }
        if exponent < bytes.len() && bytes[exponent].is_ascii_digit() {
            end = digits(exponent);
        }
    }
    end
}

/// Reads a name after a one character sigil such as `#` or `@`
fn prefixed<'a>(src: &'a str, token_type: TokenType) -> Result<Token<'a>> {
    let end = 1 + find_end(&src[1..]);
    if end == 1 {
        return Err(ParseError::syntax("expected a name", src));
    }
    Ok(Token {
        token_type,
        value: &src[1..end],
        tail: src[end..].trim_start(),
    })
}

/// Parses a single token from the input string
fn parse(src: &str) -> Result<Option<Token<'_>>> {
    let first = match src.chars().next() {
        Some(first) => first,
        None => return Ok(None),
    };
    let (end, token_type) = match first {
        '#' => return prefixed(src, TokenType::Alias).map(Some),
        '@' => return prefixed(src, TokenType::Attribute).map(Some),
        '"' | '\'' => (find_end_of_string(src)?, TokenType::Str),
        c if c.is_ascii_digit() => (find_end_of_number(src), TokenType::Number),
        c if is_identifier_start(c) => (find_end(src), TokenType::Identifier),
        _ => match PUNCTUATION.iter().find(|punct| src.starts_with(*punct)) {
            Some(punct) => (punct.len(), TokenType::Punct),
            None => {
                return Err(ParseError::syntax(
                    &format!("unexpected character '{}'", first),
                    src,
                ));
            }
        },
    };
    Ok(Some(Token {
        token_type,
        value: &src[..end],
        tail: src[end..].trim_start(),
    }))
}

impl<'a> Token<'a> {
    /// Parses the first token from a string
    pub fn first(src: &'a str) -> Result<Option<Self>> {
        parse(src.trim())
    }

    /// Parses the next token after this one
    pub fn next(&self) -> Result<Option<Self>> {
        parse(self.tail)
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.token_type == TokenType::Punct && self.value == punct
    }
}
