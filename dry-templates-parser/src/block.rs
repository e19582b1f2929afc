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

//! Template blocks
//!
//! Blocks are opened, continued and closed by expressions:
//!
//! - `{{if a}}...{{else if b}}...{{else}}...{{/if}}` builds one
//!   [`ConditionalBlock`] with a branch per expression
//! - `{{unless a}}...{{/}}` is a conditional with one branch
//! - `{{each items as #item}}...{{else}}...{{/each}}` builds an [`EachBlock`],
//!   whose else branch renders for empty lists
//! - `{{with a}}...{{/with}}`, `{{unbound}}...{{/}}` and any custom keyword
//!   build a generic [`Block`]
//!
//! A generic `{{/}}` closes any block; a named ending must match the keyword
//! that opened the block.

use std::collections::HashMap;

use log::trace;

use crate::compiler::Parse;
use crate::error::{ErrorKind, ParseError, Result};
use crate::expression::{BlockType, Expression};
use crate::template::{Block, ConditionalBlock, EachBlock, Node};

/// How a block keyword is assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Branches guarded by expressions, continued by `else if` and `else`
    Conditional,
    /// A loop, continued by a single `else`
    Each,
    /// A single content list
    Generic,
}

/// Map of block keywords to the kind of block they open
pub type BlockMap = HashMap<&'static str, BlockKind>;

/// Adds the built-in block keywords to the block map
pub fn add_builtins(map: &mut BlockMap) {
    map.insert("if", BlockKind::Conditional);
    map.insert("unless", BlockKind::Conditional);
    map.insert("each", BlockKind::Each);
    map.insert("with", BlockKind::Generic);
}

fn mismatched(expression: &Expression) -> ParseError {
    ParseError::new(
        ErrorKind::MismatchedBlock,
        format!("Mismatched closing template tag: {}", expression.meta.source),
    )
}

fn unexpected_else(expression: &Expression) -> ParseError {
    ParseError::new(
        ErrorKind::UnexpectedElse,
        format!("Error parsing template: {}", expression.meta.source),
    )
}

impl Parse<'_> {
    /// Opens, continues or closes a block
    pub(crate) fn parse_block_expression(&mut self, expression: Expression) -> Result<()> {
        let Some(block_type) = expression.meta.block_type.clone() else {
            self.stack.append(Node::DynamicText(expression));
            return Ok(());
        };
        if expression.meta.is_end {
            self.close_block(&expression, &block_type)
        } else if matches!(block_type, BlockType::Else | BlockType::ElseIf) {
            self.continue_block(expression, &block_type)
        } else {
            self.open_block(expression, &block_type)
        }
    }

    fn close_block(&mut self, expression: &Expression, block_type: &BlockType) -> Result<()> {
        let content = self.stack.pop().map_err(|_| mismatched(expression))?;
        let node = self.stack.last_mut().ok_or_else(|| mismatched(expression))?;
        let opened = node
            .block_expression()
            .and_then(|opener| opener.meta.block_type.as_ref())
            .ok_or_else(|| mismatched(expression))?;
        if *block_type != BlockType::End && block_type != opened {
            return Err(mismatched(expression));
        }
        trace!("closed {} block", opened.as_str());
        if let Some(slot) = node.open_content() {
            *slot = content;
        }
        Ok(())
    }

    fn continue_block(&mut self, expression: Expression, block_type: &BlockType) -> Result<()> {
        let content = self.stack.pop().map_err(|_| unexpected_else(&expression))?;
        match self.stack.last_mut() {
            Some(Node::Conditional(block)) => {
                if let Some(slot) = block.contents.last_mut() {
                    *slot = content;
                }
                block.expressions.push(expression);
                block.contents.push(Vec::new());
            }
            Some(Node::Each(block))
                if *block_type == BlockType::Else && block.else_content.is_none() =>
            {
                block.content = content;
                block.else_content = Some(Vec::new());
            }
            _ => return Err(unexpected_else(&expression)),
        }
        self.stack.push();
        Ok(())
    }

    fn open_block(&mut self, expression: Expression, block_type: &BlockType) -> Result<()> {
        let node = match self.compiler.block_kind(block_type) {
            BlockKind::Conditional => Node::Conditional(ConditionalBlock {
                expressions: vec![expression],
                contents: vec![Vec::new()],
            }),
            BlockKind::Each => Node::Each(EachBlock {
                expression,
                content: Vec::new(),
                else_content: None,
            }),
            BlockKind::Generic => Node::Block(Block {
                expression,
                content: Vec::new(),
            }),
        };
        trace!("opened {} block", block_type.as_str());
        self.stack.append(node);
        self.stack.push();
        Ok(())
    }
}
