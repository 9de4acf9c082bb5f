mod composition;
mod error;
mod hierarchy;
mod metadata;
mod token_ops;
mod value;

use logos::Logos;
use std::iter::Peekable;
use std::ops::Range;

use crate::usda::token::Token;

pub use error::SourceLocation;

/// Parser translates a list of tokens into specs.
pub struct Parser<'a> {
    iter: Peekable<logos::SpannedIter<'a, Token<'a>>>,
    source: &'a str,
    last_span: Option<Range<usize>>,
}

impl<'a> Parser<'a> {
    pub fn new(data: &'a str) -> Self {
        Self {
            iter: Token::lexer(data).spanned().peekable(),
            source: data,
            last_span: None,
        }
    }

    /// Location of the most recent token consumed, for error messages.
    pub fn last_location(&self) -> Option<SourceLocation> {
        self.last_span
            .clone()
            .and_then(|span| SourceLocation::from_span(self.source, span))
    }
}
