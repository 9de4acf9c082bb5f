use anyhow::{anyhow, ensure, Context, Result};

use crate::usda::token::Token;

type LexResult<'source> = std::result::Result<Token<'source>, ()>;

/// Token stream operations.
impl<'a> super::Parser<'a> {
    /// Fetch the next token and remember its span for error reporting.
    #[inline]
    pub(super) fn fetch_next(&mut self) -> Result<Token<'a>> {
        let (token, span) = self.iter.next().context("Unexpected end of tokens")?;
        self.last_span = Some(span.clone());
        token.map_err(|_| anyhow!("Unrecognized input at byte {}", span.start))
    }

    #[inline]
    pub(super) fn peek_next(&mut self) -> Option<&LexResult<'a>> {
        self.iter.peek().map(|(token, _)| token)
    }

    /// Peek at the next token, failing at end of input or on a lexer error.
    pub(super) fn peek_token(&mut self) -> Result<Token<'a>> {
        match self.iter.peek() {
            Some((Ok(token), _)) => Ok(token.clone()),
            Some((Err(_), span)) => Err(anyhow!("Unrecognized input at byte {}", span.start)),
            None => Err(anyhow!("Unexpected end of tokens")),
        }
    }

    #[inline]
    pub(super) fn is_next(&mut self, expected: Token) -> bool {
        matches!(self.peek_next(), Some(Ok(t)) if *t == expected)
    }

    /// Consume the next token if it is the given punctuation.
    pub(super) fn eat_pun(&mut self, value: char) -> Result<bool> {
        if self.is_next(Token::Punctuation(value)) {
            self.fetch_next()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub(super) fn ensure_next(&mut self, expected_token: Token) -> Result<()> {
        let token = self.fetch_next()?;
        ensure!(
            token == expected_token,
            "Unexpected token (want: {expected_token:?}, got {token:?})"
        );
        Ok(())
    }

    #[inline]
    pub(super) fn ensure_pun(&mut self, value: char) -> Result<()> {
        self.ensure_next(Token::Punctuation(value))
            .with_context(|| format!("Punctuation '{value}' expected"))
    }

    /// Fetch the next token and ensure it's a string.
    pub(super) fn fetch_str(&mut self) -> Result<&'a str> {
        let token = self.fetch_next()?;
        token
            .clone()
            .try_as_string()
            .ok_or_else(|| anyhow!("Unexpected token {token:?} (want String)"))
    }

    /// Fetch a string or bare identifier, as used for tokens in metadata.
    pub(super) fn fetch_text(&mut self) -> Result<&'a str> {
        match self.fetch_next()? {
            Token::String(s) | Token::Identifier(s) | Token::NamespacedIdentifier(s) => Ok(s),
            other => Err(anyhow!("Unexpected token {other:?} (want String or Identifier)")),
        }
    }
}
