use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;

use crate::sdf;
use crate::usda::token::{keyword_lexeme, Token};

/// Structural value parsing.
///
/// Values are decoded by their literal shape rather than by the authored type name:
/// dependency discovery only needs asset paths, strings and dictionaries, everything
/// else just has to be consumed correctly.
impl<'a> super::Parser<'a> {
    pub(super) fn parse_value(&mut self) -> Result<sdf::Value> {
        let token = self.peek_token()?;
        let value = match token {
            Token::Punctuation('[') => self.parse_array_value()?,
            Token::Punctuation('(') => {
                let mut items = Vec::new();
                self.parse_seq_fn(',', |this, _| {
                    items.push(this.parse_value()?);
                    Ok(())
                })?;
                sdf::Value::Tuple(items)
            }
            Token::Punctuation('{') => self.parse_dictionary()?,
            _ => self.parse_scalar()?,
        };
        Ok(value)
    }

    fn parse_scalar(&mut self) -> Result<sdf::Value> {
        let token = self.fetch_next()?;
        let value = match token {
            Token::None => sdf::Value::Blocked,
            Token::String(s) => sdf::Value::String(s.to_owned()),
            Token::AssetRef(s) => sdf::Value::AssetPath(s.to_owned()),
            Token::PathRef(s) => sdf::Value::Path(sdf::Path::new(s)?),
            Token::Number(raw) => Self::number_value(raw)?,
            Token::Inf => sdf::Value::Double(f64::INFINITY),
            Token::Punctuation(sign @ ('-' | '+')) => {
                let next = self.fetch_next()?;
                match next {
                    Token::Inf if sign == '-' => sdf::Value::Double(f64::NEG_INFINITY),
                    Token::Inf => sdf::Value::Double(f64::INFINITY),
                    other => bail!("Expected inf after '{sign}', got {other:?}"),
                }
            }
            Token::Identifier("true") => sdf::Value::Bool(true),
            Token::Identifier("false") => sdf::Value::Bool(false),
            Token::Identifier(s) | Token::NamespacedIdentifier(s) => sdf::Value::Token(s.to_owned()),
            other => match keyword_lexeme(&other) {
                Some(lexeme) => sdf::Value::Token(lexeme.to_owned()),
                None => bail!("Unexpected token for value: {other:?}"),
            },
        };
        Ok(value)
    }

    fn number_value(raw: &str) -> Result<sdf::Value> {
        if let Ok(int) = raw.parse::<i64>() {
            return Ok(sdf::Value::Int64(int));
        }
        raw.parse::<f64>()
            .map(sdf::Value::Double)
            .map_err(|err| anyhow!("Unable to parse number {raw}: {err}"))
    }

    pub(super) fn parse_number(&mut self) -> Result<f64> {
        self.parse_scalar()?
            .try_as_double()
            .ok_or_else(|| anyhow!("Number expected"))
    }

    /// Parse `[ ... ]`, collapsing homogeneous asset/string/token arrays into their vector forms.
    fn parse_array_value(&mut self) -> Result<sdf::Value> {
        let mut items = Vec::new();
        self.parse_array_fn(|this| {
            items.push(this.parse_value()?);
            Ok(())
        })?;

        fn collect(items: &[sdf::Value], pick: impl Fn(&sdf::Value) -> Option<&String>) -> Option<Vec<String>> {
            items.iter().map(|v| pick(v).cloned()).collect()
        }

        if items.is_empty() {
            return Ok(sdf::Value::Array(items));
        }
        if let Some(paths) = collect(&items, |v| match v {
            sdf::Value::AssetPath(s) => Some(s),
            _ => None,
        }) {
            return Ok(sdf::Value::AssetPathVec(paths));
        }
        if let Some(strings) = collect(&items, |v| match v {
            sdf::Value::String(s) => Some(s),
            _ => None,
        }) {
            return Ok(sdf::Value::StringVec(strings));
        }
        if let Some(tokens) = collect(&items, |v| match v {
            sdf::Value::Token(s) => Some(s),
            _ => None,
        }) {
            return Ok(sdf::Value::TokenVec(tokens));
        }
        Ok(sdf::Value::Array(items))
    }

    /// Parse a dictionary: `{ [type] key = value ... }`, with optional `;` or `,` separators.
    pub(super) fn parse_dictionary(&mut self) -> Result<sdf::Value> {
        self.ensure_pun('{').context("Dictionary must start with {")?;

        let mut dict = HashMap::new();
        loop {
            if self.eat_pun('}')? {
                break;
            }

            let first = self.fetch_next()?;
            // A type name precedes the key unless the entry is `key = value`.
            let typed = matches!(first, Token::Dictionary | Token::Identifier(_)) && !self.is_next(Token::Punctuation('='));
            let key_token = if typed { self.fetch_next()? } else { first };

            let key = match key_token {
                Token::Identifier(s) | Token::NamespacedIdentifier(s) | Token::String(s) => s.to_owned(),
                other => keyword_lexeme(&other)
                    .map(str::to_owned)
                    .ok_or_else(|| anyhow!("Expected dictionary key, got: {other:?}"))?,
            };

            self.ensure_pun('=')?;
            let value = self
                .parse_value()
                .with_context(|| format!("Unable to parse dictionary value for {key}"))?;
            dict.insert(key, value);

            if !self.eat_pun(';')? {
                self.eat_pun(',')?;
            }
        }

        Ok(sdf::Value::Dictionary(dict))
    }

    /// Parse time samples in the format `{ time: value, time: value, ... }`.
    pub(super) fn parse_time_samples(&mut self) -> Result<sdf::TimeSampleMap> {
        self.ensure_pun('{').context("Time samples must start with {")?;

        let mut samples = Vec::new();
        loop {
            if self.eat_pun('}')? {
                break;
            }

            let time = self.parse_number().context("Time sample time expected")?;
            self.ensure_pun(':').context("Expected ':' after time sample time")?;
            let value = self.parse_value()?;
            samples.push((time, value));

            self.eat_pun(',')?;
        }

        Ok(samples)
    }

    /// Generic array parser that delegates element parsing while handling delimiters.
    pub(super) fn parse_array_fn(&mut self, mut read_element: impl FnMut(&mut Self) -> Result<()>) -> Result<()> {
        self.ensure_pun('[').context("Array must start with [")?;

        let mut index = 0;
        loop {
            if self.eat_pun(']')? {
                break;
            }

            read_element(self).with_context(|| format!("Unable to read array element {index}"))?;
            index += 1;

            match self.fetch_next()? {
                Token::Punctuation(',') => continue,
                Token::Punctuation(']') => break,
                t => bail!("Either comma or closing bracket expected after value, got: {t:?}"),
            }
        }
        Ok(())
    }

    /// Parse delimiter-separated sequences like `(a, b)`.
    pub(super) fn parse_seq_fn(
        &mut self,
        delim: char,
        mut read_element: impl FnMut(&mut Self, usize) -> Result<()>,
    ) -> Result<()> {
        self.ensure_pun('(').context("Open paren expected")?;

        let mut index = 0;
        loop {
            if self.eat_pun(')')? {
                break;
            }

            read_element(self, index).with_context(|| format!("Unable to read element {index}"))?;
            index += 1;

            match self.fetch_next()? {
                Token::Punctuation(')') => break,
                Token::Punctuation(d) if d == delim => continue,
                t => bail!("Unexpected token between (): {t:?}"),
            }
        }
        Ok(())
    }
}
