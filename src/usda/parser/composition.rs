use anyhow::{anyhow, bail, Context, Result};

use crate::sdf;
use crate::usda::token::Token;

/// Composition arc parsing: references, payloads, inherit paths and list ops.
impl<'a> super::Parser<'a> {
    /// Parse an asset path plus optional prim path, shared by references and payloads.
    ///
    /// A bare `<path>` with no asset names an internal arc, so the asset path is left empty.
    fn parse_arc_target(&mut self, what: &str) -> Result<(String, sdf::Path)> {
        let token = self.fetch_next()?;
        let (asset_path, prim_path) = match token {
            Token::AssetRef(asset) => {
                let prim_path = if matches!(self.peek_next(), Some(Ok(Token::PathRef(..)))) {
                    self.parse_path_reference()?
                } else {
                    sdf::Path::default()
                };
                (asset.to_owned(), prim_path)
            }
            Token::PathRef(path) => (String::new(), sdf::Path::new(path)?),
            other => bail!("Asset or path reference expected for {what}, got {other:?}"),
        };
        Ok((asset_path, prim_path))
    }

    pub(super) fn parse_reference(&mut self) -> Result<sdf::Reference> {
        let (asset_path, prim_path) = self.parse_arc_target("reference")?;
        let mut reference = sdf::Reference {
            asset_path,
            prim_path,
            layer_offset: sdf::LayerOffset::default(),
        };

        if self.is_next(Token::Punctuation('(')) {
            self.parse_arc_arguments(&mut reference.layer_offset)
                .context("Unable to parse reference arguments")?;
        }

        Ok(reference)
    }

    pub(super) fn parse_payload(&mut self) -> Result<sdf::Payload> {
        let (asset_path, prim_path) = self.parse_arc_target("payload")?;
        let mut payload = sdf::Payload {
            asset_path,
            prim_path,
            layer_offset: None,
        };

        if self.is_next(Token::Punctuation('(')) {
            let mut layer_offset = sdf::LayerOffset::default();
            self.parse_arc_arguments(&mut layer_offset)
                .context("Unable to parse payload arguments")?;
            payload.layer_offset = Some(layer_offset);
        }

        Ok(payload)
    }

    /// Parse `(offset = ...; scale = ...)` blocks attached to arcs and sublayers.
    ///
    /// Reference `customData` entries are accepted and discarded.
    pub(super) fn parse_arc_arguments(&mut self, layer_offset: &mut sdf::LayerOffset) -> Result<()> {
        self.ensure_pun('(')?;

        loop {
            if self.eat_pun(')')? {
                break;
            }

            let token = self.fetch_next()?;
            self.ensure_pun('=')?;
            match token {
                Token::Offset => {
                    layer_offset.offset = self.parse_number().context("Expected number for offset")?;
                }
                Token::Scale => {
                    layer_offset.scale = self.parse_number().context("Expected number for scale")?;
                }
                Token::CustomData => {
                    self.parse_value().context("Unable to parse arc customData")?;
                }
                unexpected => bail!("Unexpected token in arc arguments: {unexpected:?}"),
            }

            if !self.eat_pun(';')? {
                self.eat_pun(',')?;
            }
        }

        Ok(())
    }

    /// Parse a single item or a bracketed list of items, `None` meaning an empty list.
    pub(super) fn parse_item_list<T>(&mut self, mut read_item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        if self.is_next(Token::None) {
            self.fetch_next()?;
            return Ok(Vec::new());
        }

        if self.is_next(Token::Punctuation('[')) {
            let mut out = Vec::new();
            self.parse_array_fn(|this| {
                out.push(read_item(this)?);
                Ok(())
            })?;
            Ok(out)
        } else {
            Ok(vec![read_item(self)?])
        }
    }

    pub(super) fn parse_path_reference(&mut self) -> Result<sdf::Path> {
        let token = self.fetch_next()?;
        let path_str = token
            .clone()
            .try_as_path_ref()
            .ok_or_else(|| anyhow!("Path reference expected, got {token:?}"))?;
        sdf::Path::new(path_str)
    }

    /// Build a ListOp from an optional list operation token and items.
    pub(super) fn apply_list_op<T>(&mut self, op: Option<Token<'a>>, items: Vec<T>) -> Result<sdf::ListOp<T>>
    where
        T: Default + Clone + PartialEq,
    {
        let mut list = sdf::ListOp::default();

        match op {
            None => {
                list.explicit = true;
                list.explicit_items = items;
            }
            Some(Token::Prepend) => list.prepended_items = items,
            Some(Token::Append) => list.appended_items = items,
            Some(Token::Add) => list.added_items = items,
            Some(Token::Delete) => list.deleted_items = items,
            Some(Token::Reorder) => list.ordered_items = items,
            other => bail!("Unsupported list op: {other:?}"),
        }

        Ok(list)
    }
}
