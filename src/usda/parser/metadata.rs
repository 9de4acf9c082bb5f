use anyhow::{anyhow, bail, ensure, Context, Result};
use std::collections::HashMap;

use crate::sdf;
use crate::sdf::schema::FieldKey;
use crate::usda::token::{keyword_lexeme, Token};

/// Metadata parsing for prims, variants and properties.
impl<'a> super::Parser<'a> {
    /// Parse prim or variant metadata entries up to and including the closing `)`.
    pub(super) fn read_prim_metadata(&mut self, spec: &mut sdf::Spec) -> Result<()> {
        loop {
            let token = self.fetch_next().context("Unexpected end of prim metadata")?;
            match token {
                Token::Punctuation(')') => break,
                Token::Punctuation(';') => continue,
                Token::String(doc) => spec.add(FieldKey::Documentation, doc),
                other => self
                    .read_prim_metadata_entry(other, spec)
                    .context("Unable to parse prim metadata entry")?,
            }
        }
        Ok(())
    }

    /// Parse a single prim metadata assignment, honoring list ops for composition fields.
    fn read_prim_metadata_entry(&mut self, token: Token<'a>, spec: &mut sdf::Spec) -> Result<()> {
        let (list_op, name_token) = match token {
            Token::Add | Token::Append | Token::Delete | Token::Prepend | Token::Reorder => (Some(token), self.fetch_next()?),
            _ => (None, token),
        };

        let name = match name_token {
            Token::Identifier(s) | Token::NamespacedIdentifier(s) => s,
            Token::Inherits => FieldKey::InheritPaths.as_str(),
            Token::Variants => FieldKey::VariantSelection.as_str(),
            Token::VariantSets => FieldKey::VariantSetNames.as_str(),
            Token::Doc => FieldKey::Documentation.as_str(),
            other => keyword_lexeme(&other).ok_or_else(|| anyhow!("Unexpected metadata name token: {other:?}"))?,
        };

        self.ensure_pun('=')?;

        match name {
            n if n == FieldKey::References.as_str() => {
                let references = self
                    .parse_item_list(|this| this.parse_reference())
                    .context("Unable to parse references")?;
                let list_op = self.apply_list_op(list_op, references)?;
                Self::merge_list_op(spec, FieldKey::References, sdf::Value::ReferenceListOp(list_op));
            }
            n if n == FieldKey::Payload.as_str() => {
                let payloads = self
                    .parse_item_list(|this| this.parse_payload())
                    .context("Unable to parse payloads")?;
                let list_op = self.apply_list_op(list_op, payloads)?;
                Self::merge_list_op(spec, FieldKey::Payload, sdf::Value::PayloadListOp(list_op));
            }
            n if n == FieldKey::InheritPaths.as_str() || n == FieldKey::Specializes.as_str() => {
                let paths = self
                    .parse_item_list(|this| this.parse_path_reference())
                    .with_context(|| format!("Unable to parse {n} paths"))?;
                let list_op = self.apply_list_op(list_op, paths)?;
                let key = if n == FieldKey::InheritPaths.as_str() {
                    FieldKey::InheritPaths
                } else {
                    FieldKey::Specializes
                };
                Self::merge_list_op(spec, key, sdf::Value::PathListOp(list_op));
            }
            n if n == FieldKey::VariantSetNames.as_str() => {
                let names = self
                    .parse_item_list(|this| Ok(this.fetch_text()?.to_owned()))
                    .context("Unable to parse variantSets")?;
                let list_op = self.apply_list_op(list_op, names)?;
                Self::merge_list_op(spec, FieldKey::VariantSetNames, sdf::Value::StringListOp(list_op));
            }
            "apiSchemas" => {
                let names = self
                    .parse_item_list(|this| Ok(this.fetch_text()?.to_owned()))
                    .context("Unable to parse apiSchemas")?;
                let list_op = self.apply_list_op(list_op, names)?;
                spec.add("apiSchemas", sdf::Value::TokenListOp(list_op));
            }
            n if n == FieldKey::VariantSelection.as_str() => {
                ensure!(list_op.is_none(), "variants metadata does not support list ops");
                let selections = self
                    .parse_variant_selection_map()
                    .context("Unable to parse variant selections")?;
                spec.add(FieldKey::VariantSelection, sdf::Value::VariantSelectionMap(selections));
            }
            n if n == FieldKey::Active.as_str() => {
                ensure!(list_op.is_none(), "active metadata does not support list ops");
                let value = self.parse_value()?;
                let active = value.try_as_bool().context("Unable to parse active flag")?;
                spec.add(FieldKey::Active, sdf::Value::Bool(active));
            }
            other => {
                ensure!(list_op.is_none(), "Metadata '{other}' does not support list ops");
                let value = self
                    .parse_value()
                    .with_context(|| format!("Unable to parse prim metadata {other}"))?;
                spec.fields.insert(other.to_owned(), value);
            }
        }

        Ok(())
    }

    /// Insert a list op field, folding it into an existing one authored on the same spec.
    fn merge_list_op(spec: &mut sdf::Spec, key: FieldKey, value: sdf::Value) {
        use sdf::Value as V;

        let value = match (spec.fields.get_mut(key.as_str()), value) {
            (Some(V::ReferenceListOp(existing)), V::ReferenceListOp(new)) => return existing.merge(new),
            (Some(V::PayloadListOp(existing)), V::PayloadListOp(new)) => return existing.merge(new),
            (Some(V::PathListOp(existing)), V::PathListOp(new)) => return existing.merge(new),
            (Some(V::StringListOp(existing)), V::StringListOp(new)) => return existing.merge(new),
            (_, value) => value,
        };
        spec.add(key, value);
    }

    /// Parse a variant selection map `{ string look = "red" }`.
    fn parse_variant_selection_map(&mut self) -> Result<HashMap<String, String>> {
        self.ensure_pun('{').context("Variant selection must start with {")?;

        let mut selections = HashMap::new();
        loop {
            if self.eat_pun('}')? {
                break;
            }

            match self.fetch_next()? {
                Token::Identifier("string") => {}
                other => bail!("Expected 'string' type in variant selection, got: {other:?}"),
            }

            let name = self.fetch_text().context("Expected variant set name")?.to_owned();
            self.ensure_pun('=')?;
            let value = self.fetch_str().context("Expected variant selection value")?.to_owned();
            selections.insert(name, value);

            if !self.eat_pun(';')? {
                self.eat_pun(',')?;
            }
        }

        Ok(selections)
    }

    /// Parse `( key = value ... )` attached to a property.
    pub(super) fn read_property_metadata(&mut self, spec: &mut sdf::Spec) -> Result<()> {
        self.ensure_pun('(')?;

        loop {
            let token = self.fetch_next().context("Unexpected end of property metadata")?;
            let name = match token {
                Token::Punctuation(')') => break,
                Token::Punctuation(';') | Token::Punctuation(',') => continue,
                Token::String(doc) => {
                    spec.add(FieldKey::Documentation, doc);
                    continue;
                }
                Token::Doc => FieldKey::Documentation.as_str(),
                Token::Identifier(s) | Token::NamespacedIdentifier(s) => s,
                other => keyword_lexeme(&other).ok_or_else(|| anyhow!("Unexpected property metadata name: {other:?}"))?,
            };

            self.ensure_pun('=')?;
            let value = self
                .parse_value()
                .with_context(|| format!("Unable to parse property metadata {name}"))?;
            spec.fields.insert(name.to_owned(), value);
        }

        Ok(())
    }
}
