use anyhow::{anyhow, bail, ensure, Context, Result};
use std::collections::HashMap;

use crate::sdf;
use crate::sdf::schema::{ChildrenKey, FieldKey};
use crate::usda::token::{keyword_lexeme, Token};

type SpecMap = HashMap<sdf::Path, sdf::Spec>;

/// Hierarchy parsing: pseudo-root, prims, variant sets and properties.
impl<'a> super::Parser<'a> {
    /// Parse the whole token stream into specs keyed by path.
    pub fn parse(&mut self) -> Result<SpecMap> {
        let mut data = HashMap::new();
        let root_path = sdf::Path::abs_root();

        let mut pseudo_root = self.read_pseudo_root().context("Unable to parse pseudo root")?;
        let mut root_children = Vec::new();

        while self.peek_next().is_some() {
            self.read_prim(&root_path, &mut root_children, &mut data)?;
        }

        pseudo_root.add(ChildrenKey::PrimChildren, sdf::Value::TokenVec(root_children));
        data.insert(root_path, pseudo_root);
        Ok(data)
    }

    /// Parse the `#usda 1.0` header and the layer metadata block.
    pub(super) fn read_pseudo_root(&mut self) -> Result<sdf::Spec> {
        let version = self
            .fetch_next()?
            .try_as_magic()
            .ok_or_else(|| anyhow!("Text file must start with '#usda' header"))?;
        ensure!(version == "1.0", "File must start with '#usda 1.0', got: {version:?}");

        let mut root = sdf::Spec::new(sdf::SpecType::PseudoRoot);
        if !self.eat_pun('(')? {
            return Ok(root);
        }

        loop {
            let next = self.fetch_next().context("Unable to fetch next layer metadata entry")?;
            match next {
                Token::Punctuation(')') => break,
                Token::Punctuation(';') => continue,
                Token::String(doc) => root.add(FieldKey::Documentation, doc),
                Token::SubLayers => {
                    self.ensure_pun('=')?;
                    let (sublayers, offsets) = self.parse_sublayers().context("Unable to parse subLayers")?;
                    root.add(FieldKey::SubLayers, sdf::Value::StringVec(sublayers));
                    root.add(FieldKey::SubLayerOffsets, sdf::Value::LayerOffsetVec(offsets));
                }
                Token::Doc => {
                    self.ensure_pun('=')?;
                    let value = self.fetch_str()?;
                    root.add(FieldKey::Documentation, value);
                }
                Token::Identifier(name) | Token::NamespacedIdentifier(name) => {
                    self.ensure_pun('=')?;
                    let value = self
                        .parse_value()
                        .with_context(|| format!("Unable to parse layer metadata {name}"))?;
                    root.fields.insert(name.to_owned(), value);
                }
                other => match keyword_lexeme(&other) {
                    Some(name) => {
                        self.ensure_pun('=')?;
                        let value = self.parse_value()?;
                        root.fields.insert(name.to_owned(), value);
                    }
                    None => bail!("Unexpected token in layer metadata: {other:?}"),
                },
            }
        }

        Ok(root)
    }

    /// Parse `subLayers = [@a@ (offset = 1), @b@]`.
    fn parse_sublayers(&mut self) -> Result<(Vec<String>, Vec<sdf::LayerOffset>)> {
        let mut sublayers = Vec::new();
        let mut offsets = Vec::new();

        self.parse_array_fn(|this| {
            let token = this.fetch_next()?;
            let asset = token
                .clone()
                .try_as_asset_ref()
                .ok_or_else(|| anyhow!("Asset ref expected in subLayers, got {token:?}"))?;
            sublayers.push(asset.to_owned());

            let mut layer_offset = sdf::LayerOffset::default();
            if this.is_next(Token::Punctuation('(')) {
                this.parse_arc_arguments(&mut layer_offset)?;
            }
            offsets.push(layer_offset);
            Ok(())
        })?;

        Ok((sublayers, offsets))
    }

    /// Parse a prim declaration and everything nested inside it.
    pub(super) fn read_prim(
        &mut self,
        parent_path: &sdf::Path,
        parent_children: &mut Vec<String>,
        data: &mut SpecMap,
    ) -> Result<()> {
        let mut spec = sdf::Spec::new(sdf::SpecType::Prim);

        let specifier = match self.fetch_next().context("Unable to read prim specifier")? {
            Token::Def => sdf::Specifier::Def,
            Token::Over => sdf::Specifier::Over,
            Token::Class => sdf::Specifier::Class,
            other => bail!("Unexpected prim specifier: {other:?}"),
        };

        let mut name_token = self.fetch_next()?;
        if let Token::Identifier(type_name) | Token::NamespacedIdentifier(type_name) = name_token {
            spec.add(FieldKey::TypeName, sdf::Value::Token(type_name.to_owned()));
            name_token = self.fetch_next()?;
        }

        let name = name_token
            .clone()
            .try_as_string()
            .ok_or_else(|| anyhow!("Unexpected token {name_token:?} (want prim name string)"))?;
        let prim_path = parent_path.append_path(name)?;
        parent_children.push(name.to_owned());

        if self.eat_pun('(')? {
            self.read_prim_metadata(&mut spec)
                .with_context(|| format!("Unable to parse metadata of {prim_path}"))?;
        }

        self.read_prim_body(&prim_path, &mut spec, data)
            .with_context(|| format!("Unable to parse body of {prim_path}"))?;

        spec.add(FieldKey::Specifier, sdf::Value::Specifier(specifier));
        data.insert(prim_path, spec);
        Ok(())
    }

    /// Parse `{ ... }` of a prim or variant, recording children on `spec`.
    fn read_prim_body(&mut self, path: &sdf::Path, spec: &mut sdf::Spec, data: &mut SpecMap) -> Result<()> {
        self.ensure_pun('{')?;

        let mut children = Vec::new();
        let mut properties = Vec::new();
        let mut variant_sets = Vec::new();

        loop {
            match self.peek_token().context("Unexpected end of prim body")? {
                Token::Punctuation('}') => {
                    self.fetch_next()?;
                    break;
                }
                Token::Punctuation(';') => {
                    self.fetch_next()?;
                }
                Token::Def | Token::Over | Token::Class => {
                    self.read_prim(path, &mut children, data)?;
                }
                Token::VariantSet => {
                    self.fetch_next()?;
                    let name = self.read_variant_set(path, data).context("Unable to read variant set")?;
                    variant_sets.push(name);
                }
                Token::Reorder => {
                    self.fetch_next()?;
                    match self.peek_token()? {
                        Token::Identifier("nameChildren" | "properties") => {
                            self.fetch_next()?;
                            self.ensure_pun('=')?;
                            self.parse_value()?;
                        }
                        _ => self.read_property(path, Some(Token::Reorder), &mut properties, data)?,
                    }
                }
                Token::Add | Token::Append | Token::Delete | Token::Prepend => {
                    let list_op = self.fetch_next()?;
                    self.read_property(path, Some(list_op), &mut properties, data)?;
                }
                _ => self.read_property(path, None, &mut properties, data)?,
            }
        }

        spec.add(ChildrenKey::PrimChildren, sdf::Value::TokenVec(children));
        spec.add(ChildrenKey::PropertyChildren, sdf::Value::TokenVec(properties));
        if !variant_sets.is_empty() {
            spec.add(ChildrenKey::VariantSetChildren, sdf::Value::TokenVec(variant_sets));
        }
        Ok(())
    }

    /// Parse `variantSet "name" = { "a" (meta) { ... } "b" { ... } }` and return the set name.
    fn read_variant_set(&mut self, prim_path: &sdf::Path, data: &mut SpecMap) -> Result<String> {
        let set_name = self.fetch_str().context("Expected variant set name")?.to_owned();
        self.ensure_pun('=')?;
        self.ensure_pun('{')?;

        let mut variants = Vec::new();
        loop {
            if self.eat_pun('}')? {
                break;
            }

            let variant_name = self.fetch_str().context("Expected variant name")?.to_owned();
            let variant_path = prim_path.append_variant_selection(&set_name, &variant_name)?;
            let mut variant_spec = sdf::Spec::new(sdf::SpecType::Variant);

            if self.eat_pun('(')? {
                self.read_prim_metadata(&mut variant_spec)
                    .with_context(|| format!("Unable to parse metadata of {variant_path}"))?;
            }

            self.read_prim_body(&variant_path, &mut variant_spec, data)
                .with_context(|| format!("Unable to parse body of {variant_path}"))?;

            data.insert(variant_path, variant_spec);
            variants.push(variant_name);
        }

        let set_path = prim_path.append_variant_set(&set_name)?;
        let set_spec = data
            .entry(set_path)
            .or_insert_with(|| sdf::Spec::new(sdf::SpecType::VariantSet));
        let mut existing = set_spec
            .get(ChildrenKey::VariantChildren)
            .and_then(sdf::Value::as_string_vec)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        existing.extend(variants);
        set_spec.add(ChildrenKey::VariantChildren, sdf::Value::TokenVec(existing));

        Ok(set_name)
    }

    /// Parse an attribute or relationship declaration.
    ///
    /// Only the declaration shape, type name and default value are kept.
    fn read_property(
        &mut self,
        prim_path: &sdf::Path,
        list_op: Option<Token<'a>>,
        properties: &mut Vec<String>,
        data: &mut SpecMap,
    ) -> Result<()> {
        let mut custom = false;
        let mut variability = sdf::Variability::Varying;

        loop {
            match self.peek_token()? {
                Token::Custom => custom = true,
                Token::Uniform => variability = sdf::Variability::Uniform,
                Token::Varying => variability = sdf::Variability::Varying,
                _ => break,
            }
            self.fetch_next()?;
        }

        let is_relationship = self.is_next(Token::Rel);
        let mut spec = if is_relationship {
            self.fetch_next()?;
            sdf::Spec::new(sdf::SpecType::Relationship)
        } else {
            let type_token = self.fetch_next()?;
            let type_name = match type_token {
                Token::Identifier(s) | Token::NamespacedIdentifier(s) => s,
                Token::Dictionary => "dictionary",
                other => bail!("Expected property type name, got {other:?}"),
            };
            let mut spec = sdf::Spec::new(sdf::SpecType::Attribute);
            spec.add(FieldKey::TypeName, sdf::Value::Token(type_name.to_owned()));
            spec
        };

        let name_token = self.fetch_next()?;
        let full_name = match name_token {
            Token::Identifier(s) | Token::NamespacedIdentifier(s) => s,
            other => keyword_lexeme(&other).ok_or_else(|| anyhow!("Unexpected property name token: {other:?}"))?,
        };

        let (name, suffix) = match full_name.rsplit_once('.') {
            Some((name, suffix @ ("connect" | "timeSamples" | "spline"))) => (name, Some(suffix)),
            _ => (full_name, None),
        };

        if self.is_next(Token::Punctuation('(')) {
            self.read_property_metadata(&mut spec)
                .with_context(|| format!("Unable to parse metadata of property {name}"))?;
        }

        if self.eat_pun('=')? {
            match suffix {
                Some("timeSamples") => {
                    let samples = self.parse_time_samples().context("Unable to parse time samples")?;
                    spec.add(FieldKey::TimeSamples, sdf::Value::TimeSamples(samples));
                }
                Some("spline") => {
                    self.parse_value().context("Unable to parse spline")?;
                }
                Some(_) | None if is_relationship || suffix == Some("connect") => {
                    // An explicit empty target list replaces weaker opinions.
                    let op = match self.peek_token()? {
                        Token::Add | Token::Append | Token::Delete | Token::Prepend | Token::Reorder => {
                            Some(self.fetch_next()?)
                        }
                        _ => list_op.clone(),
                    };
                    let targets = self.parse_item_list(|this| this.parse_path_reference())?;
                    let targets = self.apply_list_op(op, targets)?;
                    let key = if is_relationship {
                        FieldKey::TargetPaths
                    } else {
                        FieldKey::ConnectionPaths
                    };
                    spec.add(key, sdf::Value::PathListOp(targets));
                }
                _ => {
                    let value = self
                        .parse_value()
                        .with_context(|| format!("Unable to parse value of property {name}"))?;
                    spec.add(FieldKey::Default, value);
                }
            }

            if self.is_next(Token::Punctuation('(')) {
                self.read_property_metadata(&mut spec)
                    .with_context(|| format!("Unable to parse metadata of property {name}"))?;
            }
        }

        spec.add(FieldKey::Custom, sdf::Value::Bool(custom));
        spec.add(FieldKey::Variability, sdf::Value::Variability(variability));

        let path = prim_path.append_property(name)?;
        match data.get_mut(&path) {
            // `float a = 1` and `float a.timeSamples = {...}` describe the same attribute.
            Some(existing) => existing.fields.extend(spec.fields),
            None => {
                properties.push(name.to_owned());
                data.insert(path, spec);
            }
        }
        Ok(())
    }
}
