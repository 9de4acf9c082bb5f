//! Scene description foundations: paths, specs and the values stored on them.

mod list_op;
pub mod schema;

use anyhow::{bail, ensure, Result};
use std::collections::HashMap;
use std::fmt;

pub use list_op::{ListOp, ListOpKind};

/// A scene description path such as `/World/Chair{look=red}Seat.points`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path(String);

/// Shorthand for [`Path::new`].
pub fn path(value: &str) -> Result<Path> {
    Path::new(value)
}

impl Path {
    pub fn new(value: &str) -> Result<Self> {
        ensure!(!value.is_empty(), "Path must not be empty");
        ensure!(
            !value.chars().any(char::is_whitespace),
            "Path must not contain whitespace: {value:?}"
        );
        Ok(Path(value.to_owned()))
    }

    /// The pseudo-root `/`.
    pub fn abs_root() -> Self {
        Path("/".to_owned())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_abs_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a child prim name. Children of a variant path attach directly after the selection.
    pub fn append_path(&self, name: &str) -> Result<Self> {
        Self::check_name(name)?;
        let joined = if self.is_abs_root() {
            format!("/{name}")
        } else if self.0.ends_with('}') {
            format!("{}{name}", self.0)
        } else {
            format!("{}/{name}", self.0)
        };
        Ok(Path(joined))
    }

    pub fn append_property(&self, name: &str) -> Result<Self> {
        Self::check_name(name)?;
        ensure!(!self.is_abs_root(), "Properties cannot live on the pseudo-root");
        Ok(Path(format!("{}.{name}", self.0)))
    }

    pub fn append_variant_selection(&self, set: &str, variant: &str) -> Result<Self> {
        Self::check_name(set)?;
        Ok(Path(format!("{}{{{set}={variant}}}", self.0)))
    }

    /// Path of the variant set spec itself: `/Prim{set=}`.
    pub fn append_variant_set(&self, set: &str) -> Result<Self> {
        self.append_variant_selection(set, "")
    }

    /// Last prim name in the path, ignoring any trailing variant selection.
    pub fn name(&self) -> &str {
        let trimmed = match self.0.rfind('{') {
            Some(index) if self.0.ends_with('}') => &self.0[..index],
            _ => &self.0,
        };
        trimmed.rsplit(['/', '}']).next().unwrap_or_default()
    }

    fn check_name(name: &str) -> Result<()> {
        if name.is_empty() || name.contains('/') {
            bail!("Invalid path element: {name:?}");
        }
        Ok(())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecType {
    PseudoRoot,
    Prim,
    Attribute,
    Relationship,
    VariantSet,
    Variant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specifier {
    Def,
    Over,
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variability {
    Varying,
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerOffset {
    pub offset: f64,
    pub scale: f64,
}

impl Default for LayerOffset {
    fn default() -> Self {
        LayerOffset {
            offset: 0.0,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reference {
    pub asset_path: String,
    pub prim_path: Path,
    pub layer_offset: LayerOffset,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    pub asset_path: String,
    pub prim_path: Path,
    pub layer_offset: Option<LayerOffset>,
}

pub type TimeSampleMap = Vec<(f64, Value)>;

/// Values stored in spec fields.
///
/// Literal values are kept structurally; the authored type name lives in the `typeName` field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `None`, the blocked value.
    Blocked,
    Bool(bool),
    Int64(i64),
    Double(f64),
    String(String),
    Token(String),
    AssetPath(String),
    Path(Path),
    StringVec(Vec<String>),
    TokenVec(Vec<String>),
    AssetPathVec(Vec<String>),
    Tuple(Vec<Value>),
    Array(Vec<Value>),
    Dictionary(HashMap<String, Value>),
    TimeSamples(TimeSampleMap),
    Specifier(Specifier),
    Variability(Variability),
    LayerOffsetVec(Vec<LayerOffset>),
    VariantSelectionMap(HashMap<String, String>),
    PathListOp(ListOp<Path>),
    StringListOp(ListOp<String>),
    TokenListOp(ListOp<String>),
    ReferenceListOp(ListOp<Reference>),
    PayloadListOp(ListOp<Payload>),
}

impl Value {
    /// Text of a string, token or single asset path value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Token(s) | Value::AssetPath(s) => Some(s),
            _ => None,
        }
    }

    pub fn try_as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn try_as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int64(v) => Some(*v != 0),
            Value::Token(v) => match v.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Asset path array contents, also accepting plain string arrays.
    pub fn as_asset_paths(&self) -> Option<&[String]> {
        match self {
            Value::AssetPathVec(v) | Value::StringVec(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_string_vec(&self) -> Option<&[String]> {
        match self {
            Value::StringVec(v) | Value::TokenVec(v) | Value::AssetPathVec(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_reference_list_op(&self) -> Option<&ListOp<Reference>> {
        match self {
            Value::ReferenceListOp(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_payload_list_op(&self) -> Option<&ListOp<Payload>> {
        match self {
            Value::PayloadListOp(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_path_list_op(&self) -> Option<&ListOp<Path>> {
        match self {
            Value::PathListOp(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_variant_selection(&self) -> Option<&HashMap<String, String>> {
        match self {
            Value::VariantSelectionMap(map) => Some(map),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

/// A single spec: its type and field values.
#[derive(Debug, Clone, PartialEq)]
pub struct Spec {
    pub ty: SpecType,
    pub fields: HashMap<String, Value>,
}

impl Spec {
    pub fn new(ty: SpecType) -> Self {
        Spec {
            ty,
            fields: HashMap::new(),
        }
    }

    pub fn add(&mut self, key: impl AsRef<str>, value: impl Into<Value>) {
        self.fields.insert(key.as_ref().to_owned(), value.into());
    }

    pub fn get(&self, key: impl AsRef<str>) -> Option<&Value> {
        self.fields.get(key.as_ref())
    }

    /// Names stored in a children field such as `primChildren`.
    pub fn children(&self, key: schema::ChildrenKey) -> &[String] {
        self.get(key).and_then(Value::as_string_vec).unwrap_or_default()
    }

    pub fn is_prim_like(&self) -> bool {
        matches!(self.ty, SpecType::Prim | SpecType::Variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_child_paths() {
        let root = Path::abs_root();
        let world = root.append_path("World").unwrap();
        assert_eq!(world.as_str(), "/World");

        let chair = world.append_path("Chair").unwrap();
        assert_eq!(chair.as_str(), "/World/Chair");
        assert_eq!(chair.name(), "Chair");
    }

    #[test]
    fn children_of_variants_follow_selection() {
        let prim = path("/Asset").unwrap();
        let variant = prim.append_variant_selection("look", "red").unwrap();
        assert_eq!(variant.as_str(), "/Asset{look=red}");
        assert_eq!(variant.name(), "Asset");

        let child = variant.append_path("Geom").unwrap();
        assert_eq!(child.as_str(), "/Asset{look=red}Geom");
        assert_eq!(child.name(), "Geom");

        assert_eq!(prim.append_variant_set("look").unwrap().as_str(), "/Asset{look=}");
    }

    #[test]
    fn properties_and_invalid_names() {
        let prim = path("/A").unwrap();
        assert_eq!(prim.append_property("points").unwrap().as_str(), "/A.points");
        assert!(prim.append_path("").is_err());
        assert!(prim.append_path("a/b").is_err());
        assert!(Path::abs_root().append_property("x").is_err());
        assert!(Path::new("").is_err());
    }

    #[test]
    fn spec_children_default_to_empty() {
        let spec = Spec::new(SpecType::Prim);
        assert!(spec.children(schema::ChildrenKey::PrimChildren).is_empty());
    }
}
