//! Field names used by the scene description specs.

/// Metadata fields read or written by the text reader and the composition code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Active,
    ClipAssetPaths,
    ClipManifestAssetPath,
    ClipPrimPath,
    Clips,
    ConnectionPaths,
    Custom,
    Default,
    DefaultPrim,
    Documentation,
    InheritPaths,
    Kind,
    Payload,
    References,
    Specializes,
    Specifier,
    SubLayerOffsets,
    SubLayers,
    TargetPaths,
    TimeSamples,
    TypeName,
    Variability,
    VariantSelection,
    VariantSetNames,
}

impl FieldKey {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FieldKey::Active => "active",
            FieldKey::ClipAssetPaths => "clipAssetPaths",
            FieldKey::ClipManifestAssetPath => "clipManifestAssetPath",
            FieldKey::ClipPrimPath => "clipPrimPath",
            FieldKey::Clips => "clips",
            FieldKey::ConnectionPaths => "connectionPaths",
            FieldKey::Custom => "custom",
            FieldKey::Default => "default",
            FieldKey::DefaultPrim => "defaultPrim",
            FieldKey::Documentation => "documentation",
            FieldKey::InheritPaths => "inheritPaths",
            FieldKey::Kind => "kind",
            FieldKey::Payload => "payload",
            FieldKey::References => "references",
            FieldKey::Specializes => "specializes",
            FieldKey::Specifier => "specifier",
            FieldKey::SubLayerOffsets => "subLayerOffsets",
            FieldKey::SubLayers => "subLayers",
            FieldKey::TargetPaths => "targetPaths",
            FieldKey::TimeSamples => "timeSamples",
            FieldKey::TypeName => "typeName",
            FieldKey::Variability => "variability",
            FieldKey::VariantSelection => "variantSelection",
            FieldKey::VariantSetNames => "variantSetNames",
        }
    }
}

impl AsRef<str> for FieldKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Fields holding the names of child specs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildrenKey {
    PrimChildren,
    PropertyChildren,
    VariantChildren,
    VariantSetChildren,
}

impl ChildrenKey {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChildrenKey::PrimChildren => "primChildren",
            ChildrenKey::PropertyChildren => "properties",
            ChildrenKey::VariantChildren => "variantChildren",
            ChildrenKey::VariantSetChildren => "variantSetChildren",
        }
    }
}

impl AsRef<str> for ChildrenKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
