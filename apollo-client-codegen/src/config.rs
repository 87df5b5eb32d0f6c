//! The configuration surface consumed by both renderers, deserialized from
//! the generator's config JSON.
//!
//! Only the keys the renderers actually branch on are modeled here; keys
//! that belong to the external `GraphQLCompiler`/CLI front-end (schema
//! parsing, file discovery) are carried through opaquely where they appear
//! at all (see [`SchemaDownloadConfig`]).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// `options.deprecatedEnumCases` / `warningsOnDeprecatedUsage` /
/// `schemaDocumentation`: a plain on/off switch spelled as a two-case enum
/// rather than a `bool`, so config JSON reads `"include"` / `"exclude"`
/// instead of `true`/`false`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Inclusion {
    Include,
    Exclude,
}

impl Inclusion {
    /// Whether this switch is set to `include`.
    pub fn is_include(self) -> bool {
        matches!(self, Self::Include)
    }
}

/// `options.conversionStrategies.enumCases`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EnumCasesStrategy {
    CamelCase,
    None,
}

impl EnumCasesStrategy {
    /// Applies this strategy to a raw GraphQL enum value name.
    pub fn apply(self, raw_value_name: &str) -> String {
        match self {
            Self::CamelCase => crate::casing::to_lower_camel_case(raw_value_name),
            Self::None => raw_value_name.to_string(),
        }
    }
}

/// `options.conversionStrategies`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionStrategies {
    pub enum_cases: EnumCasesStrategy,
}

/// `options.operationDocumentFormat`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationDocumentFormat {
    Document,
    OperationId,
}

/// One entry of `options.selectionSetInitializers`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionSetInitializer {
    All,
    NamedFragments,
    /// `.fragment(named: self)` — an initializer scoped to one named
    /// fragment, identified by the fragment's own (pre-render) name.
    Fragment { named: String },
}

/// One member of `experimentalFeatures.fieldMerging`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldMergingFeature {
    None,
    Ancestors,
    NamedFragments,
    Siblings,
    All,
}

/// `experimentalFeatures`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentalFeatures {
    #[serde(default)]
    pub field_merging: BTreeSet<FieldMergingFeature>,
}

impl ExperimentalFeatures {
    /// Whether `fieldMerging` is set to exactly `[.all]` — the one
    /// configuration under which an `.all` selection-set initializer is not
    /// suppressed.
    pub fn field_merging_is_all_only(&self) -> bool {
        self.field_merging == BTreeSet::from([FieldMergingFeature::All])
    }
}

/// `output.schemaTypes.moduleType.embeddedInTarget`'s own access modifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessModifier {
    Public,
    Internal,
}

/// `output.schemaTypes.moduleType`.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleType {
    SwiftPackage,
    Other,
    EmbeddedInTarget {
        name: String,
        access_modifier: AccessModifier,
    },
}

/// `options`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    pub deprecated_enum_cases: Inclusion,
    pub warnings_on_deprecated_usage: Inclusion,
    pub schema_documentation: Inclusion,
    pub conversion_strategies: ConversionStrategies,
    #[serde(default)]
    pub selection_set_initializers: Vec<SelectionSetInitializer>,
    pub operation_document_format: OperationDocumentFormat,
}

/// `output.schemaTypes`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTypesConfig {
    pub path: String,
    pub module_type: ModuleType,
}

/// `output`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    pub schema_types: SchemaTypesConfig,
}

/// `input`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputConfig {
    pub schema_path: String,
}

/// `schemaDownload`, carried opaquely: `apollo-client-cli`'s `--fetch-schema`
/// only needs to know whether this block is present, not its contents — the
/// actual download is an external collaborator not implemented here.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SchemaDownloadConfig {
    #[serde(flatten)]
    pub raw: serde_json::Map<String, serde_json::Value>,
}

/// The config JSON schema's core keys.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodegenConfig {
    pub schema_namespace: String,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub options: Options,
    #[serde(default)]
    pub experimental_features: ExperimentalFeatures,
    #[serde(default)]
    pub schema_download: Option<SchemaDownloadConfig>,
}

/// The three places an access keyword can attach in generated code; the
/// rules differ by context.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessSite {
    /// The `enum`/`struct` declaration itself.
    Declaration,
    /// A `static var`/`static let` member.
    StaticMember,
    /// An instance member (field accessor, `init`, `__data`).
    InstanceMember,
}

impl ModuleType {
    /// The access keyword (with trailing space, or empty) an enum
    /// declaration should carry: public in package/other module modes,
    /// else per-target (the embedded target's own modifier, applied
    /// directly — no static/instance distinction for enums).
    pub fn enum_access_keyword(&self) -> &'static str {
        match self {
            Self::SwiftPackage | Self::Other => "public ",
            Self::EmbeddedInTarget { access_modifier, .. } => match access_modifier {
                AccessModifier::Public => "public ",
                AccessModifier::Internal => "",
            },
        }
    }

    /// The access keyword a fragment/selection-set declaration's `site`
    /// should carry: public for package/other; for
    /// `embeddedInTarget(.public)` only on static members; omitted
    /// entirely for `embeddedInTarget(.internal)`.
    pub fn fragment_access_keyword(&self, site: AccessSite) -> &'static str {
        match self {
            Self::SwiftPackage | Self::Other => "public ",
            Self::EmbeddedInTarget {
                access_modifier: AccessModifier::Public,
                ..
            } => match site {
                AccessSite::StaticMember => "public ",
                AccessSite::Declaration | AccessSite::InstanceMember => "",
            },
            Self::EmbeddedInTarget {
                access_modifier: AccessModifier::Internal,
                ..
            } => "",
        }
    }
}
