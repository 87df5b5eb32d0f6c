//! A small, parser-independent intermediate representation for a single
//! GraphQL fragment, consumed by [`super::renderer::render_fragment`].
//!
//! This is deliberately not a general GraphQL AST: it carries only what the
//! renderer needs to decide emission (field names/types, nesting, fragment
//! spreads) and is meant to be hand-constructed in tests the same way
//! `juniper_codegen`'s `Definition` structs are unit-tested independent of
//! a full macro expansion. A real implementation would build this from the
//! external `GraphQLCompiler`/IR collaborators this crate does not
//! implement.

/// The GraphQL kind a fragment's type condition resolves to, which decides
/// the `Objects.`/`Interfaces.`/`Unions.` namespace prefix of its
/// `__parentType`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TypeCondition {
    Object(String),
    Interface(String),
    Union(String),
}

impl TypeCondition {
    /// The schema type name this condition names, regardless of kind.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Object(name) | Self::Interface(name) | Self::Union(name) => name,
        }
    }

    fn namespace_segment(&self) -> &'static str {
        match self {
            Self::Object(_) => "Objects",
            Self::Interface(_) => "Interfaces",
            Self::Union(_) => "Unions",
        }
    }
}

/// One field selected directly in a fragment's (or a nested composite
/// selection's) selections.
#[derive(Clone, Debug)]
pub struct FieldIr {
    /// The field's name as it appears in the selection (and, absent a
    /// schema-customization rename, the accessor name).
    pub name: String,
    /// The Swift type text the field accessor should declare, e.g.
    /// `"String"`, `"String?"`, `"[Friend]"`.
    pub swift_type: String,
    /// Present when this field's own selection set has nested selections
    /// (an object/interface/union-typed field), so `__typename` injection
    /// and the `__selections` entry know to recurse.
    pub nested_selections: Option<Vec<SelectionIr>>,
}

impl FieldIr {
    /// Builds a leaf scalar field.
    pub fn scalar(name: impl Into<String>, swift_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            swift_type: swift_type.into(),
            nested_selections: None,
        }
    }

    /// Builds a composite (object/interface/union-typed) field with its own
    /// nested selections.
    pub fn composite(
        name: impl Into<String>,
        swift_type: impl Into<String>,
        nested_selections: Vec<SelectionIr>,
    ) -> Self {
        Self {
            name: name.into(),
            swift_type: swift_type.into(),
            nested_selections: Some(nested_selections),
        }
    }

    /// Whether this field carries its own nested selection set.
    pub fn is_composite(&self) -> bool {
        self.nested_selections.is_some()
    }
}

/// One member of a selection set: a field, a named fragment spread, or an
/// inline fragment.
#[derive(Clone, Debug)]
pub enum SelectionIr {
    Field(FieldIr),
    FragmentSpread(String),
    InlineFragment {
        type_condition: TypeCondition,
        selections: Vec<SelectionIr>,
    },
}

/// A single GraphQL fragment definition, as handed to
/// [`super::renderer::render_fragment`].
#[derive(Clone, Debug)]
pub struct FragmentIr {
    /// The fragment's name exactly as it appears in the document.
    pub name: String,
    /// The fragment's `on <Type>` condition.
    pub type_condition: TypeCondition,
    /// The fragment's direct selections.
    pub selections: Vec<SelectionIr>,
    /// Whether `@apollo_client_ios_localCacheMutation` is present.
    pub is_local_cache_mutation: bool,
    /// `@import(module:)` module names, in declaration order.
    pub imported_modules: Vec<String>,
    /// The fragment's original GraphQL document text, reprinted (with
    /// `__typename` injected and the local-cache-mutation directive
    /// stripped) into `fragmentDefinition`. `None` when the caller has no
    /// source text to reprint (e.g. a synthetic fragment built directly
    /// from IR with no backing document).
    pub source_text: Option<String>,
}

impl TypeCondition {
    /// Renders `<SchemaNamespace>.<Kind>.<TypeName>` for `__parentType`.
    pub fn render_parent_type(&self, schema_namespace: &str) -> String {
        format!("{schema_namespace}.{}.{}", self.namespace_segment(), self.type_name())
    }
}
