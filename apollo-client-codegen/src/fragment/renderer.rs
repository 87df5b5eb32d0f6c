//! Emits a fragment's generated `SelectionSet` struct.

use super::ir::{FieldIr, FragmentIr, SelectionIr, TypeCondition};
use crate::config::{AccessSite, CodegenConfig, OperationDocumentFormat, SelectionSetInitializer};
use crate::reserved::is_reserved_type_name;

fn first_uppercase(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn resolve_struct_name(fragment_name: &str) -> String {
    let uppercased = first_uppercase(fragment_name);
    if is_reserved_type_name(&uppercased) {
        format!("{uppercased}_Fragment")
    } else {
        uppercased
    }
}

fn render_schema_namespace(namespace: &str) -> String {
    let entirely_lowercase = namespace.chars().any(|c| c.is_alphabetic()) && namespace.chars().all(|c| !c.is_uppercase());
    if entirely_lowercase {
        first_uppercase(namespace)
    } else {
        namespace.to_string()
    }
}

/// Strips the local-cache-mutation directive token from reprinted source
/// text, as part of rendering `fragmentDefinition`.
fn strip_local_cache_mutation_directive(source: &str) -> String {
    source
        .replace(" @apollo_client_ios_localCacheMutation", "")
        .replace("@apollo_client_ios_localCacheMutation", "")
}

/// Reprints `source`, injecting `__typename` as the first line inside every
/// composite selection set's opening brace (unless already present) and
/// stripping the local-cache-mutation directive.
///
/// This is a line-oriented reprinter, not a GraphQL parser: it assumes
/// `source` is already reasonably formatted (one selection/brace per line),
/// which holds for text handed down by the external `GraphQLCompiler`/IR
/// collaborators this crate does not implement.
pub fn reprint_with_injected_typename(source: &str) -> String {
    let stripped = strip_local_cache_mutation_directive(source);
    let lines: Vec<&str> = stripped.lines().collect();
    let mut out = String::new();
    let mut depth: usize = 0;
    let mut index = 0;
    while index < lines.len() {
        let trimmed = lines[index].trim();
        out.push_str(&"  ".repeat(depth));
        out.push_str(trimmed);
        out.push('\n');
        if trimmed.ends_with('{') {
            depth += 1;
            let next_trimmed = lines.get(index + 1).map(|line| line.trim()).unwrap_or("");
            if next_trimmed != "__typename" {
                out.push_str(&"  ".repeat(depth));
                out.push_str("__typename\n");
            }
        } else if trimmed.starts_with('}') {
            depth = depth.saturating_sub(1);
        }
        index += 1;
    }
    out.trim_end().to_string()
}

fn only_selection_is_bare_typename(selections: &[SelectionIr]) -> bool {
    matches!(
        selections,
        [SelectionIr::Field(field)] if field.name == "__typename" && !field.is_composite()
    )
}

fn render_selection_entry(out: &mut String, indent: &str, selection: &SelectionIr) {
    match selection {
        SelectionIr::Field(field) => {
            out.push_str(&format!("{indent}.field(\"{}\", {}.self),\n", field.name, field.swift_type));
        }
        SelectionIr::FragmentSpread(name) => {
            out.push_str(&format!("{indent}.fragment({}.self),\n", resolve_struct_name(name)));
        }
        SelectionIr::InlineFragment { type_condition, .. } => {
            out.push_str(&format!(
                "{indent}.inlineFragment(AsSomeCase.{}.self),\n",
                type_condition.type_name()
            ));
        }
    }
}

fn render_selections_block(selections: &[SelectionIr]) -> String {
    let mut out = String::new();
    out.push_str("  static var __selections: [Selection] { [\n");
    for selection in selections {
        render_selection_entry(&mut out, "    ", selection);
    }
    out.push_str("  ] }\n");
    out
}

fn field_accessor_name(field: &FieldIr) -> &str {
    &field.name
}

fn render_field_accessor(out: &mut String, field: &FieldIr, access: &str, mutable: bool) {
    let name = field_accessor_name(field);
    if mutable {
        out.push_str(&format!(
            "  {access}var {name}: {ty} {{\n    get {{ __data[\"{name}\"] }}\n    set {{ __data[\"{name}\"] = newValue }}\n  }}\n",
            ty = field.swift_type
        ));
    } else {
        out.push_str(&format!(
            "  {access}var {name}: {ty} {{ __data[\"{name}\"] }}\n",
            ty = field.swift_type
        ));
    }
}

fn should_emit_initializer(fragment: &FragmentIr, config: &CodegenConfig) -> bool {
    if fragment.is_local_cache_mutation {
        return true;
    }
    let field_merging_is_all_only = config.experimental_features.field_merging_is_all_only();
    config.options.selection_set_initializers.iter().any(|initializer| match initializer {
        SelectionSetInitializer::All => field_merging_is_all_only,
        SelectionSetInitializer::NamedFragments => true,
        SelectionSetInitializer::Fragment { named } => named == &fragment.name,
    })
}

fn render_initializer(out: &mut String, fragment: &FragmentIr, access: &str) {
    let scalar_fields: Vec<&FieldIr> = fragment
        .selections
        .iter()
        .filter_map(|selection| match selection {
            SelectionIr::Field(field) if field.name != "__typename" => Some(field),
            _ => None,
        })
        .collect();

    out.push_str(&format!("  {access}init(\n"));
    out.push_str("    __typename: String");
    for field in &scalar_fields {
        out.push_str(&format!(",\n    {}: {}", field.name, field.swift_type));
    }
    out.push_str("\n  ) {\n");
    out.push_str("    self.init(_dataDict: DataDict(data: [\n");
    out.push_str("      \"__typename\": __typename,\n");
    for (index, field) in scalar_fields.iter().enumerate() {
        let trailing_comma = if index + 1 < scalar_fields.len() { "," } else { "" };
        out.push_str(&format!("      \"{0}\": {0}{1}\n", field.name, trailing_comma));
    }
    out.push_str("    ], fulfilledFragments: []))\n");
    out.push_str("  }\n");
}

/// Renders `fragment`'s generated `SelectionSet`/`MutableSelectionSet`
/// struct declaration per `config`.
pub fn render_fragment(fragment: &FragmentIr, config: &CodegenConfig) -> String {
    let module_type = &config.output.schema_types.module_type;
    let declaration_access = module_type.fragment_access_keyword(AccessSite::Declaration);
    let static_access = module_type.fragment_access_keyword(AccessSite::StaticMember);
    let instance_access = module_type.fragment_access_keyword(AccessSite::InstanceMember);

    let struct_name = resolve_struct_name(&fragment.name);
    let schema_namespace = render_schema_namespace(&config.schema_namespace);
    let kind = if fragment.is_local_cache_mutation {
        "MutableSelectionSet"
    } else {
        "SelectionSet"
    };
    let data_binding = if fragment.is_local_cache_mutation { "var" } else { "let" };

    let mut out = String::new();
    out.push_str(&format!(
        "{declaration_access}struct {struct_name}: {schema_namespace}.{kind}, Fragment {{\n"
    ));

    if !matches!(config.options.operation_document_format, OperationDocumentFormat::OperationId) {
        if let Some(source) = &fragment.source_text {
            let reprinted = reprint_with_injected_typename(source);
            out.push_str(&format!("  {static_access}static var fragmentDefinition: StaticString {{\n    #\"{reprinted}\"#\n  }}\n\n"));
        }
    }

    out.push_str(&format!("  {instance_access}{data_binding} __data: DataDict\n"));
    out.push_str(&format!(
        "  {instance_access}init(_dataDict: DataDict) {{ __data = _dataDict }}\n\n"
    ));

    let parent_type = fragment.type_condition.render_parent_type(&schema_namespace);
    out.push_str(&format!(
        "  {static_access}static var __parentType: any ParentType {{ {parent_type} }}\n"
    ));

    let omit_selections =
        only_selection_is_bare_typename(&fragment.selections) && matches!(fragment.type_condition, TypeCondition::Object(_));
    if !omit_selections {
        out.push_str(&render_selections_block(&fragment.selections));
    }

    for selection in &fragment.selections {
        if let SelectionIr::Field(field) = selection {
            if field.name != "__typename" {
                render_field_accessor(&mut out, field, instance_access, fragment.is_local_cache_mutation);
            }
        }
    }

    if should_emit_initializer(fragment, config) {
        out.push('\n');
        render_initializer(&mut out, fragment, instance_access);
    }

    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::config::{
        AccessModifier, CodegenConfig, ConversionStrategies, EnumCasesStrategy, ExperimentalFeatures,
        FieldMergingFeature, Inclusion, InputConfig, ModuleType, OperationDocumentFormat, Options,
        OutputConfig, SchemaTypesConfig,
    };
    use crate::fragment::ir::TypeCondition;
    use std::collections::BTreeSet;

    fn config() -> CodegenConfig {
        CodegenConfig {
            schema_namespace: "myapi".into(),
            input: InputConfig { schema_path: "schema.graphqls".into() },
            output: OutputConfig {
                schema_types: SchemaTypesConfig {
                    path: "Generated".into(),
                    module_type: ModuleType::SwiftPackage,
                },
            },
            options: Options {
                deprecated_enum_cases: Inclusion::Include,
                warnings_on_deprecated_usage: Inclusion::Include,
                schema_documentation: Inclusion::Include,
                conversion_strategies: ConversionStrategies { enum_cases: EnumCasesStrategy::CamelCase },
                selection_set_initializers: vec![SelectionSetInitializer::NamedFragments],
                operation_document_format: OperationDocumentFormat::Document,
            },
            experimental_features: ExperimentalFeatures::default(),
            schema_download: None,
        }
    }

    fn hero_fragment() -> FragmentIr {
        FragmentIr {
            name: "HeroDetails".into(),
            type_condition: TypeCondition::Object("Hero".into()),
            selections: vec![
                SelectionIr::Field(FieldIr::scalar("__typename", "String")),
                SelectionIr::Field(FieldIr::scalar("name", "String")),
            ],
            is_local_cache_mutation: false,
            imported_modules: Vec::new(),
            source_text: Some("fragment HeroDetails on Hero {\n  name\n}".into()),
        }
    }

    #[test]
    fn renders_struct_conforming_to_selection_set_and_fragment() {
        let rendered = render_fragment(&hero_fragment(), &config());
        assert!(rendered.starts_with("public struct HeroDetails: Myapi.SelectionSet, Fragment {"));
        assert!(rendered.contains("public let __data: DataDict"));
        assert!(rendered.contains("public init(_dataDict: DataDict) { __data = _dataDict }"));
        assert!(rendered.contains("public static var __parentType: any ParentType { Myapi.Objects.Hero }"));
    }

    #[test]
    fn schema_namespace_preserves_existing_casing() {
        let mut config = config();
        config.schema_namespace = "MyAPI".into();
        let rendered = render_fragment(&hero_fragment(), &config);
        assert!(rendered.contains("MyAPI.SelectionSet"));
    }

    #[test]
    fn reserved_fragment_name_renders_suffixed_struct() {
        let mut fragment = hero_fragment();
        fragment.name = "type".into();
        let rendered = render_fragment(&fragment, &config());
        assert!(rendered.starts_with("public struct Type_Fragment:"));
    }

    #[test]
    fn mutable_selection_set_uses_var_data_and_setters() {
        let mut fragment = hero_fragment();
        fragment.is_local_cache_mutation = true;
        let rendered = render_fragment(&fragment, &config());
        assert!(rendered.contains("MutableSelectionSet, Fragment {"));
        assert!(rendered.contains("public var __data: DataDict"));
        assert!(rendered.contains("set { __data[\"name\"] = newValue }"));
    }

    #[test]
    fn fragment_definition_injects_typename_and_strips_local_cache_mutation_directive() {
        let mut fragment = hero_fragment();
        fragment.source_text = Some(
            "fragment HeroDetails on Hero @apollo_client_ios_localCacheMutation {\n  name\n  friend {\n    name\n  }\n}"
                .into(),
        );
        let rendered = render_fragment(&fragment, &config());
        assert!(!rendered.contains("apollo_client_ios_localCacheMutation"));
        let typename_occurrences = rendered.matches("__typename").count();
        // Once inside the top-level fragment brace, once inside the nested
        // `friend { }` composite selection.
        assert_eq!(typename_occurrences, 2, "rendered was:\n{rendered}");
    }

    #[test]
    fn fragment_definition_omitted_under_operation_id_format() {
        let mut config = config();
        config.options.operation_document_format = OperationDocumentFormat::OperationId;
        let rendered = render_fragment(&hero_fragment(), &config);
        assert!(!rendered.contains("fragmentDefinition"));
    }

    #[test]
    fn selections_block_omitted_for_bare_typename_only_object_fragment() {
        let fragment = FragmentIr {
            name: "TypenameOnly".into(),
            type_condition: TypeCondition::Object("Hero".into()),
            selections: vec![SelectionIr::Field(FieldIr::scalar("__typename", "String"))],
            is_local_cache_mutation: false,
            imported_modules: Vec::new(),
            source_text: None,
        };
        let rendered = render_fragment(&fragment, &config());
        assert!(!rendered.contains("__selections"));
    }

    #[test]
    fn selections_block_retained_for_bare_typename_only_interface_fragment() {
        let fragment = FragmentIr {
            name: "TypenameOnly".into(),
            type_condition: TypeCondition::Interface("Animal".into()),
            selections: vec![SelectionIr::Field(FieldIr::scalar("__typename", "String"))],
            is_local_cache_mutation: false,
            imported_modules: Vec::new(),
            source_text: None,
        };
        let rendered = render_fragment(&fragment, &config());
        assert!(rendered.contains("__selections"));
    }

    #[test]
    fn initializer_emitted_for_local_cache_mutation_regardless_of_config() {
        let mut config = config();
        config.options.selection_set_initializers = Vec::new();
        let mut fragment = hero_fragment();
        fragment.is_local_cache_mutation = true;
        let rendered = render_fragment(&fragment, &config);
        assert!(rendered.contains("init(\n    __typename: String,\n    name: String\n  )"));
    }

    #[test]
    fn all_initializer_suppressed_unless_field_merging_is_exactly_all() {
        let mut config = config();
        config.options.selection_set_initializers = vec![SelectionSetInitializer::All];
        config.experimental_features.field_merging = BTreeSet::from([FieldMergingFeature::Siblings]);
        let rendered = render_fragment(&hero_fragment(), &config);
        assert!(!rendered.contains("init(\n"));

        config.experimental_features.field_merging = BTreeSet::from([FieldMergingFeature::All]);
        let rendered = render_fragment(&hero_fragment(), &config);
        assert!(rendered.contains("init(\n"));
    }

    #[test]
    fn embedded_internal_target_omits_access_keywords_everywhere() {
        let mut config = config();
        config.output.schema_types.module_type = ModuleType::EmbeddedInTarget {
            name: "App".into(),
            access_modifier: AccessModifier::Internal,
        };
        let rendered = render_fragment(&hero_fragment(), &config);
        assert!(rendered.starts_with("struct HeroDetails:"));
        assert!(rendered.contains("static var __parentType"));
        assert!(!rendered.contains("public "));
    }

    #[test]
    fn embedded_public_target_is_public_only_on_static_members() {
        let mut config = config();
        config.output.schema_types.module_type = ModuleType::EmbeddedInTarget {
            name: "App".into(),
            access_modifier: AccessModifier::Public,
        };
        let rendered = render_fragment(&hero_fragment(), &config);
        assert!(rendered.starts_with("struct HeroDetails:"));
        assert!(rendered.contains("public static var __parentType"));
        assert!(rendered.contains("let __data: DataDict"));
        assert!(!rendered.contains("public let __data"));
    }
}
