//! Emits a GraphQL enum's generated declaration text.

use crate::config::CodegenConfig;
use crate::reserved::{is_reserved_type_name, is_reserved_value_keyword};

/// One value of a GraphQL enum, as handed to [`render_enum`].
#[derive(Clone, Debug)]
pub struct EnumValueInput {
    /// The value's name exactly as it appears in the schema (also the
    /// rawValue emitted on the wire, regardless of any casing/rename).
    pub value_name: String,
    /// Present iff the schema's `@deprecated` directive applies to this
    /// value.
    pub deprecation_reason: Option<String>,
    /// The value's schema `description`, if any.
    pub documentation: Option<String>,
    /// An explicit rename from schema customization config, if any.
    pub custom_name: Option<String>,
}

impl EnumValueInput {
    /// Builds a value with no deprecation, documentation, or rename.
    pub fn new(value_name: impl Into<String>) -> Self {
        Self {
            value_name: value_name.into(),
            deprecation_reason: None,
            documentation: None,
            custom_name: None,
        }
    }
}

/// A GraphQL enum type, as handed to [`render_enum`].
#[derive(Clone, Debug)]
pub struct EnumInput {
    /// The enum's name exactly as it appears in the schema.
    pub enum_name: String,
    /// An explicit rename from schema customization config, if any.
    pub custom_name: Option<String>,
    /// The enum's schema `description`, if any.
    pub documentation: Option<String>,
    /// The enum's values, in schema declaration order.
    pub values: Vec<EnumValueInput>,
}

fn first_uppercase(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn push_doc_lines(out: &mut String, documentation: &str, indent: &str) {
    for line in documentation.lines() {
        out.push_str(indent);
        out.push_str("/// ");
        out.push_str(line);
        out.push('\n');
    }
}

fn resolve_type_name(raw_name: &str, custom_name: Option<&str>) -> (String, Option<String>) {
    if let Some(custom) = custom_name {
        return (
            custom.to_string(),
            Some(format!("// Renamed from GraphQL schema value: '{raw_name}'")),
        );
    }
    let uppercased = first_uppercase(raw_name);
    if is_reserved_type_name(&uppercased) {
        (format!("{uppercased}_Enum"), None)
    } else {
        (uppercased, None)
    }
}

fn render_value(out: &mut String, value: &EnumValueInput, config: &CodegenConfig) {
    let (case_name, rename_comment) = match &value.custom_name {
        Some(custom) => (
            custom.clone(),
            Some(format!(
                "// Renamed from GraphQL schema value: '{}'",
                value.value_name
            )),
        ),
        None => {
            let cased = config
                .options
                .conversion_strategies
                .enum_cases
                .apply(&value.value_name);
            let escaped = if is_reserved_value_keyword(&cased) {
                format!("`{cased}`")
            } else {
                cased
            };
            (escaped, None)
        }
    };

    let emit_doc = config.options.schema_documentation.is_include() && value.documentation.is_some();
    let emit_deprecation_warning =
        config.options.warnings_on_deprecated_usage.is_include() && value.deprecation_reason.is_some();

    if emit_doc {
        push_doc_lines(out, value.documentation.as_deref().unwrap(), "  ");
        if emit_deprecation_warning {
            out.push_str("  ///\n");
        }
    }
    if emit_deprecation_warning {
        out.push_str("  /// **Deprecated**: ");
        out.push_str(value.deprecation_reason.as_deref().unwrap());
        out.push('\n');
    }
    if let Some(comment) = rename_comment {
        out.push_str("  ");
        out.push_str(&comment);
        out.push('\n');
    }
    out.push_str(&format!("  case {case_name} = \"{}\"\n", value.value_name));
}

/// Renders `input`'s generated enum declaration per `config`.
///
/// Values whose `deprecation_reason` is set are omitted entirely when
/// `options.deprecatedEnumCases` is `Exclude`; `warnings_on_deprecated_usage`
/// controls only whether a surviving deprecated value also gets a
/// `/// **Deprecated**: ...` doc line, independent of that emission choice.
pub fn render_enum(input: &EnumInput, config: &CodegenConfig) -> String {
    let mut out = String::new();
    let access = config.output.schema_types.module_type.enum_access_keyword();
    let (name, rename_comment) = resolve_type_name(&input.enum_name, input.custom_name.as_deref());

    if config.options.schema_documentation.is_include() {
        if let Some(doc) = &input.documentation {
            push_doc_lines(&mut out, doc, "");
        }
    }
    if let Some(comment) = &rename_comment {
        out.push_str(comment);
        out.push('\n');
    }
    out.push_str(&format!("{access}enum {name}: String, EnumType {{\n"));

    for value in &input.values {
        if value.deprecation_reason.is_some() && !config.options.deprecated_enum_cases.is_include() {
            continue;
        }
        render_value(&mut out, value, config);
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
        Inclusion, InputConfig, ModuleType, OperationDocumentFormat, Options, OutputConfig, SchemaTypesConfig,
    };

    fn config(enum_cases: EnumCasesStrategy) -> CodegenConfig {
        CodegenConfig {
            schema_namespace: "MyAPI".into(),
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
                conversion_strategies: ConversionStrategies { enum_cases },
                selection_set_initializers: Vec::new(),
                operation_document_format: OperationDocumentFormat::Document,
            },
            experimental_features: ExperimentalFeatures::default(),
            schema_download: None,
        }
    }

    #[test]
    fn scenario_6_camel_case_conversion_of_every_documented_value() {
        let input = EnumInput {
            enum_name: "Episode".into(),
            custom_name: None,
            documentation: None,
            values: [
                "lowercase",
                "UPPERCASE",
                "snake_case",
                "BEFORE2023",
                "_one_two_three_",
                "associatedtype",
                "Protocol",
            ]
            .into_iter()
            .map(EnumValueInput::new)
            .collect(),
        };
        let rendered = render_enum(&input, &config(EnumCasesStrategy::CamelCase));

        for (raw, cased) in [
            ("lowercase", "lowercase"),
            ("UPPERCASE", "uppercase"),
            ("snake_case", "snakeCase"),
            ("BEFORE2023", "before2023"),
            ("_one_two_three_", "_oneTwoThree_"),
            ("associatedtype", "`associatedtype`"),
            ("Protocol", "`protocol`"),
        ] {
            let expected_line = format!("  case {cased} = \"{raw}\"");
            assert!(
                rendered.contains(&expected_line),
                "expected {expected_line:?} in:\n{rendered}"
            );
        }
    }

    #[test]
    fn none_strategy_leaves_case_names_untouched() {
        let input = EnumInput {
            enum_name: "Episode".into(),
            custom_name: None,
            documentation: None,
            values: vec![EnumValueInput::new("NEW_HOPE")],
        };
        let rendered = render_enum(&input, &config(EnumCasesStrategy::None));
        assert!(rendered.contains("case NEW_HOPE = \"NEW_HOPE\""));
    }

    #[test]
    fn reserved_enum_name_gets_suffixed() {
        let input = EnumInput {
            enum_name: "type".into(),
            custom_name: None,
            documentation: None,
            values: vec![],
        };
        let rendered = render_enum(&input, &config(EnumCasesStrategy::CamelCase));
        assert!(rendered.starts_with("public enum Type_Enum: String, EnumType {"));
    }

    #[test]
    fn custom_name_renders_verbatim_with_rename_comment() {
        let input = EnumInput {
            enum_name: "Episode".into(),
            custom_name: Some("Chapter".into()),
            documentation: None,
            values: vec![],
        };
        let rendered = render_enum(&input, &config(EnumCasesStrategy::CamelCase));
        assert!(rendered.starts_with("// Renamed from GraphQL schema value: 'Episode'\npublic enum Chapter: String, EnumType {"));
    }

    #[test]
    fn deprecated_case_excluded_when_configured() {
        let mut config = config(EnumCasesStrategy::CamelCase);
        config.options.deprecated_enum_cases = Inclusion::Exclude;
        let input = EnumInput {
            enum_name: "Episode".into(),
            custom_name: None,
            documentation: None,
            values: vec![EnumValueInput {
                value_name: "OLD".into(),
                deprecation_reason: Some("use NEW instead".into()),
                documentation: None,
                custom_name: None,
            }],
        };
        let rendered = render_enum(&input, &config);
        assert!(!rendered.contains("OLD"));
    }

    #[test]
    fn deprecation_warning_is_orthogonal_to_inclusion() {
        let mut config = config(EnumCasesStrategy::CamelCase);
        config.options.warnings_on_deprecated_usage = Inclusion::Exclude;
        let input = EnumInput {
            enum_name: "Episode".into(),
            custom_name: None,
            documentation: None,
            values: vec![EnumValueInput {
                value_name: "OLD".into(),
                deprecation_reason: Some("use NEW instead".into()),
                documentation: None,
                custom_name: None,
            }],
        };
        let rendered = render_enum(&input, &config);
        assert!(rendered.contains("case old = \"OLD\""));
        assert!(!rendered.contains("Deprecated"));
    }

    #[test]
    fn doc_and_deprecation_comments_are_separated_by_a_blank_doc_line() {
        let config = config(EnumCasesStrategy::CamelCase);
        let input = EnumInput {
            enum_name: "Episode".into(),
            custom_name: None,
            documentation: None,
            values: vec![EnumValueInput {
                value_name: "OLD".into(),
                deprecation_reason: Some("use NEW instead".into()),
                documentation: Some("The original trilogy.".into()),
                custom_name: None,
            }],
        };
        let rendered = render_enum(&input, &config);
        assert!(rendered.contains(
            "  /// The original trilogy.\n  ///\n  /// **Deprecated**: use NEW instead\n  case old = \"OLD\"\n"
        ));
    }

    #[test]
    fn output_ends_with_trailing_newline_after_closing_brace() {
        let input = EnumInput {
            enum_name: "Episode".into(),
            custom_name: None,
            documentation: None,
            values: vec![],
        };
        let rendered = render_enum(&input, &config(EnumCasesStrategy::CamelCase));
        assert!(rendered.ends_with("}\n"));
        assert!(!rendered.ends_with("}\n\n"));
    }

    #[test]
    fn embedded_internal_target_omits_access_keyword() {
        let mut config = config(EnumCasesStrategy::CamelCase);
        config.output.schema_types.module_type = ModuleType::EmbeddedInTarget {
            name: "App".into(),
            access_modifier: AccessModifier::Internal,
        };
        let input = EnumInput {
            enum_name: "Episode".into(),
            custom_name: None,
            documentation: None,
            values: vec![],
        };
        let rendered = render_enum(&input, &config);
        assert!(rendered.starts_with("enum Episode: String, EnumType {"));
    }

    /// Testable property: `renderEnum` then lexing recovers the same case
    /// set and raw-string mapping.
    #[test]
    fn round_trips_through_a_trivial_lexer() {
        let input = EnumInput {
            enum_name: "Episode".into(),
            custom_name: None,
            documentation: None,
            values: ["NEWHOPE", "EMPIRE", "JEDI"].into_iter().map(EnumValueInput::new).collect(),
        };
        let rendered = render_enum(&input, &config(EnumCasesStrategy::CamelCase));

        let mut recovered = Vec::new();
        for line in rendered.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("case ") {
                let (case_name, raw) = rest.split_once(" = \"").expect("well-formed case line");
                let raw = raw.trim_end_matches('"');
                recovered.push((case_name.to_string(), raw.to_string()));
            }
        }
        assert_eq!(
            recovered,
            vec![
                ("newhope".to_string(), "NEWHOPE".to_string()),
                ("empire".to_string(), "EMPIRE".to_string()),
                ("jedi".to_string(), "JEDI".to_string()),
            ]
        );
    }
}
