use std::collections::HashMap;
use std::ops::Range;

use serde::Deserialize;

use crate::error::RestyleError;

pub type MixinHandler = fn(args: &[String], inner: Option<&str>) -> String;

/// How a recognized mixin expands.
#[derive(Debug, Clone)]
pub enum Expansion {
    /// Literal text with `{0}`..`{9}` argument placeholders and `{args}`
    /// for the comma-joined full list.
    Template(String),
    Handler(MixinHandler),
}

#[derive(Debug, Clone)]
pub struct MixinDefinition {
    pub name: String,
    /// Accepted argument counts, half-open.
    pub arity: Range<usize>,
    pub expansion: Expansion,
}

/// Template mixin as authored in a JSON registry file. `min_args` and
/// `max_args` are inclusive.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateMixin {
    #[serde(default)]
    pub min_args: usize,
    #[serde(default)]
    pub max_args: usize,
    pub template: String,
}

/// Closed lookup table of known mixins. Built once at engine start and
/// never mutated afterwards, so it can be shared by reference across
/// concurrent migrations.
#[derive(Debug, Clone)]
pub struct MixinRegistry {
    mixins: HashMap<String, MixinDefinition>,
}

impl MixinRegistry {
    /// Registry of the legacy theme's known mixins.
    pub fn builtin() -> Self {
        let mut registry = Self {
            mixins: HashMap::new(),
        };
        registry.insert_template("border-radius", 1..2, "border-radius: {0};");
        registry.insert_template("transition", 1..6, "transition: {args};");
        registry.insert_template("box-shadow", 1..6, "box-shadow: {args};");
        registry.insert_template(
            "clearfix",
            0..1,
            "&::after {\n  content: \"\";\n  display: table;\n  clear: both;\n}",
        );
        registry.insert_handler("opacity", 1..2, expand_opacity);
        registry.insert_handler("size", 1..3, expand_size);
        registry.insert_handler("button-variant", 1..3, expand_button_variant);
        registry.insert_handler("media-breakpoint-down", 1..2, expand_breakpoint_down);
        registry.insert_handler("media-breakpoint-up", 1..2, expand_breakpoint_up);
        registry
    }

    /// Builtin registry extended with template mixins from a JSON map
    /// (`{"name": {"min_args": 1, "max_args": 2, "template": "..."}}`).
    pub fn with_templates_json(json: &str) -> Result<Self, RestyleError> {
        let templates: HashMap<String, TemplateMixin> = serde_json::from_str(json)?;
        let mut registry = Self::builtin();
        for (name, template) in templates {
            if template.min_args > template.max_args {
                return Err(RestyleError::EmptyArity { name });
            }
            registry.mixins.insert(
                name.clone(),
                MixinDefinition {
                    name,
                    arity: template.min_args..template.max_args + 1,
                    expansion: Expansion::Template(template.template),
                },
            );
        }
        Ok(registry)
    }

    fn insert_template(&mut self, name: &str, arity: Range<usize>, template: &str) {
        self.mixins.insert(
            name.to_string(),
            MixinDefinition {
                name: name.to_string(),
                arity,
                expansion: Expansion::Template(template.to_string()),
            },
        );
    }

    fn insert_handler(&mut self, name: &str, arity: Range<usize>, handler: MixinHandler) {
        self.mixins.insert(
            name.to_string(),
            MixinDefinition {
                name: name.to_string(),
                arity,
                expansion: Expansion::Handler(handler),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&MixinDefinition> {
        self.mixins.get(name)
    }

    /// Expand a recognized invocation. `None` means the caller must leave
    /// the invocation untouched: unknown name or argument count outside
    /// the declared arity.
    pub fn expand(&self, name: &str, args: &[String], inner: Option<&str>) -> Option<String> {
        let definition = self.mixins.get(name)?;
        if !definition.arity.contains(&args.len()) {
            return None;
        }
        Some(match &definition.expansion {
            Expansion::Template(template) => fill_template(template, args),
            Expansion::Handler(handler) => handler(args, inner),
        })
    }
}

fn fill_template(template: &str, args: &[String]) -> String {
    let mut out = template.replace("{args}", &args.join(", "));
    for i in 0..10 {
        let placeholder = format!("{{{}}}", i);
        if out.contains(&placeholder) {
            out = out.replace(&placeholder, args.get(i).map(String::as_str).unwrap_or(""));
        }
    }
    out
}

fn expand_opacity(args: &[String], _inner: Option<&str>) -> String {
    let value = args[0].trim();
    match value.parse::<f32>() {
        // Literal argument: the legacy IE alpha filter can be computed.
        Ok(opacity) => format!(
            "opacity: {};\nfilter: alpha(opacity={});",
            value,
            (opacity * 100.0).round() as i32
        ),
        Err(_) => format!("opacity: {};", value),
    }
}

fn expand_size(args: &[String], _inner: Option<&str>) -> String {
    let width = args[0].trim();
    let height = args.get(1).map(|a| a.trim()).unwrap_or(width);
    format!("width: {};\nheight: {};", width, height)
}

fn expand_button_variant(args: &[String], _inner: Option<&str>) -> String {
    let background = args[0].trim();
    let border = args.get(1).map(|a| a.trim()).unwrap_or(background);
    let hover = hover_value(background);
    format!(
        "background-color: {};\nborder-color: {};\n&:hover {{\n  background-color: {};\n}}",
        background, border, hover
    )
}

/// Derived hover state. A literal hex color is darkened in place; a
/// custom-property reference cannot be computed against at this stage, so
/// a named `-hover` variant reference is emitted instead.
fn hover_value(color: &str) -> String {
    if let Some((r, g, b)) = parse_hex(color) {
        let darken = |channel: u8| (channel as f32 * 0.9).round() as u8;
        return format!("#{:02x}{:02x}{:02x}", darken(r), darken(g), darken(b));
    }
    if let Some(variant) = variant_reference(color, "hover") {
        return variant;
    }
    color.to_string()
}

fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.trim().strip_prefix('#')?;
    match hex.len() {
        6 => Some((
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
        )),
        3 => {
            let expand = |s: &str| u8::from_str_radix(&s.repeat(2), 16).ok();
            Some((expand(&hex[0..1])?, expand(&hex[1..2])?, expand(&hex[2..3])?))
        }
        _ => None,
    }
}

/// `var(--name)` -> `var(--name-<suffix>)`, preserving any fallback tail.
fn variant_reference(value: &str, suffix: &str) -> Option<String> {
    let trimmed = value.trim();
    let inner = trimmed.strip_prefix("var(")?.strip_suffix(')')?;
    let (name, tail) = match inner.find(',') {
        Some(i) => (&inner[..i], &inner[i..]),
        None => (inner, ""),
    };
    let name = name.trim();
    if !name.starts_with("--") {
        return None;
    }
    Some(format!("var({}-{}{})", name, suffix, tail))
}

const BREAKPOINTS_DOWN: &[(&str, &str)] = &[
    ("xs", "575.98px"),
    ("sm", "575.98px"),
    ("md", "767.98px"),
    ("lg", "991.98px"),
    ("xl", "1199.98px"),
];

const BREAKPOINTS_UP: &[(&str, &str)] = &[
    ("xs", "0"),
    ("sm", "576px"),
    ("md", "768px"),
    ("lg", "992px"),
    ("xl", "1200px"),
];

fn expand_breakpoint_down(args: &[String], inner: Option<&str>) -> String {
    expand_breakpoint(args, inner, "max-width", BREAKPOINTS_DOWN)
}

fn expand_breakpoint_up(args: &[String], inner: Option<&str>) -> String {
    expand_breakpoint(args, inner, "min-width", BREAKPOINTS_UP)
}

fn expand_breakpoint(
    args: &[String],
    inner: Option<&str>,
    bound: &str,
    table: &[(&str, &str)],
) -> String {
    let key = args[0].trim();
    let limit = table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, px)| *px)
        .unwrap_or(key);
    let body = inner.map(str::trim).unwrap_or("");
    format!("@media ({}: {}) {{\n{}\n}}", bound, limit, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_radius_expands_without_residue() {
        let registry = MixinRegistry::builtin();
        let out = registry.expand("border-radius", &["5px".to_string()], None).unwrap();
        assert_eq!(out, "border-radius: 5px;");
        assert!(!out.contains("@include"));
    }

    #[test]
    fn unknown_mixin_returns_none() {
        let registry = MixinRegistry::builtin();
        assert!(registry.expand("sparkle", &[], None).is_none());
    }

    #[test]
    fn arity_mismatch_returns_none() {
        let registry = MixinRegistry::builtin();
        assert!(registry
            .expand("border-radius", &["1px".to_string(), "2px".to_string()], None)
            .is_none());
    }

    #[test]
    fn transition_joins_all_arguments() {
        let registry = MixinRegistry::builtin();
        let args = vec!["color 0.2s".to_string(), "opacity 0.1s".to_string()];
        assert_eq!(
            registry.expand("transition", &args, None).unwrap(),
            "transition: color 0.2s, opacity 0.1s;"
        );
    }

    #[test]
    fn button_variant_darkens_literal_hex() {
        let registry = MixinRegistry::builtin();
        let out = registry
            .expand("button-variant", &["#337ab7".to_string()], None)
            .unwrap();
        assert!(out.contains("background-color: #337ab7;"));
        assert!(out.contains("#2e6ea5"));
    }

    #[test]
    fn button_variant_emits_named_variant_for_custom_property() {
        let registry = MixinRegistry::builtin();
        let out = registry
            .expand("button-variant", &["var(--brand-primary)".to_string()], None)
            .unwrap();
        assert!(out.contains("var(--brand-primary-hover)"));
        assert!(!out.contains("darken("));
    }

    #[test]
    fn breakpoint_embeds_content_block() {
        let registry = MixinRegistry::builtin();
        let out = registry
            .expand(
                "media-breakpoint-down",
                &["md".to_string()],
                Some("  display: none;"),
            )
            .unwrap();
        assert_eq!(out, "@media (max-width: 767.98px) {\ndisplay: none;\n}");
    }

    #[test]
    fn opacity_computes_legacy_filter_for_literal_only() {
        let registry = MixinRegistry::builtin();
        let literal = registry.expand("opacity", &["0.35".to_string()], None).unwrap();
        assert!(literal.contains("alpha(opacity=35)"));
        let reference = registry
            .expand("opacity", &["var(--fade)".to_string()], None)
            .unwrap();
        assert_eq!(reference, "opacity: var(--fade);");
    }

    #[test]
    fn template_registry_loads_from_json() {
        let json = r#"{"fancy-border": {"min_args": 1, "max_args": 1, "template": "border: {0} solid;"}}"#;
        let registry = MixinRegistry::with_templates_json(json).unwrap();
        assert_eq!(
            registry.expand("fancy-border", &["2px".to_string()], None).unwrap(),
            "border: 2px solid;"
        );
        // Builtins survive the merge.
        assert!(registry.get("border-radius").is_some());
    }

    #[test]
    fn inverted_arity_is_rejected() {
        let json = r#"{"broken": {"min_args": 3, "max_args": 1, "template": "x"}}"#;
        let err = MixinRegistry::with_templates_json(json).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }
}
