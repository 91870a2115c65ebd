//! `${property:default}` 佔位符解析
//!
//! A value read from the configuration is parsed once into a [`SymbolicExpression`] and then
//! resolved against an [`ArgumentSource`]. Resolution is a pure function of those two inputs.

use crate::domain::runtime::ArgumentSource;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

const MAX_INTERPOLATION_PASSES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolicExpression {
    Literal(String),
    Symbolic {
        property: String,
        default: Option<String>,
    },
}

impl SymbolicExpression {
    /// Parses a whole value. Anything that is not exactly one `${...}` expression is a literal;
    /// text with embedded expressions goes through [`PlaceholderResolver::interpolate`].
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let Some(inner) = single_expression_body(trimmed) else {
            return SymbolicExpression::Literal(trimmed.to_string());
        };

        let (property, default) = match inner.split_once(':') {
            Some((property, default)) => (property.trim(), Some(default.to_string())),
            None => (inner.trim(), None),
        };

        if property.is_empty() {
            return SymbolicExpression::Literal(trimmed.to_string());
        }

        SymbolicExpression::Symbolic {
            property: property.to_string(),
            default,
        }
    }

    pub fn literal(text: impl Into<String>) -> Self {
        SymbolicExpression::Literal(text.into())
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, SymbolicExpression::Symbolic { .. })
    }

    pub fn property(&self) -> Option<&str> {
        match self {
            SymbolicExpression::Symbolic { property, .. } => Some(property),
            SymbolicExpression::Literal(_) => None,
        }
    }

    /// The default written inside the expression, or the literal itself.
    pub fn default_text(&self) -> Option<&str> {
        match self {
            SymbolicExpression::Literal(text) => Some(text),
            SymbolicExpression::Symbolic { default, .. } => default.as_deref(),
        }
    }
}

impl fmt::Display for SymbolicExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolicExpression::Literal(text) => write!(f, "{}", text),
            SymbolicExpression::Symbolic {
                property,
                default: Some(default),
            } => write!(f, "${{{}:{}}}", property, default),
            SymbolicExpression::Symbolic {
                property,
                default: None,
            } => write!(f, "${{{}}}", property),
        }
    }
}

/// Returns the body of `${...}` when the braces opened at the start close at the very end.
fn single_expression_body(text: &str) -> Option<&str> {
    if !text.starts_with("${") || !text.ends_with('}') {
        return None;
    }

    let mut depth = 0usize;
    for (idx, ch) in text.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 && idx != text.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }

    (depth == 0).then(|| &text[2..text.len() - 1])
}

/// How a runtime argument is matched to a property name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentMatch {
    /// The argument key contains the property name anywhere.
    #[default]
    Contains,
    /// The argument key, without its `-D` prefix, equals the property name.
    Boundary,
}

impl ArgumentMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgumentMatch::Contains => "contains",
            ArgumentMatch::Boundary => "boundary",
        }
    }

    fn accepts(&self, key: &str, property: &str) -> bool {
        match self {
            ArgumentMatch::Contains => key.contains(property),
            ArgumentMatch::Boundary => key.strip_prefix("-D").unwrap_or(key) == property,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderResolver {
    matching: ArgumentMatch,
}

impl PlaceholderResolver {
    pub fn new(matching: ArgumentMatch) -> Self {
        Self { matching }
    }

    pub fn matching(&self) -> ArgumentMatch {
        self.matching
    }

    pub fn resolve<S>(&self, expr: &SymbolicExpression, source: &S) -> String
    where
        S: ArgumentSource + ?Sized,
    {
        match expr {
            SymbolicExpression::Literal(text) => text.clone(),
            SymbolicExpression::Symbolic { property, default } => {
                if let Some(value) = self.lookup(property, source) {
                    return value;
                }
                match default {
                    Some(default) => self.interpolate(default, source),
                    None => String::new(),
                }
            }
        }
    }

    /// Resolves a raw configuration value. Shorthand for parse + resolve.
    pub fn resolve_text<S>(&self, text: &str, source: &S) -> String
    where
        S: ArgumentSource + ?Sized,
    {
        self.resolve(&SymbolicExpression::parse(text), source)
    }

    /// Replaces every embedded expression in free text, innermost first.
    pub fn interpolate<S>(&self, text: &str, source: &S) -> String
    where
        S: ArgumentSource + ?Sized,
    {
        let Some(pattern) = expression_pattern() else {
            return text.to_string();
        };
        let mut current = text.to_string();

        for _ in 0..MAX_INTERPOLATION_PASSES {
            if !pattern.is_match(&current) {
                break;
            }
            current = pattern
                .replace_all(&current, |caps: &regex::Captures| {
                    self.resolve(&SymbolicExpression::parse(&caps[0]), source)
                })
                .into_owned();
        }

        current
    }

    fn lookup<S>(&self, property: &str, source: &S) -> Option<String>
    where
        S: ArgumentSource + ?Sized,
    {
        if let Some(name) = property.strip_prefix("env.") {
            if let Some(value) = source.env_var(name) {
                return Some(value.to_string());
            }
        }

        // 同一個 key 出現多次時以最後一個為準
        source
            .arguments()
            .filter_map(|argument| {
                // 沒有 '=' 的參數只是旗標
                let (key, value) = argument.split_once('=')?;
                self.matching.accepts(key, property).then_some(value)
            })
            .last()
            .map(str::to_string)
    }
}

fn expression_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$\{[^${}]+\}").ok())
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::runtime::RuntimeContext;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(
            SymbolicExpression::parse("${jboss.http.port:8080}"),
            SymbolicExpression::Symbolic {
                property: "jboss.http.port".to_string(),
                default: Some("8080".to_string()),
            }
        );
        assert_eq!(
            SymbolicExpression::parse("${jboss.bind.address}"),
            SymbolicExpression::Symbolic {
                property: "jboss.bind.address".to_string(),
                default: None,
            }
        );
        assert_eq!(SymbolicExpression::parse("8443"), SymbolicExpression::literal("8443"));
        assert_eq!(SymbolicExpression::parse("${:1}"), SymbolicExpression::literal("${:1}"));
        assert!(!SymbolicExpression::parse("${a}-${b}").is_symbolic());

        let nested = SymbolicExpression::parse("${a:${b:1}}");
        assert_eq!(nested.property(), Some("a"));
        assert_eq!(nested.default_text(), Some("${b:1}"));
        assert_eq!(nested.to_string(), "${a:${b:1}}");
    }

    #[test]
    fn test_resolve_prefers_argument_over_default() {
        let resolver = PlaceholderResolver::default();
        let source = args(&["-server", "-Djboss.http.port=9090"]);
        let expr = SymbolicExpression::parse("${jboss.http.port:8080}");
        assert_eq!(resolver.resolve(&expr, source.as_slice()), "9090");
    }

    #[test]
    fn test_flag_without_value_is_skipped() {
        let resolver = PlaceholderResolver::default();
        let source = args(&["-Djboss.http.port", "-Djboss.http.port=9191"]);
        assert_eq!(
            resolver.resolve_text("${jboss.http.port:8080}", source.as_slice()),
            "9191"
        );
    }

    #[test]
    fn test_last_occurrence_wins() {
        let resolver = PlaceholderResolver::default();
        let source = args(&["-Djboss.http.port=8080", "-server", "-Djboss.http.port=9090"]);
        assert_eq!(
            resolver.resolve_text("${jboss.http.port:80}", source.as_slice()),
            "9090"
        );

        // the server's own process arguments come after the host arguments
        let ctx = RuntimeContext::new(args(&["-Djboss.http.port=9090"]), []).with_processes(vec![
            crate::domain::runtime::ProcessSnapshot {
                server: "server-one".to_string(),
                arguments: args(&["-Djboss.http.port=8230"]),
                ..Default::default()
            },
        ]);
        let view = ctx.view_for("server-one");
        assert_eq!(resolver.resolve_text("${jboss.http.port:80}", &view), "8230");
        assert_eq!(resolver.resolve_text("${jboss.http.port:80}", &ctx), "9090");
    }

    #[test]
    fn test_missing_without_default_is_empty() {
        let resolver = PlaceholderResolver::default();
        let source: Vec<String> = Vec::new();
        assert_eq!(resolver.resolve_text("${jboss.bind.address}", source.as_slice()), "");
    }

    #[test]
    fn test_nested_default_resolves_recursively() {
        let resolver = PlaceholderResolver::default();
        let source = args(&["-Dinner=7"]);
        assert_eq!(resolver.resolve_text("${outer:${inner:1}}", source.as_slice()), "7");
        assert_eq!(resolver.resolve_text("${outer:${other:1}}", source.as_slice()), "1");
    }

    #[test]
    fn test_contains_and_boundary_matching() {
        // "port" is a substring of "jboss.http.port"
        let source = args(&["-Dport=1", "-Djboss.http.port=9090"]);

        let contains = PlaceholderResolver::new(ArgumentMatch::Contains);
        assert_eq!(contains.resolve_text("${port:0}", source.as_slice()), "9090");

        let boundary = PlaceholderResolver::new(ArgumentMatch::Boundary);
        assert_eq!(boundary.resolve_text("${port:0}", source.as_slice()), "1");
        assert_eq!(boundary.resolve_text("${http.port:0}", source.as_slice()), "0");
    }

    #[test]
    fn test_env_property_uses_environment_first() {
        let mut env = HashMap::new();
        env.insert("DB_HOST".to_string(), "db01".to_string());
        let ctx = RuntimeContext::new(args(&["-Denv.DB_HOST=ignored"]), []).with_environment(env);

        let resolver = PlaceholderResolver::default();
        assert_eq!(resolver.resolve_text("${env.DB_HOST:localhost}", &ctx), "db01");
        assert_eq!(resolver.resolve_text("${env.DB_PORT:1521}", &ctx), "1521");
    }

    #[test]
    fn test_interpolate_embedded_expressions() {
        let resolver = PlaceholderResolver::default();
        let source = args(&["-Ddb.host=ora01"]);
        assert_eq!(
            resolver.interpolate(
                "jdbc:oracle:thin:@${db.host:localhost}:${db.port:1521}:ORCL",
                source.as_slice()
            ),
            "jdbc:oracle:thin:@ora01:1521:ORCL"
        );
    }

    proptest! {
        #[test]
        fn prop_matching_argument_wins_over_default(
            property in "[a-z]{1,8}(\\.[a-z]{1,8}){0,3}",
            value in "[A-Za-z0-9]{1,10}",
            default in "[0-9]{1,5}",
        ) {
            let resolver = PlaceholderResolver::default();
            let source = vec![format!("-D{}={}", property, value)];
            let expr = SymbolicExpression::Symbolic { property, default: Some(default) };
            prop_assert_eq!(resolver.resolve(&expr, source.as_slice()), value);
        }

        #[test]
        fn prop_unmatched_property_yields_default(
            property in "[a-z]{1,8}(\\.[a-z]{1,8}){0,3}",
            default in "[0-9]{1,5}",
        ) {
            let resolver = PlaceholderResolver::default();
            let source = vec!["-server".to_string(), "-DUNRELATED=1".to_string()];
            let expr = SymbolicExpression::Symbolic { property, default: Some(default.clone()) };
            prop_assert_eq!(resolver.resolve(&expr, source.as_slice()), default);
        }
    }
}
