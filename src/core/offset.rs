use crate::core::placeholder::{PlaceholderResolver, SymbolicExpression};
use crate::domain::runtime::ArgumentSource;

/// Highest port a listener can bind.
pub const MAX_PORT: i64 = 65_535;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedOffset {
    /// Base port as resolved, `None` when it is not a number.
    pub base: Option<i64>,
    pub offset: i64,
    /// `false` when the offset resolved to text that is not a number and 0 was used.
    pub offset_resolved: bool,
}

impl AppliedOffset {
    /// Base plus offset. A base of 0 asks the OS for a port, so no offset applies to it.
    pub fn port(&self) -> Option<i64> {
        self.base.map(|base| {
            if base == 0 {
                0
            } else {
                base.saturating_add(self.offset)
            }
        })
    }

    pub fn base_resolved(&self) -> bool {
        self.base.is_some()
    }

    pub fn is_ephemeral(&self) -> bool {
        self.base == Some(0)
    }

    pub fn is_out_of_range(&self) -> bool {
        self.port().is_some_and(|port| !(0..=MAX_PORT).contains(&port))
    }

    /// The port to report and probe, if there is a concrete one.
    pub fn resolved_port(&self) -> Option<u32> {
        self.port()
            .filter(|port| (1..=MAX_PORT).contains(port))
            .and_then(|port| u32::try_from(port).ok())
    }
}

/// 計算 base port + offset，兩者都可能是 `${...}` 形式
pub fn apply_offset<S>(
    resolver: &PlaceholderResolver,
    base: &SymbolicExpression,
    offset: Option<&SymbolicExpression>,
    source: &S,
) -> AppliedOffset
where
    S: ArgumentSource + ?Sized,
{
    let (offset, offset_resolved) = match offset {
        Some(expr) => resolve_offset(resolver, expr, source),
        None => (0, true),
    };

    AppliedOffset {
        base: parse_number(&resolver.resolve(base, source)),
        offset,
        offset_resolved,
    }
}

/// Resolves an offset on its own. Empty falls back to the embedded default, then 0.
pub fn resolve_offset<S>(
    resolver: &PlaceholderResolver,
    expr: &SymbolicExpression,
    source: &S,
) -> (i64, bool)
where
    S: ArgumentSource + ?Sized,
{
    let resolved = resolver.resolve(expr, source);
    let text = if resolved.trim().is_empty() {
        expr.default_text()
            .map(|default| resolver.interpolate(default, source))
            .unwrap_or_default()
    } else {
        resolved
    };

    if text.trim().is_empty() {
        return (0, true);
    }

    match parse_number(&text) {
        Some(value) => (value, true),
        None => (0, false),
    }
}

fn parse_number(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset_expr() -> SymbolicExpression {
        SymbolicExpression::parse("${jboss.socket.binding.port-offset:0}")
    }

    #[test]
    fn test_default_offset_keeps_base_port() {
        let resolver = PlaceholderResolver::default();
        let empty: Vec<String> = Vec::new();
        let applied = apply_offset(
            &resolver,
            &SymbolicExpression::parse("8080"),
            Some(&offset_expr()),
            empty.as_slice(),
        );
        assert_eq!(applied.resolved_port(), Some(8080));
        assert_eq!(applied.offset, 0);
    }

    #[test]
    fn test_runtime_offset_is_added() {
        let resolver = PlaceholderResolver::default();
        let source = vec!["-Djboss.socket.binding.port-offset=100".to_string()];
        let applied = apply_offset(
            &resolver,
            &SymbolicExpression::parse("8080"),
            Some(&offset_expr()),
            source.as_slice(),
        );
        assert_eq!(applied.resolved_port(), Some(8180));
    }

    #[test]
    fn test_symbolic_base_and_offset() {
        let resolver = PlaceholderResolver::default();
        let source = vec![
            "-Djboss.https.port=9443".to_string(),
            "-Djboss.socket.binding.port-offset=10".to_string(),
        ];
        let applied = apply_offset(
            &resolver,
            &SymbolicExpression::parse("${jboss.https.port:8443}"),
            Some(&offset_expr()),
            source.as_slice(),
        );
        assert_eq!(applied.resolved_port(), Some(9453));
    }

    #[test]
    fn test_empty_runtime_offset_falls_back_to_default() {
        let resolver = PlaceholderResolver::default();
        let source = vec!["-Djboss.socket.binding.port-offset=".to_string()];
        let (offset, ok) = resolve_offset(
            &resolver,
            &SymbolicExpression::parse("${jboss.socket.binding.port-offset:150}"),
            source.as_slice(),
        );
        assert_eq!((offset, ok), (150, true));
    }

    #[test]
    fn test_unresolvable_base_is_flagged() {
        let resolver = PlaceholderResolver::default();
        let empty: Vec<String> = Vec::new();
        let applied = apply_offset(
            &resolver,
            &SymbolicExpression::parse("${jboss.ajp.port}"),
            Some(&offset_expr()),
            empty.as_slice(),
        );
        assert!(!applied.base_resolved());
        assert_eq!(applied.resolved_port(), None);
        assert!(!applied.is_out_of_range());
    }

    #[test]
    fn test_non_numeric_offset_counts_as_zero() {
        let resolver = PlaceholderResolver::default();
        let empty: Vec<String> = Vec::new();
        let applied = apply_offset(
            &resolver,
            &SymbolicExpression::parse("8009"),
            Some(&SymbolicExpression::literal("abc")),
            empty.as_slice(),
        );
        assert_eq!(applied.resolved_port(), Some(8009));
        assert!(!applied.offset_resolved);
    }

    #[test]
    fn test_sum_must_stay_within_port_range() {
        let resolver = PlaceholderResolver::default();
        let empty: Vec<String> = Vec::new();
        let apply = |base: &str, offset: &str| {
            apply_offset(
                &resolver,
                &SymbolicExpression::parse(base),
                Some(&SymbolicExpression::literal(offset)),
                empty.as_slice(),
            )
        };

        let top = apply("65000", "535");
        assert_eq!(top.resolved_port(), Some(65535));
        assert!(!top.is_out_of_range());

        let over = apply("65000", "1000");
        assert_eq!(over.port(), Some(66000));
        assert_eq!(over.resolved_port(), None);
        assert!(over.is_out_of_range());
        assert!(over.base_resolved());

        let negative = apply("8080", "-9000");
        assert_eq!(negative.resolved_port(), None);
        assert!(negative.is_out_of_range());

        let lowest = apply("100", "-99");
        assert_eq!(lowest.resolved_port(), Some(1));
    }

    #[test]
    fn test_zero_base_is_not_offset() {
        let resolver = PlaceholderResolver::default();
        let source = vec!["-Djboss.socket.binding.port-offset=100".to_string()];
        let applied = apply_offset(
            &resolver,
            &SymbolicExpression::parse("${jboss.jgroups.port:0}"),
            Some(&offset_expr()),
            source.as_slice(),
        );
        assert!(applied.is_ephemeral());
        assert_eq!(applied.port(), Some(0));
        assert_eq!(applied.resolved_port(), None);
        assert!(!applied.is_out_of_range());
    }

    #[test]
    fn test_nested_offset_default_is_interpolated() {
        let resolver = PlaceholderResolver::default();
        let blank = vec!["-Dnode.offset=".to_string()];
        let (offset, ok) = resolve_offset(
            &resolver,
            &SymbolicExpression::parse("${node.offset:${cluster.offset:200}}"),
            blank.as_slice(),
        );
        assert_eq!((offset, ok), (200, true));

        let set = vec!["-Dnode.offset=".to_string(), "-Dcluster.offset=300".to_string()];
        let (offset, _) = resolve_offset(
            &resolver,
            &SymbolicExpression::parse("${node.offset:${cluster.offset:200}}"),
            set.as_slice(),
        );
        assert_eq!(offset, 300);
    }
}
