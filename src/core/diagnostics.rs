use crate::domain::model::{Diagnostic, DiagnosticKind};
use std::sync::{Mutex, MutexGuard};

/// 收集單一主機解析過程中的非致命問題
///
/// Shared by reference between the concurrently assembled instances of one host; the append is
/// the only synchronized operation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        instance: Option<&str>,
        field: &str,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            instance: instance.map(str::to_string),
            field: field.to_string(),
            kind,
            message: message.into(),
        };

        tracing::warn!(
            "⚠️ [{}] {} {:?}: {}",
            diagnostic.instance.as_deref().unwrap_or("-"),
            diagnostic.field,
            diagnostic.kind,
            diagnostic.message
        );

        self.lock().push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.lock().iter().filter(|d| d.kind == kind).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_insertion_order() {
        let diagnostics = Diagnostics::new();
        diagnostics.record(
            Some("server-one"),
            "profile",
            DiagnosticKind::UnresolvedReference,
            "profile 'full' not found",
        );
        diagnostics.record(None, "listeners", DiagnosticKind::ProbeFailure, "timeout");

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.count(DiagnosticKind::ProbeFailure), 1);

        let entries = diagnostics.into_vec();
        assert_eq!(entries[0].instance.as_deref(), Some("server-one"));
        assert_eq!(entries[1].field, "listeners");
    }
}
