use std::collections::HashMap;

use browser_ai_core::{Action, Error, Result};
use tracing::{debug, warn};

use crate::{ActionDescriptor, ActionKind};

struct CatalogEntry {
    descriptor: ActionDescriptor,
    /// `None` when the advertised schema does not compile; such entries accept any arguments.
    validator: Option<jsonschema::Validator>,
}

/// Every action the model may call, external and internal, in one namespace.
pub struct ToolCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a catalog from descriptors, rejecting duplicate names.
    pub fn with_descriptors(descriptors: impl IntoIterator<Item = ActionDescriptor>) -> Result<Self> {
        let mut catalog = Self::new();
        for descriptor in descriptors {
            catalog.register(descriptor)?;
        }
        Ok(catalog)
    }

    pub fn register(&mut self, descriptor: ActionDescriptor) -> Result<()> {
        if self.index.contains_key(&descriptor.name) {
            return Err(Error::Validation(format!(
                "duplicate action name '{}' in catalog",
                descriptor.name
            )));
        }

        let validator = match jsonschema::validator_for(&descriptor.parameters) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(name = %descriptor.name, error = %e, "Parameter schema does not compile, arguments will not be checked");
                None
            }
        };

        debug!(name = %descriptor.name, kind = ?descriptor.kind, "Registering action");
        self.index.insert(descriptor.name.clone(), self.entries.len());
        self.entries.push(CatalogEntry { descriptor, validator });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ActionDescriptor> {
        self.index.get(name).map(|&i| &self.entries[i].descriptor)
    }

    pub fn kind_of(&self, name: &str) -> Option<ActionKind> {
        self.get(name).map(|d| d.kind)
    }

    pub fn is_internal(&self, name: &str) -> bool {
        self.kind_of(name) == Some(ActionKind::Internal)
    }

    /// Names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.descriptor.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `- name: description` for every entry, internal ones included.
    pub fn describe(&self) -> String {
        Self::render(self.entries.iter().map(|e| &e.descriptor))
    }

    /// `- name: description` for backend actions only. This is what the model
    /// sees as its capability list.
    pub fn describe_external_only(&self) -> String {
        Self::render(
            self.entries
                .iter()
                .map(|e| &e.descriptor)
                .filter(|d| !d.is_internal()),
        )
    }

    fn render<'a>(descriptors: impl Iterator<Item = &'a ActionDescriptor>) -> String {
        descriptors
            .map(|d| format!("- {}: {}", d.name, d.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// False if the action is unknown or its arguments fail the schema.
    pub fn validate(&self, action: &Action) -> bool {
        self.validation_error(action).is_none()
    }

    /// First reason the action would be rejected, if any.
    pub fn validation_error(&self, action: &Action) -> Option<String> {
        let Some(&i) = self.index.get(&action.name) else {
            return Some(format!("unknown action '{}'", action.name));
        };
        let validator = self.entries[i].validator.as_ref()?;
        validator
            .iter_errors(&action.arguments)
            .next()
            .map(|e| e.to_string())
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn navigate() -> ActionDescriptor {
        ActionDescriptor::external(
            "browser_navigate",
            "Navigate to a URL",
            json!({
                "type": "object",
                "properties": {"url": {"type": "string"}},
                "required": ["url"]
            }),
        )
    }

    fn snapshot() -> ActionDescriptor {
        ActionDescriptor::external(
            "browser_snapshot",
            "Capture accessibility snapshot",
            json!({"type": "object", "properties": {}}),
        )
    }

    fn planner() -> ActionDescriptor {
        ActionDescriptor::internal("todo_write", "Internal planning", json!({"type": "object"}))
    }

    #[test]
    fn test_catalog_new_empty() {
        let catalog = ToolCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.get("browser_navigate").is_none());
        assert_eq!(catalog.describe(), "");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = ToolCatalog::with_descriptors(vec![navigate(), snapshot(), navigate()])
            .err()
            .unwrap();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_internal_and_external_share_namespace() {
        let clash = ActionDescriptor::internal("browser_snapshot", "shadow", json!({}));
        assert!(ToolCatalog::with_descriptors(vec![snapshot(), clash]).is_err());
    }

    #[test]
    fn test_describe_in_insertion_order() {
        let catalog = ToolCatalog::with_descriptors(vec![navigate(), planner(), snapshot()]).unwrap();
        assert_eq!(
            catalog.describe(),
            "- browser_navigate: Navigate to a URL\n- todo_write: Internal planning\n- browser_snapshot: Capture accessibility snapshot"
        );
        assert_eq!(catalog.names(), vec!["browser_navigate", "todo_write", "browser_snapshot"]);
    }

    #[test]
    fn test_describe_external_only_hides_internal() {
        let catalog = ToolCatalog::with_descriptors(vec![navigate(), planner(), snapshot()]).unwrap();
        let text = catalog.describe_external_only();
        assert!(!text.contains("todo_write"));
        assert_eq!(
            text,
            "- browser_navigate: Navigate to a URL\n- browser_snapshot: Capture accessibility snapshot"
        );
    }

    #[test]
    fn test_is_internal_exact_match() {
        let catalog = ToolCatalog::with_descriptors(vec![navigate(), planner()]).unwrap();
        assert!(catalog.is_internal("todo_write"));
        assert!(!catalog.is_internal("todo_write_v2"));
        assert!(!catalog.is_internal("browser_navigate"));
        assert!(!catalog.is_internal("unknown"));
    }

    #[test]
    fn test_validate() {
        let catalog = ToolCatalog::with_descriptors(vec![navigate(), snapshot()]).unwrap();
        assert!(catalog.validate(&Action::new("browser_navigate", json!({"url": "https://example.com"}))));
        assert!(!catalog.validate(&Action::new("browser_navigate", json!({}))));
        assert!(!catalog.validate(&Action::new("browser_navigate", json!({"url": 42}))));
        assert!(catalog.validate(&Action::bare("browser_snapshot")));
        assert!(!catalog.validate(&Action::bare("browser_fly")));
    }

    #[test]
    fn test_validation_error_names_the_problem() {
        let catalog = ToolCatalog::with_descriptors(vec![navigate()]).unwrap();
        let missing = catalog
            .validation_error(&Action::new("browser_navigate", json!({})))
            .unwrap();
        assert!(missing.contains("url"));
        assert!(catalog
            .validation_error(&Action::new("browser_navigate", json!({"url": "https://a.test"})))
            .is_none());
        assert!(catalog.validation_error(&Action::bare("browser_fly")).is_some());
    }

    #[test]
    fn test_uncompilable_schema_accepts_anything() {
        let odd = ActionDescriptor::external("browser_odd", "odd", json!({"type": 17}));
        let catalog = ToolCatalog::with_descriptors(vec![odd]).unwrap();
        assert!(catalog.validate(&Action::new("browser_odd", json!({"anything": true}))));
    }
}
