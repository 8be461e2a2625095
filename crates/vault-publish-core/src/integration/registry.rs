//! Integration registry.
//!
//! Built once at startup and passed by reference to the compiler and the
//! publish flow. Filtering by settings and availability happens on every
//! query, because availability and declared patterns may change between
//! documents.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::card_link::CardLinkIntegration;
use super::datacore::DatacoreIntegration;
use super::dataview::DataviewIntegration;
use super::excalidraw::ExcalidrawIntegration;
use super::renderer::QueryRenderer;
use super::statblock::StatblockIntegration;
use super::{Integration, PatternDescriptor};
use crate::settings::PublishSettings;

/// Renderers available to the built-in integrations.
///
/// A missing renderer makes the matching integration unavailable.
#[derive(Clone, Default)]
pub struct RendererSet {
    pub dataview: Option<Arc<dyn QueryRenderer>>,
    pub datacore: Option<Arc<dyn QueryRenderer>>,
    pub excalidraw: Option<Arc<dyn QueryRenderer>>,
    pub statblocks: Option<Arc<dyn QueryRenderer>>,
}

pub struct IntegrationRegistry {
    integrations: Vec<Box<dyn Integration>>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self {
            integrations: Vec::new(),
        }
    }

    /// A registry holding the five built-in integrations.
    pub fn with_builtins(renderers: RendererSet) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(DataviewIntegration::new(renderers.dataview)));
        registry.register(Box::new(DatacoreIntegration::new(renderers.datacore)));
        registry.register(Box::new(ExcalidrawIntegration::new(renderers.excalidraw)));
        registry.register(Box::new(StatblockIntegration::new(renderers.statblocks)));
        registry.register(Box::new(CardLinkIntegration));
        registry
    }

    /// Register an integration.
    ///
    /// Registering an id twice replaces the earlier integration in its
    /// original slot, so ordering among equal priorities is kept.
    pub fn register(&mut self, integration: Box<dyn Integration>) {
        match self
            .integrations
            .iter()
            .position(|i| i.id() == integration.id())
        {
            Some(index) => {
                tracing::warn!(id = integration.id(), "integration registered twice; replacing");
                self.integrations[index] = integration;
            }
            None => self.integrations.push(integration),
        }
    }

    pub fn integrations(&self) -> &[Box<dyn Integration>] {
        &self.integrations
    }

    pub fn find(&self, id: &str) -> Option<&dyn Integration> {
        self.integrations
            .iter()
            .find(|i| i.id() == id)
            .map(|i| i.as_ref())
    }

    /// Integrations enabled in `settings` and currently available, by
    /// ascending priority. Equal priorities keep registration order.
    pub fn enabled(&self, settings: &PublishSettings) -> Vec<&dyn Integration> {
        let mut enabled: Vec<&dyn Integration> = self
            .integrations
            .iter()
            .map(|i| i.as_ref())
            .filter(|i| settings.integration_enabled(i.setting_key()) && available(*i))
            .collect();
        enabled.sort_by_key(|i| i.priority());
        enabled
    }

    /// Patterns of every enabled integration, in priority order.
    pub fn all_patterns(&self, settings: &PublishSettings) -> Vec<PatternDescriptor> {
        self.enabled(settings)
            .into_iter()
            .flat_map(|i| i.patterns())
            .collect()
    }

    /// Stylesheets of enabled integrations, keyed by integration id.
    pub fn collected_assets(&self, settings: &PublishSettings) -> BTreeMap<String, String> {
        self.enabled(settings)
            .into_iter()
            .filter_map(|i| i.stylesheet().map(|css| (i.id().to_string(), css.to_string())))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.integrations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.integrations.len()
    }
}

impl Default for IntegrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Availability check with failures counted as unavailable.
fn available(integration: &dyn Integration) -> bool {
    match integration.is_available() {
        Ok(available) => available,
        Err(e) => {
            tracing::warn!(id = integration.id(), error = %e, "availability check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::renderer::StaticRenderer;
    use crate::integration::{IntegrationContext, PatternMatch};
    use anyhow::{bail, Result};
    use async_trait::async_trait;

    struct Fake {
        id: &'static str,
        key: &'static str,
        priority: i32,
        available: Option<bool>,
        marker: &'static str,
    }

    impl Fake {
        fn new(id: &'static str, priority: i32) -> Self {
            Self {
                id,
                key: id,
                priority,
                available: Some(true),
                marker: "",
            }
        }
    }

    #[async_trait]
    impl Integration for Fake {
        fn id(&self) -> &str {
            self.id
        }
        fn setting_key(&self) -> &str {
            self.key
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn stylesheet(&self) -> Option<&str> {
            Some(self.marker)
        }
        fn is_available(&self) -> Result<bool> {
            match self.available {
                Some(a) => Ok(a),
                None => bail!("renderer crashed"),
            }
        }
        fn patterns(&self) -> Vec<PatternDescriptor> {
            vec![PatternDescriptor::inline(self.id, self.id)]
        }
        async fn compile(&self, _m: &PatternMatch, _ctx: &IntegrationContext<'_>) -> Result<String> {
            Ok(String::new())
        }
    }

    fn settings(keys: &[&str]) -> PublishSettings {
        let mut s = PublishSettings::default();
        for k in keys {
            s.integrations.insert(k.to_string(), true);
        }
        s
    }

    fn ids(list: Vec<&dyn Integration>) -> Vec<String> {
        list.into_iter().map(|i| i.id().to_string()).collect()
    }

    #[test]
    fn enabled_sorted_by_priority_and_stable() {
        let mut registry = IntegrationRegistry::new();
        registry.register(Box::new(Fake::new("late", 30)));
        registry.register(Box::new(Fake::new("tie-a", 10)));
        registry.register(Box::new(Fake::new("tie-b", 10)));
        registry.register(Box::new(Fake::new("early", 5)));
        let s = settings(&["late", "tie-a", "tie-b", "early"]);
        assert_eq!(
            ids(registry.enabled(&s)),
            vec!["early", "tie-a", "tie-b", "late"]
        );
    }

    #[test]
    fn disabled_and_unavailable_are_skipped() {
        let mut registry = IntegrationRegistry::new();
        registry.register(Box::new(Fake::new("on", 1)));
        registry.register(Box::new(Fake::new("off", 2)));
        registry.register(Box::new(Fake {
            available: Some(false),
            ..Fake::new("missing", 3)
        }));
        registry.register(Box::new(Fake {
            available: None,
            ..Fake::new("broken", 4)
        }));
        let s = settings(&["on", "missing", "broken"]);
        assert_eq!(ids(registry.enabled(&s)), vec!["on"]);
        assert_eq!(registry.all_patterns(&s).len(), 1);
    }

    #[test]
    fn duplicate_registration_replaces_in_place() {
        let mut registry = IntegrationRegistry::new();
        registry.register(Box::new(Fake::new("a", 1)));
        registry.register(Box::new(Fake::new("b", 1)));
        registry.register(Box::new(Fake {
            marker: "v2",
            ..Fake::new("a", 1)
        }));
        assert_eq!(registry.len(), 2);
        let s = settings(&["a", "b"]);
        assert_eq!(ids(registry.enabled(&s)), vec!["a", "b"]);
        assert_eq!(registry.collected_assets(&s)["a"], "v2");
    }

    #[test]
    fn builtins_without_renderers_only_enable_card_links() {
        let registry = IntegrationRegistry::with_builtins(RendererSet::default());
        assert_eq!(registry.len(), 5);
        let s = settings(&[
            "dataview",
            "datacore",
            "excalidraw",
            "fantasy_statblocks",
            "auto_card_link",
        ]);
        assert_eq!(ids(registry.enabled(&s)), vec!["auto-card-link"]);
    }

    #[test]
    fn builtins_run_in_documented_order() {
        let renderer: Arc<dyn QueryRenderer> = Arc::new(StaticRenderer::new("{source}"));
        let registry = IntegrationRegistry::with_builtins(RendererSet {
            dataview: Some(renderer.clone()),
            datacore: Some(renderer.clone()),
            excalidraw: Some(renderer.clone()),
            statblocks: Some(renderer),
        });
        let s = settings(&[
            "auto_card_link",
            "fantasy_statblocks",
            "excalidraw",
            "datacore",
            "dataview",
        ]);
        assert_eq!(
            ids(registry.enabled(&s)),
            vec![
                "dataview",
                "datacore",
                "excalidraw",
                "fantasy-statblocks",
                "auto-card-link"
            ]
        );
        let styles = registry.collected_assets(&s);
        assert!(styles.contains_key("auto-card-link"));
        assert!(styles.contains_key("dataview"));
    }
}
