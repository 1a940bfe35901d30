//! Renders the Handlebars templates embedded in `Notification.spec.conditions`
//! and `Notification.spec.message.data` against an event context.

use std::collections::HashMap;

use handlebars::Handlebars;
use serde::Serialize;
use serde_json::Value;

use crate::error::TemplateError;
use crate::subscription::WatchEvent;

/// The object made available to a template as `{{ object.* }}`,
/// `{{ previousObject.* }}`, `{{ eventType }}` and `{{ sources.* }}`.
#[derive(Debug, Serialize)]
pub struct EventContext {
    #[serde(rename = "eventType")]
    pub event_type: &'static str,
    pub object: Value,
    #[serde(rename = "previousObject", skip_serializing_if = "Option::is_none")]
    pub previous_object: Option<Value>,
    /// Keyed by `ResourceKey` wire string; populated by the Event Processor
    /// after construction, not by [`EventContext::from_event`] itself, since
    /// it needs a `SourceRegistry` lookup the event alone can't provide.
    #[serde(default)]
    pub sources: HashMap<String, Vec<Value>>,
}

impl EventContext {
    pub fn from_event(event: &WatchEvent) -> Self {
        match event {
            WatchEvent::Added(new) => Self {
                event_type: "ADDED",
                object: new.clone(),
                previous_object: None,
                sources: HashMap::new(),
            },
            WatchEvent::Modified { old, new } => Self {
                event_type: "MODIFIED",
                object: new.clone(),
                previous_object: Some(old.clone()),
                sources: HashMap::new(),
            },
            WatchEvent::Deleted(old) => Self {
                event_type: "DELETED",
                object: old.clone(),
                previous_object: None,
                sources: HashMap::new(),
            },
        }
    }
}

/// Render `template` (a single Handlebars expression or string) against
/// `context`. A fresh [`Handlebars`] registry is built per call: templates
/// here are short, one-off strings evaluated at most once per event, so
/// there is no compiled-template cache worth keeping warm.
pub fn render(template: &str, context: &EventContext) -> Result<String, TemplateError> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(false);
    registry.register_escape_fn(handlebars::no_escape);
    Ok(registry.render_template(template, context)?)
}
