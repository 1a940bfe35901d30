/// `Misconfigured`/`PayloadInvalid`-kind failures from the dispatcher, see
/// `SPEC_FULL.md` §7. Never fatal: the event processor logs these and moves
/// on to the next notification.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("integration '{0}' is not registered")]
    NotFound(String),
    #[error("validator '{0}' is not registered")]
    UnknownValidator(String),
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("'{0}' is not a valid HTTP method")]
    InvalidVerb(String),
    #[error("sending HTTP request: {0}")]
    Transport(#[from] reqwest::Error),
}

/// `PayloadInvalid`-kind failure from rendering a condition or message
/// template. `handlebars::RenderError` already wraps parse failures
/// (`render_template` compiles the template inline), so one variant covers
/// both the "unterminated `{{`" and the "unknown helper" cases.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("rendering template: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// A watcher/source subscription task did not confirm it had stopped within
/// the registry's poll budget. The entry is left in place; the controller's
/// cleaner loop retries on its next sweep.
#[derive(Debug, thiserror::Error)]
#[error("watcher for '{0}' did not stop within the poll budget")]
pub struct DisableError(pub notify_core::ResourceKey);
