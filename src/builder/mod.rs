//! Host editor adapters.
//!
//! An adapter answers two questions about its editor: does this completed
//! request mean "the document was saved", and which transport does the editor
//! save through. Adapters are stateless and never change after creation.

mod adapters;
mod payload;
mod registry;

use url::Url;

pub use adapters::{Beaver, Breakdance, Bricks, Elementor, Gutenberg, LiveCanvas, Oxygen};
pub use payload::RequestPayload;
pub use registry::{Capability, Integration, Registry, RegistryError};

/// Editor quirks relevant to request interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Environment {
    /// Saves go through the legacy request object instead of `fetch`.
    pub uses_legacy_transport: bool,
}

pub trait BuilderAdapter: Send + Sync {
    /// Stable builder id, also used as the provider name.
    fn id(&self) -> &'static str;

    /// Pure check on a completed request. No side effects.
    fn detect_save(&self, url: &Url, payload: &RequestPayload) -> bool;

    fn describe_environment(&self) -> Environment;
}

/// Look up a parameter in the body first, then in the query string.
pub(crate) fn param(url: &Url, payload: &RequestPayload, name: &str) -> Option<String> {
    payload.field(name).map(|v| v.into_owned()).or_else(|| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    })
}

/// WordPress admin ajax endpoint.
pub(crate) fn is_admin_ajax(url: &Url) -> bool {
    url.path().ends_with("/admin-ajax.php")
}
