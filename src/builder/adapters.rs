//! Built-in adapters, one per supported editor.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use url::Url;

use super::{BuilderAdapter, Environment, RequestPayload, is_admin_ajax, param};

const LEGACY: Environment = Environment {
    uses_legacy_transport: true,
};
const FETCH: Environment = Environment {
    uses_legacy_transport: false,
};

/// Admin-ajax save identified by its `action` field.
fn ajax_action(url: &Url, payload: &RequestPayload, action: &str) -> bool {
    is_admin_ajax(url) && param(url, payload, "action").as_deref() == Some(action)
}

// =============================================================================
// Admin-ajax editors
// =============================================================================

pub struct Bricks;

impl BuilderAdapter for Bricks {
    fn id(&self) -> &'static str {
        "bricks"
    }

    fn detect_save(&self, url: &Url, payload: &RequestPayload) -> bool {
        ajax_action(url, payload, "bricks_save_post")
    }

    fn describe_environment(&self) -> Environment {
        LEGACY
    }
}

pub struct Oxygen;

impl BuilderAdapter for Oxygen {
    fn id(&self) -> &'static str {
        "oxygen"
    }

    fn detect_save(&self, url: &Url, payload: &RequestPayload) -> bool {
        ajax_action(url, payload, "ct_save_components_tree")
    }

    fn describe_environment(&self) -> Environment {
        LEGACY
    }
}

pub struct LiveCanvas;

impl BuilderAdapter for LiveCanvas {
    fn id(&self) -> &'static str {
        "livecanvas"
    }

    fn detect_save(&self, url: &Url, payload: &RequestPayload) -> bool {
        ajax_action(url, payload, "lc_save_page")
    }

    fn describe_environment(&self) -> Environment {
        LEGACY
    }
}

/// Beaver Builder nests the action inside `fl_builder_data`.
pub struct Beaver;

impl BuilderAdapter for Beaver {
    fn id(&self) -> &'static str {
        "beaver"
    }

    fn detect_save(&self, url: &Url, payload: &RequestPayload) -> bool {
        param(url, payload, "fl_builder_data[action]").as_deref() == Some("save_layout")
    }

    fn describe_environment(&self) -> Environment {
        LEGACY
    }
}

/// Elementor batches editor actions into one `elementor_ajax` request whose
/// `actions` field is a JSON object keyed by request id.
pub struct Elementor;

impl BuilderAdapter for Elementor {
    fn id(&self) -> &'static str {
        "elementor"
    }

    fn detect_save(&self, url: &Url, payload: &RequestPayload) -> bool {
        if !ajax_action(url, payload, "elementor_ajax") {
            return false;
        }
        let Some(actions) = param(url, payload, "actions") else {
            return false;
        };
        match serde_json::from_str::<Value>(&actions) {
            Ok(Value::Object(map)) => map
                .values()
                .any(|entry| entry.get("action").and_then(Value::as_str) == Some("save_builder")),
            _ => false,
        }
    }

    fn describe_environment(&self) -> Environment {
        LEGACY
    }
}

// =============================================================================
// Fetch-based editors
// =============================================================================

pub struct Breakdance;

impl BuilderAdapter for Breakdance {
    fn id(&self) -> &'static str {
        "breakdance"
    }

    fn detect_save(&self, url: &Url, payload: &RequestPayload) -> bool {
        param(url, payload, "_breakdance_doing_ajax").as_deref() == Some("yes")
            && param(url, payload, "action").as_deref() == Some("breakdance_save")
    }

    fn describe_environment(&self) -> Environment {
        FETCH
    }
}

static REST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/wp/v2/[A-Za-z0-9_-]+/[0-9]+/?$").expect("valid rest route pattern")
});

/// Block editor: a non-empty write to a single REST item.
pub struct Gutenberg;

impl BuilderAdapter for Gutenberg {
    fn id(&self) -> &'static str {
        "gutenberg"
    }

    fn detect_save(&self, url: &Url, payload: &RequestPayload) -> bool {
        let route = url
            .query_pairs()
            .find(|(k, _)| k == "rest_route")
            .map(|(_, v)| v.into_owned());
        let is_item = REST_ITEM.is_match(url.path())
            || route.is_some_and(|route| REST_ITEM.is_match(&route));
        is_item && !payload.is_empty()
    }

    fn describe_environment(&self) -> Environment {
        FETCH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn form(body: &str) -> RequestPayload {
        RequestPayload::parse(Some("application/x-www-form-urlencoded"), body)
    }

    const AJAX: &str = "https://site.test/wp-admin/admin-ajax.php";

    #[test]
    fn test_bricks() {
        assert!(Bricks.detect_save(&url(AJAX), &form("action=bricks_save_post&postId=1")));
        assert!(!Bricks.detect_save(&url(AJAX), &form("action=bricks_get_post")));
        assert!(!Bricks.detect_save(
            &url("https://site.test/other.php"),
            &form("action=bricks_save_post")
        ));
        assert!(Bricks.describe_environment().uses_legacy_transport);
    }

    #[test]
    fn test_action_in_query_string() {
        let u = url(&format!("{AJAX}?action=ct_save_components_tree"));
        assert!(Oxygen.detect_save(&u, &RequestPayload::Empty));
        assert!(LiveCanvas.detect_save(&url(AJAX), &form("action=lc_save_page")));
    }

    #[test]
    fn test_beaver() {
        let body = "fl_builder_data%5Baction%5D=save_layout&fl_builder_data%5Bpost_id%5D=9";
        assert!(Beaver.detect_save(&url(AJAX), &form(body)));
        assert!(!Beaver.detect_save(&url(AJAX), &form("fl_builder_data%5Baction%5D=render_layout")));
    }

    #[test]
    fn test_elementor_batched_actions() {
        let save = r#"{"save_builder":{"action":"save_builder","data":{"status":"publish"}}}"#;
        let other = r#"{"get_panel":{"action":"get_panel"}}"#;
        let body = |actions: &str| {
            form(
                &url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("action", "elementor_ajax")
                    .append_pair("actions", actions)
                    .finish(),
            )
        };
        assert!(Elementor.detect_save(&url(AJAX), &body(save)));
        assert!(!Elementor.detect_save(&url(AJAX), &body(other)));
        assert!(!Elementor.detect_save(&url(AJAX), &body("not json")));
    }

    #[test]
    fn test_breakdance() {
        let u = url("https://site.test/?_breakdance_doing_ajax=yes");
        assert!(Breakdance.detect_save(&u, &form("action=breakdance_save&id=4")));
        assert!(!Breakdance.detect_save(&u, &form("action=breakdance_load")));
        assert!(!Breakdance.describe_environment().uses_legacy_transport);
    }

    #[test]
    fn test_gutenberg() {
        let body = RequestPayload::parse(Some("application/json"), r#"{"content":"<p/>"}"#);
        assert!(Gutenberg.detect_save(&url("https://site.test/wp-json/wp/v2/pages/12"), &body));
        assert!(Gutenberg.detect_save(
            &url("https://site.test/?rest_route=%2Fwp%2Fv2%2Fposts%2F7"),
            &body
        ));
        // reads carry no body
        assert!(!Gutenberg.detect_save(
            &url("https://site.test/wp-json/wp/v2/pages/12"),
            &RequestPayload::Empty
        ));
        assert!(!Gutenberg.detect_save(&url("https://site.test/wp-json/wp/v2/pages"), &body));
    }

    #[test]
    fn test_rest_item_pattern() {
        LazyLock::force(&REST_ITEM);
        assert!(REST_ITEM.is_match("/wp/v2/wp_template-part/3/"));
        assert!(!REST_ITEM.is_match("/wp/v2/pages/12/revisions"));
        assert!(!REST_ITEM.is_match("/wp/v2/pages/draft"));
    }
}
