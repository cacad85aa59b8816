//! Textual host rewriting for proxied responses.
//!
//! Every reference to a routed local port (`http://localhost:3000`,
//! `https://127.0.0.1:3000`, `//localhost:3000`, with or without a leading
//! quote) becomes the relay's externally reachable address for that route.
//! All routes are applied to every response, so an app linking to a
//! sibling local service is rewritten too.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tapback_config::ProxyRoute;

static LOCAL_ORIGIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(https?:)?//(?:localhost|127\.0\.0\.1):(\d+)")
        .expect("proxy rewrite: static regex pattern must compile")
});

#[derive(Debug, Clone)]
pub struct HostRewriter {
    /// local port → `relay_address:external_port`
    targets: HashMap<u16, String>,
}

impl HostRewriter {
    pub fn new(relay_address: &str, routes: &[ProxyRoute]) -> Self {
        let targets = routes
            .iter()
            .map(|route| {
                (
                    route.local_port,
                    format!("{relay_address}:{}", route.external_port),
                )
            })
            .collect();
        Self { targets }
    }

    /// Rewrite every routed local origin in `text`. Borrowed when nothing matched.
    pub fn rewrite<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.targets.is_empty() {
            return Cow::Borrowed(text);
        }
        LOCAL_ORIGIN_RE.replace_all(text, |caps: &Captures| {
            let target = caps[2]
                .parse::<u16>()
                .ok()
                .and_then(|port| self.targets.get(&port));
            match (target, caps.get(1)) {
                // The relay only speaks plain HTTP.
                (Some(target), Some(_)) => format!("http://{target}"),
                (Some(target), None) => format!("//{target}"),
                (None, _) => caps[0].to_string(),
            }
        })
    }
}

/// Whether a `Content-Type` denotes a body the rewriter should touch.
pub fn is_textual(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime.starts_with("text/")
        || mime == "application/javascript"
        || mime == "application/json"
        || mime == "application/xml"
        || mime.starts_with("application/xhtml")
        || mime.ends_with("+json")
        || mime.ends_with("+xml")
}
