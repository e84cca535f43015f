//! Cross-cutting HTTP layers: security response headers and per-IP rate
//! limiting on the API.

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;

/// Headers added to every response that does not already carry them.
pub const SECURITY_HEADERS: &[(&str, &str)] = &[
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
         form-action 'self';frame-ancestors 'self';img-src 'self' data:;\
         object-src 'none';script-src 'self';script-src-attr 'none';\
         style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

pub fn with_security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SECURITY_HEADERS.iter().fold(router, |router, &(name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ))
    })
}

/// Limit each client IP to `rate_limit_requests` per `rate_limit_window_secs`.
///
/// The quota refills one request every `window / requests`. Keys come from
/// the peer address, so the server must be run with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn with_rate_limit<S>(router: Router<S>, config: &ServerConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let requests = config.rate_limit_requests;
    if requests == 0 {
        return router;
    }
    let window_ms = config.rate_limit_window_secs.saturating_mul(1000);
    let period_ms = (window_ms / u64::from(requests)).max(1);

    let Some(governor) = GovernorConfigBuilder::default()
        .per_millisecond(period_ms)
        .burst_size(requests)
        .finish()
    else {
        warn!("invalid rate limit settings, API rate limiting disabled");
        return router;
    };
    info!(
        requests,
        window_secs = config.rate_limit_window_secs,
        "API rate limit enabled"
    );
    router.layer(GovernorLayer {
        config: Arc::new(governor),
    })
}
