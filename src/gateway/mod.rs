use std::sync::Arc;

use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};

use crate::metrics::Metrics;

// ============================================================================
// Gateway Router
// ============================================================================
//
// Prefix-matched reverse proxy. The longest configured prefix wins, the
// prefix is stripped, and the rest of the request passes through unchanged.
// Hop-managed headers (Host, Content-Length) are recomputed by the client.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct Location {
    pub prefix: String,
    pub url: String,
}

pub struct Router {
    // Sorted by prefix length, longest first
    locations: Vec<Location>,
    client: reqwest::Client,
    metrics: Arc<Metrics>,
}

impl Router {
    pub fn new(mut locations: Vec<Location>, metrics: Arc<Metrics>) -> Self {
        locations.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        Self {
            locations,
            client: reqwest::Client::new(),
            metrics,
        }
    }

    fn match_location<'a>(&'a self, path: &'a str) -> Option<(&'a Location, &'a str)> {
        self.locations
            .iter()
            .find_map(|loc| path.strip_prefix(&loc.prefix).map(|rest| (loc, rest)))
    }

    pub async fn forward(&self, req: HttpRequest, body: web::Bytes) -> HttpResponse {
        let path = req.path();
        tracing::info!(method = %req.method(), path, "request received");

        let Some((location, route_path)) = self.match_location(path) else {
            return not_found();
        };
        self.metrics
            .requests_routed
            .with_label_values(&[&location.prefix])
            .inc();

        let url = build_url(&location.url, route_path, req.query_string());

        let Ok(method) = reqwest::Method::from_bytes(req.method().as_str().as_bytes()) else {
            return internal_server_error();
        };

        let mut outbound = self.client.request(method, &url);
        for (name, value) in req.headers() {
            if skip_header(name.as_str()) {
                continue;
            }
            outbound = outbound.header(name.as_str(), value.as_bytes());
        }

        let response = match outbound.body(body.to_vec()).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(url = %location.url, error = %e, "failed to route request");
                return bad_gateway();
            }
        };

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = HttpResponse::build(status);
        for (name, value) in response.headers() {
            if skip_header(name.as_str()) {
                continue;
            }
            if let (Ok(n), Ok(v)) = (
                HeaderName::from_bytes(name.as_str().as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                builder.append_header((n, v));
            }
        }

        match response.bytes().await {
            Ok(bytes) => {
                tracing::info!(method = %req.method(), path, code = status.as_u16(), "request served");
                builder.body(bytes)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to copy response");
                internal_server_error()
            }
        }
    }
}

fn build_url(base: &str, path: &str, query: &str) -> String {
    let mut url = format!("{base}{path}");
    if !query.is_empty() {
        url.push('?');
        url.push_str(query);
    }
    url
}

fn skip_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("host")
        || name.eq_ignore_ascii_case("content-length")
        || name.eq_ignore_ascii_case("transfer-encoding")
        || name.eq_ignore_ascii_case("connection")
}

/// Entry point mounted as the gateway app's default service.
pub async fn proxy(
    router: web::Data<Router>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    router.forward(req, body).await
}

const NOT_FOUND_BODY: &str = r#"{"error":"Not Found","code":404}"#;
const BAD_GATEWAY_BODY: &str = r#"{"error":"Bad gateway","code":502}"#;
const INTERNAL_SERVER_ERROR_BODY: &str = r#"{"error":"Internal server error","code":500}"#;

fn not_found() -> HttpResponse {
    HttpResponse::NotFound()
        .content_type("application/json")
        .body(NOT_FOUND_BODY)
}

fn bad_gateway() -> HttpResponse {
    HttpResponse::BadGateway()
        .content_type("application/json")
        .body(BAD_GATEWAY_BODY)
}

fn internal_server_error() -> HttpResponse {
    HttpResponse::InternalServerError()
        .content_type("application/json")
        .body(INTERNAL_SERVER_ERROR_BODY)
}
