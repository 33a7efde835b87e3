//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: body limits, route matching,
//! method checks and the access log.

use crate::config::AppState;
use crate::handler::sensor_api;
use crate::http::{self, HttpResponse};
use crate::logger::{self, AccessLogEntry};
use crate::page;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body as _, Bytes, Incoming};
use hyper::header::{HeaderMap, CONTENT_LENGTH, REFERER, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Paths the monitor answers on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Page,
    Data,
    Calibrate,
    Health,
}

impl Route {
    fn resolve(path: &str, state: &AppState) -> Option<Self> {
        match path {
            "/" => Some(Self::Page),
            "/data" => Some(Self::Data),
            "/calibrate" => Some(Self::Calibrate),
            p if state.config.health.enabled && p == state.config.health.path => {
                Some(Self::Health)
            }
            _ => None,
        }
    }

    const fn allow(self) -> &'static str {
        match self {
            Self::Page | Self::Health => "GET, HEAD, OPTIONS",
            Self::Data => "GET, POST, OPTIONS",
            Self::Calibrate => "GET, POST, DELETE, OPTIONS",
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<HttpResponse, Infallible> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let max_body_size = state.config.http.max_body_size;

    let mut response = if let Some(resp) = check_body_size(&parts.headers, max_body_size) {
        resp
    } else {
        match read_body(&parts.method, body, max_body_size).await {
            Ok(bytes) => dispatch(&parts.method, parts.uri.path(), &bytes, &state),
            Err(resp) => resp,
        }
    };

    http::apply_common_headers(
        &mut response,
        &state.config.http.server_name,
        state.config.http.enable_cors,
    );

    if state.cached_access_log.load(Ordering::Relaxed) {
        let mut entry = AccessLogEntry::new(
            peer_addr.ip().to_string(),
            parts.method.to_string(),
            parts.uri.path().to_string(),
        );
        entry.query = parts.uri.query().map(ToString::to_string);
        entry.http_version = version_label(parts.version).to_string();
        entry.status = response.status().as_u16();
        entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
        entry.referer = header_string(&parts.headers, REFERER);
        entry.user_agent = header_string(&parts.headers, USER_AGENT);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route a request whose body has already been read
pub fn dispatch(method: &Method, path: &str, body: &[u8], state: &AppState) -> HttpResponse {
    let Some(route) = Route::resolve(path, state) else {
        return http::build_404_response();
    };

    match (route, method) {
        (_, &Method::OPTIONS) => {
            http::build_options_response(route.allow(), state.config.http.enable_cors)
        }
        (Route::Page, &Method::GET) => http::build_html_response(page::render_page(), false),
        (Route::Page, &Method::HEAD) => http::build_html_response(page::render_page(), true),
        (Route::Data, &Method::GET) => sensor_api::get_data(state),
        (Route::Data, &Method::POST) => sensor_api::push_data(body, state),
        (Route::Calibrate, &Method::GET | &Method::POST) => sensor_api::calibrate(state),
        (Route::Calibrate, &Method::DELETE) => sensor_api::reset_calibration(state),
        (Route::Health, &Method::GET | &Method::HEAD) => http::build_health_response(),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method} {path}"));
            http::build_405_response(route.allow())
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<HttpResponse> {
    let size_str = headers.get(CONTENT_LENGTH)?.to_str().ok()?;
    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Some(http::build_413_response())
        }
        _ => None,
    }
}

/// Collect the body of a POST, enforcing the size limit on chunked uploads too
async fn read_body(
    method: &Method,
    body: Incoming,
    max_body_size: u64,
) -> Result<Bytes, HttpResponse> {
    if *method != Method::POST {
        return Ok(Bytes::new());
    }

    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_warning(&format!("Request body exceeded {max_body_size} bytes"));
            Err(http::build_413_response())
        }
        Err(e) => {
            logger::log_error(&format!("Failed to read request body: {e}"));
            Err(http::build_json_error(
                StatusCode::BAD_REQUEST,
                "failed to read request body",
            ))
        }
    }
}

fn header_string(headers: &HeaderMap, name: hyper::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn version_label(version: hyper::Version) -> &'static str {
    match version {
        hyper::Version::HTTP_09 => "0.9",
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        hyper::Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use hyper::header::{ALLOW, CACHE_CONTROL, CONTENT_TYPE};

    fn state(toml: &str) -> AppState {
        AppState::from_config(&config::from_toml(toml).unwrap())
    }

    async fn body_json(resp: HttpResponse) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(resp: HttpResponse) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_root_serves_page() {
        let st = state("");
        let resp = dispatch(&Method::GET, "/", b"", &st);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(resp.headers()[CACHE_CONTROL], "no-cache");
        assert_eq!(body_text(resp).await, page::render_page());
    }

    #[tokio::test]
    async fn test_head_root_has_no_body() {
        let st = state("");
        let resp = dispatch(&Method::HEAD, "/", b"", &st);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[CONTENT_LENGTH],
            page::render_page().len().to_string().as_str()
        );
        assert!(body_text(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_data_reports_reading() {
        let st = state("");
        st.tracker.ingest_angles(Some(12.34), Some(-5.67)).unwrap();
        let resp = dispatch(&Method::GET, "/data", b"", &st);
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["pitch"], "12.34");
        assert_eq!(json["roll"], "-5.67");
        assert_eq!(json["alert"], false);
        assert_eq!(json["calibrated"], false);
    }

    #[tokio::test]
    async fn test_calibrate_zeroes_reading() {
        let st = state("");
        st.tracker.ingest_angles(Some(3.0), Some(4.0)).unwrap();

        let resp = dispatch(&Method::GET, "/calibrate", b"", &st);
        assert_eq!(resp.status(), StatusCode::OK);
        let report = body_json(resp).await;
        assert_eq!(report["status"], "OK");
        assert_eq!(report["calibrated"], true);
        assert_eq!(report["pitch_offset"], 3.0);

        let json = body_json(dispatch(&Method::GET, "/data", b"", &st)).await;
        assert_eq!(json["pitch"], "0.00");
        assert_eq!(json["roll"], "0.00");
        assert_eq!(json["calibrated"], true);
    }

    #[tokio::test]
    async fn test_post_calibrate_and_delete() {
        let st = state("");
        st.tracker.ingest_angles(Some(1.0), Some(1.0)).unwrap();
        assert_eq!(dispatch(&Method::POST, "/calibrate", b"", &st).status(), StatusCode::OK);

        let resp = dispatch(&Method::DELETE, "/calibrate", b"", &st);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["calibrated"], false);
        assert_eq!(st.tracker.reading().pitch, "1.00");
    }

    #[tokio::test]
    async fn test_push_in_push_mode() {
        let st = state("[sensor]\nsource = \"push\"\n");
        let resp = dispatch(&Method::POST, "/data", br#"{"roll": 7.5}"#, &st);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "OK");
        assert_eq!(st.tracker.reading().roll, "7.50");
        assert_eq!(st.tracker.reading().pitch, "0.00");
    }

    #[tokio::test]
    async fn test_push_rejects_bad_payloads() {
        let st = state("[sensor]\nsource = \"push\"\n");
        let resp = dispatch(&Method::POST, "/data", b"{not json", &st);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(resp).await["message"]
            .as_str()
            .unwrap()
            .starts_with("malformed JSON"));

        let resp = dispatch(&Method::POST, "/data", b"{}", &st);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = dispatch(&Method::POST, "/data", br#"{"roll": "steep"}"#, &st);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(!st.tracker.has_samples());
    }

    #[test]
    fn test_push_refused_with_onboard_sensor() {
        let st = state("");
        let resp = dispatch(&Method::POST, "/data", br#"{"roll": 1.0}"#, &st);
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert!(!st.tracker.has_samples());
    }

    #[tokio::test]
    async fn test_health() {
        let st = state("");
        let resp = dispatch(&Method::GET, "/healthz", b"", &st);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");

        let off = state("[health]\nenabled = false\n");
        assert_eq!(
            dispatch(&Method::GET, "/healthz", b"", &off).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_unknown_path_is_404() {
        let st = state("");
        assert_eq!(
            dispatch(&Method::GET, "/index.html", b"", &st).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            dispatch(&Method::GET, "/data/", b"", &st).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_wrong_method_is_405() {
        let st = state("");
        let resp = dispatch(&Method::PUT, "/data", b"", &st);
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()[ALLOW], "GET, POST, OPTIONS");

        let resp = dispatch(&Method::POST, "/", b"", &st);
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()[ALLOW], "GET, HEAD, OPTIONS");
    }

    #[test]
    fn test_options_preflight() {
        let st = state("[http]\nenable_cors = true\n");
        let resp = dispatch(&Method::OPTIONS, "/calibrate", b"", &st);
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers()[ALLOW], "GET, POST, DELETE, OPTIONS");
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    }

    #[test]
    fn test_content_length_limit() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, "5000".parse().unwrap());
        let resp = check_body_size(&headers, 4096).unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        headers.insert(CONTENT_LENGTH, "12".parse().unwrap());
        assert!(check_body_size(&headers, 4096).is_none());
        headers.insert(CONTENT_LENGTH, "many".parse().unwrap());
        assert!(check_body_size(&headers, 4096).is_none());
    }
}
