//! Monitoring page
//!
//! The device serves a single fixed document: two live value boxes
//! (`#pitch`, `#roll`) refreshed by polling `/data` every 500 ms, and a
//! button that hits `/calibrate` and reloads `/` a second later.
//! The markup never varies, so it is embedded at compile time.

/// Embedded monitoring page
const INDEX_HTML: &str = include_str!("index.html");

/// Return the monitoring page.
///
/// Pure and infallible: every call yields the same bytes.
pub const fn render_page() -> &'static str {
    INDEX_HTML
}
