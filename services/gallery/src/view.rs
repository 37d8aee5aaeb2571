//! Response shaping shared by the page and form handlers

use axum::{
    http::{HeaderMap, Uri, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;

use crate::models::UserSummary;

/// Client-side component rendered with a page's props
#[derive(Debug, Serialize)]
pub struct Page<P> {
    pub component: &'static str,
    pub props: P,
    pub url: String,
}

/// Logged-in user shared with every page
#[derive(Debug, Serialize)]
pub struct Auth {
    pub user: Option<UserSummary>,
}

/// True for XHR clients and clients that accept JSON; everyone else gets
/// redirects with flashed messages.
pub fn wants_json(headers: &HeaderMap) -> bool {
    let accepts_json = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"));
    let is_xhr = headers
        .get("x-requested-with")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("XMLHttpRequest"));
    accepts_json || is_xhr
}

/// Path and query of `referer` when it points back at this host
fn same_origin_target(referer: &str, host: Option<&str>) -> Option<String> {
    let uri: Uri = referer.parse().ok()?;
    match uri.authority() {
        Some(authority) if Some(authority.as_str()) == host => {}
        Some(_) => return None,
        // "//evil.test" parses as a path here but browsers treat it as a host
        None if uri.scheme().is_some() || referer.starts_with("//") => return None,
        None => {}
    }
    let target = uri.path_and_query()?.as_str();
    (target.starts_with('/') && !target.starts_with("//") && !target.contains('\\'))
        .then(|| target.to_string())
}

/// 303 to the referring page when it is one of ours, `/` otherwise
pub fn redirect_back(headers: &HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());
    let target = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .and_then(|referer| same_origin_target(referer, host))
        .unwrap_or_else(|| "/".to_string());
    Redirect::to(&target).into_response()
}
