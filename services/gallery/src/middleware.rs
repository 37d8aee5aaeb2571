//! Session cookie middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{session::Session, state::AppState};

/// Resume or start the caller's session, expose it to handlers through the
/// request extensions and set the cookie when the id is new to the client.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let cookie_name = state.config.session.cookie_name.clone();
    let jar = CookieJar::from_headers(req.headers());
    let session = match Session::resume(
        jar.get(&cookie_name).map(|cookie| cookie.value()),
        state.sessions.clone(),
    )
    .await
    {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };

    req.extensions_mut().insert(session.clone());
    let response = next.run(req).await;

    if !session.cookie_pending() {
        return response;
    }

    let cookie = Cookie::build((cookie_name, session.id()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (CookieJar::new().add(cookie), response).into_response()
}
