//! Gallery service routes

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, FromRequestParts, Multipart, Path, Query, Request, State,
        multipart::MultipartError,
    },
    http::{HeaderMap, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceExt;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    AppState, auth,
    config::UploadBackend,
    error::{GalleryError, GalleryResult},
    identity::RequestContext,
    likes::Actor,
    middleware::session_middleware,
    models::{ImageView, NewUser, Paginated, Role},
    session::{Flash, Session},
    validation::{
        IMAGE_REQUIRED, IMAGE_TOO_LARGE, UploadForm, UploadedFile, validate_registration,
        validate_upload,
    },
    view::{Auth, Page, redirect_back, wants_json},
};

const UPLOAD_SUCCESS: &str = "圖片上傳成功！";
const LIKE_LOGIN_REQUIRED: &str = "請先登入以收藏圖片";

/// Create the router for the gallery service
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
        .route("/images", post(upload_image))
        .route("/images/favorites", get(favorites))
        .route("/images/:id", get(show_image))
        .route("/images/:id/like", patch(toggle_like))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout));

    if state.config.uploads.backend == UploadBackend::Local {
        router = router.nest_service(
            &state.config.uploads.public_prefix,
            ServeDir::new(&state.config.uploads.local_root),
        );
    }

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.config.server.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let checks = state.health().await;
    let healthy = checks.iter().all(|(_, ok)| *ok);
    let backends: serde_json::Map<String, serde_json::Value> = checks
        .into_iter()
        .map(|(name, ok)| (name.to_string(), json!(if ok { "ok" } else { "down" })))
        .collect();

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "service": "gallery-service",
            "backends": backends,
        })),
    )
}

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    pub search: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WelcomeProps {
    images: Paginated<ImageView>,
    search_query: Option<String>,
    flash: Flash,
    auth: Auth,
}

/// Home page with the searchable, paginated image list
pub async fn home(
    State(state): State<AppState>,
    ctx: RequestContext,
    uri: Uri,
    Query(query): Query<HomeQuery>,
) -> GalleryResult<impl IntoResponse> {
    // Unparsable pages fall back to the first one
    let page = query.page.as_deref().and_then(|page| page.parse().ok());
    let images = state
        .catalog
        .list(&ctx, query.search.as_deref(), page)
        .await?;
    let flash = ctx.session.take_flash().await?.unwrap_or_default();

    Ok(Json(Page {
        component: "welcome",
        props: WelcomeProps {
            images,
            search_query: query.search,
            flash,
            auth: Auth {
                user: ctx.user.as_ref().map(|user| user.summary()),
            },
        },
        url: uri.to_string(),
    }))
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, MultipartError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "name" => form.name = Some(field.text().await?),
            "vibe" => form.vibe = Some(field.text().await?),
            "image" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?.to_vec();
                info!(
                    "Received upload {:?} ({:?}, {} bytes)",
                    file_name,
                    content_type,
                    bytes.len()
                );
                form.image = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Upload a new image
pub async fn upload_image(
    State(state): State<AppState>,
    ctx: RequestContext,
    headers: HeaderMap,
    multipart: Multipart,
) -> GalleryResult<Response> {
    let json = wants_json(&headers);
    let form = match read_upload_form(multipart).await {
        Ok(form) => form,
        Err(e) if json => return Err(GalleryError::BadRequest(e.body_text())),
        Err(e) => {
            warn!("Unreadable upload body: {}", e);
            let message = if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                IMAGE_TOO_LARGE
            } else {
                IMAGE_REQUIRED
            };
            ctx.session.flash(&Flash::error("image", message)).await?;
            return Ok(redirect_back(&headers));
        }
    };

    let upload = match validate_upload(form, state.config.uploads.max_bytes) {
        Ok(upload) => upload,
        Err(errors) if json => return Err(GalleryError::Validation(errors)),
        Err(errors) => {
            ctx.session.flash(&Flash::errors(errors.to_flash())).await?;
            return Ok(redirect_back(&headers));
        }
    };

    let image = state.catalog.create(upload, ctx.user_id()).await?;

    if json {
        let view = ImageView::for_viewer(image, ctx.user_id());
        return Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": UPLOAD_SUCCESS,
                "image": view,
            })),
        )
            .into_response());
    }

    ctx.session.flash(&Flash::success(UPLOAD_SUCCESS)).await?;
    Ok(redirect_back(&headers))
}

/// Toggle the acting user's like on an image
pub async fn toggle_like(
    State(state): State<AppState>,
    ctx: RequestContext,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> GalleryResult<Response> {
    let json = wants_json(&headers);

    let user = match ctx.require_user() {
        Ok(user) => user,
        Err(e) if json => return Err(e),
        Err(_) => {
            ctx.session
                .flash(&Flash::error("message", LIKE_LOGIN_REQUIRED))
                .await?;
            return Ok(redirect_back(&headers));
        }
    };

    let actor = Actor {
        user,
        session: &ctx.session,
    };
    let toggle = state.favorites.toggle(actor, id).await?;

    if json {
        return Ok(Json(json!({
            "success": true,
            "isLiked": toggle.is_liked,
            "likesCount": toggle.likes_count,
            "liked_by": toggle.liked_by,
        }))
        .into_response());
    }
    Ok(redirect_back(&headers))
}

/// Demo images liked by the acting user
pub async fn favorites(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> GalleryResult<impl IntoResponse> {
    let user = ctx.require_user()?;
    let actor = Actor {
        user,
        session: &ctx.session,
    };

    let favorites: Vec<ImageView> = state
        .favorites
        .demo()
        .favorites(actor)
        .await?
        .iter()
        .map(|image| image.view(Some(user.id), &[image.id]))
        .collect();

    Ok(Json(json!({
        "count": favorites.len(),
        "favorites": favorites,
    })))
}

/// `/images/{id}` is a persisted image as JSON; any other segment is a demo
/// file.
pub async fn show_image(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    request: Request,
) -> GalleryResult<Response> {
    let Ok(id) = segment.parse::<i64>() else {
        let path = state
            .demo
            .file_path(&segment)
            .ok_or(GalleryError::NotFound)?;
        let response = ServeFile::new(path)
            .oneshot(request)
            .await
            .map_err(|e| GalleryError::Backend(e.into()))?;
        return Ok(response.into_response());
    };

    let (mut parts, _body) = request.into_parts();
    let ctx = RequestContext::from_request_parts(&mut parts, &state).await?;
    Ok(Json(state.catalog.find(&ctx, id).await?).into_response())
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Create an account and log it into the session
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<RegisterRequest>,
) -> GalleryResult<impl IntoResponse> {
    let email = payload.email.trim().to_lowercase();
    validate_registration(&payload.name, &email, &payload.password).into_result()?;

    let new_user = NewUser {
        name: payload.name.trim().to_string(),
        email,
        password_hash: auth::hash_password(payload.password).await?,
        role: Role::User,
    };
    let user = state
        .users
        .create(&new_user)
        .await?
        .ok_or_else(|| GalleryError::Conflict("The email has already been taken".to_string()))?;

    session.login_fresh(user.id).await?;
    info!("Registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(json!({ "user": user.summary() }))))
}

/// Log into an existing account
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> GalleryResult<impl IntoResponse> {
    let email = payload.email.trim().to_lowercase();
    let user = auth::authenticate(state.users.as_ref(), &email, &payload.password).await?;
    session.login_fresh(user.id).await?;

    Ok(Json(json!({ "user": user.summary() })))
}

pub async fn logout(session: Session) -> GalleryResult<impl IntoResponse> {
    session.logout().await?;
    session.regenerate().await?;
    Ok(Json(json!({ "success": true })))
}
