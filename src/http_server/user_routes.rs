//! User HTTP Routes
//!
//! CRUD over the bootstrapped `users` table.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::engine::Session;
use crate::users::{self, NewUser, User, UserPatch};

use super::errors::{ApiError, ApiResult};
use super::request;
use super::state::SharedState;

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub success: bool,
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: User,
}

impl UserResponse {
    fn new(user: User) -> Json<Self> {
        Json(Self {
            success: true,
            user,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedUserResponse {
    pub success: bool,
    pub message: String,
    pub user: User,
}

fn not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

/// Create user routes
pub fn user_routes<S: Session>(state: SharedState<S>) -> Router {
    Router::new()
        .route("/users", get(list_users_handler::<S>).post(create_user_handler::<S>))
        .route(
            "/users/:id",
            get(get_user_handler::<S>)
                .put(update_user_handler::<S>)
                .delete(delete_user_handler::<S>),
        )
        .with_state(state)
}

async fn list_users_handler<S: Session>(
    State(state): State<SharedState<S>>,
) -> ApiResult<Json<UsersResponse>> {
    let users = users::list(&state.session)
        .await
        .map_err(ApiError::Internal)?;

    Ok(Json(UsersResponse {
        success: true,
        users,
    }))
}

async fn create_user_handler<S: Session>(
    State(state): State<SharedState<S>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let new_user: NewUser = request::parse(&body)?;

    let user = users::create(&state.session, &new_user)
        .await
        .map_err(ApiError::Rejected)?;

    Ok((StatusCode::CREATED, UserResponse::new(user)))
}

async fn get_user_handler<S: Session>(
    State(state): State<SharedState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let user = users::find(&state.session, &id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(not_found)?;

    Ok(UserResponse::new(user))
}

async fn update_user_handler<S: Session>(
    State(state): State<SharedState<S>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<UserResponse>> {
    let patch: UserPatch = request::parse(&body)?;
    if patch.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let user = users::update(&state.session, &id, &patch)
        .await
        .map_err(ApiError::Rejected)?
        .ok_or_else(not_found)?;

    Ok(UserResponse::new(user))
}

async fn delete_user_handler<S: Session>(
    State(state): State<SharedState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeletedUserResponse>> {
    let user = users::delete(&state.session, &id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(not_found)?;

    Ok(Json(DeletedUserResponse {
        success: true,
        message: "User deleted successfully".to_string(),
        user,
    }))
}
