//! User accounts

use crate::dispatch::{Json, Path};
use crate::error::AppError;
use crate::handlers::{AppState, Success};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use bulkbuy_core::{Role, User, UserId};
use bulkbuy_infra::{hash_password_blocking, MIN_PASSWORD_LEN};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Body of `POST /users`
#[derive(Debug, Default, Deserialize)]
pub struct CreateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Validated form of [`CreateUser`]
#[derive(Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl CreateUser {
    pub fn validate(self) -> Result<NewUser, AppError> {
        let name = self.name.unwrap_or_default().trim().to_string();
        if name.is_empty() {
            return Err(AppError::bad_request("A user must have a name"));
        }

        let email = self.email.unwrap_or_default().trim().to_lowercase();
        if !is_plausible_email(&email) {
            return Err(AppError::bad_request("Please provide a valid email"));
        }

        let password = self.password.unwrap_or_default();
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::bad_request(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        Ok(NewUser {
            name,
            email,
            password,
        })
    }
}

/// `local@domain.tld` with no whitespace
pub fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub results: usize,
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct OneUser {
    pub user: User,
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user))
}

pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Success<UserList>>, AppError> {
    let users = state.users.list().await?;
    Ok(Json(Success::new(UserList {
        results: users.len(),
        users,
    })))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<Success<OneUser>>, AppError> {
    let user = require_user(&state, id).await?;
    Ok(Json(Success::new(OneUser { user })))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUser>,
) -> Result<(StatusCode, Json<Success<OneUser>>), AppError> {
    let new_user = payload.validate()?;
    if state.users.find_by_email(&new_user.email).await?.is_some() {
        return Err(AppError::conflict("Email is already registered"));
    }

    let password_hash = hash_password_blocking(new_user.password).await?;
    let user = state
        .users
        .insert(User::new(new_user.name, new_user.email, Role::User, password_hash))
        .await?;

    info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(Success::new(OneUser { user }))))
}

/// Look up a user or fail with 404
pub(crate) async fn require_user(state: &AppState, id: UserId) -> Result<User, AppError> {
    state
        .users
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("No user found with id {}", id)))
}
