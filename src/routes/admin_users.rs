use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::auth::hash_password;
use crate::error::{AppError, AppResult};
use crate::model::AdminUser;
use crate::types::{AdminUserView, ApiResponse, CreateAdminUserRequest, EmptyData};
use crate::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;

fn validate_admin_user(payload: &CreateAdminUserRequest) -> AppResult<()> {
    if payload.name.trim().is_empty() {
        return Err(AppError::ValidationFailed("Name is required".to_string()));
    }
    let email = payload.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::ValidationFailed(
            "A valid email is required".to_string(),
        ));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::ValidationFailed(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateAdminUserRequest,
    responses(
        (status = 201, description = "Admin user created", body = ApiResponse<AdminUserView>),
        (status = 400, description = "Invalid input", body = ApiResponse<EmptyData>),
        (status = 409, description = "Email already registered", body = ApiResponse<EmptyData>)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn create_admin_user(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateAdminUserRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AdminUserView>>)> {
    use crate::schema::admin_users;

    validate_admin_user(&payload)?;
    let user = AdminUser::new(
        payload.name.trim().to_string(),
        payload.email.trim().to_lowercase(),
        hash_password(&payload.password)?,
    );

    let mut conn = app_state.db.get()?;
    diesel::insert_into(admin_users::table)
        .values(&user)
        .execute(&mut conn)
        .map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict(format!("Email {} is already registered", user.email))
            }
            other => other.into(),
        })?;

    tracing::info!(admin_user = %user.id, "Admin user created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(user.view()))))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All admin users", body = ApiResponse<Vec<AdminUserView>>)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_admin_users(
    State(app_state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<AdminUserView>>>> {
    use crate::schema::admin_users::dsl::*;

    let mut conn = app_state.db.get()?;
    let users: Vec<AdminUser> = admin_users
        .order(created_at.asc())
        .select(AdminUser::as_select())
        .load(&mut conn)?;

    Ok(Json(ApiResponse::ok(
        users.iter().map(AdminUser::view).collect(),
    )))
}

#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = String, Path, description = "Admin user id")),
    responses(
        (status = 200, description = "Admin user deleted", body = ApiResponse<EmptyData>),
        (status = 404, description = "Unknown admin user", body = ApiResponse<EmptyData>)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn delete_admin_user(
    State(app_state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    use crate::schema::admin_users::dsl::*;

    let mut conn = app_state.db.get()?;
    let deleted = diesel::delete(admin_users.find(&user_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::NotFound(format!("Admin user {}", user_id)));
    }

    Ok(Json(ApiResponse::ok_with_msg("Admin user deleted")))
}
