use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;

use crate::error::{AppError, AppResult};
use crate::model::Review;
use crate::orders;
use crate::types::{ApiResponse, CreateReviewRequest, EmptyData, OrderStatus, ReviewView};
use crate::AppState;

pub const MIN_REVIEW_LEN: usize = 10;
pub const MAX_REVIEW_LEN: usize = 500;

fn required(value: Option<String>, field: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::ValidationFailed(format!("{} is required", field)))
}

/// Checks run in a fixed order and the first failure is reported.
fn process_review(conn: &mut SqliteConnection, payload: CreateReviewRequest) -> AppResult<Review> {
    use crate::schema::reviews::dsl::*;

    let order_id_param = required(payload.order_id, "order_id")?;
    let product_id_param = required(payload.product_id, "product_id")?;
    let review_text = required(payload.review, "review")?;
    let stars = payload
        .rating
        .ok_or_else(|| AppError::ValidationFailed("rating is required".to_string()))?;

    if !(1..=5).contains(&stars) {
        return Err(AppError::ValidationFailed(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let text_len = review_text.chars().count();
    if !(MIN_REVIEW_LEN..=MAX_REVIEW_LEN).contains(&text_len) {
        return Err(AppError::ValidationFailed(format!(
            "Review must be between {} and {} characters",
            MIN_REVIEW_LEN, MAX_REVIEW_LEN
        )));
    }

    let order = orders::find_order(conn, &order_id_param)?;
    if order.status != OrderStatus::Paid {
        return Err(AppError::OrderNotPaid);
    }

    let existing: i64 = reviews
        .filter(order_id.eq(&order.id))
        .count()
        .get_result(conn)?;
    if existing > 0 {
        return Err(AppError::AlreadyReviewed);
    }

    if order.product_id != product_id_param {
        return Err(AppError::ValidationFailed(
            "Product does not match the order".to_string(),
        ));
    }

    let review = Review::for_order(&order, stars, review_text);
    diesel::insert_into(reviews)
        .values(&review)
        .execute(conn)
        .map_err(|e| match e {
            // Lost a race with another submission for the same order.
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::AlreadyReviewed
            }
            other => other.into(),
        })?;

    tracing::info!(order_id = %review.order_id, rating = review.rating, "Review created");
    Ok(review)
}

#[utoipa::path(
    post,
    path = "/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ApiResponse<ReviewView>),
        (status = 400, description = "Invalid review or order not paid", body = ApiResponse<EmptyData>),
        (status = 404, description = "Unknown order", body = ApiResponse<EmptyData>),
        (status = 409, description = "Order already reviewed", body = ApiResponse<EmptyData>)
    ),
    tag = "Storefront"
)]
pub async fn create_review(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ReviewView>>)> {
    let mut conn = app_state.db.get()?;
    let review = process_review(&mut conn, payload)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(review.view()))))
}

#[utoipa::path(
    post,
    path = "/admin/reviews/{id}/approve",
    params(("id" = String, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review approved", body = ApiResponse<ReviewView>),
        (status = 404, description = "Unknown review", body = ApiResponse<EmptyData>)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn approve_review(
    State(app_state): State<AppState>,
    Path(review_id): Path<String>,
) -> AppResult<Json<ApiResponse<ReviewView>>> {
    use crate::schema::reviews::dsl::*;

    let mut conn = app_state.db.get()?;
    let updated = diesel::update(reviews.find(&review_id))
        .set(approved.eq(true))
        .execute(&mut conn)?;
    if updated == 0 {
        return Err(AppError::NotFound(format!("Review {}", review_id)));
    }

    let review: Review = reviews
        .find(&review_id)
        .select(Review::as_select())
        .first(&mut conn)?;

    Ok(Json(ApiResponse::ok(review.view())))
}
