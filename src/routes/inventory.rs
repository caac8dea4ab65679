use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::error::AppResult;
use crate::inventory;
use crate::routes::products::product_view;
use crate::types::{
    AddStockRequest, AddVariantRequest, ApiResponse, EmptyData, ProductRequest, ProductView,
    UpdateVariantPriceRequest, VariantView,
};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/admin/products",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductView>),
        (status = 400, description = "Invalid input", body = ApiResponse<EmptyData>)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn create_product(
    State(app_state): State<AppState>,
    Json(payload): Json<ProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductView>>)> {
    let mut conn = app_state.db.get()?;
    let product = inventory::create_product(&mut conn, payload)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(product_view(product, &[]))),
    ))
}

#[utoipa::path(
    put,
    path = "/admin/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductView>),
        (status = 404, description = "Unknown product", body = ApiResponse<EmptyData>)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn update_product(
    State(app_state): State<AppState>,
    Path(product_id): Path<String>,
    Json(payload): Json<ProductRequest>,
) -> AppResult<Json<ApiResponse<ProductView>>> {
    let mut conn = app_state.db.get()?;
    inventory::update_product(&mut conn, &product_id, payload)?;
    let (product, variants) = inventory::product_with_variants(&mut conn, &product_id)?;

    Ok(Json(ApiResponse::ok(product_view(product, &variants))))
}

#[utoipa::path(
    delete,
    path = "/admin/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product, variants and credentials deleted", body = ApiResponse<EmptyData>),
        (status = 404, description = "Unknown product", body = ApiResponse<EmptyData>)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn delete_product(
    State(app_state): State<AppState>,
    Path(product_id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let mut conn = app_state.db.get()?;
    inventory::delete_product(&mut conn, &product_id)?;

    Ok(Json(ApiResponse::ok_with_msg("Product deleted")))
}

#[utoipa::path(
    post,
    path = "/admin/products/{id}/variants",
    params(("id" = String, Path, description = "Product id")),
    request_body = AddVariantRequest,
    responses(
        (status = 201, description = "Variant added", body = ApiResponse<VariantView>),
        (status = 400, description = "Invalid input", body = ApiResponse<EmptyData>),
        (status = 404, description = "Unknown product", body = ApiResponse<EmptyData>),
        (status = 409, description = "Variant name already used", body = ApiResponse<EmptyData>)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn add_variant(
    State(app_state): State<AppState>,
    Path(product_id): Path<String>,
    Json(payload): Json<AddVariantRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<VariantView>>)> {
    let mut conn = app_state.db.get()?;
    let variant = inventory::add_variant(&mut conn, &product_id, payload)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(variant.view()))))
}

#[utoipa::path(
    patch,
    path = "/admin/products/{id}/variants/{name}",
    params(
        ("id" = String, Path, description = "Product id"),
        ("name" = String, Path, description = "Variant name")
    ),
    request_body = UpdateVariantPriceRequest,
    responses(
        (status = 200, description = "Price changed", body = ApiResponse<VariantView>),
        (status = 404, description = "Unknown product or variant", body = ApiResponse<EmptyData>)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn update_variant_price(
    State(app_state): State<AppState>,
    Path((product_id, variant_name)): Path<(String, String)>,
    Json(payload): Json<UpdateVariantPriceRequest>,
) -> AppResult<Json<ApiResponse<VariantView>>> {
    let mut conn = app_state.db.get()?;
    let variant =
        inventory::update_variant_price(&mut conn, &product_id, &variant_name, payload.price)?;

    Ok(Json(ApiResponse::ok(variant.view())))
}

#[utoipa::path(
    post,
    path = "/admin/products/{id}/variants/{name}/stock",
    params(
        ("id" = String, Path, description = "Product id"),
        ("name" = String, Path, description = "Variant name")
    ),
    request_body = AddStockRequest,
    responses(
        (status = 200, description = "Stock added", body = ApiResponse<VariantView>),
        (status = 400, description = "Invalid input", body = ApiResponse<EmptyData>),
        (status = 404, description = "Unknown product or variant", body = ApiResponse<EmptyData>)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn add_stock(
    State(app_state): State<AppState>,
    Path((product_id, variant_name)): Path<(String, String)>,
    Json(payload): Json<AddStockRequest>,
) -> AppResult<Json<ApiResponse<VariantView>>> {
    let mut conn = app_state.db.get()?;
    let variant = inventory::add_stock(&mut conn, &product_id, &variant_name, payload)?;

    Ok(Json(ApiResponse::ok(variant.view())))
}

#[utoipa::path(
    delete,
    path = "/admin/products/{id}/variants/{name}",
    params(
        ("id" = String, Path, description = "Product id"),
        ("name" = String, Path, description = "Variant name")
    ),
    responses(
        (status = 200, description = "Variant and its credentials deleted", body = ApiResponse<EmptyData>),
        (status = 404, description = "Unknown product or variant", body = ApiResponse<EmptyData>)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn delete_variant(
    State(app_state): State<AppState>,
    Path((product_id, variant_name)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<()>>> {
    let mut conn = app_state.db.get()?;
    inventory::delete_variant(&mut conn, &product_id, &variant_name)?;

    Ok(Json(ApiResponse::ok_with_msg(format!(
        "Variant {} deleted",
        variant_name
    ))))
}
