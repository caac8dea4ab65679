use axum::extract::{Path, State};
use axum::Json;

use crate::error::AppResult;
use crate::inventory;
use crate::model::{Product, Variant};
use crate::types::{ApiResponse, EmptyData, ProductView};
use crate::AppState;

pub(crate) fn product_view(product: Product, variants: &[Variant]) -> ProductView {
    ProductView {
        id: product.id,
        name: product.name,
        category: product.category,
        image: product.image,
        description: product.description,
        variants: variants.iter().map(Variant::view).collect(),
    }
}

#[utoipa::path(
    get,
    path = "/products",
    responses(
        (status = 200, description = "All products with their variants", body = ApiResponse<Vec<ProductView>>)
    ),
    tag = "Storefront"
)]
pub async fn list_products(
    State(app_state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<ProductView>>>> {
    let mut conn = app_state.db.get()?;
    let products = inventory::list_products(&mut conn)?
        .into_iter()
        .map(|(product, variants)| product_view(product, &variants))
        .collect();

    Ok(Json(ApiResponse::ok(products)))
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product found", body = ApiResponse<ProductView>),
        (status = 404, description = "Unknown product", body = ApiResponse<EmptyData>)
    ),
    tag = "Storefront"
)]
pub async fn get_product(
    State(app_state): State<AppState>,
    Path(product_id): Path<String>,
) -> AppResult<Json<ApiResponse<ProductView>>> {
    let mut conn = app_state.db.get()?;
    let (product, variants) = inventory::product_with_variants(&mut conn, &product_id)?;

    Ok(Json(ApiResponse::ok(product_view(product, &variants))))
}
