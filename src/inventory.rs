//! Products, their variants and the credential pool behind each variant.
//!
//! `variants.quantity` is the unreserved stock: it drops when an order is
//! placed and comes back when that order is cancelled. Both moves are single
//! conditional `UPDATE`s so concurrent orders can never drive it below zero.
//! Credentials are claimed one row at a time with `sold = 0` in the `WHERE`
//! clause, so a credential can only ever be claimed by one order.

use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;

use crate::error::{AppError, AppResult};
use crate::model::{Credential, NewCredentialRow, Product, Variant};
use crate::types::{
    AddStockRequest, AddVariantRequest, CredentialSnapshot, NewCredential, ProductRequest,
};

pub fn list_products(conn: &mut SqliteConnection) -> AppResult<Vec<(Product, Vec<Variant>)>> {
    use crate::schema::{products, variants};

    let all_products = products::table
        .order(products::created_at.asc())
        .select(Product::as_select())
        .load(conn)?;

    let all_variants = Variant::belonging_to(&all_products)
        .order(variants::position.asc())
        .select(Variant::as_select())
        .load(conn)?;

    Ok(all_variants
        .grouped_by(&all_products)
        .into_iter()
        .zip(all_products)
        .map(|(product_variants, product)| (product, product_variants))
        .collect())
}

pub fn find_product(conn: &mut SqliteConnection, product_id: &str) -> AppResult<Product> {
    use crate::schema::products::dsl::*;

    products
        .find(product_id)
        .select(Product::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))
}

pub fn product_with_variants(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> AppResult<(Product, Vec<Variant>)> {
    use crate::schema::variants;

    let product = find_product(conn, product_id)?;
    let product_variants = Variant::belonging_to(&product)
        .order(variants::position.asc())
        .select(Variant::as_select())
        .load(conn)?;

    Ok((product, product_variants))
}

/// Variants are addressed by name, which is unique within a product.
pub fn find_variant(
    conn: &mut SqliteConnection,
    product_id_param: &str,
    variant_name: &str,
) -> AppResult<Variant> {
    use crate::schema::variants::dsl::*;

    variants
        .filter(product_id.eq(product_id_param))
        .filter(name.eq(variant_name))
        .select(Variant::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("Variant {}", variant_name)))
}

pub fn find_variant_by_id(conn: &mut SqliteConnection, variant_id: &str) -> AppResult<Variant> {
    use crate::schema::variants::dsl::*;

    variants
        .find(variant_id)
        .select(Variant::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("Variant {}", variant_id)))
}

pub fn create_product(conn: &mut SqliteConnection, request: ProductRequest) -> AppResult<Product> {
    use crate::schema::products;

    validate_product(&request)?;
    let product = Product::new(
        request.name.trim().to_string(),
        request.category.trim().to_string(),
        request.image,
        request.description,
    );

    diesel::insert_into(products::table)
        .values(&product)
        .execute(conn)?;

    tracing::info!(product_id = %product.id, "Product created");
    Ok(product)
}

pub fn update_product(
    conn: &mut SqliteConnection,
    product_id: &str,
    request: ProductRequest,
) -> AppResult<Product> {
    use crate::schema::products::dsl::*;

    validate_product(&request)?;
    let updated = diesel::update(products.find(product_id))
        .set((
            name.eq(request.name.trim()),
            category.eq(request.category.trim()),
            image.eq(request.image),
            description.eq(request.description),
        ))
        .execute(conn)?;

    if updated == 0 {
        return Err(AppError::NotFound(format!("Product {}", product_id)));
    }
    find_product(conn, product_id)
}

/// Hard delete. Orders keep their snapshot and now point at nothing.
pub fn delete_product(conn: &mut SqliteConnection, product_id: &str) -> AppResult<()> {
    use crate::schema::{credentials, products, variants};

    conn.immediate_transaction::<_, AppError, _>(|conn| {
        let variant_ids: Vec<String> = variants::table
            .filter(variants::product_id.eq(product_id))
            .select(variants::id)
            .load(conn)?;

        diesel::delete(credentials::table.filter(credentials::variant_id.eq_any(variant_ids)))
            .execute(conn)?;
        diesel::delete(variants::table.filter(variants::product_id.eq(product_id)))
            .execute(conn)?;
        let deleted = diesel::delete(products::table.find(product_id)).execute(conn)?;

        if deleted == 0 {
            return Err(AppError::NotFound(format!("Product {}", product_id)));
        }
        Ok(())
    })?;

    tracing::info!(product_id = %product_id, "Product deleted");
    Ok(())
}

pub fn add_variant(
    conn: &mut SqliteConnection,
    product_id: &str,
    request: AddVariantRequest,
) -> AppResult<Variant> {
    use crate::schema::variants;

    let variant_name = request.name.trim();
    if variant_name.is_empty() {
        return Err(AppError::ValidationFailed("Variant name is required".to_string()));
    }
    if request.price <= 0 {
        return Err(AppError::ValidationFailed("Price must be positive".to_string()));
    }
    let count = credential_count(&request.credentials, request.quantity, "quantity")?;

    let variant = conn.immediate_transaction::<_, AppError, _>(|conn| {
        find_product(conn, product_id)?;

        let last_position: Option<i32> = variants::table
            .filter(variants::product_id.eq(product_id))
            .select(diesel::dsl::max(variants::position))
            .first(conn)?;

        let variant = Variant::new(
            product_id.to_string(),
            variant_name.to_string(),
            request.price,
            count,
            last_position.map_or(0, |p| p + 1),
        );

        diesel::insert_into(variants::table)
            .values(&variant)
            .execute(conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    AppError::Conflict(format!("Variant {} already exists", variant_name))
                }
                other => other.into(),
            })?;

        insert_credentials(conn, &variant.id, &request.credentials)?;
        Ok(variant)
    })?;

    tracing::info!(
        product_id = %product_id,
        variant = %variant.name,
        quantity = variant.quantity,
        "Variant added"
    );
    Ok(variant)
}

/// Append credentials to a variant and raise its quantity by the same amount.
pub fn add_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    variant_name: &str,
    request: AddStockRequest,
) -> AppResult<Variant> {
    use crate::schema::variants;

    let count = credential_count(&request.credentials, request.amount, "amount")?;
    if count == 0 {
        return Err(AppError::ValidationFailed(
            "At least one credential is required".to_string(),
        ));
    }

    let variant = conn.immediate_transaction::<_, AppError, _>(|conn| {
        let variant = find_variant(conn, product_id, variant_name)?;
        insert_credentials(conn, &variant.id, &request.credentials)?;

        diesel::update(variants::table.find(&variant.id))
            .set(variants::quantity.eq(variants::quantity + count))
            .execute(conn)?;

        find_variant(conn, product_id, variant_name)
    })?;

    tracing::info!(
        product_id = %product_id,
        variant = %variant_name,
        added = count,
        quantity = variant.quantity,
        "Stock added"
    );
    Ok(variant)
}

pub fn update_variant_price(
    conn: &mut SqliteConnection,
    product_id: &str,
    variant_name: &str,
    new_price: i64,
) -> AppResult<Variant> {
    use crate::schema::variants;

    if new_price <= 0 {
        return Err(AppError::ValidationFailed("Price must be positive".to_string()));
    }
    let variant = find_variant(conn, product_id, variant_name)?;
    diesel::update(variants::table.find(&variant.id))
        .set(variants::price.eq(new_price))
        .execute(conn)?;

    find_variant(conn, product_id, variant_name)
}

/// Remove a variant together with its credential pool, sold ones included.
pub fn delete_variant(
    conn: &mut SqliteConnection,
    product_id: &str,
    variant_name: &str,
) -> AppResult<()> {
    use crate::schema::{credentials, variants};

    conn.immediate_transaction::<_, AppError, _>(|conn| {
        let variant = find_variant(conn, product_id, variant_name)?;
        diesel::delete(credentials::table.filter(credentials::variant_id.eq(&variant.id)))
            .execute(conn)?;
        diesel::delete(variants::table.find(&variant.id)).execute(conn)?;
        Ok(())
    })?;

    tracing::info!(product_id = %product_id, variant = %variant_name, "Variant deleted");
    Ok(())
}

/// Take `requested` units out of the unreserved stock, or fail without
/// touching anything.
pub fn reserve_stock(
    conn: &mut SqliteConnection,
    variant: &Variant,
    requested: i32,
) -> AppResult<()> {
    use crate::schema::variants::dsl::*;

    let updated = diesel::update(
        variants
            .filter(id.eq(&variant.id))
            .filter(quantity.ge(requested)),
    )
    .set(quantity.eq(quantity - requested))
    .execute(conn)?;

    if updated == 0 {
        let available: i32 = variants
            .find(&variant.id)
            .select(quantity)
            .first(conn)
            .optional()?
            .unwrap_or(0);
        return Err(AppError::InsufficientStock {
            variant: variant.name.clone(),
            requested,
            available,
        });
    }
    Ok(())
}

/// Give a reservation back to the variant row it was taken from. Returns
/// false when that row no longer exists.
pub fn release_stock(
    conn: &mut SqliteConnection,
    variant_id: &str,
    released: i32,
) -> AppResult<bool> {
    use crate::schema::variants::dsl::*;

    let updated = diesel::update(variants.find(variant_id))
        .set(quantity.eq(quantity + released))
        .execute(conn)?;

    Ok(updated == 1)
}

/// Lower the quantity by `consumed`, stopping at zero. Must run inside a
/// transaction.
pub fn consume_stock(
    conn: &mut SqliteConnection,
    variant: &Variant,
    consumed: i32,
) -> AppResult<()> {
    use crate::schema::variants::dsl::*;

    let available: Option<i32> = variants
        .find(&variant.id)
        .select(quantity)
        .first(conn)
        .optional()?;

    if let Some(available) = available {
        diesel::update(variants.find(&variant.id))
            .set(quantity.eq((available - consumed).max(0)))
            .execute(conn)?;
    }
    Ok(())
}

/// Claim the first `wanted` unsold credentials of a variant, in insertion
/// order, for `order_id_param`. Returns `None` (and claims nothing) when the
/// variant holds fewer unsold credentials than wanted.
///
/// Must run inside a transaction: a partial claim is only undone by rollback.
pub fn claim_credentials(
    conn: &mut SqliteConnection,
    variant: &Variant,
    wanted: i32,
    order_id_param: &str,
) -> AppResult<Option<Vec<CredentialSnapshot>>> {
    use crate::schema::credentials::dsl::*;

    let candidates: Vec<Credential> = credentials
        .filter(variant_id.eq(&variant.id))
        .filter(sold.eq(false))
        .order(id.asc())
        .limit(i64::from(wanted))
        .select(Credential::as_select())
        .load(conn)?;

    if candidates.len() < wanted as usize {
        return Ok(None);
    }

    let mut claimed = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let updated = diesel::update(credentials.filter(id.eq(candidate.id)).filter(sold.eq(false)))
            .set((sold.eq(true), order_id.eq(order_id_param)))
            .execute(conn)?;

        if updated != 1 {
            return Err(AppError::InternalInconsistency(format!(
                "Credential {} was claimed concurrently",
                candidate.id
            )));
        }
        claimed.push(CredentialSnapshot {
            username: candidate.username,
            password: candidate.password,
        });
    }

    Ok(Some(claimed))
}

pub fn count_sold(conn: &mut SqliteConnection, variant: &Variant) -> AppResult<i64> {
    use crate::schema::credentials::dsl::*;

    Ok(credentials
        .filter(variant_id.eq(&variant.id))
        .filter(sold.eq(true))
        .count()
        .get_result(conn)?)
}

fn insert_credentials(
    conn: &mut SqliteConnection,
    variant_id: &str,
    new_credentials: &[NewCredential],
) -> AppResult<()> {
    use crate::schema::credentials;

    let rows: Vec<NewCredentialRow<'_>> = new_credentials
        .iter()
        .map(|credential| NewCredentialRow {
            variant_id,
            username: credential.username.trim(),
            password: &credential.password,
            sold: false,
        })
        .collect();

    // Row by row keeps the autoincrement ids in list order.
    for row in &rows {
        diesel::insert_into(credentials::table)
            .values(row)
            .execute(conn)?;
    }
    Ok(())
}

/// Number of credentials in the request, cross-checked against a declared
/// count when the caller sent one.
fn credential_count(
    new_credentials: &[NewCredential],
    declared: Option<i32>,
    field: &str,
) -> AppResult<i32> {
    if new_credentials
        .iter()
        .any(|c| c.username.trim().is_empty() || c.password.is_empty())
    {
        return Err(AppError::ValidationFailed(
            "Every credential needs a username and a password".to_string(),
        ));
    }

    let count = i32::try_from(new_credentials.len())
        .map_err(|_| AppError::ValidationFailed("Too many credentials".to_string()))?;

    match declared {
        Some(declared) if declared != count => Err(AppError::ValidationFailed(format!(
            "{} is {} but {} credentials were supplied",
            field, declared, count
        ))),
        _ => Ok(count),
    }
}

fn validate_product(request: &ProductRequest) -> AppResult<()> {
    if request.name.trim().is_empty() {
        return Err(AppError::ValidationFailed("Product name is required".to_string()));
    }
    if request.category.trim().is_empty() {
        return Err(AppError::ValidationFailed("Category is required".to_string()));
    }
    Ok(())
}
