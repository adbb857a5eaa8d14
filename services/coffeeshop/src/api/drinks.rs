//! Drink API handlers.
//!
//! # Purpose
//! Public menu listing plus the permission-guarded detail, create, update, and
//! delete endpoints.
//!
//! # Key invariants
//! - Every guarded handler authorizes before it reads the body or touches the
//!   store; an unauthorized caller learns nothing about the payload or the
//!   record.
//! - A path id that is not an unsigned integer is answered as an unknown route,
//!   before any authorization.
use crate::api::authorize;
use crate::api::error::{
    ApiError, api_bad_request, api_internal, api_invalid_body, api_not_found, api_unprocessable,
};
use crate::api::types::{
    DrinkCreateRequest, DrinkDeleteResponse, DrinkListResponse, DrinkPatchRequest,
    DrinkSummaryListResponse, ErrorResponse, RecipeInput,
};
use crate::app::AppState;
use crate::model::{Drink, DrinkPatch, Ingredient, NewDrink};
use crate::store::StoreError;
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use coffee_authz::permission;

#[utoipa::path(
    get,
    path = "/drinks",
    tag = "drinks",
    responses(
        (status = 200, description = "Menu with recipes reduced to colors and parts", body = DrinkSummaryListResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub(crate) async fn list_drinks(
    State(state): State<AppState>,
) -> Result<Json<DrinkSummaryListResponse>, ApiError> {
    let drinks = state
        .store
        .list_drinks()
        .await
        .map_err(|err| api_internal("failed to list drinks", &err))?;
    Ok(Json(DrinkSummaryListResponse {
        success: true,
        drinks: drinks.iter().map(Drink::short).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/drinks-detail",
    tag = "drinks",
    security(("bearer_auth" = ["get:drinks-detail"])),
    responses(
        (status = 200, description = "Menu with full recipes", body = DrinkListResponse),
        (status = 400, description = "Malformed authorization header or token", body = ErrorResponse),
        (status = 401, description = "Token rejected or permission missing", body = ErrorResponse),
        (status = 503, description = "Identity provider keys unavailable", body = ErrorResponse)
    )
)]
pub(crate) async fn list_drink_details(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DrinkListResponse>, ApiError> {
    authorize(&state, &headers, permission::GET_DRINKS_DETAIL).await?;
    let drinks = state
        .store
        .list_drinks()
        .await
        .map_err(|err| api_internal("failed to list drinks", &err))?;
    Ok(Json(DrinkListResponse {
        success: true,
        drinks,
    }))
}

#[utoipa::path(
    post,
    path = "/drinks",
    tag = "drinks",
    security(("bearer_auth" = ["post:drinks"])),
    request_body = DrinkCreateRequest,
    responses(
        (status = 200, description = "Drink created", body = DrinkListResponse),
        (status = 400, description = "Missing title or recipe, or malformed request", body = ErrorResponse),
        (status = 401, description = "Token rejected or permission missing", body = ErrorResponse),
        (status = 422, description = "A drink with this title exists", body = ErrorResponse),
        (status = 503, description = "Identity provider keys unavailable", body = ErrorResponse)
    )
)]
pub(crate) async fn create_drink(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<DrinkCreateRequest>, JsonRejection>,
) -> Result<Json<DrinkListResponse>, ApiError> {
    authorize(&state, &headers, permission::POST_DRINKS).await?;
    let Json(body) = body.map_err(|rejection| api_invalid_body(&rejection))?;
    let title = body
        .title
        .map(validate_title)
        .transpose()?
        .ok_or_else(|| api_bad_request("request is missing drink title"))?;
    let recipe = body
        .recipe
        .map(validate_recipe)
        .transpose()?
        .ok_or_else(|| api_bad_request("request is missing recipe"))?;

    match state.store.create_drink(NewDrink { title, recipe }).await {
        Ok(drink) => {
            tracing::info!(drink_id = drink.id, "drink created");
            Ok(Json(DrinkListResponse {
                success: true,
                drinks: vec![drink],
            }))
        }
        Err(StoreError::Conflict(_)) => Err(api_unprocessable("drink title already exists")),
        Err(err) => Err(api_internal("failed to create drink", &err)),
    }
}

#[utoipa::path(
    patch,
    path = "/drinks/{id}",
    tag = "drinks",
    security(("bearer_auth" = ["patch:drinks"])),
    params(("id" = u64, Path, description = "Drink id")),
    request_body = DrinkPatchRequest,
    responses(
        (status = 200, description = "Drink updated", body = DrinkListResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 401, description = "Token rejected or permission missing", body = ErrorResponse),
        (status = 404, description = "Drink not found", body = ErrorResponse),
        (status = 422, description = "A drink with this title exists", body = ErrorResponse),
        (status = 503, description = "Identity provider keys unavailable", body = ErrorResponse)
    )
)]
pub(crate) async fn update_drink(
    id: Result<Path<u64>, PathRejection>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<DrinkPatchRequest>, JsonRejection>,
) -> Result<Json<DrinkListResponse>, ApiError> {
    let id = drink_id(id)?;
    authorize(&state, &headers, permission::PATCH_DRINKS).await?;
    let Json(body) = body.map_err(|rejection| api_invalid_body(&rejection))?;
    let patch = DrinkPatch {
        title: body.title.map(validate_title).transpose()?,
        recipe: body.recipe.map(validate_recipe).transpose()?,
    };

    match state.store.update_drink(id, patch).await {
        Ok(drink) => {
            tracing::info!(drink_id = drink.id, "drink updated");
            Ok(Json(DrinkListResponse {
                success: true,
                drinks: vec![drink],
            }))
        }
        Err(StoreError::NotFound(_)) => Err(api_not_found("cannot find drink id")),
        Err(StoreError::Conflict(_)) => Err(api_unprocessable("drink title already exists")),
        Err(err) => Err(api_internal("failed to update drink", &err)),
    }
}

#[utoipa::path(
    delete,
    path = "/drinks/{id}",
    tag = "drinks",
    security(("bearer_auth" = ["delete:drinks"])),
    params(("id" = u64, Path, description = "Drink id")),
    responses(
        (status = 200, description = "Drink deleted", body = DrinkDeleteResponse),
        (status = 401, description = "Token rejected or permission missing", body = ErrorResponse),
        (status = 404, description = "Drink not found", body = ErrorResponse),
        (status = 503, description = "Identity provider keys unavailable", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_drink(
    id: Result<Path<u64>, PathRejection>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DrinkDeleteResponse>, ApiError> {
    let id = drink_id(id)?;
    authorize(&state, &headers, permission::DELETE_DRINKS).await?;
    match state.store.delete_drink(id).await {
        Ok(()) => {
            tracing::info!(drink_id = id, "drink deleted");
            Ok(Json(DrinkDeleteResponse {
                success: true,
                delete: id,
            }))
        }
        Err(StoreError::NotFound(_)) => Err(api_not_found("drink id not found")),
        Err(err) => Err(api_internal("failed to delete drink", &err)),
    }
}

fn drink_id(id: Result<Path<u64>, PathRejection>) -> Result<u64, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|_| api_not_found("resource not found"))
}

fn validate_title(title: String) -> Result<String, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(api_bad_request("request is missing drink title"));
    }
    Ok(title.to_string())
}

fn validate_recipe(recipe: RecipeInput) -> Result<Vec<Ingredient>, ApiError> {
    let recipe = recipe.into_vec();
    if recipe.is_empty() {
        return Err(api_bad_request("request is missing recipe"));
    }
    Ok(recipe)
}
