//! OpenAPI document for the coffee shop API.
use crate::api::{
    drinks, system,
    types::{
        DrinkCreateRequest, DrinkDeleteResponse, DrinkListResponse, DrinkPatchRequest,
        DrinkSummaryListResponse, ErrorResponse, HealthStatus, RecipeInput,
    },
};
use crate::model::{Drink, DrinkSummary, Ingredient, IngredientSummary};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "coffeeshop",
        version = "v1",
        description = "Coffee shop drinks API"
    ),
    paths(
        system::health,
        drinks::list_drinks,
        drinks::list_drink_details,
        drinks::create_drink,
        drinks::update_drink,
        drinks::delete_drink
    ),
    components(schemas(
        HealthStatus,
        ErrorResponse,
        Drink,
        DrinkSummary,
        Ingredient,
        IngredientSummary,
        RecipeInput,
        DrinkCreateRequest,
        DrinkPatchRequest,
        DrinkListResponse,
        DrinkSummaryListResponse,
        DrinkDeleteResponse
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "system", description = "Health endpoints"),
        (name = "drinks", description = "Drink menu and recipes")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by guarded paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
