//! Request and response bodies for the drinks API.
use crate::model::{Drink, DrinkSummary, Ingredient};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body shared by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    /// HTTP status code, repeated in the body.
    pub error: u16,
    pub message: String,
    /// Stable auth failure reason, e.g. `token_expired`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A recipe may be posted as one ingredient or a list of them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum RecipeInput {
    One(Ingredient),
    Many(Vec<Ingredient>),
}

impl RecipeInput {
    pub fn into_vec(self) -> Vec<Ingredient> {
        match self {
            RecipeInput::One(ingredient) => vec![ingredient],
            RecipeInput::Many(ingredients) => ingredients,
        }
    }
}

/// Fields are optional so that a missing one is reported by name rather than
/// as a decode failure.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DrinkCreateRequest {
    pub title: Option<String>,
    pub recipe: Option<RecipeInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DrinkPatchRequest {
    pub title: Option<String>,
    pub recipe: Option<RecipeInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DrinkSummaryListResponse {
    pub success: bool,
    pub drinks: Vec<DrinkSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DrinkListResponse {
    pub success: bool,
    pub drinks: Vec<Drink>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DrinkDeleteResponse {
    pub success: bool,
    /// Id of the deleted drink.
    pub delete: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    pub success: bool,
    pub status: String,
}
