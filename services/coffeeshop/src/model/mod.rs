//! Drink data model shared by the API and store layers.
mod drink;

pub use drink::{Drink, DrinkPatch, DrinkSummary, Ingredient, IngredientSummary, NewDrink};
