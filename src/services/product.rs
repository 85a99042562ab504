//! Product service: catalog browsing and name search.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use super::{health_check, MAX_PAGE, PAGE_SIZE};
use crate::task::{RequestTemplate, TaskDefinition};

pub const PREFIX: &str = "/api/product-service";

/// Terms the search task picks from.
pub const SEARCH_TERMS: [&str; 6] = ["laptop", "phone", "tablet", "keyboard", "mouse", "monitor"];

pub fn tasks() -> Vec<TaskDefinition> {
    vec![
        TaskDefinition::new("list products", 4, &[200], list_products),
        TaskDefinition::new("get product by id", 3, &[200, 404], get_product),
        TaskDefinition::new("search products", 2, &[200], search_products),
        health_check(),
    ]
}

fn list_products(rng: &mut dyn RngCore) -> RequestTemplate {
    RequestTemplate::get(format!("{}/products", PREFIX))
        .with_query("page", rng.gen_range(0..=MAX_PAGE))
        .with_query("size", PAGE_SIZE)
}

fn get_product(rng: &mut dyn RngCore) -> RequestTemplate {
    let product_id: u32 = rng.gen_range(1..=100);
    RequestTemplate::get(format!("{}/products/{}", PREFIX, product_id))
}

fn search_products(rng: &mut dyn RngCore) -> RequestTemplate {
    let term = SEARCH_TERMS.choose(rng).copied().unwrap_or(SEARCH_TERMS[0]);
    RequestTemplate::get(format!("{}/products/search", PREFIX)).with_query("name", term)
}
