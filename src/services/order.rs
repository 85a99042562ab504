//! Order service: read-only browsing of orders.

use rand::{Rng, RngCore};

use super::{health_check, MAX_PAGE, PAGE_SIZE};
use crate::task::{RequestTemplate, TaskDefinition};

pub const PREFIX: &str = "/api/order-service";

pub fn tasks() -> Vec<TaskDefinition> {
    vec![
        TaskDefinition::new("list orders", 4, &[200], list_orders),
        TaskDefinition::new("get order by id", 3, &[200, 404], get_order),
        TaskDefinition::new("get orders by user", 2, &[200, 404], get_user_orders),
        health_check(),
    ]
}

fn list_orders(rng: &mut dyn RngCore) -> RequestTemplate {
    RequestTemplate::get(format!("{}/orders", PREFIX))
        .with_query("page", rng.gen_range(0..=MAX_PAGE))
        .with_query("size", PAGE_SIZE)
}

fn get_order(rng: &mut dyn RngCore) -> RequestTemplate {
    let order_id: u32 = rng.gen_range(1..=100);
    RequestTemplate::get(format!("{}/orders/{}", PREFIX, order_id))
}

fn get_user_orders(rng: &mut dyn RngCore) -> RequestTemplate {
    let user_id: u32 = rng.gen_range(1..=50);
    RequestTemplate::get(format!("{}/orders/user/{}", PREFIX, user_id))
}
