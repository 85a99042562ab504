//! Payment service: browsing plus payment creation.

use rand::{Rng, RngCore};
use serde_json::{json, Value};

use super::{health_check, MAX_PAGE, PAGE_SIZE};
use crate::task::{RequestTemplate, TaskDefinition};

pub const PREFIX: &str = "/api/payment-service";

/// Body of `POST /payments`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub order_id: u32,
    pub amount: f64,
    pub payment_method: &'static str,
    pub status: &'static str,
}

impl NewPayment {
    /// A pending credit-card payment for a random order, between 10.00 and
    /// 500.00 in whole cents.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let cents: u32 = rng.gen_range(1_000..=50_000);
        Self {
            order_id: rng.gen_range(1..=50),
            amount: f64::from(cents) / 100.0,
            payment_method: "CREDIT_CARD",
            status: "PENDING",
        }
    }
}

impl From<NewPayment> for Value {
    fn from(payment: NewPayment) -> Self {
        json!({
            "orderId": payment.order_id,
            "amount": payment.amount,
            "paymentMethod": payment.payment_method,
            "status": payment.status,
        })
    }
}

pub fn tasks() -> Vec<TaskDefinition> {
    vec![
        TaskDefinition::new("list payments", 4, &[200], list_payments),
        TaskDefinition::new("get payment by id", 3, &[200, 404], get_payment),
        TaskDefinition::new("create payment", 2, &[200, 201], create_payment),
        health_check(),
    ]
}

fn list_payments(rng: &mut dyn RngCore) -> RequestTemplate {
    RequestTemplate::get(format!("{}/payments", PREFIX))
        .with_query("page", rng.gen_range(0..=MAX_PAGE))
        .with_query("size", PAGE_SIZE)
}

fn get_payment(rng: &mut dyn RngCore) -> RequestTemplate {
    let payment_id: u32 = rng.gen_range(1..=100);
    RequestTemplate::get(format!("{}/payments/{}", PREFIX, payment_id))
}

fn create_payment(rng: &mut dyn RngCore) -> RequestTemplate {
    let payment = NewPayment::random(rng);
    RequestTemplate::post_json(format!("{}/payments", PREFIX), payment.into())
}
