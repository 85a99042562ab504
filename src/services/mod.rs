//! Task tables for the four services under test.
//!
//! Every service exposes the same shape: a handful of weighted REST calls under
//! a versioned prefix, plus the actuator health check.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use thiserror::Error;

use crate::task::{RequestTemplate, TaskDefinition};

pub mod order;
pub mod payment;
pub mod product;
pub mod user;

/// Path of the health endpoint every service exposes.
pub const HEALTH_PATH: &str = "/actuator/health";

/// Page size used by every list endpoint.
pub const PAGE_SIZE: u32 = 10;

/// Highest page index the list tasks ask for.
pub const MAX_PAGE: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown service '{0}'. Expected one of: order, payment, product, user")]
pub struct UnknownService(pub String);

/// A service under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Order,
    Payment,
    Product,
    User,
}

impl Service {
    pub fn all() -> [Service; 4] {
        [Service::Order, Service::Payment, Service::Product, Service::User]
    }

    /// Short name, also used as the `service` metric label.
    pub fn name(&self) -> &'static str {
        match self {
            Service::Order => "order",
            Service::Payment => "payment",
            Service::Product => "product",
            Service::User => "user",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Service::Order => 8300,
            Service::Payment => 8400,
            Service::Product => 8500,
            Service::User => 8700,
        }
    }

    /// Versioned API prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            Service::Order => order::PREFIX,
            Service::Payment => payment::PREFIX,
            Service::Product => product::PREFIX,
            Service::User => user::PREFIX,
        }
    }

    /// Base URL for this service on `host` (scheme + hostname, no port).
    pub fn base_url(&self, host: &str) -> String {
        format!("{}:{}", host.trim_end_matches('/'), self.default_port())
    }

    /// The weighted task table for this service.
    pub fn tasks(&self) -> Vec<TaskDefinition> {
        match self {
            Service::Order => order::tasks(),
            Service::Payment => payment::tasks(),
            Service::Product => product::tasks(),
            Service::User => user::tasks(),
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Service {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "order" | "order-service" => Ok(Service::Order),
            "payment" | "payment-service" => Ok(Service::Payment),
            "product" | "product-service" => Ok(Service::Product),
            "user" | "user-service" => Ok(Service::User),
            _ => Err(UnknownService(s.to_string())),
        }
    }
}

fn build_health_check(_rng: &mut dyn RngCore) -> RequestTemplate {
    RequestTemplate::get(HEALTH_PATH)
}

/// The shared, least frequent task of every table.
pub(crate) fn health_check() -> TaskDefinition {
    TaskDefinition::new("health check", 1, &[200], build_health_check).health_check()
}
