//! User service: browsing plus sign-up of throwaway users.
//!
//! The create task remembers the id the service hands back, one per virtual
//! user, under [`CREATED_USER_ID`].

use rand::{Rng, RngCore};
use serde_json::{json, Value};

use super::health_check;
use crate::task::{RequestTemplate, TaskDefinition};

pub const PREFIX: &str = "/api/user-service";

/// Session variable holding the id of the last user this virtual user created.
pub const CREATED_USER_ID: &str = "user_id";

const SUFFIX_LEN: usize = 5;

/// Body of `POST /users`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: &'static str,
    pub full_name: &'static str,
    pub phone_number: &'static str,
    pub address: &'static str,
    pub city: &'static str,
    pub state: &'static str,
    pub postal_code: &'static str,
    pub country: &'static str,
}

impl NewUser {
    /// A placeholder profile whose username and email carry `suffix`.
    pub fn with_suffix(suffix: &str) -> Self {
        Self {
            username: format!("perftest_{}", suffix),
            email: format!("perf_{}@test.com", suffix),
            password: "TestPassword123!",
            full_name: "Performance Test User",
            phone_number: "+1234567890",
            address: "123 Test St",
            city: "Test City",
            state: "TS",
            postal_code: "12345",
            country: "Test Country",
        }
    }
}

/// Random lowercase ASCII suffix used to keep usernames unique.
pub fn random_suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SUFFIX_LEN)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

impl From<NewUser> for Value {
    fn from(user: NewUser) -> Self {
        json!({
            "username": user.username,
            "email": user.email,
            "password": user.password,
            "fullName": user.full_name,
            "phoneNumber": user.phone_number,
            "address": user.address,
            "city": user.city,
            "state": user.state,
            "postalCode": user.postal_code,
            "country": user.country,
        })
    }
}

pub fn tasks() -> Vec<TaskDefinition> {
    vec![
        TaskDefinition::new("list users", 3, &[200], list_users),
        TaskDefinition::new("get user by id", 2, &[200, 404], get_user),
        TaskDefinition::new("create user", 2, &[200, 201], create_user)
            .capture_field("id", CREATED_USER_ID),
        health_check(),
    ]
}

fn list_users(_rng: &mut dyn RngCore) -> RequestTemplate {
    RequestTemplate::get(format!("{}/users", PREFIX))
}

fn get_user(rng: &mut dyn RngCore) -> RequestTemplate {
    let user_id: u32 = rng.gen_range(1..=100);
    RequestTemplate::get(format!("{}/users/{}", PREFIX, user_id))
}

fn create_user(rng: &mut dyn RngCore) -> RequestTemplate {
    let user = NewUser::with_suffix(&random_suffix(rng));
    RequestTemplate::post_json(format!("{}/users", PREFIX), user.into())
}
