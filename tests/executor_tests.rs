//! Integration tests for single task execution.
//!
//! Each test pins the exact request a task sends and checks how the
//! response is classified and what ends up in the session.

use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use service_loadtest::executor::TaskExecutor;
use service_loadtest::services::payment::NewPayment;
use service_loadtest::services::user::CREATED_USER_ID;
use service_loadtest::services::{order, payment, user, Service, HEALTH_PATH};
use service_loadtest::session::Session;
use service_loadtest::task::{RequestTemplate, TaskDefinition};

fn task(service: Service, name: &str) -> TaskDefinition {
    service
        .tasks()
        .into_iter()
        .find(|t| t.name == name)
        .unwrap_or_else(|| panic!("{} has no task named '{}'", service, name))
}

fn executor(service: Service, server: &MockServer) -> TaskExecutor {
    TaskExecutor::new(service, server.uri(), reqwest::Client::new())
}

fn list_orders_page_zero() -> RequestTemplate {
    RequestTemplate::get(format!("{}/orders", order::PREFIX))
        .with_query("page", 0)
        .with_query("size", 10)
}

#[tokio::test]
async fn list_orders_ok_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/order-service/orders"))
        .and(query_param("page", "0"))
        .and(query_param("size", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(0);
    let outcome = executor(Service::Order, &server)
        .execute_request(
            &task(Service::Order, "list orders"),
            list_orders_page_zero(),
            &mut session,
        )
        .await;

    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(outcome.status_code, Some(200));
    assert_eq!(outcome.task, "list orders");
    assert_eq!(session.iterations(), 1);
}

#[tokio::test]
async fn missing_order_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/order-service/orders/9999"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(0);
    let outcome = executor(Service::Order, &server)
        .execute_request(
            &task(Service::Order, "get order by id"),
            RequestTemplate::get(format!("{}/orders/9999", order::PREFIX)),
            &mut session,
        )
        .await;

    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(outcome.status_code, Some(404));
    assert_eq!(outcome.failure_message(), None);
}

#[tokio::test]
async fn server_error_is_failure_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/order-service/orders"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut session = Session::new(0);
    let outcome = executor(Service::Order, &server)
        .execute_request(
            &task(Service::Order, "list orders"),
            list_orders_page_zero(),
            &mut session,
        )
        .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.status_code, Some(500));
    let message = outcome.failure_message().unwrap();
    assert_eq!(message, "Failed with status 500");
}

#[tokio::test]
async fn not_found_on_list_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/order-service/orders"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut session = Session::new(0);
    let outcome = executor(Service::Order, &server)
        .execute_request(
            &task(Service::Order, "list orders"),
            list_orders_page_zero(),
            &mut session,
        )
        .await;

    assert_eq!(outcome.failure_message().as_deref(), Some("Failed with status 404"));
}

#[tokio::test]
async fn create_payment_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/payment-service/payments"))
        .and(body_json(json!({
            "orderId": 7,
            "amount": 123.45,
            "paymentMethod": "CREDIT_CARD",
            "status": "PENDING"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let body = Value::from(NewPayment {
        order_id: 7,
        amount: 123.45,
        payment_method: "CREDIT_CARD",
        status: "PENDING",
    });

    let mut session = Session::new(0);
    let outcome = executor(Service::Payment, &server)
        .execute_request(
            &task(Service::Payment, "create payment"),
            RequestTemplate::post_json(format!("{}/payments", payment::PREFIX), body),
            &mut session,
        )
        .await;

    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(outcome.status_code, Some(201));
}

#[tokio::test]
async fn create_user_captures_numeric_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user-service/users"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": 42, "username": "perftest_abcde"})),
        )
        .mount(&server)
        .await;

    let mut session = Session::new(3);
    let create = task(Service::User, "create user");
    let request = RequestTemplate::post_json(
        format!("{}/users", user::PREFIX),
        Value::from(user::NewUser::with_suffix("abcde")),
    );
    let outcome = executor(Service::User, &server)
        .execute_request(&create, request, &mut session)
        .await;

    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(session.get_variable(CREATED_USER_ID), Some("42"));
}

#[tokio::test]
async fn create_user_captures_string_id_unquoted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user-service/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "u-17"})))
        .mount(&server)
        .await;

    let mut session = Session::new(0);
    let outcome = executor(Service::User, &server)
        .execute(&task(Service::User, "create user"), &mut session, &mut rand::thread_rng())
        .await;

    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(session.get_variable(CREATED_USER_ID), Some("u-17"));
}

#[tokio::test]
async fn create_user_without_id_clears_previous_value() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user-service/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"username": "x"})))
        .mount(&server)
        .await;

    let mut session = Session::new(0);
    session.set_variable(CREATED_USER_ID, "5");
    let outcome = executor(Service::User, &server)
        .execute(&task(Service::User, "create user"), &mut session, &mut rand::thread_rng())
        .await;

    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(session.get_variable(CREATED_USER_ID), None);
}

#[tokio::test]
async fn create_user_array_body_is_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user-service/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": 1}])))
        .mount(&server)
        .await;

    let mut session = Session::new(0);
    let outcome = executor(Service::User, &server)
        .execute(&task(Service::User, "create user"), &mut session, &mut rand::thread_rng())
        .await;

    assert_eq!(outcome.failure_message().as_deref(), Some("Failed to parse response"));
}

#[tokio::test]
async fn create_user_non_json_body_is_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user-service/users"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .mount(&server)
        .await;

    let mut session = Session::new(0);
    let outcome = executor(Service::User, &server)
        .execute(&task(Service::User, "create user"), &mut session, &mut rand::thread_rng())
        .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.status_code, Some(201));
    assert_eq!(outcome.failure_message().as_deref(), Some("Failed to parse response"));
    assert_eq!(session.get_variable(CREATED_USER_ID), None);
}

#[tokio::test]
async fn create_user_rejected_status_skips_capture() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user-service/users"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"id": 99})))
        .mount(&server)
        .await;

    let mut session = Session::new(0);
    let outcome = executor(Service::User, &server)
        .execute(&task(Service::User, "create user"), &mut session, &mut rand::thread_rng())
        .await;

    assert_eq!(outcome.failure_message().as_deref(), Some("Failed with status 409"));
    assert_eq!(session.get_variable(CREATED_USER_ID), None);
}

#[tokio::test]
async fn health_check_failure_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HEALTH_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut session = Session::new(0);
    let outcome = executor(Service::Product, &server)
        .execute(&task(Service::Product, "health check"), &mut session, &mut rand::thread_rng())
        .await;

    assert_eq!(outcome.status_code, Some(503));
    assert_eq!(outcome.failure_message().as_deref(), Some("Health check failed: 503"));
}

#[tokio::test]
async fn health_check_ok() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HEALTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "UP"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(0);
    let outcome = executor(Service::Payment, &server)
        .execute(&task(Service::Payment, "health check"), &mut session, &mut rand::thread_rng())
        .await;

    assert!(outcome.is_success(), "{:?}", outcome);
}

#[tokio::test]
async fn connection_refused_is_transport_failure() {
    // Grab a free port, then close the listener so nothing is there.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    let executor = TaskExecutor::new(
        Service::Order,
        format!("http://{}", addr),
        reqwest::Client::new(),
    );
    let mut session = Session::new(0);
    let outcome = executor
        .execute(&task(Service::Order, "list orders"), &mut session, &mut rand::thread_rng())
        .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.status_code, None);
    let message = outcome.failure_message().unwrap();
    assert!(message.starts_with("Request failed (network_error)"), "{}", message);
    assert_eq!(session.iterations(), 1);
}
