//! Refund submission: amount parsing, connector response mapping, and
//! the CSRF fail-safe in front of it all.

mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{
    GATEWAY_ACCOUNT_ID, get, json_body, location, portal, post_form, seed_logged_in, user,
};

const CHARGE_ID: &str = "ch12345";

fn refund_path() -> String {
    format!("/v1/api/accounts/{GATEWAY_ACCOUNT_ID}/charges/{CHARGE_ID}/refunds")
}

fn charge_path() -> String {
    format!("/v1/api/accounts/{GATEWAY_ACCOUNT_ID}/charges/{CHARGE_ID}")
}

fn refund_form(amount: &str, available: &str, token: &str) -> String {
    format!(
        "refund-amount={amount}&refund-amount-available-in-pence={available}&csrfToken={token}"
    )
}

#[tokio::test]
async fn accepted_refund_redirects_to_the_transaction() -> Result<()> {
    let portal = portal().await?;
    let (cookie, token) = seed_logged_in(&portal.sessions, user()).await?;

    // Pounds and pence become integer pence; availability is echoed.
    Mock::given(method("POST"))
        .and(path(refund_path()))
        .and(body_json(
            json!({"amount": 1990, "refund_amount_available": 5000}),
        ))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"refund_id": "re_1"})))
        .expect(1)
        .mount(&portal.connector)
        .await;

    let response = portal
        .app
        .oneshot(post_form(
            &format!("/transactions/{CHARGE_ID}/refund"),
            Some(&cookie),
            &refund_form("19.90", "5000", &token),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response).as_deref(),
        Some(format!("/transactions/{CHARGE_ID}").as_str())
    );
    Ok(())
}

#[tokio::test]
async fn whole_pounds_are_accepted() -> Result<()> {
    let portal = portal().await?;
    let (cookie, token) = seed_logged_in(&portal.sessions, user()).await?;

    Mock::given(method("POST"))
        .and(path(refund_path()))
        .and(body_json(
            json!({"amount": 1000, "refund_amount_available": 5000}),
        ))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"refund_id": "re_2"})))
        .expect(1)
        .mount(&portal.connector)
        .await;

    let response = portal
        .app
        .oneshot(post_form(
            &format!("/transactions/{CHARGE_ID}/refund"),
            Some(&cookie),
            &refund_form("10", "5000", &token),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    Ok(())
}

#[tokio::test]
async fn single_fractional_digit_never_reaches_the_connector() -> Result<()> {
    let portal = portal().await?;
    let (cookie, token) = seed_logged_in(&portal.sessions, user()).await?;

    Mock::given(method("POST"))
        .and(path(refund_path()))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&portal.connector)
        .await;

    let response = portal
        .app
        .oneshot(post_form(
            &format!("/transactions/{CHARGE_ID}/refund"),
            Some(&cookie),
            &refund_form("1.9", "5000", &token),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(
        body["message"],
        "Can't do refund: amount must be pounds (10) or pounds and pence (10.10)"
    );
    Ok(())
}

async fn rejected_refund_message(reason: &str) -> Result<String> {
    let portal = portal().await?;
    let (cookie, token) = seed_logged_in(&portal.sessions, user()).await?;

    Mock::given(method("POST"))
        .and(path(refund_path()))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"reason": reason})))
        .mount(&portal.connector)
        .await;

    let response = portal
        .app
        .oneshot(post_form(
            &format!("/transactions/{CHARGE_ID}/refund"),
            Some(&cookie),
            &refund_form("99.99", "5000", &token),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    Ok(body["message"]
        .as_str()
        .expect("expected a message")
        .to_string())
}

#[tokio::test]
async fn over_available_amount_maps_to_the_fixed_message() -> Result<()> {
    let message = rejected_refund_message("amount_not_available").await?;
    assert_eq!(
        message,
        "Can't do refund: The requested amount is bigger than the amount available for refund"
    );
    Ok(())
}

#[tokio::test]
async fn below_minimum_amount_maps_to_the_fixed_message() -> Result<()> {
    let message = rejected_refund_message("amount_min_validation").await?;
    assert_eq!(
        message,
        "Can't do refund: The requested amount is less than the minimum accepted for issuing a refund for this charge"
    );
    Ok(())
}

#[tokio::test]
async fn fully_refunded_charge_maps_to_the_fixed_message() -> Result<()> {
    let message = rejected_refund_message("full").await?;
    assert_eq!(
        message,
        "Can't do refund: This charge has been already fully refunded"
    );
    Ok(())
}

#[tokio::test]
async fn unrecognized_rejection_maps_to_the_generic_message() -> Result<()> {
    let message = rejected_refund_message("something_new").await?;
    assert_eq!(message, "Can't process refund");
    Ok(())
}

#[tokio::test]
async fn stale_availability_snapshot_reads_as_already_submitted() -> Result<()> {
    let portal = portal().await?;
    let (cookie, token) = seed_logged_in(&portal.sessions, user()).await?;

    Mock::given(method("POST"))
        .and(path(refund_path()))
        .respond_with(
            ResponseTemplate::new(412).set_body_json(json!({"message": "Precondition Failed!"})),
        )
        .mount(&portal.connector)
        .await;

    let response = portal
        .app
        .oneshot(post_form(
            &format!("/transactions/{CHARGE_ID}/refund"),
            Some(&cookie),
            &refund_form("19.90", "5000", &token),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(
        body["message"],
        "Refund failed. This refund request has already been submitted."
    );
    Ok(())
}

#[tokio::test]
async fn connector_outage_maps_to_the_generic_message() -> Result<()> {
    let portal = portal().await?;
    let (cookie, token) = seed_logged_in(&portal.sessions, user()).await?;

    Mock::given(method("POST"))
        .and(path(refund_path()))
        .respond_with(ResponseTemplate::new(500))
        .mount(&portal.connector)
        .await;

    let response = portal
        .app
        .oneshot(post_form(
            &format!("/transactions/{CHARGE_ID}/refund"),
            Some(&cookie),
            &refund_form("19.90", "5000", &token),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["message"], "Can't process refund");
    Ok(())
}

#[tokio::test]
async fn refund_without_a_csrf_token_never_reaches_the_connector() -> Result<()> {
    let portal = portal().await?;
    let (cookie, _) = seed_logged_in(&portal.sessions, user()).await?;

    Mock::given(method("POST"))
        .and(path(refund_path()))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&portal.connector)
        .await;

    let response = portal
        .app
        .oneshot(post_form(
            &format!("/transactions/{CHARGE_ID}/refund"),
            Some(&cookie),
            "refund-amount=19.90&refund-amount-available-in-pence=5000",
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(
        body["message"],
        "There is a problem with the payments platform"
    );
    Ok(())
}

#[tokio::test]
async fn transaction_page_shows_the_availability_snapshot() -> Result<()> {
    let portal = portal().await?;
    let (cookie, _) = seed_logged_in(&portal.sessions, user()).await?;

    Mock::given(method("GET"))
        .and(path(charge_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "charge_id": CHARGE_ID,
            "amount": 5000,
            "refund_summary": {
                "status": "available",
                "amount_available": 5000,
                "amount_submitted": 0
            }
        })))
        .mount(&portal.connector)
        .await;

    let response = portal
        .app
        .oneshot(get(&format!("/transactions/{CHARGE_ID}"), Some(&cookie)))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["charge_id"], CHARGE_ID);
    assert_eq!(body["refund_amount_available"], 5000);
    assert!(body["csrfToken"].as_str().is_some_and(|t| !t.is_empty()));
    Ok(())
}

#[tokio::test]
async fn unknown_transaction_is_reported_as_not_found() -> Result<()> {
    let portal = portal().await?;
    let (cookie, _) = seed_logged_in(&portal.sessions, user()).await?;

    Mock::given(method("GET"))
        .and(path(charge_path()))
        .respond_with(ResponseTemplate::new(404))
        .mount(&portal.connector)
        .await;

    let response = portal
        .app
        .oneshot(get(&format!("/transactions/{CHARGE_ID}"), Some(&cookie)))
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
