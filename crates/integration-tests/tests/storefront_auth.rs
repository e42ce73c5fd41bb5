//! Integration tests for storefront authentication.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database
//! - The storefront server running (cargo run -p mercato-storefront)
//!
//! Run with: cargo test -p mercato-integration-tests -- --ignored

use mercato_core::Role;
use mercato_integration_tests::{
    TEST_PASSWORD, base_url, client, http_client, signed_in_customer, unique_email,
};
use reqwest::StatusCode;

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_signup_starts_session() {
    let (client, user) = signed_in_customer().await;
    assert_eq!(user.role, Role::Customer);

    let profile = client.profile().await.expect("profile after signup");
    assert_eq!(profile.user.id, user.id);
    assert!(profile.cart_items.is_empty());
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_duplicate_signup_is_rejected() {
    let email = unique_email();
    client()
        .signup("First", &email, TEST_PASSWORD)
        .await
        .expect("first signup");

    let err = client()
        .signup("Second", &email, TEST_PASSWORD)
        .await
        .expect_err("second signup must fail");
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.message(), Some("User Already Exists"));
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_login_reports_which_credential_is_wrong() {
    let email = unique_email();
    client()
        .signup("Login Tester", &email, TEST_PASSWORD)
        .await
        .expect("signup");

    let wrong_password = client()
        .login(&email, "not-the-password")
        .await
        .expect_err("wrong password");
    assert_eq!(wrong_password.status(), Some(401));
    assert_eq!(wrong_password.message(), Some("Invalid Password"));

    let wrong_email = client()
        .login(&unique_email(), TEST_PASSWORD)
        .await
        .expect_err("unknown email");
    assert_eq!(wrong_email.status(), Some(401));
    assert_eq!(wrong_email.message(), Some("Invalid Email"));

    let user = client().login(&email, TEST_PASSWORD).await.expect("login");
    assert_eq!(user.email.as_str(), email);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_logout_revokes_refresh_token() {
    let (client, _) = signed_in_customer().await;

    client.logout().await.expect("logout");

    let err = client.profile().await.expect_err("profile after logout");
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_refresh_issues_new_access_cookie() {
    let http = http_client();
    let base = base_url();

    let resp = http
        .post(format!("{base}/api/auth/signup"))
        .json(&serde_json::json!({
            "name": "Refresh Tester",
            "email": unique_email(),
            "password": TEST_PASSWORD,
        }))
        .send()
        .await
        .expect("signup request");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = http
        .post(format!("{base}/api/auth/refresh-token"))
        .send()
        .await
        .expect("refresh request");
    assert_eq!(resp.status(), StatusCode::OK);
    let cookies: Vec<_> = resp
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=")));
    assert!(cookies.iter().all(|c| !c.starts_with("refreshToken=")));
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_customer_cannot_read_analytics() {
    let (client, _) = signed_in_customer().await;

    let err = client.analytics().await.expect_err("analytics as customer");
    assert_eq!(err.status(), Some(403));
    assert_eq!(err.message(), Some("Access denied - Admin only"));
}
