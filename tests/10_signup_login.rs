mod common;

use anyhow::Result;
use serde_json::json;

#[tokio::test]
async fn health_and_root_respond() -> Result<()> {
    let app = common::spawn_app().await?;

    let (status, body) = app.get("/health", None).await?;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["database"], "ok");

    let (status, body) = app.get("/", None).await?;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert!(body["error"].is_null());
    Ok(())
}

#[tokio::test]
async fn student_signup_then_login() -> Result<()> {
    let app = common::spawn_app().await?;

    let data = app.signup_student("alice@x.com", "Secret1").await?;
    assert!(data["accessToken"].is_string());
    assert!(data["refreshToken"].is_string());
    assert_eq!(data["user"]["role"], "student");
    assert!(data["user"].get("password").is_none());
    app.notifier.wait_for("welcome", "alice@x.com").await?;

    let (status, body) = app.login("Alice@X.com", "Secret1").await?;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["requiresPasswordChange"], false);
    assert_eq!(body["data"]["isFirstLogin"], false);
    assert!(body["data"]["user"]["lastLogin"].is_string());

    let token = body["data"]["accessToken"].as_str().unwrap();
    let (status, me) = app.get("/api/auth/me", Some(token)).await?;
    assert_eq!(status, 200);
    assert_eq!(me["data"]["email"], "alice@x.com");
    Ok(())
}

#[tokio::test]
async fn signup_rejects_duplicates_and_bad_input() -> Result<()> {
    let app = common::spawn_app().await?;
    app.signup_student("alice@x.com", "Secret1").await?;

    let (status, body) = app
        .post(
            "/api/auth/signup/student",
            json!({
                "firstName": "Other",
                "lastName": "Person",
                "email": "ALICE@x.com",
                "mobileNo": "9876543210",
                "gender": "male",
                "password": "Secret1",
                "confirmPassword": "Secret1",
            }),
            None,
        )
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Email already registered");

    let (status, body) = app
        .post(
            "/api/auth/signup",
            json!({
                "firstName": "Bob",
                "lastName": "Jones",
                "email": "bob@x.com",
                "mobileNo": "12345",
                "gender": "male",
                "password": "Secret1",
                "confirmPassword": "Secret1",
            }),
            None,
        )
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["mobileNo"].is_string());

    let (status, body) = app
        .post(
            "/api/auth/signup",
            json!({
                "firstName": "Bob",
                "lastName": "Jones",
                "email": "bob@x.com",
                "mobileNo": "9876543210",
                "gender": "male",
                "password": "Secret1",
                "confirmPassword": "Secret2",
            }),
            None,
        )
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Passwords do not match");
    Ok(())
}

#[tokio::test]
async fn login_failures_do_not_reveal_accounts() -> Result<()> {
    let app = common::spawn_app().await?;
    app.signup_student("alice@x.com", "Secret1").await?;

    let (status_a, body_a) = app.login("alice@x.com", "Wrong11").await?;
    let (status_b, body_b) = app.login("nobody@x.com", "Wrong11").await?;
    assert_eq!(status_a, 401);
    assert_eq!(status_b, 401);
    assert_eq!(body_a["error"], "Invalid email or password");
    assert_eq!(body_a["error"], body_b["error"]);

    let (status, body) = app.post("/api/auth/login", json!({ "email": "alice@x.com" }), None).await?;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Password or OTP is required");
    Ok(())
}

#[tokio::test]
async fn malformed_requests_get_the_envelope() -> Result<()> {
    let app = common::spawn_app().await?;

    let res = app
        .client
        .post(app.url("/api/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(res.status().as_u16(), 400);
    let body: serde_json::Value = res.json().await?;
    assert_eq!(body["code"], "INVALID_JSON");

    let (status, body) = app.get("/api/nothing-here", None).await?;
    assert_eq!(status, 404);
    assert_eq!(body["success"], false);

    let (status, body) = app.get("/api/auth/me", None).await?;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "Not authorized to access this route");
    Ok(())
}
