mod common;

use anyhow::Result;
use serde_json::json;

#[tokio::test]
async fn only_admins_provision_instructors() -> Result<()> {
    let app = common::spawn_app().await?;
    let student = app.signup_student("alice@x.com", "Secret1").await?;

    let (status, body) = app
        .post(
            "/api/auth/admin/create-instructor",
            json!({ "firstName": "Bob", "lastName": "Jones", "email": "bob@x.com" }),
            student["accessToken"].as_str(),
        )
        .await?;
    assert_eq!(status, 403);
    assert_eq!(body["error"], "Admin access required");
    Ok(())
}

#[tokio::test]
async fn instructor_first_login_flow() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.admin_token().await?;

    let (status, body) = app
        .post(
            "/api/auth/admin/create-instructor",
            json!({ "firstName": "Bob", "lastName": "Jones", "email": "bob@x.com" }),
            Some(&admin),
        )
        .await?;
    assert_eq!(status, 201);
    assert_eq!(body["data"]["user"]["role"], "instructor");
    assert_eq!(body["data"]["user"]["status"], "approved");

    let temporary = app.notifier.wait_for("instructor_password", "bob@x.com").await?.payload;
    assert_eq!(temporary.len(), 12);
    assert!(!body.to_string().contains(&temporary));

    // Duplicate provisioning is refused
    let (status, body) = app
        .post(
            "/api/auth/admin/create-instructor",
            json!({ "firstName": "Bob", "lastName": "Jones", "email": "BOB@x.com" }),
            Some(&admin),
        )
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Email already registered");

    let (status, body) = app.login("bob@x.com", &temporary).await?;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["requiresPasswordChange"], true);
    assert_eq!(body["data"]["isFirstLogin"], true);
    assert!(body["data"]["user"]["lastLogin"].is_null());
    let token = body["data"]["accessToken"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            "/api/auth/set-password",
            json!({ "newPassword": "Teach123", "confirmPassword": "Teach124" }),
            Some(&token),
        )
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Passwords do not match");

    let (status, _) = app
        .post(
            "/api/auth/set-password",
            json!({ "newPassword": "Teach123", "confirmPassword": "Teach123" }),
            Some(&token),
        )
        .await?;
    assert_eq!(status, 200);

    let (status, body) = app.login("bob@x.com", "Teach123").await?;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["requiresPasswordChange"], false);
    assert!(body["data"]["user"]["lastLogin"].is_string());
    Ok(())
}

#[tokio::test]
async fn set_password_is_instructor_only() -> Result<()> {
    let app = common::spawn_app().await?;
    let student = app.signup_student("alice@x.com", "Secret1").await?;

    let (status, body) = app
        .post(
            "/api/auth/set-password",
            json!({ "newPassword": "Fresh123", "confirmPassword": "Fresh123" }),
            student["accessToken"].as_str(),
        )
        .await?;
    assert_eq!(status, 403);
    assert_eq!(body["error"], "Only instructors can use this endpoint");
    Ok(())
}

#[tokio::test]
async fn pending_instructors_wait_for_approval() -> Result<()> {
    use lms_auth_api::database::models::NewUser;
    use lms_auth_api::services::CredentialStore;

    let app = common::spawn_app().await?;
    let admin = app.admin_token().await?;
    let pending = CredentialStore::new(app.stores.users.clone())
        .create(NewUser::instructor("Carol", "White", "carol@x.com", "Secret1"))
        .await?;

    let (status, body) = app.login("carol@x.com", "Secret1").await?;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "Your account is pending. Please wait for admin approval.");

    let (status, _) = app
        .send(
            reqwest::Method::PATCH,
            &format!("/api/admin/users/{}/status", pending.id),
            Some(json!({ "status": "approved" })),
            &admin,
        )
        .await?;
    assert_eq!(status, 200);

    let (status, body) = app.login("carol@x.com", "Secret1").await?;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["requiresPasswordChange"], true);
    Ok(())
}
