use serde_json::json;

use crate::common::{PASSWORD, TestApp, routes};

mod registration {
    use super::*;

    #[tokio::test]
    async fn new_user_can_register_with_valid_details() {
        let app = TestApp::spawn().await;

        let res = app.register("alice").await;

        assert!(res.body["id"].is_string());
        assert_eq!(res.body["username"], "alice");
        assert_eq!(res.body["role"], "user");
        assert!(res.body.get("password").is_none());
    }

    #[tokio::test]
    async fn cannot_register_with_an_already_taken_username() {
        let app = TestApp::spawn().await;
        app.register("alice").await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"username": "alice", "password": PASSWORD, "phone_number": "1"}),
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "USERNAME_TAKEN");
    }

    #[tokio::test]
    async fn cannot_register_with_a_password_that_is_too_short() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"username": "alice", "password": "short", "phone_number": "1"}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn cannot_register_with_an_invalid_username() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"username": "no spaces!", "password": PASSWORD, "phone_number": "1"}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn self_registered_account_starts_without_access() {
        let app = TestApp::spawn().await;
        let token = app.create_expired_user("alice").await;

        let res = app.get_with_token(routes::ME, &token).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["entitlement"]["entitled"], false);
        assert_eq!(res.body["entitlement"]["remaining_days"], 0);
    }
}

mod login {
    use super::*;

    #[tokio::test]
    async fn registered_user_receives_a_token() {
        let app = TestApp::spawn().await;
        app.register("alice").await;

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "alice", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 200);
        assert!(res.body["token"].is_string());
        assert!(res.body["expires_at"].is_string());
        assert_eq!(res.body["profile"]["username"], "alice");
    }

    #[tokio::test]
    async fn unknown_username_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "ghost", "password": PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let app = TestApp::spawn().await;
        app.register("alice").await;

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "alice", "password": "wrongpassword"}),
            )
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "INVALID_CREDENTIALS");
    }
}

mod sessions {
    use super::*;

    #[tokio::test]
    async fn requests_without_a_token_are_rejected() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::ME).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.get_with_token(routes::ME, "not-a-jwt").await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice", 10).await;

        let res = app.post_with_token(routes::LOGOUT, &json!({}), &token).await;
        assert_eq!(res.status, 204, "logout failed: {}", res.text);

        let res = app.get_with_token(routes::ME, &token).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn logout_leaves_other_sessions_alone() {
        let app = TestApp::spawn().await;
        let first = app.create_user("alice", 10).await;
        let second = app.login("alice").await;

        app.post_with_token(routes::LOGOUT, &json!({}), &first).await;

        let res = app.get_with_token(routes::ME, &second).await;
        assert_eq!(res.status, 200);
    }
}

mod profile {
    use super::*;

    #[tokio::test]
    async fn me_reports_remaining_days() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice", 10).await;

        let res = app.get_with_token(routes::ME, &token).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["profile"]["username"], "alice");
        assert_eq!(res.body["entitlement"]["entitled"], true);
        assert_eq!(res.body["entitlement"]["remaining_days"], 10);
    }

    #[tokio::test]
    async fn user_can_edit_contact_details_and_clear_affiliation() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice", 10).await;

        let res = app
            .patch_with_token(
                routes::ME,
                &json!({"phone_number": "555", "school": "Tsinghua"}),
                &token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["phone_number"], "555");
        assert_eq!(res.body["school"], "Tsinghua");

        let res = app
            .patch_with_token(routes::ME, &json!({"school": null}), &token)
            .await;
        assert_eq!(res.status, 200);
        assert!(res.body["school"].is_null());
        assert_eq!(res.body["phone_number"], "555");
    }

    #[tokio::test]
    async fn user_cannot_grant_themselves_access() {
        let app = TestApp::spawn().await;
        let token = app.create_expired_user("alice").await;

        app.patch_with_token(
            routes::ME,
            &json!({"access_expiry_date": "2099-01-01T00:00:00Z", "role": "admin"}),
            &token,
        )
        .await;

        let res = app.get_with_token(routes::ME, &token).await;
        assert_eq!(res.body["profile"]["role"], "user");
        assert_eq!(res.body["entitlement"]["entitled"], false);
    }
}
