use serde_json::json;

use crate::common::{PASSWORD, TestApp, routes};

mod users {
    use super::*;

    #[tokio::test]
    async fn admin_created_account_gets_the_default_grant() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;

        let res = app
            .post_with_token(
                routes::USERS,
                &json!({"username": "bob", "password": PASSWORD, "phone_number": "1"}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["role"], "user");

        let token = app.login("bob").await;
        let me = app.get_with_token(routes::ME, &token).await;
        assert_eq!(me.body["entitlement"]["entitled"], true);
        assert_eq!(me.body["entitlement"]["remaining_days"], 30);
    }

    #[tokio::test]
    async fn extending_access_restores_playback_rights() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let created = app.register("alice").await;
        let id = created.body["id"].as_str().unwrap().to_string();
        let token = app.login("alice").await;

        let res = app
            .patch_with_token(
                &routes::user(&id),
                &json!({"access_expiry_date": "2099-01-01T00:00:00Z"}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let me = app.get_with_token(routes::ME, &token).await;
        assert_eq!(me.body["entitlement"]["entitled"], true);
    }

    #[tokio::test]
    async fn search_and_role_filter() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        app.register("alice").await;
        app.register("alina").await;
        app.register("bob").await;

        let res = app
            .get_with_token(&format!("{}?search=ALI", routes::USERS), &admin)
            .await;
        assert_eq!(res.body["pagination"]["total"], 2);

        let res = app
            .get_with_token(&format!("{}?role=admin", routes::USERS), &admin)
            .await;
        assert_eq!(res.body["pagination"]["total"], 1);
        assert_eq!(res.body["data"][0]["username"], "admin");
    }

    #[tokio::test]
    async fn regular_user_cannot_list_accounts() {
        let app = TestApp::spawn().await;
        let user = app.create_user("alice", 10).await;

        let res = app.get_with_token(routes::USERS, &user).await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn admin_cannot_delete_themselves() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let me = app.get_with_token(routes::ME, &admin).await;
        let id = me.body["profile"]["id"].as_str().unwrap().to_string();

        let res = app.delete_with_token(&routes::user(&id), &admin).await;

        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn deleted_account_can_no_longer_sign_in() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let created = app.register("alice").await;
        let id = created.body["id"].as_str().unwrap().to_string();
        let token = app.login("alice").await;

        let res = app.delete_with_token(&routes::user(&id), &admin).await;
        assert_eq!(res.status, 204);

        let res = app.get_with_token(routes::ME, &token).await;
        assert_eq!(res.status, 401);
        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "alice", "password": PASSWORD}),
            )
            .await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn password_reset_signs_the_account_out() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let created = app.register("alice").await;
        let id = created.body["id"].as_str().unwrap().to_string();
        let token = app.login("alice").await;

        let res = app
            .post_with_token(
                &routes::user_password(&id),
                &json!({"password": "brandnewpass"}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 204, "{}", res.text);

        let res = app.get_with_token(routes::ME, &token).await;
        assert_eq!(res.status, 401);

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "alice", "password": "brandnewpass"}),
            )
            .await;
        assert_eq!(res.status, 200);
    }
}

mod stats {
    use super::*;

    #[tokio::test]
    async fn counts_accounts_and_catalog() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        app.create_user("alice", 10).await;
        app.create_expired_user("bob").await;
        let (_, course_id) = app.seed_catalog(&admin).await;
        app.create_chapter(&admin, course_id, "Limits").await;

        let res = app.get_with_token(routes::STATS, &admin).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["user_count"], 3);
        assert_eq!(res.body["admin_count"], 1);
        assert_eq!(res.body["expired_user_count"], 1);
        assert_eq!(res.body["subject_count"], 1);
        assert_eq!(res.body["course_count"], 1);
        assert_eq!(res.body["chapter_count"], 1);
    }
}
