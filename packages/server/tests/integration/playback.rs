use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use server::entity::chapter_progress;

use crate::common::{TestApp, routes};

/// Admin token plus a chapter with an uploaded video.
async fn chapter_with_video(app: &TestApp) -> (String, i32, i32) {
    let admin = app.create_admin("admin").await;
    let (_, course_id) = app.seed_catalog(&admin).await;
    let id = app.create_chapter(&admin, course_id, "Limits").await;
    let res = app
        .upload_with_token(
            &routes::chapter_video(id),
            "lecture.mp4",
            "video/mp4",
            b"fake video bytes".to_vec(),
            &admin,
        )
        .await;
    assert_eq!(res.status, 200, "upload failed: {}", res.text);
    (admin, course_id, id)
}

mod entitlement {
    use super::*;

    #[tokio::test]
    async fn expired_user_is_refused_playback() {
        let app = TestApp::spawn().await;
        let (_, _, chapter_id) = chapter_with_video(&app).await;
        let expired = app.create_expired_user("alice").await;

        let res = app
            .post_with_token(&routes::chapter_playback(chapter_id), &json!({}), &expired)
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "ACCESS_EXPIRED");
    }

    #[tokio::test]
    async fn entitled_user_receives_a_working_url() {
        let app = TestApp::spawn().await;
        let (_, _, chapter_id) = chapter_with_video(&app).await;
        let user = app.create_user("alice", 10).await;

        let res = app
            .post_with_token(&routes::chapter_playback(chapter_id), &json!({}), &user)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["chapter_id"], chapter_id);
        let url = res.body["url"].as_str().unwrap();
        assert!(url.starts_with(&app.url("/api/v1/media/")), "{url}");

        let media = app.client.get(url).send().await.unwrap();
        assert_eq!(media.status().as_u16(), 200);
        assert_eq!(
            media.headers()["content-type"].to_str().unwrap(),
            "video/mp4"
        );
        assert_eq!(media.bytes().await.unwrap().as_ref(), b"fake video bytes");
    }

    #[tokio::test]
    async fn chapter_without_video_is_not_playable() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (_, course_id) = app.seed_catalog(&admin).await;
        let id = app.create_chapter(&admin, course_id, "Limits").await;
        let user = app.create_user("alice", 10).await;

        let res = app
            .post_with_token(&routes::chapter_playback(id), &json!({}), &user)
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}

mod progress {
    use super::*;

    #[tokio::test]
    async fn repeated_playback_keeps_one_progress_row() {
        let app = TestApp::spawn().await;
        let (_, course_id, chapter_id) = chapter_with_video(&app).await;
        let user = app.create_user("alice", 10).await;

        for _ in 0..2 {
            let res = app
                .post_with_token(&routes::chapter_playback(chapter_id), &json!({}), &user)
                .await;
            assert_eq!(res.status, 200);
        }

        let rows = chapter_progress::Entity::find()
            .filter(chapter_progress::Column::ChapterId.eq(chapter_id))
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let detail = app.get_with_token(&routes::course(course_id), &user).await;
        assert!(detail.body["chapters"][0]["watched_at"].is_string());

        let dashboard = app.get_with_token(routes::DASHBOARD, &user).await;
        assert_eq!(dashboard.status, 200);
        let recent = dashboard.body["recent_progress"].as_array().unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0]["chapter_title"], "Limits");
        assert_eq!(recent[0]["course_title"], "Calculus I");
    }

    #[tokio::test]
    async fn deleting_a_chapter_removes_its_progress() {
        let app = TestApp::spawn().await;
        let (admin, _, chapter_id) = chapter_with_video(&app).await;
        let user = app.create_user("alice", 10).await;
        app.post_with_token(&routes::chapter_playback(chapter_id), &json!({}), &user)
            .await;

        let res = app.delete_with_token(&routes::chapter(chapter_id), &admin).await;
        assert_eq!(res.status, 204);

        let rows = chapter_progress::Entity::find().count(&app.db).await.unwrap();
        assert_eq!(rows, 0);
    }
}

mod media {
    use super::*;

    #[tokio::test]
    async fn media_route_requires_a_token() {
        let app = TestApp::spawn().await;
        let (admin, _, chapter_id) = chapter_with_video(&app).await;
        let chapter = app.get_with_token(&routes::chapter(chapter_id), &admin).await;
        let path = chapter.body["video_storage_path"].as_str().unwrap();

        let res = app.get_without_token(&format!("/api/v1/media/{path}")).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");

        let res = app
            .get_without_token(&format!("/api/v1/media/{path}?token=forged"))
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn login_token_is_not_a_media_token() {
        let app = TestApp::spawn().await;
        let (admin, _, chapter_id) = chapter_with_video(&app).await;
        let chapter = app.get_with_token(&routes::chapter(chapter_id), &admin).await;
        let path = chapter.body["video_storage_path"].as_str().unwrap();

        let res = app
            .get_without_token(&format!("/api/v1/media/{path}?token={admin}"))
            .await;

        assert_eq!(res.status, 401);
    }
}
