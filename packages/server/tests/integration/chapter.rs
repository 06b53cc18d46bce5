use serde_json::json;

use crate::common::{TestApp, routes};

fn titles(body: &serde_json::Value) -> Vec<String> {
    body.as_array()
        .expect("expected an array")
        .iter()
        .map(|c| c["title"].as_str().unwrap().to_string())
        .collect()
}

mod creation {
    use super::*;

    #[tokio::test]
    async fn chapters_are_appended_in_order() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (_, course_id) = app.seed_catalog(&admin).await;

        let first = app.create_chapter(&admin, course_id, "Limits").await;
        let second = app.create_chapter(&admin, course_id, "Derivatives").await;

        let a = app.get_with_token(&routes::chapter(first), &admin).await;
        let b = app.get_with_token(&routes::chapter(second), &admin).await;
        assert_eq!(a.body["order_in_course"], 0);
        assert_eq!(b.body["order_in_course"], 1);
        assert_eq!(a.body["has_video"], false);
        assert_eq!(a.body["video_storage_path"], "placeholder.mp4");
    }

    #[tokio::test]
    async fn explicit_order_already_in_use_is_a_conflict() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (_, course_id) = app.seed_catalog(&admin).await;
        app.create_chapter(&admin, course_id, "Limits").await;

        let res = app
            .post_with_token(
                routes::CHAPTERS,
                &json!({"course_id": course_id, "title": "Clash", "order_in_course": 0}),
                &admin,
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn negative_order_is_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (_, course_id) = app.seed_catalog(&admin).await;

        let res = app
            .post_with_token(
                routes::CHAPTERS,
                &json!({"course_id": course_id, "title": "Bad", "order_in_course": -1}),
                &admin,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn append_after_explicit_gap_goes_past_the_maximum() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (_, course_id) = app.seed_catalog(&admin).await;
        app.post_with_token(
            routes::CHAPTERS,
            &json!({"course_id": course_id, "title": "Late", "order_in_course": 5}),
            &admin,
        )
        .await;

        let id = app.create_chapter(&admin, course_id, "Next").await;
        let res = app.get_with_token(&routes::chapter(id), &admin).await;

        assert_eq!(res.body["order_in_course"], 6);
    }
}

mod reordering {
    use super::*;

    #[tokio::test]
    async fn moving_the_second_chapter_up_swaps_positions() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (_, course_id) = app.seed_catalog(&admin).await;
        let first = app.create_chapter(&admin, course_id, "Limits").await;
        let second = app.create_chapter(&admin, course_id, "Derivatives").await;

        let res = app
            .post_with_token(&routes::chapter_move(second), &json!({"direction": "up"}), &admin)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(titles(&res.body), ["Derivatives", "Limits"]);

        let a = app.get_with_token(&routes::chapter(first), &admin).await;
        let b = app.get_with_token(&routes::chapter(second), &admin).await;
        assert_eq!(a.body["order_in_course"], 1);
        assert_eq!(b.body["order_in_course"], 0);

        let detail = app.get_with_token(&routes::course(course_id), &admin).await;
        assert_eq!(titles(&detail.body["chapters"]), ["Derivatives", "Limits"]);
    }

    #[tokio::test]
    async fn moving_the_first_chapter_up_changes_nothing() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (_, course_id) = app.seed_catalog(&admin).await;
        let first = app.create_chapter(&admin, course_id, "Limits").await;
        app.create_chapter(&admin, course_id, "Derivatives").await;

        let res = app
            .post_with_token(&routes::chapter_move(first), &json!({"direction": "up"}), &admin)
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(titles(&res.body), ["Limits", "Derivatives"]);
    }

    #[tokio::test]
    async fn moving_the_last_chapter_down_changes_nothing() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (_, course_id) = app.seed_catalog(&admin).await;
        app.create_chapter(&admin, course_id, "Limits").await;
        let last = app.create_chapter(&admin, course_id, "Derivatives").await;

        let res = app
            .post_with_token(&routes::chapter_move(last), &json!({"direction": "down"}), &admin)
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(titles(&res.body), ["Limits", "Derivatives"]);
    }

    #[tokio::test]
    async fn unknown_direction_is_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (_, course_id) = app.seed_catalog(&admin).await;
        let id = app.create_chapter(&admin, course_id, "Limits").await;

        let res = app
            .post_with_token(&routes::chapter_move(id), &json!({"direction": "sideways"}), &admin)
            .await;

        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn reassigning_to_another_course_keeps_the_order() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (subject_id, course_id) = app.seed_catalog(&admin).await;
        let other = app.create_course(&admin, subject_id, "Calculus II").await;
        app.create_chapter(&admin, course_id, "Limits").await;
        let moved = app.create_chapter(&admin, course_id, "Series").await;

        let res = app
            .patch_with_token(&routes::chapter(moved), &json!({"course_id": other}), &admin)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["course_id"], other);
        assert_eq!(res.body["order_in_course"], 1);

        let listing = app
            .get_with_token(&format!("{}?course_id={other}", routes::CHAPTERS), &admin)
            .await;
        assert_eq!(listing.body["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn listing_by_subject_spans_its_courses() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (subject_id, course_id) = app.seed_catalog(&admin).await;
        let other = app.create_course(&admin, subject_id, "Calculus II").await;
        app.create_chapter(&admin, course_id, "Limits").await;
        app.create_chapter(&admin, other, "Series").await;
        let physics = app.create_subject(&admin, "Physics").await;
        let mechanics = app.create_course(&admin, physics, "Mechanics").await;
        app.create_chapter(&admin, mechanics, "Kinematics").await;

        let res = app
            .get_with_token(&format!("{}?subject_id={subject_id}", routes::CHAPTERS), &admin)
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["pagination"]["total"], 2);
    }
}

mod videos {
    use super::*;

    #[tokio::test]
    async fn non_video_upload_is_rejected_and_chapter_unchanged() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (_, course_id) = app.seed_catalog(&admin).await;
        let id = app.create_chapter(&admin, course_id, "Limits").await;

        let res = app
            .upload_with_token(
                &routes::chapter_video(id),
                "notes.txt",
                "text/plain",
                b"not a video".to_vec(),
                &admin,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        let chapter = app.get_with_token(&routes::chapter(id), &admin).await;
        assert_eq!(chapter.body["has_video"], false);
    }

    #[tokio::test]
    async fn video_upload_binds_the_new_object() {
        let app = TestApp::spawn().await;
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

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["has_video"], true);
        let path = res.body["video_storage_path"].as_str().unwrap();
        assert!(path.starts_with(&format!("chapter_{id}_")), "{path}");
        assert!(path.ends_with(".mp4"), "{path}");
    }

    #[tokio::test]
    async fn replacing_a_video_removes_the_old_object() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (_, course_id) = app.seed_catalog(&admin).await;
        let id = app.create_chapter(&admin, course_id, "Limits").await;

        let first = app
            .upload_with_token(
                &routes::chapter_video(id),
                "take1.mp4",
                "video/mp4",
                b"first take".to_vec(),
                &admin,
            )
            .await;
        let old_path = first.body["video_storage_path"].as_str().unwrap().to_string();
        assert!(app.stored_video(&old_path).exists());

        let second = app
            .upload_with_token(
                &routes::chapter_video(id),
                "take2.webm",
                "video/webm",
                b"second take".to_vec(),
                &admin,
            )
            .await;
        assert_eq!(second.status, 200, "{}", second.text);
        let new_path = second.body["video_storage_path"].as_str().unwrap();

        assert!(!app.stored_video(&old_path).exists());
        assert!(app.stored_video(new_path).exists());
    }

    #[tokio::test]
    async fn deleting_a_chapter_removes_its_video_object() {
        let app = TestApp::spawn().await;
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
        let path = res.body["video_storage_path"].as_str().unwrap().to_string();
        assert!(app.stored_video(&path).exists());

        let res = app.delete_with_token(&routes::chapter(id), &admin).await;
        assert_eq!(res.status, 204);

        assert!(!app.stored_video(&path).exists());
        let res = app.get_with_token(&routes::chapter(id), &admin).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (_, course_id) = app.seed_catalog(&admin).await;
        let id = app.create_chapter(&admin, course_id, "Limits").await;

        let res = app
            .upload_with_token(
                &routes::chapter_video(id),
                "huge.mp4",
                "video/mp4",
                vec![0u8; 1024 * 1024 + 1],
                &admin,
            )
            .await;

        assert_eq!(res.status, 400);
        let chapter = app.get_with_token(&routes::chapter(id), &admin).await;
        assert_eq!(chapter.body["has_video"], false);
    }

    #[tokio::test]
    async fn regular_user_cannot_upload() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let user = app.create_user("alice", 10).await;
        let (_, course_id) = app.seed_catalog(&admin).await;
        let id = app.create_chapter(&admin, course_id, "Limits").await;

        let res = app
            .upload_with_token(
                &routes::chapter_video(id),
                "lecture.mp4",
                "video/mp4",
                b"x".to_vec(),
                &user,
            )
            .await;

        assert_eq!(res.status, 403);
    }
}
