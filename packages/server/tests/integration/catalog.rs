use serde_json::json;

use crate::common::{TestApp, routes};

mod subjects {
    use super::*;

    #[tokio::test]
    async fn admin_can_create_and_fetch_a_subject() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;

        let id = app.create_subject(&admin, "Math").await;
        let res = app.get_with_token(&routes::subject(id), &admin).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["name"], "Math");
    }

    #[tokio::test]
    async fn regular_user_cannot_create_a_subject() {
        let app = TestApp::spawn().await;
        let user = app.create_user("alice", 10).await;

        let res = app
            .post_with_token(routes::SUBJECTS, &json!({"name": "Math"}), &user)
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn duplicate_subject_name_is_a_conflict() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        app.create_subject(&admin, "Math").await;

        let res = app
            .post_with_token(routes::SUBJECTS, &json!({"name": "Math"}), &admin)
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn search_matches_name_case_insensitively() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        app.create_subject(&admin, "Math").await;
        app.create_subject(&admin, "Physics").await;

        let res = app
            .get_with_token(&format!("{}?search=MAT", routes::SUBJECTS), &admin)
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["pagination"]["total"], 1);
        assert_eq!(res.body["data"][0]["name"], "Math");
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        app.create_subject(&admin, "Math").await;

        let res = app
            .get_with_token(&format!("{}?search=%25", routes::SUBJECTS), &admin)
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn expired_user_can_still_browse() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        app.create_subject(&admin, "Math").await;
        let expired = app.create_expired_user("alice").await;

        let res = app.get_with_token(routes::SUBJECTS, &expired).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn subject_with_courses_cannot_be_deleted() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (subject_id, _) = app.seed_catalog(&admin).await;

        let res = app
            .delete_with_token(&routes::subject(subject_id), &admin)
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
        let still_there = app.get_with_token(&routes::subject(subject_id), &admin).await;
        assert_eq!(still_there.status, 200);
    }

    #[tokio::test]
    async fn empty_subject_can_be_deleted() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let id = app.create_subject(&admin, "Math").await;

        let res = app.delete_with_token(&routes::subject(id), &admin).await;
        assert_eq!(res.status, 204);

        let res = app.get_with_token(&routes::subject(id), &admin).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn description_can_be_cleared() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let id = app.create_subject(&admin, "Math").await;

        let res = app
            .patch_with_token(&routes::subject(id), &json!({"description": null}), &admin)
            .await;

        assert_eq!(res.status, 200);
        assert!(res.body["description"].is_null());
        assert_eq!(res.body["name"], "Math");
    }
}

mod courses {
    use super::*;

    #[tokio::test]
    async fn course_under_missing_subject_is_not_found() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;

        let res = app
            .post_with_token(
                routes::COURSES,
                &json!({"subject_id": 999, "title": "Orphan"}),
                &admin,
            )
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn course_with_chapters_cannot_be_deleted() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (_, course_id) = app.seed_catalog(&admin).await;
        app.create_chapter(&admin, course_id, "Limits").await;

        let res = app.delete_with_token(&routes::course(course_id), &admin).await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn list_filters_by_subject_and_searches_keywords() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (math, _) = app.seed_catalog(&admin).await;
        let physics = app.create_subject(&admin, "Physics").await;
        app.create_course(&admin, physics, "Mechanics").await;

        let res = app
            .get_with_token(&format!("{}?subject_id={math}", routes::COURSES), &admin)
            .await;
        assert_eq!(res.body["pagination"]["total"], 1);
        assert_eq!(res.body["data"][0]["title"], "Calculus I");

        let res = app
            .get_with_token(&format!("{}?search=derivatives", routes::COURSES), &admin)
            .await;
        assert_eq!(res.body["pagination"]["total"], 2);
    }

    #[tokio::test]
    async fn detail_lists_chapters_in_order_with_subject_name() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let (_, course_id) = app.seed_catalog(&admin).await;
        app.create_chapter(&admin, course_id, "Limits").await;
        app.create_chapter(&admin, course_id, "Derivatives").await;

        let res = app.get_with_token(&routes::course(course_id), &admin).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["title"], "Calculus I");
        assert_eq!(res.body["subject_name"], "Math");
        let chapters = res.body["chapters"].as_array().unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0]["title"], "Limits");
        assert_eq!(chapters[0]["order_in_course"], 0);
        assert_eq!(chapters[1]["order_in_course"], 1);
        assert_eq!(chapters[0]["has_video"], false);
        assert!(chapters[0]["watched_at"].is_null());
    }

    #[tokio::test]
    async fn pagination_reports_totals() {
        let app = TestApp::spawn().await;
        let admin = app.create_admin("admin").await;
        let subject = app.create_subject(&admin, "Math").await;
        for i in 0..5 {
            app.create_course(&admin, subject, &format!("Course {i}")).await;
        }

        let res = app
            .get_with_token(&format!("{}?page=2&per_page=2", routes::COURSES), &admin)
            .await;

        assert_eq!(res.body["pagination"]["total"], 5);
        assert_eq!(res.body["pagination"]["total_pages"], 3);
        assert_eq!(res.body["data"].as_array().unwrap().len(), 2);
    }
}
