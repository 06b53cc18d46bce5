use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .nest("/admin", admin_routes())
        .nest("/dashboard", dashboard_routes())
        .nest("/subjects", subject_routes())
        .nest("/courses", course_routes())
        .nest("/chapters", chapter_routes(config))
        .nest("/media", media_routes())
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::auth::register))
        .routes(routes!(handlers::auth::login))
        .routes(routes!(handlers::auth::logout))
        .routes(routes!(handlers::auth::me, handlers::auth::update_me))
}

fn admin_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::admin::list_users,
            handlers::admin::create_user
        ))
        .routes(routes!(
            handlers::admin::get_user,
            handlers::admin::update_user,
            handlers::admin::delete_user
        ))
        .routes(routes!(handlers::admin::reset_password))
        .routes(routes!(handlers::admin::stats))
}

fn dashboard_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::dashboard::get_dashboard))
}

fn subject_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::subject::list_subjects,
            handlers::subject::create_subject
        ))
        .routes(routes!(
            handlers::subject::get_subject,
            handlers::subject::update_subject,
            handlers::subject::delete_subject
        ))
}

fn course_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::course::list_courses,
            handlers::course::create_course
        ))
        .routes(routes!(
            handlers::course::get_course,
            handlers::course::update_course,
            handlers::course::delete_course
        ))
}

fn chapter_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let crud = OpenApiRouter::new()
        .routes(routes!(
            handlers::chapter::list_chapters,
            handlers::chapter::create_chapter
        ))
        .routes(routes!(
            handlers::chapter::get_chapter,
            handlers::chapter::update_chapter,
            handlers::chapter::delete_chapter
        ))
        .routes(routes!(handlers::chapter::move_chapter))
        .routes(routes!(handlers::chapter::request_playback));

    let upload = OpenApiRouter::new()
        .routes(routes!(handlers::chapter::upload_video))
        .layer(handlers::chapter::video_body_limit(
            config.storage.max_video_size,
        ));

    crud.merge(upload)
}

fn media_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::media::stream_media))
}
