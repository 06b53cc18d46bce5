use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use common::guard::{GuardDecision, RouteRequirements};
use common::{MoveDirection, UserRole};
use tracing::Level;
use uuid::Uuid;

use client::types::{ListQuery, Page, SignUpForm};
use client::{
    ApiClient, Coordinator, HttpBackend, MediaApi, Navigation, PlaybackState, Session,
    TokenStore, UploadState,
};

#[derive(Parser)]
#[command(name = "lectern", version, about = "Browse, stream and curate Lectern courses")]
struct Cli {
    /// Base URL of the Lectern server.
    #[arg(long, env = "LECTERN_URL", default_value = "http://localhost:3000", global = true)]
    url: String,

    /// Where the session token is kept. Defaults to the user config directory.
    #[arg(long, env = "LECTERN_SESSION_FILE", global = true)]
    session_file: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and remember the session.
    Login {
        username: String,
        #[arg(long, env = "LECTERN_PASSWORD")]
        password: String,
    },
    /// Create an account. New accounts need an administrator to grant access.
    Register {
        username: String,
        #[arg(long, env = "LECTERN_PASSWORD")]
        password: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        school: Option<String>,
        #[arg(long)]
        college: Option<String>,
        #[arg(long)]
        major: Option<String>,
        #[arg(long)]
        grade_year: Option<String>,
    },
    Logout,
    /// Show the signed-in profile and remaining access.
    Whoami,
    Dashboard,
    Subjects {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page: Option<u64>,
    },
    Courses {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        subject: Option<i32>,
        #[arg(long)]
        page: Option<u64>,
    },
    /// Show a course with its chapters in order.
    Course { id: i32 },
    Chapters {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        course: Option<i32>,
        #[arg(long)]
        subject: Option<i32>,
        #[arg(long)]
        page: Option<u64>,
    },
    /// Get a playback link for a chapter.
    Play { chapter_id: i32 },
    /// Upload a video for a chapter (admin).
    Upload { chapter_id: i32, file: PathBuf },
    /// Move a chapter one step within its course (admin).
    Move {
        chapter_id: i32,
        #[arg(value_enum)]
        direction: Direction,
    },
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand)]
enum AdminCommand {
    Stats,
    Users {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page: Option<u64>,
    },
    /// Extend a user's access by a number of days.
    Extend { user_id: Uuid, days: i64 },
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Up,
    Down,
}

impl From<Direction> for MoveDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Up => MoveDirection::Up,
            Direction::Down => MoveDirection::Down,
        }
    }
}

impl Command {
    /// Guard requirements and the location reported on redirect.
    fn route(&self) -> Option<(RouteRequirements, String)> {
        let authed = RouteRequirements::AUTHENTICATED;
        let route = match self {
            Self::Login { .. } | Self::Register { .. } | Self::Logout => return None,
            Self::Whoami => (authed, "/profile".to_string()),
            Self::Dashboard => (authed, "/dashboard".to_string()),
            Self::Subjects { .. } => (authed, "/subjects".to_string()),
            Self::Courses { .. } => (authed, "/courses".to_string()),
            Self::Course { id } => (authed, format!("/courses/{id}")),
            Self::Chapters { .. } => (authed, "/chapters".to_string()),
            Self::Play { chapter_id } => {
                (RouteRequirements::ENTITLED, format!("/chapters/{chapter_id}/play"))
            }
            Self::Upload { chapter_id, .. } => {
                (RouteRequirements::ADMIN, format!("/admin/chapters/{chapter_id}"))
            }
            Self::Move { chapter_id, .. } => {
                (RouteRequirements::ADMIN, format!("/admin/chapters/{chapter_id}"))
            }
            Self::Admin(_) => (RouteRequirements::ADMIN, "/admin".to_string()),
        };
        Some(route)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let store_path = cli
        .session_file
        .clone()
        .or_else(TokenStore::default_path)
        .context("No config directory found; pass --session-file")?;
    let api = Arc::new(ApiClient::new(&cli.url)?);
    let backend = Arc::new(HttpBackend::new(Arc::clone(&api), TokenStore::new(store_path)));
    let session = Session::new(backend);
    session
        .initialize()
        .await
        .context("Failed to restore session")?;

    let result = run(cli.command, &session, &api).await;
    session.shutdown();
    result
}

async fn run(command: Command, session: &Session, api: &Arc<ApiClient>) -> anyhow::Result<()> {
    if let Some((requirements, location)) = command.route() {
        match session.authorize(&requirements, &location) {
            GuardDecision::Allow => {}
            GuardDecision::Pending => bail!("Session is still loading, try again"),
            GuardDecision::RedirectLogin { return_to } => {
                bail!("Sign in to open {return_to}: lectern login <username>")
            }
            GuardDecision::RedirectDashboard => {
                bail!("{location} requires an administrator account")
            }
            GuardDecision::RedirectExpired => {
                bail!("Your access has expired. Ask an administrator to extend it.")
            }
        }
    }

    match command {
        Command::Login { username, password } => {
            let home = match session.sign_in(&username, &password).await? {
                Navigation::AdminHome => "admin dashboard",
                _ => "dashboard",
            };
            println!("Signed in as {username}. Next: the {home}.");
        }
        Command::Register {
            username,
            password,
            phone,
            school,
            college,
            major,
            grade_year,
        } => {
            let form = SignUpForm {
                username,
                password,
                phone_number: phone,
                school,
                college,
                major,
                grade_year,
            };
            session.sign_up(&form).await?;
            println!(
                "Registered {}. Sign in with `lectern login`; access starts once an administrator grants it.",
                form.username
            );
        }
        Command::Logout => {
            session.sign_out().await?;
            println!("Signed out.");
        }
        Command::Whoami => {
            let profile = session.refresh_profile().await?;
            let entitlement = session.snapshot().entitlement(Utc::now());
            println!("{} ({})", profile.username, profile.role);
            println!("  phone:  {}", profile.phone_number);
            if let Some(school) = &profile.school {
                println!("  school: {school}");
            }
            if entitlement.entitled {
                println!(
                    "  access: {} day(s) left, until {}",
                    entitlement.remaining_days, profile.access_expiry_date
                );
            } else {
                println!("  access: expired {}", profile.access_expiry_date);
            }
        }
        Command::Dashboard => {
            let dashboard = api.dashboard().await?;
            if dashboard.entitlement.entitled {
                println!("Access: {} day(s) left", dashboard.entitlement.remaining_days);
            } else {
                println!("Access: expired");
            }
            println!("\nNew subjects:");
            for s in &dashboard.subjects {
                println!("  [{}] {}", s.id, s.name);
            }
            println!("\nNew courses:");
            for c in &dashboard.courses {
                println!("  [{}] {}", c.id, c.title);
            }
            println!("\nRecently watched:");
            for p in &dashboard.recent_progress {
                println!(
                    "  {} / {} ({})",
                    p.course_title,
                    p.chapter_title,
                    p.watched_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::Subjects { search, page } => {
            let result = api
                .subjects(&ListQuery {
                    search,
                    page,
                    ..ListQuery::default()
                })
                .await?;
            print_page(&result, |s| format!("[{}] {}", s.id, s.name));
        }
        Command::Courses {
            search,
            subject,
            page,
        } => {
            let result = api
                .courses(&ListQuery {
                    search,
                    subject_id: subject,
                    page,
                    ..ListQuery::default()
                })
                .await?;
            print_page(&result, |c| format!("[{}] {}", c.id, c.title));
        }
        Command::Course { id } => {
            let detail = api.course(id).await?;
            println!("{} ({})", detail.course.title, detail.subject_name);
            if let Some(description) = &detail.course.description {
                println!("{description}");
            }
            for (i, chapter) in detail.chapters.iter().enumerate() {
                let watched = if chapter.watched_at.is_some() { "✓" } else { " " };
                let video = if chapter.has_video { "" } else { " (no video)" };
                println!("  {watched} {}. [{}] {}{video}", i + 1, chapter.id, chapter.title);
            }
        }
        Command::Chapters {
            search,
            course,
            subject,
            page,
        } => {
            let result = api
                .chapters(&ListQuery {
                    search,
                    course_id: course,
                    subject_id: subject,
                    page,
                    ..ListQuery::default()
                })
                .await?;
            print_page(&result, |c| {
                format!("[{}] course {} #{} {}", c.id, c.course_id, c.order_in_course, c.title)
            });
        }
        Command::Play { chapter_id } => {
            let media: Arc<dyn MediaApi> = api.clone();
            let coordinator = Coordinator::new(media);
            match coordinator.play(chapter_id, |_| {}).await {
                PlaybackState::Playable { url, expires_at } => {
                    println!("{url}");
                    eprintln!("Link valid until {expires_at}");
                }
                PlaybackState::Error(message) => bail!(message),
                PlaybackState::Requesting => bail!("Playback request did not settle"),
            }
        }
        Command::Upload { chapter_id, file } => {
            let chapter = api.chapter(chapter_id).await?;
            let media: Arc<dyn MediaApi> = api.clone();
            let coordinator = Coordinator::new(media);
            let updated = coordinator
                .upload(&chapter, &file, |state| {
                    if let UploadState::Uploading(pct) = state {
                        eprint!("\rUploading... {pct:>3}%");
                        let _ = std::io::stderr().flush();
                    }
                })
                .await;
            eprintln!();
            let updated = updated?;
            println!(
                "Chapter {} now plays {}",
                updated.id, updated.video_storage_path
            );
        }
        Command::Move {
            chapter_id,
            direction,
        } => {
            let chapters = api.move_chapter(chapter_id, direction.into()).await?;
            for c in chapters {
                let marker = if c.id == chapter_id { "*" } else { " " };
                println!("{marker} {}. [{}] {}", c.order_in_course, c.id, c.title);
            }
        }
        Command::Admin(AdminCommand::Stats) => {
            let stats = api.admin_stats().await?;
            println!("users:    {} ({} expired)", stats.user_count, stats.expired_user_count);
            println!("admins:   {}", stats.admin_count);
            println!("subjects: {}", stats.subject_count);
            println!("courses:  {}", stats.course_count);
            println!("chapters: {}", stats.chapter_count);
        }
        Command::Admin(AdminCommand::Users { search, page }) => {
            let result = api
                .users(&ListQuery {
                    search,
                    page,
                    ..ListQuery::default()
                })
                .await?;
            print_page(&result, |p| {
                let role = if p.role == UserRole::Admin { " [admin]" } else { "" };
                format!(
                    "{} {}{role} until {}",
                    p.id,
                    p.username,
                    p.access_expiry_date.format("%Y-%m-%d")
                )
            });
        }
        Command::Admin(AdminCommand::Extend { user_id, days }) => {
            if days <= 0 {
                bail!("days must be positive");
            }
            let user = api.user(user_id).await?;
            let base = user.access_expiry_date.max(Utc::now());
            let updated = api
                .set_access_expiry(user_id, base + Duration::days(days))
                .await?;
            println!(
                "{} now has access until {}",
                updated.username, updated.access_expiry_date
            );
        }
    }
    Ok(())
}

fn print_page<T>(page: &Page<T>, line: impl Fn(&T) -> String) {
    for item in &page.data {
        println!("{}", line(item));
    }
    let p = &page.pagination;
    println!(
        "-- page {}/{} ({} total)",
        p.page,
        p.total_pages.max(1),
        p.total
    );
}
