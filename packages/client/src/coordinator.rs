//! Upload and playback orchestration on the client side.
//!
//! Uploads are validated locally (the file must exist, be non-empty and look
//! like a video) before any request is made, then streamed while progress is
//! reported in whole percent.

use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::storage::{BoxReader, is_video_content_type};
use tokio::io::{AsyncRead, ReadBuf};
use tracing::{info, instrument, warn};

use crate::error::ClientError;
use crate::types::{Chapter, PlaybackLink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    NoVideo,
    Uploading(u8),
    Bound(String),
}

impl UploadState {
    pub fn for_chapter(chapter: &Chapter) -> Self {
        if chapter.has_video {
            Self::Bound(chapter.video_storage_path.clone())
        } else {
            Self::NoVideo
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Requesting,
    Playable {
        url: String,
        expires_at: DateTime<Utc>,
    },
    Error(String),
}

/// A file ready to be sent to the server.
pub struct VideoUpload {
    pub file_name: String,
    pub content_type: String,
    pub length: u64,
    pub reader: BoxReader,
}

/// Media endpoints the coordinator drives.
#[async_trait]
pub trait MediaApi: Send + Sync {
    /// Upload and bind a video. Returns the chapter as stored afterwards.
    async fn upload_video(&self, chapter_id: i32, upload: VideoUpload)
    -> Result<Chapter, ClientError>;

    /// Obtain a time-limited playback URL and record the watch event.
    async fn request_playback(&self, chapter_id: i32) -> Result<PlaybackLink, ClientError>;
}

type Report = Arc<dyn Fn(UploadState) + Send + Sync>;

/// Counts bytes as the transport pulls them and reports each new percentage.
struct ProgressReader {
    inner: BoxReader,
    total: u64,
    sent: u64,
    last_pct: u8,
    report: Report,
}

impl ProgressReader {
    fn new(inner: BoxReader, total: u64, report: Report) -> Self {
        report(UploadState::Uploading(0));
        Self {
            inner,
            total,
            sent: 0,
            last_pct: 0,
            report,
        }
    }
}

fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (sent.min(total) * 100 / total) as u8
}

impl AsyncRead for ProgressReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            let read = (buf.filled().len() - before) as u64;
            if read > 0 {
                self.sent += read;
                let pct = percent(self.sent, self.total);
                if pct != self.last_pct {
                    self.last_pct = pct;
                    (self.report)(UploadState::Uploading(pct));
                }
            }
        }
        poll
    }
}

/// Reject anything that is not obviously a video before touching the network.
pub fn detect_video_type(path: &Path) -> Result<String, ClientError> {
    let guessed = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string());
    match guessed {
        Some(content_type) if is_video_content_type(&content_type) => Ok(content_type),
        _ => Err(ClientError::InvalidInput(format!(
            "{} is not a video file",
            path.display()
        ))),
    }
}

pub struct Coordinator {
    api: Arc<dyn MediaApi>,
}

impl Coordinator {
    pub fn new(api: Arc<dyn MediaApi>) -> Self {
        Self { api }
    }

    /// Upload `file` as the video of `chapter`.
    ///
    /// `report` sees `Uploading(0..=100)` followed by `Bound(path)`. On failure
    /// it sees the chapter's prior state again and the error is returned.
    #[instrument(skip(self, chapter, report), fields(chapter_id = chapter.id))]
    pub async fn upload<F>(
        &self,
        chapter: &Chapter,
        file: &Path,
        report: F,
    ) -> Result<Chapter, ClientError>
    where
        F: Fn(UploadState) + Send + Sync + 'static,
    {
        let content_type = detect_video_type(file)?;
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::InvalidInput("File name is not valid UTF-8".into()))?
            .to_string();
        let handle = tokio::fs::File::open(file).await?;
        let length = handle.metadata().await?.len();
        if length == 0 {
            return Err(ClientError::InvalidInput(format!("{file_name} is empty")));
        }

        let report: Report = Arc::new(report);
        let reader = ProgressReader::new(Box::new(handle), length, Arc::clone(&report));
        let upload = VideoUpload {
            file_name,
            content_type,
            length,
            reader: Box::new(reader),
        };

        match self.api.upload_video(chapter.id, upload).await {
            Ok(updated) => {
                info!(path = %updated.video_storage_path, "Video bound to chapter");
                report(UploadState::for_chapter(&updated));
                Ok(updated)
            }
            Err(e) => {
                warn!(error = %e, "Video upload failed");
                report(UploadState::for_chapter(chapter));
                Err(e)
            }
        }
    }

    /// Request a playback link. Errors become [`PlaybackState::Error`].
    #[instrument(skip(self, report))]
    pub async fn play<F>(&self, chapter_id: i32, report: F) -> PlaybackState
    where
        F: Fn(&PlaybackState),
    {
        report(&PlaybackState::Requesting);
        let state = match self.api.request_playback(chapter_id).await {
            Ok(link) => PlaybackState::Playable {
                url: link.url,
                expires_at: link.expires_at,
            },
            Err(e) => PlaybackState::Error(e.to_string()),
        };
        report(&state);
        state
    }
}
