//! Session data types

use std::path::PathBuf;
use std::sync::Arc;

use crate::types::{ActorId, Angles, Bookmark, CorrectionEntry, Frame, Record, Vec3};

/// State of an active recording session
///
/// An actor with no session is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// Capturing frames
    Recording {
        /// Attach a full correction to the next captured frame
        force_full_snapshot: bool,
    },
    /// Session alive, frames are not captured
    Paused,
}

impl RecordingState {
    /// Check if frames are being captured
    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording { .. })
    }

    /// Check if paused
    pub fn is_paused(&self) -> bool {
        matches!(self, RecordingState::Paused)
    }

    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            RecordingState::Recording { .. } => "Recording",
            RecordingState::Paused => "Paused",
        }
    }
}

/// Per-actor capture buffer
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub name: String,
    pub category: String,
    pub subdir: Option<String>,
    pub initial_position: Vec3,
    pub initial_angles: Angles,
    pub frames: Vec<Frame>,
    pub corrections: Vec<CorrectionEntry>,
    pub bookmarks: Vec<Bookmark>,
    pub state: RecordingState,
    /// Frames since the last periodic origin snapshot
    pub snapshot_counter: u32,
    /// Id of the item held on the previous sample
    pub previous_item: Option<u32>,
}

impl RecordingSession {
    pub fn new(
        name: String,
        category: String,
        subdir: Option<String>,
        initial_position: Vec3,
        initial_angles: Angles,
    ) -> Self {
        Self {
            name,
            category,
            subdir,
            initial_position,
            initial_angles,
            frames: Vec::new(),
            corrections: Vec::new(),
            bookmarks: Vec::new(),
            state: RecordingState::Recording {
                force_full_snapshot: false,
            },
            snapshot_counter: 0,
            previous_item: None,
        }
    }

    /// Number of frames captured so far
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Finalize into a persistable record
    pub fn into_record(self, end_time: i32) -> Record {
        Record::new(
            self.name,
            end_time,
            self.initial_position,
            self.initial_angles,
            self.frames,
            self.corrections,
            self.bookmarks,
        )
    }
}

/// Next bookmark the playback cursor will report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingBookmark {
    pub frame: u32,
    /// Storage index into the record's bookmark table
    pub index: usize,
}

/// Per-actor replay cursor
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub record: Arc<Record>,
    pub path: PathBuf,
    /// Index of the next frame to apply
    pub cursor: usize,
    /// Index of the next correction entry to consume
    pub correction_cursor: usize,
    pub pending_bookmark: Option<PendingBookmark>,
    /// Item identifier applied most recently
    pub last_item: Option<String>,
}

impl PlaybackSession {
    pub fn new(record: Arc<Record>, path: PathBuf) -> Self {
        let pending_bookmark = first_bookmark(&record);
        Self {
            record,
            path,
            cursor: 0,
            correction_cursor: 0,
            pending_bookmark,
            last_item: None,
        }
    }

    /// Rewind to the first frame
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.correction_cursor = 0;
        self.pending_bookmark = first_bookmark(&self.record);
    }

    /// Move the pending pointer to the bookmark after the current one, wrapping
    pub fn advance_bookmark(&mut self) {
        let bookmarks = &self.record.header.bookmarks;
        let next = match self.pending_bookmark {
            Some(p) if p.index + 1 < bookmarks.len() => p.index + 1,
            _ => 0,
        };
        self.pending_bookmark = bookmarks.get(next).map(|b| PendingBookmark {
            frame: b.frame,
            index: next,
        });
    }
}

fn first_bookmark(record: &Record) -> Option<PendingBookmark> {
    record
        .header
        .bookmarks
        .first()
        .map(|b| PendingBookmark { frame: b.frame, index: 0 })
}

/// Result of one playback tick
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackTick {
    /// Index of the frame that was applied
    pub tick: usize,
    /// The applied frame. The caller feeds `buttons` into the proxy's input.
    pub frame: Frame,
    /// Name of the bookmark reached on this tick
    pub bookmark_reached: Option<String>,
    /// Whether the cursor wrapped to the start before this tick
    pub looped: bool,
}

/// Notifications emitted by [`MimicApp`](crate::app::MimicApp)
#[derive(Debug, Clone, PartialEq)]
pub enum MimicEvent {
    RecordingStarted {
        actor: ActorId,
        name: String,
    },
    RecordingSaved {
        actor: ActorId,
        path: PathBuf,
    },
    RecordingDiscarded {
        actor: ActorId,
    },
    SaveFailed {
        actor: ActorId,
        error: String,
    },
    BookmarkSaved {
        actor: ActorId,
        name: String,
        frame: u32,
    },
    PlaybackStarted {
        actor: ActorId,
        path: PathBuf,
    },
    PlaybackStopped {
        actor: ActorId,
    },
    BookmarkReached {
        actor: ActorId,
        name: String,
        tick: usize,
    },
    Looped {
        actor: ActorId,
    },
    ProxyAssigned {
        actor: ActorId,
        path: PathBuf,
    },
    ProxyAssignmentFailed {
        path: PathBuf,
        attempts: u32,
    },
}
