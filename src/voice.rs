//! Voice-note recorder state machine.
//!
//! Tracks the record/stop/cancel lifecycle, accumulates pushed audio chunks,
//! and hands back one clip per take. Capture hardware lives in the platform
//! layer; the recorder only consumes what it is fed.

/// Hard cap on a single voice note.
pub const MAX_RECORD_SECS: u64 = 60;

pub const CLIP_MIME_TYPE: &str = "audio/wav";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    /// A take is ready to be sent or discarded.
    Stopped,
}

/// A finished take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceClip {
    pub bytes: Vec<u8>,
    pub duration_secs: u64,
    pub mime_type: &'static str,
}

/// Recorder lifecycle: Idle -> Recording -> Stopped -> Idle.
#[derive(Debug, Default)]
pub struct VoiceRecorder {
    state: RecorderState,
    chunks: Vec<u8>,
    elapsed_secs: u64,
}

impl Default for RecorderState {
    fn default() -> Self {
        RecorderState::Idle
    }
}

impl VoiceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Begin a new take; a no-op while one is in progress.
    pub fn start(&mut self) {
        if self.state == RecorderState::Recording {
            return;
        }
        self.chunks.clear();
        self.elapsed_secs = 0;
        self.state = RecorderState::Recording;
    }

    /// Append captured audio. Chunks arriving outside a take are dropped.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        if self.state == RecorderState::Recording {
            self.chunks.extend_from_slice(chunk);
        }
    }

    /// Advance the elapsed-time counter by one second. Recording stops by
    /// itself at the cap.
    pub fn tick(&mut self) {
        if self.state != RecorderState::Recording {
            return;
        }
        self.elapsed_secs += 1;
        if self.elapsed_secs >= MAX_RECORD_SECS {
            self.stop();
        }
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    /// Finish the take; returns its duration.
    pub fn stop(&mut self) -> Option<u64> {
        if self.state != RecorderState::Recording {
            return None;
        }
        self.state = RecorderState::Stopped;
        Some(self.elapsed_secs)
    }

    /// Discard any take in progress or awaiting send.
    pub fn cancel(&mut self) {
        self.state = RecorderState::Idle;
        self.chunks.clear();
        self.elapsed_secs = 0;
    }

    /// Consume a finished take as a single clip, returning to idle.
    pub fn take_clip(&mut self) -> Option<VoiceClip> {
        if self.state != RecorderState::Stopped {
            return None;
        }
        let clip = VoiceClip {
            bytes: std::mem::take(&mut self.chunks),
            duration_secs: self.elapsed_secs,
            mime_type: CLIP_MIME_TYPE,
        };
        self.state = RecorderState::Idle;
        self.elapsed_secs = 0;
        Some(clip)
    }
}

/// Display form of an elapsed or playback duration, `M:SS`.
pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
