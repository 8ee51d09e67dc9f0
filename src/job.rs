//! Export job record and lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Export lifecycle: `Idle → Capturing → Assembling → (Saved | Failed) → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportState {
    #[default]
    Idle,
    Capturing,
    Assembling,
    Saved,
    Failed,
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportState::Idle => write!(f, "idle"),
            ExportState::Capturing => write!(f, "capturing"),
            ExportState::Assembling => write!(f, "assembling"),
            ExportState::Saved => write!(f, "saved"),
            ExportState::Failed => write!(f, "failed"),
        }
    }
}

/// One export attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    pub job_id: String,
    pub basename: String,
    pub scale: f32,
    pub status: ExportState,
    pub output_path: Option<String>,
    pub pixel_width: Option<u32>,
    pub pixel_height: Option<u32>,
    pub link_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl ExportJob {
    pub fn new(basename: impl Into<String>, scale: f32) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4().to_string(),
            basename: basename.into(),
            scale,
            status: ExportState::Idle,
            output_path: None,
            pixel_width: None,
            pixel_height: None,
            link_count: 0,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    /// `<basename>.pdf`
    pub fn file_name(&self) -> String {
        format!("{}.pdf", self.basename)
    }

    pub fn start_capture(&mut self) {
        self.status = ExportState::Capturing;
        self.updated_at = Utc::now();
    }

    pub fn start_assembly(&mut self, pixel_width: u32, pixel_height: u32) {
        self.status = ExportState::Assembling;
        self.pixel_width = Some(pixel_width);
        self.pixel_height = Some(pixel_height);
        self.updated_at = Utc::now();
    }

    pub fn mark_saved(&mut self, output_path: String, link_count: usize) {
        self.status = ExportState::Saved;
        self.output_path = Some(output_path);
        self.link_count = link_count;
        self.updated_at = Utc::now();
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = ExportState::Failed;
        self.updated_at = Utc::now();
        self.error = Some(error);
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, ExportState::Saved | ExportState::Failed)
    }

    pub fn processing_duration_ms(&self) -> Option<i64> {
        if self.is_finished() {
            Some(self.updated_at.signed_duration_since(self.created_at).num_milliseconds())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = ExportJob::new("itinerary", 2.0);

        assert_eq!(job.status, ExportState::Idle);
        assert_eq!(job.file_name(), "itinerary.pdf");
        assert!(job.error.is_none());
        assert!(job.processing_duration_ms().is_none());
    }

    #[test]
    fn test_job_state_transitions() {
        let mut job = ExportJob::new("itinerary", 2.0);

        job.start_capture();
        assert_eq!(job.status, ExportState::Capturing);

        job.start_assembly(1200, 800);
        assert_eq!(job.status, ExportState::Assembling);
        assert_eq!(job.pixel_width, Some(1200));

        job.mark_saved("/tmp/itinerary.pdf".to_string(), 3);
        assert_eq!(job.status, ExportState::Saved);
        assert_eq!(job.link_count, 3);
        assert!(job.processing_duration_ms().is_some());
    }

    #[test]
    fn test_failed_job_keeps_error() {
        let mut job = ExportJob::new("itinerary", 2.0);
        job.start_capture();
        job.mark_failed("Capture failed: tainted".to_string());

        assert_eq!(job.status, ExportState::Failed);
        assert_eq!(job.error.as_deref(), Some("Capture failed: tainted"));
        assert!(job.output_path.is_none());
    }

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ExportState::Assembling).unwrap(), "\"assembling\"");
        assert_eq!(ExportState::Saved.to_string(), "saved");
    }
}
