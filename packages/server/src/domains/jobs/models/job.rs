use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::JobId;
use crate::domains::jobs::models::photo::PhotoFields;
use crate::domains::jobs::photo_types::{required_types_for_sector, PhotoType};

/// Lifecycle shared by jobs and sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    Pending,
    InProgress,
    Done,
}

pub type JobStatus = ProgressStatus;
pub type SectorStatus = ProgressStatus;

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }

    /// Pending and in-progress jobs accept worker activity.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Done)
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "DONE" => Ok(Self::Done),
            other => Err(anyhow!("unknown progress status: {}", other)),
        }
    }
}

/// Progress of one sector, embedded in its job and keyed by `sector`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorProgress {
    pub sector: i32,
    pub required_types: Vec<PhotoType>,
    /// Cursor into `required_types`; `0 <= current_index <= required_types.len()`.
    pub current_index: usize,
    pub status: SectorStatus,
}

impl SectorProgress {
    /// A fresh sector with its checklist derived from the sector number.
    pub fn new(sector: i32) -> Self {
        Self::with_types(sector, required_types_for_sector(sector))
    }

    pub fn with_types(sector: i32, required_types: Vec<PhotoType>) -> Self {
        Self {
            sector,
            required_types,
            current_index: 0,
            status: SectorStatus::Pending,
        }
    }

    /// Type at the cursor, or `None` once the checklist is exhausted.
    pub fn expected_type(&self) -> Option<&PhotoType> {
        self.required_types.get(self.current_index)
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.required_types.len()
    }

    /// Done either by flag or because the cursor ran off the end; the flag
    /// may lag behind the cursor between two writes.
    pub fn is_done(&self) -> bool {
        self.status == SectorStatus::Done || self.is_exhausted()
    }

    /// Status implied by the cursor after an advance.
    pub fn derived_status(&self) -> SectorStatus {
        if self.is_exhausted() {
            SectorStatus::Done
        } else {
            SectorStatus::InProgress
        }
    }
}

/// Job-level copies of values extracted from passing photos.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRollup {
    pub mac_id: Option<String>,
    pub rsn_id: Option<String>,
    pub azimuth_deg: Option<f64>,
}

impl JobRollup {
    /// Non-empty extracted fields, or `None` when there is nothing to copy up.
    pub fn from_fields(fields: &PhotoFields) -> Option<Self> {
        let non_blank = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();
        let rollup = Self {
            mac_id: non_blank(&fields.mac_id),
            rsn_id: non_blank(&fields.rsn),
            azimuth_deg: fields.azimuth_deg,
        };
        if rollup.is_empty() {
            None
        } else {
            Some(rollup)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mac_id.is_none() && self.rsn_id.is_none() && self.azimuth_deg.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    /// Normalized (digits-only) worker phone.
    pub worker_phone: String,
    pub site_id: String,
    /// Insertion order; sector numbers are unique within a job.
    pub sectors: Vec<SectorProgress>,
    pub status: JobStatus,
    pub mac_id: Option<String>,
    pub rsn_id: Option<String>,
    pub azimuth_deg: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// A new `PENDING` job with a single sector.
    pub fn new(worker_phone: impl Into<String>, site_id: impl Into<String>, first_sector: SectorProgress) -> Self {
        Self {
            id: JobId::new(),
            worker_phone: worker_phone.into(),
            site_id: site_id.into(),
            sectors: vec![first_sector],
            status: JobStatus::Pending,
            mac_id: None,
            rsn_id: None,
            azimuth_deg: None,
            created_at: Utc::now(),
        }
    }

    pub fn sector(&self, sector: i32) -> Option<&SectorProgress> {
        self.sectors.iter().find(|s| s.sector == sector)
    }

    pub fn has_sector(&self, sector: i32) -> bool {
        self.sector(sector).is_some()
    }

    pub fn apply_rollup(&mut self, rollup: &JobRollup) {
        if let Some(mac) = &rollup.mac_id {
            self.mac_id = Some(mac.clone());
        }
        if let Some(rsn) = &rollup.rsn_id {
            self.rsn_id = Some(rsn.clone());
        }
        if let Some(az) = rollup.azimuth_deg {
            self.azimuth_deg = Some(az);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sector_starts_pending_at_zero() {
        let s = SectorProgress::new(1);
        assert_eq!(s.current_index, 0);
        assert_eq!(s.status, SectorStatus::Pending);
        assert_eq!(s.expected_type(), Some(&PhotoType::labelling()));
        assert!(!s.is_done());
    }

    #[test]
    fn exhausted_cursor_counts_as_done_even_if_flag_lags() {
        let mut s = SectorProgress::with_types(1, vec![PhotoType::labelling()]);
        s.current_index = 1;
        s.status = SectorStatus::InProgress;
        assert!(s.is_exhausted());
        assert!(s.is_done());
        assert_eq!(s.expected_type(), None);
        assert_eq!(s.derived_status(), SectorStatus::Done);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [JobStatus::Pending, JobStatus::InProgress, JobStatus::Done] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&JobStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
    }

    #[test]
    fn rollup_skips_blank_values() {
        let fields = PhotoFields {
            mac_id: Some("  ".to_string()),
            rsn: Some("RSN-7".to_string()),
            ..Default::default()
        };
        let rollup = JobRollup::from_fields(&fields).unwrap();
        assert_eq!(rollup.mac_id, None);
        assert_eq!(rollup.rsn_id.as_deref(), Some("RSN-7"));

        assert!(JobRollup::from_fields(&PhotoFields::default()).is_none());
    }

    #[test]
    fn rollup_is_last_write_wins() {
        let mut job = Job::new("9999", "S1", SectorProgress::new(1));
        job.apply_rollup(&JobRollup {
            mac_id: Some("AA".to_string()),
            rsn_id: None,
            azimuth_deg: Some(10.0),
        });
        job.apply_rollup(&JobRollup {
            mac_id: Some("BB".to_string()),
            rsn_id: None,
            azimuth_deg: None,
        });
        assert_eq!(job.mac_id.as_deref(), Some("BB"));
        assert_eq!(job.azimuth_deg, Some(10.0));
    }
}
