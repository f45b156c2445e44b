//! Lifecycle of table and engine checkpoints.
//!
//! Statuses are persisted as small integers. Every reached phase has a code
//! above [`ERROR_THRESHOLD`] and a failure code (the phase code divided by
//! ten) at or below it, so a single comparison selects every failed row no
//! matter which phase it failed in.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

/// Highest persisted code that still denotes a failed (or missing) status.
pub const ERROR_THRESHOLD: u8 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckpointPhase {
    Loaded,
    AllWritten,
    Closed,
    Imported,
    IndexImported,
    AlteredAutoInc,
    ChecksumSkipped,
    Checksummed,
    IndexAdded,
    AnalyzeSkipped,
    Analyzed,
}

impl CheckpointPhase {
    pub const ALL: [CheckpointPhase; 11] = [
        CheckpointPhase::Loaded,
        CheckpointPhase::AllWritten,
        CheckpointPhase::Closed,
        CheckpointPhase::Imported,
        CheckpointPhase::IndexImported,
        CheckpointPhase::AlteredAutoInc,
        CheckpointPhase::ChecksumSkipped,
        CheckpointPhase::Checksummed,
        CheckpointPhase::IndexAdded,
        CheckpointPhase::AnalyzeSkipped,
        CheckpointPhase::Analyzed,
    ];

    pub const fn code(self) -> u8 {
        match self {
            CheckpointPhase::Loaded => 30,
            CheckpointPhase::AllWritten => 60,
            CheckpointPhase::Closed => 90,
            CheckpointPhase::Imported => 120,
            CheckpointPhase::IndexImported => 140,
            CheckpointPhase::AlteredAutoInc => 150,
            CheckpointPhase::ChecksumSkipped => 170,
            CheckpointPhase::Checksummed => 180,
            CheckpointPhase::IndexAdded => 190,
            CheckpointPhase::AnalyzeSkipped => 200,
            CheckpointPhase::Analyzed => 210,
        }
    }

    pub const fn failed_code(self) -> u8 {
        self.code() / 10
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointPhase::Loaded => "loaded",
            CheckpointPhase::AllWritten => "written",
            CheckpointPhase::Closed => "closed",
            CheckpointPhase::Imported => "imported",
            CheckpointPhase::IndexImported => "index_imported",
            CheckpointPhase::AlteredAutoInc => "altered_auto_inc",
            CheckpointPhase::ChecksumSkipped => "checksum_skipped",
            CheckpointPhase::Checksummed => "checksummed",
            CheckpointPhase::IndexAdded => "index_added",
            CheckpointPhase::AnalyzeSkipped => "analyze_skipped",
            CheckpointPhase::Analyzed => "analyzed",
        }
    }
}

impl fmt::Display for CheckpointPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a table or engine checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CheckpointStatus {
    Missing,
    Reached(CheckpointPhase),
    Failed(CheckpointPhase),
}

impl CheckpointStatus {
    pub const LOADED: CheckpointStatus = CheckpointStatus::Reached(CheckpointPhase::Loaded);
    pub const ALL_WRITTEN: CheckpointStatus =
        CheckpointStatus::Reached(CheckpointPhase::AllWritten);
    pub const CLOSED: CheckpointStatus = CheckpointStatus::Reached(CheckpointPhase::Closed);
    pub const IMPORTED: CheckpointStatus = CheckpointStatus::Reached(CheckpointPhase::Imported);

    pub const fn code(self) -> u8 {
        match self {
            CheckpointStatus::Missing => 0,
            CheckpointStatus::Reached(phase) => phase.code(),
            CheckpointStatus::Failed(phase) => phase.failed_code(),
        }
    }

    pub fn from_code(code: u8) -> Result<Self, ModelError> {
        if code == 0 {
            return Ok(CheckpointStatus::Missing);
        }
        CheckpointPhase::ALL
            .iter()
            .find_map(|phase| {
                if phase.code() == code {
                    Some(CheckpointStatus::Reached(*phase))
                } else if phase.failed_code() == code {
                    Some(CheckpointStatus::Failed(*phase))
                } else {
                    None
                }
            })
            .ok_or(ModelError::InvalidStatus(code))
    }

    pub fn is_error(self) -> bool {
        matches!(self, CheckpointStatus::Failed(_))
    }

    /// True when recovery tooling treats the persisted code as failed.
    /// Stores filter raw rows with it without decoding them.
    pub fn is_failed_code(code: u8) -> bool {
        code <= ERROR_THRESHOLD
    }

    pub fn phase(self) -> Option<CheckpointPhase> {
        match self {
            CheckpointStatus::Missing => None,
            CheckpointStatus::Reached(phase) | CheckpointStatus::Failed(phase) => Some(phase),
        }
    }

    /// The failure status of the current phase. `Missing` and already-failed
    /// statuses are returned unchanged.
    pub fn into_failed(self) -> Self {
        match self {
            CheckpointStatus::Reached(phase) => CheckpointStatus::Failed(phase),
            other => other,
        }
    }

    /// Whether every phase, including table post-processing, has finished.
    pub fn is_completed(self) -> bool {
        matches!(
            self,
            CheckpointStatus::Reached(CheckpointPhase::AnalyzeSkipped)
                | CheckpointStatus::Reached(CheckpointPhase::Analyzed)
        )
    }

    /// Forward-only movement: a reached status may advance to a later phase
    /// or fail in its own phase. Failed statuses only leave through the
    /// recovery operations, which bypass this check.
    pub fn can_transition_to(self, next: CheckpointStatus) -> bool {
        match (self, next) {
            (_, CheckpointStatus::Missing) => false,
            (CheckpointStatus::Missing, _) => true,
            (CheckpointStatus::Reached(cur), CheckpointStatus::Reached(nxt)) => nxt >= cur,
            (CheckpointStatus::Reached(cur), CheckpointStatus::Failed(nxt)) => nxt == cur,
            (CheckpointStatus::Failed(_), _) => false,
        }
    }
}

impl Default for CheckpointStatus {
    fn default() -> Self {
        CheckpointStatus::LOADED
    }
}

impl PartialOrd for CheckpointStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CheckpointStatus {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code().cmp(&other.code())
    }
}

impl TryFrom<u8> for CheckpointStatus {
    type Error = ModelError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        CheckpointStatus::from_code(code)
    }
}

impl From<CheckpointStatus> for u8 {
    fn from(status: CheckpointStatus) -> u8 {
        status.code()
    }
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointStatus::Missing => f.write_str("missing"),
            CheckpointStatus::Reached(phase) => write!(f, "{phase}"),
            CheckpointStatus::Failed(phase) => write!(f, "{phase}(failed)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_for_every_phase() {
        for phase in CheckpointPhase::ALL {
            let reached = CheckpointStatus::Reached(phase);
            let failed = CheckpointStatus::Failed(phase);
            assert_eq!(CheckpointStatus::from_code(reached.code()), Ok(reached));
            assert_eq!(CheckpointStatus::from_code(failed.code()), Ok(failed));
        }
        assert_eq!(
            CheckpointStatus::from_code(0),
            Ok(CheckpointStatus::Missing)
        );
    }

    #[test]
    fn threshold_separates_failed_from_reached() {
        for phase in CheckpointPhase::ALL {
            assert!(CheckpointStatus::is_failed_code(phase.failed_code()));
            assert!(CheckpointStatus::Failed(phase).is_error());
            assert!(!CheckpointStatus::is_failed_code(phase.code()));
            assert!(!CheckpointStatus::Reached(phase).is_error());
        }
        assert!(CheckpointStatus::is_failed_code(0));
        assert!(CheckpointStatus::is_failed_code(ERROR_THRESHOLD));
        assert!(!CheckpointStatus::is_failed_code(ERROR_THRESHOLD + 1));
    }

    #[test]
    fn known_codes() {
        assert_eq!(CheckpointStatus::LOADED.code(), 30);
        assert_eq!(CheckpointStatus::ALL_WRITTEN.code(), 60);
        assert_eq!(CheckpointStatus::IMPORTED.code(), 120);
        assert_eq!(CheckpointStatus::IMPORTED.into_failed().code(), 12);
    }

    #[test]
    fn rejects_unknown_codes() {
        assert_eq!(
            CheckpointStatus::from_code(31),
            Err(ModelError::InvalidStatus(31))
        );
        assert!(CheckpointStatus::from_code(255).is_err());
    }

    #[test]
    fn transitions_only_move_forward() {
        let loaded = CheckpointStatus::LOADED;
        let imported = CheckpointStatus::IMPORTED;

        assert!(loaded.can_transition_to(imported));
        assert!(!imported.can_transition_to(loaded));
        assert!(imported.can_transition_to(imported.into_failed()));
        assert!(!loaded.can_transition_to(imported.into_failed()));
        assert!(!imported.into_failed().can_transition_to(imported));
    }

    #[test]
    fn serializes_as_code() {
        let json = serde_json::to_string(&CheckpointStatus::ALL_WRITTEN).unwrap();
        assert_eq!(json, "60");
        let back: CheckpointStatus = serde_json::from_str("6").unwrap();
        assert_eq!(back, CheckpointStatus::Failed(CheckpointPhase::AllWritten));
        assert!(serde_json::from_str::<CheckpointStatus>("7").is_err());
    }
}
