//! Broker task rows and their state machine.

use serde::Serialize;
use sqlx::FromRow;

use simgate_core::types::{JobId, Timestamp};

/// Task state ID as stored in the `tasks.state` SMALLINT column.
pub type StateId = i16;

/// Lifecycle of a queued task.
///
/// Discriminants match the values stored in the `state` column.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Enqueued, not yet claimed by a worker.
    Pending = 1,
    /// Claimed and executing.
    Running = 2,
    /// Terminal; an envelope exists in the result store.
    Done = 3,
    /// Terminal; the worker infrastructure failed with no envelope.
    WorkerFailure = 4,
    /// Terminal; revoked before any worker claimed it.
    Revoked = 5,
}

impl TaskState {
    /// Return the database state ID.
    pub fn id(self) -> StateId {
        self as StateId
    }

    /// Map a database state ID back to the enum.
    pub fn from_id(id: StateId) -> Option<Self> {
        match id {
            1 => Some(TaskState::Pending),
            2 => Some(TaskState::Running),
            3 => Some(TaskState::Done),
            4 => Some(TaskState::WorkerFailure),
            5 => Some(TaskState::Revoked),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Done | TaskState::WorkerFailure | TaskState::Revoked
        )
    }
}

/// A row from the `tasks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TaskRow {
    pub job_id: JobId,
    pub owner: String,
    pub application: String,
    pub action: String,
    pub queue_name: String,
    pub task_name: String,
    pub kwargs: serde_json::Value,
    pub state: StateId,
    pub failure_reason: Option<String>,
    pub claimed_by: Option<String>,
    pub submitted_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl TaskRow {
    /// Typed view of the `state` column.
    pub fn task_state(&self) -> Option<TaskState> {
        TaskState::from_id(self.state)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_ids_round_trip() {
        for state in [
            TaskState::Pending,
            TaskState::Running,
            TaskState::Done,
            TaskState::WorkerFailure,
            TaskState::Revoked,
        ] {
            assert_eq!(TaskState::from_id(state.id()), Some(state));
        }
    }

    #[test]
    fn unknown_state_id_is_none() {
        assert_eq!(TaskState::from_id(42), None);
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Done.is_terminal());
        assert!(TaskState::WorkerFailure.is_terminal());
        assert!(TaskState::Revoked.is_terminal());
    }
}
