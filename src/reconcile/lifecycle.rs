use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    BeginCreate,
    /// A Read observed the entity in its target state.
    Confirmed,
    /// A Read found an entity nobody created in this run.
    Imported,
    BeginUpdate,
    BeginDelete,
    /// A Read reported the entity absent.
    Gone,
    /// The mutating call failed; fall back to the last known state.
    Failed,
}

impl LifecycleState {
    pub fn transition(self, event: LifecycleEvent, id: &str) -> Result<Self> {
        use LifecycleEvent as E;
        use LifecycleState as S;

        let next = match (self, event) {
            (S::Absent, E::BeginCreate) => S::Creating,
            (S::Creating, E::Confirmed) => S::Present,
            (S::Creating, E::Failed) => S::Absent,
            (S::Absent | S::Present, E::Imported) => S::Present,
            (S::Present, E::BeginUpdate) => S::Updating,
            (S::Updating, E::Confirmed) => S::Present,
            (S::Updating, E::Failed) => S::Present,
            (S::Present | S::Absent, E::BeginDelete) => S::Deleting,
            (S::Deleting, E::Failed) => S::Present,
            (S::Deleting | S::Present | S::Absent, E::Gone) => S::Absent,
            (from, event) => {
                return Err(ReconcileError::Lifecycle {
                    id: id.to_string(),
                    from,
                    event,
                });
            }
        };

        tracing::trace!(id, ?self, ?event, ?next, "lifecycle transition");
        Ok(next)
    }

    pub fn is_present(self) -> bool {
        self == Self::Present
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent as E;
    use LifecycleState as S;

    #[test]
    fn test_full_lifecycle() {
        let state = S::Absent
            .transition(E::BeginCreate, "b")
            .and_then(|s| s.transition(E::Confirmed, "b"))
            .and_then(|s| s.transition(E::BeginUpdate, "b"))
            .and_then(|s| s.transition(E::Confirmed, "b"))
            .and_then(|s| s.transition(E::BeginDelete, "b"))
            .and_then(|s| s.transition(E::Gone, "b"))
            .unwrap();
        assert_eq!(state, S::Absent);
    }

    #[test]
    fn test_import_reaches_present() {
        assert!(S::Absent.transition(E::Imported, "b").unwrap().is_present());
    }

    #[test]
    fn test_delete_of_absent_entity_is_allowed() {
        let state = S::Absent
            .transition(E::BeginDelete, "b")
            .and_then(|s| s.transition(E::Gone, "b"))
            .unwrap();
        assert_eq!(state, S::Absent);
    }

    #[test]
    fn test_failures_fall_back() {
        assert_eq!(S::Creating.transition(E::Failed, "b").unwrap(), S::Absent);
        assert_eq!(S::Updating.transition(E::Failed, "b").unwrap(), S::Present);
        assert_eq!(S::Deleting.transition(E::Failed, "b").unwrap(), S::Present);
    }

    #[test]
    fn test_illegal_transition() {
        let err = S::Absent.transition(E::BeginUpdate, "tf-bucket").unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Lifecycle {
                from: S::Absent,
                event: E::BeginUpdate,
                ..
            }
        ));
        assert!(err.to_string().contains("tf-bucket"));
    }
}
