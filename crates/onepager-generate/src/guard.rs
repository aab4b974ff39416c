use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::GenerationError;

/// Lifecycle of the single active run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running { run_id: String },
}

/// Admits one run at a time. Share it (via `Arc`) between every engine that
/// writes to the same place.
#[derive(Debug, Default)]
pub struct RunGuard {
    state: Mutex<RunState>,
}

impl RunGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> RunState {
        self.lock().clone()
    }

    /// Move to `Running`, or fail with `RunInProgress` naming the active run.
    pub fn try_start(self: &Arc<Self>, run_id: &str) -> Result<RunPermit, GenerationError> {
        let mut state = self.lock();
        if let RunState::Running { run_id: active } = &*state {
            return Err(GenerationError::RunInProgress {
                run_id: active.clone(),
            });
        }
        *state = RunState::Running {
            run_id: run_id.to_string(),
        };
        Ok(RunPermit {
            guard: Arc::clone(self),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Held for the lifetime of a run; dropping it returns the guard to `Idle`.
#[derive(Debug)]
pub struct RunPermit {
    guard: Arc<RunGuard>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        *self.guard.lock() = RunState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_start_is_rejected_until_permit_drops() {
        let guard = RunGuard::new();
        let permit = guard.try_start("run-a").expect("first start");
        assert_eq!(
            guard.state(),
            RunState::Running {
                run_id: "run-a".to_string()
            }
        );

        match guard.try_start("run-b") {
            Err(GenerationError::RunInProgress { run_id }) => assert_eq!(run_id, "run-a"),
            other => panic!("expected RunInProgress, got {other:?}"),
        }

        drop(permit);
        assert_eq!(guard.state(), RunState::Idle);
        assert!(guard.try_start("run-b").is_ok());
    }
}
