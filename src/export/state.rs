use crate::foundation::error::SlideReelResult;

/// Lifecycle of one export run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExportState {
    /// No run in progress.
    #[default]
    Idle,
    /// Validating, probing the host and decoding images.
    Preparing,
    /// Producing and capturing frames.
    Rendering,
    /// Waiting for the sink's encoded buffer.
    Finalizing,
    /// The run ended with an error.
    Failed,
}

impl ExportState {
    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ExportState::*;
        matches!(
            (self, next),
            (Idle, Preparing)
                | (Preparing, Rendering)
                | (Rendering, Finalizing)
                | (Finalizing, Idle)
                | (Idle | Preparing | Rendering | Finalizing, Failed)
                | (Failed, Idle)
        )
    }
}

impl std::fmt::Display for ExportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Rendering => "rendering",
            Self::Finalizing => "finalizing",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Progress report handed to the export callback after every captured frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportProgress {
    /// `frames_captured / total_frames`, ending at exactly `1.0`.
    pub fraction: f64,
    /// Frames handed to the sink so far.
    pub frames_captured: u64,
    /// Frames the whole run produces.
    pub total_frames: u64,
    /// Slide the last captured frame belongs to.
    pub slide_index: usize,
}

/// Optional progress callback.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(ExportProgress) + Send);

/// State tracker for a single run; rejects transitions the lifecycle does not allow.
#[derive(Debug)]
pub(crate) struct ExportRun {
    state: ExportState,
    history: Vec<ExportState>,
}

impl ExportRun {
    pub(crate) fn new() -> Self {
        Self {
            state: ExportState::Idle,
            history: vec![ExportState::Idle],
        }
    }

    pub(crate) fn state(&self) -> ExportState {
        self.state
    }

    pub(crate) fn history(&self) -> &[ExportState] {
        &self.history
    }

    pub(crate) fn transition(&mut self, next: ExportState) -> SlideReelResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(
                anyhow::anyhow!("invalid export transition {} -> {}", self.state, next).into(),
            );
        }
        tracing::debug!(from = %self.state, to = %next, "export state");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Mark the run failed, unless it already is.
    pub(crate) fn fail(&mut self) {
        if self.state != ExportState::Failed {
            // Every non-failed state may fail.
            let _ = self.transition(ExportState::Failed);
        }
    }

    /// Return to `Idle` from a terminal state.
    pub(crate) fn settle(&mut self) {
        if matches!(self.state, ExportState::Finalizing | ExportState::Failed) {
            let _ = self.transition(ExportState::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExportState::*;

    #[test]
    fn happy_path_returns_to_idle() {
        let mut run = ExportRun::new();
        run.transition(Preparing).unwrap();
        run.transition(Rendering).unwrap();
        run.transition(Finalizing).unwrap();
        run.settle();
        assert_eq!(run.state(), Idle);
        assert_eq!(
            run.history(),
            &[Idle, Preparing, Rendering, Finalizing, Idle]
        );
    }

    #[test]
    fn failure_from_any_active_state() {
        for stop in [Idle, Preparing, Rendering, Finalizing] {
            let mut run = ExportRun::new();
            for next in [Preparing, Rendering, Finalizing] {
                if run.state() == stop {
                    break;
                }
                run.transition(next).unwrap();
            }
            run.fail();
            run.fail();
            assert_eq!(run.state(), Failed);
            run.settle();
            assert_eq!(run.state(), Idle);
        }
    }

    #[test]
    fn rejects_skipped_states() {
        let mut run = ExportRun::new();
        assert!(run.transition(Rendering).is_err());
        assert!(run.transition(Idle).is_err());
        assert_eq!(run.state(), Idle);
        assert!(!Failed.can_transition_to(Preparing));
        assert!(!Finalizing.can_transition_to(Rendering));
    }
}
