use crate::error::PresaleError;
use serde::{Deserialize, Serialize};

/// Presale-wide pause and finalization flags.
///
/// Finalization is one-way: it forces the paused flag on and pins it
/// there. Pause checks after finalization report `PresaleFinalised`
/// rather than `PresalePaused` so callers see the stronger condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LifecycleState {
    pub paused: bool,
    pub finalized: bool,
}

impl LifecycleState {
    /// Purchase-recording gate: finalization dominates the pause flag.
    pub fn ensure_recording_open(&self) -> Result<(), PresaleError> {
        if self.finalized {
            return Err(PresaleError::PresaleFinalised);
        }
        if self.paused {
            return Err(PresaleError::PresalePaused);
        }
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), PresaleError> {
        if self.finalized {
            return Err(PresaleError::PresaleFinalised);
        }
        self.paused = true;
        Ok(())
    }

    pub fn unpause(&mut self) -> Result<(), PresaleError> {
        if self.finalized {
            return Err(PresaleError::PresaleFinalised);
        }
        self.paused = false;
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<(), PresaleError> {
        if self.finalized {
            return Err(PresaleError::PresaleFinalised);
        }
        self.finalized = true;
        self.paused = true;
        Ok(())
    }
}
