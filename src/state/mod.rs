//! Device state synchronization
//!
//! The session's receive path is the only writer of the tree; consumers read
//! it through [`StateReader`] snapshots or follow [`ChangedPaths`]
//! notifications.

pub mod engine;
pub mod path;
pub mod tree;

pub use self::engine::apply;
pub use self::path::{ChangedPaths, PathSegment, StatePath};
pub use self::tree::*;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared handle on a session's state tree
#[derive(Debug, Clone, Default)]
pub struct StateReader {
    inner: Arc<RwLock<DeviceState>>,
}

impl StateReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clones the whole tree under a short read lock
    pub fn snapshot(&self) -> DeviceState {
        self.read().clone()
    }

    /// Runs `f` against the current tree without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&DeviceState) -> R) -> R {
        f(&self.read())
    }

    fn read(&self) -> RwLockReadGuard<'_, DeviceState> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, DeviceState> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::commands::{Command, ProgramInput, Topology};

    #[test]
    fn test_reader_sees_writes() {
        let reader = StateReader::new();
        let writer = reader.clone();
        {
            let mut state = writer.write();
            state.apply(&Command::from(Topology {
                mix_effects: 1,
                ..Topology::default()
            }));
            state.apply(&ProgramInput { mix_effect: 0, source: 4 }.into());
        }
        assert_eq!(reader.snapshot().video.mix_effects[&0].program_input, 4);
        assert_eq!(reader.with(|s| s.video.mix_effects.len()), 1);

        writer.write().clear();
        assert!(reader.snapshot().video.mix_effects.is_empty());
    }
}
