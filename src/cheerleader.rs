// cheerleader.rs — contract with the motivational-message generator.
//
// The generator's heuristics live elsewhere; the core hands it a
// typed, read-only context and tolerates getting nothing back. The
// context is an explicit struct (not a dynamic map) so the boundary
// stays statically checkable.

use crate::coordinator::RunningSnapshot;
use crate::types::UserProfile;

/// Why the coordinator is asking for a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheerTrigger {
    SessionStarted,
    SplitCompleted,
    SessionCompleted,
}

/// Read-only context snapshot, version 1.
#[derive(Clone, Debug)]
pub struct CheerContext {
    pub trigger: CheerTrigger,
    pub snapshot: RunningSnapshot,
    pub profile: UserProfile,
}

/// Message generator seam. `None` is a normal outcome and must not
/// alter session state.
pub trait Cheerleader: Send + Sync {
    fn motivate(&self, context: &CheerContext) -> Option<String>;
}

/// Default collaborator that never speaks.
pub struct SilentCheerleader;

impl Cheerleader for SilentCheerleader {
    fn motivate(&self, _context: &CheerContext) -> Option<String> {
        None
    }
}
