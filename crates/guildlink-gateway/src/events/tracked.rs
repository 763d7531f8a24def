//! Set of dispatch events the shards forward
//!
//! Frames for events outside the set are dropped by the connection before
//! their payload is copied or decoded.

use dashmap::DashSet;
use guildlink_core::EventName;

/// Events forwarded regardless of configuration
///
/// Connected-guild bookkeeping needs READY and the guild create/delete pair;
/// voice events are always forwarded.
pub const ALWAYS_TRACKED: [EventName; 5] = [
    EventName::Ready,
    EventName::GuildCreate,
    EventName::GuildDelete,
    EventName::VoiceStateUpdate,
    EventName::VoiceServerUpdate,
];

/// Concurrent set of tracked event names
#[derive(Debug)]
pub struct TrackedEvents {
    names: DashSet<EventName>,
}

impl TrackedEvents {
    pub fn new() -> Self {
        let names = DashSet::new();
        for name in ALWAYS_TRACKED {
            names.insert(name);
        }
        Self { names }
    }

    /// Returns true when the event was not tracked before
    pub fn track(&self, name: EventName) -> bool {
        self.names.insert(name)
    }

    pub fn track_all(&self, names: impl IntoIterator<Item = EventName>) {
        for name in names {
            self.names.insert(name);
        }
    }

    pub fn is_tracked(&self, name: EventName) -> bool {
        self.names.contains(&name)
    }

    /// Resolve a wire name, returning it only when known and tracked
    pub fn resolve(&self, wire_name: &str) -> Option<EventName> {
        EventName::from_str(wire_name).filter(|name| self.is_tracked(*name))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Tracked names in declaration order
    pub fn names(&self) -> Vec<EventName> {
        let mut names: Vec<_> = self.names.iter().map(|n| *n).collect();
        names.sort_unstable();
        names
    }
}

impl Default for TrackedEvents {
    fn default() -> Self {
        Self::new()
    }
}
