// SPDX-License-Identifier: GPL-3.0-only

//! Stage arena of one stream

use crate::errors::LinkError;
use std::fmt;

/// Position a stage plays in the stream graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Source,
    SourceCaps,
    RawParse,
    Queue,
    Queue2,
    Tee,
    Filter,
    Encoder,
    EncodedCaps,
    EncodeQueue,
    Decoder,
    Parser,
    Mux,
    RtpPay,
    Display,
    DisplaySink,
    Display2,
    DisplaySink2,
    FileSink,
    UdpSink,
}

impl Role {
    /// Element name inside the graph, suffixed with the stream index
    pub fn stage_name(&self, stream: usize) -> String {
        let base = match self {
            Role::Source => "src",
            Role::SourceCaps => "src-caps",
            Role::RawParse => "raw-parse",
            Role::Queue => "queue",
            Role::Queue2 => "queue2",
            Role::Tee => "tee",
            Role::Filter => "filter",
            Role::Encoder => "enc",
            Role::EncodedCaps => "enc-caps",
            Role::EncodeQueue => "enc-queue",
            Role::Decoder => "dec",
            Role::Parser => "parser",
            Role::Mux => "mux",
            Role::RtpPay => "rtp-pay",
            Role::Display => "display",
            Role::DisplaySink => "video-sink",
            Role::Display2 => "display2",
            Role::DisplaySink2 => "video-sink2",
            Role::FileSink => "file-sink",
            Role::UdpSink => "udp-sink",
        };
        format!("{}-{}", base, stream)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Stages created for one build, keyed by role.
///
/// Owned by the playback state; dropping the set drops every handle.
#[derive(Debug, Clone)]
pub struct StageSet<S> {
    entries: Vec<(Role, S)>,
}

impl<S> Default for StageSet<S> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<S> StageSet<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any stage already holding `role`
    pub fn insert(&mut self, role: Role, stage: S) {
        match self.entries.iter_mut().find(|(r, _)| *r == role) {
            Some(slot) => slot.1 = stage,
            None => self.entries.push((role, stage)),
        }
    }

    pub fn get(&self, role: Role) -> Option<&S> {
        self.entries.iter().find(|(r, _)| *r == role).map(|(_, s)| s)
    }

    /// Lookup for the linker; a missing role means the build and the
    /// topology disagree
    pub fn require(&self, role: Role) -> Result<&S, LinkError> {
        self.get(role)
            .ok_or_else(|| LinkError::Failed(format!("{} stage was not built", role)))
    }

    pub fn contains(&self, role: Role) -> bool {
        self.get(role).is_some()
    }

    /// Roles in creation order
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.entries.iter().map(|(r, _)| *r)
    }

    pub fn stages(&self) -> impl Iterator<Item = &S> {
        self.entries.iter().map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_creation_order_and_replaces() {
        let mut set = StageSet::new();
        set.insert(Role::Source, "a");
        set.insert(Role::Queue, "b");
        set.insert(Role::Source, "c");
        assert_eq!(set.roles().collect::<Vec<_>>(), vec![Role::Source, Role::Queue]);
        assert_eq!(set.get(Role::Source), Some(&"c"));
        assert!(set.require(Role::Tee).is_err());
    }

    #[test]
    fn stage_names_carry_stream_index() {
        assert_eq!(Role::EncodeQueue.stage_name(2), "enc-queue-2");
    }
}
