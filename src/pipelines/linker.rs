// SPDX-License-Identifier: GPL-3.0-only

//! Stage linking per topology

use super::builder::Topology;
use super::stages::{Role, StageSet};
use crate::engine::GraphEngine;
use crate::errors::LinkError;
use tracing::{debug, error};

/// Resources acquired while linking; released by the playback teardown
pub struct Linked<E: GraphEngine> {
    /// Tee request pads as (tee, pad)
    pub pads: Vec<(E::Stage, E::Pad)>,
    /// Deferred ingestion link as (source, continuation)
    pub pending: Option<(E::Stage, E::Pending)>,
}

impl<E: GraphEngine> Default for Linked<E> {
    fn default() -> Self {
        Self {
            pads: Vec::new(),
            pending: None,
        }
    }
}

fn describe(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn chain<E: GraphEngine>(
    engine: &E,
    stages: &StageSet<E::Stage>,
    roles: &[Role],
) -> Result<(), LinkError> {
    let chain = roles
        .iter()
        .map(|r| stages.require(*r))
        .collect::<Result<Vec<_>, _>>()?;
    engine.link_chain(&chain).map_err(|e| {
        error!(chain = %describe(roles), error = %e, "Linking failed");
        LinkError::Failed(describe(roles))
    })?;
    debug!(chain = %describe(roles), "Linked");
    Ok(())
}

fn branch<E: GraphEngine>(
    engine: &E,
    stages: &StageSet<E::Stage>,
    linked: &mut Linked<E>,
    downstream: Role,
) -> Result<(), LinkError> {
    let tee = stages.require(Role::Tee)?;
    let target = stages.require(downstream)?;
    let pad = engine
        .link_request_pad(tee, target)
        .map_err(|e| LinkError::RequestPad(format!("Tee -> {}: {}", downstream, e)))?;
    linked.pads.push((tee.clone(), pad));
    Ok(())
}

fn link_all<E: GraphEngine>(
    engine: &E,
    topology: Topology,
    stages: &StageSet<E::Stage>,
    linked: &mut Linked<E>,
) -> Result<(), LinkError> {
    use Role::*;

    match topology {
        Topology::Raw => chain(engine, stages, &[Source, SourceCaps, Display]),
        Topology::UriDisplay => {
            chain(engine, stages, &[Queue, Display])?;
            let source = stages.require(Source)?;
            let queue = stages.require(Queue)?;
            let pending = engine.link_on_video_pad(source, queue);
            linked.pending = Some((source.clone(), pending));
            debug!("Source -> Queue deferred until a video pad appears");
            Ok(())
        }
        Topology::Filter => {
            let ingest = if stages.contains(RawParse) { RawParse } else { SourceCaps };
            chain(engine, stages, &[Source, ingest, Filter, Display])
        }
        Topology::EncodeDisplay => chain(
            engine,
            stages,
            &[Source, SourceCaps, Encoder, EncodedCaps, EncodeQueue, Decoder, Queue, Display],
        ),
        Topology::Record => chain(
            engine,
            stages,
            &[Source, SourceCaps, Encoder, EncodeQueue, EncodedCaps, Parser, Mux, FileSink],
        ),
        Topology::Stream => {
            chain(engine, stages, &[Source, SourceCaps, Encoder, EncodedCaps, Tee])?;
            chain(engine, stages, &[Mux, RtpPay, EncodeQueue, UdpSink])?;
            branch(engine, stages, linked, Mux)
        }
        Topology::Split { filtered } => {
            chain(engine, stages, &[Source, SourceCaps, Tee])?;
            if filtered {
                chain(engine, stages, &[Queue, Filter, Display])?;
            } else {
                chain(engine, stages, &[Queue, Display])?;
            }
            chain(engine, stages, &[Queue2, Display2])?;
            branch(engine, stages, linked, Queue)?;
            branch(engine, stages, linked, Queue2)
        }
    }
}

/// Connect the stages of one stream in the order `topology` prescribes.
///
/// On failure every pad and deferred link acquired so far is handed back
/// to the engine before the error is returned.
pub fn link<E: GraphEngine>(
    engine: &E,
    topology: Topology,
    stages: &StageSet<E::Stage>,
) -> Result<Linked<E>, LinkError> {
    let mut linked = Linked::default();
    if let Err(e) = link_all(engine, topology, stages, &mut linked) {
        for (tee, pad) in linked.pads.drain(..) {
            engine.release_request_pad(&tee, pad);
        }
        if let Some((source, pending)) = linked.pending.take() {
            engine.cancel_pending(&source, pending);
        }
        return Err(e);
    }
    Ok(linked)
}
