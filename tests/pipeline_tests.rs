// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for graph building and linking

mod common;

use common::FakeEngine;
use vidpipe::config::{
    AccelMode, Codec, CommonParams, DriverType, IoMode, ProcessingPath, SinkType, SourceType,
    StreamParams,
};
use vidpipe::engine::{GraphEngine, StageSettings};
use vidpipe::errors::{BuildError, LinkError};
use vidpipe::pipelines::{BuildRequest, Role, Topology, builder, linker};
use vidpipe::registry::{FilterRegistry, PluginHost};

fn request<'a>(
    common: &'a CommonParams,
    params: &'a StreamParams,
    filters: &'a FilterRegistry,
) -> BuildRequest<'a> {
    let filter = (params.input.path == ProcessingPath::SdxFilter)
        .then(|| filters.iter().find(|f| f.plugin == params.filter.plugin))
        .flatten();
    BuildRequest {
        stream: 0,
        common,
        params,
        filter,
        device: Some("/dev/video0"),
    }
}

fn filtered_stream() -> StreamParams {
    let mut params = StreamParams::default();
    params.input.raw = false;
    params.input.path = ProcessingPath::SdxFilter;
    params.input.io_mode = IoMode::Mmap;
    params.filter.mode = AccelMode::Software;
    params
}

#[test]
fn test_filter_graph_from_raw_file() {
    let engine = FakeEngine::default();
    assert!(engine.has_plugin("sdxfilter2d"));
    let filters = FilterRegistry::discover(&engine);
    let common = CommonParams::default();
    let mut params = filtered_stream();
    params.input.source_type = SourceType::File;
    params.input.uri = Some("/data/frames.yuv".to_string());

    let req = request(&common, &params, &filters);
    let topology = Topology::select(&req).unwrap();
    assert_eq!(topology, Topology::Filter);

    let graph = engine.new_graph("g").unwrap();
    let stages = builder::build(&engine, &graph, &req, topology).unwrap();
    assert!(stages.contains(Role::RawParse));
    assert!(!stages.contains(Role::SourceCaps));
    assert_eq!(
        engine.factories(),
        vec!["filesrc", "rawvideoparse", "fpsdisplaysink", "kmssink", "sdxfilter2d"]
    );
    assert_eq!(
        engine.settings_of("display-0"),
        Some(StageSettings::DisplayWrapper { sync: false })
    );

    linker::link(&engine, topology, &stages).unwrap();
    assert_eq!(
        engine.log().links,
        vec![vec!["src-0", "raw-parse-0", "filter-0", "display-0"]]
    );
}

#[test]
fn test_live_filter_uses_selected_io_mode() {
    let engine = FakeEngine::default();
    let filters = FilterRegistry::discover(&engine);
    let common = CommonParams::default();
    let params = filtered_stream();
    let req = request(&common, &params, &filters);

    let graph = engine.new_graph("g").unwrap();
    builder::build(&engine, &graph, &req, Topology::Filter).unwrap();
    assert_eq!(
        engine.settings_of("src-0"),
        Some(StageSettings::LiveSource {
            device: Some("/dev/video0".to_string()),
            io_mode: IoMode::Mmap,
            num_buffers: None,
        })
    );
    match engine.settings_of("src-caps-0") {
        Some(StageSettings::SourceCaps { any_rate, .. }) => assert!(any_rate),
        other => panic!("unexpected caps settings: {:?}", other),
    }
}

#[test]
fn test_stages_are_created_group_by_group() {
    let engine = FakeEngine::default();
    let filters = FilterRegistry::default();
    let common = CommonParams::default();
    let mut params = StreamParams::default();
    params.input.raw = false;
    params.encode.codec = Codec::Hevc;
    let req = request(&common, &params, &filters);

    let graph = engine.new_graph("g").unwrap();
    builder::build(&engine, &graph, &req, Topology::EncodeDisplay).unwrap();
    assert_eq!(
        engine.factories(),
        vec![
            "v4l2src",
            "capsfilter",
            "queue",
            "fpsdisplaysink",
            "kmssink",
            "omxh265enc",
            "capsfilter",
            "queue",
            "omxh265dec",
        ]
    );
    assert_eq!(
        engine.log().embedded,
        vec![("display-0".to_string(), "video-sink-0".to_string())]
    );
}

#[test]
fn test_missing_encoder_reports_encode_group() {
    let engine = FakeEngine::default();
    engine.faults().missing_factories.insert("omxh264enc".to_string());
    let filters = FilterRegistry::default();
    let common = CommonParams::default();
    let mut params = StreamParams::default();
    params.input.raw = false;
    let req = request(&common, &params, &filters);

    let graph = engine.new_graph("g").unwrap();
    let err = builder::build(&engine, &graph, &req, Topology::EncodeDisplay).unwrap_err();
    assert_eq!(err, BuildError::Encode("omxh264enc (enc-0)".to_string()));
}

#[test]
fn test_display_plane_follows_stream_index() {
    let engine = FakeEngine::default();
    let filters = FilterRegistry::default();
    let common = CommonParams {
        plane_id: 30,
        driver_type: DriverType::HdmiTx,
        ..Default::default()
    };
    let params = StreamParams::default();
    let req = BuildRequest {
        stream: 2,
        ..request(&common, &params, &filters)
    };

    let graph = engine.new_graph("g").unwrap();
    builder::build(&engine, &graph, &req, Topology::Raw).unwrap();
    assert_eq!(
        engine.settings_of("video-sink-2"),
        Some(StageSettings::KmsSink {
            bus_id: "a0070000.v_mix",
            plane_id: Some(32),
        })
    );
}

#[test]
fn test_split_screen_requires_live_raw_or_filtered_input() {
    let filters = FilterRegistry::default();
    let common = CommonParams {
        sink_type: SinkType::SplitScreen,
        ..Default::default()
    };

    let mut params = StreamParams::default();
    params.input.raw = false;
    assert!(matches!(
        Topology::select(&request(&common, &params, &filters)),
        Err(BuildError::Unsupported(_))
    ));

    params.input.raw = true;
    params.input.source_type = SourceType::File;
    assert!(matches!(
        Topology::select(&request(&common, &params, &filters)),
        Err(BuildError::Unsupported(_))
    ));
}

#[test]
fn test_filtered_split_screen_links_both_branches() {
    let engine = FakeEngine::default();
    let filters = FilterRegistry::discover(&engine);
    let common = CommonParams {
        sink_type: SinkType::SplitScreen,
        driver_type: DriverType::HdmiTx,
        ..Default::default()
    };
    let params = filtered_stream();
    let req = request(&common, &params, &filters);
    let topology = Topology::select(&req).unwrap();
    assert_eq!(topology, Topology::Split { filtered: true });

    let graph = engine.new_graph("g").unwrap();
    let stages = builder::build(&engine, &graph, &req, topology).unwrap();
    let linked = linker::link(&engine, topology, &stages).unwrap();
    assert_eq!(linked.pads.len(), 2);

    let links = engine.log().links.clone();
    assert!(links.contains(&vec!["queue-0".to_string(), "filter-0".to_string(), "display-0".to_string()]));
    assert!(links.contains(&vec!["queue2-0".to_string(), "display2-0".to_string()]));
    assert!(links.contains(&vec!["tee-0".to_string(), "queue2-0".to_string()]));
}

#[test]
fn test_failed_branch_releases_acquired_pads() {
    let engine = FakeEngine::default();
    engine.faults().broken_pad = Some("queue2-0".to_string());
    let filters = FilterRegistry::default();
    let common = CommonParams {
        sink_type: SinkType::SplitScreen,
        driver_type: DriverType::HdmiTx,
        ..Default::default()
    };
    let params = StreamParams::default();
    let req = request(&common, &params, &filters);
    let topology = Topology::select(&req).unwrap();

    let graph = engine.new_graph("g").unwrap();
    let stages = builder::build(&engine, &graph, &req, topology).unwrap();
    let err = linker::link(&engine, topology, &stages).err().unwrap();
    assert!(matches!(err, LinkError::RequestPad(_)));

    let log = engine.log();
    assert_eq!(log.released_pads, 1);
    assert!(log.live_pads.is_empty());
}

#[test]
fn test_failed_uri_display_link_leaves_no_pending_link() {
    let engine = FakeEngine::default();
    engine.faults().broken_link = Some("display-0".to_string());
    let filters = FilterRegistry::default();
    let common = CommonParams::default();
    let mut params = StreamParams::default();
    params.input.source_type = SourceType::File;
    params.input.uri = Some("/media/clip.mp4".to_string());
    let req = request(&common, &params, &filters);

    let graph = engine.new_graph("g").unwrap();
    let stages = builder::build(&engine, &graph, &req, Topology::UriDisplay).unwrap();
    let err = linker::link(&engine, Topology::UriDisplay, &stages).err().unwrap();
    assert_eq!(err, LinkError::Failed("Queue -> Display".to_string()));
    assert!(engine.log().live_pending.is_empty());
}

#[test]
fn test_stream_branch_order() {
    let engine = FakeEngine::default();
    let filters = FilterRegistry::default();
    let common = CommonParams {
        sink_type: SinkType::Stream,
        ..Default::default()
    };
    let mut params = StreamParams::default();
    params.input.raw = false;
    let req = request(&common, &params, &filters);

    let graph = engine.new_graph("g").unwrap();
    let stages = builder::build(&engine, &graph, &req, Topology::Stream).unwrap();
    linker::link(&engine, Topology::Stream, &stages).unwrap();
    assert_eq!(
        engine.log().links,
        vec![
            vec!["src-0", "src-caps-0", "enc-0", "enc-caps-0", "tee-0"],
            vec!["mux-0", "rtp-pay-0", "enc-queue-0", "udp-sink-0"],
            vec!["tee-0", "mux-0"],
        ]
    );
    assert_eq!(
        engine.settings_of("mux-0"),
        Some(StageSettings::TsMux { alignment: 7 })
    );
}
