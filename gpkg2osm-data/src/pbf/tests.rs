use super::proto::{Blob, BlobHeader, HeaderBlock, PrimitiveBlock, PrimitiveGroup};
use super::*;
use flate2::read::ZlibDecoder;
use geo::{LineString, Polygon, line_string, point};
use gpkg2osm_core::{EntitySynthesizer, Feature, GeometryTree, LayerDescriptor, TagMapping};
use rstest::{fixture, rstest};
use std::io::Read;

struct Frame {
    block_type: String,
    payload: Vec<u8>,
}

fn frames(mut bytes: &[u8]) -> Vec<Frame> {
    let mut found = Vec::new();
    while !bytes.is_empty() {
        let (length, rest) = bytes.split_at(4);
        let length = u32::from_be_bytes(length.try_into().expect("four bytes"));
        let (header, rest) = rest.split_at(usize::try_from(length).expect("header length"));
        let header = BlobHeader::decode(header).expect("blob header decodes");
        let (blob, rest) = rest.split_at(usize::try_from(header.datasize).expect("blob size"));
        let blob = Blob::decode(blob).expect("blob decodes");

        let mut payload = Vec::new();
        ZlibDecoder::new(blob.zlib_data.as_deref().expect("zlib payload"))
            .read_to_end(&mut payload)
            .expect("payload inflates");
        assert_eq!(blob.raw_size, Some(i32::try_from(payload.len()).expect("size")));
        found.push(Frame {
            block_type: header.r#type,
            payload,
        });
        bytes = rest;
    }
    found
}

fn running_sum(deltas: &[i64]) -> Vec<i64> {
    deltas
        .iter()
        .scan(0, |total, delta| {
            *total += delta;
            Some(*total)
        })
        .collect()
}

fn lookup(block: &PrimitiveBlock, index: u32) -> &str {
    let entry = block
        .stringtable
        .s
        .get(usize::try_from(index).expect("index"))
        .expect("string exists");
    std::str::from_utf8(entry).expect("utf-8 string")
}

fn only_group(block: &PrimitiveBlock) -> &PrimitiveGroup {
    assert_eq!(block.primitivegroup.len(), 1);
    block.primitivegroup.first().expect("one group")
}

fn data_block(frame: &Frame) -> PrimitiveBlock {
    assert_eq!(frame.block_type, "OSMData");
    PrimitiveBlock::decode(frame.payload.as_slice()).expect("primitive block decodes")
}

fn triangle(x: f64, size: f64) -> LineString<f64> {
    LineString::from(vec![(x, x), (x + size, x), (x + size, x + size), (x, x)])
}

#[fixture]
fn graph() -> OsmGraph {
    let layer = LayerDescriptor::new("l", "geom", "GEOMETRY", 4326).with_json_tags(true);
    let mut synth = EntitySynthesizer::new();
    let features = [
        Feature::new(
            &layer,
            TagMapping::from([("name".to_owned(), "Brandenburger Tor".into())]),
            GeometryTree::Point(point!(x: 13.377_704, y: 52.516_275)),
        ),
        Feature::new(
            &layer,
            TagMapping::from([("highway".to_owned(), "path".into())]),
            GeometryTree::LineString(line_string![(x: 0.0, y: 0.0), (x: -1.5, y: -2.5)]),
        ),
        Feature::new(
            &layer,
            TagMapping::from([("landuse".to_owned(), "grass".into())]),
            GeometryTree::Polygon(Polygon::new(triangle(0.0, 10.0), vec![triangle(1.0, 1.0)])),
        ),
    ];
    for feature in &features {
        synth.synthesize(feature).expect("synthesis succeeds");
    }
    synth.into_graph()
}

fn render(graph: &OsmGraph, per_block: usize) -> Vec<Frame> {
    let mut sink = PbfSink::new(Vec::new()).with_entities_per_block(per_block);
    sink.write_graph(graph).expect("write succeeds");
    frames(&sink.into_inner())
}

#[rstest]
fn header_advertises_features_and_bounds(graph: OsmGraph) {
    let frames = render(&graph, ENTITIES_PER_BLOCK);
    let first = frames.first().expect("header frame");
    assert_eq!(first.block_type, "OSMHeader");

    let header = HeaderBlock::decode(first.payload.as_slice()).expect("header decodes");
    assert_eq!(header.required_features, ["OsmSchema-V0.6", "DenseNodes"]);
    assert_eq!(header.writingprogram.as_deref(), Some(GENERATOR));
    let bbox = header.bbox.expect("bounding box");
    assert_eq!(bbox.left, -1_500_000_000);
    assert_eq!(bbox.right, 13_377_704_000);
    assert_eq!(bbox.top, 52_516_275_000);
    assert_eq!(bbox.bottom, -2_500_000_000);
}

#[rstest]
fn one_data_block_per_kind(graph: OsmGraph) {
    let kinds: Vec<String> = render(&graph, ENTITIES_PER_BLOCK)
        .into_iter()
        .map(|frame| frame.block_type)
        .collect();
    assert_eq!(kinds, ["OSMHeader", "OSMData", "OSMData", "OSMData"]);
}

#[rstest]
fn dense_nodes_carry_ids_positions_and_tags(graph: OsmGraph) {
    let frames = render(&graph, ENTITIES_PER_BLOCK);
    let block = data_block(frames.get(1).expect("node frame"));
    assert_eq!(block.granularity, Some(100));
    let dense = only_group(&block).dense.as_ref().expect("dense nodes");

    assert_eq!(running_sum(&dense.id), (1..=8).collect::<Vec<_>>());
    let lats = running_sum(&dense.lat);
    let lons = running_sum(&dense.lon);
    assert_eq!(lats.first(), Some(&525_162_750));
    assert_eq!(lons.first(), Some(&133_777_040));
    assert_eq!(lons.get(2), Some(&-15_000_000));
    assert_eq!(dense.denseinfo.as_ref().map(|info| info.version.len()), Some(8));

    let (tagged, bare) = dense.keys_vals.split_at(3);
    assert_eq!(lookup(&block, tagged[0].cast_unsigned()), "name");
    assert_eq!(lookup(&block, tagged[1].cast_unsigned()), "Brandenburger Tor");
    assert_eq!(tagged[2], 0);
    assert_eq!(bare, [0; 7]);
}

#[rstest]
fn ways_delta_code_their_references(graph: OsmGraph) {
    let frames = render(&graph, ENTITIES_PER_BLOCK);
    let block = data_block(frames.get(2).expect("way frame"));
    let ways = &only_group(&block).ways;

    assert_eq!(ways.iter().map(|way| way.id).collect::<Vec<_>>(), [1, 2, 3]);
    let path = ways.first().expect("path way");
    assert_eq!(running_sum(&path.refs), [2, 3]);
    assert_eq!(lookup(&block, path.keys[0]), "highway");
    assert_eq!(lookup(&block, path.vals[0]), "path");

    let outer = ways.get(1).expect("outer ring");
    assert_eq!(running_sum(&outer.refs), [2, 4, 5, 2]);
    assert!(outer.keys.is_empty());
}

#[rstest]
fn relations_list_typed_members_with_roles(graph: OsmGraph) {
    let frames = render(&graph, ENTITIES_PER_BLOCK);
    let block = data_block(frames.get(3).expect("relation frame"));
    let relation = only_group(&block).relations.first().expect("multipolygon");

    assert_eq!(relation.id, 1);
    assert_eq!(running_sum(&relation.memids), [2, 3]);
    assert_eq!(relation.types, [1, 1]);
    let roles: Vec<&str> = relation
        .roles_sid
        .iter()
        .map(|sid| lookup(&block, sid.cast_unsigned()))
        .collect();
    assert_eq!(roles, ["outer", "inner"]);

    let tags: Vec<(&str, &str)> = relation
        .keys
        .iter()
        .zip(&relation.vals)
        .map(|(key, value)| (lookup(&block, *key), lookup(&block, *value)))
        .collect();
    assert_eq!(tags, [("landuse", "grass"), ("type", "multipolygon")]);
}

#[rstest]
fn large_kinds_split_across_blocks(graph: OsmGraph) {
    let frames = render(&graph, 3);
    assert_eq!(frames.len(), 1 + 3 + 1 + 1);
    let ids: Vec<i64> = frames
        .get(1..4)
        .expect("node frames")
        .iter()
        .flat_map(|frame| {
            let block = data_block(frame);
            let dense = only_group(&block).dense.clone().expect("dense nodes");
            running_sum(&dense.id)
        })
        .collect();
    assert_eq!(ids, (1..=8).collect::<Vec<_>>());
}

#[rstest]
fn empty_graph_writes_only_the_header() {
    let frames = render(&OsmGraph::default(), ENTITIES_PER_BLOCK);
    assert_eq!(frames.len(), 1);
    let header = HeaderBlock::decode(frames[0].payload.as_slice()).expect("header decodes");
    assert!(header.bbox.is_none());
}

#[rstest]
fn ids_beyond_the_signed_range_are_rejected() {
    assert!(matches!(
        signed_id(ElementKind::Way, u64::MAX),
        Err(PbfSinkError::IdOutOfRange {
            kind: ElementKind::Way,
            ..
        })
    ));
    assert_eq!(signed_id(ElementKind::Node, 42).ok(), Some(42));
}

#[rstest]
fn strings_are_interned_once() {
    let mut strings = StringTableBuilder::new();
    let first = strings.intern("highway").expect("interned");
    assert_eq!(strings.intern("highway").expect("interned"), first);
    assert_eq!(first, 1);
    assert_eq!(strings.finish().s.first().map(Vec::len), Some(0));
}
