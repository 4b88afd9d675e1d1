//! Protocol buffer messages of the OSM PBF format.
//!
//! Field numbers follow `fileformat.proto` and `osmformat.proto` of the OSM
//! binary format. Only the messages and fields this crate writes are declared.

/// Frame header preceding every [`Blob`].
#[derive(Clone, PartialEq, prost::Message)]
pub struct BlobHeader {
    /// `OSMHeader` or `OSMData`.
    #[prost(string, required, tag = "1")]
    pub r#type: String,
    /// Encoded size of the following blob.
    #[prost(int32, required, tag = "3")]
    pub datasize: i32,
}

/// A possibly compressed block payload.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Blob {
    /// Uncompressed payload.
    #[prost(bytes = "vec", optional, tag = "1")]
    pub raw: Option<Vec<u8>>,
    /// Size of the payload before compression.
    #[prost(int32, optional, tag = "2")]
    pub raw_size: Option<i32>,
    /// zlib-compressed payload.
    #[prost(bytes = "vec", optional, tag = "3")]
    pub zlib_data: Option<Vec<u8>>,
}

/// Payload of the `OSMHeader` blob.
#[derive(Clone, PartialEq, prost::Message)]
pub struct HeaderBlock {
    /// Bounding box of every node in the file.
    #[prost(message, optional, tag = "1")]
    pub bbox: Option<HeaderBBox>,
    /// Features a reader must support.
    #[prost(string, repeated, tag = "4")]
    pub required_features: Vec<String>,
    /// Features a reader may use.
    #[prost(string, repeated, tag = "5")]
    pub optional_features: Vec<String>,
    /// Name of the writing program.
    #[prost(string, optional, tag = "16")]
    pub writingprogram: Option<String>,
}

/// Bounding box in nanodegrees.
#[derive(Clone, PartialEq, prost::Message)]
pub struct HeaderBBox {
    /// Western edge.
    #[prost(sint64, required, tag = "1")]
    pub left: i64,
    /// Eastern edge.
    #[prost(sint64, required, tag = "2")]
    pub right: i64,
    /// Northern edge.
    #[prost(sint64, required, tag = "3")]
    pub top: i64,
    /// Southern edge.
    #[prost(sint64, required, tag = "4")]
    pub bottom: i64,
}

/// Payload of an `OSMData` blob.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PrimitiveBlock {
    /// Strings referenced by index from the groups. Entry 0 is empty.
    #[prost(message, required, tag = "1")]
    pub stringtable: StringTable,
    /// Groups of primitives of one kind.
    #[prost(message, repeated, tag = "2")]
    pub primitivegroup: Vec<PrimitiveGroup>,
    /// Coordinate granularity in nanodegrees.
    #[prost(int32, optional, tag = "17")]
    pub granularity: Option<i32>,
    /// Timestamp granularity in milliseconds.
    #[prost(int32, optional, tag = "18")]
    pub date_granularity: Option<i32>,
    /// Latitude offset in nanodegrees.
    #[prost(int64, optional, tag = "19")]
    pub lat_offset: Option<i64>,
    /// Longitude offset in nanodegrees.
    #[prost(int64, optional, tag = "20")]
    pub lon_offset: Option<i64>,
}

/// Block-local string table.
#[derive(Clone, PartialEq, prost::Message)]
pub struct StringTable {
    /// UTF-8 strings.
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub s: Vec<Vec<u8>>,
}

/// Primitives of a single kind.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PrimitiveGroup {
    /// Delta-coded nodes.
    #[prost(message, optional, tag = "2")]
    pub dense: Option<DenseNodes>,
    /// Ways.
    #[prost(message, repeated, tag = "3")]
    pub ways: Vec<Way>,
    /// Relations.
    #[prost(message, repeated, tag = "4")]
    pub relations: Vec<Relation>,
}

/// Per-element metadata.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Info {
    /// Element version.
    #[prost(int32, optional, tag = "1")]
    pub version: Option<i32>,
}

/// Delta-coded metadata of dense nodes.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DenseInfo {
    /// Element versions (not delta-coded).
    #[prost(int32, repeated, packed = "true", tag = "1")]
    pub version: Vec<i32>,
    /// Timestamps.
    #[prost(sint64, repeated, packed = "true", tag = "2")]
    pub timestamp: Vec<i64>,
    /// Changeset ids.
    #[prost(sint64, repeated, packed = "true", tag = "3")]
    pub changeset: Vec<i64>,
    /// User ids.
    #[prost(sint32, repeated, packed = "true", tag = "4")]
    pub uid: Vec<i32>,
    /// User name string ids.
    #[prost(sint32, repeated, packed = "true", tag = "5")]
    pub user_sid: Vec<i32>,
}

/// Nodes with delta-coded ids and coordinates.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DenseNodes {
    /// Ids.
    #[prost(sint64, repeated, packed = "true", tag = "1")]
    pub id: Vec<i64>,
    /// Metadata.
    #[prost(message, optional, tag = "5")]
    pub denseinfo: Option<DenseInfo>,
    /// Latitudes in granularity units.
    #[prost(sint64, repeated, packed = "true", tag = "8")]
    pub lat: Vec<i64>,
    /// Longitudes in granularity units.
    #[prost(sint64, repeated, packed = "true", tag = "9")]
    pub lon: Vec<i64>,
    /// Key and value string ids per node, each node terminated by 0.
    #[prost(int32, repeated, packed = "true", tag = "10")]
    pub keys_vals: Vec<i32>,
}

/// A way.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Way {
    /// Id.
    #[prost(int64, required, tag = "1")]
    pub id: i64,
    /// Tag key string ids.
    #[prost(uint32, repeated, packed = "true", tag = "2")]
    pub keys: Vec<u32>,
    /// Tag value string ids.
    #[prost(uint32, repeated, packed = "true", tag = "3")]
    pub vals: Vec<u32>,
    /// Metadata.
    #[prost(message, optional, tag = "4")]
    pub info: Option<Info>,
    /// Delta-coded node references.
    #[prost(sint64, repeated, packed = "true", tag = "8")]
    pub refs: Vec<i64>,
}

/// A relation.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Relation {
    /// Id.
    #[prost(int64, required, tag = "1")]
    pub id: i64,
    /// Tag key string ids.
    #[prost(uint32, repeated, packed = "true", tag = "2")]
    pub keys: Vec<u32>,
    /// Tag value string ids.
    #[prost(uint32, repeated, packed = "true", tag = "3")]
    pub vals: Vec<u32>,
    /// Metadata.
    #[prost(message, optional, tag = "4")]
    pub info: Option<Info>,
    /// Role string ids, one per member.
    #[prost(int32, repeated, packed = "true", tag = "8")]
    pub roles_sid: Vec<i32>,
    /// Delta-coded member ids.
    #[prost(sint64, repeated, packed = "true", tag = "9")]
    pub memids: Vec<i64>,
    /// Member kinds: 0 node, 1 way, 2 relation.
    #[prost(int32, repeated, packed = "true", tag = "10")]
    pub types: Vec<i32>,
}
