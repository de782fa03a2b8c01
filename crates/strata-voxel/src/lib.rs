//! Voxel world data model: nodes, content definitions, chunks and their
//! persisted form, plus the multi-chunk edit buffer used by generation.

pub mod area;
pub mod buffer;
pub mod chunk;
pub mod content;
pub mod events;
pub mod metadata;
pub mod node;
pub mod pos;
pub mod serialize;
pub mod table;

pub use area::VoxelArea;
pub use buffer::{VOXELFLAG_INEXISTENT, VOXELFLAG_NOT_LOADED, VoxelBuffer};
pub use chunk::{Chunk, ModState};
pub use content::{ContentFeatures, ContentRegistry, LiquidType, RegistryError};
pub use events::{
    EditContext, EventDispatcher, MapEditEvent, MapEditKind, MapEventSink, RecordingSink,
    SinkError,
};
pub use metadata::{NodeMetadata, NodeMetadataList, NodeTimer, NodeTimerList};
pub use node::{
    ContentId, LIGHT_MAX, LIQUID_FLOW_DOWN_MASK, LIQUID_LEVEL_MASK, LIQUID_LEVEL_MAX,
    LIQUID_LEVEL_SOURCE, LightBank, Node, diminish_light, undiminish_light,
};
pub use pos::{CHUNK_SIZE, CHUNK_VOLUME, ChunkPos, LocalPos, NEIGHBORS_6, NodePos, SectorPos};
pub use serialize::{
    SER_FMT_VER_HIGHEST, SER_FMT_VER_LOWEST_READ, SerializationError, deserialize_chunk,
    serialize_chunk,
};
pub use table::{ChunkTable, ModifiedChunks, NodeGrid};
