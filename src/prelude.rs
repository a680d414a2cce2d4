pub use super::{
    FetchProcessor, Format, IndexMetadata, IndexOptions, Region, Result, SequenceReader,
};

pub use crate::fai::{SequenceDirectory, SequenceRecord};
pub use crate::gzi::{BgzfWriter, BlockOffsetIndex};
