mod block;
mod container;
mod reader;

pub mod codec;
pub mod header;
pub mod index;
pub mod storage;

pub use block::ReadStats;
pub use codec::Codec;
pub use container::*;
pub use header::Header;
pub use index::{BlockBounds, BlockIndex};
pub use reader::ContainerReader;
pub use storage::{ReadAt, SharedReader};
