mod archive;
mod converter;
pub mod ingest_log;
pub mod router;

pub use archive::{ArchiveEntry, ArchiveError, ExportArchive};
pub use converter::{ConvertOptions, ConvertReport, ExportConverter, TableReport};
pub use router::{PlaylistShape, ShapeError, Shaped, TableBatch, TableKind};
