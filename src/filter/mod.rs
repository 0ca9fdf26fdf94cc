pub mod archive_filter;
pub mod exclusion;
pub mod records;

pub use archive_filter::{
    classify_archive, filter_archive, ArchiveFilter, ExcludedEntry, FilterEvent, FilterProgress,
};
pub use exclusion::ExclusionSet;
pub use records::{ArchiveWriter, CentralRecord, SourceArchive};
