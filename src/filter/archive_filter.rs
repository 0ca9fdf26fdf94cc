use crate::error::{JarStripError, Result};
use crate::filter::records::{ArchiveWriter, SourceArchive};
use crate::filter::ExclusionSet;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use zip::result::ZipError;

/// Per-entry notification raised while filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterEvent<'a> {
    Started { entries: usize },
    Excluded { name: &'a str, pattern: &'a str },
    Retained { name: &'a str, compressed_size: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedEntry {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone)]
pub struct FilterProgress {
    pub entries_total: usize,
    pub entries_retained: usize,
    pub bytes_retained: u64,
    pub excluded: Vec<ExcludedEntry>,
    pub start_time: Instant,
}

impl FilterProgress {
    pub fn new(entries_total: usize) -> Self {
        Self {
            entries_total,
            entries_retained: 0,
            bytes_retained: 0,
            excluded: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn record_retained(&mut self, compressed_size: u64) {
        self.entries_retained += 1;
        self.bytes_retained += compressed_size;
    }

    pub fn record_excluded(&mut self, name: &str, pattern: &str) {
        self.excluded.push(ExcludedEntry {
            name: name.to_string(),
            pattern: pattern.to_string(),
        });
    }

    pub fn entries_excluded(&self) -> usize {
        self.excluded.len()
    }

    pub fn entries_processed(&self) -> usize {
        self.entries_retained + self.excluded.len()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Copies every entry of `input` whose name matches no pattern in
/// `exclusions` into `output`, in stored order.
///
/// Retained entries are copied as stored bytes: local header, compressed
/// payload, data descriptor and central directory record (comment, extra
/// fields, host system) all come through unchanged apart from the local
/// header offset. Entries sharing a name are each judged and copied on their
/// own. The output is left open; the caller finishes it.
pub fn filter_archive<R, W>(
    exclusions: &ExclusionSet,
    input: &mut SourceArchive<R>,
    output: &mut ArchiveWriter<W>,
    on_event: Option<&dyn Fn(&FilterEvent<'_>)>,
) -> Result<FilterProgress>
where
    R: Read + Seek,
    W: Write,
{
    let mut progress = FilterProgress::new(input.len());
    if let Some(callback) = on_event {
        callback(&FilterEvent::Started {
            entries: progress.entries_total,
        });
    }

    for index in 0..input.len() {
        let record = &input.records()[index];
        let name = record.name().to_string();
        let compressed_size = record.compressed_size();

        if let Some(pattern) = exclusions.first_match(&name) {
            progress.record_excluded(&name, pattern);
            if let Some(callback) = on_event {
                callback(&FilterEvent::Excluded {
                    name: &name,
                    pattern,
                });
            }
            continue;
        }

        output
            .copy_entry(input, index)
            .map_err(|source| JarStripError::ArchiveWrite {
                entry: name.clone(),
                source,
            })?;

        progress.record_retained(compressed_size);
        if let Some(callback) = on_event {
            callback(&FilterEvent::Retained {
                name: &name,
                compressed_size,
            });
        }
    }

    Ok(progress)
}

/// Classifies the entries of `input` without writing anything.
pub fn classify_archive<R>(exclusions: &ExclusionSet, input: &SourceArchive<R>) -> FilterProgress
where
    R: Read + Seek,
{
    let mut progress = FilterProgress::new(input.len());

    for record in input.records() {
        match exclusions.first_match(record.name()) {
            Some(pattern) => progress.record_excluded(record.name(), pattern),
            None => progress.record_retained(record.compressed_size()),
        }
    }

    progress
}

/// File-level driver around [`filter_archive`].
///
/// In direct mode the output path is written in place, so a failed run can
/// leave an incomplete archive behind. Atomic mode writes to a temporary file
/// next to the destination and renames it over the destination only after
/// the central directory has been written.
pub struct ArchiveFilter {
    atomic: bool,
}

impl ArchiveFilter {
    pub fn new() -> Self {
        Self { atomic: false }
    }

    pub fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    pub fn is_atomic(&self) -> bool {
        self.atomic
    }

    pub fn filter_file(
        &self,
        exclusions: &ExclusionSet,
        input_path: &Path,
        output_path: &Path,
        on_event: Option<&dyn Fn(&FilterEvent<'_>)>,
    ) -> Result<FilterProgress> {
        let mut input = open_input(input_path)?;

        if self.atomic {
            self.filter_atomic(exclusions, &mut input, output_path, on_event)
        } else {
            self.filter_direct(exclusions, &mut input, output_path, on_event)
        }
    }

    pub fn classify_file(
        &self,
        exclusions: &ExclusionSet,
        input_path: &Path,
    ) -> Result<FilterProgress> {
        let input = open_input(input_path)?;
        Ok(classify_archive(exclusions, &input))
    }

    fn filter_direct<R: Read + Seek>(
        &self,
        exclusions: &ExclusionSet,
        input: &mut SourceArchive<R>,
        output_path: &Path,
        on_event: Option<&dyn Fn(&FilterEvent<'_>)>,
    ) -> Result<FilterProgress> {
        let file = File::create(output_path).map_err(|e| JarStripError::ArchiveOpen {
            path: output_path.display().to_string(),
            source: ZipError::Io(e),
        })?;

        let (progress, sink) =
            write_filtered(exclusions, input, BufWriter::new(file), output_path, on_event)?;
        sink.into_inner()
            .map_err(|e| finalize_error(output_path, ZipError::Io(e.into_error())))?;

        Ok(progress)
    }

    fn filter_atomic<R: Read + Seek>(
        &self,
        exclusions: &ExclusionSet,
        input: &mut SourceArchive<R>,
        output_path: &Path,
        on_event: Option<&dyn Fn(&FilterEvent<'_>)>,
    ) -> Result<FilterProgress> {
        let parent = output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let temp = NamedTempFile::new_in(parent).map_err(|e| JarStripError::ArchiveOpen {
            path: output_path.display().to_string(),
            source: ZipError::Io(e),
        })?;

        let (progress, sink) =
            write_filtered(exclusions, input, BufWriter::new(temp), output_path, on_event)?;
        let temp = sink
            .into_inner()
            .map_err(|e| finalize_error(output_path, ZipError::Io(e.into_error())))?;
        temp.persist(output_path)
            .map_err(|e| finalize_error(output_path, ZipError::Io(e.error)))?;

        Ok(progress)
    }
}

impl Default for ArchiveFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn open_input(path: &Path) -> Result<SourceArchive<BufReader<File>>> {
    let open_error = |source| JarStripError::ArchiveOpen {
        path: path.display().to_string(),
        source,
    };

    let file = File::open(path).map_err(|e| open_error(ZipError::Io(e)))?;
    SourceArchive::open(BufReader::new(file)).map_err(open_error)
}

fn write_filtered<R, W>(
    exclusions: &ExclusionSet,
    input: &mut SourceArchive<R>,
    sink: W,
    output_path: &Path,
    on_event: Option<&dyn Fn(&FilterEvent<'_>)>,
) -> Result<(FilterProgress, W)>
where
    R: Read + Seek,
    W: Write,
{
    let mut output = ArchiveWriter::new(sink);
    let progress = filter_archive(exclusions, input, &mut output, on_event)?;
    let sink = output
        .finish(input.comment())
        .map_err(|source| finalize_error(output_path, source))?;

    Ok((progress, sink))
}

fn finalize_error(path: &Path, source: ZipError) -> JarStripError {
    JarStripError::ArchiveFinalize {
        path: path.display().to_string(),
        source,
    }
}
