//! Photo archive container
//!
//! A deflated zip holding one entry per photo, `thumbnails/thumb_<name>`
//! entries for thumbnails, and a trailing `MANIFEST.txt` listing every entry
//! with its SHA-256.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::warn;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::hasher::{copy_hashed, ContentDigest};
use crate::error::{BackupError, BackupResult};

/// Name of the manifest entry
pub const MANIFEST_ENTRY: &str = "MANIFEST.txt";

/// Suffix of the sibling file an entry is extracted to before it is verified
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Directory prefix of thumbnail entries
pub const THUMBNAIL_DIR: &str = "thumbnails";

/// File name prefix of thumbnails, on disk and in the archive
pub const THUMBNAIL_PREFIX: &str = "thumb_";

/// File name of a photo's thumbnail
pub fn thumbnail_file_name(file_name: &str) -> String {
    format!("{}{}", THUMBNAIL_PREFIX, file_name)
}

/// Archive entry name of a photo's thumbnail
pub fn thumbnail_entry_name(file_name: &str) -> String {
    format!("{}/{}", THUMBNAIL_DIR, thumbnail_file_name(file_name))
}

/// One `name=hash` line of the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub hash: String,
}

/// The human-readable manifest stored inside the archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveManifest {
    pub entries: Vec<ManifestEntry>,
}

impl ArchiveManifest {
    /// Render the manifest text with its comment header
    pub fn render(&self, generated_at: DateTime<Utc>) -> String {
        let mut text = String::new();
        text.push_str("# Photo archive manifest\n");
        text.push_str(&format!("# Generated: {}\n", generated_at.to_rfc3339()));
        text.push_str(&format!("# Files: {}\n", self.entries.len()));
        text.push_str("# Format: <entry name>=<sha256 hex>\n");
        for entry in &self.entries {
            text.push_str(&format!("{}={}\n", entry.name, entry.hash));
        }
        text
    }

    /// Parse manifest text, skipping comments and malformed lines
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            // Hashes never contain '=', names might
            .filter_map(|line| line.rsplit_once('='))
            .map(|(name, hash)| ManifestEntry {
                name: name.to_string(),
                hash: hash.to_string(),
            })
            .collect();
        Self { entries }
    }

    /// Recorded hash for an entry
    pub fn hash_of(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.hash.as_str())
    }
}

/// Streaming writer for a photo archive
pub struct ArchiveWriter {
    zip: ZipWriter<BufWriter<File>>,
    path: PathBuf,
    options: FileOptions<'static, ()>,
    chunk_size: usize,
    manifest: ArchiveManifest,
    bytes_written: u64,
}

impl ArchiveWriter {
    /// Create the archive file, replacing any existing one
    pub fn create(path: &Path, chunk_size: usize) -> BackupResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path).map_err(|e| {
            BackupError::Io(format!("Failed to create archive {}: {}", path.display(), e))
        })?;

        Ok(Self {
            zip: ZipWriter::new(BufWriter::new(file)),
            path: path.to_path_buf(),
            options: FileOptions::default().compression_method(CompressionMethod::Deflated),
            chunk_size,
            manifest: ArchiveManifest::default(),
            bytes_written: 0,
        })
    }

    /// Stream one entry into the archive, returning its digest
    ///
    /// If reading `reader` fails partway, the entry is dropped from the
    /// archive and a [`BackupError::PartialAsset`] is returned; the writer
    /// stays usable. Failures writing the archive itself are fatal.
    pub fn add_entry<R: Read>(&mut self, name: &str, reader: R) -> BackupResult<ContentDigest> {
        self.zip.start_file(name, self.options)?;

        let mut source = SourceReader {
            inner: reader,
            failed: false,
        };
        let digest = match copy_hashed(&mut source, &mut self.zip, self.chunk_size) {
            Ok(digest) => digest,
            Err(e) if source.failed => {
                self.zip.abort_file()?;
                return Err(BackupError::PartialAsset(format!(
                    "{}: read failed: {}",
                    name, e
                )));
            }
            Err(e) => {
                return Err(BackupError::Archive(format!(
                    "Failed to write entry {}: {}",
                    name, e
                )))
            }
        };

        self.bytes_written += digest.bytes;
        self.manifest.entries.push(ManifestEntry {
            name: name.to_string(),
            hash: digest.hash.clone(),
        });

        Ok(digest)
    }

    /// Number of entries written so far, not counting the manifest
    pub fn entry_count(&self) -> usize {
        self.manifest.entries.len()
    }

    /// Uncompressed bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Append the manifest and close the archive
    pub fn finish(mut self, generated_at: DateTime<Utc>) -> BackupResult<ArchiveManifest> {
        let text = self.manifest.render(generated_at);
        self.zip.start_file(MANIFEST_ENTRY, self.options)?;
        self.zip
            .write_all(text.as_bytes())
            .map_err(|e| BackupError::Archive(format!("Failed to write manifest: {}", e)))?;

        let mut writer = self.zip.finish()?;
        writer.flush().map_err(|e| {
            BackupError::Io(format!(
                "Failed to flush archive {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(self.manifest)
    }
}

/// Remembers whether a read from the wrapped source failed, so source errors
/// can be told apart from archive write errors
struct SourceReader<R> {
    inner: R,
    failed: bool,
}

impl<R: Read> Read for SourceReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map_err(|e| {
            if e.kind() != io::ErrorKind::Interrupted {
                self.failed = true;
            }
            e
        })
    }
}

/// A file written to disk by [`ArchiveReader::extract_entry`]
#[derive(Debug, Clone)]
pub struct ExtractedEntry {
    pub name: String,
    pub path: PathBuf,
    pub digest: ContentDigest,
}

/// What happened to one archive entry during extraction
#[derive(Debug, Clone)]
pub enum EntryOutcome {
    Extracted(ExtractedEntry),
    /// Directory entries and the manifest
    NotAFile,
    /// Names that would land outside the output directory
    Unsafe(String),
}

/// Reader for a photo archive
pub struct ArchiveReader {
    zip: ZipArchive<BufReader<File>>,
    chunk_size: usize,
}

impl ArchiveReader {
    /// Open an archive file
    pub fn open(path: &Path, chunk_size: usize) -> BackupResult<Self> {
        let file = File::open(path).map_err(|e| {
            BackupError::Io(format!("Failed to open archive {}: {}", path.display(), e))
        })?;
        let zip = ZipArchive::new(BufReader::new(file))?;
        Ok(Self { zip, chunk_size })
    }

    /// Total number of entries, including directories and the manifest
    pub fn len(&self) -> usize {
        self.zip.len()
    }

    /// Whether the archive has no entries at all
    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// Count the entries that extract to files
    pub fn count_files(&mut self) -> BackupResult<usize> {
        let mut count = 0;
        for index in 0..self.zip.len() {
            let entry = self.zip.by_index(index)?;
            if !entry.is_dir() && entry.name() != MANIFEST_ENTRY {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Names of the entries that extract to files
    pub fn file_names(&mut self) -> BackupResult<Vec<String>> {
        let mut names = Vec::new();
        for index in 0..self.zip.len() {
            let entry = self.zip.by_index(index)?;
            if !entry.is_dir() && entry.name() != MANIFEST_ENTRY {
                names.push(entry.name().to_string());
            }
        }
        Ok(names)
    }

    /// Read and parse the manifest entry, if the archive has one
    pub fn read_manifest(&mut self) -> BackupResult<Option<ArchiveManifest>> {
        let mut entry = match self.zip.by_name(MANIFEST_ENTRY) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|e| BackupError::Archive(format!("Failed to read manifest: {}", e)))?;

        Ok(Some(ArchiveManifest::parse(&text)))
    }

    /// Stream one entry into `output_dir`, hashing it on the way
    ///
    /// The entry is written to a `.partial` sibling first. `verify` sees the
    /// entry name and digest; only when it accepts them does the file replace
    /// whatever is at the target path. On any failure the partial file is
    /// removed and the target is left untouched.
    pub fn extract_entry(
        &mut self,
        index: usize,
        output_dir: &Path,
        verify: &mut dyn FnMut(&str, &ContentDigest) -> BackupResult<()>,
    ) -> BackupResult<EntryOutcome> {
        let chunk_size = self.chunk_size;
        let mut entry = self.zip.by_index(index)?;
        let name = entry.name().to_string();

        if entry.is_dir() || name == MANIFEST_ENTRY {
            return Ok(EntryOutcome::NotAFile);
        }

        let relative = match entry.enclosed_name() {
            Some(relative) => relative.to_path_buf(),
            None => return Ok(EntryOutcome::Unsafe(name)),
        };

        let target = output_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let staged = partial_path(&target);

        let written = write_staged(&mut entry, &name, &staged, chunk_size)
            .and_then(|digest| verify(&name, &digest).map(|()| digest));
        let digest = match written {
            Ok(digest) => digest,
            Err(e) => {
                discard(&staged);
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&staged, &target) {
            discard(&staged);
            return Err(BackupError::Io(format!(
                "Failed to move {} into place: {}",
                target.display(),
                e
            )));
        }

        Ok(EntryOutcome::Extracted(ExtractedEntry {
            name,
            path: target,
            digest,
        }))
    }
}

/// Sibling path an entry is staged at
fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    target.with_file_name(name)
}

fn write_staged<R: Read>(
    entry: &mut R,
    name: &str,
    staged: &Path,
    chunk_size: usize,
) -> BackupResult<ContentDigest> {
    let file = File::create(staged).map_err(|e| {
        BackupError::Io(format!("Failed to create {}: {}", staged.display(), e))
    })?;
    let mut writer = BufWriter::new(file);

    let digest = copy_hashed(entry, &mut writer, chunk_size)
        .map_err(|e| BackupError::Archive(format!("Failed to extract {}: {}", name, e)))?;
    writer
        .flush()
        .map_err(|e| BackupError::Io(format!("Failed to write {}: {}", staged.display(), e)))?;

    Ok(digest)
}

fn discard(staged: &Path) {
    if let Err(e) = fs::remove_file(staged) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %staged.display(), error = %e, "Failed to remove partial file");
        }
    }
}
