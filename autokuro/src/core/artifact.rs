//! Line-oriented artifact files produced by stages.

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A stage output file.
///
/// Existence together with a non-zero size means the stage is complete and
/// its output usable. A zero-byte or missing file means the stage must run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Artifact {
    path: PathBuf,
}

impl Artifact {
    /// Creates an artifact handle for `path`. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates an artifact handle for `name` inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path, name: &str) -> Self {
        Self::new(dir.join(name))
    }

    /// Returns the artifact path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file name component, or an empty string.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Returns true if the file exists and is non-empty.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        fs::metadata(&self.path)
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Returns the file size, zero when missing.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Returns a lazy iterator over trimmed, non-empty lines.
    ///
    /// A missing file yields nothing. Invalid UTF-8 is replaced rather than
    /// rejected, since tool output is not guaranteed to be clean.
    pub fn lines(&self) -> io::Result<ArtifactLines> {
        match File::open(&self.path) {
            Ok(file) => Ok(ArtifactLines {
                reader: Some(BufReader::new(file)),
                path: self.path.clone(),
                buf: Vec::new(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ArtifactLines {
                reader: None,
                path: self.path.clone(),
                buf: Vec::new(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Reads every trimmed, non-empty line.
    pub fn read_lines(&self) -> io::Result<Vec<String>> {
        Ok(self.lines()?.collect())
    }

    /// Counts trimmed, non-empty lines.
    pub fn line_count(&self) -> io::Result<usize> {
        Ok(self.lines()?.count())
    }

    /// Writes `lines` one per line, replacing any previous content.
    ///
    /// Returns the number of lines written.
    pub fn write_lines<I, S>(&self, lines: I) -> io::Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(&self.path)?);
        let mut written = 0;
        for line in lines {
            writer.write_all(line.as_ref().as_bytes())?;
            writer.write_all(b"\n")?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }

    /// Removes the file. A missing file is not an error.
    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Returns the hex SHA-256 of the file content.
    pub fn fingerprint(&self) -> io::Result<String> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut hasher = Sha256::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Iterator returned by [`Artifact::lines`].
#[derive(Debug)]
pub struct ArtifactLines {
    reader: Option<BufReader<File>>,
    path: PathBuf,
    buf: Vec<u8>,
}

impl Iterator for ArtifactLines {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let reader = self.reader.as_mut()?;
        loop {
            self.buf.clear();
            match reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.reader = None;
                    return None;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&self.buf);
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        return Some(trimmed.to_string());
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Stopped reading artifact");
                    self.reader = None;
                    return None;
                }
            }
        }
    }
}

/// Returns the total size of all regular files under `dir`, following no symlinks.
#[must_use]
pub fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}
