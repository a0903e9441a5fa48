//! File-backed record store and workspace layout.
//!
//! State files live under the workspace root in either CSV or JSON form; the
//! format is the operator's session-wide choice. A missing file reads as an
//! empty collection so that first runs and post-run inspection share one code
//! path. Writes always replace the whole file.

mod records;

pub use records::Tabular;

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// On-disk serialization format for state files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Errors from reading or writing a state file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file is open in another program. Spreadsheet editors hold an
    /// exclusive lock on CSV files while they are open.
    #[error("the file at {path} is in use; close the file and try again")]
    Locked { path: PathBuf },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record in {path}: {message}")]
    Malformed { path: PathBuf, message: String },
}

impl StoreError {
    fn from_io(path: &Path, source: std::io::Error) -> Self {
        if is_lock_error(&source) {
            StoreError::Locked {
                path: path.to_path_buf(),
            }
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    fn malformed(path: &Path, message: impl Into<String>) -> Self {
        StoreError::Malformed {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

// Raw error 32 is the Windows sharing violation raised while a spreadsheet
// editor has the file open.
fn is_lock_error(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::PermissionDenied || err.raw_os_error() == Some(32)
}

/// Reads and writes whole record collections in the session format.
#[derive(Debug, Clone, Copy)]
pub struct FileStore {
    format: FileFormat,
}

impl FileStore {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Path of the state file named `stem` under `dir`, with the session
    /// format's extension.
    pub fn path_for(&self, dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{stem}.{}", self.format.extension()))
    }

    /// Read the full collection at `path`. An absent file is an empty
    /// collection, not an error.
    pub fn read<T>(&self, path: &Path) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Tabular,
    {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "state file absent, reading as empty");
                return Ok(Vec::new());
            }
            Err(err) => return Err(StoreError::from_io(path, err)),
        };

        match self.format {
            FileFormat::Json => {
                serde_json::from_reader(BufReader::new(file))
                    .map_err(|err| StoreError::malformed(path, err.to_string()))
            }
            FileFormat::Csv => {
                let mut reader = csv::ReaderBuilder::new()
                    .has_headers(true)
                    .flexible(true)
                    .from_reader(BufReader::new(file));
                let mut records = Vec::new();
                for row in reader.records() {
                    let row = row.map_err(|err| StoreError::malformed(path, err.to_string()))?;
                    records.push(
                        T::from_csv_row(&row)
                            .map_err(|message| StoreError::malformed(path, message))?,
                    );
                }
                Ok(records)
            }
        }
    }

    /// Replace the file at `path` with the given collection, creating parent
    /// directories as needed.
    pub fn write<T>(&self, path: &Path, records: &[T]) -> Result<(), StoreError>
    where
        T: Serialize + Tabular,
    {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| StoreError::from_io(parent, err))?;
        }
        let file = File::create(path).map_err(|err| StoreError::from_io(path, err))?;
        let mut writer = BufWriter::new(file);

        match self.format {
            FileFormat::Json => {
                serde_json::to_writer_pretty(&mut writer, records)
                    .map_err(|err| StoreError::malformed(path, err.to_string()))?;
            }
            FileFormat::Csv => {
                let mut csv_writer = csv::Writer::from_writer(&mut writer);
                csv_writer
                    .write_record(T::CSV_HEADERS)
                    .map_err(|err| StoreError::malformed(path, err.to_string()))?;
                for record in records {
                    csv_writer
                        .write_record(record.to_csv_row())
                        .map_err(|err| StoreError::malformed(path, err.to_string()))?;
                }
                csv_writer
                    .flush()
                    .map_err(|err| StoreError::from_io(path, err))?;
                drop(csv_writer);
            }
        }

        writer.flush().map_err(|err| StoreError::from_io(path, err))?;
        debug!(path = %path.display(), count = records.len(), "wrote state file");
        Ok(())
    }
}

/// Directory layout rooted at the configured workspace.
///
/// `operations/` holds operator-editable inputs and the relationship and
/// assignment state files; `downloads/` holds read-only snapshots; `logs/`
/// holds the JSON log files.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn operations_dir(&self) -> PathBuf {
        self.root.join("operations")
    }

    pub fn relationship_dir(&self) -> PathBuf {
        self.operations_dir().join("gdapRelationship")
    }

    pub fn assignment_dir(&self) -> PathBuf {
        self.operations_dir().join("accessAssignment")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Create the full directory tree. Idempotent.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [
            self.relationship_dir(),
            self.assignment_dir(),
            self.downloads_dir(),
            self.logs_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn relationship_file(&self, store: &FileStore) -> PathBuf {
        store.path_for(&self.relationship_dir(), "gdapRelationship")
    }

    pub fn assignment_file(&self, store: &FileStore) -> PathBuf {
        store.path_for(&self.assignment_dir(), "accessAssignment")
    }

    /// Operator-edited list of customers to create relationships for.
    pub fn customers_input_file(&self, store: &FileStore) -> PathBuf {
        store.path_for(&self.operations_dir(), "customers")
    }

    /// Operator-edited role catalog used when building drafts.
    pub fn roles_input_file(&self, store: &FileStore) -> PathBuf {
        store.path_for(&self.operations_dir(), "ADRoles")
    }

    /// Operator-edited security group to role mapping.
    pub fn security_groups_input_file(&self, store: &FileStore) -> PathBuf {
        store.path_for(&self.operations_dir(), "securityGroup")
    }

    pub fn customers_export_file(&self, store: &FileStore) -> PathBuf {
        store.path_for(&self.downloads_dir(), "customers")
    }

    pub fn roles_export_file(&self, store: &FileStore) -> PathBuf {
        store.path_for(&self.downloads_dir(), "ADRoles")
    }

    pub fn security_groups_export_file(&self, store: &FileStore) -> PathBuf {
        store.path_for(&self.downloads_dir(), "securityGroup")
    }

    /// Snapshot of the remote's full relationship collection.
    pub fn relationship_snapshot_file(&self, store: &FileStore) -> PathBuf {
        store.path_for(&self.downloads_dir(), "existingGdapRelationship")
    }

    /// Verbatim compressed bulk customer export.
    pub fn bulk_customers_file(&self) -> PathBuf {
        self.downloads_dir().join("customers.gz")
    }
}
