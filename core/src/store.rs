//! Atomic state store.
//!
//! Every persisted document is written to a sibling temporary file and
//! renamed onto its target in one step. A reader racing the write gets the
//! old contents or the new contents, never a truncated file. Missing parent
//! directories are created first.

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::error::CapsuleError;
use crate::error::Result;

/// Read and parse a JSON document.
///
/// Absence of the file is reported as [`CapsuleError::NotFound`], distinct
/// from a parse failure, so callers that tolerate a missing document can
/// match on it.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(CapsuleError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(err) => return Err(CapsuleError::io(path, err)),
    };

    serde_json::from_str(&contents).map_err(|err| CapsuleError::Malformed {
        path: path.to_path_buf(),
        source: err,
    })
}

pub fn write_json<T: Serialize>(path: &Path, document: &T) -> Result<()> {
    stage_json(path, document)?.commit()
}

pub fn write_text(path: &Path, contents: &str) -> Result<()> {
    stage(path, contents.as_bytes())?.commit()
}

/// Serialize a document and stage it next to its target without renaming.
///
/// Lets a caller order one write relative to another: the policy compiler
/// stages the trust list, writes the rules script, and only then calls
/// [`StagedWrite::commit`] to make the list visible.
pub fn stage_json<T: Serialize>(path: &Path, document: &T) -> Result<StagedWrite> {
    let contents = serde_json::to_vec_pretty(document).map_err(|err| CapsuleError::Encode {
        path: path.to_path_buf(),
        source: err,
    })?;
    stage(path, &contents)
}

/// A document written and flushed to a sibling temporary file but not yet
/// renamed onto its target. Dropping it leaves the target untouched.
pub struct StagedWrite {
    target: PathBuf,
    tmp: NamedTempFile,
}

impl StagedWrite {
    /// The atomic rename onto the target path.
    pub fn commit(self) -> Result<()> {
        let StagedWrite { target, tmp } = self;
        tmp.persist(&target)
            .map_err(|err| CapsuleError::io(&target, err.error))?;
        Ok(())
    }
}

fn stage(path: &Path, contents: &[u8]) -> Result<StagedWrite> {
    let parent = path.parent().ok_or_else(|| {
        CapsuleError::io(
            path,
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path has no parent directory",
            ),
        )
    })?;
    std::fs::create_dir_all(parent).map_err(|err| CapsuleError::io(parent, err))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|err| CapsuleError::io(parent, err))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.flush())
        .map_err(|err| CapsuleError::io(tmp.path(), err))?;

    Ok(StagedWrite {
        target: path.to_path_buf(),
        tmp,
    })
}
