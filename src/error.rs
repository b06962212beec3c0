// Copyright 2022 The Engula Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

use thiserror::Error;

/// Classified fault kinds, independent of how the transport encodes them.
///
/// The namenode transport is expected to map server exceptions into these
/// kinds before they reach the write path, so retry decisions never depend
/// on message text.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{0} is not found")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The previous block has not reached its minimum replication yet. The
    /// only kind `addBlock` retries on.
    #[error("previous block not yet replicated: {0}")]
    NotReplicatedYet(String),
    /// All writes are acknowledged by the datanodes but the namenode has not
    /// confirmed persistence. The lease is still open; closing again later
    /// is safe.
    #[error("replication in progress")]
    Replicating,
    /// The namenode ran out of inline storage extents for a small file.
    #[error("out of inline storage extents: {0}")]
    OutOfExtents(String),
    /// The current block cannot accept more bytes. Handled inside the write
    /// loop; never surfaced to callers.
    #[error("end of block")]
    EndOfBlock,
    #[error("deadline exceeded")]
    Deadline,
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    pub fn transport(s: impl ToString) -> Self {
        Self::Transport(s.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The public operation an error was surfaced from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Open,
    Create,
    Append,
    Write,
    Flush,
    Close,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Open => "open",
            Operation::Create => "create",
            Operation::Append => "append",
            Operation::Write => "write",
            Operation::Flush => "flush",
            Operation::Close => "close",
        };
        write!(f, "{}", name)
    }
}

/// An error surfaced by a file operation, wrapped with the operation and the
/// path it failed on. The cause is preserved so callers can test for
/// sentinel kinds.
#[derive(Error, Debug)]
#[error("{op} {path}: {source}")]
pub struct FileError {
    pub op: Operation,
    pub path: String,
    #[source]
    pub source: Error,
}

impl FileError {
    pub(crate) fn new(op: Operation, path: impl Into<String>, source: Error) -> Self {
        FileError {
            op,
            path: path.into(),
            source,
        }
    }

    #[inline(always)]
    pub fn kind(&self) -> &Error {
        &self.source
    }

    /// Returns true if this error wraps the replication-in-progress
    /// sentinel. The file's data is fully written in that case; the caller
    /// may close again or let the lease expire.
    pub fn is_replicating(&self) -> bool {
        matches!(self.source, Error::Replicating)
    }
}

/// Error returned by [`crate::FileWriter::write`]. `written` is the number
/// of bytes accepted by the writer before the failure.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct WriteError {
    pub written: usize,
    #[source]
    pub source: FileError,
}
