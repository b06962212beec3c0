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

use std::time::Instant;

use async_trait::async_trait;

use crate::{proto::LocatedBlockProto, Result};

/// Environment variable overriding whether datanodes are dialed by hostname
/// instead of IP address. Read live at each block open.
pub const USE_DATANODE_HOSTNAME_ENV: &str = "HDFS_USE_DATANODE_HOSTNAME";

/// Everything needed to start streaming one block.
#[derive(Clone, Debug)]
pub struct BlockWriterOptions {
    pub client_name: String,
    /// The block to write, including the datanode pipeline and the access
    /// token authorizing the transfer.
    pub block: LocatedBlockProto,
    pub block_size: u64,
    /// Byte offset to resume at; non-zero only with `append`.
    pub offset: u64,
    pub append: bool,
    pub use_datanode_hostname: bool,
    pub deadline: Option<Instant>,
}

/// A streaming session for a single block, backed by a datanode pipeline.
///
/// The pipeline tracks acknowledgements asynchronously; `write` and `flush`
/// report bytes handed durably to the send queue, and only `close` confirms
/// that every packet was acknowledged.
#[async_trait]
pub trait BlockWriter: Send {
    /// The block being written. Its extended identifier carries the
    /// cumulative length, which implementations keep current as writes are
    /// accepted.
    fn block(&self) -> &LocatedBlockProto;

    /// Applies `deadline` to every subsequent network operation. `None`
    /// removes any deadline.
    fn set_deadline(&mut self, deadline: Option<Instant>);

    /// Writes a prefix of `buf` to the block and returns the number of
    /// bytes consumed. A short write is valid and means the block just
    /// filled up. Returns [`crate::Error::EndOfBlock`] if and only if the
    /// block was already full and nothing was consumed.
    async fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Flushes any internally buffered packets to the pipeline.
    async fn flush(&mut self) -> Result<()>;

    /// Drains the send queue and waits for the pipeline to acknowledge
    /// every packet.
    async fn close(&mut self) -> Result<()>;
}

/// Constructs block writers. Implementations own dialing (including wrapping
/// the connection with the block access token) and the packet-level
/// protocol.
#[async_trait]
pub trait BlockTransfer: Send + Sync {
    async fn open(&self, options: BlockWriterOptions) -> Result<Box<dyn BlockWriter>>;
}

/// Reads `key` from the process environment on every call, never caching.
/// Credentials and endpoint overrides changed at runtime are observed by the
/// next caller.
pub(crate) fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

pub(crate) fn use_datanode_hostname_override() -> Option<bool> {
    env_var(USE_DATANODE_HOSTNAME_ENV).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_override_reads_environment_live() {
        std::env::remove_var(USE_DATANODE_HOSTNAME_ENV);
        assert_eq!(use_datanode_hostname_override(), None);

        std::env::set_var(USE_DATANODE_HOSTNAME_ENV, "true");
        assert_eq!(use_datanode_hostname_override(), Some(true));

        std::env::set_var(USE_DATANODE_HOSTNAME_ENV, "0");
        assert_eq!(use_datanode_hostname_override(), Some(false));

        std::env::remove_var(USE_DATANODE_HOSTNAME_ENV);
        assert_eq!(use_datanode_hostname_override(), None);
    }
}
