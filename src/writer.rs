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

use std::{
    fmt, mem,
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::BytesMut;
use tracing::{debug, warn};

use crate::{
    client::Client,
    crypto::TransparentEncryption,
    kms::EncryptionKey,
    namenode::NameNodeProtocol,
    proto::*,
    transfer::{self, BlockTransfer, BlockWriter, BlockWriterOptions},
    Error, FileError, Operation, Result, WriteError,
};

/// Hard cap on the bytes a small file may stage for inline storage.
pub const MAX_SMALL_FILE_SIZE: usize = 64 * 1024;

const ADD_BLOCK_ATTEMPTS: u32 = 8;
const ADD_BLOCK_INITIAL_DELAY: Duration = Duration::from_millis(400);
const COMPLETE_ATTEMPTS: u32 = 10;
const COMPLETE_INITIAL_DELAY: Duration = Duration::from_millis(250);

impl Client {
    /// Opens a new file with the server's default replication, block size,
    /// and the client's default permissions. Because writes are buffered
    /// and acknowledged asynchronously, it is very important that `close`
    /// is called after all data has been written.
    pub async fn create(&self, path: &str) -> Result<FileWriter, FileError> {
        let req = GetFileInfoRequestProto {
            src: path.to_owned(),
        };
        match self.namenode.get_file_info(req).await {
            Ok(resp) if resp.fs.is_some() => {
                return Err(FileError::new(
                    Operation::Create,
                    path,
                    Error::AlreadyExists(path.to_owned()),
                ))
            }
            Ok(_) | Err(Error::NotFound(_)) => {}
            Err(err) => return Err(FileError::new(Operation::Create, path, err)),
        }

        let defaults = self
            .namenode
            .server_defaults(GetServerDefaultsRequestProto {})
            .await
            .map_err(|err| FileError::new(Operation::Create, path, err))?
            .server_defaults;

        self.create_file(
            path,
            defaults.replication,
            defaults.block_size,
            self.options.default_permissions,
            false,
            false,
        )
        .await
    }

    /// Opens a new file with the given replication, block size, and
    /// permissions.
    pub async fn create_file(
        &self,
        path: &str,
        replication: u32,
        block_size: u64,
        permissions: u32,
        overwrite: bool,
        create_parent: bool,
    ) -> Result<FileWriter, FileError> {
        let mut create_flag = CREATE_FLAG_CREATE;
        if overwrite {
            create_flag |= CREATE_FLAG_OVERWRITE;
        }

        let req = CreateRequestProto {
            src: path.to_owned(),
            masked: FsPermissionProto { perm: permissions },
            client_name: self.options.client_name.clone(),
            create_flag,
            create_parent,
            replication,
            block_size,
            crypto_protocol_version: vec![CryptoProtocolVersionProto::EncryptionZones as i32],
        };
        let resp = self
            .namenode
            .create(req)
            .await
            .map_err(|err| FileError::new(Operation::Create, path, err))?;
        let fs = resp.fs.ok_or_else(|| {
            FileError::new(
                Operation::Create,
                path,
                Error::transport("create response carries no file status"),
            )
        })?;

        let enc_key = match fs.file_encryption_info.as_ref() {
            Some(info) => match self.resolve_key(info).await {
                Ok(key) => Some(key),
                Err(err) => {
                    // The namenode holds a freshly created file that can
                    // never be written; remove it before surfacing.
                    let req = DeleteRequestProto {
                        src: path.to_owned(),
                        recursive: false,
                    };
                    let _ = self.namenode.delete(req).await;
                    return Err(FileError::new(Operation::Create, path, err));
                }
            },
            None => None,
        };
        let enc = match enc_key {
            Some(key) => Some(
                TransparentEncryption::new(key)
                    .map_err(|err| FileError::new(Operation::Create, path, err))?,
            ),
            None => None,
        };

        // Inline storage would carry plaintext in the complete call, so an
        // encrypted file always takes the block path.
        let store_in_db = fs.storage_policy == Some(DB_STORAGE_POLICY_ID) && enc.is_none();

        let mut writer = FileWriter::new(self, path);
        writer.replication = replication;
        writer.block_size = block_size;
        writer.file_id = fs.file_id;
        writer.store_in_db = store_in_db;
        writer.enc = enc;
        Ok(writer)
    }

    /// Opens an existing file for appending. Because writes are buffered
    /// and acknowledged asynchronously, it is very important that `close`
    /// is called after all data has been written.
    pub async fn append(&self, path: &str) -> Result<FileWriter, FileError> {
        let req = GetFileInfoRequestProto {
            src: path.to_owned(),
        };
        self.namenode
            .get_file_info(req)
            .await
            .map_err(|err| FileError::new(Operation::Append, path, err))?;

        let req = AppendRequestProto {
            src: path.to_owned(),
            client_name: self.options.client_name.clone(),
        };
        let resp = self
            .namenode
            .append(req)
            .await
            .map_err(|err| FileError::new(Operation::Append, path, err))?;
        let stat = resp.stat.ok_or_else(|| {
            FileError::new(
                Operation::Append,
                path,
                Error::transport("append response carries no file status"),
            )
        })?;

        let enc_key = match stat.file_encryption_info.as_ref() {
            Some(info) => Some(
                self.resolve_key(info)
                    .await
                    .map_err(|err| FileError::new(Operation::Append, path, err))?,
            ),
            None => None,
        };

        let mut writer = FileWriter::new(self, path);
        writer.replication = stat.block_replication.unwrap_or_default();
        writer.block_size = stat.blocksize.unwrap_or_default();
        writer.file_id = stat.file_id;
        writer.pos = stat.length;
        writer.enc = match enc_key {
            Some(key) => Some(
                TransparentEncryption::new(key)
                    .map_err(|err| FileError::new(Operation::Append, path, err))?,
            ),
            None => None,
        };

        // No block means the file is empty or its last block is full; the
        // next write starts a fresh block.
        let block = match resp.block {
            Some(block) => block,
            None => return Ok(writer),
        };

        // A phantom block carrying data is a small file stored inline in
        // the namenode; stage its contents for rewriting.
        if let Some(data) = block.data.as_ref().filter(|data| !data.is_empty()) {
            writer.store_in_db = true;
            writer.small_file_buf = BytesMut::from(&data[..]);
            return Ok(writer);
        }

        // Resume the partial last block where the server left off.
        let offset = block.b.num_bytes.unwrap_or_default();
        let block_writer = writer
            .open_block_writer(block, offset, true)
            .await
            .map_err(|err| FileError::new(Operation::Append, path, err))?;
        writer.block_writer = Some(block_writer);
        Ok(writer)
    }

    async fn resolve_key(&self, info: &FileEncryptionInfoProto) -> Result<EncryptionKey> {
        match self.key_provider.as_ref() {
            Some(provider) => provider.resolve(info).await,
            None => Err(Error::transport(
                "file is in an encryption zone but no key provider is configured",
            )),
        }
    }
}

/// A writer for an open file. Bytes are staged in memory for small files or
/// streamed block by block through a datanode pipeline, transparently
/// encrypted when the file sits in an encryption zone.
///
/// A `FileWriter` is not meant to be shared: all methods take `&mut self`,
/// and callers serialize `write`/`flush`/`close` themselves. Dropping a
/// writer without closing it leaks the namenode lease until the server
/// expires it.
pub struct FileWriter {
    namenode: Arc<dyn NameNodeProtocol>,
    transfer: Arc<dyn BlockTransfer>,
    client_name: String,
    use_datanode_hostname: bool,

    path: String,
    replication: u32,
    block_size: u64,
    file_id: Option<u64>,

    block_writer: Option<Box<dyn BlockWriter>>,
    deadline: Option<Instant>,
    store_in_db: bool,
    small_file_buf: BytesMut,
    pos: u64,

    enc: Option<TransparentEncryption>,
}

impl fmt::Debug for FileWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWriter")
            .field("path", &self.path)
            .field("pos", &self.pos)
            .field("replication", &self.replication)
            .field("block_size", &self.block_size)
            .field("store_in_db", &self.store_in_db)
            .finish_non_exhaustive()
    }
}

impl FileWriter {
    fn new(client: &Client, path: &str) -> Self {
        FileWriter {
            namenode: client.namenode.clone(),
            transfer: client.transfer.clone(),
            client_name: client.options.client_name.clone(),
            use_datanode_hostname: client.options.use_datanode_hostname,
            path: path.to_owned(),
            replication: 0,
            block_size: 0,
            file_id: None,
            block_writer: None,
            deadline: None,
            store_in_db: false,
            small_file_buf: BytesMut::new(),
            pos: 0,
            enc: None,
        }
    }

    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Total bytes accepted by this writer, buffered or streamed.
    #[inline(always)]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    #[inline(always)]
    pub fn file_id(&self) -> Option<u64> {
        self.file_id
    }

    #[inline(always)]
    pub fn replication(&self) -> u32 {
        self.replication
    }

    #[inline(always)]
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Sets the deadline for future `write`, `flush`, and `close` calls.
    /// `None` means they will not time out. Writes that are satisfied from
    /// buffers may still succeed after the deadline.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
        if let Some(writer) = self.block_writer.as_mut() {
            writer.set_deadline(deadline);
        }
    }

    /// Writes `buf` to the file. On success the whole buffer is accepted;
    /// on failure the returned [`WriteError`] reports how many bytes were.
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize, WriteError> {
        if self.store_in_db {
            self.small_file_buf.extend_from_slice(buf);
            self.pos += buf.len() as u64;
            if self.small_file_buf.len() <= MAX_SMALL_FILE_SIZE {
                return Ok(buf.len());
            }

            // The file outgrew the inline cap. Every caller byte is already
            // accepted, so the whole buffer spills to block storage and any
            // streaming failure is reported against the full length.
            match self.spill_small_file_buffer(Operation::Write).await {
                Ok(_) => Ok(buf.len()),
                Err(err) => Err(WriteError {
                    written: buf.len(),
                    source: err.source,
                }),
            }
        } else {
            self.write_internal(buf, Operation::Write).await
        }
    }

    /// Flushes buffered data out to the datanodes. A successful flush does
    /// not imply the namenode has persisted the file; `close` is still
    /// required.
    pub async fn flush(&mut self) -> Result<(), FileError> {
        if self.store_in_db && !self.small_file_buf.is_empty() {
            self.spill_small_file_buffer(Operation::Flush)
                .await
                .map_err(|err| err.source)?;
        }

        if let Some(writer) = self.block_writer.as_mut() {
            writer
                .flush()
                .await
                .map_err(|err| FileError::new(Operation::Flush, &self.path, err))?;
        }
        Ok(())
    }

    /// Closes the file, draining the current block and waiting for the
    /// namenode to confirm persistence.
    ///
    /// If the datanodes acknowledged all writes but the namenode has not,
    /// this returns the replication-in-progress sentinel (see
    /// [`FileError::is_replicating`]). All data is written in that case and
    /// the caller may either close again until it succeeds or let the lease
    /// expire on its own.
    pub async fn close(&mut self) -> Result<(), FileError> {
        match self.complete_file().await {
            Ok(()) => Ok(()),
            Err(err)
                if self.store_in_db
                    && !self.small_file_buf.is_empty()
                    && matches!(err.kind(), Error::OutOfExtents(_)) =>
            {
                // The namenode cannot hold the file inline after all; write
                // the staged bytes out as blocks and complete once more
                // without the payload.
                warn!("{}; spilling {} to block storage", err, self.path);
                self.spill_small_file_buffer(Operation::Close)
                    .await
                    .map_err(|err| err.source)?;
                self.complete_file().await
            }
            Err(err) => Err(err),
        }
    }

    /// Streams the staged small-file bytes to block storage. They were
    /// accounted in `pos` when accepted, so the position is first rewound
    /// to the file offset where the buffer starts.
    async fn spill_small_file_buffer(&mut self, op: Operation) -> Result<usize, WriteError> {
        self.store_in_db = false;
        let spill = mem::take(&mut self.small_file_buf);
        self.pos -= spill.len() as u64;
        self.write_internal(&spill, op).await
    }

    async fn write_internal(&mut self, buf: &[u8], op: Operation) -> Result<usize, WriteError> {
        if self.block_writer.is_none() {
            self.start_new_block()
                .await
                .map_err(|source| WriteError { written: 0, source })?;
        }

        let mut off = 0;
        while off < buf.len() {
            match self.write_chunk(&buf[off..]).await {
                Ok(n) => {
                    off += n;
                    self.pos += n as u64;
                }
                Err(Error::EndOfBlock) => {
                    if let Err(source) = self.start_new_block().await {
                        return Err(WriteError {
                            written: off,
                            source,
                        });
                    }
                }
                Err(err) => {
                    return Err(WriteError {
                        written: off,
                        source: FileError::new(op, &self.path, err),
                    })
                }
            }
        }
        Ok(off)
    }

    /// Offers the head of `buf` to the block writer, through the encryption
    /// adapter when the file is encrypted. Returns the bytes consumed.
    ///
    /// The keystream advances by everything it encrypts, so whenever fewer
    /// bytes reach the block writer it is dropped; the next call rebuilds
    /// it at the then-current position.
    async fn write_chunk(&mut self, buf: &[u8]) -> Result<usize> {
        let writer = match self.block_writer.as_mut() {
            Some(writer) => writer,
            None => return Err(Error::transport("no block writer open")),
        };

        match self.enc.as_mut() {
            Some(enc) => {
                let ciphertext = enc.encrypt_at(self.pos, buf)?;
                match writer.write(ciphertext).await {
                    Ok(n) if n == buf.len() => Ok(n),
                    Ok(n) => {
                        enc.invalidate();
                        Ok(n)
                    }
                    Err(err) => {
                        enc.invalidate();
                        Err(err)
                    }
                }
            }
            None => writer.write(buf).await,
        }
    }

    /// Closes the current block if one is open and allocates the next one
    /// from the namenode, wiring a fresh block writer to it.
    async fn start_new_block(&mut self) -> Result<(), FileError> {
        let previous = match self.block_writer.as_ref() {
            Some(writer) => {
                let block = writer.block().b.clone();
                // TODO: the protocol permits allocating the next block
                // while the previous one's acknowledgements are still in
                // flight; they are serialized here.
                self.close_block()
                    .await
                    .map_err(|err| FileError::new(Operation::Create, &self.path, err))?;
                Some(block)
            }
            None => None,
        };

        let resp = self
            .add_block_with_retry(previous)
            .await
            .map_err(|err| FileError::new(Operation::Create, &self.path, err))?;
        let writer = self
            .open_block_writer(resp.block, 0, false)
            .await
            .map_err(|err| FileError::new(Operation::Create, &self.path, err))?;
        self.block_writer = Some(writer);
        Ok(())
    }

    /// Asks the namenode for a new block, retrying with exponential backoff
    /// while it still waits on the previous block's minimum replication.
    /// Every other fault aborts immediately.
    async fn add_block_with_retry(
        &mut self,
        previous: Option<ExtendedBlockProto>,
    ) -> Result<AddBlockResponseProto> {
        let req = AddBlockRequestProto {
            src: self.path.clone(),
            client_name: self.client_name.clone(),
            previous,
        };

        let mut delay = ADD_BLOCK_INITIAL_DELAY;
        let mut attempt = 0;
        loop {
            match self.namenode.add_block(req.clone()).await {
                Err(Error::NotReplicatedYet(reason)) => {
                    attempt += 1;
                    debug!(
                        "addBlock {} not replicated yet (attempt {}): {}",
                        self.path, attempt, reason
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    if attempt == ADD_BLOCK_ATTEMPTS {
                        return Err(Error::NotReplicatedYet(reason));
                    }
                }
                other => return other,
            }
        }
    }

    async fn open_block_writer(
        &self,
        block: LocatedBlockProto,
        offset: u64,
        append: bool,
    ) -> Result<Box<dyn BlockWriter>> {
        let use_datanode_hostname =
            transfer::use_datanode_hostname_override().unwrap_or(self.use_datanode_hostname);
        let options = BlockWriterOptions {
            client_name: self.client_name.clone(),
            block,
            block_size: self.block_size,
            offset,
            append,
            use_datanode_hostname,
            deadline: self.deadline,
        };
        self.transfer.open(options).await
    }

    /// Closes the current block, draining its send queue and waiting for
    /// acknowledgements. The writer is kept on failure so a later close can
    /// retry.
    async fn close_block(&mut self) -> Result<()> {
        if let Some(writer) = self.block_writer.as_mut() {
            writer.close().await?;
        }
        self.block_writer = None;
        Ok(())
    }

    /// Drains the current block and asks the namenode to seal the file,
    /// retrying while the server reports persistence still in progress.
    async fn complete_file(&mut self) -> Result<(), FileError> {
        let mut last = None;
        if !self.store_in_db {
            if let Some(writer) = self.block_writer.as_ref() {
                last = Some(writer.block().b.clone());
            }
            self.close_block()
                .await
                .map_err(|err| FileError::new(Operation::Close, &self.path, err))?;
        }

        let req = CompleteRequestProto {
            src: self.path.clone(),
            client_name: self.client_name.clone(),
            last,
            data: self
                .store_in_db
                .then(|| self.small_file_buf.clone().freeze()),
        };

        let mut delay = COMPLETE_INITIAL_DELAY;
        for _ in 0..COMPLETE_ATTEMPTS {
            let resp = self
                .namenode
                .complete(req.clone())
                .await
                .map_err(|err| FileError::new(Operation::Create, &self.path, err))?;
            if resp.result {
                return Ok(());
            }
            debug!("complete {} not acknowledged yet, backing off", self.path);
            tokio::time::sleep(delay).await;
            delay *= 2;
        }

        Err(FileError::new(
            Operation::Close,
            &self.path,
            Error::Replicating,
        ))
    }
}
