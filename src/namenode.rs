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

use async_trait::async_trait;

use crate::{proto::*, Result};

/// The namenode RPCs the write path consumes.
///
/// Implementations own connection management, request framing, and deadline
/// enforcement, and must map server exceptions into the kinds of
/// [`crate::Error`] before returning. In particular `getFileInfo` on a
/// missing path yields [`crate::Error::NotFound`], a pending minimum
/// replication on `addBlock` yields [`crate::Error::NotReplicatedYet`], and
/// inline-extent exhaustion on `complete` yields
/// [`crate::Error::OutOfExtents`].
#[async_trait]
pub trait NameNodeProtocol: Send + Sync {
    async fn get_file_info(&self, req: GetFileInfoRequestProto)
        -> Result<GetFileInfoResponseProto>;

    async fn server_defaults(
        &self,
        req: GetServerDefaultsRequestProto,
    ) -> Result<GetServerDefaultsResponseProto>;

    async fn create(&self, req: CreateRequestProto) -> Result<CreateResponseProto>;

    async fn append(&self, req: AppendRequestProto) -> Result<AppendResponseProto>;

    async fn add_block(&self, req: AddBlockRequestProto) -> Result<AddBlockResponseProto>;

    async fn complete(&self, req: CompleteRequestProto) -> Result<CompleteResponseProto>;

    async fn delete(&self, req: DeleteRequestProto) -> Result<DeleteResponseProto>;
}
