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

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    kms::KeyProvider, namenode::NameNodeProtocol, transfer::BlockTransfer, FileError,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Name this client registers with the namenode; identifies the lease
    /// holder for every file it opens.
    pub client_name: String,
    /// Dial datanodes by hostname instead of the IP address the namenode
    /// reports. Overridable at runtime through the environment, see
    /// [`crate::USE_DATANODE_HOSTNAME_ENV`].
    pub use_datanode_hostname: bool,
    /// Permission bits applied by [`Client::create`].
    pub default_permissions: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            client_name: format!("hdfs-client-{}", std::process::id()),
            use_datanode_hostname: false,
            default_permissions: 0o644,
        }
    }
}

/// A handle to the filesystem, holding the namenode connection, the block
/// transfer layer, and optionally a key provider for encryption zones.
#[derive(Clone)]
pub struct Client {
    pub(crate) namenode: Arc<dyn NameNodeProtocol>,
    pub(crate) transfer: Arc<dyn BlockTransfer>,
    pub(crate) key_provider: Option<Arc<dyn KeyProvider>>,
    pub(crate) options: ClientOptions,
}

impl Client {
    pub fn new(
        namenode: Arc<dyn NameNodeProtocol>,
        transfer: Arc<dyn BlockTransfer>,
        options: ClientOptions,
    ) -> Self {
        Client {
            namenode,
            transfer,
            key_provider: None,
            options,
        }
    }

    /// Installs the key provider used to resolve encryption material for
    /// files inside encryption zones. Without one, opening such a file
    /// fails.
    pub fn with_key_provider(mut self, provider: Arc<dyn KeyProvider>) -> Self {
        self.key_provider = Some(provider);
        self
    }

    #[inline(always)]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Creates an empty file at `path` with the default permissions.
    pub async fn create_empty_file(&self, path: &str) -> Result<(), FileError> {
        let mut writer = self.create(path).await?;
        writer.close().await
    }
}
