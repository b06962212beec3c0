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

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    proto::{CipherSuiteProto, FileEncryptionInfoProto},
    Result,
};

/// AES-CTR material resolved for one file. The pair stays fixed for the
/// file's lifetime; the keystream derived from it is positional state owned
/// by the writer.
#[derive(Clone)]
pub struct EncryptionKey {
    pub suite: CipherSuiteProto,
    pub key: Bytes,
    pub iv: Bytes,
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("suite", &self.suite)
            .field("key", &"<redacted>")
            .field("iv", &self.iv)
            .finish()
    }
}

/// Resolves the opaque per-file encryption info returned by the namenode
/// into usable key material, typically by unwrapping it through the cluster's
/// key management service.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn resolve(&self, info: &FileEncryptionInfoProto) -> Result<EncryptionKey>;
}
