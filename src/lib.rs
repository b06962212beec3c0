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

mod client;
mod crypto;
mod error;
mod kms;
mod namenode;
pub mod proto;
mod transfer;
mod writer;

pub use self::{
    client::{Client, ClientOptions},
    error::{Error, FileError, Operation, Result, WriteError},
    kms::{EncryptionKey, KeyProvider},
    namenode::NameNodeProtocol,
    transfer::{BlockTransfer, BlockWriter, BlockWriterOptions, USE_DATANODE_HOSTNAME_ENV},
    writer::{FileWriter, MAX_SMALL_FILE_SIZE},
};
