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

//! Wire messages for the subset of the client-namenode protocol this crate
//! speaks. Hand-maintained against the upstream Hadoop field tags; only the
//! fields the write path consumes are modeled. Serialization is owned by the
//! transport behind [`crate::NameNodeProtocol`].

use bytes::Bytes;

/// Storage policy identifier denoting a small file stored inline in the
/// namenode's database instead of as replicated blocks.
pub const DB_STORAGE_POLICY_ID: u32 = 14;

pub const CREATE_FLAG_CREATE: u32 = 0x01;
pub const CREATE_FLAG_OVERWRITE: u32 = 0x02;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CryptoProtocolVersionProto {
    UnknownProtocolVersion = 1,
    EncryptionZones = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CipherSuiteProto {
    Unknown = 1,
    AesCtrNopadding = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FsPermissionProto {
    #[prost(uint32, required, tag = "1")]
    pub perm: u32,
}

/// Identifies a block: pool, id, and generation stamp, plus the cumulative
/// length known to the holder.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExtendedBlockProto {
    #[prost(string, required, tag = "1")]
    pub pool_id: String,
    #[prost(uint64, required, tag = "2")]
    pub block_id: u64,
    #[prost(uint64, required, tag = "3")]
    pub generation_stamp: u64,
    #[prost(uint64, optional, tag = "4")]
    pub num_bytes: Option<u64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TokenProto {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub identifier: Bytes,
    #[prost(bytes = "bytes", required, tag = "2")]
    pub password: Bytes,
    #[prost(string, required, tag = "3")]
    pub kind: String,
    #[prost(string, required, tag = "4")]
    pub service: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DatanodeIdProto {
    #[prost(string, required, tag = "1")]
    pub ip_addr: String,
    #[prost(string, required, tag = "2")]
    pub host_name: String,
    #[prost(string, required, tag = "3")]
    pub datanode_uuid: String,
    #[prost(uint32, required, tag = "4")]
    pub xfer_port: u32,
    #[prost(uint32, required, tag = "5")]
    pub info_port: u32,
    #[prost(uint32, required, tag = "6")]
    pub ipc_port: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DatanodeInfoProto {
    #[prost(message, required, tag = "1")]
    pub id: DatanodeIdProto,
}

/// A block plus the ordered pipeline of datanodes holding it and the access
/// token authorizing transfers. Small files stored inline arrive as a
/// phantom block carrying `data` instead of locations.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LocatedBlockProto {
    #[prost(message, required, tag = "1")]
    pub b: ExtendedBlockProto,
    #[prost(uint64, required, tag = "2")]
    pub offset: u64,
    #[prost(message, repeated, tag = "3")]
    pub locs: Vec<DatanodeInfoProto>,
    #[prost(bool, required, tag = "4")]
    pub corrupt: bool,
    #[prost(message, required, tag = "5")]
    pub block_token: TokenProto,
    #[prost(bytes = "bytes", optional, tag = "21")]
    pub data: Option<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileEncryptionInfoProto {
    #[prost(enumeration = "CipherSuiteProto", required, tag = "1")]
    pub suite: i32,
    #[prost(enumeration = "CryptoProtocolVersionProto", required, tag = "2")]
    pub crypto_protocol_version: i32,
    #[prost(bytes = "bytes", required, tag = "3")]
    pub key: Bytes,
    #[prost(bytes = "bytes", required, tag = "4")]
    pub iv: Bytes,
    #[prost(string, required, tag = "5")]
    pub key_name: String,
    #[prost(string, required, tag = "6")]
    pub ez_key_version_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HdfsFileStatusProto {
    #[prost(uint64, required, tag = "3")]
    pub length: u64,
    #[prost(uint32, optional, tag = "10")]
    pub block_replication: Option<u32>,
    #[prost(uint64, optional, tag = "11")]
    pub blocksize: Option<u64>,
    #[prost(uint64, optional, tag = "13")]
    pub file_id: Option<u64>,
    #[prost(message, optional, tag = "15")]
    pub file_encryption_info: Option<FileEncryptionInfoProto>,
    #[prost(uint32, optional, tag = "16")]
    pub storage_policy: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FsServerDefaultsProto {
    #[prost(uint64, required, tag = "1")]
    pub block_size: u64,
    #[prost(uint32, required, tag = "2")]
    pub bytes_per_checksum: u32,
    #[prost(uint32, required, tag = "3")]
    pub write_packet_size: u32,
    #[prost(uint32, required, tag = "4")]
    pub replication: u32,
    #[prost(uint32, required, tag = "5")]
    pub file_buffer_size: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetFileInfoRequestProto {
    #[prost(string, required, tag = "1")]
    pub src: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetFileInfoResponseProto {
    #[prost(message, optional, tag = "1")]
    pub fs: Option<HdfsFileStatusProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetServerDefaultsRequestProto {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetServerDefaultsResponseProto {
    #[prost(message, required, tag = "1")]
    pub server_defaults: FsServerDefaultsProto,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateRequestProto {
    #[prost(string, required, tag = "1")]
    pub src: String,
    #[prost(message, required, tag = "2")]
    pub masked: FsPermissionProto,
    #[prost(string, required, tag = "3")]
    pub client_name: String,
    #[prost(uint32, required, tag = "4")]
    pub create_flag: u32,
    #[prost(bool, required, tag = "5")]
    pub create_parent: bool,
    #[prost(uint32, required, tag = "6")]
    pub replication: u32,
    #[prost(uint64, required, tag = "7")]
    pub block_size: u64,
    #[prost(
        enumeration = "CryptoProtocolVersionProto",
        repeated,
        packed = "false",
        tag = "8"
    )]
    pub crypto_protocol_version: Vec<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateResponseProto {
    #[prost(message, optional, tag = "1")]
    pub fs: Option<HdfsFileStatusProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppendRequestProto {
    #[prost(string, required, tag = "1")]
    pub src: String,
    #[prost(string, required, tag = "2")]
    pub client_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppendResponseProto {
    /// Absent when the file is empty or its last block is full.
    #[prost(message, optional, tag = "1")]
    pub block: Option<LocatedBlockProto>,
    #[prost(message, optional, tag = "2")]
    pub stat: Option<HdfsFileStatusProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AddBlockRequestProto {
    #[prost(string, required, tag = "1")]
    pub src: String,
    #[prost(string, required, tag = "2")]
    pub client_name: String,
    #[prost(message, optional, tag = "3")]
    pub previous: Option<ExtendedBlockProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AddBlockResponseProto {
    #[prost(message, required, tag = "1")]
    pub block: LocatedBlockProto,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CompleteRequestProto {
    #[prost(string, required, tag = "1")]
    pub src: String,
    #[prost(string, required, tag = "2")]
    pub client_name: String,
    #[prost(message, optional, tag = "3")]
    pub last: Option<ExtendedBlockProto>,
    /// Inline payload for a small file stored in the namenode's database.
    #[prost(bytes = "bytes", optional, tag = "5")]
    pub data: Option<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CompleteResponseProto {
    #[prost(bool, required, tag = "1")]
    pub result: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteRequestProto {
    #[prost(string, required, tag = "1")]
    pub src: String,
    #[prost(bool, required, tag = "2")]
    pub recursive: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteResponseProto {
    #[prost(bool, required, tag = "1")]
    pub result: bool,
}

impl From<i32> for CipherSuiteProto {
    fn from(suite: i32) -> Self {
        CipherSuiteProto::from_i32(suite).unwrap_or(CipherSuiteProto::Unknown)
    }
}

impl From<i32> for CryptoProtocolVersionProto {
    fn from(version: i32) -> Self {
        CryptoProtocolVersionProto::from_i32(version)
            .unwrap_or(CryptoProtocolVersionProto::UnknownProtocolVersion)
    }
}
