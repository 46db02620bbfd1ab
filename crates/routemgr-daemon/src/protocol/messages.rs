//! Typed backend messages.
//!
//! One frame carries one [`BackendMessage`], a protobuf message whose
//! payload is a oneof over every request/reply kind exchanged with
//! backend clients. The structs are written by hand with prost derives;
//! tags are part of the wire contract and must not be renumbered.
//!
//! Direction conventions:
//!
//! - client → server: `SubscribeReq`, `TxnReply`, `CfgDataReply`,
//!   `CfgApplyReply`, `GetReply`, `CfgCmdReply`, `ShowCmdReply`,
//!   `NotifyData`
//! - server → client: `SubscribeReply`, `TxnReq`, `CfgDataReq`,
//!   `CfgApplyReq`, `GetReq`, `CfgCmdReq`, `ShowCmdReq`
//!
//! The `Get`/`CfgCmd`/`ShowCmd`/`NotifyData` kinds are carried for wire
//! compatibility; the server accepts and drops them.

use prost::Message;

/// How one config-data item mutates the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum CfgAction {
    /// Create or replace the node's value.
    Set = 0,
    /// Remove the node.
    Delete = 1,
}

/// One configuration datum inside a `CfgDataReq` batch.
#[derive(Clone, PartialEq, Message)]
pub struct CfgDataItem {
    /// Mutation kind; see [`CfgAction`].
    #[prost(enumeration = "CfgAction", tag = "1")]
    pub action: i32,
    /// Instance path of the node.
    #[prost(string, tag = "2")]
    pub xpath: String,
    /// Serialized value; absent for deletes.
    #[prost(string, optional, tag = "3")]
    pub value: Option<String>,
}

/// Client registration: names the client and its subtree interests.
#[derive(Clone, PartialEq, Message)]
pub struct SubscribeReq {
    /// The client's well-known name.
    #[prost(string, tag = "1")]
    pub client_name: String,
    /// True to register the listed xpaths, false to deregister.
    #[prost(bool, tag = "2")]
    pub subscribe_xpaths: bool,
    /// Subtree patterns the client claims.
    #[prost(string, repeated, tag = "3")]
    pub xpath_reg: Vec<String>,
}

/// Server acknowledgement of a subscribe request.
#[derive(Clone, PartialEq, Message)]
pub struct SubscribeReply {
    /// Whether the registration was accepted.
    #[prost(bool, tag = "1")]
    pub success: bool,
}

/// Create or destroy a configuration transaction on the client.
#[derive(Clone, PartialEq, Message)]
pub struct TxnReq {
    /// Transaction identifier.
    #[prost(uint64, tag = "1")]
    pub txn_id: u64,
    /// True to create, false to destroy.
    #[prost(bool, tag = "2")]
    pub create: bool,
}

/// Client response to a [`TxnReq`].
#[derive(Clone, PartialEq, Message)]
pub struct TxnReply {
    /// Transaction identifier.
    #[prost(uint64, tag = "1")]
    pub txn_id: u64,
    /// Echoes the request's create flag.
    #[prost(bool, tag = "2")]
    pub create: bool,
    /// Whether the operation succeeded.
    #[prost(bool, tag = "3")]
    pub success: bool,
}

/// One batch of configuration data within a transaction.
#[derive(Clone, PartialEq, Message)]
pub struct CfgDataReq {
    /// Transaction identifier.
    #[prost(uint64, tag = "1")]
    pub txn_id: u64,
    /// Batch identifier, unique within the transaction.
    #[prost(uint64, tag = "2")]
    pub batch_id: u64,
    /// The config data carried by this batch.
    #[prost(message, repeated, tag = "3")]
    pub data_req: Vec<CfgDataItem>,
    /// True on the final batch of the transaction.
    #[prost(bool, tag = "4")]
    pub end_of_data: bool,
}

/// Client response to one [`CfgDataReq`] batch.
#[derive(Clone, PartialEq, Message)]
pub struct CfgDataReply {
    /// Transaction identifier.
    #[prost(uint64, tag = "1")]
    pub txn_id: u64,
    /// Batch identifier being acknowledged.
    #[prost(uint64, tag = "2")]
    pub batch_id: u64,
    /// Whether the batch was validated and staged.
    #[prost(bool, tag = "3")]
    pub success: bool,
    /// Client-provided failure detail, forwarded verbatim.
    #[prost(string, optional, tag = "4")]
    pub error_if_any: Option<String>,
}

/// Ask the client to apply all staged batches of a transaction.
#[derive(Clone, PartialEq, Message)]
pub struct CfgApplyReq {
    /// Transaction identifier.
    #[prost(uint64, tag = "1")]
    pub txn_id: u64,
}

/// Client response to a [`CfgApplyReq`].
#[derive(Clone, PartialEq, Message)]
pub struct CfgApplyReply {
    /// Transaction identifier.
    #[prost(uint64, tag = "1")]
    pub txn_id: u64,
    /// Whether the apply succeeded.
    #[prost(bool, tag = "2")]
    pub success: bool,
    /// The batches covered by this apply.
    #[prost(uint64, repeated, tag = "3")]
    pub batch_ids: Vec<u64>,
    /// Client-provided failure detail, forwarded verbatim.
    #[prost(string, optional, tag = "4")]
    pub error_if_any: Option<String>,
}

/// Reserved: operational-data get request.
#[derive(Clone, PartialEq, Message)]
pub struct GetReq {
    /// Paths to fetch.
    #[prost(string, repeated, tag = "1")]
    pub xpath: Vec<String>,
}

/// Reserved: operational-data get reply.
#[derive(Clone, PartialEq, Message)]
pub struct GetReply {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, optional, tag = "2")]
    pub error_if_any: Option<String>,
}

/// Reserved: config command passthrough.
#[derive(Clone, PartialEq, Message)]
pub struct CfgCmdReq {
    #[prost(string, repeated, tag = "1")]
    pub cmds: Vec<String>,
}

/// Reserved: config command reply.
#[derive(Clone, PartialEq, Message)]
pub struct CfgCmdReply {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, optional, tag = "2")]
    pub error_if_any: Option<String>,
}

/// Reserved: show command passthrough.
#[derive(Clone, PartialEq, Message)]
pub struct ShowCmdReq {
    #[prost(string, repeated, tag = "1")]
    pub cmds: Vec<String>,
}

/// Reserved: show command reply.
#[derive(Clone, PartialEq, Message)]
pub struct ShowCmdReply {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, repeated, tag = "2")]
    pub output: Vec<String>,
}

/// Reserved: unsolicited operational-state notification.
#[derive(Clone, PartialEq, Message)]
pub struct NotifyData {
    #[prost(string, repeated, tag = "1")]
    pub data: Vec<String>,
}

/// The discriminated union carried by every frame.
#[derive(Clone, PartialEq, prost::Oneof)]
pub enum Payload {
    /// Client registration.
    #[prost(message, tag = "1")]
    SubscribeReq(SubscribeReq),
    /// Registration acknowledgement.
    #[prost(message, tag = "2")]
    SubscribeReply(SubscribeReply),
    /// Transaction create/destroy request.
    #[prost(message, tag = "3")]
    TxnReq(TxnReq),
    /// Transaction create/destroy reply.
    #[prost(message, tag = "4")]
    TxnReply(TxnReply),
    /// Config data batch.
    #[prost(message, tag = "5")]
    CfgDataReq(CfgDataReq),
    /// Config data batch acknowledgement.
    #[prost(message, tag = "6")]
    CfgDataReply(CfgDataReply),
    /// Apply request.
    #[prost(message, tag = "7")]
    CfgApplyReq(CfgApplyReq),
    /// Apply reply.
    #[prost(message, tag = "8")]
    CfgApplyReply(CfgApplyReply),
    /// Reserved.
    #[prost(message, tag = "9")]
    GetReq(GetReq),
    /// Reserved.
    #[prost(message, tag = "10")]
    GetReply(GetReply),
    /// Reserved.
    #[prost(message, tag = "11")]
    CfgCmdReq(CfgCmdReq),
    /// Reserved.
    #[prost(message, tag = "12")]
    CfgCmdReply(CfgCmdReply),
    /// Reserved.
    #[prost(message, tag = "13")]
    ShowCmdReq(ShowCmdReq),
    /// Reserved.
    #[prost(message, tag = "14")]
    ShowCmdReply(ShowCmdReply),
    /// Reserved.
    #[prost(message, tag = "15")]
    NotifyData(NotifyData),
}

impl Payload {
    /// Stable kind name for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SubscribeReq(_) => "SUBSCR_REQ",
            Self::SubscribeReply(_) => "SUBSCR_REPLY",
            Self::TxnReq(_) => "TXN_REQ",
            Self::TxnReply(_) => "TXN_REPLY",
            Self::CfgDataReq(_) => "CFG_DATA_REQ",
            Self::CfgDataReply(_) => "CFG_DATA_REPLY",
            Self::CfgApplyReq(_) => "CFG_APPLY_REQ",
            Self::CfgApplyReply(_) => "CFG_APPLY_REPLY",
            Self::GetReq(_) => "GET_REQ",
            Self::GetReply(_) => "GET_REPLY",
            Self::CfgCmdReq(_) => "CFG_CMD_REQ",
            Self::CfgCmdReply(_) => "CFG_CMD_REPLY",
            Self::ShowCmdReq(_) => "SHOW_CMD_REQ",
            Self::ShowCmdReply(_) => "SHOW_CMD_REPLY",
            Self::NotifyData(_) => "NOTIFY_DATA",
        }
    }
}

/// Envelope for one wire frame.
#[derive(Clone, PartialEq, Message)]
pub struct BackendMessage {
    /// The message kind and its fields; absent payloads are tolerated on
    /// decode and ignored by the dispatcher.
    #[prost(oneof = "Payload", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15")]
    pub payload: Option<Payload>,
}

impl BackendMessage {
    /// Wraps a payload into an envelope.
    #[must_use]
    pub const fn new(payload: Payload) -> Self {
        Self {
            payload: Some(payload),
        }
    }

    /// Builds a transaction create/destroy request.
    #[must_use]
    pub const fn txn_req(txn_id: u64, create: bool) -> Self {
        Self::new(Payload::TxnReq(TxnReq { txn_id, create }))
    }

    /// Builds a config-data batch request.
    #[must_use]
    pub fn cfg_data_req(
        txn_id: u64,
        batch_id: u64,
        data_req: Vec<CfgDataItem>,
        end_of_data: bool,
    ) -> Self {
        Self::new(Payload::CfgDataReq(CfgDataReq {
            txn_id,
            batch_id,
            data_req,
            end_of_data,
        }))
    }

    /// Builds an apply request.
    #[must_use]
    pub const fn cfg_apply_req(txn_id: u64) -> Self {
        Self::new(Payload::CfgApplyReq(CfgApplyReq { txn_id }))
    }

    /// Encodes to wire bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decodes from wire bytes.
    ///
    /// # Errors
    ///
    /// Returns the prost decode error for malformed payloads.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        Self::decode(bytes)
    }
}
