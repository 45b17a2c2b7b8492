use serde::Deserialize;

/// Body of an UpdateUserStatus request.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StatusUpdate {
    pub status: String,
}

/// Logical intent a caller expressed against the relay, with the
/// parameters it supplied. Immutable for the lifetime of one request.
#[derive(Clone, Debug, PartialEq)]
pub enum OperationKind {
    ListUsers {
        page: Option<u32>,
        limit: Option<u32>,
    },
    GetPendingUsers {
        year: Option<u16>,
    },
    GetUser {
        id: String,
    },
    UpdateUserStatus {
        id: String,
        update: StatusUpdate,
    },
}

impl OperationKind {
    pub const fn name(&self) -> &'static str {
        match self {
            OperationKind::ListUsers { .. } => "ListUsers",
            OperationKind::GetPendingUsers { .. } => "GetPendingUsers",
            OperationKind::GetUser { .. } => "GetUser",
            OperationKind::UpdateUserStatus { .. } => "UpdateUserStatus",
        }
    }
}

/// One caller request to the relay: the intent plus the credential to
/// forward. Created when the inbound request arrives and discarded with
/// the response.
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    /// Caller's bearer token, forwarded verbatim to every candidate
    pub bearer: Option<String>,
}

impl Operation {
    pub fn new(kind: OperationKind, bearer: Option<String>) -> Self {
        Self { kind, bearer }
    }
}
