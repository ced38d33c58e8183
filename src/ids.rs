//! Newtype identifiers. Every tenant-scoped entity is keyed by a `Uuid`
//! wrapped in a distinct type so that, e.g., a `ClientId` can never be passed
//! where a `SessionId` is expected — the compiler enforces the workspace
//! scoping discipline that otherwise has to state as a rule.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(WorkspaceId);
entity_id!(UserId);
entity_id!(ClientId);
entity_id!(AppointmentId);
entity_id!(SessionId);
entity_id!(SessionVersionId);
entity_id!(PaymentTransactionId);
entity_id!(AuditEventId);
