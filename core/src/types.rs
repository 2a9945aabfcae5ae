//! Domain types for the client portal engine.
//!
//! Identifiers are UUID newtypes. Enumerations whose stored/wire form is a
//! Japanese literal (ticket status, priority, offering status) are closed
//! Rust enums; the literal only appears in `as_str`, `FromStr` and serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Creates a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a client (tenant)
    ClientId
);
uuid_id!(
    /// Unique identifier for a staff member
    StaffId
);
uuid_id!(
    /// Unique identifier for a portal user account
    UserId
);
uuid_id!(
    /// Unique identifier for a support ticket (case)
    TicketId
);
uuid_id!(
    /// Unique identifier for a message in a ticket thread
    MessageId
);
uuid_id!(
    /// Unique identifier for a consumption ledger entry
    ConsumptionEntryId
);
uuid_id!(
    /// Unique identifier for a seminar or event
    OfferingId
);
uuid_id!(
    /// Unique identifier for an application to an offering
    ApplicationId
);

/// Human-facing ticket number, e.g. `T-0001`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HumanTicketId(String);

impl HumanTicketId {
    /// Formats a sequence number as `T-` followed by at least four digits.
    #[must_use]
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("T-{sequence:04}"))
    }

    /// Wraps an already formatted identifier (as read back from storage).
    #[must_use]
    pub const fn from_raw(raw: String) -> Self {
        Self(raw)
    }

    /// The formatted identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HumanTicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Wire enumerations
// ============================================================================

/// A stored or submitted string did not name any variant of a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    /// Name of the enum being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The external string form.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

wire_enum!(
    /// Lifecycle state of a support ticket.
    ///
    /// Any state may be set to any other by an authorized actor; the enum
    /// only constrains membership.
    TicketStatus {
        /// Received, the initial state
        Received => "受付中",
        /// Being handled by support
        InProgress => "対応中",
        /// Completed
        Completed => "完了",
    }
);

wire_enum!(
    /// Priority of a support ticket.
    Priority {
        /// High
        High => "高",
        /// Medium
        Medium => "中",
        /// Low
        Low => "低",
    }
);

wire_enum!(
    /// Who authored a message.
    SenderType {
        /// A client-side user
        User => "user",
        /// A staff member
        Support => "support",
        /// An administrator
        Admin => "admin",
        /// The engine itself (status/assignment notices)
        System => "system",
    }
);

wire_enum!(
    /// Account status of a client.
    ClientStatus {
        /// Paying, active client
        Active => "active",
        /// Suspended client
        Suspended => "suspended",
        /// Client on a trial plan
        Trial => "trial",
    }
);

wire_enum!(
    /// Role of an authenticated actor.
    Role {
        /// A user of a client account
        Client => "CLIENT",
        /// Administrator of a client account
        ClientAdmin => "CLIENTADMIN",
        /// Support staff
        Staff => "STAFF",
        /// Platform administrator
        Admin => "ADMIN",
        /// Platform super administrator
        SuperAdmin => "SUPERADMIN",
        /// Affiliate partner
        Affiliate => "AFFILIATE",
    }
);

impl Role {
    /// CLIENT or CLIENTADMIN.
    #[must_use]
    pub const fn is_client_side(self) -> bool {
        matches!(self, Self::Client | Self::ClientAdmin)
    }

    /// ADMIN or SUPERADMIN.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

wire_enum!(
    /// Kind of offering a client can register for.
    OfferingKind {
        /// A seminar
        Seminar => "seminar",
        /// An event
        Event => "event",
    }
);

impl OfferingKind {
    /// Ledger category recorded when registering consumes a ticket.
    #[must_use]
    pub const fn consumption_type(self) -> &'static str {
        match self {
            Self::Seminar => consumption_type::SEMINAR,
            Self::Event => consumption_type::ONLINE_EVENT,
        }
    }
}

wire_enum!(
    /// Registration status of an offering.
    OfferingStatus {
        /// Open for registration
        Open => "募集中",
        /// Registration closed
        Closed => "締切",
        /// The offering has taken place
        Finished => "終了",
    }
);

/// Where an offering takes place.
///
/// Only `オンライン` is remote; every other venue text is in-person.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Location {
    /// Remote attendance; registering consumes one ticket
    Online,
    /// In-person at the named venue (e.g. `対面`)
    Venue(String),
}

impl Location {
    /// Wire form of the remote location.
    pub const ONLINE: &'static str = "オンライン";

    /// Whether attendance is remote.
    #[must_use]
    pub const fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }

    /// The external string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Online => Self::ONLINE,
            Self::Venue(venue) => venue,
        }
    }
}

impl From<String> for Location {
    fn from(raw: String) -> Self {
        if raw == Self::ONLINE {
            Self::Online
        } else {
            Self::Venue(raw)
        }
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        match location {
            Location::Online => Location::ONLINE.to_string(),
            Location::Venue(venue) => venue,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger categories written by the built-in call sites.
pub mod consumption_type {
    /// A new support case
    pub const NEW_CONSULTATION: &str = "新規相談";
    /// Registration to an online seminar
    pub const SEMINAR: &str = "セミナー参加";
    /// Registration to an online event
    pub const ONLINE_EVENT: &str = "オンラインイベント参加";
}

// ============================================================================
// Entities
// ============================================================================

/// A tenant of the portal and holder of the ticket balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Client identifier
    pub id: ClientId,
    /// Subscribed plan
    pub plan_id: String,
    /// Remaining entitlement tickets (never negative)
    pub remaining_tickets: u32,
    /// Account status
    pub status: ClientStatus,
    /// Main staff assignee
    pub main_assignee_id: Option<StaffId>,
    /// Secondary staff assignee
    pub sub_assignee_id: Option<StaffId>,
}

impl Client {
    /// The client's main/sub staff pair.
    #[must_use]
    pub const fn assignees(&self) -> ClientAssignees {
        ClientAssignees {
            main: self.main_assignee_id,
            sub: self.sub_assignee_id,
        }
    }
}

/// Main and sub staff assignees of a client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientAssignees {
    /// Main assignee
    pub main: Option<StaffId>,
    /// Sub assignee
    pub sub: Option<StaffId>,
}

impl ClientAssignees {
    /// Whether `staff` is either the main or the sub assignee.
    #[must_use]
    pub fn includes(&self, staff: StaffId) -> bool {
        self.main == Some(staff) || self.sub == Some(staff)
    }
}

/// One immutable record of a ticket debit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionLogEntry {
    /// Entry identifier
    pub id: ConsumptionEntryId,
    /// Debited client
    pub client_id: ClientId,
    /// When the debit happened
    pub date: DateTime<Utc>,
    /// Free-text category (see [`consumption_type`])
    #[serde(rename = "type")]
    pub entry_type: String,
    /// Human-readable description
    pub description: String,
    /// Number of tickets debited (positive)
    pub ticket_cost: u32,
    /// Identifier of the ticket/seminar/event that caused the debit
    pub related_id: String,
}

/// A client support request (case).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    /// Ticket identifier
    pub id: TicketId,
    /// Human-facing number
    pub human_id: HumanTicketId,
    /// Owning client
    pub client_id: ClientId,
    /// Subject line
    pub subject: String,
    /// Free-text category
    pub category: String,
    /// Priority
    pub priority: Priority,
    /// Lifecycle state
    pub status: TicketStatus,
    /// Staff member handling the case
    pub assignee_id: Option<StaffId>,
    /// User who opened the case
    pub created_by_user_id: UserId,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last activity (new message, status or assignment change)
    pub last_update: DateTime<Utc>,
}

/// One entry of a ticket's message thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message identifier
    pub id: MessageId,
    /// Ticket the message belongs to
    pub ticket_id: TicketId,
    /// Author
    pub sender_user_id: UserId,
    /// Author category
    pub sender_type: SenderType,
    /// Body
    pub text: String,
    /// When the message was posted
    pub timestamp: DateTime<Utc>,
    /// Users who have read the message
    pub read_by: BTreeSet<UserId>,
}

/// A seminar or event open to client registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offering {
    /// Offering identifier
    pub id: OfferingId,
    /// Seminar or event
    pub kind: OfferingKind,
    /// Title
    pub title: String,
    /// Registration status
    pub status: OfferingStatus,
    /// Maximum number of applications
    pub capacity: u32,
    /// Venue; `オンライン` means remote
    pub location: Location,
    /// Scheduled start
    pub starts_at: Option<DateTime<Utc>>,
}

/// A client's registration to an offering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Application identifier
    pub id: ApplicationId,
    /// Target offering
    pub offering_id: OfferingId,
    /// Applying client
    pub client_id: ClientId,
    /// User who submitted the application
    pub user_id: UserId,
    /// Attendee name
    pub user_name: String,
    /// Attendee e-mail
    pub user_email: String,
    /// Free-form notes
    pub notes: String,
    /// Submission time
    pub applied_at: DateTime<Utc>,
}
