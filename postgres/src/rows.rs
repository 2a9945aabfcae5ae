//! Row types and their mapping to domain types.
//!
//! Enum columns hold the wire literal; a value outside the enum surfaces as
//! [`StoreError::Corrupt`] instead of leaking a free-text string inward.

use chrono::{DateTime, Utc};
use client_portal_core::error::StoreError;
use client_portal_core::types::{
    Application, ApplicationId, Client, ClientId, ConsumptionEntryId, ConsumptionLogEntry,
    HumanTicketId, Location, Message, MessageId, Offering, OfferingId, StaffId, SupportTicket,
    TicketId, UnknownVariant, UserId,
};
use std::str::FromStr;
use uuid::Uuid;

pub(crate) const CLIENT_COLUMNS: &str =
    "id, plan_id, remaining_tickets, status, main_assignee_id, sub_assignee_id";

pub(crate) const TICKET_COLUMNS: &str = "id, human_id, client_id, subject, category, priority, \
     status, assignee_id, created_by_user_id, created_at, last_update";

pub(crate) const OFFERING_COLUMNS: &str = "id, kind, title, status, capacity, location, starts_at";

pub(crate) const APPLICATION_COLUMNS: &str =
    "id, offering_id, client_id, user_id, user_name, user_email, notes, applied_at";

pub(crate) const CONSUMPTION_COLUMNS: &str =
    "id, client_id, consumed_at, entry_type, description, ticket_cost, related_id";

fn parse<T: FromStr<Err = UnknownVariant>>(raw: &str) -> Result<T, StoreError> {
    raw.parse().map_err(|e: UnknownVariant| StoreError::Corrupt(e.to_string()))
}

fn unsigned(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {column}: {value}")))
}

/// Converts a count for an `INTEGER` column.
pub(crate) fn to_column(value: u32, column: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

#[derive(sqlx::FromRow)]
pub(crate) struct ClientRow {
    id: Uuid,
    plan_id: String,
    remaining_tickets: i32,
    status: String,
    main_assignee_id: Option<Uuid>,
    sub_assignee_id: Option<Uuid>,
}

impl TryFrom<ClientRow> for Client {
    type Error = StoreError;

    fn try_from(row: ClientRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ClientId::from_uuid(row.id),
            plan_id: row.plan_id,
            remaining_tickets: unsigned(row.remaining_tickets, "remaining_tickets")?,
            status: parse(&row.status)?,
            main_assignee_id: row.main_assignee_id.map(StaffId::from_uuid),
            sub_assignee_id: row.sub_assignee_id.map(StaffId::from_uuid),
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ConsumptionRow {
    id: Uuid,
    client_id: Uuid,
    consumed_at: DateTime<Utc>,
    entry_type: String,
    description: String,
    ticket_cost: i32,
    related_id: String,
}

impl TryFrom<ConsumptionRow> for ConsumptionLogEntry {
    type Error = StoreError;

    fn try_from(row: ConsumptionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ConsumptionEntryId::from_uuid(row.id),
            client_id: ClientId::from_uuid(row.client_id),
            date: row.consumed_at,
            entry_type: row.entry_type,
            description: row.description,
            ticket_cost: unsigned(row.ticket_cost, "ticket_cost")?,
            related_id: row.related_id,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TicketRow {
    id: Uuid,
    human_id: String,
    client_id: Uuid,
    subject: String,
    category: String,
    priority: String,
    status: String,
    assignee_id: Option<Uuid>,
    created_by_user_id: Uuid,
    created_at: DateTime<Utc>,
    last_update: DateTime<Utc>,
}

impl TryFrom<TicketRow> for SupportTicket {
    type Error = StoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: TicketId::from_uuid(row.id),
            human_id: HumanTicketId::from_raw(row.human_id),
            client_id: ClientId::from_uuid(row.client_id),
            subject: row.subject,
            category: row.category,
            priority: parse(&row.priority)?,
            status: parse(&row.status)?,
            assignee_id: row.assignee_id.map(StaffId::from_uuid),
            created_by_user_id: UserId::from_uuid(row.created_by_user_id),
            created_at: row.created_at,
            last_update: row.last_update,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct MessageRow {
    id: Uuid,
    ticket_id: Uuid,
    sender_user_id: Uuid,
    sender_type: String,
    body: String,
    posted_at: DateTime<Utc>,
    read_by: Vec<Uuid>,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: MessageId::from_uuid(row.id),
            ticket_id: TicketId::from_uuid(row.ticket_id),
            sender_user_id: UserId::from_uuid(row.sender_user_id),
            sender_type: parse(&row.sender_type)?,
            text: row.body,
            timestamp: row.posted_at,
            read_by: row.read_by.into_iter().map(UserId::from_uuid).collect(),
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct OfferingRow {
    id: Uuid,
    kind: String,
    title: String,
    status: String,
    capacity: i32,
    location: String,
    starts_at: Option<DateTime<Utc>>,
}

impl TryFrom<OfferingRow> for Offering {
    type Error = StoreError;

    fn try_from(row: OfferingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OfferingId::from_uuid(row.id),
            kind: parse(&row.kind)?,
            title: row.title,
            status: parse(&row.status)?,
            capacity: unsigned(row.capacity, "capacity")?,
            location: Location::from(row.location),
            starts_at: row.starts_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ApplicationRow {
    id: Uuid,
    offering_id: Uuid,
    client_id: Uuid,
    user_id: Uuid,
    user_name: String,
    user_email: String,
    notes: String,
    applied_at: DateTime<Utc>,
}

impl From<ApplicationRow> for Application {
    fn from(row: ApplicationRow) -> Self {
        Self {
            id: ApplicationId::from_uuid(row.id),
            offering_id: OfferingId::from_uuid(row.offering_id),
            client_id: ClientId::from_uuid(row.client_id),
            user_id: UserId::from_uuid(row.user_id),
            user_name: row.user_name,
            user_email: row.user_email,
            notes: row.notes,
            applied_at: row.applied_at,
        }
    }
}

/// Maps every row, failing on the first corrupt one.
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_portal_core::types::{ClientStatus, TicketStatus};

    #[test]
    fn test_unknown_enum_value_is_corrupt() {
        let result: Result<TicketStatus, _> = parse("closed");
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
        assert_eq!(parse::<ClientStatus>("trial"), Ok(ClientStatus::Trial));
    }

    #[test]
    fn test_negative_counts_are_corrupt() {
        assert_eq!(unsigned(3, "capacity"), Ok(3));
        assert!(matches!(unsigned(-1, "capacity"), Err(StoreError::Corrupt(_))));
        assert!(to_column(u32::MAX, "capacity").is_err());
    }
}
