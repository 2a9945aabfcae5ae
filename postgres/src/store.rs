//! `PostgreSQL` implementation of [`PortalStore`] and [`PortalTransaction`].

use crate::rows::{
    convert_all, to_column, ApplicationRow, ClientRow, ConsumptionRow, MessageRow, OfferingRow,
    TicketRow, APPLICATION_COLUMNS, CLIENT_COLUMNS, CONSUMPTION_COLUMNS, OFFERING_COLUMNS,
    TICKET_COLUMNS,
};
use client_portal_core::access::Scope;
use client_portal_core::error::StoreError;
use client_portal_core::store::{
    ApplicationQuery, DebitOutcome, PortalStore, PortalTransaction, StoreFuture, TicketQuery,
};
use client_portal_core::types::{
    Application, Client, ClientId, ConsumptionLogEntry, Message, Offering, OfferingId,
    SupportTicket, TicketId, UserId,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};

/// Maps a driver error, singling out unique-constraint violations.
pub(crate) fn db_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation(db_err.message().to_string());
        }
    }
    StoreError::Database(e.to_string())
}

const MESSAGE_SELECT: &str = r"
    SELECT m.id, m.ticket_id, m.sender_user_id, m.sender_type, m.body, m.posted_at,
           COALESCE(array_agg(r.user_id) FILTER (WHERE r.user_id IS NOT NULL), '{}'::uuid[]) AS read_by
    FROM messages m
    LEFT JOIN message_reads r ON r.message_id = m.id
    WHERE m.ticket_id = $1
    GROUP BY m.id
    ORDER BY m.posted_at, m.seq
";

/// Appends the SQL restricting `client_id` to `scope`.
///
/// `Scope::Nothing` is handled by the callers, which skip the query.
fn push_scope(builder: &mut QueryBuilder<'_, Postgres>, scope: Scope) {
    match scope {
        Scope::Everything | Scope::Nothing => {}
        Scope::Client(client_id) => {
            builder
                .push(" AND client_id = ")
                .push_bind(*client_id.as_uuid());
        }
        Scope::AssignedStaff(staff_id) => {
            builder
                .push(" AND client_id IN (SELECT c.id FROM clients c WHERE c.main_assignee_id = ")
                .push_bind(*staff_id.as_uuid())
                .push(" OR c.sub_assignee_id = ")
                .push_bind(*staff_id.as_uuid())
                .push(")");
        }
    }
}

/// `PostgreSQL`-backed portal store.
///
/// # Example
///
/// ```ignore
/// use client_portal_postgres::PostgresPortalStore;
///
/// let store = PostgresPortalStore::connect("postgres://localhost/portal", 10).await?;
/// store.migrate().await?;
/// ```
#[derive(Clone, Debug)]
pub struct PostgresPortalStore {
    pool: PgPool,
}

impl PostgresPortalStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a pool of at most `max_connections`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;
        tracing::debug!(max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Run the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        tracing::debug!("Portal schema migrations applied");
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Provision a client (or overwrite its plan, balance, status and
    /// assignees).
    ///
    /// Balance grants and plan changes are owned by the billing side; this
    /// exists for provisioning scripts and tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    pub async fn upsert_client(&self, client: &Client) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO clients (id, plan_id, remaining_tickets, status, main_assignee_id, sub_assignee_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET plan_id = EXCLUDED.plan_id,
                remaining_tickets = EXCLUDED.remaining_tickets,
                status = EXCLUDED.status,
                main_assignee_id = EXCLUDED.main_assignee_id,
                sub_assignee_id = EXCLUDED.sub_assignee_id
            ",
        )
        .bind(client.id.as_uuid())
        .bind(&client.plan_id)
        .bind(to_column(client.remaining_tickets, "remaining_tickets")?)
        .bind(client.status.as_str())
        .bind(client.main_assignee_id.map(|id| *id.as_uuid()))
        .bind(client.sub_assignee_id.map(|id| *id.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    /// Provision a seminar or event (or overwrite it).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    pub async fn upsert_offering(&self, offering: &Offering) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO offerings (id, kind, title, status, capacity, location, starts_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET kind = EXCLUDED.kind,
                title = EXCLUDED.title,
                status = EXCLUDED.status,
                capacity = EXCLUDED.capacity,
                location = EXCLUDED.location,
                starts_at = EXCLUDED.starts_at
            ",
        )
        .bind(offering.id.as_uuid())
        .bind(offering.kind.as_str())
        .bind(&offering.title)
        .bind(offering.status.as_str())
        .bind(to_column(offering.capacity, "capacity")?)
        .bind(offering.location.as_str())
        .bind(offering.starts_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

impl PortalStore for PostgresPortalStore {
    fn begin(&self) -> StoreFuture<'_, Box<dyn PortalTransaction>> {
        Box::pin(async move {
            let tx = self.pool.begin().await.map_err(db_error)?;
            Ok(Box::new(PostgresTransaction { tx }) as Box<dyn PortalTransaction>)
        })
    }

    fn find_client(&self, id: ClientId) -> StoreFuture<'_, Option<Client>> {
        Box::pin(async move {
            let row: Option<ClientRow> =
                sqlx::query_as(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"))
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_error)?;
            row.map(Client::try_from).transpose()
        })
    }

    fn find_ticket(&self, id: TicketId) -> StoreFuture<'_, Option<SupportTicket>> {
        Box::pin(async move {
            let row: Option<TicketRow> = sqlx::query_as(&format!(
                "SELECT {TICKET_COLUMNS} FROM support_tickets WHERE id = $1"
            ))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
            row.map(SupportTicket::try_from).transpose()
        })
    }

    fn list_tickets(&self, query: TicketQuery) -> StoreFuture<'_, Vec<SupportTicket>> {
        Box::pin(async move {
            if query.scope == Scope::Nothing {
                return Ok(Vec::new());
            }

            let mut builder = QueryBuilder::<Postgres>::new(format!(
                "SELECT {TICKET_COLUMNS} FROM support_tickets WHERE TRUE"
            ));
            push_scope(&mut builder, query.scope);
            if let Some(status) = query.status {
                builder.push(" AND status = ").push_bind(status.as_str());
            }
            if let Some(priority) = query.priority {
                builder.push(" AND priority = ").push_bind(priority.as_str());
            }
            builder.push(" ORDER BY last_update DESC, human_id DESC");

            let rows: Vec<TicketRow> = builder
                .build_query_as()
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
            convert_all(rows)
        })
    }

    fn list_messages(&self, ticket_id: TicketId) -> StoreFuture<'_, Vec<Message>> {
        Box::pin(async move {
            let rows: Vec<MessageRow> = sqlx::query_as(MESSAGE_SELECT)
                .bind(ticket_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
            convert_all(rows)
        })
    }

    fn list_consumption(&self, client_id: ClientId) -> StoreFuture<'_, Vec<ConsumptionLogEntry>> {
        Box::pin(async move {
            let rows: Vec<ConsumptionRow> = sqlx::query_as(&format!(
                "SELECT {CONSUMPTION_COLUMNS} FROM consumption_log WHERE client_id = $1 ORDER BY consumed_at, id"
            ))
            .bind(client_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
            convert_all(rows)
        })
    }

    fn find_offering(&self, id: OfferingId) -> StoreFuture<'_, Option<Offering>> {
        Box::pin(async move {
            let row: Option<OfferingRow> =
                sqlx::query_as(&format!("SELECT {OFFERING_COLUMNS} FROM offerings WHERE id = $1"))
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_error)?;
            row.map(Offering::try_from).transpose()
        })
    }

    fn list_applications(&self, query: ApplicationQuery) -> StoreFuture<'_, Vec<Application>> {
        Box::pin(async move {
            if query.scope == Scope::Nothing {
                return Ok(Vec::new());
            }

            let mut builder = QueryBuilder::<Postgres>::new(format!(
                "SELECT {APPLICATION_COLUMNS} FROM applications WHERE TRUE"
            ));
            push_scope(&mut builder, query.scope);
            if let Some(offering_id) = query.offering_id {
                builder
                    .push(" AND offering_id = ")
                    .push_bind(*offering_id.as_uuid());
            }
            builder.push(" ORDER BY applied_at DESC");

            let rows: Vec<ApplicationRow> = builder
                .build_query_as()
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
            Ok(rows.into_iter().map(Application::from).collect())
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
            Ok(())
        })
    }
}

/// One database transaction. Rolled back when dropped uncommitted.
struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PortalTransaction for PostgresTransaction {
    fn debit_balance(&mut self, client_id: ClientId, amount: u32) -> StoreFuture<'_, DebitOutcome> {
        Box::pin(async move {
            let amount = to_column(amount, "amount")?;

            // Check and decrement in one statement; no row means the guard failed.
            let debited: Option<(i32,)> = sqlx::query_as(
                r"
                UPDATE clients
                SET remaining_tickets = remaining_tickets - $2
                WHERE id = $1 AND remaining_tickets >= $2
                RETURNING remaining_tickets
                ",
            )
            .bind(client_id.as_uuid())
            .bind(amount)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;

            if let Some((remaining,)) = debited {
                let remaining = u32::try_from(remaining)
                    .map_err(|_| StoreError::Corrupt(format!("negative balance: {remaining}")))?;
                return Ok(DebitOutcome::Debited { remaining });
            }

            let current: Option<(i32,)> =
                sqlx::query_as("SELECT remaining_tickets FROM clients WHERE id = $1")
                    .bind(client_id.as_uuid())
                    .fetch_optional(&mut *self.tx)
                    .await
                    .map_err(db_error)?;

            tracing::debug!(%client_id, amount, "Debit refused by balance guard");
            Ok(match current {
                Some((remaining,)) => DebitOutcome::Insufficient {
                    remaining: u32::try_from(remaining).unwrap_or(0),
                },
                None => DebitOutcome::UnknownClient,
            })
        })
    }

    fn append_consumption(&mut self, entry: ConsumptionLogEntry) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO consumption_log
                    (id, client_id, consumed_at, entry_type, description, ticket_cost, related_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(entry.id.as_uuid())
            .bind(entry.client_id.as_uuid())
            .bind(entry.date)
            .bind(&entry.entry_type)
            .bind(&entry.description)
            .bind(to_column(entry.ticket_cost, "ticket_cost")?)
            .bind(&entry.related_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
            Ok(())
        })
    }

    fn next_ticket_sequence(&mut self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let (next,): (i64,) = sqlx::query_as("SELECT nextval('ticket_number_seq')")
                .fetch_one(&mut *self.tx)
                .await
                .map_err(db_error)?;
            u64::try_from(next).map_err(|_| StoreError::Corrupt(format!("ticket sequence: {next}")))
        })
    }

    fn insert_ticket(&mut self, ticket: SupportTicket) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(&format!(
                "INSERT INTO support_tickets ({TICKET_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
            ))
            .bind(ticket.id.as_uuid())
            .bind(ticket.human_id.as_str())
            .bind(ticket.client_id.as_uuid())
            .bind(&ticket.subject)
            .bind(&ticket.category)
            .bind(ticket.priority.as_str())
            .bind(ticket.status.as_str())
            .bind(ticket.assignee_id.map(|id| *id.as_uuid()))
            .bind(ticket.created_by_user_id.as_uuid())
            .bind(ticket.created_at)
            .bind(ticket.last_update)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
            Ok(())
        })
    }

    fn lock_ticket(&mut self, id: TicketId) -> StoreFuture<'_, Option<SupportTicket>> {
        Box::pin(async move {
            let row: Option<TicketRow> = sqlx::query_as(&format!(
                "SELECT {TICKET_COLUMNS} FROM support_tickets WHERE id = $1 FOR UPDATE"
            ))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;
            row.map(SupportTicket::try_from).transpose()
        })
    }

    fn update_ticket(&mut self, ticket: SupportTicket) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE support_tickets
                SET status = $2, assignee_id = $3, last_update = $4
                WHERE id = $1
                ",
            )
            .bind(ticket.id.as_uuid())
            .bind(ticket.status.as_str())
            .bind(ticket.assignee_id.map(|id| *id.as_uuid()))
            .bind(ticket.last_update)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Database(format!("ticket {} does not exist", ticket.id)));
            }
            Ok(())
        })
    }

    fn insert_message(&mut self, message: Message) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO messages (id, ticket_id, sender_user_id, sender_type, body, posted_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(message.id.as_uuid())
            .bind(message.ticket_id.as_uuid())
            .bind(message.sender_user_id.as_uuid())
            .bind(message.sender_type.as_str())
            .bind(&message.text)
            .bind(message.timestamp)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;

            for reader in &message.read_by {
                sqlx::query("INSERT INTO message_reads (message_id, user_id) VALUES ($1, $2)")
                    .bind(message.id.as_uuid())
                    .bind(reader.as_uuid())
                    .execute(&mut *self.tx)
                    .await
                    .map_err(db_error)?;
            }
            Ok(())
        })
    }

    fn mark_messages_read(&mut self, ticket_id: TicketId, user_id: UserId) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                INSERT INTO message_reads (message_id, user_id)
                SELECT id, $2 FROM messages WHERE ticket_id = $1
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(ticket_id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
            Ok(result.rows_affected())
        })
    }

    fn lock_offering(&mut self, id: OfferingId) -> StoreFuture<'_, Option<Offering>> {
        Box::pin(async move {
            // Serializes registrations per offering so the capacity check holds.
            let row: Option<OfferingRow> = sqlx::query_as(&format!(
                "SELECT {OFFERING_COLUMNS} FROM offerings WHERE id = $1 FOR UPDATE"
            ))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;
            row.map(Offering::try_from).transpose()
        })
    }

    fn count_applications(&mut self, offering_id: OfferingId) -> StoreFuture<'_, u32> {
        Box::pin(async move {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM applications WHERE offering_id = $1")
                    .bind(offering_id.as_uuid())
                    .fetch_one(&mut *self.tx)
                    .await
                    .map_err(db_error)?;
            u32::try_from(count).map_err(|_| StoreError::Corrupt(format!("application count: {count}")))
        })
    }

    fn application_exists(
        &mut self,
        offering_id: OfferingId,
        client_id: ClientId,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let (exists,): (bool,) = sqlx::query_as(
                "SELECT EXISTS (SELECT 1 FROM applications WHERE offering_id = $1 AND client_id = $2)",
            )
            .bind(offering_id.as_uuid())
            .bind(client_id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error)?;
            Ok(exists)
        })
    }

    fn insert_application(&mut self, application: Application) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(&format!(
                "INSERT INTO applications ({APPLICATION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
            ))
            .bind(application.id.as_uuid())
            .bind(application.offering_id.as_uuid())
            .bind(application.client_id.as_uuid())
            .bind(application.user_id.as_uuid())
            .bind(&application.user_name)
            .bind(&application.user_email)
            .bind(&application.notes)
            .bind(application.applied_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move { self.tx.commit().await.map_err(db_error) })
    }
}
