use async_trait::async_trait;
use common::{CustomerId, OrganizationId, PropertyId, ReservationId};
use domain::{Attributes, Money, Reservation, ReservationStatus, StayPeriod};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow, types::Json};
use uuid::Uuid;

use crate::{ReservationQuery, Result, StoreError, store::ReservationStore};

const SELECT_COLUMNS: &str = "SELECT id, organization_id, property_id, customer_id, check_in, check_out, \
     status, total_price_cents, price_elements, guests, guest_data, additional_requests, \
     payment_reference, created_at, updated_at, version FROM reservations";

const OVERLAP_SQL: &str = r#"
    SELECT EXISTS (
        SELECT 1 FROM reservations
        WHERE property_id = $1
          AND status NOT IN ('cancelled', 'rejected')
          AND check_in < $3
          AND $2 < check_out
          AND ($4::uuid IS NULL OR id <> $4)
    )
"#;

/// PostgreSQL-backed reservation store implementation.
///
/// Writes take a transaction-scoped advisory lock keyed by property, so the
/// overlap check and the write are serialized per property.
#[derive(Clone)]
pub struct PostgresReservationStore {
    pool: PgPool,
}

impl PostgresReservationStore {
    /// Creates a new PostgreSQL reservation store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_reservation(row: PgRow) -> Result<Reservation> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<ReservationStatus>()
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
        let guests: i32 = row.try_get("guests")?;
        let guests = u32::try_from(guests)
            .map_err(|_| StoreError::InvalidRecord(format!("negative guest count {guests}")))?;

        Ok(Reservation {
            id: ReservationId::from_uuid(row.try_get::<Uuid, _>("id")?),
            organization_id: OrganizationId::from_uuid(row.try_get::<Uuid, _>("organization_id")?),
            property_id: PropertyId::from_uuid(row.try_get::<Uuid, _>("property_id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            check_in: row.try_get("check_in")?,
            check_out: row.try_get("check_out")?,
            status,
            total_price: Money::from_cents(row.try_get("total_price_cents")?),
            price_elements: row.try_get::<Json<Attributes>, _>("price_elements")?.0,
            guests,
            guest_data: row.try_get::<Json<Attributes>, _>("guest_data")?.0,
            additional_requests: row.try_get::<Json<Attributes>, _>("additional_requests")?.0,
            payment_reference: row.try_get("payment_reference")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
        })
    }

    fn guests_column(reservation: &Reservation) -> Result<i32> {
        i32::try_from(reservation.guests).map_err(|_| {
            StoreError::InvalidRecord(format!("guest count {} out of range", reservation.guests))
        })
    }

    /// Serializes writers touching the same property until `tx` ends.
    async fn lock_property(
        tx: &mut Transaction<'_, Postgres>,
        property_id: PropertyId,
    ) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(property_id.to_string())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn overlap_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        reservation: &Reservation,
        exclude: Option<ReservationId>,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(OVERLAP_SQL)
            .bind(reservation.property_id.as_uuid())
            .bind(reservation.check_in)
            .bind(reservation.check_out)
            .bind(exclude.map(|id| id.as_uuid()))
            .fetch_one(&mut **tx)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl ReservationStore for PostgresReservationStore {
    async fn get_by_id(&self, id: ReservationId) -> Result<Option<Reservation>> {
        let row: Option<PgRow> = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_reservation).transpose()
    }

    async fn query(&self, query: ReservationQuery) -> Result<Vec<Reservation>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.property_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND property_id = ${param_count}"));
        }
        if query.customer_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if query.organization_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND organization_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.check_in_from.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND check_in >= ${param_count}"));
        }
        if query.check_in_to.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND check_in <= ${param_count}"));
        }
        if query.check_in_after.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND check_in > ${param_count}"));
        }
        if query.exclude_terminal {
            sql.push_str(" AND status NOT IN ('completed', 'cancelled', 'rejected')");
        }

        sql.push_str(query.order.sql());

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        // Build and execute query with parameters
        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.property_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(id) = query.customer_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(id) = query.organization_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(from) = query.check_in_from {
            sqlx_query = sqlx_query.bind(from);
        }
        if let Some(to) = query.check_in_to {
            sqlx_query = sqlx_query.bind(to);
        }
        if let Some(after) = query.check_in_after {
            sqlx_query = sqlx_query.bind(after);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_reservation).collect()
    }

    async fn exists_overlapping(
        &self,
        property_id: PropertyId,
        stay: StayPeriod,
        exclude: Option<ReservationId>,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(OVERLAP_SQL)
            .bind(property_id.as_uuid())
            .bind(stay.check_in)
            .bind(stay.check_out)
            .bind(exclude.map(|id| id.as_uuid()))
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn insert(&self, reservation: &Reservation) -> Result<()> {
        let guests = Self::guests_column(reservation)?;
        let mut tx = self.pool.begin().await?;

        if reservation.is_active() {
            Self::lock_property(&mut tx, reservation.property_id).await?;
            if Self::overlap_in_tx(&mut tx, reservation, None).await? {
                tracing::debug!(property_id = %reservation.property_id, "insert rejected by overlap");
                return Err(StoreError::Overlap {
                    property_id: reservation.property_id,
                });
            }
        }

        sqlx::query(
            r#"
            INSERT INTO reservations (
                id, organization_id, property_id, customer_id, check_in, check_out, status,
                total_price_cents, price_elements, guests, guest_data, additional_requests,
                payment_reference, created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.organization_id.as_uuid())
        .bind(reservation.property_id.as_uuid())
        .bind(reservation.customer_id.as_uuid())
        .bind(reservation.check_in)
        .bind(reservation.check_out)
        .bind(reservation.status.as_str())
        .bind(reservation.total_price.cents())
        .bind(Json(&reservation.price_elements))
        .bind(guests)
        .bind(Json(&reservation.guest_data))
        .bind(Json(&reservation.additional_requests))
        .bind(reservation.payment_reference.as_deref())
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .bind(reservation.version)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            // Primary key violation means the id is already taken
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("reservations_pkey") {
                    return StoreError::AlreadyExists(reservation.id);
                }
            }
            StoreError::Database(e)
        })?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_full(&self, reservation: &Reservation) -> Result<i64> {
        let guests = Self::guests_column(reservation)?;
        let mut tx = self.pool.begin().await?;

        // The row lock holds off other writers until commit
        let current_version: i64 =
            sqlx::query_scalar("SELECT version FROM reservations WHERE id = $1 FOR UPDATE")
                .bind(reservation.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::NotFound(reservation.id))?;
        if current_version != reservation.version {
            return Err(StoreError::VersionConflict {
                id: reservation.id,
                expected: reservation.version,
                actual: current_version,
            });
        }

        if reservation.is_active() {
            Self::lock_property(&mut tx, reservation.property_id).await?;
            if Self::overlap_in_tx(&mut tx, reservation, Some(reservation.id)).await? {
                tracing::debug!(property_id = %reservation.property_id, "update rejected by overlap");
                return Err(StoreError::Overlap {
                    property_id: reservation.property_id,
                });
            }
        }

        sqlx::query(
            r#"
            UPDATE reservations SET
                organization_id = $2,
                property_id = $3,
                customer_id = $4,
                check_in = $5,
                check_out = $6,
                status = $7,
                total_price_cents = $8,
                price_elements = $9,
                guests = $10,
                guest_data = $11,
                additional_requests = $12,
                payment_reference = $13,
                updated_at = $14,
                version = $15
            WHERE id = $1
            "#,
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.organization_id.as_uuid())
        .bind(reservation.property_id.as_uuid())
        .bind(reservation.customer_id.as_uuid())
        .bind(reservation.check_in)
        .bind(reservation.check_out)
        .bind(reservation.status.as_str())
        .bind(reservation.total_price.cents())
        .bind(Json(&reservation.price_elements))
        .bind(guests)
        .bind(Json(&reservation.guest_data))
        .bind(Json(&reservation.additional_requests))
        .bind(reservation.payment_reference.as_deref())
        .bind(reservation.updated_at)
        .bind(current_version + 1)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(current_version + 1)
    }

    async fn delete(&self, id: ReservationId) -> Result<()> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
