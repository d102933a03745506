//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need a Docker daemon.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use common::{CustomerId, OrganizationId, PropertyId};
use domain::{Money, NewReservation, Reservation, ReservationStatus};
use serde_json::json;
use sqlx::PgPool;
use store::{PostgresReservationStore, ReservationStore, ReservationStoreExt, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_reservations_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and an empty table
async fn get_test_store() -> PostgresReservationStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE reservations")
        .execute(&pool)
        .await
        .unwrap();

    PostgresReservationStore::new(pool)
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, d, 15, 0, 0).unwrap()
}

fn reservation(property_id: PropertyId, from: u32, to: u32) -> Reservation {
    let mut request = NewReservation::new(
        OrganizationId::new(),
        property_id,
        CustomerId::new(),
        day(from),
        day(to),
    )
    .with_guests(2)
    .with_total_price(Money::from_cents(45_000));
    request
        .guest_data
        .insert("name".to_string(), json!("Ada Lovelace"));
    // Fixed timestamp, Postgres keeps only microseconds
    Reservation::create(request, day(1))
}

#[tokio::test]
#[ignore = "requires docker"]
async fn insert_and_load_round_trips_every_column() {
    let store = get_test_store().await;
    let mut r = reservation(PropertyId::new(), 20, 25);
    r.payment_reference = Some("https://pay.example/123".to_string());

    store.insert(&r).await.unwrap();

    let loaded = store.get_by_id(r.id).await.unwrap().unwrap();
    assert_eq!(loaded, r);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn duplicate_insert_reports_existing_id() {
    let store = get_test_store().await;
    let mut r = reservation(PropertyId::new(), 20, 25);
    r.status = ReservationStatus::Cancelled;
    store.insert(&r).await.unwrap();

    let result = store.insert(&r).await;
    assert!(matches!(result, Err(StoreError::AlreadyExists(id)) if id == r.id));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn overlap_is_rejected_and_cancelled_rows_are_ignored() {
    let store = get_test_store().await;
    let property = PropertyId::new();
    let mut first = reservation(property, 20, 25);
    store.insert(&first).await.unwrap();

    let clash = reservation(property, 24, 27);
    assert!(matches!(
        store.insert(&clash).await,
        Err(StoreError::Overlap { .. })
    ));

    // Back-to-back stays share only the boundary instant
    store.insert(&reservation(property, 25, 27)).await.unwrap();

    first.status = ReservationStatus::Cancelled;
    store.update_full(&first).await.unwrap();
    assert!(
        !store
            .exists_overlapping(property, first.stay(), None)
            .await
            .unwrap()
    );
    store.insert(&reservation(property, 21, 23)).await.unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn update_full_excludes_own_row() {
    let store = get_test_store().await;
    let mut r = reservation(PropertyId::new(), 20, 25);
    store.insert(&r).await.unwrap();

    r.check_out = day(26);
    r.guests = 3;
    store.update_full(&r).await.unwrap();

    let loaded = store.get_by_id(r.id).await.unwrap().unwrap();
    assert_eq!(loaded.check_out, day(26));
    assert_eq!(loaded.guests, 3);
    assert_eq!(loaded.version, 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn stale_update_is_a_version_conflict() {
    let store = get_test_store().await;
    let r = reservation(PropertyId::new(), 20, 25);
    store.insert(&r).await.unwrap();

    let mut confirmed = r.clone();
    confirmed.status = ReservationStatus::Confirmed;
    assert_eq!(store.update_full(&confirmed).await.unwrap(), 1);

    let mut stale = r.clone();
    stale.guests = 5;
    assert!(matches!(
        store.update_full(&stale).await,
        Err(StoreError::VersionConflict {
            expected: 0,
            actual: 1,
            ..
        })
    ));

    let loaded = store.get_by_id(r.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, ReservationStatus::Confirmed);
    assert_eq!(loaded.guests, r.guests);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn delete_and_missing_rows() {
    let store = get_test_store().await;
    let r = reservation(PropertyId::new(), 20, 25);

    assert!(matches!(
        store.update_full(&r).await,
        Err(StoreError::NotFound(_))
    ));

    store.insert(&r).await.unwrap();
    store.delete(r.id).await.unwrap();
    assert!(store.get_by_id(r.id).await.unwrap().is_none());
    assert!(matches!(
        store.delete(r.id).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn concurrent_inserts_on_one_property_admit_one() {
    let store = get_test_store().await;
    let property = PropertyId::new();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let r = reservation(property, 20, 25);
        handles.push(tokio::spawn(async move { store.insert(&r).await }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(store.list_by_property(property).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn read_queries_filter_and_order() {
    let store = get_test_store().await;
    let property = PropertyId::new();
    let early = reservation(property, 5, 7);
    let late = reservation(property, 20, 22);
    let mut done = reservation(property, 10, 12);
    done.status = ReservationStatus::Completed;
    for r in [&early, &late, &done] {
        store.insert(r).await.unwrap();
    }

    let ids: Vec<_> = store
        .list_by_property(property)
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![late.id, done.id, early.id]);

    let completed = store
        .list_by_status(ReservationStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, done.id);

    let in_range = store.list_by_date_range(day(5), day(10)).await.unwrap();
    assert_eq!(
        in_range.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![early.id, done.id]
    );

    let upcoming = store.list_upcoming(day(6)).await.unwrap();
    assert_eq!(
        upcoming.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![late.id]
    );

    assert_eq!(
        store
            .list_by_organization(late.organization_id)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        store.list_by_customer(early.customer_id).await.unwrap()[0].id,
        early.id
    );
}
