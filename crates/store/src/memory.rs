use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{PropertyId, ReservationId};
use domain::{Reservation, StayPeriod};
use tokio::sync::RwLock;

use crate::{ReservationQuery, Result, StoreError, store::ReservationStore};

/// In-memory reservation store for testing and local runs.
///
/// A single lock guards the whole map, so an overlap check and the write that
/// follows it can never interleave with another writer.
#[derive(Clone, Default)]
pub struct InMemoryReservationStore {
    reservations: Arc<RwLock<HashMap<ReservationId, Reservation>>>,
}

impl InMemoryReservationStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of reservations stored.
    pub async fn reservation_count(&self) -> usize {
        self.reservations.read().await.len()
    }

    /// Clears all reservations.
    pub async fn clear(&self) {
        self.reservations.write().await.clear();
    }
}

fn overlap_in(
    reservations: &HashMap<ReservationId, Reservation>,
    property_id: PropertyId,
    stay: &StayPeriod,
    exclude: Option<ReservationId>,
) -> bool {
    reservations.values().any(|existing| {
        existing.property_id == property_id
            && Some(existing.id) != exclude
            && existing.is_active()
            && existing.stay().overlaps(stay)
    })
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn get_by_id(&self, id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.reservations.read().await.get(&id).cloned())
    }

    async fn query(&self, query: ReservationQuery) -> Result<Vec<Reservation>> {
        let store = self.reservations.read().await;
        let mut reservations: Vec<_> = store
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        drop(store);

        query.order.sort(&mut reservations);

        // Apply offset and limit
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(reservations.into_iter().skip(offset).take(limit).collect())
    }

    async fn exists_overlapping(
        &self,
        property_id: PropertyId,
        stay: StayPeriod,
        exclude: Option<ReservationId>,
    ) -> Result<bool> {
        let store = self.reservations.read().await;
        Ok(overlap_in(&store, property_id, &stay, exclude))
    }

    async fn insert(&self, reservation: &Reservation) -> Result<()> {
        let mut store = self.reservations.write().await;

        if store.contains_key(&reservation.id) {
            return Err(StoreError::AlreadyExists(reservation.id));
        }
        if reservation.is_active()
            && overlap_in(&store, reservation.property_id, &reservation.stay(), None)
        {
            return Err(StoreError::Overlap {
                property_id: reservation.property_id,
            });
        }

        store.insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn update_full(&self, reservation: &Reservation) -> Result<i64> {
        let mut store = self.reservations.write().await;

        let current_version = store
            .get(&reservation.id)
            .map(|stored| stored.version)
            .ok_or(StoreError::NotFound(reservation.id))?;
        if current_version != reservation.version {
            return Err(StoreError::VersionConflict {
                id: reservation.id,
                expected: reservation.version,
                actual: current_version,
            });
        }
        if reservation.is_active()
            && overlap_in(
                &store,
                reservation.property_id,
                &reservation.stay(),
                Some(reservation.id),
            )
        {
            return Err(StoreError::Overlap {
                property_id: reservation.property_id,
            });
        }

        let mut stored = reservation.clone();
        stored.version = current_version + 1;
        store.insert(reservation.id, stored);
        Ok(current_version + 1)
    }

    async fn delete(&self, id: ReservationId) -> Result<()> {
        match self.reservations.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id)),
        }
    }
}
