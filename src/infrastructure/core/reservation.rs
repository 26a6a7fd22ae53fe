use std::ops::Range;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::core::{
    overlaps, Reservation, ReservationEvent, ReservationId, ReservationRepository, RoomId,
};
use crate::domain::{Aggregation, DataAccessError};
use crate::infrastructure::EventStreams;

#[async_trait]
impl ReservationRepository for EventStreams<Reservation> {
    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, DataAccessError> {
        Ok(self.load(id))
    }

    async fn find_by_room(&self, room_id: RoomId) -> Result<Vec<Reservation>, DataAccessError> {
        Ok(self
            .load_all()
            .into_iter()
            .filter(|r| r.room_id() == room_id)
            .collect())
    }

    async fn find_active_overlapping(
        &self,
        time: &Range<DateTime<Utc>>,
    ) -> Result<Vec<Reservation>, DataAccessError> {
        Ok(self
            .load_all()
            .into_iter()
            .filter(|r| r.is_active() && overlaps(r.time(), time))
            .collect())
    }

    async fn save(&mut self, entity: &mut Reservation) -> Result<bool, DataAccessError> {
        let opens_stream = matches!(
            entity.peek(),
            Some(ReservationEvent::ReservationCreated { .. })
        );
        self.append(entity, opens_stream)
    }
}
