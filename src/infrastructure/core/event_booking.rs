use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::core::{
    EventBooking, EventBookingEvent, EventBookingId, EventBookingRepository, HallId,
};
use crate::domain::{Aggregation, DataAccessError};
use crate::infrastructure::EventStreams;

#[async_trait]
impl EventBookingRepository for EventStreams<EventBooking> {
    async fn find_by_id(
        &self,
        id: EventBookingId,
    ) -> Result<Option<EventBooking>, DataAccessError> {
        Ok(self.load(id))
    }

    async fn find_active_by_hall(
        &self,
        hall_id: HallId,
    ) -> Result<Vec<EventBooking>, DataAccessError> {
        Ok(self
            .load_all()
            .into_iter()
            .filter(|b| b.is_active() && b.hall_id() == hall_id)
            .collect())
    }

    async fn find_active_starting_before(
        &self,
        end: DateTime<Utc>,
    ) -> Result<Vec<EventBooking>, DataAccessError> {
        Ok(self
            .load_all()
            .into_iter()
            .filter(|b| b.is_active() && b.start() < end)
            .collect())
    }

    async fn save(&mut self, entity: &mut EventBooking) -> Result<bool, DataAccessError> {
        let opens_stream = matches!(
            entity.peek(),
            Some(EventBookingEvent::EventBookingCreated { .. })
        );
        self.append(entity, opens_stream)
    }
}
