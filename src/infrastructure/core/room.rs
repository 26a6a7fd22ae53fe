use async_trait::async_trait;

use crate::domain::core::{BranchId, Room, RoomEvent, RoomId, RoomRepository};
use crate::domain::{Aggregation, DataAccessError};
use crate::infrastructure::EventStreams;

#[async_trait]
impl RoomRepository for EventStreams<Room> {
    async fn find_by_id(&self, id: RoomId) -> Result<Option<Room>, DataAccessError> {
        Ok(self.load(id))
    }

    async fn find_by_branch(&self, branch_id: BranchId) -> Result<Vec<Room>, DataAccessError> {
        Ok(self
            .load_all()
            .into_iter()
            .filter(|room| room.branch_id() == branch_id)
            .collect())
    }

    async fn find_all(&self) -> Result<Vec<Room>, DataAccessError> {
        Ok(self.load_all())
    }

    async fn save(&mut self, entity: &mut Room) -> Result<bool, DataAccessError> {
        let opens_stream = matches!(entity.peek(), Some(RoomEvent::RoomRegistered { .. }));
        self.append(entity, opens_stream)
    }
}
