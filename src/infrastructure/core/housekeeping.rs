use async_trait::async_trait;

use crate::domain::core::{
    HousekeepingTask, HousekeepingTaskEvent, HousekeepingTaskId, HousekeepingTaskRepository,
    RoomId,
};
use crate::domain::{Aggregation, DataAccessError};
use crate::infrastructure::EventStreams;

#[async_trait]
impl HousekeepingTaskRepository for EventStreams<HousekeepingTask> {
    async fn find_by_id(
        &self,
        id: HousekeepingTaskId,
    ) -> Result<Option<HousekeepingTask>, DataAccessError> {
        Ok(self.load(id))
    }

    async fn find_open_by_room(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<HousekeepingTask>, DataAccessError> {
        Ok(self
            .load_all()
            .into_iter()
            .filter(|task| task.is_open() && task.room_id() == room_id)
            .collect())
    }

    async fn save(&mut self, entity: &mut HousekeepingTask) -> Result<bool, DataAccessError> {
        let opens_stream = matches!(
            entity.peek(),
            Some(HousekeepingTaskEvent::HousekeepingTaskCreated { .. })
        );
        self.append(entity, opens_stream)
    }
}
