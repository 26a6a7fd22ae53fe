use async_trait::async_trait;

use crate::domain::core::{
    MaintenanceTask, MaintenanceTaskEvent, MaintenanceTaskId, MaintenanceTaskRepository, RoomId,
};
use crate::domain::{Aggregation, DataAccessError};
use crate::infrastructure::EventStreams;

#[async_trait]
impl MaintenanceTaskRepository for EventStreams<MaintenanceTask> {
    async fn find_by_id(
        &self,
        id: MaintenanceTaskId,
    ) -> Result<Option<MaintenanceTask>, DataAccessError> {
        Ok(self.load(id))
    }

    async fn find_by_room(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<MaintenanceTask>, DataAccessError> {
        Ok(self
            .load_all()
            .into_iter()
            .filter(|task| task.room_id() == room_id)
            .collect())
    }

    async fn find_open(&self) -> Result<Vec<MaintenanceTask>, DataAccessError> {
        Ok(self
            .load_all()
            .into_iter()
            .filter(|task| task.is_open())
            .collect())
    }

    async fn save(&mut self, entity: &mut MaintenanceTask) -> Result<bool, DataAccessError> {
        let opens_stream = matches!(
            entity.peek(),
            Some(MaintenanceTaskEvent::MaintenanceTaskReported { .. })
        );
        self.append(entity, opens_stream)
    }
}
