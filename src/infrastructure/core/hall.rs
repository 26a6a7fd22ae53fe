use async_trait::async_trait;

use crate::domain::core::{BranchId, Hall, HallEvent, HallId, HallRepository};
use crate::domain::{Aggregation, DataAccessError};
use crate::infrastructure::EventStreams;

#[async_trait]
impl HallRepository for EventStreams<Hall> {
    async fn find_by_id(&self, id: HallId) -> Result<Option<Hall>, DataAccessError> {
        Ok(self.load(id))
    }

    async fn find_by_branch(&self, branch_id: BranchId) -> Result<Vec<Hall>, DataAccessError> {
        Ok(self
            .load_all()
            .into_iter()
            .filter(|hall| hall.branch_id() == branch_id)
            .collect())
    }

    async fn save(&mut self, entity: &mut Hall) -> Result<bool, DataAccessError> {
        let opens_stream = matches!(entity.peek(), Some(HallEvent::HallRegistered { .. }));
        self.append(entity, opens_stream)
    }
}
