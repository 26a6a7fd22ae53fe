use async_trait::async_trait;

use crate::domain::core::{Branch, BranchEvent, BranchId, BranchRepository};
use crate::domain::{Aggregation, DataAccessError};
use crate::infrastructure::EventStreams;

#[async_trait]
impl BranchRepository for EventStreams<Branch> {
    async fn find_by_id(&self, id: BranchId) -> Result<Option<Branch>, DataAccessError> {
        Ok(self.load(id))
    }

    async fn find_all(&self) -> Result<Vec<Branch>, DataAccessError> {
        Ok(self.load_all())
    }

    async fn save(&mut self, entity: &mut Branch) -> Result<bool, DataAccessError> {
        let opens_stream = matches!(entity.peek(), Some(BranchEvent::BranchOpened { .. }));
        self.append(entity, opens_stream)
    }
}
