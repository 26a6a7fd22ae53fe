use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::core::{
    Amenity, AmenityId, CatalogRepository, EventPackage, EventPackageId, Guest, GuestId, HallType,
    HallTypeId, RoomType, RoomTypeId,
};
use crate::domain::{DataAccessError, Entity};

/// マスタデータをマップで保持する
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    room_types: HashMap<RoomTypeId, RoomType>,
    amenities: HashMap<AmenityId, Amenity>,
    hall_types: HashMap<HallTypeId, HallType>,
    packages: HashMap<EventPackageId, EventPackage>,
    guests: HashMap<GuestId, Guest>,
}

/// 挿入または置換する。新規の場合は true を返す
fn upsert<E: Entity + Clone>(map: &mut HashMap<E::Id, E>, entity: &E) -> bool {
    map.insert(entity.id(), entity.clone()).is_none()
}

#[async_trait]
impl CatalogRepository for MemoryCatalog {
    async fn find_room_type(&self, id: RoomTypeId) -> Result<Option<RoomType>, DataAccessError> {
        Ok(self.room_types.get(&id).cloned())
    }

    async fn find_room_types(&self) -> Result<Vec<RoomType>, DataAccessError> {
        let mut room_types = self.room_types.values().cloned().collect::<Vec<_>>();
        room_types.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(room_types)
    }

    async fn save_room_type(&mut self, entity: &RoomType) -> Result<bool, DataAccessError> {
        Ok(upsert(&mut self.room_types, entity))
    }

    async fn find_amenity(&self, id: AmenityId) -> Result<Option<Amenity>, DataAccessError> {
        Ok(self.amenities.get(&id).cloned())
    }

    async fn save_amenity(&mut self, entity: &Amenity) -> Result<bool, DataAccessError> {
        Ok(upsert(&mut self.amenities, entity))
    }

    async fn find_hall_type(&self, id: HallTypeId) -> Result<Option<HallType>, DataAccessError> {
        Ok(self.hall_types.get(&id).cloned())
    }

    async fn save_hall_type(&mut self, entity: &HallType) -> Result<bool, DataAccessError> {
        Ok(upsert(&mut self.hall_types, entity))
    }

    async fn find_package(
        &self,
        id: EventPackageId,
    ) -> Result<Option<EventPackage>, DataAccessError> {
        Ok(self.packages.get(&id).cloned())
    }

    async fn save_package(&mut self, entity: &EventPackage) -> Result<bool, DataAccessError> {
        Ok(upsert(&mut self.packages, entity))
    }

    async fn find_guest(&self, id: GuestId) -> Result<Option<Guest>, DataAccessError> {
        Ok(self.guests.get(&id).cloned())
    }

    async fn save_guest(&mut self, entity: &Guest) -> Result<bool, DataAccessError> {
        Ok(upsert(&mut self.guests, entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_find() {
        let mut catalog = MemoryCatalog::default();
        let suite =
            RoomType::create(1.into(), "Suite".to_owned(), String::new(), 4, None).unwrap();
        let deluxe =
            RoomType::create(2.into(), "Deluxe".to_owned(), String::new(), 2, None).unwrap();
        assert!(catalog.save_room_type(&suite).await.unwrap());
        assert!(!catalog.save_room_type(&suite).await.unwrap());
        catalog.save_room_type(&deluxe).await.unwrap();
        let names = catalog
            .find_room_types()
            .await
            .unwrap()
            .iter()
            .map(|t| t.name().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Deluxe", "Suite"]);
        assert!(catalog.find_guest(1.into()).await.unwrap().is_none());
    }
}
