use async_trait::async_trait;
use derive_more::{Deref, Display, Error, From};
use serde::{Deserialize, Serialize};

use crate::domain::{DataAccessError, Entity, Id};

use super::Money;

/// イベントを記録しない参照データのリポジトリ
#[async_trait]
pub trait CatalogRepository {
    async fn find_room_type(&self, id: RoomTypeId) -> Result<Option<RoomType>, DataAccessError>;
    async fn find_room_types(&self) -> Result<Vec<RoomType>, DataAccessError>;
    async fn save_room_type(&mut self, entity: &RoomType) -> Result<bool, DataAccessError>;
    async fn find_amenity(&self, id: AmenityId) -> Result<Option<Amenity>, DataAccessError>;
    async fn save_amenity(&mut self, entity: &Amenity) -> Result<bool, DataAccessError>;
    async fn find_hall_type(&self, id: HallTypeId) -> Result<Option<HallType>, DataAccessError>;
    async fn save_hall_type(&mut self, entity: &HallType) -> Result<bool, DataAccessError>;
    async fn find_package(
        &self,
        id: EventPackageId,
    ) -> Result<Option<EventPackage>, DataAccessError>;
    async fn save_package(&mut self, entity: &EventPackage) -> Result<bool, DataAccessError>;
    async fn find_guest(&self, id: GuestId) -> Result<Option<Guest>, DataAccessError>;
    async fn save_guest(&mut self, entity: &Guest) -> Result<bool, DataAccessError>;
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    From,
    Deref,
    Default,
)]
pub struct RoomTypeId(u64);

impl Id for RoomTypeId {
    type Inner = u64;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomType {
    id: RoomTypeId,
    name: String,
    description: String,
    capacity: u32,
    default_price: Option<Money>,
}

impl RoomType {
    pub fn create(
        id: RoomTypeId,
        name: String,
        description: String,
        capacity: u32,
        default_price: Option<Money>,
    ) -> Result<Self, CatalogError> {
        validate_name(&name)?;
        if capacity < 1 {
            return Err(CatalogError::InvalidCapacity);
        }
        Ok(Self {
            id,
            name,
            description,
            capacity,
            default_price,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn default_price(&self) -> Option<&Money> {
        self.default_price.as_ref()
    }
}

impl Entity for RoomType {
    type Id = RoomTypeId;

    const ENTITY_NAME: &'static str = "room_type";

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    From,
    Deref,
    Default,
)]
pub struct AmenityId(u64);

impl Id for AmenityId {
    type Inner = u64;
}

/// 客室と宴会場で共通の設備
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenity {
    id: AmenityId,
    name: String,
    description: String,
}

impl Amenity {
    pub fn create(id: AmenityId, name: String, description: String) -> Result<Self, CatalogError> {
        validate_name(&name)?;
        Ok(Self {
            id,
            name,
            description,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl Entity for Amenity {
    type Id = AmenityId;

    const ENTITY_NAME: &'static str = "amenity";

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    From,
    Deref,
    Default,
)]
pub struct HallTypeId(u64);

impl Id for HallTypeId {
    type Inner = u64;
}

/// 宴会場タイプ
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HallType {
    id: HallTypeId,
    name: String,
    capacity: u32,
    price_per_hour: Option<Money>,
}

impl HallType {
    pub fn create(
        id: HallTypeId,
        name: String,
        capacity: u32,
        price_per_hour: Option<Money>,
    ) -> Result<Self, CatalogError> {
        validate_name(&name)?;
        Ok(Self {
            id,
            name,
            capacity,
            price_per_hour,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn price_per_hour(&self) -> Option<&Money> {
        self.price_per_hour.as_ref()
    }
}

impl Entity for HallType {
    type Id = HallTypeId;

    const ENTITY_NAME: &'static str = "hall_type";

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    From,
    Deref,
    Default,
)]
pub struct EventPackageId(u64);

impl Id for EventPackageId {
    type Inner = u64;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPackage {
    id: EventPackageId,
    name: String,
    description: String,
    price: Money,
    services: Vec<String>,
}

impl EventPackage {
    pub fn create(
        id: EventPackageId,
        name: String,
        description: String,
        price: Money,
        services: Vec<String>,
    ) -> Result<Self, CatalogError> {
        validate_name(&name)?;
        Ok(Self {
            id,
            name,
            description,
            price,
            services,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> &Money {
        &self.price
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }
}

impl Entity for EventPackage {
    type Id = EventPackageId;

    const ENTITY_NAME: &'static str = "event_package";

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// ゲストID
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    From,
    Deref,
    Default,
)]
pub struct GuestId(u64);

impl Id for GuestId {
    type Inner = u64;
}

/// ゲスト（宿泊客・イベント主催者）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    id: GuestId,
    name: String,
    phone: String,
    email: String,
    preferences: String,
    vip: bool,
    /// 国コード（ISO 3166-1 alpha-2）
    nationality: Option<String>,
}

impl Guest {
    pub fn create(
        id: GuestId,
        name: String,
        phone: String,
        email: String,
    ) -> Result<Self, CatalogError> {
        validate_name(&name)?;
        Ok(Self {
            id,
            name,
            phone,
            email,
            preferences: String::new(),
            vip: false,
            nationality: None,
        })
    }

    pub fn with_preferences(mut self, preferences: String) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_vip(mut self, vip: bool) -> Self {
        self.vip = vip;
        self
    }

    pub fn with_nationality(mut self, nationality: Option<String>) -> Result<Self, CatalogError> {
        if let Some(code) = &nationality {
            if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(CatalogError::InvalidNationality);
            }
        }
        self.nationality = nationality;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn preferences(&self) -> &str {
        &self.preferences
    }

    pub fn is_vip(&self) -> bool {
        self.vip
    }

    pub fn nationality(&self) -> Option<&str> {
        self.nationality.as_deref()
    }
}

impl Entity for Guest {
    type Id = GuestId;

    const ENTITY_NAME: &'static str = "guest";

    fn id(&self) -> Self::Id {
        self.id
    }
}

fn validate_name(name: &str) -> Result<(), CatalogError> {
    match name.trim().is_empty() {
        true => Err(CatalogError::NameIsBlank),
        false => Ok(()),
    }
}

#[derive(Error, Display, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[display(fmt = "Name cannot be blank")]
    NameIsBlank,
    #[display(fmt = "Capacity must be at least one")]
    InvalidCapacity,
    #[display(fmt = "Nationality must be a two letter country code")]
    InvalidNationality,
}

#[cfg(test)]
mod tests {
    use crate::domain::core::Currency;

    use super::*;

    #[test]
    fn test_room_type_capacity() {
        assert_eq!(
            RoomType::create(1.into(), "Twin".to_owned(), String::new(), 0, None),
            Err(CatalogError::InvalidCapacity)
        );
        let twin = RoomType::create(
            1.into(),
            "Twin".to_owned(),
            String::new(),
            2,
            Some(Money::new(12000, Currency::JPY)),
        )
        .unwrap();
        assert_eq!(twin.capacity(), 2);
    }

    #[test]
    fn test_guest_nationality() {
        let guest = Guest::create(3.into(), "Aiko".to_owned(), String::new(), String::new())
            .unwrap()
            .with_vip(true);
        assert!(guest.clone().with_nationality(Some("jp".to_owned())).is_err());
        let guest = guest.with_nationality(Some("JP".to_owned())).unwrap();
        assert_eq!(guest.nationality(), Some("JP"));
        assert!(guest.is_vip());
    }
}
