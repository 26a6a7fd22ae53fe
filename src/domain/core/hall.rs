use std::collections::BTreeSet;

use async_trait::async_trait;
use derive_more::{Deref, Display, Error, From};
use serde::{Deserialize, Serialize};

use crate::domain::{Aggregation, DataAccessError, Entity, Event, EventQueue, Id};

use super::{AmenityId, BranchId, HallTypeId, Money};

#[async_trait]
pub trait HallRepository {
    async fn find_by_id(&self, id: HallId) -> Result<Option<Hall>, DataAccessError>;
    async fn find_by_branch(&self, branch_id: BranchId) -> Result<Vec<Hall>, DataAccessError>;
    async fn save(&mut self, entity: &mut Hall) -> Result<bool, DataAccessError>;
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
pub struct HallId(u64);

impl Id for HallId {
    type Inner = u64;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HallEvent {
    HallRegistered {
        id: HallId,
        branch_id: BranchId,
        name: String,
        hall_type_id: HallTypeId,
        capacity: u32,
        price_per_hour: Option<Money>,
        amenities: BTreeSet<AmenityId>,
    },
    HallCapacityChanged {
        id: HallId,
        capacity: u32,
    },
    HallPriceChanged {
        id: HallId,
        price_per_hour: Option<Money>,
    },
    HallAmenitiesChanged {
        id: HallId,
        amenities: BTreeSet<AmenityId>,
    },
}

impl Event for HallEvent {
    type Id = HallId;
}

/// 宴会場
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Hall {
    id: HallId,
    branch_id: BranchId,
    name: String,
    hall_type_id: HallTypeId,
    capacity: u32,
    price_per_hour: Option<Money>,
    amenities: BTreeSet<AmenityId>,
    #[serde(skip)]
    events: EventQueue<HallEvent>,
}

impl Hall {
    pub fn register(
        id: HallId,
        branch_id: BranchId,
        name: String,
        hall_type_id: HallTypeId,
        capacity: u32,
        price_per_hour: Option<Money>,
        amenities: BTreeSet<AmenityId>,
    ) -> Result<Self, HallError> {
        Self::validate_name(&name)?;
        let mut entity = Hall {
            id,
            branch_id,
            name: name.clone(),
            hall_type_id,
            capacity,
            price_per_hour,
            amenities: amenities.clone(),
            ..Default::default()
        };
        entity.events.push(HallEvent::HallRegistered {
            id,
            branch_id,
            name,
            hall_type_id,
            capacity,
            price_per_hour,
            amenities,
        });
        Ok(entity)
    }

    pub fn change_capacity(&mut self, capacity: u32) {
        if self.capacity != capacity {
            self.capacity = capacity;
            self.events
                .push(HallEvent::HallCapacityChanged { id: self.id, capacity });
        }
    }

    pub fn change_price(&mut self, price_per_hour: Option<Money>) {
        if self.price_per_hour != price_per_hour {
            self.price_per_hour = price_per_hour;
            self.events.push(HallEvent::HallPriceChanged {
                id: self.id,
                price_per_hour,
            });
        }
    }

    pub fn change_amenities(&mut self, amenities: BTreeSet<AmenityId>) {
        if self.amenities != amenities {
            self.amenities = amenities.clone();
            self.events.push(HallEvent::HallAmenitiesChanged {
                id: self.id,
                amenities,
            });
        }
    }

    pub fn branch_id(&self) -> BranchId {
        self.branch_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hall_type_id(&self) -> HallTypeId {
        self.hall_type_id
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn price_per_hour(&self) -> Option<&Money> {
        self.price_per_hour.as_ref()
    }

    pub fn amenities(&self) -> &BTreeSet<AmenityId> {
        &self.amenities
    }

    fn validate_id(&self, id: &HallId) -> Result<(), HallError> {
        match self.id == *id {
            true => Ok(()),
            false => Err(HallError::MismatchedId),
        }
    }

    fn validate_name(name: &str) -> Result<(), HallError> {
        match name.trim().is_empty() {
            true => Err(HallError::NameIsBlank),
            false => Ok(()),
        }
    }
}

impl Entity for Hall {
    type Id = HallId;

    const ENTITY_NAME: &'static str = "hall";

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Aggregation for Hall {
    type Event = HallEvent;
    type Error = HallError;

    fn validate(&self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            HallEvent::HallRegistered { name, .. } => Self::validate_name(name),
            HallEvent::HallCapacityChanged { id, .. }
            | HallEvent::HallPriceChanged { id, .. }
            | HallEvent::HallAmenitiesChanged { id, .. } => self.validate_id(id),
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            HallEvent::HallRegistered {
                id,
                branch_id,
                name,
                hall_type_id,
                capacity,
                price_per_hour,
                amenities,
            } => {
                if self.id != id {
                    if let Ok(entity) = Self::register(
                        id,
                        branch_id,
                        name,
                        hall_type_id,
                        capacity,
                        price_per_hour,
                        amenities,
                    ) {
                        *self = entity;
                    }
                }
            }
            HallEvent::HallCapacityChanged { id, capacity } => {
                if self.id == id {
                    self.change_capacity(capacity);
                }
            }
            HallEvent::HallPriceChanged { id, price_per_hour } => {
                if self.id == id {
                    self.change_price(price_per_hour);
                }
            }
            HallEvent::HallAmenitiesChanged { id, amenities } => {
                if self.id == id {
                    self.change_amenities(amenities);
                }
            }
        }
    }

    fn events(&self) -> &EventQueue<Self::Event> {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventQueue<Self::Event> {
        &mut self.events
    }
}

impl PartialEq for Hall {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.branch_id == other.branch_id
            && self.name == other.name
            && self.hall_type_id == other.hall_type_id
            && self.capacity == other.capacity
            && self.price_per_hour == other.price_per_hour
            && self.amenities == other.amenities
    }
}

impl Eq for Hall {}

#[derive(Error, Display, Debug)]
pub enum HallError {
    #[display(fmt = "ID does not match")]
    MismatchedId,
    #[display(fmt = "Hall name cannot be blank")]
    NameIsBlank,
}
