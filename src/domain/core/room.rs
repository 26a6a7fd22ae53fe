use std::collections::BTreeSet;

use async_trait::async_trait;
use derive_more::{Deref, Display, Error, From};
use serde::{Deserialize, Serialize};

use crate::domain::{Aggregation, DataAccessError, Entity, Event, EventQueue, Id};

use super::{AmenityId, BranchId, Money, RoomType, RoomTypeId};

/// 客室リポジトリ
#[async_trait]
pub trait RoomRepository {
    /// IDで客室を検索する
    async fn find_by_id(&self, id: RoomId) -> Result<Option<Room>, DataAccessError>;
    /// 支店の客室を検索する
    async fn find_by_branch(&self, branch_id: BranchId) -> Result<Vec<Room>, DataAccessError>;
    /// すべての客室を取得する
    async fn find_all(&self) -> Result<Vec<Room>, DataAccessError>;
    /// 客室を保存する
    async fn save(&mut self, entity: &mut Room) -> Result<bool, DataAccessError>;
}

/// 客室ID
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
pub struct RoomId(u64);

impl Id for RoomId {
    type Inner = u64;
}

/// 客室イベント
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomEvent {
    /// 客室が登録された
    RoomRegistered {
        id: RoomId,
        branch_id: BranchId,
        name: String,
        room_type_id: Option<RoomTypeId>,
        floor: i32,
        price: Option<Money>,
        amenities: BTreeSet<AmenityId>,
    },
    /// 客室の状態が変更された
    RoomStatusChanged { id: RoomId, status: RoomStatus },
    /// 客室の料金が変更された
    RoomPriceChanged { id: RoomId, price: Option<Money> },
    /// 客室の設備が変更された
    RoomAmenitiesChanged {
        id: RoomId,
        amenities: BTreeSet<AmenityId>,
    },
}

impl Event for RoomEvent {
    type Id = RoomId;
}

/// 客室エンティティ
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Room {
    id: RoomId,
    branch_id: BranchId,
    name: String,
    room_type_id: Option<RoomTypeId>,
    floor: i32,
    status: RoomStatus,
    price: Option<Money>,
    amenities: BTreeSet<AmenityId>,
    #[serde(skip)]
    events: EventQueue<RoomEvent>,
}

impl Room {
    pub fn register(
        id: RoomId,
        branch_id: BranchId,
        name: String,
        room_type_id: Option<RoomTypeId>,
        floor: i32,
        price: Option<Money>,
        amenities: BTreeSet<AmenityId>,
    ) -> Result<Self, RoomError> {
        Self::validate_name(&name)?;
        let mut entity = Room {
            id,
            branch_id,
            name: name.clone(),
            room_type_id,
            floor,
            price,
            amenities: amenities.clone(),
            ..Default::default()
        };
        entity.events.push(RoomEvent::RoomRegistered {
            id,
            branch_id,
            name,
            room_type_id,
            floor,
            price,
            amenities,
        });
        Ok(entity)
    }

    /// 状態が変わった場合は true を返す
    pub fn change_status(&mut self, status: RoomStatus) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.events
            .push(RoomEvent::RoomStatusChanged { id: self.id, status });
        true
    }

    pub fn change_price(&mut self, price: Option<Money>) {
        if self.price == price {
            return;
        }
        self.price = price;
        self.events
            .push(RoomEvent::RoomPriceChanged { id: self.id, price });
    }

    pub fn change_amenities(&mut self, amenities: BTreeSet<AmenityId>) {
        if self.amenities == amenities {
            return;
        }
        self.amenities = amenities.clone();
        self.events.push(RoomEvent::RoomAmenitiesChanged {
            id: self.id,
            amenities,
        });
    }

    pub fn branch_id(&self) -> BranchId {
        self.branch_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn room_type_id(&self) -> Option<RoomTypeId> {
        self.room_type_id
    }

    pub fn floor(&self) -> i32 {
        self.floor
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn price(&self) -> Option<&Money> {
        self.price.as_ref()
    }

    pub fn amenities(&self) -> &BTreeSet<AmenityId> {
        &self.amenities
    }

    /// 客室料金。なければ客室タイプの標準料金
    pub fn effective_price<'a>(&'a self, room_type: Option<&'a RoomType>) -> Option<&'a Money> {
        self.price
            .as_ref()
            .or_else(|| room_type.and_then(|t| t.default_price()))
    }

    fn validate_id(&self, id: &RoomId) -> Result<(), RoomError> {
        match self.id == *id {
            true => Ok(()),
            false => Err(RoomError::MismatchedId),
        }
    }

    fn validate_name(name: &str) -> Result<(), RoomError> {
        match name.trim().is_empty() {
            true => Err(RoomError::NameIsBlank),
            false => Ok(()),
        }
    }
}

impl Entity for Room {
    type Id = RoomId;

    const ENTITY_NAME: &'static str = "room";

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Aggregation for Room {
    type Event = RoomEvent;
    type Error = RoomError;

    fn validate(&self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            RoomEvent::RoomRegistered { name, .. } => Self::validate_name(name),
            RoomEvent::RoomStatusChanged { id, .. }
            | RoomEvent::RoomPriceChanged { id, .. }
            | RoomEvent::RoomAmenitiesChanged { id, .. } => self.validate_id(id),
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            RoomEvent::RoomRegistered {
                id,
                branch_id,
                name,
                room_type_id,
                floor,
                price,
                amenities,
            } => {
                if self.id != id {
                    if let Ok(entity) = Self::register(
                        id,
                        branch_id,
                        name,
                        room_type_id,
                        floor,
                        price,
                        amenities,
                    ) {
                        *self = entity;
                    }
                }
            }
            RoomEvent::RoomStatusChanged { id, status } => {
                if self.id == id {
                    self.change_status(status);
                }
            }
            RoomEvent::RoomPriceChanged { id, price } => {
                if self.id == id {
                    self.change_price(price);
                }
            }
            RoomEvent::RoomAmenitiesChanged { id, amenities } => {
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

impl PartialEq for Room {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.branch_id == other.branch_id
            && self.name == other.name
            && self.room_type_id == other.room_type_id
            && self.floor == other.floor
            && self.status == other.status
            && self.price == other.price
            && self.amenities == other.amenities
    }
}

impl Eq for Room {}

/// 客室エラー
#[derive(Error, Display, Debug)]
pub enum RoomError {
    /// IDが一致しません
    #[display(fmt = "ID does not match")]
    MismatchedId,
    /// 客室番号が空欄です
    #[display(fmt = "Room name cannot be blank")]
    NameIsBlank,
}

/// 客室の状態
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// 空室
    #[default]
    Available,
    /// 使用中
    Occupied,
    /// 清掃待ち
    Dirty,
    /// 清掃中
    Cleaning,
    /// メンテナンス中
    Maintenance,
}
