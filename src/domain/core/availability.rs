use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Range;

use chrono::{DateTime, Duration, Utc};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};

use crate::domain::Entity;

use super::{
    AmenityId, BranchId, EventBooking, Hall, HallId, HallTypeId, Money, Occupancy, Reservation,
    Room, RoomId, RoomType, RoomTypeId,
};

/// 空室検索条件
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAvailabilityQuery {
    pub branch_id: BranchId,
    pub time: Range<DateTime<Utc>>,
    #[serde(default)]
    pub room_type_id: Option<RoomTypeId>,
    #[serde(default)]
    pub capacity_min: Option<u32>,
    #[serde(default)]
    pub amenities: BTreeSet<AmenityId>,
    #[serde(default)]
    pub max_price: Option<Money>,
}

impl RoomAvailabilityQuery {
    pub fn new(branch_id: BranchId, time: Range<DateTime<Utc>>) -> Self {
        Self {
            branch_id,
            time,
            room_type_id: None,
            capacity_min: None,
            amenities: BTreeSet::new(),
            max_price: None,
        }
    }

    pub fn validate(&self) -> Result<(), AvailabilityError> {
        match self.time.start < self.time.end {
            true => Ok(()),
            false => Err(AvailabilityError::InvalidRange),
        }
    }

    fn matches(&self, room: &Room, room_type: Option<&RoomType>) -> bool {
        if room.branch_id() != self.branch_id {
            return false;
        }
        if self.room_type_id.is_some() && room.room_type_id() != self.room_type_id {
            return false;
        }
        if let Some(capacity_min) = self.capacity_min {
            if room_type.map_or(true, |t| t.capacity() < capacity_min) {
                return false;
            }
        }
        if !self.amenities.is_subset(room.amenities()) {
            return false;
        }
        match &self.max_price {
            Some(max) => {
                let default_price = room_type.and_then(|t| t.default_price());
                match (room.price(), default_price) {
                    (None, None) => true,
                    (price, default_price) => {
                        price.map_or(false, |p| p <= max)
                            || default_price.map_or(false, |p| p <= max)
                    }
                }
            }
            None => true,
        }
    }
}

/// 空き宴会場検索条件
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HallAvailabilityQuery {
    pub branch_id: BranchId,
    pub start: DateTime<Utc>,
    #[serde_as(as = "DurationSeconds<i64>")]
    pub duration: Duration,
    #[serde(default)]
    pub hall_type_id: Option<HallTypeId>,
    #[serde(default)]
    pub capacity_min: Option<u32>,
    #[serde(default)]
    pub amenities: BTreeSet<AmenityId>,
    #[serde(default)]
    pub max_price_per_hour: Option<Money>,
}

impl HallAvailabilityQuery {
    pub fn new(branch_id: BranchId, start: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            branch_id,
            start,
            duration,
            hall_type_id: None,
            capacity_min: None,
            amenities: BTreeSet::new(),
            max_price_per_hour: None,
        }
    }

    /// `[start, start + duration)`
    pub fn time(&self) -> Result<Range<DateTime<Utc>>, AvailabilityError> {
        if self.duration <= Duration::zero() {
            return Err(AvailabilityError::InvalidRange);
        }
        self.start
            .checked_add_signed(self.duration)
            .map(|end| self.start..end)
            .ok_or(AvailabilityError::InvalidRange)
    }

    pub fn validate(&self) -> Result<(), AvailabilityError> {
        self.time().map(|_| ())
    }

    fn matches(&self, hall: &Hall) -> bool {
        hall.branch_id() == self.branch_id
            && self
                .hall_type_id
                .map_or(true, |id| hall.hall_type_id() == id)
            && self
                .capacity_min
                .map_or(true, |min| hall.capacity() >= min)
            && self.amenities.is_subset(hall.amenities())
            && match (&self.max_price_per_hour, hall.price_per_hour()) {
                (Some(max), Some(price)) => price <= max,
                _ => true,
            }
    }
}

/// 条件に合い、期間が重なる有効な予約のない客室を名前順に返す
pub fn available_rooms<'a, R>(
    query: &RoomAvailabilityQuery,
    rooms: Vec<Room>,
    room_types: &HashMap<RoomTypeId, RoomType>,
    reservations: R,
) -> Result<Vec<Room>, AvailabilityError>
where
    R: IntoIterator<Item = &'a Reservation>,
{
    query.validate()?;
    let occupancy = Occupancy::new(
        reservations
            .into_iter()
            .filter(|r| r.is_active())
            .map(|r| (r.time().clone(), r.room_id())),
    );
    let busy = occupancy
        .conflicts(&query.time)
        .copied()
        .collect::<HashSet<RoomId>>();
    let mut rooms = rooms
        .into_iter()
        .filter(|room| !busy.contains(&room.id()))
        .filter(|room| {
            let room_type = room.room_type_id().and_then(|id| room_types.get(&id));
            query.matches(room, room_type)
        })
        .collect::<Vec<_>>();
    rooms.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));
    Ok(rooms)
}

/// 条件に合い、`[start, start + duration)` と重なる有効な予約のない宴会場を返す
pub fn available_halls<'a, B>(
    query: &HallAvailabilityQuery,
    halls: Vec<Hall>,
    bookings: B,
) -> Result<Vec<Hall>, AvailabilityError>
where
    B: IntoIterator<Item = &'a EventBooking>,
{
    let time = query.time()?;
    let occupancy = Occupancy::new(
        bookings
            .into_iter()
            .filter(|b| b.is_active())
            .map(|b| (b.time(), b.hall_id())),
    );
    let busy = occupancy
        .conflicts(&time)
        .copied()
        .collect::<HashSet<HallId>>();
    let mut halls = halls
        .into_iter()
        .filter(|hall| !busy.contains(&hall.id()) && query.matches(hall))
        .collect::<Vec<_>>();
    halls.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));
    Ok(halls)
}

#[derive(Error, Display, Debug, PartialEq, Eq)]
pub enum AvailabilityError {
    #[display(fmt = "End must be after start")]
    InvalidRange,
}
