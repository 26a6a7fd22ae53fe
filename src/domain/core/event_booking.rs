use std::ops::Range;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use derive_more::{Deref, Display, Error, From};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};

use crate::domain::{Aggregation, DataAccessError, Entity, Event, EventQueue, Id};

use super::{EventPackageId, GuestId, HallId, InvoiceId, Money, StatusTransition};

/// 宴会場予約リポジトリ
#[async_trait]
pub trait EventBookingRepository {
    async fn find_by_id(&self, id: EventBookingId)
        -> Result<Option<EventBooking>, DataAccessError>;
    /// 宴会場のキャンセル以外の予約を検索する
    async fn find_active_by_hall(
        &self,
        hall_id: HallId,
    ) -> Result<Vec<EventBooking>, DataAccessError>;
    /// 指定時刻より前に始まるキャンセル以外の予約を検索する
    async fn find_active_starting_before(
        &self,
        end: DateTime<Utc>,
    ) -> Result<Vec<EventBooking>, DataAccessError>;
    async fn save(&mut self, entity: &mut EventBooking) -> Result<bool, DataAccessError>;
}

/// 宴会場予約ID
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
pub struct EventBookingId(u64);

impl Id for EventBookingId {
    type Inner = u64;
}

/// 宴会場予約イベント
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventBookingEvent {
    EventBookingCreated {
        id: EventBookingId,
        hall_id: HallId,
        customer_id: GuestId,
        start: DateTime<Utc>,
        #[serde_as(as = "DurationSeconds<i64>")]
        duration: Duration,
        package_id: Option<EventPackageId>,
        deposit: Option<Money>,
        total: Option<Money>,
    },
    EventBookingRescheduled {
        id: EventBookingId,
        start: DateTime<Utc>,
        #[serde_as(as = "DurationSeconds<i64>")]
        duration: Duration,
    },
    EventBookingHallChanged {
        id: EventBookingId,
        hall_id: HallId,
    },
    EventBookingStatusChanged {
        id: EventBookingId,
        status: EventBookingStatus,
    },
    EventBookingInvoiced {
        id: EventBookingId,
        invoice_id: InvoiceId,
    },
}

impl Event for EventBookingEvent {
    type Id = EventBookingId;
}

/// 宴会場予約エンティティ
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBooking {
    id: EventBookingId,
    hall_id: HallId,
    customer_id: GuestId,
    start: DateTime<Utc>,
    #[serde_as(as = "DurationSeconds<i64>")]
    duration: Duration,
    package_id: Option<EventPackageId>,
    deposit: Option<Money>,
    total: Option<Money>,
    status: EventBookingStatus,
    invoice_ids: Vec<InvoiceId>,
    #[serde(skip)]
    events: EventQueue<EventBookingEvent>,
}

impl Default for EventBooking {
    fn default() -> Self {
        Self {
            id: Default::default(),
            hall_id: Default::default(),
            customer_id: Default::default(),
            start: Default::default(),
            duration: Duration::zero(),
            package_id: None,
            deposit: None,
            total: None,
            status: Default::default(),
            invoice_ids: Vec::new(),
            events: Default::default(),
        }
    }
}

impl EventBooking {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: EventBookingId,
        hall_id: HallId,
        customer_id: GuestId,
        start: DateTime<Utc>,
        duration: Duration,
        package_id: Option<EventPackageId>,
        deposit: Option<Money>,
        total: Option<Money>,
    ) -> Result<Self, EventBookingError> {
        Self::validate_duration(&start, &duration)?;
        let mut entity = EventBooking {
            id,
            hall_id,
            customer_id,
            start,
            duration,
            package_id,
            deposit,
            total,
            ..Default::default()
        };
        entity.events.push(EventBookingEvent::EventBookingCreated {
            id,
            hall_id,
            customer_id,
            start,
            duration,
            package_id,
            deposit,
            total,
        });
        Ok(entity)
    }

    pub fn reschedule(
        &mut self,
        start: DateTime<Utc>,
        duration: Duration,
    ) -> Result<(), EventBookingError> {
        self.validate_rescheduled(&start, &duration)?;
        if self.start == start && self.duration == duration {
            return Ok(());
        }
        self.start = start;
        self.duration = duration;
        self.events.push(EventBookingEvent::EventBookingRescheduled {
            id: self.id,
            start,
            duration,
        });
        Ok(())
    }

    pub fn change_hall(&mut self, hall_id: HallId) -> Result<(), EventBookingError> {
        self.validate_editable()?;
        if self.hall_id == hall_id {
            return Ok(());
        }
        self.hall_id = hall_id;
        self.events
            .push(EventBookingEvent::EventBookingHallChanged { id: self.id, hall_id });
        Ok(())
    }

    /// 状態が変わった場合は true を返す
    pub fn change_status(&mut self, status: EventBookingStatus) -> Result<bool, EventBookingError> {
        self.status.validate_transition(&status)?;
        if self.status == status {
            return Ok(false);
        }
        self.status = status;
        self.events
            .push(EventBookingEvent::EventBookingStatusChanged { id: self.id, status });
        Ok(true)
    }

    pub fn attach_invoice(&mut self, invoice_id: InvoiceId) -> Result<(), EventBookingError> {
        if self.invoice_ids.contains(&invoice_id) {
            return Err(EventBookingError::DuplicateInvoice);
        }
        self.invoice_ids.push(invoice_id);
        self.events.push(EventBookingEvent::EventBookingInvoiced {
            id: self.id,
            invoice_id,
        });
        Ok(())
    }

    pub fn hall_id(&self) -> HallId {
        self.hall_id
    }

    pub fn customer_id(&self) -> GuestId {
        self.customer_id
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// `[start, start + duration)`
    pub fn time(&self) -> Range<DateTime<Utc>> {
        // 作成時と変更時に終了時刻が表現できることを検証済み
        let end = self
            .start
            .checked_add_signed(self.duration)
            .unwrap_or(self.start);
        self.start..end
    }

    pub fn package_id(&self) -> Option<EventPackageId> {
        self.package_id
    }

    pub fn deposit(&self) -> Option<&Money> {
        self.deposit.as_ref()
    }

    pub fn total(&self) -> Option<&Money> {
        self.total.as_ref()
    }

    pub fn status(&self) -> EventBookingStatus {
        self.status
    }

    pub fn invoice_ids(&self) -> &[InvoiceId] {
        &self.invoice_ids
    }

    pub fn is_active(&self) -> bool {
        self.status != EventBookingStatus::Cancelled
    }

    fn validate_id(&self, id: &EventBookingId) -> Result<(), EventBookingError> {
        match self.id == *id {
            true => Ok(()),
            false => Err(EventBookingError::MismatchedId),
        }
    }

    fn validate_editable(&self) -> Result<(), EventBookingError> {
        match self.status {
            EventBookingStatus::Cancelled => Err(EventBookingError::Cancelled),
            _ => Ok(()),
        }
    }

    fn validate_rescheduled(
        &self,
        start: &DateTime<Utc>,
        duration: &Duration,
    ) -> Result<(), EventBookingError> {
        self.validate_editable()?;
        Self::validate_duration(start, duration)
    }

    fn validate_duration(
        start: &DateTime<Utc>,
        duration: &Duration,
    ) -> Result<(), EventBookingError> {
        if *duration <= Duration::zero() || start.checked_add_signed(*duration).is_none() {
            return Err(EventBookingError::InvalidDuration);
        }
        Ok(())
    }
}

impl Entity for EventBooking {
    type Id = EventBookingId;

    const ENTITY_NAME: &'static str = "event_booking";

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Aggregation for EventBooking {
    type Event = EventBookingEvent;
    type Error = EventBookingError;

    fn validate(&self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            EventBookingEvent::EventBookingCreated {
                start, duration, ..
            } => Self::validate_duration(start, duration),
            EventBookingEvent::EventBookingRescheduled {
                id,
                start,
                duration,
            } => {
                self.validate_id(id)?;
                self.validate_rescheduled(start, duration)
            }
            EventBookingEvent::EventBookingHallChanged { id, .. } => {
                self.validate_id(id)?;
                self.validate_editable()
            }
            EventBookingEvent::EventBookingStatusChanged { id, status } => {
                self.validate_id(id)?;
                self.status.validate_transition(status)
            }
            EventBookingEvent::EventBookingInvoiced { id, .. } => self.validate_id(id),
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            EventBookingEvent::EventBookingCreated {
                id,
                hall_id,
                customer_id,
                start,
                duration,
                package_id,
                deposit,
                total,
            } => {
                if self.id != id {
                    if let Ok(entity) = Self::create(
                        id,
                        hall_id,
                        customer_id,
                        start,
                        duration,
                        package_id,
                        deposit,
                        total,
                    ) {
                        *self = entity;
                    }
                }
            }
            EventBookingEvent::EventBookingRescheduled {
                id,
                start,
                duration,
            } => {
                if self.id == id {
                    if let Err(_e) = self.reschedule(start, duration) {}
                }
            }
            EventBookingEvent::EventBookingHallChanged { id, hall_id } => {
                if self.id == id {
                    if let Err(_e) = self.change_hall(hall_id) {}
                }
            }
            EventBookingEvent::EventBookingStatusChanged { id, status } => {
                if self.id == id {
                    if let Err(_e) = self.change_status(status) {}
                }
            }
            EventBookingEvent::EventBookingInvoiced { id, invoice_id } => {
                if self.id == id {
                    if let Err(_e) = self.attach_invoice(invoice_id) {}
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

impl PartialEq for EventBooking {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.hall_id == other.hall_id
            && self.customer_id == other.customer_id
            && self.start == other.start
            && self.duration == other.duration
            && self.package_id == other.package_id
            && self.deposit == other.deposit
            && self.total == other.total
            && self.status == other.status
            && self.invoice_ids == other.invoice_ids
    }
}

impl Eq for EventBooking {}

/// 宴会場予約エラー
#[derive(Error, Display, Debug)]
pub enum EventBookingError {
    #[display(fmt = "ID does not match")]
    MismatchedId,
    #[display(fmt = "Event duration must be positive and end at a representable time")]
    InvalidDuration,
    #[display(fmt = "Cancelled bookings cannot be changed")]
    Cancelled,
    #[display(fmt = "Invoice is already attached")]
    DuplicateInvoice,
    #[display(fmt = "Invalid status transition: {}", _0)]
    InvalidStatusTransition(#[error(not(source))] StatusTransition<EventBookingStatus>),
}

/// 宴会場予約の状態
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventBookingStatus {
    #[default]
    Draft,
    Confirmed,
    Cancelled,
}

impl EventBookingStatus {
    fn validate_transition(&self, status: &EventBookingStatus) -> Result<(), EventBookingError> {
        use EventBookingStatus::*;
        match (self, status) {
            (from, to) if from == to => Ok(()),
            (Draft, Confirmed) | (Draft, Cancelled) | (Confirmed, Draft) | (Confirmed, Cancelled) => {
                Ok(())
            }
            _ => Err(EventBookingError::InvalidStatusTransition(StatusTransition {
                from: *self,
                to: *status,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn booking() -> EventBooking {
        EventBooking::create(
            1.into(),
            5.into(),
            9.into(),
            Utc.with_ymd_and_hms(2024, 9, 14, 18, 0, 0).unwrap(),
            Duration::minutes(150),
            None,
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_time_is_half_open_range() {
        let booking = booking();
        assert_eq!(
            booking.time(),
            Utc.with_ymd_and_hms(2024, 9, 14, 18, 0, 0).unwrap()
                ..Utc.with_ymd_and_hms(2024, 9, 14, 20, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_duration_must_be_positive() {
        let mut booking = booking();
        for duration in [Duration::zero(), Duration::hours(-1)] {
            assert!(matches!(
                booking.reschedule(booking.start(), duration),
                Err(EventBookingError::InvalidDuration)
            ));
        }
        assert_eq!(booking.duration(), Duration::minutes(150));
    }

    #[test]
    fn test_end_must_be_representable() {
        let mut booking = booking();
        assert!(matches!(
            booking.reschedule(booking.start(), Duration::days(100_000_000)),
            Err(EventBookingError::InvalidDuration)
        ));
        assert!(matches!(
            EventBooking::create(
                2.into(),
                5.into(),
                9.into(),
                Utc::now(),
                Duration::days(100_000_000),
                None,
                None,
                None,
            ),
            Err(EventBookingError::InvalidDuration)
        ));
        assert_eq!(booking.time().end - booking.time().start, Duration::minutes(150));
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let mut booking = booking();
        assert!(booking.change_status(EventBookingStatus::Cancelled).unwrap());
        assert!(!booking.change_status(EventBookingStatus::Cancelled).unwrap());
        assert!(booking.change_status(EventBookingStatus::Draft).is_err());
        assert!(matches!(
            booking.change_hall(6.into()),
            Err(EventBookingError::Cancelled)
        ));
    }

    #[test]
    fn test_event_serialization_uses_seconds() {
        let booking = booking();
        let value = serde_json::to_value(booking.peek().unwrap()).unwrap();
        assert_eq!(value["EventBookingCreated"]["duration"], 9000);
        let event: EventBookingEvent = serde_json::from_value(value).unwrap();
        assert_eq!(Some(&event), booking.peek());
    }

    #[test]
    fn test_replay() {
        let mut booking = booking();
        booking
            .reschedule(booking.start() + Duration::hours(1), Duration::hours(4))
            .unwrap();
        booking.change_hall(6.into()).unwrap();
        booking.change_status(EventBookingStatus::Confirmed).unwrap();
        let replayed = EventBooking::replay(booking.pop_all());
        assert_eq!(replayed, booking);
    }
}
