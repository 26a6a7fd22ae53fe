use std::ops::Range;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::{Deref, Display, Error, From};
use serde::{Deserialize, Serialize};

use crate::domain::{Aggregation, DataAccessError, Entity, Event, EventQueue, Id};

use super::{GuestId, InvoiceId, Money, RoomId};

/// 予約リポジトリ
#[async_trait]
pub trait ReservationRepository {
    /// IDで予約を検索する
    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, DataAccessError>;
    /// 客室の予約を検索する
    async fn find_by_room(&self, room_id: RoomId) -> Result<Vec<Reservation>, DataAccessError>;
    /// 期間と重なるキャンセル以外の予約を検索する
    async fn find_active_overlapping(
        &self,
        time: &Range<DateTime<Utc>>,
    ) -> Result<Vec<Reservation>, DataAccessError>;
    /// 予約を保存する
    async fn save(&mut self, entity: &mut Reservation) -> Result<bool, DataAccessError>;
}

/// 予約ID
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
pub struct ReservationId(u64);

impl Id for ReservationId {
    type Inner = u64;
}

/// 予約イベント
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationEvent {
    /// 予約が作成された
    ReservationCreated {
        id: ReservationId,
        room_id: RoomId,
        guest_id: GuestId,
        time: Range<DateTime<Utc>>,
        terms: ReservationTerms,
        status: ReservationStatus,
    },
    /// 宿泊期間が変更された
    ReservationRescheduled {
        id: ReservationId,
        time: Range<DateTime<Utc>>,
    },
    /// 予約の状態が変更された
    ReservationStatusChanged {
        id: ReservationId,
        status: ReservationStatus,
    },
    /// 支払状況が変更された
    PaymentStatusChanged {
        id: ReservationId,
        payment_status: PaymentStatus,
    },
    /// 請求書が発行された
    ReservationInvoiced {
        id: ReservationId,
        invoice_id: InvoiceId,
    },
}

impl Event for ReservationEvent {
    type Id = ReservationId;
}

/// 予約エンティティ
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Reservation {
    id: ReservationId,
    room_id: RoomId,
    guest_id: GuestId,
    time: Range<DateTime<Utc>>,
    terms: ReservationTerms,
    payment_status: PaymentStatus,
    status: ReservationStatus,
    invoice_ids: Vec<InvoiceId>,
    #[serde(skip)]
    events: EventQueue<ReservationEvent>,
}

impl Reservation {
    pub fn create(
        id: ReservationId,
        room_id: RoomId,
        guest_id: GuestId,
        time: Range<DateTime<Utc>>,
        terms: ReservationTerms,
        status: ReservationStatus,
    ) -> Result<Self, ReservationError> {
        Self::validate_created(&time, &status)?;
        let mut entity = Reservation {
            id,
            room_id,
            guest_id,
            time: time.clone(),
            terms: terms.clone(),
            status,
            ..Reservation::default()
        };
        entity.events.push(ReservationEvent::ReservationCreated {
            id,
            room_id,
            guest_id,
            time,
            terms,
            status,
        });
        Ok(entity)
    }

    pub fn reschedule(&mut self, time: Range<DateTime<Utc>>) -> Result<(), ReservationError> {
        self.validate_rescheduled(&time)?;
        if self.time == time {
            return Ok(());
        }
        self.time = time.clone();
        self.events
            .push(ReservationEvent::ReservationRescheduled { id: self.id, time });
        Ok(())
    }

    /// 状態が変わった場合は true を返す
    pub fn change_status(&mut self, status: ReservationStatus) -> Result<bool, ReservationError> {
        self.status.validate_transition(&status)?;
        if self.status == status {
            return Ok(false);
        }
        self.status = status;
        self.events
            .push(ReservationEvent::ReservationStatusChanged { id: self.id, status });
        Ok(true)
    }

    pub fn change_payment_status(&mut self, payment_status: PaymentStatus) {
        if self.payment_status == payment_status {
            return;
        }
        self.payment_status = payment_status;
        self.events.push(ReservationEvent::PaymentStatusChanged {
            id: self.id,
            payment_status,
        });
    }

    pub fn attach_invoice(&mut self, invoice_id: InvoiceId) -> Result<(), ReservationError> {
        self.validate_invoice_attached(&invoice_id)?;
        self.invoice_ids.push(invoice_id);
        self.events.push(ReservationEvent::ReservationInvoiced {
            id: self.id,
            invoice_id,
        });
        Ok(())
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn guest_id(&self) -> GuestId {
        self.guest_id
    }

    pub fn time(&self) -> &Range<DateTime<Utc>> {
        &self.time
    }

    pub fn check_in(&self) -> DateTime<Utc> {
        self.time.start
    }

    pub fn check_out(&self) -> DateTime<Utc> {
        self.time.end
    }

    /// 宿泊数（切り上げ、最低1泊）
    pub fn nights(&self) -> i64 {
        let stay = self.time.end - self.time.start;
        let days = stay.num_days();
        if stay > chrono::Duration::days(days) {
            (days + 1).max(1)
        } else {
            days.max(1)
        }
    }

    pub fn terms(&self) -> &ReservationTerms {
        &self.terms
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub fn invoice_ids(&self) -> &[InvoiceId] {
        &self.invoice_ids
    }

    /// 客室を占有する予約かどうか
    pub fn is_active(&self) -> bool {
        self.status != ReservationStatus::Cancelled
    }

    fn validate_id(&self, id: &ReservationId) -> Result<(), ReservationError> {
        if self.id != *id {
            return Err(ReservationError::MismatchedId);
        }
        Ok(())
    }

    fn validate_created(
        time: &Range<DateTime<Utc>>,
        status: &ReservationStatus,
    ) -> Result<(), ReservationError> {
        Self::validate_time(time)?;
        match status {
            ReservationStatus::Draft | ReservationStatus::Confirmed => Ok(()),
            _ => Err(ReservationError::InvalidInitialStatus),
        }
    }

    fn validate_rescheduled(&self, time: &Range<DateTime<Utc>>) -> Result<(), ReservationError> {
        Self::validate_time(time)?;
        match self.status {
            ReservationStatus::Draft | ReservationStatus::Confirmed => Ok(()),
            _ => Err(ReservationError::NotReschedulable),
        }
    }

    fn validate_invoice_attached(&self, invoice_id: &InvoiceId) -> Result<(), ReservationError> {
        if self.invoice_ids.contains(invoice_id) {
            return Err(ReservationError::DuplicateInvoice);
        }
        Ok(())
    }

    fn validate_time(time: &Range<DateTime<Utc>>) -> Result<(), ReservationError> {
        if time.start >= time.end {
            return Err(ReservationError::InvalidTime);
        }
        Ok(())
    }
}

impl Entity for Reservation {
    type Id = ReservationId;

    const ENTITY_NAME: &'static str = "reservation";

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Aggregation for Reservation {
    type Event = ReservationEvent;
    type Error = ReservationError;

    fn validate(&self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            ReservationEvent::ReservationCreated { time, status, .. } => {
                Self::validate_created(time, status)?;
            }
            ReservationEvent::ReservationRescheduled { id, time } => {
                self.validate_id(id)?;
                self.validate_rescheduled(time)?;
            }
            ReservationEvent::ReservationStatusChanged { id, status } => {
                self.validate_id(id)?;
                self.status.validate_transition(status)?;
            }
            ReservationEvent::PaymentStatusChanged { id, .. } => {
                self.validate_id(id)?;
            }
            ReservationEvent::ReservationInvoiced { id, invoice_id } => {
                self.validate_id(id)?;
                self.validate_invoice_attached(invoice_id)?;
            }
        }
        Ok(())
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ReservationEvent::ReservationCreated {
                id,
                room_id,
                guest_id,
                time,
                terms,
                status,
            } => {
                if self.id != id {
                    if let Ok(entity) = Self::create(id, room_id, guest_id, time, terms, status) {
                        *self = entity;
                    }
                }
            }
            ReservationEvent::ReservationRescheduled { id, time } => {
                if self.id == id {
                    if let Err(_e) = self.reschedule(time) {}
                }
            }
            ReservationEvent::ReservationStatusChanged { id, status } => {
                if self.id == id {
                    if let Err(_e) = self.change_status(status) {}
                }
            }
            ReservationEvent::PaymentStatusChanged { id, payment_status } => {
                if self.id == id {
                    self.change_payment_status(payment_status);
                }
            }
            ReservationEvent::ReservationInvoiced { id, invoice_id } => {
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

impl PartialEq for Reservation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.room_id == other.room_id
            && self.guest_id == other.guest_id
            && self.time == other.time
            && self.terms == other.terms
            && self.payment_status == other.payment_status
            && self.status == other.status
            && self.invoice_ids == other.invoice_ids
    }
}

impl Eq for Reservation {}

/// 予約エラー
#[derive(Error, Display, Debug)]
pub enum ReservationError {
    /// IDが一致しません
    #[display(fmt = "ID does not match")]
    MismatchedId,
    /// チェックアウトはチェックインより後である必要があります
    #[display(fmt = "Check-out must be after check-in")]
    InvalidTime,
    /// 作成時の状態が不正です
    #[display(fmt = "A reservation can only be created as draft or confirmed")]
    InvalidInitialStatus,
    /// 変更できない状態です
    #[display(fmt = "Only draft or confirmed reservations can be rescheduled")]
    NotReschedulable,
    /// 請求書が重複しています
    #[display(fmt = "Invoice is already attached")]
    DuplicateInvoice,
    /// 状態遷移が不正です
    #[display(fmt = "Invalid status transition: {}", _0)]
    InvalidStatusTransition(#[error(not(source))] StatusTransition<ReservationStatus>),
}

/// 許可されない状態遷移
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[display(fmt = "{:?} -> {:?}", from, to)]
pub struct StatusTransition<S: std::fmt::Debug> {
    pub from: S,
    pub to: S,
}

/// 予約の状態
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// 仮予約
    #[default]
    Draft,
    /// 確定
    Confirmed,
    /// チェックイン済み
    CheckedIn,
    /// チェックアウト済み
    CheckedOut,
    /// キャンセル
    Cancelled,
}

impl ReservationStatus {
    fn validate_transition(&self, status: &ReservationStatus) -> Result<(), ReservationError> {
        use ReservationStatus::*;
        match (self, status) {
            (from, to) if from == to => Ok(()),
            (Draft, Confirmed)
            | (Draft, Cancelled)
            | (Confirmed, Draft)
            | (Confirmed, CheckedIn)
            | (Confirmed, Cancelled)
            | (CheckedIn, CheckedOut) => Ok(()),
            _ => Err(ReservationError::InvalidStatusTransition(StatusTransition {
                from: *self,
                to: *status,
            })),
        }
    }
}

/// 予約経路
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingSource {
    #[default]
    Website,
    Ota,
    Phone,
    WalkIn,
    TravelAgent,
}

/// 料金区分
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    #[default]
    Standard,
    Seasonal,
    Corporate,
}

/// 支払状況
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Partial,
    Paid,
}

/// 予約条件
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReservationTerms {
    #[serde(default)]
    pub booking_source: BookingSource,
    #[serde(default)]
    pub rate_type: RateType,
    #[serde(default)]
    pub deposit: Option<Money>,
    #[serde(default)]
    pub total: Option<Money>,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn stay(nights: i64) -> Range<DateTime<Utc>> {
        let check_in = Utc.with_ymd_and_hms(2024, 8, 1, 15, 0, 0).unwrap();
        check_in..check_in + Duration::days(nights)
    }

    fn reservation() -> Reservation {
        Reservation::create(
            1.into(),
            101.into(),
            9.into(),
            stay(2),
            ReservationTerms::default(),
            ReservationStatus::Draft,
        )
        .unwrap()
    }

    #[test]
    fn test_check_out_after_check_in() {
        let check_in = Utc.with_ymd_and_hms(2024, 8, 1, 15, 0, 0).unwrap();
        for time in [check_in..check_in, check_in..check_in - Duration::hours(1)] {
            assert!(matches!(
                Reservation::create(
                    1.into(),
                    101.into(),
                    9.into(),
                    time,
                    ReservationTerms::default(),
                    ReservationStatus::Draft,
                ),
                Err(ReservationError::InvalidTime)
            ));
        }
        let mut reservation = reservation();
        assert!(matches!(
            reservation.reschedule(check_in..check_in),
            Err(ReservationError::InvalidTime)
        ));
        assert_eq!(reservation.time(), &stay(2));
    }

    #[test]
    fn test_status_transitions() {
        let mut reservation = reservation();
        reservation.clear();
        assert!(matches!(
            reservation.change_status(ReservationStatus::CheckedOut),
            Err(ReservationError::InvalidStatusTransition(_))
        ));
        assert!(reservation.change_status(ReservationStatus::Confirmed).unwrap());
        assert!(!reservation.change_status(ReservationStatus::Confirmed).unwrap());
        assert!(reservation.change_status(ReservationStatus::CheckedIn).unwrap());
        assert!(matches!(
            reservation.reschedule(stay(3)),
            Err(ReservationError::NotReschedulable)
        ));
        assert!(reservation.change_status(ReservationStatus::CheckedOut).unwrap());
        assert!(reservation.change_status(ReservationStatus::Cancelled).is_err());
        assert_eq!(reservation.events().len(), 3);
    }

    #[test]
    fn test_initial_status() {
        assert!(matches!(
            Reservation::create(
                1.into(),
                101.into(),
                9.into(),
                stay(1),
                ReservationTerms::default(),
                ReservationStatus::CheckedIn,
            ),
            Err(ReservationError::InvalidInitialStatus)
        ));
    }

    #[test]
    fn test_nights() {
        assert_eq!(reservation().nights(), 2);
        let mut reservation = reservation();
        let start = reservation.check_in();
        reservation
            .reschedule(start..start + Duration::hours(30))
            .unwrap();
        assert_eq!(reservation.nights(), 2);
        reservation
            .reschedule(start..start + Duration::hours(3))
            .unwrap();
        assert_eq!(reservation.nights(), 1);
    }

    #[test]
    fn test_replay() {
        let mut reservation = reservation();
        reservation.change_status(ReservationStatus::Confirmed).unwrap();
        reservation.change_payment_status(PaymentStatus::Partial);
        reservation.attach_invoice(55.into()).unwrap();
        assert!(matches!(
            reservation.attach_invoice(55.into()),
            Err(ReservationError::DuplicateInvoice)
        ));
        let replayed = Reservation::replay(reservation.pop_all());
        assert_eq!(replayed, reservation);
    }

    #[test]
    fn test_event_serialization() {
        let event = ReservationEvent::ReservationStatusChanged {
            id: 3.into(),
            status: ReservationStatus::CheckedOut,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({ "ReservationStatusChanged": { "id": 3, "status": "checked_out" } })
        );
    }
}
