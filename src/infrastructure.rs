mod catalog;
mod core;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use derive_more::{Display, Error};
use tokio::sync::Mutex;

use crate::application::Repositories;
use crate::domain::core::{
    AccountingGateway, Branch, EventBooking, Hall, HousekeepingTask, InvoiceDraft, InvoiceId,
    MaintenanceTask, Reservation, Room,
};
use crate::domain::{Aggregation, DataAccessError, Entity};

pub use self::catalog::*;

/// 全リポジトリのインメモリ実装
pub fn in_memory() -> Repositories {
    Repositories {
        branches: Box::new(EventStreams::<Branch>::default()),
        catalog: Box::new(MemoryCatalog::default()),
        rooms: Box::new(EventStreams::<Room>::default()),
        halls: Box::new(EventStreams::<Hall>::default()),
        reservations: Box::new(EventStreams::<Reservation>::default()),
        event_bookings: Box::new(EventStreams::<EventBooking>::default()),
        housekeeping: Box::new(EventStreams::<HousekeepingTask>::default()),
        maintenance: Box::new(EventStreams::<MaintenanceTask>::default()),
    }
}

/// 集約ごとの追記専用イベントストリーム
#[derive(Debug, Clone)]
pub struct EventStreams<A: Aggregation> {
    streams: HashMap<A::Id, Vec<A::Event>>,
}

impl<A: Aggregation> Default for EventStreams<A> {
    fn default() -> Self {
        Self {
            streams: HashMap::new(),
        }
    }
}

impl<A: Aggregation> EventStreams<A> {
    pub fn load(&self, id: A::Id) -> Option<A> {
        self.streams
            .get(&id)
            .map(|events| A::replay(events.iter().cloned()))
    }

    pub fn load_all(&self) -> Vec<A> {
        self.streams
            .values()
            .map(|events| A::replay(events.iter().cloned()))
            .collect()
    }

    /// 未保存イベントを追記する。ストリームは最初のイベントでのみ作成される。
    /// 保存済みの状態に対して不正なイベントがあれば何も書き込まない。
    pub fn append(&mut self, entity: &mut A, opens_stream: bool) -> Result<bool, DataAccessError> {
        if entity.events().is_empty() {
            return Ok(false);
        }
        let id = entity.id();
        match (opens_stream, self.streams.contains_key(&id)) {
            (true, true) => {
                return Err(DataAccessError::WriteError(Box::new(
                    StreamError::AlreadyExists(stream_name::<A>(id)),
                )))
            }
            (false, false) => {
                return Err(DataAccessError::WriteError(Box::new(StreamError::NotFound(
                    stream_name::<A>(id),
                ))))
            }
            _ => {}
        }
        let mut current = self.load(id).unwrap_or_default();
        current
            .try_apply_all(entity.iter().cloned())
            .map_err(|e| DataAccessError::WriteError(Box::new(e)))?;
        self.streams.entry(id).or_default().extend(entity.pop_all());
        Ok(true)
    }
}

fn stream_name<E: Entity>(id: E::Id) -> String {
    E::ENTITY_NAME.to_owned() + "-" + &id.to_string()
}

#[derive(Debug, Display, Error)]
pub enum StreamError {
    #[display(fmt = "Stream {} already exists", _0)]
    AlreadyExists(#[error(not(source))] String),
    #[display(fmt = "Stream {} does not exist", _0)]
    NotFound(#[error(not(source))] String),
    #[display(fmt = "Invoice {} does not exist", _0)]
    UnknownInvoice(#[error(not(source))] InvoiceId),
    #[display(fmt = "Invoice {} is already posted", _0)]
    AlreadyPosted(#[error(not(source))] InvoiceId),
}

#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub draft: InvoiceDraft,
    pub posted: bool,
}

#[derive(Debug, Default)]
struct Ledger {
    last_id: u64,
    entries: HashMap<InvoiceId, LedgerEntry>,
}

/// 請求書をメモリに保持する会計連携。複製は同じ台帳を共有する
#[derive(Debug, Clone, Default)]
pub struct MemoryAccounting {
    ledger: Arc<Mutex<Ledger>>,
}

impl MemoryAccounting {
    pub async fn entry(&self, id: InvoiceId) -> Option<LedgerEntry> {
        self.ledger.lock().await.entries.get(&id).cloned()
    }
}

#[async_trait]
impl AccountingGateway for MemoryAccounting {
    async fn create_invoice(&mut self, draft: &InvoiceDraft) -> Result<InvoiceId, DataAccessError> {
        let mut ledger = self.ledger.lock().await;
        ledger.last_id += 1;
        let id = InvoiceId::from(ledger.last_id);
        ledger.entries.insert(
            id,
            LedgerEntry {
                draft: draft.clone(),
                posted: false,
            },
        );
        Ok(id)
    }

    async fn post_invoice(&mut self, id: InvoiceId) -> Result<(), DataAccessError> {
        let mut ledger = self.ledger.lock().await;
        let entry = ledger
            .entries
            .get_mut(&id)
            .ok_or_else(|| DataAccessError::ReadError(Box::new(StreamError::UnknownInvoice(id))))?;
        if entry.posted {
            return Err(DataAccessError::WriteError(Box::new(
                StreamError::AlreadyPosted(id),
            )));
        }
        entry.posted = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::core::BranchId;

    use super::*;

    #[test]
    fn test_append_and_replay() {
        let mut streams = EventStreams::<Branch>::default();
        let mut branch = Branch::open(1.into(), "Osaka".to_owned(), String::new()).unwrap();
        assert!(streams.append(&mut branch, true).unwrap());
        assert!(branch.events().is_empty());
        assert!(!streams.append(&mut branch, false).unwrap());

        branch.close();
        assert!(streams.append(&mut branch, false).unwrap());
        let loaded = streams.load(1.into()).unwrap();
        assert_eq!(loaded, branch);
        assert!(!loaded.is_active());
        assert!(streams.load(BranchId::from(2)).is_none());
    }

    #[test]
    fn test_stream_expectations() {
        let mut streams = EventStreams::<Branch>::default();
        let mut branch = Branch::open(1.into(), "Osaka".to_owned(), String::new()).unwrap();
        let mut copy = branch.clone();
        streams.append(&mut branch, true).unwrap();
        assert!(matches!(
            streams.append(&mut copy, true),
            Err(DataAccessError::WriteError(_))
        ));

        let mut orphan = Branch::open(3.into(), "Kobe".to_owned(), String::new()).unwrap();
        orphan.clear();
        orphan.close();
        assert!(matches!(
            streams.append(&mut orphan, false),
            Err(DataAccessError::WriteError(_))
        ));
    }

    #[test]
    fn test_append_rejects_events_invalid_for_stored_state() {
        use chrono::{TimeZone, Utc};

        use crate::domain::core::{ReservationStatus, ReservationTerms};

        let mut streams = EventStreams::<Reservation>::default();
        let mut reservation = Reservation::create(
            1.into(),
            1.into(),
            1.into(),
            Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap()
                ..Utc.with_ymd_and_hms(2024, 3, 3, 10, 0, 0).unwrap(),
            ReservationTerms::default(),
            ReservationStatus::Draft,
        )
        .unwrap();
        streams.append(&mut reservation, true).unwrap();

        // 同じ予約を別々に読み込んだ2つのコピー
        let mut stale = reservation.clone();
        reservation
            .change_status(ReservationStatus::Cancelled)
            .unwrap();
        streams.append(&mut reservation, false).unwrap();
        stale.change_status(ReservationStatus::Confirmed).unwrap();
        assert!(matches!(
            streams.append(&mut stale, false),
            Err(DataAccessError::WriteError(_))
        ));
        assert_eq!(stale.events().len(), 1);
        assert_eq!(
            streams.load(1.into()).unwrap().status(),
            ReservationStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_memory_accounting() {
        use chrono::{Duration, TimeZone, Utc};

        use crate::domain::core::{Currency, EventBookingStatus, Money};

        let hall = Hall::register(
            1.into(),
            1.into(),
            "Ume".to_owned(),
            1.into(),
            50,
            Some(Money::new(10000, Currency::JPY)),
            Default::default(),
        )
        .unwrap();
        let mut booking = EventBooking::create(
            1.into(),
            1.into(),
            1.into(),
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            Duration::hours(1),
            None,
            None,
            None,
        )
        .unwrap();
        booking.change_status(EventBookingStatus::Confirmed).unwrap();
        let draft = InvoiceDraft::for_event_booking(&booking, &hall, None, None).unwrap();

        let mut accounting = MemoryAccounting::default();
        let handle = accounting.clone();
        let id = accounting.create_invoice(&draft).await.unwrap();
        assert_eq!(handle.entry(id).await.unwrap().draft, draft);
        accounting.post_invoice(id).await.unwrap();
        assert!(handle.entry(id).await.unwrap().posted);
        assert!(matches!(
            accounting.post_invoice(id).await,
            Err(DataAccessError::WriteError(_))
        ));
        assert!(matches!(
            accounting.post_invoice(99.into()).await,
            Err(DataAccessError::ReadError(_))
        ));
    }
}
