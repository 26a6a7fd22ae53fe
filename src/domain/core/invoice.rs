use async_trait::async_trait;
use derive_more::{Deref, Display, Error, From};
use serde::{Deserialize, Serialize};

use crate::domain::{DataAccessError, Entity, Id};

use super::{
    EventBooking, EventBookingId, EventBookingStatus, EventPackage, GuestId, Hall, HallType, Money,
    Reservation, ReservationId, ReservationStatus, Room, RoomType,
};

/// 会計システム
///
/// 請求書の作成と転記はホスト側の会計機能に委譲する
#[async_trait]
pub trait AccountingGateway {
    async fn create_invoice(&mut self, draft: &InvoiceDraft) -> Result<InvoiceId, DataAccessError>;
    async fn post_invoice(&mut self, id: InvoiceId) -> Result<(), DataAccessError>;
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
pub struct InvoiceId(u64);

impl Id for InvoiceId {
    type Inner = u64;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceOrigin {
    Reservation(ReservationId),
    EventBooking(EventBookingId),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// 会計に渡す前の請求書
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    origin: InvoiceOrigin,
    partner_id: GuestId,
    lines: Vec<InvoiceLine>,
    total: Money,
}

impl InvoiceDraft {
    /// 宿泊数 × 客室料金（なければ客室タイプの標準料金）の明細を作成する
    pub fn for_reservation(
        reservation: &Reservation,
        room: &Room,
        room_type: Option<&RoomType>,
    ) -> Result<Self, InvoiceError> {
        match reservation.status() {
            ReservationStatus::Confirmed
            | ReservationStatus::CheckedIn
            | ReservationStatus::CheckedOut => {}
            _ => return Err(InvoiceError::NotInvoiceable),
        }
        let unit_price = *room
            .effective_price(room_type)
            .ok_or(InvoiceError::MissingPrice)?;
        let nights = reservation.nights();
        let line = InvoiceLine {
            description: format!("Room {}", room.name()),
            quantity: nights,
            unit_price,
            subtotal: unit_price.times(nights).ok_or(InvoiceError::Overflow)?,
        };
        Self::new(
            InvoiceOrigin::Reservation(reservation.id()),
            reservation.guest_id(),
            vec![line],
        )
    }

    /// 宴会場は時間料金を分単位（切り上げ）で按分し、パッケージは1件として計上する
    pub fn for_event_booking(
        booking: &EventBooking,
        hall: &Hall,
        hall_type: Option<&HallType>,
        package: Option<&EventPackage>,
    ) -> Result<Self, InvoiceError> {
        if booking.status() != EventBookingStatus::Confirmed {
            return Err(InvoiceError::NotInvoiceable);
        }
        let rate = *hall
            .price_per_hour()
            .or_else(|| hall_type.and_then(|t| t.price_per_hour()))
            .ok_or(InvoiceError::MissingPrice)?;
        let seconds = booking.duration().num_seconds();
        let minutes = seconds / 60 + i64::from(seconds % 60 > 0);
        let hall_amount = rate.prorate(minutes, 60).ok_or(InvoiceError::Overflow)?;
        let mut lines = vec![InvoiceLine {
            description: format!(
                "Hall {} ({}h{:02})",
                hall.name(),
                minutes / 60,
                minutes % 60
            ),
            quantity: 1,
            unit_price: hall_amount,
            subtotal: hall_amount,
        }];
        if let Some(package) = package {
            lines.push(InvoiceLine {
                description: format!("Package {}", package.name()),
                quantity: 1,
                unit_price: *package.price(),
                subtotal: *package.price(),
            });
        }
        Self::new(
            InvoiceOrigin::EventBooking(booking.id()),
            booking.customer_id(),
            lines,
        )
    }

    fn new(
        origin: InvoiceOrigin,
        partner_id: GuestId,
        lines: Vec<InvoiceLine>,
    ) -> Result<Self, InvoiceError> {
        let mut total: Option<Money> = None;
        for line in &lines {
            total = Some(match total {
                None => line.subtotal,
                Some(sum) => sum
                    .checked_add(&line.subtotal)
                    .ok_or(InvoiceError::CurrencyMismatch)?,
            });
        }
        let total = total.ok_or(InvoiceError::NoLines)?;
        Ok(Self {
            origin,
            partner_id,
            lines,
            total,
        })
    }

    pub fn origin(&self) -> InvoiceOrigin {
        self.origin
    }

    pub fn partner_id(&self) -> GuestId {
        self.partner_id
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    pub fn total(&self) -> &Money {
        &self.total
    }
}

#[derive(Error, Display, Debug, PartialEq, Eq)]
pub enum InvoiceError {
    #[display(fmt = "Only confirmed records can be invoiced")]
    NotInvoiceable,
    #[display(fmt = "No price is set")]
    MissingPrice,
    #[display(fmt = "Invoice lines use different currencies")]
    CurrencyMismatch,
    #[display(fmt = "Invoice has no lines")]
    NoLines,
    #[display(fmt = "Amount is out of range")]
    Overflow,
}
