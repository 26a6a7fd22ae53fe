mod availability;
mod branch;
mod catalog;
mod event_booking;
mod hall;
mod housekeeping;
mod invoice;
mod maintenance;
mod occupancy;
mod reservation;
mod room;

use std::cmp::Ordering;
use std::fmt::Display;

use derive_more::{Deref, Display, From};
use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};

use crate::domain::Id;

pub use self::availability::*;
pub use self::branch::*;
pub use self::catalog::*;
pub use self::event_booking::*;
pub use self::hall::*;
pub use self::housekeeping::*;
pub use self::invoice::*;
pub use self::maintenance::*;
pub use self::occupancy::*;
pub use self::reservation::*;
pub use self::room::*;

/// 状態連携を起こすイベント
#[derive(Clone, Debug, PartialEq)]
pub enum CoreEvent {
    ReservationEvent(ReservationEvent),
    HousekeepingTaskEvent(HousekeepingTaskEvent),
    MaintenanceTaskEvent(MaintenanceTaskEvent),
}

/// スタッフID
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Deref, Default,
)]
pub struct StaffId(u64);

impl Id for StaffId {
    type Inner = u64;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    JPY,
    USD,
    EUR,
    GBP,
}

impl Currency {
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::JPY => "¥",
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
        }
    }

    /// 補助単位の桁数
    pub fn exponent(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            Currency::USD | Currency::EUR | Currency::GBP => 2,
        }
    }
}

/// 通貨の補助単位で表した金額
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Money {
    amount: i64,
    currency: Currency,
}

impl Money {
    pub fn new(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn times(&self, quantity: i64) -> Option<Money> {
        self.amount
            .checked_mul(quantity)
            .map(|amount| Money::new(amount, self.currency))
    }

    /// `self * numerator / denominator` を四捨五入する
    pub fn prorate(&self, numerator: i64, denominator: i64) -> Option<Money> {
        if denominator == 0 {
            return None;
        }
        let scaled = (self.amount as i128).checked_mul(numerator as i128)?;
        let denominator = denominator as i128;
        let mut quotient = scaled / denominator;
        if (scaled % denominator).abs() * 2 >= denominator.abs() {
            quotient += if (scaled < 0) == (denominator < 0) { 1 } else { -1 };
        }
        i64::try_from(quotient)
            .ok()
            .map(|amount| Money::new(amount, self.currency))
    }

    pub fn checked_add(&self, other: &Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        self.amount
            .checked_add(other.amount)
            .map(|amount| Money::new(amount, self.currency))
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.currency == other.currency {
            true => Some(self.amount.cmp(&other.amount)),
            false => None,
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        let exponent = self.currency.exponent();
        let unit = 10u64.pow(exponent);
        let major = (abs / unit).to_formatted_string(&Locale::en);
        match exponent {
            0 => write!(f, "{}{}{}", sign, self.currency.symbol(), major),
            _ => write!(
                f,
                "{}{}{}.{:0width$}",
                sign,
                self.currency.symbol(),
                major,
                abs % unit,
                width = exponent as usize
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_display() {
        assert_eq!(format!("{}", Money::new(1000000, Currency::JPY)), "¥1,000,000");
        assert_eq!(format!("{}", Money::new(123450, Currency::USD)), "$1,234.50");
        assert_eq!(format!("{}", Money::new(-705, Currency::EUR)), "-€7.05");
    }

    #[test]
    fn test_money_compare_across_currencies() {
        let yen = Money::new(100, Currency::JPY);
        let dollar = Money::new(100, Currency::USD);
        assert_eq!(yen.partial_cmp(&dollar), None);
        assert!(!(yen <= dollar));
        assert!(Money::new(99, Currency::JPY) < yen);
    }

    #[test]
    fn test_money_prorate() {
        let rate = Money::new(10000, Currency::JPY);
        assert_eq!(rate.prorate(90, 60), Some(Money::new(15000, Currency::JPY)));
        assert_eq!(
            Money::new(100, Currency::JPY).prorate(1, 3),
            Some(Money::new(33, Currency::JPY))
        );
        assert_eq!(
            Money::new(100, Currency::JPY).prorate(2, 3),
            Some(Money::new(67, Currency::JPY))
        );
        assert_eq!(rate.prorate(1, 0), None);
    }

    #[test]
    fn test_money_add() {
        let a = Money::new(500, Currency::USD);
        assert_eq!(a.checked_add(&a), Some(Money::new(1000, Currency::USD)));
        assert_eq!(a.checked_add(&Money::new(1, Currency::JPY)), None);
    }
}
