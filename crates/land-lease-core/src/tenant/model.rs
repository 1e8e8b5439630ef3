use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::DateRange;
use crate::types::{ContactId, IntendedUseId, TenantId};

/// A `numerator / denominator` share stored as two positive integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Share {
    pub numerator: u32,
    pub denominator: u32,
}

impl Share {
    pub const WHOLE: Share = Share {
        numerator: 1,
        denominator: 1,
    };

    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn as_decimal(&self) -> Decimal {
        if self.denominator == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.numerator) / Decimal::from(self.denominator)
    }

    pub fn is_zero(&self) -> bool {
        self.numerator == 0 || self.denominator == 0
    }
}

fn gcd(a: u128, b: u128) -> u128 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Exact sum of shares kept as a reduced fraction. Decimal sums of thirds
/// never reach one, so share checks go through this instead.
///
/// Denominators whose least common multiple does not fit in 128 bits make the
/// sum inexact: it then only carries a decimal approximation, never compares
/// equal to one and scales shares by that approximation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareSum {
    numerator: u128,
    denominator: u128,
    approximate: Decimal,
    exact: bool,
}

impl Default for ShareSum {
    fn default() -> Self {
        Self {
            numerator: 0,
            denominator: 1,
            approximate: Decimal::ZERO,
            exact: true,
        }
    }
}

impl ShareSum {
    pub fn add(&mut self, share: Share) {
        if share.is_zero() {
            return;
        }
        self.approximate += share.as_decimal();
        if !self.exact {
            return;
        }
        match self.checked_sum(share) {
            Some((numerator, denominator)) => {
                self.numerator = numerator;
                self.denominator = denominator;
            }
            None => self.exact = false,
        }
    }

    /// Reduced `self + share` over the least common denominator, `None` when
    /// it does not fit in 128 bits.
    fn checked_sum(&self, share: Share) -> Option<(u128, u128)> {
        let n = u128::from(share.numerator);
        let d = u128::from(share.denominator);
        let denominator = (self.denominator / gcd(self.denominator, d)).checked_mul(d)?;
        let numerator = self
            .numerator
            .checked_mul(denominator / self.denominator)?
            .checked_add(n.checked_mul(denominator / d)?)?;
        let divisor = gcd(numerator, denominator).max(1);
        Some((numerator / divisor, denominator / divisor))
    }

    pub fn is_exact(&self) -> bool {
        self.exact
    }

    pub fn is_one(&self) -> bool {
        self.exact && self.numerator == self.denominator
    }

    pub fn is_zero(&self) -> bool {
        if self.exact {
            self.numerator == 0
        } else {
            self.approximate.is_zero()
        }
    }

    pub fn as_decimal(&self) -> Decimal {
        if !self.exact {
            return self.approximate;
        }
        match (
            Decimal::from_u128(self.numerator),
            Decimal::from_u128(self.denominator),
        ) {
            (Some(n), Some(d)) if !d.is_zero() => n / d,
            _ => self.approximate,
        }
    }

    /// `share` as a fraction of this sum.
    pub fn relative(&self, share: Share) -> Decimal {
        let exact = self.exact.then(|| {
            let numerator = u128::from(share.numerator).checked_mul(self.denominator)?;
            let denominator = u128::from(share.denominator).checked_mul(self.numerator)?;
            match (Decimal::from_u128(numerator), Decimal::from_u128(denominator)) {
                (Some(n), Some(d)) if !d.is_zero() => Some(n / d),
                _ => None,
            }
        });
        match exact.flatten() {
            Some(fraction) => fraction,
            None if self.approximate.is_zero() => Decimal::ZERO,
            None => share.as_decimal() / self.approximate,
        }
    }
}

impl FromIterator<Share> for ShareSum {
    fn from_iter<I: IntoIterator<Item = Share>>(iter: I) -> Self {
        let mut sum = ShareSum::default();
        for share in iter {
            sum.add(share);
        }
        sum
    }
}

impl std::fmt::Display for ShareSum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.exact {
            write!(f, "{}/{}", self.numerator, self.denominator)
        } else {
            write!(f, "~{}", self.approximate)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantContactType {
    Tenant,
    Billing,
    Contact,
}

/// Link between a tenant and a contact for a time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContact {
    pub contact: ContactId,
    pub contact_type: TenantContactType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl TenantContact {
    pub fn active_range(&self, within: &DateRange) -> Option<DateRange> {
        within.clamp(self.start_date, self.end_date)
    }

    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date.map_or(true, |start| start <= date)
            && self.end_date.map_or(true, |end| date <= end)
    }
}

/// Billing share of a tenant for one intended use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRentShare {
    pub intended_use: IntendedUseId,
    pub share: Share,
}

/// A party to a lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    /// Management share of the lease
    pub share: Share,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub rent_shares: Vec<TenantRentShare>,
    #[serde(default)]
    pub contacts: Vec<TenantContact>,
}

impl Tenant {
    fn contacts_of(&self, kind: TenantContactType) -> impl Iterator<Item = &TenantContact> {
        self.contacts
            .iter()
            .filter(move |contact| contact.contact_type == kind)
    }

    /// Part of `period` during which the tenant has a TENANT contact.
    pub fn active_period_within(&self, period: &DateRange) -> Option<DateRange> {
        let windows: Vec<DateRange> = self
            .contacts_of(TenantContactType::Tenant)
            .filter_map(|contact| contact.active_range(period))
            .collect();
        let start = windows.iter().map(DateRange::start).min()?;
        let end = windows.iter().map(DateRange::end).max()?;
        DateRange::new(start, end).ok()
    }

    pub fn is_active_on(&self, period: &DateRange) -> bool {
        self.active_period_within(period).is_some()
    }

    pub fn is_active_on_date(&self, date: NaiveDate) -> bool {
        self.contacts_of(TenantContactType::Tenant)
            .any(|contact| contact.is_active_on(date))
    }

    /// Contact an invoice for `period` goes to: an active BILLING contact,
    /// otherwise the TENANT contact. The latest starting link wins.
    pub fn recipient_for(&self, period: &DateRange) -> Option<ContactId> {
        let latest = |kind| {
            self.contacts_of(kind)
                .filter(|contact| contact.active_range(period).is_some())
                .max_by_key(|contact| contact.start_date)
                .map(|contact| contact.contact)
        };
        latest(TenantContactType::Billing).or_else(|| latest(TenantContactType::Tenant))
    }

    /// Contacts linked to the tenant (any type) on `date`.
    pub fn contacts_active_on(&self, date: NaiveDate) -> impl Iterator<Item = ContactId> + '_ {
        self.contacts
            .iter()
            .filter(move |contact| contact.is_active_on(date))
            .map(|contact| contact.contact)
    }

    /// Billing share for `intended_use`. Tenants without any configured rent
    /// shares are billed by their management share.
    pub fn billing_share(&self, intended_use: IntendedUseId) -> Share {
        if self.rent_shares.is_empty() {
            return self.share;
        }
        self.rent_shares
            .iter()
            .find(|share| share.intended_use == intended_use)
            .map_or(Share::new(0, 1), |share| share.share)
    }
}

/// Person or organisation that invoices are addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_number: Option<String>,
}

/// Lookup of contacts by handle; the recipient directory collaborator.
pub trait ContactDirectory: Send + Sync {
    fn contact(&self, id: ContactId) -> Option<Contact>;
}
