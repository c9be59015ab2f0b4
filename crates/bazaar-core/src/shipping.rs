//! Delivery fee table keyed by city.

use rust_decimal::Decimal;

/// Fee charged for any city missing from the table, in cents.
pub const DEFAULT_DELIVERY_FEE_CENTS: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingCity {
    pub name: &'static str,
    fee_cents: i64,
}

impl ShippingCity {
    #[must_use]
    pub fn fee(&self) -> Decimal {
        Decimal::new(self.fee_cents, 2)
    }
}

const SHIPPING_CITIES: [ShippingCity; 6] = [
    ShippingCity { name: "Kathmandu", fee_cents: 350 },
    ShippingCity { name: "Pokhara", fee_cents: 450 },
    ShippingCity { name: "Lalitpur", fee_cents: 300 },
    ShippingCity { name: "Bhaktapur", fee_cents: 300 },
    ShippingCity { name: "Biratnagar", fee_cents: 500 },
    ShippingCity { name: "Butwal", fee_cents: 400 },
];

/// Cities with a known delivery fee, in display order.
#[must_use]
pub fn shipping_cities() -> &'static [ShippingCity] {
    &SHIPPING_CITIES
}

/// Delivery fee for a city. Matching ignores case and surrounding whitespace;
/// unknown cities pay the default fee.
#[must_use]
pub fn delivery_fee(city: &str) -> Decimal {
    let city = city.trim();
    SHIPPING_CITIES
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(city))
        .map_or(Decimal::new(DEFAULT_DELIVERY_FEE_CENTS, 2), ShippingCity::fee)
}
