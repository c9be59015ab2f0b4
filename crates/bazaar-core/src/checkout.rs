//! Checkout pricing: turning cart lines into an order quote.
//!
//! Everything here is pure; the database layer resolves products and hands
//! their current state in as [`ProductSnapshot`]s.

use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::shipping::delivery_fee;
use crate::CoreError;

/// Current catalog state of a product at checkout time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub name: String,
    pub image: String,
    pub price: Decimal,
}

/// A cart line priced against the catalog.
///
/// `name` and `image` are `None` when the product no longer exists; such
/// lines carry a zero unit price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub name: Option<String>,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl PricedLine {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutQuote {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub grand_total: Decimal,
}

/// Validated customer contact and delivery address for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub street: String,
    pub city: String,
}

impl CustomerDetails {
    /// Trim and validate checkout contact fields. Street is optional.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when name, email or city is missing or blank.
    pub fn new(
        name: Option<&str>,
        email: Option<&str>,
        street: Option<&str>,
        city: Option<&str>,
    ) -> Result<Self, CoreError> {
        fn required(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }

        match (required(name), required(email), required(city)) {
            (Some(name), Some(email), Some(city)) => Ok(Self {
                name: name.to_string(),
                email: email.to_string(),
                street: street.map(str::trim).unwrap_or_default().to_string(),
                city: city.to_string(),
            }),
            _ => Err(CoreError::Validation(
                "name, email, city are required".to_string(),
            )),
        }
    }
}

/// Price each `(product_id, quantity)` cart line against the catalog snapshot.
/// Order is preserved; products missing from `catalog` price at zero.
#[must_use]
pub fn price_lines(
    cart: &[(Uuid, i32)],
    catalog: &HashMap<Uuid, ProductSnapshot>,
) -> Vec<PricedLine> {
    cart.iter()
        .map(|&(product_id, quantity)| match catalog.get(&product_id) {
            Some(product) => PricedLine {
                product_id,
                name: Some(product.name.clone()),
                image: Some(product.image.clone()),
                unit_price: product.price,
                quantity,
            },
            None => PricedLine {
                product_id,
                name: None,
                image: None,
                unit_price: Decimal::ZERO,
                quantity,
            },
        })
        .collect()
}

/// Compute subtotal, delivery fee and grand total for priced lines shipped to `city`.
#[must_use]
pub fn quote_order(lines: &[PricedLine], city: &str) -> CheckoutQuote {
    let subtotal: Decimal = lines.iter().map(PricedLine::line_total).sum();
    let delivery_fee = delivery_fee(city);
    CheckoutQuote {
        subtotal,
        delivery_fee,
        grand_total: subtotal + delivery_fee,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str, cents: i64) -> ProductSnapshot {
        ProductSnapshot {
            name: name.to_string(),
            image: format!("/uploads/{name}.jpg"),
            price: Decimal::new(cents, 2),
        }
    }

    #[test]
    fn quote_matches_worked_example() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let catalog = HashMap::from([(a, snapshot("a", 500)), (b, snapshot("b", 300))]);

        let lines = price_lines(&[(a, 2), (b, 1)], &catalog);
        let quote = quote_order(&lines, "Kathmandu");

        assert_eq!(quote.subtotal, Decimal::new(1300, 2));
        assert_eq!(quote.delivery_fee, Decimal::new(350, 2));
        assert_eq!(quote.grand_total, Decimal::new(1650, 2));
    }

    #[test]
    fn missing_product_prices_at_zero_and_keeps_going() {
        let known = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let catalog = HashMap::from([(known, snapshot("known", 250))]);

        let lines = price_lines(&[(gone, 4), (known, 2)], &catalog);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product_id, gone);
        assert_eq!(lines[0].unit_price, Decimal::ZERO);
        assert!(lines[0].name.is_none());
        assert_eq!(lines[1].name.as_deref(), Some("known"));

        let quote = quote_order(&lines, "Nowhere");
        assert_eq!(quote.subtotal, Decimal::new(500, 2));
        assert_eq!(quote.grand_total, Decimal::new(1000, 2));
    }

    #[test]
    fn customer_requires_name_email_city() {
        let err = CustomerDetails::new(Some("Asha"), Some("asha@example.com"), None, Some("  "))
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::Validation("name, email, city are required".to_string())
        );
        assert!(CustomerDetails::new(None, Some("a@b.c"), None, Some("Pokhara")).is_err());
    }

    #[test]
    fn customer_street_defaults_to_empty() {
        let customer =
            CustomerDetails::new(Some(" Asha "), Some("asha@example.com"), None, Some("Pokhara"))
                .expect("valid customer");
        assert_eq!(customer.name, "Asha");
        assert_eq!(customer.street, "");
        assert_eq!(customer.city, "Pokhara");
    }
}
