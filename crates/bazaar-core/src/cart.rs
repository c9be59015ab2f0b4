use crate::CoreError;

/// Upper bound on a single cart line's quantity.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

/// Validate the quantity supplied to add-to-cart. Absent means one.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] when the quantity is below one or above
/// [`MAX_LINE_QUANTITY`].
pub fn validate_add_quantity(quantity: Option<i64>) -> Result<i32, CoreError> {
    let quantity = quantity.unwrap_or(1);
    if quantity < 1 {
        return Err(CoreError::Validation(
            "quantity must be at least 1".to_string(),
        ));
    }
    i32::try_from(quantity)
        .ok()
        .filter(|q| *q <= MAX_LINE_QUANTITY)
        .ok_or_else(|| {
            CoreError::Validation(format!("quantity must not exceed {MAX_LINE_QUANTITY}"))
        })
}

/// What a cart update request does to an existing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartUpdate {
    /// Replace the line's quantity.
    Set(i32),
    /// Drop the line.
    Remove,
}

impl CartUpdate {
    /// Zero or negative quantities remove the line.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when a positive quantity exceeds
    /// [`MAX_LINE_QUANTITY`].
    pub fn from_quantity(quantity: i64) -> Result<Self, CoreError> {
        if quantity <= 0 {
            return Ok(Self::Remove);
        }
        i32::try_from(quantity)
            .ok()
            .filter(|q| *q <= MAX_LINE_QUANTITY)
            .map(Self::Set)
            .ok_or_else(|| {
                CoreError::Validation(format!("quantity must not exceed {MAX_LINE_QUANTITY}"))
            })
    }
}
