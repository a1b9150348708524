use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, Entity, ProductId};

use crate::movement::StockMovement;

const SKU_MAX_LEN: usize = 64;
const NAME_MAX_LEN: usize = 255;
const EAN13_LEN: usize = 13;

/// Stock keeping unit: 1..=64 characters, surrounding whitespace stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if trimmed.chars().count() > SKU_MAX_LEN {
            return Err(DomainError::validation(format!(
                "sku cannot exceed {SKU_MAX_LEN} characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Sku {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// EAN-13 article number: exactly 13 ASCII digits.
///
/// The check digit is not verified; existing catalogues carry codes that only
/// satisfy the shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ean13(String);

impl Ean13 {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        if raw.len() != EAN13_LEN || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::validation("ean13 must be exactly 13 digits"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Ean13 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display names must be non-blank and at most 255 characters.
pub fn validate_name(raw: &str) -> DomainResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    if trimmed.chars().count() > NAME_MAX_LEN {
        return Err(DomainError::validation(format!(
            "name cannot exceed {NAME_MAX_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Validated input for product creation.
///
/// The initial quantity is a baseline: it is stored on the product directly and
/// does not produce a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub sku: Sku,
    pub ean13: Ean13,
    pub name: String,
    pub initial_quantity: i64,
}

impl NewProduct {
    pub fn parse(sku: &str, ean13: &str, name: &str, initial_quantity: i64) -> DomainResult<Self> {
        if initial_quantity < 0 {
            return Err(DomainError::validation("initial quantity cannot be negative"));
        }
        Ok(Self {
            sku: Sku::parse(sku)?,
            ean13: Ean13::parse(ean13)?,
            name: validate_name(name)?,
            initial_quantity,
        })
    }
}

/// A catalogue product and its current on-hand quantity.
///
/// `quantity` is a cache of the ledger: after any movement it equals that
/// movement's `qty_after`. The only way to change it is [`Product::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    sku: Sku,
    ean13: Ean13,
    name: String,
    quantity: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Product {
    /// Create a brand-new product from validated input.
    pub fn create(id: ProductId, new: NewProduct, at: DateTime<Utc>) -> Self {
        Self {
            id,
            sku: new.sku,
            ean13: new.ean13,
            name: new.name,
            quantity: new.initial_quantity,
            created_at: at,
            updated_at: at,
        }
    }

    /// Rebuild a product from persisted state.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ProductId,
        sku: Sku,
        ean13: Ean13,
        name: String,
        quantity: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sku,
            ean13,
            name,
            quantity,
            created_at,
            updated_at,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn ean13(&self) -> &Ean13 {
        &self.ean13
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Move the cached quantity forward by one ledger entry.
    ///
    /// The movement must belong to this product and start from the current
    /// quantity; anything else would break the ledger chain.
    pub fn apply(&mut self, movement: &StockMovement) -> DomainResult<()> {
        if movement.product_id() != self.id {
            return Err(DomainError::invariant("movement belongs to another product"));
        }
        if movement.qty_before() != self.quantity {
            return Err(DomainError::invariant(format!(
                "movement starts at {} but product is at {}",
                movement.qty_before(),
                self.quantity
            )));
        }
        self.quantity = movement.qty_after();
        self.updated_at = movement.created_at();
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
