use serde::{Deserialize, Serialize};

use cafekiosk_core::{DomainError, DomainResult, Entity};

/// Catalog-unique product identifier (e.g. `"001"`).
///
/// Opaque for lookups: no format validation is applied when a number is requested.
/// Numbers assigned by [`ProductNumber::next_after`] are sequential and zero padded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductNumber(String);

impl ProductNumber {
    /// Number given to the first product of an empty catalog.
    pub const FIRST: &'static str = "001";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Number to assign to the next registered product.
    ///
    /// `latest` is the most recently registered product number, if any.
    pub fn next_after(latest: Option<&ProductNumber>) -> DomainResult<ProductNumber> {
        let Some(latest) = latest else {
            return Ok(ProductNumber::new(Self::FIRST));
        };

        let current: u32 = latest.as_str().parse().map_err(|_| {
            DomainError::invariant(format!(
                "latest product number '{latest}' is not numeric"
            ))
        })?;
        let next = current
            .checked_add(1)
            .ok_or_else(|| DomainError::invariant("product number space exhausted"))?;

        Ok(ProductNumber(format!("{next:03}")))
    }
}

impl core::fmt::Display for ProductNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductNumber {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProductNumber {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Product category. Decides whether a product's stock is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    /// Drinks made to order.
    Handmade,
    /// Bottled drinks.
    Bottle,
    /// Bakery goods.
    Bakery,
}

impl ProductType {
    /// Types whose units are counted in stock.
    pub const STOCK_TRACKED: [ProductType; 2] = [ProductType::Bottle, ProductType::Bakery];

    pub fn is_stock_tracked(self) -> bool {
        Self::STOCK_TRACKED.contains(&self)
    }

    pub fn text(self) -> &'static str {
        match self {
            ProductType::Handmade => "Handmade drink",
            ProductType::Bottle => "Bottled drink",
            ProductType::Bakery => "Bakery",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProductType::Handmade => "HANDMADE",
            ProductType::Bottle => "BOTTLE",
            ProductType::Bakery => "BAKERY",
        }
    }
}

impl core::str::FromStr for ProductType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HANDMADE" => Ok(ProductType::Handmade),
            "BOTTLE" => Ok(ProductType::Bottle),
            "BAKERY" => Ok(ProductType::Bakery),
            other => Err(DomainError::validation(format!("unknown product type: {other}"))),
        }
    }
}

/// Selling status lifecycle of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductSellingStatus {
    Selling,
    Hold,
    StopSelling,
}

impl ProductSellingStatus {
    /// Statuses shown on the kiosk screen.
    pub fn for_display() -> &'static [ProductSellingStatus] {
        &[ProductSellingStatus::Selling, ProductSellingStatus::Hold]
    }

    pub fn is_displayed(self) -> bool {
        Self::for_display().contains(&self)
    }

    pub fn text(self) -> &'static str {
        match self {
            ProductSellingStatus::Selling => "On sale",
            ProductSellingStatus::Hold => "Sale on hold",
            ProductSellingStatus::StopSelling => "Sale stopped",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProductSellingStatus::Selling => "SELLING",
            ProductSellingStatus::Hold => "HOLD",
            ProductSellingStatus::StopSelling => "STOP_SELLING",
        }
    }
}

impl core::str::FromStr for ProductSellingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SELLING" => Ok(ProductSellingStatus::Selling),
            "HOLD" => Ok(ProductSellingStatus::Hold),
            "STOP_SELLING" => Ok(ProductSellingStatus::StopSelling),
            other => Err(DomainError::validation(format!("unknown selling status: {other}"))),
        }
    }
}

/// Catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    product_number: ProductNumber,
    product_type: ProductType,
    selling_status: ProductSellingStatus,
    name: String,
    /// Price in the smallest currency unit (KRW has no minor unit).
    price: u32,
}

impl Product {
    pub fn new(
        product_number: ProductNumber,
        product_type: ProductType,
        selling_status: ProductSellingStatus,
        name: impl Into<String>,
        price: u32,
    ) -> Self {
        Self {
            product_number,
            product_type,
            selling_status,
            name: name.into(),
            price,
        }
    }

    pub fn product_number(&self) -> &ProductNumber {
        &self.product_number
    }

    pub fn product_type(&self) -> ProductType {
        self.product_type
    }

    pub fn selling_status(&self) -> ProductSellingStatus {
        self.selling_status
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> u32 {
        self.price
    }

    pub fn is_stock_tracked(&self) -> bool {
        self.product_type.is_stock_tracked()
    }
}

impl Entity for Product {
    type Id = ProductNumber;

    fn id(&self) -> &ProductNumber {
        &self.product_number
    }
}

/// Registration payload for a new catalog entry (number not yet assigned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub product_type: ProductType,
    pub selling_status: ProductSellingStatus,
    pub name: String,
    pub price: u32,
}

impl NewProduct {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("product name must not be blank"));
        }
        if self.price == 0 {
            return Err(DomainError::validation("product price must be positive"));
        }
        Ok(())
    }

    /// Validate and turn the payload into a catalog entry with the given number.
    pub fn into_product(self, product_number: ProductNumber) -> DomainResult<Product> {
        self.validate()?;
        Ok(Product::new(
            product_number,
            self.product_type,
            self.selling_status,
            self.name.trim(),
            self.price,
        ))
    }
}
