//! Catalog and stock registration.

use thiserror::Error;
use tracing::{info, instrument};

use cafekiosk_core::DomainError;
use cafekiosk_products::{NewProduct, Product, ProductNumber, ProductSellingStatus, UnknownProduct};
use cafekiosk_stock::Stock;

use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum ProductServiceError {
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    UnknownProduct(#[from] UnknownProduct),

    #[error("product {product_number} does not keep stock")]
    NotStockTracked { product_number: ProductNumber },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct ProductService<S> {
    store: S,
}

impl<S> ProductService<S>
where
    S: Store,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Register a product under the next sequential product number.
    #[instrument(skip(self, new_product), fields(name = %new_product.name), err)]
    pub async fn create_product(
        &self,
        new_product: NewProduct,
    ) -> Result<Product, ProductServiceError> {
        new_product.validate()?;

        let mut tx = self.store.begin().await?;
        let latest = tx.find_latest_product_number().await?;
        let product_number = ProductNumber::next_after(latest.as_ref())?;
        let product = new_product.into_product(product_number)?;

        tx.insert_product(&product).await?;
        tx.commit().await?;

        info!(product_number = %product.product_number(), "product registered");
        Ok(product)
    }

    /// Products shown at the kiosk.
    #[instrument(skip(self), err)]
    pub async fn selling_products(&self) -> Result<Vec<Product>, ProductServiceError> {
        let mut tx = self.store.begin().await?;
        let products = tx
            .find_products_by_selling_status(ProductSellingStatus::for_display())
            .await?;
        tx.commit().await?;
        Ok(products)
    }

    /// Open a stock entry for a stock-tracked product.
    #[instrument(skip(self, product_number), fields(product_number = %product_number), err)]
    pub async fn register_stock(
        &self,
        product_number: ProductNumber,
        quantity: u32,
    ) -> Result<Stock, ProductServiceError> {
        let mut tx = self.store.begin().await?;

        let product = tx
            .find_products_by_numbers(std::slice::from_ref(&product_number))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| UnknownProduct {
                product_number: product_number.clone(),
            })?;
        if !product.is_stock_tracked() {
            return Err(ProductServiceError::NotStockTracked { product_number });
        }

        let stock = Stock::new(product_number, quantity);
        tx.insert_stock(&stock).await?;
        tx.commit().await?;

        info!(quantity, "stock registered");
        Ok(stock)
    }
}
