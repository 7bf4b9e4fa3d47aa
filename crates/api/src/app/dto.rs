use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use cafekiosk_core::DomainError;
use cafekiosk_orders::{OrderLine, OrderResult, OrderStatus};
use cafekiosk_products::{NewProduct, Product, ProductNumber, ProductSellingStatus, ProductType};
use cafekiosk_stock::Stock;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub selling_status: ProductSellingStatus,
    pub name: String,
    pub price: u32,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(body: CreateProductRequest) -> Self {
        NewProduct {
            product_type: body.product_type,
            selling_status: body.selling_status,
            name: body.name,
            price: body.price,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStockRequest {
    pub product_number: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub product_numbers: Vec<String>,
}

impl CreateOrderRequest {
    pub fn product_numbers(&self) -> Vec<ProductNumber> {
        self.product_numbers
            .iter()
            .map(|n| ProductNumber::new(n.as_str()))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatisticsMailRequest {
    pub order_date: NaiveDate,
    pub email: String,
}

impl OrderStatisticsMailRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.email.trim().is_empty() {
            return Err(DomainError::validation("email must not be blank"));
        }
        Ok(())
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub product_number: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub type_text: &'static str,
    pub selling_status: ProductSellingStatus,
    pub selling_status_text: &'static str,
    pub name: String,
    pub price: u32,
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        Self {
            product_number: product.product_number().to_string(),
            product_type: product.product_type(),
            type_text: product.product_type().text(),
            selling_status: product.selling_status(),
            selling_status_text: product.selling_status().text(),
            name: product.name().to_string(),
            price: product.price(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockResponse {
    pub product_number: String,
    pub quantity: u32,
}

impl From<&Stock> for StockResponse {
    fn from(stock: &Stock) -> Self {
        Self {
            product_number: stock.product_number().to_string(),
            quantity: stock.quantity(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineResponse {
    pub product_number: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub type_text: &'static str,
    pub name: String,
    pub price: u32,
}

impl From<OrderLine> for OrderLineResponse {
    fn from(line: OrderLine) -> Self {
        Self {
            product_number: line.product_number.into_inner(),
            product_type: line.product_type,
            type_text: line.product_type.text(),
            name: line.name,
            price: line.price,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i64,
    pub status: OrderStatus,
    pub status_text: &'static str,
    pub total_price: u64,
    pub registered_date_time: DateTime<Utc>,
    pub products: Vec<OrderLineResponse>,
}

impl From<OrderResult> for OrderResponse {
    fn from(result: OrderResult) -> Self {
        Self {
            id: result.id.value(),
            status: result.status,
            status_text: result.status.text(),
            total_price: result.total_price,
            registered_date_time: result.registered_at,
            products: result.lines.into_iter().map(Into::into).collect(),
        }
    }
}
