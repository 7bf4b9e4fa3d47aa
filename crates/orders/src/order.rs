use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cafekiosk_core::{DomainError, OrderId};
use cafekiosk_products::{Product, ProductNumber, ProductType};

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Init,
    Canceled,
    PaymentCompleted,
    PaymentFailed,
    Received,
    Completed,
}

impl OrderStatus {
    pub fn text(self) -> &'static str {
        match self {
            OrderStatus::Init => "Order created",
            OrderStatus::Canceled => "Order canceled",
            OrderStatus::PaymentCompleted => "Payment completed",
            OrderStatus::PaymentFailed => "Payment failed",
            OrderStatus::Received => "Order received",
            OrderStatus::Completed => "Order completed",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Init => "INIT",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::PaymentCompleted => "PAYMENT_COMPLETED",
            OrderStatus::PaymentFailed => "PAYMENT_FAILED",
            OrderStatus::Received => "RECEIVED",
            OrderStatus::Completed => "COMPLETED",
        }
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INIT" => Ok(OrderStatus::Init),
            "CANCELED" => Ok(OrderStatus::Canceled),
            "PAYMENT_COMPLETED" => Ok(OrderStatus::PaymentCompleted),
            "PAYMENT_FAILED" => Ok(OrderStatus::PaymentFailed),
            "RECEIVED" => Ok(OrderStatus::Received),
            "COMPLETED" => Ok(OrderStatus::Completed),
            other => Err(DomainError::validation(format!("unknown order status: {other}"))),
        }
    }
}

/// Snapshot of a product as it was when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_number: ProductNumber,
    pub product_type: ProductType,
    pub name: String,
    pub price: u32,
}

impl From<&Product> for OrderLine {
    fn from(product: &Product) -> Self {
        Self {
            product_number: product.product_number().clone(),
            product_type: product.product_type(),
            name: product.name().to_string(),
            price: product.price(),
        }
    }
}

/// A placed order. `id` is `None` until the order writer saves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: Option<OrderId>,
    status: OrderStatus,
    total_price: u64,
    registered_at: DateTime<Utc>,
    lines: Vec<OrderLine>,
}

impl Order {
    /// Assemble a new order from resolved products (request order, duplicates kept).
    pub fn create(products: &[Product], registered_at: DateTime<Utc>) -> Self {
        let lines: Vec<OrderLine> = products.iter().map(OrderLine::from).collect();
        let total_price = lines.iter().map(|line| u64::from(line.price)).sum();

        Self {
            id: None,
            status: OrderStatus::Init,
            total_price,
            registered_at,
            lines,
        }
    }

    /// Rebuild an order from persisted state.
    pub fn restore(
        id: OrderId,
        status: OrderStatus,
        total_price: u64,
        registered_at: DateTime<Utc>,
        lines: Vec<OrderLine>,
    ) -> Self {
        Self {
            id: Some(id),
            status,
            total_price,
            registered_at,
            lines,
        }
    }

    pub fn with_id(mut self, id: OrderId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn id(&self) -> Option<OrderId> {
        self.id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_price(&self) -> u64 {
        self.total_price
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }
}

/// What a caller gets back after an order has been placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total_price: u64,
    pub lines: Vec<OrderLine>,
    pub registered_at: DateTime<Utc>,
}

impl TryFrom<Order> for OrderResult {
    type Error = DomainError;

    fn try_from(order: Order) -> Result<Self, Self::Error> {
        let id = order
            .id
            .ok_or_else(|| DomainError::invariant("order has not been saved"))?;

        Ok(Self {
            id,
            status: order.status,
            total_price: order.total_price,
            lines: order.lines,
            registered_at: order.registered_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cafekiosk_products::ProductSellingStatus;
    use chrono::TimeZone;

    fn product(number: &str, product_type: ProductType, price: u32) -> Product {
        Product::new(
            ProductNumber::new(number),
            product_type,
            ProductSellingStatus::Selling,
            format!("menu {number}"),
            price,
        )
    }

    fn registered_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 3, 20, 10, 0, 0).unwrap()
    }

    #[test]
    fn create_order_starts_in_init() {
        let order = Order::create(&[product("001", ProductType::Handmade, 1000)], registered_at());
        assert_eq!(order.status(), OrderStatus::Init);
        assert_eq!(order.id(), None);
        assert_eq!(order.registered_at(), registered_at());
    }

    #[test]
    fn create_order_sums_prices_including_duplicates() {
        let products = [
            product("001", ProductType::Handmade, 1000),
            product("002", ProductType::Bottle, 3000),
            product("002", ProductType::Bottle, 3000),
            product("003", ProductType::Bakery, 5000),
        ];

        let order = Order::create(&products, registered_at());

        assert_eq!(order.total_price(), 12000);
        let numbers: Vec<&str> = order
            .lines()
            .iter()
            .map(|l| l.product_number.as_str())
            .collect();
        assert_eq!(numbers, vec!["001", "002", "002", "003"]);
    }

    #[test]
    fn empty_order_totals_zero() {
        let order = Order::create(&[], registered_at());
        assert_eq!(order.total_price(), 0);
        assert!(order.lines().is_empty());
    }

    #[test]
    fn unsaved_order_has_no_result() {
        let order = Order::create(&[], registered_at());
        let err = OrderResult::try_from(order).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn saved_order_converts_into_result() {
        let order = Order::create(&[product("001", ProductType::Handmade, 4000)], registered_at())
            .with_id(OrderId::new(1));

        let result = OrderResult::try_from(order).unwrap();

        assert_eq!(result.id, OrderId::new(1));
        assert_eq!(result.status, OrderStatus::Init);
        assert_eq!(result.total_price, 4000);
        assert_eq!(result.lines.len(), 1);
    }

    #[test]
    fn status_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&OrderStatus::PaymentCompleted).unwrap();
        assert_eq!(json, "\"PAYMENT_COMPLETED\"");
        assert_eq!(
            "PAYMENT_COMPLETED".parse::<OrderStatus>().unwrap(),
            OrderStatus::PaymentCompleted
        );
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: the total is the sum of every line price and lines follow the request.
            #[test]
            fn total_is_sum_of_lines(prices in prop::collection::vec(1u32..100_000, 0..24)) {
                let products: Vec<Product> = prices
                    .iter()
                    .enumerate()
                    .map(|(i, price)| {
                        product(&format!("{:03}", i + 1), ProductType::Handmade, *price)
                    })
                    .collect();

                let order = Order::create(&products, registered_at());

                let expected: u64 = prices.iter().map(|p| u64::from(*p)).sum();
                prop_assert_eq!(order.total_price(), expected);
                prop_assert_eq!(order.lines().len(), products.len());
                for (line, product) in order.lines().iter().zip(products.iter()) {
                    prop_assert_eq!(&line.product_number, product.product_number());
                }
            }
        }
    }
}
