//! Postgres-backed store.
//!
//! ## Error mapping
//!
//! | SQLx error | Postgres code | StoreError | Scenario |
//! |---|---|---|---|
//! | Database (unique violation) | `23505` | `Conflict` | duplicate product number or stock registration |
//! | Database (serialization failure) | `40001` | `Conflict` | concurrent writers under stricter isolation |
//! | Database (deadlock detected) | `40P01` | `Conflict` | lock cycle between placements |
//! | Database (other) | any other | `Database` | constraint or query errors |
//! | PoolClosed / Io / Tls / other | n/a | `Database` | connection failures |
//!
//! Stock updates are always guarded by `WHERE version = $n`. Under the pessimistic
//! policy the rows were read `FOR UPDATE`, so the guard cannot fail; under the optimistic
//! policy a zero-row update means another transaction won and is reported as `Conflict`.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, debug, instrument};

use cafekiosk_core::{MailHistoryId, OrderId, Versioned};
use cafekiosk_orders::{Order, OrderLine, OrderStatus};
use cafekiosk_products::{Product, ProductNumber, ProductSellingStatus, ProductType};
use cafekiosk_stock::Stock;

use super::{
    LockingPolicy, MailHistoryRepository, OrderRepository, ProductCatalog, StockRepository,
    Store, StoreError, StoreTransaction,
};
use crate::mail::{MailSendHistory, NewMailSendHistory};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    product_number  TEXT PRIMARY KEY,
    product_type    TEXT NOT NULL,
    selling_status  TEXT NOT NULL,
    name            TEXT NOT NULL,
    price           BIGINT NOT NULL CHECK (price > 0),
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS stocks (
    product_number  TEXT PRIMARY KEY REFERENCES products (product_number),
    quantity        BIGINT NOT NULL CHECK (quantity >= 0),
    version         BIGINT NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS orders (
    id              BIGSERIAL PRIMARY KEY,
    order_status    TEXT NOT NULL,
    total_price     BIGINT NOT NULL,
    registered_at   TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS orders_status_registered_at_idx
    ON orders (order_status, registered_at);

CREATE TABLE IF NOT EXISTS order_products (
    order_id        BIGINT NOT NULL REFERENCES orders (id),
    line_no         INTEGER NOT NULL,
    product_number  TEXT NOT NULL,
    product_type    TEXT NOT NULL,
    name            TEXT NOT NULL,
    price           BIGINT NOT NULL,
    PRIMARY KEY (order_id, line_no)
);

CREATE TABLE IF NOT EXISTS mail_send_histories (
    id              BIGSERIAL PRIMARY KEY,
    from_email      TEXT NOT NULL,
    to_email        TEXT NOT NULL,
    subject         TEXT NOT NULL,
    content         TEXT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL
);
"#;

/// Postgres store. Cheap to clone (the pool is reference counted).
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    policy: LockingPolicy,
}

impl PostgresStore {
    pub fn new(pool: PgPool, policy: LockingPolicy) -> Self {
        Self { pool, policy }
    }

    /// Create the tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        Ok(Box::new(PostgresTransaction {
            tx,
            policy: self.policy,
        }))
    }

    fn locking_policy(&self) -> LockingPolicy {
        self.policy
    }
}

/// Dropping the inner sqlx transaction without commit rolls it back.
struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
    policy: LockingPolicy,
}

#[async_trait::async_trait]
impl ProductCatalog for PostgresTransaction {
    #[instrument(skip(self, numbers), fields(count = numbers.len()), err)]
    async fn find_products_by_numbers(
        &mut self,
        numbers: &[ProductNumber],
    ) -> Result<Vec<Product>, StoreError> {
        let keys: Vec<String> = numbers.iter().map(|n| n.as_str().to_string()).collect();

        let rows = sqlx::query(
            r#"
            SELECT product_number, product_type, selling_status, name, price
            FROM products
            WHERE product_number = ANY($1)
            "#,
        )
        .bind(&keys)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_products_by_numbers", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn find_products_by_selling_status(
        &mut self,
        statuses: &[ProductSellingStatus],
    ) -> Result<Vec<Product>, StoreError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();

        let rows = sqlx::query(
            r#"
            SELECT product_number, product_type, selling_status, name, price
            FROM products
            WHERE selling_status = ANY($1)
            ORDER BY product_number ASC
            "#,
        )
        .bind(&statuses)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_products_by_selling_status", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn find_latest_product_number(&mut self) -> Result<Option<ProductNumber>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT product_number
            FROM products
            ORDER BY LENGTH(product_number) DESC, product_number DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_latest_product_number", e))?;

        row.map(|row| {
            row.try_get::<String, _>("product_number")
                .map(ProductNumber::from)
                .map_err(|e| invalid_record("product_number", e))
        })
        .transpose()
    }

    #[instrument(skip(self, product), fields(product_number = %product.product_number()), err)]
    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (product_number, product_type, selling_status, name, price)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(product.product_number().as_str())
        .bind(product.product_type().as_str())
        .bind(product.selling_status().as_str())
        .bind(product.name())
        .bind(i64::from(product.price()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl StockRepository for PostgresTransaction {
    #[instrument(
        skip(self, numbers),
        fields(count = numbers.len(), locked = tracing::field::Empty),
        err
    )]
    async fn find_stocks_by_numbers(
        &mut self,
        numbers: &[ProductNumber],
    ) -> Result<Vec<Stock>, StoreError> {
        let keys: Vec<String> = numbers.iter().map(|n| n.as_str().to_string()).collect();
        let locked = self.policy.locks_on_read();
        Span::current().record("locked", locked);

        // Ordered so that concurrent placements take row locks in the same order.
        let sql = if locked {
            r#"
            SELECT product_number, quantity, version
            FROM stocks
            WHERE product_number = ANY($1)
            ORDER BY product_number ASC
            FOR UPDATE
            "#
        } else {
            r#"
            SELECT product_number, quantity, version
            FROM stocks
            WHERE product_number = ANY($1)
            ORDER BY product_number ASC
            "#
        };

        let rows = sqlx::query(sql)
            .bind(&keys)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_stocks_by_numbers", e))?;

        rows.iter().map(stock_from_row).collect()
    }

    #[instrument(skip(self, stocks), fields(count = stocks.len()), err)]
    async fn update_stocks(&mut self, stocks: &[Stock]) -> Result<(), StoreError> {
        for stock in stocks {
            let result = sqlx::query(
                r#"
                UPDATE stocks
                SET quantity = $1, version = version + 1
                WHERE product_number = $2 AND version = $3
                "#,
            )
            .bind(i64::from(stock.quantity()))
            .bind(stock.product_number().as_str())
            .bind(to_i64("version", stock.version())?)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_stocks", e))?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Conflict(format!(
                    "stock for product {} changed since version {}",
                    stock.product_number(),
                    stock.version()
                )));
            }
        }
        Ok(())
    }

    #[instrument(skip(self, stock), fields(product_number = %stock.product_number()), err)]
    async fn insert_stock(&mut self, stock: &Stock) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stocks (product_number, quantity, version)
            VALUES ($1, $2, 0)
            "#,
        )
        .bind(stock.product_number().as_str())
        .bind(i64::from(stock.quantity()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_stock", e))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl OrderRepository for PostgresTransaction {
    #[instrument(skip(self, order), fields(lines = order.lines().len()), err)]
    async fn save_order(&mut self, order: Order) -> Result<Order, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (order_status, total_price, registered_at)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(order.status().as_str())
        .bind(to_i64("total_price", order.total_price())?)
        .bind(order.registered_at())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        let id: i64 = row.try_get("id").map_err(|e| invalid_record("id", e))?;

        for (line_no, line) in order.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_products (order_id, line_no, product_number, product_type, name, price)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id)
            .bind(line_no as i32)
            .bind(line.product_number.as_str())
            .bind(line.product_type.as_str())
            .bind(&line.name)
            .bind(i64::from(line.price))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_product", e))?;
        }

        debug!(order_id = id, "order saved");
        Ok(order.with_id(OrderId::new(id)))
    }

    #[instrument(skip(self), err)]
    async fn find_orders_by(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: OrderStatus,
    ) -> Result<Vec<Order>, StoreError> {
        let order_rows = sqlx::query(
            r#"
            SELECT id, order_status, total_price, registered_at
            FROM orders
            WHERE registered_at >= $1 AND registered_at < $2 AND order_status = $3
            ORDER BY id ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(status.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_orders_by", e))?;

        if order_rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = order_rows
            .iter()
            .map(|row| row.try_get("id").map_err(|e| invalid_record("id", e)))
            .collect::<Result<_, _>>()?;

        let line_rows = sqlx::query(
            r#"
            SELECT order_id, product_number, product_type, name, price
            FROM order_products
            WHERE order_id = ANY($1)
            ORDER BY order_id ASC, line_no ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_order_products", e))?;

        let mut lines_by_order: std::collections::HashMap<i64, Vec<OrderLine>> =
            std::collections::HashMap::new();
        for row in &line_rows {
            let order_id: i64 = row
                .try_get("order_id")
                .map_err(|e| invalid_record("order_id", e))?;
            lines_by_order
                .entry(order_id)
                .or_default()
                .push(order_line_from_row(row)?);
        }

        order_rows
            .iter()
            .map(|row| {
                let id: i64 = row.try_get("id").map_err(|e| invalid_record("id", e))?;
                let status: String = row
                    .try_get("order_status")
                    .map_err(|e| invalid_record("order_status", e))?;
                let total_price: i64 = row
                    .try_get("total_price")
                    .map_err(|e| invalid_record("total_price", e))?;
                let registered_at: DateTime<Utc> = row
                    .try_get("registered_at")
                    .map_err(|e| invalid_record("registered_at", e))?;

                Ok(Order::restore(
                    OrderId::new(id),
                    parse_column("order_status", &status)?,
                    from_i64("total_price", total_price)?,
                    registered_at,
                    lines_by_order.remove(&id).unwrap_or_default(),
                ))
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl MailHistoryRepository for PostgresTransaction {
    #[instrument(skip(self, history), err)]
    async fn save_mail_history(
        &mut self,
        history: NewMailSendHistory,
    ) -> Result<MailSendHistory, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO mail_send_histories (from_email, to_email, subject, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&history.from_email)
        .bind(&history.to_email)
        .bind(&history.subject)
        .bind(&history.content)
        .bind(history.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_mail_history", e))?;

        let id: i64 = row.try_get("id").map_err(|e| invalid_record("id", e))?;
        Ok(history.with_id(MailHistoryId::new(id)))
    }

    #[instrument(skip(self), err)]
    async fn find_mail_histories(&mut self) -> Result<Vec<MailSendHistory>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, from_email, to_email, subject, content, created_at
            FROM mail_send_histories
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_mail_histories", e))?;

        rows.iter()
            .map(|row| {
                Ok(MailSendHistory {
                    id: MailHistoryId::new(row.try_get("id").map_err(|e| invalid_record("id", e))?),
                    from_email: row
                        .try_get("from_email")
                        .map_err(|e| invalid_record("from_email", e))?,
                    to_email: row
                        .try_get("to_email")
                        .map_err(|e| invalid_record("to_email", e))?,
                    subject: row
                        .try_get("subject")
                        .map_err(|e| invalid_record("subject", e))?,
                    content: row
                        .try_get("content")
                        .map_err(|e| invalid_record("content", e))?,
                    created_at: row
                        .try_get("created_at")
                        .map_err(|e| invalid_record("created_at", e))?,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let number: String = row
        .try_get("product_number")
        .map_err(|e| invalid_record("product_number", e))?;
    let product_type: String = row
        .try_get("product_type")
        .map_err(|e| invalid_record("product_type", e))?;
    let selling_status: String = row
        .try_get("selling_status")
        .map_err(|e| invalid_record("selling_status", e))?;
    let name: String = row.try_get("name").map_err(|e| invalid_record("name", e))?;
    let price: i64 = row.try_get("price").map_err(|e| invalid_record("price", e))?;

    Ok(Product::new(
        ProductNumber::from(number),
        parse_column::<ProductType>("product_type", &product_type)?,
        parse_column::<ProductSellingStatus>("selling_status", &selling_status)?,
        name,
        from_i64("price", price)?,
    ))
}

fn stock_from_row(row: &PgRow) -> Result<Stock, StoreError> {
    let number: String = row
        .try_get("product_number")
        .map_err(|e| invalid_record("product_number", e))?;
    let quantity: i64 = row
        .try_get("quantity")
        .map_err(|e| invalid_record("quantity", e))?;
    let version: i64 = row
        .try_get("version")
        .map_err(|e| invalid_record("version", e))?;

    Ok(Stock::restore(
        ProductNumber::from(number),
        from_i64("quantity", quantity)?,
        from_i64("version", version)?,
    ))
}

fn order_line_from_row(row: &PgRow) -> Result<OrderLine, StoreError> {
    let number: String = row
        .try_get("product_number")
        .map_err(|e| invalid_record("product_number", e))?;
    let product_type: String = row
        .try_get("product_type")
        .map_err(|e| invalid_record("product_type", e))?;
    let price: i64 = row.try_get("price").map_err(|e| invalid_record("price", e))?;

    Ok(OrderLine {
        product_number: ProductNumber::from(number),
        product_type: parse_column("product_type", &product_type)?,
        name: row.try_get("name").map_err(|e| invalid_record("name", e))?,
        price: from_i64("price", price)?,
    })
}

fn parse_column<T>(column: &str, value: &str) -> Result<T, StoreError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    value
        .parse()
        .map_err(|e| StoreError::InvalidRecord(format!("{column}: {e}")))
}

fn from_i64<T: TryFrom<i64>>(column: &str, value: i64) -> Result<T, StoreError> {
    T::try_from(value)
        .map_err(|_| StoreError::InvalidRecord(format!("{column}: {value} is out of range")))
}

fn to_i64<T: TryInto<i64> + Copy + core::fmt::Display>(
    column: &str,
    value: T,
) -> Result<i64, StoreError> {
    value
        .try_into()
        .map_err(|_| StoreError::InvalidRecord(format!("{column}: {value} is out of range")))
}

fn invalid_record(column: &str, err: sqlx::Error) -> StoreError {
    StoreError::InvalidRecord(format!("failed to read {column}: {err}"))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::RowNotFound => {
            StoreError::Database(format!("unexpected row not found in {operation}"))
        }
        other => StoreError::Database(format!("sqlx error in {operation}: {other}")),
    }
}
