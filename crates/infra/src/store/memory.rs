use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use tracing::{debug, instrument};

use cafekiosk_core::{ExpectedVersion, MailHistoryId, OrderId, Versioned};
use cafekiosk_orders::{Order, OrderStatus};
use cafekiosk_products::{Product, ProductNumber, ProductSellingStatus};
use cafekiosk_stock::Stock;

use super::{
    LockingPolicy, MailHistoryRepository, OrderRepository, ProductCatalog, StockRepository,
    Store, StoreError, StoreTransaction,
};
use crate::mail::{MailSendHistory, NewMailSendHistory};

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<ProductNumber, Product>,
    stocks: BTreeMap<ProductNumber, Stock>,
    orders: BTreeMap<OrderId, Order>,
    mail_histories: Vec<MailSendHistory>,
}

#[derive(Debug, Default)]
struct Shared {
    state: RwLock<State>,
    row_locks: Mutex<HashMap<ProductNumber, Arc<RowLock<()>>>>,
    order_seq: AtomicI64,
    mail_seq: AtomicI64,
}

impl Shared {
    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state.write().map_err(|_| poisoned())
    }

    fn row_lock(&self, product_number: &ProductNumber) -> Result<Arc<RowLock<()>>, StoreError> {
        let mut locks = self.row_locks.lock().map_err(|_| poisoned())?;
        Ok(locks
            .entry(product_number.clone())
            .or_insert_with(|| Arc::new(RowLock::new(())))
            .clone())
    }
}

fn poisoned() -> StoreError {
    StoreError::Database("in-memory store lock poisoned".to_string())
}

/// In-memory store.
///
/// Intended for tests/dev. Writes are buffered per transaction and applied atomically
/// on commit. Under [`LockingPolicy::Pessimistic`] stock reads take per-product async
/// locks (in product-number order) that are held until the transaction ends; stock
/// updates are always version-checked at commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
    policy: LockingPolicy,
}

impl InMemoryStore {
    pub fn new(policy: LockingPolicy) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            policy,
        }
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(InMemoryTransaction::new(
            self.shared.clone(),
            self.policy,
        )))
    }

    fn locking_policy(&self) -> LockingPolicy {
        self.policy
    }
}

struct InMemoryTransaction {
    shared: Arc<Shared>,
    policy: LockingPolicy,
    products: Vec<Product>,
    stock_inserts: Vec<Stock>,
    stock_updates: BTreeMap<ProductNumber, Stock>,
    orders: Vec<Order>,
    mail_histories: Vec<MailSendHistory>,
    row_guards: HashMap<ProductNumber, OwnedMutexGuard<()>>,
    committed: bool,
}

impl InMemoryTransaction {
    fn new(shared: Arc<Shared>, policy: LockingPolicy) -> Self {
        Self {
            shared,
            policy,
            products: Vec::new(),
            stock_inserts: Vec::new(),
            stock_updates: BTreeMap::new(),
            orders: Vec::new(),
            mail_histories: Vec::new(),
            row_guards: HashMap::new(),
            committed: false,
        }
    }

    fn pending_product(&self, product_number: &ProductNumber) -> Option<&Product> {
        self.products
            .iter()
            .find(|p| p.product_number() == product_number)
    }

    fn pending_stock(&self, product_number: &ProductNumber) -> Option<&Stock> {
        self.stock_updates.get(product_number).or_else(|| {
            self.stock_inserts
                .iter()
                .find(|s| s.product_number() == product_number)
        })
    }

    /// Lock rows in product-number order so that two placements never wait on each other
    /// in opposite directions.
    async fn lock_rows(&mut self, numbers: &[ProductNumber]) -> Result<(), StoreError> {
        let mut sorted: Vec<&ProductNumber> = numbers.iter().collect();
        sorted.sort();
        sorted.dedup();

        for number in sorted {
            if self.row_guards.contains_key(number) {
                continue;
            }
            let lock = self.shared.row_lock(number)?;
            let guard = lock.lock_owned().await;
            self.row_guards.insert(number.clone(), guard);
        }
        Ok(())
    }

    fn check_writes(&self, state: &State) -> Result<(), StoreError> {
        for product in &self.products {
            if state.products.contains_key(product.product_number()) {
                return Err(StoreError::Conflict(format!(
                    "product {} already exists",
                    product.product_number()
                )));
            }
        }
        for stock in &self.stock_inserts {
            if state.stocks.contains_key(stock.product_number()) {
                return Err(StoreError::Conflict(format!(
                    "stock for product {} already exists",
                    stock.product_number()
                )));
            }
        }
        for (number, stock) in &self.stock_updates {
            let current = state.stocks.get(number).ok_or_else(|| {
                StoreError::Conflict(format!("stock for product {number} no longer exists"))
            })?;
            ExpectedVersion::of(stock)
                .check(current.version())
                .map_err(|e| StoreError::Conflict(format!("stock for product {number}: {e}")))?;
        }
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.committed {
            debug!(
                locked_rows = self.row_guards.len(),
                "in-memory transaction rolled back"
            );
        }
    }
}

#[async_trait::async_trait]
impl ProductCatalog for InMemoryTransaction {
    async fn find_products_by_numbers(
        &mut self,
        numbers: &[ProductNumber],
    ) -> Result<Vec<Product>, StoreError> {
        let state = self.shared.read()?;
        let mut seen = HashSet::new();

        Ok(numbers
            .iter()
            .filter(|n| seen.insert(*n))
            .filter_map(|n| {
                self.pending_product(n)
                    .or_else(|| state.products.get(n))
                    .cloned()
            })
            .collect())
    }

    async fn find_products_by_selling_status(
        &mut self,
        statuses: &[ProductSellingStatus],
    ) -> Result<Vec<Product>, StoreError> {
        let state = self.shared.read()?;

        let mut products: Vec<Product> = state
            .products
            .values()
            .chain(self.products.iter())
            .filter(|p| statuses.contains(&p.selling_status()))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.product_number().cmp(b.product_number()));
        Ok(products)
    }

    async fn find_latest_product_number(&mut self) -> Result<Option<ProductNumber>, StoreError> {
        let state = self.shared.read()?;

        Ok(state
            .products
            .keys()
            .chain(self.products.iter().map(Product::product_number))
            .max_by(|a, b| {
                (a.as_str().len(), a.as_str()).cmp(&(b.as_str().len(), b.as_str()))
            })
            .cloned())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let exists = self.pending_product(product.product_number()).is_some()
            || self
                .shared
                .read()?
                .products
                .contains_key(product.product_number());
        if exists {
            return Err(StoreError::Conflict(format!(
                "product {} already exists",
                product.product_number()
            )));
        }

        self.products.push(product.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl StockRepository for InMemoryTransaction {
    #[instrument(skip(self, numbers), fields(count = numbers.len()), err)]
    async fn find_stocks_by_numbers(
        &mut self,
        numbers: &[ProductNumber],
    ) -> Result<Vec<Stock>, StoreError> {
        if self.policy.locks_on_read() {
            self.lock_rows(numbers).await?;
        }

        let state = self.shared.read()?;
        let mut seen = HashSet::new();

        Ok(numbers
            .iter()
            .filter(|n| seen.insert(*n))
            .filter_map(|n| self.pending_stock(n).or_else(|| state.stocks.get(n)).cloned())
            .collect())
    }

    async fn update_stocks(&mut self, stocks: &[Stock]) -> Result<(), StoreError> {
        for stock in stocks {
            self.stock_updates
                .insert(stock.product_number().clone(), stock.clone());
        }
        Ok(())
    }

    async fn insert_stock(&mut self, stock: &Stock) -> Result<(), StoreError> {
        let exists = self.pending_stock(stock.product_number()).is_some()
            || self
                .shared
                .read()?
                .stocks
                .contains_key(stock.product_number());
        if exists {
            return Err(StoreError::Conflict(format!(
                "stock for product {} already exists",
                stock.product_number()
            )));
        }

        self.stock_inserts.push(stock.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryTransaction {
    async fn save_order(&mut self, order: Order) -> Result<Order, StoreError> {
        let id = self.shared.order_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let order = order.with_id(OrderId::new(id));
        self.orders.push(order.clone());
        Ok(order)
    }

    async fn find_orders_by(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: OrderStatus,
    ) -> Result<Vec<Order>, StoreError> {
        let state = self.shared.read()?;

        let mut orders: Vec<Order> = state
            .orders
            .values()
            .chain(self.orders.iter())
            .filter(|o| o.status() == status)
            .filter(|o| start <= o.registered_at() && o.registered_at() < end)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.id());
        Ok(orders)
    }
}

#[async_trait::async_trait]
impl MailHistoryRepository for InMemoryTransaction {
    async fn save_mail_history(
        &mut self,
        history: NewMailSendHistory,
    ) -> Result<MailSendHistory, StoreError> {
        let id = self.shared.mail_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let history = history.with_id(MailHistoryId::new(id));
        self.mail_histories.push(history.clone());
        Ok(history)
    }

    async fn find_mail_histories(&mut self) -> Result<Vec<MailSendHistory>, StoreError> {
        let state = self.shared.read()?;
        Ok(state
            .mail_histories
            .iter()
            .chain(self.mail_histories.iter())
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut tx = self;
        let shared = tx.shared.clone();
        let mut state = shared.write()?;
        tx.check_writes(&state)?;

        for product in std::mem::take(&mut tx.products) {
            state
                .products
                .insert(product.product_number().clone(), product);
        }
        for stock in std::mem::take(&mut tx.stock_inserts) {
            state.stocks.insert(stock.product_number().clone(), stock);
        }
        for (number, stock) in std::mem::take(&mut tx.stock_updates) {
            let written = Stock::restore(number.clone(), stock.quantity(), stock.version() + 1);
            state.stocks.insert(number, written);
        }
        for order in std::mem::take(&mut tx.orders) {
            if let Some(id) = order.id() {
                state.orders.insert(id, order);
            }
        }
        state
            .mail_histories
            .extend(std::mem::take(&mut tx.mail_histories));

        drop(state);
        tx.committed = true;
        debug!(released_rows = tx.row_guards.len(), "in-memory transaction committed");
        Ok(())
    }
}
