//! Daily sales statistics mail.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, instrument};

use cafekiosk_core::DomainError;
use cafekiosk_orders::{OrderStatus, day_window, total_sales};

use crate::mail::{MailSendClient, MailService};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum StatisticsError {
    #[error("failed to send the sales statistics mail to {to}")]
    MailDeliveryFailed { to: String },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct OrderStatisticsService<S, C> {
    store: S,
    mail_service: MailService<S, C>,
    from: String,
}

impl<S, C> OrderStatisticsService<S, C>
where
    S: Store,
    C: MailSendClient,
{
    /// `from` is the sender address of every statistics mail.
    pub fn new(store: S, mail_service: MailService<S, C>, from: impl Into<String>) -> Self {
        Self {
            store,
            mail_service,
            from: from.into(),
        }
    }

    /// Mail the total of the payment-completed orders registered on `order_date` (UTC).
    #[instrument(skip(self), err)]
    pub async fn send_order_statistics_mail(
        &self,
        order_date: NaiveDate,
        email: &str,
    ) -> Result<(), StatisticsError> {
        let window = day_window(order_date)?;

        let mut tx = self.store.begin().await?;
        let orders = tx
            .find_orders_by(window.start, window.end, OrderStatus::PaymentCompleted)
            .await?;
        tx.commit().await?;

        let total = total_sales(&orders);
        let subject = format!("[Sales statistics] {order_date}");
        let content = format!("Total sales: {total} KRW.");

        let sent = self
            .mail_service
            .send_mail(&self.from, email, &subject, &content)
            .await?;
        if !sent {
            return Err(StatisticsError::MailDeliveryFailed {
                to: email.to_string(),
            });
        }

        info!(orders = orders.len(), total, "sales statistics mailed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::store::{InMemoryStore, LockingPolicy};
    use cafekiosk_orders::Order;
    use cafekiosk_products::{Product, ProductNumber, ProductSellingStatus, ProductType};

    /// Records every message; answers with a fixed verdict.
    #[derive(Default)]
    struct RecordingClient {
        accept: bool,
        sent: Mutex<Vec<(String, String, String, String)>>,
    }

    #[async_trait::async_trait]
    impl MailSendClient for RecordingClient {
        async fn send_email(&self, from: &str, to: &str, subject: &str, content: &str) -> bool {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push((from.into(), to.into(), subject.into(), content.into()));
            }
            self.accept
        }
    }

    fn americano(price: u32) -> Product {
        Product::new(
            ProductNumber::new("001"),
            ProductType::Handmade,
            ProductSellingStatus::Selling,
            "Americano",
            price,
        )
    }

    async fn save(store: &Arc<InMemoryStore>, price: u32, at: DateTime<Utc>, status: OrderStatus) {
        let mut tx = store.begin().await.unwrap();
        tx.save_order(Order::create(&[americano(price)], at).with_status(status))
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    fn service(
        store: &Arc<InMemoryStore>,
        client: Arc<RecordingClient>,
    ) -> OrderStatisticsService<Arc<InMemoryStore>, Arc<RecordingClient>> {
        OrderStatisticsService::new(
            store.clone(),
            MailService::new(store.clone(), client),
            "no-reply@cafekiosk.com",
        )
    }

    #[tokio::test]
    async fn mails_total_of_payment_completed_orders_of_the_day() {
        let store = Arc::new(InMemoryStore::new(LockingPolicy::Pessimistic));
        let day = |h, m| Utc.with_ymd_and_hms(2023, 3, 5, h, m, 0).unwrap();

        let day_before = Utc.with_ymd_and_hms(2023, 3, 4, 23, 59, 0).unwrap();
        let day_after = Utc.with_ymd_and_hms(2023, 3, 6, 0, 0, 0).unwrap();

        save(&store, 3000, day_before, OrderStatus::PaymentCompleted).await;
        save(&store, 4000, day(0, 0), OrderStatus::PaymentCompleted).await;
        save(&store, 5000, day(23, 59), OrderStatus::PaymentCompleted).await;
        save(&store, 6000, day(12, 0), OrderStatus::Canceled).await;
        save(&store, 7000, day_after, OrderStatus::PaymentCompleted).await;

        let client = Arc::new(RecordingClient {
            accept: true,
            ..Default::default()
        });
        let date = NaiveDate::from_ymd_opt(2023, 3, 5).unwrap();

        service(&store, client.clone())
            .send_order_statistics_mail(date, "owner@cafe.test")
            .await
            .unwrap();

        let sent = client.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (from, to, subject, content) = &sent[0];
        assert_eq!(from, "no-reply@cafekiosk.com");
        assert_eq!(to, "owner@cafe.test");
        assert_eq!(subject, "[Sales statistics] 2023-03-05");
        assert_eq!(content, "Total sales: 9000 KRW.");

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.find_mail_histories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refused_mail_is_an_error() {
        let store = Arc::new(InMemoryStore::new(LockingPolicy::Pessimistic));
        let client = Arc::new(RecordingClient::default());
        let date = NaiveDate::from_ymd_opt(2023, 3, 5).unwrap();

        let err = service(&store, client)
            .send_order_statistics_mail(date, "owner@cafe.test")
            .await
            .unwrap_err();

        match err {
            StatisticsError::MailDeliveryFailed { to } => assert_eq!(to, "owner@cafe.test"),
            other => panic!("expected MailDeliveryFailed, got {other:?}"),
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_mail_histories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn day_without_sales_mails_zero() {
        let store = Arc::new(InMemoryStore::new(LockingPolicy::Pessimistic));
        let client = Arc::new(RecordingClient {
            accept: true,
            ..Default::default()
        });
        let date = NaiveDate::from_ymd_opt(2023, 3, 5).unwrap();

        service(&store, client.clone())
            .send_order_statistics_mail(date, "owner@cafe.test")
            .await
            .unwrap();

        let sent = client.sent.lock().unwrap();
        assert_eq!(sent[0].3, "Total sales: 0 KRW.");
    }
}
