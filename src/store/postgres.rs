use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::OrderStore;
use crate::errors::{PersistenceError, StoreError, WriteStage};
use crate::models::{Delivery, Item, Order, Payment};

// ============================================================================
// PostgreSQL Order Store
// ============================================================================
//
// Tables (see schema/init.sql): orders, delivery, payment, items.
// The schema is provisioned outside the service.
//
// ============================================================================

const INSERT_ORDER: &str = r#"
    INSERT INTO orders (
        order_uid, track_number, entry, locale, internal_signature, customer_id,
        delivery_service, shardkey, sm_id, date_created, oof_shard
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
"#;

const INSERT_DELIVERY: &str = r#"
    INSERT INTO delivery (order_uid, name, phone, zip, city, address, region, email)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
"#;

const INSERT_PAYMENT: &str = r#"
    INSERT INTO payment (
        order_uid, transaction, request_id, currency, provider, amount, payment_dt,
        bank, delivery_cost, goods_total, custom_fee
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
"#;

const INSERT_ITEM: &str = r#"
    INSERT INTO items (
        order_uid, chrt_id, track_number, price, rid, name, sale, size,
        total_price, nm_id, brand, status
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
"#;

const SELECT_ORDERS: &str = r#"
    SELECT
        o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature,
        o.customer_id, o.delivery_service, o.shardkey, o.sm_id, o.date_created, o.oof_shard,
        d.name AS delivery_name, d.phone, d.zip, d.city, d.address, d.region, d.email,
        p.transaction, p.request_id, p.currency, p.provider, p.amount, p.payment_dt,
        p.bank, p.delivery_cost, p.goods_total, p.custom_fee
    FROM orders o
    JOIN delivery d ON d.order_uid = o.order_uid
    JOIN payment p ON p.order_uid = o.order_uid
"#;

const SELECT_ITEMS: &str = r#"
    SELECT chrt_id, track_number, price, rid, name, sale, size, total_price, nm_id, brand, status
    FROM items
    WHERE order_uid = $1
    ORDER BY id
"#;

/// One joined orders/delivery/payment row.
#[derive(sqlx::FromRow)]
struct OrderRecord {
    order_uid: String,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i32,
    date_created: DateTime<Utc>,
    oof_shard: String,
    delivery_name: String,
    phone: String,
    zip: String,
    city: String,
    address: String,
    region: String,
    email: String,
    transaction: String,
    request_id: String,
    currency: String,
    provider: String,
    amount: i64,
    payment_dt: i64,
    bank: String,
    delivery_cost: i64,
    goods_total: i64,
    custom_fee: i64,
}

impl OrderRecord {
    fn into_order(self, items: Vec<Item>) -> Order {
        Order {
            order_uid: self.order_uid,
            track_number: self.track_number,
            entry: self.entry,
            delivery: Delivery {
                name: self.delivery_name,
                phone: self.phone,
                zip: self.zip,
                city: self.city,
                address: self.address,
                region: self.region,
                email: self.email,
            },
            payment: Payment {
                transaction: self.transaction,
                request_id: self.request_id,
                currency: self.currency,
                provider: self.provider,
                amount: self.amount,
                payment_dt: self.payment_dt,
                bank: self.bank,
                delivery_cost: self.delivery_cost,
                goods_total: self.goods_total,
                custom_fee: self.custom_fee,
            },
            items,
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shardkey: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
        }
    }
}

/// Map a failed statement to a persistence error, promoting unique
/// violations to a conflict.
fn statement_error(order_uid: &str, stage: WriteStage, error: sqlx::Error) -> PersistenceError {
    let unique_violation = error
        .as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false);

    if unique_violation {
        PersistenceError::Conflict {
            order_uid: order_uid.to_string(),
        }
    } else {
        PersistenceError::Statement {
            order_uid: order_uid.to_string(),
            stage,
            source: Box::new(error),
        }
    }
}

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::new("connect", e))?;

        Ok(Self::new(pool))
    }

    /// Verify the pool can reach the database.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::new("ping", e))?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn fetch_items(&self, order_uid: &str) -> Result<Vec<Item>, StoreError> {
        sqlx::query_as::<_, Item>(SELECT_ITEMS)
            .bind(order_uid)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::new("select items", e))
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert_order(&self, order: &Order) -> Result<(), PersistenceError> {
        let uid = order.order_uid.as_str();

        // Dropping `tx` without commit rolls everything back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| statement_error(uid, WriteStage::Begin, e))?;

        sqlx::query(INSERT_ORDER)
            .bind(uid)
            .bind(&order.track_number)
            .bind(&order.entry)
            .bind(&order.locale)
            .bind(&order.internal_signature)
            .bind(&order.customer_id)
            .bind(&order.delivery_service)
            .bind(&order.shardkey)
            .bind(order.sm_id)
            .bind(order.date_created)
            .bind(&order.oof_shard)
            .execute(&mut *tx)
            .await
            .map_err(|e| statement_error(uid, WriteStage::Order, e))?;

        let delivery = &order.delivery;
        sqlx::query(INSERT_DELIVERY)
            .bind(uid)
            .bind(&delivery.name)
            .bind(&delivery.phone)
            .bind(&delivery.zip)
            .bind(&delivery.city)
            .bind(&delivery.address)
            .bind(&delivery.region)
            .bind(&delivery.email)
            .execute(&mut *tx)
            .await
            .map_err(|e| statement_error(uid, WriteStage::Delivery, e))?;

        let payment = &order.payment;
        sqlx::query(INSERT_PAYMENT)
            .bind(uid)
            .bind(&payment.transaction)
            .bind(&payment.request_id)
            .bind(&payment.currency)
            .bind(&payment.provider)
            .bind(payment.amount)
            .bind(payment.payment_dt)
            .bind(&payment.bank)
            .bind(payment.delivery_cost)
            .bind(payment.goods_total)
            .bind(payment.custom_fee)
            .execute(&mut *tx)
            .await
            .map_err(|e| statement_error(uid, WriteStage::Payment, e))?;

        for (index, item) in order.items.iter().enumerate() {
            sqlx::query(INSERT_ITEM)
                .bind(uid)
                .bind(item.chrt_id)
                .bind(&item.track_number)
                .bind(item.price)
                .bind(&item.rid)
                .bind(&item.name)
                .bind(item.sale)
                .bind(&item.size)
                .bind(item.total_price)
                .bind(item.nm_id)
                .bind(&item.brand)
                .bind(item.status)
                .execute(&mut *tx)
                .await
                .map_err(|e| statement_error(uid, WriteStage::Item(index), e))?;
        }

        tx.commit()
            .await
            .map_err(|e| statement_error(uid, WriteStage::Commit, e))?;

        tracing::debug!(
            order_uid = %uid,
            item_count = order.items.len(),
            "Committed order transaction"
        );

        Ok(())
    }

    async fn find_order(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        let query = format!("{} WHERE o.order_uid = $1", SELECT_ORDERS);
        let record = sqlx::query_as::<_, OrderRecord>(&query)
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::new("select order", e))?;

        match record {
            Some(record) => {
                let items = self.fetch_items(order_uid).await?;
                Ok(Some(record.into_order(items)))
            }
            None => Ok(None),
        }
    }

    async fn load_all(&self) -> Result<Vec<Order>, StoreError> {
        let records = sqlx::query_as::<_, OrderRecord>(SELECT_ORDERS)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::new("select all orders", e))?;

        tracing::debug!(order_count = records.len(), "Loaded order headers, fetching items");

        // One items query per order; this only runs at startup.
        let mut orders = Vec::with_capacity(records.len());
        for record in records {
            let items = self.fetch_items(&record.order_uid).await?;
            orders.push(record.into_order(items));
        }

        Ok(orders)
    }
}

// ============================================================================
// Integration Tests
// ============================================================================
//
// Require a PostgreSQL instance provisioned with schema/init.sql:
//   DATABASE_URL=postgres://... cargo test -- --ignored
//
// ============================================================================
