// ============================================================================
// In-memory fakes for the store and channel capabilities
// ============================================================================

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::sync::{mpsc, Mutex};

use crate::errors::{ChannelError, PersistenceError, StoreError, WriteStage};
use crate::messaging::{MessageSource, OrderPublisher};
use crate::models::{Delivery, Item, Order, Payment};
use crate::store::OrderStore;

pub fn sample_order(order_uid: &str) -> Order {
    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: order_uid.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1637907727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![Item {
            chrt_id: 9934930,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453,
            rid: "ab4219087a764ae0btest".to_string(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2389212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap(),
        oof_shard: "1".to_string(),
    }
}

// ============================================================================
// Store
// ============================================================================

/// Rows keyed the way the relational tables are.
#[derive(Default)]
struct Tables {
    orders: HashMap<String, Order>,
    delivery: HashMap<String, Delivery>,
    payment: HashMap<String, Payment>,
    items: Vec<(String, Item)>,
    insert_log: Vec<String>,
}

/// Transactional in-memory store. Writes are staged and applied only when
/// every statement succeeds.
#[derive(Default)]
pub struct MemoryOrderStore {
    tables: Mutex<Tables>,
    fail_at: StdMutex<Option<WriteStage>>,
    find_calls: AtomicUsize,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail at `stage`.
    pub fn fail_at(&self, stage: WriteStage) {
        *self.fail_at.lock().unwrap() = Some(stage);
    }

    pub fn clear_failure(&self) {
        *self.fail_at.lock().unwrap() = None;
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// (orders, delivery, payment, items) rows for one order_uid.
    pub async fn row_counts(&self, order_uid: &str) -> (usize, usize, usize, usize) {
        let tables = self.tables.lock().await;
        (
            tables.orders.contains_key(order_uid) as usize,
            tables.delivery.contains_key(order_uid) as usize,
            tables.payment.contains_key(order_uid) as usize,
            tables.items.iter().filter(|(uid, _)| uid == order_uid).count(),
        )
    }

    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    /// order_uids in commit order.
    pub async fn insert_log(&self) -> Vec<String> {
        self.tables.lock().await.insert_log.clone()
    }

    fn check(&self, order_uid: &str, stage: WriteStage) -> Result<(), PersistenceError> {
        if *self.fail_at.lock().unwrap() == Some(stage) {
            return Err(PersistenceError::Statement {
                order_uid: order_uid.to_string(),
                stage,
                source: "injected failure".into(),
            });
        }
        Ok(())
    }

    fn assemble(tables: &Tables, header: &Order) -> Order {
        let mut order = header.clone();
        order.items = tables
            .items
            .iter()
            .filter(|(uid, _)| *uid == header.order_uid)
            .map(|(_, item)| item.clone())
            .collect();
        order
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert_order(&self, order: &Order) -> Result<(), PersistenceError> {
        let uid = order.order_uid.as_str();
        let mut tables = self.tables.lock().await;

        self.check(uid, WriteStage::Begin)?;
        if tables.orders.contains_key(uid) {
            return Err(PersistenceError::Conflict {
                order_uid: uid.to_string(),
            });
        }
        self.check(uid, WriteStage::Order)?;
        self.check(uid, WriteStage::Delivery)?;
        self.check(uid, WriteStage::Payment)?;
        for index in 0..order.items.len() {
            self.check(uid, WriteStage::Item(index))?;
        }
        self.check(uid, WriteStage::Commit)?;

        let mut header = order.clone();
        header.items.clear();
        tables.orders.insert(uid.to_string(), header);
        tables.delivery.insert(uid.to_string(), order.delivery.clone());
        tables.payment.insert(uid.to_string(), order.payment.clone());
        for item in &order.items {
            tables.items.push((uid.to_string(), item.clone()));
        }
        tables.insert_log.push(uid.to_string());
        Ok(())
    }

    async fn find_order(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().await;
        Ok(tables.orders.get(order_uid).map(|header| Self::assemble(&tables, header)))
    }

    async fn load_all(&self) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .map(|header| Self::assemble(&tables, header))
            .collect())
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Publisher half of an in-memory topic. Also remembers what it sent.
pub struct MemoryPublisher {
    sender: mpsc::UnboundedSender<Vec<u8>>,
    published: StdMutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryPublisher {
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderPublisher for MemoryPublisher {
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), ChannelError> {
        self.published
            .lock()
            .unwrap()
            .push((key.to_string(), payload.to_vec()));
        // The log keeps the message even when no reader is attached.
        let _ = self.sender.send(payload.to_vec());
        Ok(())
    }
}

/// Read half of an in-memory topic. Closes once every publisher is dropped.
pub struct MemorySource {
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, ChannelError> {
        Ok(self.receiver.recv().await)
    }
}

pub fn memory_channel() -> (MemoryPublisher, MemorySource) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        MemoryPublisher {
            sender,
            published: StdMutex::new(Vec::new()),
        },
        MemorySource { receiver },
    )
}

/// Replays a fixed script of reads, then reports the channel closed.
pub struct ScriptedSource {
    script: VecDeque<Result<Vec<u8>, ChannelError>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Vec<u8>, ChannelError>>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, ChannelError> {
        match self.script.pop_front() {
            Some(Ok(payload)) => Ok(Some(payload)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Publisher whose every send fails.
pub struct FailingPublisher;

#[async_trait]
impl OrderPublisher for FailingPublisher {
    async fn publish(&self, _key: &str, _payload: &[u8]) -> Result<(), ChannelError> {
        Err(ChannelError::Publish("broker unreachable".into()))
    }
}
