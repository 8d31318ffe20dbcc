//! Shared order domain types.
//!
//! Everything here is plain data: `Serialize + Deserialize`, no I/O. The
//! repository (`odk-db`) and the daemon both speak these shapes.

use serde::{Deserialize, Serialize};

/// A customer order as persisted in the `orders` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Store-assigned on insert; immutable afterwards.
    pub id: i64,
    pub customer_name: String,
    pub item: String,
    pub quantity: i64,
    pub price: i64,
    pub is_open: bool,
}

/// Field set for creating an order.
///
/// `is_open` may be omitted and defaults to true. No field carries
/// non-empty or non-negative constraints; shape is the only contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_name: String,
    pub item: String,
    pub quantity: i64,
    pub price: i64,
    #[serde(default = "default_is_open")]
    pub is_open: bool,
}

fn default_is_open() -> bool {
    true
}

/// Partial update for an order: one optional slot per mutable field.
///
/// Unset means unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderPatch {
    pub customer_name: Option<String>,
    pub item: Option<String>,
    pub quantity: Option<i64>,
    pub price: Option<i64>,
    pub is_open: Option<bool>,
}

impl OrderPatch {
    /// Overwrite exactly the fields that are set; the rest keep their value.
    pub fn apply(&self, order: &mut Order) {
        if let Some(v) = &self.customer_name {
            order.customer_name = v.clone();
        }
        if let Some(v) = &self.item {
            order.item = v.clone();
        }
        if let Some(v) = self.quantity {
            order.quantity = v;
        }
        if let Some(v) = self.price {
            order.price = v;
        }
        if let Some(v) = self.is_open {
            order.is_open = v;
        }
    }
}

/// Domain event pushed to every connected WebSocket client.
///
/// Wire shape: `{"event": "order_created", "order": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "order", rename_all = "snake_case")]
pub enum OrderEvent {
    OrderCreated(Order),
    OrderUpdated(Order),
}

impl OrderEvent {
    /// The order payload, whichever kind the event is.
    pub fn order(&self) -> &Order {
        match self {
            OrderEvent::OrderCreated(o) | OrderEvent::OrderUpdated(o) => o,
        }
    }
}
