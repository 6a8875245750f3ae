//! Id-keyed order store (§3, §4.6).

use std::collections::HashMap;

use btk_core::{Order, StatusError};

#[derive(Default)]
pub struct OrderBook {
    orders: HashMap<String, Order>,
    /// Insertion order, for the "same path index -> tie-break by
    /// registry insertion order" rule of §5.
    insertion_order: Vec<String>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            orders: HashMap::new(),
            insertion_order: Vec::new(),
        }
    }

    /// Registers `order`. Fails with `AlreadyExists` if `order.id` is
    /// already known — including to a cancelled or filled order, since the
    /// book owns orders uniquely by id for the lifetime of the run.
    pub fn register(&mut self, order: Order) -> Result<(), StatusError> {
        if self.orders.contains_key(&order.id) {
            return Err(StatusError::already_exists(format!(
                "order id '{}' is already registered",
                order.id
            )));
        }
        self.insertion_order.push(order.id.clone());
        self.orders.insert(order.id.clone(), order);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Order, StatusError> {
        self.orders
            .get(id)
            .ok_or_else(|| StatusError::not_found(format!("no order with id '{id}'")))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Order, StatusError> {
        self.orders
            .get_mut(id)
            .ok_or_else(|| StatusError::not_found(format!("no order with id '{id}'")))
    }

    pub fn cancel(&mut self, id: &str) -> Result<(), StatusError> {
        let order = self.get_mut(id)?;
        order.status = btk_core::OrderStatus::Cancelled;
        Ok(())
    }

    /// Active orders (`Pending` or `PartiallyFilled`), in registry
    /// insertion order — the deterministic sweep order §4.6 step 1 and the
    /// tie-break rule of §5 both depend on.
    pub fn active_orders(&self) -> Vec<&Order> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.orders.get(id))
            .filter(|o| o.status.is_active())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
