use dpg_common::Money;
use serde::Serialize;

use crate::db_types::{Order, OrderStatus};

/// The result of an order status change.
#[derive(Debug, Clone)]
pub struct OrderChanged {
    /// The order, carrying the new status.
    pub order: Order,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
}

/// The four donation projections for a project, computed in one pass over its donations.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectTotals {
    /// Cleared or clearing money (Pending + Success). This is what payouts are calculated from.
    pub raised: Money,
    /// Cleared money only.
    pub safe: Money,
    /// Money still clearing at the payment service provider.
    pub pending: Money,
    /// Money that reverted: failed, refunded, cancelled or charged back.
    pub failed: Money,
}
