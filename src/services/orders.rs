use crate::{
    config::AppConfig,
    entities::{
        address, cart, cart_item, order, order_item, Address, Cart, CartItem, Order, OrderItem,
        OrderModel, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{inventory::InventoryService, payments::PaymentGateway},
};
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::order::{OrderStatus, PaymentMethod, PaymentStatus};

/// Order workflow: checkout from cart, payment confirmation, lifecycle
/// transitions, and cancellation with stock restore and refunds.
///
/// Stock is deducted when the order row is created, inside the same
/// transaction, so an order can never exist without its stock having been
/// claimed. For online payment the order is created only after the gateway
/// signature verifies; an abandoned payment leaves no order behind.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    inventory: InventoryService,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

/// Shipping details snapshotted onto the order.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ShippingDetails {
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    #[validate(length(min = 7, max = 20))]
    pub phone: String,
    #[validate(length(min = 1, max = 255))]
    pub address_line: String,
    #[validate(length(min = 1, max = 80))]
    pub city: String,
    #[validate(length(min = 1, max = 80))]
    pub state: String,
    #[validate(length(min = 4, max = 12))]
    pub postal_code: String,
}

/// Checkout destination: a saved address or inline shipping details.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderInput {
    pub address_id: Option<Uuid>,
    pub shipping: Option<ShippingDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmPaymentInput {
    pub gateway_order_id: String,
    pub payment_id: String,
    pub signature: String,
    pub address_id: Option<Uuid>,
    pub shipping: Option<ShippingDetails>,
}

/// What the client needs to launch the gateway's payment flow.
#[derive(Debug, Serialize)]
pub struct PaymentIntent {
    pub gateway_order_id: String,
    /// Amount in minor units (paise).
    pub amount: i64,
    pub currency: String,
    pub key_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: OrderModel,
    pub items: Vec<order_item::Model>,
}

#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<OrderView>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

struct CartLine {
    product_id: Uuid,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        inventory: InventoryService,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            inventory,
            gateway,
            event_sender,
            config,
        }
    }

    /// Places a cash-on-delivery order from the customer's cart.
    #[instrument(skip(self, input))]
    pub async fn place_order(
        &self,
        customer_id: Uuid,
        input: PlaceOrderInput,
    ) -> Result<OrderView, ServiceError> {
        let shipping = self
            .resolve_shipping(customer_id, input.address_id, input.shipping)
            .await?;

        let order = self
            .create_order_from_cart(
                customer_id,
                shipping,
                PaymentMethod::Cod,
                OrderStatus::Pending,
                PaymentStatus::Pending,
                None,
                None,
            )
            .await?;

        self.event_sender.send_or_log(Event::OrderCreated(order.id)).await;
        info!("Placed COD order {} ({})", order.id, order.order_number);
        self.get_order(customer_id, order.id).await
    }

    /// Creates a gateway order for the current cart total. Nothing is
    /// persisted; the order materializes in `confirm_payment`.
    #[instrument(skip(self))]
    pub async fn create_payment_intent(
        &self,
        customer_id: Uuid,
    ) -> Result<PaymentIntent, ServiceError> {
        let lines = self.load_cart_lines(&*self.db, customer_id).await?;
        let (_, total) = self.totals(&lines);

        let receipt = format!("cart-{}", customer_id.simple());
        let gateway_order = self
            .gateway
            .create_order(total, &self.config.currency, &receipt)
            .await?;

        Ok(PaymentIntent {
            gateway_order_id: gateway_order.id,
            amount: gateway_order.amount,
            currency: gateway_order.currency,
            key_id: self.config.razorpay_key_id.clone(),
        })
    }

    /// Verifies the gateway signature and, only then, creates the order.
    /// A failed verification leaves cart and stock untouched.
    #[instrument(skip(self, input))]
    pub async fn confirm_payment(
        &self,
        customer_id: Uuid,
        input: ConfirmPaymentInput,
    ) -> Result<OrderView, ServiceError> {
        self.gateway.verify_payment_signature(
            &input.gateway_order_id,
            &input.payment_id,
            &input.signature,
        )?;

        let shipping = self
            .resolve_shipping(customer_id, input.address_id, input.shipping)
            .await?;

        let order = self
            .create_order_from_cart(
                customer_id,
                shipping,
                PaymentMethod::Online,
                OrderStatus::Processing,
                PaymentStatus::Completed,
                Some(input.payment_id.clone()),
                Some(input.gateway_order_id),
            )
            .await?;

        self.event_sender.send_or_log(Event::OrderCreated(order.id)).await;
        self.event_sender
            .send_or_log(Event::PaymentCompleted {
                order_id: order.id,
                payment_id: input.payment_id,
            })
            .await;
        info!("Placed paid order {} ({})", order.id, order.order_number);
        self.get_order(customer_id, order.id).await
    }

    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderView, ServiceError> {
        let order = Order::find_by_id(order_id)
            .filter(order::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        self.with_items(order).await
    }

    /// Lists the customer's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        customer_id: Uuid,
        query: OrderListQuery,
    ) -> Result<OrderPage, ServiceError> {
        self.list_filtered(Some(customer_id), query).await
    }

    /// Admin view over all orders.
    #[instrument(skip(self))]
    pub async fn list_all_orders(&self, query: OrderListQuery) -> Result<OrderPage, ServiceError> {
        self.list_filtered(None, query).await
    }

    /// Cancels an order within the allowed window, restoring stock and
    /// refunding captured online payments. A refund failure downgrades the
    /// payment to `RefundPending` instead of blocking the cancellation.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderView, ServiceError> {
        // Cancel and restore stock first; the refund is settled afterwards so
        // a gateway outage can never leave a refunded-but-active order.
        let txn = self.db.begin().await?;

        let existing = Order::find_by_id(order_id)
            .filter(order::Column::CustomerId.eq(customer_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !existing.is_cancellable() {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} can no longer be cancelled",
                existing.order_number
            )));
        }

        let needs_refund = existing.needs_refund();
        let payment_id = if needs_refund {
            Some(existing.transaction_id.clone().ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Order {} marked paid without a transaction id",
                    existing.id
                ))
            })?)
        } else {
            None
        };

        // Guarded transition: the status filter makes the cancellation the
        // single winner against a concurrent cancel or admin update, before
        // any stock is touched.
        let now = Utc::now();
        let mut update = Order::update_many()
            .col_expr(
                order::Column::OrderStatus,
                Expr::value(OrderStatus::Cancelled),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(
                order::Column::OrderStatus
                    .is_in([OrderStatus::Pending, OrderStatus::Processing]),
            );
        if needs_refund {
            update = update.col_expr(
                order::Column::PaymentStatus,
                Expr::value(PaymentStatus::RefundPending),
            );
        }
        if update.exec(&txn).await?.rows_affected == 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} can no longer be cancelled",
                existing.order_number
            )));
        }

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(existing.id))
            .all(&txn)
            .await?;
        for item in &items {
            self.inventory
                .restore_stock(&txn, item.product_id, item.quantity)
                .await?;
        }

        txn.commit().await?;

        let old_status = existing.order_status;
        let updated = OrderModel {
            order_status: OrderStatus::Cancelled,
            payment_status: if needs_refund {
                PaymentStatus::RefundPending
            } else {
                existing.payment_status
            },
            updated_at: now,
            ..existing
        };

        let (updated, refund_outcome) = if let Some(payment_id) = payment_id {
            match self
                .gateway
                .refund_payment(&payment_id, updated.total_amount)
                .await
            {
                Ok(refund) => {
                    info!("Refund {} issued for order {}", refund.id, updated.id);
                    let mut model: order::ActiveModel = updated.into();
                    model.payment_status = Set(PaymentStatus::Refunded);
                    model.updated_at = Set(Utc::now());
                    (model.update(&*self.db).await?, Some(PaymentStatus::Refunded))
                }
                Err(ServiceError::GatewayError(msg)) => {
                    warn!(
                        "Refund for order {} deferred, gateway unavailable: {}",
                        updated.id, msg
                    );
                    (updated, Some(PaymentStatus::RefundPending))
                }
                Err(e) => return Err(e),
            }
        } else {
            (updated, None)
        };

        for item in &items {
            self.event_sender
                .send_or_log(Event::StockRestored {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::OrderCancelled(updated.id))
            .await;
        match refund_outcome {
            Some(PaymentStatus::Refunded) => {
                self.event_sender
                    .send_or_log(Event::RefundInitiated { order_id: updated.id })
                    .await;
            }
            Some(PaymentStatus::RefundPending) => {
                self.event_sender
                    .send_or_log(Event::RefundFailed { order_id: updated.id })
                    .await;
            }
            _ => {}
        }

        info!(
            "Cancelled order {} (was {:?})",
            updated.order_number, old_status
        );
        Ok(OrderView {
            order: updated,
            items,
        })
    }

    /// Admin status update. Transitions are applied as given; marking a COD
    /// order delivered settles its payment unless an explicit payment status
    /// is supplied.
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        new_order_status: Option<OrderStatus>,
        new_payment_status: Option<PaymentStatus>,
    ) -> Result<OrderView, ServiceError> {
        if new_order_status.is_none() && new_payment_status.is_none() {
            return Err(ServiceError::ValidationError(
                "order_status or payment_status is required".to_string(),
            ));
        }

        let existing = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = existing.order_status;
        let mut model: order::ActiveModel = existing.clone().into();
        if let Some(status) = new_order_status {
            model.order_status = Set(status);
        }
        match new_payment_status {
            Some(payment_status) => model.payment_status = Set(payment_status),
            None => {
                if new_order_status == Some(OrderStatus::Delivered)
                    && existing.payment_method == PaymentMethod::Cod
                    && existing.payment_status == PaymentStatus::Pending
                {
                    model.payment_status = Set(PaymentStatus::Completed);
                }
            }
        }
        model.updated_at = Set(Utc::now());
        let updated = model.update(&*self.db).await?;

        if let Some(new_status) = new_order_status {
            self.event_sender
                .send_or_log(Event::OrderStatusChanged {
                    order_id,
                    old_status: format!("{:?}", old_status),
                    new_status: format!("{:?}", new_status),
                })
                .await;
        }

        self.with_items(updated).await
    }

    /// Admin delete. Only cancelled orders may be removed; anything else
    /// still carries stock or payment bookkeeping.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let existing = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if existing.order_status != OrderStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(
                "Only cancelled orders can be deleted".to_string(),
            ));
        }

        Order::delete_by_id(order_id).exec(&*self.db).await?;
        info!("Deleted order {}", order_id);
        Ok(())
    }

    async fn list_filtered(
        &self,
        customer_id: Option<Uuid>,
        query: OrderListQuery,
    ) -> Result<OrderPage, ServiceError> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

        let mut find = Order::find();
        if let Some(customer_id) = customer_id {
            find = find.filter(order::Column::CustomerId.eq(customer_id));
        }
        if let Some(status) = query.status {
            find = find.filter(order::Column::OrderStatus.eq(status));
        }

        let total = find.clone().count(&*self.db).await?;
        let orders = find
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page)
            .fetch_page(page - 1)
            .await?;

        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            views.push(self.with_items(order).await?);
        }

        Ok(OrderPage {
            orders: views,
            total,
            page,
            per_page,
        })
    }

    async fn with_items(&self, order: OrderModel) -> Result<OrderView, ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&*self.db)
            .await?;
        Ok(OrderView { order, items })
    }

    /// Resolves the checkout destination, preferring a saved address.
    async fn resolve_shipping(
        &self,
        customer_id: Uuid,
        address_id: Option<Uuid>,
        inline: Option<ShippingDetails>,
    ) -> Result<ShippingDetails, ServiceError> {
        if let Some(address_id) = address_id {
            let saved = Address::find_by_id(address_id)
                .filter(address::Column::CustomerId.eq(customer_id))
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Address {} not found", address_id))
                })?;
            return Ok(ShippingDetails {
                full_name: saved.full_name,
                phone: saved.phone,
                address_line: saved.address_line,
                city: saved.city,
                state: saved.state,
                postal_code: saved.postal_code,
            });
        }

        let details = inline.ok_or_else(|| {
            ServiceError::ValidationError(
                "Either address_id or shipping details are required".to_string(),
            )
        })?;
        details.validate()?;
        Ok(details)
    }

    /// Snapshots the cart into an order inside one transaction: stock is
    /// deducted, order and items inserted, and the cart emptied together.
    #[allow(clippy::too_many_arguments)]
    async fn create_order_from_cart(
        &self,
        customer_id: Uuid,
        shipping: ShippingDetails,
        payment_method: PaymentMethod,
        order_status: OrderStatus,
        payment_status: PaymentStatus,
        transaction_id: Option<String>,
        gateway_order_id: Option<String>,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let lines = self.load_cart_lines(&txn, customer_id).await?;
        let (subtotal, total) = self.totals(&lines);

        for line in &lines {
            self.inventory
                .deduct_stock(&txn, line.product_id, line.quantity)
                .await?;
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_model = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number()),
            customer_id: Set(customer_id),
            order_status: Set(order_status),
            payment_status: Set(payment_status),
            payment_method: Set(payment_method),
            transaction_id: Set(transaction_id),
            gateway_order_id: Set(gateway_order_id),
            subtotal: Set(subtotal),
            delivery_fee: Set(self.config.delivery_fee),
            total_amount: Set(total),
            ship_to_name: Set(shipping.full_name),
            ship_to_phone: Set(shipping.phone),
            ship_address: Set(shipping.address_line),
            ship_city: Set(shipping.city),
            ship_state: Set(shipping.state),
            ship_postal_code: Set(shipping.postal_code),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = order_model.insert(&txn).await?;

        for line in &lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                product_name: Set(line.product_name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                line_total: Set(line.unit_price * Decimal::from(line.quantity)),
                created_at: Set(now),
            };
            item.insert(&txn).await?;
        }

        // Empty the cart; the order now owns these lines
        if let Some(cart) = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&txn)
            .await?
        {
            CartItem::delete_many()
                .filter(cart_item::Column::CartId.eq(cart.id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;

        for line in &lines {
            self.event_sender
                .send_or_log(Event::StockDeducted {
                    product_id: line.product_id,
                    quantity: line.quantity,
                })
                .await;
        }

        Ok(created)
    }

    /// Loads the cart as priced lines, validating stock along the way.
    async fn load_cart_lines(
        &self,
        conn: &impl ConnectionTrait,
        customer_id: Uuid,
    ) -> Result<Vec<CartLine>, ServiceError> {
        let cart = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(conn)
            .await?
            .ok_or(ServiceError::EmptyCart)?;

        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(Product)
            .all(conn)
            .await?;

        if rows.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let mut lines = Vec::with_capacity(rows.len());
        for (row, product) in rows {
            let product = product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Cart line {} references missing product",
                    row.id
                ))
            })?;
            if !product.can_fulfill(row.quantity) {
                return Err(ServiceError::InsufficientStock(format!(
                    "{}: requested {}, available {}",
                    product.name, row.quantity, product.stock_quantity
                )));
            }
            lines.push(CartLine {
                product_id: product.id,
                product_name: product.name,
                unit_price: product.price,
                quantity: row.quantity,
            });
        }
        Ok(lines)
    }

    fn totals(&self, lines: &[CartLine]) -> (Decimal, Decimal) {
        let subtotal: Decimal = lines
            .iter()
            .map(|l| l.unit_price * Decimal::from(l.quantity))
            .sum();
        (subtotal, subtotal + self.config.delivery_fee)
    }
}

/// Human-readable order number, e.g. `QM-20260830-7K2F9X`.
fn generate_order_number() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("QM-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_has_expected_shape() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "QM");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn order_numbers_are_distinct() {
        let a = generate_order_number();
        let b = generate_order_number();
        // 32^6 suffixes; collision here would indicate a broken generator
        assert_ne!(a, b);
    }
}
