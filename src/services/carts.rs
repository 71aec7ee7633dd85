use crate::{
    entities::{cart, cart_item, Cart, CartItem, CartModel, Product, ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Shopping cart service. One active cart per customer, created lazily on
/// first touch. Prices are never stored on cart lines; they are read from
/// the catalog at view and checkout time.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Serialize)]
pub struct CartItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub in_stock: bool,
    pub available_quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub cart_id: Uuid,
    pub items: Vec<CartItemView>,
    pub total_items: i32,
    pub subtotal: Decimal,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the customer's cart, creating an empty one on first use.
    pub async fn get_or_create_cart(&self, customer_id: Uuid) -> Result<CartModel, ServiceError> {
        if let Some(existing) = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
        {
            return Ok(existing);
        }

        let now = Utc::now();
        let model = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;
        info!("Created cart {} for customer {}", created.id, customer_id);
        Ok(created)
    }

    /// Builds the customer-facing cart view with live catalog prices.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create_cart(customer_id).await?;
        let lines: Vec<(cart_item::Model, Option<ProductModel>)> = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let mut items = Vec::with_capacity(lines.len());
        let mut subtotal = Decimal::ZERO;
        let mut total_items = 0;

        for (line, product) in lines {
            let product = product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Cart line {} references missing product",
                    line.id
                ))
            })?;
            let line_total = product.price * Decimal::from(line.quantity);
            subtotal += line_total;
            total_items += line.quantity;
            items.push(CartItemView {
                id: line.id,
                product_id: product.id,
                product_name: product.name.clone(),
                unit_price: product.price,
                quantity: line.quantity,
                line_total,
                in_stock: product.in_stock && !product.is_expired(),
                available_quantity: product.stock_quantity,
            });
        }

        Ok(CartView {
            cart_id: cart.id,
            items,
            total_items,
            subtotal,
        })
    }

    /// Adds a product to the cart, accumulating quantity when the line
    /// already exists. The combined quantity must stay within stock.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }

        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let cart = self.get_or_create_cart(customer_id).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;

        let new_quantity = existing.as_ref().map(|l| l.quantity).unwrap_or(0) + quantity;
        if !product.can_fulfill(new_quantity) {
            return Err(ServiceError::InsufficientStock(format!(
                "{}: requested {}, available {}",
                product.name, new_quantity, product.stock_quantity
            )));
        }

        let now = Utc::now();
        match existing {
            Some(line) => {
                let mut model: cart_item::ActiveModel = line.into();
                model.quantity = Set(new_quantity);
                model.updated_at = Set(now);
                model.update(&*self.db).await?;
            }
            None => {
                let model = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                model.insert(&*self.db).await?;
            }
        }

        self.touch_cart(&cart).await?;
        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id,
            })
            .await;

        self.get_cart(customer_id).await
    }

    /// Sets the quantity of a cart line. Lines are removed through
    /// `remove_item`, not by setting zero.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let cart = self.get_or_create_cart(customer_id).await?;
        let line = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
            })?;

        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if !product.can_fulfill(quantity) {
            return Err(ServiceError::InsufficientStock(format!(
                "{}: requested {}, available {}",
                product.name, quantity, product.stock_quantity
            )));
        }

        let mut model: cart_item::ActiveModel = line.into();
        model.quantity = Set(quantity);
        model.updated_at = Set(Utc::now());
        model.update(&*self.db).await?;

        self.touch_cart(&cart).await?;
        self.get_cart(customer_id).await
    }

    /// Removes a product line from the cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create_cart(customer_id).await?;
        let line = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
            })?;

        line.delete(&*self.db).await?;

        self.touch_cart(&cart).await?;
        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                product_id,
            })
            .await;

        self.get_cart(customer_id).await
    }

    /// Empties the cart. Called by customers directly and by the order
    /// workflow after a successful placement.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, customer_id: Uuid) -> Result<(), ServiceError> {
        let cart = self.get_or_create_cart(customer_id).await?;
        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?;

        self.touch_cart(&cart).await?;
        self.event_sender.send_or_log(Event::CartCleared(cart.id)).await;
        info!("Cleared cart {}", cart.id);
        Ok(())
    }

    async fn touch_cart(&self, cart: &CartModel) -> Result<(), ServiceError> {
        let mut model: cart::ActiveModel = cart.clone().into();
        model.updated_at = Set(Utc::now());
        model.update(&*self.db).await?;
        Ok(())
    }
}
