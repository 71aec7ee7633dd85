use crate::{
    entities::{product, Product},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::info;
use uuid::Uuid;

/// Stock adjustments for the order workflow. Both operations take any
/// connection so they can run inside the caller's transaction; stock and
/// order rows must commit or roll back together.
///
/// Each adjustment is a single guarded UPDATE so two orders racing for the
/// same product cannot both spend the same units.
#[derive(Clone, Default)]
pub struct InventoryService;

impl InventoryService {
    pub fn new() -> Self {
        Self
    }

    /// Deducts stock for a purchased product. Fails with `InsufficientStock`
    /// when the product cannot cover the requested quantity; `in_stock` is
    /// cleared when the deduction drains the last unit.
    pub async fn deduct_stock(
        &self,
        conn: &impl ConnectionTrait,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }

        let product = Product::find_by_id(product_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if !product.can_fulfill(quantity) {
            return Err(ServiceError::InsufficientStock(format!(
                "{}: requested {}, available {}",
                product.name, quantity, product.stock_quantity
            )));
        }

        // The stock_quantity >= quantity filter makes the decrement atomic;
        // in_stock is derived from the pre-update value in the same statement.
        let result = Product::update_many()
            .col_expr(
                product::Column::StockQuantity,
                Expr::col(product::Column::StockQuantity).sub(quantity),
            )
            .col_expr(
                product::Column::InStock,
                Expr::col(product::Column::StockQuantity).gt(quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::StockQuantity.gte(quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            let available = Product::find_by_id(product_id)
                .one(conn)
                .await?
                .map(|p| p.stock_quantity)
                .unwrap_or(0);
            return Err(ServiceError::InsufficientStock(format!(
                "{}: requested {}, available {}",
                product.name, quantity, available
            )));
        }

        info!("Deducted {} units of product {}", quantity, product_id);
        Ok(())
    }

    /// Restores stock for a cancelled order line and re-flags availability.
    pub async fn restore_stock(
        &self,
        conn: &impl ConnectionTrait,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }

        let result = Product::update_many()
            .col_expr(
                product::Column::StockQuantity,
                Expr::col(product::Column::StockQuantity).add(quantity),
            )
            .col_expr(product::Column::InStock, Expr::value(true))
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }

        info!("Restored {} units of product {}", quantity, product_id);
        Ok(())
    }
}
