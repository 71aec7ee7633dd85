use crate::{
    entities::{product, Product, ProductModel},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Catalog service for listing and administering pharmacy products.
///
/// Stock mutations are deliberately not exposed here; they belong to the
/// order workflow (see `InventoryService`).
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub stock_quantity: i32,
    pub expiry_date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub original_price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub in_stock: Option<bool>,
    pub expiry_date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductListQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: ProductModel,
    pub discount_percentage: Decimal,
    pub expiring_soon: bool,
}

impl From<ProductModel> for ProductView {
    fn from(product: ProductModel) -> Self {
        let discount_percentage = product.discount_percentage();
        let expiring_soon = product.is_expiring_soon();
        Self {
            product,
            discount_percentage,
            expiring_soon,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductView>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists products with optional category and name filters, newest first.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: ProductListQuery) -> Result<ProductPage, ServiceError> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

        let mut find = Product::find();
        if let Some(category) = &query.category {
            find = find.filter(product::Column::Category.eq(category.clone()));
        }
        if let Some(search) = &query.search {
            find = find.filter(product::Column::Name.contains(search));
        }

        let total = find.clone().count(&*self.db).await?;
        let products = find
            .order_by_desc(product::Column::CreatedAt)
            .offset((page - 1) * per_page)
            .limit(per_page)
            .all(&*self.db)
            .await?;

        Ok(ProductPage {
            products: products.into_iter().map(ProductView::from).collect(),
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductView, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
        Ok(product.into())
    }

    #[instrument(skip(self, input))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        input.validate()?;
        if input.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price must be positive".to_string(),
            ));
        }
        if input.stock_quantity < 0 {
            return Err(ServiceError::ValidationError(
                "stock_quantity cannot be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            code: Set(input.code),
            description: Set(input.description),
            category: Set(input.category),
            price: Set(input.price),
            original_price: Set(input.original_price),
            stock_quantity: Set(input.stock_quantity),
            in_stock: Set(input.stock_quantity > 0),
            expiry_date: Set(input.expiry_date),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&*self.db).await?;
        info!("Created product {}", created.id);
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let existing = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let mut model: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            model.name = Set(name);
        }
        if let Some(description) = input.description {
            model.description = Set(Some(description));
        }
        if let Some(category) = input.category {
            model.category = Set(Some(category));
        }
        if let Some(price) = input.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "price must be positive".to_string(),
                ));
            }
            model.price = Set(price);
        }
        if let Some(original_price) = input.original_price {
            model.original_price = Set(Some(original_price));
        }
        if let Some(stock_quantity) = input.stock_quantity {
            if stock_quantity < 0 {
                return Err(ServiceError::ValidationError(
                    "stock_quantity cannot be negative".to_string(),
                ));
            }
            model.stock_quantity = Set(stock_quantity);
            model.in_stock = Set(stock_quantity > 0);
        }
        if let Some(in_stock) = input.in_stock {
            model.in_stock = Set(in_stock);
        }
        if let Some(expiry_date) = input.expiry_date {
            model.expiry_date = Set(Some(expiry_date));
        }
        model.updated_at = Set(Utc::now());

        Ok(model.update(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let result = Product::delete_by_id(product_id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }
        info!("Deleted product {}", product_id);
        Ok(())
    }
}
