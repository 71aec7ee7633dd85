use crate::{
    entities::{address, Address},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Saved delivery addresses. The first address a customer saves becomes
/// their default; setting another default clears the previous one.
#[derive(Clone)]
pub struct AddressService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAddressInput {
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
    #[serde(default)]
    pub is_default: bool,
}

impl AddressService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_addresses(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<address::Model>, ServiceError> {
        Ok(Address::find()
            .filter(address::Column::CustomerId.eq(customer_id))
            .order_by_desc(address::Column::IsDefault)
            .order_by_desc(address::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, input))]
    pub async fn create_address(
        &self,
        customer_id: Uuid,
        input: CreateAddressInput,
    ) -> Result<address::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let existing_count = Address::find()
            .filter(address::Column::CustomerId.eq(customer_id))
            .all(&txn)
            .await?
            .len();
        let make_default = input.is_default || existing_count == 0;

        if make_default && existing_count > 0 {
            self.clear_default(&txn, customer_id).await?;
        }

        let now = Utc::now();
        let model = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            full_name: Set(input.full_name),
            phone: Set(input.phone),
            address_line: Set(input.address_line),
            city: Set(input.city),
            state: Set(input.state),
            postal_code: Set(input.postal_code),
            is_default: Set(make_default),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&txn).await?;

        txn.commit().await?;
        info!("Created address {} for customer {}", created.id, customer_id);
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn set_default_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<address::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let target = Address::find_by_id(address_id)
            .filter(address::Column::CustomerId.eq(customer_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;

        self.clear_default(&txn, customer_id).await?;

        let mut model: address::ActiveModel = target.into();
        model.is_default = Set(true);
        model.updated_at = Set(Utc::now());
        let updated = model.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), ServiceError> {
        let target = Address::find_by_id(address_id)
            .filter(address::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;

        Address::delete_by_id(target.id).exec(&*self.db).await?;
        info!("Deleted address {}", address_id);
        Ok(())
    }

    async fn clear_default(
        &self,
        conn: &impl sea_orm::ConnectionTrait,
        customer_id: Uuid,
    ) -> Result<(), ServiceError> {
        let defaults = Address::find()
            .filter(address::Column::CustomerId.eq(customer_id))
            .filter(address::Column::IsDefault.eq(true))
            .all(conn)
            .await?;
        for existing in defaults {
            let mut model: address::ActiveModel = existing.into();
            model.is_default = Set(false);
            model.updated_at = Set(Utc::now());
            model.update(conn).await?;
        }
        Ok(())
    }
}
