use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog product. Stock fields are mutated only by the order workflow:
/// decremented when an order is placed, restored when one is cancelled.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(nullable)]
    pub code: Option<String>,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    #[sea_orm(nullable)]
    pub category: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub original_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub in_stock: bool,
    #[sea_orm(nullable)]
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Derived discount percentage; zero unless `original_price > price`.
    pub fn discount_percentage(&self) -> Decimal {
        match self.original_price {
            Some(original) if original > self.price && original > Decimal::ZERO => {
                (((original - self.price) / original) * Decimal::from(100)).round_dp(2)
            }
            _ => Decimal::ZERO,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_date
            .map(|d| d < Utc::now().date_naive())
            .unwrap_or(false)
    }

    /// Expiring within 30 days (pharmacy shelf-pull window).
    pub fn is_expiring_soon(&self) -> bool {
        self.days_until_expiry().map(|d| d <= 30).unwrap_or(false)
    }

    pub fn days_until_expiry(&self) -> Option<i64> {
        self.expiry_date
            .map(|d| (d - Utc::now().date_naive()).num_days())
    }

    /// Whether `quantity` units can currently be purchased.
    pub fn can_fulfill(&self, quantity: i32) -> bool {
        self.in_stock && !self.is_expired() && self.stock_quantity >= quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn product(price: Decimal, original: Option<Decimal>) -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "Paracetamol 500mg".to_string(),
            code: Some("PARA-500".to_string()),
            description: None,
            category: Some("Pain Relief".to_string()),
            price,
            original_price: original,
            stock_quantity: 10,
            in_stock: true,
            expiry_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn discount_is_zero_without_original_price() {
        assert_eq!(product(dec!(100), None).discount_percentage(), Decimal::ZERO);
    }

    #[test]
    fn discount_is_zero_when_original_not_higher() {
        assert_eq!(
            product(dec!(100), Some(dec!(100))).discount_percentage(),
            Decimal::ZERO
        );
        assert_eq!(
            product(dec!(100), Some(dec!(80))).discount_percentage(),
            Decimal::ZERO
        );
    }

    #[test]
    fn discount_is_derived_from_original_price() {
        assert_eq!(
            product(dec!(75), Some(dec!(100))).discount_percentage(),
            dec!(25.00)
        );
        assert_eq!(
            product(dec!(66.67), Some(dec!(100))).discount_percentage(),
            dec!(33.33)
        );
    }

    #[test]
    fn expiry_helpers() {
        let mut p = product(dec!(10), None);
        assert!(!p.is_expired());
        assert!(!p.is_expiring_soon());

        p.expiry_date = Some((Utc::now() - Duration::days(1)).date_naive());
        assert!(p.is_expired());

        p.expiry_date = Some((Utc::now() + Duration::days(10)).date_naive());
        assert!(!p.is_expired());
        assert!(p.is_expiring_soon());

        p.expiry_date = Some((Utc::now() + Duration::days(90)).date_naive());
        assert!(!p.is_expiring_soon());
    }

    #[test]
    fn can_fulfill_respects_stock_and_flags() {
        let mut p = product(dec!(10), None);
        assert!(p.can_fulfill(10));
        assert!(!p.can_fulfill(11));

        p.in_stock = false;
        assert!(!p.can_fulfill(1));

        p.in_stock = true;
        p.expiry_date = Some((Utc::now() - Duration::days(1)).date_naive());
        assert!(!p.can_fulfill(1));
    }
}
