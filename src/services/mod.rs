pub mod addresses;
pub mod carts;
pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod products;

pub use addresses::AddressService;
pub use carts::CartService;
pub use inventory::InventoryService;
pub use notifications::NotificationService;
pub use orders::OrderService;
pub use payments::{PaymentGateway, RazorpayGateway};
pub use products::ProductCatalogService;
