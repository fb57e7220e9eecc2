// Models module - Database entity representations

pub mod coupon;
pub mod customer;
pub mod merchant;
pub mod offer;

pub use coupon::{Coupon, CouponStatus};
pub use customer::Customer;
pub use merchant::Merchant;
pub use offer::Offer;
