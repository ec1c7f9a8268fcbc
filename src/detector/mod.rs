pub mod discount;
pub mod throttle;
