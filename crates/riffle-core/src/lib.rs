pub mod adapter;
pub mod codec;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod model;
pub mod persist;
pub mod resolve;
pub mod sync;
