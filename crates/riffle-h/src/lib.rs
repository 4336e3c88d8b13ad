pub mod cdp;
pub mod driver;
