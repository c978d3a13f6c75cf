//! Fully qualified names of the dashboard tables

pub const CUSTOMERS: &str = "CUSTOMER_360_DB.ANALYTICS.CUSTOMERS";
pub const TRANSACTIONS: &str = "CUSTOMER_360_DB.ANALYTICS.TRANSACTIONS";
pub const PRODUCTS: &str = "CUSTOMER_360_DB.ANALYTICS.PRODUCTS";
pub const INTERACTIONS: &str = "CUSTOMER_360_DB.ANALYTICS.CUSTOMER_INTERACTIONS";
