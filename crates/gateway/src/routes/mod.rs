pub mod activity;
pub mod assistant;
pub mod auth;
pub mod documents;
pub mod health;
pub mod invoices;
pub mod petty_cash;
pub mod quotations;
pub mod receipts;
pub mod roles;
pub mod settings;
pub mod users;
