pub mod announcements;
pub mod audit;
pub mod departments;
pub mod documents;
pub mod health;
pub mod incidents;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod profiles;
