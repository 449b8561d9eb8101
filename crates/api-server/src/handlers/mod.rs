//! One submodule per route group, one file per feature area.

pub mod admin;
pub mod analytics;
pub mod campaigns;
pub mod channels;
pub mod crm;
pub mod health;
pub mod journeys;
pub mod leads;
pub mod webhooks;
