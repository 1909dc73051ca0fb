pub mod catalog;
pub mod configuration;
pub mod console;
pub mod db;
pub mod entitlement;
pub mod forms;
pub mod helpers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod startup;
pub mod subscription;
pub mod telemetry;
