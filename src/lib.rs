pub mod client;
pub mod config;
pub mod enrich;
pub mod error;
pub mod events;
pub mod meta;
pub mod render;
pub mod scan;
pub mod web;
pub mod processing {
    pub mod caption;
    pub mod color;
    pub mod effects;
    pub mod layout;
}
pub mod tasks {
    pub mod scheduler;
    pub mod transition;
}
