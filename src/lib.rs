pub mod app;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod countdown;
pub mod deadline;
pub mod feed;
pub mod highlight;
pub mod model;
pub mod pipeline;
pub mod search;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use model::{DeadlineRecord, FeedEntry, RenderItem};
