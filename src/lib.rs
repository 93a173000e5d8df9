pub mod cache;
pub mod cli;
pub mod config;
pub mod directory;
pub mod fetcher;
pub mod gitlab_api;
pub mod model;
pub mod narrative;
pub mod pipeline;
pub mod podcast;
pub mod render;
pub mod schema;
pub mod util;
pub mod window;

pub use model::{ChangeRequestRecord, DigestResult, PodcastScript, SnitchEntry};
pub use pipeline::DigestPipeline;
pub use window::{resolve_window, TimeWindow, Timeframe};
