pub mod analytics_cache;
pub mod drop_code;
pub mod popup_preference;
pub mod prelude;
pub mod quest_task;
