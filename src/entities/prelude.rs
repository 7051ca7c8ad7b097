#![allow(unused_imports)]

pub use super::analytics_cache::Entity as AnalyticsCache;
pub use super::drop_code::Entity as DropCode;
pub use super::popup_preference::Entity as PopupPreference;
pub use super::quest_task::Entity as QuestTask;
