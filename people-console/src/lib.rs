pub mod api;
pub mod auth;
pub mod capabilities;
pub mod config;
pub mod console;
pub mod effects;
pub mod entities;
pub mod error;
pub mod fetcher;
pub mod notice;
pub mod panel;
pub mod permissions;
pub mod save;
pub mod table;
pub mod view;

pub use api::{AuthApi, HttpPeopleApi, PeopleApi};
pub use config::ConsoleConfig;
pub use console::PeopleConsole;
pub use effects::Effect;
pub use error::ApiError;
pub use notice::{Notice, NoticeLevel};
pub use panel::{reduce, EditPanel, PanelAction, PanelPhase};
