//! Skillpack Runtime
//!
//! Layered configuration and the [`SkillService`] facade an agent runtime
//! embeds: build the index once at startup, open one [`Session`] per
//! conversation, and route load and expand calls through it.
//!
//! ```rust,ignore
//! let service = SkillService::from_config(Config::load()?)?;
//! service.init_logging()?;
//! let session = service.open_session();
//! let outcome = service.load(&session, &LoadRequest::query("react hooks")).await;
//! println!("{}", outcome.to_json()?);
//! ```
//!
//! [`Session`]: skillpack_loader::Session

pub mod config;
pub mod service;

pub use config::{Config, LogFormat};
pub use service::SkillService;
