//! Server side: one generic controller serving every declared resource.
//!
//! Requests arrive as [`ApiRequest`] values (verb, path, [`Params`], body) so
//! any HTTP front end can sit in front of [`Controller::dispatch`].

mod controller;
pub mod envelope;
mod params;
mod remote;

pub use controller::{member_path, ApiRequest, ApiResponse, Controller, ControllerConfig, Phase};
pub use envelope::Meta;
pub use params::Params;
pub use remote::{RemoteContext, RemoteHandler};
