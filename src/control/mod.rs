pub mod service;

pub use service::ControlService;
