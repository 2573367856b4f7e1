pub mod cert;
pub mod compose;
pub mod config_store;
pub mod dns;
pub mod error;
pub mod event_sink;
pub mod executor;
pub mod module_loader;
pub mod route_table;
pub mod state_store;
pub mod tool_runner;

pub use cert::CertManager;
pub use compose::ComposeAdapter;
pub use config_store::ConfigStore;
pub use dns::DnsSynchronizer;
pub use error::{KatanaError, Result};
pub use event_sink::{ChannelSink, EventSink, NullSink};
pub use executor::ActionExecutor;
pub use module_loader::{ModuleLoader, ModuleWarning};
pub use route_table::{Backend, RouteTable, RouteTarget};
pub use state_store::StateStore;
pub use tool_runner::ToolRunner;
