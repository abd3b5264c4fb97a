//! External API integrations

pub mod alerts;
pub mod oracle;
pub mod vegetation;
pub mod weather;

pub use alerts::{Alert, AlertSink, LogAlertSink, PushAlertSink};
pub use oracle::RemoteOracle;
pub use vegetation::{HttpVegetationSource, SimulatedVegetationSource, VegetationSource};
pub use weather::{EnvironmentalFeed, OpenMeteoClient};
