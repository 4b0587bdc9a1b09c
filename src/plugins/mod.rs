pub mod manager;
pub mod notifiers;
pub mod surfaces;
pub mod traits;
pub mod validators;

pub use manager::{DeliveryReport, PluginManager};
pub use traits::{DiscoverySurface, NotifierPlugin, ProductValidator};
