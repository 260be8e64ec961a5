//! Instance generation and the two aggregate strategies (batched container vs.
//! merged static mesh).

pub mod batched;
pub mod builder;
pub mod components;
pub mod merge;
pub mod method;
pub mod plugin;
pub mod resources;
pub mod sampler;
pub mod systems;
pub mod templates;

pub use method::Method;
pub use plugin::{InstancingPlugin, InstancingSet};
pub use resources::{ActiveAggregate, DemoSettings, SettingsChange};
