pub mod automation;
pub mod pattern;
pub mod snapshot;
pub mod timeline;
pub mod transport;

pub use automation::*;
pub use pattern::*;
pub use snapshot::*;
pub use timeline::*;
pub use transport::*;
