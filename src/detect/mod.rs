mod backend;
mod backends;
mod registry;
mod result;

pub use backend::DetectorBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use backends::{ReplayBackend, StubBackend};
pub use registry::{create_backend, default_class_names, BackendKind};
pub use result::{non_max_suppression, BBox, Detection, DetectionSet};
