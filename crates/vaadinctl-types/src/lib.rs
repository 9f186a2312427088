mod error;
mod types;

pub use error::{FetchError, NetworkStage, ResolutionError};
pub use types::{
    ArtifactDescriptor, FrameworkVersion, InstalledVersion, ReleaseType, ReleaseTypeParseError,
    VersionComponent, VersionParseError, VersionRecord,
};
