//! Received packages: the target side of pre-alert matching.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{Package, PackageDraft, PackageId, PackageStatus};
pub use repository::PackageRepository;
pub use router::package_router;
pub use service::{PackageRegistration, PackageService, PackageServiceError};
