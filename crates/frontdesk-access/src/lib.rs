//! Frontdesk Access — permission resolution and administrative
//! operations over the store contracts.
//!
//! Everything here is generic over the `frontdesk-core` repository
//! traits, so the access layer has no dependency on the database crate.

pub mod admin;
pub mod export;
pub mod import;
pub mod resolver;

pub use admin::AdminService;
pub use export::{ExportService, GroupExport, PermissionExport};
pub use import::{
    GroupImport, ImportOptions, ImportPreview, ImportReport, ImportService, ImportSummary,
    PermissionImport,
};
pub use resolver::{
    EffectivePermission, EffectiveSet, PermissionResolver, PermissionSource, merge_grants,
};
