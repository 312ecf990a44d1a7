//! ccpe-core: export and import of Cobalt Core ship packages
//!
//! This crate keeps a small, well-factored surface:
//! - Export projection of a save into a `.ccpj` package (`export`)
//! - Merging a package back into a save with rebuilt defaults (`patch`)
//! - Package discovery in loose files and zip archives (`package`, `index`)
//! - Game/profile folder layout, backups and persisted settings
//!
pub mod backup;
pub mod doc;
pub mod error;
pub mod export;
pub mod index;
pub mod locations;
pub mod meta;
pub mod package;
pub mod patch;
pub mod settings;
pub mod workflow;

pub use doc::{ChildInfo, JsonKind, get_by_pointer, list_children, read_json_file, write_json_to_file};
pub use error::{CoreError, Result};
pub use export::{ExportFlags, project};
pub use index::{Invalidator, PackageIndex};
pub use meta::ShipMetaData;
pub use package::{DiscoveredShip, ShipPath, discover, load_body, pack_folder, read_meta, write_package};
pub use patch::{MergeOptions, MergeReport, merge};
pub use settings::Settings;
pub use workflow::{ImportOptions, ImportOutcome, export_slot, import_into_slot};
