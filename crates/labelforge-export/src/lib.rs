//! labelforge export backend
//!
//! Serializes augmented images and annotations into the on-disk release
//! formats (YOLO detection/segmentation, COCO, Pascal VOC, CSV), unifies
//! class ids across all source datasets, and packages the staging tree into
//! the final ZIP with its metadata bundle.
//!
//! The one invariant this crate enforces everywhere: label coordinates are
//! normalized by the *output* image dimensions recorded on each
//! [`ExportItem`], never by the source dimensions.

pub mod classes;
pub mod coco;
pub mod csv;
pub mod emitter;
pub mod item;
pub mod package;
pub mod voc;
pub mod yolo;

// Re-export main types for convenience
pub use classes::ClassTable;
pub use emitter::{emit, label_dir, resolve_format, ExportError, ExportOutcome};
pub use item::ExportItem;
pub use package::{
    build_snapshot, clean_staging, create_staging_skeleton, image_dir, write_metadata,
    zip_directory, AnnotationsSnapshot, DatasetStats, PackageError, ReleaseConfigDoc,
};
