//! trackreduce-export: Pure SVG rendering of traces (sans-IO).
//!
//! Renders geographic polylines (typically the raw trace and its
//! reduction) into a single SVG document for visual inspection.

pub mod svg;

pub use svg::{SvgLayer, SvgMetadata, build_path_data, to_svg};
