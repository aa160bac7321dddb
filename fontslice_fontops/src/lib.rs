//! Font introspection and subsetting for fontslice.

pub mod font_info;

pub use font_info::{FeatureTag, FontFaceWrapper, FontFormat};
