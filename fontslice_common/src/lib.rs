pub mod join_set;
pub mod paths;

/// The log filter used when verbose output is requested.
pub const FILTER_SPEC: &str = "fontslice=debug,fontslice_common=debug,fontslice_fontops=debug,info";
