//! HTML/CSS safe-subset validation and template binding derivation.

/// CSS variable/text-content/animation-class derivation from schema + values.
pub mod bindings;
/// HTML/CSS sanitization and validation against the safe subset.
pub mod template;
