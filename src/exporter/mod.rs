// file: src/exporter/mod.rs
// description: text renderings and json export

pub mod json;
pub mod text;

pub use json::{ExportManifest, JsonExporter};
pub use text::{render_ai, render_chat, render_intel, render_table};
