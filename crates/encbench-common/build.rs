//! ---
//! eb_section: "01-core-functionality"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Shared primitives and utilities for the benchmark runtime."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    EmitBuilder::builder()
        .build_timestamp()
        .cargo_target_triple()
        .cargo_debug()
        .emit()?;

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
