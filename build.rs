use vergen::EmitBuilder;

// Emits VERGEN_* build and git metadata, logged by `telemetry::init_tracing`.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    EmitBuilder::builder().all_build().all_git().emit()?;
    Ok(())
}
