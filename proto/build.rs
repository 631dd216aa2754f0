fn main() -> Result<(), Box<dyn std::error::Error>> {
    const PROTO: &str = "proto/audio_research.proto";

    let mut config = prost_build::Config::new();
    // A configured PROTOC wins; otherwise use the vendored binary.
    if std::env::var_os("PROTOC").is_none() {
        config.protoc_executable(protoc_bin_vendored::protoc_bin_path().map_err(|e| e.to_string())?);
    }

    println!("cargo:rerun-if-changed={PROTO}");
    tonic_build::configure().compile_protos_with_config(config, &[PROTO], &["proto"])?;
    Ok(())
}
