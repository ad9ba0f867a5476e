fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Server stubs are generated as well so tests can stand up a fake runtime.
    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile_protos(&["proto/cri/api.proto"], &["proto/cri"])
        .unwrap_or_else(|e| panic!("protobuf compile error: {}", e));

    println!("cargo:rerun-if-changed=proto/cri/api.proto");
    Ok(())
}
