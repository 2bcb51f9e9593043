fn main() -> Result<(), Box<dyn std::error::Error>> {
    let tfplugin_proto = "../../proto/tfplugin6.proto";
    let proto_dir = "../../proto";

    std::fs::create_dir_all("src/generated")?;

    // Terraform plugin protocol (server only)
    println!("cargo:rerun-if-changed={}", tfplugin_proto);
    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .out_dir("src/generated")
        .compile(&[tfplugin_proto], &[proto_dir])?;

    Ok(())
}
