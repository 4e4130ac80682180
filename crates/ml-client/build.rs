fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Compile the ranking model proto (client and server stubs)
    tonic_build::compile_protos("../../proto/ranking.proto")?;
    println!("cargo:rerun-if-changed=../../proto/ranking.proto");
    Ok(())
}
