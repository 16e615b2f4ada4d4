// Build script to compile the Slang shader to SPIR-V

use std::path::Path;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=shaders/");

    // Both entry points (vertMain/fragMain) land in one module
    compile_shader("shaders/triangle.slang", "shaders/triangle.spv");
}

fn compile_shader(input: &str, output: &str) {
    let input_path = Path::new(input);
    let output_path = Path::new(output);

    let result = Command::new("slangc")
        .arg(input_path)
        .args(["-target", "spirv"])
        .args(["-profile", "spirv_1_4"])
        .arg("-o")
        .arg(output_path)
        .status();

    match result {
        Ok(status) if status.success() => {
            println!("Compiled {} -> {}", input, output);
        }
        Ok(status) => {
            panic!("Failed to compile {}: exit code {:?}", input, status.code());
        }
        Err(e) => {
            eprintln!("Warning: slangc not found ({})", e);
            eprintln!("Shaders will not be compiled. Install the Vulkan SDK or compile manually:");
            eprintln!("  slangc {} -target spirv -profile spirv_1_4 -o {}", input, output);
        }
    }
}
