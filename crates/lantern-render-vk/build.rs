use std::{env, fs, path::PathBuf};

// (file, stage). Sources live in shaders/, output lands in OUT_DIR as <file>.spv.
const SHADERS: &[(&str, shaderc::ShaderKind)] = &[
    ("object.vert", shaderc::ShaderKind::Vertex),
    ("object.frag", shaderc::ShaderKind::Fragment),
    ("point_light.vert", shaderc::ShaderKind::Vertex),
    ("point_light.frag", shaderc::ShaderKind::Fragment),
];

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());
    let src_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap()).join("shaders");

    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();

    // render-pass path only, 1.0 is enough
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    // Mild optimization
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    // #include "x.glsl" resolves against shaders/
    let include_dir = src_dir.clone();
    opts.set_include_callback(move |name, _ty, _from, _depth| {
        let path = include_dir.join(name);
        fs::read_to_string(&path)
            .map(|content| shaderc::ResolvedInclude {
                resolved_name: path.display().to_string(),
                content,
            })
            .map_err(|e| format!("{}: {e}", path.display()))
    });

    for &(file, kind) in SHADERS {
        let path = src_dir.join(file);
        let source = fs::read_to_string(&path).unwrap();
        let spv = comp
            .compile_into_spirv(&source, kind, file, "main", Some(&opts))
            .unwrap_or_else(|e| panic!("{file}: {e}"));
        fs::write(out.join(format!("{file}.spv")), spv.as_binary_u8()).unwrap();
        println!("cargo:rerun-if-changed={}", path.display());
    }
    println!("cargo:rerun-if-changed={}", src_dir.join("global.glsl").display());
    println!("cargo:rerun-if-changed=build.rs");
}
