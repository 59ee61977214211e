use std::env;
use std::path::Path;

/// Locate `libibverbs` and `librdmacm` through `pkg-config` and link to them.
///
/// Return the include directories reported by both libraries.
fn link_rdma_core() -> Result<Vec<String>, pkg_config::Error> {
    let verbs = pkg_config::Config::new()
        .atleast_version("1.8.28")
        .statik(false)
        .probe("libibverbs")?;
    let cm = pkg_config::Config::new().statik(false).probe("librdmacm")?;

    let include_dirs = verbs
        .include_paths
        .iter()
        .chain(cm.include_paths.iter())
        .map(|p| p.display().to_string())
        .collect();
    Ok(include_dirs)
}

/// Build flow:
///
/// 1. If `RDMA_XFER_NO_VERBS` is set, skip the RDMA backend entirely.
/// 2. Try to link to existing `libibverbs` and `librdmacm` installations.
/// 3. If found, generate bindings and enable `cfg(rdma_verbs)`; otherwise,
///    only the transport-independent protocol layer is built.
fn main() {
    // Refuse to compile on non-64-bit platforms.
    if cfg!(not(target_pointer_width = "64")) {
        panic!("`rdma-xfer` currently only supports 64-bit platforms");
    }

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/bindings/verbs.h");
    println!("cargo:rerun-if-env-changed=RDMA_XFER_NO_VERBS");

    if env::var_os("RDMA_XFER_NO_VERBS").is_some() {
        println!("cargo:warning=RDMA_XFER_NO_VERBS is set, building without the RDMA backend");
        return;
    }

    match link_rdma_core() {
        Ok(include_dirs) => {
            println!("cargo:rustc-cfg=rdma_verbs");
            gen_verb_bindings(include_dirs);
        }
        Err(e) => {
            println!(
                "cargo:warning=rdma-core not found ({}), building without the RDMA backend",
                e.to_string().lines().next().unwrap_or("unknown error")
            );
        }
    }
}

fn gen_verb_bindings(include_dirs: Vec<String>) {
    let include_args = include_dirs.iter().map(|p| format!("-I{}", p));
    let bindings = bindgen::builder()
        .clang_args(include_args)
        .header("src/bindings/verbs.h")
        .allowlist_function("ibv_.*")
        .allowlist_function("rdma_.*")
        .allowlist_type("ibv_.*")
        .allowlist_type("rdma_.*")
        .allowlist_var("RAI_.*")
        .opaque_type("pthread_.*")
        .blocklist_type("max_align_t")
        .bitfield_enum("ibv_access_flags")
        .bitfield_enum("ibv_send_flags")
        .bitfield_enum("ibv_wc_flags")
        .constified_enum_module("ibv_wc_status")
        .constified_enum_module("ibv_wc_opcode")
        .constified_enum_module("ibv_wr_opcode")
        .constified_enum_module("ibv_qp_type")
        .constified_enum_module("ibv_qp_state")
        .constified_enum_module("rdma_port_space")
        .constified_enum_module("rdma_cm_event_type")
        .derive_copy(true)
        .derive_debug(false)
        .derive_default(true)
        .generate_comments(true)
        .layout_tests(false)
        .prepend_enum_name(false)
        .size_t_is_usize(true)
        .generate()
        .expect("failed to generate bindings");

    let out_dir = env::var_os("OUT_DIR").unwrap();
    let dest = Path::new(&out_dir).join("verbs_bindings.rs");
    bindings
        .write_to_file(dest)
        .expect("failed to write bindings");
}
