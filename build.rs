fn main() {
    let check_cfg = rustc_minor_version().is_some_and(|v| v >= 80);

    println!("cargo::rerun-if-env-changed=TENSOR_INTEROP_DENY_WARNINGS");
    if check_cfg {
        println!("cargo:rustc-check-cfg=cfg(deny_warnings)");
    }
    if std::env::var("TENSOR_INTEROP_DENY_WARNINGS").as_deref() == Ok("1") {
        println!("cargo:rustc-cfg=deny_warnings");
    }
}

fn rustc_minor_version() -> Option<u32> {
    let rustc = std::env::var_os("RUSTC")?;
    let output = std::process::Command::new(rustc)
        .arg("--version")
        .output()
        .ok()?;
    let version = String::from_utf8(output.stdout).ok()?;
    let mut pieces = version.split('.');
    if pieces.next() != Some("rustc 1") {
        return None;
    }
    pieces.next()?.parse().ok()
}
