fn main() {
    feature_conflicts();

    let version = get_version();
    println!("cargo:rustc-env=VERSION={version}");
    println!("cargo:warning=Feature tagged version: {version}");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=Cargo.toml");
}

fn feature_conflicts() {
    let tls_rustls = std::env::var("CARGO_FEATURE_TLS_RUSTLS").is_ok();
    let tls_native = std::env::var("CARGO_FEATURE_TLS_NATIVE").is_ok();

    if tls_rustls && tls_native {
        panic!(
            "Cannot enable both 'tls-rustls' and 'tls-native' features simultaneously. Choose one."
        );
    }

    // The completion API is only reachable over HTTPS.
    if !tls_rustls && !tls_native {
        println!("cargo:warning=No TLS backend selected. Completion API calls will fail without either 'tls-rustls' or 'tls-native'!");
    }
}

/// Creates a version string from the package version, with the
/// selected TLS backend included in the build metadata suffix.
fn get_version() -> String {
    let suffixes: Vec<&str> = [("TLS_NATIVE", "tn"), ("TLS_RUSTLS", "tr")]
        .into_iter()
        .filter(|(feature, _)| std::env::var(format!("CARGO_FEATURE_{feature}")).is_ok())
        .map(|(_, name)| name)
        .collect();

    let version = env!("CARGO_PKG_VERSION");
    if suffixes.is_empty() {
        version.to_string()
    } else {
        format!("{}+{}", version, suffixes.join(""))
    }
}
