//! Unit tests for toolchain resolution.

use super::*;
use crate::target::{REGISTRY, find_target};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct PackagesRoot {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl PackagesRoot {
    fn touch(&self, relative: &str) -> Utf8PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create tool dir");
        }
        std::fs::write(&path, b"#!/bin/sh\n").expect("write fake tool");
        path
    }

    fn resolver(&self) -> ToolchainResolver {
        ToolchainResolver::new(self.root.clone(), ToolchainSettings::default())
    }
}

#[fixture]
fn packages() -> PackagesRoot {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
    PackagesRoot { _dir: dir, root }
}

/// Return the tool a `ToolchainNotFound` error names.
fn missing_tool(err: ReleaseError) -> &'static str {
    match err {
        ReleaseError::ToolchainNotFound { tool, .. } => tool,
        other => panic!("expected ToolchainNotFound, got {other:?}"),
    }
}

fn ndk_bin() -> String {
    format!("android-ndk/toolchains/llvm/prebuilt/{NDK_HOST_TAG}/bin")
}

/// Provision every tool any registered target can ask for.
fn provision_everything(packages: &PackagesRoot) {
    for arch in ["x86_64", "aarch64"] {
        for tool in ["clang", "clang++", "ar"] {
            packages.touch(&format!("osxcross/target/bin/{arch}-apple-darwin21.4-{tool}"));
        }
    }
    for triple in ["aarch64-linux-android", "x86_64-linux-android"] {
        packages.touch(&format!("{}/{triple}24-clang", ndk_bin()));
        packages.touch(&format!("{}/{triple}24-clang++", ndk_bin()));
    }
    packages.touch(&format!("{}/llvm-ar", ndk_bin()));
    packages.touch(&format!("bin/cargo-xwin{HOST_EXE_SUFFIX}"));
    packages.touch(&format!("bin/cargo-zigbuild{HOST_EXE_SUFFIX}"));
    packages.touch(&format!("zig/zig{HOST_EXE_SUFFIX}"));
}

#[rstest]
fn darwin_uses_osxcross_tools(packages: PackagesRoot) {
    provision_everything(&packages);
    let target = find_target("aarch64-apple-darwin").expect("registered");

    let env = packages.resolver().resolve(&target).expect("resolves");

    let bin = packages.root.join("osxcross/target/bin");
    let tool = |name: &str| Some(bin.join(format!("aarch64-apple-darwin21.4-{name}")));
    assert_eq!(env.driver, BuildDriver::Cargo);
    assert_eq!(env.path_prepend, vec![bin.clone()]);
    assert_eq!(env.c_compiler, tool("clang"));
    assert_eq!(env.cxx_compiler, tool("clang++"));
    assert_eq!(env.archiver, tool("ar"));
    assert_eq!(env.linker, env.c_compiler);
    assert_eq!(env.extra_vars["CRATE_CC_NO_DEFAULTS"], "1");
}

#[rstest]
fn darwin_sdk_version_selects_tool_names(packages: PackagesRoot) {
    packages.touch("osxcross/target/bin/x86_64-apple-darwin23-clang");
    packages.touch("osxcross/target/bin/x86_64-apple-darwin23-clang++");
    packages.touch("osxcross/target/bin/x86_64-apple-darwin23-ar");
    let settings = ToolchainSettings {
        darwin_sdk_version: "23".to_owned(),
        ..ToolchainSettings::default()
    };
    let resolver = ToolchainResolver::new(packages.root.clone(), settings);
    let target = find_target("x86_64-apple-darwin").expect("registered");

    let env = resolver.resolve(&target).expect("resolves");

    let cc = env.c_compiler.expect("C compiler");
    assert!(cc.as_str().ends_with("x86_64-apple-darwin23-clang"));
}

#[rstest]
fn missing_darwin_compiler_names_the_tool(packages: PackagesRoot) {
    let resolver = packages.resolver();
    let target = find_target("x86_64-apple-darwin").expect("registered");

    let err = resolver.resolve(&target).expect_err("missing toolchain");

    match err {
        ReleaseError::ToolchainNotFound { triple, tool, path } => {
            assert_eq!(triple, "x86_64-apple-darwin");
            assert_eq!(tool, "C compiler");
            assert!(path.as_str().ends_with("x86_64-apple-darwin21.4-clang"));
        }
        other => panic!("expected ToolchainNotFound, got {other:?}"),
    }
}

#[rstest]
fn missing_darwin_archiver_is_reported_after_compilers(packages: PackagesRoot) {
    packages.touch("osxcross/target/bin/aarch64-apple-darwin21.4-clang");
    packages.touch("osxcross/target/bin/aarch64-apple-darwin21.4-clang++");
    let resolver = packages.resolver();
    let target = find_target("aarch64-apple-darwin").expect("registered");

    let err = resolver.resolve(&target).expect_err("missing archiver");

    assert_eq!(missing_tool(err), "archiver");
}

#[rstest]
fn linux_host_strategy_needs_no_tools(packages: PackagesRoot) {
    let resolver = packages.resolver();
    let target = find_target("x86_64-unknown-linux-musl").expect("registered");

    let env = resolver.resolve(&target).expect("resolves on empty root");

    assert_eq!(env.driver, BuildDriver::Cargo);
    assert!(env.declared_tools().is_empty());
    assert!(env.path_prepend.is_empty());
    assert!(env.linker_flags.is_empty());
}

#[rstest]
fn linux_zigbuild_requires_zig(packages: PackagesRoot) {
    packages.touch(&format!("bin/cargo-zigbuild{HOST_EXE_SUFFIX}"));
    let settings = ToolchainSettings {
        linux_strategy: LinuxStrategy::Zigbuild,
        ..ToolchainSettings::default()
    };
    let resolver = ToolchainResolver::new(packages.root.clone(), settings);
    let target = find_target("aarch64-unknown-linux-musl").expect("registered");

    let err = resolver.resolve(&target).expect_err("zig missing");

    assert_eq!(missing_tool(err), "zig");
}

#[rstest]
fn linux_zigbuild_puts_zig_and_wrapper_on_path(packages: PackagesRoot) {
    provision_everything(&packages);
    let settings = ToolchainSettings {
        linux_strategy: LinuxStrategy::Zigbuild,
        ..ToolchainSettings::default()
    };
    let resolver = ToolchainResolver::new(packages.root.clone(), settings);
    let target = find_target("aarch64-unknown-linux-musl").expect("registered");

    let env = resolver.resolve(&target).expect("resolves");

    assert_eq!(env.driver, BuildDriver::Zigbuild);
    assert_eq!(
        env.path_prepend,
        vec![packages.root.join("zig"), packages.root.join("bin")]
    );
}

#[rstest]
fn windows_prefers_wrapper_from_packages_root(packages: PackagesRoot) {
    let bundled = packages.touch(&format!("bin/cargo-xwin{HOST_EXE_SUFFIX}"));
    let elsewhere = packages.touch(&format!("host-bin/cargo-xwin{HOST_EXE_SUFFIX}"));
    let resolver = packages
        .resolver()
        .with_search_path(vec![elsewhere.parent().expect("parent").to_owned()]);
    let target = find_target("x86_64-pc-windows-msvc").expect("registered");

    let env = resolver.resolve(&target).expect("resolves");

    assert_eq!(env.driver, BuildDriver::Xwin);
    assert_eq!(env.wrapper, Some(bundled));
}

#[rstest]
fn windows_falls_back_to_search_path(packages: PackagesRoot) {
    let host = packages.touch(&format!("host-bin/cargo-xwin{HOST_EXE_SUFFIX}"));
    let host_dir = host.parent().expect("parent").to_owned();
    let resolver = packages.resolver().with_search_path(vec![host_dir.clone()]);
    let target = find_target("aarch64-pc-windows-msvc").expect("registered");

    let env = resolver.resolve(&target).expect("resolves");

    assert_eq!(env.wrapper, Some(host));
    assert_eq!(env.path_prepend, vec![host_dir]);
}

#[rstest]
fn windows_without_wrapper_fails(packages: PackagesRoot) {
    let resolver = packages.resolver();
    let target = find_target("x86_64-pc-windows-msvc").expect("registered");

    let err = resolver.resolve(&target).expect_err("no wrapper");

    assert_eq!(missing_tool(err), "build wrapper");
}

#[rstest]
fn android_uses_ndk_clang_for_api_level(packages: PackagesRoot) {
    provision_everything(&packages);
    let resolver = packages.resolver();
    let target = find_target("aarch64-linux-android").expect("registered");

    let env = resolver.resolve(&target).expect("resolves");

    let bin = packages.root.join(ndk_bin());
    let clang = bin.join("aarch64-linux-android24-clang");
    assert_eq!(env.c_compiler, Some(clang));
    assert_eq!(env.archiver, Some(bin.join("llvm-ar")));
    assert_eq!(env.linker, env.c_compiler);
}

#[rstest]
fn every_declared_tool_exists(packages: PackagesRoot) {
    provision_everything(&packages);
    let resolver = packages.resolver();

    for target in REGISTRY {
        let env = resolver.resolve(target).expect("provisioned");
        for (role, path) in env.declared_tools() {
            assert!(path.exists(), "{target}: {role} {path} does not exist");
        }
    }
}

#[rstest]
fn resolving_one_target_does_not_affect_the_next(packages: PackagesRoot) {
    provision_everything(&packages);
    let resolver = packages.resolver();
    let linux = find_target("x86_64-unknown-linux-musl").expect("registered");
    let darwin = find_target("x86_64-apple-darwin").expect("registered");

    let before = resolver.resolve(&linux).expect("resolves");
    resolver.resolve(&darwin).expect("resolves");
    let after = resolver.resolve(&linux).expect("resolves");

    let vars = after.build_vars(&linux);
    assert_eq!(before, after);
    assert!(!vars.contains_key("CRATE_CC_NO_DEFAULTS"));
}

#[rstest]
fn build_vars_use_per_target_names(packages: PackagesRoot) {
    provision_everything(&packages);
    let resolver = packages.resolver();
    let target = find_target("x86_64-apple-darwin").expect("registered");
    let env = resolver.resolve(&target).expect("resolves");

    let vars = env.build_vars(&target);

    let bin = packages.root.join("osxcross/target/bin");
    let clang = bin.join("x86_64-apple-darwin21.4-clang").to_string();
    assert_eq!(vars["CC_x86_64_apple_darwin"], clang);
    assert_eq!(vars["CARGO_TARGET_X86_64_APPLE_DARWIN_LINKER"], clang);
    assert!(vars.contains_key("CXX_x86_64_apple_darwin"));
    assert!(vars.contains_key("AR_x86_64_apple_darwin"));
    assert!(!vars.contains_key("CC"));
}

#[test]
fn rustflags_are_space_joined() {
    let target = find_target("x86_64-unknown-linux-musl").expect("registered");
    let mut env = ToolchainEnv::host(BuildDriver::Cargo);
    env.linker_flags = vec!["-C".to_owned(), "target-feature=-crt-static".to_owned()];

    let vars = env.build_vars(&target);

    assert_eq!(
        vars["CARGO_TARGET_X86_64_UNKNOWN_LINUX_MUSL_RUSTFLAGS"],
        "-C target-feature=-crt-static"
    );
}

#[test]
fn host_linux_env_sets_no_rustflags() {
    let target = find_target("x86_64-unknown-linux-musl").expect("registered");
    let env = ToolchainResolver::new("/nonexistent", ToolchainSettings::default())
        .resolve(&target)
        .expect("host strategy needs no tools");

    assert!(env.build_vars(&target).is_empty());
}

#[rstest]
#[case::cargo(BuildDriver::Cargo, "cargo build")]
#[case::xwin(BuildDriver::Xwin, "cargo xwin build")]
#[case::zigbuild(BuildDriver::Zigbuild, "cargo zigbuild")]
fn driver_display_names_the_subcommand(#[case] driver: BuildDriver, #[case] expected: &str) {
    assert_eq!(driver.to_string(), expected);
}
