//! Integration tests for the h3d-export binary
//!
//! Drives the compiled tool on generated glTF files and checks its output.

mod scene_fixtures;

use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

use h3d_export::{AnimationFile, GeometryFile};

fn h3d_export(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_h3d-export"))
        .args(args)
        .output()
        .expect("Failed to run h3d-export")
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_model_and_anim_directory() {
    let dir = tempdir().expect("Failed to create temp dir");
    let source = dir.path().join("source");
    let out = dir.path().join("out");
    std::fs::create_dir_all(source.join("chars")).unwrap();
    scene_fixtures::write_skinned_quad_gltf(&source.join("chars"), "man");

    let status = h3d_export(&["model", arg(&source), "-d", arg(&out), "--lod-dist1", "5"]);
    assert!(status.status.success(), "model command failed: {:?}", status);

    let geo = GeometryFile::parse(&std::fs::read(out.join("chars/man.geo")).unwrap()).unwrap();
    assert_eq!(geo.joint_matrices.len(), 3);
    let xml = std::fs::read_to_string(out.join("chars/man.scene.xml")).unwrap();
    assert!(xml.contains("geometry=\"chars/man.geo\""));
    assert!(out.join("chars/skin.material.xml").exists());

    let status = h3d_export(&[
        "anim",
        arg(&source),
        "-d",
        arg(&out),
        "--frame-rate",
        "1",
    ]);
    assert!(status.status.success(), "anim command failed: {:?}", status);
    let anim = AnimationFile::parse(&std::fs::read(out.join("chars/man.anim")).unwrap()).unwrap();
    assert_eq!(anim.frame_count, 2);

    let status = h3d_export(&["info", arg(&out.join("chars/man.geo"))]);
    assert!(status.status.success(), "info command failed: {:?}", status);
}

#[test]
fn test_build_from_manifest() {
    let dir = tempdir().expect("Failed to create temp dir");
    scene_fixtures::write_skinned_quad_gltf(dir.path(), "man");
    let manifest = dir.path().join("assets.toml");
    std::fs::write(
        &manifest,
        r#"
[output]
dir = "build"

[options]
add_model_name = true

[[assets]]
path = "man.gltf"

[[assets]]
path = "man.gltf"
kind = "animation"
"#,
    )
    .unwrap();

    let status = h3d_export(&["check", arg(&manifest)]);
    assert!(status.status.success(), "check command failed: {:?}", status);

    let status = h3d_export(&["build", arg(&manifest)]);
    assert!(status.status.success(), "build command failed: {:?}", status);

    let build = dir.path().join("build");
    assert!(build.join("man.geo").exists());
    assert!(build.join("man.scene.xml").exists());
    assert!(build.join("man_skin.material.xml").exists());
    assert!(build.join("man.anim").exists());
}

#[test]
fn test_failed_asset_sets_exit_code() {
    let dir = tempdir().expect("Failed to create temp dir");
    let broken = dir.path().join("broken.gltf");
    std::fs::write(&broken, "not json").unwrap();

    let status = h3d_export(&["model", arg(&broken), "-d", arg(dir.path())]);
    assert!(!status.status.success());
}

#[test]
fn test_info_rejects_unknown_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let file = dir.path().join("notes.txt");
    std::fs::write(&file, "hello").unwrap();

    let status = h3d_export(&["info", arg(&file)]);
    assert!(!status.status.success());
}
