use std::process::Command;

use tempfile::TempDir;

fn glaze() -> Command {
    Command::new(env!("CARGO_BIN_EXE_glaze"))
}

#[test]
fn unknown_recipe_effect_is_reported_before_any_window_opens() {
    let dir = TempDir::new().unwrap();
    let recipe = dir.path().join("chain.toml");
    std::fs::write(&recipe, "[[effect]]\nkind = \"sepia\"\n").unwrap();

    let output = glaze()
        .arg(dir.path().join("image.png"))
        .arg("--chain")
        .arg(&recipe)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sepia"), "stderr was: {stderr}");
}

#[test]
fn malformed_effect_spec_is_rejected_by_argument_parsing() {
    let output = glaze()
        .arg("image.png")
        .arg("--effect")
        .arg("blur:radius=soft")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid number"), "stderr was: {stderr}");
}

#[test]
fn missing_image_fails_with_a_readable_error() {
    let dir = TempDir::new().unwrap();
    let output = glaze().arg(dir.path().join("missing.png")).output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read image"), "stderr was: {stderr}");
}

#[test]
fn effect_and_chain_flags_conflict() {
    let output = glaze()
        .arg("image.png")
        .arg("--effect")
        .arg("blur")
        .arg("--chain")
        .arg("chain.toml")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot be used with"), "stderr was: {stderr}");
}
