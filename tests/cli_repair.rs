use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

fn combined_output(output: &std::process::Output) -> String {
    format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn stdout_lines(output: &std::process::Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

fn placeholder_bytes(tmp: &Path) -> Vec<u8> {
    let out = tmp.join("reference.png");
    let output = Command::new(assert_cmd::cargo::cargo_bin!("assetfix"))
        .arg("payload")
        .arg("--out")
        .arg(&out)
        .output()
        .expect("payload runs");
    assert!(output.status.success(), "{}", combined_output(&output));
    fs::read(&out).expect("read reference payload")
}

fn png_files_under(root: &Path) -> Vec<PathBuf> {
    let mut files = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().map(|e| e == "png").unwrap_or(false))
        .collect::<Vec<_>>();
    files.sort();
    files
}

#[test]
fn repair_help_lists_flags() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("assetfix"))
        .arg("repair")
        .arg("--help")
        .output()
        .expect("repair --help runs");

    assert!(output.status.success());
    let text = combined_output(&output);
    for flag in ["--list", "--engine", "--workers", "--sync", "--strict", "--progress"] {
        assert!(text.contains(flag), "help text missing {flag}: {text}");
    }
}

#[test]
fn repair_creates_missing_directories_and_reports_fixed() {
    let tmp = TempDir::new().expect("tempdir");
    let expected = placeholder_bytes(tmp.path());
    let target = tmp.path().join("a/b/img.png");
    assert!(!tmp.path().join("a").exists());

    let output = Command::new(assert_cmd::cargo::cargo_bin!("assetfix"))
        .arg("repair")
        .arg(&target)
        .arg("--progress")
        .arg("plain")
        .output()
        .expect("repair runs");
    assert!(output.status.success(), "{}", combined_output(&output));

    let bytes = fs::read(&target).expect("target written");
    assert!(!bytes.is_empty());
    assert_eq!(bytes, expected);

    let lines = stdout_lines(&output);
    assert_eq!(lines[0], format!("Fixed: {}", target.display()));
    assert!(
        lines[1].starts_with("Repair summary: targets=1 fixed=1 failed=0"),
        "unexpected summary: {}",
        lines[1]
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[PROGRESS] repair"), "missing plain progress: {stderr}");
    assert!(stderr.contains("Decision snapshot:"), "missing decision log: {stderr}");
}

#[test]
fn repair_continues_past_a_blocked_parent() {
    let tmp = TempDir::new().expect("tempdir");
    let blocker = tmp.path().join("organs");
    fs::write(&blocker, b"regular file").expect("write blocker");

    let first = tmp.path().join("onboarding/learn.png");
    let blocked = blocker.join("stomach.png");
    let last = tmp.path().join("onboarding/compete.png");

    let output = Command::new(assert_cmd::cargo::cargo_bin!("assetfix"))
        .arg("repair")
        .arg(&first)
        .arg(&blocked)
        .arg(&last)
        .arg("--progress")
        .arg("quiet")
        .output()
        .expect("repair runs");
    // Per-target failures do not change the exit status without --strict.
    assert!(output.status.success(), "{}", combined_output(&output));

    let lines = stdout_lines(&output);
    assert_eq!(lines[0], format!("Fixed: {}", first.display()));
    assert!(
        lines[1].starts_with(&format!("Error fixing {}: ", blocked.display())),
        "unexpected failure line: {}",
        lines[1]
    );
    assert!(lines[1].contains("create directory"), "{}", lines[1]);
    assert_eq!(lines[2], format!("Fixed: {}", last.display()));
    assert!(lines[3].contains("fixed=2 failed=1"), "{}", lines[3]);
    assert!(last.is_file());
}

#[test]
fn strict_mode_fails_after_attempting_everything() {
    let tmp = TempDir::new().expect("tempdir");
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, b"x").expect("write blocker");
    let good = tmp.path().join("ok/heart.png");

    let output = Command::new(assert_cmd::cargo::cargo_bin!("assetfix"))
        .arg("repair")
        .arg(blocker.join("brain.png"))
        .arg(&good)
        .arg("--strict")
        .arg("--progress")
        .arg("quiet")
        .output()
        .expect("repair runs");

    assert!(!output.status.success(), "strict repair unexpectedly succeeded");
    assert!(good.is_file(), "later target was not attempted");
    let text = combined_output(&output);
    assert!(
        text.contains("1 of 2 targets could not be fixed"),
        "missing strict error: {text}"
    );
}

#[test]
fn repair_reads_list_files_then_positional_paths() {
    let tmp = TempDir::new().expect("tempdir");
    let assets = tmp.path().join("assets");
    let plain = tmp.path().join("organs.txt");
    let json = tmp.path().join("onboarding.json");

    fs::write(
        &plain,
        format!(
            "# organ images\n{}\n\n{}\n",
            assets.join("organs/heart.png").display(),
            assets.join("organs/lungs.png").display()
        ),
    )
    .expect("write plain list");
    let manifest = serde_json::json!({
        "targets": [assets.join("onboarding/learn.png").to_string_lossy()]
    });
    fs::write(&json, manifest.to_string()).expect("write json list");
    let extra = assets.join("organs/liver.png");

    let output = Command::new(assert_cmd::cargo::cargo_bin!("assetfix"))
        .arg("repair")
        .arg("--list")
        .arg(&plain)
        .arg("--list")
        .arg(&json)
        .arg(&extra)
        .arg("--progress")
        .arg("quiet")
        .output()
        .expect("repair runs");
    assert!(output.status.success(), "{}", combined_output(&output));

    let lines = stdout_lines(&output);
    let fixed: Vec<_> = lines
        .iter()
        .filter_map(|l| l.strip_prefix("Fixed: "))
        .map(|s| s.to_string())
        .collect();
    assert_eq!(
        fixed,
        vec![
            assets.join("organs/heart.png").display().to_string(),
            assets.join("organs/lungs.png").display().to_string(),
            assets.join("onboarding/learn.png").display().to_string(),
            extra.display().to_string(),
        ]
    );
    assert_eq!(png_files_under(&assets).len(), 4);
}

#[test]
fn parallel_engine_reports_in_input_order() {
    let tmp = TempDir::new().expect("tempdir");
    let expected = placeholder_bytes(tmp.path());
    let root = tmp.path().join("tree");
    let targets: Vec<PathBuf> = (0..16)
        .map(|i| root.join(format!("set{}/img{:02}.png", i % 3, i)))
        .collect();

    let output = Command::new(assert_cmd::cargo::cargo_bin!("assetfix"))
        .arg("repair")
        .args(&targets)
        .arg("--engine")
        .arg("parallel")
        .arg("--workers")
        .arg("4")
        .arg("--progress")
        .arg("quiet")
        .output()
        .expect("repair runs");
    assert!(output.status.success(), "{}", combined_output(&output));

    let lines = stdout_lines(&output);
    for (line, target) in lines.iter().zip(&targets) {
        assert_eq!(line, &format!("Fixed: {}", target.display()));
    }
    assert!(
        lines[targets.len()].contains("engine=parallel workers=4"),
        "{}",
        lines[targets.len()]
    );
    for file in png_files_under(&root) {
        assert_eq!(fs::read(&file).expect("read written file"), expected);
    }
}

#[test]
fn rich_progress_keeps_stdout_report_intact() {
    let tmp = TempDir::new().expect("tempdir");
    let expected = placeholder_bytes(tmp.path());
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, b"not a directory").expect("write blocker");
    let targets = vec![
        tmp.path().join("organs/heart.png"),
        blocker.join("lungs.png"),
        tmp.path().join("organs/deep/brain.png"),
    ];

    let output = Command::new(assert_cmd::cargo::cargo_bin!("assetfix"))
        .arg("repair")
        .args(&targets)
        .arg("--engine")
        .arg("parallel")
        .arg("--workers")
        .arg("2")
        .arg("--progress")
        .arg("rich")
        .output()
        .expect("repair runs");
    assert!(output.status.success(), "{}", combined_output(&output));

    let lines = stdout_lines(&output);
    assert_eq!(lines[0], format!("Fixed: {}", targets[0].display()));
    assert!(
        lines[1].starts_with(&format!("Error fixing {}:", targets[1].display())),
        "{}",
        lines[1]
    );
    assert_eq!(lines[2], format!("Fixed: {}", targets[2].display()));
    assert!(
        lines[3].contains("fixed=2 failed=1") && lines[3].contains("engine=parallel workers=2"),
        "{}",
        lines[3]
    );

    // Bars replace the plain progress lines.
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("[PROGRESS]"), "{stderr}");

    assert_eq!(fs::read(&targets[0]).expect("read heart"), expected);
    assert_eq!(fs::read(&targets[2]).expect("read brain"), expected);
}

#[test]
fn repair_twice_is_stable() {
    let tmp = TempDir::new().expect("tempdir");
    let target = tmp.path().join("x/y/brain.png");

    let mut contents = Vec::new();
    for _ in 0..2 {
        let output = Command::new(assert_cmd::cargo::cargo_bin!("assetfix"))
            .arg("repair")
            .arg(&target)
            .arg("--progress")
            .arg("quiet")
            .output()
            .expect("repair runs");
        assert!(output.status.success(), "{}", combined_output(&output));
        assert!(combined_output(&output).contains("fixed=1 failed=0"));
        contents.push(fs::read(&target).expect("read target"));
    }
    assert_eq!(contents[0], contents[1]);
}

#[test]
fn repair_without_targets_is_an_error() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("assetfix"))
        .arg("repair")
        .arg("--progress")
        .arg("quiet")
        .output()
        .expect("repair runs");
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(text.contains("no target paths"), "missing error: {text}");
}

#[test]
fn verify_flags_missing_and_stale_targets() {
    let tmp = TempDir::new().expect("tempdir");
    let good = tmp.path().join("good.png");
    let stale = tmp.path().join("stale.png");
    let absent = tmp.path().join("absent.png");

    let repaired = Command::new(assert_cmd::cargo::cargo_bin!("assetfix"))
        .arg("repair")
        .arg(&good)
        .arg("--progress")
        .arg("quiet")
        .output()
        .expect("repair runs");
    assert!(repaired.status.success(), "{}", combined_output(&repaired));
    fs::write(&stale, b"").expect("write zero-byte asset");

    let ok = Command::new(assert_cmd::cargo::cargo_bin!("assetfix"))
        .arg("verify")
        .arg(&good)
        .output()
        .expect("verify runs");
    assert!(ok.status.success(), "{}", combined_output(&ok));
    assert!(combined_output(&ok).contains(&format!("OK: {}", good.display())));

    let bad = Command::new(assert_cmd::cargo::cargo_bin!("assetfix"))
        .arg("verify")
        .arg(&good)
        .arg(&stale)
        .arg(&absent)
        .output()
        .expect("verify runs");
    assert!(!bad.status.success());
    let text = combined_output(&bad);
    assert!(text.contains(&format!("Mismatch: {} (0 bytes)", stale.display())), "{text}");
    assert!(text.contains(&format!("Missing: {}", absent.display())), "{text}");
    assert!(text.contains("ok=1 missing=1 mismatched=1"), "{text}");
    assert!(text.contains("2 of 3 targets do not hold the placeholder"), "{text}");
}

#[test]
fn payload_command_describes_placeholder() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("assetfix"))
        .arg("payload")
        .output()
        .expect("payload runs");
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(
        stdout_lines(&output)[0],
        "Payload: format=png width=1 height=1 bit_depth=8 color_type=rgba bytes=70 crc32=0795a426"
    );
}
