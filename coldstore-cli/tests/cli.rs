use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn binpack(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_binpack"))
        .args(args)
        .output()
        .unwrap()
}

fn manage_disk(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_manage-disk"))
        .args(args)
        .output()
        .unwrap()
}

fn s(p: &Path) -> &str {
    p.to_str().unwrap()
}

/// Ten packs of 100..1000 MiB in two groups, a two-rung ladder and three
/// 25 GB optical discs.
fn fixture() -> (TempDir, PathBuf, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("catalog.jsonl");
    let mut lines = String::from("# index-data export\n");
    for i in 0..10 {
        let group = if i < 5 { "photos" } else { "mail" };
        lines.push_str(&format!(
            "{{\"entry_id\": \"e{i}\", \"size\": \"{}MiB\", \"group\": \"{group}\", \"pack_id\": \"p{i}\"}}\n",
            (i + 1) * 100
        ));
    }
    fs::write(&catalog, lines).unwrap();

    let ladder = dir.path().join("ladder.json");
    fs::write(&ladder, r#"{"rungs": ["1860MiB", "2600MiB"]}"#).unwrap();

    let media = dir.path().join("media.json");
    fs::write(
        &media,
        r#"{"media": [
            {"media_id": "bd-001", "capacity_bytes": "25GB", "kind": "optical"},
            {"media_id": "bd-002", "capacity_bytes": "25GB", "kind": "optical"},
            {"media_id": "bd-003", "capacity_bytes": "25GB", "kind": "optical"}
        ]}"#,
    )
    .unwrap();
    (dir, catalog, ladder, media)
}

#[test]
fn binpack_then_manage_disk_is_deterministic() {
    let (dir, catalog, ladder, media) = fixture();
    let blocks = dir.path().join("blocks.json");
    let out = binpack(&[
        "--catalog",
        s(&catalog),
        "--ladder",
        s(&ladder),
        "--tolerance",
        "3",
        "--out",
        s(&blocks),
        "--deterministic",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let block_doc: serde_json::Value = serde_json::from_slice(&fs::read(&blocks).unwrap()).unwrap();
    assert_eq!(block_doc["meta"]["created"], 0);
    assert_eq!(block_doc["body"]["stats"]["packs"], 10);

    let mut runs = Vec::new();
    for name in ["plan-a.json", "plan-b.json"] {
        let plan = dir.path().join(name);
        let out = manage_disk(&[
            "--plan",
            s(&blocks),
            "--media",
            s(&media),
            "--redundancy",
            "5",
            "--copies",
            "3",
            "--out",
            s(&plan),
            "--deterministic",
        ]);
        assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
        runs.push(fs::read(&plan).unwrap());
    }
    assert_eq!(runs[0], runs[1]);

    let plan: serde_json::Value = serde_json::from_slice(&runs[0]).unwrap();
    let planned = plan["body"]["blocks"].as_array().unwrap();
    assert!(!planned.is_empty());
    for b in planned {
        assert_eq!(b["media"].as_array().unwrap().len(), 3);
        assert_eq!(b["parity"]["codec"]["recovery_percent"], 30);
    }
    assert_eq!(plan["body"]["distribution"].as_object().unwrap().len(), 2);
}

#[test]
fn cbor_block_plan_is_accepted() {
    let (dir, catalog, ladder, media) = fixture();
    let blocks = dir.path().join("blocks.cbor");
    let out = binpack(&[
        "--catalog",
        s(&catalog),
        "--ladder",
        s(&ladder),
        "--tolerance",
        "3",
        "--out",
        s(&blocks),
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_ne!(fs::read(&blocks).unwrap()[0], b'{');

    let plan = dir.path().join("plan.json");
    let out = manage_disk(&[
        "--plan",
        s(&blocks),
        "--media",
        s(&media),
        "--redundancy",
        "5",
        "--copies",
        "2",
        "--no-spread",
        "--out",
        s(&plan),
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn oversized_pack_exits_with_infeasible() {
    let (dir, catalog, _, _) = fixture();
    let ladder = dir.path().join("small.json");
    fs::write(&ladder, r#"["500MiB"]"#).unwrap();
    let out = binpack(&[
        "--catalog",
        s(&catalog),
        "--ladder",
        s(&ladder),
        "--out",
        s(&dir.path().join("blocks.json")),
    ]);
    assert_eq!(out.status.code(), Some(3));
    assert!(!dir.path().join("blocks.json").exists());

    let out = binpack(&[
        "--catalog",
        s(&catalog),
        "--ladder",
        s(&ladder),
        "--oversize",
        "custom",
        "--out",
        s(&dir.path().join("blocks.json")),
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn bad_redundancy_exits_with_config_error() {
    let (dir, catalog, ladder, media) = fixture();
    let blocks = dir.path().join("blocks.json");
    assert!(
        binpack(&["--catalog", s(&catalog), "--ladder", s(&ladder), "--out", s(&blocks)])
            .status
            .success()
    );
    let out = manage_disk(&[
        "--plan",
        s(&blocks),
        "--media",
        s(&media),
        "--redundancy",
        "5",
        "--copies",
        "1",
        "--out",
        s(&dir.path().join("plan.json")),
    ]);
    assert_eq!(out.status.code(), Some(4));
}

#[test]
fn two_small_disks_exit_with_capacity_exceeded() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("catalog.json");
    fs::write(
        &catalog,
        r#"[{"entry_id": "vm-image", "size": "1.2TiB", "group": "vm", "pack_id": "p0"}]"#,
    )
    .unwrap();
    let ladder = dir.path().join("ladder.json");
    fs::write(&ladder, r#"{"rungs": ["1.2TiB"]}"#).unwrap();
    let media = dir.path().join("media.json");
    fs::write(
        &media,
        r#"[
            {"media_id": "hdd-a", "capacity": "1TiB", "kind": "disk", "age_years": 2},
            {"media_id": "hdd-b", "capacity": "1TiB", "kind": "disk", "age_years": 5}
        ]"#,
    )
    .unwrap();

    let blocks = dir.path().join("blocks.json");
    let out = binpack(&["--catalog", s(&catalog), "--ladder", s(&ladder), "--out", s(&blocks)]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let plan = dir.path().join("plan.json");
    let out = manage_disk(&[
        "--plan",
        s(&blocks),
        "--media",
        s(&media),
        "--redundancy",
        "5",
        "--copies",
        "2",
        "--out",
        s(&plan),
    ]);
    assert_eq!(out.status.code(), Some(5));
    assert!(!plan.exists());
}

#[test]
fn tampered_block_plan_is_rejected() {
    let (dir, catalog, ladder, media) = fixture();
    let blocks = dir.path().join("blocks.json");
    assert!(
        binpack(&["--catalog", s(&catalog), "--ladder", s(&ladder), "--out", s(&blocks)])
            .status
            .success()
    );
    let mut doc: serde_json::Value = serde_json::from_slice(&fs::read(&blocks).unwrap()).unwrap();
    doc["body"]["blocks"][0]["size"] = serde_json::json!(1);
    fs::write(&blocks, serde_json::to_vec(&doc).unwrap()).unwrap();

    let out = manage_disk(&[
        "--plan",
        s(&blocks),
        "--media",
        s(&media),
        "--redundancy",
        "5",
        "--copies",
        "2",
        "--out",
        s(&dir.path().join("plan.json")),
    ]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn missing_catalog_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = binpack(&[
        "--catalog",
        s(&dir.path().join("nope.json")),
        "--out",
        s(&dir.path().join("blocks.json")),
    ]);
    assert_eq!(out.status.code(), Some(1));
}
