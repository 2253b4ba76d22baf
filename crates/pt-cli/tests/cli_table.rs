use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_phototab"))
}

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("phototab_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn run_ok(args: &[&str]) -> Output {
    let out = run(args);
    assert!(
        out.status.success(),
        "{:?} failed:\nstdout={}\nstderr={}",
        args,
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    out
}

fn s(p: &Path) -> &str {
    p.to_str().unwrap()
}

const CONFIG: &str = r#"{
    "axes": [{"label": "x", "unit": "m", "binning": {"explicit": {"edges": [0, 1, 2, 3]}}}],
    "seed": 7,
    "generator_parameters": {"energy": "1"}
}"#;

fn write(name: &str, text: &str) -> PathBuf {
    let p = tmp_path(name);
    std::fs::write(&p, text).unwrap();
    p
}

fn inspect(table: &Path) -> serde_json::Value {
    let out = run_ok(&["inspect", s(table)]);
    serde_json::from_slice(&out.stdout).expect("inspect should print JSON")
}

#[test]
fn fill_inspect_scenario() {
    let cfg = write("cfg.json", CONFIG);
    let ev = write(
        "ev.jsonl",
        "{\"coordinate\":[0.5]}\n{\"coordinate\":[1.5]}\n{\"coordinate\":[1.5]}\n{\"coordinate\":[5.0]}\n",
    );
    let out = tmp_path("t.ptab");
    run_ok(&["fill", "-c", s(&cfg), "-e", s(&ev), "-o", s(&out)]);

    let v = inspect(&out);
    assert_eq!(v["finalized"], true);
    assert_eq!(v["provenance"]["seed"], 7);
    assert_eq!(v["provenance"]["total_events"], 4);
    assert_eq!(v["overflow"]["sample_count"], 1);
    assert_eq!(v["shape"], serde_json::json!([3]));
    assert_eq!(v["axes"][0]["label"], "x");
    assert_eq!(v["axes"][0]["edges"], serde_json::json!([0.0, 1.0, 2.0, 3.0]));
    assert_eq!(v["axes"][0]["inclusive_upper"], false);
    assert!(v["axes"][0].get("transformed").is_none());
    let cells = v["cells"].as_array().unwrap();
    assert_eq!(cells.len(), 2);
    assert_eq!(cells[0]["index"], serde_json::json!([0]));
    assert_eq!(cells[1]["sample_count"], 2);
    approx::assert_relative_eq!(cells[1]["mean"].as_f64().unwrap(), 1.5);
    assert_eq!(cells[1]["variance"].as_f64().unwrap(), 0.0);

    let verify = run_ok(&["verify", s(&out)]);
    assert!(String::from_utf8_lossy(&verify.stdout).starts_with("ok "));

    for p in [cfg, ev, out] {
        let _ = std::fs::remove_file(p);
    }
}

#[test]
fn fill_output_does_not_depend_on_threads() {
    let cfg = write("cfg.json", CONFIG);
    let files: Vec<PathBuf> = (0..3)
        .map(|k| {
            let lines: String = (0..40)
                .map(|i| {
                    let x = ((i * 7 + k * 3) % 37) as f64 / 11.0;
                    format!("{{\"coordinate\":[{x}],\"weight\":{},\"source_id\":{k}}}\n", 0.5 + (i % 4) as f64)
                })
                .collect();
            write(&format!("ev{k}.jsonl"), &lines)
        })
        .collect();

    let mut outputs = Vec::new();
    for threads in ["1", "3"] {
        let out = tmp_path(&format!("t{threads}.ptab"));
        let mut args = vec!["fill", "-c", s(&cfg), "-o", s(&out), "--threads", threads];
        for f in &files {
            args.extend(["-e", s(f)]);
        }
        run_ok(&args);
        outputs.push(out);
    }
    assert_eq!(std::fs::read(&outputs[0]).unwrap(), std::fs::read(&outputs[1]).unwrap());

    for p in files.into_iter().chain(outputs).chain([cfg]) {
        let _ = std::fs::remove_file(p);
    }
}

#[test]
fn merge_partials_equals_single_fill() {
    let cfg = write("cfg.json", CONFIG);
    let a = write("a.jsonl", "{\"coordinate\":[0.5],\"weight\":2}\n{\"coordinate\":[2.5]}\n");
    let b = write("b.jsonl", "{\"coordinate\":[0.25]}\n{\"coordinate\":[-1]}\n");
    let (pa, pb, merged, both) =
        (tmp_path("a.ptab"), tmp_path("b.ptab"), tmp_path("m.ptab"), tmp_path("both.ptab"));

    run_ok(&["fill", "-c", s(&cfg), "-e", s(&a), "-o", s(&pa), "--no-finalize"]);
    run_ok(&["fill", "-c", s(&cfg), "-e", s(&b), "-o", s(&pb), "--no-finalize"]);
    run_ok(&["merge", s(&pa), s(&pb), "-o", s(&merged), "--finalize"]);
    run_ok(&["fill", "-c", s(&cfg), "-e", s(&a), "-e", s(&b), "-o", s(&both)]);
    assert_eq!(std::fs::read(&merged).unwrap(), std::fs::read(&both).unwrap());

    // Finalized tables are published results, not merge inputs.
    let out = run(&["merge", s(&merged), s(&pa), "-o", s(&tmp_path("x.ptab"))]);
    assert!(!out.status.success());

    for p in [cfg, a, b, pa, pb, merged, both] {
        let _ = std::fs::remove_file(p);
    }
}

#[test]
fn merge_accepts_independent_seeds() {
    let cfg7 = write("cfg7.json", CONFIG);
    let cfg3 = write("cfg3.json", &CONFIG.replace("\"seed\": 7", "\"seed\": 3"));
    let ev = write("ev.jsonl", "{\"coordinate\":[0.5]}\n");
    let (t7, t3, merged) = (tmp_path("t7.ptab"), tmp_path("t3.ptab"), tmp_path("m.ptab"));
    run_ok(&["fill", "-c", s(&cfg7), "-e", s(&ev), "-o", s(&t7), "--no-finalize"]);
    run_ok(&["fill", "-c", s(&cfg3), "-e", s(&ev), "-o", s(&t3), "--no-finalize"]);
    run_ok(&["merge", s(&t7), s(&t3), "-o", s(&merged)]);

    let v = inspect(&merged);
    assert_eq!(v["provenance"]["seed"], 3);
    assert_eq!(v["provenance"]["seeds"], serde_json::json!([3, 7]));
    assert_eq!(v["provenance"]["total_events"], 2);

    for p in [cfg7, cfg3, ev, t7, t3, merged] {
        let _ = std::fs::remove_file(p);
    }
}

#[test]
fn merge_rejects_mismatched_shapes() {
    let cfg1 = write("cfg1.json", CONFIG);
    let cfg2 = write("cfg2.json", &CONFIG.replace("[0, 1, 2, 3]", "[0, 1, 2]"));
    let (t1, t2) = (tmp_path("t1.ptab"), tmp_path("t2.ptab"));
    run_ok(&["create", "-c", s(&cfg1), "-o", s(&t1)]);
    run_ok(&["create", "-c", s(&cfg2), "-o", s(&t2)]);
    let out = run(&["merge", s(&t1), s(&t2), "-o", s(&tmp_path("m.ptab"))]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("shape mismatch"));

    for p in [cfg1, cfg2, t1, t2] {
        let _ = std::fs::remove_file(p);
    }
}

#[test]
fn bad_inputs_fail_loudly() {
    let bad_cfg = write("bad.json", &CONFIG.replace("\"seed\": 7", "\"seed\": 7, \"threads\": 2"));
    let out = run(&["create", "-c", s(&bad_cfg), "-o", s(&tmp_path("x.ptab"))]);
    assert!(!out.status.success());

    let cfg = write("cfg.json", CONFIG);
    let ev = write("neg.jsonl", "{\"coordinate\":[0.5],\"weight\":-1}\n");
    let out = run(&["fill", "-c", s(&cfg), "-e", s(&ev), "-o", s(&tmp_path("y.ptab"))]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid weight"));

    let garbage = write("garbage.ptab", "PHTB not really a table");
    let out = run(&["verify", s(&garbage)]);
    assert!(!out.status.success());

    for p in [bad_cfg, cfg, ev, garbage] {
        let _ = std::fs::remove_file(p);
    }
}

#[test]
fn version_prints() {
    let out = run_ok(&["version"]);
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("phototab "));
}
