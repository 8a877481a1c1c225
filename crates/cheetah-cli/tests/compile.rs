//! End-to-end tests driving the built `cheetah` binary.

use std::io::Write;
use std::process::{Command, Stdio};

fn cheetah() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cheetah"))
}

#[test]
fn compiles_a_template_file_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("greeting.tmpl");
    std::fs::write(&path, "Hello, $name!").unwrap();

    let output = cheetah().arg("compile").arg(&path).output().unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("class DynamicallyCompiledCheetahTemplate(Template):"));
    assert!(stdout.contains("__CHEETAH_src__"));
}

#[test]
fn reads_from_stdin_when_no_input_given() {
    let mut child = cheetah()
        .arg("compile")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"plain text only").unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout).unwrap().contains("plain text only"));
}

#[test]
fn reports_diagnostics_and_exits_nonzero_on_bad_input() {
    let output = cheetah()
        .arg("compile")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .and_then(|mut child| {
            child.stdin.take().unwrap().write_all(b"#bogus")?;
            child.wait_with_output()
        })
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("bogus"));
}

#[test]
fn rejects_malformed_setting_overrides() {
    let output = cheetah()
        .arg("compile")
        .arg("--setting")
        .arg("not-a-key-value")
        .stdin(Stdio::piped())
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn applies_compiler_setting_overrides() {
    let mut child = cheetah()
        .arg("compile")
        .arg("--setting")
        .arg("mainMethodName=index")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"hi").unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout).unwrap().contains("def index("));
}

#[test]
fn writes_to_an_output_file_when_o_is_given() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("out.py");

    let mut child = cheetah()
        .arg("compile")
        .arg("-o")
        .arg(&out_path)
        .stdin(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"hi").unwrap();
    let status = child.wait().unwrap();

    assert!(status.success());
    let written = std::fs::read_to_string(&out_path).unwrap();
    assert!(written.contains("class DynamicallyCompiledCheetahTemplate"));
}
