use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

const MARKER: &str = "## The diagnostic engine returned an error during code parsing.";

#[test]
fn test_missing_output_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("declex")?;
    cmd.arg("a.h")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--output"));
    Ok(())
}

#[test]
fn test_unknown_option_exits_one() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("declex")?;
    cmd.args(["--no-such-flag", "-o", "out.log", "a.h"])
        .assert()
        .code(1);
    Ok(())
}

#[test]
fn test_help_exits_zero() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("declex")?;
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--exclude-pattern"));
    Ok(())
}

#[test]
fn test_excluded_missing_include_succeeds() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("a.h"), "#include \"skip.h\"\nint value;\n")?;

    let mut cmd = Command::cargo_bin("declex")?;
    cmd.current_dir(dir.path())
        .args(["-D", "FOO=1", "--exclude-pattern", "skip.*", "-o", "out.log", "a.h"])
        .assert()
        .success()
        .stderr(predicate::str::contains("file not found").not());

    let output = fs::read_to_string(dir.path().join("out.log"))?;
    assert!(output.starts_with("InvocationWorkingDirectory( path='"));
    assert!(output.contains("InvocationDefine( name='FOO', value='1' )\n"));
    assert!(output.contains("InvocationInput( path='a.h' )\n"));
    assert!(output.contains("Variable( name='value', scope='', type='int'"));
    assert!(!output.contains(MARKER));
    Ok(())
}

#[test]
fn test_missing_include_fails_with_marker() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("a.h"), "#include \"gone.h\"\nint value;\n")?;

    let mut cmd = Command::cargo_bin("declex")?;
    cmd.current_dir(dir.path())
        .args(["-o", "out.log", "a.h"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("'gone.h' file not found"));

    let output = fs::read_to_string(dir.path().join("out.log"))?;
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "InvocationInput( path='a.h' )");
    assert_eq!(lines[2], MARKER);
    Ok(())
}

#[test]
fn test_c_language_and_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("a.h"),
        "#ifdef __cplusplus\n#error not c\n#endif\nstruct s { int f; };\n",
    )?;
    fs::write(
        dir.path().join("declex.json"),
        r#"{ "attributes": ["module=core"], "inputs": ["a.h"] }"#,
    )?;

    let mut cmd = Command::cargo_bin("declex")?;
    cmd.current_dir(dir.path())
        .args(["--config", "declex.json", "-x", "c", "-o", "out.log"])
        .assert()
        .success();

    let output = fs::read_to_string(dir.path().join("out.log"))?;
    assert!(output.contains("InvocationAttribute( name='module', value='core' )\n"));
    assert!(output.contains("Record( name='s', scope='', type='struct'"));
    assert!(output.contains("Field( name='f', scope='s', type='int'"));
    Ok(())
}

#[test]
fn test_unwritable_output_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("a.h"), "int value;\n")?;

    let mut cmd = Command::cargo_bin("declex")?;
    cmd.current_dir(dir.path())
        .args(["-o", "no/such/dir/out.log", "a.h"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("declex: error"));
    Ok(())
}
