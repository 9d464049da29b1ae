//! End-to-end checks against the `deva` binary itself: write a compiled
//! `.dvc` fixture to a temp file, then drive `run`/`disasm`/`compile`
//! the way a user invoking the binary would.

use std::fs::File;
use std::io::BufWriter;

use assert_cmd::prelude::*;
use deva_core::builder::CodeBuilder;
use deva_core::ids::LocalId;
use deva_core::opcode::Instr;
use deva_core::{fileformat, DevaResult};
use predicates::prelude::*;
use predicates::str::contains;
use std::process::Command;
use tempfile::NamedTempFile;

/// `print("hello")`, nothing fancier: enough to exercise the full
/// open-file -> read_code -> Executor::run -> render path.
fn hello_world_program() -> DevaResult<NamedTempFile> {
    let mut cb = CodeBuilder::new();
    let msg = cb.add_string("hello from the vm");
    let mut main = cb.new_function("@main", 0, None);
    main.add_name("print");
    main.emit(Instr::Push(msg))
        .emit(Instr::Load(LocalId(0)))
        .emit(Instr::Call(1))
        .emit(Instr::Pop);
    cb.push_function(main);
    let code = cb.build();

    let file = NamedTempFile::with_suffix(".dvc").expect("create temp file");
    let mut w = BufWriter::new(File::create(file.path()).expect("open temp file for write"));
    fileformat::write_code(&code, &mut w).expect("write .dvc fixture");
    Ok(file)
}

#[test]
fn run_executes_a_compiled_program_and_prints_its_output() {
    let fixture = hello_world_program().unwrap();

    Command::cargo_bin("deva")
        .unwrap()
        .arg("run")
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(contains("hello from the vm"));
}

#[test]
fn run_warns_about_a_breakpoint_on_a_line_with_no_instruction() {
    let fixture = hello_world_program().unwrap();

    Command::cargo_bin("deva")
        .unwrap()
        .arg("run")
        .arg(fixture.path())
        .arg("--break")
        .arg("9999")
        .assert()
        .success()
        .stderr(contains("breakpoint ignored"));
}

#[test]
fn run_reports_a_missing_file_without_panicking() {
    Command::cargo_bin("deva")
        .unwrap()
        .arg("run")
        .arg("/no/such/file.dvc")
        .assert()
        .failure()
        .stderr(contains("failed to open"));
}

#[test]
fn disasm_prints_the_constant_and_function_tables() {
    let fixture = hello_world_program().unwrap();

    Command::cargo_bin("deva")
        .unwrap()
        .arg("disasm")
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(contains("@main"))
        .stdout(contains("hello from the vm"));
}

#[test]
fn disasm_code_only_omits_the_constant_table_header() {
    let fixture = hello_world_program().unwrap();

    Command::cargo_bin("deva")
        .unwrap()
        .arg("disasm")
        .arg("--code-only")
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(contains("Call(1)"))
        .stdout(contains("constants (").not());
}

#[test]
fn compile_honestly_refuses_since_no_front_end_is_linked() {
    Command::cargo_bin("deva")
        .unwrap()
        .arg("compile")
        .arg("whatever.d")
        .assert()
        .failure()
        .stderr(contains("no compiler front end is linked"));
}
