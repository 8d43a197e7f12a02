//! Integration tests for the vm64-asm CLI.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assembler as _;
use thiserror as _;
use vm64_core::{CoreConfig, Cpu, Memory, MemoryBus, Register};

fn binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_vm64-asm"))
}

fn create_temp_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn build_simple_program() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "simple.asm", "NOP\nHLT\n");

    let output = temp_dir.path().join("simple.bin");

    let status = Command::new(binary_path())
        .args([
            "build",
            source.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .status()
        .expect("failed to run vm64-asm");

    assert!(status.success());
    let binary = fs::read(&output).unwrap();
    assert_eq!(binary, &[0x00, 0x00, 0xff, 0xff]);
}

#[test]
fn build_with_default_output() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "test.asm", "NOP\n");

    let status = Command::new(binary_path())
        .args(["build", source.to_str().unwrap()])
        .current_dir(temp_dir.path())
        .status()
        .expect("failed to run vm64-asm");

    assert!(status.success());
    assert!(temp_dir.path().join("test.bin").exists());
}

#[test]
fn build_reports_errors_with_line() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "bad.asm", "NOP\nLDI R1\n");

    let output = Command::new(binary_path())
        .args(["build", source.to_str().unwrap()])
        .output()
        .expect("failed to run vm64-asm");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: line 2: wrong number of operands"));
}

#[test]
fn build_writes_listing_and_symbols() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(
        temp_dir.path(),
        "listed.asm",
        ".org 0x40\nentry: NOP\nHLT\n",
    );

    let output = temp_dir.path().join("listed.bin");
    let listing = temp_dir.path().join("listed.lst");

    let result = Command::new(binary_path())
        .args([
            "build",
            source.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--listing",
            listing.to_str().unwrap(),
            "--symbols",
        ])
        .output()
        .expect("failed to run vm64-asm");

    assert!(result.status.success());
    let listing = fs::read_to_string(&listing).unwrap();
    assert!(listing.contains("00000042  FF FF "));
    assert!(listing.lines().any(|row| row.ends_with("    3  HLT")));
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("00000040  entry"));
    assert!(stdout.contains("4 bytes at origin 0x40"));
}

#[test]
fn help_shows_usage() {
    let result = Command::new(binary_path())
        .args(["--help"])
        .output()
        .expect("failed to run vm64-asm");

    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("Commands:"));
    assert!(stdout.contains("build"));
}

#[test]
fn unknown_command_fails() {
    let result = Command::new(binary_path())
        .args(["unknown"])
        .output()
        .expect("failed to run vm64-asm");

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("unknown command"));
}

const SUM_AND_DOUBLE: &str = "\
; sum 1..5 into R2, then double it through a call
        LDI R1, 5
        LDI R2, 0
loop:   ADD R2, R1
        SUBI R1, 1
        JNE loop
        PUSHI 0
        CALL double
        HLT

double: TF ACC, R2
        ADD ACC, R2
        ST ACC, result
        RTC

result: .qword 0
";

#[test]
fn assembled_binary_runs_on_the_core() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "sum.asm", SUM_AND_DOUBLE);
    let output = temp_dir.path().join("sum.bin");

    let status = Command::new(binary_path())
        .args([
            "build",
            source.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .status()
        .expect("failed to run vm64-asm");
    assert!(status.success());

    let binary = fs::read(&output).unwrap();
    let mut bus = MemoryBus::new();
    bus.map(Box::new(Memory::new(0x1000)), 0, 0xfff, true)
        .unwrap();
    bus.load(0, &binary).unwrap();
    let config = CoreConfig {
        initial_stack_pointer: 0xff8,
        ..CoreConfig::default()
    };
    let mut cpu = Cpu::new(bus, config).unwrap();

    cpu.run().unwrap();

    assert_eq!(cpu.register(Register::R2).unwrap(), 15);
    assert_eq!(cpu.register(Register::Acc).unwrap(), 30);
    let result_address = binary.len() as u64 - 8;
    assert_eq!(cpu.bus().read64(result_address).unwrap(), 30);
}
