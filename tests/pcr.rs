// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

use pcr_tools::{
    arguments::{DumpArgs, ExtendArgs},
    mocktpm::{rc_handle, Call, MockStack},
    print::parse_dump,
    rc::TssRc,
    run_dump, run_extend, CliError,
};
use rstest::rstest;
use sha1::{Digest, Sha1};
use std::{ffi::OsString, io::Write, path::Path};
use tempfile::NamedTempFile;
use tpm2_protocol::data::TpmRcBase;

const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

fn data_file(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

fn extend_args(path: &Path, pcr: Option<&str>) -> ExtendArgs {
    let mut argv = vec![OsString::from("-f"), path.as_os_str().to_owned()];
    if let Some(pcr) = pcr {
        argv.extend(["-p".into(), pcr.into()]);
    }
    ExtendArgs::parse_from(argv).unwrap()
}

#[test]
fn test_dump_without_pcr() {
    let mut stack = MockStack::new();
    let mut out = Vec::new();
    let err = run_dump(&DumpArgs::default(), &mut stack, &mut out).unwrap_err();
    assert!(matches!(&err, CliError::Usage(msg) if msg == "No PCR provided."));
    assert_eq!(stack.total_calls(), 0);
    assert!(out.is_empty());
}

#[test]
fn test_extend_without_pcr() {
    let file = data_file(b"data");
    let args = extend_args(file.path(), None);
    let mut stack = MockStack::new();
    let err = run_extend(&args, &mut stack, &mut Vec::new()).unwrap_err();
    assert!(matches!(err, CliError::Usage(_)));
    assert_eq!(stack.total_calls(), 0);
}

#[test]
fn test_verbose_dump_precedes_pcr_check() {
    let args = DumpArgs::parse_from(["-v"]).unwrap();
    let mut out = Vec::new();
    let err = run_dump(&args, &mut MockStack::new(), &mut out).unwrap_err();
    assert!(matches!(err, CliError::Usage(_)));
    assert!(String::from_utf8(out).unwrap().starts_with("User provided options:\n"));
}

#[rstest]
#[case(0)]
#[case(7)]
#[case(23)]
fn test_dump_pcr(#[case] index: u32) {
    let pcr = index.to_string();
    let args = DumpArgs::parse_from(["-p", pcr.as_str()]).unwrap();
    let mut stack = MockStack::new();
    let mut out = Vec::new();
    run_dump(&args, &mut stack, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(out, format!("{}\n", "00 ".repeat(20)));
    assert_eq!(stack.calls(Call::PcrRead), 1);
    assert_eq!(stack.open_contexts(), 0);
}

#[test]
fn test_dump_unimplemented_pcr() {
    let args = DumpArgs::parse_from(["-p", "99"]).unwrap();
    let mut stack = MockStack::new();
    let mut out = Vec::new();
    let err = run_dump(&args, &mut stack, &mut out).unwrap_err();
    let err = match err {
        CliError::Session(err) => err,
        other => panic!("expected a session error, got {other:?}"),
    };
    let rc = stack.tpm.pcr_read(99).unwrap_err();
    assert_eq!(err.rc, TssRc::Tpm(rc));
    assert_eq!(err.message, rc.to_string());
    assert!(err.to_string().starts_with("Failed to read PCR 99: "));
    assert!(out.is_empty());
    assert_eq!(stack.calls(Call::FreeMemory), 1);
    assert_eq!(stack.calls(Call::CloseContext), 1);
}

#[test]
fn test_extend_empty_file() {
    let file = data_file(b"");
    let mut stack = MockStack::new();
    let mut out = Vec::new();
    run_extend(&extend_args(file.path(), Some("16")), &mut stack, &mut out).unwrap();

    let empty = hex::decode(EMPTY_SHA1).unwrap();
    assert_eq!(stack.extends(), &[(16, empty.clone())]);

    let expected = Sha1::new()
        .chain_update([0u8; 20])
        .chain_update(&empty)
        .finalize()
        .to_vec();
    assert_eq!(stack.tpm.pcr(16), Some(expected.as_slice()));

    let out = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "Current value for PCR 16:");
    assert_eq!(parse_dump(lines[1].trim_start()).unwrap(), vec![0; 20]);
    assert_eq!(lines[2], "Extending PCR 16 with data:");
    assert_eq!(parse_dump(lines[3].trim_start()).unwrap(), empty);
    assert_eq!(lines[4], "New state for PCR 16:");
    assert_eq!(parse_dump(lines[5].trim_start()).unwrap(), expected);
}

#[test]
fn test_extend_twice_chains() {
    let file = data_file(b"measured boot");
    let digest = Sha1::digest(b"measured boot").to_vec();
    let mut stack = MockStack::new();
    for _ in 0..2 {
        run_extend(&extend_args(file.path(), Some("8")), &mut stack, &mut Vec::new()).unwrap();
    }
    let once = Sha1::new().chain_update([0u8; 20]).chain_update(&digest).finalize();
    let twice = Sha1::new().chain_update(once).chain_update(&digest).finalize();
    assert_eq!(stack.tpm.pcr(8), Some(twice.as_slice()));
    assert_eq!(stack.extends().len(), 2);
    assert_eq!(stack.open_contexts(), 0);
}

#[test]
fn test_extend_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing");
    let args = extend_args(&path, Some("1"));
    let mut stack = MockStack::new();
    let err = run_extend(&args, &mut stack, &mut Vec::new()).unwrap_err();
    assert!(matches!(&err, CliError::File(name, _) if name.ends_with("missing")));
    assert_eq!(stack.total_calls(), 0);
}

#[test]
fn test_extend_failure_tears_down() {
    let file = data_file(b"x");
    let rc = TssRc::Tpm(rc_handle(TpmRcBase::Value, 1));
    let mut stack = MockStack::new().fail(Call::PcrExtend, rc);
    let mut out = Vec::new();
    let err = run_extend(&extend_args(file.path(), Some("3")), &mut stack, &mut out).unwrap_err();
    let err = match err {
        CliError::Session(err) => err,
        other => panic!("expected a session error, got {other:?}"),
    };
    assert_eq!(err.rc, rc);
    assert!(err.to_string().starts_with("Failed to extend PCR 3: "));
    assert_eq!(stack.tpm.pcr(3), Some([0u8; 20].as_slice()));
    assert_eq!(stack.calls(Call::FreeMemory), 1);
    assert_eq!(stack.calls(Call::CloseContext), 1);
    assert!(!String::from_utf8(out).unwrap().contains("New state"));
}
