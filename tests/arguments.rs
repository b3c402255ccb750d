// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

use pcr_tools::{
    arguments::{DumpArgs, ExtendArgs},
    device::DEFAULT_DEVICE,
    CliError,
};
use rstest::rstest;
use std::path::PathBuf;

#[rstest]
#[case(&["-p", "16"], Some(16), false)]
#[case(&["--pcr", "0"], Some(0), false)]
#[case(&["--pcr=23", "-v"], Some(23), true)]
#[case(&["-p7", "--verbose"], Some(7), true)]
#[case(&["-v"], None, true)]
#[case(&[], None, false)]
fn test_dump_args_valid(#[case] argv: &[&str], #[case] pcr: Option<u32>, #[case] verbose: bool) {
    let args = DumpArgs::parse_from(argv).unwrap();
    assert_eq!(args.pcr, pcr);
    assert_eq!(args.pcr_set(), pcr.is_some());
    assert_eq!(args.verbose, verbose);
    assert_eq!(args.device, PathBuf::from(DEFAULT_DEVICE));
}

#[rstest]
#[case(&["-p"])]
#[case(&["-p", "abc"])]
#[case(&["-p", "-1"])]
#[case(&["-p", "0x10"])]
#[case(&["--pcr="])]
fn test_dump_args_unparseable_pcr(#[case] argv: &[&str]) {
    let args = DumpArgs::parse_from(argv).unwrap();
    assert_eq!(args.pcr, None);
    assert!(!args.pcr_set());
}

#[test]
fn test_dump_args_unparseable_pcr_keeps_previous() {
    let args = DumpArgs::parse_from(["-p", "5", "-p", "abc"]).unwrap();
    assert_eq!(args.pcr, Some(5));
}

#[rstest]
#[case(&["--file", "x"], "extend only")]
#[case(&["--bogus"], "unknown option")]
#[case(&["16"], "stray value")]
fn test_dump_args_invalid(#[case] argv: &[&str], #[case] _reason: &str) {
    assert!(
        matches!(DumpArgs::parse_from(argv), Err(CliError::Usage(_))),
        "parsing should fail for: {argv:?}"
    );
}

#[rstest]
#[case(&["-h"])]
#[case(&["-p", "1", "--help"])]
fn test_dump_args_help(#[case] argv: &[&str]) {
    assert!(matches!(DumpArgs::parse_from(argv), Err(CliError::Help)));
}

#[test]
fn test_dump_args_version() {
    assert!(matches!(
        DumpArgs::parse_from(["-V"]),
        Err(CliError::Version)
    ));
}

#[test]
fn test_extend_args() {
    let args =
        ExtendArgs::parse_from(["-f", "/tmp/data", "-p", "16", "-d", "/dev/tpm0"]).unwrap();
    assert_eq!(args.file, Some(PathBuf::from("/tmp/data")));
    assert_eq!(args.pcr, Some(16));
    assert_eq!(args.device, PathBuf::from("/dev/tpm0"));
    assert!(!args.verbose);

    let args = ExtendArgs::parse_from(["-p", "3"]).unwrap();
    assert_eq!(args.file, None);
}

#[test]
fn test_extend_args_unparseable_pcr() {
    let args = ExtendArgs::parse_from(["-f", "data.bin", "-p", "sixteen"]).unwrap();
    assert_eq!(args.pcr, None);
    assert_eq!(args.file, Some(PathBuf::from("data.bin")));
}

#[test]
fn test_extend_args_dump() {
    let args = ExtendArgs::parse_from(["-f", "data.bin", "-p", "16", "-v"]).unwrap();
    let mut out = Vec::new();
    args.dump(&mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "User provided options:\n  file: data.bin\n  pcr:  16\n  pcr_set: true\n  verbose: true\n"
    );
}

#[test]
fn test_dump_args_dump_unset() {
    let args = DumpArgs::parse_from(["-v"]).unwrap();
    let mut out = Vec::new();
    args.dump(&mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "User provided options:\n  pcr:  (none)\n  pcr_set: false\n  verbose: true\n"
    );
}

#[test]
fn test_dump_args_dump_unparseable() {
    let args = DumpArgs::parse_from(["-v", "-p", "abc"]).unwrap();
    let mut out = Vec::new();
    args.dump(&mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "User provided options:\n  pcr:  (none)\n  pcr_set: false\n  verbose: true\n"
    );
}

#[test]
fn test_help_lists_options() {
    let help = ExtendArgs::help();
    for option in ["--file <FILE>", "--pcr <0-PCR_MAX>", "--verbose", "--device <DEVICE>"] {
        assert!(help.contains(option), "missing {option} in:\n{help}");
    }
    assert!(!DumpArgs::help().contains("--file"));
}
