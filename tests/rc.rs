// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

use pcr_tools::{
    mocktpm::{rc_handle, rc_parameter},
    rc::{TssBase, TssLayer, TssRc},
};
use rstest::rstest;
use tpm2_protocol::data::{TpmRc, TpmRcBase};

#[rstest]
#[case(TssRc::tcti(TssBase::IoError), "tcti:IO failure")]
#[case(
    TssRc::tcti(TssBase::NoConnection),
    "tcti:Fails to connect to next lower layer"
)]
#[case(
    TssRc::esapi(TssBase::BadSequence),
    "esapi:Function called in the wrong order"
)]
#[case(
    TssRc::esapi(TssBase::GeneralFailure),
    "esapi:Catch all for all errors not otherwise specified"
)]
#[case(TssRc::esapi(TssBase::MalformedResponse), "esapi:Response is malformed")]
fn test_rc_stack_display(#[case] rc: TssRc, #[case] expected: &str) {
    assert_eq!(rc.to_string(), expected);
}

#[rstest]
#[case(TpmRc::from(TpmRcBase::Value))]
#[case(rc_parameter(TpmRcBase::Value, 1))]
#[case(rc_handle(TpmRcBase::Value, 1))]
#[case(rc_parameter(TpmRcBase::Size, 1))]
fn test_rc_tpm_display(#[case] rc: TpmRc) {
    let tss = TssRc::from(rc);
    assert_eq!(tss, TssRc::Tpm(rc));
    assert_eq!(tss.to_string(), rc.to_string());
    assert!(!tss.to_string().is_empty());
}

#[test]
fn test_rc_layers() {
    assert_eq!(
        TssRc::esapi(TssBase::BadSize),
        TssRc::Stack(TssLayer::Esapi, TssBase::BadSize)
    );
    assert_ne!(
        TssRc::esapi(TssBase::IoError),
        TssRc::tcti(TssBase::IoError)
    );
}

#[test]
fn test_rc_position() {
    assert_ne!(
        rc_parameter(TpmRcBase::Value, 1),
        rc_handle(TpmRcBase::Value, 1)
    );
    assert!(!rc_parameter(TpmRcBase::Value, 1).is_warning());
}
