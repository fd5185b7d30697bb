//! Integration tests for the argument relay codec

use ::common::relay::{self, CopyData, CopyDataKind, RelayError};

fn round_trip(args: &[&str]) {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let message = relay::encode_args(&args).unwrap();
    assert_eq!(
        CopyDataKind::from_raw(message.kind),
        Some(CopyDataKind::SecondInstanceLaunched)
    );
    assert_eq!(relay::decode_args(&message).unwrap(), args);
}

#[test]
fn test_round_trip_preserves_order_and_contents() {
    round_trip(&[]);
    round_trip(&[""]);
    round_trip(&["C:\\Program Files\\MergeFSMC\\mergefsmc.exe", "D:\\cfg\\a.mfcfg"]);
    round_trip(&["日本語\\設定.mfcfg", "Ünïcödé", "emoji 🗂️", "quote \" and \\ slash"]);
    round_trip(&["b", "a", "b", "a"]);
}

#[test]
fn test_payload_is_utf8_json() {
    let message = relay::encode_args(&["é".to_string()]).unwrap();
    let text = std::str::from_utf8(&message.payload).unwrap();
    let parsed: Vec<String> = serde_json::from_str(text).unwrap();
    assert_eq!(parsed, vec!["é"]);
}

#[test]
fn test_foreign_payloads_are_rejected() {
    let cases = [
        (1, b"".to_vec()),
        (1, b"[\"unterminated".to_vec()),
        (1, b"[null]".to_vec()),
        (0, b"[]".to_vec()),
        (2, b"[\"a\"]".to_vec()),
    ];
    for (kind, payload) in cases {
        let result = relay::decode_args(&CopyData { kind, payload });
        match kind {
            1 => assert!(matches!(result, Err(RelayError::Malformed(_)))),
            _ => assert!(matches!(result, Err(RelayError::UnknownKind(k)) if k == kind)),
        }
    }
}
