use serde_json::Value;
use serde_json::json;

use crate::*;

/// Output recorded from the reference kernel for the standard request.
const REFERENCE_RESPONSE: &str = "{\"A__db\":[126.46085394936013,163.0815203486053,236.28197179677775,268.19292392138044,295.0633534171327,323.82517691745284],\"A_a__db\":0,\"A_fs__db\":[126.425056055803,157.56187253649026,163.55576213633907,167.04435177821983,169.5660332409185,171.5603915860845],\"ModeOfPropagation\":[1,1,3,3,3,3],\"d__km\":[0.0,360.0008519649057,720.0,1080.0,1440.0,1800.0],\"theta_h1__rad\":0,\"warnings\":0}";

fn to_value(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

// ============================================================================
//  WIRE SHAPE
// ============================================================================

#[test]
fn test_call_wire_shape() {
    let call = CallMessage::new(7, vec!["calc".into()], vec![json!("{}")]);
    let bytes = call.encode().unwrap();

    assert_eq!(
        to_value(&bytes),
        json!({"kind": "call", "id": 7, "path": ["calc"], "args": ["{}"]})
    );
}

#[test]
fn test_success_wire_shape() {
    let bytes = ResultMessage::success(3, json!("ok")).encode().unwrap();

    assert_eq!(
        to_value(&bytes),
        json!({"kind": "result", "id": 3, "result": {"status": "success", "value": "ok"}})
    );
}

#[test]
fn test_failure_wire_shape() {
    let reason = FailureReason::MethodNotFound("nope".into());
    let bytes = ResultMessage::failure(4, reason).encode().unwrap();

    assert_eq!(
        to_value(&bytes),
        json!({
            "kind": "result",
            "id": 4,
            "result": {
                "status": "failure",
                "value": {"kind": "MethodNotFound", "message": "nope"}
            }
        })
    );
}

#[test]
fn test_failure_reason_survives_the_wire() {
    let reason = FailureReason::InvocationError("kernel exploded".into());
    let bytes = ResultMessage::failure(9, reason.clone()).encode().unwrap();

    let decoded = decode_result(&bytes).unwrap();
    assert_eq!(decoded.id, 9);
    assert_eq!(decoded.into_result(), Err(reason));
}

#[test]
fn test_large_ids_are_preserved() {
    let bytes = ResultMessage::success(u64::MAX, Value::Null).encode().unwrap();
    assert_eq!(decode_result(&bytes).unwrap().id, u64::MAX);
}

// ============================================================================
//  DIRECTION CHECKS
// ============================================================================

#[test]
fn test_decode_result_rejects_call() {
    let bytes = CallMessage::new(1, vec!["calc".into()], vec![]).encode().unwrap();
    let err = decode_result(&bytes).unwrap_err();
    assert!(matches!(err, RpcError::ProtocolViolation(_)));
}

#[test]
fn test_decode_call_rejects_result() {
    let bytes = ResultMessage::success(1, Value::Null).encode().unwrap();
    let err = decode_call(&bytes).unwrap_err();
    assert!(matches!(err, RpcError::ProtocolViolation(_)));
}

#[test]
fn test_garbage_is_a_serialization_error() {
    let err = Message::decode(b"not json").unwrap_err();
    assert!(matches!(err, RpcError::Serialization(_)));
}

#[test]
fn test_unknown_kind_is_rejected() {
    let err = Message::decode(br#"{"kind":"ping","id":1}"#).unwrap_err();
    assert!(matches!(err, RpcError::Serialization(_)));
}

// ============================================================================
//  ID RECOVERY
// ============================================================================

#[test]
fn test_recover_id_from_malformed_call() {
    // `path` has the wrong type, so this is not a valid call.
    let bytes = br#"{"kind":"call","id":42,"path":"calc","args":[]}"#;
    assert!(decode_call(bytes).is_err());
    assert_eq!(recover_id(bytes), Some(42));
}

#[test]
fn test_recover_id_gives_up() {
    assert_eq!(recover_id(b"\x00\x01"), None);
    assert_eq!(recover_id(br#"{"kind":"call"}"#), None);
    assert_eq!(recover_id(br#"{"id":"seven"}"#), None);
}

// ============================================================================
//  PATHS
// ============================================================================

#[test]
fn test_method_requires_single_segment() {
    let direct = CallMessage::new(1, vec!["calc".into()], vec![]);
    assert_eq!(direct.method(), Some("calc"));

    let nested = CallMessage::new(2, vec!["kernel".into(), "calc".into()], vec![]);
    assert_eq!(nested.method(), None);
    assert_eq!(nested.target(), "kernel.calc");

    let empty = CallMessage::new(3, vec![], vec![]);
    assert_eq!(empty.method(), None);
}

// ============================================================================
//  KERNEL SCHEMA
// ============================================================================

#[test]
fn test_reference_response_parses() {
    let response: P528Response = serde_json::from_str(REFERENCE_RESPONSE).unwrap();

    assert_eq!(response.warnings, 0);
    assert_eq!(response.d__km.len(), 6);
    assert_eq!(response.d__km[0], 0.0);
    assert_eq!(response.mode_of_propagation, vec![1, 1, 3, 3, 3, 3]);
    assert_eq!(response.A__db.len(), response.A_fs__db.len());
    assert!(!response.is_error());
}

#[test]
fn test_error_response_parses() {
    let response: P528Response =
        serde_json::from_str(r#"{"error":"std::exception: type must be number"}"#).unwrap();

    assert!(response.is_error());
    assert!(response.A__db.is_empty());
}

#[test]
fn test_request_field_names() {
    let request = P528Request {
        h_1__user_units: 5.0,
        h_2__user_units: 10000.0,
        time: 50.0,
        polarization: 0,
        f__mhz: 5000.0,
        nbr_of_points: 5,
    };

    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["Polarization"], json!(0));
    assert_eq!(value["nbr_of_points"], json!(5));
    assert_eq!(value["h_2__user_units"], json!(10000.0));
    assert!(value.get("polarization").is_none());
}
