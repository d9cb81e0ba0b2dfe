use render_link_protocol::{
    decode_client_message, decode_server_message, encode_client_message, encode_server_message,
    ClientMessage, Limits, RenderLoopCancel, ServerMessage, StateData, PROTOCOL_VERSION,
};
use serde::Deserialize;
use serde_json::Value;

const VECTORS_JSON: &str = include_str!("fixtures/render-link-v1.json");

#[derive(Debug, Deserialize)]
struct RootVectors {
    version: u32,
    client: Vec<Vector>,
    server: Vec<Vector>,
}

#[derive(Debug, Deserialize)]
struct Vector {
    name: String,
    json: Value,
}

fn load() -> RootVectors {
    let root: RootVectors = serde_json::from_str(VECTORS_JSON).expect("parse vectors");
    assert_eq!(root.version, PROTOCOL_VERSION);
    root
}

#[test]
fn client_vectors_decode_and_reencode_to_the_same_json() {
    let limits = Limits::default();
    for vector in load().client {
        let text = vector.json.to_string();
        let msg = decode_client_message(&text, &limits)
            .unwrap_or_else(|err| panic!("{}: {err}", vector.name));
        let encoded = encode_client_message(&msg, &limits).unwrap();
        let reparsed: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(reparsed, vector.json, "vector {}", vector.name);
    }
}

#[test]
fn server_vectors_decode_and_reencode_to_the_same_json() {
    let limits = Limits::default();
    for vector in load().server {
        let text = vector.json.to_string();
        let msg = decode_server_message(&text, &limits)
            .unwrap_or_else(|err| panic!("{}: {err}", vector.name));
        let encoded = encode_server_message(&msg, &limits).unwrap();
        let reparsed: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(reparsed, vector.json, "vector {}", vector.name);
    }
}

#[test]
fn render_loop_batch_vector_decodes_to_expected_fields() {
    let root = load();
    let vector = root
        .client
        .iter()
        .find(|v| v.name == "render_loop_batch")
        .expect("render_loop_batch vector");
    let ClientMessage::Batch(batch) =
        decode_client_message(&vector.json.to_string(), &Limits::default()).unwrap()
    else {
        panic!("expected a batch");
    };

    assert_eq!(batch.batch_id, 12);
    assert!(batch.wait_for_render);
    assert_eq!(
        batch.state,
        StateData::RenderLoop {
            render_loop_name: "viewport".into(),
            cancel: RenderLoopCancel::CancelAndRestart,
            continue_on_error: false,
        }
    );
    assert_eq!(batch.commands.len(), 3);
    assert_eq!(batch.response_ids().collect::<Vec<_>>(), vec![40, 41]);
}

#[test]
fn partial_failure_vector_keeps_both_outcomes() {
    let root = load();
    let vector = root
        .server
        .iter()
        .find(|v| v.name == "partial_failure")
        .expect("partial_failure vector");
    let ServerMessage::BatchResponse { responses, .. } =
        decode_server_message(&vector.json.to_string(), &Limits::default()).unwrap()
    else {
        panic!("expected a batch response");
    };

    let outcomes: Vec<_> = responses.into_iter().map(|r| r.into_result()).collect();
    assert!(outcomes[0].is_ok());
    assert_eq!(outcomes[1].as_ref().unwrap_err().code, -32602);
}

#[test]
fn decoding_a_batch_with_duplicate_ids_fails() {
    let text = r#"{"type":"batch","batch_id":1,"state":{"kind":"session"},"commands":[{"method":"a","id":1},{"method":"b","id":1}]}"#;
    assert!(decode_client_message(text, &Limits::default()).is_err());
}
