use flockmem::*;

#[test]
fn test_write_message_wire_fields() {
    let msg = DsmMessage::write(Address::new(3), 42, Some("client:1".to_string()), 0);
    let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

    assert_eq!(json["type"], "WRITE");
    assert_eq!(json["address"]["value"], 3);
    assert_eq!(json["value"], "42");
    assert_eq!(json["replyToQueue"], "client:1");
    assert_eq!(json["sequenceNumber"], 0);
}

#[test]
fn test_replicate_origin_travels_in_reply_field() {
    let msg = DsmMessage::replicate(Address::new(7), "9".to_string(), "NodeA".to_string(), 5);
    let encoded = msg.to_json().unwrap();
    let json: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(json["type"], "REPLICATE");
    assert_eq!(json["replyToQueue"], "NodeA");

    let decoded = DsmMessage::from_json(encoded.as_bytes()).unwrap();
    assert_eq!(decoded.origin.as_deref(), Some("NodeA"));
    assert!(decoded.reply_to.is_none());
    assert_eq!(decoded, msg);
}

#[test]
fn test_replicate_ack_kind_name() {
    let msg = DsmMessage::replicate_ack(Address::new(1), "NodeB".to_string(), 2);
    let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
    assert_eq!(json["type"], "REPLICATE_ACK");
    assert!(json["value"].is_null());
}

#[test]
fn test_read_reply_field_maps_to_client_endpoint() {
    let raw = br#"{"type":"READ","address":{"value":4},"value":null,"replyToQueue":"c:9"}"#;
    let msg = DsmMessage::from_json(raw).unwrap();
    assert_eq!(msg.kind, MessageKind::Read);
    assert_eq!(msg.reply_to.as_deref(), Some("c:9"));
    assert!(msg.origin.is_none());
    assert_eq!(msg.sequence, 0);
}

#[test]
fn test_negative_address_rejected() {
    let raw = br#"{"type":"READ","address":{"value":-1},"value":null,"replyToQueue":null}"#;
    assert!(DsmMessage::from_json(raw).is_err());
}

#[test]
fn test_negative_sequence_number_rejected() {
    let raw = br#"{"type":"REPLICATE","address":{"value":2},"value":"5","replyToQueue":"A","sequenceNumber":-3}"#;
    assert!(matches!(DsmMessage::from_json(raw), Err(DsmError::Decode(_))));

    let raw = br#"{"type":"REPLICATE","address":{"value":2},"value":"5","replyToQueue":"A","sequenceNumber":3}"#;
    assert_eq!(DsmMessage::from_json(raw).unwrap().sequence, 3);
}

#[test]
fn test_parse_value() {
    let msg = DsmMessage::write(Address::new(0), -17, None, 0);
    assert_eq!(msg.parse_value().unwrap(), -17);

    let mut bad = msg.clone();
    bad.value = Some("forty-two".to_string());
    assert!(matches!(bad.parse_value(), Err(DsmError::Protocol(_))));

    bad.value = None;
    assert!(matches!(bad.parse_value(), Err(DsmError::Protocol(_))));
}

#[test]
fn test_address_equality_by_value() {
    assert_eq!(Address::new(5), Address::from(5));
    assert_ne!(Address::new(5), Address::new(6));
    assert_eq!(Address::new(12).to_string(), "12");
}

#[test]
fn test_reply_serialization() {
    let reply = Reply::WriteAck {
        address: Address::new(3),
        sequence: 1,
    };
    let json = serde_json::to_value(&reply).unwrap();
    assert_eq!(json["kind"], "write_ack");
    let back: Reply = serde_json::from_value(json).unwrap();
    assert_eq!(back, reply);
    assert_eq!(back.address(), Address::new(3));
}
