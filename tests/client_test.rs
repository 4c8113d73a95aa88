use flockmem::node::serve;
use flockmem::*;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_session_tracks_highest_sequence() {
    let mut session = Session::new();
    let address = Address::new(3);
    assert_eq!(session.known_sequence(address), 0);

    session.observe(address, 4);
    session.observe(address, 2);
    assert_eq!(session.known_sequence(address), 4);
    assert_eq!(session.known_sequence(Address::new(9)), 0);
    assert_eq!(session.len(), 1);
}

#[test]
fn test_parse_command() {
    assert_eq!(parse_command("   "), Ok(None));
    assert_eq!(
        parse_command("read 12"),
        Ok(Some(Command::Read {
            address: Address::new(12)
        }))
    );
    assert_eq!(
        parse_command("WRITE 3  -42"),
        Ok(Some(Command::Write {
            address: Address::new(3),
            value: -42
        }))
    );
    assert!(parse_command("read").is_err());
    assert!(parse_command("read x").is_err());
    assert!(parse_command("write 3").is_err());
    assert!(parse_command("write 3 abc").is_err());
    assert!(parse_command("delete 3").is_err());
    assert!(parse_command("read -1").is_err());
}

#[test]
fn test_client_requires_entry_node() {
    let transport = LocalTransport::new();
    let result = DsmClient::new(
        Arc::new(transport.clone()),
        transport.client_registry("client"),
        vec![],
        Duration::from_secs(1),
    );
    assert!(matches!(result, Err(DsmError::Configuration(_))));
}

#[tokio::test]
async fn test_run_script() {
    let transport = LocalTransport::new();
    let doc = ClusterDocument::generate(100, 1, vec!["A".into(), "B".into()]).unwrap();
    for name in ["A", "B"] {
        let rx = transport.subscribe(name);
        let node = Arc::new(DsmNode::from_document(name, &doc, Arc::new(transport.clone())).unwrap());
        serve(node, rx);
    }

    let client = DsmClient::new(
        Arc::new(transport.clone()),
        transport.client_registry("client"),
        vec!["A".into(), "B".into()],
        Duration::from_secs(2),
    )
    .unwrap();

    let script = "write 10 5\n\nread 10\nbogus line\nwrite 10 6\nread 10\n";
    let mut session = Session::new();
    let outcomes = client.run_script(&mut session, script).await;

    assert_eq!(outcomes.len(), 5);
    assert_eq!(
        outcomes[0],
        ScriptOutcome::Wrote {
            address: Address::new(10),
            value: 5,
            sequence: 1
        }
    );
    assert_eq!(
        outcomes[1],
        ScriptOutcome::Read {
            address: Address::new(10),
            value: 5
        }
    );
    assert!(matches!(outcomes[2], ScriptOutcome::Skipped { .. }));
    assert_eq!(
        outcomes[4],
        ScriptOutcome::Read {
            address: Address::new(10),
            value: 6
        }
    );
    assert_eq!(session.known_sequence(Address::new(10)), 2);
}

#[tokio::test]
async fn test_send_to_unknown_entry_fails_fast() {
    let transport = LocalTransport::new();
    let client = DsmClient::new(
        Arc::new(transport.clone()),
        transport.client_registry("client"),
        vec!["Ghost".into()],
        Duration::from_secs(5),
    )
    .unwrap();

    let mut session = Session::new();
    let err = client.read(&mut session, Address::new(0)).await.unwrap_err();
    assert!(matches!(err, DsmError::Transport(_)));
    assert_eq!(client.registry().pending(), 0);
}
