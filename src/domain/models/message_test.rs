use anyhow::Result;

use super::Message;
use super::Role;

#[test]
fn it_drops_empty_attachments() {
    let msg = Message::user("Hello", vec![]);
    assert_eq!(msg.role, Role::User);
    assert!(msg.images.is_none());
    assert!(msg.images().is_empty());

    let msg = Message::user("", vec!["data:image/png;base64,AAAA".to_string()]);
    assert_eq!(msg.images().len(), 1);
}

#[test]
fn it_creates_streaming_placeholder() {
    let msg = Message::placeholder("mistral");
    assert_eq!(msg.role, Role::Assistant);
    assert!(msg.content.is_empty());
    assert!(msg.is_streaming);
    assert_eq!(msg.model, Some("mistral".to_string()));
}

#[test]
fn it_appends_text() {
    let mut msg = Message::placeholder("openai");
    msg.append("Hel");
    msg.append("lo");
    assert_eq!(msg.content, "Hello");
}

#[test]
fn it_serializes_roles_lowercase() -> Result<()> {
    let mut msg = Message::new(Role::Assistant, "Hi");
    msg.id = "abc".to_string();

    let res = serde_json::to_string(&msg)?;
    insta::assert_snapshot!(res, @r###"{"id":"abc","role":"assistant","content":"Hi","isStreaming":false}"###);

    return Ok(());
}

#[test]
fn it_deserializes_without_optional_fields() -> Result<()> {
    let msg: Message = serde_json::from_str(r#"{"id":"1","role":"user","content":"Hey"}"#)?;
    assert_eq!(msg.role, Role::User);
    assert!(!msg.is_streaming);
    assert!(msg.model.is_none());

    return Ok(());
}
