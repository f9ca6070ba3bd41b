use super::SlashCommand;

#[test]
fn it_parse_empty_string() {
    let text = "";
    assert!(SlashCommand::parse(text).is_none());
}

#[test]
fn it_parse_space_only() {
    let text = " ";
    assert!(SlashCommand::parse(text).is_none());
}

#[test]
fn it_parse_single_slash() {
    let text = "/";
    assert!(SlashCommand::parse(text).is_none());
}

#[test]
fn it_parse_invalid_prefix() {
    let text = "!q";
    assert!(SlashCommand::parse(text).is_none());
}

#[test]
fn it_parse_plain_text() {
    assert!(SlashCommand::parse("what is /quit for?").is_none());
}

#[test]
fn it_parse_valid_prefix() {
    let text = "/q";
    let cmd = SlashCommand::parse(text);
    assert!(cmd.is_some());
    assert_eq!(cmd.unwrap().command, "/q");
}

#[test]
fn it_is_short_quit() {
    let cmd = SlashCommand::parse("/q").unwrap();
    assert!(cmd.is_quit());
}

#[test]
fn it_is_quit() {
    let cmd = SlashCommand::parse("/quit").unwrap();
    assert!(cmd.is_quit());
}

#[test]
fn it_is_model_set() {
    let cmd = SlashCommand::parse("/model  mistral").unwrap();
    assert!(cmd.is_model_set());
    assert_eq!(cmd.args, vec!["mistral".to_string()]);
    assert_eq!(cmd.rest(), "mistral");
}

#[test]
fn it_is_model_list() {
    let cmd = SlashCommand::parse("/models").unwrap();
    assert!(cmd.is_model_list());
    assert!(cmd.args.is_empty());
}

#[test]
fn it_keeps_system_text_intact() {
    let cmd = SlashCommand::parse("/system You are  a pirate. ").unwrap();
    assert!(cmd.is_system());
    assert_eq!(cmd.rest(), "You are  a pirate.");
}

#[test]
fn it_requires_rename_title() {
    assert!(SlashCommand::parse("/rename").is_none());
    let cmd = SlashCommand::parse("/rename Rust questions").unwrap();
    assert!(cmd.is_rename());
    assert_eq!(cmd.rest(), "Rust questions");
}

#[test]
fn it_requires_attach_path() {
    assert!(SlashCommand::parse("/attach").is_none());
    assert!(SlashCommand::parse("/a ./cat.png").unwrap().is_attach());
}

#[test]
fn it_parses_edit_index_and_text() {
    let cmd = SlashCommand::parse("/edit 3 What about  Go?").unwrap();
    assert!(cmd.is_edit());
    assert_eq!(cmd.index_and_text(), Some((2, "What about  Go?".to_string())));
}

#[test]
fn it_rejects_zero_index() {
    let cmd = SlashCommand::parse("/switch 0").unwrap();
    assert!(cmd.is_switch());
    assert_eq!(cmd.index_and_text(), None);
}

#[test]
fn it_rejects_missing_index() {
    let cmd = SlashCommand::parse("/delete").unwrap();
    assert!(cmd.is_delete());
    assert_eq!(cmd.index_and_text(), None);
}

#[test]
fn it_is_regenerate() {
    assert!(SlashCommand::parse("/regen").unwrap().is_regenerate());
    assert!(SlashCommand::parse("/r").unwrap().is_regenerate());
}

#[test]
fn it_is_detach() {
    let cmd = SlashCommand::parse("/detach").unwrap();
    assert!(cmd.is_detach());
    assert!(!cmd.is_attach());
    assert_eq!(cmd.index_and_text(), None);

    let cmd = SlashCommand::parse("/detach 2").unwrap();
    assert!(cmd.is_detach());
    assert_eq!(cmd.index_and_text(), Some((1, "".to_string())));
}
