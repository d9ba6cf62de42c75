//! Tests for client, node, role and data bag services

mod common;

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use common::{quiet_store, ui_with, MockConsole, MockEditor, MockRest};
use knife::application::services::{ClientService, DataBagService, NodeService, ObjectStore, RoleService};
use knife::application::{ApplicationError, UiOptions};
use knife::infrastructure::traits::RealFileSystem;
use knife::util::testing::capture_logs;

fn data_bags(rest: &Arc<MockRest>, repo_root: &std::path::Path) -> DataBagService {
    DataBagService::new(
        quiet_store(rest.clone(), MockConsole::new()),
        Arc::new(RealFileSystem),
        repo_root.to_path_buf(),
    )
}

// ============================================================
// Clients
// ============================================================

#[test]
fn given_clients_when_listing_then_names_sorted() {
    // Arrange
    let rest = MockRest::new();
    rest.reply(
        "GET",
        "clients",
        json!({"zed": "http://chef/clients/zed", "adam": "http://chef/clients/adam"}),
    );
    let service = ClientService::new(quiet_store(rest.clone(), MockConsole::new()), Arc::new(RealFileSystem));

    // Act
    let names = service.list(false).unwrap();
    let uris = service.list(true).unwrap();

    // Assert
    assert_eq!(names, json!(["adam", "zed"]));
    assert_eq!(uris["adam"], json!("http://chef/clients/adam"));
}

#[test]
fn given_new_client_when_creating_then_returns_private_key() {
    // Arrange
    let rest = MockRest::new();
    rest.reply("POST", "clients", json!({"uri": "http://chef/clients/adam", "private_key": "-----BEGIN KEY-----"}));
    let service = ClientService::new(quiet_store(rest.clone(), MockConsole::new()), Arc::new(RealFileSystem));

    // Act
    let (key, logs) = capture_logs(|| service.create(Some("adam"), true));

    // Assert
    assert_eq!(key.unwrap(), "-----BEGIN KEY-----");
    assert_eq!(rest.body_of("POST", "clients"), Some(json!({"name": "adam", "admin": true})));
    assert!(logs.contains("Created (or updated) client[adam]"), "{logs}");
}

#[test]
fn given_key_file_when_writing_then_no_trailing_newline_added() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("adam.pem");
    let service = ClientService::new(quiet_store(MockRest::new(), MockConsole::new()), Arc::new(RealFileSystem));

    // Act
    service.write_key(&path, "KEY").unwrap();

    // Assert
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "KEY");
}

#[test]
fn given_reregister_when_server_answers_then_puts_private_key_flag() {
    // Arrange
    let rest = MockRest::new();
    rest.reply("PUT", "clients/adam", json!({"private_key": "NEWKEY"}));
    let service = ClientService::new(quiet_store(rest.clone(), MockConsole::new()), Arc::new(RealFileSystem));

    // Act
    let key = service.reregister(Some("adam")).unwrap();

    // Assert
    assert_eq!(key, "NEWKEY");
    assert_eq!(
        rest.body_of("PUT", "clients/adam"),
        Some(json!({"name": "adam", "private_key": true}))
    );
}

#[test]
fn given_no_client_name_when_showing_then_usage_error() {
    let service = ClientService::new(quiet_store(MockRest::new(), MockConsole::new()), Arc::new(RealFileSystem));

    let err = service.show(None, None).unwrap_err();

    assert!(matches!(err, ApplicationError::Usage { ref message, .. } if message == "You must specify a client name"));
}

// ============================================================
// Nodes and roles
// ============================================================

#[test]
fn given_node_when_showing_attribute_then_projects_through_precedence() {
    // Arrange
    let rest = MockRest::new();
    rest.reply(
        "GET",
        "nodes/web1",
        json!({"name": "web1", "automatic": {"platform": "ubuntu"}, "run_list": ["role[web]"]}),
    );
    rest.reply("GET", "nodes/web1", json!({"name": "web1", "run_list": ["role[web]"]}));
    let service = NodeService::new(quiet_store(rest.clone(), MockConsole::new()));

    // Act
    let attribute = service.show(Some("web1"), Some("platform"), false).unwrap();
    let run_list = service.show(Some("web1"), None, true).unwrap();

    // Assert
    assert_eq!(attribute, json!({"platform": "ubuntu"}));
    assert_eq!(run_list, json!({"run_list": ["role[web]"]}));
}

#[test]
fn given_new_node_when_creating_without_editor_then_posts_skeleton() {
    // Arrange
    let rest = MockRest::new();
    let service = NodeService::new(quiet_store(rest.clone(), MockConsole::new()));

    // Act
    let created = service.create(Some("db1")).unwrap();

    // Assert
    let body = rest.body_of("POST", "nodes").unwrap();
    assert_eq!(body["name"], json!("db1"));
    assert_eq!(body["json_class"], json!("Chef::Node"));
    assert_eq!(body["run_list"], json!([]));
    assert_eq!(created["name"], json!("db1"));
}

#[test]
fn given_editor_changes_when_editing_node_then_puts_edited_document() {
    // Arrange
    let rest = MockRest::new();
    rest.reply("GET", "nodes/web1", json!({"name": "web1", "run_list": []}));
    let editor = MockEditor::writing(r#"{"name": "web1", "run_list": ["recipe[nginx]"]}"#);
    let ui = ui_with(MockConsole::new(), editor.clone(), UiOptions::default());
    let service = NodeService::new(ObjectStore::new(rest.clone(), ui));

    // Act
    let (saved, logs) = capture_logs(|| service.edit(Some("web1")));

    // Assert
    let saved = saved.unwrap();
    assert_eq!(saved["run_list"], json!(["recipe[nginx]"]));
    assert_eq!(rest.body_of("PUT", "nodes/web1"), Some(saved));
    assert_eq!(editor.opened().len(), 1);
    assert!(logs.contains("Saved node[web1]"), "{logs}");
}

#[test]
fn given_invalid_json_from_editor_when_editing_then_nothing_saved() {
    // Arrange
    let rest = MockRest::new();
    rest.reply("GET", "nodes/web1", json!({"name": "web1"}));
    let ui = ui_with(MockConsole::new(), MockEditor::writing("{ not json"), UiOptions::default());
    let service = NodeService::new(ObjectStore::new(rest.clone(), ui));

    // Act
    let err = service.edit(Some("web1")).unwrap_err();

    // Assert
    assert!(matches!(err, ApplicationError::Domain(_)));
    assert_eq!(rest.requests(), vec!["GET nodes/web1"]);
}

#[test]
fn given_no_answer_when_deleting_node_then_aborted_without_request() {
    // Arrange
    let rest = MockRest::new();
    let console = MockConsole::answering(&["n"]);
    let ui = ui_with(console.clone(), MockEditor::new(), UiOptions::default());
    let service = NodeService::new(ObjectStore::new(rest.clone(), ui));

    // Act
    let err = service.delete(Some("web1")).unwrap_err();

    // Assert
    assert!(matches!(err, ApplicationError::Aborted));
    assert!(console.output().contains("Do you really want to delete web1? (Y/N) "));
    assert!(rest.requests().is_empty());
}

#[test]
fn given_yes_answer_when_deleting_role_then_deletes_and_logs() {
    // Arrange
    let rest = MockRest::new();
    let ui = ui_with(MockConsole::answering(&["Y"]), MockEditor::new(), UiOptions::default());
    let service = RoleService::new(ObjectStore::new(rest.clone(), ui));

    // Act
    let (result, logs) = capture_logs(|| service.delete(Some("base")));

    // Assert
    result.unwrap();
    assert_eq!(rest.requests(), vec!["DELETE roles/base"]);
    assert!(logs.contains("Deleted role[base]"), "{logs}");
}

#[test]
fn given_missing_role_when_showing_then_remote_not_found() {
    // Arrange
    let rest = MockRest::new();
    rest.fail("GET", "roles/nope", 404);
    let service = RoleService::new(quiet_store(rest, MockConsole::new()));

    // Act
    let err = service.show(Some("nope"), None).unwrap_err();

    // Assert
    assert!(err.remote().map(|r| r.is_not_found()).unwrap_or(false));
}

// ============================================================
// Data bags
// ============================================================

#[test]
fn given_bag_only_when_creating_then_posts_bag_name() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let rest = MockRest::new();
    let service = data_bags(&rest, temp.path());

    // Act
    let (created, logs) = capture_logs(|| service.create(Some("users"), None));

    // Assert
    assert_eq!(created.unwrap(), None);
    assert_eq!(rest.body_of("POST", "data"), Some(json!({"name": "users"})));
    assert!(logs.contains("Created data_bag[users]"), "{logs}");
}

#[test]
fn given_bag_and_item_when_creating_then_posts_item_with_id() {
    let temp = TempDir::new().unwrap();
    let rest = MockRest::new();
    let service = data_bags(&rest, temp.path());

    let created = service.create(Some("users"), Some("bob")).unwrap();

    assert_eq!(created, Some(json!({"id": "bob"})));
    assert_eq!(rest.body_of("POST", "data/users"), Some(json!({"id": "bob"})));
}

#[test]
fn given_bag_when_showing_then_lists_item_names() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let rest = MockRest::new();
    rest.reply(
        "GET",
        "data/users",
        json!({"bob": "http://chef/data/users/bob", "alice": "http://chef/data/users/alice"}),
    );
    let service = data_bags(&rest, temp.path());

    // Act
    let items = service.show(Some("users"), None).unwrap();

    // Assert
    assert_eq!(items, json!(["alice", "bob"]));
}

#[test]
fn given_single_argument_when_editing_data_bag_then_fatal_exit_42() {
    let temp = TempDir::new().unwrap();
    let rest = MockRest::new();
    let service = data_bags(&rest, temp.path());

    let err = service.edit(&["users".to_string()]).unwrap_err();

    match err {
        ApplicationError::Fatal { message, exit_code } => {
            assert_eq!(message, "You must supply the data bag and an item to edit!");
            assert_eq!(exit_code, 42);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(rest.requests().is_empty());
}

#[test]
fn given_bag_only_when_deleting_then_deletes_whole_bag() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let rest = MockRest::new();
    let service = data_bags(&rest, temp.path());

    // Act
    let (result, logs) = capture_logs(|| service.delete(Some("users"), None));

    // Assert
    result.unwrap();
    assert_eq!(rest.requests(), vec!["DELETE data/users"]);
    assert!(logs.contains("Deleted data_bag[users]"), "{logs}");
}

#[test]
fn given_bag_and_item_when_deleting_then_deletes_only_item() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let rest = MockRest::new();
    let service = data_bags(&rest, temp.path());

    // Act
    let (result, logs) = capture_logs(|| service.delete(Some("users"), Some("adam")));

    // Assert
    result.unwrap();
    assert_eq!(rest.requests(), vec!["DELETE data/users/adam"]);
    assert!(logs.contains("Deleted data_bag_item[adam]"), "{logs}");
}

#[test]
fn given_bag_and_item_when_editing_then_puts_edited_item() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let rest = MockRest::new();
    rest.reply("GET", "data/users/adam", json!({"id": "adam", "shell": "/bin/sh"}));
    let editor = MockEditor::writing(r#"{"id": "adam", "shell": "/bin/zsh"}"#);
    let ui = ui_with(MockConsole::new(), editor.clone(), UiOptions::default());
    let service = DataBagService::new(
        ObjectStore::new(rest.clone(), ui),
        Arc::new(RealFileSystem),
        temp.path().to_path_buf(),
    );

    // Act
    let (saved, logs) = capture_logs(|| service.edit(&["users".to_string(), "adam".to_string()]));

    // Assert
    let saved = saved.unwrap();
    assert_eq!(saved["shell"], json!("/bin/zsh"));
    assert_eq!(rest.requests(), vec!["GET data/users/adam", "PUT data/users/adam"]);
    assert_eq!(rest.body_of("PUT", "data/users/adam"), Some(saved));
    assert_eq!(editor.opened().len(), 1);
    assert!(logs.contains("Saved data_bag_item[adam]"), "{logs}");
}

#[test]
fn given_three_arguments_when_editing_data_bag_then_fatal_exit_42() {
    let temp = TempDir::new().unwrap();
    let rest = MockRest::new();
    let service = data_bags(&rest, temp.path());

    let err = service
        .edit(&["users".to_string(), "adam".to_string(), "extra".to_string()])
        .unwrap_err();

    match err {
        ApplicationError::Fatal { exit_code, .. } => assert_eq!(exit_code, 42),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(rest.requests().is_empty());
}

#[test]
fn given_item_file_in_repo_when_loading_then_puts_by_id() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let bag_dir = temp.path().join("data_bags/users");
    std::fs::create_dir_all(&bag_dir).unwrap();
    std::fs::write(bag_dir.join("bob.json"), r#"{"id": "bob", "shell": "/bin/zsh"}"#).unwrap();
    let rest = MockRest::new();
    let service = data_bags(&rest, temp.path());

    // Act
    let (result, logs) = capture_logs(|| service.from_file(Some("users"), Some("bob")));

    // Assert
    result.unwrap();
    assert_eq!(rest.requests(), vec!["PUT data/users/bob"]);
    assert_eq!(
        rest.body_of("PUT", "data/users/bob"),
        Some(json!({"id": "bob", "shell": "/bin/zsh"}))
    );
    assert!(logs.contains("Updated data_bag_item[bob]"), "{logs}");
}

#[test]
fn given_unknown_item_when_loading_from_file_then_falls_back_to_post() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("carol.json");
    std::fs::write(&file, r#"{"id": "carol"}"#).unwrap();
    let rest = MockRest::new();
    rest.fail("PUT", "data/users/carol", 404);
    let service = data_bags(&rest, temp.path());

    // Act
    service
        .from_file(Some("users"), Some(file.to_str().unwrap()))
        .unwrap();

    // Assert
    assert_eq!(rest.requests(), vec!["PUT data/users/carol", "POST data/users"]);
}

#[test]
fn given_missing_file_when_loading_then_fatal_names_file() {
    let temp = TempDir::new().unwrap();
    let service = data_bags(&MockRest::new(), temp.path());

    let err = service.from_file(Some("users"), Some("ghost")).unwrap_err();

    assert_eq!(err.to_string(), "Cannot find data bag item file ghost");
}
