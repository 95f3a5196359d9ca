mod common;

use serde_json::json;
use uuid::Uuid;

use common::TestServer;

async fn setup() -> (TestServer, String, String) {
    let server = TestServer::start().await;
    let george = server.add_user("george");

    let resp = server
        .post(
            "/projects",
            Some(&george),
            json!({ "name": "Test", "plugins": [Uuid::new_v4().to_string()] }),
        )
        .await;
    let project_id = resp["data"]["_id"].as_str().unwrap().to_string();
    (server, george, project_id)
}

#[tokio::test]
async fn test_assets_get_sequential_shallow_ids() {
    let (server, george, pid) = setup().await;
    let path = format!("/users/george/projects/{pid}/assets");

    let first = server
        .post(&path, Some(&george), json!({ "name": "Chicken", "className": "Bird" }))
        .await;
    assert_eq!(first["message"], "New resource 'Chicken' created");
    assert_eq!(first["data"]["shallowId"], 1);

    let second = server
        .post(&path, Some(&george), json!({ "name": "Duck", "className": "Bird" }))
        .await;
    assert_eq!(second["data"]["shallowId"], 2);

    let group = server
        .post(
            &format!("/users/george/projects/{pid}/groups"),
            Some(&george),
            json!({ "name": "Flock", "items": [1, 2] }),
        )
        .await;
    assert_eq!(group["data"]["shallowId"], 1);

    let resp = server.get(&path, Some(&george)).await;
    assert_eq!(resp["message"], "Found 2 assets");
    assert_eq!(resp["count"], 2);
}

#[tokio::test]
async fn test_shallow_ids_are_counted_per_project() {
    let (server, george, first) = setup().await;
    let resp = server
        .post(
            "/projects",
            Some(&george),
            json!({ "name": "Other", "plugins": [Uuid::new_v4().to_string()] }),
        )
        .await;
    let second = resp["data"]["_id"].as_str().unwrap().to_string();

    let mut shallow = Vec::new();
    for (pid, name) in [
        (&first, "One"),
        (&second, "Elsewhere"),
        (&first, "Two"),
        (&second, "Elsewhere again"),
        (&first, "Three"),
    ] {
        let resp = server
            .post(
                &format!("/users/george/projects/{pid}/containers"),
                Some(&george),
                json!({ "name": name }),
            )
            .await;
        shallow.push(resp["data"]["shallowId"].as_i64().unwrap());
    }
    assert_eq!(shallow, vec![1, 1, 2, 2, 3]);
}

#[tokio::test]
async fn test_asset_requires_class_name() {
    let (server, george, pid) = setup().await;
    let resp = server
        .post(
            &format!("/users/george/projects/{pid}/assets"),
            Some(&george),
            json!({ "name": "Chicken" }),
        )
        .await;
    assert_eq!(resp["error"], true);
    assert_eq!(resp["message"], "className is required");
}

#[tokio::test]
async fn test_update_script() {
    let (server, george, pid) = setup().await;
    let path = format!("/users/george/projects/{pid}/scripts");

    let created = server
        .post(&path, Some(&george), json!({ "name": "Main", "onEnter": "start()" }))
        .await;
    let id = created["data"]["_id"].as_str().unwrap();

    let resp = server
        .put(&format!("{path}/{id}"), Some(&george), json!({ "onFrame": "tick()" }))
        .await;
    assert_eq!(resp["message"], "[1] Resources updated");

    let resp = server.get(&format!("{path}/{id}"), Some(&george)).await;
    assert_eq!(resp["count"], 1);
    assert_eq!(resp["data"][0]["onEnter"], "start()");
    assert_eq!(resp["data"][0]["onFrame"], "tick()");

    let resp = server
        .put(&format!("{path}/not-an-id"), Some(&george), json!({}))
        .await;
    assert_eq!(resp["message"], "Please use a valid resource ID");
}

#[tokio::test]
async fn test_delete_validates_every_id() {
    let (server, george, pid) = setup().await;
    let path = format!("/users/george/projects/{pid}/containers");

    let created = server
        .post(&path, Some(&george), json!({ "name": "Box", "json": { "w": 1 } }))
        .await;
    let id = created["data"]["_id"].as_str().unwrap();

    let resp = server
        .delete(&format!("{path}/{id},oops"), Some(&george))
        .await;
    assert_eq!(resp["error"], true);
    assert_eq!(resp["message"], "ID 'oops' is not a valid ID");

    let resp = server.delete(&format!("{path}/{id}"), Some(&george)).await;
    assert_eq!(resp["message"], "[1] resources have been removed");

    let resp = server.get(&path, Some(&george)).await;
    assert_eq!(resp["count"], 0);
}

#[tokio::test]
async fn test_collaborators_follow_privileges() {
    let (server, george, pid) = setup().await;
    let jane = server.add_user("jane");

    let resp = server
        .get(&format!("/users/george/projects/{pid}/assets"), Some(&jane))
        .await;
    assert_eq!(resp["message"], "You do not have permission");

    let resp = server
        .get(
            &format!("/users/jane/projects/{pid}/assets"),
            Some(&jane),
        )
        .await;
    assert_eq!(resp["message"], "No project exists with that ID");

    let resp = server
        .post(
            &format!("/users/george/projects/{pid}/assets"),
            Some(&george),
            json!({ "name": "Chicken", "className": "Bird" }),
        )
        .await;
    assert_eq!(resp["error"], false);
}

#[tokio::test]
async fn test_admin_lists_every_resource_of_a_kind() {
    let (server, george, pid) = setup().await;
    server
        .post(
            &format!("/users/george/projects/{pid}/scripts"),
            Some(&george),
            json!({ "name": "Main" }),
        )
        .await;

    let resp = server.get("/scripts", Some(&george)).await;
    assert_eq!(resp["message"], "You do not have permission");

    let resp = server.get("/scripts", Some(&server.admin_token)).await;
    assert_eq!(resp["message"], "Found 1 scripts");
}
