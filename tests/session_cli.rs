//! Session commands run with the provider out of reach.

use courtier::auth::Access;
use courtier::cli::{
    actions::session::{self, Command},
    commands::auth::Options,
};
use secrecy::SecretString;
use serde_json::json;
use std::path::Path;
use url::Url;

fn write_expired_session(path: &Path) {
    std::fs::write(
        path,
        json!({
            "access_token": "stale",
            "refresh_token": "refresh-1",
            "expires_at": 0,
            "user": { "id": "8d0fa3b4-0000-4000-8000-000000000001", "email": "client@x.com" }
        })
        .to_string(),
    )
    .unwrap();
}

fn offline_options(session_file: &Path) -> Options {
    Options {
        admin_emails: "admin@x.com".to_string(),
        admin_password: Some(SecretString::from("secret123")),
        // nothing listens on port 9
        auth_url: Url::parse("http://127.0.0.1:9").unwrap(),
        anon_key: SecretString::from("anon"),
        profile_table: "profiles".to_string(),
        site_url: Url::parse("https://courtier.example").unwrap(),
        session_file: Some(session_file.to_path_buf()),
    }
}

#[tokio::test]
async fn fallback_login_ignores_an_unrefreshable_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    write_expired_session(&path);

    let result = session::execute(session::Args {
        auth: offline_options(&path),
        command: Command::Login {
            email: "admin@x.com".to_string(),
            password: SecretString::from("secret123"),
        },
    })
    .await;

    assert!(result.is_ok(), "{result:?}");
}

#[tokio::test]
async fn other_commands_still_need_the_current_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    write_expired_session(&path);

    let result = session::execute(session::Args {
        auth: offline_options(&path),
        command: Command::WhoAmI {
            path: "/espace-client".to_string(),
            access: Access::Client,
        },
    })
    .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("Failed to load the current session"));
}
