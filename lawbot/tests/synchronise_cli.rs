use lawbot::cli::{check_report, render_titles, synchronise_titles};
use lawbot::load_config::{CliConfig, SyncSection, WikiSection};
use lawbot_core::config::{PipelineSpec, StageSpec, SyncOptions, WikiSettings};
use lawbot_core::contract::{
    Credentials, LoginResponse, MockWikiApi, PageRevisions, Revision,
};
use lawbot_core::error::{FetchError, SyncError};
use lawbot_core::session::SessionManager;
use lawbot_core::synchronise::SyncOutcome;
use tokio::sync::watch;

fn config(stage: StageSpec) -> CliConfig {
    CliConfig {
        login: None,
        wiki: WikiSection {
            host: Some("wiki.test".to_string()),
            settings: WikiSettings {
                category: "laws".to_string(),
                source_suffix: "/source".to_string(),
                category_marker: "[[Category:laws]]".to_string(),
            },
        },
        pipeline: PipelineSpec {
            stages: vec![stage],
            ..PipelineSpec::default()
        },
        sync: SyncSection::default(),
    }
}

fn credentials() -> Credentials {
    Credentials {
        username: "LawBot".to_string(),
        password: "secret".to_string(),
    }
}

fn source_page(title: &str, content: &str) -> Vec<PageRevisions> {
    vec![PageRevisions {
        page_id: Some(10),
        title: title.to_string(),
        missing: false,
        revisions: vec![Revision {
            revision_id: 501,
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            author: "Editor".to_string(),
            comment: "new law".to_string(),
            content: content.to_string(),
        }],
    }]
}

fn missing_page(title: &str) -> Vec<PageRevisions> {
    vec![PageRevisions {
        page_id: None,
        title: title.to_string(),
        missing: true,
        revisions: vec![],
    }]
}

#[tokio::test]
async fn dry_run_transforms_without_editing() {
    let mut api = MockWikiApi::new();
    api.expect_login().times(1).returning(|_, _| {
        Ok(LoginResponse {
            result: "Success".to_string(),
            ..LoginResponse::default()
        })
    });
    api.expect_revisions().returning(|title| {
        Ok(if title == "Law/source" {
            source_page(title, "hello law")
        } else {
            missing_page(title)
        })
    });
    api.expect_fetch_token().never();
    api.expect_edit().never();
    let session = SessionManager::new(api, credentials());
    let config = config(StageSpec::shell("tr a-z A-Z"));
    let options = SyncOptions {
        dry_run: true,
        keep_rendered: true,
        ..SyncOptions::default()
    };
    let (_tx, rx) = watch::channel(false);

    let report = synchronise_titles(&session, &config, &["Law".to_string()], options, rx)
        .await
        .expect("batch runs");

    assert_eq!(report.titles.len(), 1);
    assert!(matches!(report.titles[0].outcome, SyncOutcome::DryRun));
    assert_eq!(report.titles[0].rendered.as_deref(), Some("HELLO LAW"));
    assert!(!report.has_failures());
}

#[tokio::test]
async fn rejected_login_is_an_error() {
    let mut api = MockWikiApi::new();
    api.expect_login().times(1).returning(|_, _| {
        Ok(LoginResponse {
            result: "WrongPass".to_string(),
            ..LoginResponse::default()
        })
    });
    api.expect_revisions().never();
    api.expect_category_members().never();
    let session = SessionManager::new(api, credentials());
    let (_tx, rx) = watch::channel(false);

    let err = synchronise_titles(
        &session,
        &config(StageSpec::direct("cat")),
        &["Law".to_string()],
        SyncOptions::default(),
        rx,
    )
    .await
    .expect_err("login must succeed first");
    assert!(err.to_string().contains("initial login failed"));
}

#[tokio::test]
async fn render_uses_raw_text_and_keeps_going() {
    let mut api = MockWikiApi::new();
    api.expect_login().never();
    api.expect_raw_text().returning(|title| {
        Ok(match title {
            "First/source" => Some("first".to_string()),
            _ => None,
        })
    });
    let session = SessionManager::anonymous(api);

    let rendered = render_titles(
        &session,
        &config(StageSpec::shell("tr a-z A-Z")),
        &["First".to_string(), "Second".to_string()],
    )
    .await
    .expect("titles resolve");

    assert_eq!(rendered.len(), 2);
    assert_eq!(rendered[0].0, "First");
    assert_eq!(rendered[0].1.as_ref().ok().map(String::as_str), Some("FIRST"));
    assert!(matches!(
        &rendered[1].1,
        Err(SyncError::Fetch(FetchError::PageNotFound(title))) if title == "Second/source"
    ));
}

#[tokio::test]
async fn interrupted_batch_is_reported_as_an_error() {
    let mut api = MockWikiApi::new();
    api.expect_login().times(1).returning(|_, _| {
        Ok(LoginResponse {
            result: "Success".to_string(),
            ..LoginResponse::default()
        })
    });
    api.expect_revisions().never();
    api.expect_edit().never();
    let session = SessionManager::new(api, credentials());
    let (_tx, rx) = watch::channel(true);

    let report = synchronise_titles(
        &session,
        &config(StageSpec::direct("cat")),
        &["Law".to_string(), "Other".to_string()],
        SyncOptions::default(),
        rx,
    )
    .await
    .expect("batch runs");

    assert!(!report.has_failures());
    assert_eq!(report.not_started(), 2);
    let err = check_report(&report).expect_err("a cancelled batch is not a success");
    assert!(err.to_string().contains("batch cancelled"));
}

#[tokio::test]
async fn completed_batch_passes_the_report_check() {
    let mut api = MockWikiApi::new();
    api.expect_login().returning(|_, _| {
        Ok(LoginResponse {
            result: "Success".to_string(),
            ..LoginResponse::default()
        })
    });
    api.expect_revisions().returning(|title| {
        Ok(if title == "Law/source" {
            source_page(title, "text")
        } else {
            missing_page(title)
        })
    });
    let session = SessionManager::new(api, credentials());
    let (_tx, rx) = watch::channel(false);
    let options = SyncOptions {
        dry_run: true,
        ..SyncOptions::default()
    };

    let report = synchronise_titles(
        &session,
        &config(StageSpec::direct("cat")),
        &["Law".to_string()],
        options,
        rx,
    )
    .await
    .expect("batch runs");

    assert!(check_report(&report).is_ok());
}
