use lawbot_core::contract::Revision;
use lawbot_core::gate::{should_sync, SkipDecision, UP_TO_DATE};

fn revision(revision_id: u64, comment: &str) -> Revision {
    Revision {
        revision_id,
        timestamp: "2024-03-01T10:00:00Z".to_string(),
        author: "Editor".to_string(),
        comment: comment.to_string(),
        content: "text".to_string(),
    }
}

#[test]
fn matching_tag_is_skipped() {
    let source = revision(100, "fix typo");
    let destination = revision(500, "[100] fix typo");
    assert_eq!(
        should_sync(&source, Some(&destination), false),
        SkipDecision::Skip(UP_TO_DATE.to_string())
    );
}

#[test]
fn force_always_proceeds() {
    let source = revision(100, "fix typo");
    let destination = revision(500, "[100] fix typo");
    assert_eq!(should_sync(&source, Some(&destination), true), SkipDecision::Proceed);
    assert_eq!(should_sync(&source, None, true), SkipDecision::Proceed);
}

#[test]
fn missing_destination_proceeds() {
    let source = revision(100, "fix typo");
    assert_eq!(should_sync(&source, None, false), SkipDecision::Proceed);
}

#[test]
fn untagged_destination_proceeds() {
    let source = revision(100, "fix typo");
    let destination = revision(500, "hand edit by a human");
    assert_eq!(should_sync(&source, Some(&destination), false), SkipDecision::Proceed);
}

#[test]
fn tag_for_another_revision_proceeds() {
    let source = revision(101, "second pass");
    for comment in ["[100] fix typo", "[102] from the future"] {
        let destination = revision(500, comment);
        assert_eq!(
            should_sync(&source, Some(&destination), false),
            SkipDecision::Proceed,
            "comment {comment:?}"
        );
    }
}

#[test]
fn only_the_tag_id_matters() {
    // The original comment part is ignored.
    let source = revision(100, "fix typo");
    let destination = revision(500, "[100] something else entirely");
    assert!(matches!(
        should_sync(&source, Some(&destination), false),
        SkipDecision::Skip(_)
    ));
}
