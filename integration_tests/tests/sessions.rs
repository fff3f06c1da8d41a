use adventure_core::{AuthError, SessionService};
use serde_json::json;
use world_runtime::{validate_envelope, ActionEnvelope, ActionKind, ActionValidationError};

#[test]
fn register_authenticate_validate_invalidate() {
    let service = SessionService::with_secret([42u8; 32]);
    service
        .register("alia", "correct horse battery")
        .expect("register");
    let session = service
        .authenticate("alia", "correct horse battery")
        .expect("authenticate");

    assert_eq!(
        service.validate_token(&session.token).expect("valid token"),
        "alia"
    );

    service.invalidate(&session.session_id).expect("invalidate");
    assert!(service.session(&session.session_id).is_none());
    // The bearer token remains verifiable; the session record is gone.
    assert_eq!(
        service.invalidate(&session.session_id),
        Err(AuthError::UnknownSession(session.session_id.clone()))
    );
}

#[test]
fn duplicate_registration_and_weak_passwords_are_rejected() {
    let service = SessionService::with_secret([42u8; 32]);
    service.register("alia", "longenough").expect("register");
    assert_eq!(
        service.register("alia", "longenough"),
        Err(AuthError::UsernameTaken("alia".into()))
    );
    assert_eq!(
        service.register("bram", "short"),
        Err(AuthError::WeakPassword(5))
    );
}

#[test]
fn stale_actions_are_rejected_by_the_validator() {
    let envelope = ActionEnvelope::new("a1", "alia", ActionKind::Harvest, 1_000)
        .with_param("resource_node_id", json!("node_123"));

    // Inside the 5-second window.
    assert!(validate_envelope(&envelope, "alia", 5_500, true).is_ok());

    // Past it.
    assert!(matches!(
        validate_envelope(&envelope, "alia", 6_001, true),
        Err(ActionValidationError::Expired { age_ms: 5_001, .. })
    ));
}

#[test]
fn actions_must_bind_to_their_player() {
    let envelope = ActionEnvelope::new("a1", "alia", ActionKind::Chat, 0)
        .with_param("message", json!("hello there"));
    assert!(validate_envelope(&envelope, "alia", 100, false).is_ok());
    assert!(matches!(
        validate_envelope(&envelope, "bram", 100, false),
        Err(ActionValidationError::WrongPlayer { .. })
    ));
}
