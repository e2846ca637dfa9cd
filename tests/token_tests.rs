use career_portal::{
    TokenService,
    auth::{ProfileRef, Subject, TokenError, TokenKind},
    models::RoleKind,
};
use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

fn service() -> TokenService {
    TokenService::new("token-test-secret", Duration::hours(1))
}

fn subject() -> Subject {
    Subject {
        id: Uuid::new_v4(),
        username: "jdoe".into(),
        profile: None,
    }
}

#[test]
fn access_token_is_valid_until_exactly_its_expiry() {
    let tokens = service();
    let issued = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    let token = tokens
        .issue_access_at(&subject(), Duration::seconds(60), issued)
        .unwrap();

    let claims = tokens
        .verify_at(&token, issued + Duration::seconds(60))
        .expect("valid at the expiry instant");
    assert_eq!(claims.kind, TokenKind::Access);
    assert_eq!(claims.exp, Some(issued.timestamp() + 60));

    assert_eq!(
        tokens.verify_at(&token, issued + Duration::seconds(61)),
        Err(TokenError::Expired)
    );
}

#[test]
fn subject_and_profile_survive_signing() {
    let tokens = service();
    let company_id = Uuid::new_v4();
    let original = Subject {
        profile: Some(ProfileRef {
            kind: RoleKind::Company,
            id: company_id,
        }),
        ..subject()
    };

    let token = tokens.issue_access(&original, Duration::minutes(5)).unwrap();
    let claims = tokens.verify(&token).unwrap();

    assert_eq!(claims.subject, original);
}

#[test]
fn refresh_tokens_never_expire() {
    let tokens = service();
    let issued = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let token = tokens.issue_refresh_at(&subject(), issued).unwrap();

    let claims = tokens
        .verify_at(&token, issued + Duration::days(3650))
        .unwrap();
    assert_eq!(claims.kind, TokenKind::Refresh);
    assert_eq!(claims.exp, None);
}

#[test]
fn garbage_and_tampered_tokens_are_malformed() {
    let tokens = service();
    assert_eq!(tokens.verify("not-a-jwt"), Err(TokenError::Malformed));
    assert_eq!(tokens.verify(""), Err(TokenError::Malformed));

    let token = tokens
        .issue_access(&subject(), Duration::minutes(5))
        .unwrap();
    let mut tampered = token.clone();
    tampered.push('x');
    assert_eq!(tokens.verify(&tampered), Err(TokenError::Malformed));
}

#[test]
fn token_signed_with_another_secret_is_malformed() {
    let ours = service();
    let theirs = TokenService::new("some-other-secret", Duration::hours(1));
    let token = theirs
        .issue_access(&subject(), Duration::minutes(5))
        .unwrap();

    assert_eq!(ours.verify(&token), Err(TokenError::Malformed));
}

#[test]
fn rejection_codes_distinguish_expired_from_malformed() {
    assert_eq!(TokenError::Expired.code(), "expired");
    assert_eq!(TokenError::Malformed.code(), "malformed");
}
