//! Claim population, destination policy and scope gating.

use std::collections::BTreeSet;
use std::fmt;

use openidconnect::core::{CoreGenderClaim, CoreUserInfoClaims};
use openidconnect::{
    EmptyAdditionalClaims, EndUserEmail, EndUserFamilyName, EndUserGivenName, EndUserName,
    EndUserUsername, StandardClaims, SubjectIdentifier,
};
use serde_json::{Map, Value};

use crate::models::Account;

pub const SCOPE_OPENID: &str = "openid";
pub const SCOPE_EMAIL: &str = "email";
pub const SCOPE_PROFILE: &str = "profile";
pub const SCOPE_OFFLINE_ACCESS: &str = "offline_access";
pub const SCOPE_ROLES: &str = "roles";

/// Scopes this provider understands.
pub const SUPPORTED_SCOPES: [&str; 5] = [
    SCOPE_OPENID,
    SCOPE_EMAIL,
    SCOPE_PROFILE,
    SCOPE_OFFLINE_ACCESS,
    SCOPE_ROLES,
];

/// Where a claim may be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    AccessToken,
    IdentityToken,
}

/// Profile claims reach both tokens; anything else stays in the access token.
#[must_use]
pub fn destinations(claim: &str) -> &'static [Destination] {
    match claim {
        "name" | "email" | "given_name" | "family_name" | "preferred_username" => {
            &[Destination::AccessToken, Destination::IdentityToken]
        }
        _ => &[Destination::AccessToken],
    }
}

/// A space-delimited scope set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scopes(BTreeSet<String>);

impl Scopes {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        Self(value.split_whitespace().map(ToOwned::to_owned).collect())
    }

    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Keep only scopes this provider understands.
    #[must_use]
    pub fn supported(self) -> Self {
        Self(
            self.0
                .into_iter()
                .filter(|s| SUPPORTED_SCOPES.contains(&s.as_str()))
                .collect(),
        )
    }
}

impl fmt::Display for Scopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.0.iter().map(String::as_str).collect();
        f.write_str(&joined.join(" "))
    }
}

/// Claims describing an account, before the destination policy is applied.
#[must_use]
pub fn account_claims(account: &Account) -> Vec<(&'static str, Value)> {
    vec![
        ("email", Value::from(account.email.as_str())),
        ("name", Value::from(account.handle.as_str())),
        ("given_name", Value::from(account.first_name.as_str())),
        ("family_name", Value::from(account.last_name.as_str())),
        ("preferred_username", Value::from(account.handle.as_str())),
        ("role", Value::from(vec![account.tier.to_string()])),
    ]
}

/// The claims allowed into tokens of the given kind.
#[must_use]
pub fn claims_for(account: &Account, destination: Destination) -> Map<String, Value> {
    account_claims(account)
        .into_iter()
        .filter(|(name, _)| destinations(name).contains(&destination))
        .map(|(name, value)| (name.to_owned(), value))
        .collect()
}

/// Standard claims of the ID token: the profile claims the destination
/// policy lets through.
#[must_use]
pub fn identity_claims(account: &Account) -> StandardClaims<CoreGenderClaim> {
    let base = StandardClaims::new(SubjectIdentifier::new(account.id.to_string()));
    claims_for(account, Destination::IdentityToken)
        .into_iter()
        .filter_map(|(name, value)| Some((name, value.as_str()?.to_owned())))
        .fold(base, |claims, (name, value)| set_claim(claims, &name, value))
}

/// The userinfo document for `account` under `scopes`.
#[must_use]
pub fn userinfo(account: &Account, scopes: &Scopes) -> CoreUserInfoClaims {
    let mut claims = StandardClaims::new(SubjectIdentifier::new(account.id.to_string()));

    if scopes.contains(SCOPE_EMAIL) {
        claims = set_claim(claims, "email", account.email.as_str().to_owned())
            .set_email_verified(Some(true));
    }

    if scopes.contains(SCOPE_PROFILE) {
        claims = [
            ("given_name", account.first_name.as_str()),
            ("family_name", account.last_name.as_str()),
            ("preferred_username", account.handle.as_str()),
            ("name", account.handle.as_str()),
        ]
        .into_iter()
        .fold(claims, |claims, (name, value)| {
            set_claim(claims, name, value.to_owned())
        });
    }

    CoreUserInfoClaims::new(claims, EmptyAdditionalClaims {})
}

fn set_claim(
    claims: StandardClaims<CoreGenderClaim>,
    name: &str,
    value: String,
) -> StandardClaims<CoreGenderClaim> {
    match name {
        "email" => claims.set_email(Some(EndUserEmail::new(value))),
        "name" => claims.set_name(Some(EndUserName::new(value).into())),
        "given_name" => claims.set_given_name(Some(EndUserGivenName::new(value).into())),
        "family_name" => claims.set_family_name(Some(EndUserFamilyName::new(value).into())),
        "preferred_username" => claims.set_preferred_username(Some(EndUserUsername::new(value))),
        _ => claims,
    }
}
