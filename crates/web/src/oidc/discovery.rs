//! `/.well-known/openid-configuration` and the (empty) key set.

use openidconnect::core::{
    CoreAuthDisplay, CoreClaimName, CoreClaimType, CoreClientAuthMethod, CoreGrantType,
    CoreJsonWebKey, CoreJsonWebKeySet, CoreJweContentEncryptionAlgorithm,
    CoreJweKeyManagementAlgorithm, CoreJwsSigningAlgorithm, CoreResponseMode, CoreResponseType,
    CoreSubjectIdentifierType,
};
use openidconnect::{
    AdditionalProviderMetadata, AuthUrl, EndSessionUrl, IssuerUrl, JsonWebKeySetUrl,
    LogoutProviderMetadata, PkceCodeChallengeMethod, ProviderMetadata, ResponseTypes, Scope,
    TokenUrl, UserInfoUrl,
};
use serde::{Deserialize, Serialize};

use super::OidcError;
use super::claims::SUPPORTED_SCOPES;

/// Metadata the core discovery document has no field for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkceMetadata {
    pub code_challenge_methods_supported: Vec<PkceCodeChallengeMethod>,
}

impl AdditionalProviderMetadata for PkceMetadata {}

pub type DiscoveryDocument = ProviderMetadata<
    LogoutProviderMetadata<PkceMetadata>,
    CoreAuthDisplay,
    CoreClientAuthMethod,
    CoreClaimName,
    CoreClaimType,
    CoreGrantType,
    CoreJweContentEncryptionAlgorithm,
    CoreJweKeyManagementAlgorithm,
    CoreJsonWebKey,
    CoreResponseMode,
    CoreResponseType,
    CoreSubjectIdentifierType,
>;

const CLAIMS_SUPPORTED: [&str; 8] = [
    "sub",
    "email",
    "email_verified",
    "name",
    "given_name",
    "family_name",
    "preferred_username",
    "role",
];

/// Build the discovery document for `issuer`.
///
/// # Errors
///
/// Returns `OidcError::Configuration` if `issuer` is not an absolute URL.
pub fn document(issuer: &str) -> Result<DiscoveryDocument, OidcError> {
    let endpoint = |path: &str| format!("{issuer}{path}");
    let invalid = |e: url::ParseError| OidcError::Configuration(format!("issuer URL: {e}"));

    let metadata = DiscoveryDocument::new(
        IssuerUrl::new(issuer.to_owned()).map_err(invalid)?,
        AuthUrl::new(endpoint("/connect/authorize")).map_err(invalid)?,
        JsonWebKeySetUrl::new(endpoint("/.well-known/jwks.json")).map_err(invalid)?,
        vec![ResponseTypes::new(vec![CoreResponseType::Code])],
        vec![CoreSubjectIdentifierType::Public],
        vec![CoreJwsSigningAlgorithm::HmacSha256],
        LogoutProviderMetadata {
            end_session_endpoint: Some(
                EndSessionUrl::new(endpoint("/connect/logout")).map_err(invalid)?,
            ),
            additional_metadata: PkceMetadata {
                code_challenge_methods_supported: ["plain", "S256"]
                    .into_iter()
                    .map(|m| PkceCodeChallengeMethod::new(m.to_owned()))
                    .collect(),
            },
        },
    )
    .set_token_endpoint(Some(
        TokenUrl::new(endpoint("/connect/token")).map_err(invalid)?,
    ))
    .set_userinfo_endpoint(Some(
        UserInfoUrl::new(endpoint("/connect/userinfo")).map_err(invalid)?,
    ))
    .set_scopes_supported(Some(
        SUPPORTED_SCOPES
            .iter()
            .map(|s| Scope::new((*s).to_owned()))
            .collect(),
    ))
    .set_grant_types_supported(Some(vec![
        CoreGrantType::AuthorizationCode,
        CoreGrantType::RefreshToken,
    ]))
    .set_token_endpoint_auth_methods_supported(Some(vec![
        CoreClientAuthMethod::ClientSecretBasic,
        CoreClientAuthMethod::ClientSecretPost,
    ]))
    .set_claims_supported(Some(
        CLAIMS_SUPPORTED
            .iter()
            .map(|c| CoreClaimName::new((*c).to_owned()))
            .collect(),
    ));

    Ok(metadata)
}

/// ID tokens are HMAC-signed with the client secret, so no key is published.
#[must_use]
pub fn key_set() -> CoreJsonWebKeySet {
    CoreJsonWebKeySet::new(Vec::new())
}
