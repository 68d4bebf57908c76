//! Signature OAuth 1.0a (HMAC-SHA1) des requêtes Moe FM
//!
//! Toutes les requêtes vers `moe.fm` doivent porter un en-tête
//! `Authorization: OAuth ...` signé avec les secrets consumer et token.

use crate::error::{MoeFmError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Url;
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha1 = Hmac<Sha1>;

/// Caractères non réservés RFC 3986 : tout le reste est encodé
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Secrets nécessaires pour signer une requête
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

/// Encodage pourcent au sens OAuth
pub fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Génère un timestamp Unix actuel
pub fn get_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}

/// Génère un nonce aléatoire
pub fn get_nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Construit la chaîne de base de la signature
///
/// `url` peut contenir une query string : ses paramètres sont intégrés
/// à la signature puis retirés de l'URL de base.
pub fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut base_url = url.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .chain(params.iter().map(|(k, v)| (encode(k), encode(v))))
        .collect();
    pairs.sort();

    let normalized = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(base_url.as_str()),
        encode(&normalized)
    )
}

/// Calcule la signature HMAC-SHA1 encodée en base64
pub fn sign(base_string: &str, consumer_secret: &str, token_secret: &str) -> Result<String> {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| MoeFmError::Unauthorized(format!("invalid signing key: {}", e)))?;
    mac.update(base_string.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Construit la valeur de l'en-tête `Authorization`
///
/// `params` regroupe les paramètres de requête hors URL (query ajoutée
/// ou corps de formulaire).
pub fn authorization_header(
    credentials: &OAuthCredentials,
    method: &str,
    url: &Url,
    params: &[(String, String)],
    nonce: &str,
    timestamp: &str,
) -> Result<String> {
    let mut oauth_params: Vec<(String, String)> = vec![
        ("oauth_consumer_key".into(), credentials.consumer_key.clone()),
        ("oauth_nonce".into(), nonce.to_string()),
        ("oauth_signature_method".into(), "HMAC-SHA1".into()),
        ("oauth_timestamp".into(), timestamp.to_string()),
        ("oauth_token".into(), credentials.token.clone()),
        ("oauth_version".into(), "1.0".into()),
    ];

    let mut all_params = oauth_params.clone();
    all_params.extend(params.iter().cloned());

    let base = signature_base_string(method, url, &all_params);
    let signature = sign(
        &base,
        &credentials.consumer_secret,
        &credentials.token_secret,
    )?;
    oauth_params.push(("oauth_signature".into(), signature));

    let fields = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!("OAuth {}", fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn twitter_credentials() -> OAuthCredentials {
        OAuthCredentials {
            consumer_key: "xvz1evFS4wEEPTGEFPHBog".into(),
            consumer_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".into(),
            token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".into(),
            token_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".into(),
        }
    }

    #[test]
    fn test_encode_keeps_unreserved() {
        assert_eq!(encode("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(encode("a b+c,!"), "a%20b%2Bc%2C%21");
        assert_eq!(encode("é"), "%C3%A9");
    }

    #[test]
    fn test_get_timestamp() {
        let ts = get_timestamp();
        assert!(ts.parse::<u64>().unwrap() > 1704067200);
    }

    #[test]
    fn test_nonce_is_unique() {
        assert_ne!(get_nonce(), get_nonce());
    }

    #[test]
    fn test_reference_signature() {
        // Exemple publié dans la documentation OAuth de Twitter
        let creds = twitter_credentials();
        let url = Url::parse("https://api.twitter.com/1.1/statuses/update.json?include_entities=true")
            .unwrap();
        let params = vec![
            ("oauth_consumer_key".to_string(), creds.consumer_key.clone()),
            (
                "oauth_nonce".to_string(),
                "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg".to_string(),
            ),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), "1318622958".to_string()),
            ("oauth_token".to_string(), creds.token.clone()),
            ("oauth_version".to_string(), "1.0".to_string()),
            (
                "status".to_string(),
                "Hello Ladies + Gentlemen, a signed OAuth request!".to_string(),
            ),
        ];

        let base = signature_base_string("post", &url, &params);
        assert!(base.starts_with("POST&https%3A%2F%2Fapi.twitter.com%2F1.1%2Fstatuses%2Fupdate.json&"));
        assert!(base.contains("include_entities%3Dtrue"));

        let signature = sign(&base, &creds.consumer_secret, &creds.token_secret).unwrap();
        assert_eq!(signature, "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
    }

    #[test]
    fn test_authorization_header_fields() {
        let creds = twitter_credentials();
        let url = Url::parse("https://moe.fm/listen/playlist?api=json").unwrap();
        let header = authorization_header(
            &creds,
            "GET",
            &url,
            &[("perpage".to_string(), "30".to_string())],
            "nonce",
            "1318622958",
        )
        .unwrap();

        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(header.contains("oauth_signature_method=\"HMAC-SHA1\""));
        assert!(header.contains("oauth_signature=\""));
        // Les paramètres de requête ne sont pas recopiés dans l'en-tête
        assert!(!header.contains("perpage"));
    }

    #[test]
    fn test_signature_depends_on_params() {
        let url = Url::parse("https://moe.fm/listen/playlist?api=json").unwrap();
        let a = signature_base_string("GET", &url, &[("perpage".into(), "30".into())]);
        let b = signature_base_string("GET", &url, &[("perpage".into(), "31".into())]);
        assert_ne!(sign(&a, "cs", "ts").unwrap(), sign(&b, "cs", "ts").unwrap());
        assert_eq!(sign(&a, "cs", "ts").unwrap(), sign(&a, "cs", "ts").unwrap());
    }
}
