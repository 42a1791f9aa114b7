//! Signing ceremony driver

use super::{verify_signature, SigningConfig};
use crate::client::{ClientConfig, TssClient, TssClientFactory};
use crate::encoding::{base64_public_key, base64_share};
use crate::{AccountParams, CoefficientSet, Error, Result, ServerCoefficients, Signature, SigningSession, Step};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

/// Produce a signature over a 32-byte digest with the account's threshold key.
///
/// Input is validated before any client is created. Once a client exists its
/// session is cleaned up on every exit path; a cleanup failure is logged and
/// never replaces the outcome. The signature is verified against the account
/// public key before it is returned.
///
/// # Cancel safety
///
/// Not cancel safe. Dropping the returned future after the client has been
/// created skips cleanup, leaving the session open on the signing nodes until
/// they expire it.
#[instrument(skip_all, fields(verifier = %params.verifier, tag = %params.selected_tag))]
pub async fn run_signing<F: TssClientFactory>(
    params: &AccountParams,
    message: &[u8],
    factory: &F,
    config: &SigningConfig,
) -> Result<Signature> {
    let public_key = params.public_key()?;
    let digest: [u8; 32] = message.try_into().map_err(|_| {
        Error::InvalidMessage(format!("expected a 32-byte digest, got {} bytes", message.len()))
    })?;

    let session = SigningSession::new(params)?;
    let coefficients = CoefficientSet::compute(
        &session.topology.server_indexes,
        &params.tss_index,
        &params.tss_share,
    )?;

    info!(
        nonce_prefix = &session.session_nonce[..8],
        parties = session.topology.parties,
        servers = ?session.topology.server_indexes,
        "Starting signing session"
    );

    let client_config = ClientConfig {
        index: session.client_index(),
        parties: session.topology.party_indexes.clone(),
        endpoints: session.topology.endpoints.clone(),
        socket_endpoints: session.topology.socket_endpoints.clone(),
        share: Zeroizing::new(base64_share(&coefficients.denormalized_share)),
        public_key: base64_public_key(&public_key),
        session: session.session,
    };

    let client = factory
        .create(client_config)
        .await
        .map_err(|e| e.at(Step::Create))?;

    let outcome = drive_protocol(
        &client,
        &coefficients.server,
        &digest,
        &params.auth_signatures,
        config,
    )
    .await;

    if let Err(e) = client.cleanup(&params.auth_signatures).await {
        warn!(error = %e, "Session cleanup failed");
    }

    let signature = verify_signature(&digest, &outcome?, &public_key)?;

    info!(recovery_id = signature.recovery_id, "Signature verified");

    Ok(signature)
}

async fn drive_protocol<C: TssClient>(
    client: &C,
    coefficients: &ServerCoefficients,
    digest: &[u8; 32],
    signatures: &[String],
    config: &SigningConfig,
) -> Result<Signature> {
    let connected = poll_until(config.connect_timeout, config.poll_interval, || client.check_connected())
        .await
        .map_err(|e| e.at(Step::Connect))?;
    if !connected {
        return Err(Error::Connection(format!(
            "servers not connected after {:?}",
            config.connect_timeout
        )));
    }
    debug!("Sockets connected");

    let precompute = client
        .precompute(coefficients, signatures)
        .await
        .map_err(|e| e.at(Step::Precompute))?;

    let ready = poll_until(config.ready_timeout, config.poll_interval, || client.is_ready())
        .await
        .map_err(|e| e.at(Step::Ready))?;
    if !ready {
        return Err(Error::NotReady(format!(
            "precompute not finished after {:?}",
            config.ready_timeout
        )));
    }
    debug!("Precompute ready");

    client
        .sign(&STANDARD.encode(digest), true, &precompute, signatures)
        .await
        .map_err(|e| e.at(Step::Sign))
}

/// Poll `check` until it reports true. `Ok(false)` means the timeout elapsed.
async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let polling = async {
        loop {
            if check().await? {
                return Ok::<(), Error>(());
            }
            tokio::time::sleep(interval).await;
        }
    };

    match tokio::time::timeout(timeout, polling).await {
        Ok(result) => result.map(|()| true),
        Err(_) => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::memory::DealtShare;
    use crate::client::{Fault, MemoryTssNetwork};
    use crate::session::{DELIMITER_1, DELIMITER_2, DELIMITER_3, DELIMITER_4};
    use k256::ecdsa::signature::hazmat::PrehashVerifier;
    use rand::rngs::OsRng;
    use sha3::{Digest, Keccak256};

    fn fixture_params(dealt: &DealtShare) -> AccountParams {
        AccountParams {
            public_key: dealt.public_key.clone(),
            factor_key: "b7f0f0d7f1b4c7a5e3d2c1b0a9f8e7d6c5b4a3928170605040302010f0e0d0c0".into(),
            tss_nonce: 0,
            tss_share: dealt.tss_share.clone(),
            tss_index: dealt.tss_index.clone(),
            selected_tag: "default".into(),
            verifier: "google-lrc".into(),
            verifier_id: "hqjang95@gmail.com".into(),
            node_indexes: vec![],
            tss_endpoints: (1..=5)
                .map(|i| format!("https://sapphire-{i}.auth.network/tss"))
                .collect(),
            auth_signatures: (1..=3)
                .map(|i| format!(r#"{{"data":"token-{i}","sig":"sig-{i}"}}"#))
                .collect(),
        }
    }

    fn setup() -> (MemoryTssNetwork, AccountParams) {
        let (network, dealt) = MemoryTssNetwork::deal(&mut OsRng, 5, 3, 2).unwrap();
        let params = fixture_params(&dealt);
        (network, params)
    }

    fn hello_digest() -> [u8; 32] {
        Keccak256::digest(b"hello world").into()
    }

    fn fast_config() -> SigningConfig {
        SigningConfig::default()
            .with_connect_timeout(Duration::from_millis(200))
            .with_ready_timeout(Duration::from_millis(200))
            .with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_sign_fixture_account() {
        let (network, params) = setup();
        let digest = hello_digest();

        let signature = run_signing(&params, &digest, &network, &SigningConfig::default())
            .await
            .unwrap();

        assert_eq!(signature.to_bytes().len(), 65);
        assert!(signature.recovery_id <= 1);
        assert!(network
            .public_key()
            .verifying_key()
            .verify_prehash(&digest, &signature.to_ecdsa().unwrap())
            .is_ok());

        assert_eq!(network.created_count(), 1);
        assert_eq!(network.cleanup_count(), 1);
        assert_eq!(network.active_sessions(), 0);

        let sessions = network.seen_sessions();
        let prefix = format!(
            "google-lrc{DELIMITER_1}hqjang95@gmail.com{DELIMITER_2}default{DELIMITER_3}0{DELIMITER_4}"
        );
        assert!(sessions[0].starts_with(&prefix));
        assert_eq!(sessions[0].len(), prefix.len() + 43);
    }

    #[tokio::test]
    async fn test_sign_explicit_node_indexes() {
        let (network, mut params) = setup();
        params.node_indexes = vec![2, 3, 5];

        let signature = run_signing(&params, &hello_digest(), &network, &SigningConfig::default())
            .await
            .unwrap();
        assert!(verify_signature(&hello_digest(), &signature, network.public_key()).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_public_key_skips_network() {
        let (network, mut params) = setup();
        let too_long = "f".repeat(131);

        for public_key in ["", "04abcd", too_long.as_str()] {
            params.public_key = public_key.to_string();
            let err = run_signing(&params, &hello_digest(), &network, &fast_config())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidPublicKey(_)));
            assert!(err.is_invalid_input());
        }

        assert_eq!(network.created_count(), 0);
    }

    #[tokio::test]
    async fn test_non_digest_message_rejected() {
        let (network, params) = setup();

        for message in [&b"hello world"[..], &[0u8; 33][..], &[][..]] {
            let err = run_signing(&params, message, &network, &fast_config())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidMessage(_)));
        }

        assert_eq!(network.created_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_endpoint_skips_network() {
        let (network, mut params) = setup();
        params.tss_endpoints.truncate(2);

        let err = run_signing(&params, &hello_digest(), &network, &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Topology(_)));
        assert_eq!(network.created_count(), 0);
    }

    #[tokio::test]
    async fn test_verification_failure_still_cleans_up() {
        let (network, params) = setup();
        network.set_fault(Fault::CorruptSignature);

        let err = run_signing(&params, &hello_digest(), &network, &fast_config())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Verification(_)));
        assert_eq!(network.cleanup_count(), 1);
        assert_eq!(network.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_wrong_share_fails_verification() {
        let (network, mut params) = setup();
        params.tss_share = "1234".into();

        let err = run_signing(&params, &hello_digest(), &network, &fast_config())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Verification(_)));
        assert_eq!(network.cleanup_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let (network, params) = setup();
        network.set_fault(Fault::NeverConnect);

        let started = std::time::Instant::now();
        let err = run_signing(&params, &hello_digest(), &network, &fast_config())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(err.step(), Some(Step::Connect));
        assert!(err.is_retryable());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(network.cleanup_count(), 1);
    }

    #[tokio::test]
    async fn test_ready_timeout() {
        let (network, params) = setup();
        network.set_fault(Fault::NeverReady);

        let err = run_signing(&params, &hello_digest(), &network, &fast_config())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotReady(_)));
        assert_eq!(network.cleanup_count(), 1);
    }

    #[tokio::test]
    async fn test_precompute_failure_names_step() {
        let (network, params) = setup();
        network.set_fault(Fault::RejectPrecompute);

        let err = run_signing(&params, &hello_digest(), &network, &fast_config())
            .await
            .unwrap_err();

        assert_eq!(err.step(), Some(Step::Precompute));
        assert!(err.to_string().starts_with("precompute failed"));
        assert_eq!(network.cleanup_count(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_failure_keeps_signature() {
        let (network, params) = setup();
        network.set_fault(Fault::FailCleanup);

        let result = run_signing(&params, &hello_digest(), &network, &fast_config()).await;

        assert!(result.is_ok());
        assert_eq!(network.cleanup_count(), 1);
    }

    #[tokio::test]
    async fn test_create_failure_skips_cleanup() {
        let (network, _) = setup();
        let (_, other) = MemoryTssNetwork::deal(&mut OsRng, 5, 3, 2).unwrap();
        let params = fixture_params(&other);

        let err = run_signing(&params, &hello_digest(), &network, &fast_config())
            .await
            .unwrap_err();

        assert_eq!(err.step(), Some(Step::Create));
        assert_eq!(network.created_count(), 1);
        assert_eq!(network.cleanup_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_signing() {
        let (network, params) = setup();

        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let network = network.clone();
                let params = params.clone();
                tokio::spawn(async move {
                    let digest: [u8; 32] = Keccak256::digest([i]).into();
                    run_signing(&params, &digest, &network, &SigningConfig::default()).await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let mut sessions = network.seen_sessions();
        sessions.sort();
        sessions.dedup();
        assert_eq!(sessions.len(), 4);
        assert_eq!(network.cleanup_count(), 4);
    }
}
