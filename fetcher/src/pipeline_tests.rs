//! Unit tests for pipeline orchestration.
//!
//! The happy path and the fail-closed paths run against in-memory fakes:
//! `CannedDownloader` serves the three artefacts, `DigestVerifier` stands in
//! for OpenPGP, and the real `GzipUnpacker` writes into a temporary
//! directory. Mocks are used where the test is about which capabilities are
//! never reached.

use super::*;
use crate::artefact::download::MockArtefactDownloader;
use crate::artefact::unpack::{GzipUnpacker, MockArtefactUnpacker};
use crate::preflight::PreflightError;
use crate::signature::{KeyImport, MockSignatureVerifier, SignatureFailure, VerificationError};
use crate::test_utils::{
    CannedDownloader, CannedResponse, DigestVerifier, InstalledTools, fake_empty_key, fake_key,
    fake_signature, gzip_bytes,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

const GLYPHS: &[u8] = b"0020:00000000000000000000000000000000\n\
0041:0000000018242442427E424242420000\n\
0042:000000007C4242427C424242427C0000\n";
const SIGNER: &str = "1A09227B1F435A33";
const ARCHIVE_URL: &str = "https://mirror.test/unifont-17.0.03/unifont_all-17.0.03.hex.gz";
const SIGNATURE_URL: &str = "https://mirror.test/unifont-17.0.03/unifont_all-17.0.03.hex.gz.sig";
const KEY_URL: &str = "https://mirror.test/keys/signer.asc";

/// A scratch output directory with matching pipeline settings.
struct Harness {
    _temp: TempDir,
    config: PipelineConfig,
}

impl Harness {
    fn output_path(&self) -> Utf8PathBuf {
        self.config.output_path()
    }

    fn archive_path(&self) -> Utf8PathBuf {
        self.config.output_dir.join("unifont_all-17.0.03.hex.gz")
    }
}

#[fixture]
fn harness() -> Harness {
    let temp = tempfile::tempdir().expect("temp dir");
    let output_dir = Utf8PathBuf::try_from(temp.path().join("fonts")).expect("UTF-8 path");
    let version = crate::artefact::naming::ReleaseVersion::try_from("17.0.03").expect("version");
    let artefacts = ArtefactSet::new(&version, "https://mirror.test/unifont-{version}/", KEY_URL)
        .expect("artefacts");
    Harness {
        _temp: temp,
        config: PipelineConfig {
            artefacts,
            output_dir,
            required_tools: vec!["gpg".to_owned()],
            keyring_dir: None,
            quiet: false,
        },
    }
}

/// Downloader serving a correctly signed release.
fn signed_release() -> CannedDownloader {
    let archive = gzip_bytes(GLYPHS);
    CannedDownloader::new()
        .with_body(SIGNATURE_URL, fake_signature(SIGNER, &archive))
        .with_body(ARCHIVE_URL, archive)
        .with_body(KEY_URL, fake_key(SIGNER))
}

fn run_with(
    harness: &Harness,
    executor: &dyn CommandExecutor,
    downloader: &dyn ArtefactDownloader,
    verifier: &dyn SignatureVerifier,
    unpacker: &dyn ArtefactUnpacker,
) -> (Result<RunSummary>, String) {
    let caps = Capabilities {
        executor,
        downloader,
        verifier,
        unpacker,
    };
    let mut stderr = Vec::new();
    let result = run_pipeline(&harness.config, &caps, &mut stderr);
    (result, String::from_utf8(stderr).expect("stderr UTF-8"))
}

fn run_fakes(harness: &Harness, downloader: &CannedDownloader) -> (Result<RunSummary>, String) {
    run_with(
        harness,
        &InstalledTools::new(&["gpg"]),
        downloader,
        &DigestVerifier::new(),
        &GzipUnpacker,
    )
}

#[rstest]
fn valid_release_is_unpacked(harness: Harness) {
    let downloader = signed_release();

    let (result, stderr) = run_fakes(&harness, &downloader);

    let summary = result.expect("pipeline should succeed");
    assert_eq!(std::fs::read(harness.output_path()).expect("output"), GLYPHS);
    assert_eq!(summary.output, harness.output_path());
    assert_eq!(summary.output_bytes, GLYPHS.len() as u64);
    assert_eq!(summary.version, "17.0.03");
    assert_eq!(summary.signer_fingerprint, SIGNER);
    assert_eq!(
        summary.archive_sha256,
        crate::test_utils::sha256_hex(&gzip_bytes(GLYPHS))
    );
    assert!(summary.warnings.is_empty());
    assert_eq!(
        downloader.requests(),
        vec![ARCHIVE_URL.to_owned(), SIGNATURE_URL.to_owned(), KEY_URL.to_owned()]
    );
    assert!(stderr.contains("Good signature"), "stderr: {stderr}");
}

#[rstest]
fn tampered_archive_is_rejected_and_output_untouched(harness: Harness) {
    let mut archive = gzip_bytes(GLYPHS);
    let signature = fake_signature(SIGNER, &archive);
    if let Some(byte) = archive.last_mut() {
        *byte ^= 0x01;
    }
    let downloader = CannedDownloader::new()
        .with_body(ARCHIVE_URL, archive)
        .with_body(SIGNATURE_URL, signature)
        .with_body(KEY_URL, fake_key(SIGNER));
    std::fs::create_dir_all(&harness.config.output_dir).expect("output dir");
    std::fs::write(harness.output_path(), b"previous table").expect("seed output");

    let (result, _) = run_fakes(&harness, &downloader);

    let err = result.expect_err("tampered archive must fail");
    assert!(
        matches!(
            err,
            PipelineError::SignatureInvalid(SignatureFailure::BadSignature { .. })
        ),
        "got {err:?}"
    );
    assert_eq!(
        std::fs::read(harness.output_path()).expect("output"),
        b"previous table"
    );
}

#[rstest]
fn tampered_archive_creates_no_output(harness: Harness) {
    let mut archive = gzip_bytes(GLYPHS);
    let signature = fake_signature(SIGNER, &archive);
    if let Some(byte) = archive.get_mut(12) {
        *byte ^= 0x80;
    }
    let downloader = CannedDownloader::new()
        .with_body(ARCHIVE_URL, archive)
        .with_body(SIGNATURE_URL, signature)
        .with_body(KEY_URL, fake_key(SIGNER));

    let (result, _) = run_fakes(&harness, &downloader);

    assert!(matches!(result, Err(PipelineError::SignatureInvalid(_))));
    assert!(!harness.output_path().exists());
}

#[rstest]
fn signature_by_unknown_key_is_signature_invalid(harness: Harness) {
    let archive = gzip_bytes(GLYPHS);
    let downloader = CannedDownloader::new()
        .with_body(SIGNATURE_URL, fake_signature("0123456789ABCDEF", &archive))
        .with_body(ARCHIVE_URL, archive)
        .with_body(KEY_URL, fake_key(SIGNER));

    let (result, _) = run_fakes(&harness, &downloader);

    let err = result.expect_err("unknown signer must fail");
    assert!(
        matches!(
            &err,
            PipelineError::SignatureInvalid(SignatureFailure::UnknownSigner { key_id })
                if key_id == "0123456789ABCDEF"
        ),
        "got {err:?}"
    );
    assert_eq!(err.stage(), PipelineStage::Verify);
    assert!(!harness.output_path().exists());
}

#[rstest]
fn missing_tool_issues_no_network_request(harness: Harness) {
    let downloader = signed_release();
    let executor = InstalledTools::new(&[]);
    let verifier = DigestVerifier::new();

    let (result, _) = run_with(&harness, &executor, &downloader, &verifier, &GzipUnpacker);

    let err = result.expect_err("missing gpg must fail");
    assert!(
        matches!(
            &err,
            PipelineError::MissingDependency(PreflightError::MissingDependency { tools })
                if tools == &["gpg".to_owned()]
        ),
        "got {err:?}"
    );
    assert_eq!(downloader.request_count(), 0);
    assert_eq!(verifier.imports(), 0);
    assert!(!harness.config.output_dir.exists());
}

#[rstest]
fn every_missing_tool_is_named(mut harness: Harness) {
    harness.config.required_tools = vec!["gpg".to_owned(), "gpgv".to_owned()];
    let downloader = MockArtefactDownloader::new();

    let (result, _) = run_with(
        &harness,
        &InstalledTools::new(&[]),
        &downloader,
        &MockSignatureVerifier::new(),
        &MockArtefactUnpacker::new(),
    );

    let message = result.expect_err("missing tools").diagnostic();
    assert_eq!(message, "error: preflight: missing required tool(s): gpg, gpgv");
}

#[rstest]
fn uncompressed_but_signed_archive_is_decompression_error(harness: Harness) {
    let downloader = CannedDownloader::new()
        .with_body(ARCHIVE_URL, GLYPHS)
        .with_body(SIGNATURE_URL, fake_signature(SIGNER, GLYPHS))
        .with_body(KEY_URL, fake_key(SIGNER));
    std::fs::create_dir_all(&harness.config.output_dir).expect("output dir");
    std::fs::write(harness.output_path(), b"previous table").expect("seed output");

    let (result, _) = run_fakes(&harness, &downloader);

    let err = result.expect_err("plain archive must fail");
    assert!(matches!(err, PipelineError::Decompression(_)), "got {err:?}");
    assert_eq!(err.stage(), PipelineStage::Unpack);
    assert_eq!(
        std::fs::read(harness.output_path()).expect("output"),
        b"previous table"
    );
}

#[rstest]
fn repeated_runs_produce_identical_output(harness: Harness) {
    let (first, _) = run_fakes(&harness, &signed_release());
    first.expect("first run");
    let first_bytes = std::fs::read(harness.output_path()).expect("first output");

    let (second, _) = run_fakes(&harness, &signed_release());
    second.expect("second run");
    let second_bytes = std::fs::read(harness.output_path()).expect("second output");

    assert_eq!(first_bytes, second_bytes);
}

#[rstest]
#[case::archive(ARCHIVE_URL, 1)]
#[case::signature(SIGNATURE_URL, 2)]
#[case::key(KEY_URL, 3)]
fn fetch_failure_stops_later_fetches(
    harness: Harness,
    #[case] failing_url: &str,
    #[case] expected_requests: usize,
) {
    let downloader = signed_release().with_response(failing_url, CannedResponse::Status(404));
    let verifier = DigestVerifier::new();

    let (result, _) = run_with(
        &harness,
        &InstalledTools::new(&["gpg"]),
        &downloader,
        &verifier,
        &GzipUnpacker,
    );

    let err = result.expect_err("fetch must fail");
    assert!(matches!(err, PipelineError::Fetch { .. }), "got {err:?}");
    assert_eq!(err.stage(), PipelineStage::Fetch);
    assert_eq!(downloader.request_count(), expected_requests);
    assert_eq!(verifier.imports(), 0);
    assert!(!harness.output_path().exists());
}

#[rstest]
fn files_fetched_before_a_failure_remain(harness: Harness) {
    let downloader = signed_release().with_response(
        KEY_URL,
        CannedResponse::Transport("connection reset".to_owned()),
    );

    let (result, _) = run_fakes(&harness, &downloader);

    let err = result.expect_err("key fetch must fail");
    assert!(err.to_string().contains("connection reset"), "got {err}");
    assert!(harness.archive_path().is_file());
}

#[rstest]
fn unparseable_key_aborts_before_verification(harness: Harness) {
    let downloader = signed_release().with_body(KEY_URL, b"<html>not found</html>".to_vec());
    let verifier = DigestVerifier::new();

    let (result, _) = run_with(
        &harness,
        &InstalledTools::new(&["gpg"]),
        &downloader,
        &verifier,
        &GzipUnpacker,
    );

    let err = result.expect_err("bad key must fail");
    assert!(matches!(err, PipelineError::KeyImport { .. }), "got {err:?}");
    assert_eq!(verifier.verifications(), 0);
}

#[rstest]
fn empty_key_import_warns_then_fails_verification(harness: Harness) {
    let downloader = signed_release().with_body(KEY_URL, fake_empty_key());

    let (result, stderr) = run_fakes(&harness, &downloader);

    assert!(
        stderr.contains("warning: no usable signing key was imported"),
        "stderr: {stderr}"
    );
    assert_eq!(stderr.matches("warning:").count(), 1, "stderr: {stderr}");
    let err = result.expect_err("verification must fail");
    assert!(
        matches!(
            err,
            PipelineError::SignatureInvalid(SignatureFailure::UnknownSigner { .. })
        ),
        "got {err:?}"
    );
    assert!(!harness.output_path().exists());
}

#[rstest]
fn rejected_signature_never_reaches_unpacker(harness: Harness) {
    let mut verifier = MockSignatureVerifier::new();
    verifier
        .expect_import_key()
        .times(1)
        .returning(|_, _| Ok(KeyImport { fingerprints: vec![SIGNER.to_owned()] }));
    verifier.expect_verify_detached().times(1).returning(|_, _, _| {
        Err(VerificationError::SignatureInvalid(
            SignatureFailure::RevokedKey {
                key_id: SIGNER.to_owned(),
            },
        ))
    });
    let mut unpacker = MockArtefactUnpacker::new();
    unpacker.expect_unpack().never();

    let (result, _) = run_with(
        &harness,
        &InstalledTools::new(&["gpg"]),
        &signed_release(),
        &verifier,
        &unpacker,
    );

    let err = result.expect_err("revoked key must fail");
    assert_eq!(
        err.diagnostic(),
        format!("error: verify: signing key {SIGNER} has been revoked")
    );
}

#[rstest]
fn successful_unpack_is_the_last_fallible_step(harness: Harness) {
    let archive = harness.archive_path();
    let mut unpacker = MockArtefactUnpacker::new();
    unpacker.expect_unpack().times(1).returning(move |archive_path, output_path| {
        std::fs::write(output_path, GLYPHS).expect("write output");
        // The archive vanishing after the output is replaced must not
        // turn a finished run into a failure.
        std::fs::remove_file(archive_path).expect("remove archive");
        Ok(GLYPHS.len() as u64)
    });

    let (result, _) = run_with(
        &harness,
        &InstalledTools::new(&["gpg"]),
        &signed_release(),
        &DigestVerifier::new(),
        &unpacker,
    );

    let summary = result.expect("run must succeed once the output is replaced");
    assert!(!archive.exists());
    assert_eq!(
        summary.archive_sha256,
        crate::test_utils::sha256_hex(&gzip_bytes(GLYPHS))
    );
    assert_eq!(std::fs::read(harness.output_path()).expect("output"), GLYPHS);
}

#[rstest]
fn verifier_sees_fetched_paths(harness: Harness) {
    let signature = harness.config.output_dir.join("unifont_all-17.0.03.hex.gz.sig");
    let archive = harness.archive_path();
    let key = harness.config.output_dir.join("signer.asc");
    let mut verifier = MockSignatureVerifier::new();
    verifier
        .expect_import_key()
        .withf(move |_, path| path == key.as_path())
        .returning(|_, _| Ok(KeyImport { fingerprints: vec![SIGNER.to_owned()] }));
    verifier
        .expect_verify_detached()
        .withf(move |_, sig, data| sig == signature.as_path() && data == archive.as_path())
        .returning(|_, _, _| {
            Ok(SignatureReport {
                fingerprint: SIGNER.to_owned(),
                signer: None,
                signed_at: None,
            })
        });

    let (result, _) = run_with(
        &harness,
        &InstalledTools::new(&["gpg"]),
        &signed_release(),
        &verifier,
        &GzipUnpacker,
    );

    result.expect("pipeline should succeed");
}

#[rstest]
fn persistent_keyring_keeps_key_after_failure(mut harness: Harness) {
    let keyring_dir = harness.config.output_dir.with_file_name("gnupg");
    harness.config.keyring_dir = Some(keyring_dir.clone());
    let downloader = signed_release().with_body(SIGNATURE_URL, b"garbage".to_vec());

    let (result, _) = run_fakes(&harness, &downloader);

    assert!(matches!(
        result,
        Err(PipelineError::SignatureInvalid(SignatureFailure::Malformed { .. }))
    ));
    assert!(keyring_dir.join(SIGNER).exists());
}

#[rstest]
fn quiet_run_writes_nothing_on_success(mut harness: Harness) {
    harness.config.quiet = true;

    let (result, stderr) = run_fakes(&harness, &signed_release());

    result.expect("pipeline should succeed");
    assert!(stderr.is_empty(), "stderr: {stderr}");
}

#[test]
fn stages_display_and_complete_in_order() {
    let stages = [
        PipelineStage::Preflight,
        PipelineStage::Fetch,
        PipelineStage::KeyImport,
        PipelineStage::Verify,
        PipelineStage::Unpack,
    ];
    let states: Vec<_> = stages.iter().map(|stage| stage.completed_state()).collect();
    assert_eq!(
        states,
        ["PREFLIGHT_OK", "FETCHED", "KEY_IMPORTED", "VERIFIED", "UNPACKED"]
    );
    assert_eq!(PipelineStage::KeyImport.to_string(), "key import");
}

#[test]
fn pipeline_config_follows_fetch_config() {
    let fetch = crate::config::FetchConfig::resolve(crate::config::ConfigLayer {
        gpg: Some("gpg2".to_owned()),
        output_dir: Some(Utf8PathBuf::from("build")),
        ..crate::config::ConfigLayer::default()
    })
    .expect("config");

    let config = PipelineConfig::from_fetch_config(&fetch, true);

    assert_eq!(config.required_tools, vec!["gpg2".to_owned()]);
    assert_eq!(
        config.output_path(),
        Utf8PathBuf::from("build/unifont_all-17.0.03.hex")
    );
    assert!(config.quiet);
}
