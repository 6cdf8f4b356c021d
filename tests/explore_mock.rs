use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};


const GENERATE_PATH: &str = "/models/gemini-1.5-flash:generateContent";

#[tokio::test]
async fn test_explore_renders_full_response() {
    let mock_server = MockServer::start().await;

    let answer = "1. **Formal definition**: the discomfort of holding conflicting beliefs.";
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::generate_response(answer)))
        .expect(1)
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("psique")
        .env("GEMINI_API_KEY", "test-api-key")
        .env("GEMINI_BASE_URL", mock_server.uri())
        .args(["explore", "-c", "cognitive dissonance"])
        .assert()
        .success()
        .stdout(predicate::str::contains(answer));
}

#[tokio::test]
async fn test_explore_prompt_carries_concept_and_sections() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_string_contains("cognitive dissonance"))
        .and(body_string_contains("Formal definition"))
        .and(body_string_contains("Plain-language analogy"))
        .and(body_string_contains("Practical example"))
        .and(body_string_contains("Associated theorist"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(fixtures::generate_response("An answer.")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("psique")
        .env("GEMINI_API_KEY", "test-api-key")
        .env("GEMINI_BASE_URL", mock_server.uri())
        .args(["explore", "-c", "cognitive dissonance"])
        .assert()
        .success();
}

#[tokio::test]
async fn test_explore_rejects_empty_concept_without_calling() {
    let mock_server = MockServer::start().await;

    // No request may reach the server for an empty concept.
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(fixtures::generate_response("unused")),
        )
        .expect(0)
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("psique")
        .env("GEMINI_API_KEY", "test-api-key")
        .env("GEMINI_BASE_URL", mock_server.uri())
        .args(["explore", "-c", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Concept cannot be empty"));
}

#[tokio::test]
async fn test_explore_fails_without_api_key() {
    cargo_bin_cmd!("psique")
        .env_remove("GEMINI_API_KEY")
        .args(["explore", "-c", "attachment theory"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GEMINI_API_KEY"));
}

#[tokio::test]
async fn test_explore_surfaces_api_error_detail() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(fixtures::error_response(
                429,
                "RESOURCE_EXHAUSTED",
                "Quota exceeded",
            )),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("psique")
        .env("GEMINI_API_KEY", "test-api-key")
        .env("GEMINI_BASE_URL", mock_server.uri())
        .args(["explore", "-c", "operant conditioning"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("429"))
        .stderr(predicate::str::contains("Quota exceeded"));
}

#[tokio::test]
async fn test_explore_model_override_changes_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-pro:generateContent"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(fixtures::generate_response("From pro.")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("psique")
        .env("GEMINI_API_KEY", "test-api-key")
        .env("GEMINI_BASE_URL", mock_server.uri())
        .args(["--model", "gemini-1.5-pro", "explore", "-c", "priming"])
        .assert()
        .success()
        .stdout(predicate::str::contains("From pro."));
}
