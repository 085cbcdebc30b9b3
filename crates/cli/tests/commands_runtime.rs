use std::env;
use std::sync::{Mutex, OnceLock};

use chrono::{Datelike, Utc};
use parapheur_cli::commands::{cancel, decide, inbox, migrate, new_credit, seed, show, submit};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("PARAPHEUR_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_rejects_non_sqlite_database_url() {
    with_env(&[("PARAPHEUR_DATABASE_URL", "postgres://nope")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn migrate_rejects_malformed_env_override() {
    with_env(
        &[
            ("PARAPHEUR_DATABASE_URL", "sqlite::memory:"),
            ("PARAPHEUR_DATABASE_MAX_CONNECTIONS", "lots"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(&[("PARAPHEUR_DATABASE_URL", "sqlite::memory:")], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(first_payload["status"], "ok");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(second_payload["status"], "ok");

        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

#[test]
fn seed_describes_the_demo_circuits() {
    with_env(&[("PARAPHEUR_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("CRD: Demandes de crédit"));
        assert!(message.contains("COU: Courrier entrant"));
        assert!(message.contains("CIR-B"));
    });
}

#[test]
fn config_reports_env_sources() {
    with_env(&[("PARAPHEUR_DATABASE_URL", "sqlite::memory:")], || {
        let output = parapheur_cli::commands::config::run();
        assert!(output.contains("effective config"));
        assert!(output
            .contains("- database.url = sqlite::memory: (source: env (PARAPHEUR_DATABASE_URL))"));
        assert!(output.contains("- workflow.default_currency = XOF (source: default)"));
        assert!(output.contains("- logging.format = Compact (source: default)"));
    });
}

#[test]
fn new_credit_rejects_unknown_credit_kind() {
    with_env(&[], || {
        let result = new_credit::run(credit_args("9000000", "mortgage"));
        assert_eq!(result.exit_code, 2, "expected argument validation failure");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "new-credit");
        assert_eq!(payload["error_class"], "invalid_argument");
    });
}

#[test]
fn new_credit_rejects_unparseable_amount() {
    with_env(&[], || {
        let result = new_credit::run(credit_args("douze millions", "housing"));
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_argument");
    });
}

#[test]
fn decide_rejects_unknown_action() {
    with_env(&[], || {
        let result = decide::run(decide::DecideArgs {
            reference: "CRD/2026/0001".to_string(),
            action: "escalate".to_string(),
            user: "chef.agence".to_string(),
            name: None,
            comment: "n/a".to_string(),
        });
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "decide");
        assert_eq!(payload["error_class"], "invalid_argument");
    });
}

#[test]
fn full_credit_walk_over_a_file_database() {
    let db = TempDb::new("walk");
    let year = Utc::now().year();
    let reference = format!("CRD/{year}/0001");

    with_env(&[("PARAPHEUR_DATABASE_URL", &db.url)], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "seed failed: {}", result.output);

        let result = new_credit::run(credit_args("12000000", "housing"));
        assert_eq!(result.exit_code, 0, "registration failed: {}", result.output);
        let payload = parse_payload(&result.output);
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains(&reference), "unexpected reference: {message}");
        assert!(message.contains("circuit-b"), "expected mid-band routing: {message}");

        let result = submit::run(submit::SubmitArgs {
            reference: reference.clone(),
            user: "agent.dupont".to_string(),
            name: None,
        });
        assert_eq!(result.exit_code, 0, "submit failed: {}", result.output);
        let payload = parse_payload(&result.output);
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("3 approvals created"), "unexpected ledger: {message}");

        let result = inbox::run(inbox::InboxArgs { user: "chef.agence".to_string() });
        assert_eq!(result.exit_code, 0);
        let payload = parse_payload(&result.output);
        assert!(payload["message"].as_str().unwrap_or("").contains(&reference));

        for (user, expected_state) in [
            ("chef.agence", "InProgress"),
            ("resp.risques", "InProgress"),
            ("directeur", "Approved"),
        ] {
            let result = decide::run(decide::DecideArgs {
                reference: reference.clone(),
                action: "approve".to_string(),
                user: user.to_string(),
                name: None,
                comment: "Dossier complet".to_string(),
            });
            assert_eq!(result.exit_code, 0, "decision by {user} failed: {}", result.output);
            let payload = parse_payload(&result.output);
            let message = payload["message"].as_str().unwrap_or("");
            assert!(message.contains(expected_state), "after {user}: {message}");
        }

        let result = decide::run(decide::DecideArgs {
            reference: reference.clone(),
            action: "approve".to_string(),
            user: "directeur".to_string(),
            name: None,
            comment: "encore".to_string(),
        });
        assert_eq!(result.exit_code, 6, "expected nothing pending on a closed request");
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "nothing_pending");

        let result = show::run(show::ShowArgs { reference: reference.clone() });
        assert_eq!(result.exit_code, 0);
        let payload = parse_payload(&result.output);
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("[Approved]"), "unexpected detail: {message}");
        assert!(message.contains("comments (3)"), "unexpected thread: {message}");
        assert!(message.contains("Validation - "), "comment subject missing: {message}");
    });
}

#[test]
fn cancel_refuses_a_submitted_request() {
    let db = TempDb::new("cancel");
    let year = Utc::now().year();
    let reference = format!("CRD/{year}/0001");

    with_env(&[("PARAPHEUR_DATABASE_URL", &db.url)], || {
        assert_eq!(seed::run().exit_code, 0);
        assert_eq!(new_credit::run(credit_args("100000", "salary")).exit_code, 0);
        assert_eq!(
            submit::run(submit::SubmitArgs {
                reference: reference.clone(),
                user: "agent.dupont".to_string(),
                name: None,
            })
            .exit_code,
            0
        );

        let result = cancel::run(cancel::CancelArgs {
            reference: reference.clone(),
            user: "agent.dupont".to_string(),
            name: None,
        });
        assert_eq!(result.exit_code, 7, "expected lifecycle refusal");
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "workflow_rule");
    });
}

fn credit_args(amount: &str, kind: &str) -> new_credit::NewCreditArgs {
    new_credit::NewCreditArgs {
        r#type: "CRD".to_string(),
        user: "agent.dupont".to_string(),
        subject: "Prêt immobilier".to_string(),
        description: None,
        client: "C-1001".to_string(),
        account: "ACC-77".to_string(),
        client_name: "Aissata Koné".to_string(),
        kind: kind.to_string(),
        amount: amount.to_string(),
        currency: None,
        duration: Some(120),
        priority: "normal".to_string(),
        documents: vec!["bulletin_salaire.pdf".to_string()],
    }
}

struct TempDb {
    url: String,
    path: std::path::PathBuf,
}

impl TempDb {
    fn new(tag: &str) -> Self {
        let path = env::temp_dir().join(format!("parapheur-cli-{tag}-{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let url = format!("sqlite://{}?mode=rwc", path.display());
        Self { url, path }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let _ = std::fs::remove_file(self.path.with_extension("db-wal"));
        let _ = std::fs::remove_file(self.path.with_extension("db-shm"));
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PARAPHEUR_DATABASE_URL",
        "PARAPHEUR_DATABASE_MAX_CONNECTIONS",
        "PARAPHEUR_DATABASE_TIMEOUT_SECS",
        "PARAPHEUR_DEFAULT_CURRENCY",
        "PARAPHEUR_FALLBACK_REFERENCE_CODE",
        "PARAPHEUR_LOGGING_LEVEL",
        "PARAPHEUR_LOGGING_FORMAT",
        "PARAPHEUR_LOG_LEVEL",
        "PARAPHEUR_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, previous) in previous_values {
        match previous {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
